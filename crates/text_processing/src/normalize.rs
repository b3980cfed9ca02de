//! Shared text normalisation helpers

use unicode_segmentation::UnicodeSegmentation;

/// Lowercase and collapse runs of whitespace
pub(crate) fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Lowercased words using Unicode word boundaries
pub(crate) fn words(text: &str) -> Vec<String> {
    text.unicode_words().map(|w| w.to_lowercase()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Mau   PESAN\tmenu "), "mau pesan menu");
    }

    #[test]
    fn test_words() {
        assert_eq!(words("Halo, kak! Menu?"), vec!["halo", "kak", "menu"]);
    }
}
