//! Intent Classification
//!
//! Scores a message against per-intent keyword tables (Indonesian) and picks
//! the best-scoring intent. Used to decide whether the order flow should engage
//! at all for a customer who is still browsing.
//!
//! The confidence is relative (hits over table size), not a calibrated
//! probability.
//!
//! # Example
//!
//! ```
//! use wa_agent_text_processing::intent::{Intent, IntentClassifier};
//!
//! let classifier = IntentClassifier::new();
//! let result = classifier.classify("jam buka hari minggu?");
//!
//! assert_eq!(result.intent, Intent::Hours);
//! assert!(!result.is_ordering);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::normalize::{normalize, words};

/// Intent labels understood by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Menu,
    Order,
    Location,
    Reservation,
    Hours,
    Promo,
    Greeting,
    /// No keyword matched
    General,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Menu => "menu",
            Self::Order => "order",
            Self::Location => "location",
            Self::Reservation => "reservation",
            Self::Hours => "hours",
            Self::Promo => "promo",
            Self::Greeting => "greeting",
            Self::General => "general",
        }
    }
}

/// Classification result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedIntent {
    pub is_ordering: bool,
    pub intent: Intent,
    pub confidence: f32,
}

/// Keyword table for one intent
#[derive(Debug, Clone)]
struct KeywordSet {
    intent: Intent,
    keywords: Vec<&'static str>,
    weight: f32,
}

/// Menu keywords count more than the rest
const MENU_WEIGHT: f32 = 1.5;

/// Minimum confidence for a menu/order intent to count as ordering
const ORDERING_THRESHOLD: f32 = 0.2;

/// Confidence returned for an exact high-confidence phrase
const PHRASE_CONFIDENCE: f32 = 0.9;

/// Phrases that short-circuit to a menu request
const MENU_PHRASES: &[&str] = &[
    "mau pesan menu",
    "mau lihat menu",
    "lihat menu",
    "minta menu",
    "daftar menu",
    "ada menu apa",
    "menu apa saja",
];

/// Keyword-scoring intent classifier
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    sets: Vec<KeywordSet>,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentClassifier {
    /// Create a classifier with the built-in Indonesian keyword tables.
    ///
    /// Table order is also the tie-break order.
    pub fn new() -> Self {
        let sets = vec![
            KeywordSet {
                intent: Intent::Menu,
                keywords: vec!["menu", "daftar", "katalog", "makanan", "minuman", "harga"],
                weight: MENU_WEIGHT,
            },
            KeywordSet {
                intent: Intent::Order,
                keywords: vec!["pesan", "pesen", "order", "beli"],
                weight: 1.0,
            },
            KeywordSet {
                intent: Intent::Location,
                keywords: vec!["lokasi", "alamat", "dimana", "di mana", "maps", "cabang"],
                weight: 1.0,
            },
            KeywordSet {
                intent: Intent::Reservation,
                keywords: vec!["reservasi", "booking", "book", "meja", "tempat"],
                weight: 1.0,
            },
            KeywordSet {
                intent: Intent::Hours,
                keywords: vec!["jam buka", "buka", "tutup", "jam operasional", "jam"],
                weight: 1.0,
            },
            KeywordSet {
                intent: Intent::Promo,
                keywords: vec!["promo", "diskon", "potongan", "voucher"],
                weight: 1.0,
            },
            KeywordSet {
                intent: Intent::Greeting,
                keywords: vec![
                    "halo",
                    "hai",
                    "hi",
                    "pagi",
                    "siang",
                    "sore",
                    "malam",
                    "assalamualaikum",
                ],
                weight: 1.0,
            },
        ];

        Self { sets }
    }

    /// Classify a message
    pub fn classify(&self, message: &str) -> ClassifiedIntent {
        let text = normalize(message);

        if MENU_PHRASES.iter().any(|phrase| text.contains(phrase)) {
            return ClassifiedIntent {
                is_ordering: true,
                intent: Intent::Menu,
                confidence: PHRASE_CONFIDENCE,
            };
        }

        let tokens: HashSet<String> = words(&text).into_iter().collect();

        let mut best: Option<(&KeywordSet, f32)> = None;
        for set in &self.sets {
            let score = Self::score(set, &text, &tokens);
            if score <= 0.0 {
                continue;
            }
            match best {
                Some((_, best_score)) if best_score >= score => {}
                _ => best = Some((set, score)),
            }
        }

        match best {
            Some((set, score)) => {
                let confidence = (score / set.keywords.len() as f32).min(1.0);
                let is_ordering = matches!(set.intent, Intent::Menu | Intent::Order)
                    && confidence > ORDERING_THRESHOLD;
                ClassifiedIntent {
                    is_ordering,
                    intent: set.intent,
                    confidence,
                }
            }
            None => ClassifiedIntent {
                is_ordering: false,
                intent: Intent::General,
                confidence: 0.0,
            },
        }
    }

    /// Weighted hit count. Single words match whole tokens, multi-word
    /// keywords match as phrases.
    fn score(set: &KeywordSet, text: &str, tokens: &HashSet<String>) -> f32 {
        let hits = set
            .keywords
            .iter()
            .filter(|kw| {
                if kw.contains(' ') {
                    text.contains(*kw)
                } else {
                    tokens.contains(**kw)
                }
            })
            .count();
        hits as f32 * set.weight
    }
}
