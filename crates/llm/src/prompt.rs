//! Prompt Building
//!
//! Constructs the chat messages for a tenant's customer-service reply.

use std::fmt;

use serde::{Deserialize, Serialize};
use wa_agent_core::BusinessProfile;

use crate::knowledge::SearchResult;

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Prompt builder for the customer-service assistant
#[derive(Debug, Default)]
pub struct PromptBuilder {
    messages: Vec<Message>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// System prompt for a tenant's WhatsApp assistant
    pub fn system_prompt(mut self, profile: &BusinessProfile) -> Self {
        let system = format!(
            r#"Kamu adalah asisten WhatsApp untuk {name}.

## Tugas
- Jawab pertanyaan pelanggan tentang {name} dengan ramah dan singkat
- Gunakan hanya informasi yang tersedia; jika tidak tahu, katakan dengan jujur
- Untuk memesan, arahkan pelanggan mengetik *menu* atau *pesan <nama menu>*

## Gaya
- Bahasa Indonesia santai dan sopan
- Maksimal 3-4 kalimat
- Boleh memakai format WhatsApp (*tebal*), tanpa heading markdown"#,
            name = profile.business_name,
        );

        self.messages.push(Message::system(system));
        self
    }

    /// Add retrieved knowledge as context
    pub fn with_context(mut self, results: &[SearchResult]) -> Self {
        if results.is_empty() {
            return self;
        }

        let context = results
            .iter()
            .map(|r| format!("### {}\n{}", r.title, r.content))
            .collect::<Vec<_>>()
            .join("\n\n");
        self.messages.push(Message::system(format!(
            "## Informasi Relevan\n{}\n\nGunakan informasi ini untuk menjawab jika relevan.",
            context
        )));
        self
    }

    /// Add customer name, when the gateway supplied one
    pub fn with_customer(mut self, name: Option<&str>) -> Self {
        if let Some(name) = name.filter(|n| !n.trim().is_empty()) {
            self.messages
                .push(Message::system(format!("Nama pelanggan: {}", name.trim())));
        }
        self
    }

    /// Add current user message
    pub fn user_message(mut self, message: &str) -> Self {
        self.messages.push(Message::user(message));
        self
    }

    pub fn build(self) -> Vec<Message> {
        self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> BusinessProfile {
        BusinessProfile::new("t1", "Sushi Yuk", "62811000")
    }

    #[test]
    fn test_prompt_builder() {
        let messages = PromptBuilder::new()
            .system_prompt(&profile())
            .user_message("Jam buka kapan?")
            .build();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("Sushi Yuk"));
        assert_eq!(messages[1].role, Role::User);
    }

    #[test]
    fn test_with_context_and_customer() {
        let results = vec![SearchResult {
            id: "d1".to_string(),
            title: "Jam Buka".to_string(),
            content: "Setiap hari 10.00 - 22.00".to_string(),
            score: 1.0,
        }];
        let messages = PromptBuilder::new()
            .system_prompt(&profile())
            .with_context(&results)
            .with_customer(Some("Ria"))
            .user_message("Jam buka kapan?")
            .build();

        assert_eq!(messages.len(), 4);
        assert!(messages[1].content.contains("10.00 - 22.00"));
        assert!(messages[2].content.contains("Ria"));
    }

    #[test]
    fn test_empty_context_and_blank_name_are_skipped() {
        let messages = PromptBuilder::new()
            .system_prompt(&profile())
            .with_context(&[])
            .with_customer(Some("  "))
            .build();
        assert_eq!(messages.len(), 1);
    }
}
