//! AI chat services the scheduler can drive.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Supported AI chat services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiType {
    #[serde(rename = "chatgpt")]
    ChatGpt,
    Claude,
    Gemini,
    Genspark,
}

impl AiType {
    /// Fixed AI order of a three-type fan-out and of log sections.
    pub const THREE_TYPE_ORDER: [AiType; 3] = [AiType::ChatGpt, AiType::Claude, AiType::Gemini];

    pub const ALL: [AiType; 4] = [AiType::ChatGpt, AiType::Claude, AiType::Gemini, AiType::Genspark];

    /// Display label, as used in sheet headers and log sections.
    pub fn label(&self) -> &'static str {
        match self {
            AiType::ChatGpt => "ChatGPT",
            AiType::Claude => "Claude",
            AiType::Gemini => "Gemini",
            AiType::Genspark => "Genspark",
        }
    }

    /// Lowercase key used in configuration tables.
    pub fn key(&self) -> &'static str {
        match self {
            AiType::ChatGpt => "chatgpt",
            AiType::Claude => "claude",
            AiType::Gemini => "gemini",
            AiType::Genspark => "genspark",
        }
    }

    /// Recognise an AI name inside free-form header text.
    ///
    /// Returns `None` when no name, or more than one name, is present.
    pub fn from_label(text: &str) -> Option<AiType> {
        let lower = text.to_lowercase();
        let mut found = Self::ALL.iter().copied().filter(|ai| match ai {
            AiType::ChatGpt => lower.contains("chatgpt") || lower.contains("gpt"),
            other => lower.contains(other.key()),
        });
        let first = found.next()?;
        match found.next() {
            Some(_) => None,
            None => Some(first),
        }
    }

    /// Position in the fixed log/fan-out order; non three-type AIs sort last.
    pub fn order_index(&self) -> usize {
        Self::THREE_TYPE_ORDER
            .iter()
            .position(|ai| ai == self)
            .unwrap_or(Self::THREE_TYPE_ORDER.len())
    }
}

impl Default for AiType {
    fn default() -> Self {
        AiType::ChatGpt
    }
}

impl fmt::Display for AiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
