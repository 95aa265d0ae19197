use serde::{Deserialize, Serialize};

/// LLM backend the brain server should run its agents on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Ollama,
    Gemini,
    OpenAI,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Ollama => "ollama",
            Provider::Gemini => "gemini",
            Provider::OpenAI => "openai",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Some(Provider::Ollama),
            "gemini" => Some(Provider::Gemini),
            "openai" => Some(Provider::OpenAI),
            _ => None,
        }
    }

    pub fn all() -> Vec<Provider> {
        vec![Provider::Ollama, Provider::Gemini, Provider::OpenAI]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Ollama => "Ollama (Local)",
            Provider::Gemini => "Gemini (Google)",
            Provider::OpenAI => "ChatGPT (OpenAI)",
        }
    }

    /// Only local models are chosen by name; hosted providers use the server default.
    pub fn takes_model_name(&self) -> bool {
        matches!(self, Provider::Ollama)
    }
}
