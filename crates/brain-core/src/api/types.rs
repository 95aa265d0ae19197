use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::provider::Provider;
use crate::state::{known_agent_outputs, AgentOutputs};

/// Every endpoint except `/api/config` wraps its payload in this envelope.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ApiResponse<T> {
    Ok(T),
    Error {
        #[serde(default)]
        message: Option<String>,
    },
}

impl<T> ApiResponse<T> {
    pub fn into_result(self) -> Result<T, ApiError> {
        match self {
            ApiResponse::Ok(payload) => Ok(payload),
            ApiResponse::Error { message } => Err(ApiError::Application(
                message.unwrap_or_else(|| "unknown error".to_string()),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InitRequest {
    pub provider: Provider,
    pub model_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub message: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SelectPersonaRequest<'a> {
    pub id: &'a str,
}

/// Payload-free acknowledgement (`init`, `persona/clear`, `reset`, `memory/clear`).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatReply {
    pub response: String,
    #[serde(default, deserialize_with = "known_agent_outputs")]
    pub agent_outputs: Option<AgentOutputs>,
    /// Absent on servers that do not report persona state with each reply.
    #[serde(default)]
    pub persona_active: Option<bool>,
    #[serde(default)]
    pub persona_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PersonaLoaded {
    pub persona_name: String,
    #[serde(default)]
    pub profile: Option<serde_json::Value>,
}

/// A pre-curated persona offered by the server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PersonaSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub emoji: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct PersonaList {
    pub personas: Vec<PersonaSummary>,
}

/// `GET /api/config` is returned bare, without the envelope.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub persona_name: Option<String>,
    #[serde(default)]
    pub persona_active: bool,
}
