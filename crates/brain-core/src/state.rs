//! UI-agnostic transcript types
//!
//! Messages are rendered, never persisted. The transcript lives in memory for
//! the lifetime of one client session.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Brain,
}

/// One of the five fixed agents whose signals feed a brain response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentKey {
    Sensory,
    Memory,
    Logic,
    Emotional,
    Executive,
}

impl AgentKey {
    /// Panel order under every brain message.
    pub const ORDER: [AgentKey; 5] = [
        AgentKey::Sensory,
        AgentKey::Memory,
        AgentKey::Logic,
        AgentKey::Emotional,
        AgentKey::Executive,
    ];

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ORDER.into_iter().find(|key| key.as_str() == s)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKey::Sensory => "sensory",
            AgentKey::Memory => "memory",
            AgentKey::Logic => "logic",
            AgentKey::Emotional => "emotional",
            AgentKey::Executive => "executive",
        }
    }

    /// Short label for the indicator chips.
    pub fn chip_label(&self) -> &'static str {
        match self {
            AgentKey::Sensory => "Sensory",
            AgentKey::Memory => "Memory",
            AgentKey::Logic => "Logic",
            AgentKey::Emotional => "Emotion",
            AgentKey::Executive => "Executive",
        }
    }
}

/// A labeled sub-result from one agent, as sent by the server.
/// Missing or null fields decode as empty text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentOutput {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub role: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub output: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// `agent_outputs` keyed by the agent's wire name. Only the five known
/// agents are ever stored.
pub type AgentOutputs = HashMap<String, AgentOutput>;

/// Decode `agent_outputs`, keeping the known agents that parse and dropping
/// everything else, so extra server fields never fail the whole reply.
pub fn known_agent_outputs<'de, D>(deserializer: D) -> Result<Option<AgentOutputs>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(Value::Object(raw)) = Option::<Value>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let outputs = raw
        .into_iter()
        .filter_map(|(key, value)| {
            let agent = AgentKey::from_str(&key)?;
            match serde_json::from_value::<AgentOutput>(value) {
                Ok(output) => Some((agent.as_str().to_string(), output)),
                Err(e) => {
                    debug!(agent = agent.as_str(), error = %e, "skipping malformed agent output");
                    None
                }
            }
        })
        .collect();
    Ok(Some(outputs))
}

/// A chat message in the transcript
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
    pub agent_outputs: Option<AgentOutputs>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
            agent_outputs: None,
        }
    }

    pub fn brain(text: impl Into<String>, agent_outputs: Option<AgentOutputs>) -> Self {
        Self {
            role: ChatRole::Brain,
            text: text.into(),
            agent_outputs,
        }
    }

    /// Agent panels to render, in fixed order, skipping agents the response
    /// did not include. Empty for user messages.
    pub fn agent_panels(&self) -> Vec<(AgentKey, &AgentOutput)> {
        if self.role != ChatRole::Brain {
            return Vec::new();
        }
        let Some(outputs) = &self.agent_outputs else {
            return Vec::new();
        };
        AgentKey::ORDER
            .iter()
            .filter_map(|key| outputs.get(key.as_str()).map(|output| (*key, output)))
            .collect()
    }
}

/// A transcript line plus its local collapse state.
#[derive(Debug, Clone)]
pub struct TranscriptEntry {
    pub message: ChatMessage,
    pub signals_open: bool,
    pub open_panels: HashSet<AgentKey>,
}

impl TranscriptEntry {
    fn new(message: ChatMessage) -> Self {
        Self {
            message,
            signals_open: false,
            open_panels: HashSet::new(),
        }
    }

    pub fn signals_label(&self) -> &'static str {
        if self.signals_open {
            "🧩 Hide agent signals"
        } else {
            "🧩 Show agent signals"
        }
    }

    pub fn has_panels(&self) -> bool {
        !self.message.agent_panels().is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn push(&mut self, message: ChatMessage) {
        self.entries.push(TranscriptEntry::new(message));
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn toggle_signals(&mut self, idx: usize) {
        if let Some(entry) = self.entries.get_mut(idx) {
            if entry.has_panels() {
                entry.signals_open = !entry.signals_open;
            }
        }
    }

    pub fn toggle_panel(&mut self, idx: usize, key: AgentKey) {
        if let Some(entry) = self.entries.get_mut(idx) {
            if !entry.open_panels.remove(&key) {
                entry.open_panels.insert(key);
            }
        }
    }

    /// Index of the most recent message that carries agent panels.
    pub fn last_with_panels(&self) -> Option<usize> {
        self.entries.iter().rposition(TranscriptEntry::has_panels)
    }

    /// Previous/next entry with panels relative to `from`, used for cycling.
    pub fn neighbor_with_panels(&self, from: usize, forward: bool) -> Option<usize> {
        if forward {
            self.entries
                .iter()
                .enumerate()
                .skip(from + 1)
                .find(|(_, e)| e.has_panels())
                .map(|(i, _)| i)
        } else {
            self.entries[..from.min(self.entries.len())]
                .iter()
                .rposition(TranscriptEntry::has_panels)
        }
    }
}
