pub mod api;
pub mod config;
pub mod error;
pub mod markdown;
pub mod provider;
pub mod session;
pub mod state;
pub mod upload;

// Re-export main types for convenience
pub use api::{BrainClient, ChatReply, InitRequest, PersonaLoaded, PersonaSummary, ServerConfig};
pub use config::Config;
pub use error::{ApiError, UploadError};
pub use provider::Provider;
pub use session::{Session, WizardStep};
pub use state::{AgentKey, AgentOutput, ChatMessage, ChatRole, Transcript};
pub use upload::{UploadContext, UploadStatus, UploadWidget};
