pub mod client;
pub mod types;

pub use client::BrainClient;
pub use types::{
    Ack, ApiResponse, ChatReply, InitRequest, PersonaLoaded, PersonaSummary, ServerConfig,
};
