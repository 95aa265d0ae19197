//! Persona document upload, shared by the setup step and the
//! "change persona" overlay.

use std::path::{Path, PathBuf};

use crate::api::PersonaLoaded;
use crate::error::{ApiError, UploadError};

pub const ACCEPTED_EXTENSIONS: [&str; 2] = ["txt", "pdf"];

/// Check the extension client-side; no request is made for rejected files.
pub fn validate_persona_file(path: &Path) -> Result<(), UploadError> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if ACCEPTED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(())
    } else {
        Err(UploadError::UnsupportedExtension(ext))
    }
}

/// Normalize a typed or pasted path. Terminals quote dropped files and
/// sometimes hand over `file://` URLs.
pub fn parse_dropped_path(raw: &str) -> Option<PathBuf> {
    let trimmed = raw.trim().trim_matches(|c| c == '\'' || c == '"');
    let trimmed = trimmed.strip_prefix("file://").unwrap_or(trimmed);
    let unescaped = trimmed.replace("\\ ", " ");
    if unescaped.is_empty() {
        None
    } else {
        Some(PathBuf::from(unescaped))
    }
}

/// Where the widget is mounted; only the status wording differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadContext {
    Setup,
    Overlay,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UploadStatus {
    #[default]
    Idle,
    Loading(String),
    Success(String),
    Error(String),
}

impl UploadStatus {
    pub fn text(&self) -> Option<String> {
        match self {
            UploadStatus::Idle => None,
            UploadStatus::Loading(msg) => Some(format!("📖 {msg}")),
            UploadStatus::Success(msg) => Some(format!("✅ {msg}")),
            UploadStatus::Error(msg) => Some(format!("❌ {msg}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadWidget {
    pub context: UploadContext,
    pub status: UploadStatus,
    /// Path field contents (typed, pasted, or dropped).
    pub path_input: String,
    pub cursor: usize,
}

impl UploadWidget {
    pub fn new(context: UploadContext) -> Self {
        Self {
            context,
            status: UploadStatus::Idle,
            path_input: String::new(),
            cursor: 0,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.status, UploadStatus::Loading(_))
    }

    /// Replace the path field, as a drop or paste does.
    pub fn set_path(&mut self, raw: &str) {
        self.path_input = raw.trim().to_string();
        self.cursor = self.path_input.chars().count();
    }

    /// Validate `raw` and return the file to upload, or record the rejection.
    pub fn begin(&mut self, raw: &str) -> Option<PathBuf> {
        if self.is_loading() {
            return None;
        }
        let path = parse_dropped_path(raw)?;
        if let Err(e) = validate_persona_file(&path) {
            self.status = UploadStatus::Error(e.to_string());
            return None;
        }
        let msg = match self.context {
            UploadContext::Setup => "Loading and analyzing document...",
            UploadContext::Overlay => "Analyzing document...",
        };
        self.status = UploadStatus::Loading(msg.to_string());
        Some(path)
    }

    /// Mark a preset persona request in flight.
    pub fn begin_preset(&mut self, name: &str) -> bool {
        if self.is_loading() {
            return false;
        }
        self.status = UploadStatus::Loading(format!("Loading {name}..."));
        true
    }

    /// Record the outcome; returns the persona name on success.
    pub fn finish(&mut self, result: Result<PersonaLoaded, ApiError>) -> Option<String> {
        match result {
            Ok(loaded) => {
                let msg = match self.context {
                    UploadContext::Setup => format!("Persona loaded: {}", loaded.persona_name),
                    UploadContext::Overlay => {
                        format!("Now responding as: {}", loaded.persona_name)
                    }
                };
                self.status = UploadStatus::Success(msg);
                Some(loaded.persona_name)
            }
            Err(ApiError::Application(msg)) => {
                self.status = UploadStatus::Error(msg);
                None
            }
            Err(e) => {
                self.status = UploadStatus::Error(match self.context {
                    UploadContext::Setup => format!("Upload failed: {e}"),
                    UploadContext::Overlay => e.to_string(),
                });
                None
            }
        }
    }
}
