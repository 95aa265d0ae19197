//! The client's view-model.
//!
//! `Session` owns all mutable UI state: the setup wizard, the busy flag that
//! serializes chat requests, the transcript and the sidebar. Front ends call
//! the `begin_*` methods to learn what request to issue, run it however they
//! like, and feed the outcome back through the matching `finish_*` method.
//! Nothing here touches the network or a terminal.

use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::api::{Ack, ChatReply, InitRequest, PersonaLoaded, PersonaSummary, ServerConfig};
use crate::error::ApiError;
use crate::provider::Provider;
use crate::state::{AgentKey, ChatMessage, Transcript};
use crate::upload::{UploadContext, UploadStatus, UploadWidget};

pub const PERSONA_STEP_DELAY: Duration = Duration::from_millis(600);
pub const ENTER_CHAT_DELAY: Duration = Duration::from_millis(1000);
pub const OVERLAY_CLOSE_DELAY: Duration = Duration::from_millis(1000);
pub const CHIP_STAGGER: Duration = Duration::from_millis(200);

pub const DEFAULT_TITLE: &str = "🧠 Brain System";
pub const THINKING_TEXT: &str = "Processing through 5 brain agents...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    Provider,
    Loading,
    Persona,
    Chat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    ShowPersona,
    EnterChat,
    CloseOverlay,
}

/// Staggered reveal of the agent chips while a chat request is in flight.
#[derive(Debug, Clone, Default)]
pub struct AgentIndicator {
    started: Option<Instant>,
}

impl AgentIndicator {
    pub fn start(&mut self, now: Instant) {
        self.started = Some(now);
    }

    pub fn stop(&mut self) {
        self.started = None;
    }

    pub fn is_running(&self) -> bool {
        self.started.is_some()
    }

    /// Chip `i` lights up `i * CHIP_STAGGER` after the start.
    pub fn active_count(&self, now: Instant) -> usize {
        let Some(started) = self.started else {
            return 0;
        };
        let elapsed = now.saturating_duration_since(started);
        let steps = (elapsed.as_millis() / CHIP_STAGGER.as_millis()) as usize;
        (steps + 1).min(AgentKey::ORDER.len())
    }

    pub fn is_active(&self, key: AgentKey, now: Instant) -> bool {
        AgentKey::ORDER
            .iter()
            .position(|k| *k == key)
            .is_some_and(|i| i < self.active_count(now))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sidebar {
    pub provider: Option<Provider>,
    pub model: Option<String>,
    pub persona: Option<String>,
}

impl Sidebar {
    pub fn provider_text(&self) -> &str {
        self.provider.map(|p| p.as_str()).unwrap_or("-")
    }

    pub fn model_text(&self) -> &str {
        self.model.as_deref().unwrap_or("default")
    }

    pub fn persona_text(&self) -> &str {
        self.persona.as_deref().unwrap_or("None")
    }

    pub fn badge_visible(&self) -> bool {
        self.persona.is_some()
    }

    pub fn chat_title(&self) -> String {
        match &self.persona {
            Some(name) => format!("🎭 {name}"),
            None => DEFAULT_TITLE.to_string(),
        }
    }
}

pub struct Session {
    pub step: WizardStep,
    pub selected_provider: Provider,
    /// Contents of the model-name field.
    pub model_name: String,
    pub loading_text: String,
    /// Blocking message shown over the wizard until dismissed.
    pub alert: Option<String>,
    /// Transient status line in the chat view.
    pub notice: Option<String>,

    pub transcript: Transcript,
    pub thinking: bool,
    pub agents: AgentIndicator,
    busy: bool,

    pub sidebar: Sidebar,
    pub setup_upload: UploadWidget,
    pub overlay: Option<UploadWidget>,
    pub presets: Vec<PersonaSummary>,

    /// Provider and model came from the local config.
    saved_choice: bool,
    pending: Vec<(Instant, Transition)>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            step: WizardStep::Provider,
            selected_provider: Provider::default(),
            model_name: String::new(),
            loading_text: String::new(),
            alert: None,
            notice: None,
            transcript: Transcript::default(),
            thinking: false,
            agents: AgentIndicator::default(),
            busy: false,
            sidebar: Sidebar::default(),
            setup_upload: UploadWidget::new(UploadContext::Setup),
            overlay: None,
            presets: Vec::new(),
            saved_choice: false,
            pending: Vec::new(),
        }
    }

    // Setup wizard

    pub fn select_provider(&mut self, provider: Provider) {
        self.selected_provider = provider;
    }

    pub fn model_field_visible(&self) -> bool {
        self.selected_provider.takes_model_name()
    }

    /// Pre-fill the wizard with the last choice saved on this machine.
    pub fn restore_saved_choice(&mut self, provider: Provider, model_name: Option<&str>) {
        self.selected_provider = provider;
        if let Some(model) = model_name {
            self.model_name = model.to_string();
        }
        self.saved_choice = true;
    }

    /// Pre-fill the wizard from the server's current configuration. A saved
    /// local choice wins over the server's defaults; it only yields to a
    /// server whose brain is already serving a persona.
    pub fn apply_server_config(&mut self, config: &ServerConfig) {
        if self.step != WizardStep::Provider {
            return;
        }
        if self.saved_choice && !config.persona_active {
            debug!("keeping saved provider over server defaults");
            return;
        }
        if let Some(provider) = config.provider.as_deref().and_then(Provider::from_str) {
            self.selected_provider = provider;
        }
        if let Some(model) = config.model_name.as_deref() {
            if self.model_name.is_empty() {
                self.model_name = model.to_string();
            }
        }
    }

    fn requested_model(&self) -> Option<String> {
        let trimmed = self.model_name.trim();
        if trimmed.is_empty() || !self.model_field_visible() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    /// Switch to the loading step and return the init request to send.
    pub fn begin_init(&mut self) -> Option<InitRequest> {
        if self.step != WizardStep::Provider {
            return None;
        }
        self.alert = None;
        self.step = WizardStep::Loading;
        self.loading_text = "Initializing neural pathways...".to_string();
        info!(provider = self.selected_provider.as_str(), "initializing brain");
        Some(InitRequest {
            provider: self.selected_provider,
            model_name: self.requested_model(),
        })
    }

    pub fn finish_init(&mut self, result: Result<Ack, ApiError>, now: Instant) {
        match result {
            Ok(_) => {
                self.sidebar.provider = Some(self.selected_provider);
                self.sidebar.model = self.requested_model();
                self.sidebar.persona = None;
                self.loading_text = "Brain initialized! Loading persona options...".to_string();
                self.schedule(now + PERSONA_STEP_DELAY, Transition::ShowPersona);
            }
            Err(e) => {
                warn!(error = %e, "brain initialization failed");
                self.alert = Some(match e {
                    ApiError::Application(msg) => format!("Error: {msg}"),
                    other => format!("Failed to connect to server: {other}"),
                });
                self.step = WizardStep::Provider;
            }
        }
    }

    pub fn skip_persona(&mut self) {
        if self.step == WizardStep::Persona {
            self.enter_chat();
        }
    }

    fn enter_chat(&mut self) {
        info!("entering chat");
        self.step = WizardStep::Chat;
    }

    pub fn dismiss_alert(&mut self) {
        self.alert = None;
    }

    // Persona upload

    pub fn open_overlay(&mut self) {
        if self.step == WizardStep::Chat && self.overlay.is_none() {
            self.overlay = Some(UploadWidget::new(UploadContext::Overlay));
        }
    }

    pub fn close_overlay(&mut self) {
        self.overlay = None;
        self.pending.retain(|(_, t)| *t != Transition::CloseOverlay);
    }

    /// The upload widget currently on screen, if any.
    pub fn active_upload(&self) -> Option<&UploadWidget> {
        match (&self.overlay, self.step) {
            (Some(overlay), _) => Some(overlay),
            (None, WizardStep::Persona) => Some(&self.setup_upload),
            _ => None,
        }
    }

    pub fn active_upload_mut(&mut self) -> Option<&mut UploadWidget> {
        match (&mut self.overlay, self.step) {
            (Some(overlay), _) => Some(overlay),
            (None, WizardStep::Persona) => Some(&mut self.setup_upload),
            _ => None,
        }
    }

    /// Validate the path in the active widget and return the file to upload.
    pub fn begin_upload(&mut self, raw: &str) -> Option<(UploadContext, PathBuf)> {
        let widget = self.active_upload_mut()?;
        let context = widget.context;
        let path = widget.begin(raw)?;
        info!(path = %path.display(), "uploading persona document");
        Some((context, path))
    }

    pub fn begin_preset(&mut self, idx: usize) -> Option<(UploadContext, String)> {
        let preset = self.presets.get(idx)?.clone();
        let widget = self.active_upload_mut()?;
        if !widget.begin_preset(&preset.name) {
            return None;
        }
        info!(id = %preset.id, "selecting preset persona");
        Some((widget.context, preset.id))
    }

    pub fn finish_presets(&mut self, result: Result<Vec<PersonaSummary>, ApiError>) {
        match result {
            Ok(presets) => {
                debug!(count = presets.len(), "preset personas loaded");
                self.presets = presets;
            }
            Err(e) => warn!(error = %e, "could not list preset personas"),
        }
    }

    /// Apply an upload or preset outcome to the widget it was issued from.
    pub fn finish_upload(
        &mut self,
        context: UploadContext,
        result: Result<PersonaLoaded, ApiError>,
        now: Instant,
    ) {
        let widget = match context {
            UploadContext::Setup => Some(&mut self.setup_upload),
            UploadContext::Overlay => self.overlay.as_mut(),
        };
        let name = match widget {
            Some(widget) => widget.finish(result),
            // Overlay was cancelled mid-flight; the server still switched persona.
            None => result.ok().map(|loaded| loaded.persona_name),
        };
        let Some(name) = name else {
            return;
        };
        info!(persona = %name, "persona active");
        self.sidebar.persona = Some(name);
        match context {
            UploadContext::Setup => self.schedule(now + ENTER_CHAT_DELAY, Transition::EnterChat),
            UploadContext::Overlay => {
                if self.overlay.is_some() {
                    self.schedule(now + OVERLAY_CLOSE_DELAY, Transition::CloseOverlay);
                }
            }
        }
    }

    pub fn finish_clear_persona(&mut self, result: Result<Ack, ApiError>) {
        match result {
            Ok(_) => {
                self.sidebar.persona = None;
                self.notice = Some("Persona cleared".to_string());
            }
            Err(e) => warn!(error = %e, "clearing persona failed"),
        }
    }

    // Chat loop

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn can_send(&self, input: &str) -> bool {
        self.step == WizardStep::Chat && !self.busy && !input.trim().is_empty()
    }

    pub fn show_welcome(&self) -> bool {
        self.transcript.is_empty() && !self.thinking
    }

    /// Take the message out of `input` and mark the session busy. Returns
    /// `None`, leaving `input` untouched, while a request is outstanding.
    pub fn begin_send(&mut self, input: &mut String, now: Instant) -> Option<String> {
        if !self.can_send(input) {
            return None;
        }
        let msg = input.trim().to_string();
        input.clear();

        self.busy = true;
        self.notice = None;
        self.transcript.push(ChatMessage::user(msg.clone()));
        self.thinking = true;
        self.agents.start(now);
        debug!(len = msg.len(), "sending chat message");
        Some(msg)
    }

    pub fn finish_send(&mut self, result: Result<ChatReply, ApiError>) {
        self.thinking = false;
        self.agents.stop();
        let message = match result {
            Ok(reply) => {
                if let Some(active) = reply.persona_active {
                    self.sidebar.persona = if active { reply.persona_name } else { None };
                }
                ChatMessage::brain(reply.response, reply.agent_outputs)
            }
            Err(ApiError::Application(msg)) => ChatMessage::brain(format!("⚠️ Error: {msg}"), None),
            Err(e) => {
                warn!(error = %e, "chat request failed");
                ChatMessage::brain(format!("⚠️ Connection error: {e}"), None)
            }
        };
        self.transcript.push(message);
        self.busy = false;
    }

    // Server maintenance

    pub fn finish_clear_memory(&mut self, result: Result<Ack, ApiError>) {
        self.notice = Some(match result {
            Ok(ack) => ack
                .message
                .unwrap_or_else(|| "Conversation memory cleared".to_string()),
            Err(e) => format!("Could not clear memory: {e}"),
        });
    }

    /// After a successful reset the session starts over at provider selection.
    pub fn finish_reset(&mut self, result: Result<Ack, ApiError>) {
        match result {
            Ok(_) => {
                info!("brain reset");
                let provider = self.selected_provider;
                let model = std::mem::take(&mut self.model_name);
                let saved_choice = self.saved_choice;
                *self = Session::new();
                self.selected_provider = provider;
                self.model_name = model;
                self.saved_choice = saved_choice;
            }
            Err(e) => self.notice = Some(format!("Reset failed: {e}")),
        }
    }

    // Timers

    fn schedule(&mut self, at: Instant, transition: Transition) {
        self.pending.push((at, transition));
    }

    /// Apply any delayed transitions that are due.
    pub fn tick(&mut self, now: Instant) {
        let (due, later): (Vec<_>, Vec<_>) =
            self.pending.drain(..).partition(|(at, _)| *at <= now);
        self.pending = later;
        for (_, transition) in due {
            match transition {
                Transition::ShowPersona if self.step == WizardStep::Loading => {
                    self.step = WizardStep::Persona;
                    self.setup_upload = UploadWidget::new(UploadContext::Setup);
                }
                Transition::EnterChat if self.step == WizardStep::Persona => self.enter_chat(),
                Transition::CloseOverlay => self.overlay = None,
                _ => {}
            }
        }
    }

    pub fn upload_status(&self) -> Option<&UploadStatus> {
        self.active_upload().map(|w| &w.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{AgentOutput, AgentOutputs, ChatRole};

    fn chat_session() -> Session {
        let mut session = Session::new();
        session.step = WizardStep::Chat;
        session
    }

    fn reply(text: &str, keys: &[&str]) -> ChatReply {
        let outputs: AgentOutputs = keys
            .iter()
            .map(|k| {
                (
                    k.to_string(),
                    AgentOutput {
                        name: format!("{k} agent"),
                        role: "role".into(),
                        output: format!("{k} output"),
                    },
                )
            })
            .collect();
        ChatReply {
            response: text.to_string(),
            agent_outputs: if keys.is_empty() { None } else { Some(outputs) },
            persona_active: None,
            persona_name: None,
        }
    }

    #[test]
    fn test_model_field_tracks_provider() {
        let mut session = Session::new();
        assert!(session.model_field_visible());
        session.select_provider(Provider::OpenAI);
        assert!(!session.model_field_visible());
        session.select_provider(Provider::Ollama);
        assert!(session.model_field_visible());
    }

    #[test]
    fn test_init_request_trims_model_and_drops_blank() {
        let mut session = Session::new();
        session.model_name = "  mistral ".into();
        let req = session.begin_init().expect("request");
        assert_eq!(req.model_name.as_deref(), Some("mistral"));
        assert_eq!(session.step, WizardStep::Loading);

        let mut session = Session::new();
        session.model_name = "   ".into();
        assert_eq!(session.begin_init().unwrap().model_name, None);
    }

    #[test]
    fn test_hosted_provider_sends_no_model() {
        let mut session = Session::new();
        session.model_name = "mistral".into();
        session.select_provider(Provider::Gemini);
        let req = session.begin_init().unwrap();
        assert_eq!(req.provider, Provider::Gemini);
        assert_eq!(req.model_name, None);
    }

    #[test]
    fn test_init_success_shows_persona_after_delay() {
        let start = Instant::now();
        let mut session = Session::new();
        session.begin_init();
        session.finish_init(Ok(Ack::default()), start);

        assert_eq!(session.sidebar.provider, Some(Provider::Ollama));
        assert_eq!(session.sidebar.model_text(), "default");
        session.tick(start + Duration::from_millis(100));
        assert_eq!(session.step, WizardStep::Loading);
        session.tick(start + PERSONA_STEP_DELAY);
        assert_eq!(session.step, WizardStep::Persona);
    }

    #[test]
    fn test_init_failure_returns_to_provider_step() {
        let start = Instant::now();
        let mut session = Session::new();
        session.begin_init();
        session.finish_init(Err(ApiError::Application("bad key".into())), start);

        assert_eq!(session.step, WizardStep::Provider);
        assert_eq!(session.alert.as_deref(), Some("Error: bad key"));
        session.tick(start + Duration::from_secs(5));
        assert_eq!(session.step, WizardStep::Provider);
    }

    #[test]
    fn test_skip_persona_enters_chat() {
        let mut session = Session::new();
        session.step = WizardStep::Persona;
        session.skip_persona();
        assert_eq!(session.step, WizardStep::Chat);
    }

    #[test]
    fn test_unsupported_upload_issues_nothing() {
        let mut session = Session::new();
        session.step = WizardStep::Persona;
        assert!(session.begin_upload("/tmp/photo.png").is_none());
        assert!(matches!(session.upload_status(), Some(UploadStatus::Error(_))));
        assert_eq!(session.step, WizardStep::Persona);
    }

    #[test]
    fn test_setup_upload_success_updates_sidebar_then_enters_chat() {
        let start = Instant::now();
        let mut session = Session::new();
        session.step = WizardStep::Persona;
        let (context, _) = session.begin_upload("/tmp/ada.txt").expect("accepted");
        session.finish_upload(
            context,
            Ok(PersonaLoaded {
                persona_name: "Ada Lovelace".into(),
                profile: None,
            }),
            start,
        );

        assert!(session.sidebar.badge_visible());
        assert_eq!(session.sidebar.chat_title(), "🎭 Ada Lovelace");
        session.tick(start + ENTER_CHAT_DELAY);
        assert_eq!(session.step, WizardStep::Chat);
    }

    #[test]
    fn test_overlay_upload_closes_overlay() {
        let start = Instant::now();
        let mut session = chat_session();
        session.open_overlay();
        let (context, _) = session.begin_upload("memoir.PDF").expect("accepted");
        assert_eq!(context, UploadContext::Overlay);
        session.finish_upload(
            context,
            Ok(PersonaLoaded {
                persona_name: "Tesla".into(),
                profile: None,
            }),
            start,
        );
        assert!(session.overlay.is_some());
        session.tick(start + OVERLAY_CLOSE_DELAY);
        assert!(session.overlay.is_none());
        assert_eq!(session.sidebar.persona_text(), "Tesla");
    }

    #[test]
    fn test_clear_persona_resets_title() {
        let mut session = chat_session();
        session.sidebar.persona = Some("Tesla".into());
        session.finish_clear_persona(Ok(Ack::default()));
        assert_eq!(session.sidebar.persona_text(), "None");
        assert!(!session.sidebar.badge_visible());
        assert_eq!(session.sidebar.chat_title(), DEFAULT_TITLE);
    }

    #[test]
    fn test_send_is_noop_while_busy() {
        let now = Instant::now();
        let mut session = chat_session();
        let mut input = "  hello brain ".to_string();
        assert_eq!(session.begin_send(&mut input, now).as_deref(), Some("hello brain"));
        assert!(input.is_empty());
        assert!(session.is_busy());

        let mut second = "again".to_string();
        assert_eq!(session.begin_send(&mut second, now), None);
        assert_eq!(second, "again");
        assert_eq!(session.transcript.len(), 1);

        session.finish_send(Ok(reply("hi", &[])));
        assert!(!session.is_busy());
        assert!(session.begin_send(&mut second, now).is_some());
    }

    #[test]
    fn test_blank_input_is_not_sent() {
        let mut session = chat_session();
        let mut input = "   ".to_string();
        assert_eq!(session.begin_send(&mut input, Instant::now()), None);
        assert!(session.show_welcome());
    }

    #[test]
    fn test_reply_panels_in_fixed_order() {
        let mut session = chat_session();
        let mut input = "q".to_string();
        session.begin_send(&mut input, Instant::now());
        session.finish_send(Ok(reply("a", &["executive", "memory", "sensory"])));

        let entry = &session.transcript.entries()[1];
        assert_eq!(entry.message.role, ChatRole::Brain);
        let keys: Vec<AgentKey> = entry.message.agent_panels().iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec![AgentKey::Sensory, AgentKey::Memory, AgentKey::Executive]);
        assert!(!session.thinking);
        assert!(!session.agents.is_running());
    }

    #[test]
    fn test_errors_render_inline() {
        let mut session = chat_session();
        let mut input = "q".to_string();
        session.begin_send(&mut input, Instant::now());
        session.finish_send(Err(ApiError::Application("Empty message".into())));
        assert_eq!(session.transcript.entries()[1].message.text, "⚠️ Error: Empty message");
        assert!(!session.is_busy());
    }

    #[test]
    fn test_agent_chips_reveal_staggered() {
        let start = Instant::now();
        let mut indicator = AgentIndicator::default();
        assert_eq!(indicator.active_count(start), 0);
        indicator.start(start);
        assert_eq!(indicator.active_count(start), 1);
        assert_eq!(indicator.active_count(start + Duration::from_millis(450)), 3);
        assert!(indicator.is_active(AgentKey::Logic, start + Duration::from_millis(450)));
        assert!(!indicator.is_active(AgentKey::Emotional, start + Duration::from_millis(450)));
        assert_eq!(indicator.active_count(start + Duration::from_secs(10)), 5);
        indicator.stop();
        assert_eq!(indicator.active_count(start + Duration::from_secs(10)), 0);
    }

    #[test]
    fn test_reset_returns_to_provider_and_keeps_choice() {
        let mut session = chat_session();
        session.selected_provider = Provider::Gemini;
        session.transcript.push(ChatMessage::user("hi"));
        session.sidebar.persona = Some("Tesla".into());
        session.finish_reset(Ok(Ack::default()));

        assert_eq!(session.step, WizardStep::Provider);
        assert!(session.transcript.is_empty());
        assert_eq!(session.sidebar, Sidebar::default());
        assert_eq!(session.selected_provider, Provider::Gemini);
    }

    #[test]
    fn test_server_config_prefills_wizard() {
        let mut session = Session::new();
        session.apply_server_config(&ServerConfig {
            provider: Some("openai".into()),
            model_name: Some("gpt-4o".into()),
            ..ServerConfig::default()
        });
        assert_eq!(session.selected_provider, Provider::OpenAI);
        assert_eq!(session.model_name, "gpt-4o");
    }

    fn io_error() -> ApiError {
        ApiError::Io {
            path: "/tmp/gone.txt".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        }
    }

    #[test]
    fn test_init_transport_failure_alert() {
        let now = Instant::now();
        let mut session = Session::new();
        session.begin_init();
        session.finish_init(Err(io_error()), now);

        assert_eq!(session.step, WizardStep::Provider);
        let alert = session.alert.as_deref().unwrap();
        assert!(alert.starts_with("Failed to connect to server: "), "{alert}");
        assert!(alert.contains("no such file"));
        session.tick(now + Duration::from_secs(5));
        assert_eq!(session.step, WizardStep::Provider);
    }

    #[test]
    fn test_chat_transport_failure_renders_connection_error() {
        let mut session = chat_session();
        let mut input = "q".to_string();
        session.begin_send(&mut input, Instant::now());
        session.finish_send(Err(io_error()));

        let text = &session.transcript.entries()[1].message.text;
        assert!(text.starts_with("⚠️ Connection error: "), "{text}");
        assert!(!session.is_busy());
        assert!(!session.thinking);
    }

    #[test]
    fn test_reply_syncs_persona_from_server() {
        let mut session = chat_session();
        session.sidebar.persona = Some("Tesla".into());

        let mut input = "q".to_string();
        session.begin_send(&mut input, Instant::now());
        session.finish_send(Ok(reply("a", &[])));
        assert_eq!(session.sidebar.persona.as_deref(), Some("Tesla"));

        let mut input = "q".to_string();
        session.begin_send(&mut input, Instant::now());
        let mut cleared = reply("b", &[]);
        cleared.persona_active = Some(false);
        session.finish_send(Ok(cleared));
        assert_eq!(session.sidebar.persona, None);
        assert_eq!(session.sidebar.chat_title(), DEFAULT_TITLE);

        let mut input = "q".to_string();
        session.begin_send(&mut input, Instant::now());
        let mut active = reply("c", &[]);
        active.persona_active = Some(true);
        active.persona_name = Some("Ada".into());
        session.finish_send(Ok(active));
        assert_eq!(session.sidebar.persona.as_deref(), Some("Ada"));
    }

    #[test]
    fn test_saved_choice_beats_server_defaults() {
        let mut session = Session::new();
        session.restore_saved_choice(Provider::Gemini, None);
        session.apply_server_config(&ServerConfig {
            provider: Some("ollama".into()),
            model_name: Some("mistral".into()),
            ..ServerConfig::default()
        });
        assert_eq!(session.selected_provider, Provider::Gemini);
        assert_eq!(session.model_name, "");
    }

    #[test]
    fn test_active_server_brain_beats_saved_choice() {
        let mut session = Session::new();
        session.restore_saved_choice(Provider::Gemini, None);
        session.apply_server_config(&ServerConfig {
            provider: Some("openai".into()),
            persona_active: true,
            persona_name: Some("Tesla".into()),
            ..ServerConfig::default()
        });
        assert_eq!(session.selected_provider, Provider::OpenAI);
    }

    #[test]
    fn test_saved_choice_survives_reset() {
        let mut session = chat_session();
        session.restore_saved_choice(Provider::OpenAI, Some("gpt-4o"));
        session.finish_reset(Ok(Ack::default()));
        session.apply_server_config(&ServerConfig {
            provider: Some("ollama".into()),
            ..ServerConfig::default()
        });
        assert_eq!(session.selected_provider, Provider::OpenAI);
        assert_eq!(session.model_name, "gpt-4o");
    }
}
