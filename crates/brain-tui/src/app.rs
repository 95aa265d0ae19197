use std::time::Instant;
use ratatui::widgets::ListState;
use tokio::task::JoinHandle;
use tracing::warn;
use brain_core::api::{Ack, ServerConfig};
use brain_core::{
    ApiError, BrainClient, ChatReply, Config, PersonaLoaded, PersonaSummary, Provider, Session,
    UploadContext, WizardStep,
};

type Task<T> = Option<JoinHandle<Result<T, ApiError>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// Which control of the provider step has the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupFocus {
    Providers,
    ModelName,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub session: Session,
    pub client: BrainClient,
    pub input_mode: InputMode,

    // Provider step
    pub provider_state: ListState,
    pub setup_focus: SetupFocus,
    pub model_cursor: usize,

    // Chat input
    pub chat_input: String,
    pub chat_cursor: usize,

    // Transcript view
    pub chat_scroll: u16,
    pub follow_bottom: bool,
    pub selected_message: Option<usize>,

    // Preset persona picker
    pub show_preset_picker: bool,
    pub preset_state: ListState,

    // Animation state
    pub animation_frame: u8,

    // In-flight requests, polled on every tick
    pub init_task: Task<Ack>,
    pub chat_task: Task<ChatReply>,
    pub upload_task: Option<(UploadContext, JoinHandle<Result<PersonaLoaded, ApiError>>)>,
    pub presets_task: Task<Vec<PersonaSummary>>,
    pub config_task: Task<ServerConfig>,
    pub clear_persona_task: Task<Ack>,
    pub clear_memory_task: Task<Ack>,
    pub reset_task: Task<Ack>,
}

impl App {
    pub fn new(config: &Config, server_url: &str) -> Self {
        let client = BrainClient::new(server_url);

        let mut session = Session::new();
        if let Some(provider) = config.saved_provider() {
            session.restore_saved_choice(provider, config.model_name.as_deref());
        }

        let mut provider_state = ListState::default();
        provider_state.select(
            Provider::all()
                .iter()
                .position(|p| *p == session.selected_provider),
        );

        let config_client = client.clone();
        let config_task = Some(tokio::spawn(async move { config_client.config().await }));
        let presets_client = client.clone();
        let presets_task = Some(tokio::spawn(async move { presets_client.list_personas().await }));

        Self {
            should_quit: false,
            model_cursor: session.model_name.chars().count(),
            session,
            client,
            input_mode: InputMode::Normal,

            provider_state,
            setup_focus: SetupFocus::Providers,

            chat_input: String::new(),
            chat_cursor: 0,

            chat_scroll: 0,
            follow_bottom: true,
            selected_message: None,

            show_preset_picker: false,
            preset_state: ListState::default(),

            animation_frame: 0,

            init_task: None,
            chat_task: None,
            upload_task: None,
            presets_task,
            config_task,
            clear_persona_task: None,
            clear_memory_task: None,
            reset_task: None,
        }
    }

    pub fn tick(&mut self, now: Instant) {
        self.animation_frame = (self.animation_frame + 1) % 3;
        let step_before = self.session.step;
        self.session.tick(now);
        if step_before != WizardStep::Chat && self.session.step == WizardStep::Chat {
            // Focus the message box on entering chat
            self.input_mode = InputMode::Editing;
        }
    }

    // Provider step

    pub fn provider_nav(&mut self, forward: bool) {
        let providers = Provider::all();
        let i = self.provider_state.selected().unwrap_or(0);
        let next = if forward {
            (i + 1).min(providers.len() - 1)
        } else {
            i.saturating_sub(1)
        };
        self.provider_state.select(Some(next));
        self.session.select_provider(providers[next]);
        if !self.session.model_field_visible() {
            self.setup_focus = SetupFocus::Providers;
        }
    }

    pub fn start_init(&mut self) {
        if self.init_task.is_some() {
            return;
        }
        if let Some(request) = self.session.begin_init() {
            let client = self.client.clone();
            self.init_task = Some(tokio::spawn(async move { client.init(&request).await }));
        }
    }

    // Persona upload

    pub fn start_upload(&mut self, raw: &str) {
        if self.upload_task.is_some() {
            return;
        }
        if let Some((context, path)) = self.session.begin_upload(raw) {
            let client = self.client.clone();
            let handle = tokio::spawn(async move { client.upload_persona(&path).await });
            self.upload_task = Some((context, handle));
        }
    }

    pub fn start_preset(&mut self) {
        if self.upload_task.is_some() {
            return;
        }
        let Some(idx) = self.preset_state.selected() else {
            return;
        };
        if let Some((context, id)) = self.session.begin_preset(idx) {
            self.show_preset_picker = false;
            let client = self.client.clone();
            let handle = tokio::spawn(async move { client.select_persona(&id).await });
            self.upload_task = Some((context, handle));
        }
    }

    pub fn open_preset_picker(&mut self) {
        if self.session.presets.is_empty() {
            return;
        }
        self.show_preset_picker = true;
        if self.preset_state.selected().is_none() {
            self.preset_state.select(Some(0));
        }
    }

    pub fn preset_nav(&mut self, forward: bool) {
        let len = self.session.presets.len();
        if len == 0 {
            return;
        }
        let i = self.preset_state.selected().unwrap_or(0);
        let next = if forward { (i + 1).min(len - 1) } else { i.saturating_sub(1) };
        self.preset_state.select(Some(next));
    }

    pub fn clear_persona(&mut self) {
        if self.clear_persona_task.is_none() {
            let client = self.client.clone();
            self.clear_persona_task = Some(tokio::spawn(async move { client.clear_persona().await }));
        }
    }

    // Chat

    pub fn send_message(&mut self) {
        if self.chat_task.is_some() {
            return;
        }
        let Some(message) = self.session.begin_send(&mut self.chat_input, Instant::now()) else {
            return;
        };
        self.chat_cursor = 0;
        self.follow_bottom = true;
        let client = self.client.clone();
        self.chat_task = Some(tokio::spawn(async move { client.chat(&message).await }));
    }

    pub fn clear_memory(&mut self) {
        if self.clear_memory_task.is_none() {
            let client = self.client.clone();
            self.clear_memory_task = Some(tokio::spawn(async move { client.clear_memory().await }));
        }
    }

    pub fn reset(&mut self) {
        if self.reset_task.is_none() && self.chat_task.is_none() {
            let client = self.client.clone();
            self.reset_task = Some(tokio::spawn(async move { client.reset().await }));
        }
    }

    /// Move the agent-signals cursor between brain messages that carry panels.
    pub fn select_message(&mut self, forward: bool) {
        let transcript = &self.session.transcript;
        self.selected_message = match self.selected_message {
            None => transcript.last_with_panels(),
            Some(i) => transcript.neighbor_with_panels(i, forward).or(Some(i)),
        };
        self.follow_bottom = false;
    }

    pub fn toggle_signals(&mut self) {
        if self.selected_message.is_none() {
            self.selected_message = self.session.transcript.last_with_panels();
        }
        if let Some(i) = self.selected_message {
            self.session.transcript.toggle_signals(i);
        }
    }

    pub fn toggle_panel(&mut self, n: usize) {
        let Some(i) = self.selected_message.or_else(|| self.session.transcript.last_with_panels()) else {
            return;
        };
        let Some(entry) = self.session.transcript.entries().get(i) else {
            return;
        };
        if !entry.signals_open {
            return;
        }
        let panels = entry.message.agent_panels();
        if let Some((key, _)) = panels.get(n) {
            let key = *key;
            self.session.transcript.toggle_panel(i, key);
        }
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.follow_bottom = false;
        self.chat_scroll = self.chat_scroll.saturating_add(lines);
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.follow_bottom = false;
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    /// Collect finished requests and apply them to the session.
    pub async fn poll_tasks(&mut self) -> anyhow::Result<()> {
        let now = Instant::now();

        if let Some(result) = take_finished(&mut self.config_task).await? {
            match result {
                Ok(config) => self.session.apply_server_config(&config),
                Err(e) => warn!(error = %e, "could not read server config"),
            }
            self.provider_state.select(
                Provider::all()
                    .iter()
                    .position(|p| *p == self.session.selected_provider),
            );
            self.model_cursor = self.session.model_name.chars().count();
        }

        if let Some(result) = take_finished(&mut self.presets_task).await? {
            self.session.finish_presets(result);
        }

        if let Some(result) = take_finished(&mut self.init_task).await? {
            let ok = result.is_ok();
            self.session.finish_init(result, now);
            if ok {
                let model = self.session.sidebar.model.clone();
                if let Err(e) = Config::save_last_init(self.session.selected_provider, model.as_deref()) {
                    warn!(error = %e, "could not save config");
                }
            }
        }

        if let Some((context, handle)) = self.upload_task.take() {
            if handle.is_finished() {
                let result = handle.await?;
                self.session.finish_upload(context, result, now);
            } else {
                self.upload_task = Some((context, handle));
            }
        }

        if let Some(result) = take_finished(&mut self.chat_task).await? {
            self.session.finish_send(result);
            self.follow_bottom = true;
        }

        if let Some(result) = take_finished(&mut self.clear_persona_task).await? {
            self.session.finish_clear_persona(result);
        }

        if let Some(result) = take_finished(&mut self.clear_memory_task).await? {
            self.session.finish_clear_memory(result);
        }

        if let Some(result) = take_finished(&mut self.reset_task).await? {
            let ok = result.is_ok();
            self.session.finish_reset(result);
            if ok {
                self.chat_input.clear();
                self.chat_cursor = 0;
                self.selected_message = None;
                self.input_mode = InputMode::Normal;
                self.setup_focus = SetupFocus::Providers;
                // The reset session needs its preset list again.
                let client = self.client.clone();
                self.presets_task = Some(tokio::spawn(async move { client.list_personas().await }));
            }
        }

        Ok(())
    }
}

/// Take the task's result if it has completed; leave it in place otherwise.
async fn take_finished<T>(slot: &mut Task<T>) -> anyhow::Result<Option<Result<T, ApiError>>> {
    match slot.take() {
        Some(handle) if handle.is_finished() => Ok(Some(handle.await?)),
        other => {
            *slot = other;
            Ok(None)
        }
    }
}
