use std::time::Instant;
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use brain_core::WizardStep;
use crate::app::{App, InputMode, SetupFocus};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Shared line-editing keys for every text field.
fn edit_text(text: &mut String, cursor: &mut usize, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Backspace => {
            if *cursor > 0 {
                *cursor -= 1;
                let byte_pos = char_to_byte_index(text, *cursor);
                text.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            if *cursor < text.chars().count() {
                let byte_pos = char_to_byte_index(text, *cursor);
                text.remove(byte_pos);
            }
        }
        KeyCode::Left => *cursor = cursor.saturating_sub(1),
        KeyCode::Right => *cursor = (*cursor + 1).min(text.chars().count()),
        KeyCode::Home => *cursor = 0,
        KeyCode::End => *cursor = text.chars().count(),
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(text, *cursor);
            text.insert(byte_pos, c);
            *cursor += 1;
        }
        _ => return false,
    }
    true
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Paste(text) => handle_paste(app, &text),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick(Instant::now()),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    if app.session.alert.is_some() {
        if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
            app.session.dismiss_alert();
        }
        return;
    }

    if app.show_preset_picker {
        handle_preset_picker(app, key);
        return;
    }

    if app.session.overlay.is_some() {
        handle_upload_field(app, key, true);
        return;
    }

    match app.session.step {
        WizardStep::Provider => handle_provider_step(app, key),
        WizardStep::Loading => {
            if key.code == KeyCode::Char('q') {
                app.should_quit = true;
            }
        }
        WizardStep::Persona => handle_upload_field(app, key, false),
        WizardStep::Chat => match app.input_mode {
            InputMode::Normal => handle_chat_normal(app, key),
            InputMode::Editing => handle_chat_editing(app, key),
        },
    }
}

fn handle_provider_step(app: &mut App, key: KeyEvent) {
    if key.code == KeyCode::Enter {
        app.start_init();
        return;
    }
    if key.code == KeyCode::Tab || key.code == KeyCode::BackTab {
        if app.session.model_field_visible() {
            app.setup_focus = match app.setup_focus {
                SetupFocus::Providers => SetupFocus::ModelName,
                SetupFocus::ModelName => SetupFocus::Providers,
            };
        }
        return;
    }

    match app.setup_focus {
        SetupFocus::Providers => match key.code {
            KeyCode::Char('q') | KeyCode::Esc => app.should_quit = true,
            KeyCode::Char('j') | KeyCode::Down => app.provider_nav(true),
            KeyCode::Char('k') | KeyCode::Up => app.provider_nav(false),
            _ => {}
        },
        SetupFocus::ModelName => {
            if key.code == KeyCode::Esc {
                app.setup_focus = SetupFocus::Providers;
            } else {
                edit_text(&mut app.session.model_name, &mut app.model_cursor, key);
            }
        }
    }
}

/// Path field of the upload widget, in the persona step or the overlay.
fn handle_upload_field(app: &mut App, key: KeyEvent, overlay: bool) {
    match key.code {
        KeyCode::Esc => {
            if overlay {
                app.session.close_overlay();
            } else {
                app.session.skip_persona();
                app.input_mode = InputMode::Editing;
            }
        }
        KeyCode::Tab => app.open_preset_picker(),
        KeyCode::Enter => {
            let raw = app
                .session
                .active_upload()
                .map(|w| w.path_input.clone())
                .unwrap_or_default();
            app.start_upload(&raw);
        }
        _ => {
            if let Some(widget) = app.session.active_upload_mut() {
                edit_text(&mut widget.path_input, &mut widget.cursor, key);
            }
        }
    }
}

fn handle_preset_picker(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.show_preset_picker = false,
        KeyCode::Char('j') | KeyCode::Down => app.preset_nav(true),
        KeyCode::Char('k') | KeyCode::Up => app.preset_nav(false),
        KeyCode::Enter => app.start_preset(),
        _ => {}
    }
}

fn handle_chat_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('i') | KeyCode::Enter => app.input_mode = InputMode::Editing,

        // Transcript scrolling
        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(1),
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => app.scroll_down(10),
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => app.scroll_up(10),
        KeyCode::Char('G') => app.follow_bottom = true,

        // Agent signals
        KeyCode::Char('[') => app.select_message(false),
        KeyCode::Char(']') => app.select_message(true),
        KeyCode::Char('a') => app.toggle_signals(),
        KeyCode::Char(c @ '1'..='5') => app.toggle_panel(c as usize - '1' as usize),

        // Sidebar actions
        KeyCode::Char('p') => app.session.open_overlay(),
        KeyCode::Char('x') => app.clear_persona(),
        KeyCode::Char('m') => app.clear_memory(),
        KeyCode::Char('R') => app.reset(),
        _ => {}
    }
}

fn handle_chat_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.input_mode = InputMode::Normal,
        KeyCode::Enter => app.send_message(),
        _ => {
            edit_text(&mut app.chat_input, &mut app.chat_cursor, key);
        }
    }
}

/// A drop onto the upload zone uploads immediately; elsewhere a paste is typed text.
fn handle_paste(app: &mut App, text: &str) {
    if app.session.alert.is_some() || app.show_preset_picker {
        return;
    }
    if let Some(widget) = app.session.active_upload_mut() {
        widget.set_path(text);
        let raw = widget.path_input.clone();
        app.start_upload(&raw);
        return;
    }
    match app.session.step {
        WizardStep::Chat if app.input_mode == InputMode::Editing => {
            let flat = text.replace(['\r', '\n'], " ");
            let byte_pos = char_to_byte_index(&app.chat_input, app.chat_cursor);
            app.chat_input.insert_str(byte_pos, &flat);
            app.chat_cursor += flat.chars().count();
        }
        WizardStep::Provider if app.setup_focus == SetupFocus::ModelName => {
            let byte_pos = char_to_byte_index(&app.session.model_name, app.model_cursor);
            app.session.model_name.insert_str(byte_pos, text.trim());
            app.model_cursor += text.trim().chars().count();
        }
        _ => {}
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    if app.session.step != WizardStep::Chat {
        return;
    }
    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(3),
        MouseEventKind::ScrollUp => app.scroll_up(3),
        _ => {}
    }
}
