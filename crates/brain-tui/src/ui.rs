use std::time::Instant;
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};
use brain_core::markdown::{self, Segment};
use brain_core::session::THINKING_TEXT;
use brain_core::{AgentKey, ChatRole, Provider, Session, UploadStatus, UploadWidget, WizardStep};
use crate::app::{App, InputMode, SetupFocus};

const SIDEBAR_WIDTH: u16 = 30;

fn agent_color(key: AgentKey) -> Color {
    match key {
        AgentKey::Sensory => Color::Cyan,
        AgentKey::Memory => Color::Magenta,
        AgentKey::Logic => Color::Blue,
        AgentKey::Emotional => Color::Red,
        AgentKey::Executive => Color::Yellow,
    }
}

/// Convert one line of markdown segments to styled spans
fn markdown_line(segments: Vec<Segment>, indent: &'static str) -> Line<'static> {
    let mut spans = vec![Span::raw(indent)];
    spans.extend(segments.into_iter().map(|segment| match segment {
        Segment::Plain(text) => Span::raw(text),
        Segment::Bold(text) => Span::styled(text, Style::default().add_modifier(Modifier::BOLD)),
        Segment::Italic(text) => Span::styled(text, Style::default().add_modifier(Modifier::ITALIC)),
    }));
    Line::from(spans)
}

/// Centered popup rectangle clamped to the frame
fn popup_area(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

/// Visible slice of a single-line input, scrolled so the cursor stays in view.
fn visible_input(text: &str, cursor: usize, width: usize) -> (String, u16) {
    let offset = if width > 0 && cursor >= width { cursor - width + 1 } else { 0 };
    let visible: String = text.chars().skip(offset).take(width).collect();
    (visible, (cursor - offset) as u16)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    match app.session.step {
        WizardStep::Provider => render_provider_step(app, frame, body_area),
        WizardStep::Loading => render_loading_step(app, frame, body_area),
        WizardStep::Persona => render_persona_step(app, frame, body_area),
        WizardStep::Chat => render_chat(app, frame, body_area),
    }

    render_footer(app, frame, footer_area);

    // Render popups (in order of priority)
    if let Some(alert) = &app.session.alert {
        render_alert(alert, frame, area);
    } else if app.show_preset_picker {
        render_preset_picker(app, frame, area);
    } else if let Some(overlay) = &app.session.overlay {
        let popup = popup_area(area, 64, 9);
        frame.render_widget(Clear, popup);
        render_upload_widget(overlay, frame, popup, " 🎭 Change Persona ");
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = match app.session.step {
        WizardStep::Chat => app.session.sidebar.chat_title(),
        _ => "🧠 Brain System Setup".to_string(),
    };

    let line = Line::from(vec![
        Span::styled(format!(" {} ", title), Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("v{} ", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(app.client.base_url().to_string(), Style::default().fg(Color::DarkGray)),
    ]);

    let header = Paragraph::new(line).style(Style::default().bg(Color::Black));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);
    let hint = |k: &'static str, label: &'static str| {
        [Span::styled(k, key_style), Span::styled(label, label_style)]
    };

    let (mode_text, hints): (&str, Vec<[Span; 2]>) = if app.session.alert.is_some() {
        (" ALERT ", vec![hint(" Enter ", " dismiss ")])
    } else if app.show_preset_picker {
        (" PERSONAS ", vec![hint(" j/k ", " nav "), hint(" Enter ", " select "), hint(" Esc ", " close ")])
    } else if app.session.overlay.is_some() {
        (
            " PERSONA ",
            vec![hint(" Enter ", " upload "), hint(" Tab ", " presets "), hint(" Esc ", " cancel ")],
        )
    } else {
        match (app.session.step, app.input_mode) {
            (WizardStep::Provider, _) => (
                " SETUP ",
                vec![
                    hint(" j/k ", " provider "),
                    hint(" Tab ", " model "),
                    hint(" Enter ", " initialize "),
                    hint(" q ", " quit "),
                ],
            ),
            (WizardStep::Loading, _) => (" LOADING ", vec![hint(" q ", " quit ")]),
            (WizardStep::Persona, _) => (
                " PERSONA ",
                vec![hint(" Enter ", " upload "), hint(" Tab ", " presets "), hint(" Esc ", " skip ")],
            ),
            (WizardStep::Chat, InputMode::Editing) => (
                " CHAT ",
                vec![hint(" Enter ", " send "), hint(" Esc ", " stop typing ")],
            ),
            (WizardStep::Chat, InputMode::Normal) => (
                " CHAT ",
                vec![
                    hint(" i ", " type "),
                    hint(" j/k ", " scroll "),
                    hint(" [/] ", " message "),
                    hint(" a ", " signals "),
                    hint(" 1-5 ", " panel "),
                    hint(" p ", " persona "),
                    hint(" x ", " clear persona "),
                    hint(" m ", " clear memory "),
                    hint(" R ", " reset "),
                    hint(" q ", " quit "),
                ],
            ),
        }
    };

    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::styled(" ", label_style)];
    spans.extend(hints.into_iter().flatten());
    if let Some(notice) = &app.session.notice {
        spans.push(Span::styled(format!("  {notice}"), Style::default().fg(Color::Green)));
    }

    let footer = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn render_provider_step(app: &mut App, frame: &mut Frame, area: Rect) {
    let show_model = app.session.model_field_visible();
    let providers = Provider::all();
    let height = providers.len() as u16 + 4 + if show_model { 3 } else { 0 };
    let modal = popup_area(area, 56, height);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Choose your LLM provider ");
    let inner = block.inner(modal);
    frame.render_widget(block, modal);

    let [list_area, model_area] = Layout::vertical([
        Constraint::Length(providers.len() as u16 + 2),
        Constraint::Length(if show_model { 3 } else { 0 }),
    ])
    .areas(inner);

    let items: Vec<ListItem> = providers
        .iter()
        .map(|provider| {
            let selected = *provider == app.session.selected_provider;
            let prefix = if selected { "● " } else { "○ " };
            let style = if selected {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!("{}{}", prefix, provider.display_name())).style(style)
        })
        .collect();

    let list_border = if app.setup_focus == SetupFocus::Providers { Color::Yellow } else { Color::DarkGray };
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(list_border)))
        .highlight_style(Style::default().bg(Color::Blue).fg(Color::White))
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, list_area, &mut app.provider_state);

    if show_model {
        let focused = app.setup_focus == SetupFocus::ModelName;
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(if focused { Color::Yellow } else { Color::DarkGray }))
            .title(" Model name (blank for default) ");
        let inner_width = model_area.width.saturating_sub(2) as usize;
        let (visible, cursor_x) = visible_input(&app.session.model_name, app.model_cursor, inner_width);
        frame.render_widget(
            Paragraph::new(visible).style(Style::default().fg(Color::Cyan)).block(block),
            model_area,
        );
        if focused {
            frame.set_cursor_position((model_area.x + cursor_x + 1, model_area.y + 1));
        }
    }
}

fn render_loading_step(app: &App, frame: &mut Frame, area: Rect) {
    let modal = popup_area(area, 56, 5);
    let spinner = ["◐", "◓", "◑"][app.animation_frame as usize % 3];
    let text = Text::from(vec![
        Line::default(),
        Line::from(Span::styled(
            format!("{} {}", spinner, app.session.loading_text),
            Style::default().fg(Color::Cyan),
        ))
        .centered(),
    ]);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    frame.render_widget(Paragraph::new(text).block(block), modal);
}

fn render_persona_step(app: &App, frame: &mut Frame, area: Rect) {
    let modal = popup_area(area, 64, 9);
    render_upload_widget(&app.session.setup_upload, frame, modal, " 🎭 Load a persona (optional) ");
}

/// The upload zone, shared by the persona step and the change-persona overlay.
fn render_upload_widget(widget: &UploadWidget, frame: &mut Frame, area: Rect, title: &str) {
    let border = if widget.is_loading() { Color::Yellow } else { Color::Cyan };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(title.to_string());
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let [hint_area, input_area, status_area] = Layout::vertical([
        Constraint::Length(2),
        Constraint::Length(3),
        Constraint::Min(1),
    ])
    .areas(inner);

    let hint = Text::from(vec![
        Line::from(vec![
            Span::raw("📄 Drop a "),
            Span::styled(".txt", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" or "),
            Span::styled(".pdf", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" file here"),
        ]),
        Line::from(Span::styled("or type its path", Style::default().fg(Color::DarkGray))),
    ]);
    frame.render_widget(Paragraph::new(hint), hint_area);

    let inner_width = input_area.width.saturating_sub(2) as usize;
    let (visible, cursor_x) = visible_input(&widget.path_input, widget.cursor, inner_width);
    let input = Paragraph::new(visible)
        .style(Style::default().fg(Color::Cyan))
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::DarkGray)));
    frame.render_widget(input, input_area);
    frame.set_cursor_position((input_area.x + cursor_x + 1, input_area.y + 1));

    if let Some(text) = widget.status.text() {
        let color = match widget.status {
            UploadStatus::Loading(_) => Color::Yellow,
            UploadStatus::Success(_) => Color::Green,
            UploadStatus::Error(_) => Color::Red,
            UploadStatus::Idle => Color::DarkGray,
        };
        frame.render_widget(
            Paragraph::new(text).style(Style::default().fg(color)).wrap(Wrap { trim: true }),
            status_area,
        );
    }
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let [sidebar_area, main_area] = Layout::horizontal([
        Constraint::Length(SIDEBAR_WIDTH),
        Constraint::Min(0),
    ])
    .areas(area);

    render_sidebar(&app.session, frame, sidebar_area);

    let [chat_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(main_area);

    let lines = transcript_lines(&app.session, app.selected_message, app.animation_frame);

    // Keep the newest message in view unless the user scrolled away
    let view_height = chat_area.height.saturating_sub(2);
    let total = wrapped_height(&lines, chat_area.width.saturating_sub(2));
    let max_scroll = total.saturating_sub(view_height);
    if app.follow_bottom {
        app.chat_scroll = max_scroll;
    } else {
        app.chat_scroll = app.chat_scroll.min(max_scroll);
    }

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if app.input_mode == InputMode::Normal {
            Color::Cyan
        } else {
            Color::DarkGray
        }))
        .title(format!(" {} ", app.session.sidebar.chat_title()));

    let chat = Paragraph::new(Text::from(lines))
        .block(chat_block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));
    frame.render_widget(chat, chat_area);

    let editing = app.input_mode == InputMode::Editing;
    let can_send = app.session.can_send(&app.chat_input);
    let title = if app.session.is_busy() {
        " Waiting for the brain... "
    } else if can_send {
        " Message (Enter to send) "
    } else {
        " Message "
    };
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if editing { Color::Yellow } else { Color::DarkGray }))
        .title(title);

    let inner_width = input_area.width.saturating_sub(2) as usize;
    let (visible, cursor_x) = visible_input(&app.chat_input, app.chat_cursor, inner_width);
    frame.render_widget(
        Paragraph::new(visible).style(Style::default().fg(Color::Cyan)).block(input_block),
        input_area,
    );

    if editing && app.session.overlay.is_none() && !app.show_preset_picker {
        frame.set_cursor_position((input_area.x + cursor_x + 1, input_area.y + 1));
    }
}

fn render_sidebar(session: &Session, frame: &mut Frame, area: Rect) {
    let label = Style::default().fg(Color::DarkGray);
    let sidebar = &session.sidebar;

    let mut lines = vec![
        Line::from(vec![Span::styled("Provider  ", label), Span::raw(sidebar.provider_text().to_string())]),
        Line::from(vec![Span::styled("Model     ", label), Span::raw(sidebar.model_text().to_string())]),
        Line::from(vec![Span::styled("Persona   ", label), Span::raw(sidebar.persona_text().to_string())]),
    ];
    if sidebar.badge_visible() {
        lines.push(Line::from(Span::styled(
            format!(" 🎭 {} ", sidebar.persona_text()),
            Style::default().bg(Color::Magenta).fg(Color::White),
        )));
    }
    lines.push(Line::default());
    let agents_label = if session.agents.is_running() { "Agents (working)" } else { "Agents" };
    lines.push(Line::from(Span::styled(agents_label, label)));

    let now = Instant::now();
    for key in AgentKey::ORDER {
        let active = session.agents.is_active(key, now);
        let style = if active {
            Style::default().fg(agent_color(key)).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        lines.push(Line::from(Span::styled(
            format!(" {} {}", if active { "●" } else { "○" }, key.chip_label()),
            style,
        )));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Brain ");
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Build the transcript as styled lines: messages, agent panels, thinking placeholder.
fn transcript_lines(session: &Session, selected: Option<usize>, frame_no: u8) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();

    if session.show_welcome() {
        lines.push(Line::from(Span::styled(
            "🧠 Welcome! Your message will be processed by five brain agents:",
            Style::default().fg(Color::DarkGray),
        )));
        lines.push(Line::from(Span::styled(
            "   sensory, memory, logic, emotional and executive.",
            Style::default().fg(Color::DarkGray),
        )));
        return lines;
    }

    for (idx, entry) in session.transcript.entries().iter().enumerate() {
        let message = &entry.message;
        match message.role {
            ChatRole::User => lines.push(Line::from(Span::styled(
                "👤 You",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ))),
            ChatRole::Brain => lines.push(Line::from(Span::styled(
                "🧠 Brain",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ))),
        }
        for segments in markdown::to_segments(&message.text) {
            lines.push(markdown_line(segments, "   "));
        }

        let panels = message.agent_panels();
        if !panels.is_empty() {
            let is_selected = selected == Some(idx);
            let chevron = if entry.signals_open { "▼" } else { "▶" };
            let style = if is_selected {
                Style::default().fg(Color::Black).bg(Color::Cyan)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            lines.push(Line::from(Span::styled(
                format!("   {} {}", entry.signals_label(), chevron),
                style,
            )));

            if entry.signals_open {
                for (n, (key, output)) in panels.into_iter().enumerate() {
                    let open = entry.open_panels.contains(&key);
                    lines.push(Line::from(vec![
                        Span::raw(format!("     [{}] ", n + 1)),
                        Span::styled("● ", Style::default().fg(agent_color(key))),
                        Span::styled(output.name.clone(), Style::default().add_modifier(Modifier::BOLD)),
                        Span::styled(format!("  {}", output.role), Style::default().fg(Color::DarkGray)),
                        Span::raw(if open { " ▼" } else { " ▶" }),
                    ]));
                    if open {
                        for segments in markdown::to_segments(&output.output) {
                            lines.push(markdown_line(segments, "         "));
                        }
                    }
                }
            }
        }
        lines.push(Line::default());
    }

    if session.thinking {
        let dots = ".".repeat(frame_no as usize % 3 + 1);
        lines.push(Line::from(vec![
            Span::styled("🧠 ", Style::default().fg(Color::Yellow)),
            Span::styled(format!("{dots:<3} "), Style::default().fg(Color::Yellow)),
            Span::styled(
                THINKING_TEXT,
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            ),
        ]));
    }

    lines
}

/// Approximate rendered height after wrapping, for bottom-follow scrolling.
fn wrapped_height(lines: &[Line], width: u16) -> u16 {
    let width = width.max(1) as usize;
    lines
        .iter()
        .map(|line| {
            let chars = line.width();
            if chars == 0 { 1 } else { chars.div_ceil(width) as u16 }
        })
        .fold(0u16, |acc, h| acc.saturating_add(h))
}

fn render_preset_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let presets = &app.session.presets;
    let popup = popup_area(area, 60, presets.len() as u16 + 2);
    frame.render_widget(Clear, popup);

    let items: Vec<ListItem> = presets
        .iter()
        .map(|p| {
            ListItem::new(Line::from(vec![
                Span::raw(format!(" {} {} ", p.emoji, p.name)),
                Span::styled(format!("{} · {}", p.category, p.source), Style::default().fg(Color::DarkGray)),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(" Preset personas (Enter to select, Esc to cancel) "),
        )
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, popup, &mut app.preset_state);
}

fn render_alert(alert: &str, frame: &mut Frame, area: Rect) {
    let popup = popup_area(area, 60, 6);
    frame.render_widget(Clear, popup);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(" ⚠️ Alert ");
    let text = Text::from(vec![
        Line::from(alert.to_string()),
        Line::default(),
        Line::from(Span::styled("Press Enter to continue", Style::default().fg(Color::DarkGray))),
    ]);
    frame.render_widget(Paragraph::new(text).block(block).wrap(Wrap { trim: true }), popup);
}
