use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Clear, Padding, Paragraph};

use crate::config::Config;
use crate::tui::render::centered_rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsEvent {
    None,
    Changed,
    Close,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SettingsPanelState {
    pub selected_row: usize,
}

const SETTINGS_ROW_COUNT: usize = 4;
const MAX_EXPAND_STEP: usize = 32;
const MAX_CONTEXT_LINES: usize = 40;

pub fn handle_key(
    key: KeyEvent,
    state: &mut SettingsPanelState,
    config: &mut Config,
) -> SettingsEvent {
    match key.code {
        KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('q') => SettingsEvent::Close,
        KeyCode::Up | KeyCode::Char('k') => {
            state.selected_row = state.selected_row.saturating_sub(1);
            SettingsEvent::None
        }
        KeyCode::Down | KeyCode::Char('j') => {
            state.selected_row = (state.selected_row + 1).min(SETTINGS_ROW_COUNT - 1);
            SettingsEvent::None
        }
        KeyCode::Left | KeyCode::Char('h') => adjust(config, state.selected_row, -1),
        KeyCode::Right | KeyCode::Char('l') | KeyCode::Enter | KeyCode::Char(' ') => {
            adjust(config, state.selected_row, 1)
        }
        _ => SettingsEvent::None,
    }
}

pub fn draw(frame: &mut Frame, state: &SettingsPanelState, config: &Config) {
    let area = centered_rect(frame.area(), 56, 44);
    frame.render_widget(Clear, area);

    let title = Line::from(vec![
        Span::styled(
            "Setup",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled("[Esc] close", Style::default().fg(Color::Gray)),
    ]);

    let selected_row = state.selected_row.min(SETTINGS_ROW_COUNT - 1);
    let mut lines = vec![
        settings_row(
            selected_row == 0,
            "std/external calls",
            toggle_value(config.include_noise),
        ),
        settings_row(
            selected_row == 1,
            "search mode",
            (config.search_mode.label().to_string(), Color::Green),
        ),
        settings_row(
            selected_row == 2,
            "expand step",
            (format!("< {} >", config.expand_step), Color::Green),
        ),
        settings_row(
            selected_row == 3,
            "context lines",
            (format!("< {} >", config.context_lines), Color::Green),
        ),
        Line::from(""),
        Line::from(Span::styled(
            "About this option",
            Style::default()
                .fg(Color::Gray)
                .add_modifier(Modifier::BOLD),
        )),
    ];
    for text in selected_row_description(selected_row) {
        lines.push(Line::from(Span::styled(
            text,
            Style::default().fg(Color::DarkGray),
        )));
    }
    lines.extend([
        Line::from(""),
        Line::from(Span::styled(
            "Arrows/hjkl change values, Enter/Space toggles.",
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(Span::styled(
            "Changes write to callview.conf immediately.",
            Style::default().fg(Color::DarkGray),
        )),
    ]);

    let panel = Paragraph::new(lines).block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(Color::Cyan))
            .padding(Padding::new(1, 1, 1, 0)),
    );
    frame.render_widget(panel, area);
}

fn toggle_value(enabled: bool) -> (String, Color) {
    if enabled {
        ("[SHOWN]".to_string(), Color::Green)
    } else {
        ("[HIDDEN]".to_string(), Color::LightRed)
    }
}

fn settings_row(selected: bool, key: &str, (value, color): (String, Color)) -> Line<'static> {
    let indicator = if selected { ">" } else { " " };
    let base_style = if selected {
        Style::default()
            .fg(Color::White)
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    };
    let mut value_style = Style::default().fg(color).add_modifier(Modifier::BOLD);
    if selected {
        value_style = value_style.bg(Color::DarkGray);
    }

    Line::from(vec![
        Span::styled(format!("{indicator} {key:<24}"), base_style),
        Span::styled(value, value_style),
    ])
}

fn selected_row_description(selected_row: usize) -> [&'static str; 2] {
    match selected_row {
        0 => [
            "Show calls whose declaring file starts with one",
            "of the noise prefixes (standard library, deps).",
        ],
        1 => [
            "name: keep only branches leading to a function",
            "with that exact name. text: highlight summaries.",
        ],
        2 => [
            "How many calls deep the tree grows at startup",
            "and each time Enter expands a leaf.",
        ],
        3 => [
            "Source lines shown above and below each call",
            "site in the text pane.",
        ],
        _ => ["", ""],
    }
}

fn adjust(config: &mut Config, selected_row: usize, delta: isize) -> SettingsEvent {
    match selected_row {
        0 => {
            config.include_noise = !config.include_noise;
            SettingsEvent::Changed
        }
        1 => {
            config.search_mode = config.search_mode.toggled();
            SettingsEvent::Changed
        }
        2 => step(&mut config.expand_step, delta, 1, MAX_EXPAND_STEP),
        3 => step(&mut config.context_lines, delta, 0, MAX_CONTEXT_LINES),
        _ => SettingsEvent::None,
    }
}

fn step(value: &mut usize, delta: isize, min: usize, max: usize) -> SettingsEvent {
    let next = value.saturating_add_signed(delta).clamp(min, max);
    if next == *value {
        return SettingsEvent::None;
    }
    *value = next;
    SettingsEvent::Changed
}
