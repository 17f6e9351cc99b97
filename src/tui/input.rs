use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::explore::nav::{Region, TreeKey};

/// Lines moved by PageUp / PageDown in the detail pane.
pub const PAGE: isize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    ToggleHelp,
    FocusSearch,
    ToggleFullScreen,
    FocusNext,
    FocusPrev,
    ToggleSearchMode,
    ToggleNoise,
    OpenSettings,
    Tree(TreeKey),
    ScrollDetail(isize),
    ScrollDetailEnd,
    SubmitText,
    Cancel,
    Backspace,
    InputChar(char),
    Noop,
}

/// Keys that mean the same thing whichever pane has focus.
pub fn global_action(key: KeyEvent) -> Option<Action> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('q') => Some(Action::Quit),
            KeyCode::Char('h') => Some(Action::ToggleHelp),
            KeyCode::Char('s') => Some(Action::FocusSearch),
            KeyCode::Char('f') => Some(Action::ToggleFullScreen),
            KeyCode::Char('t') => Some(Action::ToggleSearchMode),
            KeyCode::Char('n') => Some(Action::ToggleNoise),
            KeyCode::Char('o') => Some(Action::OpenSettings),
            _ => None,
        };
    }
    match key.code {
        KeyCode::Tab => Some(Action::FocusNext),
        KeyCode::BackTab => Some(Action::FocusPrev),
        _ => None,
    }
}

pub fn action_for_key(key: KeyEvent, region: Region) -> Action {
    if let Some(action) = global_action(key) {
        return action;
    }

    match region {
        Region::Search => match key.code {
            KeyCode::Enter => Action::SubmitText,
            KeyCode::Esc => Action::Cancel,
            KeyCode::Backspace => Action::Backspace,
            KeyCode::Char(c) => Action::InputChar(c),
            _ => Action::Noop,
        },
        Region::Tree => match key.code {
            KeyCode::Up | KeyCode::Char('k') => Action::Tree(TreeKey::Up),
            KeyCode::Down | KeyCode::Char('j') => Action::Tree(TreeKey::Down),
            KeyCode::Left | KeyCode::Char('K') => Action::Tree(TreeKey::Left),
            KeyCode::Right => Action::Tree(TreeKey::Right),
            KeyCode::Enter => Action::Tree(TreeKey::Enter),
            KeyCode::Char('?') => Action::ToggleHelp,
            _ => Action::Noop,
        },
        Region::Detail => match key.code {
            KeyCode::Up | KeyCode::Char('k') => Action::ScrollDetail(-1),
            KeyCode::Down | KeyCode::Char('j') => Action::ScrollDetail(1),
            KeyCode::PageUp => Action::ScrollDetail(-PAGE),
            KeyCode::PageDown => Action::ScrollDetail(PAGE),
            KeyCode::Home => Action::ScrollDetail(isize::MIN),
            KeyCode::End => Action::ScrollDetailEnd,
            KeyCode::Esc => Action::Cancel,
            KeyCode::Char('?') => Action::ToggleHelp,
            _ => Action::Noop,
        },
    }
}
