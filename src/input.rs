use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    MoveUp,
    MoveDown,
    Advance,
    Retreat,
    CycleFocus,
    /// First or second half of the `g g` chord.
    JumpTopChord,
    JumpBottom,
    StartFilter,
    NewRun,
    Refresh,
    Retry,
    Input(char),
    Backspace,
    Confirm,
    Cancel,
    None,
}

/// Which input surface has the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Dashboard,
    /// Inline filter is open on the dashboard.
    Filter,
    /// Create-run form (text entry).
    Form,
    ErrorScreen,
}

/// Captures the UI state needed to interpret a key press.
#[derive(Debug, Clone, Default)]
pub struct InputContext {
    pub mode: InputMode,
    pub is_loading: bool,
}

pub fn map_key(key: KeyEvent, ctx: &InputContext) -> Action {
    if key.kind != KeyEventKind::Press {
        return Action::None;
    }

    // Ctrl+C always quits
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Action::Quit;
    }

    match ctx.mode {
        InputMode::Filter | InputMode::Form => match key.code {
            KeyCode::Esc => Action::Cancel,
            KeyCode::Enter => Action::Confirm,
            KeyCode::Backspace => Action::Backspace,
            KeyCode::Up => Action::MoveUp,
            KeyCode::Down | KeyCode::Tab => Action::MoveDown,
            KeyCode::Char(c) => Action::Input(c),
            _ => Action::None,
        },
        InputMode::ErrorScreen => match key.code {
            KeyCode::Char('r') | KeyCode::Enter => Action::Retry,
            KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
            _ => Action::None,
        },
        InputMode::Dashboard => match key.code {
            KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
            KeyCode::Up | KeyCode::Char('k') => Action::MoveUp,
            KeyCode::Down | KeyCode::Char('j') => Action::MoveDown,
            KeyCode::Right | KeyCode::Char('l') | KeyCode::Enter => Action::Advance,
            KeyCode::Left | KeyCode::Char('h') | KeyCode::Backspace => Action::Retreat,
            KeyCode::Tab => Action::CycleFocus,
            KeyCode::Char('g') => Action::JumpTopChord,
            KeyCode::Char('G') => Action::JumpBottom,
            KeyCode::Char('/') => Action::StartFilter,
            KeyCode::Char('n') => Action::NewRun,
            KeyCode::Char('r') if !ctx.is_loading => Action::Refresh,
            _ => Action::None,
        },
    }
}
