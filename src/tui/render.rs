use crate::app::{App, Screen};
use crate::tui::{footer, form, header, panes};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::Frame;

pub fn render(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // header
            Constraint::Min(1),    // body
            Constraint::Length(2), // footer
        ])
        .split(f.area());

    header::render(f, chunks[0], app);
    match app.screen() {
        Screen::Dashboard => panes::render(f, chunks[1], app.dashboard()),
        Screen::CreateRun(create) => form::render_create(f, chunks[1], create),
        Screen::Error(error) => form::render_error(f, chunks[1], &error.message),
    }
    footer::render(f, chunks[2], app);
}
