use crate::app::{App, Screen};
use crate::tui::spinner;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

pub fn render(f: &mut Frame, area: Rect, app: &App) {
    let mut spans = vec![Span::styled(
        format!(" {} ", app.version_string),
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    )];

    if let Some(user) = app.user() {
        spans.push(Span::raw("│ "));
        spans.push(Span::styled(
            user.name.as_str(),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ));
        if let Some(email) = &user.email {
            spans.push(Span::styled(
                format!(" <{email}>"),
                Style::default().fg(Color::DarkGray),
            ));
        }
    }

    let section = match app.screen() {
        Screen::Dashboard => None,
        Screen::CreateRun(_) => Some(" [new run]"),
        Screen::Error(_) => Some(" [error]"),
    };
    if let Some(section) = section {
        spans.push(Span::styled(section, Style::default().fg(Color::Magenta)));
    }

    let dashboard = app.dashboard();
    let active: usize = dashboard
        .repositories()
        .iter()
        .map(|r| r.counts.active())
        .sum();
    if active > 0 {
        spans.push(Span::styled(
            format!(" {active} active"),
            Style::default().fg(Color::Yellow),
        ));
    }

    if app.is_loading() {
        spans.push(Span::raw(" "));
        spans.push(Span::styled(
            format!("{} loading", spinner::frame(app.spinner_frame)),
            Style::default().fg(Color::Yellow),
        ));
    }

    let header = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(Color::DarkGray)),
    );

    f.render_widget(header, area);
}
