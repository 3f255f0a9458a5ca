use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::app::{App, MessageKind};
use crate::input::InputMode;

fn hints(mode: InputMode, narrow: bool) -> &'static [(&'static str, &'static str)] {
    match mode {
        InputMode::Filter => &[
            ("type", "filter"),
            ("↑↓", "pick"),
            ("Enter", "jump"),
            ("Esc", "cancel"),
        ],
        InputMode::Form => &[
            ("↑↓", "repository"),
            ("Enter", "next/submit"),
            ("Esc", "cancel"),
        ],
        InputMode::ErrorScreen => &[("r", "retry"), ("q", "quit")],
        InputMode::Dashboard if narrow => &[
            ("j/k", "nav"),
            ("h/l", "pane"),
            ("/", "find"),
            ("n", "new"),
            ("r", "refresh"),
            ("q", "quit"),
        ],
        InputMode::Dashboard => &[
            ("↑↓/jk", "navigate"),
            ("←→/hl", "pane"),
            ("Tab", "cycle"),
            ("gg/G", "top/bottom"),
            ("/", "filter"),
            ("n", "new run"),
            ("r", "refresh"),
            ("q", "quit"),
        ],
    }
}

pub fn render(f: &mut Frame, area: Rect, app: &App) {
    let narrow = area.width < crate::app::NARROW_WIDTH_THRESHOLD;

    let line = if let Some(message) = app.message() {
        let (mark, color) = match message.kind {
            MessageKind::Info => ("★ ", Color::Yellow),
            MessageKind::Error => ("! ", Color::Red),
        };
        Line::from(vec![
            Span::styled(mark, Style::default().fg(color)),
            Span::styled(message.text.as_str(), Style::default().fg(color)),
        ])
    } else {
        let mut spans: Vec<Span> = Vec::new();
        for (i, (key, desc)) in hints(app.input_context().mode, narrow).iter().enumerate() {
            if i > 0 {
                spans.push(Span::raw(" "));
            }
            spans.push(Span::styled(*key, Style::default().fg(Color::Cyan)));
            spans.push(Span::styled(
                format!(" {desc}"),
                Style::default().fg(Color::DarkGray),
            ));
        }
        Line::from(spans)
    };

    let footer = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::TOP)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    f.render_widget(footer, area);
}
