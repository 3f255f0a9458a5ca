use crate::create::{CreateForm, FormField};
use crate::model::truncate;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

fn label(text: &'static str, active: bool) -> Span<'static> {
    let style = if active {
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    Span::styled(text, style)
}

pub fn render_create(f: &mut Frame, area: Rect, form: &CreateForm) {
    let box_area = centered(area, 60, 9);
    f.render_widget(Clear, box_area);
    let inner_width = box_area.width.saturating_sub(16) as usize;

    let on_repo = form.field() == FormField::Repository;
    let repository = form
        .selected_repository()
        .map_or("(no repositories)", |r| r.name.as_str());
    let position = if form.repositories().is_empty() {
        String::new()
    } else {
        format!("  {}/{}", form.repo_idx() + 1, form.repositories().len())
    };

    let mut lines = vec![
        Line::from(""),
        Line::from(vec![
            label(" Repository: ", on_repo),
            Span::raw(truncate(repository, inner_width)),
            Span::styled(position, Style::default().fg(Color::DarkGray)),
        ]),
        Line::from(vec![
            label(" Title:      ", !on_repo),
            Span::raw(truncate(form.title(), inner_width)),
            Span::styled(
                if on_repo { "" } else { "▏" },
                Style::default().fg(Color::Cyan),
            ),
        ]),
        Line::from(""),
    ];
    if form.is_submitting() {
        lines.push(Line::styled(
            " Submitting…",
            Style::default().fg(Color::Yellow),
        ));
    } else if let Some(error) = form.error() {
        lines.push(Line::styled(
            format!(" {error}"),
            Style::default().fg(Color::Red),
        ));
    }

    let block = Block::default()
        .title(" New run ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .style(Style::default().bg(Color::Black));
    f.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        box_area,
    );
}

pub fn render_error(f: &mut Frame, area: Rect, message: &str) {
    let box_area = centered(area, 70, 8);
    f.render_widget(Clear, box_area);

    let hints = Line::from(vec![
        Span::styled(
            "r",
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(" retry   ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            "q",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ),
        Span::styled(" quit ", Style::default().fg(Color::DarkGray)),
    ]);

    let block = Block::default()
        .title(" Could not load data ")
        .title_bottom(hints.centered())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red));

    let paragraph = Paragraph::new(vec![
        Line::from(""),
        Line::styled(message.to_string(), Style::default().fg(Color::White)),
    ])
    .block(block)
    .wrap(Wrap { trim: true })
    .centered();
    f.render_widget(paragraph, box_area);
}
