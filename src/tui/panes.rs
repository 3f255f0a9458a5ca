//! The three dashboard panes, laid out left to right.
//!
//! Each pane is a windowed `Paragraph` that keeps its cursor on screen.
//! While a filter is open its pane shows the query and the ranked matches
//! instead of the full list.

use crate::dashboard::{Dashboard, DetailLine, Pane};
use crate::filter::FilterSession;
use crate::model::{format_age, truncate, RepositoryOverview, RunSnapshot, RunStatus};
use chrono::Utc;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

pub fn render(f: &mut Frame, area: Rect, dashboard: &Dashboard) {
    let narrow = area.width < crate::app::NARROW_WIDTH_THRESHOLD;
    let direction = if narrow {
        Direction::Vertical
    } else {
        Direction::Horizontal
    };
    let chunks = Layout::default()
        .direction(direction)
        .constraints([
            Constraint::Percentage(30),
            Constraint::Percentage(35),
            Constraint::Percentage(35),
        ])
        .split(area);

    for (pane, chunk) in Pane::ALL.into_iter().zip(chunks.iter()) {
        render_pane(f, *chunk, dashboard, pane);
    }
}

fn status_icon(status: RunStatus) -> (&'static str, Color) {
    match status {
        RunStatus::Done => ("✓", Color::Green),
        RunStatus::Failed => ("✗", Color::Red),
        RunStatus::Processing | RunStatus::PostProcess => ("⟳", Color::Yellow),
        RunStatus::Queued | RunStatus::Initializing => ("·", Color::DarkGray),
    }
}

fn pane_block(pane: Pane, focused: bool) -> Block<'static> {
    let border = if focused { Color::Cyan } else { Color::DarkGray };
    Block::default()
        .title(format!(" {} ", pane.title()))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
}

fn selected_style(focused: bool) -> Style {
    if focused {
        Style::default().add_modifier(Modifier::REVERSED)
    } else {
        Style::default().add_modifier(Modifier::BOLD)
    }
}

/// First visible row so that `cursor` stays inside `height` rows.
fn scroll_offset(cursor: usize, height: usize) -> usize {
    if height == 0 || cursor < height {
        0
    } else {
        cursor + 1 - height
    }
}

fn render_pane(f: &mut Frame, area: Rect, dashboard: &Dashboard, pane: Pane) {
    let focused = dashboard.focus() == pane;
    let block = pane_block(pane, focused);
    let inner_width = area.width.saturating_sub(2) as usize;
    let height = area.height.saturating_sub(2) as usize;

    if let Some((filter_pane, session)) = dashboard.filter() {
        if filter_pane == pane {
            let lines = filter_lines(session, inner_width, height);
            f.render_widget(Paragraph::new(lines).block(block), area);
            return;
        }
    }

    let nav = dashboard.nav();
    let (lines, cursor, empty) = match pane {
        Pane::Repositories => (
            dashboard
                .repositories()
                .iter()
                .map(|r| repository_line(r, inner_width))
                .collect::<Vec<_>>(),
            nav.repo_idx,
            if dashboard.is_loading_overview() {
                "Loading repositories…"
            } else {
                "No repositories"
            },
        ),
        Pane::Runs => (
            dashboard
                .runs()
                .iter()
                .map(|r| run_line(r, inner_width))
                .collect(),
            nav.run_idx,
            if dashboard.is_loading() {
                "Loading runs…"
            } else {
                "No runs"
            },
        ),
        Pane::Details => (
            dashboard.details().iter().map(detail_line).collect(),
            nav.detail_idx,
            "No run selected",
        ),
    };

    if lines.is_empty() {
        let para = Paragraph::new(empty)
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(para, area);
        return;
    }

    let offset = scroll_offset(cursor, height);
    let visible: Vec<Line> = lines
        .into_iter()
        .enumerate()
        .skip(offset)
        .take(height)
        .map(|(i, line)| {
            if i == cursor {
                line.style(selected_style(focused))
            } else {
                line
            }
        })
        .collect();
    f.render_widget(Paragraph::new(visible).block(block), area);
}

fn repository_line(repo: &RepositoryOverview, width: usize) -> Line<'static> {
    let counts = repo.counts;
    let mut tail = Vec::new();
    if counts.active() > 0 {
        tail.push(Span::styled(
            format!(" ⟳{}", counts.active()),
            Style::default().fg(Color::Yellow),
        ));
    }
    if counts.done > 0 {
        tail.push(Span::styled(
            format!(" ✓{}", counts.done),
            Style::default().fg(Color::Green),
        ));
    }
    if counts.failed > 0 {
        tail.push(Span::styled(
            format!(" ✗{}", counts.failed),
            Style::default().fg(Color::Red),
        ));
    }
    let tail_width: usize = tail.iter().map(Span::width).sum();
    let name = truncate(&repo.name, width.saturating_sub(tail_width));
    let mut spans = vec![Span::raw(name)];
    spans.extend(tail);
    Line::from(spans)
}

fn run_line(run: &RunSnapshot, width: usize) -> Line<'static> {
    let (icon, color) = status_icon(run.status);
    let age = format_age(run.updated_at, Utc::now());
    let prefix = format!(" #{} ", run.id);
    let budget = width.saturating_sub(prefix.chars().count() + age.chars().count() + 3);
    Line::from(vec![
        Span::styled(icon, Style::default().fg(color)),
        Span::raw(prefix),
        Span::raw(truncate(&run.display_title(), budget)),
        Span::styled(format!("  {age}"), Style::default().fg(Color::DarkGray)),
    ])
}

fn detail_line(line: &DetailLine) -> Line<'static> {
    match line {
        DetailLine::Field { label, value } => Line::from(vec![
            Span::styled(format!("{label}: "), Style::default().fg(Color::DarkGray)),
            Span::raw(value.clone()),
        ]),
        DetailLine::Separator => Line::raw(""),
    }
}

fn filter_lines(session: &FilterSession, width: usize, height: usize) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(vec![
        Span::styled("/", Style::default().fg(Color::Cyan)),
        Span::raw(session.query().to_string()),
        Span::styled("▏", Style::default().fg(Color::Cyan)),
    ])];
    if session.matches().is_empty() {
        lines.push(Line::styled(
            "no matches",
            Style::default().fg(Color::DarkGray),
        ));
        return lines;
    }
    let rows = height.saturating_sub(1);
    let offset = scroll_offset(session.highlighted(), rows);
    for (i, m) in session.matches().iter().enumerate().skip(offset).take(rows) {
        let line = Line::raw(truncate(&m.text, width));
        lines.push(if i == session.highlighted() {
            line.style(selected_style(true))
        } else {
            line
        });
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scroll_keeps_cursor_visible() {
        assert_eq!(scroll_offset(0, 5), 0);
        assert_eq!(scroll_offset(4, 5), 0);
        assert_eq!(scroll_offset(5, 5), 1);
        assert_eq!(scroll_offset(9, 5), 5);
        assert_eq!(scroll_offset(3, 0), 0);
    }
}
