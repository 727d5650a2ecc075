use std::collections::HashSet;

use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, BorderType, Borders, Cell, Clear, Gauge, Padding, Paragraph, Row, Table, TableState,
    Wrap,
};

use crate::app::player::PlayerState;
use crate::app::player::backend::BackendKind;
use crate::app::playlist::{Entry, format_duration};
use crate::db::ResumeRecord;

use super::actions::truncate;

pub(super) struct CatalogView<'a> {
    pub(super) playlist_name: &'a str,
    pub(super) entries: &'a [Entry],
    pub(super) visible: &'a [usize],
    pub(super) favorites: &'a HashSet<String>,
    pub(super) resumable: &'a HashSet<String>,
    pub(super) active_index: Option<usize>,
    pub(super) backend: BackendKind,
    pub(super) state: PlayerState,
    pub(super) current: Option<&'a Entry>,
    pub(super) progress: Option<ResumeRecord>,
    pub(super) status: &'a str,
    pub(super) search: &'a str,
    pub(super) group: Option<&'a str>,
    pub(super) favorites_only: bool,
    pub(super) unsaved: bool,
    pub(super) auto_advance: bool,
    pub(super) input: Option<(&'a str, &'a str)>,
    pub(super) notice: Option<&'a str>,
}

pub(super) fn draw_tui(frame: &mut Frame, view: &CatalogView, table_state: &mut TableState) {
    let bg = Block::default().style(Style::default().bg(Color::Black));
    frame.render_widget(bg, frame.area());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    render_header(frame, view, chunks[0]);

    let body_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(64), Constraint::Percentage(36)])
        .split(chunks[1]);
    render_catalog(frame, view, body_chunks[0], table_state);
    render_now_playing(frame, view, body_chunks[1]);

    let controls = Paragraph::new(controls_line(view))
        .alignment(Alignment::Center)
        .block(panel_block("Controls"));
    frame.render_widget(controls, chunks[2]);

    render_status_or_input(frame, view, chunks[3]);

    if let Some(notice) = view.notice {
        let popup_area = popup_rect_for_text(frame.area(), notice);
        render_popup_shadow(frame, popup_area);
        frame.render_widget(Clear, popup_area);
        let popup = Paragraph::new(notice.to_string())
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(modal_block("Playback Failed"));
        frame.render_widget(popup, popup_area);
    }
}

fn render_header(frame: &mut Frame, view: &CatalogView, area: Rect) {
    let mut spans = vec![
        Span::styled(
            "FLIXTRACK",
            Style::default()
                .fg(Color::Rgb(110, 170, 255))
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled("   ", Style::default()),
        Span::styled(
            truncate(view.playlist_name, 32),
            Style::default().fg(Color::Rgb(230, 235, 242)),
        ),
        Span::styled("   ", Style::default()),
        Span::styled(
            format!("{}/{} channels", view.visible.len(), view.entries.len()),
            Style::default().fg(Color::Rgb(185, 195, 210)),
        ),
        Span::styled("   ", Style::default()),
        Span::styled(
            format!("player: {}", view.backend.label()),
            Style::default().fg(Color::Yellow),
        ),
    ];
    if view.unsaved {
        spans.push(Span::styled("   ", Style::default()));
        spans.push(Span::styled(
            "UNSAVED",
            Style::default()
                .fg(Color::Rgb(255, 200, 120))
                .add_modifier(Modifier::BOLD),
        ));
    }
    let header = Paragraph::new(Line::from(spans))
        .alignment(Alignment::Center)
        .block(panel_block("Dashboard"));
    frame.render_widget(header, area);
}

fn render_catalog(frame: &mut Frame, view: &CatalogView, area: Rect, table_state: &mut TableState) {
    let rows: Vec<Row> = view
        .visible
        .iter()
        .map(|&index| {
            let entry = &view.entries[index];
            let playing = view.active_index == Some(index);
            let marker = if playing {
                "▶"
            } else if view.resumable.contains(&entry.source_url) {
                "⏱"
            } else {
                ""
            };
            let star = if view.favorites.contains(&entry.source_url) {
                "★"
            } else {
                ""
            };
            Row::new(vec![
                Cell::from(marker),
                Cell::from(entry.title.clone()),
                Cell::from(entry.group.clone()),
                Cell::from(star),
            ])
        })
        .collect();

    let mut title = match view.group {
        Some(group) => format!("Catalog — {group}"),
        None => "Catalog".to_string(),
    };
    if view.favorites_only {
        title.push_str(" ★");
    }
    let table = Table::new(
        rows,
        [
            Constraint::Length(2),
            Constraint::Percentage(62),
            Constraint::Percentage(30),
            Constraint::Length(2),
        ],
    )
    .header(
        Row::new(vec!["", "Title", "Category", ""]).style(
            Style::default()
                .fg(Color::Rgb(110, 170, 255))
                .add_modifier(Modifier::BOLD),
        ),
    )
    .block(panel_block_owned(title))
    .row_highlight_style(
        Style::default()
            .bg(Color::Rgb(110, 170, 255))
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("▸ ");
    frame.render_stateful_widget(table, area, table_state);
}

fn render_now_playing(frame: &mut Frame, view: &CatalogView, area: Rect) {
    let details_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(8), Constraint::Length(3)])
        .split(area);

    let text = match view.current {
        Some(entry) => {
            let state = match view.state {
                PlayerState::Idle => "idle",
                PlayerState::Loading => "loading…",
                PlayerState::Playing => "playing",
            };
            let position = match view.progress {
                Some(progress) => format!(
                    "{} / {}",
                    format_duration(progress.position),
                    format_duration(progress.duration)
                ),
                None => "—".to_string(),
            };
            format!(
                "Title\n{}\n\nCategory\n{}\n\nPlayer\n{} ({state})\n\nPosition\n{position}",
                truncate(&entry.title, 40),
                truncate(&entry.group, 40),
                view.backend.label(),
            )
        }
        None => "Nothing playing.\n\nSelect a channel and press Enter.".to_string(),
    };
    let panel = Paragraph::new(text)
        .style(Style::default().fg(Color::Rgb(230, 230, 230)))
        .block(panel_block("Now Playing"))
        .alignment(Alignment::Left);
    frame.render_widget(panel, details_chunks[0]);

    if let Some(progress) = view.progress
        && progress.duration > 0.0
    {
        let ratio = (progress.position / progress.duration).clamp(0.0, 1.0);
        let gauge = Gauge::default()
            .block(panel_block("Progress"))
            .gauge_style(
                Style::default()
                    .fg(Color::Rgb(130, 190, 255))
                    .bg(Color::Black)
                    .add_modifier(Modifier::BOLD),
            )
            .label(format_duration(progress.position))
            .ratio(ratio);
        frame.render_widget(gauge, details_chunks[1]);
    }
}

fn render_status_or_input(frame: &mut Frame, view: &CatalogView, area: Rect) {
    if let Some((label, buffer)) = view.input {
        let input = Paragraph::new(format!("{buffer}▏"))
            .style(Style::default().fg(Color::Rgb(230, 235, 242)))
            .block(modal_input_block(label));
        frame.render_widget(input, area);
        return;
    }
    let status = Paragraph::new(view.status.to_string())
        .style(status_style(view.status))
        .block(panel_block("Status"));
    frame.render_widget(status, area);
}

fn controls_line(view: &CatalogView) -> Line<'static> {
    let auto = if view.auto_advance {
        " auto-next ON "
    } else {
        " auto-next OFF "
    };
    let mut spans = vec![
        Span::styled(" Enter play ", pill_inactive()),
        Span::raw(" "),
        Span::styled(" n/p next/prev ", pill_inactive()),
        Span::raw(" "),
        Span::styled(" b player ", pill_inactive()),
        Span::raw(" "),
        Span::styled(auto, pill_active()),
        Span::styled(
            "   / search  g category  F favorites  f favorite  c close  q quit",
            Style::default().fg(Color::Rgb(185, 195, 210)),
        ),
    ];
    if view.unsaved {
        spans.push(Span::styled(
            "  w save",
            Style::default().fg(Color::Rgb(255, 200, 120)),
        ));
    }
    if !view.search.is_empty() {
        spans.push(Span::styled(
            format!("  [search: {}]", view.search.to_owned()),
            Style::default().fg(Color::Rgb(205, 165, 255)),
        ));
    }
    Line::from(spans)
}

fn panel_block(title: &'static str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Rgb(125, 135, 150)))
        .title(title)
}

fn panel_block_owned(title: String) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Rgb(125, 135, 150)))
        .title(title)
}

fn modal_block(title: &'static str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(
            Style::default()
                .fg(Color::Rgb(160, 190, 235))
                .add_modifier(Modifier::BOLD),
        )
        .title(title)
        .padding(Padding::new(2, 2, 1, 1))
}

fn modal_input_block(title: &str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(
            Style::default()
                .fg(Color::Rgb(160, 190, 235))
                .add_modifier(Modifier::BOLD),
        )
        .title(title.to_string())
}

fn pill_active() -> Style {
    Style::default()
        .bg(Color::Rgb(110, 170, 255))
        .fg(Color::Black)
        .add_modifier(Modifier::BOLD)
}

fn pill_inactive() -> Style {
    Style::default()
        .bg(Color::Rgb(72, 82, 96))
        .fg(Color::Rgb(230, 235, 242))
}

fn status_style(status: &str) -> Style {
    if status.starts_with("ERROR:") {
        Style::default()
            .fg(Color::Rgb(255, 145, 120))
            .add_modifier(Modifier::BOLD)
    } else if status.starts_with("INFO:") {
        Style::default().fg(Color::Rgb(205, 165, 255))
    } else {
        Style::default().fg(Color::Rgb(230, 235, 242))
    }
}

fn centered_fixed_rect(width: u16, height: u16, area: Rect) -> Rect {
    let clamped_width = width.min(area.width.max(1));
    let clamped_height = height.min(area.height.max(1));
    let x = area.x + area.width.saturating_sub(clamped_width) / 2;
    let y = area.y + area.height.saturating_sub(clamped_height) / 2;
    Rect::new(x, y, clamped_width, clamped_height)
}

fn render_popup_shadow(frame: &mut Frame, popup_area: Rect) {
    let area = frame.area();
    let shadow = Rect::new(
        (popup_area.x + 1).min(area.x + area.width.saturating_sub(1)),
        (popup_area.y + 1).min(area.y + area.height.saturating_sub(1)),
        popup_area.width.saturating_sub(1),
        popup_area.height.saturating_sub(1),
    );
    if shadow.width == 0 || shadow.height == 0 {
        return;
    }
    let shadow_block = Block::default().style(Style::default().bg(Color::Rgb(14, 16, 24)));
    frame.render_widget(shadow_block, shadow);
}

fn popup_rect_for_text(area: Rect, text: &str) -> Rect {
    let max_line_width = text
        .lines()
        .map(|line| line.chars().count() as u16)
        .max()
        .unwrap_or(0);
    let line_count = text.lines().count() as u16;

    let available_width = area.width.saturating_sub(2).max(1);
    let min_width = 48.min(available_width);
    let max_width = 72.min(available_width);
    let desired_width = max_line_width.saturating_add(12);
    let width = desired_width.clamp(min_width, max_width);

    let available_height = area.height.saturating_sub(2).max(1);
    let min_height = 10.min(available_height);
    let max_height = 18.min(available_height);
    let desired_height = line_count.saturating_add(6);
    let height = desired_height.clamp(min_height, max_height);

    centered_fixed_rect(width, height, area)
}
