use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;
use time::{macros::format_description, OffsetDateTime};
use unicode_width::UnicodeWidthStr;

use crate::app::drag::{DragSource, ListLayout, RowSlot};
use crate::app::save::SaveStatus;
use crate::app::state::{AppState, Field, RowView};
use crate::config::themes::Palette;
use crate::links::catalog::{self, Rgb};

/// Height of one link row including its border.
pub const ROW_HEIGHT: u16 = 5;
const HANDLE_WIDTH: u16 = 4;
const LINK_LABEL: &str = "Link: ";
const LINK_PLACEHOLDER: &str = "e.g. https://www.github.com/johnappleseed";

/// Draws the editor and returns the list geometry used for pointer hit-testing.
pub fn draw_app(frame: &mut Frame, state: &AppState, palette: &Palette) -> ListLayout {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(8), Constraint::Length(3)])
        .split(frame.size());

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(36), Constraint::Percentage(64)])
        .split(vertical[0]);

    draw_phone_preview(frame, state, palette, columns[0]);
    let layout = draw_editor(frame, state, palette, columns[1]);
    draw_status(frame, state, palette, vertical[1]);

    if state.picker().is_some() {
        render_platform_picker(frame, state, palette);
    }
    layout
}

fn draw_editor(frame: &mut Frame, state: &AppState, palette: &Palette, area: Rect) -> ListLayout {
    let block = Block::default()
        .title(" Customize your links ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.accent));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(1)])
        .split(inner);

    let intro = Paragraph::new(vec![
        Line::from(Span::styled(
            "Add/edit/remove links below and then share all your profiles with the world!",
            Style::default().fg(palette.muted),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "+ Add new link (a)",
            Style::default()
                .fg(palette.accent)
                .add_modifier(Modifier::BOLD),
        )),
    ])
    .wrap(Wrap { trim: true });
    frame.render_widget(intro, sections[0]);

    let list_area = sections[1];
    if state.store().is_empty() {
        draw_empty_state(frame, palette, list_area);
        return ListLayout {
            area: list_area,
            handle_width: HANDLE_WIDTH,
            ..ListLayout::default()
        };
    }

    let rows = state.rows();
    let visible = usize::from((list_area.height / ROW_HEIGHT).max(1));
    let first = scroll_offset(state.focus_index(), rows.len(), visible);
    let mut slots = Vec::with_capacity(visible);
    for (offset, row) in rows.iter().skip(first).take(visible).enumerate() {
        let top = list_area.y + offset as u16 * ROW_HEIGHT;
        let height = ROW_HEIGHT.min(list_area.bottom().saturating_sub(top));
        let row_area = Rect::new(list_area.x, top, list_area.width, height);
        draw_row(frame, state, palette, row, row_area);
        slots.push(RowSlot { top, height });
    }

    ListLayout {
        area: list_area,
        first,
        slots,
        handle_width: HANDLE_WIDTH,
    }
}

/// First visible position so the selected row stays on screen.
fn scroll_offset(selected: usize, len: usize, visible: usize) -> usize {
    if len <= visible {
        return 0;
    }
    selected
        .saturating_add(1)
        .saturating_sub(visible)
        .min(len - visible)
}

fn draw_row(frame: &mut Frame, state: &AppState, palette: &Palette, row: &RowView<'_>, area: Rect) {
    let border_style = if row.dragging {
        Style::default().fg(palette.drag).add_modifier(Modifier::BOLD)
    } else if row.selected {
        Style::default().fg(palette.accent)
    } else {
        Style::default().fg(palette.muted)
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let field_style = |field: Field| {
        if row.selected && state.field() == field {
            Style::default()
                .fg(palette.text)
                .bg(palette.selection_bg)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(palette.text)
        }
    };

    let handle = if row.dragging { "⣿ " } else { "⠿ " };
    let title = Line::from(vec![
        Span::styled(handle, Style::default().fg(palette.drag)),
        Span::styled(
            format!(" Link #{}", row.number),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            if row.selected { "   remove (d)" } else { "" },
            Style::default().fg(palette.muted),
        ),
    ]);

    let info = row.entry.platform.info();
    let platform = Line::from(vec![
        Span::styled("Platform: ", Style::default().fg(palette.muted)),
        Span::styled("■ ", Style::default().fg(rgb(info.background))),
        Span::styled(format!("{} ▾", info.label), field_style(Field::Platform)),
    ]);

    let mut link_spans = vec![Span::styled(LINK_LABEL, Style::default().fg(palette.muted))];
    match (row.input, row.entry.link.as_deref()) {
        (Some(input), _) => link_spans.push(Span::styled(
            input.buffer().to_string(),
            field_style(Field::Link).add_modifier(Modifier::UNDERLINED),
        )),
        (None, Some(link)) if !link.is_empty() => {
            link_spans.push(Span::styled(link.to_string(), field_style(Field::Link)))
        }
        _ => link_spans.push(Span::styled(
            LINK_PLACEHOLDER,
            field_style(Field::Link).fg(palette.muted),
        )),
    }
    if let Some(error) = row.error {
        link_spans.push(Span::styled(
            format!("  {error}"),
            Style::default().fg(palette.error),
        ));
    }

    let paragraph = Paragraph::new(vec![title, platform, Line::from(link_spans)]);
    frame.render_widget(paragraph, inner);

    if let Some(input) = row.input {
        let offset = (LINK_LABEL.width() + input.cursor_column()) as u16;
        let x = inner.x + offset.min(inner.width.saturating_sub(1));
        let y = inner.y + 2;
        if y < inner.bottom() {
            frame.set_cursor(x, y);
        }
    }
}

fn draw_empty_state(frame: &mut Frame, palette: &Palette, area: Rect) {
    let text = Text::from(vec![
        Line::from(""),
        Line::from(Span::styled(
            "Let's get you started",
            Style::default()
                .fg(palette.text)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "Use the \"Add new link\" button to get started. Once you have more than one link, \
             you can reorder and edit them. We're here to help you share your profiles with everyone!",
            Style::default().fg(palette.muted),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "Press a to add your first link",
            Style::default().fg(palette.accent),
        )),
    ]);
    let paragraph = Paragraph::new(text)
        .alignment(ratatui::layout::Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(palette.muted)),
        );
    frame.render_widget(paragraph, area);
}

fn draw_phone_preview(frame: &mut Frame, state: &AppState, palette: &Palette, area: Rect) {
    let mut lines = Vec::new();
    match &state.profile {
        Some(profile) => {
            lines.push(Line::from(Span::styled(
                profile.display_name(),
                Style::default()
                    .fg(palette.text)
                    .add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(Span::styled(
                profile.email.clone(),
                Style::default().fg(palette.muted),
            )));
        }
        None => {
            lines.push(Line::from(Span::styled(
                "No profile details yet",
                Style::default().fg(palette.muted),
            )));
            lines.push(Line::from(Span::styled(
                "devlinks profile set",
                Style::default()
                    .fg(palette.muted)
                    .add_modifier(Modifier::ITALIC),
            )));
        }
    }
    lines.push(Line::from(""));

    let inner_width = usize::from(area.width.saturating_sub(4));
    for (platform, _) in state.preview_links() {
        let info = platform.info();
        let fg = info.foreground.map(rgb).unwrap_or(Color::White);
        let style = Style::default()
            .bg(rgb(info.background))
            .fg(fg)
            .add_modifier(Modifier::BOLD);
        let label = format!(" {}", info.label);
        let pad = inner_width.saturating_sub(label.width() + 2);
        lines.push(Line::from(Span::styled(
            format!("{label}{}→ ", " ".repeat(pad)),
            style,
        )));
        lines.push(Line::from(""));
    }

    let block = Block::default()
        .title(" Preview ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.muted));
    frame.render_widget(Clear, area);
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_status(frame: &mut Frame, state: &AppState, palette: &Palette, area: Rect) {
    let (label, style) = match state.save_status() {
        SaveStatus::Ready => ("ready".to_string(), Style::default().fg(palette.success)),
        SaveStatus::Blocked(blockers) => (
            format!("blocked: {}", blockers.describe()),
            Style::default().fg(palette.muted),
        ),
        SaveStatus::Saving => ("saving…".to_string(), Style::default().fg(palette.drag)),
        SaveStatus::Saved(at) => (
            format!("saved {}", format_time_short(at)),
            Style::default().fg(palette.success),
        ),
        SaveStatus::Failed(message) => (
            format!("failed: {message}"),
            Style::default().fg(palette.error),
        ),
    };

    let count = state.store().len();
    let mut spans = vec![
        Span::raw("Save: "),
        Span::styled(label, style.add_modifier(Modifier::BOLD)),
        Span::raw(format!(" | {count} link{}", if count == 1 { "" } else { "s" })),
    ];
    if state.has_unsaved_changes() {
        spans.push(Span::styled(
            " | unsaved",
            Style::default().fg(palette.drag),
        ));
    }
    if let Some(message) = state.status_message() {
        spans.push(Span::raw(" | "));
        spans.push(Span::raw(message.to_string()));
    }

    let hints = if state.picker().is_some() {
        "j/k choose platform • Enter confirm • Esc cancel"
    } else if state.input().is_some() {
        "type to edit • ←/→ move • Ctrl-←/→ jump segment • Enter/Esc done"
    } else if state.drag_source() == Some(DragSource::Keyboard) {
        "moving link: j/k move • Space drop • Esc cancel"
    } else if state.is_dragging() {
        "release over a link to drop, outside the list to cancel"
    } else {
        "a add • j/k select • Tab field • Enter edit • p platform • Space move • d remove • Ctrl-s save • Ctrl-r reload • q quit"
    };

    let text = Text::from(vec![
        Line::from(spans),
        Line::from(Span::styled(hints, Style::default().fg(Color::DarkGray))),
    ]);
    let paragraph = Paragraph::new(text).block(Block::default().borders(Borders::TOP));
    frame.render_widget(paragraph, area);
}

fn render_platform_picker(frame: &mut Frame, state: &AppState, palette: &Palette) {
    let Some(picker) = state.picker() else {
        return;
    };
    let area = centered_rect(40, 70, frame.size());
    frame.render_widget(Clear, area);

    let items: Vec<ListItem> = catalog::all()
        .map(|info| {
            ListItem::new(Line::from(vec![
                Span::styled(" ■ ", Style::default().fg(rgb(info.background))),
                Span::raw(info.label),
            ]))
        })
        .collect();
    let mut list_state = ListState::default();
    list_state.select(catalog::all().position(|info| info.platform == picker.highlighted));

    let list = List::new(items)
        .block(
            Block::default()
                .title(" Platform ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(palette.accent)),
        )
        .highlight_style(
            Style::default()
                .bg(palette.selection_bg)
                .fg(palette.text)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▸ ");
    frame.render_stateful_widget(list, area, &mut list_state);
}

fn rgb(color: Rgb) -> Color {
    Color::Rgb(color.0, color.1, color.2)
}

fn format_time_short(dt: OffsetDateTime) -> String {
    dt.format(&format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_else(|_| dt.unix_timestamp().to_string())
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    use crate::app::state::EditorOptions;
    use crate::identity::UserId;
    use crate::links::{LinkRecord, LinkStore, Platform};
    use crate::storage::memory::InMemoryLinks;

    fn state_with(records: Vec<LinkRecord>) -> AppState {
        AppState::new(
            Arc::new(InMemoryLinks::new()),
            UserId::new("dev"),
            LinkStore::from_records(records),
            EditorOptions::default(),
        )
    }

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let mut out = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                out.push_str(buffer.get(x, y).symbol());
            }
            out.push('\n');
        }
        out
    }

    #[test]
    fn scroll_offset_keeps_selection_visible() {
        assert_eq!(scroll_offset(0, 3, 5), 0);
        assert_eq!(scroll_offset(4, 10, 3), 2);
        assert_eq!(scroll_offset(9, 10, 3), 7);
        assert_eq!(scroll_offset(1, 10, 3), 0);
    }

    #[test]
    fn empty_collection_renders_call_to_action() -> anyhow::Result<()> {
        let state = state_with(Vec::new());
        let mut terminal = Terminal::new(TestBackend::new(120, 30))?;
        let mut layout = ListLayout::default();
        terminal.draw(|frame| layout = draw_app(frame, &state, &Palette::for_theme(Default::default())))?;
        let screen = buffer_text(&terminal);
        assert!(screen.contains("Let's get you started"));
        assert!(layout.slots.is_empty());
        Ok(())
    }

    #[test]
    fn keyboard_drag_scrolls_to_the_target_row() -> anyhow::Result<()> {
        let mut state = state_with(
            (0..10)
                .map(|i| LinkRecord {
                    platform: Platform::Github,
                    link: format!("https://github.com/{i}"),
                })
                .collect(),
        );
        state.toggle_grab()?;
        state.drag_step(9);
        assert_eq!(state.selected(), 0);
        assert_eq!(state.focus_index(), 9);

        let mut terminal = Terminal::new(TestBackend::new(120, 30))?;
        let mut layout = ListLayout::default();
        terminal.draw(|frame| layout = draw_app(frame, &state, &Palette::for_theme(Default::default())))?;
        assert!(layout.first > 0);
        assert!(layout.first + layout.slots.len() > 9);
        Ok(())
    }

    #[test]
    fn rows_report_one_slot_per_visible_link() -> anyhow::Result<()> {
        let state = state_with(vec![
            LinkRecord {
                platform: Platform::Github,
                link: "https://github.com/x".into(),
            },
            LinkRecord {
                platform: Platform::Youtube,
                link: "https://youtube.com/@x".into(),
            },
        ]);
        let mut terminal = Terminal::new(TestBackend::new(120, 30))?;
        let mut layout = ListLayout::default();
        terminal.draw(|frame| layout = draw_app(frame, &state, &Palette::for_theme(Default::default())))?;
        let screen = buffer_text(&terminal);
        assert!(screen.contains("Link #1"));
        assert!(screen.contains("Link #2"));
        assert!(screen.contains("https://youtube.com/@x"));
        assert_eq!(layout.slots.len(), 2);
        assert_eq!(layout.slots[1].top, layout.slots[0].top + ROW_HEIGHT);
        Ok(())
    }
}
