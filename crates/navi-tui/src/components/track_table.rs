//! TrackTable: one catalog page with a row cursor.

use navi_proto::protocol::{format_duration, PlaybackStatus};
use ratatui::crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::{Constraint, Rect},
    style::Style,
    text::Span,
    widgets::{Cell, Paragraph, Row, Table, TableState},
    Frame,
};

use crate::action::Action;
use crate::app_state::AppState;
use crate::component::Component;
use crate::theme::{status_color, style_default, style_muted, style_secondary, style_selected_focused};
use crate::widgets::pane_chrome::{pane_chrome, Badge};

pub struct TrackTable {
    selected: usize,
    table_state: TableState,
    generation: u64,
}

impl TrackTable {
    pub fn new() -> Self {
        Self {
            selected: 0,
            table_state: TableState::default(),
            generation: 0,
        }
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    fn page_len(state: &AppState) -> usize {
        state.catalog.read().page().len()
    }

    fn select_up(&mut self, n: usize) {
        self.selected = self.selected.saturating_sub(n);
    }

    fn select_down(&mut self, n: usize, len: usize) {
        if len > 0 {
            self.selected = (self.selected + n).min(len - 1);
        }
    }
}

impl Default for TrackTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for TrackTable {
    fn handle_key(&mut self, key: KeyEvent, state: &AppState) -> Vec<Action> {
        let len = Self::page_len(state);
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.select_up(1),
            KeyCode::Down | KeyCode::Char('j') => self.select_down(1, len),
            KeyCode::Home | KeyCode::Char('g') => self.selected = 0,
            KeyCode::End | KeyCode::Char('G') => self.selected = len.saturating_sub(1),
            KeyCode::Enter if self.selected < len => return vec![Action::PlayRow(self.selected)],
            KeyCode::PageDown => return vec![Action::NextPage],
            KeyCode::PageUp => return vec![Action::PrevPage],
            _ => {}
        }
        Vec::new()
    }

    fn on_update(&mut self, state: &AppState) {
        if state.catalog_generation != self.generation {
            self.generation = state.catalog_generation;
            self.selected = 0;
            *self.table_state.offset_mut() = 0;
        }
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState) {
        let catalog = state.catalog.read();
        let badge = (catalog.total_pages() > 1).then(|| Badge {
            text: format!("{}/{}", catalog.current_page(), catalog.total_pages()),
            color: crate::theme::C_SECONDARY,
        });
        let block = pane_chrome("songs", focused, badge);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        if catalog.is_empty() {
            frame.render_widget(
                Paragraph::new(Span::styled("  no songs loaded", style_muted())),
                inner,
            );
            return;
        }

        let start = catalog.page_start();
        let current = state.status.index();
        let rows: Vec<Row> = catalog
            .page()
            .iter()
            .enumerate()
            .map(|(row, track)| {
                let index = start + row;
                let title_style = if current == Some(index) && state.status != PlaybackStatus::Idle {
                    Style::default().fg(status_color(state.status))
                } else {
                    style_default()
                };
                Row::new(vec![
                    Cell::from(Span::styled(format!("{}", index + 1), style_muted())),
                    Cell::from(Span::styled(track.title.clone(), title_style)),
                    Cell::from(Span::styled(track.artist.clone(), style_secondary())),
                    Cell::from(Span::styled(track.album.clone(), style_secondary())),
                    Cell::from(Span::styled(format_duration(track.duration), style_muted())),
                ])
            })
            .collect();

        let header = Row::new(vec!["#", "Title", "Artist", "Album", "Time"]).style(style_muted());
        let table = Table::new(
            rows,
            [
                Constraint::Length(6),
                Constraint::Percentage(40),
                Constraint::Percentage(25),
                Constraint::Percentage(25),
                Constraint::Length(6),
            ],
        )
        .header(header)
        .row_highlight_style(style_selected_focused());

        self.selected = self.selected.min(catalog.page().len().saturating_sub(1));
        self.table_state.select(Some(self.selected));
        frame.render_stateful_widget(table, inner, &mut self.table_state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use navi_proto::catalog::CatalogView;
    use navi_proto::config::KeyBindings;
    use navi_proto::protocol::VolumeLevel;
    use parking_lot::RwLock;
    use ratatui::crossterm::event::KeyModifiers;
    use std::sync::Arc;

    fn state(n: usize, page_size: usize) -> AppState {
        let view = CatalogView::with_tracks(page_size, crate::testing::numbered_tracks(n));
        AppState::new(
            Arc::new(RwLock::new(view)),
            KeyBindings::default(),
            VolumeLevel::default(),
        )
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_cursor_is_clamped_to_page() {
        let s = state(3, 2);
        let mut table = TrackTable::new();
        table.handle_key(key(KeyCode::Down), &s);
        table.handle_key(key(KeyCode::Down), &s);
        assert_eq!(table.selected(), 1);
        table.handle_key(key(KeyCode::Up), &s);
        table.handle_key(key(KeyCode::Up), &s);
        assert_eq!(table.selected(), 0);
    }

    #[test]
    fn test_enter_plays_visible_row() {
        let s = state(3, 10);
        let mut table = TrackTable::new();
        table.handle_key(key(KeyCode::End), &s);
        assert_eq!(table.handle_key(key(KeyCode::Enter), &s), vec![Action::PlayRow(2)]);
    }

    #[test]
    fn test_enter_on_empty_catalog_does_nothing() {
        let s = state(0, 10);
        let mut table = TrackTable::new();
        assert!(table.handle_key(key(KeyCode::Enter), &s).is_empty());
    }

    #[test]
    fn test_catalog_change_resets_cursor() {
        let mut s = state(5, 10);
        let mut table = TrackTable::new();
        table.handle_key(key(KeyCode::End), &s);
        s.catalog_generation += 1;
        table.on_update(&s);
        assert_eq!(table.selected(), 0);
    }

    #[test]
    fn test_paging_keys() {
        let s = state(5, 2);
        let mut table = TrackTable::new();
        assert_eq!(table.handle_key(key(KeyCode::PageDown), &s), vec![Action::NextPage]);
        assert_eq!(table.handle_key(key(KeyCode::PageUp), &s), vec![Action::PrevPage]);
    }
}
