//! SearchInput: wraps tui-input for the `/` search overlay.

use ratatui::crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Clear, Paragraph},
    Frame,
};
use tui_input::{backend::crossterm::EventHandler, Input};

use crate::theme::{style_focused_border, C_FILTER_BG, C_FILTER_FG, C_MUTED};

#[derive(Debug, PartialEq)]
pub enum SearchAction {
    /// Enter with a non-empty query.
    Submit(String),
    Cancelled,
    None,
}

pub struct SearchInput {
    input: Input,
    placeholder: String,
}

impl SearchInput {
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            input: Input::default(),
            placeholder: placeholder.into(),
        }
    }

    pub fn clear(&mut self) {
        self.input = Input::default();
    }

    pub fn text(&self) -> &str {
        self.input.value()
    }

    /// Esc and Ctrl-C cancel.  Enter on a blank query does nothing.
    pub fn handle_key(&mut self, key: KeyEvent) -> SearchAction {
        match key.code {
            KeyCode::Esc => SearchAction::Cancelled,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                SearchAction::Cancelled
            }
            KeyCode::Enter => {
                let query = self.input.value().trim();
                if query.is_empty() {
                    SearchAction::None
                } else {
                    SearchAction::Submit(query.to_string())
                }
            }
            _ => {
                self.input.handle_event(&Event::Key(key));
                SearchAction::None
            }
        }
    }

    /// Render as a centered single-line box over `area`.
    pub fn draw(&self, frame: &mut Frame, area: Rect) {
        let width = (area.width / 2).clamp(20, 60).min(area.width);
        let rect = Rect {
            x: area.x + (area.width.saturating_sub(width)) / 2,
            y: area.y + area.height.saturating_sub(3) / 2,
            width,
            height: 3.min(area.height),
        };
        frame.render_widget(Clear, rect);

        let block = ratatui::widgets::Block::bordered()
            .border_style(style_focused_border())
            .title(" search ");
        let inner = block.inner(rect);
        frame.render_widget(block, rect);

        let scroll = self.input.visual_scroll(inner.width.saturating_sub(3) as usize);
        let value = self.input.value();
        let display = if value.is_empty() {
            Span::styled(format!("/ {}", self.placeholder), Style::default().fg(C_MUTED))
        } else {
            let visible: String = value.chars().skip(scroll).collect();
            Span::styled(format!("/ {}", visible), Style::default().fg(C_FILTER_FG))
        };
        frame.render_widget(
            Paragraph::new(Line::from(vec![display])).style(Style::default().bg(C_FILTER_BG)),
            inner,
        );

        if inner.width > 0 && inner.height > 0 {
            let cursor_x = inner.x + 2 + (self.input.visual_cursor().saturating_sub(scroll)) as u16;
            frame.set_cursor_position((cursor_x.min(inner.x + inner.width - 1), inner.y));
        }
    }
}

impl Default for SearchInput {
    fn default() -> Self {
        Self::new("title, artist or album")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn typed(text: &str) -> SearchInput {
        let mut input = SearchInput::default();
        for c in text.chars() {
            input.handle_key(key(KeyCode::Char(c)));
        }
        input
    }

    #[test]
    fn test_enter_submits_trimmed_query() {
        let mut input = typed(" abc ");
        assert_eq!(input.text(), " abc ");
        assert_eq!(
            input.handle_key(key(KeyCode::Enter)),
            SearchAction::Submit("abc".to_string())
        );
    }

    #[test]
    fn test_enter_on_blank_is_ignored() {
        let mut input = typed("  ");
        assert_eq!(input.handle_key(key(KeyCode::Enter)), SearchAction::None);
    }

    #[test]
    fn test_escape_and_ctrl_c_cancel() {
        let mut input = typed("x");
        assert_eq!(input.handle_key(key(KeyCode::Esc)), SearchAction::Cancelled);
        assert_eq!(
            input.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            SearchAction::Cancelled
        );
    }
}
