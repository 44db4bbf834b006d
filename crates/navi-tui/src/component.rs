//! Component trait: the interface every UI panel implements.
//!
//! Components own their view state and render themselves, read `AppState`
//! for data they don't own, and produce `Vec<Action>` instead of mutating
//! shared state.

use ratatui::crossterm::event::KeyEvent;
use ratatui::{layout::Rect, Frame};

use crate::action::Action;
use crate::app_state::AppState;

pub trait Component {
    /// Handle a key the global keymap did not claim.
    fn handle_key(&mut self, _key: KeyEvent, _state: &AppState) -> Vec<Action> {
        Vec::new()
    }

    /// React to a display update already folded into `state`.
    fn on_update(&mut self, _state: &AppState) {}

    /// Render the component into `area`.
    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState);
}
