//! Action enum and the global keymap.

use navi_proto::config::KeyBindings;
use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// All actions that can flow through the system.
/// Components produce Actions; the App dispatches them.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    // ── Playback ─────────────────────────────────────────────────────────────
    PlayRow(usize), // visible row on the current page
    TogglePause,
    Next,
    Previous,
    VolumeUp,
    VolumeDown,
    ToggleMute,

    // ── Catalog ──────────────────────────────────────────────────────────────
    NextPage,
    PrevPage,
    Reload,

    // ── Search ───────────────────────────────────────────────────────────────
    OpenSearch,
    Search(String),
    CancelSearch,

    Quit,
}

/// Map a key pressed outside the search overlay to a global action.
///
/// Bound characters match case-insensitively, and `=`/`_` are the unshifted
/// aliases of `+`/`-`.  Keys the table handles (Up/Down, Enter, paging)
/// return `None`.
pub fn map_key(key: KeyEvent, keys: &KeyBindings) -> Option<Action> {
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Action::Quit),
        KeyCode::Esc => Some(Action::Quit),
        KeyCode::Right => Some(Action::Next),
        KeyCode::Left => Some(Action::Previous),
        KeyCode::Char(c) => map_char(c, keys).or(match c {
            '=' => Some(Action::VolumeUp),
            '_' => Some(Action::VolumeDown),
            _ => None,
        }),
        _ => None,
    }
}

fn map_char(c: char, keys: &KeyBindings) -> Option<Action> {
    let bound = |k: char| k == c || (k.is_ascii_alphabetic() && k.eq_ignore_ascii_case(&c));
    if bound(keys.toggle_pause) {
        Some(Action::TogglePause)
    } else if bound(keys.next) {
        Some(Action::Next)
    } else if bound(keys.previous) {
        Some(Action::Previous)
    } else if bound(keys.volume_up) {
        Some(Action::VolumeUp)
    } else if bound(keys.volume_down) {
        Some(Action::VolumeDown)
    } else if bound(keys.mute) {
        Some(Action::ToggleMute)
    } else if bound(keys.search) {
        Some(Action::OpenSearch)
    } else if bound(keys.reload) {
        Some(Action::Reload)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_default_bindings() {
        let keys = KeyBindings::default();
        assert_eq!(map_key(key(KeyCode::Char(' ')), &keys), Some(Action::TogglePause));
        assert_eq!(map_key(key(KeyCode::Char('n')), &keys), Some(Action::Next));
        assert_eq!(map_key(key(KeyCode::Char('N')), &keys), Some(Action::Next));
        assert_eq!(map_key(key(KeyCode::Char('P')), &keys), Some(Action::Previous));
        assert_eq!(map_key(key(KeyCode::Char('M')), &keys), Some(Action::ToggleMute));
        assert_eq!(map_key(key(KeyCode::Char('/')), &keys), Some(Action::OpenSearch));
        assert_eq!(map_key(key(KeyCode::Char('r')), &keys), Some(Action::Reload));
    }

    #[test]
    fn test_volume_aliases() {
        let keys = KeyBindings::default();
        assert_eq!(map_key(key(KeyCode::Char('+')), &keys), Some(Action::VolumeUp));
        assert_eq!(map_key(key(KeyCode::Char('=')), &keys), Some(Action::VolumeUp));
        assert_eq!(map_key(key(KeyCode::Char('-')), &keys), Some(Action::VolumeDown));
        assert_eq!(map_key(key(KeyCode::Char('_')), &keys), Some(Action::VolumeDown));
    }

    #[test]
    fn test_fixed_keys() {
        let keys = KeyBindings::default();
        assert_eq!(map_key(key(KeyCode::Right), &keys), Some(Action::Next));
        assert_eq!(map_key(key(KeyCode::Left), &keys), Some(Action::Previous));
        assert_eq!(map_key(key(KeyCode::Esc), &keys), Some(Action::Quit));
        assert_eq!(
            map_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL), &keys),
            Some(Action::Quit)
        );
        assert_eq!(map_key(key(KeyCode::Enter), &keys), None);
        assert_eq!(map_key(key(KeyCode::Down), &keys), None);
        assert_eq!(map_key(key(KeyCode::Char('z')), &keys), None);
    }

    #[test]
    fn test_rebound_keys() {
        let keys = KeyBindings {
            next: 'j',
            previous: 'k',
            ..KeyBindings::default()
        };
        assert_eq!(map_key(key(KeyCode::Char('j')), &keys), Some(Action::Next));
        assert_eq!(map_key(key(KeyCode::Char('n')), &keys), None);
    }
}
