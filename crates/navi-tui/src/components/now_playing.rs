//! NowPlaying panel. Shows welcome text until something is played,
//! then the current track with its state and progress.

use navi_proto::config::KeyBindings;
use navi_proto::protocol::{format_duration, PlaybackStatus, Track};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Wrap},
    Frame,
};

use crate::app_state::AppState;
use crate::component::Component;
use crate::display::Transport;
use crate::theme::{
    status_color, style_default, style_muted, style_secondary, C_ERROR, C_LOADING, C_MUTED,
    C_PLAYING, C_SECONDARY,
};
use crate::widgets::pane_chrome::pane_chrome;
use crate::widgets::progress_bar::bar_spans;

pub struct NowPlaying;

impl NowPlaying {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NowPlaying {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for NowPlaying {
    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState) {
        let block = pane_chrome("now playing", focused, None);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let lines = match (&state.current_track, state.status) {
            (Some(track), status) if status != PlaybackStatus::Idle => {
                track_lines(track, status, &state.transport)
            }
            _ => welcome_lines(&state.keys, state.song_count()),
        };
        frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);
    }
}

/// Panel text for a track in `status`.
pub fn track_lines(track: &Track, status: PlaybackStatus, transport: &Transport) -> Vec<Line<'static>> {
    let number = status.index().map(|i| i + 1).unwrap_or(0);
    let title = Span::styled(
        track.title.clone(),
        Style::default()
            .fg(status_color(status))
            .add_modifier(Modifier::BOLD),
    );

    let mut lines = vec![Line::from(Span::styled(format!("Current {}:", number), style_default()))];
    lines.push(match status {
        PlaybackStatus::Loading(_) => Line::from(vec![
            title,
            Span::styled(" (Loading)", Style::default().fg(C_LOADING)),
        ]),
        PlaybackStatus::Paused(_) => Line::from(vec![
            title,
            Span::styled(" (PAUSED)", Style::default().fg(C_MUTED)),
        ]),
        PlaybackStatus::Failed(_) => Line::from(vec![
            title,
            Span::styled(" (Failed)", Style::default().fg(C_ERROR)),
        ]),
        _ => Line::from(title),
    });
    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        format!("length  {}", format_duration(track.duration)),
        style_secondary(),
    )));
    lines.push(Line::from(Span::styled(
        format!("size    {:.1} MB", track.size_mb()),
        style_secondary(),
    )));
    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        format!("{} - {}", track.artist, track.album),
        style_muted(),
    )));
    lines.push(Line::default());

    match status {
        PlaybackStatus::Failed(_) => {
            lines.push(Line::from(Span::styled("Play Failed", Style::default().fg(C_ERROR))));
        }
        PlaybackStatus::Loading(_) => {
            lines.push(Line::from(bar_spans(0.0, C_LOADING)));
        }
        _ => {
            let progress = match transport {
                Transport::Progress(snap) => snap.progress,
                _ => 0.0,
            };
            let fill = if matches!(status, PlaybackStatus::Paused(_)) {
                C_SECONDARY
            } else {
                C_PLAYING
            };
            lines.push(Line::from(bar_spans(progress, fill)));
        }
    }
    lines
}

/// Welcome text with key help and the catalog size.
pub fn welcome_lines(keys: &KeyBindings, songs: usize) -> Vec<Line<'static>> {
    let help = |keys: String, what: &str| {
        Line::from(vec![
            Span::styled(format!("{:<10}", keys), Style::default().fg(C_SECONDARY)),
            Span::styled(what.to_string(), style_muted()),
        ])
    };
    let name = |c: char| if c == ' ' { "space".to_string() } else { c.to_string() };

    let mut lines = vec![
        Line::from(Span::styled(
            "Welcome to NaviCLI",
            Style::default().fg(C_PLAYING).add_modifier(Modifier::BOLD),
        )),
        Line::default(),
        help(name(keys.toggle_pause), "play / pause"),
        help(format!("{} / →", name(keys.next)), "next"),
        help(format!("{} / ←", name(keys.previous)), "previous"),
        help(format!("{} {}", name(keys.volume_up), name(keys.volume_down)), "volume"),
        help(name(keys.mute), "mute"),
        help(name(keys.search), "search"),
        help(name(keys.reload), "reload catalog"),
        help("enter".to_string(), "play selected"),
        help("pgup pgdn".to_string(), "page"),
        help("esc".to_string(), "quit"),
        Line::default(),
    ];
    lines.push(if songs == 0 {
        Line::from(Span::styled("loading catalog…", style_muted()))
    } else {
        Line::from(Span::styled(format!("// {} songs", songs), style_muted()))
    });
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(lines: &[Line]) -> String {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn track() -> Track {
        Track {
            id: "t1".into(),
            title: "Song".into(),
            artist: "Band".into(),
            album: "Record".into(),
            duration: 125,
            size: 5 * 1024 * 1024,
        }
    }

    #[test]
    fn test_welcome_lists_keys_and_count() {
        let out = text(&welcome_lines(&KeyBindings::default(), 42));
        assert!(out.contains("Welcome to NaviCLI"));
        assert!(out.contains("space"));
        assert!(out.contains("n / →"));
        assert!(out.contains("// 42 songs"));
    }

    #[test]
    fn test_failed_track() {
        let out = text(&track_lines(&track(), PlaybackStatus::Failed(3), &Transport::Idle));
        assert!(out.contains("Current 4:"));
        assert!(out.contains("Song (Failed)"));
        assert!(out.contains("Play Failed"));
    }

    #[test]
    fn test_failed_marker_is_alarmed() {
        let lines = track_lines(&track(), PlaybackStatus::Failed(0), &Transport::Idle);
        let title_line = &lines[1];
        assert!(title_line.spans.iter().all(|s| s.style.fg == Some(C_ERROR)));
        assert_eq!(title_line.spans[1].content, " (Failed)");
    }

    #[test]
    fn test_paused_track() {
        let out = text(&track_lines(&track(), PlaybackStatus::Paused(0), &Transport::Idle));
        assert!(out.contains("Song (PAUSED)"));
        assert!(out.contains("02:05"));
        assert!(out.contains("5.0 MB"));
        assert!(out.contains("Band - Record"));
    }
}
