//! Block progress bar and the transport line under the panels.

use navi_proto::protocol::{format_duration, VolumeLevel};
use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::display::Transport;
use crate::theme::{C_MUTED, C_PLAYING, C_PRIMARY, C_SECONDARY};

pub const BAR_CELLS: usize = 30;

const FILLED: char = '▓';
const EMPTY: char = '░';

/// Number of filled cells out of `cells` for `progress` in 0..=1.
pub fn filled_cells(progress: f64, cells: usize) -> usize {
    ((progress.clamp(0.0, 1.0) * cells as f64) as usize).min(cells)
}

/// `▓▓▓░░░… 12.5%`, the way the now-playing panel shows it.
pub fn bar_spans(progress: f64, fill: ratatui::style::Color) -> Vec<Span<'static>> {
    let filled = filled_cells(progress, BAR_CELLS);
    vec![
        Span::styled(FILLED.to_string().repeat(filled), Style::default().fg(fill)),
        Span::styled(
            EMPTY.to_string().repeat(BAR_CELLS - filled),
            Style::default().fg(C_MUTED),
        ),
        Span::styled(
            format!(" {:.1}%", progress.clamp(0.0, 1.0) * 100.0),
            Style::default().fg(C_PRIMARY),
        ),
    ]
}

/// `MM:SS/MM:SS` for a transport state.  Idle and paused show zeros.
pub fn time_label(transport: &Transport) -> String {
    match transport {
        Transport::Progress(snap) => format!(
            "{}/{}",
            format_duration(snap.position.max(0.0) as u32),
            format_duration(snap.duration.max(0.0) as u32)
        ),
        Transport::Idle | Transport::Paused { .. } => "00:00/00:00".to_string(),
    }
}

/// Render the one-line transport strip: time, volume or `MUTE`.
pub fn draw_transport(frame: &mut Frame, area: Rect, transport: &Transport, volume: VolumeLevel) {
    if area.width < 4 || area.height == 0 {
        return;
    }

    let time_color = match transport {
        Transport::Progress(_) => C_PRIMARY,
        _ => C_MUTED,
    };
    let volume_color = match volume {
        VolumeLevel::Muted => C_MUTED,
        VolumeLevel::Percent(_) => C_PLAYING,
    };

    let spans = vec![
        Span::styled(format!(" {}", time_label(transport)), Style::default().fg(time_color)),
        Span::styled("  vol ", Style::default().fg(C_SECONDARY)),
        Span::styled(volume.to_string(), Style::default().fg(volume_color)),
    ];
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::ProgressSnapshot;

    #[test]
    fn test_filled_cells() {
        assert_eq!(filled_cells(0.25, BAR_CELLS), 7);
        assert_eq!(filled_cells(1.0, BAR_CELLS), 30);
        assert_eq!(filled_cells(1.5, BAR_CELLS), 30);
        assert_eq!(filled_cells(-0.2, BAR_CELLS), 0);
    }

    #[test]
    fn test_time_label() {
        let snap = ProgressSnapshot {
            position: 30.4,
            duration: 125.0,
            progress: 0.24,
            volume: VolumeLevel::Percent(50.0),
        };
        assert_eq!(time_label(&Transport::Progress(snap)), "00:30/02:05");
        assert_eq!(time_label(&Transport::Idle), "00:00/00:00");
    }

    #[test]
    fn test_bar_has_fixed_width() {
        let spans = bar_spans(0.5, C_PLAYING);
        let cells: usize = spans[..2].iter().map(|s| s.content.chars().count()).sum();
        assert_eq!(cells, BAR_CELLS);
        assert_eq!(spans[2].content, " 50.0%");
    }
}
