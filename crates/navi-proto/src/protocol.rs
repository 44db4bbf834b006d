use serde::{Deserialize, Serialize};

/// One song from the remote catalog.  Identity is `id`; never mutated after
/// it has been fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Track {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub album: String,
    /// Length in seconds.
    #[serde(default)]
    pub duration: u32,
    /// File size in bytes.
    #[serde(default)]
    pub size: u64,
}

impl Track {
    pub fn size_mb(&self) -> f64 {
        self.size as f64 / 1024.0 / 1024.0
    }

    /// True if title, artist or album contains `needle`.  `needle` must
    /// already be lowercase.
    pub fn matches(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self.artist.to_lowercase().contains(needle)
            || self.album.to_lowercase().contains(needle)
    }
}

/// `MM:SS`, minutes are not wrapped into hours.
pub fn format_duration(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Where the playback session is.  The index always refers to the catalog
/// position the request was made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Loading(usize),
    Playing(usize),
    Paused(usize),
    Failed(usize),
}

impl PlaybackStatus {
    pub fn index(self) -> Option<usize> {
        match self {
            Self::Idle => None,
            Self::Loading(i) | Self::Playing(i) | Self::Paused(i) | Self::Failed(i) => Some(i),
        }
    }

    pub fn is_loading(self) -> bool {
        matches!(self, Self::Loading(_))
    }

    pub fn is_playing(self) -> bool {
        matches!(self, Self::Playing(_))
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading(_) => "loading",
            Self::Playing(_) => "playing",
            Self::Paused(_) => "paused",
            Self::Failed(_) => "failed",
        }
    }
}

/// Point-in-time copy of the session, safe to hand across tasks.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionSnapshot {
    pub status: PlaybackStatus,
    pub current_index: Option<usize>,
    pub current_track: Option<Track>,
}

impl SessionSnapshot {
    pub fn loading(&self) -> bool {
        self.status.is_loading()
    }

    pub fn playing(&self) -> bool {
        self.status.is_playing()
    }
}

/// Volume as shown in the transport line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VolumeLevel {
    Percent(f64),
    Muted,
}

impl VolumeLevel {
    pub fn new(volume: f64, muted: bool) -> Self {
        if muted {
            Self::Muted
        } else {
            Self::Percent(volume)
        }
    }
}

impl Default for VolumeLevel {
    fn default() -> Self {
        Self::Percent(100.0)
    }
}

impl std::fmt::Display for VolumeLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Percent(v) => write!(f, "{:.0}%", v),
            Self::Muted => f.write_str("MUTE"),
        }
    }
}
