use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::catalog::DEFAULT_PAGE_SIZE;
use super::error::ConfigError;
use super::platform;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub keys: KeysConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
}

/// Subsonic server credentials.  `url`, `username` and `password` have no
/// defaults; `validate` rejects a config without them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_client_name")]
    pub client_name: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Single-character key bindings.  Arrows, Enter, Esc and Ctrl-C are fixed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeysConfig {
    #[serde(default = "default_key_search")]
    pub search: String,
    #[serde(default = "default_key_reload")]
    pub reload: String,
    #[serde(default = "default_key_next")]
    pub next: String,
    #[serde(default = "default_key_previous")]
    pub previous: String,
    #[serde(default = "default_key_toggle_pause")]
    pub toggle_pause: String,
    #[serde(default = "default_key_volume_up")]
    pub volume_up: String,
    #[serde(default = "default_key_volume_down")]
    pub volume_down: String,
    #[serde(default = "default_key_mute")]
    pub mute: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    #[serde(default = "default_initial_volume")]
    pub initial_volume: f64,
    #[serde(default = "default_volume_step")]
    pub volume_step: f64,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

/// Parsed form of [`KeysConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyBindings {
    pub search: char,
    pub reload: char,
    pub next: char,
    pub previous: char,
    pub toggle_pause: char,
    pub volume_up: char,
    pub volume_down: char,
    pub mute: char,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            username: String::new(),
            password: String::new(),
            client_name: default_client_name(),
            api_version: default_api_version(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            search: default_key_search(),
            reload: default_key_reload(),
            next: default_key_next(),
            previous: default_key_previous(),
            toggle_pause: default_key_toggle_pause(),
            volume_up: default_key_volume_up(),
            volume_down: default_key_volume_down(),
            mute: default_key_mute(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            initial_volume: default_initial_volume(),
            volume_step: default_volume_step(),
            page_size: default_page_size(),
        }
    }
}

fn default_client_name() -> String {
    "navicli".to_string()
}

fn default_api_version() -> String {
    "1.16.1".to_string()
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_key_search() -> String {
    "/".to_string()
}

fn default_key_reload() -> String {
    "r".to_string()
}

fn default_key_next() -> String {
    "n".to_string()
}

fn default_key_previous() -> String {
    "p".to_string()
}

fn default_key_toggle_pause() -> String {
    " ".to_string()
}

fn default_key_volume_up() -> String {
    "+".to_string()
}

fn default_key_volume_down() -> String {
    "-".to_string()
}

fn default_key_mute() -> String {
    "m".to_string()
}

fn default_initial_volume() -> f64 {
    50.0
}

fn default_volume_step() -> f64 {
    5.0
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Config {
    /// Find, read, parse and validate the config file.
    ///
    /// An explicit path is the only candidate when given; otherwise the
    /// locations from [`Config::search_paths`] are tried in order.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let candidates = match explicit {
            Some(path) => vec![path.to_path_buf()],
            None => Self::search_paths(),
        };

        let path = candidates
            .iter()
            .find(|p| p.is_file())
            .cloned()
            .ok_or_else(|| ConfigError::NotFound {
                searched: candidates.clone(),
            })?;

        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![platform::config_dir().join("config.toml")];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".config").join("config.toml"));
        }
        paths.push(PathBuf::from("config.toml"));
        paths
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.url.trim().is_empty() {
            return Err(ConfigError::MissingSetting("server.url"));
        }
        if self.server.username.trim().is_empty() {
            return Err(ConfigError::MissingSetting("server.username"));
        }
        if self.server.password.is_empty() {
            return Err(ConfigError::MissingSetting("server.password"));
        }
        if !(self.server.url.starts_with("http://") || self.server.url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                key: "server.url",
                reason: format!("`{}` is not an http(s) url", self.server.url),
            });
        }
        if self.playback.page_size == 0 {
            return Err(ConfigError::Invalid {
                key: "playback.page_size",
                reason: "must be greater than zero".to_string(),
            });
        }
        if !(0.0..=100.0).contains(&self.playback.initial_volume) {
            return Err(ConfigError::Invalid {
                key: "playback.initial_volume",
                reason: format!("{} is outside 0-100", self.playback.initial_volume),
            });
        }
        if self.playback.volume_step <= 0.0 {
            return Err(ConfigError::Invalid {
                key: "playback.volume_step",
                reason: "must be positive".to_string(),
            });
        }
        self.keys.parse()?;
        Ok(())
    }

    /// Base URL without a trailing slash.
    pub fn server_base_url(&self) -> &str {
        self.server.url.trim_end_matches('/')
    }
}

impl KeysConfig {
    pub fn parse(&self) -> Result<KeyBindings, ConfigError> {
        let bindings = KeyBindings {
            search: single_char("keys.search", &self.search)?,
            reload: single_char("keys.reload", &self.reload)?,
            next: single_char("keys.next", &self.next)?,
            previous: single_char("keys.previous", &self.previous)?,
            toggle_pause: single_char("keys.toggle_pause", &self.toggle_pause)?,
            volume_up: single_char("keys.volume_up", &self.volume_up)?,
            volume_down: single_char("keys.volume_down", &self.volume_down)?,
            mute: single_char("keys.mute", &self.mute)?,
        };

        let all = bindings.all();
        for (i, (name, key)) in all.iter().enumerate() {
            if let Some((other, _)) = all[i + 1..].iter().find(|(_, k)| k == key) {
                return Err(ConfigError::Invalid {
                    key: *name,
                    reason: format!("`{}` is also bound to {}", key, other),
                });
            }
        }
        Ok(bindings)
    }
}

impl KeyBindings {
    pub fn all(&self) -> [(&'static str, char); 8] {
        [
            ("keys.search", self.search),
            ("keys.reload", self.reload),
            ("keys.next", self.next),
            ("keys.previous", self.previous),
            ("keys.toggle_pause", self.toggle_pause),
            ("keys.volume_up", self.volume_up),
            ("keys.volume_down", self.volume_down),
            ("keys.mute", self.mute),
        ]
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        // The built-in defaults are distinct single characters.
        KeyBindings {
            search: '/',
            reload: 'r',
            next: 'n',
            previous: 'p',
            toggle_pause: ' ',
            volume_up: '+',
            volume_down: '-',
            mute: 'm',
        }
    }
}

fn single_char(key: &'static str, value: &str) -> Result<char, ConfigError> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(ConfigError::Invalid {
            key,
            reason: format!("expected a single character, got `{}`", value),
        }),
    }
}
