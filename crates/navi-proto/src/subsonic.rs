//! Subsonic REST client: the remote catalog the player browses.
//!
//! Every request carries the token auth scheme: a fresh random salt, `t =
//! md5(password + salt)`, plus user, API version, client name and `f=json`.

use std::time::Duration;

use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Deserialize;
use tracing::debug;

use crate::config::ServerConfig;
use crate::error::CatalogError;
use crate::protocol::Track;

/// Songs requested per `search3` page.
pub const FETCH_PAGE_SIZE: usize = 500;

const SALT_LEN: usize = 12;

/// The catalog as seen by the player.  Implementations must not panic;
/// every failure is returned as a [`CatalogError`].
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Whole song list, in server order.
    async fn fetch_catalog(&self) -> Result<Vec<Track>, CatalogError>;

    /// Streamable URL for one track.
    async fn resolve_play_url(&self, track_id: &str) -> Result<String, CatalogError>;

    /// Cheap connectivity and credentials check.
    async fn ping(&self) -> Result<(), CatalogError>;
}

#[derive(Debug, Clone)]
pub struct SubsonicClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    client_name: String,
    api_version: String,
    fetch_page_size: usize,
}

impl SubsonicClient {
    pub fn new(server: &ServerConfig) -> Result<Self, CatalogError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(server.request_timeout_secs.max(1)))
            .user_agent(format!("{}/{}", server.client_name, env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: server.url.trim_end_matches('/').to_string(),
            username: server.username.clone(),
            password: server.password.clone(),
            client_name: server.client_name.clone(),
            api_version: server.api_version.clone(),
            fetch_page_size: FETCH_PAGE_SIZE,
        })
    }

    /// Override the `search3` page size.  Zero is treated as one.
    pub fn with_fetch_page_size(mut self, size: usize) -> Self {
        self.fetch_page_size = size.max(1);
        self
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/rest/{}", self.base_url, method)
    }

    fn auth_params(&self) -> Vec<(&'static str, String)> {
        self.auth_params_with_salt(&random_salt())
    }

    fn auth_params_with_salt(&self, salt: &str) -> Vec<(&'static str, String)> {
        vec![
            ("u", self.username.clone()),
            ("t", auth_token(&self.password, salt)),
            ("s", salt.to_string()),
            ("v", self.api_version.clone()),
            ("c", self.client_name.clone()),
            ("f", "json".to_string()),
        ]
    }

    async fn call(
        &self,
        method: &str,
        extra: &[(&'static str, String)],
    ) -> Result<ResponseBody, CatalogError> {
        let mut params = self.auth_params();
        params.extend_from_slice(extra);

        let body = self
            .http
            .get(self.endpoint(method))
            .query(&params)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_response(&body)
    }

    fn stream_url_with_salt(&self, track_id: &str, salt: &str) -> Result<String, CatalogError> {
        if track_id.is_empty() {
            return Err(CatalogError::Resolution {
                id: String::new(),
                reason: "empty track id".to_string(),
            });
        }

        let mut params = self.auth_params_with_salt(salt);
        params.push(("id", track_id.to_string()));

        reqwest::Url::parse_with_params(&self.endpoint("stream"), &params)
            .map(|url| url.to_string())
            .map_err(|e| CatalogError::Resolution {
                id: track_id.to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl CatalogService for SubsonicClient {
    async fn fetch_catalog(&self) -> Result<Vec<Track>, CatalogError> {
        let mut tracks = Vec::new();
        let mut offset = 0usize;

        loop {
            let body = self
                .call(
                    "search3",
                    &[
                        ("query", String::new()),
                        ("artistCount", "0".to_string()),
                        ("albumCount", "0".to_string()),
                        ("songCount", self.fetch_page_size.to_string()),
                        ("songOffset", offset.to_string()),
                    ],
                )
                .await?;

            let songs = body.search_result3.map(|r| r.song).unwrap_or_default();
            let count = songs.len();
            tracks.extend(songs.into_iter().map(Track::from));
            debug!("search3 offset {}: {} songs", offset, count);

            if count < self.fetch_page_size {
                break;
            }
            offset += count;
        }

        Ok(tracks)
    }

    async fn resolve_play_url(&self, track_id: &str) -> Result<String, CatalogError> {
        self.stream_url_with_salt(track_id, &random_salt())
    }

    async fn ping(&self) -> Result<(), CatalogError> {
        self.call("ping", &[]).await.map(|_| ())
    }
}

pub fn auth_token(password: &str, salt: &str) -> String {
    format!("{:x}", md5::compute(format!("{}{}", password, salt)))
}

fn random_salt() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SALT_LEN)
        .map(char::from)
        .collect()
}

// ── Wire format ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "subsonic-response")]
    response: ResponseBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseBody {
    status: String,
    #[serde(default)]
    error: Option<ApiError>,
    #[serde(default)]
    search_result3: Option<SearchResult3>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct SearchResult3 {
    #[serde(default)]
    song: Vec<Song>,
}

#[derive(Debug, Deserialize)]
struct Song {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    artist: String,
    #[serde(default)]
    album: String,
    #[serde(default)]
    duration: u32,
    #[serde(default)]
    size: u64,
}

impl From<Song> for Track {
    fn from(song: Song) -> Self {
        Track {
            id: song.id,
            title: song.title,
            artist: song.artist,
            album: song.album,
            duration: song.duration,
            size: song.size,
        }
    }
}

fn parse_response(body: &str) -> Result<ResponseBody, CatalogError> {
    let envelope: Envelope = serde_json::from_str(body)
        .map_err(|e| CatalogError::Network(format!("invalid subsonic response: {}", e)))?;
    let response = envelope.response;

    if response.status != "ok" {
        let (code, message) = response
            .error
            .map(|e| (e.code, e.message))
            .unwrap_or((0, format!("status `{}`", response.status)));
        return Err(CatalogError::Server { code, message });
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> SubsonicClient {
        let server = ServerConfig {
            url: "https://music.example.com/".to_string(),
            username: "alice".to_string(),
            password: "sesame".to_string(),
            ..ServerConfig::default()
        };
        SubsonicClient::new(&server).unwrap()
    }

    #[test]
    fn test_auth_token_is_md5_of_password_and_salt() {
        // md5("sesamec19b2d")
        assert_eq!(auth_token("sesame", "c19b2d"), "26719a1196d2a940705a59634eb18eab");
    }

    #[test]
    fn test_auth_params() {
        let params = client().auth_params_with_salt("abc");
        let get = |k: &str| params.iter().find(|(n, _)| *n == k).map(|(_, v)| v.as_str());
        assert_eq!(get("u"), Some("alice"));
        assert_eq!(get("s"), Some("abc"));
        assert_eq!(get("v"), Some("1.16.1"));
        assert_eq!(get("c"), Some("navicli"));
        assert_eq!(get("f"), Some("json"));
        assert_eq!(get("t"), Some(auth_token("sesame", "abc").as_str()));
        assert!(params.iter().all(|(n, _)| *n != "p"));
    }

    #[test]
    fn test_random_salt_changes() {
        let a = random_salt();
        assert_eq!(a.len(), SALT_LEN);
        assert_ne!(a, random_salt());
    }

    #[test]
    fn test_stream_url() {
        let url = client().stream_url_with_salt("tr-1", "xyz").unwrap();
        assert!(url.starts_with("https://music.example.com/rest/stream?"));
        assert!(url.contains("id=tr-1"));
        assert!(url.contains("s=xyz"));
        assert!(!url.contains("sesame"));
    }

    #[test]
    fn test_stream_url_rejects_empty_id() {
        assert!(matches!(
            client().stream_url_with_salt("", "xyz"),
            Err(CatalogError::Resolution { .. })
        ));
    }

    #[test]
    fn test_parse_search_result() {
        let body = r#"{"subsonic-response":{"status":"ok","version":"1.16.1",
            "searchResult3":{"song":[
                {"id":"1","title":"One","artist":"A","album":"X","duration":200,"size":4194304,"suffix":"mp3"},
                {"id":"2","title":"Two"}
            ]}}}"#;
        let songs = parse_response(body).unwrap().search_result3.unwrap().song;
        let tracks: Vec<Track> = songs.into_iter().map(Track::from).collect();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].size_mb(), 4.0);
        assert_eq!(tracks[1].artist, "");
        assert_eq!(tracks[1].duration, 0);
    }

    #[test]
    fn test_parse_failed_status() {
        let body = r#"{"subsonic-response":{"status":"failed","version":"1.16.1",
            "error":{"code":40,"message":"Wrong username or password"}}}"#;
        assert_eq!(
            parse_response(body).unwrap_err(),
            CatalogError::Server {
                code: 40,
                message: "Wrong username or password".to_string()
            }
        );
    }

    #[test]
    fn test_parse_garbage_is_network_error() {
        assert!(matches!(
            parse_response("<html>"),
            Err(CatalogError::Network(_))
        ));
    }
}
