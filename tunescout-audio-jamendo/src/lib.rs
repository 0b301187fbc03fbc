//! Jamendo open-audio catalog as a fallback stream source.

pub mod config;

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};
use tunescout_core::{AlternateAudioResolver, AlternateTrack, CoreError};

pub use config::{JamendoConfig, CONFIG_TEMPLATE as JAMENDO_CONFIG_TEMPLATE};

/// Default timeout for HTTP requests (10 seconds)
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Jamendo returns ids as strings, but older endpoints use numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JamendoId {
    Text(String),
    Number(u64),
}

impl From<JamendoId> for String {
    fn from(id: JamendoId) -> Self {
        match id {
            JamendoId::Text(text) => text,
            JamendoId::Number(number) => number.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct JamendoHeaders {
    status: String,
    #[serde(default)]
    error_message: String,
}

/// Response from the `/tracks/` endpoint.
/// Note: results carry many more fields (album, license, ...) that we don't use.
#[derive(Debug, Deserialize)]
struct JamendoResponse {
    headers: JamendoHeaders,
    #[serde(default)]
    results: Vec<JamendoTrack>,
}

#[derive(Debug, Deserialize)]
struct JamendoTrack {
    id: JamendoId,
    name: String,
    artist_name: String,
    audio: String,
    /// Length in seconds
    #[serde(default)]
    duration: u64,
    #[serde(default)]
    album_image: Option<String>,
}

impl From<JamendoTrack> for AlternateTrack {
    fn from(track: JamendoTrack) -> Self {
        Self {
            id: track.id.into(),
            name: track.name,
            artist: track.artist_name,
            audio_url: track.audio,
            duration_ms: track.duration.saturating_mul(1000),
            image_url: track.album_image.filter(|url| !url.is_empty()),
        }
    }
}

/// Jamendo resolver implementing [`AlternateAudioResolver`]
pub struct JamendoResolver {
    client: reqwest::Client,
    config: JamendoConfig,
}

impl JamendoResolver {
    /// Create a new Jamendo resolver with default 10-second timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: JamendoConfig) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| CoreError::ProviderFailed {
                provider: config::PROVIDER_NAME.into(),
                reason: e.to_string(),
            })?;

        if config.client_id.is_empty() {
            warn!("Jamendo client_id is not set; tracks without a preview will show an error");
        }

        Ok(Self { client, config })
    }

    /// Check if a client ID is configured
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.config.client_id.is_empty()
    }

    /// Query Jamendo for the best match; transport and decode failures are
    /// returned as `Err(reason)` for the caller to log.
    async fn lookup(&self, search: &str) -> Result<Option<AlternateTrack>, String> {
        let url = format!("{}/tracks/", self.config.api_url.trim_end_matches('/'));
        info!("Jamendo GET: {} (search: {:?})", url, search);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("client_id", self.config.client_id.as_str()),
                ("format", "json"),
                ("search", search),
                ("limit", "1"),
                ("include", "musicinfo"),
                ("audioformat", "mp3"),
            ])
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("Jamendo returned status: {status}"));
        }

        let body: JamendoResponse = response.json().await.map_err(|e| e.to_string())?;
        if body.headers.status != "success" {
            return Err(format!(
                "Jamendo request failed: {}",
                body.headers.error_message
            ));
        }

        Ok(body.results.into_iter().next().map(AlternateTrack::from))
    }
}

#[async_trait]
impl AlternateAudioResolver for JamendoResolver {
    fn name(&self) -> &'static str {
        config::PROVIDER_NAME
    }

    async fn resolve(
        &self,
        track_name: &str,
        artist_name: &str,
    ) -> Result<Option<AlternateTrack>, CoreError> {
        if !self.is_configured() {
            return Err(CoreError::ConfigMissingField {
                field: "providers.jamendo.client_id".into(),
            });
        }

        let search = format!("{track_name} {artist_name}");
        match self.lookup(search.trim()).await {
            Ok(Some(track)) => {
                info!("Jamendo match {} for {:?}", track.id, search);
                Ok(Some(track))
            }
            Ok(None) => {
                debug!("No Jamendo match for {:?}", search);
                Ok(None)
            }
            Err(reason) => {
                warn!("Jamendo lookup failed, treating as no match: {}", reason);
                Ok(None)
            }
        }
    }
}
