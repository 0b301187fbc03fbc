//! Wiring of the library crates into one application context.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tunescout_audio_jamendo::{JamendoConfig, JamendoResolver};
use tunescout_core::{
    FileStore, Navigator, PlaybackSelector, SearchOrchestrator, SystemClock, TunescoutConfig,
    VirtualAudioOutput,
};
use tunescout_spotify_api::{
    CatalogClient, CredentialManager, SpotifyCatalogSearch, SpotifyError, SpotifyProviderConfig,
};

use crate::error::Result;

/// Timeout for identity service requests (10 seconds)
const IDENTITY_TIMEOUT_SECS: u64 = 10;

/// Navigation target for a terminal front end: there is no login page, so
/// the user is told which command to run.
pub struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn navigate(&self, path: &str) {
        warn!(
            "Spotify session is no longer valid ({}); run `tunescout login` to sign in again",
            path
        );
    }
}

fn identity_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(IDENTITY_TIMEOUT_SECS))
        .build()
        .map_err(SpotifyError::from)?)
}

pub struct App {
    pub config: TunescoutConfig,
    pub credentials: Arc<CredentialManager>,
    pub catalog: Arc<CatalogClient>,
    pub resolver: Arc<JamendoResolver>,
    pub cancel_token: CancellationToken,
}

impl App {
    /// Build the application context from config.
    ///
    /// # Errors
    ///
    /// Returns an error if provider config is invalid or an HTTP client
    /// cannot be created.
    pub fn new(config: TunescoutConfig, cancel_token: CancellationToken) -> Result<Self> {
        let spotify_config = SpotifyProviderConfig::resolve(&config.providers)?;
        spotify_config.validate()?;

        let jamendo_config = JamendoConfig::resolve(&config.providers)?;

        let credentials = Arc::new(CredentialManager::new(
            spotify_config,
            Arc::new(FileStore::at_default_path()),
            identity_client()?,
            Arc::new(SystemClock),
            Arc::new(TerminalNavigator),
        ));
        let catalog = Arc::new(CatalogClient::new(credentials.clone())?);
        let resolver = Arc::new(JamendoResolver::new(jamendo_config)?);

        info!(
            "Tunescout ready (market {}, alternate audio: {})",
            config.catalog.market,
            if resolver.is_configured() { "jamendo" } else { "not configured" }
        );

        Ok(Self {
            config,
            credentials,
            catalog,
            resolver,
            cancel_token,
        })
    }

    pub fn market(&self) -> &str {
        &self.config.catalog.market
    }

    /// New playback selector bound to a virtual output
    pub fn playback_selector(&self) -> Arc<PlaybackSelector> {
        PlaybackSelector::new(self.resolver.clone(), Arc::new(VirtualAudioOutput::new()))
    }

    /// New search orchestrator using the configured market, limit and
    /// debounce window
    pub fn search_orchestrator(&self) -> Arc<SearchOrchestrator> {
        let backend = SpotifyCatalogSearch::new(
            self.catalog.clone(),
            self.config.catalog.market.clone(),
            self.config.catalog.search_limit,
        );
        SearchOrchestrator::new(
            Arc::new(backend),
            Duration::from_millis(self.config.search.debounce_ms),
        )
    }
}
