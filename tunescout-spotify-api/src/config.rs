//! Spotify provider configuration.

use const_format::concatcp;
use serde::{Deserialize, Serialize};
use tunescout_core::{CoreError, ProvidersConfig};

/// Provider name used in config file
pub const PROVIDER_NAME: &str = "spotify";

/// Identity service base URL
pub const DEFAULT_ACCOUNTS_URL: &str = "https://accounts.spotify.com";

/// Web API base URL
pub const DEFAULT_API_BASE_URL: &str = "https://api.spotify.com";

/// OAuth redirect URI served by the local callback listener
pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8888/callback";

const ENV_CLIENT_ID: &str = "TUNESCOUT_SPOTIFY_CLIENT_ID";
const ENV_CLIENT_SECRET: &str = "TUNESCOUT_SPOTIFY_CLIENT_SECRET";
const ENV_REDIRECT_URI: &str = "TUNESCOUT_SPOTIFY_REDIRECT_URI";
const ENV_API_BASE_URL: &str = "TUNESCOUT_SPOTIFY_API_BASE_URL";

/// Spotify-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyProviderConfig {
    /// Spotify OAuth client ID
    #[serde(default)]
    pub client_id: String,
    /// Spotify OAuth client secret
    #[serde(default)]
    pub client_secret: String,
    /// OAuth redirect URI
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    #[serde(default = "default_accounts_url")]
    pub accounts_url: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

fn default_redirect_uri() -> String {
    DEFAULT_REDIRECT_URI.into()
}

fn default_accounts_url() -> String {
    DEFAULT_ACCOUNTS_URL.into()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.into()
}

impl Default for SpotifyProviderConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: default_redirect_uri(),
            accounts_url: default_accounts_url(),
            api_base_url: default_api_base_url(),
        }
    }
}

impl SpotifyProviderConfig {
    /// Extract Spotify config from the dynamic providers config.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be parsed.
    pub fn from_providers(providers: &ProvidersConfig) -> Result<Option<Self>, CoreError> {
        providers.get(PROVIDER_NAME)
    }

    /// Resolve the effective config: the `[providers.spotify]` table (or
    /// defaults when absent) with environment overrides applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be parsed.
    pub fn resolve(providers: &ProvidersConfig) -> Result<Self, CoreError> {
        let mut config = Self::from_providers(providers)?.unwrap_or_default();
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Replace fields with non-empty values returned by `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = lookup(ENV_CLIENT_ID) {
            self.client_id = value;
        }
        if let Some(value) = lookup(ENV_CLIENT_SECRET) {
            self.client_secret = value;
        }
        if let Some(value) = lookup(ENV_REDIRECT_URI) {
            self.redirect_uri = value;
        }
        if let Some(value) = lookup(ENV_API_BASE_URL) {
            self.api_base_url = value;
        }
    }

    /// Validate that required fields are present.
    ///
    /// # Errors
    ///
    /// Returns an error if required fields are missing or empty.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.client_id.is_empty() {
            return Err(CoreError::ConfigMissingField {
                field: "providers.spotify.client_id".into(),
            });
        }
        if self.client_secret.is_empty() {
            return Err(CoreError::ConfigMissingField {
                field: "providers.spotify.client_secret".into(),
            });
        }
        for (field, value) in [
            ("providers.spotify.redirect_uri", &self.redirect_uri),
            ("providers.spotify.accounts_url", &self.accounts_url),
            ("providers.spotify.api_base_url", &self.api_base_url),
        ] {
            url::Url::parse(value).map_err(|e| CoreError::ConfigInvalid {
                message: format!("{field}: {e}"),
            })?;
        }
        Ok(())
    }
}

/// Config template for Spotify provider.
/// This is appended to the base config template when creating a new config file.
pub const CONFIG_TEMPLATE: &str = concatcp!(
    r#"[providers.spotify]
# Get these from https://developer.spotify.com/dashboard
# (or set TUNESCOUT_SPOTIFY_CLIENT_ID / TUNESCOUT_SPOTIFY_CLIENT_SECRET)
client_id = ""
client_secret = ""
# Must match a redirect URI registered for the app
redirect_uri = ""#,
    DEFAULT_REDIRECT_URI,
    "\"\n# accounts_url = \"",
    DEFAULT_ACCOUNTS_URL,
    "\"\n# api_base_url = \"",
    DEFAULT_API_BASE_URL,
    "\"\n"
);
