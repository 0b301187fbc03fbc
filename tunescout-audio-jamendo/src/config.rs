//! Jamendo provider configuration.

use serde::{Deserialize, Serialize};
use tunescout_core::{CoreError, ProvidersConfig};

/// Provider name used in config file
pub const PROVIDER_NAME: &str = "jamendo";

/// Jamendo API v3 base URL
pub const DEFAULT_API_URL: &str = "https://api.jamendo.com/v3.0";

const ENV_CLIENT_ID: &str = "TUNESCOUT_JAMENDO_CLIENT_ID";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JamendoConfig {
    /// Jamendo API client ID; the resolver reports an error while empty
    #[serde(default)]
    pub client_id: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.into()
}

impl Default for JamendoConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            api_url: default_api_url(),
        }
    }
}

impl JamendoConfig {
    /// Resolve the `[providers.jamendo]` table (or defaults when absent) with
    /// the `TUNESCOUT_JAMENDO_CLIENT_ID` override applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be parsed.
    pub fn resolve(providers: &ProvidersConfig) -> Result<Self, CoreError> {
        let mut config: Self = providers.get(PROVIDER_NAME)?.unwrap_or_default();
        if let Some(client_id) = std::env::var(ENV_CLIENT_ID)
            .ok()
            .filter(|value| !value.trim().is_empty())
        {
            config.client_id = client_id;
        }
        Ok(config)
    }
}

/// Config template for the Jamendo provider.
pub const CONFIG_TEMPLATE: &str = r#"[providers.jamendo]
# Fallback audio for tracks without a Spotify preview
# Get a client ID from https://devportal.jamendo.com (or set TUNESCOUT_JAMENDO_CLIENT_ID)
client_id = ""
# api_url = "https://api.jamendo.com/v3.0"
"#;
