use crate::error::{CoreError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TunescoutConfig {
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Provider-specific tables, parsed by the provider crates
    #[serde(default)]
    pub providers: ProvidersConfig,
}

/// Query parameters shared by all catalog reads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_market")]
    pub market: String,
    #[serde(default = "default_list_limit")]
    pub new_releases_limit: u32,
    #[serde(default = "default_list_limit")]
    pub album_tracks_limit: u32,
    #[serde(default = "default_list_limit")]
    pub user_albums_limit: u32,
    #[serde(default = "default_search_limit")]
    pub search_limit: u32,
}

fn default_market() -> String {
    "ES".to_string()
}

const fn default_list_limit() -> u32 {
    20
}

const fn default_search_limit() -> u32 {
    10
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            market: default_market(),
            new_releases_limit: default_list_limit(),
            album_tracks_limit: default_list_limit(),
            user_albums_limit: default_list_limit(),
            search_limit: default_search_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Quiet period after the last keystroke before a search is issued
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

const fn default_debounce_ms() -> u64 {
    300
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Also write logs to `<cache dir>/tunescout/tunescout.log`
    #[serde(default)]
    pub enabled: bool,
}

/// Dynamic provider tables keyed by provider name (`[providers.<name>]`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProvidersConfig(HashMap<String, toml::Value>);

impl ProvidersConfig {
    /// Deserialize the table for `name`, `None` if the table is absent.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigInvalid`] if the table does not match `T`.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        self.0
            .get(name)
            .map(|value| {
                value
                    .clone()
                    .try_into::<T>()
                    .map_err(|e| CoreError::ConfigInvalid {
                        message: format!("providers.{name}: {e}"),
                    })
            })
            .transpose()
    }

    /// Check whether a provider table is present
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }
}

impl TunescoutConfig {
    /// Get the configuration directory path (~/.config/tunescout/)
    #[must_use]
    pub fn config_dir() -> PathBuf {
        crate::paths::config_dir()
    }

    /// Get the config file path (~/.config/tunescout/config.toml)
    #[must_use]
    pub fn config_path() -> PathBuf {
        crate::paths::config_path()
    }

    /// Parse a config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load config from file or create template on first run.
    ///
    /// `provider_templates` are appended to the base template so each
    /// provider crate documents its own table.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigNotFound`] after writing the template, or an
    /// error if the existing file cannot be read or parsed.
    pub fn load_or_create(provider_templates: Option<&[&str]>) -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            // Create config directory if it doesn't exist
            if let Some(parent) = config_path.parent() {
                fs::create_dir_all(parent)?;
            }

            fs::write(&config_path, build_config_template(provider_templates))?;

            return Err(CoreError::ConfigNotFound { path: config_path });
        }

        let content = fs::read_to_string(&config_path)?;
        let config = Self::from_toml(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate provider-independent fields.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigInvalid`] for out-of-range values.
    pub fn validate(&self) -> Result<()> {
        if self.catalog.market.trim().is_empty() {
            return Err(CoreError::ConfigMissingField {
                field: "catalog.market".into(),
            });
        }
        for (field, limit) in [
            ("catalog.new_releases_limit", self.catalog.new_releases_limit),
            ("catalog.album_tracks_limit", self.catalog.album_tracks_limit),
            ("catalog.user_albums_limit", self.catalog.user_albums_limit),
            ("catalog.search_limit", self.catalog.search_limit),
        ] {
            // The catalog service rejects limits outside 1..=50
            if !(1..=50).contains(&limit) {
                return Err(CoreError::ConfigInvalid {
                    message: format!("{field} must be between 1 and 50, got {limit}"),
                });
            }
        }
        Ok(())
    }
}

/// Build the full config template from the base and provider sections.
#[must_use]
pub fn build_config_template(provider_templates: Option<&[&str]>) -> String {
    let mut template = CONFIG_TEMPLATE.to_string();
    for provider in provider_templates.unwrap_or_default() {
        template.push('\n');
        template.push_str(provider);
    }
    template
}

const CONFIG_TEMPLATE: &str = r#"# Tunescout Configuration
# ~/.config/tunescout/config.toml

[catalog]
# Market (ISO 3166-1 alpha-2) used for all catalog reads
market = "ES"
new_releases_limit = 20
album_tracks_limit = 20
user_albums_limit = 20
search_limit = 10

[search]
# Quiet period after the last keystroke before a search is sent
debounce_ms = 300

[logging]
# Also write logs to the cache directory
enabled = false
"#;
