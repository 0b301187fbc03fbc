pub mod audio;
pub mod config;
pub mod error;
pub mod models;
pub mod paths;
pub mod playback;
pub mod provider;
pub mod search;
pub mod storage;
pub mod time;

pub use audio::{AudioOutput, VirtualAudioOutput};
pub use config::{
    build_config_template, CatalogConfig, LoggingConfig, ProvidersConfig, SearchConfig,
    TunescoutConfig,
};

/// Re-export toml error type for config parsing error handling
pub use toml::de::Error as TomlParseError;
pub use error::CoreError;
pub use models::{
    AlternateTrack, Album, Artist, Image, Paging, SearchResultSet, SearchType, Track,
};
pub use paths::{
    config_dir, config_path, log_file_path, session_path, CONFIG_DIR_NAME, CONFIG_FILE_NAME,
    LOG_FILE_NAME, SESSION_FILE_NAME,
};
pub use playback::{
    PlaybackEvent, PlaybackPhase, PlaybackProgress, PlaybackSelector, PlaybackSource,
    SourceLabel, PRIMARY_PREVIEW_LENGTH,
};
pub use provider::{AlternateAudioResolver, CatalogSearch, Navigator, LOGIN_PATH};
pub use search::{
    ResultRef, SearchEvent, SearchOrchestrator, SearchPhase, SearchSnapshot, Selection,
    DEFAULT_DEBOUNCE,
};
pub use storage::{
    CredentialStore, FileStore, MemoryStore, GENERIC_TOKEN_KEY, USER_ACCESS_TOKEN_KEY,
    USER_REFRESH_TOKEN_KEY, USER_TOKEN_EXPIRES_KEY,
};
pub use time::{format_clock, Clock, DurationExt, ManualClock, SystemClock};
