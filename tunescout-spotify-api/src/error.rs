use thiserror::Error;
use tunescout_core::CoreError;

/// Unified error type for all Spotify-related operations.
///
/// Covers the identity exchanges, catalog reads and the persisted session.
#[derive(Debug, Error)]
pub enum SpotifyError {
    /// A credential exchange failed, or no user session is available.
    #[error("Spotify authentication failed: {reason}")]
    Auth { reason: String },

    /// The catalog answered with a non-success status.
    #[error("Spotify catalog request failed with HTTP {status}: {body}")]
    Catalog { status: u16, body: String },

    /// Transport failure talking to Spotify.
    #[error("Network error: {0}")]
    Network(#[from] reqwest_middleware::Error),

    /// Failed to parse or serialize JSON data.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading or writing the credential store failed.
    #[error("Credential store error: {0}")]
    Store(#[from] CoreError),
}

impl From<reqwest::Error> for SpotifyError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(reqwest_middleware::Error::Reqwest(e))
    }
}

impl SpotifyError {
    pub(crate) fn auth(reason: impl Into<String>) -> Self {
        Self::Auth {
            reason: reason.into(),
        }
    }

    /// Check whether the error is an authorization problem the user can fix
    /// by signing in again.
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(
            self,
            Self::Auth { .. } | Self::Catalog { status: 401, .. }
        )
    }
}

/// Convenience type alias for Results with `SpotifyError`.
pub type Result<T> = std::result::Result<T, SpotifyError>;
