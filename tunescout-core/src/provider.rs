use crate::error::CoreError;
use crate::models::{AlternateTrack, SearchResultSet};
use async_trait::async_trait;

/// Catalog search as seen by the search orchestrator.
///
/// Market, limit and entity types are fixed by the implementation; the
/// orchestrator only supplies the query text.
#[async_trait]
pub trait CatalogSearch: Send + Sync {
    /// Search albums, artists and tracks matching `query`.
    ///
    /// A blank query must return an empty [`SearchResultSet`] without
    /// contacting the catalog.
    async fn search(&self, query: &str) -> Result<SearchResultSet, CoreError>;
}

/// Fallback audio source for tracks without a primary preview
#[async_trait]
pub trait AlternateAudioResolver: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &'static str;

    /// Find a playable stream for a track.
    ///
    /// Returns `Ok(None)` when there is no match. Transport failures should be
    /// reported as `Ok(None)` as well; `Err` is reserved for a resolver that
    /// cannot operate at all (e.g. missing credentials).
    async fn resolve(
        &self,
        track_name: &str,
        artist_name: &str,
    ) -> Result<Option<AlternateTrack>, CoreError>;
}

/// Client-side navigation, used to send the user to a login entry point
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

/// Path the session policy navigates to after a 401
pub const LOGIN_PATH: &str = "/login";
