//! Read-only Spotify Web API catalog client.

use async_trait::async_trait;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tunescout_core::{Album, Artist, CatalogSearch, CoreError, Paging, SearchResultSet, SearchType, Track};

use crate::config::PROVIDER_NAME;
use crate::credentials::CredentialManager;
use crate::error::{Result, SpotifyError};
use crate::middleware::UnauthorizedMiddleware;

/// Default timeout for HTTP requests (10 seconds)
const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Deserialize)]
struct NewReleasesResponse {
    albums: Paging<Album>,
}

#[derive(Debug, Deserialize)]
struct SavedAlbum {
    album: Album,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    albums: Option<Paging<Album>>,
    #[serde(default)]
    artists: Option<Paging<Artist>>,
    #[serde(default)]
    tracks: Option<Paging<Track>>,
}

impl From<SearchResponse> for SearchResultSet {
    fn from(response: SearchResponse) -> Self {
        Self {
            albums: response.albums.unwrap_or_default().items,
            artists: response.artists.unwrap_or_default().items,
            tracks: response.tracks.unwrap_or_default().items,
        }
    }
}

/// Catalog reads authenticated with the app token, plus the user library.
///
/// Every response passes through [`UnauthorizedMiddleware`]. Requests are
/// attempted once; there is no retry.
pub struct CatalogClient {
    credentials: Arc<CredentialManager>,
    client: ClientWithMiddleware,
    api_base_url: String,
}

impl CatalogClient {
    /// Create a catalog client with a 10-second request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(credentials: Arc<CredentialManager>) -> Result<Self> {
        let base_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self::with_client(credentials, base_client))
    }

    /// Create a catalog client on top of an existing HTTP client.
    #[must_use]
    pub fn with_client(credentials: Arc<CredentialManager>, base_client: reqwest::Client) -> Self {
        let api_base_url = credentials
            .config()
            .api_base_url
            .trim_end_matches('/')
            .to_string();
        let client = ClientBuilder::new(base_client)
            .with(UnauthorizedMiddleware::new(credentials.clone()))
            .build();

        Self {
            credentials,
            client,
            api_base_url,
        }
    }

    #[must_use]
    pub const fn credentials(&self) -> &Arc<CredentialManager> {
        &self.credentials
    }

    /// Newly released albums, in the order served.
    ///
    /// # Errors
    ///
    /// Returns [`SpotifyError::Auth`] if no app token can be obtained, or
    /// [`SpotifyError::Catalog`] on a non-success response.
    pub async fn new_releases(&self, market: &str, limit: u32) -> Result<Vec<Album>> {
        let token = self.credentials.app_token().await?;
        let limit = limit.to_string();
        let response: NewReleasesResponse = self
            .get_json(
                "/v1/browse/new-releases",
                &token,
                &[("market", market), ("limit", &limit)],
            )
            .await?;

        info!("Fetched {} new releases", response.albums.items.len());
        Ok(response.albums.items)
    }

    /// Tracks of an album, in disc/track order as served.
    ///
    /// # Errors
    ///
    /// Returns [`SpotifyError::Catalog`] for unknown album ids and other
    /// non-success responses.
    pub async fn album_tracks(&self, album_id: &str, market: &str, limit: u32) -> Result<Vec<Track>> {
        let token = self.credentials.app_token().await?;
        let path = format!("/v1/albums/{}/tracks", urlencoding::encode(album_id));
        let limit = limit.to_string();
        let response: Paging<Track> = self
            .get_json(&path, &token, &[("market", market), ("limit", &limit)])
            .await?;

        debug!("Album {} has {} tracks", album_id, response.items.len());
        Ok(response.items)
    }

    /// Albums saved in the signed-in user's library.
    ///
    /// # Errors
    ///
    /// Returns [`SpotifyError::Auth`] if there is no usable user session.
    pub async fn user_albums(&self, market: &str, limit: u32) -> Result<Vec<Album>> {
        let token = self
            .credentials
            .user_token()
            .await?
            .ok_or_else(|| SpotifyError::auth("not authenticated"))?;
        let limit = limit.to_string();
        let response: Paging<SavedAlbum> = self
            .get_json("/v1/me/albums", &token, &[("market", market), ("limit", &limit)])
            .await?;

        Ok(response.items.into_iter().map(|saved| saved.album).collect())
    }

    /// Search the catalog.
    ///
    /// A blank query returns an empty result set without any request.
    /// Buckets missing from the response come back empty.
    ///
    /// # Errors
    ///
    /// Returns [`SpotifyError::Catalog`] on a non-success response.
    pub async fn search(
        &self,
        query: &str,
        types: &[SearchType],
        market: &str,
        limit: u32,
    ) -> Result<SearchResultSet> {
        if query.trim().is_empty() {
            debug!("Skipping search for blank query");
            return Ok(SearchResultSet::default());
        }

        let token = self.credentials.app_token().await?;
        let types = types
            .iter()
            .map(SearchType::as_str)
            .collect::<Vec<_>>()
            .join(",");
        let limit = limit.to_string();
        let response: SearchResponse = self
            .get_json(
                "/v1/search",
                &token,
                &[
                    ("q", query),
                    ("type", &types),
                    ("market", market),
                    ("limit", &limit),
                ],
            )
            .await?;

        let results = SearchResultSet::from(response);
        debug!("Search {:?} returned {} items", query, results.len());
        Ok(results)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let url = format!("{}{path}", self.api_base_url);
        debug!("Spotify GET: {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Spotify GET {} failed: HTTP {} - {}", path, status, body);
            return Err(SpotifyError::Catalog {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// [`CatalogSearch`] over all entity types with a fixed market and limit
pub struct SpotifyCatalogSearch {
    catalog: Arc<CatalogClient>,
    market: String,
    limit: u32,
}

impl SpotifyCatalogSearch {
    #[must_use]
    pub fn new(catalog: Arc<CatalogClient>, market: impl Into<String>, limit: u32) -> Self {
        Self {
            catalog,
            market: market.into(),
            limit,
        }
    }
}

#[async_trait]
impl CatalogSearch for SpotifyCatalogSearch {
    async fn search(&self, query: &str) -> std::result::Result<SearchResultSet, CoreError> {
        self.catalog
            .search(query, &SearchType::ALL, &self.market, self.limit)
            .await
            .map_err(|e| CoreError::ProviderFailed {
                provider: PROVIDER_NAME.into(),
                reason: e.to_string(),
            })
    }
}
