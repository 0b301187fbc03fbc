//! Catalog entities as served by the Spotify Web API.
//!
//! These are immutable snapshots; nothing here is cached beyond the request
//! that produced it. Unknown fields in the API payloads are ignored.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Album or artist artwork
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub width: Option<u32>,
}

/// Artist as embedded in albums and tracks, or returned by search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub genres: Vec<String>,
}

/// A page of items in the catalog's list envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub total: u32,
}

impl<T> Default for Paging<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub artists: Vec<Artist>,
    #[serde(default)]
    pub release_date: String,
    #[serde(default)]
    pub total_tracks: u32,
    /// Only present on full album objects
    #[serde(default)]
    pub tracks: Option<Paging<Track>>,
}

impl Album {
    /// Artwork URL for the widest available image.
    #[must_use]
    pub fn cover_url(&self) -> Option<&str> {
        self.images
            .iter()
            .max_by_key(|img| img.width.unwrap_or(0))
            .map(|img| img.url.as_str())
    }

    /// Comma-separated artist names.
    #[must_use]
    pub fn artist_names(&self) -> String {
        join_artist_names(&self.artists)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<Artist>,
    #[serde(default)]
    pub duration_ms: u64,
    /// Short preview clip; absent for most catalog entries
    #[serde(default)]
    pub preview_url: Option<String>,
    #[serde(default = "default_one")]
    pub disc_number: u32,
    #[serde(default)]
    pub track_number: u32,
}

const fn default_one() -> u32 {
    1
}

impl Track {
    #[must_use]
    pub const fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// Name of the first credited artist, or an empty string.
    #[must_use]
    pub fn primary_artist(&self) -> &str {
        self.artists.first().map_or("", |a| a.name.as_str())
    }

    /// Comma-separated artist names.
    #[must_use]
    pub fn artist_names(&self) -> String {
        join_artist_names(&self.artists)
    }
}

fn join_artist_names(artists: &[Artist]) -> String {
    artists
        .iter()
        .map(|a| a.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Typed result buckets of a multi-entity search.
///
/// All three buckets are always present; an empty query yields three empty
/// vectors rather than an absent result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResultSet {
    pub albums: Vec<Album>,
    pub artists: Vec<Artist>,
    pub tracks: Vec<Track>,
}

impl SearchResultSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.albums.is_empty() && self.artists.is_empty() && self.tracks.is_empty()
    }

    /// Total number of items across all buckets
    #[must_use]
    pub fn len(&self) -> usize {
        self.albums.len() + self.artists.len() + self.tracks.len()
    }
}

/// Entity types accepted by the catalog search endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    Album,
    Artist,
    Track,
}

impl SearchType {
    /// All entity types, in the order results are displayed.
    pub const ALL: [Self; 3] = [Self::Album, Self::Artist, Self::Track];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Album => "album",
            Self::Artist => "artist",
            Self::Track => "track",
        }
    }
}

impl std::fmt::Display for SearchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A playable match from the alternate open-audio catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlternateTrack {
    pub id: String,
    pub name: String,
    pub artist: String,
    pub audio_url: String,
    pub duration_ms: u64,
    pub image_url: Option<String>,
}
