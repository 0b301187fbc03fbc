//! Spotify identity and Web API catalog client.

pub mod catalog;
pub mod config;
pub mod credentials;
pub mod error;
pub mod middleware;

#[cfg(test)]
mod test_support;

pub use catalog::{CatalogClient, SpotifyCatalogSearch};
pub use config::{CONFIG_TEMPLATE as SPOTIFY_CONFIG_TEMPLATE, SpotifyProviderConfig};
pub use credentials::{
    AuthorizationRequest, AuthorizationTokenResponse, CredentialManager, USER_SCOPES,
};
pub use error::SpotifyError;
pub use middleware::UnauthorizedMiddleware;
