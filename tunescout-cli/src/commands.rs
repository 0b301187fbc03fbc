//! One-shot subcommands.

use std::time::Duration;
use tracing::info;
use tunescout_core::{PlaybackPhase, SearchType};

use crate::app::App;
use crate::callback::authorize_interactive;
use crate::error::{AppError, Result};
use crate::render;

/// Interval between progress lines during `preview`
const PROGRESS_TICK: Duration = Duration::from_secs(1);

pub async fn releases(app: &App) -> Result<()> {
    let albums = app
        .catalog
        .new_releases(app.market(), app.config.catalog.new_releases_limit)
        .await?;
    render::print_albums(&albums);
    Ok(())
}

pub async fn tracks(app: &App, album_id: &str) -> Result<()> {
    let tracks = app
        .catalog
        .album_tracks(album_id, app.market(), app.config.catalog.album_tracks_limit)
        .await?;
    render::print_tracks(&tracks);
    Ok(())
}

pub async fn library(app: &App) -> Result<()> {
    let albums = app
        .catalog
        .user_albums(app.market(), app.config.catalog.user_albums_limit)
        .await?;
    render::print_albums(&albums);
    Ok(())
}

pub async fn search(app: &App, query: &str) -> Result<()> {
    let results = app
        .catalog
        .search(
            query,
            &SearchType::ALL,
            app.market(),
            app.config.catalog.search_limit,
        )
        .await?;
    render::print_search_results(&results);
    Ok(())
}

pub async fn login(app: &App) -> Result<()> {
    if app.credentials.user_token().await?.is_some() {
        info!("Already signed in; signing in again replaces the current session");
    }
    authorize_interactive(&app.credentials, &app.cancel_token).await?;
    println!("Signed in to Spotify.");
    Ok(())
}

pub async fn logout(app: &App) -> Result<()> {
    app.credentials.clear_user_session().await?;
    println!("Signed out.");
    Ok(())
}

/// Resolve a track's audio source and play it on the virtual output until
/// the source ends or the user presses Ctrl+C.
pub async fn preview(app: &App, album_id: &str, track_number: u32) -> Result<()> {
    let tracks = app
        .catalog
        .album_tracks(album_id, app.market(), app.config.catalog.album_tracks_limit)
        .await?;
    let track = tracks
        .into_iter()
        .find(|t| t.track_number == track_number)
        .ok_or_else(|| {
            AppError::Usage(format!("Album {album_id} has no track number {track_number}"))
        })?;

    println!("{}", render::track_line(&track));
    let selector = app.playback_selector();
    let phase = selector.select_track(track).await;
    let source = selector.playback_source().await;
    println!("{}", render::source_line(phase, source.as_ref()));

    if phase != PlaybackPhase::Ready {
        return Ok(());
    }

    selector.toggle().await;
    let mut interval = tokio::time::interval(PROGRESS_TICK);
    loop {
        tokio::select! {
            () = app.cancel_token.cancelled() => {
                println!();
                return Err(AppError::Cancelled);
            }
            _ = interval.tick() => {
                let progress = selector.time_update().await;
                println!("{}", render::progress_bar(&progress));
                if !selector.is_playing() {
                    return Ok(());
                }
            }
        }
    }
}
