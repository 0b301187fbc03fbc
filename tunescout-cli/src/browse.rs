//! Interactive search-as-you-type session.
//!
//! Every plain input line is handed to the search orchestrator as the new
//! field text; slash commands act on the results and the player.

use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};
use tunescout_core::{
    PlaybackPhase, PlaybackSelector, SearchEvent, SearchOrchestrator, Selection,
};

use crate::app::App;
use crate::error::Result;
use crate::render;

const HELP: &str = "Type to search. Commands: /pick N, /play, /seek SECS, /status, /close, /quit";

#[derive(Debug, Clone, PartialEq, Eq)]
enum BrowseCommand {
    /// New text for the search field
    Input(String),
    Pick(usize),
    Play,
    Seek(Duration),
    Status,
    Close,
    Quit,
    Invalid(String),
}

fn parse_command(line: &str) -> BrowseCommand {
    let trimmed = line.trim();
    let Some(command) = trimmed.strip_prefix('/') else {
        return BrowseCommand::Input(line.to_string());
    };

    let mut parts = command.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("pick"), Some(n)) => n.parse().map_or_else(
            |_| BrowseCommand::Invalid(format!("Not a result number: {n}")),
            BrowseCommand::Pick,
        ),
        (Some("seek"), Some(secs)) => secs
            .parse::<f64>()
            .ok()
            .and_then(|s| Duration::try_from_secs_f64(s).ok())
            .map_or_else(
                || BrowseCommand::Invalid(format!("Not a position in seconds: {secs}")),
                BrowseCommand::Seek,
            ),
        (Some("play"), None) => BrowseCommand::Play,
        (Some("status"), None) => BrowseCommand::Status,
        (Some("close"), None) => BrowseCommand::Close,
        (Some("quit" | "exit"), None) => BrowseCommand::Quit,
        _ => BrowseCommand::Invalid(HELP.to_string()),
    }
}

/// Run the interactive session until `/quit`, end of input or Ctrl+C.
pub async fn run(app: &App) -> Result<()> {
    let orchestrator = app.search_orchestrator();
    let selector = app.playback_selector();

    let render_task = tokio::spawn(render_search_events(orchestrator.subscribe()));

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            () = app.cancel_token.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            debug!("End of input");
            break;
        };

        match parse_command(&line) {
            BrowseCommand::Input(text) => orchestrator.input(text).await,
            BrowseCommand::Pick(number) => pick(app, &orchestrator, &selector, number).await,
            BrowseCommand::Play => {
                let phase = selector.toggle().await;
                if phase == PlaybackPhase::Ready {
                    let state = if selector.is_playing() { "Playing" } else { "Paused" };
                    println!("{state}");
                } else {
                    let source = selector.playback_source().await;
                    println!("{}", render::source_line(phase, source.as_ref()));
                }
            }
            BrowseCommand::Seek(position) => {
                let progress = selector.seek(position).await;
                println!("{}", render::progress_bar(&progress));
            }
            BrowseCommand::Status => {
                let phase = selector.phase().await;
                let source = selector.playback_source().await;
                println!("{}", render::source_line(phase, source.as_ref()));
                if phase == PlaybackPhase::Ready {
                    println!("{}", render::progress_bar(&selector.time_update().await));
                }
            }
            BrowseCommand::Close => orchestrator.dismiss().await,
            BrowseCommand::Quit => break,
            BrowseCommand::Invalid(message) => println!("{message}"),
        }
    }

    orchestrator.dismiss().await;
    render_task.abort();
    Ok(())
}

async fn pick(
    app: &App,
    orchestrator: &SearchOrchestrator,
    selector: &Arc<PlaybackSelector>,
    number: usize,
) {
    let snapshot = orchestrator.snapshot().await;
    let selection = match render::result_ref_for(&snapshot.results, number) {
        Some(item) if snapshot.panel_open => orchestrator.select(item).await,
        _ => None,
    };

    match selection {
        Some(Selection::Album(album)) => {
            println!("{}", render::album_line(&album));
            match app
                .catalog
                .album_tracks(&album.id, app.market(), app.config.catalog.album_tracks_limit)
                .await
            {
                Ok(tracks) => {
                    render::print_tracks(&tracks);
                    if let Some(first) = tracks.into_iter().next() {
                        println!("Cued \"{}\"; /play to start", first.name);
                        selector.cue_track(first).await;
                    }
                }
                Err(e) => warn!("Failed to load album tracks: {}", e),
            }
        }
        Some(Selection::Track(track)) => {
            println!("{}", render::track_line(&track));
            let phase = selector.select_track(track).await;
            let source = selector.playback_source().await;
            println!("{}", render::source_line(phase, source.as_ref()));
        }
        None => println!("No result {number} to pick"),
    }
}

async fn render_search_events(mut rx: broadcast::Receiver<SearchEvent>) {
    loop {
        match rx.recv().await {
            Ok(SearchEvent::Searching { query }) => println!("Searching for {query:?}..."),
            Ok(SearchEvent::ResultsReady { results, .. }) => render::print_search_results(&results),
            Ok(SearchEvent::Cleared) => println!("(results cleared)"),
            Ok(
                SearchEvent::Debouncing { .. }
                | SearchEvent::PanelClosed
                | SearchEvent::Selected { .. },
            ) => {}
            Err(RecvError::Lagged(skipped)) => debug!("Search renderer skipped {} events", skipped),
            Err(RecvError::Closed) => break,
        }
    }
}
