//! Plain-text rendering of catalog entities and playback state.

use tunescout_core::{
    format_clock, Album, PlaybackPhase, PlaybackProgress, PlaybackSource, ResultRef,
    SearchResultSet, Track,
};

/// Width of the progress bar in characters
const PROGRESS_BAR_WIDTH: usize = 30;

pub fn album_line(album: &Album) -> String {
    let year = album.release_date.get(..4).unwrap_or(&album.release_date);
    format!(
        "{} - {} ({}, {} tracks) [{}]",
        album.artist_names(),
        album.name,
        year,
        album.total_tracks,
        album.id
    )
}

pub fn track_line(track: &Track) -> String {
    let preview = if track.preview_url.is_some() {
        ""
    } else {
        " (no preview)"
    };
    format!(
        "{:>2}. {} - {} [{}]{}",
        track.track_number,
        track.artist_names(),
        track.name,
        format_clock(track.duration()),
        preview
    )
}

pub fn print_albums(albums: &[Album]) {
    if albums.is_empty() {
        println!("No albums.");
        return;
    }
    for album in albums {
        println!("{}", album_line(album));
        if let Some(cover) = album.cover_url() {
            println!("    {cover}");
        }
    }
}

pub fn print_tracks(tracks: &[Track]) {
    if tracks.is_empty() {
        println!("No tracks.");
        return;
    }
    for track in tracks {
        println!("{}", track_line(track));
    }
}

/// Print search results. Albums and tracks are numbered for `/pick`:
/// albums first, then tracks.
pub fn print_search_results(results: &SearchResultSet) {
    if results.is_empty() {
        println!("No results.");
        return;
    }

    let mut number = 1;
    if !results.albums.is_empty() {
        println!("Albums:");
        for album in &results.albums {
            println!("  {number:>2}) {}", album_line(album));
            number += 1;
        }
    }
    if !results.artists.is_empty() {
        println!("Artists:");
        for artist in &results.artists {
            println!("      {}", artist.name);
        }
    }
    if !results.tracks.is_empty() {
        println!("Tracks:");
        for track in &results.tracks {
            println!(
                "  {number:>2}) {} - {} [{}]",
                track.artist_names(),
                track.name,
                format_clock(track.duration())
            );
            number += 1;
        }
    }
}

/// Map a 1-based pick number from [`print_search_results`] to a result.
pub fn result_ref_for(results: &SearchResultSet, number: usize) -> Option<ResultRef> {
    let index = number.checked_sub(1)?;
    if index < results.albums.len() {
        return Some(ResultRef::Album(index));
    }
    let index = index - results.albums.len();
    (index < results.tracks.len()).then_some(ResultRef::Track(index))
}

pub fn source_line(phase: PlaybackPhase, source: Option<&PlaybackSource>) -> String {
    match (phase, source) {
        (PlaybackPhase::Empty, _) | (_, None) => "No track selected".to_string(),
        (PlaybackPhase::Resolving, _) => "Resolving audio source...".to_string(),
        (_, Some(source)) => match source.url {
            Some(ref url) => format!("Source: {} ({url})", source.label),
            None => format!("Source: {}", source.label),
        },
    }
}

pub fn progress_bar(progress: &PlaybackProgress) -> String {
    let ratio = progress.ratio();
    // Ratio is clamped to 0..=1, so the product fits the bar width
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let filled = ((ratio * PROGRESS_BAR_WIDTH as f64).round() as usize).min(PROGRESS_BAR_WIDTH);
    format!(
        "{} [{}{}] {}",
        progress.elapsed_label(),
        "#".repeat(filled),
        "-".repeat(PROGRESS_BAR_WIDTH - filled),
        progress.duration_label()
    )
}
