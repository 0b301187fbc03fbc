//! Playback source selection for the selected track.
//!
//! ```text
//! Empty -> Resolving -> Ready | Unavailable | Error
//! ```
//!
//! A track's primary preview is always preferred. Only when the catalog has
//! no preview is the alternate audio resolver consulted. Every selection gets
//! a new generation tag, and a resolver answer for an older generation is
//! dropped.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use crate::audio::AudioOutput;
use crate::models::Track;
use crate::provider::AlternateAudioResolver;
use crate::time::format_clock;

/// Length of the catalog's preview clips
pub const PRIMARY_PREVIEW_LENGTH: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPhase {
    /// No track selected, or a track cued without resolving
    Empty,
    Resolving,
    /// A source is bound and playback can be toggled
    Ready,
    /// Neither catalog has audio for the track
    Unavailable,
    /// The alternate resolver failed outright
    Error,
}

/// Where the bound audio came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLabel {
    PrimaryPreview,
    AlternateCatalog,
    Unavailable,
    Error,
}

impl SourceLabel {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PrimaryPreview => "Primary Preview",
            Self::AlternateCatalog => "Alternate Catalog",
            Self::Unavailable => "Unavailable",
            Self::Error => "Error",
        }
    }
}

impl std::fmt::Display for SourceLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audio source bound for the current track.
///
/// While resolving, `label` is provisional (`Unavailable`) and `url` is
/// always `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackSource {
    pub url: Option<String>,
    pub label: SourceLabel,
    pub is_resolving: bool,
}

impl PlaybackSource {
    const fn resolving() -> Self {
        Self {
            url: None,
            label: SourceLabel::Unavailable,
            is_resolving: true,
        }
    }

    fn bound(url: impl Into<String>, label: SourceLabel) -> Self {
        Self {
            url: Some(url.into()),
            label,
            is_resolving: false,
        }
    }

    const fn unbound(label: SourceLabel) -> Self {
        Self {
            url: None,
            label,
            is_resolving: false,
        }
    }
}

/// Elapsed time and duration for the progress bar
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackProgress {
    pub elapsed: Duration,
    pub duration: Option<Duration>,
}

impl PlaybackProgress {
    /// Fraction of the source played, in `0.0..=1.0`
    #[must_use]
    pub fn ratio(&self) -> f64 {
        match self.duration {
            Some(duration) if !duration.is_zero() => {
                (self.elapsed.as_secs_f64() / duration.as_secs_f64()).clamp(0.0, 1.0)
            }
            _ => 0.0,
        }
    }

    /// `m:ss` label for the elapsed time
    #[must_use]
    pub fn elapsed_label(&self) -> String {
        format_clock(self.elapsed)
    }

    /// `m:ss` label for the duration, `-:--` when unknown
    #[must_use]
    pub fn duration_label(&self) -> String {
        self.duration.map_or_else(|| "-:--".to_string(), format_clock)
    }
}

/// Events emitted by the playback selector
#[derive(Debug, Clone)]
pub enum PlaybackEvent {
    /// The selector moved to a new phase for `track_id`
    PhaseChanged {
        track_id: Option<String>,
        phase: PlaybackPhase,
        source: Option<PlaybackSource>,
    },
    Playing,
    Paused,
    Seeked {
        position: Duration,
    },
}

struct PlaybackInner {
    phase: PlaybackPhase,
    track: Option<Track>,
    source: Option<PlaybackSource>,
    /// Tag of the current selection; resolver answers for older tags are stale
    generation: u64,
    /// Elapsed time shown to the user
    elapsed: Duration,
}

/// Chooses and binds the audio source for the selected track
pub struct PlaybackSelector {
    resolver: Arc<dyn AlternateAudioResolver>,
    output: Arc<dyn AudioOutput>,
    inner: RwLock<PlaybackInner>,
    event_tx: broadcast::Sender<PlaybackEvent>,
}

impl PlaybackSelector {
    #[must_use]
    pub fn new(
        resolver: Arc<dyn AlternateAudioResolver>,
        output: Arc<dyn AudioOutput>,
    ) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(64);

        Arc::new(Self {
            resolver,
            output,
            inner: RwLock::new(PlaybackInner {
                phase: PlaybackPhase::Empty,
                track: None,
                source: None,
                generation: 0,
                elapsed: Duration::ZERO,
            }),
            event_tx,
        })
    }

    /// Subscribe to playback events
    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.event_tx.subscribe()
    }

    pub async fn phase(&self) -> PlaybackPhase {
        self.inner.read().await.phase
    }

    pub async fn current_track(&self) -> Option<Track> {
        self.inner.read().await.track.clone()
    }

    /// Source bound for the current track, `None` while empty
    pub async fn playback_source(&self) -> Option<PlaybackSource> {
        self.inner.read().await.source.clone()
    }

    /// Select a track and resolve its audio source.
    ///
    /// Returns the phase the selector settled in. If another selection
    /// happened while the resolver was running, the stale answer is dropped
    /// and the phase of the newer selection is returned.
    pub async fn select_track(&self, track: Track) -> PlaybackPhase {
        let generation = {
            let mut inner = self.inner.write().await;
            inner.generation += 1;
            inner.phase = PlaybackPhase::Resolving;
            inner.track = Some(track.clone());
            inner.source = Some(PlaybackSource::resolving());
            inner.elapsed = Duration::ZERO;
            self.output.unload();
            self.emit_phase(&inner);
            inner.generation
        };

        if let Some(url) = track.preview_url.as_deref().filter(|url| !url.is_empty()) {
            let mut inner = self.inner.write().await;
            if inner.generation != generation {
                return inner.phase;
            }
            info!("Using primary preview for {} - {}", track.primary_artist(), track.name);
            self.bind(&mut inner, url, SourceLabel::PrimaryPreview, Some(PRIMARY_PREVIEW_LENGTH));
            return inner.phase;
        }

        debug!(
            "No primary preview for {} - {}, asking {}",
            track.primary_artist(),
            track.name,
            self.resolver.name()
        );
        let outcome = self
            .resolver
            .resolve(&track.name, track.primary_artist())
            .await;

        let mut inner = self.inner.write().await;
        let still_selected = inner.generation == generation
            && inner.track.as_ref().is_some_and(|t| t.id == track.id);
        if !still_selected {
            debug!("Discarding stale resolver answer for track {}", track.id);
            return inner.phase;
        }

        match outcome {
            Ok(Some(alternate)) => {
                info!(
                    "Using {} stream {} for {} - {}",
                    self.resolver.name(),
                    alternate.id,
                    track.primary_artist(),
                    track.name
                );
                let duration = (alternate.duration_ms > 0)
                    .then(|| Duration::from_millis(alternate.duration_ms));
                self.bind(&mut inner, &alternate.audio_url, SourceLabel::AlternateCatalog, duration);
            }
            Ok(None) => {
                info!("No audio available for {} - {}", track.primary_artist(), track.name);
                inner.phase = PlaybackPhase::Unavailable;
                inner.source = Some(PlaybackSource::unbound(SourceLabel::Unavailable));
                self.emit_phase(&inner);
            }
            Err(e) => {
                warn!("Alternate audio lookup failed for {}: {}", track.id, e);
                inner.phase = PlaybackPhase::Error;
                inner.source = Some(PlaybackSource::unbound(SourceLabel::Error));
                self.emit_phase(&inner);
            }
        }

        inner.phase
    }

    /// Bind a track without resolving; resolution happens on the first
    /// [`toggle`](Self::toggle).
    pub async fn cue_track(&self, track: Track) {
        let mut inner = self.inner.write().await;
        inner.generation += 1;
        inner.phase = PlaybackPhase::Empty;
        inner.track = Some(track);
        inner.source = None;
        inner.elapsed = Duration::ZERO;
        self.output.unload();
        self.emit_phase(&inner);
    }

    /// Toggle play/pause.
    ///
    /// Only `Ready` toggles the output. `Empty` with a cued track resolves the
    /// source instead of playing; every other phase is a no-op.
    pub async fn toggle(&self) -> PlaybackPhase {
        let (phase, cued) = {
            let inner = self.inner.read().await;
            (inner.phase, inner.track.clone())
        };

        match phase {
            PlaybackPhase::Ready => {
                if self.output.is_playing() {
                    self.output.pause();
                    let _ = self.event_tx.send(PlaybackEvent::Paused);
                } else {
                    self.output.play();
                    let _ = self.event_tx.send(PlaybackEvent::Playing);
                }
                PlaybackPhase::Ready
            }
            PlaybackPhase::Empty => match cued {
                Some(track) => self.select_track(track).await,
                None => PlaybackPhase::Empty,
            },
            PlaybackPhase::Resolving | PlaybackPhase::Unavailable | PlaybackPhase::Error => {
                debug!("Toggle ignored in {:?}", phase);
                phase
            }
        }
    }

    pub fn is_playing(&self) -> bool {
        self.output.is_playing()
    }

    /// Progress as last displayed
    pub async fn progress(&self) -> PlaybackProgress {
        let inner = self.inner.read().await;
        if inner.phase != PlaybackPhase::Ready {
            return PlaybackProgress::default();
        }
        PlaybackProgress {
            elapsed: inner.elapsed,
            duration: self.output.duration(),
        }
    }

    /// Refresh the displayed progress from the output's live position.
    pub async fn time_update(&self) -> PlaybackProgress {
        let mut inner = self.inner.write().await;
        if inner.phase != PlaybackPhase::Ready {
            return PlaybackProgress::default();
        }
        inner.elapsed = self.output.position();
        PlaybackProgress {
            elapsed: inner.elapsed,
            duration: self.output.duration(),
        }
    }

    /// Seek within the bound source.
    ///
    /// The displayed elapsed time is updated immediately rather than waiting
    /// for the output to report it. Ignored unless `Ready`.
    pub async fn seek(&self, position: Duration) -> PlaybackProgress {
        let mut inner = self.inner.write().await;
        if inner.phase != PlaybackPhase::Ready {
            return PlaybackProgress::default();
        }

        let duration = self.output.duration();
        let target = duration.map_or(position, |d| position.min(d));
        self.output.seek(target);
        inner.elapsed = target;
        let _ = self.event_tx.send(PlaybackEvent::Seeked { position: target });

        PlaybackProgress {
            elapsed: target,
            duration,
        }
    }

    fn bind(
        &self,
        inner: &mut PlaybackInner,
        url: &str,
        label: SourceLabel,
        duration_hint: Option<Duration>,
    ) {
        self.output.load(url, duration_hint);
        inner.phase = PlaybackPhase::Ready;
        inner.source = Some(PlaybackSource::bound(url, label));
        inner.elapsed = Duration::ZERO;
        self.emit_phase(inner);
    }

    fn emit_phase(&self, inner: &PlaybackInner) {
        let _ = self.event_tx.send(PlaybackEvent::PhaseChanged {
            track_id: inner.track.as_ref().map(|t| t.id.clone()),
            phase: inner.phase,
            source: inner.source.clone(),
        });
    }
}
