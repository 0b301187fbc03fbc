//! Audio output abstraction bound by the playback selector.
//!
//! The selector never decodes audio itself. It binds a stream URL to an
//! [`AudioOutput`] and reads the live position and duration back from it.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A player element that a stream URL can be bound to
pub trait AudioOutput: Send + Sync {
    /// Bind a new source, resetting position to zero and pausing.
    fn load(&self, url: &str, duration_hint: Option<Duration>);

    /// Unbind the current source.
    fn unload(&self);

    fn play(&self);

    fn pause(&self);

    fn is_playing(&self) -> bool;

    /// Live playback position
    fn position(&self) -> Duration;

    /// Source duration once known
    fn duration(&self) -> Option<Duration>;

    fn seek(&self, position: Duration);
}

#[derive(Debug, Clone)]
struct TransportState {
    url: Option<String>,
    is_playing: bool,
    position: Duration,
    duration: Option<Duration>,
    /// When `position` was last written (for interpolation)
    updated_at: Instant,
}

impl TransportState {
    fn interpolated_position(&self) -> Duration {
        if !self.is_playing {
            return self.position;
        }

        let interpolated = self.position + self.updated_at.elapsed();

        // Clamp to track duration
        self.duration
            .map_or(interpolated, |duration| interpolated.min(duration))
    }

    /// Fold elapsed play time into `position` before a state change.
    fn settle(&mut self) {
        self.position = self.interpolated_position();
        self.updated_at = Instant::now();
    }
}

/// Audio output without a sound device.
///
/// Tracks the transport state and advances the position with wall-clock time
/// while playing, so front ends without an audio stack can still show
/// progress.
#[derive(Debug)]
pub struct VirtualAudioOutput {
    state: Mutex<TransportState>,
}

impl Default for VirtualAudioOutput {
    fn default() -> Self {
        Self {
            state: Mutex::new(TransportState {
                url: None,
                is_playing: false,
                position: Duration::ZERO,
                duration: None,
                updated_at: Instant::now(),
            }),
        }
    }
}

impl VirtualAudioOutput {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// URL of the bound source
    #[must_use]
    pub fn url(&self) -> Option<String> {
        self.with_state(|state| state.url.clone())
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut TransportState) -> R) -> R {
        // Transport state stays consistent across a poisoned lock
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }
}

impl AudioOutput for VirtualAudioOutput {
    fn load(&self, url: &str, duration_hint: Option<Duration>) {
        self.with_state(|state| {
            state.url = Some(url.to_string());
            state.is_playing = false;
            state.position = Duration::ZERO;
            state.duration = duration_hint;
            state.updated_at = Instant::now();
        });
    }

    fn unload(&self) {
        self.with_state(|state| {
            state.url = None;
            state.is_playing = false;
            state.position = Duration::ZERO;
            state.duration = None;
            state.updated_at = Instant::now();
        });
    }

    fn play(&self) {
        self.with_state(|state| {
            if state.url.is_some() && !state.is_playing {
                state.settle();
                state.is_playing = true;
            }
        });
    }

    fn pause(&self) {
        self.with_state(|state| {
            if state.is_playing {
                state.settle();
                state.is_playing = false;
            }
        });
    }

    fn is_playing(&self) -> bool {
        self.with_state(|state| {
            // Reaching the end stops playback
            if state.is_playing
                && state
                    .duration
                    .is_some_and(|d| state.interpolated_position() >= d)
            {
                state.settle();
                state.is_playing = false;
            }
            state.is_playing
        })
    }

    fn position(&self) -> Duration {
        self.with_state(|state| state.interpolated_position())
    }

    fn duration(&self) -> Option<Duration> {
        self.with_state(|state| state.duration)
    }

    fn seek(&self, position: Duration) {
        self.with_state(|state| {
            state.position = state
                .duration
                .map_or(position, |duration| position.min(duration));
            state.updated_at = Instant::now();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_virtual_output_default() {
        let output = VirtualAudioOutput::new();
        assert!(output.url().is_none());
        assert!(!output.is_playing());
        assert_eq!(output.position(), Duration::ZERO);
        assert_eq!(output.duration(), None);
    }

    #[test]
    fn test_play_requires_source() {
        let output = VirtualAudioOutput::new();
        output.play();
        assert!(!output.is_playing());

        output.load("https://x/y.mp3", Some(Duration::from_secs(30)));
        output.play();
        assert!(output.is_playing());
    }

    #[test]
    fn test_paused_position_does_not_advance() {
        let output = VirtualAudioOutput::new();
        output.load("https://x/y.mp3", Some(Duration::from_secs(30)));
        output.seek(Duration::from_secs(12));

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(output.position(), Duration::from_secs(12));
    }

    #[test]
    fn test_playing_position_advances() {
        let output = VirtualAudioOutput::new();
        output.load("https://x/y.mp3", Some(Duration::from_secs(30)));
        output.play();

        std::thread::sleep(Duration::from_millis(20));
        assert!(output.position() >= Duration::from_millis(20));

        output.pause();
        let paused_at = output.position();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(output.position(), paused_at);
    }

    #[test]
    fn test_seek_clamped_to_duration() {
        let output = VirtualAudioOutput::new();
        output.load("https://x/y.mp3", Some(Duration::from_secs(30)));
        output.seek(Duration::from_secs(90));
        assert_eq!(output.position(), Duration::from_secs(30));
    }

    #[test]
    fn test_load_resets_transport() {
        let output = VirtualAudioOutput::new();
        output.load("https://x/a.mp3", Some(Duration::from_secs(30)));
        output.play();
        output.seek(Duration::from_secs(10));

        output.load("https://x/b.mp3", None);
        assert_eq!(output.url().as_deref(), Some("https://x/b.mp3"));
        assert!(!output.is_playing());
        assert_eq!(output.position(), Duration::ZERO);
        assert_eq!(output.duration(), None);

        output.unload();
        assert!(output.url().is_none());
    }
}
