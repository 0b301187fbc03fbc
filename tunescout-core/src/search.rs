//! Debounced search-as-you-type.
//!
//! The orchestrator is a small state machine per input field:
//!
//! ```text
//! Idle -> Debouncing -> Searching -> Displaying
//!   ^________________________|___________|   (empty query, failure, selection, dismissal)
//! ```
//!
//! Every keystroke replaces the single pending timer. A timer that fires
//! issues at most one catalog search, tagged with the request id current at
//! the time of the keystroke; completions whose tag is no longer current are
//! discarded.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::models::{Album, SearchResultSet, Track};
use crate::provider::CatalogSearch;

/// Default quiet period after the last keystroke
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    /// No query pending and no results shown
    Idle,
    /// Waiting for input to settle
    Debouncing,
    /// A catalog search is in flight
    Searching,
    /// Results are available in the panel
    Displaying,
}

/// Item in the displayed results the user picked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultRef {
    Album(usize),
    Track(usize),
}

/// What a pick forwards to the caller; exactly one per selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Album(Album),
    Track(Track),
}

/// Events emitted by the search orchestrator
#[derive(Debug, Clone)]
pub enum SearchEvent {
    /// Input changed and a new debounce window started
    Debouncing { query: String },
    /// The debounce window elapsed and a search was sent
    Searching { query: String },
    /// Results arrived for the current query
    ResultsReady {
        query: String,
        results: SearchResultSet,
    },
    /// Results were cleared (empty query or failed search)
    Cleared,
    /// The result panel was closed
    PanelClosed,
    /// The user picked a result
    Selected { selection: Selection },
}

/// Point-in-time view of the orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSnapshot {
    pub phase: SearchPhase,
    pub query: String,
    pub results: SearchResultSet,
    pub panel_open: bool,
}

struct SearchInner {
    phase: SearchPhase,
    query: String,
    results: SearchResultSet,
    panel_open: bool,
    /// Tag of the most recent keystroke; older completions are stale
    request_id: u64,
    /// Single slot for the outstanding timer / in-flight request
    pending: Option<CancellationToken>,
}

impl SearchInner {
    fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.cancel();
        }
    }

    fn reset(&mut self) {
        self.phase = SearchPhase::Idle;
        self.results = SearchResultSet::default();
        self.panel_open = false;
    }
}

/// Search orchestrator for one input field
pub struct SearchOrchestrator {
    backend: Arc<dyn CatalogSearch>,
    debounce: Duration,
    inner: RwLock<SearchInner>,
    event_tx: broadcast::Sender<SearchEvent>,
}

impl SearchOrchestrator {
    /// Create a new orchestrator searching through `backend`
    #[must_use]
    pub fn new(backend: Arc<dyn CatalogSearch>, debounce: Duration) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(64);

        Arc::new(Self {
            backend,
            debounce,
            inner: RwLock::new(SearchInner {
                phase: SearchPhase::Idle,
                query: String::new(),
                results: SearchResultSet::default(),
                panel_open: false,
                request_id: 0,
                pending: None,
            }),
            event_tx,
        })
    }

    /// Subscribe to search events
    pub fn subscribe(&self) -> broadcast::Receiver<SearchEvent> {
        self.event_tx.subscribe()
    }

    /// Get the current state
    pub async fn snapshot(&self) -> SearchSnapshot {
        let inner = self.inner.read().await;
        SearchSnapshot {
            phase: inner.phase,
            query: inner.query.clone(),
            results: inner.results.clone(),
            panel_open: inner.panel_open,
        }
    }

    /// Handle a change of the input text.
    ///
    /// Opens the panel, cancels any pending timer (and any in-flight search)
    /// and restarts the debounce window.
    pub async fn input(self: &Arc<Self>, text: impl Into<String>) {
        let text = text.into();
        let token = CancellationToken::new();

        let request_id = {
            let mut inner = self.inner.write().await;
            inner.cancel_pending();
            inner.pending = Some(token.clone());
            inner.request_id += 1;
            inner.query.clone_from(&text);
            inner.phase = SearchPhase::Debouncing;
            inner.panel_open = true;
            let _ = self.event_tx.send(SearchEvent::Debouncing {
                query: text.clone(),
            });
            inner.request_id
        };

        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.run_debounced(text, request_id, token).await;
        });
    }

    /// Close the result panel (outside click or focus loss).
    ///
    /// The pending timer is cancelled and an in-flight search is aborted.
    pub async fn dismiss(&self) {
        let mut inner = self.inner.write().await;
        inner.cancel_pending();
        inner.request_id += 1;
        let was_open = inner.panel_open;
        inner.reset();

        if was_open {
            debug!("Search panel dismissed");
            let _ = self.event_tx.send(SearchEvent::PanelClosed);
        }
    }

    /// Pick a displayed result.
    ///
    /// Returns `None` when the panel is closed or the index is out of range;
    /// otherwise closes the panel, resets the query and forwards the pick.
    pub async fn select(&self, item: ResultRef) -> Option<Selection> {
        let mut inner = self.inner.write().await;
        if !inner.panel_open {
            return None;
        }

        let selection = match item {
            ResultRef::Album(index) => inner.results.albums.get(index).cloned().map(Selection::Album),
            ResultRef::Track(index) => inner.results.tracks.get(index).cloned().map(Selection::Track),
        }?;

        inner.cancel_pending();
        inner.request_id += 1;
        inner.query.clear();
        inner.reset();

        let _ = self.event_tx.send(SearchEvent::PanelClosed);
        let _ = self.event_tx.send(SearchEvent::Selected {
            selection: selection.clone(),
        });
        Some(selection)
    }

    async fn run_debounced(&self, query: String, request_id: u64, token: CancellationToken) {
        tokio::select! {
            () = token.cancelled() => {
                debug!("Debounce timer superseded for {:?}", query);
                return;
            }
            () = tokio::time::sleep(self.debounce) => {}
        }

        let trimmed = query.trim();

        {
            let mut inner = self.inner.write().await;
            if inner.request_id != request_id {
                return;
            }

            if trimmed.is_empty() {
                inner.pending = None;
                inner.reset();
                let _ = self.event_tx.send(SearchEvent::Cleared);
                let _ = self.event_tx.send(SearchEvent::PanelClosed);
                return;
            }

            inner.phase = SearchPhase::Searching;
            let _ = self.event_tx.send(SearchEvent::Searching {
                query: trimmed.to_string(),
            });
        }

        info!("Searching catalog for {:?}", trimmed);

        // Dropping the search future aborts the request
        let outcome = tokio::select! {
            () = token.cancelled() => {
                debug!("In-flight search for {:?} aborted", trimmed);
                return;
            }
            result = self.backend.search(trimmed) => result,
        };

        let mut inner = self.inner.write().await;
        if inner.request_id != request_id {
            debug!("Discarding stale search results for {:?}", trimmed);
            return;
        }
        inner.pending = None;

        match outcome {
            Ok(results) => {
                info!(
                    "Search for {:?} returned {} albums, {} artists, {} tracks",
                    trimmed,
                    results.albums.len(),
                    results.artists.len(),
                    results.tracks.len()
                );
                inner.phase = SearchPhase::Displaying;
                inner.results = results.clone();
                inner.panel_open = true;
                let _ = self.event_tx.send(SearchEvent::ResultsReady {
                    query: trimmed.to_string(),
                    results,
                });
            }
            Err(e) => {
                warn!("Search for {:?} failed: {}", trimmed, e);
                inner.reset();
                let _ = self.event_tx.send(SearchEvent::Cleared);
            }
        }
    }
}
