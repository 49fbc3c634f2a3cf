use std::ops::Range;
use std::sync::Arc;

use tokio::sync::watch;

use crate::client::Connectivity;
use crate::types::{SessionSnapshot, SessionState};

/// Marks where the user's spoken phrase goes in a prompt.
pub const PLACEHOLDER_MARKER: char = '_';

/// Character range of the placeholder marker in a prompt. Empty when the
/// prompt has no marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HighlightSpan {
    start: usize,
    end: usize,
}

impl HighlightSpan {
    /// Locates the first placeholder marker, counting in characters.
    pub fn locate(prompt: &str) -> Self {
        match prompt.chars().position(|c| c == PLACEHOLDER_MARKER) {
            Some(start) => Self {
                start,
                end: start + 1,
            },
            None => Self::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn contains(&self, index: usize) -> bool {
        self.range().contains(&index)
    }

    /// Splits `prompt` into the text before the span, the span, and the rest.
    pub fn split<'a>(&self, prompt: &'a str) -> (&'a str, &'a str, &'a str) {
        if self.is_empty() {
            return (prompt, "", "");
        }
        let byte_at = |index: usize| {
            prompt
                .char_indices()
                .nth(index)
                .map_or(prompt.len(), |(offset, _)| offset)
        };
        let (start, end) = (byte_at(self.start), byte_at(self.end));
        (&prompt[..start], &prompt[start..end], &prompt[end..])
    }
}

/// Link indicator shown next to (not inside) the session view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    connectivity: Connectivity,
    terminal: bool,
}

impl Link {
    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    pub fn is_up(&self) -> bool {
        self.connectivity == Connectivity::Open
    }

    /// Retries are exhausted; only a restart brings the link back.
    pub fn is_terminal(&self) -> bool {
        self.terminal
    }
}

/// Everything a renderer needs for one frame: the snapshot plus the fields
/// derived from it.
#[derive(Debug, Clone)]
pub struct StoreState {
    snapshot: Arc<SessionSnapshot>,
    highlight: HighlightSpan,
    mic_active: bool,
    link: Link,
    generation: u64,
}

impl StoreState {
    fn initial() -> Self {
        Self {
            snapshot: Arc::new(SessionSnapshot::default()),
            highlight: HighlightSpan::default(),
            mic_active: false,
            link: Link {
                connectivity: Connectivity::Closed,
                terminal: false,
            },
            generation: 0,
        }
    }

    pub fn snapshot(&self) -> &SessionSnapshot {
        &self.snapshot
    }

    pub fn highlight(&self) -> HighlightSpan {
        self.highlight
    }

    pub fn mic_active(&self) -> bool {
        self.mic_active
    }

    pub fn link(&self) -> Link {
        self.link
    }

    /// Bumped whenever an applied snapshot differs from the one on screen;
    /// identifies the rendered frame.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Single owner of the current snapshot. Writes replace the whole state in
/// one step, so subscribers never see a half-applied frame.
pub struct SessionStore {
    tx: watch::Sender<StoreState>,
}

impl SessionStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(StoreState::initial());
        Self { tx }
    }

    pub fn apply(&self, snapshot: SessionSnapshot) {
        if !snapshot.is_consistent() {
            tracing::warn!(
                "inconsistent snapshot: state={} error={:?}",
                snapshot.state(),
                snapshot.error()
            );
        }
        let highlight = HighlightSpan::locate(snapshot.prompt());
        let mic_active = snapshot.state() == SessionState::Transcribing;
        // The server re-pushes its snapshot on a short poll even when nothing
        // changed; a repeat is the same rendered frame.
        self.tx.send_if_modified(|current| {
            if *current.snapshot == snapshot {
                return false;
            }
            current.generation += 1;
            current.snapshot = Arc::new(snapshot);
            current.highlight = highlight;
            current.mic_active = mic_active;
            true
        });
    }

    pub fn current(&self) -> Arc<SessionSnapshot> {
        self.tx.borrow().snapshot.clone()
    }

    pub fn state(&self) -> StoreState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<StoreState> {
        self.tx.subscribe()
    }

    pub fn set_connectivity(&self, connectivity: Connectivity) {
        self.tx.send_if_modified(|current| {
            let changed = current.link.connectivity != connectivity;
            current.link.connectivity = connectivity;
            changed
        });
    }

    pub fn mark_terminal(&self) {
        self.tx.send_modify(|current| {
            current.link.connectivity = Connectivity::Closed;
            current.link.terminal = true;
        });
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
