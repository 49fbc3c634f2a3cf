use tokio::sync::watch;

use crate::client::FrameSink;
use crate::codec::FrameCodec;
use crate::store::StoreState;
use crate::types::Choice;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relayed {
    Sent,
    /// A choice was already sent for the frame currently on screen.
    Suppressed,
    /// The connection was not open; nothing was sent.
    Refused,
}

/// Turns the user's A/B gesture into a choice frame.
///
/// The server decides whether a choice is legal in its current phase, so the
/// relay forwards out-of-phase choices too. It only limits itself to one
/// send per rendered snapshot.
pub struct InputRelay<S> {
    sink: S,
    store: watch::Receiver<StoreState>,
    last_sent: Option<u64>,
}

impl<S: FrameSink> InputRelay<S> {
    pub fn new(sink: S, store: watch::Receiver<StoreState>) -> Self {
        Self {
            sink,
            store,
            last_sent: None,
        }
    }

    pub async fn select_a(&mut self) -> Relayed {
        self.select(Choice::A).await
    }

    pub async fn select_b(&mut self) -> Relayed {
        self.select(Choice::B).await
    }

    pub async fn select(&mut self, choice: Choice) -> Relayed {
        let (generation, state) = {
            let current = self.store.borrow();
            (current.generation(), current.snapshot().state())
        };

        if self.last_sent == Some(generation) {
            tracing::debug!("suppressing choice {} for already answered frame {}", choice, generation);
            return Relayed::Suppressed;
        }
        if !state.is_review() {
            tracing::debug!("forwarding choice {} outside review (state={})", choice, state);
        }

        if self.sink.send_frame(FrameCodec::encode(choice)).await {
            tracing::info!("sent choice {}", choice);
            self.last_sent = Some(generation);
            Relayed::Sent
        } else {
            Relayed::Refused
        }
    }
}
