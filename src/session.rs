use std::future::Future;
use std::sync::Arc;

use anyhow::Result;

use crate::client::{Client, Connectivity, ConnectionEvent, EventRx, FrameSender};
use crate::codec::FrameCodec;
use crate::relay::InputRelay;
use crate::store::SessionStore;

/// Why [`Session::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ended {
    Shutdown,
    /// Retries are exhausted; a restart is needed.
    GaveUp,
    /// The connection stopped producing events.
    StreamClosed,
}

/// Wires a [`Client`] to a [`SessionStore`]: every inbound frame is decoded
/// and applied in arrival order on a single task.
pub struct Session {
    client: Client,
    events: EventRx,
    store: Arc<SessionStore>,
}

impl Session {
    pub fn new(mut client: Client, store: Arc<SessionStore>) -> Result<Self> {
        let events = client.events()?;
        Ok(Self {
            client,
            events,
            store,
        })
    }

    pub fn store(&self) -> Arc<SessionStore> {
        self.store.clone()
    }

    pub fn relay(&self) -> InputRelay<FrameSender> {
        InputRelay::new(self.client.sender(), self.store.subscribe())
    }

    /// Applies one connection event to the store. Returns `false` once the
    /// connection will not produce anything further.
    pub fn handle_event(&self, event: ConnectionEvent) -> bool {
        match event {
            ConnectionEvent::FrameReceived(raw) => match FrameCodec::decode(&raw) {
                Ok(snapshot) => {
                    tracing::debug!("applying snapshot: state={}", snapshot.state());
                    self.store.apply(snapshot);
                }
                Err(e) => {
                    tracing::warn!("dropping frame: {}", e);
                }
            },
            ConnectionEvent::Connecting { attempt } => {
                tracing::debug!("connecting (attempt {})", attempt);
                self.store.set_connectivity(Connectivity::Connecting);
            }
            ConnectionEvent::Connected => self.store.set_connectivity(Connectivity::Open),
            ConnectionEvent::Disconnected { reason } => {
                tracing::info!("disconnected: {}", reason);
                self.store.set_connectivity(Connectivity::Closed);
            }
            ConnectionEvent::GaveUp { attempts } => {
                tracing::error!("connection lost for good after {} attempts", attempts);
                self.store.mark_terminal();
                return false;
            }
        }
        true
    }

    /// Consumes events until the connection gives up, the stream ends, or
    /// `shutdown` resolves. The connection is torn down on every exit path.
    pub async fn run<F>(mut self, shutdown: F) -> Ended
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let ended = loop {
            tokio::select! {
                _ = &mut shutdown => break Ended::Shutdown,
                event = self.events.recv() => match event {
                    Some(event) => {
                        if !self.handle_event(event) {
                            break Ended::GaveUp;
                        }
                    }
                    None => break Ended::StreamClosed,
                },
            }
        };
        self.client.shutdown().await;
        if ended != Ended::GaveUp {
            self.store.set_connectivity(Connectivity::Closed);
        }
        ended
    }
}
