use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
#[cfg(test)]
use mockall::automock;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

mod config;
mod consts;
mod retry;
mod utils;

pub use config::{Config, ConfigBuilder};
pub use consts::DEFAULT_ENDPOINT;
use consts::CLOSE_TIMEOUT;
pub use retry::RetryPolicy;

pub type EventRx = mpsc::Receiver<ConnectionEvent>;
type EventTx = mpsc::Sender<ConnectionEvent>;
type FrameTx = mpsc::Sender<String>;
type FrameRx = mpsc::Receiver<String>;
type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = futures_util::stream::SplitSink<WsStream, Message>;
type WsReader = futures_util::stream::SplitStream<WsStream>;

/// Lifecycle of the transport, independent of the session phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Everything the connection reports to its single consumer, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// A connection attempt started. `attempt` is 0 for the initial connection;
    /// reconnects count from 1 and the count resets after a successful open.
    Connecting { attempt: u32 },
    Connected,
    Disconnected { reason: String },
    FrameReceived(String),
    /// The retry budget is spent. Nothing further will be attempted.
    GaveUp { attempts: u32 },
}

/// Outbound side of a connection. Implemented by [`Client`] and [`FrameSender`].
#[cfg_attr(test, automock)]
#[async_trait]
pub trait FrameSink: Send + Sync {
    /// Hands a frame to the open connection. Returns `false` (and logs) when
    /// the connection is not open; the frame is not kept for later.
    async fn send_frame(&self, frame: String) -> bool;
}

/// Cloneable handle for sending frames on a [`Client`]'s connection.
#[derive(Clone)]
pub struct FrameSender {
    f_tx: FrameTx,
    connectivity: watch::Receiver<Connectivity>,
}

impl FrameSender {
    pub async fn send(&self, frame: String) -> bool {
        let connectivity = *self.connectivity.borrow();
        if connectivity != Connectivity::Open {
            tracing::warn!("dropping outbound frame {:?}: connection is {:?}", frame, connectivity);
            return false;
        }
        match self.f_tx.send(frame).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("dropping outbound frame {:?}: supervisor stopped", e.0);
                false
            }
        }
    }
}

#[async_trait]
impl FrameSink for FrameSender {
    async fn send_frame(&self, frame: String) -> bool {
        self.send(frame).await
    }
}

/// A long-lived, self-healing connection to the orchestration server.
pub struct Client {
    sender: FrameSender,
    events: Option<EventRx>,
    terminal: Arc<AtomicBool>,
    cancel: CancellationToken,
    supervisor: Option<tokio::task::JoinHandle<()>>,
}

impl Client {
    /// Takes the event stream. There is exactly one consumer; a second call fails.
    pub fn events(&mut self) -> Result<EventRx> {
        self.events
            .take()
            .ok_or_else(|| anyhow::anyhow!("event stream already taken"))
    }

    pub fn connectivity(&self) -> watch::Receiver<Connectivity> {
        self.sender.connectivity.clone()
    }

    /// True once the retry budget has been exhausted.
    pub fn is_terminal(&self) -> bool {
        self.terminal.load(Ordering::SeqCst)
    }

    pub fn sender(&self) -> FrameSender {
        self.sender.clone()
    }

    pub async fn send(&self, frame: String) -> bool {
        self.sender.send(frame).await
    }

    /// Closes the connection, cancels any pending retry and waits for the
    /// supervisor to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.supervisor.take() {
            if let Err(e) = handle.await {
                tracing::error!("connection supervisor failed: {}", e);
            }
        }
    }
}

#[async_trait]
impl FrameSink for Client {
    async fn send_frame(&self, frame: String) -> bool {
        self.send(frame).await
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.supervisor.take() {
            handle.abort();
        }
    }
}

/// State shared between the supervisor and whatever it reports to.
struct Links {
    e_tx: EventTx,
    state_tx: watch::Sender<Connectivity>,
    terminal: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl Links {
    fn set(&self, connectivity: Connectivity) {
        self.state_tx.send_replace(connectivity);
    }

    /// Delivers an event; `false` means the consumer is gone or we are shutting down.
    async fn emit(&self, event: ConnectionEvent) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            sent = self.e_tx.send(event) => sent.is_ok(),
        }
    }
}

enum Outcome {
    /// The connection dropped and may be retried.
    Lost(String),
    /// Shutdown was requested, or nobody is listening any more.
    Stop,
}

struct Supervisor {
    config: Config,
    f_rx: FrameRx,
    links: Links,
}

impl Supervisor {
    async fn run(mut self) {
        let endpoint = self.config.endpoint().to_string();
        let retry = self.config.retry();
        let mut attempt: u32 = 0;

        loop {
            self.links.set(Connectivity::Connecting);
            if !self.links.emit(ConnectionEvent::Connecting { attempt }).await {
                break;
            }

            let connected = match utils::build_request(&self.config) {
                Ok(request) => tokio::select! {
                    _ = self.links.cancel.cancelled() => break,
                    result = tokio_tungstenite::connect_async(request) => result,
                },
                Err(e) => Err(e),
            };

            let reason = match connected {
                Ok((ws_stream, _)) => {
                    attempt = 0;
                    discard_stale_frames(&mut self.f_rx);
                    tracing::info!("connected to {}", endpoint);
                    self.links.set(Connectivity::Open);
                    if !self.links.emit(ConnectionEvent::Connected).await {
                        break;
                    }
                    match pump(ws_stream, &mut self.f_rx, &self.links).await {
                        Outcome::Lost(reason) => reason,
                        Outcome::Stop => break,
                    }
                }
                Err(e) => {
                    tracing::warn!("failed to connect to {}: {}", endpoint, e);
                    e.to_string()
                }
            };

            self.links.set(Connectivity::Closed);
            if !self.links.emit(ConnectionEvent::Disconnected { reason }).await {
                break;
            }

            attempt += 1;
            match retry.delay_for(attempt) {
                Some(delay) => {
                    tracing::info!(
                        "reconnecting to {} in {:?} (attempt {}/{})",
                        endpoint,
                        delay,
                        attempt,
                        retry.max_retries()
                    );
                    tokio::select! {
                        _ = self.links.cancel.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                None => {
                    let attempts = attempt - 1;
                    tracing::error!("giving up on {} after {} reconnect attempts", endpoint, attempts);
                    self.links.terminal.store(true, Ordering::SeqCst);
                    self.links.emit(ConnectionEvent::GaveUp { attempts }).await;
                    break;
                }
            }
        }

        self.links.set(Connectivity::Closed);
        tracing::debug!("connection supervisor for {} stopped", endpoint);
    }
}

/// Frames accepted for a connection that has since dropped are not delivered
/// on the next one.
fn discard_stale_frames(f_rx: &mut FrameRx) {
    let mut discarded = 0;
    while f_rx.try_recv().is_ok() {
        discarded += 1;
    }
    if discarded > 0 {
        tracing::warn!("discarded {} frames queued for a previous connection", discarded);
    }
}

/// Runs the closing handshake: `Closing` lasts until the peer answers our
/// close frame or [`CLOSE_TIMEOUT`] passes.
async fn close(write: &mut WsWriter, read: &mut WsReader, links: &Links) {
    links.set(Connectivity::Closing);
    if let Err(e) = write.send(Message::Close(None)).await {
        tracing::debug!("failed to send close frame: {}", e);
        return;
    }

    let acknowledged = tokio::time::timeout(CLOSE_TIMEOUT, async {
        while let Some(Ok(message)) = read.next().await {
            if let Message::Close(_) = message {
                return true;
            }
        }
        false
    })
    .await;
    match acknowledged {
        Ok(true) => tracing::debug!("close acknowledged by peer"),
        Ok(false) => tracing::debug!("stream ended before the close was acknowledged"),
        Err(_) => tracing::warn!("peer did not acknowledge close within {:?}", CLOSE_TIMEOUT),
    }
}

async fn pump(ws_stream: WsStream, f_rx: &mut FrameRx, links: &Links) -> Outcome {
    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            _ = links.cancel.cancelled() => {
                close(&mut write, &mut read, links).await;
                return Outcome::Stop;
            }
            frame = f_rx.recv() => match frame {
                Some(text) => {
                    tracing::debug!("sending frame: {:?}", text);
                    if let Err(e) = write.send(Message::Text(text)).await {
                        tracing::error!("failed to send message: {}", e);
                        return Outcome::Lost(e.to_string());
                    }
                }
                None => {
                    close(&mut write, &mut read, links).await;
                    return Outcome::Stop;
                }
            },
            message = read.next() => match message {
                None => {
                    tracing::info!("connection stream ended");
                    return Outcome::Lost("stream ended".to_string());
                }
                Some(Err(e)) => {
                    tracing::error!("failed to read message: {}", e);
                    return Outcome::Lost(e.to_string());
                }
                Some(Ok(Message::Text(text))) => {
                    tracing::debug!("received frame: {} bytes", text.len());
                    if !links.emit(ConnectionEvent::FrameReceived(text)).await {
                        close(&mut write, &mut read, links).await;
                        return Outcome::Stop;
                    }
                }
                Some(Ok(Message::Binary(bin))) => {
                    tracing::warn!("unexpected binary message: {} bytes", bin.len());
                }
                Some(Ok(Message::Close(reason))) => {
                    tracing::info!("connection closed: {:?}", reason);
                    links.set(Connectivity::Closing);
                    // Sends the automatic close reply.
                    if let Err(e) = write.flush().await {
                        tracing::debug!("failed to answer close: {}", e);
                    }
                    return Outcome::Lost(
                        reason
                            .map(|frame| format!("closed by peer: {} {}", frame.code, frame.reason))
                            .unwrap_or_else(|| "closed by peer".to_string()),
                    );
                }
                Some(Ok(_)) => {}
            },
        }
    }
}

/// Starts a supervised connection with the given config. Must be called from
/// within a tokio runtime. The connection itself is established in the
/// background; watch [`Client::events`] or [`Client::connectivity`].
pub fn connect_with_config(config: Config) -> Result<Client> {
    utils::build_request(&config)
        .map_err(|e| anyhow::anyhow!("invalid endpoint {:?}: {}", config.endpoint(), e))?;

    let (f_tx, f_rx) = mpsc::channel(config.capacity());
    let (e_tx, e_rx) = mpsc::channel(config.capacity());
    let (state_tx, state_rx) = watch::channel(Connectivity::Closed);
    let terminal = Arc::new(AtomicBool::new(false));
    let cancel = CancellationToken::new();

    let supervisor = Supervisor {
        config,
        f_rx,
        links: Links {
            e_tx,
            state_tx,
            terminal: terminal.clone(),
            cancel: cancel.clone(),
        },
    };
    let handle = tokio::spawn(supervisor.run());

    Ok(Client {
        sender: FrameSender {
            f_tx,
            connectivity: state_rx,
        },
        events: Some(e_rx),
        terminal,
        cancel,
        supervisor: Some(handle),
    })
}

/// Connects to the default local endpoint.
pub fn connect() -> Result<Client> {
    connect_with_config(Config::new())
}
