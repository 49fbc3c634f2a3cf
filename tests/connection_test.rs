use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use karaoke_sync::relay::Relayed;
use karaoke_sync::store::SessionStore;
use karaoke_sync::types::SessionState;
use karaoke_sync::{Config, ConnectionEvent, Connectivity, EventRx, Session};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

const WAIT: Duration = Duration::from_secs(5);

async fn listen() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("ws://{}", listener.local_addr().unwrap());
    (listener, endpoint)
}

async fn accept(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = tokio::time::timeout(WAIT, listener.accept())
        .await
        .expect("client never connected")
        .unwrap();
    tokio_tungstenite::accept_async(stream).await.unwrap()
}

async fn next_event(events: &mut EventRx) -> ConnectionEvent {
    tokio::time::timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event stream closed")
}

fn fast_config(endpoint: &str, max_retries: u32) -> Config {
    Config::builder()
        .with_endpoint(endpoint)
        .with_retry_interval(Duration::from_millis(100))
        .with_max_retries(max_retries)
        .build()
}

#[tokio::test]
async fn test_review_round_trip() {
    let (listener, endpoint) = listen().await;
    let client = karaoke_sync::connect_with_config(fast_config(&endpoint, 3)).unwrap();
    let store = Arc::new(SessionStore::new());
    let session = Session::new(client, store.clone()).unwrap();
    let mut relay = session.relay();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let running = tokio::spawn(session.run(async {
        stop_rx.await.ok();
    }));

    let mut server = accept(&listener).await;
    server
        .send(Message::Text(
            r#"{"state":"State.REVIEW_TXT","model":"claude","prompt":"The capital of France is _","result_a":"Paris is lovely","result_b":"Rome is eternal","error":null}"#
                .to_string(),
        ))
        .await
        .unwrap();

    let mut rx = store.subscribe();
    let state = tokio::time::timeout(
        WAIT,
        rx.wait_for(|s| s.snapshot().state() == SessionState::ReviewTxt && s.link().is_up()),
    )
    .await
    .unwrap()
    .unwrap()
    .clone();
    assert_eq!(state.highlight().range(), 25..26);
    assert_eq!(state.snapshot().result_a(), "Paris is lovely");

    assert_eq!(relay.select_a().await, Relayed::Sent);
    assert_eq!(relay.select_a().await, Relayed::Suppressed);

    let received = tokio::time::timeout(WAIT, server.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(received, Message::Text("A".to_string()));
    // The duplicate was never put on the wire.
    assert!(tokio::time::timeout(Duration::from_millis(200), server.next()).await.is_err());

    stop_tx.send(()).ok();
    assert_eq!(running.await.unwrap(), karaoke_sync::Ended::Shutdown);
}

#[tokio::test]
async fn test_malformed_frame_is_dropped() {
    let (listener, endpoint) = listen().await;
    let client = karaoke_sync::connect_with_config(fast_config(&endpoint, 3)).unwrap();
    let store = Arc::new(SessionStore::new());
    let session = Session::new(client, store.clone()).unwrap();
    let running = tokio::spawn(session.run(std::future::pending::<()>()));

    let mut server = accept(&listener).await;
    for frame in [
        "{\"state\": \"State.TRANSCRIBING\", \"instruction\": \"Say a city\"",
        r#"{"state":"State.SLEEPING"}"#,
        r#"{"state":"State.ERROR","error":"transcription timeout"}"#,
    ] {
        server.send(Message::Text(frame.to_string())).await.unwrap();
    }

    let mut rx = store.subscribe();
    let state = tokio::time::timeout(WAIT, rx.wait_for(|s| s.generation() > 0))
        .await
        .unwrap()
        .unwrap()
        .clone();
    // Only the well-formed frame was applied.
    assert_eq!(state.generation(), 1);
    assert_eq!(state.snapshot().state(), SessionState::Error);
    assert_eq!(state.snapshot().error(), "transcription timeout");
    assert_eq!(state.link().connectivity(), Connectivity::Open);
    assert!(!running.is_finished());
    running.abort();
}

#[tokio::test]
async fn test_reconnects_after_close_with_fixed_delay() {
    let (listener, endpoint) = listen().await;
    let mut client = karaoke_sync::connect_with_config(fast_config(&endpoint, 3)).unwrap();
    let mut events = client.events().unwrap();

    assert_eq!(next_event(&mut events).await, ConnectionEvent::Connecting { attempt: 0 });
    let mut server = accept(&listener).await;
    assert_eq!(next_event(&mut events).await, ConnectionEvent::Connected);

    let closed_at = Instant::now();
    server.close(None).await.unwrap();
    assert!(matches!(
        next_event(&mut events).await,
        ConnectionEvent::Disconnected { .. }
    ));
    assert_eq!(*client.connectivity().borrow(), Connectivity::Closed);
    assert!(!client.send("A".to_string()).await);

    assert_eq!(next_event(&mut events).await, ConnectionEvent::Connecting { attempt: 1 });
    assert!(closed_at.elapsed() >= Duration::from_millis(100));
    let _server = accept(&listener).await;
    assert_eq!(next_event(&mut events).await, ConnectionEvent::Connected);
    assert_eq!(*client.connectivity().borrow(), Connectivity::Open);

    client.shutdown().await;
}

#[tokio::test]
async fn test_gives_up_after_retry_budget() {
    let (listener, endpoint) = listen().await;
    drop(listener);

    let mut client = karaoke_sync::connect_with_config(fast_config(&endpoint, 2)).unwrap();
    let mut events = client.events().unwrap();
    assert!(client.events().is_err());

    let started = Instant::now();
    let mut connecting = Vec::new();
    loop {
        match next_event(&mut events).await {
            ConnectionEvent::Connecting { attempt } => connecting.push(attempt),
            ConnectionEvent::Disconnected { .. } => {}
            ConnectionEvent::GaveUp { attempts } => {
                assert_eq!(attempts, 2);
                break;
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
    assert_eq!(connecting, vec![0, 1, 2]);
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert!(client.is_terminal());

    // Nothing is attempted after giving up.
    assert!(tokio::time::timeout(WAIT, events.recv()).await.unwrap().is_none());
    assert_eq!(*client.connectivity().borrow(), Connectivity::Closed);
}

#[tokio::test]
async fn test_shutdown_closes_connection() {
    let (listener, endpoint) = listen().await;
    let mut client = karaoke_sync::connect_with_config(fast_config(&endpoint, 3)).unwrap();
    let mut events = client.events().unwrap();
    let mut server = accept(&listener).await;
    while next_event(&mut events).await != ConnectionEvent::Connected {}

    let mut connectivity = client.connectivity();
    connectivity.mark_unchanged();
    let shutting_down = tokio::spawn(client.shutdown());

    let message = tokio::time::timeout(WAIT, server.next()).await.unwrap();
    assert!(matches!(message, Some(Ok(Message::Close(_)))));
    // The handshake stays open until the server answers.
    assert!(connectivity.has_changed().unwrap());
    assert_eq!(*connectivity.borrow_and_update(), Connectivity::Closing);
    assert!(!shutting_down.is_finished());

    // Reading on sends the server's close reply.
    let after = tokio::time::timeout(WAIT, server.next()).await.unwrap();
    assert!(matches!(after, None | Some(Err(_))));
    tokio::time::timeout(Duration::from_millis(500), shutting_down)
        .await
        .expect("shutdown waited for the close timeout")
        .unwrap();
    assert_eq!(*connectivity.borrow(), Connectivity::Closed);
}
