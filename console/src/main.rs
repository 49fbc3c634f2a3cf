mod config;
mod render;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use karaoke_sync::relay::Relayed;
use karaoke_sync::store::SessionStore;
use karaoke_sync::{Ended, Session};
use tracing_subscriber::fmt::time::ChronoLocal;

use crate::config::Config;

/// Terminal front end for the karaoke orchestration server.
#[derive(Parser)]
struct Cli {
    /// Websocket endpoint of the orchestration server
    #[arg(long)]
    endpoint: Option<String>,
    /// Fixed delay between reconnect attempts, in milliseconds
    #[arg(long)]
    retry_interval_ms: Option<u64>,
    /// Reconnect attempts before giving up
    #[arg(long)]
    max_retries: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let args = Cli::parse();
    let mut config = Config::from_env().context("Failed to load console configuration")?;
    if let Some(endpoint) = args.endpoint {
        config.endpoint = endpoint;
    }
    if let Some(ms) = args.retry_interval_ms {
        config.retry_interval = Duration::from_millis(ms);
    }
    if let Some(max_retries) = args.max_retries {
        config.max_retries = max_retries;
    }

    // --- 2. Initialize Logging ---
    // Logs go to stderr so they do not tear the rendered screen.
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Connecting to {}", config.endpoint);

    // --- 3. Connect and wire up the session ---
    let client = karaoke_sync::connect_with_config(config.client_config())
        .context("Failed to start the connection")?;
    let store = Arc::new(SessionStore::new());
    let session = Session::new(client, store.clone())?;
    let mut relay = session.relay();

    let render_handle = tokio::spawn(render::render_loop(store.subscribe()));

    // Keyboard stands in for the two physical buttons. Stdin is read on a
    // plain thread so a pending read never holds up runtime shutdown.
    let (key_tx, mut key_rx) = tokio::sync::mpsc::channel::<String>(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            match line {
                Ok(line) => {
                    if key_tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!("failed to read input: {}", e);
                    break;
                }
            }
        }
    });

    let input_handle = tokio::spawn(async move {
        while let Some(line) = key_rx.recv().await {
            let outcome = match line.trim() {
                "a" | "A" => relay.select_a().await,
                "b" | "B" => relay.select_b().await,
                "" => continue,
                other => {
                    tracing::warn!("ignoring input {:?}; type a or b", other);
                    continue;
                }
            };
            if outcome == Relayed::Refused {
                tracing::warn!("choice not sent: server is not connected");
            }
        }
    });

    // --- 4. Run until Ctrl-C or the connection is gone for good ---
    let ended = session
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    input_handle.abort();
    // Let the final state (including a lost link) reach the screen.
    tokio::time::sleep(Duration::from_millis(100)).await;
    render_handle.abort();

    match ended {
        Ended::Shutdown => {
            tracing::info!("Shut down.");
            Ok(())
        }
        Ended::GaveUp => Err(anyhow::anyhow!(
            "lost the connection to {} after {} retries; restart to reconnect",
            config.endpoint,
            config.max_retries
        )),
        Ended::StreamClosed => Err(anyhow::anyhow!("connection to {} stopped unexpectedly", config.endpoint)),
    }
}
