mod client;
pub mod codec;
pub mod relay;
mod session;
pub mod store;
pub mod view;

pub use karaoke_sync_types as types;
pub use client::{
    connect, connect_with_config, Client, Config, ConfigBuilder, ConnectionEvent, Connectivity,
    EventRx, FrameSender, FrameSink, RetryPolicy, DEFAULT_ENDPOINT,
};
pub use session::{Ended, Session};
