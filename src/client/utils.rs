use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;

use crate::client::config::Config;

pub fn build_request(config: &Config) -> tokio_tungstenite::tungstenite::Result<Request> {
    config.endpoint().into_client_request()
}
