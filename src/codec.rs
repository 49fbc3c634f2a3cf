//! Wire format of the orchestration channel.
//!
//! Inbound frames are JSON objects describing the whole session (see
//! [`SessionSnapshot`]). Outbound frames are a bare choice token, `A` or `B`,
//! without any envelope.

use base64::Engine;
use serde_json::Value;

use crate::types::{Choice, SessionSnapshot, SessionState, UnknownState};

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("frame is not a JSON object")]
    NotAnObject,
    #[error("frame has no state")]
    MissingState,
    #[error(transparent)]
    UnknownState(#[from] UnknownState),
    #[error("invalid image payload: {0}")]
    Image(#[from] base64::DecodeError),
}

pub struct FrameCodec;

impl FrameCodec {
    /// Parses one inbound text frame into a snapshot.
    pub fn decode(raw: &str) -> Result<SessionSnapshot, DecodeError> {
        let value: Value = serde_json::from_str(raw)?;
        let object = value.as_object().ok_or(DecodeError::NotAnObject)?;

        // Checked up front so an unknown phase is reported as such rather than
        // as a generic deserialization failure.
        match object.get("state") {
            None | Some(Value::Null) => return Err(DecodeError::MissingState),
            Some(Value::String(state)) => {
                state.parse::<SessionState>()?;
            }
            Some(other) => return Err(UnknownState(other.to_string()).into()),
        }

        Ok(serde_json::from_value(value)?)
    }

    pub fn encode(choice: Choice) -> String {
        choice.token().to_string()
    }
}

/// Turns a base64 image payload from a snapshot into raw image bytes.
pub fn decode_image(payload: &str) -> Result<Vec<u8>, DecodeError> {
    Ok(base64::engine::general_purpose::STANDARD.decode(payload.trim())?)
}
