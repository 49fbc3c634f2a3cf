use serde::{Deserialize, Deserializer};

use crate::SessionState;

/// Base64 encoded image data, as produced by the image model.
pub type Base64EncodedImage = String;

/// The whole authoritative session state carried by one inbound frame.
///
/// Every field except `state` is optional on the wire; absent and `null`
/// both decode to the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SessionSnapshot {
    state: SessionState,
    #[serde(default, deserialize_with = "null_as_empty")]
    model: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    instruction: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    prompt: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    result_a: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    result_b: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    image_result_a: Base64EncodedImage,
    #[serde(default, deserialize_with = "null_as_empty")]
    image_result_b: Base64EncodedImage,
    #[serde(default, deserialize_with = "null_as_empty")]
    selected_image: Base64EncodedImage,
    #[serde(default, deserialize_with = "null_as_empty")]
    error: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl SessionSnapshot {
    pub fn new(state: SessionState) -> Self {
        Self {
            state,
            ..Self::default()
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_instruction(mut self, instruction: &str) -> Self {
        self.instruction = instruction.to_string();
        self
    }

    pub fn with_prompt(mut self, prompt: &str) -> Self {
        self.prompt = prompt.to_string();
        self
    }

    pub fn with_results(mut self, result_a: &str, result_b: &str) -> Self {
        self.result_a = result_a.to_string();
        self.result_b = result_b.to_string();
        self
    }

    pub fn with_image_results(mut self, image_a: &str, image_b: &str) -> Self {
        self.image_result_a = image_a.to_string();
        self.image_result_b = image_b.to_string();
        self
    }

    pub fn with_selected_image(mut self, image: &str) -> Self {
        self.selected_image = image.to_string();
        self
    }

    pub fn with_error(mut self, error: &str) -> Self {
        self.error = error.to_string();
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn result_a(&self) -> &str {
        &self.result_a
    }

    pub fn result_b(&self) -> &str {
        &self.result_b
    }

    pub fn image_result_a(&self) -> &str {
        &self.image_result_a
    }

    pub fn image_result_b(&self) -> &str {
        &self.image_result_b
    }

    pub fn selected_image(&self) -> &str {
        &self.selected_image
    }

    pub fn error(&self) -> &str {
        &self.error
    }

    /// `error` should be populated exactly when the phase is ERROR.
    pub fn is_consistent(&self) -> bool {
        (self.state == SessionState::Error) == !self.error.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_defaults_and_nulls() {
        let json = r#"{"state":"State.TRANSCRIBING","prompt":"Hello _ World","error":null,"instruction":null}"#;
        let snapshot: SessionSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.state(), SessionState::Transcribing);
        assert_eq!(snapshot.prompt(), "Hello _ World");
        assert_eq!(snapshot.error(), "");
        assert_eq!(snapshot.instruction(), "");
        assert_eq!(snapshot.result_a(), "");
        assert!(snapshot.is_consistent());
    }

    #[test]
    fn test_serialize_uses_wire_names() {
        let snapshot = SessionSnapshot::new(SessionState::ReviewTxt).with_results("x", "y");
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["state"], "State.REVIEW_TXT");
        assert_eq!(json["result_a"], "x");
        assert_eq!(json["image_result_b"], "");
    }

    #[test]
    fn test_consistency() {
        assert!(!SessionSnapshot::new(SessionState::Error).is_consistent());
        assert!(SessionSnapshot::new(SessionState::Error).with_error("boom").is_consistent());
        assert!(!SessionSnapshot::new(SessionState::ReviewImg).with_error("stale").is_consistent());
    }
}
