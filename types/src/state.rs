use std::fmt;
use std::str::FromStr;

use crate::Choice;

/// Prefix the server puts in front of every phase name (`str(State.X)`).
pub const STATE_PREFIX: &str = "State.";

/// The closed set of session phases pushed by the orchestration server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SessionState {
    #[default]
    Initializing,
    Transcribing,
    ReviewTxt,
    ReviewImg,
    InferenceTxtA,
    InferenceTxtB,
    InferenceImgA,
    InferenceImgB,
    SelectATxt,
    SelectBTxt,
    SelectAImg,
    SelectBImg,
    Error,
}

/// What kind of candidates a phase is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Medium {
    Text,
    Image,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownState(pub String);

impl fmt::Display for UnknownState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown session state: {:?}", self.0)
    }
}

impl std::error::Error for UnknownState {}

impl SessionState {
    pub const ALL: [SessionState; 13] = [
        SessionState::Initializing,
        SessionState::Transcribing,
        SessionState::ReviewTxt,
        SessionState::ReviewImg,
        SessionState::InferenceTxtA,
        SessionState::InferenceTxtB,
        SessionState::InferenceImgA,
        SessionState::InferenceImgB,
        SessionState::SelectATxt,
        SessionState::SelectBTxt,
        SessionState::SelectAImg,
        SessionState::SelectBImg,
        SessionState::Error,
    ];

    /// The bare phase name, e.g. `REVIEW_TXT`.
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Initializing => "INITIALIZING",
            SessionState::Transcribing => "TRANSCRIBING",
            SessionState::ReviewTxt => "REVIEW_TXT",
            SessionState::ReviewImg => "REVIEW_IMG",
            SessionState::InferenceTxtA => "INFERENCE_TXT_A",
            SessionState::InferenceTxtB => "INFERENCE_TXT_B",
            SessionState::InferenceImgA => "INFERENCE_IMG_A",
            SessionState::InferenceImgB => "INFERENCE_IMG_B",
            SessionState::SelectATxt => "SELECT_A_TXT",
            SessionState::SelectBTxt => "SELECT_B_TXT",
            SessionState::SelectAImg => "SELECT_A_IMG",
            SessionState::SelectBImg => "SELECT_B_IMG",
            SessionState::Error => "ERROR",
        }
    }

    /// Phases in which the server accepts a choice token.
    pub fn is_review(&self) -> bool {
        matches!(self, SessionState::ReviewTxt | SessionState::ReviewImg)
    }

    pub fn is_inference(&self) -> bool {
        matches!(
            self,
            SessionState::InferenceTxtA
                | SessionState::InferenceTxtB
                | SessionState::InferenceImgA
                | SessionState::InferenceImgB
        )
    }

    pub fn is_selection(&self) -> bool {
        matches!(
            self,
            SessionState::SelectATxt
                | SessionState::SelectBTxt
                | SessionState::SelectAImg
                | SessionState::SelectBImg
        )
    }

    /// The candidate an inference or selection phase refers to.
    pub fn candidate(&self) -> Option<Choice> {
        match self {
            SessionState::InferenceTxtA
            | SessionState::InferenceImgA
            | SessionState::SelectATxt
            | SessionState::SelectAImg => Some(Choice::A),
            SessionState::InferenceTxtB
            | SessionState::InferenceImgB
            | SessionState::SelectBTxt
            | SessionState::SelectBImg => Some(Choice::B),
            _ => None,
        }
    }

    pub fn medium(&self) -> Option<Medium> {
        match self {
            SessionState::ReviewTxt
            | SessionState::InferenceTxtA
            | SessionState::InferenceTxtB
            | SessionState::SelectATxt
            | SessionState::SelectBTxt => Some(Medium::Text),
            SessionState::ReviewImg
            | SessionState::InferenceImgA
            | SessionState::InferenceImgB
            | SessionState::SelectAImg
            | SessionState::SelectBImg => Some(Medium::Image),
            SessionState::Initializing | SessionState::Transcribing | SessionState::Error => None,
        }
    }
}

impl FromStr for SessionState {
    type Err = UnknownState;

    /// Accepts both the server's `State.X` form and the bare `X`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.strip_prefix(STATE_PREFIX).unwrap_or(s);
        SessionState::ALL
            .into_iter()
            .find(|state| state.name() == name)
            .ok_or_else(|| UnknownState(s.to_string()))
    }
}

impl TryFrom<String> for SessionState {
    type Error = UnknownState;

    fn try_from(value: String) -> Result<Self, UnknownState> {
        value.parse()
    }
}

impl From<SessionState> for String {
    fn from(value: SessionState) -> Self {
        value.to_string()
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", STATE_PREFIX, self.name())
    }
}
