//! Render-ready description of the current session.
//!
//! Every phase maps to exactly one [`Screen`] through an exhaustive match, so
//! adding a phase to [`SessionState`] will not compile until it has a view.

use std::fmt;
use std::time::Duration;

use crate::store::StoreState;
use crate::types::{Choice, Medium, SessionSnapshot, SessionState};

pub const REVIEW_HEADLINE: &str = "Push the color button corresponding to the best response:";

/// How often the highlight color advances.
pub const CYCLE_INTERVAL: Duration = Duration::from_millis(800);

pub const HIGHLIGHT_COLORS: [&str; 5] = ["#FFCA50", "#41A7D3", "#2DBBAA", "#A5519F", "#F05C76"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Loading,
    Listening { instruction: String },
    Generating { medium: Medium, pending: Choice },
    Choosing { medium: Medium },
    Chosen { medium: Medium, choice: Choice },
    Failed { message: String },
}

impl Screen {
    pub fn for_snapshot(snapshot: &SessionSnapshot) -> Self {
        match snapshot.state() {
            SessionState::Initializing => Screen::Loading,
            SessionState::Transcribing => Screen::Listening {
                instruction: snapshot.instruction().to_string(),
            },
            SessionState::InferenceTxtA => Screen::Generating {
                medium: Medium::Text,
                pending: Choice::A,
            },
            SessionState::InferenceTxtB => Screen::Generating {
                medium: Medium::Text,
                pending: Choice::B,
            },
            SessionState::InferenceImgA => Screen::Generating {
                medium: Medium::Image,
                pending: Choice::A,
            },
            SessionState::InferenceImgB => Screen::Generating {
                medium: Medium::Image,
                pending: Choice::B,
            },
            SessionState::ReviewTxt => Screen::Choosing {
                medium: Medium::Text,
            },
            SessionState::ReviewImg => Screen::Choosing {
                medium: Medium::Image,
            },
            SessionState::SelectATxt => Screen::Chosen {
                medium: Medium::Text,
                choice: Choice::A,
            },
            SessionState::SelectBTxt => Screen::Chosen {
                medium: Medium::Text,
                choice: Choice::B,
            },
            SessionState::SelectAImg => Screen::Chosen {
                medium: Medium::Image,
                choice: Choice::A,
            },
            SessionState::SelectBImg => Screen::Chosen {
                medium: Medium::Image,
                choice: Choice::B,
            },
            SessionState::Error => Screen::Failed {
                message: snapshot.error().to_string(),
            },
        }
    }

    pub fn headline(&self) -> Option<&str> {
        match self {
            Screen::Listening { instruction } if !instruction.is_empty() => Some(instruction.as_str()),
            Screen::Choosing { .. } => Some(REVIEW_HEADLINE),
            Screen::Failed { message } => Some(message.as_str()),
            _ => None,
        }
    }

    /// What a candidate panel should show in this screen.
    pub fn candidate_status(&self, candidate: Choice) -> CandidateStatus {
        match self {
            Screen::Generating { pending, .. } if *pending == candidate => CandidateStatus::Generating,
            // B is generated after A, so A is done by the time B is pending.
            Screen::Generating { .. } if candidate == Choice::A => CandidateStatus::Ready,
            Screen::Generating { .. } => CandidateStatus::Waiting,
            Screen::Choosing { .. } => CandidateStatus::Ready,
            Screen::Chosen { choice, .. } if *choice == candidate => CandidateStatus::Selected,
            Screen::Chosen { .. } => CandidateStatus::Dismissed,
            Screen::Loading | Screen::Listening { .. } | Screen::Failed { .. } => CandidateStatus::Hidden,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateStatus {
    Hidden,
    Waiting,
    Generating,
    Ready,
    Selected,
    Dismissed,
}

/// One candidate panel: its content for the current medium plus its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateView<'a> {
    pub choice: Choice,
    pub text: &'a str,
    pub image: &'a str,
    pub status: CandidateStatus,
}

/// A full frame for a renderer.
#[derive(Debug, Clone)]
pub struct View<'a> {
    pub screen: Screen,
    pub state: &'a StoreState,
}

impl<'a> View<'a> {
    pub fn new(state: &'a StoreState) -> Self {
        Self {
            screen: Screen::for_snapshot(state.snapshot()),
            state,
        }
    }

    pub fn model_label(&self) -> Option<&'a str> {
        model_label(self.state.snapshot().model())
    }

    pub fn candidate(&self, choice: Choice) -> CandidateView<'a> {
        let snapshot = self.state.snapshot();
        let (text, image) = match choice {
            Choice::A => (snapshot.result_a(), snapshot.image_result_a()),
            Choice::B => (snapshot.result_b(), snapshot.image_result_b()),
        };
        CandidateView {
            choice,
            text,
            image,
            status: self.screen.candidate_status(choice),
        }
    }

    /// The composite image is highlighted while the user is choosing images.
    pub fn selected_image_highlighted(&self) -> bool {
        self.state.snapshot().state() == SessionState::ReviewImg
    }
}

/// Human-readable name for the model id the server reports.
pub fn model_label(model: &str) -> Option<&str> {
    match model {
        "" => None,
        "claude" => Some("Anthropic Claude 3 Haiku"),
        "sdxl" => Some("Stable Diffusion XL 1.0"),
        other => Some(other),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
    }
}

/// Parses `#rgb` or `#rrggbb`.
pub fn hex_to_rgba(hex: &str, alpha: f32) -> Option<Rgba> {
    let digits = hex.strip_prefix('#').filter(|d| d.is_ascii())?;
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    let (r, g, b) = match digits.len() {
        3 => {
            let double = |i: usize| channel(&digits[i..=i].repeat(2));
            (double(0)?, double(1)?, double(2)?)
        }
        6 => (channel(&digits[0..2])?, channel(&digits[2..4])?, channel(&digits[4..6])?),
        _ => return None,
    };
    Some(Rgba { r, g, b, a: alpha })
}

/// Cycles through [`HIGHLIGHT_COLORS`]; advance it every [`CYCLE_INTERVAL`].
#[derive(Debug, Clone, Default)]
pub struct HighlightPalette {
    index: usize,
}

impl HighlightPalette {
    pub fn current(&self) -> &'static str {
        HIGHLIGHT_COLORS[self.index]
    }

    pub fn advance(&mut self) -> &'static str {
        self.index = (self.index + 1) % HIGHLIGHT_COLORS.len();
        self.current()
    }
}
