use std::fmt::Write as _;
use std::io::Write as _;
use std::time::{SystemTime, UNIX_EPOCH};

use karaoke_sync::codec::decode_image;
use karaoke_sync::store::StoreState;
use karaoke_sync::types::{Choice, Medium};
use karaoke_sync::view::{hex_to_rgba, CandidateStatus, HighlightPalette, Screen, View, CYCLE_INTERVAL};
use tokio::sync::watch;

const CLEAR: &str = "\x1b[2J\x1b[H";
const RESET: &str = "\x1b[0m";

fn paint(text: &str, color: &str) -> String {
    match hex_to_rgba(color, 1.0) {
        Some(c) => format!("\x1b[48;2;{};{};{}m{}{}", c.r, c.g, c.b, text, RESET),
        None => text.to_string(),
    }
}

fn image_summary(payload: &str) -> String {
    match decode_image(payload) {
        Ok(bytes) => format!("<image, {} bytes>", bytes.len()),
        Err(e) => format!("<unreadable image: {}>", e),
    }
}

fn link_badge(state: &StoreState) -> &'static str {
    let link = state.link();
    if link.is_terminal() {
        "LOST (restart required)"
    } else if link.is_up() {
        "up"
    } else {
        "down"
    }
}

/// Renders one frame of the session as terminal text.
pub fn render(state: &StoreState, palette: &HighlightPalette, unix_secs: u64) -> String {
    let view = View::new(state);
    let snapshot = state.snapshot();
    let color = palette.current();
    let mut out = String::new();

    let _ = write!(out, "[WebSocket: {}] ", link_badge(state));
    if let Some(label) = view.model_label() {
        let _ = write!(out, "[Model: {}] ", label);
    }
    let _ = writeln!(out, "[Time: {}] [{}]", unix_secs, snapshot.state());
    if state.mic_active() {
        let _ = writeln!(out, "(microphone on)");
    }
    out.push('\n');

    match &view.screen {
        Screen::Listening { .. } | Screen::Choosing { .. } => {
            if let Some(headline) = view.screen.headline() {
                let _ = writeln!(out, "{}\n", paint(headline, color));
            }
        }
        Screen::Failed { message } => {
            let _ = writeln!(out, "ERROR: {}\n", message);
        }
        Screen::Loading | Screen::Generating { .. } | Screen::Chosen { .. } => {}
    }

    if !snapshot.selected_image().is_empty() {
        let summary = image_summary(snapshot.selected_image());
        if view.selected_image_highlighted() {
            let _ = writeln!(out, "{}\n", paint(&summary, color));
        } else {
            let _ = writeln!(out, "{}\n", summary);
        }
    }

    let (before, marker, after) = state.highlight().split(snapshot.prompt());
    let _ = writeln!(out, "Prompt:\n{}{}{}\n", before, paint(marker, color), after);

    let medium = match &view.screen {
        Screen::Generating { medium, .. } | Screen::Choosing { medium } | Screen::Chosen { medium, .. } => {
            Some(*medium)
        }
        _ => None,
    };
    for choice in [Choice::A, Choice::B] {
        let candidate = view.candidate(choice);
        let body = match (candidate.status, medium) {
            (CandidateStatus::Hidden, _) => continue,
            (CandidateStatus::Waiting, _) => "...".to_string(),
            (CandidateStatus::Generating, _) => "(generating)".to_string(),
            (_, Some(Medium::Image)) if !candidate.image.is_empty() => image_summary(candidate.image),
            _ => candidate.text.to_string(),
        };
        let label = match candidate.status {
            CandidateStatus::Selected => format!("[{}] chosen", choice),
            CandidateStatus::Dismissed => format!("[{}] not chosen", choice),
            _ => format!("[{}]", choice),
        };
        let _ = writeln!(out, "{}\n{}\n", label, body);
    }

    if matches!(view.screen, Screen::Choosing { .. }) {
        let _ = writeln!(out, "Type a or b and press Enter to choose.");
    }
    out
}

/// Redraws on every store change and on every highlight color step.
pub async fn render_loop(mut rx: watch::Receiver<StoreState>) {
    let mut palette = HighlightPalette::default();
    let mut ticker = tokio::time::interval(CYCLE_INTERVAL);
    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = ticker.tick() => {
                palette.advance();
            }
        }
        let state = rx.borrow_and_update().clone();
        let unix_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let frame = render(&state, &palette, unix_secs);

        let mut stdout = std::io::stdout().lock();
        if let Err(e) = write!(stdout, "{}{}", CLEAR, frame).and_then(|_| stdout.flush()) {
            tracing::error!("failed to draw frame: {}", e);
            break;
        }
    }
}
