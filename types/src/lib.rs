pub mod choice;
pub mod snapshot;
pub mod state;

pub use choice::Choice;
pub use snapshot::SessionSnapshot;
pub use state::{Medium, SessionState, UnknownState};
