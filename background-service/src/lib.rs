pub mod controller;
pub mod poll_loop;
pub mod state;

pub use controller::{LifecycleController, PollSettings};
pub use poll_loop::{PollLoop, PollOutcome, PollParams, DEFAULT_INTERVAL};
pub use state::{new_shared_state, PollStats, SharedState, StatusSnapshot};
