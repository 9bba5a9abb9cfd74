//! Pure reconciliation of remote evidence into the client's view state.
pub mod ballot;
pub mod state;
pub mod status;

pub use ballot::{HasVoted, Selection, Ticket};
pub use state::{AppState, Change, Evidence, Trigger};
pub use status::{effective_active, ClosureCause, ElectionStatus, Observation, StatusCell};
