//! Application layer.
//!
//! - [`VotingApp`] - kameo actor owning the reconciled state
//! - [`spawn_app`] - starts the actor with its poll loop and event forwarders
//! - [`PollScheduler`] - decides when status polls fire
//!
//! ```ignore
//! let handle = spawn_app(contract, session, AppConfig::default()).await;
//! handle.app.ask(AppCmd::SelectElection { election_id: 1 }).await?;
//! while let Some(event) = handle.events.recv().await { /* render */ }
//! ```

mod actor;
mod runtime;
mod scheduler;

pub use actor::{CurrentBallot, InitialLoad, PollTick, StatusOf, VotingApp};
pub use runtime::{spawn_app, spawn_app_with_scheduler, AppConfig, AppHandle};
pub use scheduler::{IntervalScheduler, PollScheduler, PollSchedulerConfig, DEFAULT_POLL_INTERVAL};
