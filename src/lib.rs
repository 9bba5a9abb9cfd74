//! Terminal client for elections held in an on-chain `Voting` contract.
//!
//! The client keeps a reconciled view of every election (effective status,
//! candidate tallies, whether the connected account has voted) from reads,
//! polls and `ElectionConcluded` events that may arrive in any order.
//!
//! - [`reconciler`] - pure state and the reducer applying remote evidence
//! - [`app`] - the kameo actor and its runtime
//! - [`session`] - wallet accounts and the persisted connection
//! - [`cli`] / [`view`] - line commands in, rendered events out

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod reconciler;
pub mod session;
pub mod view;

pub use error::{CliError, SessionError, VoteError, WriteFailure};
