//! Gateway to the on-chain `Voting` contract.
//!
//! [`ElectionContract`] is the call surface the client uses: election and
//! candidate lookup, the chain's authoritative clock, vote submission, the
//! "has voted" check, final results and a subscription to
//! `ElectionConcluded` events. [`sc_voting::ScVoting`] talks to a node through
//! alloy, [`local_voting::LocalVoting`] keeps the whole contract in memory.

pub mod local_voting;
pub mod sc_voting;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use tokio::sync::mpsc;

pub type ElectionId = u64;
pub type CandidateId = u64;

/// Chain ids of local development nodes (hardhat, anvil, ganache).
pub const LOCAL_CHAIN_IDS: [u64; 2] = [31337, 1337];

/// Capacity of the channel handed out by `subscribe_conclusions`.
pub const EVENT_CHANNEL_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Election {
    pub id: ElectionId,
    pub name: String,
    /// Flag stored by the contract. It can lag behind the deadline.
    pub is_active: bool,
    pub candidate_count: u64,
    /// Unix timestamp (seconds) at which voting ends.
    pub deadline: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: CandidateId,
    pub name: String,
    pub vote_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateTally {
    pub id: CandidateId,
    pub name: String,
    pub votes: u64,
}

/// Final tally of a concluded election.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElectionResults {
    pub election_id: ElectionId,
    pub tallies: Vec<CandidateTally>,
    pub winner_id: CandidateId,
}

impl ElectionResults {
    /// Builds results from the parallel arrays returned by `getElectionResults`.
    pub fn from_parallel(
        election_id: ElectionId,
        ids: Vec<u64>,
        names: Vec<String>,
        votes: Vec<u64>,
        winner_id: CandidateId,
    ) -> Result<Self, ContractError> {
        if ids.len() != names.len() || ids.len() != votes.len() {
            return Err(ContractError::MalformedResults {
                ids: ids.len(),
                names: names.len(),
                votes: votes.len(),
            });
        }
        let tallies = ids
            .into_iter()
            .zip(names)
            .zip(votes)
            .map(|((id, name), votes)| CandidateTally { id, name, votes })
            .collect();
        Ok(Self {
            election_id,
            tallies,
            winner_id,
        })
    }

    pub fn winner(&self) -> Option<&CandidateTally> {
        self.tallies.iter().find(|t| t.id == self.winner_id)
    }

    pub fn total_votes(&self) -> u64 {
        self.tallies.iter().map(|t| t.votes).sum()
    }
}

/// Payload of the contract's `ElectionConcluded` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElectionConcluded {
    pub election_id: ElectionId,
    pub winner_id: CandidateId,
    pub winner_name: String,
    pub winner_votes: u64,
}

#[async_trait]
pub trait ElectionContract: Send + Sync {
    async fn election_count(&self) -> Result<u64, ContractError>;

    async fn election(&self, id: ElectionId) -> Result<Election, ContractError>;

    async fn candidate(
        &self,
        election_id: ElectionId,
        candidate_id: CandidateId,
    ) -> Result<Candidate, ContractError>;

    /// Timestamp of the latest block. Authoritative, unlike the local clock.
    async fn current_timestamp(&self) -> Result<u64, ContractError>;

    async fn has_voted(&self, election_id: ElectionId, voter: Address)
        -> Result<bool, ContractError>;

    async fn results(&self, election_id: ElectionId) -> Result<ElectionResults, ContractError>;

    async fn total_votes(&self) -> Result<u64, ContractError>;

    /// Submits a vote from `voter` and waits for it to be confirmed.
    async fn vote(
        &self,
        voter: Address,
        election_id: ElectionId,
        candidate_id: CandidateId,
    ) -> Result<(), ContractError>;

    /// Moves the chain clock forward. Only accepted on local development chains.
    /// Returns the new authoritative timestamp.
    async fn advance_time(&self, seconds: u64) -> Result<u64, ContractError>;

    /// Stream of `ElectionConcluded` notifications. Delivery is at-least-once.
    async fn subscribe_conclusions(
        &self,
    ) -> Result<mpsc::Receiver<ElectionConcluded>, ContractError>;

    /// Every election, ids `1..=election_count()`.
    async fn elections(&self) -> Result<Vec<Election>, ContractError> {
        let count = self.election_count().await?;
        let mut elections = Vec::new();
        for id in 1..=count {
            elections.push(self.election(id).await?);
        }
        Ok(elections)
    }

    /// Every candidate of an election, ids `1..=candidate_count`.
    async fn candidates(&self, election_id: ElectionId) -> Result<Vec<Candidate>, ContractError> {
        let election = self.election(election_id).await?;
        let mut candidates = Vec::new();
        for id in 1..=election.candidate_count {
            candidates.push(self.candidate(election_id, id).await?);
        }
        Ok(candidates)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    #[error("Election not found: {0}")]
    UnknownElection(ElectionId),
    #[error("Candidate {candidate_id} not found in election {election_id}")]
    UnknownCandidate {
        election_id: ElectionId,
        candidate_id: CandidateId,
    },
    #[error("Transaction reverted: {0}")]
    Reverted(String),
    #[error("Value does not fit into u64: {0}")]
    ValueOutOfRange(U256),
    #[error("Results arrays differ in length (ids: {ids}, names: {names}, votes: {votes})")]
    MalformedResults {
        ids: usize,
        names: usize,
        votes: usize,
    },
    #[error("Time advancement is only available on local networks (chain id {0})")]
    NotSimulated(u64),
    #[error("Contract node unavailable: {0}")]
    Unavailable(String),
    #[error("Event subscription failed: {0}")]
    Subscription(String),

    #[error("Alloy contract error: {0}")]
    AlloyError(#[from] alloy::contract::Error),
    #[error("Transport error: {0}")]
    TransportError(#[from] alloy::transports::TransportError),
    #[error("Pending transaction error: {0}")]
    PendingTransactionError(#[from] alloy::providers::PendingTransactionError),
}

/// Narrows a 256-bit contract word down to `u64`.
pub fn to_u64(value: U256) -> Result<u64, ContractError> {
    u64::try_from(value).map_err(|_| ContractError::ValueOutOfRange(value))
}
