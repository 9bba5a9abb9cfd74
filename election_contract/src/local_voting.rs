use std::collections::HashSet;

use alloy::primitives::Address;
use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::sync::{
    mpsc::{self, error::TrySendError},
    Mutex, RwLock,
};

use crate::{
    Candidate, CandidateId, CandidateTally, ContractError, Election, ElectionConcluded,
    ElectionContract, ElectionId, ElectionResults, EVENT_CHANNEL_CAPACITY, LOCAL_CHAIN_IDS,
};

/// In-memory `Voting` contract with its own simulated chain clock.
///
/// Enforces the same rules as the deployed contract: one vote per account and
/// election, no votes after the deadline or once the election is concluded.
/// The stored `is_active` flag is only cleared by [`LocalVoting::conclude_election`],
/// so it can lag behind the deadline exactly like on chain.
pub struct LocalVoting {
    ledger: RwLock<Ledger>,
    subscribers: Mutex<Vec<mpsc::Sender<ElectionConcluded>>>,
    chain_id: u64,
}

#[derive(Debug, Default)]
struct Ledger {
    now: u64,
    elections: Vec<LocalElection>,
    total_votes: u64,
    unreachable: bool,
}

#[derive(Debug)]
struct LocalElection {
    election: Election,
    candidates: Vec<Candidate>,
    voters: HashSet<Address>,
}

impl LocalElection {
    fn winner(&self) -> Option<&Candidate> {
        // Highest count wins, the lowest id breaks ties.
        self.candidates
            .iter()
            .fold(None, |best: Option<&Candidate>, c| match best {
                Some(b) if b.vote_count >= c.vote_count => Some(b),
                _ => Some(c),
            })
    }
}

impl LocalVoting {
    /// Creates an empty contract on a local development chain whose clock starts at `now`.
    pub fn new(now: u64) -> Self {
        Self::with_chain_id(now, LOCAL_CHAIN_IDS[0])
    }

    pub fn with_chain_id(now: u64, chain_id: u64) -> Self {
        Self {
            ledger: RwLock::new(Ledger {
                now,
                ..Ledger::default()
            }),
            subscribers: Mutex::new(Vec::new()),
            chain_id,
        }
    }

    /// Administrative election creation. Ids and candidate ids start at 1.
    pub async fn create_election(
        &self,
        name: &str,
        candidates: &[&str],
        duration_secs: u64,
    ) -> ElectionId {
        let mut ledger = self.ledger.write().await;
        let id = ledger.elections.len() as u64 + 1;
        let deadline = ledger.now + duration_secs;
        let candidates = candidates
            .iter()
            .enumerate()
            .map(|(i, name)| Candidate {
                id: i as u64 + 1,
                name: name.to_string(),
                vote_count: 0,
            })
            .collect::<Vec<_>>();
        ledger.elections.push(LocalElection {
            election: Election {
                id,
                name: name.to_string(),
                is_active: true,
                candidate_count: candidates.len() as u64,
                deadline,
            },
            candidates,
            voters: HashSet::new(),
        });
        info!("Created election {id} ({name}) ending at {deadline}");
        id
    }

    /// Administrative conclusion: clears the flag and emits `ElectionConcluded`.
    pub async fn conclude_election(
        &self,
        election_id: ElectionId,
    ) -> Result<ElectionConcluded, ContractError> {
        let notice = {
            let mut ledger = self.ledger.write().await;
            let entry = ledger.election_mut(election_id)?;
            if !entry.election.is_active {
                return Err(ContractError::Reverted(
                    "Election has already concluded".to_string(),
                ));
            }
            entry.election.is_active = false;
            let winner = entry
                .winner()
                .cloned()
                .ok_or_else(|| ContractError::Reverted("Election has no candidates".to_string()))?;
            ElectionConcluded {
                election_id,
                winner_id: winner.id,
                winner_name: winner.name,
                winner_votes: winner.vote_count,
            }
        };
        info!("Election {election_id} concluded, winner {}", notice.winner_name);
        self.emit(notice.clone()).await;
        Ok(notice)
    }

    /// Re-delivers an event, as an at-least-once transport may.
    /// Subscribers that are gone or not draining their channel are dropped.
    pub async fn emit(&self, notice: ElectionConcluded) {
        self.subscribers
            .lock()
            .await
            .retain(|tx| match tx.try_send(notice.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    warn!("Dropping stalled ElectionConcluded subscriber");
                    false
                }
                Err(TrySendError::Closed(_)) => false,
            });
    }

    /// Makes every read fail until switched back, like an unreachable node.
    pub async fn set_unreachable(&self, unreachable: bool) {
        self.ledger.write().await.unreachable = unreachable;
    }

    async fn readable(&self) -> Result<tokio::sync::RwLockReadGuard<'_, Ledger>, ContractError> {
        let ledger = self.ledger.read().await;
        if ledger.unreachable {
            return Err(ContractError::Unavailable("node unreachable".to_string()));
        }
        Ok(ledger)
    }
}

impl Ledger {
    fn election(&self, id: ElectionId) -> Result<&LocalElection, ContractError> {
        id.checked_sub(1)
            .and_then(|i| self.elections.get(i as usize))
            .ok_or(ContractError::UnknownElection(id))
    }

    fn election_mut(&mut self, id: ElectionId) -> Result<&mut LocalElection, ContractError> {
        id.checked_sub(1)
            .and_then(|i| self.elections.get_mut(i as usize))
            .ok_or(ContractError::UnknownElection(id))
    }
}

#[async_trait]
impl ElectionContract for LocalVoting {
    async fn election_count(&self) -> Result<u64, ContractError> {
        Ok(self.readable().await?.elections.len() as u64)
    }

    async fn election(&self, id: ElectionId) -> Result<Election, ContractError> {
        Ok(self.readable().await?.election(id)?.election.clone())
    }

    async fn candidate(
        &self,
        election_id: ElectionId,
        candidate_id: CandidateId,
    ) -> Result<Candidate, ContractError> {
        let ledger = self.readable().await?;
        candidate_id
            .checked_sub(1)
            .and_then(|i| ledger.election(election_id).ok()?.candidates.get(i as usize))
            .cloned()
            .ok_or(ContractError::UnknownCandidate {
                election_id,
                candidate_id,
            })
    }

    async fn current_timestamp(&self) -> Result<u64, ContractError> {
        Ok(self.readable().await?.now)
    }

    async fn has_voted(
        &self,
        election_id: ElectionId,
        voter: Address,
    ) -> Result<bool, ContractError> {
        Ok(self
            .readable()
            .await?
            .election(election_id)?
            .voters
            .contains(&voter))
    }

    async fn results(&self, election_id: ElectionId) -> Result<ElectionResults, ContractError> {
        let ledger = self.readable().await?;
        let entry = ledger.election(election_id)?;
        if entry.election.is_active && ledger.now < entry.election.deadline {
            return Err(ContractError::Reverted(
                "Election is still ongoing".to_string(),
            ));
        }
        let winner_id = entry.winner().map(|w| w.id).unwrap_or_default();
        Ok(ElectionResults {
            election_id,
            tallies: entry
                .candidates
                .iter()
                .map(|c| CandidateTally {
                    id: c.id,
                    name: c.name.clone(),
                    votes: c.vote_count,
                })
                .collect(),
            winner_id,
        })
    }

    async fn total_votes(&self) -> Result<u64, ContractError> {
        Ok(self.readable().await?.total_votes)
    }

    async fn vote(
        &self,
        voter: Address,
        election_id: ElectionId,
        candidate_id: CandidateId,
    ) -> Result<(), ContractError> {
        let mut ledger = self.ledger.write().await;
        if ledger.unreachable {
            return Err(ContractError::Unavailable("node unreachable".to_string()));
        }
        let now = ledger.now;
        let entry = ledger.election_mut(election_id)?;
        if !entry.election.is_active {
            return Err(ContractError::Reverted(
                "Election has already concluded".to_string(),
            ));
        }
        if now >= entry.election.deadline {
            return Err(ContractError::Reverted("Election has ended".to_string()));
        }
        if entry.voters.contains(&voter) {
            return Err(ContractError::Reverted("You have already voted".to_string()));
        }
        let candidate = candidate_id
            .checked_sub(1)
            .and_then(|i| entry.candidates.get_mut(i as usize))
            .ok_or(ContractError::UnknownCandidate {
                election_id,
                candidate_id,
            })?;
        candidate.vote_count += 1;
        entry.voters.insert(voter);
        ledger.total_votes += 1;
        debug!("Recorded vote from {voter} for candidate {candidate_id} in election {election_id}");
        Ok(())
    }

    async fn advance_time(&self, seconds: u64) -> Result<u64, ContractError> {
        if !LOCAL_CHAIN_IDS.contains(&self.chain_id) {
            return Err(ContractError::NotSimulated(self.chain_id));
        }
        let mut ledger = self.ledger.write().await;
        ledger.now += seconds;
        info!("Chain clock advanced by {seconds}s to {}", ledger.now);
        Ok(ledger.now)
    }

    async fn subscribe_conclusions(
        &self,
    ) -> Result<mpsc::Receiver<ElectionConcluded>, ContractError> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        self.subscribers.lock().await.push(tx);
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const START: u64 = 1_700_000_000;

    fn voter(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    #[tokio::test]
    async fn test_vote_counts_once_per_election() {
        let contract = LocalVoting::new(START);
        let first = contract.create_election("Election 1", &["Alice"], 3600).await;
        let second = contract.create_election("Election 2", &["Bob"], 3600).await;

        contract.vote(voter(1), first, 1).await.expect("first vote");
        let res = contract.vote(voter(1), first, 1).await;
        assert!(matches!(res, Err(ContractError::Reverted(msg)) if msg.contains("already voted")));

        // Same voter, different election.
        contract.vote(voter(1), second, 1).await.expect("vote in second election");

        assert_eq!(contract.candidate(first, 1).await.unwrap().vote_count, 1);
        assert_eq!(contract.candidate(second, 1).await.unwrap().vote_count, 1);
        assert!(contract.has_voted(first, voter(1)).await.unwrap());
        assert!(!contract.has_voted(first, voter(2)).await.unwrap());
        assert_eq!(contract.total_votes().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_flag_lags_behind_deadline() {
        let contract = LocalVoting::new(START);
        let id = contract.create_election("Council", &["Alice", "Bob"], 100).await;

        contract.advance_time(100).await.expect("local chain");
        let election = contract.election(id).await.unwrap();
        assert!(election.is_active);
        assert_eq!(contract.current_timestamp().await.unwrap(), election.deadline);

        let res = contract.vote(voter(1), id, 1).await;
        assert!(matches!(res, Err(ContractError::Reverted(msg)) if msg.contains("ended")));
        assert_eq!(contract.candidate(id, 1).await.unwrap().vote_count, 0);
    }

    #[tokio::test]
    async fn test_conclusion_emits_event_with_winner() {
        let contract = LocalVoting::new(START);
        let id = contract.create_election("Council", &["Alice", "Bob"], 100).await;
        let mut events = contract.subscribe_conclusions().await.unwrap();

        contract.vote(voter(1), id, 2).await.unwrap();
        contract.vote(voter(2), id, 2).await.unwrap();
        contract.vote(voter(3), id, 1).await.unwrap();

        let notice = contract.conclude_election(id).await.expect("conclude");
        assert_eq!(notice.winner_name, "Bob");
        assert_eq!(notice.winner_votes, 2);
        assert_eq!(events.recv().await, Some(notice));

        assert!(!contract.election(id).await.unwrap().is_active);
        let res = contract.vote(voter(4), id, 1).await;
        assert!(matches!(res, Err(ContractError::Reverted(msg)) if msg.contains("concluded")));

        let results = contract.results(id).await.unwrap();
        assert_eq!(results.winner_id, 2);
        assert_eq!(results.total_votes(), 3);
    }

    #[tokio::test]
    async fn test_stalled_subscriber_does_not_block_conclusion() {
        let contract = LocalVoting::new(START);
        let mut stalled = contract.subscribe_conclusions().await.unwrap();
        let count = EVENT_CHANNEL_CAPACITY as u64 + 1;
        for _ in 0..count {
            contract.create_election("Council", &["Alice"], 100).await;
        }

        let concluded = tokio::time::timeout(std::time::Duration::from_secs(5), async {
            for id in 1..=count {
                contract.conclude_election(id).await.expect("conclude");
            }
        })
        .await;
        assert!(concluded.is_ok());

        let mut received = 0;
        while stalled.recv().await.is_some() {
            received += 1;
        }
        assert_eq!(received, EVENT_CHANNEL_CAPACITY);
    }

    #[tokio::test]
    async fn test_results_unavailable_while_ongoing() {
        let contract = LocalVoting::new(START);
        let id = contract.create_election("Council", &["Alice"], 100).await;
        assert!(matches!(
            contract.results(id).await,
            Err(ContractError::Reverted(_))
        ));
        contract.advance_time(200).await.unwrap();
        assert!(contract.results(id).await.is_ok());
    }

    #[tokio::test]
    async fn test_time_advance_refused_off_local_chain() {
        let contract = LocalVoting::with_chain_id(START, 1);
        assert!(matches!(
            contract.advance_time(10).await,
            Err(ContractError::NotSimulated(1))
        ));
        assert_eq!(contract.current_timestamp().await.unwrap(), START);
    }

    #[tokio::test]
    async fn test_unreachable_node_fails_reads() {
        let contract = LocalVoting::new(START);
        contract.create_election("Council", &["Alice"], 100).await;
        contract.set_unreachable(true).await;
        assert!(matches!(
            contract.elections().await,
            Err(ContractError::Unavailable(_))
        ));
        contract.set_unreachable(false).await;
        assert_eq!(contract.elections().await.unwrap().len(), 1);
        assert!(matches!(
            contract.election(2).await,
            Err(ContractError::UnknownElection(2))
        ));
        assert!(matches!(
            contract.candidate(1, 0).await,
            Err(ContractError::UnknownCandidate { .. })
        ));
    }
}
