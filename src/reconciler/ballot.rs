//! Selection-scoped facts: the selected election, the "has voted" fact for the
//! (election, account) pair and the candidate list shown for it.
//!
//! Every read issued for the current selection carries a [`Ticket`]. Changing
//! the selection or the account bumps the epoch, so answers to reads issued
//! for an earlier selection are recognised and dropped.

use std::collections::BTreeMap;

use alloy::primitives::Address;
use election_contract::{Candidate, CandidateId, ElectionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub epoch: u64,
    pub election_id: ElectionId,
    pub account: Option<Address>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HasVoted {
    #[default]
    Unknown,
    Known(bool),
}

impl HasVoted {
    pub fn as_option(&self) -> Option<bool> {
        match self {
            HasVoted::Unknown => None,
            HasVoted::Known(v) => Some(*v),
        }
    }
}

#[derive(Debug, Default)]
pub struct Selection {
    election_id: Option<ElectionId>,
    account: Option<Address>,
    epoch: u64,
    has_voted: HasVoted,
    candidates: BTreeMap<CandidateId, Candidate>,
    vote_in_flight: Option<CandidateId>,
}

impl Selection {
    pub fn election_id(&self) -> Option<ElectionId> {
        self.election_id
    }

    pub fn account(&self) -> Option<Address> {
        self.account
    }

    pub fn has_voted(&self) -> HasVoted {
        self.has_voted
    }

    pub fn vote_in_flight(&self) -> Option<CandidateId> {
        self.vote_in_flight
    }

    pub fn candidates(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.values()
    }

    pub fn candidate(&self, id: CandidateId) -> Option<&Candidate> {
        self.candidates.get(&id)
    }

    pub fn total_votes(&self) -> u64 {
        self.candidates.values().map(|c| c.vote_count).sum()
    }

    /// Selects an election. Facts of the previous selection are forgotten.
    pub fn select(&mut self, election_id: ElectionId) {
        self.election_id = Some(election_id);
        self.reset();
    }

    /// Changes the account the ballot fact refers to. A vote still in flight
    /// belongs to the previous account and no longer blocks the ballot.
    pub fn set_account(&mut self, account: Option<Address>) {
        if self.account != account {
            self.account = account;
            self.has_voted = HasVoted::Unknown;
            self.vote_in_flight = None;
            self.epoch += 1;
        }
    }

    fn reset(&mut self) {
        self.epoch += 1;
        self.has_voted = HasVoted::Unknown;
        self.candidates.clear();
        self.vote_in_flight = None;
    }

    pub fn ticket(&self) -> Option<Ticket> {
        self.election_id.map(|election_id| Ticket {
            epoch: self.epoch,
            election_id,
            account: self.account,
        })
    }

    pub fn is_current(&self, ticket: &Ticket) -> bool {
        self.ticket().as_ref() == Some(ticket)
    }

    /// Applies a "has voted" answer. Returns `true` if it was current and changed the fact.
    pub fn apply_has_voted(&mut self, ticket: &Ticket, voted: bool) -> bool {
        if !self.is_current(ticket) || ticket.account.is_none() {
            return false;
        }
        let next = HasVoted::Known(voted);
        let changed = self.has_voted != next;
        self.has_voted = next;
        changed
    }

    /// Merges a candidate list. Counts only grow, so a late answer never
    /// lowers a count already seen. Returns `true` if anything changed.
    pub fn apply_candidates(&mut self, ticket: &Ticket, candidates: Vec<Candidate>) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        let mut changed = false;
        for candidate in candidates {
            match self.candidates.get_mut(&candidate.id) {
                Some(known) if known.vote_count >= candidate.vote_count => {}
                Some(known) => {
                    known.vote_count = candidate.vote_count;
                    changed = true;
                }
                None => {
                    self.candidates.insert(candidate.id, candidate);
                    changed = true;
                }
            }
        }
        changed
    }

    pub fn begin_vote(&mut self, candidate_id: CandidateId) {
        self.vote_in_flight = Some(candidate_id);
    }

    /// Ends the in-flight vote if `ticket` is still current.
    pub fn end_vote(&mut self, ticket: &Ticket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.vote_in_flight.take().is_some()
    }
}
