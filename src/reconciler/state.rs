//! Application state and the reducer that applies evidence to it.
//!
//! Nothing here touches the network. Reads and writes happen elsewhere and
//! come back as [`Evidence`]; [`AppState::apply`] folds each piece into the
//! state and reports what the view has to re-render as a list of [`Change`]s.

use std::collections::{BTreeMap, HashMap, HashSet};

use alloy::primitives::Address;
use log::{debug, info, warn};

use election_contract::{
    Candidate, CandidateId, Election, ElectionConcluded, ElectionId, ElectionResults,
};
use vote_ui_protocol::v1::{
    BallotView, CandidateView, ElectionView, ResultsView, StatusView, VoteControl,
};

use crate::error::{VoteError, WriteFailure};
use crate::reconciler::ballot::{HasVoted, Selection, Ticket};
use crate::reconciler::status::{ClosureCause, ElectionStatus, Observation, StatusCell};

/// What caused a reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Initial,
    Poll,
    Manual,
    PostVote,
    TimeAdvance,
}

/// A remote observation, delivered in whatever order the reads complete.
#[derive(Debug, Clone)]
pub enum Evidence {
    ElectionsLoaded {
        elections: Vec<Election>,
        now: u64,
        total_votes: Option<u64>,
        trigger: Trigger,
    },
    ElectionSnapshot {
        election: Election,
        now: u64,
        trigger: Trigger,
    },
    CandidatesLoaded {
        ticket: Ticket,
        candidates: Vec<Candidate>,
    },
    HasVotedLoaded {
        ticket: Ticket,
        voted: bool,
    },
    Concluded(ElectionConcluded),
    VoteSettled {
        ticket: Ticket,
        candidate_id: CandidateId,
        outcome: Result<(), WriteFailure>,
    },
    ResultsLoaded(ElectionResults),
    /// The contract refused to report results because voting is still open.
    ResultsOngoing(ElectionId),
    TimeAdvanced {
        now: u64,
    },
    TimeAdvanceFailed {
        error: String,
    },
    ReadFailed {
        context: String,
        error: String,
    },
}

/// What the view has to re-render after a reducer step.
#[derive(Debug)]
pub enum Change {
    Elections,
    Status {
        election_id: ElectionId,
        status: Option<ElectionStatus>,
    },
    Ballot,
    Concluded(ElectionConcluded),
    VoteCast {
        election_id: ElectionId,
        candidate_id: CandidateId,
    },
    Results(ElectionId),
    ResultsOngoing(ElectionId),
    TimeAdvanced(u64),
    Failed(VoteError),
}

#[derive(Debug, Default)]
pub struct AppState {
    elections: BTreeMap<ElectionId, Election>,
    // Kept apart from `elections` so an event for an election that has not
    // been loaded yet is not lost.
    statuses: HashMap<ElectionId, StatusCell>,
    results: HashMap<ElectionId, ElectionResults>,
    announced: HashSet<ElectionId>,
    total_votes: Option<u64>,
    selection: Selection,
    loaded: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn election(&self, id: ElectionId) -> Option<&Election> {
        self.elections.get(&id)
    }

    pub fn election_ids(&self) -> Vec<ElectionId> {
        self.elections.keys().copied().collect()
    }

    pub fn status(&self, id: ElectionId) -> Option<ElectionStatus> {
        self.statuses.get(&id).and_then(StatusCell::status)
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn results(&self, id: ElectionId) -> Option<&ElectionResults> {
        self.results.get(&id)
    }

    pub fn account(&self) -> Option<Address> {
        self.selection.account()
    }

    /// Selects an election and returns the ticket for its selection-scoped reads.
    pub fn select(&mut self, election_id: ElectionId) -> Result<Ticket, VoteError> {
        if !self.elections.contains_key(&election_id) {
            return Err(VoteError::UnknownElection(election_id));
        }
        self.selection.select(election_id);
        info!("[select] Election {election_id} selected");
        self.selection.ticket().ok_or(VoteError::NoElectionSelected)
    }

    pub fn set_account(&mut self, account: Option<Address>) {
        self.selection.set_account(account);
    }

    /// Checks that a vote can be submitted and marks it in flight.
    pub fn begin_vote(&mut self, candidate_id: CandidateId) -> Result<(Ticket, Address), VoteError> {
        let account = self.account().ok_or(VoteError::ConnectionUnavailable)?;
        let ticket = self.selection.ticket().ok_or(VoteError::NoElectionSelected)?;
        match self.status(ticket.election_id) {
            None => return Err(VoteError::StatusUnknown(ticket.election_id)),
            Some(ElectionStatus::Closed(_)) => return Err(VoteError::ElectionConcluded),
            Some(ElectionStatus::Open) => {}
        }
        match self.selection.has_voted() {
            HasVoted::Known(true) => return Err(VoteError::AlreadyVoted),
            HasVoted::Unknown => return Err(VoteError::StatusUnknown(ticket.election_id)),
            HasVoted::Known(false) => {}
        }
        if self.selection.vote_in_flight().is_some() {
            return Err(VoteError::VoteInProgress);
        }
        if self.selection.candidate(candidate_id).is_none() {
            return Err(VoteError::UnknownCandidate(candidate_id));
        }
        self.selection.begin_vote(candidate_id);
        Ok((ticket, account))
    }

    pub fn apply(&mut self, evidence: Evidence) -> Vec<Change> {
        match evidence {
            Evidence::ElectionsLoaded {
                elections,
                now,
                total_votes,
                trigger,
            } => self.apply_elections(elections, now, total_votes, trigger),
            Evidence::ElectionSnapshot {
                election,
                now,
                trigger,
            } => self.apply_snapshot(election, now, trigger),
            Evidence::CandidatesLoaded { ticket, candidates } => {
                if self.selection.apply_candidates(&ticket, candidates) {
                    vec![Change::Ballot]
                } else {
                    debug!("[apply] Candidates for {ticket:?} unchanged or stale");
                    vec![]
                }
            }
            Evidence::HasVotedLoaded { ticket, voted } => {
                if self.selection.apply_has_voted(&ticket, voted) {
                    vec![Change::Ballot]
                } else {
                    debug!("[apply] Ballot fact for {ticket:?} unchanged or stale");
                    vec![]
                }
            }
            Evidence::Concluded(notice) => self.apply_conclusion(notice),
            Evidence::VoteSettled {
                ticket,
                candidate_id,
                outcome,
            } => self.apply_vote_outcome(ticket, candidate_id, outcome),
            Evidence::ResultsLoaded(results) => {
                let id = results.election_id;
                self.results.insert(id, results);
                vec![Change::Results(id)]
            }
            Evidence::ResultsOngoing(id) => vec![Change::ResultsOngoing(id)],
            Evidence::TimeAdvanced { now } => {
                info!("[apply] Chain time advanced to {now}");
                vec![Change::TimeAdvanced(now)]
            }
            Evidence::TimeAdvanceFailed { error } => {
                warn!("[apply] Time advancement failed: {error}");
                vec![Change::Failed(VoteError::TimeAdvance(error))]
            }
            Evidence::ReadFailed { context, error } => {
                warn!("[apply] Read failed ({context}), keeping previous state: {error}");
                vec![Change::Failed(VoteError::ReadFailure(error))]
            }
        }
    }

    fn observe(&mut self, election: &Election, now: u64) -> bool {
        self.statuses
            .entry(election.id)
            .or_default()
            .observe(Observation {
                is_active_flag: election.is_active,
                deadline: election.deadline,
                now,
            })
    }

    fn status_changes(&self, id: ElectionId) -> Vec<Change> {
        let mut changes = vec![Change::Status {
            election_id: id,
            status: self.status(id),
        }];
        if self.selection.election_id() == Some(id) {
            changes.push(Change::Ballot);
        }
        changes
    }

    fn apply_elections(
        &mut self,
        elections: Vec<Election>,
        now: u64,
        total_votes: Option<u64>,
        trigger: Trigger,
    ) -> Vec<Change> {
        let mut changes = Vec::new();
        let mut list_changed = !self.loaded || total_votes != self.total_votes;
        for election in elections {
            let flipped = self.observe(&election, now);
            let previous = self.elections.insert(election.id, election.clone());
            list_changed |= previous.as_ref() != Some(&election) || flipped;
            if flipped && self.loaded {
                changes.extend(self.status_changes(election.id));
            }
        }
        if total_votes.is_some() {
            self.total_votes = total_votes;
        }
        if !self.loaded {
            info!(
                "[apply_elections] {} elections loaded at chain time {now}",
                self.elections.len()
            );
        }
        self.loaded = true;
        if list_changed || trigger == Trigger::Manual {
            changes.insert(0, Change::Elections);
        }
        changes
    }

    fn apply_snapshot(&mut self, election: Election, now: u64, trigger: Trigger) -> Vec<Change> {
        let id = election.id;
        let flipped = self.observe(&election, now);
        self.elections.insert(id, election);
        if flipped {
            info!(
                "[apply_snapshot] Election {id} is now {:?} ({trigger:?})",
                self.status(id)
            );
            return self.status_changes(id);
        }
        if trigger != Trigger::Poll && self.selection.election_id() == Some(id) {
            return vec![Change::Ballot];
        }
        vec![]
    }

    fn apply_conclusion(&mut self, notice: ElectionConcluded) -> Vec<Change> {
        let id = notice.election_id;
        let flipped = self
            .statuses
            .entry(id)
            .or_default()
            .force_closed(ClosureCause::ConclusionEvent);
        let mut changes = Vec::new();
        // Events are delivered at least once; announce the winner once.
        if self.announced.insert(id) {
            changes.push(Change::Concluded(notice));
        } else {
            debug!("[apply_conclusion] Duplicate event for election {id}");
        }
        if flipped {
            changes.extend(self.status_changes(id));
        }
        changes
    }

    fn apply_vote_outcome(
        &mut self,
        ticket: Ticket,
        candidate_id: CandidateId,
        outcome: Result<(), WriteFailure>,
    ) -> Vec<Change> {
        self.selection.end_vote(&ticket);
        match outcome {
            Ok(()) => {
                self.selection.apply_has_voted(&ticket, true);
                vec![
                    Change::VoteCast {
                        election_id: ticket.election_id,
                        candidate_id,
                    },
                    Change::Ballot,
                ]
            }
            Err(failure) => {
                let mut changes = Vec::new();
                match &failure {
                    WriteFailure::AlreadyVoted => {
                        self.selection.apply_has_voted(&ticket, true);
                    }
                    WriteFailure::ElectionConcluded => {
                        let flipped = self
                            .statuses
                            .entry(ticket.election_id)
                            .or_default()
                            .force_closed(ClosureCause::VoteRejected);
                        if flipped {
                            changes.push(Change::Status {
                                election_id: ticket.election_id,
                                status: self.status(ticket.election_id),
                            });
                        }
                    }
                    WriteFailure::UserRejected | WriteFailure::Generic(_) => {}
                }
                changes.push(Change::Failed(failure.into()));
                changes.push(Change::Ballot);
                changes
            }
        }
    }

    // ─────────────────────────── Views ───────────────────────────

    pub fn status_view(&self, id: ElectionId) -> StatusView {
        match self.status(id) {
            Some(ElectionStatus::Open) => StatusView::Open,
            Some(ElectionStatus::Closed(_)) => StatusView::Closed,
            None => StatusView::Unknown,
        }
    }

    pub fn total_votes(&self) -> Option<u64> {
        self.total_votes
    }

    pub fn election_views(&self) -> Vec<ElectionView> {
        self.elections
            .values()
            .map(|e| ElectionView {
                id: e.id,
                name: e.name.clone(),
                status: self.status_view(e.id),
                deadline: e.deadline,
                candidate_count: e.candidate_count,
            })
            .collect()
    }

    pub fn ballot_view(&self) -> Option<BallotView> {
        let election_id = self.selection.election_id()?;
        let status = self.status_view(election_id);
        let has_voted = self.selection.has_voted();
        let in_flight = self.selection.vote_in_flight().is_some();
        let control = match status {
            StatusView::Closed => VoteControl::ElectionClosed,
            StatusView::Unknown => VoteControl::Unavailable,
            StatusView::Open if self.account().is_none() => VoteControl::NotConnected,
            StatusView::Open if in_flight => VoteControl::Voting,
            StatusView::Open => match has_voted {
                HasVoted::Known(true) => VoteControl::AlreadyVoted,
                HasVoted::Known(false) => VoteControl::Enabled,
                HasVoted::Unknown => VoteControl::Unavailable,
            },
        };
        let candidates = self
            .selection
            .candidates()
            .map(|c| CandidateView {
                id: c.id,
                name: c.name.clone(),
                vote_count: c.vote_count,
            })
            .collect::<Vec<_>>();
        let controls = candidates.iter().map(|c| (c.id, control)).collect();
        Some(BallotView {
            election_id,
            status,
            has_voted: has_voted.as_option(),
            total_votes: self.selection.total_votes(),
            candidates,
            controls,
        })
    }

    pub fn results_view(&self, id: ElectionId) -> Option<ResultsView> {
        let results = self.results.get(&id)?;
        Some(ResultsView {
            election_id: id,
            election_name: self
                .elections
                .get(&id)
                .map(|e| e.name.clone())
                .unwrap_or_default(),
            rows: results
                .tallies
                .iter()
                .map(|t| CandidateView {
                    id: t.id,
                    name: t.name.clone(),
                    vote_count: t.votes,
                })
                .collect(),
            winner_id: results.winner_id,
        })
    }
}
