use std::{future::Future, str::FromStr, sync::Arc};

use alloy::primitives::Address;
use kameo::{
    message::{Context, Message},
    Actor,
};
use log::{debug, error, info, warn};
use tokio::sync::mpsc;

use election_contract::{ContractError, ElectionConcluded, ElectionContract, ElectionId};
use vote_ui_protocol::v1::{AppCmd, AppEvent, BallotView};

use crate::{
    error::{classify_write_failure, SessionError, VoteError},
    reconciler::{AppState, Change, ElectionStatus, Evidence, Ticket, Trigger},
    session::WalletSession,
};

/// Owns the reconciled state and serializes every mutation of it.
///
/// Remote calls never run inside a handler. They are spawned and their
/// results come back as [`Evidence`] through the evidence channel.
#[derive(Actor)]
pub struct VotingApp {
    contract: Arc<dyn ElectionContract>,
    session: WalletSession,
    state: AppState,
    events: mpsc::UnboundedSender<AppEvent>,
    evidence: mpsc::UnboundedSender<Evidence>,
    advance_secs: u64,
}

/// Restores the session and issues the first load.
#[derive(Debug)]
pub struct InitialLoad;

/// Fired by the poll scheduler.
#[derive(Debug)]
pub struct PollTick;

/// Read-only view of the selected ballot.
#[derive(Debug)]
pub struct CurrentBallot;

/// Effective status of one election, `None` while unknown.
#[derive(Debug)]
pub struct StatusOf(pub ElectionId);

impl VotingApp {
    pub fn new(
        contract: Arc<dyn ElectionContract>,
        session: WalletSession,
        events: mpsc::UnboundedSender<AppEvent>,
        evidence: mpsc::UnboundedSender<Evidence>,
        advance_secs: u64,
    ) -> Self {
        Self {
            contract,
            session,
            state: AppState::new(),
            events,
            evidence,
            advance_secs,
        }
    }

    fn emit(&self, event: AppEvent) {
        if self.events.send(event).is_err() {
            debug!("[emit] Event receiver dropped");
        }
    }

    fn emit_error(&self, err: &VoteError) {
        self.emit(AppEvent::Error {
            kind: err.kind(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        });
    }

    fn emit_ballot(&self) {
        if let Some(ballot) = self.state.ballot_view() {
            self.emit(AppEvent::Ballot(ballot));
        }
    }

    fn spawn_read<F>(&self, read: F)
    where
        F: Future<Output = Vec<Evidence>> + Send + 'static,
    {
        let evidence = self.evidence.clone();
        tokio::spawn(async move {
            for item in read.await {
                if evidence.send(item).is_err() {
                    debug!("[spawn_read] App stopped, dropping late result");
                    break;
                }
            }
        });
    }

    fn reload_elections(&self, trigger: Trigger) {
        let contract = self.contract.clone();
        self.spawn_read(async move { vec![read_elections(contract, trigger).await] });
    }

    fn reload_selected(&self, trigger: Trigger) {
        if let Some(ticket) = self.state.selection().ticket() {
            let contract = self.contract.clone();
            self.spawn_read(read_selected(contract, ticket, trigger));
        }
    }

    fn render(&mut self, changes: Vec<Change>) {
        for change in changes {
            match change {
                Change::Elections => self.emit(AppEvent::Elections {
                    elections: self.state.election_views(),
                    total_votes: self.state.total_votes(),
                }),
                Change::Status { election_id, .. } => self.emit(AppEvent::StatusChanged {
                    election_id,
                    status: self.state.status_view(election_id),
                }),
                Change::Ballot => self.emit_ballot(),
                Change::Concluded(notice) => self.emit(AppEvent::Concluded {
                    election_id: notice.election_id,
                    winner_id: notice.winner_id,
                    winner_name: notice.winner_name,
                    winner_votes: notice.winner_votes,
                }),
                Change::VoteCast {
                    election_id,
                    candidate_id,
                } => {
                    info!("[render] Vote for candidate {candidate_id} in election {election_id} confirmed");
                    self.emit(AppEvent::VoteCast {
                        election_id,
                        candidate_id,
                    });
                    self.reload_selected(Trigger::PostVote);
                    self.reload_elections(Trigger::PostVote);
                }
                Change::Results(id) => {
                    if let Some(results) = self.state.results_view(id) {
                        self.emit(AppEvent::Results(results));
                    }
                }
                Change::ResultsOngoing(id) => {
                    self.emit(AppEvent::ResultsOngoing { election_id: id })
                }
                Change::TimeAdvanced(now) => self.emit(AppEvent::TimeAdvanced { now }),
                Change::Failed(err) => self.emit_error(&err),
            }
        }
    }

    fn on_account_changed(&mut self, account: Option<Address>) {
        self.state.set_account(account);
        self.reload_selected(Trigger::Manual);
        self.emit_ballot();
    }

    fn dispatch(&mut self, cmd: AppCmd) -> Result<(), VoteError> {
        match cmd {
            AppCmd::LoadElections => self.reload_elections(Trigger::Manual),
            AppCmd::SelectElection { election_id } => {
                self.state.select(election_id)?;
                self.emit(AppEvent::Selected { election_id });
                self.reload_selected(Trigger::Manual);
            }
            AppCmd::Vote { candidate_id } => self.vote(candidate_id)?,
            AppCmd::Refresh => {
                self.reload_elections(Trigger::Manual);
                self.reload_selected(Trigger::Manual);
            }
            AppCmd::Results { election_id } => self.results(election_id)?,
            AppCmd::ListAccounts => {
                let accounts = self.session.accounts()?;
                self.emit(AppEvent::Accounts(
                    accounts.iter().map(ToString::to_string).collect(),
                ));
            }
            AppCmd::Connect { account } => {
                let requested = account
                    .as_deref()
                    .map(Address::from_str)
                    .transpose()
                    .map_err(SessionError::from)?;
                let account = self.session.connect(requested)?;
                self.emit(AppEvent::Connected(account.to_string()));
                self.on_account_changed(Some(account));
            }
            AppCmd::SwitchAccount { account } => {
                let account = Address::from_str(&account).map_err(SessionError::from)?;
                let account = self.session.switch(account)?;
                self.emit(AppEvent::Connected(account.to_string()));
                self.on_account_changed(Some(account));
            }
            AppCmd::Disconnect => {
                self.session.disconnect();
                self.emit(AppEvent::Disconnected);
                self.on_account_changed(None);
            }
            AppCmd::AdvanceTime => self.advance_time(),
            other => {
                error!("[dispatch] Unsupported command: {other:?}");
            }
        }
        Ok(())
    }

    fn vote(&mut self, candidate_id: u64) -> Result<(), VoteError> {
        if !self.session.has_wallet() {
            return Err(VoteError::ConnectionUnavailable);
        }
        let (ticket, voter) = self.state.begin_vote(candidate_id)?;
        info!(
            "[vote] Submitting vote for candidate {candidate_id} in election {} from {voter}",
            ticket.election_id
        );
        self.emit_ballot();
        let contract = self.contract.clone();
        self.spawn_read(async move {
            let outcome = contract
                .vote(voter, ticket.election_id, candidate_id)
                .await
                .map_err(|e| classify_write_failure(&e.to_string()));
            vec![Evidence::VoteSettled {
                ticket,
                candidate_id,
                outcome,
            }]
        });
        Ok(())
    }

    fn results(&mut self, election_id: Option<ElectionId>) -> Result<(), VoteError> {
        let id = election_id
            .or(self.state.selection().election_id())
            .ok_or(VoteError::NoElectionSelected)?;
        if self.state.election(id).is_none() {
            return Err(VoteError::UnknownElection(id));
        }
        match self.state.status(id) {
            None => Err(VoteError::StatusUnknown(id)),
            Some(ElectionStatus::Open) => {
                self.emit(AppEvent::ResultsOngoing { election_id: id });
                Ok(())
            }
            Some(ElectionStatus::Closed(_)) => {
                let contract = self.contract.clone();
                self.spawn_read(async move {
                    let evidence = match contract.results(id).await {
                        Ok(results) => Evidence::ResultsLoaded(results),
                        Err(e) if results_still_ongoing(&e) => {
                            info!("[results] Contract still reports election {id} as ongoing");
                            Evidence::ResultsOngoing(id)
                        }
                        Err(e) => Evidence::ReadFailed {
                            context: format!("results of election {id}"),
                            error: e.to_string(),
                        },
                    };
                    vec![evidence]
                });
                Ok(())
            }
        }
    }

    fn advance_time(&self) {
        let contract = self.contract.clone();
        let ticket = self.state.selection().ticket();
        let seconds = self.advance_secs;
        info!("[advance_time] Advancing chain time by {seconds}s");
        self.spawn_read(async move {
            let now = match contract.advance_time(seconds).await {
                Ok(now) => now,
                Err(e) => {
                    return vec![Evidence::TimeAdvanceFailed {
                        error: e.to_string(),
                    }]
                }
            };
            let mut evidence = vec![
                Evidence::TimeAdvanced { now },
                read_elections(contract.clone(), Trigger::TimeAdvance).await,
            ];
            if let Some(ticket) = ticket {
                evidence.extend(read_selected(contract, ticket, Trigger::TimeAdvance).await);
            }
            evidence
        });
    }
}

/// The contract refuses results while its stored flag is set, which can lag
/// behind the deadline. The refusal may arrive as a revert or as a raw node
/// error depending on the gateway.
fn results_still_ongoing(err: &ContractError) -> bool {
    err.to_string().to_lowercase().contains("ongoing")
}

async fn read_elections(contract: Arc<dyn ElectionContract>, trigger: Trigger) -> Evidence {
    let (elections, now, total_votes) = tokio::join!(
        contract.elections(),
        contract.current_timestamp(),
        contract.total_votes()
    );
    match (elections, now) {
        (Ok(elections), Ok(now)) => Evidence::ElectionsLoaded {
            elections,
            now,
            total_votes: total_votes
                .map_err(|e| warn!("[read_elections] Failed to read total votes: {e}"))
                .ok(),
            trigger,
        },
        (Err(e), _) | (_, Err(e)) => Evidence::ReadFailed {
            context: "election list".to_string(),
            error: e.to_string(),
        },
    }
}

async fn read_election(
    contract: &Arc<dyn ElectionContract>,
    election_id: ElectionId,
    trigger: Trigger,
) -> Evidence {
    let (election, now) = tokio::join!(
        contract.election(election_id),
        contract.current_timestamp()
    );
    match (election, now) {
        (Ok(election), Ok(now)) => Evidence::ElectionSnapshot {
            election,
            now,
            trigger,
        },
        (Err(e), _) | (_, Err(e)) => Evidence::ReadFailed {
            context: format!("election {election_id}"),
            error: e.to_string(),
        },
    }
}

async fn read_selected(
    contract: Arc<dyn ElectionContract>,
    ticket: Ticket,
    trigger: Trigger,
) -> Vec<Evidence> {
    let election_id = ticket.election_id;
    let voted = async {
        match ticket.account {
            Some(account) => Some(contract.has_voted(election_id, account).await),
            None => None,
        }
    };
    let (snapshot, candidates, voted) = tokio::join!(
        read_election(&contract, election_id, trigger),
        contract.candidates(election_id),
        voted
    );

    let mut evidence = vec![snapshot];
    evidence.push(match candidates {
        Ok(candidates) => Evidence::CandidatesLoaded { ticket, candidates },
        Err(e) => Evidence::ReadFailed {
            context: format!("candidates of election {election_id}"),
            error: e.to_string(),
        },
    });
    match voted {
        Some(Ok(voted)) => evidence.push(Evidence::HasVotedLoaded { ticket, voted }),
        Some(Err(e)) => evidence.push(Evidence::ReadFailed {
            context: format!("ballot of election {election_id}"),
            error: e.to_string(),
        }),
        None => {}
    }
    evidence
}

impl Message<InitialLoad> for VotingApp {
    type Reply = ();

    async fn handle(
        &mut self,
        _msg: InitialLoad,
        _ctx: Context<'_, Self, Self::Reply>,
    ) -> Self::Reply {
        if let Some(account) = self.session.restore() {
            self.state.set_account(Some(account));
            self.emit(AppEvent::Connected(account.to_string()));
        }
        self.reload_elections(Trigger::Initial);
    }
}

impl Message<AppCmd> for VotingApp {
    type Reply = ();

    async fn handle(&mut self, msg: AppCmd, _ctx: Context<'_, Self, Self::Reply>) -> Self::Reply {
        debug!("[handle] Command {msg:?}");
        if let Err(e) = self.dispatch(msg) {
            info!("[handle] Command failed: {e}");
            self.emit_error(&e);
        }
    }
}

impl Message<PollTick> for VotingApp {
    type Reply = ();

    async fn handle(
        &mut self,
        _msg: PollTick,
        _ctx: Context<'_, Self, Self::Reply>,
    ) -> Self::Reply {
        match self.state.selection().election_id() {
            Some(election_id) => {
                let contract = self.contract.clone();
                self.spawn_read(async move {
                    vec![read_election(&contract, election_id, Trigger::Poll).await]
                });
            }
            None if self.state.is_loaded() => self.reload_elections(Trigger::Poll),
            None => debug!("[poll] Initial load still pending"),
        }
    }
}

impl Message<Evidence> for VotingApp {
    type Reply = ();

    async fn handle(
        &mut self,
        msg: Evidence,
        _ctx: Context<'_, Self, Self::Reply>,
    ) -> Self::Reply {
        let changes = self.state.apply(msg);
        self.render(changes);
    }
}

impl Message<ElectionConcluded> for VotingApp {
    type Reply = ();

    async fn handle(
        &mut self,
        msg: ElectionConcluded,
        _ctx: Context<'_, Self, Self::Reply>,
    ) -> Self::Reply {
        info!(
            "[handle] Election {} concluded, winner {} with {} votes",
            msg.election_id, msg.winner_name, msg.winner_votes
        );
        let changes = self.state.apply(Evidence::Concluded(msg));
        self.render(changes);
    }
}

impl Message<CurrentBallot> for VotingApp {
    type Reply = Option<BallotView>;

    async fn handle(
        &mut self,
        _msg: CurrentBallot,
        _ctx: Context<'_, Self, Self::Reply>,
    ) -> Self::Reply {
        self.state.ballot_view()
    }
}

impl Message<StatusOf> for VotingApp {
    type Reply = Option<ElectionStatus>;

    async fn handle(
        &mut self,
        msg: StatusOf,
        _ctx: Context<'_, Self, Self::Reply>,
    ) -> Self::Reply {
        self.state.status(msg.0)
    }
}
