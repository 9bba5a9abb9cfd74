use alloy::primitives::Address;

use de_vote::{
    reconciler::{AppState, Change, ClosureCause, ElectionStatus, Evidence, HasVoted, Trigger},
    VoteError, WriteFailure,
};
use election_contract::{Candidate, Election, ElectionConcluded};
use vote_ui_protocol::v1::{StatusView, VoteControl};

const DEADLINE: u64 = 10_000;

fn election(id: u64, is_active: bool, deadline: u64) -> Election {
    Election {
        id,
        name: format!("Election {id}"),
        is_active,
        candidate_count: 2,
        deadline,
    }
}

fn candidates() -> Vec<Candidate> {
    vec![
        Candidate {
            id: 1,
            name: "Alice".to_string(),
            vote_count: 0,
        },
        Candidate {
            id: 2,
            name: "Bob".to_string(),
            vote_count: 0,
        },
    ]
}

fn loaded(elections: Vec<Election>, now: u64, trigger: Trigger) -> Evidence {
    Evidence::ElectionsLoaded {
        elections,
        now,
        total_votes: Some(0),
        trigger,
    }
}

fn snapshot(election: Election, now: u64) -> Evidence {
    Evidence::ElectionSnapshot {
        election,
        now,
        trigger: Trigger::Poll,
    }
}

/// Two open elections, election 1 selected with candidates and a known
/// "not voted" fact for `account`.
fn ready_state(account: Address) -> AppState {
    let mut state = AppState::new();
    state.apply(loaded(
        vec![election(1, true, DEADLINE), election(2, true, DEADLINE)],
        DEADLINE - 100,
        Trigger::Initial,
    ));
    state.set_account(Some(account));
    let ticket = state.select(1).expect("Failed to select election");
    state.apply(Evidence::CandidatesLoaded {
        ticket,
        candidates: candidates(),
    });
    state.apply(Evidence::HasVotedLoaded {
        ticket,
        voted: false,
    });
    state
}

fn has_status_change(changes: &[Change], id: u64) -> bool {
    changes
        .iter()
        .any(|c| matches!(c, Change::Status { election_id, .. } if *election_id == id))
}

#[test]
fn test_first_load_exposes_derived_statuses() {
    let mut state = AppState::new();
    let changes = state.apply(loaded(
        vec![election(1, true, DEADLINE), election(2, false, DEADLINE)],
        DEADLINE - 1,
        Trigger::Initial,
    ));
    assert!(matches!(changes.first(), Some(Change::Elections)));
    let views = state.election_views();
    assert_eq!(views.len(), 2);
    assert!(views.iter().all(|v| v.status != StatusView::Unknown));
    assert_eq!(views[0].status, StatusView::Open);
    assert_eq!(views[1].status, StatusView::Closed);
}

#[test]
fn test_deadline_boundary() {
    let mut state = AppState::new();
    state.apply(loaded(vec![election(1, true, DEADLINE)], DEADLINE - 1, Trigger::Initial));
    assert_eq!(state.status(1), Some(ElectionStatus::Open));

    let changes = state.apply(snapshot(election(1, true, DEADLINE), DEADLINE));
    assert!(has_status_change(&changes, 1));
    assert_eq!(
        state.status(1),
        Some(ElectionStatus::Closed(ClosureCause::Deadline))
    );
}

#[test]
fn test_closed_election_never_reopens() {
    let mut state = AppState::new();
    state.apply(loaded(vec![election(1, true, DEADLINE)], DEADLINE + 5, Trigger::Initial));
    assert_eq!(state.status_view(1), StatusView::Closed);

    // A poll issued before the deadline completes late.
    let changes = state.apply(snapshot(election(1, true, DEADLINE), DEADLINE - 50));
    assert!(changes.is_empty());
    assert_eq!(state.status_view(1), StatusView::Closed);
}

#[test]
fn test_conclusion_event_beats_in_flight_poll() {
    let account = Address::repeat_byte(1);
    let mut state = ready_state(account);

    let changes = state.apply(Evidence::Concluded(ElectionConcluded {
        election_id: 1,
        winner_id: 2,
        winner_name: "Bob".to_string(),
        winner_votes: 0,
    }));
    assert!(matches!(changes.first(), Some(Change::Concluded(_))));
    assert!(has_status_change(&changes, 1));
    assert!(changes.iter().any(|c| matches!(c, Change::Ballot)));

    // The poll was issued before the event and still sees the flag set.
    let changes = state.apply(snapshot(election(1, true, DEADLINE), DEADLINE - 90));
    assert!(!has_status_change(&changes, 1));
    assert_eq!(
        state.status(1),
        Some(ElectionStatus::Closed(ClosureCause::ConclusionEvent))
    );

    // Redelivery of the same event is a no-op.
    let changes = state.apply(Evidence::Concluded(ElectionConcluded {
        election_id: 1,
        winner_id: 2,
        winner_name: "Bob".to_string(),
        winner_votes: 0,
    }));
    assert!(changes.is_empty());
}

#[test]
fn test_event_before_first_load_is_kept() {
    let mut state = AppState::new();
    state.apply(Evidence::Concluded(ElectionConcluded {
        election_id: 1,
        winner_id: 1,
        winner_name: "Alice".to_string(),
        winner_votes: 3,
    }));
    state.apply(loaded(vec![election(1, true, DEADLINE)], 10, Trigger::Initial));
    assert_eq!(state.status_view(1), StatusView::Closed);
}

#[test]
fn test_stale_ballot_fact_dropped_after_reselection() {
    let account = Address::repeat_byte(1);
    let mut state = AppState::new();
    state.apply(loaded(
        vec![election(1, true, DEADLINE), election(2, true, DEADLINE)],
        100,
        Trigger::Initial,
    ));
    state.set_account(Some(account));
    let ticket_a = state.select(1).expect("Failed to select A");
    let ticket_b = state.select(2).expect("Failed to select B");

    // A's answer arrives after B was selected.
    let changes = state.apply(Evidence::HasVotedLoaded {
        ticket: ticket_a,
        voted: true,
    });
    assert!(changes.is_empty());
    assert_eq!(state.selection().has_voted(), HasVoted::Unknown);
    let ballot = state.ballot_view().expect("Ballot missing");
    assert_eq!(ballot.election_id, 2);
    assert_eq!(ballot.has_voted, None);

    state.apply(Evidence::HasVotedLoaded {
        ticket: ticket_b,
        voted: false,
    });
    assert_eq!(state.selection().has_voted(), HasVoted::Known(false));
}

#[test]
fn test_second_vote_is_rejected_locally() {
    let account = Address::repeat_byte(1);
    let mut state = ready_state(account);

    let (ticket, voter) = state.begin_vote(1).expect("Failed to begin vote");
    assert_eq!(voter, account);
    assert!(matches!(state.begin_vote(2), Err(VoteError::VoteInProgress)));
    let ballot = state.ballot_view().expect("Ballot missing");
    assert!(ballot.controls.iter().all(|(_, c)| *c == VoteControl::Voting));

    let changes = state.apply(Evidence::VoteSettled {
        ticket,
        candidate_id: 1,
        outcome: Ok(()),
    });
    assert!(matches!(changes.first(), Some(Change::VoteCast { .. })));
    assert!(matches!(state.begin_vote(1), Err(VoteError::AlreadyVoted)));
    let ballot = state.ballot_view().expect("Ballot missing");
    assert!(ballot
        .controls
        .iter()
        .all(|(_, c)| *c == VoteControl::AlreadyVoted));
}

#[test]
fn test_already_voted_rejection_updates_fact() {
    let mut state = ready_state(Address::repeat_byte(1));
    let (ticket, _) = state.begin_vote(2).expect("Failed to begin vote");
    let changes = state.apply(Evidence::VoteSettled {
        ticket,
        candidate_id: 2,
        outcome: Err(WriteFailure::AlreadyVoted),
    });
    assert!(changes
        .iter()
        .any(|c| matches!(c, Change::Failed(VoteError::AlreadyVoted))));
    assert_eq!(state.selection().has_voted(), HasVoted::Known(true));
}

#[test]
fn test_concluded_rejection_closes_election() {
    let mut state = ready_state(Address::repeat_byte(1));
    let (ticket, _) = state.begin_vote(1).expect("Failed to begin vote");
    let changes = state.apply(Evidence::VoteSettled {
        ticket,
        candidate_id: 1,
        outcome: Err(WriteFailure::ElectionConcluded),
    });
    assert!(has_status_change(&changes, 1));
    assert_eq!(
        state.status(1),
        Some(ElectionStatus::Closed(ClosureCause::VoteRejected))
    );
    assert!(matches!(state.begin_vote(1), Err(VoteError::ElectionConcluded)));
}

#[test]
fn test_generic_rejection_keeps_state() {
    let mut state = ready_state(Address::repeat_byte(1));
    let (ticket, _) = state.begin_vote(1).expect("Failed to begin vote");
    state.apply(Evidence::VoteSettled {
        ticket,
        candidate_id: 1,
        outcome: Err(WriteFailure::UserRejected),
    });
    assert_eq!(state.status(1), Some(ElectionStatus::Open));
    assert_eq!(state.selection().has_voted(), HasVoted::Known(false));
    assert!(state.begin_vote(1).is_ok());
}

#[test]
fn test_vote_requires_account_and_known_status() {
    let mut state = AppState::new();
    assert!(matches!(
        state.begin_vote(1),
        Err(VoteError::ConnectionUnavailable)
    ));
    state.set_account(Some(Address::repeat_byte(1)));
    assert!(matches!(
        state.begin_vote(1),
        Err(VoteError::NoElectionSelected)
    ));
    assert!(matches!(state.select(4), Err(VoteError::UnknownElection(4))));
}

#[test]
fn test_time_advance_closes_election() {
    const INCREMENT: u64 = 4000;
    let mut state = ready_state(Address::repeat_byte(1));
    let start = DEADLINE - INCREMENT / 2;
    state.apply(loaded(
        vec![election(1, true, DEADLINE), election(2, true, DEADLINE)],
        start,
        Trigger::Poll,
    ));
    assert_eq!(state.status(1), Some(ElectionStatus::Open));

    let now = start + INCREMENT;
    let changes = state.apply(Evidence::TimeAdvanced { now });
    assert!(matches!(changes.as_slice(), [Change::TimeAdvanced(n)] if *n == now));

    // Flag still set, the clock alone closes both elections.
    let changes = state.apply(loaded(
        vec![election(1, true, DEADLINE), election(2, true, DEADLINE)],
        now,
        Trigger::TimeAdvance,
    ));
    assert!(has_status_change(&changes, 1));
    assert!(has_status_change(&changes, 2));
    assert_eq!(state.status_view(1), StatusView::Closed);
    assert_eq!(state.status_view(2), StatusView::Closed);
}

#[test]
fn test_read_failure_keeps_previous_state() {
    let mut state = ready_state(Address::repeat_byte(1));
    let before = state.ballot_view();
    let changes = state.apply(Evidence::ReadFailed {
        context: "election 1".to_string(),
        error: "node unreachable".to_string(),
    });
    assert!(matches!(
        changes.as_slice(),
        [Change::Failed(VoteError::ReadFailure(_))]
    ));
    assert_eq!(state.ballot_view(), before);
    assert_eq!(state.status(1), Some(ElectionStatus::Open));
}

#[test]
fn test_poll_without_change_is_silent() {
    let mut state = ready_state(Address::repeat_byte(1));
    let changes = state.apply(snapshot(election(1, true, DEADLINE), DEADLINE - 10));
    assert!(changes.is_empty());
}

#[test]
fn test_vote_waits_for_ballot_fact() {
    let mut state = AppState::new();
    state.apply(loaded(vec![election(1, true, DEADLINE)], 100, Trigger::Initial));
    state.set_account(Some(Address::repeat_byte(1)));
    let ticket = state.select(1).expect("Failed to select election");
    state.apply(Evidence::CandidatesLoaded {
        ticket,
        candidates: candidates(),
    });
    assert!(matches!(state.begin_vote(1), Err(VoteError::StatusUnknown(1))));
    let ballot = state.ballot_view().expect("Ballot missing");
    assert!(ballot
        .controls
        .iter()
        .all(|(_, c)| *c == VoteControl::Unavailable));
}

#[test]
fn test_account_switch_during_vote_unblocks_ballot() {
    let first = Address::repeat_byte(1);
    let second = Address::repeat_byte(2);
    let mut state = ready_state(first);
    let (old_ticket, _) = state.begin_vote(1).expect("Failed to begin vote");

    state.set_account(Some(second));
    let ticket = state.selection().ticket().expect("Ticket missing");
    state.apply(Evidence::HasVotedLoaded {
        ticket,
        voted: false,
    });

    // The first account's transaction confirms after the switch.
    state.apply(Evidence::VoteSettled {
        ticket: old_ticket,
        candidate_id: 1,
        outcome: Ok(()),
    });
    assert_eq!(state.selection().has_voted(), HasVoted::Known(false));
    let ballot = state.ballot_view().expect("Ballot missing");
    assert!(ballot
        .controls
        .iter()
        .all(|(_, c)| *c == VoteControl::Enabled));
    let (_, voter) = state.begin_vote(2).expect("Failed to begin vote");
    assert_eq!(voter, second);
}
