//! Text rendering of UI events.

use chrono::DateTime;

use vote_ui_protocol::v1::{
    AppEvent, BallotView, ElectionView, ResultsView, StatusView, VoteControl,
};

pub fn format_timestamp(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|s| DateTime::from_timestamp(s, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| secs.to_string())
}

fn status_marker(status: StatusView) -> &'static str {
    match status {
        StatusView::Open => "(Active)",
        StatusView::Closed => "(Closed)",
        StatusView::Unknown => "(Checking...)",
    }
}

pub fn control_label(control: VoteControl) -> &'static str {
    match control {
        VoteControl::Enabled => "Vote",
        VoteControl::Voting => "Voting...",
        VoteControl::AlreadyVoted => "Already Voted",
        VoteControl::ElectionClosed => "Election Closed",
        VoteControl::NotConnected => "Connect wallet to vote",
        VoteControl::Unavailable => "Checking...",
    }
}

fn render_elections(elections: &[ElectionView], total_votes: Option<u64>) -> String {
    let mut out = match total_votes {
        Some(total) => format!("Elections (total votes cast: {total})"),
        None => "Elections".to_string(),
    };
    if elections.is_empty() {
        out.push_str("\n  No elections available");
    }
    for e in elections {
        out.push_str(&format!(
            "\n  [{}] {} {} - {} candidates, ends {}",
            e.id,
            e.name,
            status_marker(e.status),
            e.candidate_count,
            format_timestamp(e.deadline)
        ));
    }
    out
}

fn render_ballot(ballot: &BallotView) -> String {
    let voted = match ballot.has_voted {
        Some(true) => "you have voted",
        Some(false) => "you have not voted",
        None => "ballot unknown",
    };
    let mut out = format!(
        "Election {} {} - total votes: {} - {voted}",
        ballot.election_id,
        status_marker(ballot.status),
        ballot.total_votes
    );
    for candidate in &ballot.candidates {
        let control = ballot
            .controls
            .iter()
            .find(|(id, _)| *id == candidate.id)
            .map(|(_, c)| control_label(*c))
            .unwrap_or_default();
        out.push_str(&format!(
            "\n  [{}] {:<24} {:>6} votes  [{control}]",
            candidate.id, candidate.name, candidate.vote_count
        ));
    }
    out
}

fn render_results(results: &ResultsView) -> String {
    let mut out = format!(
        "Results of election {} ({})",
        results.election_id, results.election_name
    );
    for row in &results.rows {
        let marker = if row.id == results.winner_id {
            "  <- winner"
        } else {
            ""
        };
        out.push_str(&format!(
            "\n  [{}] {:<24} {:>6} votes{marker}",
            row.id, row.name, row.vote_count
        ));
    }
    out
}

/// One human readable block per event.
pub fn render_text(event: &AppEvent) -> String {
    match event {
        AppEvent::Accounts(accounts) if accounts.is_empty() => {
            "No accounts in wallet".to_string()
        }
        AppEvent::Accounts(accounts) => {
            let mut out = "Accounts".to_string();
            for (i, a) in accounts.iter().enumerate() {
                out.push_str(&format!("\n  {i}: {a}"));
            }
            out
        }
        AppEvent::Connected(account) => format!("Connected: {account}"),
        AppEvent::Disconnected => "Disconnected".to_string(),
        AppEvent::Elections {
            elections,
            total_votes,
        } => render_elections(elections, *total_votes),
        AppEvent::Selected { election_id } => format!("Selected election {election_id}"),
        AppEvent::StatusChanged {
            election_id,
            status,
        } => format!("Election {election_id} is now {}", status_marker(*status)),
        AppEvent::Concluded {
            election_id,
            winner_name,
            winner_votes,
            ..
        } => format!(
            "Election {election_id} concluded. Winner: {winner_name} with {winner_votes} votes"
        ),
        AppEvent::Ballot(ballot) => render_ballot(ballot),
        AppEvent::VoteCast {
            election_id,
            candidate_id,
        } => format!("Vote cast for candidate {candidate_id} in election {election_id}"),
        AppEvent::Results(results) => render_results(results),
        AppEvent::ResultsOngoing { election_id } => format!(
            "Election {election_id} is still ongoing, results are available once it closes"
        ),
        AppEvent::TimeAdvanced { now } => {
            format!("Chain time advanced to {}", format_timestamp(*now))
        }
        AppEvent::Error {
            message, retryable, ..
        } => {
            if *retryable {
                format!("Error: {message} (you can retry)")
            } else {
                format!("Error: {message}")
            }
        }
        other => format!("{other:?}"),
    }
}

/// Renders an event for stdout, as text or a JSON line.
pub fn render(event: &AppEvent, json: bool) -> String {
    if json {
        serde_json::to_string(event).unwrap_or_else(|e| format!("{{\"render_error\":\"{e}\"}}"))
    } else {
        render_text(event)
    }
}
