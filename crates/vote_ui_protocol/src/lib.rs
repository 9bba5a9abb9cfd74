//! UI <-> app protocol. Keep it dependency-light (serde only).
pub mod v1 {
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum StatusView {
        Open,
        Closed,
        /// Not derived yet. Never shown as closed.
        Unknown,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ElectionView {
        pub id: u64,
        pub name: String,
        pub status: StatusView,
        pub deadline: u64,
        pub candidate_count: u64,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct CandidateView {
        pub id: u64,
        pub name: String,
        pub vote_count: u64,
    }

    /// State of the vote button shown next to each candidate.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum VoteControl {
        Enabled,
        Voting,
        AlreadyVoted,
        ElectionClosed,
        NotConnected,
        Unavailable,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct BallotView {
        pub election_id: u64,
        pub status: StatusView,
        pub has_voted: Option<bool>,
        pub candidates: Vec<CandidateView>,
        pub total_votes: u64,
        pub controls: Vec<(u64, VoteControl)>,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ResultsView {
        pub election_id: u64,
        pub election_name: String,
        pub rows: Vec<CandidateView>,
        pub winner_id: u64,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum ErrorKind {
        ConnectionUnavailable,
        UserRejected,
        ReadFailure,
        AlreadyVoted,
        ElectionConcluded,
        WriteFailure,
        InvalidRequest,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[non_exhaustive]
    pub enum AppCmd {
        LoadElections,
        SelectElection { election_id: u64 },
        Vote { candidate_id: u64 },
        Refresh,
        Results { election_id: Option<u64> },
        ListAccounts,
        Connect { account: Option<String> },
        SwitchAccount { account: String },
        Disconnect,
        AdvanceTime,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[non_exhaustive]
    pub enum AppEvent {
        Accounts(Vec<String>),
        Connected(String),
        Disconnected,
        Elections {
            elections: Vec<ElectionView>,
            total_votes: Option<u64>,
        },
        Selected { election_id: u64 },
        StatusChanged { election_id: u64, status: StatusView },
        Concluded {
            election_id: u64,
            winner_id: u64,
            winner_name: String,
            winner_votes: u64,
        },
        Ballot(BallotView),
        VoteCast { election_id: u64, candidate_id: u64 },
        Results(ResultsView),
        ResultsOngoing { election_id: u64 },
        TimeAdvanced { now: u64 },
        Error {
            kind: ErrorKind,
            message: String,
            retryable: bool,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::v1::*;

    #[test]
    fn events_serialize_with_snake_case_statuses() {
        let evt = AppEvent::StatusChanged {
            election_id: 3,
            status: StatusView::Closed,
        };
        let json = serde_json::to_string(&evt).unwrap();
        assert_eq!(json, r#"{"StatusChanged":{"election_id":3,"status":"closed"}}"#);
        let back: AppEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, evt);
    }
}
