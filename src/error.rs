use election_contract::{CandidateId, ElectionId};
use vote_ui_protocol::v1::ErrorKind;

/// How a rejected vote is reported. Decided from the failure message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteFailure {
    UserRejected,
    AlreadyVoted,
    ElectionConcluded,
    Generic(String),
}

/// Classifies a failed vote by the revert or transport message.
pub fn classify_write_failure(message: &str) -> WriteFailure {
    let lower = message.to_lowercase();
    if lower.contains("user rejected")
        || lower.contains("user denied")
        || lower.contains("code: 4001")
        || lower.contains("\"code\":4001")
    {
        WriteFailure::UserRejected
    } else if lower.contains("already voted") {
        WriteFailure::AlreadyVoted
    } else if lower.contains("concluded")
        || lower.contains("has ended")
        || lower.contains("not active")
        || lower.contains("is closed")
    {
        WriteFailure::ElectionConcluded
    } else {
        WriteFailure::Generic(message.to_string())
    }
}

impl From<WriteFailure> for VoteError {
    fn from(failure: WriteFailure) -> Self {
        match failure {
            WriteFailure::UserRejected => VoteError::UserRejected,
            WriteFailure::AlreadyVoted => VoteError::AlreadyVoted,
            WriteFailure::ElectionConcluded => VoteError::ElectionConcluded,
            WriteFailure::Generic(msg) => VoteError::WriteFailed(msg),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VoteError {
    #[error("Please connect your wallet first")]
    ConnectionUnavailable,
    #[error("Request rejected in the wallet")]
    UserRejected,
    #[error("Failed to read from the contract: {0}")]
    ReadFailure(String),
    #[error("You have already voted in this election")]
    AlreadyVoted,
    #[error("This election is closed. Results are finalized.")]
    ElectionConcluded,
    #[error("Failed to cast vote. Please try again. ({0})")]
    WriteFailed(String),

    #[error("No election selected")]
    NoElectionSelected,
    #[error("Election {0} does not exist")]
    UnknownElection(ElectionId),
    #[error("State of election {0} is not known yet, refresh first")]
    StatusUnknown(ElectionId),
    #[error("A vote is already being submitted")]
    VoteInProgress,
    #[error("Candidate {0} is not part of the selected election")]
    UnknownCandidate(CandidateId),
    #[error("Time advancement failed: {0}")]
    TimeAdvance(String),

    #[error(transparent)]
    SessionError(#[from] SessionError),
}

impl VoteError {
    /// Whether retrying the same action can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            VoteError::ReadFailure(_)
                | VoteError::WriteFailed(_)
                | VoteError::UserRejected
                | VoteError::StatusUnknown(_)
                | VoteError::VoteInProgress
                | VoteError::TimeAdvance(_)
        )
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            VoteError::ConnectionUnavailable => ErrorKind::ConnectionUnavailable,
            VoteError::UserRejected => ErrorKind::UserRejected,
            VoteError::ReadFailure(_) | VoteError::TimeAdvance(_) => ErrorKind::ReadFailure,
            VoteError::AlreadyVoted => ErrorKind::AlreadyVoted,
            VoteError::ElectionConcluded => ErrorKind::ElectionConcluded,
            VoteError::WriteFailed(_) => ErrorKind::WriteFailure,
            VoteError::SessionError(SessionError::NoWallet) => ErrorKind::ConnectionUnavailable,
            VoteError::NoElectionSelected
            | VoteError::UnknownElection(_)
            | VoteError::StatusUnknown(_)
            | VoteError::VoteInProgress
            | VoteError::UnknownCandidate(_)
            | VoteError::SessionError(_) => ErrorKind::InvalidRequest,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("No wallet available")]
    NoWallet,
    #[error("Account {0} is not available in the wallet")]
    UnknownAccount(String),
    #[error("Failed to parse address: {0}")]
    AddressParsingError(#[from] alloy::hex::FromHexError),
    #[error("Failed to parse signer: {0}")]
    SignerParsingError(#[from] alloy::signers::local::LocalSignerError),
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON processing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Can't split the line")]
    SplitLineError,
    #[error("{0}")]
    UnknownCommand(String),
}
