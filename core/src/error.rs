use thiserror::Error;

/// Failures surfaced by the remote service clients.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("transport failure")]
    Transport(#[from] reqwest::Error),
    #[error("service responded with status {0}")]
    Status(u16),
    #[error("malformed service response: {0}")]
    Malformed(String),
}

/// Failures surfaced by the poll session and proof gate.
///
/// None of these are fatal to the hosting page: precondition rejections leave
/// the session untouched, and a failed submission reverts to a retryable
/// state.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("no poll is loaded for this page")]
    NoPoll,
    #[error("option {0:?} is not part of this poll")]
    UnknownOption(String),
    #[error("no wallet identity is connected")]
    NoIdentity,
    #[error("group membership has not been verified")]
    NotVerified,
    #[error("a proof exchange is already in progress")]
    ProofFlowActive,
    #[error("no proof response is awaiting verification")]
    NoPendingProof,
    #[error("a vote submission is already in flight")]
    VoteInFlight,
    #[error("a vote was already cast in this session")]
    AlreadyVoted,
    #[error("vote submission failed")]
    VoteSubmissionFailed(#[source] ServiceError),
}

impl PollError {
    /// Whether the user may simply try the same action again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PollError::VoteSubmissionFailed(_))
    }
}
