//! Contracts for the four remote collaborators.
//!
//! These traits are the entire wire surface the session depends on; HTTP
//! implementations live in [`crate::http`] and scriptable in-memory
//! implementations in [`crate::mocks`].

use async_trait::async_trait;
use poll_types::{Identity, PollDefinition, ResultSet, VerifyOutcome, VerifyRequest, VoteRequest};

use crate::error::ServiceError;

/// Poll-definition lookup, keyed by page slug.
#[async_trait]
pub trait PollDirectory: Send + Sync {
    /// Fetch the poll for `slug`. `Ok(None)` means the page has no poll,
    /// which is a perfectly valid outcome.
    async fn fetch(&self, slug: &str) -> Result<Option<PollDefinition>, ServiceError>;
}

/// Read-only aggregate query against the indexing service.
#[async_trait]
pub trait ResultService: Send + Sync {
    /// Per-option vote counts for `slug`, plus a per-option flag telling
    /// whether `identity` already voted for it.
    async fn query(
        &self,
        slug: &str,
        options: &[String],
        identity: Option<&Identity>,
    ) -> Result<ResultSet, ServiceError>;
}

/// State-changing vote submission.
///
/// No server-side dedup may be assumed; callers are responsible for not
/// submitting twice.
#[async_trait]
pub trait VoteService: Send + Sync {
    async fn submit(&self, request: &VoteRequest) -> Result<(), ServiceError>;
}

/// Remote verification of a raw proof-provider response.
#[async_trait]
pub trait ProofVerifier: Send + Sync {
    async fn verify(&self, request: &VerifyRequest) -> Result<VerifyOutcome, ServiceError>;
}
