//! Scriptable in-memory service implementations for tests.

use std::sync::Arc;

use async_trait::async_trait;
use poll_types::{Identity, PollDefinition, ResultSet, VerifyOutcome, VerifyRequest, VoteRequest};
use tokio::sync::Mutex;

use crate::error::ServiceError;
use crate::services::{PollDirectory, ProofVerifier, ResultService, VoteService};

/// Mock poll directory serving a configurable definition.
#[derive(Clone, Default)]
pub struct MockPollDirectory {
    poll: Arc<Mutex<Option<PollDefinition>>>,
    fail_status: Arc<Mutex<Option<u16>>>,
}

impl MockPollDirectory {
    /// New directory with no poll configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the definition to serve (`None` = page has no poll).
    pub async fn set_poll(&self, poll: Option<PollDefinition>) {
        *self.poll.lock().await = poll;
    }

    /// Make subsequent fetches fail with the given HTTP status.
    pub async fn fail_with_status(&self, status: u16) {
        *self.fail_status.lock().await = Some(status);
    }
}

#[async_trait]
impl PollDirectory for MockPollDirectory {
    async fn fetch(&self, _slug: &str) -> Result<Option<PollDefinition>, ServiceError> {
        if let Some(status) = *self.fail_status.lock().await {
            return Err(ServiceError::Status(status));
        }
        Ok(self.poll.lock().await.clone())
    }
}

/// Mock indexing service serving a configurable result set.
#[derive(Clone, Default)]
pub struct MockResultService {
    results: Arc<Mutex<Option<ResultSet>>>,
    fail_status: Arc<Mutex<Option<u16>>>,
    calls: Arc<Mutex<usize>>,
}

impl MockResultService {
    /// New service serving an empty result set.
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_results(&self, results: ResultSet) {
        *self.results.lock().await = Some(results);
    }

    pub async fn fail_with_status(&self, status: u16) {
        *self.fail_status.lock().await = Some(status);
    }

    /// Number of queries issued so far.
    pub async fn calls(&self) -> usize {
        *self.calls.lock().await
    }
}

#[async_trait]
impl ResultService for MockResultService {
    async fn query(
        &self,
        _slug: &str,
        options: &[String],
        _identity: Option<&Identity>,
    ) -> Result<ResultSet, ServiceError> {
        *self.calls.lock().await += 1;
        if let Some(status) = *self.fail_status.lock().await {
            return Err(ServiceError::Status(status));
        }
        Ok(self.results.lock().await.clone().unwrap_or_else(|| {
            ResultSet::new(
                options
                    .iter()
                    .map(|o| poll_types::OptionResult {
                        id: o.clone(),
                        num_votes: 0,
                        voted_by_identity: false,
                    })
                    .collect(),
            )
        }))
    }
}

/// Mock voting service recording every submission it sees.
#[derive(Clone, Default)]
pub struct MockVoteService {
    requests: Arc<Mutex<Vec<VoteRequest>>>,
    fail_status: Arc<Mutex<Option<u16>>>,
}

impl MockVoteService {
    /// New service that acknowledges every submission.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything submitted so far, failed attempts included.
    pub async fn requests(&self) -> Vec<VoteRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn fail_with_status(&self, status: u16) {
        *self.fail_status.lock().await = Some(status);
    }

    pub async fn clear_failure(&self) {
        *self.fail_status.lock().await = None;
    }
}

#[async_trait]
impl VoteService for MockVoteService {
    async fn submit(&self, request: &VoteRequest) -> Result<(), ServiceError> {
        self.requests.lock().await.push(request.clone());
        if let Some(status) = *self.fail_status.lock().await {
            return Err(ServiceError::Status(status));
        }
        Ok(())
    }
}

/// Mock verifier with a scriptable outcome.
///
/// Rejects by default; script an accepting outcome with [`Self::respond`].
#[derive(Clone, Default)]
pub struct MockProofVerifier {
    outcome: Arc<Mutex<Option<VerifyOutcome>>>,
    fail_status: Arc<Mutex<Option<u16>>>,
    calls: Arc<Mutex<usize>>,
}

impl MockProofVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn respond(&self, outcome: VerifyOutcome) {
        *self.outcome.lock().await = Some(outcome);
    }

    pub async fn fail_with_status(&self, status: u16) {
        *self.fail_status.lock().await = Some(status);
    }

    pub async fn calls(&self) -> usize {
        *self.calls.lock().await
    }
}

#[async_trait]
impl ProofVerifier for MockProofVerifier {
    async fn verify(&self, _request: &VerifyRequest) -> Result<VerifyOutcome, ServiceError> {
        *self.calls.lock().await += 1;
        if let Some(status) = *self.fail_status.lock().await {
            return Err(ServiceError::Status(status));
        }
        Ok(self
            .outcome
            .lock()
            .await
            .clone()
            .unwrap_or_else(|| VerifyOutcome {
                ok: false,
                proof_id: String::new(),
            }))
    }
}
