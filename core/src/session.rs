//! Per-page poll orchestration.
//!
//! One session owns one poll slug: it fetches the definition, keeps the local
//! vote lifecycle, reconciles against the externally-aggregated results, and
//! refuses to construct a vote unless the proof gate is verified. Every
//! remote collaborator comes in through [`SessionServices`]; nothing is read
//! from ambient globals.

use std::sync::Arc;

use poll_types::{Identity, Poll, ProofRequirement, ResultSet, VoteAttempt, VoteState};

use crate::error::{PollError, ServiceError};
use crate::gate::ProofGate;
use crate::services::{PollDirectory, ProofVerifier, ResultService, VoteService};

/// The remote collaborators a session talks to.
#[derive(Clone)]
pub struct SessionServices {
    pub directory: Arc<dyn PollDirectory>,
    pub results: Arc<dyn ResultService>,
    pub votes: Arc<dyn VoteService>,
    pub verifier: Arc<dyn ProofVerifier>,
}

/// Coarse lifecycle of the session itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Poll definition not fetched yet.
    Loading,
    /// Definition fetched; `poll` may still be absent, which simply means
    /// this page has no poll.
    Ready,
}

/// Handle for an in-flight vote submission, redeemed with
/// [`PollSession::complete_vote`]. Carries the session epoch so a submission
/// that lands after a reset is dropped instead of applied.
#[derive(Debug)]
pub struct VotePending {
    epoch: u64,
    attempt: VoteAttempt,
}

impl VotePending {
    pub fn attempt(&self) -> &VoteAttempt {
        &self.attempt
    }
}

pub struct PollSession {
    slug: String,
    services: SessionServices,
    gate: ProofGate,
    identity: Option<Identity>,
    phase: SessionPhase,
    poll: Option<Poll>,
    vote: VoteState,
    results: Option<ResultSet>,
    showing_results: bool,
    epoch: u64,
}

impl PollSession {
    pub fn new(
        slug: impl Into<String>,
        requirement: ProofRequirement,
        services: SessionServices,
    ) -> Self {
        Self {
            slug: slug.into(),
            services,
            gate: ProofGate::new(requirement),
            identity: None,
            phase: SessionPhase::Loading,
            poll: None,
            vote: VoteState::NotVoted,
            results: None,
            showing_results: false,
            epoch: 0,
        }
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn poll(&self) -> Option<&Poll> {
        self.poll.as_ref()
    }

    pub fn vote_state(&self) -> &VoteState {
        &self.vote
    }

    pub fn results(&self) -> Option<&ResultSet> {
        self.results.as_ref()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn gate(&self) -> &ProofGate {
        &self.gate
    }

    pub fn gate_mut(&mut self) -> &mut ProofGate {
        &mut self.gate
    }

    /// Fetch the poll definition for this page and, when one exists, the
    /// current aggregates. A missing poll or a failed fetch both end in
    /// "no poll here" — neither is an error for the hosting page.
    pub async fn load(&mut self) {
        match self.services.directory.fetch(&self.slug).await {
            Ok(Some(definition)) => {
                let poll = Poll::new(self.slug.clone(), definition);
                tracing::info!(slug = %self.slug, options = poll.options.len(), "poll loaded");
                self.poll = Some(poll);
            }
            Ok(None) => {
                tracing::debug!(slug = %self.slug, "no poll for this page");
            }
            Err(err) => {
                tracing::debug!(slug = %self.slug, error = %err, "poll fetch failed, treating as no poll");
            }
        }
        self.phase = SessionPhase::Ready;
        if self.poll.is_some() {
            self.refresh_results().await;
        }
    }

    /// Query the indexing service for per-option aggregates.
    ///
    /// A prior vote by the current identity reported here moves the local
    /// state to `Voted` even if this session never submitted one — that is
    /// what makes reloads idempotent. Failures leave whatever results we had.
    pub async fn refresh_results(&mut self) {
        let Some(poll) = &self.poll else {
            return;
        };
        let outcome = self
            .services
            .results
            .query(&self.slug, &poll.options, self.identity.as_ref())
            .await;
        match outcome {
            Ok(results) => {
                if let Some(option) = results.voted_option() {
                    if !self.vote.is_voted() {
                        tracing::info!(option, "prior vote discovered, locking ballot");
                        self.vote = VoteState::Voted(option.to_string());
                    }
                }
                self.results = Some(results);
            }
            Err(err) => {
                tracing::warn!(slug = %self.slug, error = %err, "result fetch failed, aggregates unavailable");
            }
        }
    }

    /// Observe the current wallet identity.
    ///
    /// A change invalidates everything bound to the previous identity: the
    /// proof gate resets, in-flight submissions are orphaned, and vote state
    /// plus aggregates are cleared until the next [`Self::refresh_results`].
    pub fn set_identity(&mut self, identity: Option<Identity>) {
        if self.identity == identity {
            return;
        }
        tracing::debug!(connected = identity.is_some(), "identity changed, resetting session");
        self.identity = identity;
        self.gate.set_identity(self.identity);
        self.epoch += 1;
        self.vote = VoteState::NotVoted;
        self.results = None;
    }

    /// Validate preconditions and stage a vote for `option`.
    ///
    /// The checks live here, not in the UI: no poll, unknown option, an
    /// already-cast or in-flight vote, and an unverified gate are all
    /// rejected before any network traffic happens.
    pub fn begin_vote(&mut self, option: &str) -> Result<VotePending, PollError> {
        let Some(poll) = &self.poll else {
            return Err(PollError::NoPoll);
        };
        if !poll.has_option(option) {
            return Err(PollError::UnknownOption(option.to_string()));
        }
        match &self.vote {
            VoteState::Voted(_) => return Err(PollError::AlreadyVoted),
            VoteState::Voting(_) => return Err(PollError::VoteInFlight),
            VoteState::NotVoted => {}
        }
        let Some(identity) = self.identity else {
            return Err(PollError::NoIdentity);
        };
        let Some(token) = self.gate.token() else {
            return Err(PollError::NotVerified);
        };
        let attempt = VoteAttempt::new(self.slug.clone(), option, identity, token.clone());
        self.vote = VoteState::Voting(option.to_string());
        Ok(VotePending {
            epoch: self.epoch,
            attempt,
        })
    }

    /// Apply the outcome of a staged vote's submission.
    ///
    /// An acknowledged vote locks the ballot for the rest of the session and
    /// bumps the displayed count so the UI is coherent before the next
    /// refresh. A failed one reverts to `NotVoted` and surfaces a retryable
    /// error. An outcome from before a reset is dropped.
    pub fn complete_vote(
        &mut self,
        pending: VotePending,
        outcome: Result<(), ServiceError>,
    ) -> Result<(), PollError> {
        if pending.epoch != self.epoch {
            tracing::debug!("discarding vote outcome from a stale session epoch");
            return Ok(());
        }
        let option = pending.attempt.option;
        match outcome {
            Ok(()) => {
                tracing::info!(slug = %self.slug, option = %option, "vote acknowledged");
                if let Some(results) = &mut self.results {
                    if let Some(entry) = results.options.iter_mut().find(|o| o.id == option) {
                        entry.num_votes += 1;
                        entry.voted_by_identity = true;
                    }
                }
                self.vote = VoteState::Voted(option);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(slug = %self.slug, option = %option, error = %err, "vote submission failed");
                self.vote = VoteState::NotVoted;
                Err(PollError::VoteSubmissionFailed(err))
            }
        }
    }

    /// Cast a vote for `option`: stage it, submit it, apply the outcome.
    pub async fn select_option(&mut self, option: &str) -> Result<(), PollError> {
        let pending = self.begin_vote(option)?;
        let outcome = self
            .services
            .votes
            .submit(&pending.attempt().to_request())
            .await;
        self.complete_vote(pending, outcome)
    }

    /// Run the pending proof exchange through the verification endpoint.
    pub async fn verify_proof(&mut self) -> Result<(), PollError> {
        let verifier = Arc::clone(&self.services.verifier);
        self.gate.verify(verifier.as_ref()).await
    }

    /// Flip the results view. Pure UI state, independent of the vote machine.
    pub fn toggle_results(&mut self) -> bool {
        self.showing_results = !self.showing_results;
        self.showing_results
    }

    pub fn showing_results(&self) -> bool {
        self.showing_results
    }
}
