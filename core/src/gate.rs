//! Lifecycle of one zero-knowledge group-membership proof.
//!
//! The exchange with the proof provider is redirect-driven and can be
//! abandoned at any point, so the gate is an explicit state machine rather
//! than a callback chain. Every reset bumps an epoch counter; completions
//! carrying a stale epoch are discarded instead of applied.

use poll_types::{Identity, ProofRequirement, ProofToken, VerifyOutcome, VerifyRequest};

use crate::error::{PollError, ServiceError};
use crate::services::ProofVerifier;

/// Where the proof exchange currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    /// No exchange in progress. Always re-enterable.
    Idle,
    /// The provider flow is open; waiting for the user to finish or walk
    /// away. No timeout is enforced here.
    AwaitingProof,
    /// Raw provider response in hand, not yet verified.
    ProofReceived(serde_json::Value),
    /// Response forwarded to the verification endpoint.
    VerificationPending,
    /// The endpoint rejected the response or was unreachable. Retryable.
    VerificationFailed(String),
    /// Proof accepted; the token authorizes vote submission.
    Verified(ProofToken),
}

impl GateState {
    fn name(&self) -> &'static str {
        match self {
            GateState::Idle => "idle",
            GateState::AwaitingProof => "awaiting-proof",
            GateState::ProofReceived(_) => "proof-received",
            GateState::VerificationPending => "verification-pending",
            GateState::VerificationFailed(_) => "verification-failed",
            GateState::Verified(_) => "verified",
        }
    }
}

/// Handle for an in-flight verification round trip.
///
/// Produced by [`ProofGate::start_verification`] and redeemed with
/// [`ProofGate::complete_verification`]; a ticket from before a reset no
/// longer matches the gate's epoch and its outcome is dropped.
#[derive(Debug)]
pub struct VerificationTicket {
    epoch: u64,
    request: VerifyRequest,
}

impl VerificationTicket {
    pub fn request(&self) -> &VerifyRequest {
        &self.request
    }
}

/// State machine guarding vote submission behind a verified membership proof.
#[derive(Debug)]
pub struct ProofGate {
    requirement: ProofRequirement,
    identity: Option<Identity>,
    state: GateState,
    epoch: u64,
}

impl ProofGate {
    pub fn new(requirement: ProofRequirement) -> Self {
        Self {
            requirement,
            identity: None,
            state: GateState::Idle,
            epoch: 0,
        }
    }

    pub fn requirement(&self) -> &ProofRequirement {
        &self.requirement
    }

    pub fn state(&self) -> &GateState {
        &self.state
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn is_verified(&self) -> bool {
        matches!(self.state, GateState::Verified(_))
    }

    /// The proof token, once verified.
    pub fn token(&self) -> Option<&ProofToken> {
        match &self.state {
            GateState::Verified(token) => Some(token),
            _ => None,
        }
    }

    /// Observe the current wallet identity. A proof is bound to exactly one
    /// identity, so any change while an exchange is underway resets the gate.
    pub fn set_identity(&mut self, identity: Option<Identity>) {
        if self.identity == identity {
            return;
        }
        self.identity = identity;
        if !matches!(self.state, GateState::Idle) {
            tracing::debug!(from = self.state.name(), "identity changed, resetting proof gate");
            self.reset();
        }
    }

    /// Open the provider flow for the current identity.
    ///
    /// Valid from `Idle`, and from `VerificationFailed` since that state is
    /// retryable by definition.
    pub fn begin_request(&mut self) -> Result<&ProofRequirement, PollError> {
        if self.identity.is_none() {
            return Err(PollError::NoIdentity);
        }
        match self.state {
            GateState::Idle | GateState::VerificationFailed(_) => {
                self.state = GateState::AwaitingProof;
                Ok(&self.requirement)
            }
            _ => Err(PollError::ProofFlowActive),
        }
    }

    /// The user walked away from the provider flow. Not an error.
    pub fn abandon(&mut self) {
        self.reset();
    }

    /// Accept a raw response from the provider.
    ///
    /// Returns `false` (and changes nothing) when no exchange is awaiting a
    /// response — e.g. the flow was abandoned before the provider returned.
    pub fn receive_response(&mut self, response: serde_json::Value) -> bool {
        match self.state {
            GateState::AwaitingProof => {
                self.state = GateState::ProofReceived(response);
                true
            }
            _ => {
                tracing::debug!(state = self.state.name(), "discarding unexpected proof response");
                false
            }
        }
    }

    /// Move to `VerificationPending` and hand back the request to send to the
    /// verification endpoint.
    pub fn start_verification(&mut self) -> Result<VerificationTicket, PollError> {
        let response = match &self.state {
            GateState::ProofReceived(response) => response.clone(),
            _ => return Err(PollError::NoPendingProof),
        };
        self.state = GateState::VerificationPending;
        Ok(VerificationTicket {
            epoch: self.epoch,
            request: VerifyRequest {
                zk_connect_response: response,
            },
        })
    }

    /// Apply the outcome of a verification round trip.
    ///
    /// Returns `false` when the ticket predates a reset and the outcome was
    /// discarded.
    pub fn complete_verification(
        &mut self,
        ticket: VerificationTicket,
        outcome: Result<VerifyOutcome, ServiceError>,
    ) -> bool {
        if ticket.epoch != self.epoch {
            tracing::debug!("discarding verification outcome from a stale exchange");
            return false;
        }
        self.state = match outcome {
            Ok(result) if result.ok => match ProofToken::new(result.proof_id) {
                Some(token) => {
                    tracing::info!("membership proof verified");
                    GateState::Verified(token)
                }
                None => GateState::VerificationFailed(
                    "verifier returned an empty proof id".to_string(),
                ),
            },
            Ok(_) => GateState::VerificationFailed("verifier rejected the proof".to_string()),
            Err(err) => {
                tracing::warn!(error = %err, "proof verification endpoint failed");
                GateState::VerificationFailed(err.to_string())
            }
        };
        true
    }

    /// Drive one full verification round trip against `verifier`.
    pub async fn verify(&mut self, verifier: &dyn ProofVerifier) -> Result<(), PollError> {
        let ticket = self.start_verification()?;
        let outcome = verifier.verify(ticket.request()).await;
        self.complete_verification(ticket, outcome);
        Ok(())
    }

    fn reset(&mut self) {
        self.state = GateState::Idle;
        self.epoch += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poll_types::DevMode;

    fn requirement() -> ProofRequirement {
        ProofRequirement {
            group_id: "0x42c768bb8ae79e4c5c05d3b51a4ec74a".to_string(),
            app_id: "0x7e7fdcd9d2a59667fba943d717de2ff3".to_string(),
            callback_context: "p1".to_string(),
            dev_mode: None,
        }
    }

    fn identity(byte: u8) -> Identity {
        Identity::from([byte; 20])
    }

    fn gate_with_identity() -> ProofGate {
        let mut gate = ProofGate::new(requirement());
        gate.set_identity(Some(identity(0x01)));
        gate
    }

    fn ok_outcome(proof_id: &str) -> Result<VerifyOutcome, ServiceError> {
        Ok(VerifyOutcome {
            ok: true,
            proof_id: proof_id.to_string(),
        })
    }

    #[test]
    fn full_exchange_reaches_verified() {
        let mut gate = gate_with_identity();
        gate.begin_request().unwrap();
        assert!(gate.receive_response(serde_json::json!({"proof": "blob"})));
        let ticket = gate.start_verification().unwrap();
        assert_eq!(*gate.state(), GateState::VerificationPending);
        assert!(gate.complete_verification(ticket, ok_outcome("pf-1")));
        assert_eq!(gate.token().unwrap().as_str(), "pf-1");
    }

    #[test]
    fn begin_request_needs_an_identity() {
        let mut gate = ProofGate::new(requirement());
        assert!(matches!(gate.begin_request(), Err(PollError::NoIdentity)));
    }

    #[test]
    fn begin_request_rejected_while_exchange_active() {
        let mut gate = gate_with_identity();
        gate.begin_request().unwrap();
        assert!(matches!(
            gate.begin_request(),
            Err(PollError::ProofFlowActive)
        ));
    }

    #[test]
    fn failed_verification_is_retryable() {
        let mut gate = gate_with_identity();
        gate.begin_request().unwrap();
        gate.receive_response(serde_json::json!({}));
        let ticket = gate.start_verification().unwrap();
        gate.complete_verification(ticket, Err(ServiceError::Status(500)));
        assert!(matches!(gate.state(), GateState::VerificationFailed(_)));
        assert!(!gate.is_verified());

        // Straight back into a new exchange.
        gate.begin_request().unwrap();
        assert_eq!(*gate.state(), GateState::AwaitingProof);
    }

    #[test]
    fn rejection_by_verifier_never_verifies() {
        let mut gate = gate_with_identity();
        gate.begin_request().unwrap();
        gate.receive_response(serde_json::json!({}));
        let ticket = gate.start_verification().unwrap();
        gate.complete_verification(
            ticket,
            Ok(VerifyOutcome {
                ok: false,
                proof_id: "pf-evil".to_string(),
            }),
        );
        assert!(matches!(gate.state(), GateState::VerificationFailed(_)));
    }

    #[test]
    fn empty_proof_id_never_verifies() {
        let mut gate = gate_with_identity();
        gate.begin_request().unwrap();
        gate.receive_response(serde_json::json!({}));
        let ticket = gate.start_verification().unwrap();
        gate.complete_verification(ticket, ok_outcome(""));
        assert!(matches!(gate.state(), GateState::VerificationFailed(_)));
    }

    #[test]
    fn abandoning_returns_to_idle_and_discards_late_outcomes() {
        let mut gate = gate_with_identity();
        gate.begin_request().unwrap();
        gate.receive_response(serde_json::json!({}));
        let ticket = gate.start_verification().unwrap();

        gate.abandon();
        assert_eq!(*gate.state(), GateState::Idle);

        // The round trip finishes after the user already walked away.
        assert!(!gate.complete_verification(ticket, ok_outcome("pf-late")));
        assert_eq!(*gate.state(), GateState::Idle);
    }

    #[test]
    fn late_provider_response_is_ignored_when_idle() {
        let mut gate = gate_with_identity();
        assert!(!gate.receive_response(serde_json::json!({})));
        assert_eq!(*gate.state(), GateState::Idle);
    }

    #[test]
    fn identity_change_resets_any_active_state() {
        let mut gate = gate_with_identity();
        gate.begin_request().unwrap();
        gate.receive_response(serde_json::json!({}));
        let ticket = gate.start_verification().unwrap();
        gate.complete_verification(ticket, ok_outcome("pf-1"));
        assert!(gate.is_verified());

        gate.set_identity(Some(identity(0x02)));
        assert_eq!(*gate.state(), GateState::Idle);
        assert!(gate.token().is_none());
    }

    #[test]
    fn unchanged_identity_keeps_state() {
        let mut gate = gate_with_identity();
        gate.begin_request().unwrap();
        gate.set_identity(Some(identity(0x01)));
        assert_eq!(*gate.state(), GateState::AwaitingProof);
    }

    #[test]
    fn disconnecting_resets_too() {
        let mut gate = gate_with_identity();
        gate.begin_request().unwrap();
        gate.set_identity(None);
        assert_eq!(*gate.state(), GateState::Idle);
    }

    #[test]
    fn requirement_survives_resets() {
        let mut gate = ProofGate::new(ProofRequirement {
            dev_mode: Some(DevMode {
                enabled: true,
                dev_addresses: vec!["0x69420cc9b83d641470d0fea1cbf1a59d7a83df48".to_string()],
            }),
            ..requirement()
        });
        gate.set_identity(Some(identity(0x01)));
        gate.begin_request().unwrap();
        gate.abandon();
        assert!(gate.requirement().dev_mode.as_ref().unwrap().enabled);
    }
}
