//! Data and wire types shared between the poll session and the service
//! clients.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// Wallet identity as observed from the wallet-connection layer.
///
/// The wire contract normalizes addresses to lowercase hex; use
/// [`wire_address`] when serializing one.
pub type Identity = Address;

/// Lowercase `0x`-prefixed form of an address, as the voting and indexing
/// services expect it.
pub fn wire_address(identity: &Identity) -> String {
    format!("{identity:#x}")
}

/// A poll definition as served by the poll directory.
///
/// Read-only to this crate; polls are authored elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Poll {
    /// Page slug the poll is keyed by.
    pub slug: String,
    /// Question shown above the options.
    pub prompt: String,
    /// Ordered answer options.
    pub options: Vec<String>,
}

impl Poll {
    pub fn new(slug: impl Into<String>, definition: PollDefinition) -> Self {
        Self {
            slug: slug.into(),
            prompt: definition.prompt,
            options: definition.options,
        }
    }

    /// Whether `option` is one of this poll's answer options.
    pub fn has_option(&self, option: &str) -> bool {
        self.options.iter().any(|o| o == option)
    }
}

/// Body of the poll directory response; the slug is implied by the request.
#[derive(Debug, Clone, Deserialize)]
pub struct PollDefinition {
    pub prompt: String,
    pub options: Vec<String>,
}

/// Group-membership requirement a voter has to prove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofRequirement {
    /// Group the voter must be a member of.
    pub group_id: String,
    /// Application id registered with the proof provider.
    pub app_id: String,
    /// Context the provider redirects back to (the page slug).
    pub callback_context: String,
    /// Provider dev-mode settings, if any.
    pub dev_mode: Option<DevMode>,
}

/// Dev-mode knob of the proof provider: treat the listed addresses as group
/// members without a real proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevMode {
    pub enabled: bool,
    pub dev_addresses: Vec<String>,
}

/// Opaque credential returned by a successful proof verification.
///
/// The only property this crate relies on is that it is non-empty; it is
/// never parsed or reinterpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofToken(String);

impl ProofToken {
    /// Wraps a verifier-issued proof id. Returns `None` for an empty id,
    /// which the verifier contract does not allow.
    pub fn new(proof_id: impl Into<String>) -> Option<Self> {
        let proof_id = proof_id.into();
        if proof_id.is_empty() {
            None
        } else {
            Some(Self(proof_id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Local vote lifecycle for one poll session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VoteState {
    #[default]
    NotVoted,
    /// Submission in flight, not yet acknowledged.
    Voting(String),
    /// Acknowledged (or discovered via the indexing service). Immutable for
    /// the rest of the session.
    Voted(String),
}

impl VoteState {
    pub fn is_voted(&self) -> bool {
        matches!(self, VoteState::Voted(_))
    }
}

/// A fully-authorized vote, ready for submission.
///
/// Only constructible from a non-empty [`ProofToken`], which keeps
/// unauthorized submissions unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteAttempt {
    pub poll_slug: String,
    pub option: String,
    pub identity: Identity,
    pub proof_token: ProofToken,
}

impl VoteAttempt {
    pub fn new(
        poll_slug: impl Into<String>,
        option: impl Into<String>,
        identity: Identity,
        proof_token: ProofToken,
    ) -> Self {
        Self {
            poll_slug: poll_slug.into(),
            option: option.into(),
            identity,
            proof_token,
        }
    }

    /// Wire body for the voting endpoint.
    pub fn to_request(&self) -> VoteRequest {
        VoteRequest {
            poll: self.poll_slug.clone(),
            option: self.option.clone(),
            proof_id: self.proof_token.as_str().to_string(),
            address: wire_address(&self.identity),
        }
    }
}

/// JSON body of `POST /attestToPoll`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub poll: String,
    pub option: String,
    pub proof_id: String,
    pub address: String,
}

/// JSON body of `POST /verify`: the raw provider response, forwarded opaquely.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub zk_connect_response: serde_json::Value,
}

/// JSON response of `POST /verify`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOutcome {
    pub ok: bool,
    #[serde(default)]
    pub proof_id: String,
}

/// Aggregate standing of a single option, per the indexing service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionResult {
    /// Option id (the option string itself).
    pub id: String,
    pub num_votes: u64,
    /// Whether the queried identity already voted for this option.
    pub voted_by_identity: bool,
}

/// Externally-aggregated results for all options of one poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    pub options: Vec<OptionResult>,
}

impl ResultSet {
    pub fn new(options: Vec<OptionResult>) -> Self {
        Self { options }
    }

    /// The option the queried identity voted for, if the service reports one.
    pub fn voted_option(&self) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.voted_by_identity)
            .map(|o| o.id.as_str())
    }

    pub fn get(&self, option: &str) -> Option<&OptionResult> {
        self.options.iter().find(|o| o.id == option)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_address_is_lowercase_hex() {
        let identity = Identity::from([0x69u8; 20]);
        assert_eq!(
            wire_address(&identity),
            "0x6969696969696969696969696969696969696969"
        );
    }

    #[test]
    fn proof_token_rejects_empty_id() {
        assert!(ProofToken::new("").is_none());
        assert_eq!(ProofToken::new("pf-1").unwrap().as_str(), "pf-1");
    }

    #[test]
    fn vote_attempt_serializes_to_wire_shape() {
        let attempt = VoteAttempt::new(
            "p1",
            "A",
            Identity::from([0x01u8; 20]),
            ProofToken::new("pf-1").unwrap(),
        );
        let body = serde_json::to_value(attempt.to_request()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "poll": "p1",
                "option": "A",
                "proofId": "pf-1",
                "address": "0x0101010101010101010101010101010101010101",
            })
        );
    }

    #[test]
    fn result_set_reports_prior_vote() {
        let results = ResultSet::new(vec![
            OptionResult {
                id: "A".into(),
                num_votes: 3,
                voted_by_identity: false,
            },
            OptionResult {
                id: "B".into(),
                num_votes: 1,
                voted_by_identity: true,
            },
        ]);
        assert_eq!(results.voted_option(), Some("B"));
        assert_eq!(results.get("A").unwrap().num_votes, 3);
    }
}
