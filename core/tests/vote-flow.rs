use std::sync::Arc;

use poll_core::mocks::{MockPollDirectory, MockProofVerifier, MockResultService, MockVoteService};
use poll_core::poll_types::{
    wire_address, Identity, OptionResult, PollDefinition, ProofRequirement, ResultSet,
    VerifyOutcome, VoteState,
};
use poll_core::{PollError, PollSession, SessionServices};

fn requirement(slug: &str) -> ProofRequirement {
    ProofRequirement {
        group_id: "0x42c768bb8ae79e4c5c05d3b51a4ec74a".to_string(),
        app_id: "0x7e7fdcd9d2a59667fba943d717de2ff3".to_string(),
        callback_context: slug.to_string(),
        dev_mode: None,
    }
}

struct Remote {
    directory: Arc<MockPollDirectory>,
    results: Arc<MockResultService>,
    votes: Arc<MockVoteService>,
    verifier: Arc<MockProofVerifier>,
}

impl Remote {
    fn new() -> Self {
        Self {
            directory: Arc::new(MockPollDirectory::new()),
            results: Arc::new(MockResultService::new()),
            votes: Arc::new(MockVoteService::new()),
            verifier: Arc::new(MockProofVerifier::new()),
        }
    }

    fn services(&self) -> SessionServices {
        SessionServices {
            directory: self.directory.clone(),
            results: self.results.clone(),
            votes: self.votes.clone(),
            verifier: self.verifier.clone(),
        }
    }
}

#[test_log::test(tokio::test)]
async fn full_vote_flow_end_to_end() {
    let remote = Remote::new();
    remote
        .directory
        .set_poll(Some(PollDefinition {
            prompt: "Was this tutorial helpful?".to_string(),
            options: vec!["A".to_string(), "B".to_string()],
        }))
        .await;
    remote
        .verifier
        .respond(VerifyOutcome {
            ok: true,
            proof_id: "pf-1".to_string(),
        })
        .await;

    let identity = Identity::from([0x69u8; 20]);
    let mut session = PollSession::new("p1", requirement("p1"), remote.services());

    // Page load: poll arrives, aggregates arrive, nobody has voted yet.
    session.load().await;
    assert_eq!(session.poll().unwrap().options, vec!["A", "B"]);
    assert_eq!(*session.vote_state(), VoteState::NotVoted);

    // Wallet connects; voting is still locked behind the proof.
    session.set_identity(Some(identity));
    session.refresh_results().await;
    assert!(matches!(
        session.select_option("A").await.unwrap_err(),
        PollError::NotVerified
    ));
    assert!(remote.votes.requests().await.is_empty());

    // Proof exchange: request, provider responds, verification succeeds.
    session.gate_mut().begin_request().unwrap();
    assert!(session
        .gate_mut()
        .receive_response(serde_json::json!({"proofs": ["blob"]})));
    session.verify_proof().await.unwrap();
    assert_eq!(session.gate().token().unwrap().as_str(), "pf-1");
    assert_eq!(remote.verifier.calls().await, 1);

    // The vote goes out exactly as the wire contract demands.
    session.select_option("A").await.unwrap();
    let requests = remote.votes.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].poll, "p1");
    assert_eq!(requests[0].option, "A");
    assert_eq!(requests[0].proof_id, "pf-1");
    assert_eq!(requests[0].address, wire_address(&identity));
    assert_eq!(*session.vote_state(), VoteState::Voted("A".to_string()));

    // Changing one's mind is not a thing.
    assert!(matches!(
        session.select_option("B").await.unwrap_err(),
        PollError::AlreadyVoted
    ));
    assert_eq!(remote.votes.requests().await.len(), 1);
}

#[test_log::test(tokio::test)]
async fn reload_discovers_prior_vote_and_prevents_resubmission() {
    let remote = Remote::new();
    remote
        .directory
        .set_poll(Some(PollDefinition {
            prompt: "Was this tutorial helpful?".to_string(),
            options: vec!["A".to_string(), "B".to_string()],
        }))
        .await;
    remote
        .results
        .set_results(ResultSet::new(vec![
            OptionResult {
                id: "A".into(),
                num_votes: 1,
                voted_by_identity: false,
            },
            OptionResult {
                id: "B".into(),
                num_votes: 5,
                voted_by_identity: true,
            },
        ]))
        .await;
    remote
        .verifier
        .respond(VerifyOutcome {
            ok: true,
            proof_id: "pf-2".to_string(),
        })
        .await;

    // Fresh session, as after a page reload: no local vote ever happened.
    let mut session = PollSession::new("p1", requirement("p1"), remote.services());
    session.set_identity(Some(Identity::from([0x42u8; 20])));
    session.load().await;
    assert_eq!(*session.vote_state(), VoteState::Voted("B".to_string()));

    // Even with a verified proof in hand, the ballot stays locked.
    session.gate_mut().begin_request().unwrap();
    session.gate_mut().receive_response(serde_json::json!({}));
    session.verify_proof().await.unwrap();
    assert!(session.gate().is_verified());
    assert!(matches!(
        session.select_option("A").await.unwrap_err(),
        PollError::AlreadyVoted
    ));
    assert!(remote.votes.requests().await.is_empty());
}

#[test_log::test(tokio::test)]
async fn switching_accounts_demands_a_fresh_proof() {
    let remote = Remote::new();
    remote
        .directory
        .set_poll(Some(PollDefinition {
            prompt: "Was this tutorial helpful?".to_string(),
            options: vec!["A".to_string(), "B".to_string()],
        }))
        .await;
    remote
        .verifier
        .respond(VerifyOutcome {
            ok: true,
            proof_id: "pf-3".to_string(),
        })
        .await;

    let mut session = PollSession::new("p1", requirement("p1"), remote.services());
    session.load().await;
    session.set_identity(Some(Identity::from([0x01u8; 20])));
    session.gate_mut().begin_request().unwrap();
    session.gate_mut().receive_response(serde_json::json!({}));
    session.verify_proof().await.unwrap();
    assert!(session.gate().is_verified());

    // Another account connects: the old proof must not carry over.
    session.set_identity(Some(Identity::from([0x02u8; 20])));
    session.refresh_results().await;
    assert!(matches!(
        session.select_option("A").await.unwrap_err(),
        PollError::NotVerified
    ));
    assert!(remote.votes.requests().await.is_empty());

    // A new exchange under the new identity unlocks voting again.
    session.gate_mut().begin_request().unwrap();
    session.gate_mut().receive_response(serde_json::json!({}));
    session.verify_proof().await.unwrap();
    session.select_option("A").await.unwrap();
    assert_eq!(*session.vote_state(), VoteState::Voted("A".to_string()));
}
