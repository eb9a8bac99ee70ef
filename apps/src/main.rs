use std::path::{Path, PathBuf};
use std::sync::Arc;

use alloy_primitives::Address;
use anyhow::{bail, Context, Result};
use clap::Parser;
use poll_core::badges::AttestationBoard;
use poll_core::gate::GateState;
use poll_core::http::{GraphResultClient, PollApiClient};
use poll_core::poll_types::{DevMode, ProofRequirement, VoteState};
use poll_core::{PollSession, SessionServices};
use url::Url;

/// Arguments of the poll host CLI.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Base URL of the poll and attestation API.
    #[clap(
        long,
        env,
        default_value = "https://ethporto-hack-api.vercel.app/api"
    )]
    api_url: Url,
    /// URL of the graph indexing endpoint used for aggregate results.
    #[clap(
        long,
        env,
        default_value = "https://api.thegraph.com/subgraphs/name/0xintuition/ep23-graph"
    )]
    graph_url: Url,
    /// Page slug whose poll should be driven.
    #[clap(short, long, env)]
    slug: String,
    /// Wallet address to act as. Votes and result reconciliation are keyed
    /// by it; omit to browse anonymously.
    #[clap(short, long, env)]
    address: Option<Address>,
    /// Group the voter has to prove membership of.
    #[clap(long, env, default_value = "0x42c768bb8ae79e4c5c05d3b51a4ec74a")]
    group_id: String,
    /// App id registered with the proof provider.
    #[clap(long, env, default_value = "0x7e7fdcd9d2a59667fba943d717de2ff3")]
    app_id: String,
    /// Address the proof provider treats as a group member in dev mode.
    #[clap(long, env)]
    dev_address: Option<String>,
    /// Path to a provider response JSON captured from the proof flow.
    #[clap(long, env)]
    proof_response: Option<PathBuf>,
    /// Option to vote for once the proof verifies.
    #[clap(long, env)]
    vote: Option<String>,
    /// Page tags to render as colored badges.
    #[clap(long, env, value_delimiter = ',')]
    tags: Vec<String>,
    /// Print aggregate results instead of the ballot at the end.
    #[clap(long)]
    show_results: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!("Loaded environment variables from {:?}", path),
        Err(e) if e.not_found() => tracing::debug!("No .env file found"),
        Err(e) => bail!("failed to load .env file: {}", e),
    }
    let args = Args::parse();

    render_badges(&args);

    let api = Arc::new(
        PollApiClient::new(&args.api_url).context("failed to build poll API client")?,
    );
    let graph = Arc::new(
        GraphResultClient::new(&args.graph_url).context("failed to build graph client")?,
    );
    let services = SessionServices {
        directory: api.clone(),
        results: graph,
        votes: api.clone(),
        verifier: api,
    };

    let requirement = ProofRequirement {
        group_id: args.group_id.clone(),
        app_id: args.app_id.clone(),
        callback_context: args.slug.clone(),
        dev_mode: args.dev_address.clone().map(|address| DevMode {
            enabled: true,
            dev_addresses: vec![address],
        }),
    };

    let mut session = PollSession::new(args.slug.clone(), requirement, services);
    session.set_identity(args.address);

    tracing::info!("Loading poll for {:?}", args.slug);
    session.load().await;

    let Some(poll) = session.poll() else {
        tracing::info!("No poll is attached to {:?}", args.slug);
        return Ok(());
    };
    tracing::info!("Poll: {}", poll.prompt);
    for option in &poll.options {
        tracing::info!("  option {:?}", option);
    }
    if let VoteState::Voted(option) = session.vote_state() {
        tracing::info!("This address already voted for {:?}", option);
    }

    if let Some(path) = args.proof_response.clone() {
        run_proof_exchange(&mut session, &path).await?;
    }

    if let Some(option) = args.vote.clone() {
        cast_vote(&mut session, &option).await?;
    }

    // Aggregates can lag the vote we just cast; fetch the freshest view the
    // index has before printing.
    session.refresh_results().await;
    if args.show_results {
        session.toggle_results();
    }
    print_results(&session);

    Ok(())
}

/// Render the page's tag badges with their deterministic palette colors.
fn render_badges(args: &Args) {
    if args.tags.is_empty() {
        return;
    }
    let board = AttestationBoard::new(args.tags.clone(), false);
    for badge in board.view(args.address.as_ref()).badges {
        tracing::info!("Tag {:?} -> {}", badge.label, badge.slot.theme_token());
    }
}

/// Feed a captured provider response through the proof gate and verify it.
async fn run_proof_exchange(session: &mut PollSession, path: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read proof response from {}", path.display()))?;
    let response: serde_json::Value =
        serde_json::from_str(&raw).context("proof response is not valid JSON")?;

    let group_id = session.gate_mut().begin_request()?.group_id.clone();
    tracing::info!("Requesting membership proof for group {}", group_id);

    if !session.gate_mut().receive_response(response) {
        bail!("proof gate is not awaiting a response");
    }
    tracing::info!("Verifying proof...");
    session.verify_proof().await?;

    match session.gate().state() {
        GateState::Verified(token) => {
            tracing::info!("Proof verified with id {}", token.as_str());
            Ok(())
        }
        GateState::VerificationFailed(reason) => bail!("proof verification failed: {reason}"),
        state => bail!("unexpected proof gate state after verification: {state:?}"),
    }
}

/// Cast a vote; all preconditions are enforced inside the session.
async fn cast_vote(session: &mut PollSession, option: &str) -> Result<()> {
    session
        .select_option(option)
        .await
        .with_context(|| format!("failed to cast vote for {option:?}"))?;
    tracing::info!("Vote for {:?} acknowledged", option);
    Ok(())
}

fn print_results(session: &PollSession) {
    if !session.showing_results() {
        return;
    }
    let Some(results) = session.results() else {
        tracing::info!("Aggregate results are unavailable");
        return;
    };
    for entry in &results.options {
        tracing::info!(
            "{} - {}{}",
            entry.id,
            entry.num_votes,
            if entry.voted_by_identity {
                " (your vote)"
            } else {
                ""
            }
        );
    }
}
