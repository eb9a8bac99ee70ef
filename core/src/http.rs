//! reqwest-backed implementations of the service contracts.
//!
//! `PollApiClient` talks to the poll/attestation API (poll lookup, proof
//! verification, vote submission share one base URL); `GraphResultClient`
//! issues the aggregate query against the graph indexing endpoint.

use std::time::Duration;

use async_trait::async_trait;
use poll_types::{
    wire_address, Identity, PollDefinition, ResultSet, VerifyOutcome, VerifyRequest, VoteRequest,
};
use serde::Deserialize;
use url::Url;

use crate::error::ServiceError;
use crate::services::{PollDirectory, ProofVerifier, ResultService, VoteService};

/// Default request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the poll/attestation API.
pub struct PollApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl PollApiClient {
    pub fn new(base_url: &Url) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PollDirectory for PollApiClient {
    async fn fetch(&self, slug: &str) -> Result<Option<PollDefinition>, ServiceError> {
        let url = format!("{}/polls", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("slug", slug)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ServiceError::Status(response.status().as_u16()));
        }
        parse_poll_body(&response.text().await?)
    }
}

#[async_trait]
impl VoteService for PollApiClient {
    async fn submit(&self, request: &VoteRequest) -> Result<(), ServiceError> {
        let url = format!("{}/attestToPoll", self.base_url);
        let response = self.client.post(&url).json(request).send().await?;
        if !response.status().is_success() {
            return Err(ServiceError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl ProofVerifier for PollApiClient {
    async fn verify(&self, request: &VerifyRequest) -> Result<VerifyOutcome, ServiceError> {
        let url = format!("{}/verify", self.base_url);
        let response = self.client.post(&url).json(request).send().await?;
        if !response.status().is_success() {
            return Err(ServiceError::Status(response.status().as_u16()));
        }
        let outcome = response.json::<VerifyOutcome>().await?;
        Ok(outcome)
    }
}

/// The directory serves an empty or `null` body for pages without a poll.
fn parse_poll_body(body: &str) -> Result<Option<PollDefinition>, ServiceError> {
    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(None);
    }
    serde_json::from_str(trimmed)
        .map(Some)
        .map_err(|err| ServiceError::Malformed(err.to_string()))
}

/// Client for the graph indexing endpoint.
pub struct GraphResultClient {
    client: reqwest::Client,
    endpoint: String,
}

impl GraphResultClient {
    pub fn new(endpoint: &Url) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.as_str().to_string(),
        })
    }
}

#[async_trait]
impl ResultService for GraphResultClient {
    async fn query(
        &self,
        slug: &str,
        options: &[String],
        identity: Option<&Identity>,
    ) -> Result<ResultSet, ServiceError> {
        let query = build_query(slug, options, identity);
        let response = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "query": query }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ServiceError::Status(response.status().as_u16()));
        }
        let body = response.json::<GraphResponse>().await?;
        fold_response(options, body)
    }
}

/// Aggregate query over the poll's options, with the identity-filtered
/// `votes` edge only when an identity is connected.
fn build_query(slug: &str, options: &[String], identity: Option<&Identity>) -> String {
    let ids = options
        .iter()
        .map(|option| quoted(option))
        .collect::<Vec<_>>()
        .join(",");
    let votes_edge = match identity {
        Some(identity) => format!(
            "\n    votes(where: {{ user_: {{ id: {} }} }}) {{ id }}",
            quoted(&wire_address(identity))
        ),
        None => String::new(),
    };
    format!(
        "{{\n  options(where: {{ id_in: [{ids}], poll_: {{ id: {slug} }} }}) {{\n    id\n    numVotes{votes_edge}\n  }}\n}}",
        ids = ids,
        slug = quoted(slug),
        votes_edge = votes_edge,
    )
}

/// JSON string literal, which is also valid GraphQL string syntax.
fn quoted(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

#[derive(Debug, Deserialize)]
struct GraphResponse {
    data: Option<GraphData>,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct GraphData {
    #[serde(default)]
    options: Vec<GraphOption>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphOption {
    id: String,
    #[serde(default, deserialize_with = "count_field")]
    num_votes: u64,
    #[serde(default)]
    votes: Vec<serde_json::Value>,
}

/// The index serves `Int` counts as numbers and `BigInt` counts as strings;
/// accept either.
fn count_field<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Text(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Num(count) => Ok(count),
        Raw::Text(count) => count.parse().map_err(serde::de::Error::custom),
    }
}

/// Normalize the graph response to the poll's option order; options the index
/// has never seen count zero votes.
fn fold_response(options: &[String], body: GraphResponse) -> Result<ResultSet, ServiceError> {
    let Some(data) = body.data else {
        return Err(ServiceError::Malformed(format!(
            "graph query failed: {}",
            serde_json::Value::Array(body.errors)
        )));
    };
    let results = options
        .iter()
        .map(|option| {
            let entry = data.options.iter().find(|o| &o.id == option);
            poll_types::OptionResult {
                id: option.clone(),
                num_votes: entry.map(|o| o.num_votes).unwrap_or(0),
                voted_by_identity: entry.map(|o| !o.votes.is_empty()).unwrap_or(false),
            }
        })
        .collect();
    Ok(ResultSet::new(results))
}
