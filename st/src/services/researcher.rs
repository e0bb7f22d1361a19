//! Research service: search-API adapter plus its transport agent
//!
//! The agent always answers `inform{summary}`; when nothing useful is found
//! the summary is [`NO_RESULTS_SUMMARY`] rather than a failure.

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::ServiceError;
use crate::config::ResearchConfig;
use crate::transport::{Envelope, Mailbox, Outbox, Performative};

/// Summary sent when the search produced nothing usable
pub const NO_RESULTS_SUMMARY: &str = "No relevant search results were found for the given keywords.";

/// At most this many generated queries are searched per request
const MAX_QUERIES: usize = 5;

/// Sentences shorter than this are never selected for a summary
const MIN_SENTENCE_LEN: usize = 10;

static SENTENCE_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.?!]\s+").expect("valid sentence regex"));

/// Body of a research `request`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResearchRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub queries: Vec<String>,
}

/// Produces a free-text summary for a story title and its keywords
#[async_trait]
pub trait Researcher: Send + Sync {
    /// `Ok(None)` means the search ran but found nothing relevant
    async fn research(&self, request: &ResearchRequest) -> Result<Option<String>, ServiceError>;
}

/// Build search queries from a title, its keywords and the team's tech stack
///
/// Longest (most specific) queries come first.
pub fn generate_queries(title: &str, keywords: &[String], tech_stack: &[String]) -> Vec<String> {
    if keywords.is_empty() {
        return vec![title.to_string()];
    }

    let keywords: BTreeSet<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
    let mut stack: Vec<&str> = tech_stack.iter().map(String::as_str).collect();
    stack.sort_unstable();
    let stack = stack.join(" ");

    let with_stack = |text: &str| format!("{} {}", text, stack).trim().to_string();

    let mut queries = BTreeSet::new();
    queries.insert(with_stack(title));
    for keyword in &keywords {
        queries.insert(with_stack(keyword));
    }
    if keywords.len() > 1 {
        let combined = keywords.iter().map(String::as_str).collect::<Vec<_>>().join(" ");
        queries.insert(with_stack(&combined));
    }

    let mut queries: Vec<String> = queries.into_iter().filter(|q| !q.is_empty()).collect();
    queries.sort_by(|a, b| b.len().cmp(&a.len()));
    queries
}

/// Pick the sentences of `text` that mention the most keywords
///
/// Returns `None` when no sentence mentions any keyword.
pub fn summarize(text: &str, keywords: &[String], max_sentences: usize) -> Option<String> {
    let keywords: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).filter(|k| !k.is_empty()).collect();

    let mut scored: Vec<(usize, &str)> = split_sentences(text)
        .into_iter()
        .filter(|s| s.len() > MIN_SENTENCE_LEN)
        .filter_map(|sentence| {
            let lower = sentence.to_lowercase();
            let score = keywords.iter().filter(|k| lower.contains(k.as_str())).count();
            (score > 0).then_some((score, sentence))
        })
        .collect();

    if scored.is_empty() {
        return None;
    }

    // Stable sort keeps document order among equal scores
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    Some(
        scored
            .into_iter()
            .take(max_sentences)
            .map(|(_, s)| s)
            .collect::<Vec<_>>()
            .join(" "),
    )
}

fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for m in SENTENCE_END.find_iter(text) {
        // Keep the terminating punctuation with its sentence
        sentences.push(text[start..m.start() + 1].trim());
        start = m.end();
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    link: String,
    #[serde(default)]
    snippet: String,
}

/// Researcher backed by a Custom Search JSON API
///
/// Summarises result snippets; pages themselves are not fetched.
pub struct SearchResearcher {
    http: Client,
    endpoint: String,
    api_key: String,
    cx: String,
    tech_stack: Vec<String>,
    max_results_per_query: u32,
    max_sentences: usize,
}

impl SearchResearcher {
    /// Build from config, reading credentials from the configured env vars
    pub fn from_config(config: &ResearchConfig) -> Result<Self, ServiceError> {
        debug!(endpoint = %config.endpoint, "SearchResearcher::from_config: called");
        let api_key =
            std::env::var(&config.api_key_env).map_err(|_| ServiceError::MissingCredential(config.api_key_env.clone()))?;
        let cx = std::env::var(&config.cx_env).map_err(|_| ServiceError::MissingCredential(config.cx_env.clone()))?;
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            api_key,
            cx,
            tech_stack: config.tech_stack.clone(),
            max_results_per_query: config.max_results_per_query,
            max_sentences: config.max_sentences,
        })
    }

    async fn search(&self, query: &str, num_results: u32) -> Result<Vec<SearchItem>, ServiceError> {
        debug!(%query, num_results, "SearchResearcher::search: called");
        let num = num_results.to_string();
        let response = self
            .http
            .get(self.endpoint.as_str())
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.cx.as_str()),
                ("q", query),
                ("num", num.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body: SearchResponse = response.json().await?;
        Ok(body.items)
    }
}

#[async_trait]
impl Researcher for SearchResearcher {
    async fn research(&self, request: &ResearchRequest) -> Result<Option<String>, ServiceError> {
        let queries = generate_queries(&request.title, &request.queries, &self.tech_stack);
        info!(title = %request.title, ?queries, "Generated research queries");

        // The first (most specific) query gets the full result allowance
        let searches = queries.iter().take(MAX_QUERIES).enumerate().map(|(i, query)| {
            let num = if i == 0 { self.max_results_per_query } else { 1 };
            self.search(query, num)
        });

        let mut seen = HashSet::new();
        let mut snippets = Vec::new();
        for (query, result) in queries.iter().zip(join_all(searches).await) {
            match result {
                Ok(items) => {
                    debug!(%query, results = items.len(), "search results");
                    for item in items {
                        if seen.insert(item.link) && !item.snippet.is_empty() {
                            snippets.push(item.snippet.replace('\n', " "));
                        }
                    }
                }
                Err(e) => warn!(%query, error = %e, "Search failed"),
            }
        }

        if snippets.is_empty() {
            return Ok(None);
        }

        let keywords = if request.queries.is_empty() {
            request.title.split_whitespace().map(str::to_string).collect()
        } else {
            request.queries.clone()
        };
        Ok(summarize(&snippets.join(" "), &keywords, self.max_sentences))
    }
}

/// Researcher used when no search credentials are configured
///
/// Answers immediately with nothing found, so stories proceed on the
/// no-research placeholder instead of waiting out the research budget.
pub struct OfflineResearcher;

#[async_trait]
impl Researcher for OfflineResearcher {
    async fn research(&self, request: &ResearchRequest) -> Result<Option<String>, ServiceError> {
        debug!(title = %request.title, "OfflineResearcher::research: called");
        Ok(None)
    }
}

/// Exposes a [`Researcher`] on the transport
pub struct ResearcherAgent {
    researcher: Arc<dyn Researcher>,
    mailbox: Mailbox,
}

impl ResearcherAgent {
    pub fn new(researcher: Arc<dyn Researcher>, mailbox: Mailbox) -> Self {
        Self { researcher, mailbox }
    }

    /// Serve requests until the mailbox closes
    pub async fn run(self) {
        let (outbox, mut rx) = self.mailbox.split();
        info!(address = %outbox.address(), "Researcher agent started");

        while let Some(envelope) = rx.recv().await {
            if envelope.performative != Performative::Request {
                debug!(performative = %envelope.performative, "ResearcherAgent: ignoring non-request");
                continue;
            }
            let researcher = self.researcher.clone();
            let outbox = outbox.clone();
            tokio::spawn(async move { handle_request(researcher.as_ref(), &outbox, envelope).await });
        }

        info!(address = %outbox.address(), "Researcher agent stopped");
    }
}

async fn handle_request(researcher: &dyn Researcher, outbox: &Outbox, envelope: Envelope) {
    let request: ResearchRequest = serde_json::from_value(envelope.body.clone()).unwrap_or_else(|e| {
        warn!(error = %e, "Unreadable research request, searching with defaults");
        ResearchRequest::default()
    });
    info!(correlation_id = %envelope.correlation_id, title = %request.title, "Research requested");

    let summary = match researcher.research(&request).await {
        Ok(Some(summary)) => summary,
        Ok(None) => NO_RESULTS_SUMMARY.to_string(),
        Err(e) => {
            warn!(title = %request.title, error = %e, "Research failed");
            NO_RESULTS_SUMMARY.to_string()
        }
    };

    let body: Value = json!({ "summary": summary });
    if let Err(e) = outbox.reply(&envelope, Performative::Inform, body).await {
        warn!(error = %e, "ResearcherAgent: reply not sent");
    }
}
