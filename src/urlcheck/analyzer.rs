//! Redirect-history analyzer.
//!
//! The actual crawling heuristics (what counts as a distinct "hop type",
//! how counters are tallied) belong to the redirect-history analyzer that
//! `spec.md` §1 calls out as an external collaborator. This module defines
//! the boundary ([`RedirectAnalyzer`]) the URL-check worker depends on, and
//! a reqwest-backed default implementation that follows the chain itself
//! rather than delegating to reqwest's own redirect handling, so each hop
//! can be recorded.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::redirect::Policy;

/// Outcome of following a URL's redirect chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectHistory {
    /// One entry per hop: `"REDIRECT"` for an intermediate hop, `"FINAL"`
    /// for a chain that terminated normally, `"ERROR"` for a hop that
    /// failed to resolve.
    pub types: Vec<String>,
    /// The URL visited at each hop, in order.
    pub urls: Vec<String>,
    /// Analyzer-specific counters; opaque to the worker, carried through
    /// to the output queue verbatim.
    pub counters: Vec<String>,
}

/// Follows a URL's redirect chain and classifies the result.
///
/// Returns `None` when the analyzer has nothing to report (`spec.md`
/// §4.5, "No classification"): the URL-check worker performs no queue
/// `put` in that case.
#[async_trait]
pub trait RedirectAnalyzer: Send + Sync {
    /// Analyze `url`, already unicode-normalized by the caller.
    async fn analyze(&self, url: &str) -> Option<RedirectHistory>;
}

/// Default [`RedirectAnalyzer`] backed by `reqwest`, following redirects
/// manually (via [`Policy::none`]) so each hop can be recorded.
pub struct ReqwestRedirectAnalyzer {
    client: reqwest::Client,
    max_redirects: usize,
}

impl ReqwestRedirectAnalyzer {
    /// Build an analyzer with the given connection/read timeout, redirect
    /// cap, and `User-Agent` header.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying TLS backend fails to initialize.
    pub fn new(timeout: Duration, max_redirects: usize, user_agent: &str) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent.to_owned())
            .redirect(Policy::none())
            .build()?;
        Ok(Self { client, max_redirects })
    }
}

#[async_trait]
impl RedirectAnalyzer for ReqwestRedirectAnalyzer {
    async fn analyze(&self, url: &str) -> Option<RedirectHistory> {
        let mut types = Vec::new();
        let mut urls = Vec::new();
        let counters = Vec::new();
        let mut current = url.to_string();

        for _ in 0..self.max_redirects.max(1) {
            urls.push(current.clone());
            let response = match self.client.get(&current).send().await {
                Ok(resp) => resp,
                Err(_) => {
                    types.push("ERROR".to_string());
                    return Some(RedirectHistory { types, urls, counters });
                }
            };

            if response.status().is_redirection() {
                let next = response
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_owned);
                match next {
                    Some(location) => {
                        types.push("REDIRECT".to_string());
                        current = location;
                        continue;
                    }
                    None => {
                        types.push("ERROR".to_string());
                        return Some(RedirectHistory { types, urls, counters });
                    }
                }
            }

            types.push("FINAL".to_string());
            return Some(RedirectHistory { types, urls, counters });
        }

        types.push("ERROR".to_string());
        Some(RedirectHistory { types, urls, counters })
    }
}

/// Unicode-normalize a URL string the way the original implementation's
/// `to_unicode(url, "ignore")` step does: in Rust, the task payload is
/// already a valid `&str` by construction (JSON strings are valid UTF-8),
/// so this is a pass-through that exists as an explicit seam rather than
/// an implicit assumption, documenting the pre-analysis step `spec.md`
/// §4.5 calls out.
#[must_use]
pub fn normalize_url(url: &str) -> String {
    url.trim().to_string()
}
