// Twitter/X recent-search connector.
//
// Polls the v2 recent-search endpoint until a wall-clock deadline. Each poll
// returns the newest matching tweets, so consecutive polls overlap heavily;
// ids already emitted this run are dropped. A 429 puts the connector into a
// cooldown, any other client error ends the run.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::time::{sleep_until, timeout_at, Instant};
use tracing::{debug, info, warn};

use super::{http_client, Connector, PostStream};
use crate::db::models::{Platform, RawPost};
use crate::error::SourceError;

const SOURCE: &str = "twitter";

pub const DEFAULT_API_URL: &str = "https://api.twitter.com";

/// Community value recorded for tweets; recent search isn't scoped to one.
pub const COMMUNITY: &str = "recent_search";

/// Prefix keeping tweet ids apart from other platforms' ids.
pub const ID_PREFIX: &str = "tw_";

/// Build the default search query: keywords ORed together, English, no retweets.
pub fn build_query(keywords: &[String]) -> String {
    format!("({}) -is:retweet lang:en", keywords.join(" OR "))
}

#[derive(Debug, Clone)]
pub struct TwitterConfig {
    pub bearer_token: String,
    pub query: String,
    /// How long to keep polling.
    pub duration: Duration,
    pub poll_interval: Duration,
    /// Wait after a 429 before polling again.
    pub rate_limit_cooldown: Duration,
    /// Results per request (the endpoint accepts 10..=100).
    pub max_results: u32,
    pub api_url: String,
}

impl TwitterConfig {
    pub fn new(bearer_token: String, query: String, duration: Duration) -> Self {
        Self {
            bearer_token,
            query,
            duration,
            poll_interval: Duration::from_secs(30),
            rate_limit_cooldown: Duration::from_secs(60),
            max_results: 100,
            api_url: DEFAULT_API_URL.to_string(),
        }
    }
}

pub struct TwitterConnector {
    client: reqwest::Client,
    config: TwitterConfig,
}

impl TwitterConnector {
    pub fn new(config: TwitterConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: http_client()?,
            config,
        })
    }

    async fn search(&self) -> Result<SearchResponse, SourceError> {
        let url = format!(
            "{}/2/tweets/search/recent",
            self.config.api_url.trim_end_matches('/')
        );
        let max_results = self.config.max_results.clamp(10, 100).to_string();

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.bearer_token)
            .query(&[
                ("query", self.config.query.as_str()),
                ("max_results", max_results.as_str()),
                ("tweet.fields", "created_at,public_metrics,author_id"),
            ])
            .send()
            .await
            .map_err(|e| SourceError::from_reqwest(SOURCE, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::from_status(SOURCE, status, &body));
        }

        response
            .json::<SearchResponse>()
            .await
            .map_err(|e| SourceError::from_reqwest(SOURCE, e))
    }
}

impl Connector for TwitterConnector {
    fn name(&self) -> &'static str {
        SOURCE
    }

    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    fn posts(&self) -> PostStream<'_> {
        Box::pin(async_stream::stream! {
            let deadline = Instant::now() + self.config.duration;
            let mut seen: HashSet<String> = HashSet::new();
            let mut polls = 0u32;

            info!(
                query = %self.config.query,
                duration_secs = self.config.duration.as_secs(),
                "Starting Twitter recent-search polling"
            );

            while Instant::now() < deadline {
                polls += 1;

                let result = match timeout_at(deadline, self.search()).await {
                    Ok(result) => result,
                    Err(_) => break,
                };

                let wait = match result {
                    Ok(response) => {
                        let mut new_posts = 0usize;
                        for tweet in response.data {
                            if !seen.insert(tweet.id.clone()) {
                                continue;
                            }
                            new_posts += 1;
                            yield Ok(tweet.into_raw_post());
                        }
                        debug!(poll = polls, new_posts = new_posts, "Twitter poll complete");
                        self.config.poll_interval
                    }
                    Err(SourceError::RateLimited { retry_after, .. }) => {
                        let cooldown = retry_after.unwrap_or(self.config.rate_limit_cooldown);
                        warn!(cooldown_secs = cooldown.as_secs(), "Twitter rate limit hit, cooling down");
                        cooldown
                    }
                    Err(e @ SourceError::Transient { .. }) => {
                        warn!(error = %e, "Twitter poll failed, will try again");
                        self.config.poll_interval
                    }
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };

                sleep_until((Instant::now() + wait).min(deadline)).await;
            }

            info!(polls = polls, posts = seen.len(), "Twitter polling finished");
        })
    }
}

// --- API types ---

#[derive(Deserialize)]
struct SearchResponse {
    // Absent when a poll matches nothing
    #[serde(default)]
    data: Vec<Tweet>,
}

#[derive(Debug, Deserialize)]
pub struct Tweet {
    pub id: String,
    pub text: String,
    pub created_at: Option<DateTime<Utc>>,
    pub public_metrics: Option<PublicMetrics>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PublicMetrics {
    #[serde(default)]
    pub like_count: i64,
    #[serde(default)]
    pub reply_count: i64,
}

impl Tweet {
    pub fn into_raw_post(self) -> RawPost {
        let metrics = self.public_metrics.unwrap_or_default();
        RawPost {
            id: format!("{ID_PREFIX}{}", self.id),
            url: format!("https://twitter.com/i/web/status/{}", self.id),
            title: Some(self.text),
            body: None,
            score: metrics.like_count,
            comment_count: metrics.reply_count,
            community: COMMUNITY.to_string(),
            captured_at: self.created_at.unwrap_or_else(Utc::now),
            platform: Platform::Twitter,
        }
    }
}
