// Reddit feed-API connector.
//
// Authenticates with OAuth client credentials (app-only, read-only), then
// reads each configured subreddit's "hot" listing, paginating with the
// `after` cursor. The listing endpoint returns at most 100 items per page,
// so the per-community limit is reached across several calls.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::retry::{with_retry, Backoff};
use super::{http_client, Connector, PostStream};
use crate::db::models::{Platform, RawPost};
use crate::error::SourceError;

const SOURCE: &str = "reddit";

pub const DEFAULT_AUTH_URL: &str = "https://www.reddit.com/api/v1/access_token";
pub const DEFAULT_API_URL: &str = "https://oauth.reddit.com";

/// Listing endpoint page size cap.
const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub struct RedditConfig {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
    pub communities: Vec<String>,
    /// Max items read from each community's listing.
    pub per_community_limit: usize,
    /// Max posts emitted across all communities in one run.
    pub total_limit: usize,
    pub auth_url: String,
    pub api_url: String,
}

pub struct RedditConnector {
    client: reqwest::Client,
    config: RedditConfig,
    backoff: Backoff,
}

impl RedditConnector {
    pub fn new(config: RedditConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: http_client()?,
            config,
            backoff: Backoff::default(),
        })
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    async fn fetch_token(&self) -> Result<String, SourceError> {
        let response = self
            .client
            .post(&self.config.auth_url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .header(reqwest::header::USER_AGENT, &self.config.user_agent)
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| SourceError::from_reqwest(SOURCE, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::from_status(SOURCE, status, &body));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| SourceError::from_reqwest(SOURCE, e))?;
        Ok(token.access_token)
    }

    async fn fetch_page(
        &self,
        token: &str,
        community: &str,
        limit: usize,
        after: Option<&str>,
    ) -> Result<Listing, SourceError> {
        let url = format!(
            "{}/r/{}/hot",
            self.config.api_url.trim_end_matches('/'),
            community
        );
        let limit = limit.to_string();
        let mut params: Vec<(&str, &str)> = vec![("limit", &limit), ("raw_json", "1")];
        if let Some(after) = after {
            params.push(("after", after));
        }

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .header(reqwest::header::USER_AGENT, &self.config.user_agent)
            .query(&params)
            .send()
            .await
            .map_err(|e| SourceError::from_reqwest(SOURCE, e))?;

        let status = response.status();
        if !status.is_success() {
            let wait = retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(match SourceError::from_status(SOURCE, status, &body) {
                SourceError::RateLimited { source_name, .. } => SourceError::RateLimited {
                    source_name,
                    retry_after: wait,
                },
                other => other,
            });
        }

        response
            .json::<Listing>()
            .await
            .map_err(|e| SourceError::from_reqwest(SOURCE, e))
    }
}

impl Connector for RedditConnector {
    fn name(&self) -> &'static str {
        SOURCE
    }

    fn platform(&self) -> Platform {
        Platform::Reddit
    }

    fn posts(&self) -> PostStream<'_> {
        Box::pin(async_stream::stream! {
            if self.config.total_limit == 0 {
                info!("Reddit record budget is zero, nothing to collect");
                return;
            }

            let token = match with_retry(&self.backoff, || self.fetch_token()).await {
                Ok(token) => token,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            let mut seen: HashSet<String> = HashSet::new();
            let mut emitted = 0usize;

            'communities: for community in &self.config.communities {
                let mut after: Option<String> = None;
                let mut fetched = 0usize;

                while fetched < self.config.per_community_limit {
                    let page_size = (self.config.per_community_limit - fetched).min(MAX_PAGE_SIZE);
                    let page = with_retry(&self.backoff, || {
                        self.fetch_page(&token, community, page_size, after.as_deref())
                    })
                    .await;

                    let listing = match page {
                        Ok(listing) => listing,
                        Err(e) => {
                            warn!(community = %community, error = %e, "Skipping subreddit");
                            continue 'communities;
                        }
                    };

                    if listing.data.children.is_empty() {
                        break;
                    }
                    fetched += listing.data.children.len();

                    for child in listing.data.children {
                        let submission: Submission = match serde_json::from_value(child.data) {
                            Ok(s) => s,
                            Err(e) => {
                                debug!(community = %community, error = %e, "Skipping malformed listing entry");
                                continue;
                            }
                        };

                        if !seen.insert(submission.id.clone()) {
                            continue;
                        }

                        yield Ok(submission.into_raw_post());
                        emitted += 1;

                        if emitted >= self.config.total_limit {
                            info!(limit = self.config.total_limit, "Reached Reddit record budget");
                            break 'communities;
                        }
                    }

                    after = listing.data.after;
                    if after.is_none() {
                        break;
                    }
                }

                debug!(community = %community, fetched = fetched, "Finished subreddit");
            }

            info!(posts = emitted, "Reddit collection finished");
        })
    }
}

/// Parse a Retry-After header given in seconds.
fn retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

// --- Reddit API types ---

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Thing>,
    after: Option<String>,
}

/// A listing entry, kept untyped so one bad entry doesn't fail the page.
#[derive(Deserialize)]
struct Thing {
    data: serde_json::Value,
}

/// The fields of a link submission we keep.
#[derive(Debug, Deserialize)]
pub struct Submission {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub num_comments: i64,
    pub subreddit: String,
    pub created_utc: f64,
}

impl Submission {
    pub fn into_raw_post(self) -> RawPost {
        let captured_at = DateTime::<Utc>::from_timestamp(self.created_utc as i64, 0)
            .unwrap_or_default();
        RawPost {
            id: self.id,
            title: Some(self.title),
            body: (!self.selftext.is_empty()).then_some(self.selftext),
            url: self.url,
            score: self.score,
            comment_count: self.num_comments,
            community: self.subreddit,
            captured_at,
            platform: Platform::Reddit,
        }
    }
}
