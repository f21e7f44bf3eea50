// Source connectors: one per external surface.
//
// Each connector turns its surface into a lazy, finite stream of RawPost.
// Per-item problems (a malformed listing entry, a page with no answers) are
// logged and skipped inside the connector. An `Err` in the stream means the
// connector gave up; nothing follows it.

pub mod quora;
pub mod reddit;
pub mod retry;
pub mod twitter;

use futures::stream::BoxStream;

use crate::db::models::{Platform, RawPost};
use crate::error::SourceError;

/// Stream of posts produced by one connector run.
pub type PostStream<'a> = BoxStream<'a, Result<RawPost, SourceError>>;

/// A source of candidate posts.
///
/// Implementations must not emit the same id twice within one call to
/// `posts()`, and must release any exclusive resource (browser session,
/// open connection) when the stream finishes or is dropped.
pub trait Connector: Send + Sync {
    /// Short name used in logs and stats ("reddit", "quora", "twitter").
    fn name(&self) -> &'static str;

    fn platform(&self) -> Platform;

    /// Start collecting. Nothing happens until the stream is polled.
    fn posts(&self) -> PostStream<'_>;
}

/// User agent for HTTP connectors.
pub const USER_AGENT: &str = "hatewatch/0.1 (cyberbullying research pipeline)";

/// Build the shared reqwest client used by HTTP connectors.
pub fn http_client() -> anyhow::Result<reqwest::Client> {
    use anyhow::Context;
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .context("Failed to build HTTP client")
}
