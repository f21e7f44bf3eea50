// Labeling stage: prompt the completion API for every cleaned post and
// store the binary judgment.
//
// Every cleaned post is sent on every run, including ones already labelled;
// a successful parse overwrites the stored label. A completion that isn't
// exactly "0" or "1" (after trimming), or a failed call, writes nothing.
// Failed calls are not retried.
//
// Calls are issued by a bounded pool (`buffer_unordered`) and every call
// first takes a slot from the shared rate limiter. Results are written as
// they arrive, so an interrupted run keeps what it already labelled.

use anyhow::Result;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use super::prompt::build_prompt;
use super::rate_limiter::RateLimiter;
use super::traits::CompletionClient;
use crate::db::models::{CleanedPost, Label};
use crate::db::Database;
use crate::error::ParseError;
use crate::output::{terminal, truncate_chars};

/// Counts for one labeling run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelStats {
    /// Cleaned posts sent to the classifier.
    pub total: usize,
    pub cyberhate: usize,
    pub neutral: usize,
    /// Completions that were neither "0" nor "1".
    pub indeterminate: usize,
    /// Calls that errored (network, HTTP status, empty response).
    pub failed: usize,
}

impl LabelStats {
    pub fn labelled(&self) -> usize {
        self.cyberhate + self.neutral
    }

    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Labelled(Label::Cyberhate) => self.cyberhate += 1,
            Outcome::Labelled(Label::Neutral) => self.neutral += 1,
            Outcome::Indeterminate(_) => self.indeterminate += 1,
            Outcome::Failed(_) => self.failed += 1,
        }
    }
}

/// What happened to one post.
#[derive(Debug)]
pub enum Outcome {
    Labelled(Label),
    Indeterminate(ParseError),
    Failed(anyhow::Error),
}

/// Accept only the literal completions "0" and "1", ignoring surrounding
/// whitespace. "1.", "Label: 1" or "I think it's 1" are all rejected.
pub fn parse_label(raw: &str) -> Result<Label, ParseError> {
    match raw.trim() {
        "0" => Ok(Label::Neutral),
        "1" => Ok(Label::Cyberhate),
        _ => Err(ParseError {
            raw: raw.to_string(),
        }),
    }
}

/// Classify one title: wait for a rate-limit slot, prompt, parse.
pub async fn classify_title(
    client: &dyn CompletionClient,
    limiter: &RateLimiter,
    title: &str,
) -> Outcome {
    limiter.acquire().await;

    match client.complete(&build_prompt(title)).await {
        Ok(completion) => match parse_label(&completion) {
            Ok(label) => Outcome::Labelled(label),
            Err(e) => Outcome::Indeterminate(e),
        },
        Err(e) => Outcome::Failed(e),
    }
}

/// Run the labeling stage over the whole cleaned table.
///
/// Returns an error only if the store fails; classification problems are
/// counted in the returned stats.
pub async fn run(
    db: &dyn Database,
    client: &dyn CompletionClient,
    limiter: &RateLimiter,
    concurrency: usize,
) -> Result<LabelStats> {
    let posts = db.cleaned_posts().await?;
    let mut stats = LabelStats {
        total: posts.len(),
        ..Default::default()
    };

    if posts.is_empty() {
        info!("No cleaned posts to label");
        return Ok(stats);
    }

    let concurrency = concurrency.max(1);
    info!(posts = posts.len(), concurrency = concurrency, "Labeling cleaned posts");

    let pb = terminal::progress_bar(posts.len() as u64, "Labeling");

    let mut results = stream::iter(posts.into_iter().map(|post: CleanedPost| async move {
        let outcome = classify_title(client, limiter, &post.cleaned_title).await;
        (post, outcome)
    }))
    .buffer_unordered(concurrency);

    while let Some((post, outcome)) = results.next().await {
        match &outcome {
            Outcome::Labelled(label) => {
                db.upsert_label(&post.id, &post.cleaned_title, *label).await?;
                debug!(id = %post.id, label = label.as_i64(), "Labelled post");
            }
            Outcome::Indeterminate(e) => {
                debug!(
                    id = %post.id,
                    response = %truncate_chars(&e.raw, 60),
                    "Indeterminate classification, leaving unlabelled"
                );
            }
            Outcome::Failed(e) => {
                warn!(
                    id = %post.id,
                    title = %truncate_chars(&post.cleaned_title, 60),
                    error = %e,
                    "Classification call failed, leaving unlabelled"
                );
            }
        }
        stats.record(&outcome);
        pb.inc(1);
    }
    pb.finish_and_clear();

    info!(
        total = stats.total,
        cyberhate = stats.cyberhate,
        neutral = stats.neutral,
        indeterminate = stats.indeterminate,
        failed = stats.failed,
        "Labeling complete"
    );

    Ok(stats)
}
