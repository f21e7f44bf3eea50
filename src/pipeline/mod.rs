// Pipeline orchestration: scrape, then clean, then label.
//
// Stages run strictly in that order. Each stage is wrapped in the same
// bounded retry policy; configuration errors are never retried. A stage's
// completion time is recorded in the run_state table so `status` can show
// when each one last succeeded.

pub mod scrape;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::classifier::labeler::{self, LabelStats};
use crate::classifier::rate_limiter::RateLimiter;
use crate::classifier::CompletionClient;
use crate::db::models::format_timestamp;
use crate::db::Database;
use crate::error::StageError;
use crate::quality::{self, QualityReport};
use crate::sources::Connector;

pub use scrape::ConnectorStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Scrape,
    Clean,
    Label,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Scrape, Stage::Clean, Stage::Label];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Scrape => "scrape",
            Stage::Clean => "clean",
            Stage::Label => "label",
        }
    }

    /// run_state key holding the stage's last completion time.
    pub fn state_key(&self) -> String {
        format!("last_{}_at", self.as_str())
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How many times a stage is attempted and how long to wait in between.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            delay: Duration::from_secs(10),
        }
    }
}

/// Run one stage under `policy`, then record its completion time.
pub async fn run_stage<F, Fut, T>(
    db: &dyn Database,
    stage: Stage,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, StageError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StageError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        info!(stage = stage.as_str(), attempt = attempt, "Stage started");

        match operation().await {
            Ok(value) => {
                db.set_run_state(&stage.state_key(), &format_timestamp(&Utc::now()))
                    .await?;
                info!(stage = stage.as_str(), "Stage complete");
                return Ok(value);
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                warn!(
                    stage = stage.as_str(),
                    attempt = attempt,
                    max_attempts = max_attempts,
                    error = %e,
                    "Stage failed, retrying"
                );
                attempt += 1;
                tokio::time::sleep(policy.delay).await;
            }
            Err(e) => {
                error!(stage = stage.as_str(), error = %e, "Stage failed");
                return Err(e);
            }
        }
    }
}

/// Everything the labeling stage needs.
pub struct Labeling {
    pub client: Arc<dyn CompletionClient>,
    pub limiter: RateLimiter,
    pub concurrency: usize,
}

pub async fn scrape_stage(
    db: &Arc<dyn Database>,
    connectors: &[Arc<dyn Connector>],
    policy: &RetryPolicy,
) -> Result<Vec<ConnectorStats>, StageError> {
    run_stage(db.as_ref(), Stage::Scrape, policy, || async {
        scrape::run(Arc::clone(db), connectors)
            .await
            .map_err(StageError::from)
    })
    .await
}

pub async fn clean_stage(
    db: &Arc<dyn Database>,
    policy: &RetryPolicy,
) -> Result<QualityReport, StageError> {
    run_stage(db.as_ref(), Stage::Clean, policy, || quality::run(db.as_ref())).await
}

pub async fn label_stage(
    db: &Arc<dyn Database>,
    labeling: &Labeling,
    policy: &RetryPolicy,
) -> Result<LabelStats, StageError> {
    run_stage(db.as_ref(), Stage::Label, policy, || async {
        labeler::run(
            db.as_ref(),
            labeling.client.as_ref(),
            &labeling.limiter,
            labeling.concurrency,
        )
        .await
        .map_err(StageError::from)
    })
    .await
}

/// Results of a full run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub connectors: Vec<ConnectorStats>,
    pub quality: QualityReport,
    pub labels: LabelStats,
}

/// The full plan: scrape, clean, label. Stops at the first failed stage.
pub async fn run_all(
    db: &Arc<dyn Database>,
    connectors: &[Arc<dyn Connector>],
    labeling: &Labeling,
    policy: &RetryPolicy,
) -> Result<RunSummary, StageError> {
    let connectors = scrape_stage(db, connectors, policy).await?;
    let quality = clean_stage(db, policy).await?;
    let labels = label_stage(db, labeling, policy).await?;

    Ok(RunSummary {
        connectors,
        quality,
        labels,
    })
}
