// Scrape stage: run every enabled connector concurrently into the raw store.
//
// Each connector gets its own tokio task that drains its stream and upserts
// every post. A connector that gives up (or panics) only ends its own task;
// siblings keep going and the stage still succeeds. A failing store is
// different: that's a stage failure, so the remaining tasks are aborted.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use futures::StreamExt;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::db::Database;
use crate::sources::Connector;

/// What one connector did during a scrape.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectorStats {
    pub name: String,
    /// Posts the connector produced.
    pub emitted: usize,
    /// Posts that were new to the raw store.
    pub inserted: usize,
    /// Posts whose id was already stored (first writer kept).
    pub duplicates: usize,
    /// Why the connector stopped early, if it did.
    pub error: Option<String>,
}

/// Drain one connector into the store. A store error is returned as `Err`;
/// a connector error is recorded in the stats.
async fn drain(connector: Arc<dyn Connector>, db: Arc<dyn Database>) -> Result<ConnectorStats> {
    let name = connector.name();
    let mut stats = ConnectorStats {
        name: name.to_string(),
        ..Default::default()
    };

    info!(connector = name, "Connector started");
    let mut stream = connector.posts();

    while let Some(item) = stream.next().await {
        match item {
            Ok(post) => {
                stats.emitted += 1;
                if db.upsert_raw_post(&post).await? {
                    stats.inserted += 1;
                } else {
                    stats.duplicates += 1;
                    debug!(connector = name, id = %post.id, "Duplicate id absorbed");
                }
            }
            Err(e) => {
                warn!(connector = name, error = %e, "Connector stopped early");
                stats.error = Some(e.to_string());
                break;
            }
        }
    }

    info!(
        connector = name,
        emitted = stats.emitted,
        inserted = stats.inserted,
        duplicates = stats.duplicates,
        "Connector finished"
    );
    Ok(stats)
}

/// Run all connectors to completion. Stats come back in connector order.
pub async fn run(
    db: Arc<dyn Database>,
    connectors: &[Arc<dyn Connector>],
) -> Result<Vec<ConnectorStats>> {
    let mut tasks = JoinSet::new();
    let mut slots = HashMap::new();

    for (index, connector) in connectors.iter().enumerate() {
        let handle = tasks.spawn(drain(Arc::clone(connector), Arc::clone(&db)));
        slots.insert(handle.id(), index);
    }

    let mut results: Vec<ConnectorStats> = connectors
        .iter()
        .map(|c| ConnectorStats {
            name: c.name().to_string(),
            ..Default::default()
        })
        .collect();

    while let Some(joined) = tasks.join_next_with_id().await {
        match joined {
            Ok((id, Ok(stats))) => {
                if let Some(&index) = slots.get(&id) {
                    results[index] = stats;
                }
            }
            Ok((id, Err(e))) => {
                let name = slots.get(&id).map(|&i| results[i].name.clone()).unwrap_or_default();
                error!(connector = %name, error = %e, "Raw store write failed, aborting scrape");
                tasks.abort_all();
                return Err(e.context(format!("Failed to store posts from {name}")));
            }
            Err(join_error) => {
                let Some(&index) = slots.get(&join_error.id()) else {
                    continue;
                };
                if join_error.is_panic() {
                    error!(connector = %results[index].name, "Connector task panicked");
                    results[index].error = Some("connector panicked".to_string());
                } else {
                    results[index].error = Some(anyhow!(join_error).to_string());
                }
            }
        }
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::db::models::{Platform, RawPost};
    use crate::error::SourceError;
    use crate::sources::PostStream;

    /// Emits a fixed list of ids, optionally followed by an error.
    struct FixedConnector {
        name: &'static str,
        ids: Vec<&'static str>,
        fail_after: bool,
    }

    impl Connector for FixedConnector {
        fn name(&self) -> &'static str {
            self.name
        }

        fn platform(&self) -> Platform {
            Platform::Reddit
        }

        fn posts(&self) -> PostStream<'_> {
            let mut items: Vec<Result<RawPost, SourceError>> = self
                .ids
                .iter()
                .map(|id| {
                    Ok(RawPost {
                        id: id.to_string(),
                        title: Some(format!("{} says {id}", self.name)),
                        body: None,
                        url: String::new(),
                        score: 0,
                        comment_count: 0,
                        community: self.name.to_string(),
                        captured_at: Utc::now(),
                        platform: Platform::Reddit,
                    })
                })
                .collect();
            if self.fail_after {
                items.push(Err(SourceError::Fatal {
                    source_name: self.name,
                    message: "401 Unauthorized".into(),
                }));
            }
            futures::stream::iter(items).boxed()
        }
    }

    struct PanickingConnector;

    impl Connector for PanickingConnector {
        fn name(&self) -> &'static str {
            "panics"
        }

        fn platform(&self) -> Platform {
            Platform::Quora
        }

        fn posts(&self) -> PostStream<'_> {
            Box::pin(async_stream::stream! {
                if true {
                    panic!("browser exploded");
                }
                yield Err(SourceError::Fatal { source_name: "panics", message: String::new() });
            })
        }
    }

    #[tokio::test]
    async fn test_overlapping_connectors_store_union() {
        let db = crate::db::in_memory().unwrap();
        let connectors: Vec<Arc<dyn Connector>> = vec![
            Arc::new(FixedConnector {
                name: "first",
                ids: vec!["a", "b", "c"],
                fail_after: false,
            }),
            Arc::new(FixedConnector {
                name: "second",
                ids: vec!["b", "c", "d"],
                fail_after: false,
            }),
        ];

        let stats = run(Arc::clone(&db), &connectors).await.unwrap();

        assert_eq!(db.table_counts().await.unwrap().raw, 4);
        let total_inserted: usize = stats.iter().map(|s| s.inserted).sum();
        let total_duplicates: usize = stats.iter().map(|s| s.duplicates).sum();
        assert_eq!(total_inserted, 4);
        assert_eq!(total_duplicates, 2);
        assert_eq!(stats[0].name, "first");
        assert_eq!(stats[1].name, "second");
    }

    #[tokio::test]
    async fn test_failing_connector_does_not_stop_siblings() {
        let db = crate::db::in_memory().unwrap();
        let connectors: Vec<Arc<dyn Connector>> = vec![
            Arc::new(FixedConnector {
                name: "broken",
                ids: vec!["x"],
                fail_after: true,
            }),
            Arc::new(PanickingConnector),
            Arc::new(FixedConnector {
                name: "healthy",
                ids: vec!["y", "z"],
                fail_after: false,
            }),
        ];

        let stats = run(Arc::clone(&db), &connectors).await.unwrap();

        assert_eq!(stats[0].inserted, 1);
        assert!(stats[0].error.as_deref().unwrap().contains("401"));
        assert_eq!(stats[1].error.as_deref(), Some("connector panicked"));
        assert_eq!(stats[2].inserted, 2);
        assert!(stats[2].error.is_none());
        assert_eq!(db.table_counts().await.unwrap().raw, 3);
    }

    #[tokio::test]
    async fn test_no_connectors() {
        let db = crate::db::in_memory().unwrap();
        let stats = run(db, &[]).await.unwrap();
        assert!(stats.is_empty());
    }
}
