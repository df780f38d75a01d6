use crate::core::cache::RosterBuilder;
use crate::core::fetcher::SourceFetcher;
use crate::core::parser;
use crate::domain::model::{Roster, Source, SourceStatus, StudentRecord};
use crate::domain::ports::{SourceRegistry, TabularProvider};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use std::collections::HashMap;

/// Fetches and parses every source, merging the results into one roster.
pub struct RosterAggregator<P: TabularProvider> {
    fetcher: SourceFetcher<P>,
}

impl<P: TabularProvider> RosterAggregator<P> {
    pub fn new(provider: P) -> Self {
        Self {
            fetcher: SourceFetcher::new(provider),
        }
    }

    /// Sources are processed concurrently but merged in iteration order, so a
    /// later source shadows an earlier one on duplicate roll numbers. A failing
    /// source contributes an `error` status and no records.
    pub async fn aggregate(&self, sources: &[Source]) -> Roster {
        let usable: Vec<&Source> = sources.iter().filter(|s| s.is_usable()).collect();
        let skipped = sources.len() - usable.len();
        if skipped > 0 {
            tracing::debug!("⏭️ Skipping {} source(s) without a spreadsheet id", skipped);
        }

        tracing::info!("📥 Fetching data from {} source(s)...", usable.len());
        let outcomes = join_all(usable.iter().map(|s| self.load_source(s))).await;

        let mut students: Vec<StudentRecord> = Vec::new();
        let mut source_status = HashMap::with_capacity(outcomes.len());
        for (source, (status, records)) in usable.iter().zip(outcomes) {
            source_status.insert(source.id.clone(), status);
            students.extend(records);
        }

        Roster {
            students,
            built_at: Utc::now(),
            source_status,
        }
    }

    async fn load_source(&self, source: &Source) -> (SourceStatus, Vec<StudentRecord>) {
        match self.fetcher.fetch(source).await {
            Ok(grid) => {
                let records = parser::parse(&grid, source.label());
                tracing::debug!("✅ {}: {} student(s)", source.label(), records.len());
                let status = SourceStatus::Connected {
                    count: records.len(),
                    timestamp: Utc::now(),
                };
                (status, records)
            }
            Err(e) => {
                tracing::warn!("⚠️ Error fetching source {}: {}", source.label(), e.detail);
                let status = SourceStatus::Error {
                    error: e.detail,
                    timestamp: Utc::now(),
                };
                (status, Vec::new())
            }
        }
    }
}

/// Builds rosters from whatever the registry lists at build time.
pub struct RosterPipeline<R: SourceRegistry, P: TabularProvider> {
    registry: R,
    aggregator: RosterAggregator<P>,
}

impl<R: SourceRegistry, P: TabularProvider> RosterPipeline<R, P> {
    pub fn new(registry: R, provider: P) -> Self {
        Self {
            registry,
            aggregator: RosterAggregator::new(provider),
        }
    }
}

#[async_trait]
impl<R: SourceRegistry, P: TabularProvider> RosterBuilder for RosterPipeline<R, P> {
    async fn build(&self) -> Result<Roster> {
        let sources = self.registry.list_sources().await?;
        Ok(self.aggregator.aggregate(&sources).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_store::MemoryStore;
    use crate::domain::model::RawGrid;
    use crate::utils::error::ProviderError;
    use std::sync::Mutex;

    /// Serves canned grids by spreadsheet id; unknown ids fail.
    struct CannedProvider {
        grids: HashMap<String, RawGrid>,
        calls: Mutex<Vec<String>>,
    }

    impl CannedProvider {
        fn new(grids: &[(&str, &[&[&str]])]) -> Self {
            Self {
                grids: grids
                    .iter()
                    .map(|(id, rows)| {
                        let grid = rows
                            .iter()
                            .map(|r| r.iter().map(|c| c.to_string()).collect())
                            .collect();
                        (id.to_string(), grid)
                    })
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TabularProvider for CannedProvider {
        async fn get_grid(
            &self,
            spreadsheet_id: &str,
            _range: &str,
        ) -> std::result::Result<RawGrid, ProviderError> {
            self.calls.lock().unwrap().push(spreadsheet_id.to_string());
            self.grids
                .get(spreadsheet_id)
                .cloned()
                .ok_or_else(|| ProviderError::Status {
                    status: 403,
                    message: "The caller does not have permission".to_string(),
                })
        }
    }

    fn source(id: &str, spreadsheet_id: &str) -> Source {
        Source {
            id: id.to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
            tab: "Sheet1".to_string(),
            description: Some(format!("Label {}", id)),
            owner_id: "admin".to_string(),
        }
    }

    fn three_sheet_provider() -> CannedProvider {
        CannedProvider::new(&[
            (
                "sheet-a",
                &[&["Roll", "Name", "Math"], &["CS001", "Alice", "85"]],
            ),
            (
                "sheet-c",
                &[
                    &["Roll", "Name", "Math"],
                    &["CS002", "Bob", "70"],
                    &["cs-001", "Alice B", "90"],
                ],
            ),
        ])
    }

    #[tokio::test]
    async fn test_failing_source_is_isolated() {
        let aggregator = RosterAggregator::new(three_sheet_provider());
        let sources = vec![
            source("a", "sheet-a"),
            source("b", "sheet-missing"),
            source("c", "sheet-c"),
        ];

        let roster = aggregator.aggregate(&sources).await;

        assert_eq!(roster.students.len(), 3);
        assert_eq!(roster.source_status.len(), 3);
        let errors: Vec<_> = roster
            .source_status
            .values()
            .filter(|s| !s.is_connected())
            .collect();
        assert_eq!(errors.len(), 1);
        match roster.status_of("b").unwrap() {
            SourceStatus::Error { error, .. } => assert!(error.contains("403")),
            other => panic!("expected error status, got {:?}", other),
        }
        match roster.status_of("c").unwrap() {
            SourceStatus::Connected { count, .. } => assert_eq!(*count, 2),
            other => panic!("expected connected status, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_merge_keeps_source_order_and_last_seen_wins() {
        let aggregator = RosterAggregator::new(three_sheet_provider());
        let sources = vec![source("a", "sheet-a"), source("c", "sheet-c")];

        let roster = aggregator.aggregate(&sources).await;

        assert_eq!(roster.students[0].source_label, "Label a");
        let alice = roster.find("CS001").unwrap();
        assert_eq!(alice.name, "Alice B");
        assert_eq!(alice.source_label, "Label c");
    }

    #[tokio::test]
    async fn test_unusable_source_is_skipped_silently() {
        let provider = three_sheet_provider();
        let aggregator = RosterAggregator::new(provider);
        let sources = vec![source("blank", "  "), source("a", "sheet-a")];

        let roster = aggregator.aggregate(&sources).await;

        assert_eq!(roster.students.len(), 1);
        assert!(roster.status_of("blank").is_none());
        let calls = aggregator.fetcher_calls();
        assert_eq!(calls, vec!["sheet-a".to_string()]);
    }

    #[tokio::test]
    async fn test_pipeline_reads_registry_at_build_time() {
        let registry = MemoryStore::new();
        let pipeline = RosterPipeline::new(registry.clone(), three_sheet_provider());

        let empty = pipeline.build().await.unwrap();
        assert!(empty.students.is_empty());
        assert!(empty.source_status.is_empty());

        registry.add_source(source("a", "sheet-a")).await.unwrap();
        let roster = pipeline.build().await.unwrap();
        assert_eq!(roster.students.len(), 1);
        assert!(roster.status_of("a").unwrap().is_connected());
    }

    impl RosterAggregator<CannedProvider> {
        fn fetcher_calls(&self) -> Vec<String> {
            self.fetcher.provider().calls.lock().unwrap().clone()
        }
    }
}
