use crate::domain::model::{RawGrid, Source};
use crate::domain::ports::TabularProvider;
use crate::utils::error::SourceFetchError;

/// Retrieves one grid per source. Either the full grid comes back or an error
/// attributed to the source; nothing partial.
pub struct SourceFetcher<P: TabularProvider> {
    provider: P,
}

impl<P: TabularProvider> SourceFetcher<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub async fn fetch(&self, source: &Source) -> Result<RawGrid, SourceFetchError> {
        let range = source.range();
        tracing::debug!(
            "📡 Fetching source {} ({} / {})",
            source.id,
            source.spreadsheet_id,
            range
        );

        self.provider
            .get_grid(source.spreadsheet_id.trim(), &range)
            .await
            .map_err(|e| SourceFetchError {
                source_id: source.id.clone(),
                detail: e.to_string(),
            })
    }
}
