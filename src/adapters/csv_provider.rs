use crate::domain::model::RawGrid;
use crate::domain::ports::TabularProvider;
use crate::utils::error::ProviderError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Serves sheets exported as CSV files from a local directory.
///
/// A spreadsheet id maps to `<dir>/<id>/<tab>.csv` when that file exists,
/// otherwise to `<dir>/<id>.csv`. The cell range part of the selector is
/// ignored; the whole file is returned.
#[derive(Debug, Clone)]
pub struct CsvDirectoryProvider {
    base_path: PathBuf,
}

impl CsvDirectoryProvider {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn resolve(&self, spreadsheet_id: &str, range: &str) -> Result<PathBuf, ProviderError> {
        // 防止 id 跳出資料夾
        if spreadsheet_id.contains(['/', '\\']) || spreadsheet_id.contains("..") {
            return Err(ProviderError::NotFound {
                spreadsheet_id: spreadsheet_id.to_string(),
            });
        }

        let tab = range.split('!').next().unwrap_or_default().trim();
        if !tab.is_empty() && !tab.contains(['/', '\\']) && !tab.contains("..") {
            let per_tab = self.base_path.join(spreadsheet_id).join(format!("{}.csv", tab));
            if per_tab.is_file() {
                return Ok(per_tab);
            }
        }

        let whole = self.base_path.join(format!("{}.csv", spreadsheet_id));
        if whole.is_file() {
            return Ok(whole);
        }
        Err(ProviderError::NotFound {
            spreadsheet_id: spreadsheet_id.to_string(),
        })
    }
}

fn read_grid(path: &Path) -> Result<RawGrid, ProviderError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut grid = Vec::new();
    for record in reader.records() {
        let record = record?;
        grid.push(record.iter().map(str::to_string).collect());
    }
    Ok(grid)
}

#[async_trait]
impl TabularProvider for CsvDirectoryProvider {
    async fn get_grid(&self, spreadsheet_id: &str, range: &str) -> Result<RawGrid, ProviderError> {
        let path = self.resolve(spreadsheet_id, range)?;
        tracing::debug!("Reading CSV sheet from {}", path.display());
        tokio::task::spawn_blocking(move || read_grid(&path))
            .await
            .map_err(|e| ProviderError::Decode {
                message: format!("CSV reader task failed: {}", e),
            })?
    }
}
