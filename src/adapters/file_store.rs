use crate::domain::model::{Account, Source};
use crate::domain::ports::{AccountStore, SourceRegistry};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

const REGISTRATIONS_FILE: &str = "registrations.json";
const SOURCES_FILE: &str = "sources.json";

/// Accounts and sources kept as pretty-printed JSON arrays under one directory.
/// Files are created on first write; a missing file reads as empty.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    base_path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl JsonFileStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    async fn read_json<T: DeserializeOwned>(&self, file: &str) -> Result<Vec<T>> {
        let full_path = self.base_path.join(file);
        match tokio::fs::read(&full_path).await {
            Ok(data) if data.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_json<T: Serialize>(&self, file: &str, items: &[T]) -> Result<()> {
        let full_path = self.base_path.join(file);
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let data = serde_json::to_vec_pretty(items)?;
        // 先寫暫存檔再改名，避免讀到寫一半的檔案
        let tmp_path = full_path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, data).await?;
        tokio::fs::rename(&tmp_path, &full_path).await?;
        tracing::debug!("💾 Wrote {} item(s) to {}", items.len(), full_path.display());
        Ok(())
    }
}

#[async_trait]
impl AccountStore for JsonFileStore {
    async fn find_account(&self, normalized_roll_no: &str) -> Result<Option<Account>> {
        let accounts: Vec<Account> = self.read_json(REGISTRATIONS_FILE).await?;
        Ok(accounts
            .into_iter()
            .find(|a| a.normalized_roll_no == normalized_roll_no))
    }

    async fn upsert_account(&self, account: Account) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut accounts: Vec<Account> = self.read_json(REGISTRATIONS_FILE).await?;
        match accounts
            .iter_mut()
            .find(|a| a.normalized_roll_no == account.normalized_roll_no)
        {
            Some(existing) => *existing = account,
            None => accounts.push(account),
        }
        self.write_json(REGISTRATIONS_FILE, &accounts).await
    }
}

#[async_trait]
impl SourceRegistry for JsonFileStore {
    async fn list_sources(&self) -> Result<Vec<Source>> {
        self.read_json(SOURCES_FILE).await
    }

    async fn get_source(&self, id: &str) -> Result<Option<Source>> {
        let sources: Vec<Source> = self.read_json(SOURCES_FILE).await?;
        Ok(sources.into_iter().find(|s| s.id == id))
    }

    async fn add_source(&self, source: Source) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut sources: Vec<Source> = self.read_json(SOURCES_FILE).await?;
        sources.push(source);
        self.write_json(SOURCES_FILE, &sources).await
    }

    async fn remove_source(&self, id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut sources: Vec<Source> = self.read_json(SOURCES_FILE).await?;
        let before = sources.len();
        sources.retain(|s| s.id != id);
        if sources.len() == before {
            return Ok(false);
        }
        self.write_json(SOURCES_FILE, &sources).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn account(roll: &str, hash: Option<&str>) -> Account {
        Account {
            normalized_roll_no: roll.to_string(),
            roll_no: roll.to_string(),
            name: "Student".to_string(),
            email: format!("{}@x.edu", roll.to_lowercase()),
            password_hash: hash.map(str::to_string),
            registered_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_missing_files_read_as_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp_dir.path().join("data"));

        assert!(store.list_sources().await.unwrap().is_empty());
        assert!(store.find_account("CS001").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_accounts_persist_across_instances() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp_dir.path());
        store.upsert_account(account("CS001", None)).await.unwrap();
        store.upsert_account(account("CS002", Some("h2"))).await.unwrap();
        store.upsert_account(account("CS001", Some("h1"))).await.unwrap();

        let reopened = JsonFileStore::new(temp_dir.path());
        let alice = reopened.find_account("CS001").await.unwrap().unwrap();
        assert_eq!(alice.password_hash.as_deref(), Some("h1"));

        let raw = std::fs::read_to_string(temp_dir.path().join(REGISTRATIONS_FILE)).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 2);
        assert_eq!(json[0]["normalizedRollNo"], "CS001");
        assert_eq!(json[0]["password"], "h1");
    }

    #[tokio::test]
    async fn test_source_crud() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp_dir.path());
        for (id, sheet) in [("s1", "g-1"), ("s2", "g-2")] {
            store
                .add_source(Source {
                    id: id.to_string(),
                    spreadsheet_id: sheet.to_string(),
                    tab: "Tab1".to_string(),
                    description: None,
                    owner_id: "admin".to_string(),
                })
                .await
                .unwrap();
        }

        assert!(store.remove_source("s1").await.unwrap());
        assert!(!store.remove_source("missing").await.unwrap());

        let sources = store.list_sources().await.unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].id, "s2");
        assert!(store.get_source("s2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_legacy_registration_without_password_field() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join(REGISTRATIONS_FILE),
            r#"[{"normalizedRollNo":"CS001","rollNo":"CS-001","name":"Alice",
                "email":"alice@x.edu","registeredAt":"2024-01-05T10:00:00Z"}]"#,
        )
        .unwrap();

        let store = JsonFileStore::new(temp_dir.path());
        let legacy = store.find_account("CS001").await.unwrap().unwrap();
        assert_eq!(legacy.password_hash, None);
    }

    #[tokio::test]
    async fn test_sources_without_owner_still_load() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join(SOURCES_FILE),
            r#"[{"id":"s1","spreadsheetId":"g-1","tab":"Tab1"},
                {"id":"s2","spreadsheetId":"g-2","tab":"Tab1","ownerId":"admin"}]"#,
        )
        .unwrap();

        let store = JsonFileStore::new(temp_dir.path());
        let sources = store.list_sources().await.unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].owner_id, "");
        assert_eq!(sources[1].owner_id, "admin");
    }
}
