use crate::domain::model::{Account, Source};
use crate::domain::ports::{AccountStore, SourceRegistry};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Process-local document store. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    accounts: Arc<RwLock<HashMap<String, Account>>>,
    sources: Arc<RwLock<Vec<Source>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn find_account(&self, normalized_roll_no: &str) -> Result<Option<Account>> {
        Ok(self.accounts.read().await.get(normalized_roll_no).cloned())
    }

    async fn upsert_account(&self, account: Account) -> Result<()> {
        self.accounts
            .write()
            .await
            .insert(account.normalized_roll_no.clone(), account);
        Ok(())
    }
}

#[async_trait]
impl SourceRegistry for MemoryStore {
    async fn list_sources(&self) -> Result<Vec<Source>> {
        Ok(self.sources.read().await.clone())
    }

    async fn get_source(&self, id: &str) -> Result<Option<Source>> {
        Ok(self.sources.read().await.iter().find(|s| s.id == id).cloned())
    }

    async fn add_source(&self, source: Source) -> Result<()> {
        self.sources.write().await.push(source);
        Ok(())
    }

    async fn remove_source(&self, id: &str) -> Result<bool> {
        let mut sources = self.sources.write().await;
        let before = sources.len();
        sources.retain(|s| s.id != id);
        Ok(sources.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn source(id: &str, spreadsheet_id: &str, tab: &str) -> Source {
        Source {
            id: id.to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
            tab: tab.to_string(),
            description: None,
            owner_id: "admin-1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_sources_sharing_a_sheet_are_kept_apart() {
        let store = MemoryStore::new();
        store.add_source(source("s1", "g-1", "Tab1")).await.unwrap();
        store.add_source(source("s2", "g-2", "Tab1")).await.unwrap();
        store.add_source(source("s3", "g-1", "Tab2")).await.unwrap();

        assert_eq!(store.list_sources().await.unwrap().len(), 3);
        assert!(store.remove_source("s1").await.unwrap());
        assert!(!store.remove_source("s1").await.unwrap());
        assert_eq!(
            store.get_source("s3").await.unwrap().map(|s| s.tab),
            Some("Tab2".to_string())
        );
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_normalized_roll() {
        let store = MemoryStore::new();
        let mut account = Account {
            normalized_roll_no: "CS001".to_string(),
            roll_no: "CS-001".to_string(),
            name: "Alice".to_string(),
            email: "alice@x.edu".to_string(),
            password_hash: None,
            registered_at: Utc::now(),
        };
        store.upsert_account(account.clone()).await.unwrap();
        account.password_hash = Some("hash".to_string());
        store.upsert_account(account).await.unwrap();

        let stored = store.find_account("CS001").await.unwrap().unwrap();
        assert_eq!(stored.password_hash.as_deref(), Some("hash"));
        assert!(store.find_account("CS002").await.unwrap().is_none());
    }
}
