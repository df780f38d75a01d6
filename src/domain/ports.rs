use crate::domain::model::{Account, RawGrid, SessionClaims, Source};
use crate::utils::error::{ProviderError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// External spreadsheet-like data provider.
#[async_trait]
pub trait TabularProvider: Send + Sync {
    async fn get_grid(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> std::result::Result<RawGrid, ProviderError>;
}

/// Admin-owned list of configured sources.
#[async_trait]
pub trait SourceRegistry: Send + Sync {
    async fn list_sources(&self) -> Result<Vec<Source>>;
    async fn get_source(&self, id: &str) -> Result<Option<Source>>;
    async fn add_source(&self, source: Source) -> Result<()>;
    /// Returns whether a source with this id existed.
    async fn remove_source(&self, id: &str) -> Result<bool>;
}

/// Registered student accounts keyed by normalized roll number.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_account(&self, normalized_roll_no: &str) -> Result<Option<Account>>;
    /// Inserts, or replaces the account with the same normalized roll number.
    async fn upsert_account(&self, account: Account) -> Result<()>;
}

pub trait PasswordHasher: Send + Sync {
    fn hash(&self, plaintext: &str) -> Result<String>;
    fn matches(&self, plaintext: &str, hash: &str) -> bool;
}

pub trait TokenIssuer: Send + Sync {
    fn issue(&self, claims: &SessionClaims) -> Result<String>;
    fn verify(&self, token: &str) -> Result<SessionClaims>;
}

#[async_trait]
impl<T: TabularProvider + ?Sized> TabularProvider for Arc<T> {
    async fn get_grid(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> std::result::Result<RawGrid, ProviderError> {
        (**self).get_grid(spreadsheet_id, range).await
    }
}

#[async_trait]
impl<T: SourceRegistry + ?Sized> SourceRegistry for Arc<T> {
    async fn list_sources(&self) -> Result<Vec<Source>> {
        (**self).list_sources().await
    }

    async fn get_source(&self, id: &str) -> Result<Option<Source>> {
        (**self).get_source(id).await
    }

    async fn add_source(&self, source: Source) -> Result<()> {
        (**self).add_source(source).await
    }

    async fn remove_source(&self, id: &str) -> Result<bool> {
        (**self).remove_source(id).await
    }
}

#[async_trait]
impl<T: AccountStore + ?Sized> AccountStore for Arc<T> {
    async fn find_account(&self, normalized_roll_no: &str) -> Result<Option<Account>> {
        (**self).find_account(normalized_roll_no).await
    }

    async fn upsert_account(&self, account: Account) -> Result<()> {
        (**self).upsert_account(account).await
    }
}
