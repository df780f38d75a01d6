use crate::core::cache::{RosterBuilder, RosterCache};
use crate::core::normalize::normalize;
use crate::core::verifier::{verify_login, verify_registration};
use crate::domain::model::{
    LoginClaim, NewSource, RegistrationClaim, Roster, SessionClaims, Source, SourceStatus,
    StudentRecord,
};
use crate::domain::ports::{AccountStore, PasswordHasher, SourceRegistry, TokenIssuer};
use crate::utils::error::{LoginError, PortalError, RegistrationError, Result};
use crate::utils::validation::{validate_email, validate_non_empty_string, Validate};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

const REQUIRED_FIELDS_MESSAGE: &str = "Roll number, email, and password are required";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredStudent {
    pub roll_no: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginSuccess {
    pub token: String,
    pub roll_no: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub source_count: usize,
    pub cached_students: usize,
    pub roster_built_at: Option<DateTime<Utc>>,
}

/// A source as shown to its owner, with the status from the current roster.
/// `None` means the source has not been processed by any build yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceView {
    #[serde(flatten)]
    pub source: Source,
    pub status: Option<SourceStatus>,
}

impl SourceView {
    pub fn status_label(&self) -> &'static str {
        match &self.status {
            Some(SourceStatus::Connected { .. }) => "connected",
            Some(SourceStatus::Error { .. }) => "error",
            None => "unknown",
        }
    }
}

fn has_blank_field(roll_no: &str, email: &str, password: &str) -> bool {
    roll_no.trim().is_empty() || email.trim().is_empty() || password.is_empty()
}

impl Validate for RegistrationClaim {
    fn validate(&self) -> Result<()> {
        if has_blank_field(&self.roll_no, &self.email, &self.password) {
            return Err(PortalError::ValidationError {
                message: REQUIRED_FIELDS_MESSAGE.to_string(),
            });
        }
        validate_email("email", &self.email)
    }
}

impl Validate for LoginClaim {
    fn validate(&self) -> Result<()> {
        if has_blank_field(&self.roll_no, &self.email, &self.password) {
            return Err(PortalError::ValidationError {
                message: REQUIRED_FIELDS_MESSAGE.to_string(),
            });
        }
        Ok(())
    }
}

fn invalid_request(e: PortalError) -> String {
    match e {
        PortalError::ValidationError { message } => message,
        other => other.to_string(),
    }
}

/// Use cases behind the portal's HTTP endpoints.
pub struct PortalService<B: RosterBuilder> {
    cache: Arc<RosterCache<B>>,
    accounts: Arc<dyn AccountStore>,
    registry: Arc<dyn SourceRegistry>,
}

impl<B: RosterBuilder> PortalService<B> {
    pub fn new(
        cache: Arc<RosterCache<B>>,
        accounts: Arc<dyn AccountStore>,
        registry: Arc<dyn SourceRegistry>,
    ) -> Self {
        Self {
            cache,
            accounts,
            registry,
        }
    }

    pub fn cache(&self) -> &RosterCache<B> {
        &self.cache
    }

    pub async fn roster(&self, force_refresh: bool) -> Arc<Roster> {
        self.cache.get_roster(force_refresh).await
    }

    pub async fn register(
        &self,
        claim: &RegistrationClaim,
        hasher: &dyn PasswordHasher,
    ) -> std::result::Result<RegisteredStudent, RegistrationError> {
        claim
            .validate()
            .map_err(|e| RegistrationError::InvalidRequest {
                message: invalid_request(e),
            })?;

        let roster = self.cache.get_roster(false).await;
        let seed = verify_registration(claim, &roster, self.accounts.as_ref()).await?;

        let password_hash = hasher
            .hash(&claim.password)
            .map_err(|e| RegistrationError::Hashing {
                message: e.to_string(),
            })?;
        let registered = RegisteredStudent {
            roll_no: seed.roll_no.clone(),
            name: seed.name.clone(),
        };
        self.accounts
            .upsert_account(seed.into_account(password_hash, Utc::now()))
            .await
            .map_err(|e| RegistrationError::Storage {
                message: e.to_string(),
            })?;

        tracing::info!("✓ New registration: {}", registered.roll_no);
        Ok(registered)
    }

    pub async fn login(
        &self,
        claim: &LoginClaim,
        hasher: &dyn PasswordHasher,
        tokens: &dyn TokenIssuer,
    ) -> std::result::Result<LoginSuccess, LoginError> {
        claim.validate().map_err(|e| LoginError::InvalidRequest {
            message: invalid_request(e),
        })?;

        let session = verify_login(claim, self.accounts.as_ref(), hasher).await?;
        let token = tokens
            .issue(&session)
            .map_err(|e| LoginError::TokenIssuance {
                message: e.to_string(),
            })?;

        Ok(LoginSuccess {
            token,
            roll_no: session.roll_no,
            name: session.name,
        })
    }

    /// Marks for an authenticated session. Older tokens may lack the
    /// normalized roll number, so it is recomputed when missing.
    pub async fn student_marks(&self, session: &SessionClaims) -> Result<StudentRecord> {
        let key = if session.normalized_roll_no.is_empty() {
            normalize(&session.roll_no)
        } else {
            session.normalized_roll_no.clone()
        };
        self.marks_by_key(&key).await
    }

    pub async fn marks_for_roll(&self, roll_no: &str) -> Result<StudentRecord> {
        self.marks_by_key(&normalize(roll_no)).await
    }

    async fn marks_by_key(&self, normalized_roll_no: &str) -> Result<StudentRecord> {
        let roster = self.cache.get_roster(false).await;
        roster
            .find(normalized_roll_no)
            .cloned()
            .ok_or_else(|| PortalError::NotFound {
                what: "Student data".to_string(),
            })
    }

    pub async fn check_registration(&self, roll_no: &str) -> Result<bool> {
        validate_non_empty_string("Roll number", roll_no)?;
        let normalized = normalize(roll_no);
        if normalized.is_empty() {
            return Ok(false);
        }
        Ok(self.accounts.find_account(&normalized).await?.is_some())
    }

    pub async fn health(&self) -> Result<Health> {
        let source_count = self.registry.list_sources().await?.len();
        let roster = self.cache.peek().await;
        Ok(Health {
            source_count,
            cached_students: roster.as_ref().map(|r| r.students.len()).unwrap_or(0),
            roster_built_at: roster.map(|r| r.built_at),
        })
    }

    pub async fn sources_for_owner(&self, owner_id: &str) -> Result<Vec<SourceView>> {
        let roster = self.cache.peek().await;
        let sources = self.registry.list_sources().await?;
        Ok(sources
            .into_iter()
            .filter(|s| s.owner_id == owner_id)
            .map(|source| {
                let status = roster
                    .as_ref()
                    .and_then(|r| r.status_of(&source.id))
                    .cloned();
                SourceView { source, status }
            })
            .collect())
    }

    pub async fn add_source(&self, owner_id: &str, new_source: NewSource) -> Result<Source> {
        validate_non_empty_string("Sheet ID", &new_source.spreadsheet_id)?;
        validate_non_empty_string("Sheet name", &new_source.tab)?;

        let source = Source {
            id: uuid::Uuid::new_v4().to_string(),
            spreadsheet_id: new_source.spreadsheet_id.trim().to_string(),
            tab: new_source.tab.trim().to_string(),
            description: new_source
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            owner_id: owner_id.to_string(),
        };
        self.registry.add_source(source.clone()).await?;
        tracing::info!("➕ Source {} added by {}", source.id, owner_id);

        self.cache.get_roster(true).await;
        Ok(source)
    }

    pub async fn remove_source(&self, owner_id: &str, source_id: &str) -> Result<()> {
        let source = self
            .registry
            .get_source(source_id)
            .await?
            .ok_or_else(|| PortalError::NotFound {
                what: format!("Sheet {}", source_id),
            })?;

        // 無擁有者的舊資料任何管理員都可刪除
        if !source.owner_id.is_empty() && source.owner_id != owner_id {
            return Err(PortalError::PermissionDenied {
                message: format!("sheet {} belongs to another admin", source_id),
            });
        }

        self.registry.remove_source(source_id).await?;
        tracing::info!("➖ Source {} removed by {}", source_id, owner_id);

        self.cache.get_roster(true).await;
        Ok(())
    }
}
