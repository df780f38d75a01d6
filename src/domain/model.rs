use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

/// Header row followed by data rows, exactly as the provider returned them.
pub type RawGrid = Vec<Vec<String>>;

/// Columns fetched when a source names only a tab.
pub const DEFAULT_COLUMNS: &str = "A:Z";

/// One externally hosted sheet configured by an admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    /// Internal unique id.
    pub id: String,
    /// Provider-side sheet identifier. Blank means the source is not usable yet.
    #[serde(default)]
    pub spreadsheet_id: String,
    /// Tab name, or a full A1 range such as `Marks!A1:K200`.
    pub tab: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Empty for sources created before ownership was tracked.
    #[serde(default)]
    pub owner_id: String,
}

impl Source {
    pub fn is_usable(&self) -> bool {
        !self.spreadsheet_id.trim().is_empty()
    }

    pub fn range(&self) -> String {
        if self.tab.contains('!') {
            self.tab.clone()
        } else {
            format!("{}!{}", self.tab, DEFAULT_COLUMNS)
        }
    }

    /// Label stamped on every record parsed from this source.
    pub fn label(&self) -> &str {
        match self.description.as_deref() {
            Some(d) if !d.trim().is_empty() => d,
            _ => &self.tab,
        }
    }
}

/// Admin input for a new source; the id and owner are assigned by the portal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSource {
    pub spreadsheet_id: String,
    pub tab: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A mark as written in the sheet. Parsed grids always yield `Text`; `Number`
/// exists for callers that build records from typed data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Obtained {
    Number(f64),
    Text(String),
}

impl fmt::Display for Obtained {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Obtained {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Numeric reading of an [`Obtained`] value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkScore {
    pub obtained: f64,
    pub total: Option<f64>,
}

impl MarkScore {
    pub fn percentage(&self) -> Option<f64> {
        match self.total {
            Some(total) if total > 0.0 => Some(self.obtained / total * 100.0),
            _ => None,
        }
    }
}

fn number_pattern() -> &'static Regex {
    static NUMBER: OnceLock<Regex> = OnceLock::new();
    NUMBER.get_or_init(|| Regex::new(r"\d+(?:\.\d+)?").expect("number pattern is a valid regex"))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectMark {
    pub name: String,
    pub obtained: Obtained,
}

impl SubjectMark {
    pub fn new(name: impl Into<String>, obtained: impl Into<Obtained>) -> Self {
        Self {
            name: name.into(),
            obtained: obtained.into(),
        }
    }

    /// Recovers the numeric form: `"85/100"` is 85 of 100, `"85"` is 85 with
    /// no stated total, `"A+92"` is 92.
    pub fn score(&self) -> Option<MarkScore> {
        let text = match &self.obtained {
            Obtained::Number(n) => {
                return Some(MarkScore {
                    obtained: *n,
                    total: None,
                })
            }
            Obtained::Text(t) => t.as_str(),
        };

        let (head, tail) = match text.split_once('/') {
            Some((head, tail)) => (head, Some(tail)),
            None => (text, None),
        };

        let obtained = first_number(head)?;
        let total = tail.and_then(first_number);
        Some(MarkScore { obtained, total })
    }
}

fn first_number(text: &str) -> Option<f64> {
    number_pattern()
        .find(text)
        .and_then(|m| m.as_str().parse().ok())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub roll_no: String,
    pub normalized_roll_no: String,
    pub name: String,
    pub official_email: Option<String>,
    pub source_label: String,
    pub subjects: Vec<SubjectMark>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SourceStatus {
    Connected {
        count: usize,
        timestamp: DateTime<Utc>,
    },
    Error {
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl SourceStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Connected { timestamp, .. } | Self::Error { timestamp, .. } => *timestamp,
        }
    }
}

/// Merged view of every source, built in one pass. `students` and
/// `source_status` always come from the same build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Roster {
    pub students: Vec<StudentRecord>,
    pub built_at: DateTime<Utc>,
    pub source_status: HashMap<String, SourceStatus>,
}

impl Roster {
    pub fn empty(built_at: DateTime<Utc>) -> Self {
        Self {
            students: Vec::new(),
            built_at,
            source_status: HashMap::new(),
        }
    }

    /// Lookup by normalized key. Later sources shadow earlier ones; an empty
    /// key never matches.
    pub fn find(&self, normalized_roll_no: &str) -> Option<&StudentRecord> {
        if normalized_roll_no.is_empty() {
            return None;
        }
        self.students
            .iter()
            .rev()
            .find(|s| s.normalized_roll_no == normalized_roll_no)
    }

    pub fn status_of(&self, source_id: &str) -> Option<&SourceStatus> {
        self.source_status.get(source_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationClaim {
    pub roll_no: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginClaim {
    pub roll_no: String,
    pub email: String,
    pub password: String,
}

/// A registered student as held by the account store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub normalized_roll_no: String,
    pub roll_no: String,
    pub name: String,
    pub email: String,
    /// `None` for legacy accounts created before passwords existed.
    #[serde(default, rename = "password")]
    pub password_hash: Option<String>,
    pub registered_at: DateTime<Utc>,
}

impl Account {
    /// The stored hash, treating an empty string like a missing one.
    pub fn stored_hash(&self) -> Option<&str> {
        self.password_hash.as_deref().filter(|h| !h.is_empty())
    }

    /// Accounts created before passwords existed; they may register again.
    pub fn is_legacy(&self) -> bool {
        self.stored_hash().is_none()
    }
}

/// Fields the portal decided to persist for a verified registration. The hash
/// is filled in by the password hashing collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSeed {
    pub normalized_roll_no: String,
    pub roll_no: String,
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
}

impl AccountSeed {
    pub fn into_account(self, password_hash: String, registered_at: DateTime<Utc>) -> Account {
        Account {
            normalized_roll_no: self.normalized_roll_no,
            roll_no: self.roll_no,
            name: self.name,
            email: self.email,
            password_hash: Some(password_hash),
            registered_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    pub roll_no: String,
    /// Absent from tokens issued before the key was added.
    #[serde(default)]
    pub normalized_roll_no: String,
    pub email: String,
    pub name: String,
}
