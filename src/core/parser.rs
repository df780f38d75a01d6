use crate::core::normalize::normalize;
use crate::domain::model::{Obtained, StudentRecord, SubjectMark};

const ROLL_KEYWORDS: &[&str] = &["roll", "id", "reg"];
const NAME_KEYWORDS: &[&str] = &["name", "student"];
const EMAIL_KEYWORDS: &[&str] = &["email", "mail", "e-mail"];

const DEFAULT_ROLL_COLUMN: usize = 0;
const DEFAULT_NAME_COLUMN: usize = 1;
const UNKNOWN_NAME: &str = "Unknown";

/// Column roles discovered from a header row.
///
/// Headers are matched case-insensitively by substring. For each role the
/// keywords are tried in priority order and the first column containing the
/// current keyword wins:
///
/// | role  | keywords                     | fallback                      |
/// |-------|------------------------------|-------------------------------|
/// | roll  | `roll`, `id`, `reg`          | column 0                      |
/// | name  | `name`, `student`            | column 1, shifted past roll   |
/// | email | `email`, `mail`, `e-mail`    | none                          |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnLayout {
    pub roll_no: usize,
    pub name: usize,
    pub email: Option<usize>,
}

impl ColumnLayout {
    pub fn discover<S: AsRef<str>>(headers: &[S]) -> Self {
        let lowered: Vec<String> = headers
            .iter()
            .map(|h| h.as_ref().trim().to_lowercase())
            .collect();

        let roll_no = find_column(&lowered, ROLL_KEYWORDS).unwrap_or(DEFAULT_ROLL_COLUMN);
        let mut name = find_column(&lowered, NAME_KEYWORDS).unwrap_or(DEFAULT_NAME_COLUMN);
        if name == roll_no {
            name = roll_no + 1;
        }
        let email = find_column(&lowered, EMAIL_KEYWORDS);

        Self {
            roll_no,
            name,
            email,
        }
    }

    /// Roll and name columns never hold marks. The email column is not
    /// special-cased and goes through the same digit check as any subject.
    fn is_identity_column(&self, index: usize) -> bool {
        index == self.roll_no || index == self.name
    }
}

/// Keyword priority beats column position: `["Midterm", "Roll"]` resolves
/// roll to column 1 even though "Midterm" contains `id`. A single
/// any-keyword scan would pick column 0 instead.
fn find_column(lowered_headers: &[String], keywords: &[&str]) -> Option<usize> {
    keywords
        .iter()
        .find_map(|kw| lowered_headers.iter().position(|h| h.contains(kw)))
}

fn cell(row: &[String], index: usize) -> Option<&str> {
    row.get(index).map(|c| c.trim()).filter(|c| !c.is_empty())
}

/// Turns a raw grid into student records. Grids without a header and at least
/// one data row yield nothing; malformed rows are skipped, never fatal.
pub fn parse(grid: &[Vec<String>], source_label: &str) -> Vec<StudentRecord> {
    let Some((headers, rows)) = grid.split_first() else {
        return Vec::new();
    };
    if rows.is_empty() {
        return Vec::new();
    }

    let layout = ColumnLayout::discover(headers);
    tracing::debug!(
        "📋 {}: roll column {}, name column {}, email column {:?}",
        source_label,
        layout.roll_no,
        layout.name,
        layout.email
    );

    let mut students = Vec::with_capacity(rows.len());
    for row in rows {
        // 學號欄位缺失或空白的列直接略過
        let Some(roll_no) = cell(row, layout.roll_no) else {
            continue;
        };

        let name = cell(row, layout.name).unwrap_or(UNKNOWN_NAME);
        let official_email = layout
            .email
            .and_then(|i| cell(row, i))
            .map(str::to_lowercase);

        let subjects = headers
            .iter()
            .enumerate()
            .filter(|(j, _)| !layout.is_identity_column(*j))
            .filter_map(|(j, header)| {
                let subject = header.trim();
                let marks = cell(row, j)?;
                if subject.is_empty() || !marks.bytes().any(|b| b.is_ascii_digit()) {
                    return None;
                }
                Some(SubjectMark {
                    name: subject.to_string(),
                    obtained: Obtained::Text(marks.to_string()),
                })
            })
            .collect();

        students.push(StudentRecord {
            roll_no: roll_no.to_string(),
            normalized_roll_no: normalize(roll_no),
            name: name.to_string(),
            official_email,
            source_label: source_label.to_string(),
            subjects,
        });
    }

    students
}
