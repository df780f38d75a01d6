/// Canonical comparison key for a roll number: ASCII letters and digits only,
/// upper-cased. `"cs-001"`, `"CS001"` and `"Cs 001"` all become `"CS001"`.
pub fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}
