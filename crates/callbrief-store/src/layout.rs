//! Naming rules shared by every store.
//!
//! Accounts are grouped into buckets by first character. Each account gets
//! one folder holding one document named after the folder.

use callbrief_gateway_api::{GatewayError, normalize_name};

/// Bucket for names starting with a digit.
pub const DIGIT_BUCKET: &str = "0-9";

/// Bucket for names starting with anything other than a letter or digit.
pub const OTHER_BUCKET: &str = "_";

pub const DOCUMENT_SUFFIX: &str = " - Call Brief.md";

/// Bucket directory for an account name.
#[must_use]
pub fn bucket_for(name: &str) -> String {
    match name.trim().chars().next() {
        Some(c) if c.is_ascii_digit() => DIGIT_BUCKET.to_string(),
        Some(c) if c.is_alphabetic() => c.to_uppercase().collect(),
        _ => OTHER_BUCKET.to_string(),
    }
}

/// Folder name for a new account: trimmed, path separators replaced, first
/// letter capitalized.
///
/// # Errors
///
/// Returns `GatewayError::Misconfiguration` when nothing usable is left of
/// the name.
pub fn folder_name_for(account: &str) -> Result<String, GatewayError> {
    let cleaned: String = account
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '-',
            c if c.is_control() => ' ',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_matches('.').trim();

    if normalize_name(cleaned).is_empty() {
        return Err(GatewayError::Misconfiguration(format!(
            "account name {account:?} has no letters or digits"
        )));
    }

    let mut chars = cleaned.chars();
    Ok(match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    })
}

#[must_use]
pub fn document_name(folder: &str) -> String {
    format!("{folder}{DOCUMENT_SUFFIX}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_for() {
        assert_eq!(bucket_for("acme"), "A");
        assert_eq!(bucket_for("  Foo Inc"), "F");
        assert_eq!(bucket_for("3M"), "0-9");
        assert_eq!(bucket_for("éclair"), "É");
        assert_eq!(bucket_for("(stealth)"), "_");
        assert_eq!(bucket_for(""), "_");
    }

    #[test]
    fn test_folder_name_capitalizes_and_sanitizes() {
        assert_eq!(folder_name_for("acme.io").unwrap(), "Acme.io");
        assert_eq!(folder_name_for(" foo/bar ").unwrap(), "Foo-bar");
        assert_eq!(folder_name_for("..").ok(), None);
        assert!(folder_name_for("   ").is_err());
    }

    #[test]
    fn test_document_name() {
        assert_eq!(document_name("Foo Inc"), "Foo Inc - Call Brief.md");
    }
}
