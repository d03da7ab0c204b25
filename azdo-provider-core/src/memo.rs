//! Secret-change memos.
//!
//! Remote services never echo secrets back, so state carries a bcrypt
//! fingerprint of each secret instead of the secret itself. On refresh
//! the stored memo is compared against the configured secret: a match
//! means "unchanged", anything else (including a missing or malformed
//! memo) means the secret must be re-sent.

use bcrypt::{DEFAULT_COST, hash, verify};
use thiserror::Error;

use crate::secret::Secret;

/// Cost used when minting memos.
///
/// Memos only detect drift, they are not a password store, so the
/// cheapest cost bcrypt accepts is enough.
pub const MEMO_COST: u32 = 4;

const _: () = assert!(MEMO_COST <= DEFAULT_COST);

/// Recognized bcrypt version prefixes.
const MEMO_PREFIXES: [&str; 3] = ["$2a$", "$2b$", "$2y$"];

/// Error type for memo operations.
#[derive(Debug, Error)]
pub enum MemoError {
    /// bcrypt failed to produce a fingerprint.
    #[error("failed to fingerprint secret: {message}")]
    Hash { message: String },
}

/// State attribute name holding the memo for a secret attribute.
pub fn memo_attribute_name(secret_attribute: &str) -> String {
    format!("{}_hash", secret_attribute)
}

/// Human-readable description for the memo attribute in a declared
/// schema.
pub fn memo_attribute_description(secret_attribute: &str) -> String {
    format!(
        "A bcrypt hash tracking changes to `{}`; the secret itself is never stored.",
        secret_attribute
    )
}

/// Whether a stored string looks like a bcrypt memo at all.
pub fn is_valid_memo(memo: &str) -> bool {
    MEMO_PREFIXES.iter().any(|p| memo.starts_with(p))
}

/// Mint a fresh memo for a secret.
pub fn make_memo(secret: &Secret) -> Result<String, MemoError> {
    hash(secret.expose(), MEMO_COST).map_err(|e| MemoError::Hash {
        message: e.to_string(),
    })
}

/// Outcome of comparing a secret against its stored memo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoOutcome {
    /// Whether the secret differs from what the memo recorded.
    pub changed: bool,
    /// The memo to store: the old one when unchanged, a fresh one
    /// otherwise.
    pub memo: String,
}

/// Compare a secret against its stored memo and produce the memo to
/// keep.
///
/// An empty secret is reported as unchanged with the stored memo kept
/// as-is: absence of a configured secret is not a change to it. A
/// missing or malformed memo is treated as a change, never an error:
/// the secret is re-sent and a valid memo takes its place.
pub fn compare_and_update(
    secret: &Secret,
    stored: Option<&str>,
) -> Result<MemoOutcome, MemoError> {
    if secret.is_empty() {
        return Ok(MemoOutcome {
            changed: false,
            memo: stored.unwrap_or_default().to_string(),
        });
    }
    if let Some(memo) = stored {
        if is_valid_memo(memo) && verify(secret.expose(), memo).unwrap_or(false) {
            return Ok(MemoOutcome {
                changed: false,
                memo: memo.to_string(),
            });
        }
    }
    Ok(MemoOutcome {
        changed: true,
        memo: make_memo(secret)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memo_attribute_name() {
        assert_eq!(memo_attribute_name("personal_access_token"), "personal_access_token_hash");
    }

    #[test]
    fn test_is_valid_memo_prefixes() {
        assert!(is_valid_memo("$2a$04$abcdefghijklmnopqrstuv"));
        assert!(is_valid_memo("$2b$04$abcdefghijklmnopqrstuv"));
        assert!(is_valid_memo("$2y$04$abcdefghijklmnopqrstuv"));
        assert!(!is_valid_memo("$1$md5crypt"));
        assert!(!is_valid_memo("plaintext"));
        assert!(!is_valid_memo(""));
    }

    #[test]
    fn test_unchanged_secret_keeps_memo() {
        let secret = Secret::new("the-secret");
        let memo = make_memo(&secret).unwrap();

        let outcome = compare_and_update(&secret, Some(&memo)).unwrap();
        assert!(!outcome.changed);
        assert_eq!(outcome.memo, memo);
    }

    #[test]
    fn test_changed_secret_mints_new_memo() {
        let memo = make_memo(&Secret::new("old-secret")).unwrap();

        let outcome = compare_and_update(&Secret::new("new-secret"), Some(&memo)).unwrap();
        assert!(outcome.changed);
        assert_ne!(outcome.memo, memo);
        assert!(is_valid_memo(&outcome.memo));
    }

    #[test]
    fn test_empty_secret_is_never_a_change() {
        let memo = make_memo(&Secret::new("old-secret")).unwrap();

        let outcome = compare_and_update(&Secret::new(""), Some(&memo)).unwrap();
        assert!(!outcome.changed);
        assert_eq!(outcome.memo, memo);

        let outcome = compare_and_update(&Secret::new("  "), None).unwrap();
        assert!(!outcome.changed);
        assert_eq!(outcome.memo, "");
    }

    #[test]
    fn test_missing_memo_is_a_change() {
        let outcome = compare_and_update(&Secret::new("s"), None).unwrap();
        assert!(outcome.changed);
        assert!(is_valid_memo(&outcome.memo));
    }

    #[test]
    fn test_malformed_memo_is_a_change_not_an_error() {
        let outcome = compare_and_update(&Secret::new("s"), Some("not-a-memo")).unwrap();
        assert!(outcome.changed);
        assert!(is_valid_memo(&outcome.memo));
    }

    #[test]
    fn test_memo_never_contains_secret() {
        let memo = make_memo(&Secret::new("super-secret-value")).unwrap();
        assert!(!memo.contains("super-secret-value"));
    }
}
