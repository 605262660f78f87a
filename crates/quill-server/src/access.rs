//! Authorization of join requests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use ulid::Ulid;

/// Outcome of an access check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccessStatus {
    Grant { author_id: String },
    Deny,
    NeedPassword,
    WrongPassword,
}

/// Decides whether a token may join a document and which author it acts as.
#[async_trait]
pub trait AccessControl: Send + Sync {
    async fn check_access(&self, document_id: &str, token: &str) -> AccessStatus;
}

/// Grants every request. Each distinct token is mapped to a stable author id.
#[derive(Debug, Default)]
pub struct AllowAll {
    authors: Mutex<HashMap<String, String>>,
}

impl AllowAll {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccessControl for AllowAll {
    async fn check_access(&self, _document_id: &str, token: &str) -> AccessStatus {
        let author_id = self
            .authors
            .lock()
            .entry(token.to_string())
            .or_insert_with(|| format!("a.{}", Ulid::new().to_string().to_lowercase()))
            .clone();
        AccessStatus::Grant { author_id }
    }
}

/// Fixed table of `(document, token)` outcomes; anything else is denied.
#[derive(Debug, Default)]
pub struct StaticAccess {
    entries: HashMap<(String, String), AccessStatus>,
}

impl StaticAccess {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(
        self,
        document_id: impl Into<String>,
        token: impl Into<String>,
        author_id: impl Into<String>,
    ) -> Self {
        self.status(
            document_id,
            token,
            AccessStatus::Grant {
                author_id: author_id.into(),
            },
        )
    }

    pub fn status(
        mut self,
        document_id: impl Into<String>,
        token: impl Into<String>,
        status: AccessStatus,
    ) -> Self {
        self.entries
            .insert((document_id.into(), token.into()), status);
        self
    }
}

#[async_trait]
impl AccessControl for StaticAccess {
    async fn check_access(&self, document_id: &str, token: &str) -> AccessStatus {
        self.entries
            .get(&(document_id.to_string(), token.to_string()))
            .cloned()
            .unwrap_or(AccessStatus::Deny)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_allow_all_is_stable_per_token() {
        let access = AllowAll::new();
        let first = access.check_access("d", "t1").await;
        let again = access.check_access("other", "t1").await;
        let second = access.check_access("d", "t2").await;

        assert_eq!(first, again);
        assert_ne!(first, second);
        assert!(matches!(first, AccessStatus::Grant { author_id } if author_id.starts_with("a.")));
    }

    #[tokio::test]
    async fn test_static_table() {
        let access = StaticAccess::new()
            .grant("d", "good", "a.1")
            .status("d", "locked", AccessStatus::NeedPassword);

        assert_eq!(
            access.check_access("d", "good").await,
            AccessStatus::Grant {
                author_id: "a.1".into()
            }
        );
        assert_eq!(access.check_access("d", "locked").await, AccessStatus::NeedPassword);
        assert_eq!(access.check_access("e", "good").await, AccessStatus::Deny);
    }
}
