// Upstream records produced by the sync pipeline and persisted by the storage consumer.
//
// Timestamps
// - All timestamps are UTC and reflect the upstream's values, never local write time.

use crate::shared::core::primitives::RepositoryId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitAuthor {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub username: String,
}

impl CommitAuthor {
    /// Key used to group commits by author: the upstream login, falling back to email and
    /// then display name for commits whose author has no linked account.
    pub fn identity_key(&self) -> &str {
        [&self.username, &self.email, &self.name]
            .into_iter()
            .find(|s| !s.is_empty())
            .map(String::as_str)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub hash: String,
    pub author: CommitAuthor,
    pub message: String,
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub repository: RepositoryId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    pub id: i64,
    pub full_name: String,
    pub watchers: i32,
    pub star_gazers: i32,
    pub forks: i32,
    pub language: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
