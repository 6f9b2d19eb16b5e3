// Builders for upstream records.

use crate::modules::commits_sync::core::commit::{CommitAuthor, CommitRecord, RepositoryInfo};
use crate::shared::core::primitives::RepositoryId;
use crate::tests::fixtures::timestamps::at;
use chrono::{DateTime, Utc};

pub struct CommitBuilder {
    inner: CommitRecord,
}

#[allow(dead_code)]
impl CommitBuilder {
    pub fn new(repository: &str) -> Self {
        let repository = RepositoryId::parse(repository).unwrap();
        Self {
            inner: CommitRecord {
                hash: "0000000000000000000000000000000000000000".into(),
                author: author("octocat"),
                message: "initial commit".into(),
                url: Some(format!("https://github.com/{repository}/commit/0000")),
                created_at: at(0),
                repository,
            },
        }
    }

    pub fn hash(mut self, v: impl Into<String>) -> Self {
        self.inner.hash = v.into();
        self
    }

    pub fn author(mut self, username: &str) -> Self {
        self.inner.author = author(username);
        self
    }

    pub fn author_identity(mut self, v: CommitAuthor) -> Self {
        self.inner.author = v;
        self
    }

    pub fn message(mut self, v: impl Into<String>) -> Self {
        self.inner.message = v.into();
        self
    }

    pub fn created_at(mut self, v: DateTime<Utc>) -> Self {
        self.inner.created_at = v;
        self
    }

    pub fn build(self) -> CommitRecord {
        self.inner
    }
}

pub fn author(username: &str) -> CommitAuthor {
    CommitAuthor {
        id: username.bytes().map(i64::from).sum(),
        name: username.to_uppercase(),
        email: format!("{username}@example.com"),
        username: username.into(),
    }
}

/// Commits for `repository`, one per hour offset, hashed `c<hour>` and authored by `octocat`.
pub fn commits_at(repository: &str, hours: &[i64]) -> Vec<CommitRecord> {
    hours
        .iter()
        .map(|h| {
            CommitBuilder::new(repository)
                .hash(format!("c{h}"))
                .created_at(at(*h))
                .build()
        })
        .collect()
}

pub fn repository_info(full_name: &str) -> RepositoryInfo {
    RepositoryInfo {
        id: 1296269,
        full_name: full_name.into(),
        watchers: 80,
        star_gazers: 80,
        forks: 9,
        language: Some("Rust".into()),
        created_at: at(-10_000),
        updated_at: at(-1),
    }
}
