// Identifiers shared by every module.
//
// Purpose
// - Parse and carry the "owner/name" repository identifier used as the key for watermarks,
//   bus payloads and stored commits.
// - Names are case-insensitive upstream, so identifiers are kept lowercase.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid repository identifier {0:?}, expected <owner>/<name>")]
pub struct InvalidRepositoryIdentifier(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepositoryId {
    owner: String,
    name: String,
}

impl RepositoryId {
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self, InvalidRepositoryIdentifier> {
        Self::parse(&format!("{}/{}", owner.into(), name.into()))
    }

    pub fn parse(raw: &str) -> Result<Self, InvalidRepositoryIdentifier> {
        let invalid = || InvalidRepositoryIdentifier(raw.to_string());
        let mut parts = raw.split('/');
        let (Some(owner), Some(name), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid());
        };
        let is_segment = |s: &str| !s.is_empty() && !s.chars().any(char::is_whitespace);
        if !is_segment(owner) || !is_segment(name) {
            return Err(invalid());
        }
        Ok(Self {
            owner: owner.to_lowercase(),
            name: name.to_lowercase(),
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn full_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepositoryId {
    type Err = InvalidRepositoryIdentifier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RepositoryId {
    type Error = InvalidRepositoryIdentifier;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RepositoryId> for String {
    fn from(value: RepositoryId) -> Self {
        value.to_string()
    }
}
