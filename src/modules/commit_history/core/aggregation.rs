// Read-side aggregations over stored commits.
//
// Purpose
// - Rank authors by commit count and page through a repository's history.
//
// Invariants
// - Date bounds are inclusive on both ends.
// - Ties in the ranking keep the order in which authors were first seen in the input.
// - Pages are 1-based; a page past the end is empty, never an error.

use crate::modules::commits_sync::core::commit::CommitRecord;
use crate::shared::core::primitives::RepositoryId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_PER_PAGE: u32 = 30;
pub const MAX_PER_PAGE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Pagination {
    /// Clamps `page` to at least 1 and `per_page` to `1..=MAX_PER_PAGE`.
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page as usize - 1).saturating_mul(self.per_page as usize)
    }

    pub fn apply<T>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset())
            .take(self.per_page as usize)
            .collect()
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.is_none_or(|start| at >= start) && self.end.is_none_or(|end| at <= end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorStat {
    pub author: String,
    pub commit_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitFilter {
    pub repository: RepositoryId,
    pub range: DateRange,
    /// Matches the author's identity key, as reported by `top_committers`.
    pub author: Option<String>,
}

impl CommitFilter {
    pub fn matches(&self, commit: &CommitRecord) -> bool {
        commit.repository == self.repository
            && self.range.contains(commit.created_at)
            && self
                .author
                .as_deref()
                .is_none_or(|author| commit.author.identity_key() == author)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitPage {
    pub commits: Vec<CommitRecord>,
    pub total_count: u64,
    pub page: u32,
    pub per_page: u32,
}

/// Ranks the authors of `commits` that fall within `range`, most commits first.
///
/// `commits` must already be restricted to one repository and be in store insertion order.
pub fn top_committers<'a>(
    commits: impl IntoIterator<Item = &'a CommitRecord>,
    range: DateRange,
    pagination: Pagination,
) -> Vec<AuthorStat> {
    let mut stats: Vec<AuthorStat> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for commit in commits.into_iter().filter(|c| range.contains(c.created_at)) {
        let key = commit.author.identity_key();
        match index.get(key) {
            Some(&i) => stats[i].commit_count += 1,
            None => {
                index.insert(key, stats.len());
                stats.push(AuthorStat {
                    author: key.to_string(),
                    commit_count: 1,
                });
            }
        }
    }

    // Stable: equal counts keep first-seen order.
    stats.sort_by(|a, b| b.commit_count.cmp(&a.commit_count));
    pagination.apply(stats)
}

/// Filters `commits`, orders them newest-first and cuts out the requested page.
pub fn find_commits<'a>(
    commits: impl IntoIterator<Item = &'a CommitRecord>,
    filter: &CommitFilter,
    pagination: Pagination,
) -> CommitPage {
    let mut matching: Vec<&CommitRecord> = commits.into_iter().filter(|c| filter.matches(c)).collect();
    matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    CommitPage {
        total_count: matching.len() as u64,
        commits: pagination.apply(matching.into_iter().cloned()),
        page: pagination.page,
        per_page: pagination.per_page,
    }
}

#[cfg(test)]
mod aggregation_tests {
    use super::*;
    use crate::tests::fixtures::commits::CommitBuilder;
    use crate::tests::fixtures::timestamps::at;
    use rstest::{fixture, rstest};

    fn commit(hash: &str, author: &str, hours: i64) -> CommitRecord {
        CommitBuilder::new("a/b")
            .hash(hash)
            .author(author)
            .created_at(at(hours))
            .build()
    }

    #[fixture]
    fn history() -> Vec<CommitRecord> {
        vec![
            commit("1", "x", 1),
            commit("2", "y", 2),
            commit("3", "x", 3),
            commit("4", "y", 4),
            commit("5", "x", 5),
        ]
    }

    fn page(page: u32, per_page: u32) -> Pagination {
        Pagination::new(Some(page), Some(per_page))
    }

    #[rstest]
    fn it_should_rank_authors_by_commit_count(history: Vec<CommitRecord>) {
        let stats = top_committers(&history, DateRange::default(), page(1, 10));
        assert_eq!(
            stats,
            vec![
                AuthorStat { author: "x".into(), commit_count: 3 },
                AuthorStat { author: "y".into(), commit_count: 2 },
            ]
        );
    }

    #[rstest]
    fn it_should_paginate_the_ranking(history: Vec<CommitRecord>) {
        let stats = top_committers(&history, DateRange::default(), page(2, 1));
        assert_eq!(stats, vec![AuthorStat { author: "y".into(), commit_count: 2 }]);
        assert!(top_committers(&history, DateRange::default(), page(3, 1)).is_empty());
    }

    #[rstest]
    fn it_should_break_ties_by_first_seen_author() {
        let history = vec![commit("1", "z", 1), commit("2", "a", 2), commit("3", "m", 3)];
        let authors: Vec<_> = top_committers(&history, DateRange::default(), page(1, 10))
            .into_iter()
            .map(|s| s.author)
            .collect();
        assert_eq!(authors, vec!["z", "a", "m"]);
    }

    #[rstest]
    fn it_should_count_only_commits_within_inclusive_bounds(history: Vec<CommitRecord>) {
        let stats = top_committers(&history, DateRange::new(Some(at(2)), Some(at(4))), page(1, 10));
        assert_eq!(
            stats,
            vec![
                AuthorStat { author: "y".into(), commit_count: 2 },
                AuthorStat { author: "x".into(), commit_count: 1 },
            ]
        );
    }

    #[rstest]
    fn it_should_list_commits_newest_first(history: Vec<CommitRecord>) {
        let filter = CommitFilter {
            repository: RepositoryId::parse("a/b").unwrap(),
            range: DateRange::default(),
            author: None,
        };
        let result = find_commits(&history, &filter, page(1, 2));
        let hashes: Vec<_> = result.commits.iter().map(|c| c.hash.as_str()).collect();
        assert_eq!(hashes, vec!["5", "4"]);
        assert_eq!(result.total_count, 5);
        assert_eq!((result.page, result.per_page), (1, 2));
    }

    #[rstest]
    fn it_should_filter_commits_by_author_range_and_repository(history: Vec<CommitRecord>) {
        let mut history = history;
        history.push(
            CommitBuilder::new("c/d")
                .hash("other")
                .author("x")
                .created_at(at(3))
                .build(),
        );
        let filter = CommitFilter {
            repository: RepositoryId::parse("a/b").unwrap(),
            range: DateRange::new(Some(at(1)), Some(at(3))),
            author: Some("x".into()),
        };
        let result = find_commits(&history, &filter, Pagination::default());
        let hashes: Vec<_> = result.commits.iter().map(|c| c.hash.as_str()).collect();
        assert_eq!(hashes, vec!["3", "1"]);
        assert_eq!(result.total_count, 2);
    }

    #[rstest]
    #[case(None, None, 1, DEFAULT_PER_PAGE)]
    #[case(Some(0), Some(0), 1, 1)]
    #[case(Some(4), Some(1_000), 4, MAX_PER_PAGE)]
    fn it_should_clamp_pagination(
        #[case] requested_page: Option<u32>,
        #[case] requested_per_page: Option<u32>,
        #[case] page: u32,
        #[case] per_page: u32,
    ) {
        assert_eq!(
            Pagination::new(requested_page, requested_per_page),
            Pagination { page, per_page }
        );
    }
}
