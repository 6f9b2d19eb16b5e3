// Pure planning for one sync cycle.
//
// Purpose
// - Derive the upstream fetch window from a watermark.
// - Turn a fully drained fetch result into the commits to publish and the next watermark.
//
// Boundaries
// - No input or output. The pipeline performs the fetch, publish and persist steps.

use crate::modules::commits_sync::core::commit::CommitRecord;
use crate::modules::commits_sync::core::watermark::{SyncWindow, Watermark};
use chrono::{DateTime, Utc};

/// 2099-12-31T23:59:59Z, the highest upper bound ever sent upstream.
pub const FAR_FUTURE_CEILING_SECS: i64 = 4_102_444_799;

pub fn epoch_floor() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}

pub fn far_future_ceiling() -> DateTime<Utc> {
    DateTime::from_timestamp(FAR_FUTURE_CEILING_SECS, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub since: DateTime<Utc>,
    pub until: Option<DateTime<Utc>>,
}

impl FetchWindow {
    pub fn for_watermark(watermark: &Watermark) -> Self {
        Self {
            since: watermark.last_fetched.max(epoch_floor()),
            until: watermark.until().map(|until| until.min(far_future_ceiling())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleDecision {
    /// Nothing new upstream for a forward-tracking repository; leave everything untouched.
    Idle,
    /// The backfill window holds nothing to publish; resume forward tracking at its bound.
    Drained { watermark: Watermark },
    Publish {
        commits: Vec<CommitRecord>,
        watermark: Watermark,
    },
}

/// Keeps the commits created at or before `until`.
///
/// Upstream ordering is newest-first but not strictly monotonic (rebased or cherry-picked
/// commits keep their original dates), so every commit is checked instead of truncating the
/// list at the first one past the bound.
pub fn within_until(commits: Vec<CommitRecord>, until: DateTime<Utc>) -> Vec<CommitRecord> {
    commits
        .into_iter()
        .filter(|commit| commit.created_at <= until)
        .collect()
}

pub fn plan_cycle(watermark: &Watermark, fetched: Vec<CommitRecord>) -> CycleDecision {
    let commits = match watermark.window {
        SyncWindow::Forward if fetched.is_empty() => return CycleDecision::Idle,
        SyncWindow::Forward => fetched,
        SyncWindow::Backfilling { until } => within_until(fetched, until),
    };

    let Some(newest) = commits.iter().map(|commit| commit.created_at).max() else {
        return match watermark.window {
            SyncWindow::Backfilling { until } => CycleDecision::Drained {
                watermark: resume_forward(watermark, until),
            },
            SyncWindow::Forward => CycleDecision::Idle,
        };
    };

    CycleDecision::Publish {
        commits,
        watermark: resume_forward(watermark, newest),
    }
}

fn resume_forward(watermark: &Watermark, last_fetched: DateTime<Utc>) -> Watermark {
    Watermark {
        window: SyncWindow::Forward,
        last_fetched,
        ..watermark.clone()
    }
}
