// Pure merge of an incoming watch intent into the stored watermark.
//
// Purpose
// - Decide the next fetch window for a repository from the stored watermark and the requested
//   starting point, without performing input or output.
//
// Rules
// - No stored watermark: start forward tracking at the requested point.
// - Unset requested point: keep the stored watermark as it is.
// - Requested point older than the stored since: open a backfill window bounded by the previous
//   last_fetched, so the backfill stops exactly where prior coverage began.
// - Otherwise: restart forward tracking from the requested point.

use crate::modules::commits_sync::core::fetch_window::epoch_floor;
use crate::modules::commits_sync::core::watermark::{SyncWindow, Watermark};
use crate::shared::core::primitives::RepositoryId;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    Created(Watermark),
    Unchanged(Watermark),
    BackfillOpened(Watermark),
    ForwardRestarted(Watermark),
}

impl Reconciliation {
    pub fn watermark(&self) -> &Watermark {
        match self {
            Reconciliation::Created(w)
            | Reconciliation::Unchanged(w)
            | Reconciliation::BackfillOpened(w)
            | Reconciliation::ForwardRestarted(w) => w,
        }
    }

    pub fn into_watermark(self) -> Watermark {
        match self {
            Reconciliation::Created(w)
            | Reconciliation::Unchanged(w)
            | Reconciliation::BackfillOpened(w)
            | Reconciliation::ForwardRestarted(w) => w,
        }
    }

    pub fn requires_write(&self) -> bool {
        !matches!(self, Reconciliation::Unchanged(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Reconciliation::Created(_) => "created",
            Reconciliation::Unchanged(_) => "unchanged",
            Reconciliation::BackfillOpened(_) => "backfill_opened",
            Reconciliation::ForwardRestarted(_) => "forward_restarted",
        }
    }
}

pub fn reconcile(
    existing: Option<Watermark>,
    repository: &RepositoryId,
    requested_since: Option<DateTime<Utc>>,
) -> Reconciliation {
    let Some(mut watermark) = existing else {
        let since = requested_since.unwrap_or_else(epoch_floor);
        return Reconciliation::Created(Watermark::forward(repository.clone(), since));
    };

    let Some(requested) = requested_since else {
        return Reconciliation::Unchanged(watermark);
    };

    if requested < watermark.since {
        watermark.window = SyncWindow::Backfilling {
            until: watermark.last_fetched,
        };
        watermark.since = requested;
        watermark.last_fetched = requested;
        Reconciliation::BackfillOpened(watermark)
    } else {
        watermark.since = requested;
        watermark.window = SyncWindow::Forward;
        watermark.last_fetched = requested;
        Reconciliation::ForwardRestarted(watermark)
    }
}
