// Builder for watermarks in arbitrary windows.

use crate::modules::commits_sync::core::watermark::{SyncWindow, Watermark};
use crate::shared::core::primitives::RepositoryId;
use crate::tests::fixtures::timestamps::at;
use chrono::{DateTime, Utc};

pub struct WatermarkBuilder {
    inner: Watermark,
}

#[allow(dead_code)]
impl WatermarkBuilder {
    /// Forward-tracking watermark starting at `at(0)`.
    pub fn new(repository: &str) -> Self {
        let repository = RepositoryId::parse(repository).unwrap();
        Self {
            inner: Watermark::forward(repository, at(0)),
        }
    }

    /// Sets `since` and moves `last_fetched` along with it; override the cursor afterwards.
    pub fn since(mut self, v: DateTime<Utc>) -> Self {
        self.inner.since = v;
        self.inner.last_fetched = v;
        self
    }

    pub fn last_fetched(mut self, v: DateTime<Utc>) -> Self {
        self.inner.last_fetched = v;
        self
    }

    pub fn backfilling_until(mut self, until: DateTime<Utc>) -> Self {
        self.inner.window = SyncWindow::Backfilling { until };
        self
    }

    pub fn build(self) -> Watermark {
        self.inner
    }
}

#[cfg(test)]
mod watermark_builder_tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn it_should_keep_the_cursor_when_set_after_since() {
        let watermark = WatermarkBuilder::new("a/b")
            .since(at(1))
            .last_fetched(at(4))
            .backfilling_until(at(9))
            .build();
        assert_eq!(watermark.since, at(1));
        assert_eq!(watermark.last_fetched, at(4));
        assert_eq!(watermark.until(), Some(at(9)));
    }
}
