use crate::modules::commits_sync::adapters::outbound::watermark_store::{
    StoreError, Versioned, WatermarkStore, next_version,
};
use crate::modules::commits_sync::core::watermark::Watermark;
use crate::shared::core::primitives::RepositoryId;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryWatermarkStore {
    inner: RwLock<BTreeMap<RepositoryId, Versioned<Watermark>>>,
    offline: bool,
    delay_put_ms: u64,
}

impl InMemoryWatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle_offline(&mut self) {
        self.offline = !self.offline;
    }

    /// Widens the window between a read and the following write, to exercise CAS conflicts.
    pub fn set_delay_put_ms(&mut self, ms: u64) {
        self.delay_put_ms = ms;
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline {
            return Err(StoreError::Backend("Watermark store offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl WatermarkStore for InMemoryWatermarkStore {
    async fn get(
        &self,
        repository: &RepositoryId,
    ) -> Result<Option<Versioned<Watermark>>, StoreError> {
        self.ensure_online()?;
        Ok(self.inner.read().await.get(repository).cloned())
    }

    async fn put(
        &self,
        watermark: &Watermark,
        expected_version: Option<u64>,
    ) -> Result<u64, StoreError> {
        self.ensure_online()?;
        if self.delay_put_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_put_ms)).await;
        }
        let mut guard = self.inner.write().await;
        let key = &watermark.repository;
        let version = next_version(key, guard.get(key).map(|v| v.version), expected_version)?;
        guard.insert(
            key.clone(),
            Versioned {
                value: watermark.clone(),
                version,
            },
        );
        Ok(version)
    }

    async fn keys(&self) -> Result<Vec<RepositoryId>, StoreError> {
        self.ensure_online()?;
        Ok(self.inner.read().await.keys().cloned().collect())
    }
}

#[cfg(test)]
mod in_memory_watermark_store_tests {
    use super::*;
    use crate::tests::fixtures::timestamps::at;
    use crate::tests::fixtures::watermarks::WatermarkBuilder;
    use rstest::rstest;

    #[rstest]
    #[tokio::test]
    async fn it_should_put_and_get_a_watermark() {
        let store = InMemoryWatermarkStore::new();
        let watermark = WatermarkBuilder::new("a/b").since(at(1)).build();
        let version = store.put(&watermark, None).await.unwrap();
        assert_eq!(version, 1);
        let loaded = store.get(&watermark.repository).await.unwrap().unwrap();
        assert_eq!(loaded, Versioned { value: watermark, version: 1 });
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_overwrite_when_the_expected_version_matches() {
        let store = InMemoryWatermarkStore::new();
        let first = WatermarkBuilder::new("a/b").since(at(1)).build();
        store.put(&first, None).await.unwrap();
        let second = WatermarkBuilder::new("a/b").since(at(1)).last_fetched(at(5)).build();
        assert_eq!(store.put(&second, Some(1)).await.unwrap(), 2);
        let loaded = store.get(&second.repository).await.unwrap().unwrap();
        assert_eq!(loaded.value.last_fetched, at(5));
    }

    #[rstest]
    #[case(None)]
    #[case(Some(7))]
    #[tokio::test]
    async fn it_should_fail_to_put_with_a_stale_version(#[case] expected: Option<u64>) {
        let store = InMemoryWatermarkStore::new();
        let watermark = WatermarkBuilder::new("a/b").build();
        store.put(&watermark, None).await.unwrap();
        let result = store.put(&watermark, expected).await;
        match result {
            Err(StoreError::VersionConflict { expected: e, actual, .. }) => {
                assert_eq!(e, expected);
                assert_eq!(actual, Some(1));
            }
            other => panic!("expected VersionConflict, got {other:?}"),
        }
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_list_keys_in_order() {
        let store = InMemoryWatermarkStore::new();
        store.put(&WatermarkBuilder::new("z/z").build(), None).await.unwrap();
        store.put(&WatermarkBuilder::new("a/b").build(), None).await.unwrap();
        let keys: Vec<String> = store
            .keys()
            .await
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(keys, vec!["a/b", "z/z"]);
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_fail_if_the_store_is_offline() {
        let mut store = InMemoryWatermarkStore::new();
        store.toggle_offline();
        let result = store.keys().await;
        assert_eq!(
            result.unwrap_err().to_string(),
            StoreError::Backend("Watermark store offline".into()).to_string()
        );
    }
}
