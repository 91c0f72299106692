//! Item operations with read-through caching
//!
//! The store is authoritative. The cache only ever saves a store read, and a
//! cached entry is served only while its revision matches the store, so an
//! invalidation lost during a cache outage cannot resurface stale data.

use super::model::{CreateItem, Item, UpdateItem};
use super::store::{ItemPage, ItemStore, PageRequest};
use crate::ItemError;
use crate::cache::{CacheClient, CacheLookup};
use crate::metrics::Metrics;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

pub const ITEM_KEY_PREFIX: &str = "item:";
pub const ITEMS_LIST_KEY: &str = "items:list";

const GET_ITEM_OPERATION: &str = "get_item";

/// Cache payload: the item plus the store revision it was read at
#[derive(Debug, Serialize, Deserialize)]
struct CachedItem {
    revision: u64,
    item: Item,
}

pub fn item_key(id: Uuid) -> String {
    format!("{ITEM_KEY_PREFIX}{id}")
}

pub struct ItemService {
    store: Arc<ItemStore>,
    cache: CacheClient,
    metrics: Arc<Metrics>,
    ttl: Duration,
}

impl ItemService {
    pub fn new(
        store: Arc<ItemStore>,
        cache: CacheClient,
        metrics: Arc<Metrics>,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            metrics,
            ttl,
        }
    }

    pub fn store(&self) -> &Arc<ItemStore> {
        &self.store
    }

    pub fn cache(&self) -> &CacheClient {
        &self.cache
    }

    /// Validate, then insert. Nothing is allocated when validation fails.
    pub async fn create(&self, request: CreateItem) -> Result<Item, ItemError> {
        let new = request.validate()?;
        let (item, revision) = self.store.create(new);

        self.populate(&item, revision).await;
        self.cache.delete(ITEMS_LIST_KEY).await;
        self.metrics.items_created.inc();

        info!(item_id = %item.id, "Created item");
        Ok(item)
    }

    pub async fn get(&self, id: Uuid) -> Result<Item, ItemError> {
        let key = item_key(id);

        if let CacheLookup::Hit(cached) = self.cache.get_json::<CachedItem>(&key).await {
            if self.store.revision(id) == Some(cached.revision) {
                self.metrics.record_cache_hit(GET_ITEM_OPERATION);
                return Ok(cached.item);
            }
            debug!(item_id = %id, "Ignoring stale cache entry");
        }
        self.metrics.record_cache_miss(GET_ITEM_OPERATION);

        let (item, revision) = self.store.get(id).ok_or(ItemError::NotFound(id))?;
        self.populate(&item, revision).await;
        Ok(item)
    }

    pub async fn update(&self, id: Uuid, request: UpdateItem) -> Result<Item, ItemError> {
        let patch = request.validate()?;
        let (item, revision) = self
            .store
            .update(id, patch)
            .ok_or(ItemError::NotFound(id))?;

        self.populate(&item, revision).await;
        self.cache.delete(ITEMS_LIST_KEY).await;

        info!(item_id = %id, "Updated item");
        Ok(item)
    }

    /// Deleting an id that does not exist (or no longer exists) is not-found
    pub async fn delete(&self, id: Uuid) -> Result<(), ItemError> {
        if !self.store.delete(id) {
            return Err(ItemError::NotFound(id));
        }

        self.cache.delete(&item_key(id)).await;
        self.cache.delete(ITEMS_LIST_KEY).await;
        self.metrics.items_deleted.inc();

        info!(item_id = %id, "Deleted item");
        Ok(())
    }

    pub fn list(&self, page: PageRequest) -> ItemPage {
        self.store.list(page)
    }

    /// Best effort; a failed write is already logged by the cache client
    async fn populate(&self, item: &Item, revision: u64) {
        let payload = CachedItem {
            revision,
            item: item.clone(),
        };
        self.cache.set_json(&item_key(item.id), &payload, self.ttl).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CacheError;
    use crate::cache::{CacheBackend, MemoryBackend};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Memory backend that can be switched off to simulate an outage
    #[derive(Default)]
    struct FlakyBackend {
        inner: MemoryBackend,
        down: AtomicBool,
    }

    impl FlakyBackend {
        fn check(&self) -> Result<(), CacheError> {
            if self.down.load(Ordering::SeqCst) {
                Err(CacheError::Connection("connection refused".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl CacheBackend for FlakyBackend {
        async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
            self.check()?;
            self.inner.get(key).await
        }
        async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
            self.check()?;
            self.inner.set(key, value, ttl).await
        }
        async fn delete(&self, key: &str) -> Result<(), CacheError> {
            self.check()?;
            self.inner.delete(key).await
        }
        async fn exists(&self, key: &str) -> Result<bool, CacheError> {
            self.check()?;
            self.inner.exists(key).await
        }
        async fn ping(&self) -> Result<(), CacheError> {
            self.check()
        }
        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    fn service_with(cache: CacheClient) -> ItemService {
        ItemService::new(
            Arc::new(ItemStore::new()),
            cache,
            Arc::new(Metrics::new().unwrap()),
            Duration::from_secs(60),
        )
    }

    fn flaky_service() -> (ItemService, Arc<FlakyBackend>) {
        let backend = Arc::new(FlakyBackend::default());
        let cache = CacheClient::new(
            backend.clone(),
            Duration::from_millis(100),
            Duration::from_millis(100),
        );
        (service_with(cache), backend)
    }

    fn widget() -> CreateItem {
        CreateItem {
            name: Some("widget".to_string()),
            price: Some(9.99),
            ..CreateItem::default()
        }
    }

    #[tokio::test]
    async fn test_get_is_served_from_cache() {
        let (service, _backend) = flaky_service();
        let item = service.create(widget()).await.unwrap();

        assert_eq!(service.get(item.id).await.unwrap(), item);
        assert_eq!(
            service
                .metrics
                .cache_hits
                .with_label_values(&[GET_ITEM_OPERATION])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn test_results_identical_without_cache() {
        let (cached, _backend) = flaky_service();
        let uncached = service_with(CacheClient::disabled());

        for service in [&cached, &uncached] {
            let item = service.create(widget()).await.unwrap();
            assert_eq!(service.get(item.id).await.unwrap(), item);

            let update = UpdateItem {
                quantity: Some(4),
                ..UpdateItem::default()
            };
            let updated = service.update(item.id, update).await.unwrap();
            assert_eq!(service.get(item.id).await.unwrap(), updated);

            service.delete(item.id).await.unwrap();
            assert_eq!(
                service.get(item.id).await,
                Err(ItemError::NotFound(item.id))
            );
        }
    }

    #[tokio::test]
    async fn test_outage_does_not_resurface_stale_entries() {
        let (service, backend) = flaky_service();
        let item = service.create(widget()).await.unwrap();

        // Update and delete while the cache cannot be told about them
        backend.down.store(true, Ordering::SeqCst);
        let update = UpdateItem {
            name: Some("gadget".to_string()),
            ..UpdateItem::default()
        };
        let updated = service.update(item.id, update).await.unwrap();
        backend.down.store(false, Ordering::SeqCst);

        assert_eq!(service.get(item.id).await.unwrap(), updated);

        backend.down.store(true, Ordering::SeqCst);
        service.delete(item.id).await.unwrap();
        backend.down.store(false, Ordering::SeqCst);

        assert_eq!(
            service.get(item.id).await,
            Err(ItemError::NotFound(item.id))
        );
    }

    #[tokio::test]
    async fn test_invalid_create_allocates_nothing() {
        let (service, backend) = flaky_service();
        let request = CreateItem {
            name: Some(String::new()),
            price: Some(-1.0),
            ..CreateItem::default()
        };

        assert!(matches!(
            service.create(request).await,
            Err(ItemError::Validation(_))
        ));
        assert!(service.store().is_empty());
        assert!(backend.inner.is_empty());
        assert_eq!(service.metrics.items_created.get(), 0);
    }

    #[tokio::test]
    async fn test_delete_twice_is_not_found() {
        let (service, _backend) = flaky_service();
        let item = service.create(widget()).await.unwrap();

        assert!(service.delete(item.id).await.is_ok());
        assert_eq!(
            service.delete(item.id).await,
            Err(ItemError::NotFound(item.id))
        );
        let missing = Uuid::new_v4();
        assert_eq!(
            service.delete(missing).await,
            Err(ItemError::NotFound(missing))
        );
        assert_eq!(service.metrics.items_deleted.get(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let service = service_with(CacheClient::disabled());
        let missing = Uuid::new_v4();
        assert_eq!(
            service.update(missing, UpdateItem::default()).await,
            Err(ItemError::NotFound(missing))
        );
    }
}
