//! In-memory item store
//!
//! Items are kept in insertion order. Every mutation takes the write lock for
//! its whole duration, so each operation is atomic; nothing is ordered across
//! concurrent writers beyond that.

use super::model::{Item, ItemPatch, NewItem};
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Page request, already clamped to valid bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub page_size: usize,
}

impl PageRequest {
    pub const DEFAULT_PAGE_SIZE: usize = 10;
    pub const MAX_PAGE_SIZE: usize = 100;

    fn offset(self) -> usize {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }
}

/// One page of items
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ItemPage {
    pub items: Vec<Item>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

#[derive(Debug)]
struct Slot {
    revision: u64,
    item: Item,
}

#[derive(Debug, Default)]
struct Inner {
    next_seq: u64,
    next_revision: u64,
    by_seq: BTreeMap<u64, Slot>,
    index: HashMap<Uuid, u64>,
}

impl Inner {
    fn slot_mut(&mut self, id: Uuid) -> Option<&mut Slot> {
        let seq = *self.index.get(&id)?;
        self.by_seq.get_mut(&seq)
    }

    fn bump_revision(&mut self) -> u64 {
        self.next_revision += 1;
        self.next_revision
    }
}

/// Thread-safe item map
#[derive(Debug, Default)]
pub struct ItemStore {
    inner: RwLock<Inner>,
}

impl ItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a validated item under a fresh id
    pub fn create(&self, new: NewItem) -> (Item, u64) {
        let now = Utc::now();
        let mut inner = self.inner.write();

        let mut id = Uuid::new_v4();
        while inner.index.contains_key(&id) {
            id = Uuid::new_v4();
        }

        let item = Item {
            id,
            name: new.name,
            description: new.description,
            price: new.price,
            quantity: new.quantity,
            tags: new.tags,
            created_at: now,
            updated_at: now,
        };

        let seq = inner.next_seq;
        inner.next_seq += 1;
        let revision = inner.bump_revision();
        inner.index.insert(id, seq);
        inner.by_seq.insert(
            seq,
            Slot {
                revision,
                item: item.clone(),
            },
        );

        (item, revision)
    }

    pub fn get(&self, id: Uuid) -> Option<(Item, u64)> {
        let inner = self.inner.read();
        let seq = inner.index.get(&id)?;
        inner
            .by_seq
            .get(seq)
            .map(|slot| (slot.item.clone(), slot.revision))
    }

    /// Current revision of an item, if it exists
    pub fn revision(&self, id: Uuid) -> Option<u64> {
        let inner = self.inner.read();
        let seq = inner.index.get(&id)?;
        inner.by_seq.get(seq).map(|slot| slot.revision)
    }

    /// Merge `patch` into the item and bump `updated_at`
    pub fn update(&self, id: Uuid, patch: ItemPatch) -> Option<(Item, u64)> {
        let mut inner = self.inner.write();
        let revision = inner.bump_revision();
        let slot = inner.slot_mut(id)?;

        patch.apply(&mut slot.item);
        slot.item.updated_at = Utc::now();
        slot.revision = revision;

        Some((slot.item.clone(), revision))
    }

    /// Returns `true` if the item existed
    pub fn delete(&self, id: Uuid) -> bool {
        let mut inner = self.inner.write();
        match inner.index.remove(&id) {
            Some(seq) => inner.by_seq.remove(&seq).is_some(),
            None => false,
        }
    }

    pub fn list(&self, page: PageRequest) -> ItemPage {
        let inner = self.inner.read();
        let total = inner.by_seq.len();
        let items = inner
            .by_seq
            .values()
            .skip(page.offset())
            .take(page.page_size)
            .map(|slot| slot.item.clone())
            .collect();

        ItemPage {
            items,
            total,
            page: page.page,
            page_size: page.page_size,
            total_pages: total.div_ceil(page.page_size).max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn new_item(name: &str, price: f64) -> NewItem {
        NewItem {
            name: name.to_string(),
            description: None,
            price,
            quantity: 0,
            tags: Vec::new(),
        }
    }

    #[test]
    fn test_create_get() {
        let store = ItemStore::new();
        let (item, revision) = store.create(new_item("widget", 9.99));

        let (fetched, fetched_revision) = store.get(item.id).unwrap();
        assert_eq!(fetched, item);
        assert_eq!(fetched_revision, revision);
        assert_eq!(item.created_at, item.updated_at);
    }

    #[test]
    fn test_get_nonexistent() {
        let store = ItemStore::new();
        assert!(store.get(Uuid::new_v4()).is_none());
        assert!(store.revision(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_update_merges_and_bumps() {
        let store = ItemStore::new();
        let (item, revision) = store.create(new_item("widget", 9.99));

        let patch = ItemPatch {
            price: Some(12.0),
            ..ItemPatch::default()
        };
        let (updated, new_revision) = store.update(item.id, patch).unwrap();

        assert_eq!(updated.name, "widget");
        assert!((updated.price - 12.0).abs() < f64::EPSILON);
        assert!(updated.updated_at >= item.updated_at);
        assert_eq!(updated.created_at, item.created_at);
        assert!(new_revision > revision);
        assert_eq!(store.revision(item.id), Some(new_revision));
    }

    #[test]
    fn test_update_nonexistent() {
        let store = ItemStore::new();
        assert!(store.update(Uuid::new_v4(), ItemPatch::default()).is_none());
    }

    #[test]
    fn test_delete() {
        let store = ItemStore::new();
        assert!(!store.delete(Uuid::new_v4()));

        let (item, _) = store.create(new_item("widget", 1.0));
        assert!(store.delete(item.id));
        assert!(!store.delete(item.id));
        assert!(store.get(item.id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_list_pagination_keeps_insertion_order() {
        let store = ItemStore::new();
        let names: Vec<String> = (0..25).map(|i| format!("item-{i}")).collect();
        for name in &names {
            store.create(new_item(name, 1.0));
        }

        let page = store.list(PageRequest {
            page: 3,
            page_size: 10,
        });
        assert_eq!(page.total, 25);
        assert_eq!(page.total_pages, 3);
        let got: Vec<_> = page.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(got, vec!["item-20", "item-21", "item-22", "item-23", "item-24"]);

        let beyond = store.list(PageRequest {
            page: 9,
            page_size: 10,
        });
        assert!(beyond.items.is_empty());
    }

    #[test]
    fn test_empty_list_has_one_page() {
        let page = ItemStore::new().list(PageRequest::default());
        assert_eq!(page.total, 0);
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn test_concurrent_creates_have_unique_ids() {
        let store = Arc::new(ItemStore::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    (0..100)
                        .map(|i| store.create(new_item(&format!("{t}-{i}"), 1.0)).0.id)
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ids: Vec<Uuid> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 800);
        assert_eq!(store.len(), 800);
    }
}
