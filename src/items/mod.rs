//! Items resource: records, validation, storage and cached access

mod model;
mod service;
mod store;

pub use model::{CreateItem, DESCRIPTION_MAX_CHARS, Item, ItemPatch, NAME_MAX_CHARS, NewItem, UpdateItem};
pub use service::{ITEM_KEY_PREFIX, ITEMS_LIST_KEY, ItemService, item_key};
pub use store::{ItemPage, ItemStore, PageRequest};
