//! Sled 存储实现

mod project_store;

pub use project_store::{SledProjectStore, SledStoreConfig};
