//! Persistence Layer - 数据持久化
//!
//! Sled 项目存档

pub mod sled;

pub use self::sled::{SledProjectStore, SledStoreConfig};
