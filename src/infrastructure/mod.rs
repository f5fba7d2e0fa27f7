//! Infrastructure Layer - 基础设施层
//!
//! 提供所有端口的具体实现

pub mod adapters;
pub mod confirmation;
pub mod events;
pub mod export;
pub mod http;
pub mod persistence;
pub mod worker;

pub use confirmation::PendingConfirmations;
pub use events::EventPublisher;
pub use persistence::sled::SledProjectStore;
pub use worker::{AnalyticsTicker, AutosaveWorker, AutosaveWorkerConfig};
