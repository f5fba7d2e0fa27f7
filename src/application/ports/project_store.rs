//! Project Store Port - 项目存档抽象
//!
//! 单一固定槽位的保存 / 读取接口

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::ProjectState;

/// 存档错误
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Project Store Port
#[async_trait]
pub trait ProjectStorePort: Send + Sync {
    /// 覆盖保存当前项目
    async fn save(&self, state: &ProjectState) -> Result<(), StoreError>;

    /// 读取已保存的项目，不存在时返回 None
    async fn load(&self) -> Result<Option<ProjectState>, StoreError>;
}
