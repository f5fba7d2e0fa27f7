//! Sled-based Project Store Implementation
//!
//! 单一固定槽位：每次保存整体覆盖上一次的快照。

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use sled::Db;

use crate::application::ports::{ProjectStorePort, StoreError};
use crate::domain::ProjectState;

/// 当前项目的存储键
const PROJECT_KEY: &str = "project:current";

/// Sled 存档配置
#[derive(Debug, Clone)]
pub struct SledStoreConfig {
    /// 数据库路径
    pub db_path: String,
}

impl Default for SledStoreConfig {
    fn default() -> Self {
        Self {
            db_path: "data/quill.sled".to_string(),
        }
    }
}

/// Sled 项目存档
pub struct SledProjectStore {
    db: Db,
}

impl SledProjectStore {
    pub fn new(config: &SledStoreConfig) -> Result<Self, StoreError> {
        let db = sled::open(&config.db_path).map_err(|e| StoreError::DatabaseError(e.to_string()))?;
        tracing::info!(
            db_path = %config.db_path,
            has_project = db.contains_key(PROJECT_KEY).unwrap_or(false),
            "SledProjectStore initialized"
        );
        Ok(Self { db })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let config = SledStoreConfig {
            db_path: path.as_ref().to_string_lossy().to_string(),
        };
        Self::new(&config)
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 刷新数据库
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db
            .flush()
            .map_err(|e| StoreError::DatabaseError(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ProjectStorePort for SledProjectStore {
    async fn save(&self, state: &ProjectState) -> Result<(), StoreError> {
        let bytes =
            bincode::serialize(state).map_err(|e| StoreError::SerializationError(e.to_string()))?;
        self.db
            .insert(PROJECT_KEY, bytes)
            .map_err(|e| StoreError::DatabaseError(e.to_string()))?;
        self.flush()?;

        tracing::debug!(
            chapters = state.chapters.len(),
            lore = state.lore.len(),
            "Project saved"
        );
        Ok(())
    }

    async fn load(&self) -> Result<Option<ProjectState>, StoreError> {
        let Some(bytes) = self
            .db
            .get(PROJECT_KEY)
            .map_err(|e| StoreError::DatabaseError(e.to_string()))?
        else {
            return Ok(None);
        };
        let state = bincode::deserialize::<ProjectState>(&bytes)
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;
        Ok(Some(state))
    }
}
