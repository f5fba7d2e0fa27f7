//! Batch Confirmation Port - 一致性警告的用户确认
//!
//! 批量生成遇到一致性警告时暂停，由外部（HTTP 或测试）决定继续还是中止。

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::manuscript::Beat;

/// 一致性警告
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsistencyWarning {
    pub beat: Beat,
    pub issues: Vec<String>,
}

#[async_trait]
pub trait BatchConfirmationPort: Send + Sync {
    /// 返回 true 继续批量生成，false 中止剩余情节点
    async fn confirm(&self, warning: &ConsistencyWarning) -> bool;
}
