//! Batch Confirmation - 批量生成的一致性确认
//!
//! 一致性警告发布后，批量任务在这里挂起，直到 HTTP 请求给出答复。

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::oneshot;

use crate::application::ports::{BatchConfirmationPort, ConsistencyWarning};

/// 通过 HTTP 答复的确认端口
#[derive(Default)]
pub struct PendingConfirmations {
    /// beat_id -> 等待中的答复
    waiting: DashMap<String, oneshot::Sender<bool>>,
}

impl PendingConfirmations {
    pub fn new() -> Self {
        Self::default()
    }

    /// 答复指定情节点的警告，返回是否存在等待中的确认
    pub fn resolve(&self, beat_id: &str, approve: bool) -> bool {
        match self.waiting.remove(beat_id) {
            Some((_, tx)) => {
                tracing::info!(beat_id, approve, "Consistency warning answered");
                tx.send(approve).is_ok()
            }
            None => false,
        }
    }

    /// 等待答复的情节点
    pub fn pending(&self) -> Vec<String> {
        self.waiting.iter().map(|entry| entry.key().clone()).collect()
    }
}

#[async_trait]
impl BatchConfirmationPort for PendingConfirmations {
    async fn confirm(&self, warning: &ConsistencyWarning) -> bool {
        let (tx, rx) = oneshot::channel();
        if self.waiting.insert(warning.beat.id.clone(), tx).is_some() {
            tracing::warn!(beat_id = %warning.beat.id, "Replacing stale confirmation request");
        }
        tracing::info!(beat_id = %warning.beat.id, issues = warning.issues.len(), "Waiting for confirmation");

        // 发送端被丢弃视为拒绝
        rx.await.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::manuscript::Beat;
    use std::sync::Arc;
    use std::time::Duration;

    fn warning(id: &str) -> ConsistencyWarning {
        ConsistencyWarning {
            beat: Beat::new(id, "Mira returns"),
            issues: vec!["Mira died in beat 1.".to_string()],
        }
    }

    async fn wait_until_pending(confirmations: &PendingConfirmations, id: &str) {
        for _ in 0..100 {
            if confirmations.pending().iter().any(|p| p == id) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("confirmation for {id} never registered");
    }

    #[tokio::test]
    async fn test_confirm_waits_for_answer() {
        let confirmations = Arc::new(PendingConfirmations::new());
        let waiter = {
            let confirmations = confirmations.clone();
            tokio::spawn(async move { confirmations.confirm(&warning("2")).await })
        };

        wait_until_pending(&confirmations, "2").await;
        assert!(confirmations.resolve("2", true));
        assert!(waiter.await.unwrap());
        assert!(confirmations.pending().is_empty());
    }

    #[tokio::test]
    async fn test_decline_and_unknown_beat() {
        let confirmations = Arc::new(PendingConfirmations::new());
        assert!(!confirmations.resolve("9", true));

        let waiter = {
            let confirmations = confirmations.clone();
            tokio::spawn(async move { confirmations.confirm(&warning("3")).await })
        };
        wait_until_pending(&confirmations, "3").await;
        confirmations.resolve("3", false);
        assert!(!waiter.await.unwrap());
    }
}
