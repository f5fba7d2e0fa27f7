//! Analytics Ticker - 编辑时长统计

use std::sync::Arc;
use std::time::Duration;

use crate::application::Orchestrator;

/// 每经过一个周期记一次编辑秒数
pub struct AnalyticsTicker {
    orchestrator: Arc<Orchestrator>,
    period: Duration,
}

impl AnalyticsTicker {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            period: Duration::from_secs(1),
        }
    }

    /// 调整计时周期（每个周期仍只记一秒）
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub async fn run(self) {
        tracing::debug!("AnalyticsTicker started");
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // 第一次 tick 立即完成
        interval.tick().await;
        loop {
            interval.tick().await;
            self.orchestrator.record_editing_second();
        }
    }
}
