//! HTTP Handlers
//!
//! 长任务（生成周期、精修、自动驾驶、批量、混沌）在 handler 里同步完成忙碌与阶段检查，
//! 然后交给后台运行并立即返回；进度通过 /ws/events 推送。

mod automation;
mod chapters;
mod export;
mod generation;
mod knowledge;
mod ping;
mod session;
mod websocket;

pub use automation::*;
pub use chapters::*;
pub use export::*;
pub use generation::*;
pub use knowledge::*;
pub use ping::*;
pub use session::*;
pub use websocket::*;

use crate::application::CycleTask;

/// 在后台运行编排任务
///
/// 失败已由编排器记录并广播给客户端，这里只补一条带操作名的日志。
pub(crate) fn spawn_task<T: Send + 'static>(operation: &'static str, task: CycleTask<T>) {
    tokio::spawn(async move {
        match task.await {
            Ok(_) => tracing::debug!(operation, "Background operation finished"),
            Err(e) => tracing::warn!(operation, error = %e, "Background operation failed"),
        }
    });
}
