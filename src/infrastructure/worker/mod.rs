//! Worker Layer - Background Task Processing
//!
//! 自动保存与编辑时长统计

mod analytics_ticker;
mod autosave_worker;

pub use analytics_ticker::AnalyticsTicker;
pub use autosave_worker::{save_project, AutosaveWorker, AutosaveWorkerConfig};
