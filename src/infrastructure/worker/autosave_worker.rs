//! Autosave Worker - 防抖自动保存
//!
//! 订阅会话事件，状态变化后等待一段安静期再保存；期间的新变化会推迟保存。
//! 只有在元数据存在且至少有一章时才会写入。

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::Instant;

use crate::application::ports::{ProjectStorePort, SessionEvent};
use crate::application::Orchestrator;

/// Worker 配置
#[derive(Debug, Clone)]
pub struct AutosaveWorkerConfig {
    /// 最后一次变化之后的等待时间
    pub debounce: Duration,
}

impl Default for AutosaveWorkerConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(5000),
        }
    }
}

/// 自动保存 Worker
pub struct AutosaveWorker {
    config: AutosaveWorkerConfig,
    events: broadcast::Receiver<SessionEvent>,
    orchestrator: Arc<Orchestrator>,
    store: Arc<dyn ProjectStorePort>,
}

impl AutosaveWorker {
    pub fn new(
        config: AutosaveWorkerConfig,
        events: broadcast::Receiver<SessionEvent>,
        orchestrator: Arc<Orchestrator>,
        store: Arc<dyn ProjectStorePort>,
    ) -> Self {
        Self {
            config,
            events,
            orchestrator,
            store,
        }
    }

    /// 启动 Worker，事件通道关闭时做最后一次保存后退出
    pub async fn run(mut self) {
        tracing::info!(debounce_ms = self.config.debounce.as_millis() as u64, "AutosaveWorker started");

        let mut deadline: Option<Instant> = None;
        loop {
            let wait = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                received = self.events.recv() => match received {
                    Ok(event) if event.is_state_change() => {
                        deadline = Some(Instant::now() + self.config.debounce);
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "AutosaveWorker lagged behind events");
                        deadline = Some(Instant::now() + self.config.debounce);
                    }
                    Err(RecvError::Closed) => {
                        if deadline.is_some() {
                            self.save_now().await;
                        }
                        break;
                    }
                },
                () = wait => {
                    deadline = None;
                    self.save_now().await;
                }
            }
        }

        tracing::info!("AutosaveWorker stopped");
    }

    /// 立即保存（不满足保存条件时跳过），返回是否写入
    pub async fn save_now(&self) -> bool {
        save_project(&self.orchestrator, self.store.as_ref()).await
    }
}

/// 保存当前项目并记录保存时间
pub async fn save_project(orchestrator: &Orchestrator, store: &dyn ProjectStorePort) -> bool {
    if !orchestrator.is_saveable() {
        tracing::debug!("Nothing to save yet");
        return false;
    }

    let now = Utc::now();
    let mut state = orchestrator.project_state().await;
    state.last_saved = now;

    match store.save(&state).await {
        Ok(()) => {
            orchestrator.mark_saved(now);
            tracing::info!(chapters = state.chapters.len(), "Project autosaved");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Autosave failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::commands::{ConfirmBeats, LoadManuscript, SubmitConfiguration, SubmitMetadata};
    use crate::application::ports::EventSinkPort;
    use crate::application::OrchestratorSettings;
    use crate::domain::manuscript::{GenerationConfig, NovelMetadata};
    use crate::domain::response_parser::STRATEGIC_SPLIT;
    use crate::infrastructure::adapters::generation::ScriptedGenerator;
    use crate::infrastructure::events::EventPublisher;
    use crate::infrastructure::persistence::sled::SledProjectStore;
    use tempfile::tempdir;

    async fn orchestrator_with_chapter(events: Arc<EventPublisher>) -> Arc<Orchestrator> {
        let generator = Arc::new(ScriptedGenerator::new());
        let settings = OrchestratorSettings {
            auto_pilot_delay: Duration::ZERO,
            ..Default::default()
        };
        let orchestrator = Orchestrator::new(generator.clone(), events, settings);

        generator.push_text("{}");
        orchestrator
            .load_manuscript(LoadManuscript {
                text: "The river rose.".to_string(),
            })
            .unwrap()
            .await
            .unwrap();
        orchestrator
            .submit_metadata(SubmitMetadata {
                metadata: NovelMetadata {
                    title: "Flood".to_string(),
                    ..Default::default()
                },
            })
            .unwrap();
        generator.push_text(r#"{"beats":[{"id":"1","description":"Rising water"}]}"#);
        let beats = orchestrator
            .submit_configuration(SubmitConfiguration {
                config: GenerationConfig::default(),
            })
            .unwrap()
            .await
            .unwrap();
        generator.push_text("Spare.");
        generator.push_text(format!(
            "The river rose over the wall.{STRATEGIC_SPLIT}{{\"pacingScore\":4,\"choices\":[]}}"
        ));
        orchestrator
            .confirm_beats(ConfirmBeats { beats })
            .unwrap()
            .await
            .unwrap();
        orchestrator
    }

    #[tokio::test]
    async fn test_save_skipped_before_first_chapter() {
        let dir = tempdir().unwrap();
        let store = SledProjectStore::open(dir.path().join("test.sled")).unwrap();
        let events = Arc::new(EventPublisher::new());
        let orchestrator = Orchestrator::new(
            Arc::new(ScriptedGenerator::new()),
            events,
            OrchestratorSettings::default(),
        );

        assert!(!save_project(&orchestrator, &store).await);
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_debounced_save_after_state_change() {
        let dir = tempdir().unwrap();
        let store = Arc::new(SledProjectStore::open(dir.path().join("test.sled")).unwrap());
        let events = Arc::new(EventPublisher::new());
        let orchestrator = orchestrator_with_chapter(events.clone()).await;

        let worker = AutosaveWorker::new(
            AutosaveWorkerConfig {
                debounce: Duration::from_millis(20),
            },
            events.subscribe(),
            orchestrator.clone(),
            store.clone(),
        );
        let handle = tokio::spawn(worker.run());

        events.publish(SessionEvent::ChaptersReordered { order: vec![1] });
        tokio::time::sleep(Duration::from_millis(200)).await;

        let saved = store.load().await.unwrap().unwrap();
        assert_eq!(saved.metadata.title, "Flood");
        assert_eq!(saved.chapters.len(), 1);
        assert!(orchestrator.snapshot().last_saved.is_some());

        handle.abort();
    }
}
