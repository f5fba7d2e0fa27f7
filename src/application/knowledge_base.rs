//! 设定库（单写者）
//!
//! 所有写入都经由一个 mpsc 队列交给唯一的写者任务，写者在应用时读取最新状态，
//! 因此后台抽取任务与手动编辑之间不会互相覆盖。读者拿快照。

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch, RwLock};

use crate::application::extraction::ExtractionService;
use crate::application::ports::{EventSinkPort, SessionEvent};
use crate::domain::knowledge::{
    CharacterUpdate, KnowledgeDelta, KnowledgeStore, LoreCandidate, LoreExtraction,
};

/// 对设定库的一次写入
#[derive(Debug, Clone)]
pub enum KnowledgeUpdate {
    /// 后台抽取结果
    Extracted(LoreExtraction),
    /// 手动添加设定条目
    AddLore(LoreCandidate),
    /// 手动更新角色
    UpsertCharacter(CharacterUpdate),
}

struct Command {
    update: KnowledgeUpdate,
    ack: Option<oneshot::Sender<KnowledgeDelta>>,
}

/// 设定库
pub struct KnowledgeBase {
    store: Arc<RwLock<KnowledgeStore>>,
    tx: mpsc::UnboundedSender<Command>,
    /// 尚未完成的后台任务与排队写入数量
    pending: Arc<watch::Sender<usize>>,
    extraction: Arc<ExtractionService>,
}

impl KnowledgeBase {
    /// 创建设定库并启动写者任务（需要在 tokio 运行时中调用）
    pub fn new(
        initial: KnowledgeStore,
        extraction: Arc<ExtractionService>,
        events: Arc<dyn EventSinkPort>,
    ) -> Arc<Self> {
        let store = Arc::new(RwLock::new(initial));
        let (tx, rx) = mpsc::unbounded_channel();
        let (pending, _) = watch::channel(0usize);
        let pending = Arc::new(pending);

        tokio::spawn(run_writer(rx, store.clone(), pending.clone(), events));

        Arc::new(Self {
            store,
            tx,
            pending,
            extraction,
        })
    }

    /// 提交写入，不等待结果
    pub fn submit(&self, update: KnowledgeUpdate) {
        self.enqueue(update, None);
    }

    /// 提交写入并等待写者应用完成
    pub async fn apply(&self, update: KnowledgeUpdate) -> KnowledgeDelta {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.enqueue(update, Some(ack_tx));
        ack_rx.await.unwrap_or_default()
    }

    fn enqueue(&self, update: KnowledgeUpdate, ack: Option<oneshot::Sender<KnowledgeDelta>>) {
        self.pending.send_modify(|n| *n += 1);
        if self.tx.send(Command { update, ack }).is_err() {
            tracing::error!("Knowledge writer stopped, update dropped");
            self.pending.send_modify(|n| *n = n.saturating_sub(1));
        }
    }

    /// 启动后台设定抽取（不等待）
    ///
    /// 结果在完成时按当时的最新状态合并，而不是启动时的快照。
    pub fn spawn_extraction(self: &Arc<Self>, text: String) {
        self.pending.send_modify(|n| *n += 1);
        let this = self.clone();
        tokio::spawn(async move {
            if let Some(extraction) = this.extraction.extract_lore(&text).await {
                if extraction.is_empty() {
                    tracing::debug!("Lore extraction returned nothing new");
                } else {
                    this.submit(KnowledgeUpdate::Extracted(extraction));
                }
            }
            this.pending.send_modify(|n| *n = n.saturating_sub(1));
        });
    }

    /// 等待所有后台抽取与排队写入完成
    pub async fn wait_idle(&self) {
        let mut rx = self.pending.subscribe();
        if rx.wait_for(|n| *n == 0).await.is_err() {
            tracing::warn!("Knowledge pending counter closed");
        }
    }

    pub fn pending(&self) -> usize {
        *self.pending.borrow()
    }

    pub async fn snapshot(&self) -> KnowledgeStore {
        self.store.read().await.clone()
    }

    pub async fn retrieve_context(&self, query: &str) -> String {
        self.store.read().await.retrieve_context(query)
    }
}

async fn run_writer(
    mut rx: mpsc::UnboundedReceiver<Command>,
    store: Arc<RwLock<KnowledgeStore>>,
    pending: Arc<watch::Sender<usize>>,
    events: Arc<dyn EventSinkPort>,
) {
    tracing::debug!("Knowledge writer started");

    while let Some(Command { update, ack }) = rx.recv().await {
        let (delta, lore_count, character_count) = {
            let mut store = store.write().await;
            let delta = match &update {
                KnowledgeUpdate::Extracted(extraction) => store.apply(extraction),
                KnowledgeUpdate::AddLore(candidate) => KnowledgeDelta {
                    lore_added: usize::from(store.add_lore(candidate.clone())),
                    characters_touched: 0,
                },
                KnowledgeUpdate::UpsertCharacter(character) => {
                    store.upsert_character(character.clone());
                    KnowledgeDelta {
                        lore_added: 0,
                        characters_touched: 1,
                    }
                }
            };
            (delta, store.lore().len(), store.characters().len())
        };

        if !delta.is_empty() {
            tracing::info!(
                lore_added = delta.lore_added,
                characters_touched = delta.characters_touched,
                "Knowledge store updated"
            );
            events.publish(SessionEvent::KnowledgeUpdated {
                lore_count,
                character_count,
            });
        }
        if let Some(ack) = ack {
            let _ = ack.send(delta);
        }
        pending.send_modify(|n| *n = n.saturating_sub(1));
    }

    tracing::debug!("Knowledge writer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::extraction::ModelConfig;
    use crate::application::ports::NoopEventSink;
    use crate::infrastructure::adapters::generation::ScriptedGenerator;

    fn knowledge_base(generator: Arc<ScriptedGenerator>) -> Arc<KnowledgeBase> {
        let extraction = Arc::new(ExtractionService::new(
            generator,
            ModelConfig {
                analysis_model: "a".to_string(),
                drafting_model: "d".to_string(),
            },
        ));
        KnowledgeBase::new(KnowledgeStore::new(), extraction, Arc::new(NoopEventSink))
    }

    #[tokio::test]
    async fn test_detached_extraction_merges_against_latest_state() {
        let generator = Arc::new(ScriptedGenerator::new());
        generator.push_text(
            r#"{"lore":[{"key":"Ashford","description":"from extraction"}],
                "characters":[{"name":"mira","location":"Docks"}]}"#,
        );
        let kb = knowledge_base(generator);

        let mut goal = CharacterUpdate::named("Mira");
        goal.goal = Some("Escape".to_string());
        kb.apply(KnowledgeUpdate::UpsertCharacter(goal)).await;

        kb.spawn_extraction("Mira reached Ashford.".to_string());
        kb.wait_idle().await;

        let store = kb.snapshot().await;
        assert_eq!(store.lore().len(), 1);
        assert_eq!(store.characters().len(), 1);
        assert_eq!(store.characters()[0].goal, "Escape");
        assert_eq!(store.characters()[0].location, "Docks");
        assert_eq!(kb.pending(), 0);
    }

    #[tokio::test]
    async fn test_failed_extraction_applies_nothing() {
        let generator = Arc::new(ScriptedGenerator::new());
        generator.push_text("garbage");
        let kb = knowledge_base(generator);

        kb.spawn_extraction("text".to_string());
        kb.wait_idle().await;

        assert!(kb.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_manual_lore_is_first_write_wins() {
        let kb = knowledge_base(Arc::new(ScriptedGenerator::new()));
        let candidate = |d: &str| LoreCandidate::new("Relic", d);

        let first = kb.apply(KnowledgeUpdate::AddLore(candidate("first"))).await;
        let second = kb.apply(KnowledgeUpdate::AddLore(candidate("second"))).await;

        assert_eq!(first.lore_added, 1);
        assert_eq!(second.lore_added, 0);
        assert_eq!(kb.snapshot().await.lore()[0].description, "first");
        assert!(kb.retrieve_context("the relic glows").await.contains("Relic"));
    }
}
