use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::*;
use crate::application::commands::*;
use crate::application::ports::{BatchConfirmationPort, ConsistencyWarning, NoopEventSink};
use crate::domain::manuscript::{ChoiceType, GenerationConfig, PacingSpeed};
use crate::domain::response_parser::STRATEGIC_SPLIT;
use crate::infrastructure::adapters::generation::ScriptedGenerator;

fn payload(prose: &str, pacing: u8) -> String {
    format!(
        "{prose}{STRATEGIC_SPLIT}{{\"pacingScore\":{pacing},\"choices\":[\
         {{\"id\":\"A\",\"text\":\"Continue\",\"rationale\":\"r\",\"type\":\"Other\"}}]}}"
    )
}

fn settings() -> OrchestratorSettings {
    OrchestratorSettings {
        auto_pilot_delay: Duration::ZERO,
        chunking: ChunkConfig {
            rough_word_count: 2,
        },
        ..Default::default()
    }
}

/// 每段两个词，按上面的分块设置正好一段一块
fn manuscript(chunks: usize) -> String {
    (1..=chunks)
        .map(|i| format!("Segment {i}."))
        .collect::<Vec<_>>()
        .join("\n\n")
}

struct Harness {
    generator: Arc<ScriptedGenerator>,
    orchestrator: Arc<Orchestrator>,
}

impl Harness {
    fn new() -> Self {
        let generator = Arc::new(ScriptedGenerator::new());
        let orchestrator = Orchestrator::new(generator.clone(), Arc::new(NoopEventSink), settings());
        Self {
            generator,
            orchestrator,
        }
    }

    /// 走完开篇流程直到 BeatSheet
    async fn to_beat_sheet(&self, chunks: usize, beats: usize, config: GenerationConfig) {
        self.generator.push_text("{}");
        self.orchestrator
            .load_manuscript(LoadManuscript {
                text: manuscript(chunks),
            })
            .unwrap()
            .await
            .unwrap();
        assert_eq!(self.orchestrator.phase(), Phase::Setup);

        self.orchestrator
            .submit_metadata(SubmitMetadata {
                metadata: NovelMetadata {
                    title: "The Drowned City".to_string(),
                    ..Default::default()
                },
            })
            .unwrap();

        let beat_json = (1..=beats)
            .map(|i| format!("{{\"id\":\"{i}\",\"description\":\"Beat {i}\"}}"))
            .collect::<Vec<_>>()
            .join(",");
        self.generator.push_text(format!("{{\"beats\":[{beat_json}]}}"));
        let sheet = self
            .orchestrator
            .submit_configuration(SubmitConfiguration { config })
            .unwrap()
            .await
            .unwrap();
        assert_eq!(sheet.len(), beats);
        assert_eq!(self.orchestrator.phase(), Phase::BeatSheet);
    }

    /// 确认大纲并生成第一章
    async fn start(&self, chunks: usize, beats: usize, config: GenerationConfig) {
        self.to_beat_sheet(chunks, beats, config).await;
        let beats = self.orchestrator.snapshot().metadata.unwrap().beat_sheet;
        self.generator.push_text("Lean, wet, clipped prose.");
        self.generator.push_text(payload("Chapter one text.", 7));
        let phase = self
            .orchestrator
            .confirm_beats(ConfirmBeats { beats })
            .unwrap()
            .await
            .unwrap();
        assert_eq!(phase, Phase::Decision);
    }

    async fn decide(&self, choice: &str) -> Result<Phase, ApplicationError> {
        self.orchestrator.decide(Decide::new(choice))?.await
    }
}

fn slow_config() -> GenerationConfig {
    GenerationConfig {
        pacing_speed: PacingSpeed::SlowBurn,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_end_to_end_two_chunks_one_beat() {
    let h = Harness::new();
    h.start(2, 1, GenerationConfig::default()).await;

    let snapshot = h.orchestrator.snapshot();
    assert_eq!(snapshot.phase, Phase::Decision);
    assert_eq!(snapshot.chapters.len(), 1);
    assert_eq!(snapshot.chapters[0].content(), "Chapter one text.");
    assert_eq!(snapshot.chapters[0].pacing_score().value(), 7);
    assert_eq!(snapshot.choices[0].text, "Continue");
    assert_eq!(snapshot.cursor, 1);
    assert_eq!(
        snapshot.metadata.unwrap().style_dna.as_deref(),
        Some("Lean, wet, clipped prose.")
    );

    h.generator.push_text(payload("Chapter two text.", 4));
    assert_eq!(h.decide("Continue").await.unwrap(), Phase::Decision);
    let last_prompt = h.generator.requests().last().unwrap().prompt.clone();
    assert!(last_prompt.contains("Segment 2."));
    assert!(last_prompt.contains("Chapter one text."));

    let snapshot = h.orchestrator.snapshot();
    assert_eq!(snapshot.chapters.len(), 2);
    assert_eq!(snapshot.cursor, 2);

    assert_eq!(h.decide("Continue").await.unwrap(), Phase::Finished);
    assert_eq!(h.orchestrator.phase(), Phase::Finished);
    assert_eq!(h.generator.remaining(), 0);
    assert!(!h.orchestrator.is_busy());
}

#[tokio::test]
async fn test_pacing_escalation_and_breathing_room() {
    let h = Harness::new();
    let fast = GenerationConfig {
        pacing_speed: PacingSpeed::Fast,
        ..Default::default()
    };
    h.start(6, 1, fast).await;

    h.generator.push_text(payload("Two.", 8));
    h.decide("Continue").await.unwrap();
    assert_ne!(h.orchestrator.snapshot().choices[0].kind, ChoiceType::Pacing);

    h.generator.push_text(payload("Three.", 9));
    h.decide("Continue").await.unwrap();
    let snapshot = h.orchestrator.snapshot();
    assert_eq!(snapshot.pacing_streak, 3);
    assert_eq!(snapshot.choices[0].id, Choice::BREATHING_ROOM_ID);
    let cursor_before = snapshot.cursor;

    h.generator.push_text(payload("A quiet interlude.", 2));
    let breathing_text = snapshot.choices[0].text.clone();
    h.decide(&breathing_text).await.unwrap();

    let prompt = h.generator.requests().last().unwrap().prompt.clone();
    assert!(prompt.contains("Interlude"));
    assert!(prompt.contains("Slow Burn"));
    assert!(prompt.contains("Segment 3."));

    let snapshot = h.orchestrator.snapshot();
    assert_eq!(snapshot.cursor, cursor_before);
    assert_eq!(snapshot.pacing_streak, 0);
    assert_ne!(snapshot.choices[0].kind, ChoiceType::Pacing);

    // 计数重新开始，需要三个新的高能量章节
    for prose in ["Four.", "Five."] {
        h.generator.push_text(payload(prose, 8));
        h.decide("Continue").await.unwrap();
        assert_ne!(h.orchestrator.snapshot().choices[0].kind, ChoiceType::Pacing);
    }
    h.generator.push_text(payload("Six.", 8));
    h.decide("Continue").await.unwrap();
    assert_eq!(h.orchestrator.snapshot().choices[0].id, Choice::BREATHING_ROOM_ID);
}

#[tokio::test]
async fn test_slow_pacing_never_escalates() {
    let h = Harness::new();
    h.start(5, 1, slow_config()).await;
    for prose in ["Two.", "Three.", "Four."] {
        h.generator.push_text(payload(prose, 8));
        h.decide("Continue").await.unwrap();
    }
    let snapshot = h.orchestrator.snapshot();
    assert_eq!(snapshot.pacing_streak, 0);
    assert!(snapshot.choices.iter().all(|c| c.kind != ChoiceType::Pacing));
}

#[tokio::test]
async fn test_undo_restores_chapters_and_cursor() {
    let h = Harness::new();
    h.start(3, 1, slow_config()).await;
    let before = h.orchestrator.snapshot();

    h.generator.push_text(payload("Chapter two text.", 5));
    h.decide("Continue").await.unwrap();
    assert_eq!(h.orchestrator.snapshot().cursor, before.cursor + 1);

    h.orchestrator.undo().unwrap();
    let after = h.orchestrator.snapshot();
    assert_eq!(after.chapters, before.chapters);
    assert_eq!(after.cursor, before.cursor);
    assert_eq!(after.phase, Phase::Decision);

    h.orchestrator.undo().unwrap();
    assert_eq!(h.orchestrator.phase(), Phase::Setup);
    assert_eq!(h.orchestrator.snapshot().cursor, 0);
}

#[tokio::test]
async fn test_failed_cycle_commits_nothing_and_returns_to_decision() {
    let h = Harness::new();
    h.start(3, 1, slow_config()).await;

    h.generator
        .push_broken_stream(["Half a chap"], GenerationError::NetworkError("reset".to_string()));
    let result = h.decide("Continue").await;
    assert!(matches!(result, Err(ApplicationError::Generation(_))));

    let snapshot = h.orchestrator.snapshot();
    assert_eq!(snapshot.phase, Phase::Decision);
    assert_eq!(snapshot.chapters.len(), 1);
    assert_eq!(snapshot.cursor, 1);
    assert!(snapshot.last_error.is_some());
    assert!(!snapshot.busy);

    // 失败后可以重试同一块
    h.generator.push_text(payload("Chapter two text.", 5));
    h.decide("Continue").await.unwrap();
    assert_eq!(h.orchestrator.snapshot().chapters.len(), 2);
}

#[tokio::test]
async fn test_busy_guard_rejects_second_trigger() {
    let h = Harness::new();
    h.start(3, 1, slow_config()).await;

    h.generator.push_text(payload("Chapter two text.", 5));
    let task = h.orchestrator.decide(Decide::new("Continue")).unwrap();
    assert!(h.orchestrator.is_busy());
    assert!(matches!(
        h.orchestrator.decide(Decide::new("Continue")),
        Err(ApplicationError::Busy)
    ));
    assert!(matches!(h.orchestrator.undo(), Err(ApplicationError::Busy)));

    task.await.unwrap();
    assert!(!h.orchestrator.is_busy());
}

#[tokio::test]
async fn test_auto_critique_polishes_continuations() {
    let h = Harness::new();
    let config = GenerationConfig {
        auto_critique: true,
        ..slow_config()
    };
    h.start(3, 1, config).await;
    // 第一章不做批评
    assert_eq!(h.orchestrator.snapshot().chapters[0].history().len(), 1);

    let polished = "The rain came down over the drowned city like a verdict, and Mira walked through it \
                    without lifting her hood.";
    h.generator.push_text(payload("Rain fell. Mira walked.", 5));
    h.generator
        .push_text(r#"[{"id":"1","quote":"Rain fell.","comment":"Weak verbs.","type":"Prose"}]"#);
    h.generator.push_text(polished);
    h.decide("Continue").await.unwrap();

    let chapter = h.orchestrator.snapshot().chapters[1].clone();
    assert_eq!(chapter.history().len(), 2);
    assert_eq!(chapter.content(), polished);
    let requests = h.generator.requests();
    let fix_prompt = &requests.last().unwrap().prompt;
    assert!(fix_prompt.contains("Fix these specific issues: Weak verbs."));

    // 润色太短时保留初稿
    h.generator.push_text(payload("Short draft.", 5));
    h.generator
        .push_text(r#"[{"id":"1","quote":"x","comment":"Expand.","type":"Prose"}]"#);
    h.generator.push_text("Too short.");
    h.decide("Continue").await.unwrap();
    let chapter = h.orchestrator.snapshot().chapters[2].clone();
    assert_eq!(chapter.history().len(), 1);
    assert_eq!(chapter.content(), "Short draft.");
}

#[tokio::test]
async fn test_auto_critique_failure_keeps_draft() {
    let h = Harness::new();
    let config = GenerationConfig {
        auto_critique: true,
        ..slow_config()
    };
    h.start(3, 1, config).await;

    h.generator.push_text(payload("Draft survives.", 5));
    h.generator.push_error(GenerationError::Timeout);
    h.decide("Continue").await.unwrap();

    let chapter = h.orchestrator.snapshot().chapters[1].clone();
    assert_eq!(chapter.content(), "Draft survives.");
    assert_eq!(chapter.history().len(), 1);
}

#[tokio::test]
async fn test_auto_pilot_runs_count_plus_one_cycles() {
    let h = Harness::new();
    h.start(5, 1, slow_config()).await;

    for prose in ["Two.", "Three.", "Four."] {
        h.generator.push_text(payload(prose, 5));
    }
    let phase = h
        .orchestrator
        .start_auto_pilot(StartAutoPilot { count: 2 })
        .unwrap()
        .await
        .unwrap();

    assert_eq!(phase, Phase::Decision);
    let snapshot = h.orchestrator.snapshot();
    assert_eq!(snapshot.chapters.len(), 4);
    assert!(!snapshot.auto_pilot_active);
    assert_eq!(h.generator.remaining(), 0);

    let prompts: Vec<String> = h.generator.requests().iter().map(|r| r.prompt.clone()).collect();
    assert!(prompts[prompts.len() - 1].contains("Auto-pilot continuation"));
}

#[tokio::test]
async fn test_auto_pilot_stops_when_source_exhausted() {
    let h = Harness::new();
    h.start(2, 1, slow_config()).await;

    h.generator.push_text(payload("Two.", 5));
    let phase = h
        .orchestrator
        .start_auto_pilot(StartAutoPilot { count: 5 })
        .unwrap()
        .await
        .unwrap();

    assert_eq!(phase, Phase::Finished);
    assert!(!h.orchestrator.snapshot().auto_pilot_active);
}

#[tokio::test]
async fn test_auto_pilot_error_stops_countdown() {
    let h = Harness::new();
    h.start(5, 1, slow_config()).await;

    h.generator.push_text(payload("Two.", 5));
    h.generator.push_error(GenerationError::Timeout);
    let result = h
        .orchestrator
        .start_auto_pilot(StartAutoPilot { count: 3 })
        .unwrap()
        .await;

    assert!(result.is_err());
    let snapshot = h.orchestrator.snapshot();
    assert_eq!(snapshot.phase, Phase::Decision);
    assert_eq!(snapshot.chapters.len(), 2);
    assert!(!snapshot.auto_pilot_active);
    assert_eq!(snapshot.auto_pilot_remaining, 0);
}

/// 记录警告并返回固定答复的确认端口
struct FixedConfirmation {
    approve: bool,
    seen: Mutex<Vec<ConsistencyWarning>>,
}

#[async_trait]
impl BatchConfirmationPort for FixedConfirmation {
    async fn confirm(&self, warning: &ConsistencyWarning) -> bool {
        self.seen.lock().unwrap().push(warning.clone());
        self.approve
    }
}

#[tokio::test]
async fn test_batch_abort_on_declined_consistency_warning() {
    let h = Harness::new();
    h.start(2, 3, slow_config()).await;

    h.generator.push_text(r#"{"safe":true,"issues":[]}"#);
    h.generator.push_text("Beat one prose.");
    h.generator
        .push_text(r#"{"safe":false,"issues":["Mira died in beat 1."]}"#);
    let confirmation = Arc::new(FixedConfirmation {
        approve: false,
        seen: Mutex::new(Vec::new()),
    });

    let report = h
        .orchestrator
        .run_batch(
            RunBatch {
                beat_ids: vec!["1".to_string(), "2".to_string(), "3".to_string()],
            },
            confirmation.clone(),
        )
        .unwrap()
        .await
        .unwrap();

    assert!(report.aborted);
    assert_eq!(report.completed, 1);
    assert_eq!(report.chapter_ids.len(), 1);
    assert_eq!(h.generator.remaining(), 0);

    let seen = confirmation.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].beat.id, "2");

    let snapshot = h.orchestrator.snapshot();
    assert_eq!(snapshot.phase, Phase::Decision);
    assert_eq!(snapshot.chapters.len(), 2);
    assert_eq!(snapshot.chapters[1].content(), "Beat one prose.");
    assert_eq!(snapshot.chapters[1].title(), "Chapter 2 (Beat 1)");
    assert_eq!(snapshot.chapters[1].pacing_score().value(), 5);
    assert!(snapshot.batch.is_none());
    // 批量章节不消费原稿
    assert_eq!(snapshot.cursor, 1);
}

#[tokio::test]
async fn test_batch_uses_preceding_beats_and_treats_check_failure_as_safe() {
    let h = Harness::new();
    h.start(2, 3, slow_config()).await;

    h.generator.push_error(GenerationError::Timeout);
    h.generator.push_text("Beat three prose.");
    let confirmation = Arc::new(FixedConfirmation {
        approve: false,
        seen: Mutex::new(Vec::new()),
    });

    let report = h
        .orchestrator
        .run_batch(
            RunBatch {
                beat_ids: vec!["3".to_string()],
            },
            confirmation.clone(),
        )
        .unwrap()
        .await
        .unwrap();

    assert!(!report.aborted);
    assert_eq!(report.completed, 1);
    assert!(confirmation.seen.lock().unwrap().is_empty());
    let requests = h.generator.requests();
    let prompt = &requests.last().unwrap().prompt;
    assert!(prompt.contains("[Beat 1] Beat 1"));
    assert!(prompt.contains("[Beat 2] Beat 2"));
    assert!(prompt.contains("Target Beat: Beat 3"));
}

#[tokio::test]
async fn test_batch_generation_failure_keeps_committed_chapters() {
    let h = Harness::new();
    h.start(2, 2, slow_config()).await;

    h.generator.push_text(r#"{"safe":true}"#);
    h.generator.push_text("Beat one prose.");
    h.generator.push_text(r#"{"safe":true}"#);
    h.generator.push_error(GenerationError::Timeout);
    let confirmation = Arc::new(FixedConfirmation {
        approve: true,
        seen: Mutex::new(Vec::new()),
    });

    let result = h
        .orchestrator
        .run_batch(
            RunBatch {
                beat_ids: vec!["1".to_string(), "2".to_string()],
            },
            confirmation,
        )
        .unwrap()
        .await;

    assert!(result.is_err());
    let snapshot = h.orchestrator.snapshot();
    assert_eq!(snapshot.chapters.len(), 2);
    assert_eq!(snapshot.phase, Phase::Decision);
    assert!(snapshot.batch.is_none());
}

#[tokio::test]
async fn test_refinement_appends_version() {
    let h = Harness::new();
    h.start(2, 1, slow_config()).await;

    h.orchestrator.enter_refinement().unwrap();
    assert_eq!(h.orchestrator.phase(), Phase::RefinementSelection);

    h.generator.push_text("Chapter one text, now drenched in rain.");
    let phase = h
        .orchestrator
        .refine(Refine {
            directives: vec!["sensory".to_string(), "unknown".to_string()],
        })
        .unwrap()
        .await
        .unwrap();

    assert_eq!(phase, Phase::Decision);
    let chapter = h.orchestrator.snapshot().chapters[0].clone();
    assert_eq!(chapter.history().len(), 2);
    assert_eq!(chapter.content(), "Chapter one text, now drenched in rain.");
    assert_eq!(chapter.current_version(), 1);
}

#[tokio::test]
async fn test_refinement_without_directives_and_on_failure() {
    let h = Harness::new();
    h.start(2, 1, slow_config()).await;

    h.orchestrator.enter_refinement().unwrap();
    let phase = h
        .orchestrator
        .refine(Refine { directives: vec![] })
        .unwrap()
        .await
        .unwrap();
    assert_eq!(phase, Phase::Decision);

    h.orchestrator.enter_refinement().unwrap();
    h.generator.push_error(GenerationError::Timeout);
    let result = h
        .orchestrator
        .refine(Refine {
            directives: vec!["dialogue".to_string()],
        })
        .unwrap()
        .await;
    assert!(result.is_err());

    let snapshot = h.orchestrator.snapshot();
    assert_eq!(snapshot.phase, Phase::Decision);
    assert_eq!(snapshot.chapters[0].history().len(), 1);
}

#[tokio::test]
async fn test_refinement_context_excludes_target_chapter() {
    let h = Harness::new();
    h.start(2, 1, slow_config()).await;
    h.generator.push_text(payload("Chapter two text.", 4));
    h.decide("Continue").await.unwrap();

    h.orchestrator.enter_refinement().unwrap();
    h.generator.push_text("Chapter two, tighter.");
    h.orchestrator
        .refine(Refine {
            directives: vec!["dialogue".to_string()],
        })
        .unwrap()
        .await
        .unwrap();

    let prompt = h.generator.requests().last().unwrap().prompt.clone();
    assert_eq!(prompt.matches("Chapter two text.").count(), 1);
    assert!(prompt.contains("Chapter one text."));
    assert_eq!(h.orchestrator.snapshot().chapters[1].content(), "Chapter two, tighter.");
}

#[tokio::test]
async fn test_empty_refinement_leaves_chapter_unchanged() {
    let h = Harness::new();
    h.start(2, 1, slow_config()).await;

    h.orchestrator.enter_refinement().unwrap();
    h.generator.push_text(payload("", 5));
    let result = h
        .orchestrator
        .refine(Refine {
            directives: vec!["dialogue".to_string()],
        })
        .unwrap()
        .await;
    assert!(matches!(
        result,
        Err(ApplicationError::Generation(GenerationError::EmptyResponse))
    ));

    let snapshot = h.orchestrator.snapshot();
    assert_eq!(snapshot.phase, Phase::Decision);
    assert_eq!(snapshot.chapters[0].history().len(), 1);
    assert_eq!(snapshot.chapters[0].content(), "Chapter one text.");
    assert!(snapshot.last_error.is_some());
}

#[tokio::test]
async fn test_chaos_twist_is_prepended_without_phase_change() {
    let h = Harness::new();
    h.start(2, 1, slow_config()).await;

    h.generator.push_text(
        r#"{"id":"CHAOS","text":"The city floods overnight.","rationale":"Nobody expects water.","type":"Chaos"}"#,
    );
    let choice = h.orchestrator.inject_chaos().unwrap().await.unwrap();

    assert_eq!(choice.kind, ChoiceType::Chaos);
    let snapshot = h.orchestrator.snapshot();
    assert_eq!(snapshot.choices[0].text, "The city floods overnight.");
    assert_eq!(snapshot.choices.len(), 2);
    assert_eq!(snapshot.phase, Phase::Decision);
}

#[tokio::test]
async fn test_pending_chaos_twist_blocks_other_cycles() {
    let h = Harness::new();
    h.start(2, 1, slow_config()).await;

    let chaos = h.orchestrator.inject_chaos().unwrap();
    assert!(h.orchestrator.snapshot().busy);
    assert!(matches!(
        h.orchestrator.decide(Decide::new("Continue")),
        Err(ApplicationError::Busy)
    ));
    assert!(matches!(h.orchestrator.inject_chaos(), Err(ApplicationError::Busy)));

    h.generator.push_text(
        r#"{"id":"CHAOS","text":"The bridge collapses.","rationale":"r","type":"Chaos"}"#,
    );
    chaos.await.unwrap();
    let snapshot = h.orchestrator.snapshot();
    assert!(!snapshot.busy);
    assert_eq!(snapshot.chapters.len(), 1);
    assert_eq!(snapshot.choices[0].text, "The bridge collapses.");

    h.generator.push_text(payload("Chapter two text.", 4));
    assert_eq!(h.decide("Continue").await.unwrap(), Phase::Decision);
}

#[tokio::test]
async fn test_passage_edits_commit_new_versions() {
    let h = Harness::new();
    h.start(2, 1, slow_config()).await;

    h.generator.push_text("first");
    let content = h
        .orchestrator
        .rewrite_passage(RewritePassage {
            chapter_id: 1,
            selection: "one".to_string(),
            instruction: "Use an ordinal.".to_string(),
        })
        .unwrap()
        .await
        .unwrap();
    assert_eq!(content, "Chapter first text.");

    h.generator.push_text("");
    let content = h
        .orchestrator
        .erase_passage(ErasePassage {
            chapter_id: 1,
            selection: " first".to_string(),
        })
        .unwrap()
        .await
        .unwrap();
    assert_eq!(content, "Chapter text.");
    assert_eq!(h.orchestrator.snapshot().chapters[0].history().len(), 3);

    assert!(matches!(
        h.orchestrator.rewrite_passage(RewritePassage {
            chapter_id: 1,
            selection: "missing".to_string(),
            instruction: String::new(),
        }),
        Err(ApplicationError::Manuscript(_))
    ));
}

#[tokio::test]
async fn test_manual_editing_operations() {
    let h = Harness::new();
    h.start(3, 1, slow_config()).await;
    h.generator.push_text(payload("Chapter two text.", 5));
    h.decide("Continue").await.unwrap();

    assert!(h
        .orchestrator
        .reorder_chapter(ReorderChapter {
            index: 0,
            direction: crate::domain::manuscript::MoveDirection::Down,
        })
        .unwrap());
    let ids: Vec<u32> = h.orchestrator.snapshot().chapters.iter().map(|c| c.id()).collect();
    assert_eq!(ids, vec![2, 1]);

    let version = h
        .orchestrator
        .edit_chapter(EditChapter {
            chapter_id: 1,
            content: "Hand-edited text.".to_string(),
        })
        .unwrap();
    assert_eq!(version, 1);

    let changed = h
        .orchestrator
        .find_replace(FindReplace {
            find: "text".to_string(),
            replace: "prose".to_string(),
        })
        .unwrap();
    assert_eq!(changed, 2);

    h.orchestrator
        .select_version(SelectVersion {
            chapter_id: 1,
            version: 0,
        })
        .unwrap();
    let chapter = h.orchestrator.snapshot().chapters[1].clone();
    assert_eq!(chapter.content(), "Chapter one text.");
}

#[tokio::test]
async fn test_auto_lore_extraction_feeds_knowledge_base() {
    let h = Harness::new();
    let config = GenerationConfig {
        auto_lore: true,
        ..slow_config()
    };
    h.to_beat_sheet(2, 1, config).await;
    let beats = h.orchestrator.snapshot().metadata.unwrap().beat_sheet;
    h.generator.push_text("Style.");
    h.generator.push_text(payload("Mira reached Ashford.", 5));
    h.generator.push_text(
        r#"{"lore":[{"key":"Ashford","category":"Location","description":"A flooded port."}],
            "characters":[{"name":"Mira","location":"Ashford"}]}"#,
    );
    h.orchestrator
        .confirm_beats(ConfirmBeats { beats })
        .unwrap()
        .await
        .unwrap();
    h.orchestrator.knowledge().wait_idle().await;

    let state = h.orchestrator.project_state().await;
    assert_eq!(state.lore.len(), 1);
    assert_eq!(state.characters[0].location, "Ashford");
    assert_eq!(state.chapters.len(), 1);

    h.generator.push_text("She arrived yesterday.");
    let answer = h.orchestrator.ask_story("When did Mira reach Ashford?").await.unwrap();
    assert_eq!(answer, "She arrived yesterday.");
    let requests = h.generator.requests();
    let prompt = &requests.last().unwrap().prompt;
    assert!(prompt.contains("A flooded port."));
}

#[tokio::test]
async fn test_phase_guards() {
    let h = Harness::new();
    assert!(matches!(
        h.orchestrator.decide(Decide::new("Continue")),
        Err(ApplicationError::InvalidPhase { .. })
    ));
    assert!(matches!(
        h.orchestrator.load_manuscript(LoadManuscript {
            text: "   ".to_string()
        }),
        Err(ApplicationError::ValidationError(_))
    ));
    assert!(!h.orchestrator.is_busy());
}
