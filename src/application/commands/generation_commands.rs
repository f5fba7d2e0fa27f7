//! Generation Commands - 生成相关命令

use crate::domain::manuscript::{Beat, GenerationConfig, NovelMetadata, Placement};

/// 载入原稿命令（切块并识别元数据）
#[derive(Debug, Clone)]
pub struct LoadManuscript {
    pub text: String,
}

/// 提交项目元数据
#[derive(Debug, Clone)]
pub struct SubmitMetadata {
    pub metadata: NovelMetadata,
}

/// 提交生成参数（随后生成大纲）
#[derive(Debug, Clone)]
pub struct SubmitConfiguration {
    pub config: GenerationConfig,
}

/// 确认大纲（随后分析文风并生成第一章）
#[derive(Debug, Clone)]
pub struct ConfirmBeats {
    pub beats: Vec<Beat>,
}

/// 选择下一步方向
#[derive(Debug, Clone, Default)]
pub struct Decide {
    pub choice: String,
    pub instructions: String,
    pub placement: Placement,
}

impl Decide {
    pub fn new(choice: impl Into<String>) -> Self {
        Self {
            choice: choice.into(),
            ..Default::default()
        }
    }
}

/// 对最新章节执行精修
#[derive(Debug, Clone)]
pub struct Refine {
    pub directives: Vec<String>,
}

/// 启动自动驾驶
#[derive(Debug, Clone, Copy)]
pub struct StartAutoPilot {
    pub count: u32,
}

/// 按情节点批量生成
#[derive(Debug, Clone)]
pub struct RunBatch {
    pub beat_ids: Vec<String>,
}
