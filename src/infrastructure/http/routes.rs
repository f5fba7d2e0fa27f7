//! HTTP Routes
//!
//! API Endpoints:
//! - /api/ping                        GET   存活检查
//! - /api/health                      GET   生成后端健康检查
//! - /api/session                     GET   会话快照
//! - /api/session/save                POST  立即保存
//! - /api/manuscript/upload           POST  上传原稿 TXT（后台识别元数据，WS 通知）
//! - /api/manuscript/load             POST  以 JSON 正文载入原稿
//! - /api/setup/metadata              POST  提交元数据
//! - /api/setup/configuration         POST  提交生成参数（后台生成大纲）
//! - /api/setup/beats                 POST  确认大纲（后台生成第一章）
//! - /api/story/decide                POST  选择方向（后台生成下一章）
//! - /api/story/choices               GET   当前可选方向
//! - /api/story/refinement            POST  进入精修选择
//! - /api/story/refine                POST  精修最新章节
//! - /api/story/directives            GET   精修指令目录
//! - /api/story/chaos                 POST  混沌转折
//! - /api/automation/auto_pilot/start POST  启动自动驾驶
//! - /api/automation/auto_pilot/stop  POST  停止自动驾驶
//! - /api/automation/batch            POST  按情节点批量生成
//! - /api/automation/batch/confirm    POST  答复一致性警告
//! - /api/automation/batch/pending    GET   等待答复的情节点
//! - /api/chapters/undo               POST  撤销最新章节
//! - /api/chapters/reorder            POST  移动章节
//! - /api/chapters/select_version     POST  切换版本
//! - /api/chapters/edit               POST  手动编辑
//! - /api/chapters/find_replace       POST  全文查找替换
//! - /api/chapters/rewrite            POST  改写选中片段
//! - /api/chapters/erase              POST  删除选中片段
//! - /api/knowledge                   GET   设定库
//! - /api/knowledge/lore              POST  添加设定条目
//! - /api/knowledge/character         POST  更新角色状态
//! - /api/knowledge/ask               POST  故事问答
//! - /api/export/json                 GET   下载 JSON 存档
//! - /api/export/document             GET   下载 Word 兼容文稿
//! - /ws/events                       WS    会话事件

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

/// 创建所有路由
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/api", api_routes())
        .route("/ws/events", get(handlers::events_websocket_handler))
}

/// API 路由
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ping", get(handlers::ping))
        .route("/health", get(handlers::health))
        .route("/session", get(handlers::get_session))
        .route("/session/save", post(handlers::save_now))
        .nest("/manuscript", manuscript_routes())
        .nest("/setup", setup_routes())
        .nest("/story", story_routes())
        .nest("/automation", automation_routes())
        .nest("/chapters", chapter_routes())
        .nest("/knowledge", knowledge_routes())
        .nest("/export", export_routes())
}

/// 原稿路由
fn manuscript_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/upload", post(handlers::upload_manuscript))
        .route("/load", post(handlers::load_manuscript))
}

/// 开篇设置路由
fn setup_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/metadata", post(handlers::submit_metadata))
        .route("/configuration", post(handlers::submit_configuration))
        .route("/beats", post(handlers::confirm_beats))
}

/// 交互周期路由
fn story_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/decide", post(handlers::decide))
        .route("/choices", get(handlers::list_choices))
        .route("/refinement", post(handlers::enter_refinement))
        .route("/refine", post(handlers::refine))
        .route("/directives", get(handlers::list_directives))
        .route("/chaos", post(handlers::inject_chaos))
}

/// 自动化路由
fn automation_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auto_pilot/start", post(handlers::start_auto_pilot))
        .route("/auto_pilot/stop", post(handlers::stop_auto_pilot))
        .route("/batch", post(handlers::run_batch))
        .route("/batch/confirm", post(handlers::confirm_batch))
        .route("/batch/pending", get(handlers::pending_confirmations))
}

/// 章节编辑路由
fn chapter_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/undo", post(handlers::undo))
        .route("/reorder", post(handlers::reorder_chapter))
        .route("/select_version", post(handlers::select_version))
        .route("/edit", post(handlers::edit_chapter))
        .route("/find_replace", post(handlers::find_replace))
        .route("/rewrite", post(handlers::rewrite_passage))
        .route("/erase", post(handlers::erase_passage))
}

/// 设定库路由
fn knowledge_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::get_knowledge))
        .route("/lore", post(handlers::add_lore))
        .route("/character", post(handlers::update_character))
        .route("/ask", post(handlers::ask_story))
}

/// 导出路由
fn export_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/json", get(handlers::export_project_json))
        .route("/document", get(handlers::export_document))
}
