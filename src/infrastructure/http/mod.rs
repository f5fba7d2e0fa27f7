//! HTTP Layer - JSON API + WebSocket
//!
//! 所有写操作经由编排器；长任务立即返回，进度通过 /ws/events 推送。

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use routes::create_routes;
pub use server::{build_router, HttpServer, ServerConfig};
pub use state::AppState;
