//! Generation Adapter - 文本生成后端实现

mod gemini_client;
mod retry;
mod scripted_generator;

pub use gemini_client::{GeminiClient, GeminiClientConfig};
pub use retry::{RetryPolicy, RetryingGenerator};
pub use scripted_generator::ScriptedGenerator;
