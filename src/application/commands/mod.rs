//! 应用层 - 命令（写操作）
//!
//! 编排器接受的全部写操作

mod editing_commands;
mod generation_commands;

pub use editing_commands::*;
pub use generation_commands::*;
