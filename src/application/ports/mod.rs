//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod batch_confirmation;
mod event_sink;
mod project_store;
mod text_generator;

pub use batch_confirmation::{BatchConfirmationPort, ConsistencyWarning};
pub use event_sink::{EventSinkPort, NoopEventSink, SessionEvent};
pub use project_store::{ProjectStorePort, StoreError};
pub use text_generator::{
    GenerationError, GenerationRequest, ResponseFormat, TextGeneratorPort, TextStream,
};
