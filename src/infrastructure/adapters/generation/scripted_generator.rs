//! Scripted Generator - 确定性的进程内生成后端
//!
//! 按顺序返回预先排好的响应或错误，不做任何网络调用。
//! 流式调用与单次调用共享同一个队列，按调用顺序依次消费。

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use futures_util::stream;

use crate::application::ports::{GenerationError, GenerationRequest, TextGeneratorPort, TextStream};

/// 一条预设响应
#[derive(Debug)]
enum Scripted {
    /// 按片段流式返回
    Fragments(Vec<String>),
    /// 先返回若干片段，然后以错误结束
    Broken(Vec<String>, GenerationError),
    /// 调用立即失败
    Error(GenerationError),
}

/// Scripted Generator
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    queue: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, item: Scripted) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(item);
    }

    /// 排入一条文本响应（流式调用时拆成两个片段）
    pub fn push_text(&self, text: impl Into<String>) {
        let text = text.into();
        let mid = text
            .char_indices()
            .map(|(i, _)| i)
            .nth(text.chars().count() / 2)
            .unwrap_or(text.len());
        let (head, tail) = text.split_at(mid);
        self.push(Scripted::Fragments(vec![head.to_string(), tail.to_string()]));
    }

    /// 排入指定片段
    pub fn push_fragments<I, S>(&self, fragments: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(Scripted::Fragments(fragments.into_iter().map(Into::into).collect()));
    }

    /// 排入一条中途断开的流
    pub fn push_broken_stream<I, S>(&self, fragments: I, error: GenerationError)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(Scripted::Broken(
            fragments.into_iter().map(Into::into).collect(),
            error,
        ));
    }

    /// 排入一次失败
    pub fn push_error(&self, error: GenerationError) {
        self.push(Scripted::Error(error));
    }

    /// 已收到的请求（按顺序）
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 尚未消费的响应数量
    pub fn remaining(&self) -> usize {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn next(&self, request: GenerationRequest) -> Result<Scripted, GenerationError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .ok_or_else(|| GenerationError::InvalidResponse("script exhausted".to_string()))
    }
}

#[async_trait]
impl TextGeneratorPort for ScriptedGenerator {
    async fn generate_stream(&self, request: GenerationRequest) -> Result<TextStream, GenerationError> {
        let items: Vec<Result<String, GenerationError>> = match self.next(request)? {
            Scripted::Fragments(fragments) => fragments.into_iter().map(Ok).collect(),
            Scripted::Broken(fragments, error) => fragments
                .into_iter()
                .map(Ok)
                .chain(std::iter::once(Err(error)))
                .collect(),
            Scripted::Error(error) => return Err(error),
        };
        Ok(Box::pin(stream::iter(items)))
    }

    async fn generate_once(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        match self.next(request)? {
            Scripted::Fragments(fragments) => Ok(fragments.concat()),
            Scripted::Broken(_, error) | Scripted::Error(error) => Err(error),
        }
    }
}
