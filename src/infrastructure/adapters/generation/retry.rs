//! 限流重试装饰器
//!
//! 只对限流类错误重试，延迟从初始值开始逐次翻倍；其他错误立即返回。
//! 流式调用只对建立流的阶段重试，已经开始的流不会重放。

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio_retry2::strategy::ExponentialFactorBackoff;
use tokio_retry2::{Retry, RetryError};

use crate::application::ports::{GenerationError, GenerationRequest, TextGeneratorPort, TextStream};

/// 重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 最多重试次数（不含第一次调用）
    pub max_retries: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(2000),
        }
    }
}

impl RetryPolicy {
    /// 每次重试前的等待序列
    pub fn strategy(&self) -> impl Iterator<Item = Duration> {
        ExponentialFactorBackoff::from_millis(self.initial_delay.as_millis() as u64, 2.0)
            .take(self.max_retries as usize)
    }

    /// 按策略执行操作
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, GenerationError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GenerationError>>,
    {
        let max_retries = self.max_retries;
        Retry::spawn(self.strategy(), || {
            let attempt = operation();
            async move {
                match attempt.await {
                    Ok(value) => Ok(value),
                    Err(e) if e.is_rate_limited() => {
                        tracing::warn!(max_retries, error = %e, "Rate limited, retrying");
                        Err(RetryError::Transient {
                            err: e,
                            retry_after: None,
                        })
                    }
                    Err(e) => Err(RetryError::Permanent(e)),
                }
            }
        })
        .await
    }
}

/// 为任意生成后端加上重试策略
pub struct RetryingGenerator<G> {
    inner: G,
    policy: RetryPolicy,
}

impl<G> RetryingGenerator<G> {
    pub fn new(inner: G, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }
}

#[async_trait]
impl<G: TextGeneratorPort> TextGeneratorPort for RetryingGenerator<G> {
    async fn generate_stream(&self, request: GenerationRequest) -> Result<TextStream, GenerationError> {
        self.policy
            .run(|| self.inner.generate_stream(request.clone()))
            .await
    }

    async fn generate_once(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        self.policy
            .run(|| self.inner.generate_once(request.clone()))
            .await
    }

    async fn health_check(&self) -> bool {
        self.inner.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::generation::ScriptedGenerator;

    fn instant_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            initial_delay: Duration::ZERO,
        }
    }

    fn rate_limited() -> GenerationError {
        GenerationError::BackendError {
            status: 429,
            message: "slow down".to_string(),
        }
    }

    #[test]
    fn test_default_strategy_starts_at_initial_delay_and_doubles() {
        let delays: Vec<Duration> = RetryPolicy::default().strategy().collect();
        assert_eq!(delays.len(), 3);
        assert_eq!(delays[0], Duration::from_millis(2000));
        assert_eq!(delays[1], delays[0] * 2);
        assert_eq!(delays[2], delays[1] * 2);
    }

    #[tokio::test]
    async fn test_retries_rate_limit_then_succeeds() {
        let scripted = ScriptedGenerator::new();
        scripted.push_error(rate_limited());
        scripted.push_error(GenerationError::NetworkError("quota exceeded".to_string()));
        scripted.push_text("ok");
        let generator = RetryingGenerator::new(scripted, instant_policy());

        let text = generator
            .generate_once(GenerationRequest::new("m", "p"))
            .await
            .unwrap();
        assert_eq!(text, "ok");
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let scripted = ScriptedGenerator::new();
        for _ in 0..4 {
            scripted.push_error(rate_limited());
        }
        scripted.push_text("never reached");
        let generator = RetryingGenerator::new(scripted, instant_policy());

        let result = generator.generate_once(GenerationRequest::new("m", "p")).await;
        assert!(matches!(result, Err(GenerationError::BackendError { status: 429, .. })));
        assert_eq!(generator.inner.remaining(), 1);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let scripted = ScriptedGenerator::new();
        scripted.push_error(GenerationError::Timeout);
        scripted.push_text("unused");
        let generator = RetryingGenerator::new(scripted, instant_policy());

        let result = generator.generate_stream(GenerationRequest::new("m", "p")).await;
        assert!(matches!(result, Err(GenerationError::Timeout)));
        assert_eq!(generator.inner.requests().len(), 1);
    }
}
