use std::future::Future;
use std::time::Duration;
use rand::Rng;
use tokio::time::sleep;
use crate::core::errors::{Result, UploadError};

/// 重试策略
#[derive(Debug, Clone, Copy)]
pub enum RetryStrategy {
    /// 固定延迟
    Fixed(Duration),
    /// 指数退避
    Exponential {
        initial: Duration,
        multiplier: f64,
        max_delay: Duration,
    },
}

impl RetryStrategy {
    /// 计算第 n 次重试的延迟
    pub fn get_delay(&self, attempt: u32) -> Duration {
        match self {
            RetryStrategy::Fixed(delay) => *delay,
            RetryStrategy::Exponential { initial, multiplier, max_delay } => {
                let delay = initial.as_secs_f64() * multiplier.powf(attempt as f64);
                let delay = Duration::from_secs_f64(delay);
                std::cmp::min(delay, *max_delay)
            }
        }
    }
}

/// 重试配置
pub struct RetryConfig {
    /// 最大尝试次数（含首次调用）
    pub max_attempts: u32,
    /// 重试策略
    pub strategy: RetryStrategy,
    /// 每次延迟额外叠加的随机抖动上限
    pub jitter: Duration,
    /// 是否重试的判断函数
    pub should_retry: Box<dyn Fn(&UploadError) -> bool + Send + Sync>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            strategy: RetryStrategy::Exponential {
                initial: Duration::from_millis(500),
                multiplier: 2.0,
                max_delay: Duration::from_secs(10),
            },
            jitter: Duration::from_millis(250),
            should_retry: Box::new(UploadError::is_transient),
        }
    }
}

/// 执行带重试的操作
pub async fn retry_with_config<F, Fut, T>(
    config: RetryConfig,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = None;

    for attempt in 0..config.max_attempts {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(error) => {
                if !(config.should_retry)(&error) {
                    return Err(error);
                }

                last_error = Some(error);

                // 如果不是最后一次尝试，等待后重试
                if attempt + 1 < config.max_attempts {
                    let mut delay = config.strategy.get_delay(attempt);
                    if !config.jitter.is_zero() {
                        let jitter_ms = rand::thread_rng()
                            .gen_range(0..=config.jitter.as_millis() as u64);
                        delay += Duration::from_millis(jitter_ms);
                    }
                    sleep(delay).await;
                }
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| UploadError::Internal("retry loop ran zero attempts".to_string())))
}

/// 使用默认配置执行重试
pub async fn retry<F, Fut, T>(operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_with_config(RetryConfig::default(), operation).await
}

/// 重试构建器
pub struct RetryBuilder {
    config: RetryConfig,
}

impl RetryBuilder {
    pub fn new() -> Self {
        Self {
            config: RetryConfig::default(),
        }
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn strategy(mut self, strategy: RetryStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    pub fn jitter(mut self, jitter: Duration) -> Self {
        self.config.jitter = jitter;
        self
    }

    pub fn should_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(&UploadError) -> bool + Send + Sync + 'static,
    {
        self.config.should_retry = Box::new(f);
        self
    }

    pub async fn run<F, Fut, T>(self, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        retry_with_config(self.config, operation).await
    }
}

impl Default for RetryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
