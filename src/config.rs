use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::Deserialize;
use crate::core::errors::Result;
use crate::utils::retry::RetryStrategy;

/// 超过该大小走分片上传，否则单次表单上传
pub const DEFAULT_MULTIPART_THRESHOLD: u64 = 64 * 1024 * 1024;

/// 分片上传的固定并发数
pub const DEFAULT_PART_CONCURRENCY: usize = 4;

/// 重试参数（作用于签名和分片 PUT 调用）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// 最大尝试次数（含首次调用）
    pub max_attempts: u32,
    /// 初始退避延迟（毫秒），之后逐次翻倍
    pub initial_delay_ms: u64,
    /// 退避延迟上限（毫秒）
    pub max_delay_ms: u64,
    /// 随机抖动上限（毫秒）
    pub jitter_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            max_delay_ms: 10_000,
            jitter_ms: 250,
        }
    }
}

impl RetrySettings {
    pub fn strategy(&self) -> RetryStrategy {
        RetryStrategy::Exponential {
            initial: Duration::from_millis(self.initial_delay_ms),
            multiplier: 2.0,
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }

    pub fn jitter(&self) -> Duration {
        Duration::from_millis(self.jitter_ms)
    }
}

/// 上传客户端配置
///
/// 显式构造并传入 UploadClient，不使用全局状态
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// 签名后端的基础地址
    pub endpoint: String,
    /// 后端调用附带的 bearer token（签名 URL 的 PUT 不使用）
    pub token: Option<String>,
    pub multipart_threshold: u64,
    pub part_concurrency: usize,
    pub retry: RetrySettings,
    /// 断点记录文件；None 时只在进程内记忆
    pub resume_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080/api/".to_string(),
            token: None,
            multipart_threshold: DEFAULT_MULTIPART_THRESHOLD,
            part_concurrency: DEFAULT_PART_CONCURRENCY,
            retry: RetrySettings::default(),
            resume_path: None,
        }
    }
}

impl ClientConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.multipart_threshold, 64 * 1024 * 1024);
        assert_eq!(config.part_concurrency, 4);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.jitter_ms, 250);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: ClientConfig = toml::from_str(
            r#"
            endpoint = "https://api.example.com/v1"
            [retry]
            max_attempts = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.endpoint, "https://api.example.com/v1");
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_delay_ms, 500);
        assert_eq!(config.multipart_threshold, DEFAULT_MULTIPART_THRESHOLD);
    }
}
