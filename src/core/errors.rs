use thiserror::Error;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Backend error: status code {status}, message: {message}")]
    Backend {
        status: u16,
        message: String,
    },

    /// 2xx 响应但存储端没有返回 ETag，该分片视为未确认
    #[error("Storage did not acknowledge the part: no ETag in response")]
    MissingEtag,

    /// initiate 返回 400/404/405，后端对该请求不支持分片上传
    #[error("Multipart upload not supported by backend: status code {status}")]
    MultipartUnsupported {
        status: u16,
    },

    /// 分片几何与文件大小不一致，配置级错误，不重试
    #[error("Invalid part layout: file_size={file_size}, part_size={part_size}, total_parts={total_parts}")]
    PartLayout {
        file_size: u64,
        part_size: u64,
        total_parts: u32,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl UploadError {
    pub fn backend(status: u16, message: impl Into<String>) -> Self {
        Self::Backend {
            status,
            message: message.into(),
        }
    }

    /// 错误携带的 HTTP 状态码（如果有）
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Backend { status, .. } | Self::MultipartUnsupported { status } => Some(*status),
            Self::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// 瞬时失败：连接中断、超时、签名或分片 PUT 的非 2xx 响应
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Backend { .. } | Self::MissingEtag
        )
    }

    /// 会话级终结状态：该 upload_id 已不可续传
    pub fn is_session_terminal(&self) -> bool {
        matches!(self.status(), Some(400 | 404 | 410))
    }
}

/// Error alias
pub type Result<T, E = UploadError> = std::result::Result<T, E>;
