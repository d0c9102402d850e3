use std::collections::BTreeMap;
use std::sync::Arc;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use super::errors::{Result, UploadError};

/// 待上传视频文件的元数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    pub name: String,
    pub content_type: String,
    pub size_bytes: u64,
    /// 文件最后修改时间（毫秒时间戳），参与指纹计算
    pub last_modified_ms: i64,
}

/// 一次上传请求：会话元数据 + 视频文件元数据，提交后不可变
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadIntent {
    pub title: String,
    pub description: Option<String>,
    pub space: Option<String>,
    pub duration_seconds: Option<u64>,
    pub tags: Vec<String>,
    pub file: FileMeta,
}

/// 持久化的断点记录，由 ResumeStore 独占管理
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeRecord {
    pub upload_id: String,
    pub size_bytes: u64,
    pub filename: String,
    pub last_modified: i64,
    pub saved_at: DateTime<Utc>,
}

/// 已被后端确认的分片
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedPart {
    pub part_number: u32,
    pub etag: String,
}

/// 服务端确认的一次进行中的分片上传会话
///
/// completed 使用 BTreeMap：分片号天然去重、升序，
/// 写入由 orchestrator 串行化，不存在并发竞写
#[derive(Debug, Clone)]
pub struct MultipartSession {
    pub upload_id: String,
    pub file_size: u64,
    pub part_size: u64,
    pub total_parts: u32,
    pub completed: BTreeMap<u32, String>,
}

impl MultipartSession {
    /// 分片的字节长度，末尾分片一般短于 part_size
    pub fn part_len(&self, part_number: u32) -> u64 {
        let offset = (part_number as u64 - 1) * self.part_size;
        self.part_size.min(self.file_size.saturating_sub(offset))
    }

    /// 分片在文件中的起始偏移
    pub fn part_offset(&self, part_number: u32) -> u64 {
        (part_number as u64 - 1) * self.part_size
    }

    /// 尚未被后端确认的分片号，升序
    pub fn missing_parts(&self) -> Vec<u32> {
        (1..=self.total_parts)
            .filter(|n| !self.completed.contains_key(n))
            .collect()
    }

    /// 已确认分片，按分片号升序（complete 接口要求升序）
    pub fn completed_parts(&self) -> Vec<CompletedPart> {
        self.completed
            .iter()
            .map(|(&part_number, etag)| CompletedPart {
                part_number,
                etag: etag.clone(),
            })
            .collect()
    }

    /// 校验分片几何与文件大小一致，不一致属于配置级致命错误
    pub fn validate_layout(&self) -> Result<()> {
        let covered = self.total_parts as u64 * self.part_size;
        let before_last = (self.total_parts as u64).saturating_sub(1) * self.part_size;
        if self.part_size == 0
            || self.total_parts == 0
            || covered < self.file_size
            || before_last >= self.file_size
        {
            return Err(UploadError::PartLayout {
                file_size: self.file_size,
                part_size: self.part_size,
                total_parts: self.total_parts,
            });
        }
        Ok(())
    }
}

/// 后端调用成功后的响应体
#[derive(Debug, Clone)]
pub struct UploadResponse {
    pub status: u16,
    pub data: serde_json::Value,
}

/// 上传门面的统一返回形状，错误不越过门面抛出
#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub ok: bool,
    pub status: u16,
    pub data: Option<serde_json::Value>,
    pub text: Option<String>,
}

impl UploadOutcome {
    pub fn from_response(response: UploadResponse) -> Self {
        Self {
            ok: true,
            status: response.status,
            data: Some(response.data),
            text: None,
        }
    }

    pub fn from_error(err: &UploadError) -> Self {
        match err {
            // 未携带状态码的网络层异常统一折算为 status 0
            UploadError::Http(source) if source.status().is_none() => Self {
                ok: false,
                status: 0,
                data: None,
                text: Some("network interrupted".to_string()),
            },
            _ => Self {
                ok: false,
                status: err.status().unwrap_or(0),
                data: None,
                text: Some(err.to_string()),
            },
        }
    }
}

/// 进度回调载荷：percent 在总大小未知（为 0）时为 None
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub percent: Option<u8>,
    pub bytes_done: u64,
    pub bytes_total: u64,
}

pub type ProgressCallback = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    fn session(file_size: u64, part_size: u64, total_parts: u32) -> MultipartSession {
        MultipartSession {
            upload_id: "U1".to_string(),
            file_size,
            part_size,
            total_parts,
            completed: BTreeMap::new(),
        }
    }

    #[test]
    fn test_part_len_last_part_shorter() {
        let s = session(17 * 1024 * 1024, 4 * 1024 * 1024, 5);
        assert_eq!(s.part_len(1), 4 * 1024 * 1024);
        assert_eq!(s.part_len(4), 4 * 1024 * 1024);
        assert_eq!(s.part_len(5), 1024 * 1024);
    }

    #[test]
    fn test_part_len_exact_multiple() {
        let s = session(16 * 1024 * 1024, 4 * 1024 * 1024, 4);
        assert_eq!(s.part_len(4), 4 * 1024 * 1024);
    }

    #[test]
    fn test_missing_parts() {
        let mut s = session(5 * 1024, 1024, 5);
        s.completed.insert(1, "etag-1".to_string());
        s.completed.insert(3, "etag-3".to_string());
        assert_eq!(s.missing_parts(), vec![2, 4, 5]);
    }

    #[test]
    fn test_completed_parts_sorted() {
        let mut s = session(3 * 1024, 1024, 3);
        s.completed.insert(3, "etag-3".to_string());
        s.completed.insert(1, "etag-1".to_string());
        s.completed.insert(2, "etag-2".to_string());
        let parts = s.completed_parts();
        assert_eq!(
            parts.iter().map(|p| p.part_number).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_validate_layout() {
        assert!(session(200, 50, 4).validate_layout().is_ok());
        assert!(session(190, 50, 4).validate_layout().is_ok());
        // 分片覆盖不到整个文件
        assert!(session(250, 50, 4).validate_layout().is_err());
        // 末尾分片长度会是 0
        assert!(session(150, 50, 4).validate_layout().is_err());
        assert!(session(200, 0, 4).validate_layout().is_err());
        assert!(session(200, 50, 0).validate_layout().is_err());
    }

    #[test]
    fn test_outcome_from_backend_error() {
        let outcome = UploadOutcome::from_error(&UploadError::backend(410, "gone"));
        assert!(!outcome.ok);
        assert_eq!(outcome.status, 410);
        assert!(outcome.text.unwrap().contains("410"));
    }
}
