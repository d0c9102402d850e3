use serde::{Deserialize, Serialize};
use crate::core::types::{CompletedPart, UploadIntent};

/// status 接口中表示会话仍可续传的状态值
pub const SESSION_STATUS_INITIATED: &str = "initiated";

#[derive(Debug, Serialize)]
pub struct StatusRequest<'a> {
    pub multipart_upload_id: &'a str,
}

/// status 接口的响应：服务端视角的会话状态
#[derive(Debug, Clone, Deserialize)]
pub struct MultipartStatus {
    pub status: String,
    pub multipart_upload_id: String,
    pub part_size: u64,
    pub total_parts: u32,
    #[serde(default)]
    pub uploaded_parts: Vec<CompletedPart>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitiateRequest {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: u64,
}

impl InitiateRequest {
    pub fn from_intent(intent: &UploadIntent) -> Self {
        Self {
            title: intent.title.clone(),
            description: intent.description.clone(),
            space: intent.space.clone(),
            duration_seconds: intent.duration_seconds,
            tags: intent.tags.clone(),
            filename: intent.file.name.clone(),
            content_type: intent.file.content_type.clone(),
            size_bytes: intent.file.size_bytes,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InitiateResponse {
    pub multipart_upload_id: String,
    pub part_size: u64,
    pub total_parts: u32,
}

#[derive(Debug, Serialize)]
pub struct SignPartRequest<'a> {
    pub multipart_upload_id: &'a str,
    pub part_number: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignPartResponse {
    pub signed_url: String,
}

/// complete 的 parts 必须按 part_number 升序
#[derive(Debug, Serialize)]
pub struct CompleteRequest<'a> {
    pub multipart_upload_id: &'a str,
    pub parts: &'a [CompletedPart],
}
