use std::sync::Arc;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use reqwest::Client;
use reqwest::header::{CONTENT_LENGTH, ETAG};
use url::Url;
use crate::core::errors::{Result, UploadError};
use crate::utils::progress::{ProgressStream, TransferCounter, TransferProgressFn};

/// PUT 请求体的分帧大小，保证进度回调有足够的采样点
const BODY_FRAME_SIZE: usize = 64 * 1024;

/// 分片传输：把一个字节区间 PUT 到预签名 URL
#[async_trait]
pub trait PartTransport: Send + Sync {
    /// 成功时返回存储端为该分片分配的 ETag（去除首尾空白，保证非空）
    async fn put_part(
        &self,
        signed_url: &str,
        payload: Bytes,
        on_progress: TransferProgressFn,
    ) -> Result<String>;
}

pub struct HttpPartTransport {
    client: Client,
}

impl HttpPartTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// 把分片切成固定大小的帧；Bytes::slice 共享底层缓冲，不复制
fn frame_payload(payload: &Bytes, frame_size: usize) -> Vec<Bytes> {
    let mut frames = Vec::with_capacity(payload.len() / frame_size + 1);
    let mut offset = 0;
    while offset < payload.len() {
        let end = (offset + frame_size).min(payload.len());
        frames.push(payload.slice(offset..end));
        offset = end;
    }
    frames
}

#[async_trait]
impl PartTransport for HttpPartTransport {
    async fn put_part(
        &self,
        signed_url: &str,
        payload: Bytes,
        on_progress: TransferProgressFn,
    ) -> Result<String> {
        let url = Url::parse(signed_url)?;
        let total = payload.len() as u64;

        let counter = Arc::new(TransferCounter::new(total, on_progress));
        let frames = frame_payload(&payload, BODY_FRAME_SIZE);
        let body_stream = ProgressStream::new(
            stream::iter(frames.into_iter().map(Ok::<_, std::io::Error>)),
            counter,
        );

        // 授权已内嵌在 URL 签名中，不附加任何认证头
        let response = self
            .client
            .put(url)
            .header(CONTENT_LENGTH, total)
            .body(reqwest::Body::wrap_stream(body_stream))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::backend(
                status.as_u16(),
                "Failed to put part to signed URL",
            ));
        }

        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.trim().to_string())
            .unwrap_or_default();

        if etag.is_empty() {
            // 存储端没有确认这个分片，交给重试
            return Err(UploadError::MissingEtag);
        }

        Ok(etag)
    }
}
