use std::path::Path;
use std::sync::Arc;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::debug;
use url::Url;
use crate::core::errors::{Result, UploadError};
use crate::core::types::{CompletedPart, UploadIntent, UploadResponse};
use crate::utils::progress::{ProgressStream, TransferCounter, TransferProgressFn};
use super::types::{
    CompleteRequest, InitiateRequest, InitiateResponse, MultipartStatus, SignPartRequest,
    SignPartResponse, StatusRequest,
};

/// 表单上传时文件流的读块大小
const FORM_STREAM_CAPACITY: usize = 64 * 1024;

/// 签名后端：负责会话查询、创建、分片签名、收尾，以及单次表单上传。
/// 外部协作方，这里只定义接口和 HTTP 管道；测试用替身实现
#[async_trait]
pub trait SigningBackend: Send + Sync {
    async fn multipart_status(&self, upload_id: &str) -> Result<MultipartStatus>;

    async fn multipart_initiate(&self, request: &InitiateRequest) -> Result<InitiateResponse>;

    /// 为指定分片签发一条限时预授权 URL
    async fn sign_part(&self, upload_id: &str, part_number: u32) -> Result<String>;

    /// parts 必须按 part_number 升序
    async fn multipart_complete(
        &self,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<UploadResponse>;

    /// 整文件表单上传，小文件与降级路径共用
    async fn single_shot(
        &self,
        intent: &UploadIntent,
        file_path: &Path,
        on_progress: TransferProgressFn,
    ) -> Result<UploadResponse>;
}

pub struct HttpSigningBackend {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpSigningBackend {
    pub fn new(endpoint: &str, token: Option<String>) -> Result<Self> {
        Self::with_client(Client::new(), endpoint, token)
    }

    pub fn with_client(client: Client, endpoint: &str, token: Option<String>) -> Result<Self> {
        // join 相对路径要求 base 以 / 结尾
        let base_url = if endpoint.ends_with('/') {
            Url::parse(endpoint)?
        } else {
            Url::parse(&format!("{}/", endpoint))?
        };

        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    fn route(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T> {
        let response = self
            .authorize(self.client.post(self.route(path)?))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(UploadError::backend(status.as_u16(), message));
        }

        Ok(response.json::<T>().await?)
    }

    async fn into_upload_response(response: Response) -> Result<UploadResponse> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(UploadError::backend(status.as_u16(), message));
        }

        let status = status.as_u16();
        let text = response.text().await.unwrap_or_default();
        // 非 JSON 响应体原样透传给调用方
        let data = serde_json::from_str(&text)
            .unwrap_or_else(|_| serde_json::Value::String(text));

        Ok(UploadResponse { status, data })
    }
}

#[async_trait]
impl SigningBackend for HttpSigningBackend {
    async fn multipart_status(&self, upload_id: &str) -> Result<MultipartStatus> {
        self.post_json(
            "uploads/multipart/status",
            &StatusRequest {
                multipart_upload_id: upload_id,
            },
        )
        .await
    }

    async fn multipart_initiate(&self, request: &InitiateRequest) -> Result<InitiateResponse> {
        self.post_json("uploads/multipart/initiate", request).await
    }

    async fn sign_part(&self, upload_id: &str, part_number: u32) -> Result<String> {
        let response: SignPartResponse = self
            .post_json(
                "uploads/multipart/sign-part",
                &SignPartRequest {
                    multipart_upload_id: upload_id,
                    part_number,
                },
            )
            .await?;

        Ok(response.signed_url)
    }

    async fn multipart_complete(
        &self,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<UploadResponse> {
        let response = self
            .authorize(self.client.post(self.route("uploads/multipart/complete")?))
            .json(&CompleteRequest {
                multipart_upload_id: upload_id,
                parts,
            })
            .send()
            .await?;

        Self::into_upload_response(response).await
    }

    async fn single_shot(
        &self,
        intent: &UploadIntent,
        file_path: &Path,
        on_progress: TransferProgressFn,
    ) -> Result<UploadResponse> {
        let file = File::open(file_path).await?;
        let total = intent.file.size_bytes;

        let counter = Arc::new(TransferCounter::new(total, on_progress));
        let stream = ProgressStream::new(
            ReaderStream::with_capacity(file, FORM_STREAM_CAPACITY),
            counter,
        );
        let file_part = Part::stream_with_length(Body::wrap_stream(stream), total)
            .file_name(intent.file.name.clone())
            .mime_str(&intent.file.content_type)?;

        let mut form = Form::new().text("title", intent.title.clone());
        if let Some(description) = &intent.description {
            form = form.text("description", description.clone());
        }
        if let Some(duration) = intent.duration_seconds {
            form = form.text("duration_seconds", duration.to_string());
        }
        if let Some(space) = &intent.space {
            form = form.text("space", space.clone());
        }
        if !intent.tags.is_empty() {
            form = form.text("tags", intent.tags.join(","));
        }
        let form = form.part("video", file_part);

        debug!("posting single-shot form upload: {} bytes", total);
        let response = self
            .authorize(self.client.post(self.route("uploads")?))
            .multipart(form)
            .send()
            .await?;

        Self::into_upload_response(response).await
    }
}
