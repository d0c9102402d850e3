use std::path::Path;
use std::sync::Arc;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;
use crate::api::{HttpSigningBackend, SigningBackend};
use crate::config::ClientConfig;
use crate::core::errors::{Result, UploadError};
use crate::core::store::{FileResumeStore, MemoryResumeStore, ResumeStore};
use crate::core::types::{ProgressCallback, UploadIntent, UploadOutcome};
use crate::multipart::{HttpPartTransport, MultipartOrchestrator, PartTransport, ProgressAggregator};
use super::single_shot::SingleShotUploader;

/// 上传入口
///
/// 按文件大小选择分片或单次上传，把两条路径的结果和所有错误
/// 统一成 UploadOutcome。这是唯一的异常归一化边界，
/// 错误不会越过它向外抛
pub struct UploadClient {
    backend: Arc<dyn SigningBackend>,
    transport: Arc<dyn PartTransport>,
    store: Arc<dyn ResumeStore>,
    config: ClientConfig,
}

impl UploadClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = reqwest::Client::new();
        let backend = Arc::new(HttpSigningBackend::with_client(
            client.clone(),
            &config.endpoint,
            config.token.clone(),
        )?);
        let transport = Arc::new(HttpPartTransport::new(client));
        let store: Arc<dyn ResumeStore> = match &config.resume_path {
            Some(path) => Arc::new(FileResumeStore::new(path)),
            None => Arc::new(MemoryResumeStore::new()),
        };

        Ok(Self::with_parts(backend, transport, store, config))
    }

    /// 以显式组件构造，测试替身从这里注入
    pub fn with_parts(
        backend: Arc<dyn SigningBackend>,
        transport: Arc<dyn PartTransport>,
        store: Arc<dyn ResumeStore>,
        config: ClientConfig,
    ) -> Self {
        Self {
            backend,
            transport,
            store,
            config,
        }
    }

    pub async fn upload(
        &self,
        intent: &UploadIntent,
        file_path: &Path,
        on_progress: ProgressCallback,
    ) -> UploadOutcome {
        let attempt = Uuid::new_v4();
        let span = info_span!(
            "upload",
            attempt = %attempt,
            file = %intent.file.name,
            size = intent.file.size_bytes,
        );
        self.upload_inner(intent, file_path, on_progress)
            .instrument(span)
            .await
    }

    async fn upload_inner(
        &self,
        intent: &UploadIntent,
        file_path: &Path,
        on_progress: ProgressCallback,
    ) -> UploadOutcome {
        if intent.file.size_bytes >= self.config.multipart_threshold {
            let aggregator = Arc::new(ProgressAggregator::new(
                intent.file.size_bytes,
                Some(on_progress.clone()),
            ));
            let orchestrator = MultipartOrchestrator::new(
                self.backend.clone(),
                self.transport.clone(),
                self.store.clone(),
                self.config.part_concurrency,
                self.config.retry.clone(),
            );

            match orchestrator.run(intent, file_path, aggregator).await {
                Ok(response) => return UploadOutcome::from_response(response),
                Err(UploadError::MultipartUnsupported { status }) => {
                    info!(
                        "backend does not support multipart here (status {}), falling back to single-shot",
                        status
                    );
                    // 落到下面的单次上传
                }
                // 其余分片失败原样返回：服务端可能已存在部分分片，
                // 静默降级会重复传整个文件
                Err(err) => return UploadOutcome::from_error(&err),
            }
        }

        self.single_shot(intent, file_path, on_progress).await
    }

    async fn single_shot(
        &self,
        intent: &UploadIntent,
        file_path: &Path,
        on_progress: ProgressCallback,
    ) -> UploadOutcome {
        let aggregator = Arc::new(ProgressAggregator::new(
            intent.file.size_bytes,
            Some(on_progress),
        ));
        let uploader = SingleShotUploader::new(self.backend.clone());

        match uploader.upload(intent, file_path, aggregator).await {
            Ok(response) => UploadOutcome::from_response(response),
            Err(err) => UploadOutcome::from_error(&err),
        }
    }
}
