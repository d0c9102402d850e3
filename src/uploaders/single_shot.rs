use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use crate::api::SigningBackend;
use crate::core::errors::Result;
use crate::core::types::{UploadIntent, UploadResponse};
use crate::multipart::ProgressAggregator;
use crate::utils::progress::TransferProgressFn;

/// 单次表单上传
///
/// 小文件或后端不支持分片时使用；无断点语义，
/// 中断即失败，由调用方从零重来
pub struct SingleShotUploader {
    backend: Arc<dyn SigningBackend>,
}

impl SingleShotUploader {
    pub fn new(backend: Arc<dyn SigningBackend>) -> Self {
        Self { backend }
    }

    pub async fn upload(
        &self,
        intent: &UploadIntent,
        file_path: &Path,
        aggregator: Arc<ProgressAggregator>,
    ) -> Result<UploadResponse> {
        aggregator.part_started(1);

        let tick: TransferProgressFn = {
            let aggregator = aggregator.clone();
            Arc::new(move |sent, _total| aggregator.part_progress(1, sent))
        };

        let response = self.backend.single_shot(intent, file_path, tick).await?;
        aggregator.finish();
        debug!("single-shot upload finished with status {}", response.status);

        Ok(response)
    }
}
