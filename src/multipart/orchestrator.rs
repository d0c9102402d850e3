use std::collections::{BTreeMap, VecDeque};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use bytes::Bytes;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use crate::api::SigningBackend;
use crate::api::types::{InitiateRequest, SESSION_STATUS_INITIATED};
use crate::config::RetrySettings;
use crate::core::errors::{Result, UploadError};
use crate::core::fingerprint::fingerprint;
use crate::core::store::ResumeStore;
use crate::core::types::{MultipartSession, ResumeRecord, UploadIntent, UploadResponse};
use crate::utils::progress::TransferProgressFn;
use crate::utils::retry::RetryBuilder;
use super::progress::ProgressAggregator;
use super::transport::PartTransport;

/// 分片上传编排器
///
/// 状态推进：查断点 → 续传或新建会话 → 落盘断点 → 并发补传缺失分片 →
/// 收尾。除断点记录外无跨调用状态，每次 run 自洽
pub struct MultipartOrchestrator {
    backend: Arc<dyn SigningBackend>,
    transport: Arc<dyn PartTransport>,
    store: Arc<dyn ResumeStore>,
    concurrency: usize,
    retry: RetrySettings,
}

impl MultipartOrchestrator {
    pub fn new(
        backend: Arc<dyn SigningBackend>,
        transport: Arc<dyn PartTransport>,
        store: Arc<dyn ResumeStore>,
        concurrency: usize,
        retry: RetrySettings,
    ) -> Self {
        Self {
            backend,
            transport,
            store,
            concurrency,
            retry,
        }
    }

    pub async fn run(
        &self,
        intent: &UploadIntent,
        file_path: &Path,
        aggregator: Arc<ProgressAggregator>,
    ) -> Result<UploadResponse> {
        let fp = fingerprint(intent);

        let mut session = match self.adopt_session(intent, &fp).await? {
            Some(session) => session,
            None => self.initiate_session(intent).await?,
        };

        // 任何分片传输开始前先落盘断点，页面重载后由此恢复
        self.store
            .write(
                &fp,
                &ResumeRecord {
                    upload_id: session.upload_id.clone(),
                    size_bytes: intent.file.size_bytes,
                    filename: intent.file.name.clone(),
                    last_modified: intent.file.last_modified_ms,
                    saved_at: Utc::now(),
                },
            )
            .await;

        session.validate_layout()?;

        // 已确认分片的字节一次性预先计入进度
        let acknowledged: u64 = session
            .completed
            .keys()
            .map(|&part_number| session.part_len(part_number))
            .sum();
        if acknowledged > 0 {
            aggregator.precredit(acknowledged);
        }

        let missing = session.missing_parts();
        debug!(
            "multipart session {}: {}/{} parts already acknowledged",
            session.upload_id,
            session.completed.len(),
            session.total_parts
        );
        if !missing.is_empty() {
            self.upload_parts(&mut session, file_path, missing, aggregator.clone())
                .await?;
        }

        let parts = session.completed_parts();
        match self.backend.multipart_complete(&session.upload_id, &parts).await {
            Ok(response) => {
                self.store.clear(&fp).await;
                aggregator.finish();
                info!("multipart upload {} completed", session.upload_id);
                Ok(response)
            }
            Err(err) if err.is_session_terminal() => {
                // 会话已不可恢复，断点一并清除
                warn!(
                    "complete rejected terminally for {}, clearing resume record: {}",
                    session.upload_id, err
                );
                self.store.clear(&fp).await;
                Err(err)
            }
            // 其他失败保留断点，整体重试会从 status 查询续起
            Err(err) => Err(err),
        }
    }

    /// 尝试采用断点记录指向的服务端会话
    async fn adopt_session(
        &self,
        intent: &UploadIntent,
        fp: &str,
    ) -> Result<Option<MultipartSession>> {
        let Some(record) = self.store.read(fp).await else {
            return Ok(None);
        };

        if record.size_bytes != intent.file.size_bytes {
            debug!(
                "resume record size mismatch (recorded {}, actual {}), ignoring",
                record.size_bytes, intent.file.size_bytes
            );
            return Ok(None);
        }

        match self.backend.multipart_status(&record.upload_id).await {
            Ok(status) if status.status == SESSION_STATUS_INITIATED => {
                info!(
                    "resuming upload {}: {} parts acknowledged",
                    status.multipart_upload_id,
                    status.uploaded_parts.len()
                );

                let total_parts = status.total_parts;
                let mut completed = BTreeMap::new();
                for part in status.uploaded_parts {
                    // 越界分片号不可信，丢弃
                    if part.part_number >= 1 && part.part_number <= total_parts {
                        completed.insert(part.part_number, part.etag);
                    } else {
                        warn!(
                            "backend listed out-of-range part {} for {}, dropping",
                            part.part_number, status.multipart_upload_id
                        );
                    }
                }

                Ok(Some(MultipartSession {
                    upload_id: status.multipart_upload_id,
                    file_size: intent.file.size_bytes,
                    part_size: status.part_size,
                    total_parts,
                    completed,
                }))
            }
            Ok(status) => {
                // 服务端明确报告了一个无法续传的状态，视同会话失效
                debug!(
                    "session {} no longer resumable (status {:?}), clearing record",
                    record.upload_id, status.status
                );
                self.store.clear(fp).await;
                Ok(None)
            }
            Err(err) if err.is_session_terminal() => {
                debug!(
                    "session {} invalid ({}), clearing record",
                    record.upload_id, err
                );
                self.store.clear(fp).await;
                Ok(None)
            }
            Err(err) => {
                // 歧义失败：不清理也不降级，直接中止本次尝试
                warn!(
                    "status check for {} failed ambiguously, aborting attempt: {}",
                    record.upload_id, err
                );
                Err(err)
            }
        }
    }

    async fn initiate_session(&self, intent: &UploadIntent) -> Result<MultipartSession> {
        let request = InitiateRequest::from_intent(intent);
        let response = self
            .backend
            .multipart_initiate(&request)
            .await
            .map_err(|err| match err.status() {
                // 后端对该请求不支持分片上传，由门面决定是否降级
                Some(status @ (400 | 404 | 405)) => UploadError::MultipartUnsupported { status },
                _ => err,
            })?;

        info!(
            "initiated multipart upload {}: part_size={}, total_parts={}",
            response.multipart_upload_id, response.part_size, response.total_parts
        );

        Ok(MultipartSession {
            upload_id: response.multipart_upload_id,
            file_size: intent.file.size_bytes,
            part_size: response.part_size,
            total_parts: response.total_parts,
            completed: BTreeMap::new(),
        })
    }

    /// 固定大小的 worker 池从共享游标认领分片号并补传
    async fn upload_parts(
        &self,
        session: &mut MultipartSession,
        file_path: &Path,
        missing: Vec<u32>,
        aggregator: Arc<ProgressAggregator>,
    ) -> Result<()> {
        let workers = self.concurrency.max(1).min(missing.len());
        let queue = Arc::new(Mutex::new(VecDeque::from(missing)));
        let results = Arc::new(Mutex::new(BTreeMap::new()));
        let aborted = Arc::new(AtomicBool::new(false));
        let first_error = Arc::new(Mutex::new(None));

        let mut set = JoinSet::new();
        for _ in 0..workers {
            let worker = PartWorker {
                backend: self.backend.clone(),
                transport: self.transport.clone(),
                retry: self.retry.clone(),
                file_path: file_path.to_path_buf(),
                session: session.clone(),
                aggregator: aggregator.clone(),
                queue: queue.clone(),
                results: results.clone(),
                aborted: aborted.clone(),
                first_error: first_error.clone(),
            };
            set.spawn(worker.run());
        }

        // 在途分片允许收尾，但出错后不会再有新分片被认领
        while set.join_next().await.is_some() {}

        if let Some(err) = first_error.lock().take() {
            // 断点记录有意保留，下一次调用从中断处续传
            return Err(err);
        }

        let uploaded = std::mem::take(&mut *results.lock());
        for (part_number, etag) in uploaded {
            session.completed.insert(part_number, etag);
        }

        Ok(())
    }
}

struct PartWorker {
    backend: Arc<dyn SigningBackend>,
    transport: Arc<dyn PartTransport>,
    retry: RetrySettings,
    file_path: PathBuf,
    session: MultipartSession,
    aggregator: Arc<ProgressAggregator>,
    queue: Arc<Mutex<VecDeque<u32>>>,
    results: Arc<Mutex<BTreeMap<u32, String>>>,
    aborted: Arc<AtomicBool>,
    first_error: Arc<Mutex<Option<UploadError>>>,
}

impl PartWorker {
    async fn run(self) {
        loop {
            // 某个兄弟分片重试耗尽后不再认领新分片
            if self.aborted.load(Ordering::SeqCst) {
                break;
            }

            let part_number = { self.queue.lock().pop_front() };
            let Some(part_number) = part_number else {
                break;
            };

            match self.upload_part(part_number).await {
                Ok(etag) => {
                    self.results.lock().insert(part_number, etag);
                    self.aggregator
                        .part_completed(part_number, self.session.part_len(part_number));
                    debug!("part {} uploaded", part_number);
                }
                Err(err) => {
                    warn!("part {} failed after retries: {}", part_number, err);
                    self.aborted.store(true, Ordering::SeqCst);
                    let mut slot = self.first_error.lock();
                    if slot.is_none() {
                        *slot = Some(err);
                    }
                    break;
                }
            }
        }
    }

    async fn upload_part(&self, part_number: u32) -> Result<String> {
        self.aggregator.part_started(part_number);

        let signed_url = RetryBuilder::new()
            .max_attempts(self.retry.max_attempts)
            .strategy(self.retry.strategy())
            .jitter(self.retry.jitter())
            .run(|| self.backend.sign_part(&self.session.upload_id, part_number))
            .await?;

        let payload = self.read_part(part_number).await?;
        let aggregator = self.aggregator.clone();
        let on_progress: TransferProgressFn =
            Arc::new(move |sent, _total| aggregator.part_progress(part_number, sent));

        RetryBuilder::new()
            .max_attempts(self.retry.max_attempts)
            .strategy(self.retry.strategy())
            .jitter(self.retry.jitter())
            .run(|| {
                self.transport
                    .put_part(&signed_url, payload.clone(), on_progress.clone())
            })
            .await
    }

    /// 读出该分片对应的字节区间
    async fn read_part(&self, part_number: u32) -> Result<Bytes> {
        let offset = self.session.part_offset(part_number);
        let len = self.session.part_len(part_number) as usize;

        let mut file = File::open(&self.file_path).await?;
        file.seek(SeekFrom::Start(offset)).await?;

        let mut buffer = vec![0u8; len];
        file.read_exact(&mut buffer).await?;

        Ok(Bytes::from(buffer))
    }
}
