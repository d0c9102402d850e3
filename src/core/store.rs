use std::collections::HashMap;
use std::path::PathBuf;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;
use super::types::ResumeRecord;

/// 键名空间前缀
pub const STORE_PREFIX: &str = "ferry.upload";

/// 记录格式版本号，格式变更时递增即可避开旧记录
pub const STORE_SCHEMA_VERSION: u32 = 1;

/// 指纹对应的存储键
pub fn store_key(fingerprint: &str) -> String {
    format!("{}:v{}:{}", STORE_PREFIX, STORE_SCHEMA_VERSION, fingerprint)
}

/// 断点记录存储
///
/// 所有操作都是 best-effort：存储不可用时 read 返回 None，
/// write/clear 静默跳过，绝不向上抛错
#[async_trait]
pub trait ResumeStore: Send + Sync {
    async fn read(&self, fingerprint: &str) -> Option<ResumeRecord>;
    async fn write(&self, fingerprint: &str, record: &ResumeRecord);
    async fn clear(&self, fingerprint: &str);
}

/// 单个 JSON 文件承载的键值存储，按客户端安装范围持久化
pub struct FileResumeStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileResumeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Option<HashMap<String, ResumeRecord>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => match serde_json::from_str(&data) {
                Ok(map) => Some(map),
                Err(err) => {
                    debug!("resume store is unreadable, ignoring: {}", err);
                    None
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Some(HashMap::new()),
            Err(err) => {
                debug!("resume store read failed: {}", err);
                None
            }
        }
    }

    async fn save(&self, map: &HashMap<String, ResumeRecord>) {
        if let Some(parent) = self.path.parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }
        match serde_json::to_string_pretty(map) {
            Ok(data) => {
                if let Err(err) = tokio::fs::write(&self.path, data).await {
                    debug!("resume store write failed: {}", err);
                }
            }
            Err(err) => debug!("resume store encode failed: {}", err),
        }
    }
}

#[async_trait]
impl ResumeStore for FileResumeStore {
    async fn read(&self, fingerprint: &str) -> Option<ResumeRecord> {
        let _guard = self.lock.lock().await;
        self.load().await?.get(&store_key(fingerprint)).cloned()
    }

    async fn write(&self, fingerprint: &str, record: &ResumeRecord) {
        let _guard = self.lock.lock().await;
        let mut map = self.load().await.unwrap_or_default();
        map.insert(store_key(fingerprint), record.clone());
        self.save(&map).await;
    }

    async fn clear(&self, fingerprint: &str) {
        let _guard = self.lock.lock().await;
        let mut map = self.load().await.unwrap_or_default();
        if map.remove(&store_key(fingerprint)).is_some() {
            self.save(&map).await;
        }
    }
}

/// 内存实现：测试替身，也用于关闭持久化的调用方
#[derive(Default)]
pub struct MemoryResumeStore {
    records: parking_lot::Mutex<HashMap<String, ResumeRecord>>,
}

impl MemoryResumeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResumeStore for MemoryResumeStore {
    async fn read(&self, fingerprint: &str) -> Option<ResumeRecord> {
        self.records.lock().get(&store_key(fingerprint)).cloned()
    }

    async fn write(&self, fingerprint: &str, record: &ResumeRecord) {
        self.records
            .lock()
            .insert(store_key(fingerprint), record.clone());
    }

    async fn clear(&self, fingerprint: &str) {
        self.records.lock().remove(&store_key(fingerprint));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record() -> ResumeRecord {
        ResumeRecord {
            upload_id: "U1".to_string(),
            size_bytes: 1024,
            filename: "a.webm".to_string(),
            last_modified: 1_700_000_000_000,
            saved_at: Utc::now(),
        }
    }

    #[test]
    fn test_store_key_versioned() {
        assert_eq!(store_key("abc"), "ferry.upload:v1:abc");
    }

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileResumeStore::new(dir.path().join("resume.json"));

        assert!(store.read("fp").await.is_none());

        store.write("fp", &record()).await;
        let loaded = store.read("fp").await.unwrap();
        assert_eq!(loaded.upload_id, "U1");
        assert!(store.read("other").await.is_none());

        store.clear("fp").await;
        assert!(store.read("fp").await.is_none());
    }

    #[tokio::test]
    async fn test_file_store_survives_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resume.json");
        tokio::fs::write(&path, "not json at all").await.unwrap();

        let store = FileResumeStore::new(&path);
        assert!(store.read("fp").await.is_none());

        // 写入会覆盖损坏的内容
        store.write("fp", &record()).await;
        assert!(store.read("fp").await.is_some());
    }

    #[tokio::test]
    async fn test_file_store_unwritable_path_is_silent() {
        // 以文件作为父目录，write/clear 必然失败，但不应 panic 或报错
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        tokio::fs::write(&blocker, "x").await.unwrap();

        let store = FileResumeStore::new(blocker.join("resume.json"));
        store.write("fp", &record()).await;
        store.clear("fp").await;
        assert!(store.read("fp").await.is_none());
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryResumeStore::new();
        store.write("fp", &record()).await;
        assert!(store.read("fp").await.is_some());
        store.clear("fp").await;
        assert!(store.read("fp").await.is_none());
    }
}
