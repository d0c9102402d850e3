pub mod api;
pub mod config;
pub mod core;
pub mod multipart;
pub mod uploaders;
pub mod utils;

// 重新导出核心类型
pub use config::{ClientConfig, RetrySettings};
pub use self::core::{
    CompletedPart,
    FileMeta,
    FileResumeStore,
    MemoryResumeStore,
    MultipartSession,
    ProgressCallback,
    ProgressUpdate,
    Result,
    ResumeRecord,
    ResumeStore,
    UploadError,
    UploadIntent,
    UploadOutcome,
    UploadResponse,
    fingerprint,
};

// 重新导出上传器
pub use uploaders::{SingleShotUploader, UploadClient};
