pub mod errors;
pub mod fingerprint;
pub mod store;
pub mod types;

pub use errors::{Result, UploadError};
pub use fingerprint::fingerprint;
pub use store::{FileResumeStore, MemoryResumeStore, ResumeStore};
pub use types::{
    CompletedPart, FileMeta, MultipartSession, ProgressCallback, ProgressUpdate, ResumeRecord,
    UploadIntent, UploadOutcome, UploadResponse,
};
