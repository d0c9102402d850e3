pub mod progress;
pub mod retry;

pub use progress::{ProgressStream, TransferCounter, TransferProgressFn};
pub use retry::{retry, retry_with_config, RetryBuilder, RetryConfig, RetryStrategy};
