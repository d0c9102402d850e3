mod orchestrator;
mod progress;
mod transport;

pub use orchestrator::MultipartOrchestrator;
pub use progress::ProgressAggregator;
pub use transport::{HttpPartTransport, PartTransport};
