pub mod cancel;
pub mod error;
pub mod executor;
pub mod manager;

pub use cancel::CancelToken;
pub use error::EngineError;
pub use executor::{ExecutorConfig, SequenceExecutor};
pub use manager::{ExecutionManager, ProgressEvent, RunningSequence};
