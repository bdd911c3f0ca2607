//! streampipe - Run chains of shell commands joined by named byte streams

pub mod cli;
pub mod core;
pub mod execution;
pub mod stream;

// Re-export commonly used types
pub use core::{Pipeline, PipelineError, Step, ValidationError};
pub use execution::{ExecutionEngine, ExecutionEvent, RunOptions, RunSummary, Strategy};
pub use stream::StreamBroker;
