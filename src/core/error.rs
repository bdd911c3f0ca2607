//! Error taxonomy for pipeline validation, stream brokering and execution

use std::io;
use thiserror::Error;

/// Structural problems found before anything is executed
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("pipeline has no name")]
    EmptyName,

    #[error("pipeline '{0}' has no steps")]
    EmptyPipeline(String),

    #[error("step #{0} has no name")]
    EmptyStepName(usize),

    #[error("step '{0}' has an empty command")]
    EmptyCommand(String),

    #[error("duplicate step name: {0}")]
    DuplicateStep(String),

    #[error("step name '{0}' cannot be used as a log file name")]
    InvalidStepName(String),

    #[error("step '{step}' reads from stream '{stream}' but no step produces it")]
    DanglingInput { step: String, stream: String },
}

/// Errors raised by the stream broker
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("stream '{0}' is already registered")]
    DuplicateStream(String),

    #[error("stream '{0}' was never registered")]
    StreamNotFound(String),

    #[error("stream '{0}' is closed")]
    StreamClosed(String),

    #[error("stream '{0}' has no unclaimed reader left")]
    ReaderUnavailable(String),

    /// Individual failures are flattened into `details`.
    #[error("failed to close {failures} stream(s): {details}")]
    CloseFailed { failures: usize, details: String },

    #[error("stream '{name}' I/O error: {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// Why a subprocess did not succeed
#[derive(Debug, Error)]
pub enum ExecutionCause {
    #[error("exit status {0}")]
    Exit(i32),

    #[error("terminated by signal")]
    Terminated,

    #[error("failed to launch: {0}")]
    Launch(#[source] io::Error),

    #[error("I/O error: {0}")]
    Io(#[source] io::Error),

    #[error("step task ended abnormally: {0}")]
    Aborted(String),
}

/// Top-level error surfaced to callers of pipeline execution
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("step '{step}': {source}")]
    Configuration {
        step: String,
        #[source]
        source: BrokerError,
    },

    #[error("step '{step}' failed: {cause}")]
    Execution {
        step: String,
        #[source]
        cause: ExecutionCause,
    },

    #[error("pipeline '{0}' is not linear and cannot run as a shell pipe")]
    NonLinearPipeline(String),

    #[error("unresolvable stream dependencies for steps: {}", .0.join(", "))]
    Scheduling(Vec<String>),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl PipelineError {
    /// Exit status of the failing shell command, if the failure carries one
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            PipelineError::Execution {
                cause: ExecutionCause::Exit(code),
                ..
            } => Some(*code),
            _ => None,
        }
    }
}
