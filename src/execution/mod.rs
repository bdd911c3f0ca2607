//! Pipeline execution engine

pub mod concurrent;
pub mod engine;
pub mod executor;
pub mod log;
pub mod scheduler;
pub mod sequential;
pub mod shell_pipe;
pub mod strategy;

pub use concurrent::ConcurrentStreamStrategy;
pub use engine::{EventBus, ExecutionEngine, ExecutionEvent, RunOptions, RunSummary};
pub use executor::{PreparedStep, StepExecutor};
pub use log::{LogSink, MemoryLog};
pub use scheduler::{build_waves, Wave};
pub use sequential::SequentialExecutor;
pub use shell_pipe::ShellPipeStrategy;
pub use strategy::{select_strategy, Strategy};
