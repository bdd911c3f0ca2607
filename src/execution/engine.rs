//! Main execution engine - picks an executor for a pipeline and runs it

use crate::{
    core::{Pipeline, PipelineError},
    execution::{
        concurrent::ConcurrentStreamStrategy,
        executor::DEFAULT_SHELL,
        log::LogSink,
        sequential::SequentialExecutor,
        shell_pipe::{ShellPipeStrategy, DEFAULT_PIPE_SHELL},
        strategy::{select_strategy, Strategy},
    },
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};
use uuid::Uuid;

/// Events that can occur during pipeline execution
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    PipelineStarted {
        execution_id: Uuid,
        pipeline_name: String,
        started_at: DateTime<Utc>,
    },
    /// `None` means the sequential executor was used
    StrategySelected {
        strategy: Option<Strategy>,
    },
    WaveStarted {
        index: usize,
        steps: Vec<String>,
    },
    StepStarted {
        step: String,
    },
    StepCompleted {
        step: String,
    },
    StepFailed {
        step: String,
        error: String,
    },
    WaveCompleted {
        index: usize,
    },
    PipelineCompleted {
        execution_id: Uuid,
        success: bool,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Fans every event out to the registered handlers, in registration order
#[derive(Clone, Default)]
pub struct EventBus {
    handlers: Vec<EventHandler>,
}

impl EventBus {
    pub fn add_handler<F>(&mut self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.handlers.push(Arc::new(handler));
    }

    pub fn emit(&self, event: ExecutionEvent) {
        for handler in &self.handlers {
            handler(event.clone());
        }
    }
}

/// Run-time options
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Use the strategy engine instead of the sequential executor
    pub use_strategy: bool,
    pub force_strategy: Option<Strategy>,
    /// Directory receiving `<step>.out`, `<step>.err` and `pipeline.status`
    pub log_directory: Option<PathBuf>,
    /// Interpreter for individual steps
    pub shell: String,
    /// Interpreter for shell-pipe chains
    pub pipe_shell: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            use_strategy: false,
            force_strategy: None,
            log_directory: None,
            shell: DEFAULT_SHELL.to_string(),
            pipe_shell: DEFAULT_PIPE_SHELL.to_string(),
        }
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub execution_id: Uuid,
    pub pipeline_name: String,
    /// `None` when the sequential executor ran the pipeline
    pub strategy: Option<Strategy>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration: Duration,
}

/// Main pipeline execution engine
pub struct ExecutionEngine {
    options: RunOptions,
    log: Option<LogSink>,
    events: EventBus,
}

impl ExecutionEngine {
    pub fn new(options: RunOptions) -> Self {
        Self {
            options,
            log: None,
            events: EventBus::default(),
        }
    }

    /// Send subprocess output and progress lines to `log`
    pub fn with_log(mut self, log: LogSink) -> Self {
        self.log = Some(log);
        self
    }

    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.events.add_handler(handler);
    }

    /// Execute a pipeline
    pub async fn execute(&self, pipeline: &Pipeline) -> Result<RunSummary, PipelineError> {
        let execution_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();

        info!("Starting pipeline execution: {} ({})", pipeline.name, execution_id);
        self.events.emit(ExecutionEvent::PipelineStarted {
            execution_id,
            pipeline_name: pipeline.name.clone(),
            started_at,
        });

        let result = self.dispatch(pipeline).await;

        self.events.emit(ExecutionEvent::PipelineCompleted {
            execution_id,
            success: result.is_ok(),
        });

        match result {
            Ok(strategy) => {
                info!("Pipeline {} completed", pipeline.name);
                Ok(RunSummary {
                    execution_id,
                    pipeline_name: pipeline.name.clone(),
                    strategy,
                    started_at,
                    completed_at: Utc::now(),
                    duration: clock.elapsed(),
                })
            }
            Err(e) => {
                error!("Pipeline {} failed: {}", pipeline.name, e);
                Err(e)
            }
        }
    }

    async fn dispatch(&self, pipeline: &Pipeline) -> Result<Option<Strategy>, PipelineError> {
        pipeline.validate()?;
        let log_dir = self.options.log_directory.as_deref();

        if !self.options.use_strategy {
            self.events
                .emit(ExecutionEvent::StrategySelected { strategy: None });
            SequentialExecutor::new()
                .with_shell(self.options.shell.clone())
                .with_log(self.log.clone())
                .execute(pipeline, log_dir, &self.events)
                .await?;
            return Ok(None);
        }

        let strategy = select_strategy(pipeline, self.options.force_strategy)?;
        info!("Using {} strategy for pipeline {}", strategy, pipeline.name);
        self.events.emit(ExecutionEvent::StrategySelected {
            strategy: Some(strategy),
        });

        match strategy {
            Strategy::ShellPipe => {
                ShellPipeStrategy::new()
                    .with_shell(self.options.pipe_shell.clone())
                    .with_log(self.log.clone())
                    .execute(pipeline, log_dir)
                    .await?
            }
            Strategy::ConcurrentStream => {
                ConcurrentStreamStrategy::new()
                    .with_shell(self.options.shell.clone())
                    .with_log(self.log.clone())
                    .execute(pipeline, log_dir, &self.events)
                    .await?
            }
        }

        Ok(Some(strategy))
    }
}
