//! Concurrent-stream strategy - runs waves of steps joined by broker streams
//!
//! Waves run one after another. Inside a wave every step gets its own task;
//! stream handles are acquired in admission order first, so a producer has
//! registered its stream before any consumer in the same wave asks for it.
//! Consumers scheduled after their producer's wave read from a spool.

use crate::{
    core::{ExecutionCause, Pipeline, PipelineError},
    execution::{
        engine::{EventBus, ExecutionEvent},
        executor::{StepExecutor, DEFAULT_SHELL},
        log::{record_status, LogSink},
        scheduler::{build_waves, deferred_consumers, Wave},
    },
    stream::StreamBroker,
};
use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio::task::{self, JoinSet};
use tracing::{error, info, warn};

/// Runs any pipeline shape as a series of concurrent waves
pub struct ConcurrentStreamStrategy {
    shell: String,
    log: Option<LogSink>,
}

impl ConcurrentStreamStrategy {
    pub fn new() -> Self {
        Self {
            shell: DEFAULT_SHELL.to_string(),
            log: None,
        }
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn with_log(mut self, log: Option<LogSink>) -> Self {
        self.log = log;
        self
    }

    pub async fn execute(
        &self,
        pipeline: &Pipeline,
        log_dir: Option<&Path>,
        events: &EventBus,
    ) -> Result<(), PipelineError> {
        pipeline.validate()?;
        let waves = build_waves(&pipeline.steps)?;

        let broker = deferred_consumers(&waves)
            .into_iter()
            .fold(StreamBroker::for_pipeline(pipeline), |broker, (name, count)| {
                broker.spool_consumers(name, count)
            });
        let broker = Arc::new(broker);
        let executor = Arc::new(
            StepExecutor::new(broker.clone())
                .with_shell(self.shell.clone())
                .with_log(self.log.clone())
                .with_log_dir(log_dir.map(Path::to_path_buf)),
        );

        info!(
            "Running pipeline {} in {} wave(s)",
            pipeline.name,
            waves.len()
        );

        let mut result = Ok(());
        for (index, wave) in waves.iter().enumerate() {
            if let Err(e) = self.run_wave(&executor, index, wave, events).await {
                result = Err(e);
                break;
            }
        }

        if let Err(e) = broker.close_all().await {
            warn!("Stream cleanup for pipeline {} failed: {}", pipeline.name, e);
            if result.is_ok() {
                result = Err(e.into());
            }
        }

        if let Some(dir) = log_dir {
            record_status(dir, &result);
        }

        result
    }

    /// Run one wave to its barrier and report the first failure, if any
    async fn run_wave(
        &self,
        executor: &Arc<StepExecutor>,
        index: usize,
        wave: &Wave<'_>,
        events: &EventBus,
    ) -> Result<(), PipelineError> {
        let names: Vec<String> = wave.iter().map(|s| s.name.clone()).collect();
        info!("Starting wave {}: {}", index + 1, names.join(", "));
        events.emit(ExecutionEvent::WaveStarted {
            index,
            steps: names,
        });

        // A handle that cannot be acquired aborts the wave before any launch;
        // dropping the prepared steps releases their streams.
        let mut prepared = Vec::with_capacity(wave.len());
        for step in wave {
            match executor.prepare(step).await {
                Ok(p) => prepared.push(p),
                Err(e) => {
                    error!("Step {} could not be wired: {}", step.name, e);
                    events.emit(ExecutionEvent::StepFailed {
                        step: step.name.clone(),
                        error: e.to_string(),
                    });
                    return Err(e);
                }
            }
        }

        let mut tasks = WaveTasks::new();
        for p in prepared {
            let name = p.step().name.clone();
            events.emit(ExecutionEvent::StepStarted { step: name.clone() });
            let executor = executor.clone();
            tasks.spawn(name, async move { executor.run(p).await });
        }
        let first_failure = tasks.join_all(events).await;

        events.emit(ExecutionEvent::WaveCompleted { index });
        match first_failure {
            None => Ok(()),
            Some(e) => {
                error!("Wave {} failed: {}", index + 1, e);
                Err(e)
            }
        }
    }
}

/// Running steps of one wave, keyed so a task that dies still has a name
struct WaveTasks {
    set: JoinSet<Result<(), PipelineError>>,
    names: HashMap<task::Id, String>,
}

impl WaveTasks {
    fn new() -> Self {
        Self {
            set: JoinSet::new(),
            names: HashMap::new(),
        }
    }

    fn spawn<F>(&mut self, step: String, run: F)
    where
        F: Future<Output = Result<(), PipelineError>> + Send + 'static,
    {
        let handle = self.set.spawn(run);
        self.names.insert(handle.id(), step);
    }

    /// Wait for every task and return the first failure, emitting one
    /// completion or failure event per step
    async fn join_all(mut self, events: &EventBus) -> Option<PipelineError> {
        let mut first_failure = None;
        while let Some(joined) = self.set.join_next_with_id().await {
            let (id, outcome) = match joined {
                Ok((id, outcome)) => (id, outcome),
                Err(join_error) => {
                    let id = join_error.id();
                    let step = self.names.get(&id).cloned().unwrap_or_default();
                    let cause = ExecutionCause::Aborted(join_error.to_string());
                    (id, Err(PipelineError::Execution { step, cause }))
                }
            };
            let step = self.names.remove(&id).unwrap_or_default();

            match outcome {
                Ok(()) => events.emit(ExecutionEvent::StepCompleted { step }),
                Err(e) => {
                    events.emit(ExecutionEvent::StepFailed {
                        step,
                        error: e.to_string(),
                    });
                    if first_failure.is_none() {
                        first_failure = Some(e);
                    }
                }
            }
        }
        first_failure
    }
}

impl Default for ConcurrentStreamStrategy {
    fn default() -> Self {
        Self::new()
    }
}
