//! Sequential executor - the plain one-step-at-a-time runner
//!
//! Steps run in declaration order on the calling task. A producer's stdout
//! is captured in full and replayed to each consumer, so no two processes
//! ever share a live stream.

use crate::{
    core::{BrokerError, Pipeline, PipelineError, Step},
    execution::{
        engine::{EventBus, ExecutionEvent},
        executor::{StepExecutor, DEFAULT_SHELL},
        log::{record_status, LogSink},
    },
    stream::StreamBroker,
};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub struct SequentialExecutor {
    shell: String,
    log: Option<LogSink>,
}

impl SequentialExecutor {
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

        let executor = StepExecutor::new(Arc::new(StreamBroker::new()))
            .with_shell(self.shell.clone())
            .with_log(self.log.clone())
            .with_log_dir(log_dir.map(Path::to_path_buf));

        self.progress(format!("Executing pipeline: {}", pipeline.name));
        if let Some(description) = &pipeline.description {
            self.progress(format!("Description: {}", description));
        }

        let result = self.run_steps(&executor, pipeline, events).await;

        if let Some(dir) = log_dir {
            record_status(dir, &result);
        }

        result?;
        self.progress(format!("Pipeline '{}' completed successfully", pipeline.name));
        Ok(())
    }

    async fn run_steps(
        &self,
        executor: &StepExecutor,
        pipeline: &Pipeline,
        events: &EventBus,
    ) -> Result<(), PipelineError> {
        let total = pipeline.steps.len();
        let mut captured: HashMap<&str, Vec<u8>> = HashMap::new();

        for (index, step) in pipeline.steps.iter().enumerate() {
            self.progress(format!("[Step {}/{}] {}", index + 1, total, step.name));
            self.progress(format!("Command: {}", step.command));
            if let Some(input) = step.input() {
                self.progress(format!("Input: {}", input));
            }
            if let Some(output) = step.output() {
                self.progress(format!("Output: {}", output));
            }

            events.emit(ExecutionEvent::StepStarted {
                step: step.name.clone(),
            });
            match self.run_step(executor, step, &captured).await {
                Ok(bytes) => {
                    if let (Some(output), Some(bytes)) = (step.output(), bytes) {
                        captured.insert(output, bytes);
                    }
                    events.emit(ExecutionEvent::StepCompleted {
                        step: step.name.clone(),
                    });
                    self.progress(format!("Step '{}' completed successfully", step.name));
                }
                Err(e) => {
                    events.emit(ExecutionEvent::StepFailed {
                        step: step.name.clone(),
                        error: e.to_string(),
                    });
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    async fn run_step(
        &self,
        executor: &StepExecutor,
        step: &Step,
        captured: &HashMap<&str, Vec<u8>>,
    ) -> Result<Option<Vec<u8>>, PipelineError> {
        let stdin = match step.input() {
            Some(input) => Some(captured.get(input).cloned().ok_or_else(|| {
                PipelineError::Configuration {
                    step: step.name.clone(),
                    source: BrokerError::StreamNotFound(input.to_string()),
                }
            })?),
            None => None,
        };
        executor
            .run_buffered(step, stdin, step.output().is_some())
            .await
    }

    fn progress(&self, line: impl fmt::Display) {
        info!("{}", line);
        if let Some(log) = &self.log {
            log.line(line);
        }
    }
}

impl Default for SequentialExecutor {
    fn default() -> Self {
        Self::new()
    }
}
