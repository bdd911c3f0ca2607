//! Shell-pipe strategy - hands a linear pipeline to the shell as one pipe
//!
//! All buffering and backpressure between steps is left to the operating
//! system. `pipefail` keeps a failing stage from being masked by a later
//! successful one.

use crate::{
    core::{is_simple_linear, Pipeline, PipelineError, Step},
    execution::{
        executor::StepExecutor,
        log::{record_status, step_log_path, LogSink},
    },
    stream::StreamBroker,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Interpreter used for pipe chains; must support `set -o pipefail`
pub const DEFAULT_PIPE_SHELL: &str = "bash";

/// Runs linear pipelines through a single shell invocation
pub struct ShellPipeStrategy {
    shell: String,
    log: Option<LogSink>,
}

impl ShellPipeStrategy {
    pub fn new() -> Self {
        Self {
            shell: DEFAULT_PIPE_SHELL.to_string(),
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

    /// Run `pipeline` directly, or through a logging script when
    /// `log_dir` is set.
    pub async fn execute(
        &self,
        pipeline: &Pipeline,
        log_dir: Option<&Path>,
    ) -> Result<(), PipelineError> {
        if !is_simple_linear(pipeline) {
            return Err(PipelineError::NonLinearPipeline(pipeline.name.clone()));
        }

        match log_dir {
            None => self.execute_direct(pipeline).await,
            Some(dir) => self.execute_logged(pipeline, dir).await,
        }
    }

    async fn execute_direct(&self, pipeline: &Pipeline) -> Result<(), PipelineError> {
        let command = direct_command(pipeline);
        info!("Running pipeline {} as a shell pipe", pipeline.name);
        debug!("Shell pipe: {}", command);

        self.executor()
            .execute(&Step::new(pipeline.name.clone(), command))
            .await
    }

    async fn execute_logged(&self, pipeline: &Pipeline, dir: &Path) -> Result<(), PipelineError> {
        tokio::fs::create_dir_all(dir).await?;

        let script_path = dir.join(format!(".streampipe-{}.sh", Uuid::new_v4()));
        tokio::fs::write(&script_path, logged_script(pipeline, dir)).await?;
        info!(
            "Running pipeline {} through logging script {}",
            pipeline.name,
            script_path.display()
        );

        let command = format!("exec {} {}", self.shell, shell_quote(&script_path.to_string_lossy()));
        let result = self
            .executor()
            .execute(&Step::new(pipeline.name.clone(), command))
            .await;

        if let Err(e) = tokio::fs::remove_file(&script_path).await {
            warn!("Failed to remove {}: {}", script_path.display(), e);
        }

        record_status(dir, &result);

        result
    }

    fn executor(&self) -> StepExecutor {
        StepExecutor::new(Arc::new(StreamBroker::new()))
            .with_shell(self.shell.clone())
            .with_log(self.log.clone())
    }
}

impl Default for ShellPipeStrategy {
    fn default() -> Self {
        Self::new()
    }
}

/// `set -o pipefail; (cmd1\n) | (cmd2\n) | ...`
///
/// Every stage is closed on its own line, so a multi-line command stays one
/// stage and a trailing `#` comment cannot swallow the stages after it.
pub fn direct_command(pipeline: &Pipeline) -> String {
    let stages: Vec<String> = pipeline
        .steps
        .iter()
        .map(|step| format!("( {}\n)", step.command.trim()))
        .collect();

    format!("set -o pipefail; {}", stages.join(" | "))
}

/// Script that tees every stage's stdout to `<step>.out` and its stderr to
/// `<step>.err` under `dir`.
pub fn logged_script(pipeline: &Pipeline, dir: &Path) -> String {
    let stages: Vec<String> = pipeline
        .steps
        .iter()
        .map(|step| {
            let out: PathBuf = step_log_path(dir, &step.name, "out");
            let err: PathBuf = step_log_path(dir, &step.name, "err");
            format!(
                "( {}\n) 2> {} | tee {}",
                step.command.trim(),
                shell_quote(&err.to_string_lossy()),
                shell_quote(&out.to_string_lossy())
            )
        })
        .collect();

    format!(
        "#!/usr/bin/env bash\n# pipeline: {}\nset -o pipefail\n{}\n",
        pipeline.name.replace('\n', " "),
        stages.join(" |\n")
    )
}

/// Single-quote `value` for POSIX shells
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
