//! Step executor - runs a single step as a shell subprocess
//!
//! Broker streams are wired to the child's stdin/stdout; stdout may also be
//! teed into the log sink and, when a log directory is set, `<step>.out`.
//! Stderr only ever goes to logs.

use crate::{
    core::{ExecutionCause, PipelineError, Step},
    execution::log::{step_log_path, LogSink},
    stream::{StreamBroker, StreamReader, StreamWriter},
};
use std::io::{self, Cursor};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{ChildStderr, ChildStdout, Command};
use tracing::{debug, error, info, warn};

const READ_CHUNK: usize = 8 * 1024;

/// Shell used for individual steps unless overridden
pub const DEFAULT_SHELL: &str = "sh";

type ByteSource = Box<dyn AsyncRead + Send + Unpin>;

/// A step whose stream handles have been acquired but whose process has not
/// started yet.
pub struct PreparedStep {
    step: Step,
    input: Option<StreamReader>,
    output: Option<StreamWriter>,
}

impl PreparedStep {
    pub fn step(&self) -> &Step {
        &self.step
    }
}

/// Per-step `.out` / `.err` files
struct StepLogs {
    stdout: LogSink,
    stderr: LogSink,
}

/// Executes steps against one broker
pub struct StepExecutor {
    broker: Arc<StreamBroker>,
    shell: String,
    log: Option<LogSink>,
    log_dir: Option<PathBuf>,
}

impl StepExecutor {
    pub fn new(broker: Arc<StreamBroker>) -> Self {
        Self {
            broker,
            shell: DEFAULT_SHELL.to_string(),
            log: None,
            log_dir: None,
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

    pub fn with_log_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.log_dir = dir;
        self
    }

    /// Acquire stream handles for `step` and run it to completion
    pub async fn execute(&self, step: &Step) -> Result<(), PipelineError> {
        let prepared = self.prepare(step).await?;
        self.run(prepared).await
    }

    /// Register the step's output stream, then claim its input stream.
    ///
    /// If the input cannot be claimed the freshly created output is closed
    /// again so its readers see EOF.
    pub async fn prepare(&self, step: &Step) -> Result<PreparedStep, PipelineError> {
        let output = match step.output() {
            Some(name) => Some(self.broker.create(name).await.map_err(|source| {
                PipelineError::Configuration {
                    step: step.name.clone(),
                    source,
                }
            })?),
            None => None,
        };

        let input = match step.input() {
            Some(name) => match self.broker.get(name).await {
                Ok(reader) => Some(reader),
                Err(source) => {
                    if let Some(writer) = &output {
                        let _ = writer.close().await;
                    }
                    return Err(PipelineError::Configuration {
                        step: step.name.clone(),
                        source,
                    });
                }
            },
            None => None,
        };

        Ok(PreparedStep {
            step: step.clone(),
            input,
            output,
        })
    }

    /// Run a prepared step. The output stream is closed on every path.
    pub async fn run(&self, prepared: PreparedStep) -> Result<(), PipelineError> {
        let PreparedStep {
            step,
            input,
            output,
        } = prepared;

        let stdin = input.map(|reader| Box::new(reader) as ByteSource);
        let result = self.run_process(&step, stdin, output.as_ref(), None).await;

        if let Some(writer) = &output {
            if let Err(e) = writer.close().await {
                warn!("Step {} could not close stream '{}': {}", step.name, writer.name(), e);
            }
        }

        result
    }

    /// Run `step` without the broker: stdin is replayed from `stdin`, and
    /// stdout is returned in full when `capture` is set.
    pub async fn run_buffered(
        &self,
        step: &Step,
        stdin: Option<Vec<u8>>,
        capture: bool,
    ) -> Result<Option<Vec<u8>>, PipelineError> {
        let source = stdin.map(|bytes| Box::new(Cursor::new(bytes)) as ByteSource);
        let mut captured = Vec::new();
        let target = if capture { Some(&mut captured) } else { None };
        self.run_process(step, source, None, target).await?;
        Ok(capture.then_some(captured))
    }

    async fn run_process(
        &self,
        step: &Step,
        stdin: Option<ByteSource>,
        output: Option<&StreamWriter>,
        capture: Option<&mut Vec<u8>>,
    ) -> Result<(), PipelineError> {
        info!("Executing step: {}", step.name);
        debug!("Command for step {}: {}", step.name, step.command);

        let step_logs = self.open_step_logs(step)?;
        let log = self.log.as_ref();
        let forward_stdout =
            output.is_some() || capture.is_some() || log.is_some() || step_logs.is_some();
        let forward_stderr = log.is_some() || step_logs.is_some();

        let mut command = Command::new(&self.shell);
        command
            .arg("-c")
            .arg(&step.command)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(if forward_stdout { Stdio::piped() } else { Stdio::inherit() })
            .stderr(if forward_stderr { Stdio::piped() } else { Stdio::inherit() })
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .map_err(|e| execution_error(step, ExecutionCause::Launch(e)))?;

        let feeder = match (stdin, child.stdin.take()) {
            (Some(mut source), Some(mut sink)) => Some(tokio::spawn(async move {
                let copied = tokio::io::copy(&mut source, &mut sink).await;
                drop(sink);
                match copied {
                    Err(e) if e.kind() != io::ErrorKind::BrokenPipe => Err(e),
                    _ => Ok(()),
                }
            })),
            _ => None,
        };

        let stdout_pump = pump_stdout(
            step,
            child.stdout.take(),
            output,
            capture,
            log,
            step_logs.as_ref().map(|l| &l.stdout),
        );
        let stderr_pump = pump_stderr(
            child.stderr.take(),
            log,
            step_logs.as_ref().map(|l| &l.stderr),
        );
        let (stdout_result, stderr_result, status) =
            tokio::join!(stdout_pump, stderr_pump, child.wait());

        // Input the child never read is irrelevant once it has exited.
        if let Some(feeder) = feeder {
            feeder.abort();
            if let Ok(Err(e)) = feeder.await {
                warn!("Step {} stdin feed failed: {}", step.name, e);
            }
        }

        let status = status.map_err(|e| execution_error(step, ExecutionCause::Io(e)))?;
        if !status.success() {
            let cause = match status.code() {
                Some(code) => ExecutionCause::Exit(code),
                None => ExecutionCause::Terminated,
            };
            error!("Step {} failed: {}", step.name, cause);
            return Err(execution_error(step, cause));
        }

        stdout_result?;
        stderr_result.map_err(|e| execution_error(step, ExecutionCause::Io(e)))?;

        info!("Step {} completed successfully", step.name);
        Ok(())
    }

    fn open_step_logs(&self, step: &Step) -> Result<Option<StepLogs>, PipelineError> {
        let Some(dir) = &self.log_dir else {
            return Ok(None);
        };
        std::fs::create_dir_all(dir)?;
        Ok(Some(StepLogs {
            stdout: LogSink::file(&step_log_path(dir, &step.name, "out"))?,
            stderr: LogSink::file(&step_log_path(dir, &step.name, "err"))?,
        }))
    }
}

fn execution_error(step: &Step, cause: ExecutionCause) -> PipelineError {
    PipelineError::Execution {
        step: step.name.clone(),
        cause,
    }
}

async fn pump_stdout(
    step: &Step,
    stdout: Option<ChildStdout>,
    output: Option<&StreamWriter>,
    mut capture: Option<&mut Vec<u8>>,
    log: Option<&LogSink>,
    file: Option<&LogSink>,
) -> Result<(), PipelineError> {
    let Some(mut stdout) = stdout else {
        return Ok(());
    };

    let mut forwarding = output;
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = stdout
            .read(&mut buf)
            .await
            .map_err(|e| execution_error(step, ExecutionCause::Io(e)))?;
        if n == 0 {
            return Ok(());
        }
        let chunk = &buf[..n];

        if let Some(log) = log {
            log.write_bytes(chunk);
        }
        if let Some(file) = file {
            file.write_bytes(chunk);
        }
        if let Some(capture) = capture.as_deref_mut() {
            capture.extend_from_slice(chunk);
        }
        if let Some(writer) = forwarding {
            match writer.write_all(chunk).await {
                Ok(()) => {}
                Err(crate::core::BrokerError::Io { source, .. })
                    if source.kind() == io::ErrorKind::BrokenPipe =>
                {
                    // Readers are gone; keep draining so the child can exit.
                    debug!("Step {}: stream '{}' has no readers left", step.name, writer.name());
                    forwarding = None;
                }
                Err(source) => {
                    return Err(PipelineError::Configuration {
                        step: step.name.clone(),
                        source,
                    })
                }
            }
        }
    }
}

async fn pump_stderr(
    stderr: Option<ChildStderr>,
    log: Option<&LogSink>,
    file: Option<&LogSink>,
) -> io::Result<()> {
    let Some(mut stderr) = stderr else {
        return Ok(());
    };

    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = stderr.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        if let Some(log) = log {
            log.write_bytes(&buf[..n]);
        }
        if let Some(file) = file {
            file.write_bytes(&buf[..n]);
        }
    }
}
