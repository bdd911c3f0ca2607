//! CLI command definitions

use crate::execution::{RunOptions, Strategy};
use crate::execution::executor::DEFAULT_SHELL;
use crate::execution::shell_pipe::DEFAULT_PIPE_SHELL;
use clap::Args;
use std::path::PathBuf;

/// Run a pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Pick between shell-pipe and concurrent streams instead of running
    /// steps one by one
    #[arg(long)]
    pub use_strategy: bool,

    /// Strategy to use regardless of pipeline shape (implies --use-strategy)
    #[arg(long, value_enum)]
    pub force_strategy: Option<StrategyArg>,

    /// Directory for per-step .out/.err logs and pipeline.status
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Interpreter for individual steps
    #[arg(long, default_value = DEFAULT_SHELL)]
    pub shell: String,

    /// Interpreter for shell-pipe chains
    #[arg(long, default_value = DEFAULT_PIPE_SHELL)]
    pub pipe_shell: String,
}

impl RunCommand {
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            use_strategy: self.use_strategy || self.force_strategy.is_some(),
            force_strategy: self.force_strategy.map(Strategy::from),
            log_directory: self.log_dir.clone(),
            shell: self.shell.clone(),
            pipe_shell: self.pipe_shell.clone(),
        }
    }
}

/// Validate a pipeline configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Strategy argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StrategyArg {
    #[value(name = "shell-pipe")]
    ShellPipe,
    #[value(name = "go-stream", alias = "concurrent")]
    GoStream,
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::ShellPipe => Strategy::ShellPipe,
            StrategyArg::GoStream => Strategy::ConcurrentStream,
        }
    }
}
