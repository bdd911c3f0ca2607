//! Strategy selection between the shell-pipe and concurrent-stream paths

use crate::core::{is_simple_linear, requires_progress, Pipeline, PipelineError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// How a pipeline is executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    /// One native `cmd1 | cmd2 | ...` shell invocation
    #[serde(rename = "shell-pipe")]
    ShellPipe,

    /// Wave-scheduled steps exchanging data through the stream broker
    #[serde(rename = "go-stream")]
    ConcurrentStream,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::ShellPipe => "shell-pipe",
            Strategy::ConcurrentStream => "go-stream",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shell-pipe" => Ok(Strategy::ShellPipe),
            "go-stream" | "concurrent" | "concurrent-stream" => Ok(Strategy::ConcurrentStream),
            other => Err(format!("unknown strategy: {}", other)),
        }
    }
}

/// Pick a strategy for `pipeline`.
///
/// Linear pipelines without a progress signal go through the shell pipe,
/// everything else through concurrent streams. Forcing the shell pipe onto a
/// non-linear pipeline is rejected before anything runs.
pub fn select_strategy(
    pipeline: &Pipeline,
    forced: Option<Strategy>,
) -> Result<Strategy, PipelineError> {
    let linear = is_simple_linear(pipeline);

    let strategy = match forced {
        Some(Strategy::ShellPipe) if !linear => {
            return Err(PipelineError::NonLinearPipeline(pipeline.name.clone()));
        }
        Some(strategy) => strategy,
        None if linear && !requires_progress(pipeline) => Strategy::ShellPipe,
        None => Strategy::ConcurrentStream,
    };

    debug!(
        "Selected strategy {} for pipeline {} (linear: {}, forced: {:?})",
        strategy, pipeline.name, linear, forced
    );
    Ok(strategy)
}
