//! Test utility functions for streampipe

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};
use streampipe::core::config::PipelineConfig;
use streampipe::execution::{
    ExecutionEngine, ExecutionEvent, LogSink, MemoryLog, RunOptions, RunSummary, Strategy,
};
use streampipe::{Pipeline, PipelineError};

/// Everything observable about one engine run
pub struct RunOutcome {
    pub result: Result<RunSummary, PipelineError>,
    pub events: Vec<ExecutionEvent>,
    pub log: MemoryLog,
}

impl RunOutcome {
    pub fn waves(&self) -> Vec<Vec<String>> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ExecutionEvent::WaveStarted { steps, .. } => Some(steps.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn started_steps(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ExecutionEvent::StepStarted { step } => Some(step.clone()),
                _ => None,
            })
            .collect()
    }
}

/// Parse a pipeline from inline YAML
pub fn pipeline_from_yaml(yaml: &str) -> Pipeline {
    PipelineConfig::from_yaml(yaml)
        .expect("valid pipeline yaml")
        .to_pipeline()
}

pub fn strategy_options(forced: Option<Strategy>, log_dir: Option<&Path>) -> RunOptions {
    RunOptions {
        use_strategy: true,
        force_strategy: forced,
        log_directory: log_dir.map(Path::to_path_buf),
        ..RunOptions::default()
    }
}

/// Run `pipeline` with `options`, recording events and the log sink
pub async fn run_with(pipeline: &Pipeline, options: RunOptions) -> RunOutcome {
    let (sink, log) = LogSink::memory();
    let events = Arc::new(Mutex::new(Vec::new()));
    let recorder = events.clone();

    let mut engine = ExecutionEngine::new(options).with_log(sink);
    engine.add_event_handler(move |event| recorder.lock().unwrap().push(event));

    let result = engine.execute(pipeline).await;
    let events = events.lock().unwrap().clone();
    RunOutcome {
        result,
        events,
        log,
    }
}

pub fn read_log(dir: &Path, name: &str) -> String {
    std::fs::read_to_string(dir.join(name))
        .unwrap_or_else(|e| panic!("missing log file {}: {}", name, e))
}

pub fn assert_status(dir: &Path, code: i32) {
    assert_eq!(
        read_log(dir, "pipeline.status"),
        format!("Pipeline exit code: {}\n", code)
    );
}
