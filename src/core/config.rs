//! Pipeline configuration from YAML

use crate::core::{Pipeline, Step};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level pipeline definition loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name
    pub name: String,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,

    /// Pipeline steps, in execution order
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

/// Step definition as written in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Unique step name
    pub name: String,

    /// Shell command to run
    pub run: String,

    /// Stream read as stdin
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,

    /// Stream written from stdout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl PipelineConfig {
    /// Load pipeline configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse pipeline configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PipelineConfig =
            serde_yaml::from_str(yaml).context("Invalid pipeline YAML")?;
        Ok(config)
    }

    /// Convert config to a Pipeline domain model
    pub fn to_pipeline(&self) -> Pipeline {
        let steps = self
            .steps
            .iter()
            .map(|config| {
                let mut step = Step::new(config.name.clone(), config.run.clone());
                step.set_input_stream(config.input.clone());
                step.set_output_stream(config.output.clone());
                step
            })
            .collect();

        Pipeline {
            name: self.name.clone(),
            description: self.description.clone(),
            steps,
        }
    }
}
