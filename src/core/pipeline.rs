//! Pipeline domain model

use crate::core::{error::ValidationError, step::Step};
use std::collections::HashSet;

/// An ordered, named list of steps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    /// Pipeline name
    pub name: String,

    /// Optional human-readable description
    pub description: Option<String>,

    /// Steps in declaration order
    pub steps: Vec<Step>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            steps: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Names of every stream some step writes to
    pub fn produced_streams(&self) -> HashSet<&str> {
        self.steps.iter().filter_map(|s| s.output()).collect()
    }

    /// Number of steps reading from `stream`
    pub fn consumer_count(&self, stream: &str) -> usize {
        self.steps
            .iter()
            .filter(|s| s.input() == Some(stream))
            .count()
    }

    /// Check the structural invariants: a name, at least one step, distinct
    /// step names usable as `<step>.out` file names, non-empty commands and
    /// no input without a producer.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.steps.is_empty() {
            return Err(ValidationError::EmptyPipeline(self.name.clone()));
        }

        let mut seen = HashSet::new();
        for (index, step) in self.steps.iter().enumerate() {
            if step.name.trim().is_empty() {
                return Err(ValidationError::EmptyStepName(index + 1));
            }
            if !is_file_name_safe(&step.name) {
                return Err(ValidationError::InvalidStepName(step.name.clone()));
            }
            if step.command.trim().is_empty() {
                return Err(ValidationError::EmptyCommand(step.name.clone()));
            }
            if !seen.insert(step.name.as_str()) {
                return Err(ValidationError::DuplicateStep(step.name.clone()));
            }
        }

        let produced = self.produced_streams();
        for step in &self.steps {
            if let Some(input) = step.input() {
                if !produced.contains(input) {
                    return Err(ValidationError::DanglingInput {
                        step: step.name.clone(),
                        stream: input.to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// A step name becomes `<dir>/<name>.out`, so it must stay one path component
fn is_file_name_safe(name: &str) -> bool {
    name != "." && name != ".." && !name.contains(&['/', '\\', '\0'][..])
}
