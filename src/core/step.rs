//! Step domain model

use serde::{Deserialize, Serialize};

/// A single named shell command in a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Unique step name
    pub name: String,

    /// Shell text run through the interpreter
    pub command: String,

    /// Stream whose bytes become this step's stdin
    pub input_stream: Option<String>,

    /// Stream that receives this step's stdout
    pub output_stream: Option<String>,
}

impl Step {
    /// Create a step with no streams attached
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            input_stream: None,
            output_stream: None,
        }
    }

    /// Builder-style input stream
    pub fn with_input(mut self, stream: impl Into<String>) -> Self {
        self.set_input_stream(Some(stream.into()));
        self
    }

    /// Builder-style output stream
    pub fn with_output(mut self, stream: impl Into<String>) -> Self {
        self.set_output_stream(Some(stream.into()));
        self
    }

    /// Set the input stream; empty names are treated as absent
    pub fn set_input_stream(&mut self, stream: Option<String>) {
        self.input_stream = stream.filter(|s| !s.is_empty());
    }

    /// Set the output stream; empty names are treated as absent
    pub fn set_output_stream(&mut self, stream: Option<String>) {
        self.output_stream = stream.filter(|s| !s.is_empty());
    }

    pub fn input(&self) -> Option<&str> {
        self.input_stream.as_deref()
    }

    pub fn output(&self) -> Option<&str> {
        self.output_stream.as_deref()
    }
}
