//! Core domain models for Pipeline
//!
//! This module defines the step and pipeline definitions, their YAML form,
//! the error taxonomy and the topology predicates used to pick a strategy.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod step;
pub mod topology;

pub use error::*;
pub use pipeline::*;
pub use step::*;
pub use topology::{is_simple_linear, requires_progress, TopologyReport};
