//! Scenario-based tests for streampipe

mod failure_status;
mod fan_out;
mod sequential;
mod shell_pipe;
mod validation;
