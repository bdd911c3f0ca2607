//! Named in-process byte streams used to hand data between steps

pub mod broker;

pub use broker::{StreamBroker, StreamReader, StreamWriter, PIPE_BUFFER_SIZE};
