//! Subprocess execution with streaming, timeouts, output caps, and retry.

mod runner;

pub use runner::{run, ExecOptions, RetryPolicy, RetryTrigger, RunResult};
