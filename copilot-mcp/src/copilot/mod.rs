//! Copilot CLI invocation: option schema, flag building, and the execution
//! pipeline tying resolver, session store, runner, and classifier together.

mod args;
mod executor;

pub use args::{build_args, CopilotOptions, LogLevel, OneOrMany};
pub use executor::{ExecuteOutcome, Executor};
