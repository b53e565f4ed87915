//! CLI argument parsing and command dispatch.

pub mod args;
pub mod serve;
pub mod worker;

pub use args::{Cli, Commands, WorkerCommand};
