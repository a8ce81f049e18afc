//! Cooperative cancellation for workflow runs.
//!
//! A token is owned by each run and passed through to the stage runner,
//! which kills the running child process when it fires.

mod token;

pub use token::CancellationToken;
