//! Root of the `coderun-core` library.
//!
//! Turns `(language, source)` pairs into processes running on a
//! pseudo-terminal and streams their output back to a session's client.

// Prevent accidental direct writes to stdout and stderr in library code.
#![deny(clippy::print_stdout, clippy::print_stderr)]

mod cleanup;
pub mod config;
pub mod planner;
mod pump;
mod scratch;
mod session;
pub mod supervisor;

pub use cleanup::CleanupSet;
pub use config::EngineConfig;
pub use scratch::ScratchArea;
pub use scratch::ScratchPath;
pub use session::Engine;
pub use session::RunOutcome;
pub use session::Session;
pub use session::SessionId;
pub use session::SessionState;
