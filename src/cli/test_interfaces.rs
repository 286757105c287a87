//! Test runner I/O boundary interfaces
//!
//! This module defines trait-based abstractions for the operations of the harness driver that touch the outside
//! world:
//! - Interpreter discovery and version probing
//! - Session start-up (one live interpreter per suite)
//! - Example execution (send source, capture output)
//!
//! The process-backed implementations live in `harness::session`; tests substitute scripted ones.

use std::io;
use std::path::Path;
use std::time::Duration;

use docgate_core::RuntimeVersion;
use thiserror::Error;

/// Errors that occur while running examples
#[derive(Debug, Error)]
pub enum TestError {
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("could not determine the interpreter version: {0}")]
    VersionProbe(String),

    #[error("example timed out after {:.1}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("interpreter exited unexpectedly")]
    SessionClosed { output: String },
}

// ============================================================================
// Interpreter Interface
// ============================================================================

/// A runtime that examples execute against.
pub trait Interpreter {
    /// Program name, for messages.
    fn program(&self) -> &str;

    /// Whether the interpreter can be started at all.
    fn is_available(&self) -> bool;

    /// Ask the interpreter for its version, including the patch level when it reports one.
    fn probe_version(&self) -> Result<RuntimeVersion, TestError>;

    /// Start a fresh session for the fixture at `fixture`.
    fn start(&self, fixture: &Path) -> Result<Box<dyn Session>, TestError>;
}

// ============================================================================
// Session Interface
// ============================================================================

/// A live interpreter holding state across the examples of one suite.
pub trait Session {
    /// Execute `source` and return everything it printed.
    fn run(&mut self, source: &str) -> Result<String, TestError>;
}
