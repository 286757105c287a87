//! The harness core: everything between a fixture directory on disk and a checked example.
//!
//! ## Modules
//!
//! - `config` - Harness and session configuration
//! - `requirements` - `:RequireModule:` resolution
//! - `gate` - Version-gated example filter
//! - `discover` - Fixture discovery and suite aggregation
//! - `checker` - Output comparison and failure reports
//! - `session` - Process-backed interpreter sessions

pub mod checker;
pub mod config;
pub mod discover;
pub mod gate;
pub mod requirements;
pub mod session;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a harness step.
///
/// Per-fixture problems (unreadable file, malformed transcript) are not errors at this level; they are recorded on
/// the suite and reported as failures.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("fixture directory '{}' does not exist", .0.display())]
    MissingFixtureDir(PathBuf),

    #[error("failed to list '{}': {source}", .path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
