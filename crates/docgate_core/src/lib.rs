//! Provide the shared, pure vocabulary of the docgate harness.
//!
//! This crate is intentionally small and dependency-light. It holds the deterministic pieces that both the fixture
//! parser (`docgate_syntax`) and the harness driver (`docgate`) agree on:
//! - runtime versions and their ordering,
//! - the option-flag registry (built-in doctest flags plus custom registrations),
//! - the version-marker table (`PYTHON3.0`, `PYMIN3.4`, `PYMAX2.7`, ...),
//! - small text helpers (dedent, tab expansion, coding cookies).
//!
//! ## Notes
//!
//! - This is a “vocabulary” crate: **no IO** and no global state. Tables are built explicitly and passed by reference.

pub mod flags;
pub mod markers;
pub mod text;
pub mod version;

pub use flags::{FlagSet, OptionFlag, OptionRegistry};
pub use markers::{MarkerKind, MarkerTable, STANDARD_VERSIONS, VersionMarker};
pub use version::{RuntimeVersion, VersionParseError};
