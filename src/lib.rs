#![forbid(unsafe_code)]
//! docgate: a version-gated transcript test harness
//!
//! Fixture files mix narrative text with interactive-transcript examples (`>>> source` followed by the expected
//! output). The harness discovers fixtures in a root directory and its `py{major}` subdirectory, skips fixtures whose
//! `:RequireModule:` directives cannot be resolved, gates examples on version markers (`PYMIN3.4`, `PYMAX2.7`, ...)
//! and runs the remaining examples against a live interpreter session.
//!
//! ## Layout
//!
//! - [`harness`]: requirement scanning, version gating, discovery, output checking and interpreter sessions.
//! - [`cli`]: command-line interface, the harness driver and reporters.
//! - [`scratch`] and [`docengine`]: helpers fixtures use to drive an external documentation engine.
//!
//! ## Panic Policy
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` module enforces
//!   `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.

pub mod cli;
pub mod docengine;
pub mod harness;
pub mod scratch;
pub mod version;

pub use docgate_core::{MarkerTable, OptionFlag, OptionRegistry, RuntimeVersion};
pub use docgate_syntax::{Example, ExampleParser, Piece, TranscriptParser};

pub use harness::config::{HarnessConfig, SessionConfig};
pub use harness::discover::{Discovery, SkippedFixture, Suite, SuiteBuilder, discover_and_build};
pub use harness::gate::{GatedParser, VersionGate};
pub use harness::requirements::{CapabilityResolver, PathResolver, ProbeResolver, check_requirements};
