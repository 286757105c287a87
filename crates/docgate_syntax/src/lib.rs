//! Fixture syntax for the docgate harness: transcript examples, option comments, requirement directives.
//!
//! A fixture is narrative text interleaved with interactive-transcript examples:
//!
//! ```text
//! Narrative text is ignored.
//!
//!     >>> print("hello")   # doctest: +PYMIN3.0
//!     hello
//! ```
//!
//! This crate turns fixture text into a sequence of [`Piece`]s and scans `:RequireModule:` directives. It does no
//! I/O and knows nothing about interpreters or versions beyond the flag registry it parses against.
//!
//! ## Examples
//! ```rust
//! use docgate_core::OptionRegistry;
//! use docgate_syntax::parser::{ExampleParser, TranscriptParser};
//!
//! let registry = OptionRegistry::with_builtins();
//! let parser = TranscriptParser::new(&registry);
//! let pieces = parser.parse(">>> 1 + 1\n2\n", "sum.doctest").unwrap();
//! assert_eq!(pieces.iter().filter_map(|p| p.as_example()).count(), 1);
//! ```

pub mod diagnostics;
pub mod directives;
pub mod example;
pub mod parser;

pub use diagnostics::ParseError;
pub use directives::{Requirement, scan_requirements};
pub use example::{Example, ExampleKind, Piece};
pub use parser::{ExampleParser, TranscriptParser};
