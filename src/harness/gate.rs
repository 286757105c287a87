//! Version-gated example filter
//!
//! Examples carrying version markers that the runtime does not satisfy are swapped for
//! [`Example::placeholder`] so the fixture's example count and order stay the same on every runtime.

use docgate_core::{MarkerTable, OptionFlag, RuntimeVersion};
use docgate_syntax::{Example, ExampleParser, ParseError, Piece};

/// Eligibility check for one runtime version.
#[derive(Debug, Clone)]
pub struct VersionGate {
    runtime: RuntimeVersion,
    min: Vec<(OptionFlag, RuntimeVersion)>,
    max: Vec<(OptionFlag, RuntimeVersion)>,
}

impl VersionGate {
    pub fn new(markers: &MarkerTable, runtime: RuntimeVersion) -> Self {
        Self {
            runtime,
            min: markers.min_markers().iter().map(|m| (m.flag, m.bound)).collect(),
            max: markers.max_markers().iter().map(|m| (m.flag, m.bound)).collect(),
        }
    }

    /// Whether every marker set truthy on `example` admits the runtime.
    ///
    /// A runtime with a patch level sorts above the two-part bound of its own line, so a probed `3.6.9` fails
    /// `PYMAX3.6` but passes `PYMIN3.6`.
    pub fn is_eligible(&self, example: &Example) -> bool {
        let min_ok = self
            .min
            .iter()
            .all(|&(flag, bound)| !example.is_set(flag) || self.runtime >= bound);
        let max_ok = self
            .max
            .iter()
            .all(|&(flag, bound)| !example.is_set(flag) || self.runtime <= bound);
        min_ok && max_ok
    }

    /// Replace every ineligible example in `pieces` with the placeholder, in place.
    ///
    /// ## Notes
    /// - The placeholder keeps the original `lineno` and `indent` so reports still point into the fixture.
    /// - Placeholders carry no markers, so filtering twice gives the same result.
    pub fn filter(&self, pieces: &mut [Piece]) {
        for piece in pieces.iter_mut() {
            let Piece::Example(example) = piece else {
                continue;
            };
            if self.is_eligible(example) {
                continue;
            }
            tracing::trace!(
                lineno = example.lineno,
                runtime = %self.runtime,
                "substituting placeholder for version-gated example"
            );
            *example = Example::placeholder().at(example.lineno, example.indent);
        }
    }
}

/// An [`ExampleParser`] that applies a [`VersionGate`] to another parser's output.
#[derive(Debug, Clone)]
pub struct GatedParser<P> {
    inner: P,
    gate: VersionGate,
}

impl<P: ExampleParser> GatedParser<P> {
    pub fn new(inner: P, gate: VersionGate) -> Self {
        Self { inner, gate }
    }
}

impl<P: ExampleParser> ExampleParser for GatedParser<P> {
    fn parse(&self, text: &str, name: &str) -> Result<Vec<Piece>, ParseError> {
        let mut pieces = self.inner.parse(text, name)?;
        self.gate.filter(&mut pieces);
        Ok(pieces)
    }
}
