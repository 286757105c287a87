//! Examples and the interleaved piece sequence produced by parsing a fixture.

use std::collections::BTreeMap;

use docgate_core::OptionFlag;

/// Whether an example came from the fixture or stands in for one that was gated out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExampleKind {
    Live,
    Placeholder,
}

/// One runnable snippet plus its expected output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Example {
    /// Source with prompts stripped; always ends with a newline.
    pub source: String,
    /// Expected output; empty, or ends with a newline.
    pub want: String,
    /// 0-based line of the `>>>` prompt within the fixture.
    pub lineno: usize,
    /// Column of the `>>>` prompt.
    pub indent: usize,
    /// Per-example flag overrides from `# doctest:` comments.
    pub options: BTreeMap<OptionFlag, bool>,
    pub kind: ExampleKind,
}

impl Example {
    pub fn new(source: impl Into<String>, want: impl Into<String>) -> Self {
        Self {
            source: terminate(source.into()),
            want: terminate(want.into()),
            lineno: 0,
            indent: 0,
            options: BTreeMap::new(),
            kind: ExampleKind::Live,
        }
    }

    /// The trivial always-passing example (`1` expecting `1`) used in place of a gated-out example.
    pub fn placeholder() -> Self {
        Self {
            kind: ExampleKind::Placeholder,
            ..Self::new("1", "1")
        }
    }

    pub fn at(mut self, lineno: usize, indent: usize) -> Self {
        self.lineno = lineno;
        self.indent = indent;
        self
    }

    pub fn with_option(mut self, flag: OptionFlag, enabled: bool) -> Self {
        self.options.insert(flag, enabled);
        self
    }

    pub fn is_placeholder(&self) -> bool {
        self.kind == ExampleKind::Placeholder
    }

    /// Whether `flag` is explicitly switched on for this example.
    pub fn is_set(&self, flag: OptionFlag) -> bool {
        self.options.get(&flag).copied().unwrap_or(false)
    }
}

fn terminate(mut text: String) -> String {
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
    text
}

/// An element of a parsed fixture: narrative text or an example.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    Text(String),
    Example(Example),
}

impl Piece {
    pub fn as_example(&self) -> Option<&Example> {
        match self {
            Piece::Example(example) => Some(example),
            Piece::Text(_) => None,
        }
    }

    pub fn into_example(self) -> Option<Example> {
        match self {
            Piece::Example(example) => Some(example),
            Piece::Text(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_terminates_source_and_want() {
        let example = Example::new("x", "y");
        assert_eq!(example.source, "x\n");
        assert_eq!(example.want, "y\n");
    }

    #[test]
    fn test_empty_want_stays_empty() {
        assert_eq!(Example::new("x = 1", "").want, "");
    }

    #[test]
    fn test_placeholder_shape() {
        let placeholder = Example::placeholder();
        assert_eq!(placeholder.source, "1\n");
        assert_eq!(placeholder.want, "1\n");
        assert!(placeholder.options.is_empty());
        assert!(placeholder.is_placeholder());
    }

    #[test]
    fn test_is_set_ignores_false_overrides() {
        let example = Example::new("x", "").with_option(OptionFlag::SKIP, false);
        assert!(!example.is_set(OptionFlag::SKIP));
        let example = example.with_option(OptionFlag::SKIP, true);
        assert!(example.is_set(OptionFlag::SKIP));
    }
}
