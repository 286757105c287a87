//! Transcript parser for fixture files.
//!
//! Splits fixture text into narrative [`Piece::Text`] and runnable [`Piece::Example`] pieces following the
//! interactive-transcript conventions:
//!
//! - an example starts at a line `<indent>>>> source`; `>>>` must be followed by a space unless the line ends there,
//! - continuation lines `<indent>... source` extend the source,
//! - the expected output is the following run of non-blank lines not starting with `>>>`, each indented at least as
//!   far as the prompt,
//! - `# doctest: +FLAG -FLAG` comments in the source set per-example flags,
//! - an example whose source is only blank or comment lines is dropped; its want lines go with it.
//!
//! ## Examples
//!
//! ```rust
//! use docgate_core::{OptionFlag, OptionRegistry};
//! use docgate_syntax::parser::{ExampleParser, TranscriptParser};
//!
//! let registry = OptionRegistry::with_builtins();
//! let text = "Intro.\n\n    >>> print('a')  # doctest: +ELLIPSIS\n    a\n";
//! let examples = TranscriptParser::new(&registry).examples(text, "intro.doctest").unwrap();
//! assert_eq!(examples[0].source, "print('a')  # doctest: +ELLIPSIS\n");
//! assert_eq!(examples[0].want, "a\n");
//! assert!(examples[0].is_set(OptionFlag::ELLIPSIS));
//! ```

use std::collections::BTreeMap;

use docgate_core::text::expand_tabs;
use docgate_core::{OptionFlag, OptionRegistry};

use crate::diagnostics::{ParseError, ParseErrorKind};
use crate::example::{Example, Piece};

const PS1: &str = ">>>";
const PS2: &str = "...";
const TAB_SIZE: usize = 8;

/// Strategy turning fixture text into pieces.
///
/// The harness injects its version-gating parser through this trait.
pub trait ExampleParser {
    fn parse(&self, text: &str, name: &str) -> Result<Vec<Piece>, ParseError>;

    /// Parse and keep only the examples.
    fn examples(&self, text: &str, name: &str) -> Result<Vec<Example>, ParseError> {
        Ok(self.parse(text, name)?.into_iter().filter_map(Piece::into_example).collect())
    }
}

/// The plain transcript parser; flags are resolved against a registry.
#[derive(Debug, Clone, Copy)]
pub struct TranscriptParser<'r> {
    registry: &'r OptionRegistry,
}

impl<'r> TranscriptParser<'r> {
    pub fn new(registry: &'r OptionRegistry) -> Self {
        Self { registry }
    }
}

impl ExampleParser for TranscriptParser<'_> {
    #[tracing::instrument(skip_all, fields(fixture = name, text_len = text.len()))]
    fn parse(&self, text: &str, name: &str) -> Result<Vec<Piece>, ParseError> {
        let text = expand_tabs(&text.replace("\r\n", "\n"), TAB_SIZE);
        let lines = split_lines(&text);
        let ctx = Context {
            name,
            text: &text,
            lines: &lines,
            registry: self.registry,
        };

        let mut pieces = Vec::new();
        let mut text_start = 0;
        let mut i = 0;
        while i < lines.len() {
            let (_, line) = lines[i];
            let stripped = line.trim_start_matches(' ');
            if !stripped.starts_with(PS1) {
                i += 1;
                continue;
            }

            push_text(&mut pieces, &lines[text_start..i]);
            let indent = line.len() - stripped.len();
            let start = i;

            ctx.check_prompt_blank(i, indent, PS1)?;
            let mut source_lines = vec![strip_prompt(line, indent)];
            i += 1;

            while i < lines.len() {
                let (_, line) = lines[i];
                let stripped = line.trim_start_matches(' ');
                if !stripped.starts_with(PS2) {
                    break;
                }
                if line.len() - stripped.len() != indent {
                    return Err(ctx.inconsistent_indent(i));
                }
                ctx.check_prompt_blank(i, indent, PS2)?;
                source_lines.push(strip_prompt(line, indent));
                i += 1;
            }

            let mut want_lines = Vec::new();
            while i < lines.len() {
                let (_, line) = lines[i];
                let stripped = line.trim_start_matches(' ');
                if stripped.is_empty() || stripped.starts_with(PS1) {
                    break;
                }
                if line.len() - stripped.len() < indent {
                    return Err(ctx.inconsistent_indent(i));
                }
                want_lines.push(&line[indent..]);
                i += 1;
            }

            let options = ctx.find_options(start, &source_lines)?;
            text_start = i;
            if source_lines.iter().all(|l| is_blank_or_comment(l)) {
                tracing::trace!(line = start + 1, "dropping comment-only example");
                continue;
            }
            let mut source = source_lines.join("\n");
            source.push('\n');
            let mut want = want_lines.join("\n");
            if !want.is_empty() {
                want.push('\n');
            }

            let mut example = Example::new(source, want).at(start, indent);
            example.options = options;
            pieces.push(Piece::Example(example));
        }
        push_text(&mut pieces, &lines[text_start..]);

        tracing::debug!(
            examples = pieces.iter().filter(|p| p.as_example().is_some()).count(),
            "parsed fixture"
        );
        Ok(pieces)
    }
}

struct Context<'a> {
    name: &'a str,
    text: &'a str,
    lines: &'a [(usize, &'a str)],
    registry: &'a OptionRegistry,
}

impl Context<'_> {
    fn error(&self, kind: ParseErrorKind, index: usize, detail: String) -> ParseError {
        let (offset, line) = self.lines[index];
        ParseError::new(kind, self.name, self.text, index, offset, line, detail)
    }

    fn inconsistent_indent(&self, index: usize) -> ParseError {
        let line = self.lines[index].1;
        self.error(
            ParseErrorKind::InconsistentIndent,
            index,
            format!("has inconsistent leading whitespace: '{line}'"),
        )
    }

    fn check_prompt_blank(&self, index: usize, indent: usize, prompt: &str) -> Result<(), ParseError> {
        let line = self.lines[index].1;
        match line.as_bytes().get(indent + prompt.len()) {
            None | Some(b' ') => Ok(()),
            Some(_) => Err(self.error(
                ParseErrorKind::MissingPromptBlank,
                index,
                format!("lacks blank after {prompt}: '{line}'"),
            )),
        }
    }

    /// Collect `# doctest:` flags from the source lines of the example starting at `start`.
    fn find_options(&self, start: usize, source_lines: &[&str]) -> Result<BTreeMap<OptionFlag, bool>, ParseError> {
        let mut options = BTreeMap::new();
        for (offset, source_line) in source_lines.iter().enumerate() {
            let Some(directive) = option_directive(source_line) else {
                continue;
            };
            let index = start + offset;
            for option in directive.replace(',', " ").split_whitespace() {
                let (enabled, name) = match option.split_at_checked(1) {
                    Some(("+", name)) => (true, name),
                    Some(("-", name)) => (false, name),
                    _ => return Err(self.invalid_option(index, option)),
                };
                let Some(flag) = self.registry.lookup(name) else {
                    return Err(self.invalid_option(index, option));
                };
                options.insert(flag, enabled);
            }
        }

        if !options.is_empty() && source_lines.iter().all(|l| is_blank_or_comment(l)) {
            return Err(self.error(
                ParseErrorKind::InvalidOption,
                start,
                "has an option directive on a line with no example".to_string(),
            ));
        }
        Ok(options)
    }

    fn invalid_option(&self, index: usize, option: &str) -> ParseError {
        self.error(
            ParseErrorKind::InvalidOption,
            index,
            format!("has an invalid option: '{option}'"),
        )
    }
}

/// Lines of `text` with the byte offset each starts at.
fn split_lines(text: &str) -> Vec<(usize, &str)> {
    if text.is_empty() {
        return Vec::new();
    }
    let mut offset = 0;
    text.strip_suffix('\n')
        .unwrap_or(text)
        .split('\n')
        .map(|line| {
            let start = offset;
            offset += line.len() + 1;
            (start, line)
        })
        .collect()
}

fn strip_prompt(line: &str, indent: usize) -> &str {
    line.get(indent + PS1.len() + 1..).unwrap_or("")
}

fn push_text(pieces: &mut Vec<Piece>, lines: &[(usize, &str)]) {
    if lines.is_empty() {
        return;
    }
    let mut text = String::new();
    for (_, line) in lines {
        text.push_str(line);
        text.push('\n');
    }
    pieces.push(Piece::Text(text));
}

/// The flag list of a `# doctest: ...` comment, if the line carries one.
fn option_directive(line: &str) -> Option<&str> {
    for (hash, _) in line.match_indices('#') {
        let rest = line[hash + 1..].trim_start();
        let Some(rest) = rest.strip_prefix("doctest:") else {
            continue;
        };
        if rest.contains(['\'', '"']) {
            continue;
        }
        return Some(rest.trim());
    }
    None
}

fn is_blank_or_comment(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}

include!("parser/tests.rs");
