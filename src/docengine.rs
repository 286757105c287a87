//! Bridge to the external documentation engine
//!
//! Fixtures exercise a documentation engine (the system under test) through a handful of helpers: write a source
//! snippet to a scratch file, ask the engine to build, parse or introspect it, scrub the volatile parts of the
//! resulting listing and hand it back for comparison. The engine itself is opaque; [`DocEngine`] is the seam and
//! [`CommandDocEngine`] drives an engine executable.
//!
//! ## Engine command protocol
//!
//! ```text
//! <program> <build|parse|introspect> [--include a,b] [--exclude c] [--target NAME] <path>   # listing on stdout
//! <program> plaintext [--target NAME] <path>                                              # plain-text docstrings
//! <program> docstrings [--no-introspect] [--no-parse] <path>                              # HTML docstrings
//! ```
//!
//! `plaintext` and `docstrings` output is one record per rendered docstring, records separated by the ASCII record
//! separator (`0x1e`).

use std::io::{self, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::scratch::{ScratchError, ScratchFile, SourceEncoding};

/// Record separator between docstrings in engine output.
pub const RECORD_SEPARATOR: char = '\u{1e}';
/// File name used by the encoding round-trip helper.
pub const ENCODING_FILE_NAME: &str = "enc_test.py";

#[derive(Debug, Error)]
pub enum DocEngineError {
    #[error("failed to start documentation engine '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("documentation engine {action} failed ({status}): {stderr}")]
    Failed {
        action: &'static str,
        status: String,
        stderr: String,
    },

    #[error("documentation needs at least one of introspection and parsing")]
    NoSources,

    #[error(transparent)]
    Scratch(#[from] ScratchError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// What part of the documentation model to show.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingRequest {
    /// Attributes to display
    pub include: Vec<String>,
    /// Attributes to hide
    pub exclude: Vec<String>,
    /// Dotted name of the object to show instead of the whole module
    pub target: Option<String>,
}

impl ListingRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whitespace-separated attribute names to display.
    pub fn with_include(mut self, attribs: &str) -> Self {
        self.include = attribs.split_whitespace().map(str::to_string).collect();
        self
    }

    pub fn with_exclude(mut self, attribs: &str) -> Self {
        self.exclude = attribs.split_whitespace().map(str::to_string).collect();
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    fn args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if !self.include.is_empty() {
            args.extend(["--include".to_string(), self.include.join(",")]);
        }
        if !self.exclude.is_empty() {
            args.extend(["--exclude".to_string(), self.exclude.join(",")]);
        }
        if let Some(target) = &self.target {
            args.extend(["--target".to_string(), target.clone()]);
        }
        args
    }
}

/// Which documentation sources an HTML build draws on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildSources {
    pub introspect: bool,
    pub parse: bool,
}

impl Default for BuildSources {
    fn default() -> Self {
        Self {
            introspect: true,
            parse: true,
        }
    }
}

impl BuildSources {
    fn args(self) -> Vec<String> {
        let mut args = Vec::new();
        if !self.introspect {
            args.push("--no-introspect".to_string());
        }
        if !self.parse {
            args.push("--no-parse".to_string());
        }
        args
    }
}

/// Receives every docstring the engine renders to HTML.
pub trait DocstringSink {
    fn docstring(&mut self, html: &str);
}

/// Collects docstrings in memory.
#[derive(Debug, Default)]
pub struct CollectSink {
    pub docstrings: Vec<String>,
}

impl DocstringSink for CollectSink {
    fn docstring(&mut self, html: &str) {
        self.docstrings.push(html.to_string());
    }
}

/// Prints docstrings ASCII-safe: non-ASCII characters become XML character references.
pub struct PrintSink<W: Write> {
    out: W,
}

impl<W: Write> PrintSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> DocstringSink for PrintSink<W> {
    fn docstring(&mut self, html: &str) {
        let line = remove_surrogates(&xml_charrefs(html.trim()));
        if let Err(e) = writeln!(self.out, "{line}") {
            tracing::warn!(error = %e, "failed to print docstring");
        }
    }
}

/// The documentation engine's entry points.
pub trait DocEngine {
    /// Build the merged (parsed + introspected) documentation model for the module at `path` and list it.
    fn build(&self, path: &Path, request: &ListingRequest) -> Result<String, DocEngineError>;

    /// Parse the module source at `path` and list the result.
    fn parse(&self, path: &Path, request: &ListingRequest) -> Result<String, DocEngineError>;

    /// Import the module at `path` and list what introspection finds.
    fn introspect(&self, path: &Path, request: &ListingRequest) -> Result<String, DocEngineError>;

    /// Build the module at `path` and render the docstrings of the object `request` selects as plain text.
    ///
    /// Returns one string per docstring, in the engine's order.
    fn plaintext(&self, path: &Path, request: &ListingRequest) -> Result<Vec<String>, DocEngineError>;

    /// Render the module's documentation to HTML from `sources`, handing every docstring to `sink`.
    fn docstrings_html(
        &self,
        path: &Path,
        sources: BuildSources,
        sink: &mut dyn DocstringSink,
    ) -> Result<(), DocEngineError>;
}

/// A [`DocEngine`] backed by an executable speaking the command protocol above.
#[derive(Debug, Clone)]
pub struct CommandDocEngine {
    program: String,
}

impl CommandDocEngine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn invoke(&self, action: &'static str, path: &Path, args: &[String]) -> Result<String, DocEngineError> {
        let mut command = Command::new(&self.program);
        command.arg(action).args(args).arg(path).stdin(Stdio::null());
        if let Some(dir) = path.parent() {
            command.current_dir(dir);
        }

        let output = command.output().map_err(|source| DocEngineError::Spawn {
            program: self.program.clone(),
            source,
        })?;
        if !output.status.success() {
            return Err(DocEngineError::Failed {
                action,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl DocEngine for CommandDocEngine {
    fn build(&self, path: &Path, request: &ListingRequest) -> Result<String, DocEngineError> {
        self.invoke("build", path, &request.args())
    }

    fn parse(&self, path: &Path, request: &ListingRequest) -> Result<String, DocEngineError> {
        self.invoke("parse", path, &request.args())
    }

    fn introspect(&self, path: &Path, request: &ListingRequest) -> Result<String, DocEngineError> {
        self.invoke("introspect", path, &request.args())
    }

    fn plaintext(&self, path: &Path, request: &ListingRequest) -> Result<Vec<String>, DocEngineError> {
        let output = self.invoke("plaintext", path, &request.args())?;
        Ok(records(&output).map(str::to_string).collect())
    }

    fn docstrings_html(
        &self,
        path: &Path,
        sources: BuildSources,
        sink: &mut dyn DocstringSink,
    ) -> Result<(), DocEngineError> {
        let output = self.invoke("docstrings", path, &sources.args())?;
        for record in records(&output) {
            sink.docstring(record);
        }
        Ok(())
    }
}

fn records(output: &str) -> impl Iterator<Item = &str> {
    output.split(RECORD_SEPARATOR).filter(|record| !record.trim().is_empty())
}

// ============================================================================
// Test helpers
// ============================================================================

/// Build documentation for `source` and return the scrubbed listing.
pub fn run_builder(engine: &dyn DocEngine, source: &str, request: &ListingRequest) -> Result<String, DocEngineError> {
    with_scratch(source, |path| engine.build(path, request)).map(|listing| scrub_listing(&listing))
}

/// Parse `source` and return the listing with file names scrubbed.
pub fn run_parser(engine: &dyn DocEngine, source: &str, request: &ListingRequest) -> Result<String, DocEngineError> {
    with_scratch(source, |path| engine.parse(path, request)).map(|listing| scrub_filenames(&listing))
}

/// Introspect `source` and return the scrubbed listing.
pub fn run_introspecter(
    engine: &dyn DocEngine,
    source: &str,
    request: &ListingRequest,
) -> Result<String, DocEngineError> {
    with_scratch(source, |path| engine.introspect(path, request)).map(|listing| scrub_listing(&listing))
}

/// Build `source` and return its docstrings as plain text, trailing whitespace removed.
pub fn run_plaintext(
    engine: &dyn DocEngine,
    source: &str,
    request: &ListingRequest,
) -> Result<Vec<String>, DocEngineError> {
    let docstrings = with_scratch(source, |path| engine.plaintext(path, request))?;
    Ok(docstrings.iter().map(|d| to_plain(d).to_string()).collect())
}

/// A rendered plain-text docstring without trailing whitespace.
pub fn to_plain(docstring: &str) -> &str {
    docstring.trim_end()
}

/// End-to-end encoding check: render `source` to HTML and pass every docstring to `sink`.
///
/// Engine output files are removed along with the scratch file.
pub fn test_encoding(
    engine: &dyn DocEngine,
    source: &str,
    sources: BuildSources,
    sink: &mut dyn DocstringSink,
) -> Result<(), DocEngineError> {
    if !sources.introspect && !sources.parse {
        return Err(DocEngineError::NoSources);
    }
    let encoding = SourceEncoding::detect(source)?;
    let scratch = ScratchFile::write_named(source, ENCODING_FILE_NAME, Some(encoding))?;
    let rendered = engine.docstrings_html(scratch.path(), sources, sink);
    finish(rendered, scratch.cleanup(true))
}

fn with_scratch<T>(
    source: &str,
    action: impl FnOnce(&Path) -> Result<T, DocEngineError>,
) -> Result<T, DocEngineError> {
    let scratch = ScratchFile::write(source)?;
    let result = action(scratch.path());
    finish(result, scratch.cleanup(false))
}

/// The engine's result wins over a cleanup failure.
fn finish<T>(result: Result<T, DocEngineError>, cleanup: Result<(), ScratchError>) -> Result<T, DocEngineError> {
    match (result, cleanup) {
        (result, Ok(())) => result,
        (Ok(_), Err(cleanup)) => Err(cleanup.into()),
        (Err(err), Err(cleanup)) => {
            tracing::warn!(error = %cleanup, "failed to clean up scratch file");
            Err(err)
        }
    }
}

// ============================================================================
// Scrubbing
// ============================================================================

static FILENAME_RE: LazyLock<Regex> = LazyLock::new(|| literal_regex(r"(filename = ).*"));
static MODULE_RE: LazyLock<Regex> = LazyLock::new(|| literal_regex(r"(<module 'docgate_test' from ).*"));
static FUNCTION_RE: LazyLock<Regex> = LazyLock::new(|| literal_regex(r"(<function \w+ at )0x\w+>"));
static OBJECT_RE: LazyLock<Regex> = LazyLock::new(|| literal_regex(r"(<\w+ object at )0x\w+>"));
static CHARREF_RE: LazyLock<Regex> = LazyLock::new(|| literal_regex(r"&#(\d+);"));

fn literal_regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("INVARIANT: scrub patterns are valid regex literals")
}

/// Replace volatile fragments (file paths, object addresses) with `...`.
pub fn scrub_listing(listing: &str) -> String {
    let listing = scrub_filenames(listing);
    let listing = MODULE_RE.replace_all(&listing, "${1}...");
    let listing = FUNCTION_RE.replace_all(&listing, "${1}...>");
    OBJECT_RE.replace_all(&listing, "${1}...>").into_owned()
}

pub fn scrub_filenames(listing: &str) -> String {
    FILENAME_RE.replace_all(listing, "${1}...").into_owned()
}

/// Encode non-ASCII characters as decimal XML character references.
pub fn xml_charrefs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch.is_ascii() {
            out.push(ch);
        } else {
            out.push_str(&format!("&#{};", u32::from(ch)));
        }
    }
    out
}

/// Fold adjacent UTF-16 surrogate-pair character references (`&#55357;&#56832;`) into one reference.
pub fn remove_surrogates(text: &str) -> String {
    let refs: Vec<(usize, usize, Option<u32>)> = CHARREF_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let value = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok());
            Some((whole.start(), whole.end(), value))
        })
        .collect();

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    let mut i = 0;
    while i < refs.len() {
        let (start, end, high) = refs[i];
        if let (Some(high), Some(&(next_start, next_end, Some(low)))) = (high, refs.get(i + 1)) {
            if end == next_start && (0xd800..=0xdbff).contains(&high) && (0xdc00..=0xdfff).contains(&low) {
                let combined = ((high & 0x3ff) << 10) + (low & 0x3ff) + 0x10000;
                out.push_str(&text[cursor..start]);
                out.push_str(&format!("&#{combined};"));
                cursor = next_end;
                i += 2;
                continue;
            }
        }
        i += 1;
    }
    out.push_str(&text[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::fs;

    /// Engine double that echoes the request and the file it was given.
    #[derive(Default)]
    struct EchoEngine {
        seen: RefCell<Vec<String>>,
    }

    impl EchoEngine {
        fn listing(&self, action: &str, path: &Path, request: &ListingRequest) -> String {
            let source = fs::read_to_string(path).unwrap();
            self.seen.borrow_mut().push(source.clone());
            format!(
                "{action} include={:?} target={:?}\n  filename = {}\n  <module 'docgate_test' from '{}'>\n  <function f at 0x7f3a>\n  <Foo object at 0xdeadbeef>\n",
                request.include,
                request.target,
                path.display(),
                path.display(),
            )
        }
    }

    impl DocEngine for EchoEngine {
        fn build(&self, path: &Path, request: &ListingRequest) -> Result<String, DocEngineError> {
            Ok(self.listing("build", path, request))
        }

        fn parse(&self, path: &Path, request: &ListingRequest) -> Result<String, DocEngineError> {
            Ok(self.listing("parse", path, request))
        }

        fn introspect(&self, path: &Path, request: &ListingRequest) -> Result<String, DocEngineError> {
            Ok(self.listing("introspect", path, request))
        }

        fn plaintext(&self, path: &Path, _request: &ListingRequest) -> Result<Vec<String>, DocEngineError> {
            let source = fs::read_to_string(path).unwrap();
            Ok(source.split(';').map(str::to_string).collect())
        }

        fn docstrings_html(
            &self,
            path: &Path,
            sources: BuildSources,
            sink: &mut dyn DocstringSink,
        ) -> Result<(), DocEngineError> {
            fs::write(path.with_file_name("index.html"), "<html/>").unwrap();
            let source = fs::read_to_string(path).unwrap();
            self.seen.borrow_mut().push(format!("{sources:?}"));
            for line in source.lines().filter(|l| !l.is_empty()) {
                sink.docstring(line);
            }
            Ok(())
        }
    }

    #[test]
    fn test_run_builder_scrubs_listing() {
        let engine = EchoEngine::default();
        let request = ListingRequest::new().with_include("variables docstring").with_target("f");
        let listing = run_builder(&engine, "    def f(): pass\n", &request).unwrap();
        insta::assert_snapshot!(listing, @r#"
        build include=["variables", "docstring"] target=Some("f")
          filename = ...
          <module 'docgate_test' from ...
          <function f at ...>
          <Foo object at ...>
        "#);
        assert_eq!(engine.seen.borrow()[0], "def f(): pass\n");
    }

    #[test]
    fn test_run_parser_scrubs_only_filenames() {
        let engine = EchoEngine::default();
        let listing = run_parser(&engine, "x = 1\n", &ListingRequest::new()).unwrap();
        assert!(listing.contains("filename = ...\n"));
        assert!(listing.contains("<function f at 0x7f3a>"));
    }

    #[test]
    fn test_run_introspecter_uses_introspection() {
        let engine = EchoEngine::default();
        let listing = run_introspecter(&engine, "x = 1\n", &ListingRequest::new()).unwrap();
        assert!(listing.starts_with("introspect "));
        assert!(listing.contains("<Foo object at ...>"));
    }

    #[test]
    fn test_encoding_prints_ascii_safe_docstrings() {
        let engine = EchoEngine::default();
        let mut sink = PrintSink::new(Vec::new());
        test_encoding(
            &engine,
            "# coding: utf-8\n  caf\u{e9} \u{1f600}\n",
            BuildSources::default(),
            &mut sink,
        )
        .unwrap();
        let printed = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(printed, "# coding: utf-8\ncaf&#233; &#128512;\n");
    }

    #[test]
    fn test_collect_sink() {
        let engine = EchoEngine::default();
        let mut sink = CollectSink::default();
        test_encoding(&engine, "a\nb\n", BuildSources::default(), &mut sink).unwrap();
        assert_eq!(sink.docstrings, vec!["a", "b"]);
    }

    #[test]
    fn test_encoding_passes_sources_through() {
        let engine = EchoEngine::default();
        let mut sink = CollectSink::default();
        let sources = BuildSources {
            introspect: false,
            parse: true,
        };
        test_encoding(&engine, "a\n", sources, &mut sink).unwrap();
        assert_eq!(engine.seen.borrow()[0], "BuildSources { introspect: false, parse: true }");
    }

    #[test]
    fn test_encoding_needs_a_source() {
        let engine = EchoEngine::default();
        let mut sink = CollectSink::default();
        let sources = BuildSources {
            introspect: false,
            parse: false,
        };
        let err = test_encoding(&engine, "a\n", sources, &mut sink).unwrap_err();
        assert!(matches!(err, DocEngineError::NoSources));
        assert!(engine.seen.borrow().is_empty());
    }

    #[test]
    fn test_run_plaintext_trims_trailing_whitespace() {
        let engine = EchoEngine::default();
        let docstrings = run_plaintext(&engine, "Add two numbers.  \n;x: first operand\n\n", &ListingRequest::new())
            .unwrap();
        assert_eq!(docstrings, vec!["Add two numbers.", "x: first operand"]);
    }

    #[test]
    fn test_engine_error_wins_over_cleanup_failure() {
        let err = with_scratch("x = 1\n", |path| -> Result<(), DocEngineError> {
            fs::remove_file(path).unwrap();
            Err(DocEngineError::NoSources)
        })
        .unwrap_err();
        assert!(matches!(err, DocEngineError::NoSources));

        let err = with_scratch("x = 1\n", |path| {
            fs::remove_file(path).unwrap();
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err, DocEngineError::Scratch(ScratchError::NotAFile(_))));
    }

    #[test]
    fn test_remove_surrogates_folds_pairs() {
        assert_eq!(remove_surrogates("x&#55357;&#56832;y"), "x&#128512;y");
        assert_eq!(remove_surrogates("&#55357; &#56832;"), "&#55357; &#56832;");
        assert_eq!(remove_surrogates("&#233;&#56832;"), "&#233;&#56832;");
        assert_eq!(remove_surrogates("plain"), "plain");
    }

    #[test]
    fn test_xml_charrefs() {
        assert_eq!(xml_charrefs("a\u{e9}"), "a&#233;");
    }

    #[test]
    fn test_command_engine_missing_program() {
        let engine = CommandDocEngine::new("docgate-no-such-engine-6d1f0c");
        let err = run_builder(&engine, "x = 1\n", &ListingRequest::new()).unwrap_err();
        assert!(matches!(err, DocEngineError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_engine_protocol() {
        let engine = CommandDocEngine::new("echo");
        let scratch = ScratchFile::write("x = 1\n").unwrap();
        let request = ListingRequest::new().with_include("a b").with_exclude("c").with_target("T");
        let listing = engine.build(scratch.path(), &request).unwrap();
        assert_eq!(
            listing,
            format!("build --include a,b --exclude c --target T {}\n", scratch.path().display())
        );
        scratch.cleanup(false).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_command_engine_docstring_sources() {
        let engine = CommandDocEngine::new("echo");
        let scratch = ScratchFile::write("x = 1\n").unwrap();
        let mut sink = CollectSink::default();
        let sources = BuildSources {
            introspect: false,
            parse: true,
        };
        engine.docstrings_html(scratch.path(), sources, &mut sink).unwrap();
        assert_eq!(
            sink.docstrings,
            vec![format!("docstrings --no-introspect {}\n", scratch.path().display())]
        );
        scratch.cleanup(false).unwrap();
    }
}
