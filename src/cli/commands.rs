//! CLI command implementations
//!
//! All command functions return `CliResult<ExitCode>` instead of calling
//! `process::exit`. Error handling and exits happen in the top-level `run()`.

use std::env;
use std::fmt::Write as _;
use std::fs;
use std::io::{self, Read};
use std::path::Path;

use docgate_core::{MarkerKind, MarkerTable, OptionRegistry, RuntimeVersion, STANDARD_VERSIONS};
use docgate_syntax::{ExampleParser, Piece, TranscriptParser, scan_requirements};

use super::test_runner::build_resolver;
use super::{CliError, CliResult, DocAction, DocArgs, ExitCode};
use crate::docengine::{
    BuildSources, CommandDocEngine, DocEngineError, ListingRequest, PrintSink, run_builder, run_introspecter,
    run_parser, run_plaintext, test_encoding,
};
use crate::harness::config::RequirementMode;
use crate::harness::gate::VersionGate;
use crate::harness::requirements::check_requirements;

/// Environment variable naming the documentation engine program.
pub const ENGINE_ENV: &str = "DOCGATE_ENGINE";
/// Engine program used when neither `--engine` nor `$DOCGATE_ENGINE` is given.
pub const DEFAULT_ENGINE: &str = "docgate-engine";

/// Maximum fixture or source size (10 MB)
const MAX_SOURCE_SIZE: u64 = 10 * 1024 * 1024;

/// Read a file, refusing oversized input.
///
/// # Errors
///
/// Returns an error if:
/// - The file cannot be accessed or read
/// - The file exceeds `MAX_SOURCE_SIZE` (10 MB)
pub fn read_source(path: &Path) -> CliResult<String> {
    let metadata = fs::metadata(path)
        .map_err(|e| CliError::failure(format!("Cannot access file '{}': {}", path.display(), e)))?;

    if metadata.len() > MAX_SOURCE_SIZE {
        return Err(CliError::failure(format!(
            "Source file '{}' is too large ({} bytes, max {} bytes)",
            path.display(),
            metadata.len(),
            MAX_SOURCE_SIZE
        )));
    }

    fs::read_to_string(path).map_err(|e| CliError::failure(format!("Error reading file '{}': {}", path.display(), e)))
}

// ============================================================================
// markers
// ============================================================================

/// List the registered version markers.
pub fn list_markers() -> CliResult<ExitCode> {
    print!("{}", render_markers(STANDARD_VERSIONS));
    Ok(ExitCode::SUCCESS)
}

/// One line per marker: its name, comparison and bound.
pub fn render_markers(versions: &[RuntimeVersion]) -> String {
    let mut registry = OptionRegistry::with_builtins();
    let table = MarkerTable::register(&mut registry, versions);
    let mut out = String::new();
    for marker in table.iter() {
        let op = match marker.kind {
            MarkerKind::Minimum => ">=",
            MarkerKind::Maximum => "<=",
        };
        let _ = writeln!(out, "{:<12} {op} {}", marker.name, marker.bound);
    }
    out
}

// ============================================================================
// --parse / --scan
// ============================================================================

/// Parse a fixture and dump its examples; gated against `runtime` when given.
pub fn parse_file(path: &Path, runtime: Option<RuntimeVersion>) -> CliResult<ExitCode> {
    let source = read_source(path)?;
    let name = path.display().to_string();
    let dump = dump_examples(&source, &name, runtime)?;
    print!("{dump}");
    Ok(ExitCode::SUCCESS)
}

/// Render the examples of `source`, one block per example.
///
/// Parse errors are rendered with their source context.
pub fn dump_examples(source: &str, name: &str, runtime: Option<RuntimeVersion>) -> CliResult<String> {
    let mut registry = OptionRegistry::with_builtins();
    let markers = MarkerTable::standard(&mut registry);
    let parser = TranscriptParser::new(&registry);

    let mut pieces = parser
        .parse(source, name)
        .map_err(|err| CliError::failure(format!("{:?}", miette::Report::new(err))))?;
    if let Some(runtime) = runtime {
        VersionGate::new(&markers, runtime).filter(&mut pieces);
    }

    let mut out = String::new();
    for example in pieces.iter().filter_map(Piece::as_example) {
        let kind = if example.is_placeholder() { " (gated)" } else { "" };
        let _ = writeln!(out, "line {}{kind}:", example.lineno + 1);
        for line in example.source.lines() {
            let _ = writeln!(out, "  >>> {line}");
        }
        for line in example.want.lines() {
            let _ = writeln!(out, "  {line}");
        }
        let options: Vec<String> = example
            .options
            .iter()
            .map(|(flag, on)| {
                let sign = if *on { '+' } else { '-' };
                format!("{sign}{}", registry.name(*flag).unwrap_or("?"))
            })
            .collect();
        if !options.is_empty() {
            let _ = writeln!(out, "  options: {}", options.join(" "));
        }
    }
    Ok(out)
}

/// List a fixture's requirement directives and whether each resolves.
///
/// Ends with the harness's skip notice, and a failure exit, when the fixture would be skipped.
pub fn scan_file(path: &Path, mode: &RequirementMode) -> CliResult<ExitCode> {
    let source = read_source(path)?;
    let resolver = build_resolver(mode);
    let requirements = scan_requirements(&source);
    if requirements.is_empty() {
        println!("{}: no requirements", path.display());
        return Ok(ExitCode::SUCCESS);
    }

    for requirement in &requirements {
        let status = if resolver.resolve(&requirement.name) { "found" } else { "missing" };
        println!("{}:{}: {} ({status})", path.display(), requirement.line, requirement.name);
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    if check_requirements(&file_name, &source, resolver.as_ref()) {
        Ok(ExitCode::SUCCESS)
    } else {
        Err(CliError::new("", ExitCode::FAILURE))
    }
}

// ============================================================================
// doc
// ============================================================================

/// Run a documentation-engine helper on a source file (or stdin) and print its output.
pub fn doc_command(args: &DocArgs) -> CliResult<ExitCode> {
    let source = if args.file.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| CliError::failure(format!("Error reading stdin: {e}")))?;
        buf
    } else {
        read_source(&args.file)?
    };

    let program = args
        .engine
        .clone()
        .or_else(|| env::var(ENGINE_ENV).ok())
        .unwrap_or_else(|| DEFAULT_ENGINE.to_string());
    let engine = CommandDocEngine::new(program);

    let mut request = ListingRequest::new();
    if let Some(include) = &args.include {
        request = request.with_include(include);
    }
    if let Some(exclude) = &args.exclude {
        request = request.with_exclude(exclude);
    }
    if let Some(target) = &args.target {
        request = request.with_target(target);
    }

    let listing = match args.action {
        DocAction::Build => run_builder(&engine, &source, &request),
        DocAction::Parse => run_parser(&engine, &source, &request),
        DocAction::Introspect => run_introspecter(&engine, &source, &request),
        DocAction::Plain => run_plaintext(&engine, &source, &request).map(|docstrings| {
            docstrings.iter().fold(String::new(), |mut out, docstring| {
                let _ = writeln!(out, "{docstring}");
                out
            })
        }),
        DocAction::Encoding => {
            let sources = BuildSources {
                introspect: !args.no_introspect,
                parse: !args.no_parse,
            };
            let mut sink = PrintSink::new(io::stdout());
            test_encoding(&engine, &source, sources, &mut sink).map(|()| String::new())
        }
    };
    let listing = listing.map_err(doc_error)?;
    print!("{listing}");
    Ok(ExitCode::SUCCESS)
}

fn doc_error(err: DocEngineError) -> CliError {
    CliError::failure(format!("Error: {err}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_render_markers() {
        let listing = render_markers(&[RuntimeVersion::new(2, 7), RuntimeVersion::new(3, 4)]);
        insta::assert_snapshot!(listing, @r"
        PYTHON2.7    >= 2.7
        PYTHON3.4    >= 3.4
        PYMIN2.7     >= 2.7
        PYMIN3.4     >= 3.4
        PYMAX2.7     <= 2.7
        PYMAX3.4     <= 3.4
        ");
    }

    #[test]
    fn test_dump_examples_gated() {
        let fixture = ">>> print('a')  # doctest: +PYMIN3.0\na\n>>> 1 + 1\n2\n";
        let dump = dump_examples(fixture, "f.doctest", Some(RuntimeVersion::new(2, 7))).unwrap();
        insta::assert_snapshot!(dump, @r"
        line 1 (gated):
          >>> 1
          1
        line 3:
          >>> 1 + 1
          2
        ");
    }

    #[test]
    fn test_dump_examples_lists_options() {
        let fixture = ">>> x  # doctest: +ELLIPSIS, -SKIP\na\n";
        let dump = dump_examples(fixture, "f.doctest", None).unwrap();
        assert!(dump.contains("options: +ELLIPSIS -SKIP"));
    }

    #[test]
    fn test_dump_examples_parse_error() {
        let err = dump_examples(">>>x\n", "bad.doctest", None).unwrap_err();
        assert_eq!(err.exit_code, ExitCode::FAILURE);
        assert!(err.message.contains("lacks blank after >>>"));
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_file_fails_on_missing_requirement() {
        let dir = tempfile::TempDir::new().unwrap();
        let found = dir.path().join("found.doctest");
        fs::write(&found, ":RequireModule: sh\n>>> 1\n1\n").unwrap();
        assert_eq!(scan_file(&found, &RequirementMode::Path).unwrap(), ExitCode::SUCCESS);

        let missing = dir.path().join("missing.doctest");
        fs::write(&missing, ":RequireModule: docgate-no-such-tool-3e7a\n").unwrap();
        let err = scan_file(&missing, &RequirementMode::Path).unwrap_err();
        assert_eq!(err.exit_code, ExitCode::FAILURE);
        assert!(err.message.is_empty());
    }

    #[test]
    fn test_read_source_missing_file() {
        let err = read_source(Path::new("/no/such/fixture.doctest")).unwrap_err();
        assert!(err.message.starts_with("Cannot access file"));
    }
}
