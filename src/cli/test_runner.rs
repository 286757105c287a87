//! Harness driver
//!
//! Registers the version markers, determines the runtime version, discovers and aggregates the fixture suites, runs
//! every example against a fresh interpreter session per suite and reports the results.
//!
//! ## TestReporter Trait
//!
//! The driver uses a `TestReporter` trait to separate reporting from execution. The console reporter prints
//! per-example progress lines and doctest-style failure reports; the JSON reporter emits one JSON object per event.
//!
//! ## I/O Boundaries
//!
//! Interpreter start-up and example execution go through the `Interpreter` and `Session` traits in
//! `test_interfaces.rs`, and requirement resolution through `CapabilityResolver`, so [`run_with`] can be driven with
//! scripted doubles.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use docgate_core::{FlagSet, MarkerTable, OptionFlag, OptionRegistry, RuntimeVersion};
use docgate_syntax::{Example, TranscriptParser};

use super::locate::find_fixture_root;
use super::test_interfaces::{Interpreter, Session, TestError};
use super::{CliError, CliResult, ExitCode};
use crate::harness::checker::{check_example, format_error, format_failure};
use crate::harness::config::{HarnessConfig, ReportFormat, RequirementMode};
use crate::harness::discover::{SkippedFixture, Suite, SuiteBuilder, discover_and_build};
use crate::harness::gate::{GatedParser, VersionGate};
use crate::harness::requirements::{CapabilityResolver, PathResolver, ProbeResolver};
use crate::harness::session::ProcessInterpreter;

// ============================================================================
// Test Reporter Trait
// ============================================================================

/// Trait for reporting test execution results.
///
/// Implement this trait to customize test output format (JSON, TAP, etc.)
pub trait TestReporter {
    /// Called when discovery begins
    fn on_discovery_start(&mut self, _root: &Path, _runtime: RuntimeVersion) {}

    /// Called for a fixture left out because a requirement did not resolve
    fn on_fixture_skipped(&mut self, fixture: &SkippedFixture);

    /// Called when suite collection is complete
    fn on_collection_complete(&mut self, suites: usize, examples: usize);

    /// Called for a suite whose fixture could not be loaded
    fn on_suite_error(&mut self, suite: &Suite, error: &str);

    /// Called when an example run begins
    fn on_test_start(&mut self, _test: &TestInfo) {}

    /// Called when an example completes
    fn on_test_complete(&mut self, test: &TestInfo, result: &TestResult);

    /// Called when all suites have completed
    fn on_run_complete(&mut self, summary: &TestSummary);
}

/// Where an example sits, for reporting.
#[derive(Debug, Clone)]
pub struct TestInfo {
    pub suite: String,
    pub file_path: PathBuf,
    /// 1-based line of the example's prompt
    pub line: usize,
    /// Position within the suite
    pub index: usize,
}

impl TestInfo {
    fn new(suite: &Suite, index: usize, example: &Example) -> Self {
        Self {
            suite: suite.name.clone(),
            file_path: suite.path.clone(),
            line: example.lineno + 1,
            index,
        }
    }

    pub fn id(&self) -> String {
        format!("{}:{}", self.suite, self.line)
    }
}

/// Result of running a single example
#[derive(Debug, Clone, PartialEq)]
pub enum TestResult {
    Passed(Duration),
    /// Duration and the failure report (empty when only the first failure of a suite is reported)
    Failed(Duration, String),
    Skipped(String),
    /// Stood in for a version-gated example; never sent to the interpreter
    Gated,
}

/// Summary of a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub gated: usize,
    /// Suites whose fixture could not be loaded or whose session could not start
    pub broken: usize,
    pub duration: Duration,
}

impl TestSummary {
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.broken == 0
    }

    fn record(&mut self, result: &TestResult) {
        self.total += 1;
        match result {
            TestResult::Passed(_) => self.passed += 1,
            TestResult::Failed(_, _) => self.failed += 1,
            TestResult::Skipped(_) => self.skipped += 1,
            TestResult::Gated => self.gated += 1,
        }
    }

    /// The counts part of the summary line, e.g. `3 passed, 1 failed`.
    pub fn counts(&self) -> String {
        let mut parts = Vec::new();
        if self.passed > 0 {
            parts.push(format!("{} passed", self.passed));
        }
        if self.failed > 0 {
            parts.push(format!("{} failed", self.failed));
        }
        if self.broken > 0 {
            parts.push(format!("{} broken", self.broken));
        }
        if self.skipped > 0 {
            parts.push(format!("{} skipped", self.skipped));
        }
        if self.gated > 0 {
            parts.push(format!("{} gated", self.gated));
        }
        if parts.is_empty() {
            parts.push("no examples ran".to_string());
        }
        parts.join(", ")
    }
}

/// What a harness run amounted to.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The interpreter was missing; nothing ran
    NotRun,
    Completed(TestSummary),
}

// ============================================================================
// Console reporter
// ============================================================================

/// Default console reporter: one line per example (or a progress dot with `verbose` off).
pub struct ConsoleReporter<W: Write> {
    out: W,
    pub verbose: bool,
    pub color: bool,
}

impl ConsoleReporter<io::Stderr> {
    pub fn stderr(verbose: bool, color: bool) -> Self {
        Self::new(io::stderr(), verbose, color)
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W, verbose: bool, color: bool) -> Self {
        Self { out, verbose, color }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.color {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }
}

impl<W: Write> TestReporter for ConsoleReporter<W> {
    fn on_discovery_start(&mut self, root: &Path, runtime: RuntimeVersion) {
        let banner = self.paint("1", "=================== doctest session starts ===================");
        let _ = writeln!(self.out, "{banner}");
        let _ = writeln!(self.out, "fixtures: {} (runtime {runtime})", root.display());
    }

    fn on_fixture_skipped(&mut self, fixture: &SkippedFixture) {
        let _ = writeln!(self.out, "{}", fixture.notice());
    }

    fn on_collection_complete(&mut self, suites: usize, examples: usize) {
        if suites == 0 {
            let _ = writeln!(self.out, "No fixtures collected");
        } else {
            let _ = writeln!(self.out, "collected {examples} example(s) in {suites} fixture(s)");
            let _ = writeln!(self.out);
        }
    }

    fn on_suite_error(&mut self, suite: &Suite, error: &str) {
        let status = self.paint("31", "ERROR");
        let _ = writeln!(self.out, "{} {status}", suite.name);
        let _ = writeln!(self.out, "{error}");
    }

    fn on_test_start(&mut self, test: &TestInfo) {
        if self.verbose {
            let _ = write!(self.out, "{} ... ", test.id());
        }
    }

    fn on_test_complete(&mut self, _test: &TestInfo, result: &TestResult) {
        let status = match result {
            TestResult::Passed(d) => {
                if self.verbose {
                    format!("{} ({}ms)", self.paint("32", "PASSED"), d.as_millis())
                } else {
                    self.paint("32", ".")
                }
            }
            TestResult::Failed(d, _) => {
                if self.verbose {
                    format!("{} ({}ms)", self.paint("31", "FAILED"), d.as_millis())
                } else {
                    self.paint("31", "F")
                }
            }
            TestResult::Skipped(reason) => {
                if self.verbose {
                    format!("{} ({reason})", self.paint("33", "SKIPPED"))
                } else {
                    self.paint("33", "s")
                }
            }
            TestResult::Gated => {
                if self.verbose {
                    self.paint("36", "GATED")
                } else {
                    self.paint("36", "g")
                }
            }
        };

        if self.verbose {
            let _ = writeln!(self.out, "{status}");
        } else {
            let _ = write!(self.out, "{status}");
        }

        if let TestResult::Failed(_, report) = result {
            if !report.is_empty() {
                if !self.verbose {
                    let _ = writeln!(self.out);
                }
                let _ = write!(self.out, "{report}");
            }
        }
    }

    fn on_run_complete(&mut self, summary: &TestSummary) {
        if !self.verbose {
            let _ = writeln!(self.out);
        }
        let _ = writeln!(self.out);
        let code = if summary.is_success() { "1;32" } else { "1;31" };
        let line = format!(
            "====== {} in {:.2}s ======",
            summary.counts(),
            summary.duration.as_secs_f64()
        );
        let line = self.paint(code, &line);
        let _ = writeln!(self.out, "{line}");
    }
}

// ============================================================================
// JSON-lines reporter
// ============================================================================

/// Emits one JSON object per line for every reporter event.
pub struct JsonReporter<W: Write> {
    out: W,
}

impl<W: Write> JsonReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, value: serde_json::Value) {
        if let Err(e) = writeln!(self.out, "{value}") {
            tracing::warn!(error = %e, "failed to write report event");
        }
    }
}

impl<W: Write> TestReporter for JsonReporter<W> {
    fn on_discovery_start(&mut self, root: &Path, runtime: RuntimeVersion) {
        self.emit(serde_json::json!({
            "event": "start",
            "version": crate::version::DOCGATE_VERSION,
            "root": root.display().to_string(),
            "runtime": runtime.to_string(),
        }));
    }

    fn on_fixture_skipped(&mut self, fixture: &SkippedFixture) {
        self.emit(serde_json::json!({
            "event": "skipped_fixture",
            "fixture": fixture.name,
            "requirement": fixture.requirement,
            "message": fixture.notice(),
        }));
    }

    fn on_collection_complete(&mut self, suites: usize, examples: usize) {
        self.emit(serde_json::json!({
            "event": "collected",
            "suites": suites,
            "examples": examples,
        }));
    }

    fn on_suite_error(&mut self, suite: &Suite, error: &str) {
        self.emit(serde_json::json!({
            "event": "suite_error",
            "suite": suite.name,
            "error": error,
        }));
    }

    fn on_test_complete(&mut self, test: &TestInfo, result: &TestResult) {
        let (status, duration, message) = match result {
            TestResult::Passed(d) => ("passed", Some(d), None),
            TestResult::Failed(d, report) => ("failed", Some(d), Some(report.as_str())),
            TestResult::Skipped(reason) => ("skipped", None, Some(reason.as_str())),
            TestResult::Gated => ("gated", None, None),
        };
        self.emit(serde_json::json!({
            "event": "example",
            "suite": test.suite,
            "line": test.line,
            "index": test.index,
            "status": status,
            "duration_ms": duration.map(|d| d.as_millis() as u64),
            "message": message,
        }));
    }

    fn on_run_complete(&mut self, summary: &TestSummary) {
        self.emit(serde_json::json!({
            "event": "summary",
            "total": summary.total,
            "passed": summary.passed,
            "failed": summary.failed,
            "skipped": summary.skipped,
            "gated": summary.gated,
            "broken": summary.broken,
            "duration_ms": summary.duration.as_millis() as u64,
        }));
    }
}

// ============================================================================
// Driver
// ============================================================================

/// Run the harness with the process-backed interpreter and the configured resolver and reporter.
pub fn run_doctests(config: &HarnessConfig) -> CliResult<ExitCode> {
    let interpreter = ProcessInterpreter::new(config.session.clone())
        .with_version_args(config.version_probe_args.clone())
        .with_debug(config.debug);
    let resolver = build_resolver(&config.requirement_mode);

    let outcome = match config.format {
        ReportFormat::Text => {
            let mut reporter = ConsoleReporter::stderr(config.verbose, config.color);
            run_with(config, &interpreter, resolver.as_ref(), &mut reporter)?
        }
        ReportFormat::Json => {
            let mut reporter = JsonReporter::new(io::stdout());
            run_with(config, &interpreter, resolver.as_ref(), &mut reporter)?
        }
    };

    match outcome {
        RunOutcome::NotRun => Ok(ExitCode::SUCCESS),
        RunOutcome::Completed(summary) if summary.is_success() => Ok(ExitCode::SUCCESS),
        // Failures were already reported; exit quietly with a failure code.
        RunOutcome::Completed(_) => Err(CliError::new("", ExitCode::FAILURE)),
    }
}

pub fn build_resolver(mode: &RequirementMode) -> Box<dyn CapabilityResolver> {
    match mode {
        RequirementMode::Probe(template) => Box::new(ProbeResolver::new(template.clone())),
        RequirementMode::Path => Box::new(PathResolver),
    }
}

/// The harness driver, with every external dependency injected.
///
/// ## Returns
/// - `RunOutcome::NotRun` when the interpreter cannot be found (guidance is printed; not an error).
/// - `RunOutcome::Completed` with the run summary otherwise.
///
/// ## Errors
/// - The runtime version cannot be determined, or the fixture root is missing or unreadable.
pub fn run_with(
    config: &HarnessConfig,
    interpreter: &dyn Interpreter,
    resolver: &dyn CapabilityResolver,
    reporter: &mut dyn TestReporter,
) -> CliResult<RunOutcome> {
    let start = Instant::now();

    if !interpreter.is_available() {
        eprintln!("{}", missing_interpreter_guidance(interpreter.program()));
        return Ok(RunOutcome::NotRun);
    }

    let mut registry = OptionRegistry::with_builtins();
    let markers = MarkerTable::register(&mut registry, &config.versions);
    tracing::debug!(markers = markers.len(), debug = config.debug, "registered version markers");

    let runtime = match config.runtime_version {
        Some(version) => version,
        None => interpreter
            .probe_version()
            .map_err(|e| CliError::failure(format!("Error: {e}")))?,
    };

    let root = find_fixture_root(config.fixture_root.as_deref()).ok_or_else(|| {
        CliError::failure(format!(
            "Error: no fixture directory found\nPass one as an argument or set {}",
            crate::harness::config::FIXTURES_ENV
        ))
    })?;
    reporter.on_discovery_start(&root, runtime);

    let parser = GatedParser::new(TranscriptParser::new(&registry), VersionGate::new(&markers, runtime));
    let builder = SuiteBuilder::new(&parser, resolver).with_extension(config.extension.clone());
    let mut discovery =
        discover_and_build(&root, runtime.major, &builder).map_err(|e| CliError::failure(format!("Error: {e}")))?;

    if let Some(keyword) = &config.keyword {
        discovery.retain_matching(keyword);
    }

    for fixture in &discovery.skipped {
        reporter.on_fixture_skipped(fixture);
    }
    reporter.on_collection_complete(discovery.suites.len(), discovery.example_count());

    let mut summary = run_suites(&discovery.suites, interpreter, config.stop_on_fail, reporter);
    summary.duration = start.elapsed();
    reporter.on_run_complete(&summary);
    Ok(RunOutcome::Completed(summary))
}

pub fn missing_interpreter_guidance(program: &str) -> String {
    format!(
        "The interpreter '{program}' was not found, so no examples were run.\n\
         Install it, or point the harness at another one with --interpreter."
    )
}

/// Execute every suite in order; returns the (duration-less) summary.
pub fn run_suites(
    suites: &[Suite],
    interpreter: &dyn Interpreter,
    stop_on_fail: bool,
    reporter: &mut dyn TestReporter,
) -> TestSummary {
    let mut summary = TestSummary::default();
    for suite in suites {
        let stop = run_suite(suite, interpreter, stop_on_fail, reporter, &mut summary);
        if stop {
            tracing::debug!(suite = %suite.name, "stopping run after first failure");
            break;
        }
    }
    summary
}

/// Run one suite; returns `true` when the whole run should stop.
fn run_suite(
    suite: &Suite,
    interpreter: &dyn Interpreter,
    stop_on_fail: bool,
    reporter: &mut dyn TestReporter,
    summary: &mut TestSummary,
) -> bool {
    if let Some(error) = &suite.load_error {
        reporter.on_suite_error(suite, error);
        summary.broken += 1;
        return stop_on_fail;
    }

    let mut session: Option<Box<dyn Session>> = None;
    let mut failures = 0usize;

    for (index, example) in suite.examples.iter().enumerate() {
        let info = TestInfo::new(suite, index, example);
        let flags = suite.flags.apply(&example.options);

        let settled = if flags.contains(OptionFlag::SKIP) {
            Some(TestResult::Skipped("SKIP".to_string()))
        } else if example.is_placeholder() {
            Some(TestResult::Gated)
        } else {
            None
        };
        if let Some(result) = settled {
            reporter.on_test_start(&info);
            reporter.on_test_complete(&info, &result);
            summary.record(&result);
            continue;
        }

        if session.is_none() {
            match interpreter.start(&suite.path) {
                Ok(started) => session = Some(started),
                Err(e) => {
                    reporter.on_suite_error(suite, &format!("failed to start interpreter: {e}"));
                    summary.broken += 1;
                    return stop_on_fail;
                }
            }
        }
        let Some(live) = session.as_mut() else {
            continue;
        };

        reporter.on_test_start(&info);
        let (mut result, dead) = run_example(live.as_mut(), suite, example, &flags);
        if dead {
            // The next live example gets a fresh interpreter.
            session = None;
        }

        if let TestResult::Failed(_, report) = &mut result {
            failures += 1;
            if failures > 1 && flags.contains(OptionFlag::REPORT_ONLY_FIRST_FAILURE) {
                report.clear();
            }
        }
        let failed = matches!(result, TestResult::Failed(_, _));
        reporter.on_test_complete(&info, &result);
        summary.record(&result);

        if failed && stop_on_fail {
            return true;
        }
        if failed && flags.contains(OptionFlag::FAIL_FAST) {
            break;
        }
    }
    false
}

/// Run one example; the flag is `true` when the session can no longer be used.
fn run_example(session: &mut dyn Session, suite: &Suite, example: &Example, flags: &FlagSet) -> (TestResult, bool) {
    let start = Instant::now();
    match session.run(&example.source) {
        Ok(got) => {
            let elapsed = start.elapsed();
            if check_example(example, &got, flags) {
                (TestResult::Passed(elapsed), false)
            } else {
                let report = format_failure(&suite.path, &suite.name, example, &got, flags);
                (TestResult::Failed(elapsed, report), false)
            }
        }
        Err(e) => {
            let elapsed = start.elapsed();
            let mut detail = e.to_string();
            if let TestError::SessionClosed { output } = &e {
                if !output.is_empty() {
                    detail = format!("{detail}\n{output}");
                }
            }
            let report = format_error(&suite.path, &suite.name, example, &detail);
            (TestResult::Failed(elapsed, report), true)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    /// Interpreter double: answers from a table and records every source it is sent.
    struct ScriptedInterpreter {
        answers: HashMap<&'static str, &'static str>,
        sent: Rc<RefCell<Vec<String>>>,
        starts: Rc<RefCell<usize>>,
    }

    impl ScriptedInterpreter {
        fn new(answers: &[(&'static str, &'static str)]) -> Self {
            Self {
                answers: answers.iter().copied().collect(),
                sent: Rc::default(),
                starts: Rc::default(),
            }
        }
    }

    struct ScriptedSession {
        answers: HashMap<&'static str, &'static str>,
        sent: Rc<RefCell<Vec<String>>>,
    }

    impl Session for ScriptedSession {
        fn run(&mut self, source: &str) -> Result<String, TestError> {
            self.sent.borrow_mut().push(source.to_string());
            match self.answers.get(source.trim_end()) {
                Some(&"<timeout>") => Err(TestError::Timeout(Duration::from_secs(1))),
                Some(answer) => Ok(answer.to_string()),
                None => Ok(String::new()),
            }
        }
    }

    impl Interpreter for ScriptedInterpreter {
        fn program(&self) -> &str {
            "scripted"
        }

        fn is_available(&self) -> bool {
            true
        }

        fn probe_version(&self) -> Result<RuntimeVersion, TestError> {
            Ok(RuntimeVersion::new(3, 6))
        }

        fn start(&self, _fixture: &Path) -> Result<Box<dyn Session>, TestError> {
            *self.starts.borrow_mut() += 1;
            Ok(Box::new(ScriptedSession {
                answers: self.answers.clone(),
                sent: Rc::clone(&self.sent),
            }))
        }
    }

    fn suite(examples: Vec<Example>) -> Suite {
        Suite {
            name: "s.doctest".to_string(),
            path: PathBuf::from("fx/s.doctest"),
            flags: FlagSet::new().with(OptionFlag::ELLIPSIS).with(OptionFlag::REPORT_UDIFF),
            examples,
            load_error: None,
        }
    }

    fn run(suites: &[Suite], interpreter: &ScriptedInterpreter, stop_on_fail: bool) -> (TestSummary, String) {
        let mut reporter = ConsoleReporter::new(Vec::new(), true, false);
        let summary = run_suites(suites, interpreter, stop_on_fail, &mut reporter);
        (summary, String::from_utf8(reporter.into_inner()).unwrap())
    }

    #[test]
    fn test_passing_and_failing_examples() {
        let interpreter = ScriptedInterpreter::new(&[("1 + 1", "2\n"), ("2 + 2", "5\n")]);
        let s = suite(vec![Example::new("1 + 1", "2"), Example::new("2 + 2", "4").at(3, 0)]);
        let (summary, output) = run(&[s], &interpreter, false);
        assert_eq!((summary.passed, summary.failed), (1, 1));
        assert!(output.contains("s.doctest:1 ... PASSED"));
        assert!(output.contains("s.doctest:4 ... FAILED"));
        assert!(output.contains("Expected:\n    4\nGot:\n    5\n"));
    }

    #[test]
    fn test_unterminated_output_matches() {
        let interpreter = ScriptedInterpreter::new(&[("print('a', end='')", "a")]);
        let s = suite(vec![Example::new("print('a', end='')", "a")]);
        let (summary, _) = run(&[s], &interpreter, false);
        assert_eq!((summary.passed, summary.failed), (1, 0));
    }

    #[test]
    fn test_placeholders_and_skips_never_reach_interpreter() {
        let interpreter = ScriptedInterpreter::new(&[]);
        let s = suite(vec![
            Example::placeholder(),
            Example::new("boom()", "").with_option(OptionFlag::SKIP, true),
        ]);
        let (summary, output) = run(&[s], &interpreter, false);
        assert_eq!((summary.gated, summary.skipped, summary.total), (1, 1, 2));
        assert!(interpreter.sent.borrow().is_empty());
        assert_eq!(*interpreter.starts.borrow(), 0);
        assert!(output.contains("GATED"));
    }

    #[test]
    fn test_one_session_per_suite() {
        let interpreter = ScriptedInterpreter::new(&[]);
        let suites = vec![
            suite(vec![Example::new("a = 1", ""), Example::new("b = 2", "")]),
            suite(vec![Example::new("c = 3", "")]),
        ];
        let (summary, _) = run(&suites, &interpreter, false);
        assert_eq!(summary.passed, 3);
        assert_eq!(*interpreter.starts.borrow(), 2);
    }

    #[test]
    fn test_broken_suite_is_reported() {
        let interpreter = ScriptedInterpreter::new(&[]);
        let mut broken = suite(Vec::new());
        broken.load_error = Some("line 1 of s.doctest lacks blank after >>>: '>>>x'".to_string());
        let (summary, output) = run(&[broken], &interpreter, false);
        assert_eq!(summary.broken, 1);
        assert!(!summary.is_success());
        assert!(output.contains("s.doctest ERROR"));
    }

    #[test]
    fn test_stop_on_fail_stops_the_run() {
        let interpreter = ScriptedInterpreter::new(&[("bad", "no\n")]);
        let suites = vec![
            suite(vec![Example::new("bad", "yes"), Example::new("later", "")]),
            suite(vec![Example::new("other", "")]),
        ];
        let (summary, _) = run(&suites, &interpreter, true);
        assert_eq!((summary.failed, summary.total), (1, 1));
    }

    #[test]
    fn test_fail_fast_stops_only_the_suite() {
        let interpreter = ScriptedInterpreter::new(&[("bad", "no\n")]);
        let suites = vec![
            suite(vec![
                Example::new("bad", "yes").with_option(OptionFlag::FAIL_FAST, true),
                Example::new("later", ""),
            ]),
            suite(vec![Example::new("other", "")]),
        ];
        let (summary, _) = run(&suites, &interpreter, false);
        assert_eq!((summary.failed, summary.passed), (1, 1));
        assert!(!interpreter.sent.borrow().iter().any(|s| s.starts_with("later")));
    }

    #[test]
    fn test_report_only_first_failure() {
        let interpreter = ScriptedInterpreter::new(&[("a", "1\n"), ("b", "1\n")]);
        let s = suite(vec![
            Example::new("a", "2").with_option(OptionFlag::REPORT_ONLY_FIRST_FAILURE, true),
            Example::new("b", "3").with_option(OptionFlag::REPORT_ONLY_FIRST_FAILURE, true),
        ]);
        let (summary, output) = run(&[s], &interpreter, false);
        assert_eq!(summary.failed, 2);
        assert_eq!(output.matches("Failed example:").count(), 1);
    }

    #[test]
    fn test_timeout_restarts_session() {
        let interpreter = ScriptedInterpreter::new(&[("slow()", "<timeout>")]);
        let s = suite(vec![Example::new("slow()", ""), Example::new("x = 1", "")]);
        let (summary, output) = run(&[s], &interpreter, false);
        assert_eq!((summary.failed, summary.passed), (1, 1));
        assert_eq!(*interpreter.starts.borrow(), 2);
        assert!(output.contains("example timed out after 1.0s"));
    }

    #[test]
    fn test_summary_line() {
        let summary = TestSummary {
            total: 4,
            passed: 2,
            failed: 1,
            gated: 1,
            duration: Duration::from_millis(1500),
            ..TestSummary::default()
        };
        let mut reporter = ConsoleReporter::new(Vec::new(), true, false);
        reporter.on_run_complete(&summary);
        let output = String::from_utf8(reporter.into_inner()).unwrap();
        insta::assert_snapshot!(output.trim(), @"====== 2 passed, 1 failed, 1 gated in 1.50s ======");
    }

    #[test]
    fn test_json_reporter_events() {
        let mut reporter = JsonReporter::new(Vec::new());
        let s = suite(Vec::new());
        let info = TestInfo::new(&s, 0, &Example::new("x", "").at(6, 0));
        reporter.on_collection_complete(1, 1);
        reporter.on_test_complete(&info, &TestResult::Gated);
        let output = String::from_utf8(reporter.into_inner()).unwrap();
        let events: Vec<serde_json::Value> = output.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(events[0]["event"], "collected");
        assert_eq!(events[1]["status"], "gated");
        assert_eq!(events[1]["line"], 7);
        assert!(events[1]["duration_ms"].is_null());
    }

    #[test]
    fn test_json_run_is_pure_json_lines() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.doctest"), ">>> 1 + 1\n2\n").unwrap();
        std::fs::write(
            dir.path().join("b.doctest"),
            ":RequireModule: docgate_absent_module\n>>> 1\n1\n",
        )
        .unwrap();
        let config = HarnessConfig::new()
            .with_fixture_root(dir.path())
            .with_runtime_version(RuntimeVersion::new(3, 6));
        let interpreter = ScriptedInterpreter::new(&[("1 + 1", "2\n")]);
        let resolver = |name: &str| name != "docgate_absent_module";
        let mut reporter = JsonReporter::new(Vec::new());
        let outcome = run_with(&config, &interpreter, &resolver, &mut reporter).unwrap();
        assert!(matches!(outcome, RunOutcome::Completed(ref summary) if summary.passed == 1));

        let output = String::from_utf8(reporter.into_inner()).unwrap();
        let events: Vec<serde_json::Value> = output.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        let kinds: Vec<&str> = events.iter().map(|e| e["event"].as_str().unwrap()).collect();
        assert_eq!(kinds, vec!["start", "skipped_fixture", "collected", "example", "summary"]);
        assert_eq!(events[1]["fixture"], "b.doctest");
        assert_eq!(events[1]["requirement"], "docgate_absent_module");
    }

    #[test]
    fn test_console_reports_skipped_fixture() {
        let mut reporter = ConsoleReporter::new(Vec::new(), true, false);
        reporter.on_fixture_skipped(&SkippedFixture {
            name: "py3/encoding.doctest".to_string(),
            path: PathBuf::from("fx/py3/encoding.doctest"),
            requirement: "docutils".to_string(),
        });
        let output = String::from_utf8(reporter.into_inner()).unwrap();
        insta::assert_snapshot!(output.trim(), @"Skipping 'encoding.doctest' (required module 'docutils' not found)");
    }

    #[test]
    fn test_missing_interpreter_does_not_run() {
        struct Missing;
        impl Interpreter for Missing {
            fn program(&self) -> &str {
                "nope"
            }
            fn is_available(&self) -> bool {
                false
            }
            fn probe_version(&self) -> Result<RuntimeVersion, TestError> {
                Err(TestError::VersionProbe("nope".to_string()))
            }
            fn start(&self, _fixture: &Path) -> Result<Box<dyn Session>, TestError> {
                Err(TestError::SessionClosed { output: String::new() })
            }
        }
        let mut reporter = ConsoleReporter::new(Vec::new(), true, false);
        let always = |_: &str| true;
        let outcome = run_with(&HarnessConfig::default(), &Missing, &always, &mut reporter).unwrap();
        assert_eq!(outcome, RunOutcome::NotRun);
        assert!(reporter.into_inner().is_empty());
    }
}
