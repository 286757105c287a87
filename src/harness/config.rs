//! Harness configuration
//!
//! Defaults target a CPython interpreter; every field can be overridden with a `with_*` builder method or from the
//! command line.

use std::path::PathBuf;
use std::time::Duration;

use docgate_core::{RuntimeVersion, STANDARD_VERSIONS};

/// File extension of fixture files (without the dot).
pub const DEFAULT_EXTENSION: &str = "doctest";
/// Environment variable naming the fixture root.
pub const FIXTURES_ENV: &str = "DOCGATE_FIXTURES";
/// Environment variable set in every session when the collaborator debug flag is on.
pub const DEBUG_ENV: &str = "DOCGATE_DEBUG";
/// Environment variable carrying the path of the fixture a session runs.
pub const FIXTURE_ENV: &str = "DOCGATE_FIXTURE";
/// Placeholder replaced by the unique token in the sentinel template.
pub const SENTINEL_PLACEHOLDER: &str = "{sentinel}";
/// Placeholder replaced by the example source, as a quoted string literal, in the source template.
pub const SOURCE_PLACEHOLDER: &str = "{source}";
/// Placeholder replaced by the capability name in the requirement probe template.
pub const NAME_PLACEHOLDER: &str = "{name}";

/// How an interpreter session is started and driven.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Interpreter program (looked up on `PATH` when not a path)
    pub program: String,
    /// Arguments that put the interpreter in unbuffered interactive mode
    pub args: Vec<String>,
    /// Lines sent once after start-up, before the first example
    pub init: Vec<String>,
    /// Single-line command that runs one example as a unit; `{source}` is replaced with the source as a
    /// double-quoted string literal. `None` types the source lines in as they are.
    pub source_template: Option<String>,
    /// Command that prints its argument; `{sentinel}` is replaced with the unique token
    pub sentinel_template: String,
    /// Send an empty line after each example so compound statements are closed
    pub blank_line_terminator: bool,
    /// Extra environment variables for the child process
    pub env: Vec<(String, String)>,
    /// Per-example timeout
    pub timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            program: "python3".to_string(),
            args: vec!["-u".to_string(), "-q".to_string(), "-i".to_string()],
            init: vec!["import sys; sys.ps1 = sys.ps2 = ''; sys.stderr = sys.stdout".to_string()],
            source_template: Some(format!("exec(compile({SOURCE_PLACEHOLDER}, '<doctest>', 'single'))")),
            sentinel_template: format!("print('{SENTINEL_PLACEHOLDER}')"),
            blank_line_terminator: true,
            env: Vec::new(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl SessionConfig {
    /// Create a new config with default settings
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_init<I, S>(mut self, init: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.init = init.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_source_template(mut self, template: Option<String>) -> Self {
        self.source_template = template;
        self
    }

    pub fn with_sentinel_template(mut self, template: impl Into<String>) -> Self {
        self.sentinel_template = template.into();
        self
    }

    pub fn with_blank_line_terminator(mut self, enabled: bool) -> Self {
        self.blank_line_terminator = enabled;
        self
    }

    /// Add one environment variable (later values win).
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The sentinel command line for `token`.
    pub fn sentinel_command(&self, token: &str) -> String {
        self.sentinel_template.replace(SENTINEL_PLACEHOLDER, token)
    }

    /// What is sent to the interpreter for one example's `source`, always ending in a newline.
    ///
    /// With a source template the whole example, blank continuation lines included, travels as one string literal
    /// on a single line. The literal uses JSON string escapes, which Python string literals accept as well.
    pub fn example_command(&self, source: &str) -> String {
        let mut source = source.to_string();
        if !source.ends_with('\n') {
            source.push('\n');
        }
        match &self.source_template {
            Some(template) => {
                let literal = serde_json::Value::String(source).to_string();
                let mut command = template.replace(SOURCE_PLACEHOLDER, &literal);
                command.push('\n');
                command
            }
            None => source,
        }
    }
}

/// How `:RequireModule:` names are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequirementMode {
    /// Run a command template; `{name}` is replaced with the capability name
    Probe(Vec<String>),
    /// Look for an executable of that name on `PATH`
    Path,
}

impl Default for RequirementMode {
    fn default() -> Self {
        RequirementMode::Probe(vec![
            "python3".to_string(),
            "-c".to_string(),
            format!("import {NAME_PLACEHOLDER}"),
        ])
    }
}

/// Reporter selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

/// Everything the harness driver needs for one run.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Fixture root; located automatically when unset
    pub fixture_root: Option<PathBuf>,
    /// Runtime version; probed from the interpreter when unset
    pub runtime_version: Option<RuntimeVersion>,
    /// Versions for which markers are registered
    pub versions: Vec<RuntimeVersion>,
    /// Fixture file extension (without the dot)
    pub extension: String,
    /// Keep only suites whose name contains this keyword
    pub keyword: Option<String>,
    /// Stop the whole run after the first failing example
    pub stop_on_fail: bool,
    pub verbose: bool,
    /// Set the collaborator debug flag in every session
    pub debug: bool,
    /// Arguments passed to the interpreter to print its version
    pub version_probe_args: Vec<String>,
    pub requirement_mode: RequirementMode,
    pub session: SessionConfig,
    pub format: ReportFormat,
    pub color: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            fixture_root: None,
            runtime_version: None,
            versions: STANDARD_VERSIONS.to_vec(),
            extension: DEFAULT_EXTENSION.to_string(),
            keyword: None,
            stop_on_fail: false,
            verbose: true,
            debug: true,
            version_probe_args: vec!["--version".to_string()],
            requirement_mode: RequirementMode::default(),
            session: SessionConfig::default(),
            format: ReportFormat::default(),
            color: true,
        }
    }
}

impl HarnessConfig {
    /// Create a new config with default settings
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fixture_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.fixture_root = Some(root.into());
        self
    }

    pub fn with_runtime_version(mut self, version: RuntimeVersion) -> Self {
        self.runtime_version = Some(version);
        self
    }

    pub fn with_versions(mut self, versions: Vec<RuntimeVersion>) -> Self {
        self.versions = versions;
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    pub fn with_stop_on_fail(mut self, stop: bool) -> Self {
        self.stop_on_fail = stop;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_requirement_mode(mut self, mode: RequirementMode) -> Self {
        self.requirement_mode = mode;
        self
    }

    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    pub fn with_format(mut self, format: ReportFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }
}
