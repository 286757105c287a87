//! Fixture discovery and suite aggregation
//!
//! Fixtures live in a root directory and, optionally, a `py{major}` subdirectory holding fixtures that only make
//! sense for one major runtime version. Discovery lists both (root first, each sorted by file name), sets aside
//! fixtures whose requirements do not resolve, and parses the rest into one [`Suite`] each.

use std::fs;
use std::path::{Component, Path, PathBuf};

use docgate_core::{FlagSet, OptionFlag};
use docgate_syntax::{Example, ExampleParser};

use super::HarnessError;
use super::config::DEFAULT_EXTENSION;
use super::requirements::{CapabilityResolver, missing_requirement, skip_notice};

/// The examples of one fixture plus how to run them.
#[derive(Debug, Clone)]
pub struct Suite {
    /// Fixture path relative to the fixture root, `/`-separated
    pub name: String,
    pub path: PathBuf,
    /// Flags every example starts from
    pub flags: FlagSet,
    pub examples: Vec<Example>,
    /// Why the fixture could not be loaded; such a suite has no examples and counts as a failure
    pub load_error: Option<String>,
}

impl Suite {
    pub fn is_broken(&self) -> bool {
        self.load_error.is_some()
    }
}

/// A fixture left out of the run because one of its requirements did not resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFixture {
    /// Fixture path relative to the fixture root, `/`-separated
    pub name: String,
    pub path: PathBuf,
    /// The first requirement that did not resolve
    pub requirement: String,
}

impl SkippedFixture {
    /// `Skipping '<file name>' (required module '<name>' not found)`
    pub fn notice(&self) -> String {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.name.clone());
        skip_notice(&file_name, &self.requirement)
    }
}

/// What became of one fixture file.
#[derive(Debug, Clone)]
pub enum Built {
    Suite(Suite),
    Skipped(SkippedFixture),
}

/// Everything discovery found under a fixture root, in scan order.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub suites: Vec<Suite>,
    pub skipped: Vec<SkippedFixture>,
}

impl Discovery {
    /// Keep only fixtures whose name contains `keyword`.
    pub fn retain_matching(&mut self, keyword: &str) {
        self.suites.retain(|suite| suite.name.contains(keyword));
        self.skipped.retain(|fixture| fixture.name.contains(keyword));
    }

    pub fn example_count(&self) -> usize {
        self.suites.iter().map(|s| s.examples.len()).sum()
    }
}

/// Turns fixture files into suites.
pub struct SuiteBuilder<'a> {
    parser: &'a dyn ExampleParser,
    resolver: &'a dyn CapabilityResolver,
    flags: FlagSet,
    extension: String,
}

impl<'a> SuiteBuilder<'a> {
    /// A builder with the default base flags (`ELLIPSIS | REPORT_UDIFF`) and fixture extension.
    pub fn new(parser: &'a dyn ExampleParser, resolver: &'a dyn CapabilityResolver) -> Self {
        Self {
            parser,
            resolver,
            flags: FlagSet::new().with(OptionFlag::ELLIPSIS).with(OptionFlag::REPORT_UDIFF),
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    pub fn with_flags(mut self, flags: FlagSet) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Build the suite for `path`, or set the fixture aside when a requirement does not resolve.
    pub fn build(&self, root: &Path, path: &Path) -> Built {
        let name = suite_name(root, path);
        let mut suite = Suite {
            name,
            path: path.to_path_buf(),
            flags: self.flags.clone(),
            examples: Vec::new(),
            load_error: None,
        };

        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(fixture = %suite.name, error = %e, "fixture unreadable");
                suite.load_error = Some(format!("failed to read {}: {e}", path.display()));
                return Built::Suite(suite);
            }
        };

        if let Some(requirement) = missing_requirement(&text, self.resolver) {
            tracing::debug!(fixture = %suite.name, requirement, "fixture excluded by requirements");
            return Built::Skipped(SkippedFixture {
                name: suite.name,
                path: suite.path,
                requirement,
            });
        }

        match self.parser.examples(&text, &suite.name) {
            Ok(examples) => suite.examples = examples,
            Err(e) => suite.load_error = Some(e.to_string()),
        }
        Built::Suite(suite)
    }
}

/// The directories searched for fixtures: `root`, then `root/py{major}` when it exists.
pub fn fixture_dirs(root: &Path, runtime_major: u32) -> Result<Vec<PathBuf>, HarnessError> {
    if !root.is_dir() {
        return Err(HarnessError::MissingFixtureDir(root.to_path_buf()));
    }
    let mut dirs = vec![root.to_path_buf()];
    let versioned = root.join(format!("py{runtime_major}"));
    if versioned.is_dir() {
        dirs.push(versioned);
    } else {
        tracing::debug!(dir = %versioned.display(), "no version-specific fixture directory");
    }
    Ok(dirs)
}

/// Regular files in `dir` whose name ends with `.{extension}`, sorted by file name.
pub fn list_fixtures(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, HarnessError> {
    let read_err = |source| HarnessError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };
    let suffix = format!(".{extension}");
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(&suffix));
        if matches {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Discover every fixture for `runtime_major` under `root` and build one suite per fixture whose requirements
/// resolve.
#[tracing::instrument(skip_all, fields(root = %root.display(), runtime_major))]
pub fn discover_and_build(
    root: &Path,
    runtime_major: u32,
    builder: &SuiteBuilder<'_>,
) -> Result<Discovery, HarnessError> {
    let mut discovery = Discovery::default();
    for dir in fixture_dirs(root, runtime_major)? {
        for path in list_fixtures(&dir, builder.extension())? {
            match builder.build(root, &path) {
                Built::Suite(suite) => discovery.suites.push(suite),
                Built::Skipped(fixture) => discovery.skipped.push(fixture),
            }
        }
    }
    tracing::debug!(
        suites = discovery.suites.len(),
        skipped = discovery.skipped.len(),
        "discovery complete"
    );
    Ok(discovery)
}

fn suite_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
