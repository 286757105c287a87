//! Requirement scanner
//!
//! Fixtures declare capabilities they need with `:RequireModule: <name>` lines. Before a fixture is parsed, every
//! declared name is resolved through a [`CapabilityResolver`]; the first name that does not resolve excludes the
//! whole fixture.

use std::cell::RefCell;
use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::process::{Command, Stdio};

use docgate_syntax::scan_requirements;

use super::config::NAME_PLACEHOLDER;

/// Decide whether a named capability is available in this environment.
pub trait CapabilityResolver {
    fn resolve(&self, name: &str) -> bool;
}

impl<F> CapabilityResolver for F
where
    F: Fn(&str) -> bool,
{
    fn resolve(&self, name: &str) -> bool {
        self(name)
    }
}

/// Resolve a name by running a probe command; exit status 0 means available.
///
/// The template's arguments have `{name}` replaced with the capability name. Results are cached per name for the
/// lifetime of the resolver.
#[derive(Debug)]
pub struct ProbeResolver {
    template: Vec<String>,
    cache: RefCell<HashMap<String, bool>>,
}

impl ProbeResolver {
    pub fn new(template: Vec<String>) -> Self {
        Self {
            template,
            cache: RefCell::new(HashMap::new()),
        }
    }

    fn probe(&self, name: &str) -> bool {
        let Some((program, args)) = self.template.split_first() else {
            tracing::warn!("empty requirement probe template; treating '{name}' as missing");
            return false;
        };
        let program = program.replace(NAME_PLACEHOLDER, name);
        let status = Command::new(&program)
            .args(args.iter().map(|arg| arg.replace(NAME_PLACEHOLDER, name)))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match status {
            Ok(status) => status.success(),
            Err(e) => {
                tracing::debug!(program, error = %e, "requirement probe could not start");
                false
            }
        }
    }
}

impl CapabilityResolver for ProbeResolver {
    fn resolve(&self, name: &str) -> bool {
        if let Some(&known) = self.cache.borrow().get(name) {
            return known;
        }
        let available = self.probe(name);
        tracing::debug!(name, available, "probed requirement");
        self.cache.borrow_mut().insert(name.to_string(), available);
        available
    }
}

/// Resolve a name as an executable file on `PATH`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PathResolver;

impl CapabilityResolver for PathResolver {
    fn resolve(&self, name: &str) -> bool {
        find_on_path(name).is_some()
    }
}

/// Locate `program` the way a shell would: a path containing a separator is checked directly, a bare name is
/// searched on `PATH`.
pub fn find_on_path(program: &str) -> Option<std::path::PathBuf> {
    let direct = Path::new(program);
    if direct.components().count() > 1 {
        return is_executable(direct).then(|| direct.to_path_buf());
    }
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths).find_map(|dir| {
        let candidate = dir.join(program);
        if is_executable(&candidate) {
            return Some(candidate);
        }
        if cfg!(windows) {
            let exe = dir.join(format!("{program}.exe"));
            if is_executable(&exe) {
                return Some(exe);
            }
        }
        None
    })
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// The first declared requirement of `text` that `resolver` cannot satisfy.
pub fn missing_requirement(text: &str, resolver: &dyn CapabilityResolver) -> Option<String> {
    scan_requirements(text)
        .into_iter()
        .find(|requirement| !resolver.resolve(&requirement.name))
        .map(|requirement| requirement.name)
}

/// Whether every requirement of a fixture resolves.
///
/// Prints a skip notice naming the fixture and the first missing requirement on stdout when one does not. Discovery
/// uses [`missing_requirement`] instead and leaves the notice to the run's reporter.
pub fn check_requirements(fixture_name: &str, text: &str, resolver: &dyn CapabilityResolver) -> bool {
    match missing_requirement(text, resolver) {
        None => true,
        Some(name) => {
            println!("{}", skip_notice(fixture_name, &name));
            false
        }
    }
}

/// The notice for a fixture set aside; `file_name` is the fixture's bare file name.
pub fn skip_notice(file_name: &str, requirement: &str) -> String {
    format!("Skipping '{file_name}' (required module '{requirement}' not found)")
}
