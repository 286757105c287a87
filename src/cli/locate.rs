//! Fixture-root lookup

use std::env;
use std::path::{Path, PathBuf};

use crate::harness::config::FIXTURES_ENV;

/// Directory name of the bundled fixtures.
pub const BUNDLED_DIR: &str = "doctests";

/// Find the fixture root.
///
/// An explicit root is returned as given (discovery reports it if missing). Otherwise the lookup tries
/// `$DOCGATE_FIXTURES`, then `doctests/` in the current directory, then `doctests/` next to the executable or up to
/// two levels above it (for `target/debug` layouts).
pub fn find_fixture_root(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(root) = explicit {
        return Some(root.to_path_buf());
    }

    if let Ok(path) = env::var(FIXTURES_ENV) {
        let path = PathBuf::from(path);
        if path.is_dir() {
            return Some(path);
        }
        tracing::warn!(path = %path.display(), "{FIXTURES_ENV} does not name a directory; ignoring");
    }

    let dev = Path::new(BUNDLED_DIR);
    if dev.is_dir() {
        return Some(dev.to_path_buf());
    }

    let exe_path = env::current_exe().ok()?;
    exe_path
        .ancestors()
        .skip(1)
        .take(3)
        .map(|dir| dir.join(BUNDLED_DIR))
        .find(|candidate| candidate.is_dir())
}
