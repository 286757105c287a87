//! Version-marker table.
//!
//! A version marker is an option flag whose name encodes a version bound. Three spellings are registered for every
//! supported version `M.m`:
//!
//! | Name | Kind | Meaning |
//! |---|---|---|
//! | `PYTHONM.m` | minimum | requires at least `M.m` |
//! | `PYMINM.m` | minimum | requires at least `M.m` |
//! | `PYMAXM.m` | maximum | requires at most `M.m` |
//!
//! The table is built once at harness startup with [`MarkerTable::register`] and handed to the version gate by
//! reference; nothing about it is global.

use crate::flags::{OptionFlag, OptionRegistry};
use crate::version::RuntimeVersion;

/// Versions that get markers by default.
pub const STANDARD_VERSIONS: &[RuntimeVersion] = &[
    RuntimeVersion::new(2, 4),
    RuntimeVersion::new(2, 5),
    RuntimeVersion::new(2, 7),
    RuntimeVersion::new(3, 0),
    RuntimeVersion::new(3, 4),
    RuntimeVersion::new(3, 5),
    RuntimeVersion::new(3, 6),
    RuntimeVersion::new(3, 7),
];

/// Whether a marker is a lower or an upper bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Minimum,
    Maximum,
}

/// One registered version marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMarker {
    pub name: String,
    pub flag: OptionFlag,
    pub kind: MarkerKind,
    pub bound: RuntimeVersion,
}

impl VersionMarker {
    /// Whether `runtime` satisfies this marker's bound.
    ///
    /// Bounds have no patch level, so `PYMAX3.6` rejects a `3.6.9` runtime while `PYMIN3.6` admits it.
    pub fn admits(&self, runtime: RuntimeVersion) -> bool {
        match self.kind {
            MarkerKind::Minimum => runtime >= self.bound,
            MarkerKind::Maximum => runtime <= self.bound,
        }
    }
}

/// Immutable table of minimum and maximum markers.
#[derive(Debug, Clone, Default)]
pub struct MarkerTable {
    min: Vec<VersionMarker>,
    max: Vec<VersionMarker>,
}

impl MarkerTable {
    /// Register markers for `versions` in `registry` and return the resulting table.
    ///
    /// ## Parameters
    /// - `registry`: the option registry examples are parsed against.
    /// - `versions`: the versions to create markers for; duplicates are ignored.
    ///
    /// ## Returns
    /// - (`MarkerTable`): minimum markers (`PYTHON*` first, then `PYMIN*`) and maximum markers (`PYMAX*`), each in
    ///   `versions` order.
    pub fn register(registry: &mut OptionRegistry, versions: &[RuntimeVersion]) -> Self {
        let mut unique: Vec<RuntimeVersion> = Vec::with_capacity(versions.len());
        for version in versions.iter().map(|v| v.line()) {
            if !unique.contains(&version) {
                unique.push(version);
            }
        }

        let mut table = MarkerTable::default();
        for prefix in ["PYTHON", "PYMIN"] {
            for &version in &unique {
                let name = marker_name(prefix, version);
                let flag = registry.register(&name);
                table.min.push(VersionMarker {
                    name,
                    flag,
                    kind: MarkerKind::Minimum,
                    bound: version,
                });
            }
        }
        for &version in &unique {
            let name = marker_name("PYMAX", version);
            let flag = registry.register(&name);
            table.max.push(VersionMarker {
                name,
                flag,
                kind: MarkerKind::Maximum,
                bound: version,
            });
        }
        table
    }

    /// Register the markers for [`STANDARD_VERSIONS`].
    pub fn standard(registry: &mut OptionRegistry) -> Self {
        Self::register(registry, STANDARD_VERSIONS)
    }

    pub fn min_markers(&self) -> &[VersionMarker] {
        &self.min
    }

    pub fn max_markers(&self) -> &[VersionMarker] {
        &self.max
    }

    /// All markers, minimum table first.
    pub fn iter(&self) -> impl Iterator<Item = &VersionMarker> {
        self.min.iter().chain(self.max.iter())
    }

    pub fn get(&self, name: &str) -> Option<&VersionMarker> {
        self.iter().find(|m| m.name == name)
    }

    pub fn len(&self) -> usize {
        self.min.len() + self.max.len()
    }

    pub fn is_empty(&self) -> bool {
        self.min.is_empty() && self.max.is_empty()
    }
}

fn marker_name(prefix: &str, version: RuntimeVersion) -> String {
    format!("{prefix}{}.{}", version.major, version.minor)
}
