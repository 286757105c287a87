//! Option-flag registry for fixture examples.
//!
//! Flags are named booleans that examples switch on or off with `# doctest: +NAME -NAME` comments. The registry
//! starts with the built-in checker/reporting flags and accepts custom registrations (the version markers are
//! registered this way by [`crate::markers::MarkerTable::register`]).
//!
//! ## Notes
//! - Registration is idempotent: registering an existing name returns the flag already assigned to it.
//! - Flag identity is the registry index, so flags from different registries must not be mixed.

use std::collections::{BTreeMap, BTreeSet};

/// Identify a registered option flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OptionFlag(u16);

impl OptionFlag {
    /// `...` in expected output matches any substring.
    pub const ELLIPSIS: OptionFlag = OptionFlag(0);
    /// All runs of whitespace compare equal.
    pub const NORMALIZE_WHITESPACE: OptionFlag = OptionFlag(1);
    /// `<BLANKLINE>` is taken literally instead of meaning an empty line.
    pub const DONT_ACCEPT_BLANKLINE: OptionFlag = OptionFlag(2);
    /// Do not run the example at all.
    pub const SKIP: OptionFlag = OptionFlag(3);
    /// Report mismatches as unified diffs.
    pub const REPORT_UDIFF: OptionFlag = OptionFlag(4);
    /// Only report the first failing example of a fixture.
    pub const REPORT_ONLY_FIRST_FAILURE: OptionFlag = OptionFlag(5);
    /// Stop running a fixture after its first failure.
    pub const FAIL_FAST: OptionFlag = OptionFlag(6);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Built-in flags in registration order; the index of each name is its [`OptionFlag`] id.
pub const BUILTIN_FLAGS: &[&str] = &[
    "ELLIPSIS",
    "NORMALIZE_WHITESPACE",
    "DONT_ACCEPT_BLANKLINE",
    "SKIP",
    "REPORT_UDIFF",
    "REPORT_ONLY_FIRST_FAILURE",
    "FAIL_FAST",
];

/// Registry mapping flag names to [`OptionFlag`] ids.
#[derive(Debug, Clone)]
pub struct OptionRegistry {
    names: Vec<String>,
}

impl Default for OptionRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl OptionRegistry {
    /// Create a registry holding the built-in flags.
    pub fn with_builtins() -> Self {
        Self {
            names: BUILTIN_FLAGS.iter().map(|name| name.to_string()).collect(),
        }
    }

    /// Register `name`, returning its flag. Re-registering a name returns the existing flag.
    pub fn register(&mut self, name: &str) -> OptionFlag {
        if let Some(flag) = self.lookup(name) {
            return flag;
        }
        let id = u16::try_from(self.names.len()).unwrap_or(u16::MAX);
        self.names.push(name.to_string());
        OptionFlag(id)
    }

    /// Find the flag registered under `name` (case-sensitive, like the fixture syntax).
    pub fn lookup(&self, name: &str) -> Option<OptionFlag> {
        self.names
            .iter()
            .position(|n| n == name)
            .and_then(|i| u16::try_from(i).ok())
            .map(OptionFlag)
    }

    /// The name a flag was registered under.
    pub fn name(&self, flag: OptionFlag) -> Option<&str> {
        self.names.get(flag.index()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// A set of enabled flags (a suite's base options, or an example's effective options).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagSet(BTreeSet<OptionFlag>);

impl FlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, flag: OptionFlag) -> Self {
        self.0.insert(flag);
        self
    }

    pub fn insert(&mut self, flag: OptionFlag) {
        self.0.insert(flag);
    }

    pub fn contains(&self, flag: OptionFlag) -> bool {
        self.0.contains(&flag)
    }

    pub fn iter(&self) -> impl Iterator<Item = OptionFlag> + '_ {
        self.0.iter().copied()
    }

    /// Apply per-example overrides: `true` enables a flag, `false` disables it.
    pub fn apply(&self, overrides: &BTreeMap<OptionFlag, bool>) -> FlagSet {
        let mut out = self.0.clone();
        for (&flag, &enabled) in overrides {
            if enabled {
                out.insert(flag);
            } else {
                out.remove(&flag);
            }
        }
        FlagSet(out)
    }
}

impl FromIterator<OptionFlag> for FlagSet {
    fn from_iter<I: IntoIterator<Item = OptionFlag>>(iter: I) -> Self {
        FlagSet(iter.into_iter().collect())
    }
}
