//! Runtime versions used by the version gate.

use std::fmt;
use std::str::FromStr;

/// Represent the version of the runtime the examples execute against.
///
/// Ordering is lexicographic on `(major, minor, patch)`, so `3.10 > 3.9`. A version without a patch level sorts
/// before every patch release of the same line: `3.6 < 3.6.0 < 3.6.9`. Marker bounds are always two-part, so an
/// upper bound of `3.6` admits a bare `3.6` runtime but not a probed `3.6.9` one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RuntimeVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: Option<u32>,
}

/// Error returned when no `major.minor` pair can be found in a version string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionParseError {
    pub input: String,
}

impl fmt::Display for VersionParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no `major.minor` version found in {:?}", self.input)
    }
}

impl std::error::Error for VersionParseError {}

impl RuntimeVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self {
            major,
            minor,
            patch: None,
        }
    }

    pub const fn with_patch(self, patch: u32) -> Self {
        Self {
            patch: Some(patch),
            ..self
        }
    }

    /// The same version without its patch level.
    pub const fn line(self) -> Self {
        Self::new(self.major, self.minor)
    }

    /// Parse the first `digits.digits` group found in `text`, plus a directly following `.digits` patch level.
    ///
    /// ## Parameters
    /// - `text`: a bare version (`3.7`, `3.11.4`) or a tool banner (`Python 3.11.4`, `GNU bash, version 5.2.15`).
    ///
    /// ## Examples
    /// ```rust
    /// use docgate_core::RuntimeVersion;
    ///
    /// assert_eq!(RuntimeVersion::parse("Python 3.11.4").unwrap(), RuntimeVersion::new(3, 11).with_patch(4));
    /// assert_eq!(RuntimeVersion::parse("3.7").unwrap(), RuntimeVersion::new(3, 7));
    /// assert!(RuntimeVersion::parse("no digits here").is_err());
    /// ```
    pub fn parse(text: &str) -> Result<Self, VersionParseError> {
        let bytes = text.as_bytes();
        let digits_end = |mut at: usize| {
            while at < bytes.len() && bytes[at].is_ascii_digit() {
                at += 1;
            }
            at
        };
        let dotted_digits_at = |at: usize| at + 1 < bytes.len() && bytes[at] == b'.' && bytes[at + 1].is_ascii_digit();

        let mut i = 0;
        while i < bytes.len() {
            if !bytes[i].is_ascii_digit() {
                i += 1;
                continue;
            }
            let major_start = i;
            let major_end = digits_end(i);
            i = major_end;
            if !dotted_digits_at(major_end) {
                continue;
            }
            let minor_start = major_end + 1;
            let minor_end = digits_end(minor_start);
            let major = text[major_start..major_end].parse::<u32>();
            let minor = text[minor_start..minor_end].parse::<u32>();
            if let (Ok(major), Ok(minor)) = (major, minor) {
                let mut version = Self::new(major, minor);
                if dotted_digits_at(minor_end) {
                    let patch_start = minor_end + 1;
                    if let Ok(patch) = text[patch_start..digits_end(patch_start)].parse::<u32>() {
                        version = version.with_patch(patch);
                    }
                }
                return Ok(version);
            }
            i = minor_end;
        }
        Err(VersionParseError {
            input: text.to_string(),
        })
    }
}

impl FromStr for RuntimeVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RuntimeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)?;
        if let Some(patch) = self.patch {
            write!(f, ".{patch}")?;
        }
        Ok(())
    }
}

impl From<(u32, u32)> for RuntimeVersion {
    fn from((major, minor): (u32, u32)) -> Self {
        Self::new(major, minor)
    }
}

impl From<(u32, u32, u32)> for RuntimeVersion {
    fn from((major, minor, patch): (u32, u32, u32)) -> Self {
        Self::new(major, minor).with_patch(patch)
    }
}
