//! Scratch source files for documentation-engine tests
//!
//! A [`ScratchFile`] is a dedented source snippet written into its own fresh temporary directory. Cleanup is
//! explicit: [`ScratchFile::cleanup`] removes the file, then any compiled byproducts, optionally every other file the
//! engine left behind, and finally the directory itself. A scratch file that is dropped without cleanup still has
//! its directory removed by the [`TempDir`] guard.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use docgate_core::text::{coding_cookie, dedent};
use tempfile::TempDir;
use thiserror::Error;

/// File name used when the caller does not pick one.
pub const DEFAULT_FILE_NAME: &str = "docgate_test.py";
/// Directory interpreters put compiled byproducts in.
const BYTECODE_DIR: &str = "__pycache__";

#[derive(Debug, Error)]
pub enum ScratchError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("unknown source encoding '{0}'")]
    UnknownEncoding(String),

    #[error("character {ch:?} cannot be encoded as {encoding}")]
    Unencodable { encoding: String, ch: char },

    #[error("expected '{}' to be a file within a scratch directory", .0.display())]
    NotAFile(PathBuf),
}

/// Encodings a scratch file can be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEncoding {
    Utf8,
    Ascii,
    Latin1,
}

impl SourceEncoding {
    /// Look up an encoding by one of its common names (case-insensitive, `_` and `-` interchangeable).
    pub fn from_name(name: &str) -> Result<Self, ScratchError> {
        let normalized = name.to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "ascii" | "us-ascii" => Ok(Self::Ascii),
            "latin-1" | "latin1" | "iso-8859-1" | "iso8859-1" => Ok(Self::Latin1),
            _ => Err(ScratchError::UnknownEncoding(name.to_string())),
        }
    }

    /// The encoding declared by a coding cookie in `text`, defaulting to UTF-8.
    pub fn detect(text: &str) -> Result<Self, ScratchError> {
        coding_cookie(text).map_or(Ok(Self::Utf8), Self::from_name)
    }

    pub fn encode(self, text: &str) -> Result<Vec<u8>, ScratchError> {
        let limit = match self {
            Self::Utf8 => return Ok(text.as_bytes().to_vec()),
            Self::Ascii => 0x7f,
            Self::Latin1 => 0xff,
        };
        text.chars()
            .map(|ch| {
                u8::try_from(u32::from(ch))
                    .ok()
                    .filter(|&b| u32::from(b) <= limit)
                    .ok_or_else(|| ScratchError::Unencodable {
                        encoding: self.name().to_string(),
                        ch,
                    })
            })
            .collect()
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Ascii => "ascii",
            Self::Latin1 => "latin-1",
        }
    }
}

/// A source file in its own temporary directory.
#[derive(Debug)]
pub struct ScratchFile {
    dir: TempDir,
    path: PathBuf,
}

impl ScratchFile {
    /// Write `source` as [`DEFAULT_FILE_NAME`], in the encoding its coding cookie declares.
    pub fn write(source: &str) -> Result<Self, ScratchError> {
        Self::write_named(source, DEFAULT_FILE_NAME, None)
    }

    /// Write dedented `source` to `file_name` inside a fresh temporary directory.
    ///
    /// ## Parameters
    /// - `encoding`: the output encoding; when `None` it is taken from the source's coding cookie (UTF-8 if absent).
    pub fn write_named(source: &str, file_name: &str, encoding: Option<SourceEncoding>) -> Result<Self, ScratchError> {
        let encoding = match encoding {
            Some(encoding) => encoding,
            None => SourceEncoding::detect(source)?,
        };
        let bytes = encoding.encode(&dedent(source))?;

        let dir = tempfile::Builder::new().prefix("docgate").tempdir()?;
        let path = dir.path().join(file_name);
        fs::write(&path, bytes)?;
        tracing::debug!(path = %path.display(), encoding = encoding.name(), "wrote scratch file");
        Ok(Self { dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the file, its compiled byproducts and the directory.
    ///
    /// ## Parameters
    /// - `clean_remaining_files`: also delete any other plain files in the directory (engine output); otherwise a
    ///   non-empty directory makes the final removal fail.
    pub fn cleanup(self, clean_remaining_files: bool) -> Result<(), ScratchError> {
        if !self.path.is_file() {
            return Err(ScratchError::NotAFile(self.path.clone()));
        }
        fs::remove_file(&self.path)?;

        // Byproducts may or may not exist.
        let dir = self.dir.path();
        let _ = fs::remove_dir_all(dir.join(BYTECODE_DIR));
        if let Some(stem) = self.path.file_stem() {
            let mut compiled = stem.to_os_string();
            compiled.push(".pyc");
            let _ = fs::remove_file(dir.join(compiled));
        }

        if clean_remaining_files {
            for entry in fs::read_dir(dir)? {
                let path = entry?.path();
                if path.is_file() {
                    fs::remove_file(&path)?;
                }
            }
        }

        fs::remove_dir(dir)?;
        Ok(())
    }
}
