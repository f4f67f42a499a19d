//! Reads repository files as UTF-8 text.
//!
//! Oversized files, files containing NUL bytes, and files that are not
//! valid UTF-8 are rejected with a [`ReadError`]; the ingestion loop skips
//! them.

use std::fs;
use std::path::PathBuf;

use codepilot_core::ingest::FileReader;
use codepilot_core::ReadError;

/// [`FileReader`] over a repository root on disk.
#[derive(Debug, Clone)]
pub struct FsReader {
    root: PathBuf,
    max_bytes: u64,
}

impl FsReader {
    pub fn new(root: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            root: root.into(),
            max_bytes,
        }
    }
}

impl FileReader for FsReader {
    fn read(&self, path: &str) -> Result<String, ReadError> {
        let full = self.root.join(path);
        let size = fs::metadata(&full)?.len();
        if size > self.max_bytes {
            return Err(ReadError::TooLarge {
                size,
                limit: self.max_bytes,
            });
        }
        let bytes = fs::read(&full)?;
        decode(bytes)
    }
}

fn decode(bytes: Vec<u8>) -> Result<String, ReadError> {
    if bytes.contains(&0) {
        return Err(ReadError::Undecodable);
    }
    let mut text = String::from_utf8(bytes).map_err(|_| ReadError::Undecodable)?;
    if text.starts_with('\u{feff}') {
        text.drain(..'\u{feff}'.len_utf8());
    }
    Ok(text)
}
