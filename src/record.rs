// SPDX-License-Identifier: MPL-2.0

//! The single persisted value tracking which renderer process is the wallpaper.
//!
//! The on-disk format is the decimal process id in ASCII and nothing else.
//! Its presence is the only signal that a session is active.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Mutex,
};

use tracing::debug;

use crate::{
    error::{Error, Result},
    process::Pid,
};

/// Storage for the active session's process id.
pub trait RecordStore {
    /// Where the record lives, for diagnostics.
    fn location(&self) -> &Path;

    /// `Ok(None)` when no session is recorded.
    fn read(&self) -> Result<Option<Pid>>;

    /// Record `pid`, replacing any previous record.
    fn write(&self, pid: Pid) -> Result<()>;

    /// Remove the record. Removing an absent record succeeds.
    fn clear(&self) -> Result<()>;
}

/// Parse record contents, tolerating surrounding whitespace only.
pub fn parse_record(location: &Path, contents: &str) -> Result<Pid> {
    contents
        .trim()
        .parse::<Pid>()
        .map_err(|_| Error::MalformedRecord {
            path: location.to_path_buf(),
            contents: contents.to_string(),
        })
}

/// Record kept in a plain file, by default in the temp directory.
#[derive(Debug, Clone)]
pub struct FileRecordStore {
    path: PathBuf,
}

impl FileRecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn io_error(&self, source: io::Error) -> Error {
        Error::Record {
            path: self.path.clone(),
            source,
        }
    }
}

impl RecordStore for FileRecordStore {
    fn location(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Option<Pid>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(why) if why.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(why) => return Err(self.io_error(why)),
        };

        let contents = String::from_utf8_lossy(&bytes);
        parse_record(&self.path, &contents).map(Some)
    }

    fn write(&self, pid: Pid) -> Result<()> {
        debug!(pid, path = %self.path.display(), "writing process record");
        fs::write(&self.path, pid.to_string()).map_err(|why| self.io_error(why))
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "removed process record");
                Ok(())
            }
            Err(why) if why.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(why) => Err(self.io_error(why)),
        }
    }
}

/// In-memory record holding raw contents, so malformed records can be staged.
#[derive(Debug)]
pub struct MemoryRecordStore {
    contents: Mutex<Option<String>>,
    location: PathBuf,
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self {
            contents: Mutex::new(None),
            location: PathBuf::from("<memory>"),
        }
    }

    pub fn with_contents(contents: impl Into<String>) -> Self {
        let store = Self::new();
        store.set_contents(Some(contents.into()));
        store
    }

    /// The raw record text, `None` when absent.
    pub fn contents(&self) -> Option<String> {
        self.lock().clone()
    }

    pub fn set_contents(&self, contents: Option<String>) {
        *self.lock() = contents;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.contents
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl RecordStore for MemoryRecordStore {
    fn location(&self) -> &Path {
        &self.location
    }

    fn read(&self) -> Result<Option<Pid>> {
        self.lock()
            .as_deref()
            .map(|contents| parse_record(&self.location, contents))
            .transpose()
    }

    fn write(&self, pid: Pid) -> Result<()> {
        self.set_contents(Some(pid.to_string()));
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.set_contents(None);
        Ok(())
    }
}
