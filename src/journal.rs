//! Append-only JSON-lines journal.
//!
//! One serialized value per line, flushed and synced per append. On open
//! an unterminated final line is treated as an interrupted append: it is
//! cut off and the journal continues from the last complete line.
//! Unreadable lines anywhere else fail the open.

use crate::core::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

pub(crate) struct Journal {
    path: PathBuf,
    file: File,
}

impl Journal {
    /// Open (or create) the journal and read back every complete entry.
    pub(crate) fn open<T: DeserializeOwned>(path: &Path) -> Result<(Self, Vec<T>)> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::Storage(format!("failed to create {}: {}", parent.display(), e))
                })?;
            }
        }

        let entries = if path.exists() {
            Self::replay(path, true)?
        } else {
            Vec::new()
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| Error::Storage(format!("failed to open {}: {}", path.display(), e)))?;

        Ok((
            Self {
                path: path.to_path_buf(),
                file,
            },
            entries,
        ))
    }

    /// Read every complete entry without opening the journal for writing.
    /// An unterminated final line is skipped and the file is left as is.
    pub(crate) fn read<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
        Self::replay(path, false)
    }

    /// Append one entry and sync it to disk.
    pub(crate) fn append<T: Serialize>(&mut self, entry: &T) -> Result<()> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');
        self.file
            .write_all(&line)
            .and_then(|_| self.file.flush())
            .and_then(|_| self.file.sync_data())
            .map_err(|e| Error::Storage(format!("failed to append to {}: {}", self.path.display(), e)))
    }

    fn replay<T: DeserializeOwned>(path: &Path, repair: bool) -> Result<Vec<T>> {
        let bytes = std::fs::read(path)
            .map_err(|e| Error::Storage(format!("failed to read {}: {}", path.display(), e)))?;

        let mut entries = Vec::new();
        let mut offset = 0usize;
        let mut line_no = 0usize;

        while offset < bytes.len() {
            line_no += 1;
            let (line, next, terminated) = match bytes[offset..].iter().position(|&b| b == b'\n') {
                Some(end) => (&bytes[offset..offset + end], offset + end + 1, true),
                None => (&bytes[offset..], bytes.len(), false),
            };

            if line.iter().all(u8::is_ascii_whitespace) {
                offset = next;
                continue;
            }

            match serde_json::from_slice::<T>(line) {
                Ok(entry) => {
                    entries.push(entry);
                    if !terminated && repair {
                        // complete value whose newline never made it to disk
                        Self::terminate_last_line(path)?;
                    }
                }
                Err(e) if !terminated => {
                    warn!(
                        path = %path.display(),
                        line = line_no,
                        dropped_bytes = line.len(),
                        error = %e,
                        "skipping interrupted append at end of journal"
                    );
                    if repair {
                        Self::truncate_to(path, offset as u64)?;
                    }
                }
                Err(e) => {
                    return Err(Error::Storage(format!(
                        "{} line {} is unreadable: {}",
                        path.display(),
                        line_no,
                        e
                    )));
                }
            }
            offset = next;
        }

        Ok(entries)
    }

    fn truncate_to(path: &Path, len: u64) -> Result<()> {
        let file = OpenOptions::new()
            .write(true)
            .open(path)
            .and_then(|file| file.set_len(len).map(|_| file))
            .map_err(|e| repair_error(path, e))?;
        file.sync_data().map_err(|e| repair_error(path, e))
    }

    fn terminate_last_line(path: &Path) -> Result<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|e| repair_error(path, e))?;
        file.write_all(b"\n")
            .and_then(|_| file.sync_data())
            .map_err(|e| repair_error(path, e))
    }
}

fn repair_error(path: &Path, e: std::io::Error) -> Error {
    Error::Storage(format!("failed to repair {}: {}", path.display(), e))
}
