//! # Durable Append-Only Log
//!
//! A length-prefixed frame sequence on disk: each frame is a little-endian
//! `u32` length followed by the JSON encoding of one [`LogEntry`]. Appends
//! are flushed with `sync_all` before success is reported; a torn trailing
//! frame from a crash is detected and rejected at open.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::RevocationError;
use crate::record::LogEntry;

/// Upper bound on a single frame, to catch corrupt length prefixes.
const MAX_FRAME_BYTES: u32 = 1 << 20;

/// Handle on one credential type's log file.
#[derive(Debug)]
pub struct RevocationLog {
    file: File,
    path: PathBuf,
}

impl RevocationLog {
    /// Open (creating if absent) and replay the log at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<(Self, Vec<LogEntry>), RevocationError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)?;

        let entries = Self::replay(&file)?;
        tracing::debug!(
            path = %path.display(),
            entries = entries.len(),
            "revocation log opened"
        );
        Ok((Self { file, path }, entries))
    }

    /// Append one entry and flush it to stable storage.
    pub fn append(&mut self, entry: &LogEntry) -> Result<(), RevocationError> {
        let payload = serde_json::to_vec(entry)?;
        let len = u32::try_from(payload.len()).map_err(|_| {
            RevocationError::CorruptLog("entry exceeds frame size".to_string())
        })?;
        if len > MAX_FRAME_BYTES {
            return Err(RevocationError::CorruptLog(
                "entry exceeds frame size".to_string(),
            ));
        }
        self.file.write_all(&len.to_le_bytes())?;
        self.file.write_all(&payload)?;
        self.file.sync_all()?;
        Ok(())
    }

    /// The file path backing this log.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn replay(file: &File) -> Result<Vec<LogEntry>, RevocationError> {
        let mut reader = BufReader::new(file.try_clone()?);
        let mut entries = Vec::new();
        loop {
            let mut len_bytes = [0u8; 4];
            match reader.read_exact(&mut len_bytes) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }
            let len = u32::from_le_bytes(len_bytes);
            if len > MAX_FRAME_BYTES {
                return Err(RevocationError::CorruptLog(format!(
                    "frame length {len} exceeds limit"
                )));
            }
            let mut payload = vec![0u8; len as usize];
            reader.read_exact(&mut payload).map_err(|e| {
                if e.kind() == std::io::ErrorKind::UnexpectedEof {
                    RevocationError::CorruptLog("truncated trailing frame".to_string())
                } else {
                    e.into()
                }
            })?;
            entries.push(serde_json::from_slice(&payload)?);
        }
        Ok(entries)
    }
}
