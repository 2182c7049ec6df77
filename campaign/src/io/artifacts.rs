//! Artifact writers: append-only line streams and write-once documents.
//!
//! Both styles go through [`stable_json`], so identical logical content is
//! written as identical bytes.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

use crate::core::stable_json;

/// Line-delimited JSON stream (`.jsonl`).
///
/// Every record is flushed before [`append`](Self::append) returns, so a crash
/// in a later turn never leaves a half-written line behind. Closing consumes
/// the writer; a stream is closed at most once.
pub struct JsonlWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    lines: usize,
}

impl JsonlWriter {
    /// Create (or truncate) the stream file.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            lines: 0,
        })
    }

    pub fn append<T: Serialize>(&mut self, record: &T) -> Result<()> {
        let line = stable_json::to_line(record)?;
        self.writer
            .write_all(line.as_bytes())
            .and_then(|()| self.writer.write_all(b"\n"))
            .and_then(|()| self.writer.flush())
            .with_context(|| format!("write {}", self.path.display()))?;
        self.lines += 1;
        Ok(())
    }

    pub fn lines(&self) -> usize {
        self.lines
    }

    /// Flush and sync. Returns the number of lines written.
    pub fn close(mut self) -> Result<usize> {
        self.writer
            .flush()
            .with_context(|| format!("flush {}", self.path.display()))?;
        self.writer
            .get_ref()
            .sync_all()
            .with_context(|| format!("sync {}", self.path.display()))?;
        debug!(path = %self.path.display(), lines = self.lines, "stream closed");
        Ok(self.lines)
    }
}

/// Write a canonical pretty JSON document.
pub fn write_document<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let buf = stable_json::to_document(value)?;
    write_text(path, &buf)
}

pub fn write_text(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))
}
