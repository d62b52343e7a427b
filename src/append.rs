//! One-row-per-open CSV appends. Each `append` opens the target, writes a single
//! record (plus the header when the file is new), flushes and closes, so a crash
//! loses at most the row in flight.

use crate::util::append_with_backoff;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

pub struct CsvAppender<R> {
    path: PathBuf,
    rows: u64,
    _row: PhantomData<fn(&R)>,
}

impl<R: Serialize> CsvAppender<R> {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf(), rows: 0, _row: PhantomData }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows appended through this handle (not counting rows already on disk).
    pub fn rows_written(&self) -> u64 {
        self.rows
    }

    pub fn append(&mut self, row: &R) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
            }
        }
        let file = append_with_backoff(&self.path, 16, 50)
            .with_context(|| format!("open for append {}", self.path.display()))?;
        let is_new = file.metadata().map(|m| m.len() == 0).unwrap_or(true);

        let mut w = csv::WriterBuilder::new().has_headers(is_new).from_writer(file);
        w.serialize(row).with_context(|| format!("write row to {}", self.path.display()))?;
        let mut inner = w.into_inner().map_err(|e| anyhow::anyhow!("flush {}: {}", self.path.display(), e.error()))?;
        inner.flush()?;
        self.rows += 1;
        Ok(())
    }

    /// Append several rows under a single open (used for classifier batches).
    pub fn append_batch(&mut self, rows: &[R]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
            }
        }
        let file = append_with_backoff(&self.path, 16, 50)
            .with_context(|| format!("open for append {}", self.path.display()))?;
        let is_new = file.metadata().map(|m| m.len() == 0).unwrap_or(true);

        let mut w = csv::WriterBuilder::new().has_headers(is_new).from_writer(file);
        for row in rows {
            w.serialize(row).with_context(|| format!("write row to {}", self.path.display()))?;
        }
        w.flush()?;
        self.rows += rows.len() as u64;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Row<'a> {
        users: &'a str,
    }

    #[test]
    fn header_written_once_then_rows_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("users.csv");

        let mut a = CsvAppender::<Row>::new(&path);
        a.append(&Row { users: "alice" }).unwrap();
        a.append(&Row { users: "bob" }).unwrap();

        // a second handle on the same file must not repeat the header
        let mut b = CsvAppender::<Row>::new(&path);
        b.append_batch(&[Row { users: "carol" }, Row { users: "dave" }]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "users\nalice\nbob\ncarol\ndave\n");
        assert_eq!(a.rows_written(), 2);
        assert_eq!(b.rows_written(), 2);
    }
}
