/*
 * mod.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of m2m, a POP3 to Maildir fetcher.
 *
 * m2m is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * m2m is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with m2m.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Maildir delivery: write into `tmp/`, then rename into `new/`.
//!
//! A message becomes visible only through the rename. A crash between the
//! two steps leaves at most an orphaned file in `tmp/`. The `tmp` and `new`
//! directories must already exist.

mod filename;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

/// Message could not be stored. Nothing is visible in `new/` when this is returned.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("cannot generate unique name: {0}")]
    UniqueName(String),
    #[error("delivery interrupted: {0}")]
    Interrupted(String),
    #[error("cannot {op} {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn io_error<'a>(
    op: &'static str,
    path: &'a Path,
) -> impl FnOnce(io::Error) -> DeliveryError + 'a {
    move |source| DeliveryError::Io {
        op,
        path: path.to_path_buf(),
        source,
    }
}

/// Create `path` with mode 0o600 (owner read/write), failing if it exists.
fn open_message_file_for_write(path: &Path) -> io::Result<fs::File> {
    #[cfg(unix)]
    {
        fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(path)
    }
    #[cfg(not(unix))]
    {
        fs::OpenOptions::new().write(true).create_new(true).open(path)
    }
}

/// Message written and synced under `tmp/`, not yet visible.
#[derive(Debug)]
pub struct StagedMessage {
    name: String,
    tmp_path: PathBuf,
    new_path: PathBuf,
}

impl StagedMessage {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tmp_path(&self) -> &Path {
        &self.tmp_path
    }

    /// Rename into `new/`. On failure the staged file is removed.
    pub fn commit(self) -> Result<PathBuf, DeliveryError> {
        if let Err(e) = fs::rename(&self.tmp_path, &self.new_path) {
            let _ = fs::remove_file(&self.tmp_path);
            return Err(io_error("rename into", &self.new_path)(e));
        }
        Ok(self.new_path)
    }
}

/// Write `bytes` to `<root>/tmp/<unique>` and fsync it.
pub fn stage(root: &Path, bytes: &[u8]) -> Result<StagedMessage, DeliveryError> {
    let name = filename::unique_name().map_err(|e| DeliveryError::UniqueName(e.to_string()))?;
    let tmp_path = root.join("tmp").join(&name);
    let new_path = root.join("new").join(&name);
    let mut file = open_message_file_for_write(&tmp_path).map_err(io_error("create", &tmp_path))?;
    let written = file.write_all(bytes).and_then(|()| file.sync_all());
    drop(file);
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(io_error("write", &tmp_path)(e));
    }
    Ok(StagedMessage {
        name,
        tmp_path,
        new_path,
    })
}

/// Store one message; returns its path under `new/`.
pub fn deliver(root: &Path, bytes: &[u8]) -> Result<PathBuf, DeliveryError> {
    stage(root, bytes)?.commit()
}
