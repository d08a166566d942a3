/*
 * lock.rs
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

//! Per-account lock marker: `<lock dir>/m2m-<account>.lock`.
//!
//! The marker is created with `create_new`, so its existence test and creation
//! are one atomic step. It is removed when the guard drops, which covers
//! normal return, early error return and unwinding. A process killed outright
//! leaves the marker behind; it must then be removed by hand.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::warn;

/// Marker path for `account` in `lock_dir`.
pub fn lock_path(lock_dir: &Path, account: &str) -> PathBuf {
    lock_dir.join(format!("m2m-{}.lock", account))
}

/// Held lock on one account. Dropping it removes the marker.
#[derive(Debug)]
pub struct AccountLock {
    path: PathBuf,
}

impl AccountLock {
    /// Take the lock. `Ok(None)` when another run already holds it.
    pub fn acquire(lock_dir: &Path, account: &str) -> io::Result<Option<Self>> {
        let path = lock_path(lock_dir, account);
        let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(None),
            Err(e) => return Err(e),
        };
        let lock = Self { path };
        writeln!(file, "{}", std::process::id())?;
        Ok(Some(lock))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for AccountLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("cannot remove lock {}: {}", self.path.display(), e);
        }
    }
}
