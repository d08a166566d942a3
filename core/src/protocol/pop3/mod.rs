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

//! POP3 client: greeting check, single-line commands, dot-terminated multi-line replies.

mod client;

pub use client::{parse_status_line, Pop3Session, StatResponse, Status};

use std::io;
use thiserror::Error;

/// Failure of one POP3 exchange.
#[derive(Debug, Error)]
pub enum Pop3Error {
    /// Dial, TLS, read/write, EOF or timeout. The session is unusable afterwards.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),
    /// Reply did not follow the line grammar. The session is unusable afterwards.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// Negative (`-ERR`) reply from the server.
    #[error("server error: {0}")]
    Server(String),
}

impl Pop3Error {
    /// True when the session can still carry commands after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Pop3Error::Server(_))
    }

    /// True for a transport error caused by the I/O timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Pop3Error::Transport(e) if e.kind() == io::ErrorKind::TimedOut)
    }
}
