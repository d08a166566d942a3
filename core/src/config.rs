/*
 * config.rs
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

//! Account configuration: one JSON file per account in the accounts directory.
//!
//! The account identifier is the file stem (`work.json` is account `work`).
//! Field names and defaults:
//!
//! | field         | default              |
//! |---------------|----------------------|
//! | `username`    | required             |
//! | `password`    | required             |
//! | `tlsdomain`   | required if `tls`    |
//! | `port`        | 995                  |
//! | `entryserver` | `tlsdomain`          |
//! | `proxyport`   | none (direct dial)   |
//! | `tls`         | true                 |
//! | `timeout`     | 200 (seconds)        |
//! | `keep`        | false                |
//! | `maildir`     | `~/Maildir`          |
//! | `active`      | true                 |

use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 995;
pub const DEFAULT_TIMEOUT_SECS: u64 = 200;
const ACCOUNT_FILE_EXTENSION: &str = "json";

/// Invalid or unreadable account configuration. Reported per account, before any network I/O.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot parse {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("missing field `{0}`")]
    Missing(&'static str),
    #[error("invalid field `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// On-disk form. Every field optional so defaults apply here rather than in serde.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AccountFile {
    username: Option<String>,
    password: Option<String>,
    tlsdomain: Option<String>,
    port: Option<u16>,
    entryserver: Option<String>,
    proxyport: Option<String>,
    tls: Option<bool>,
    timeout: Option<u64>,
    keep: Option<bool>,
    maildir: Option<String>,
    active: Option<bool>,
}

/// Resolved, immutable configuration of one account.
#[derive(Debug, Clone)]
pub struct AccountConfig {
    pub id: String,
    pub username: String,
    pub password: String,
    /// Certificate name checked during the TLS handshake; also the default dial host.
    pub tls_domain: Option<String>,
    pub port: u16,
    /// Dial host override; `tls_domain` is still used for certificate validation.
    pub entry_server: Option<String>,
    /// SOCKS5 proxy as `host:port`.
    pub proxy: Option<String>,
    pub tls: bool,
    pub timeout: Duration,
    pub keep: bool,
    pub maildir: PathBuf,
    pub active: bool,
}

/// Default accounts directory: `<config dir>/m2m/accounts`.
pub fn default_accounts_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("m2m").join("accounts"))
}

/// Default Maildir root: `~/Maildir`.
pub fn default_maildir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join("Maildir"))
}

fn expand_home(path: &str) -> Result<PathBuf, ConfigError> {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map(|h| h.join(rest)).ok_or(ConfigError::Invalid {
            field: "maildir",
            reason: "cannot expand ~ without a home directory".to_string(),
        }),
        None => Ok(PathBuf::from(path)),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

impl AccountConfig {
    /// Account with every optional field at its default.
    pub fn new(
        id: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        maildir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            password: password.into(),
            tls_domain: None,
            port: DEFAULT_PORT,
            entry_server: None,
            proxy: None,
            tls: true,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            keep: false,
            maildir: maildir.into(),
            active: true,
        }
    }

    /// Parse the JSON text of account `id`.
    pub fn from_json(id: &str, text: &str) -> Result<Self, ConfigError> {
        let file: AccountFile = serde_json::from_str(text).map_err(|e| ConfigError::Parse {
            origin: id.to_string(),
            source: e,
        })?;
        let username = file.username.ok_or(ConfigError::Missing("username"))?;
        let password = file.password.ok_or(ConfigError::Missing("password"))?;
        let maildir = match file.maildir {
            Some(m) => expand_home(&m)?,
            None => default_maildir().ok_or(ConfigError::Missing("maildir"))?,
        };
        Ok(Self {
            id: id.to_string(),
            username,
            password,
            tls_domain: non_empty(file.tlsdomain),
            port: file.port.unwrap_or(DEFAULT_PORT),
            entry_server: non_empty(file.entryserver),
            proxy: non_empty(file.proxyport),
            tls: file.tls.unwrap_or(true),
            timeout: Duration::from_secs(file.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            keep: file.keep.unwrap_or(false),
            maildir,
            active: file.active.unwrap_or(true),
        })
    }

    /// Read `<dir>/<id>.json`.
    pub fn load(dir: &Path, id: &str) -> Result<Self, ConfigError> {
        check_account_id(id)?;
        let path = dir.join(format!("{}.{}", id, ACCOUNT_FILE_EXTENSION));
        let text = fs::read_to_string(&path).map_err(|e| ConfigError::Io {
            path: path.clone(),
            source: e,
        })?;
        Self::from_json(id, &text)
    }

    /// Host to dial: `entry_server` if set, else `tls_domain`.
    pub fn dial_host(&self) -> Option<&str> {
        self.entry_server.as_deref().or(self.tls_domain.as_deref())
    }

    /// Check the fields a session needs. Runs before the lock is taken or any socket opened.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_account_id(&self.id)?;
        if self.username.trim().is_empty() {
            return Err(ConfigError::Missing("username"));
        }
        if self.tls && self.tls_domain.as_deref().map_or(true, |d| d.trim().is_empty()) {
            return Err(ConfigError::Missing("tlsdomain"));
        }
        if self.dial_host().is_none() {
            return Err(ConfigError::Missing("entryserver"));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid {
                field: "port",
                reason: "must be between 1 and 65535".to_string(),
            });
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::Invalid {
                field: "timeout",
                reason: "must be at least one second".to_string(),
            });
        }
        if self.maildir.as_os_str().is_empty() {
            return Err(ConfigError::Missing("maildir"));
        }
        Ok(())
    }
}

/// An identifier names a file in the accounts and lock directories, so it must
/// be a plain file-name component.
pub fn check_account_id(id: &str) -> Result<(), ConfigError> {
    let reason = if id.is_empty() {
        "must not be empty"
    } else if id.starts_with('.') {
        "must not start with '.'"
    } else if id.contains(['/', '\\', '\0']) {
        "must not contain path separators"
    } else {
        return Ok(());
    };
    Err(ConfigError::Invalid {
        field: "account",
        reason: reason.to_string(),
    })
}

/// Account identifiers found in `dir` (stems of `*.json` files), sorted.
pub fn list_accounts(dir: &Path) -> Result<Vec<String>, ConfigError> {
    let io_err = |e| ConfigError::Io {
        path: dir.to_path_buf(),
        source: e,
    };
    let mut ids = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some(ACCOUNT_FILE_EXTENSION) {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            if !stem.starts_with('.') {
                ids.push(stem.to_string());
            }
        }
    }
    ids.sort();
    Ok(ids)
}
