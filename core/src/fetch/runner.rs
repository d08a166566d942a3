/*
 * runner.rs
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

//! Fetch workflow for one account.
//!
//! Lock, connect, UTF8 (best effort), USER/PASS, STAT, then per message
//! RETR, deliver and (unless `keep`) DELE, then QUIT. The lock guard is held
//! for the whole network phase and dropped on every exit path. Nothing in
//! here returns an error to the caller: every failure ends up in the
//! [`AccountSummary`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, error, info, warn};

use super::summary::{AccountStatus, AccountSummary, DeleteOutcome, DeliveryOutcome, MessageResult};
use crate::config::AccountConfig;
use crate::localstorage::maildir::{self, DeliveryError};
use crate::lock::AccountLock;
use crate::net::{Connector, Transport};
use crate::protocol::pop3::{Pop3Error, Pop3Session};

type Session = Pop3Session<Box<dyn Transport>>;

/// Reason the workflow stopped early.
struct Abort {
    status: AccountStatus,
    error: Pop3Error,
}

impl Abort {
    /// Dial, TLS handshake or greeting failed.
    fn connect(error: Pop3Error) -> Self {
        Self {
            status: AccountStatus::ConnectionError,
            error,
        }
    }

    /// UTF8/USER/PASS/STAT failed. Only a timeout counts as a connection failure here.
    fn login(error: Pop3Error) -> Self {
        let status = if error.is_timeout() {
            AccountStatus::ConnectionError
        } else {
            AccountStatus::ProtocolError
        };
        Self { status, error }
    }

    /// Session broke while fetching messages.
    fn session(error: Pop3Error) -> Self {
        let status = match error {
            Pop3Error::Transport(_) => AccountStatus::ConnectionError,
            _ => AccountStatus::ProtocolError,
        };
        Self { status, error }
    }
}

async fn deliver_blocking(root: PathBuf, body: Vec<u8>) -> Result<PathBuf, DeliveryError> {
    tokio::task::spawn_blocking(move || maildir::deliver(&root, &body))
        .await
        .unwrap_or_else(|e| Err(DeliveryError::Interrupted(e.to_string())))
}

/// Runs the fetch workflow for one account.
pub struct AccountRunner {
    account: AccountConfig,
    connector: Arc<dyn Connector>,
    lock_dir: PathBuf,
}

impl AccountRunner {
    pub fn new(
        account: AccountConfig,
        connector: Arc<dyn Connector>,
        lock_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            account,
            connector,
            lock_dir: lock_dir.into(),
        }
    }

    pub fn account(&self) -> &AccountConfig {
        &self.account
    }

    /// Run to completion and report. Never fails; failures are in the summary status.
    pub async fn run(self) -> AccountSummary {
        let started = Instant::now();
        let id = self.account.id.clone();
        let mut summary = AccountSummary::new(&id, AccountStatus::Ok);

        if !self.account.active {
            info!("[{}] account inactive, skipping", id);
            summary.status = AccountStatus::SkippedInactive;
        } else if let Err(e) = self.account.validate() {
            error!("[{}] configuration error: {}", id, e);
            summary.status = AccountStatus::ConfigurationError;
            summary.error = Some(e.to_string());
        } else {
            match AccountLock::acquire(&self.lock_dir, &id) {
                Ok(None) => {
                    warn!("[{}] locked by another run, skipping", id);
                    summary.status = AccountStatus::SkippedLocked;
                }
                Err(e) => {
                    error!("[{}] cannot create lock in {}: {}", id, self.lock_dir.display(), e);
                    summary.status = AccountStatus::ConfigurationError;
                    summary.error = Some(format!("cannot create lock: {}", e));
                }
                Ok(Some(lock)) => {
                    let outcome = self.fetch(&mut summary).await;
                    drop(lock);
                    if let Err(abort) = outcome {
                        error!("[{}] {}: {}", id, abort.status, abort.error);
                        summary.status = abort.status;
                        summary.error = Some(abort.error.to_string());
                    }
                }
            }
        }

        summary.elapsed = started.elapsed();
        info!("{}", summary);
        summary
    }

    async fn fetch(&self, summary: &mut AccountSummary) -> Result<(), Abort> {
        let id = &self.account.id;
        let stream = self
            .connector
            .connect(&self.account)
            .await
            .map_err(|e| Abort::connect(Pop3Error::Transport(e)))?;
        let mut session = Pop3Session::open(stream, Some(self.account.timeout), id.as_str())
            .await
            .map_err(Abort::connect)?;
        debug!("[{}] connected: {}", id, session.greeting());

        match session.utf8().await {
            Ok(_) => {}
            Err(e) if e.is_recoverable() => debug!("[{}] UTF8 refused: {}", id, e),
            Err(e) => return Err(Abort::login(e)),
        }
        session
            .login(&self.account.username, &self.account.password)
            .await
            .map_err(Abort::login)?;
        let stat = session.stat().await.map_err(Abort::login)?;
        summary.message_count = stat.count;
        summary.mailbox_size = stat.total_size;
        info!(
            "[{}] {} message(s) of total size {} bytes",
            id, stat.count, stat.total_size
        );

        for index in 1..=stat.count {
            let (record, fatal) = self.fetch_one(&mut session, index, stat.count).await;
            summary.messages.push(record);
            if let Some(e) = fatal {
                return Err(Abort::session(e));
            }
        }

        if let Err(e) = session.quit().await {
            debug!("[{}] QUIT failed: {}", id, e);
        }
        Ok(())
    }

    /// RETR, deliver, DELE for one message. The error is returned only when
    /// the session is unusable.
    async fn fetch_one(
        &self,
        session: &mut Session,
        index: u32,
        count: u32,
    ) -> (MessageResult, Option<Pop3Error>) {
        let id = &self.account.id;
        let mut record = MessageResult::new(index);

        let (reply, body) = match session.retr(index).await {
            Ok(r) => r,
            Err(e) => {
                warn!("[{}] message {}/{}: retrieval failed: {}", id, index, count, e);
                record.delivery = DeliveryOutcome::RetrievalFailed;
                return (record, (!e.is_recoverable()).then_some(e));
            }
        };
        record.size = reply.split_whitespace().next().and_then(|s| s.parse().ok());
        info!(
            "[{}] fetching message {}/{} ({} bytes)",
            id,
            index,
            count,
            record.size.map(|s| s.to_string()).unwrap_or_else(|| "?".to_string())
        );

        match deliver_blocking(self.account.maildir.clone(), body).await {
            Ok(path) => {
                debug!("[{}] message {} stored as {}", id, index, path.display());
                record.delivery = DeliveryOutcome::Delivered;
            }
            Err(e) => {
                error!("[{}] message {}: delivery failed, left on server: {}", id, index, e);
                record.delivery = DeliveryOutcome::DeliveryFailed;
                return (record, None);
            }
        }

        if self.account.keep {
            debug!("[{}] keeping message {} on server", id, index);
            return (record, None);
        }
        match session.dele(index).await {
            Ok(_) => {
                debug!("[{}] deleted message {} from server", id, index);
                record.deletion = DeleteOutcome::Deleted;
                (record, None)
            }
            Err(e) => {
                warn!("[{}] message {}: deletion failed: {}", id, index, e);
                record.deletion = DeleteOutcome::DeletionFailed;
                (record, (!e.is_recoverable()).then_some(e))
            }
        }
    }
}
