/*
 * orchestrator.rs
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

//! Runs every account, concurrently (default) or one after another, and
//! collects the summaries into a sorted [`RunReport`].
//!
//! Each account gets its own task. A task shares nothing with its siblings:
//! its summary comes back through its join handle and is recorded here, in a
//! map owned by this single aggregating future.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use log::{error, info, warn};
use tokio::task::JoinHandle;

use super::runner::AccountRunner;
use super::summary::{AccountStatus, AccountSummary, RunReport};
use crate::config::AccountConfig;
use crate::net::{Connector, NetConnector};

/// How account tasks are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    #[default]
    Concurrent,
    Serial,
}

pub struct Orchestrator {
    connector: Arc<dyn Connector>,
    lock_dir: PathBuf,
    mode: RunMode,
}

impl Orchestrator {
    /// Orchestrator dialing real servers, taking account locks in `lock_dir`.
    pub fn new(lock_dir: impl Into<PathBuf>) -> Self {
        Self {
            connector: Arc::new(NetConnector),
            lock_dir: lock_dir.into(),
            mode: RunMode::default(),
        }
    }

    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    fn spawn(&self, account: AccountConfig) -> (String, JoinHandle<AccountSummary>) {
        let id = account.id.clone();
        let runner =
            AccountRunner::new(account, Arc::clone(&self.connector), self.lock_dir.clone());
        (id, tokio::spawn(runner.run()))
    }

    /// A task that panicked still yields a summary; its lock was released while unwinding.
    async fn join(id: String, task: JoinHandle<AccountSummary>) -> AccountSummary {
        match task.await {
            Ok(summary) => summary,
            Err(e) => {
                error!("[{}] account task failed: {}", id, e);
                AccountSummary::new(id, AccountStatus::Aborted).with_error(e.to_string())
            }
        }
    }

    /// Run all `accounts` and wait for every one of them. An identifier listed
    /// more than once runs once, with the first configuration given for it.
    pub async fn run(&self, accounts: Vec<AccountConfig>) -> RunReport {
        let started = Instant::now();
        let mut report = RunReport::new();
        let mut seen = HashSet::new();
        let accounts: Vec<_> = accounts
            .into_iter()
            .filter(|a| {
                let first = seen.insert(a.id.clone());
                if !first {
                    warn!("[{}] listed more than once, ignoring duplicate", a.id);
                }
                first
            })
            .collect();
        info!("processing {} account(s), {:?}", accounts.len(), self.mode);
        match self.mode {
            RunMode::Serial => {
                for account in accounts {
                    let (id, task) = self.spawn(account);
                    report.record(Self::join(id, task).await);
                }
            }
            RunMode::Concurrent => {
                let tasks: Vec<_> = accounts.into_iter().map(|a| self.spawn(a)).collect();
                for (id, task) in tasks {
                    report.record(Self::join(id, task).await);
                }
            }
        }
        report.elapsed = started.elapsed();
        info!("all accounts done in {:.2}s", report.elapsed.as_secs_f64());
        report
    }
}
