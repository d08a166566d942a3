/*
 * summary.rs
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

//! Per-message and per-account outcomes, and the sorted run report.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Terminal status of one account run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountStatus {
    Ok,
    SkippedLocked,
    SkippedInactive,
    ConfigurationError,
    ConnectionError,
    ProtocolError,
    /// The account task itself died (panicked).
    Aborted,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Ok => "ok",
            AccountStatus::SkippedLocked => "skipped-locked",
            AccountStatus::SkippedInactive => "skipped-inactive",
            AccountStatus::ConfigurationError => "configuration-error",
            AccountStatus::ConnectionError => "connection-error",
            AccountStatus::ProtocolError => "protocol-error",
            AccountStatus::Aborted => "aborted",
        }
    }

    pub fn is_failure(&self) -> bool {
        !matches!(
            self,
            AccountStatus::Ok | AccountStatus::SkippedLocked | AccountStatus::SkippedInactive
        )
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    RetrievalFailed,
    DeliveryFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotAttempted,
    DeletionFailed,
}

/// Outcome for one server message. `index` is the 1-based number from this session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageResult {
    pub index: u32,
    /// Size from the RETR reply, when the server gave a number.
    pub size: Option<u64>,
    pub delivery: DeliveryOutcome,
    pub deletion: DeleteOutcome,
}

impl MessageResult {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            size: None,
            delivery: DeliveryOutcome::RetrievalFailed,
            deletion: DeleteOutcome::NotAttempted,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.delivery != DeliveryOutcome::Delivered
            || self.deletion == DeleteOutcome::DeletionFailed
    }
}

impl fmt::Display for MessageResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let size = self.size.map(|s| s.to_string()).unwrap_or_else(|| "?".to_string());
        let delivery = match self.delivery {
            DeliveryOutcome::Delivered => "delivered",
            DeliveryOutcome::RetrievalFailed => "retrieval-failed",
            DeliveryOutcome::DeliveryFailed => "delivery-failed",
        };
        let deletion = match self.deletion {
            DeleteOutcome::Deleted => "deleted",
            DeleteOutcome::NotAttempted => "kept",
            DeleteOutcome::DeletionFailed => "deletion-failed",
        };
        write!(f, "#{} ({} bytes) {}, {}", self.index, size, delivery, deletion)
    }
}

/// Aggregate for one account.
#[derive(Debug, Clone)]
pub struct AccountSummary {
    pub account: String,
    pub status: AccountStatus,
    /// Message count from STAT at session start.
    pub message_count: u32,
    pub mailbox_size: u64,
    pub messages: Vec<MessageResult>,
    pub elapsed: Duration,
    pub error: Option<String>,
}

impl AccountSummary {
    pub fn new(account: impl Into<String>, status: AccountStatus) -> Self {
        Self {
            account: account.into(),
            status,
            message_count: 0,
            mailbox_size: 0,
            messages: Vec::new(),
            elapsed: Duration::ZERO,
            error: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn delivered(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.delivery == DeliveryOutcome::Delivered)
            .count()
    }

    pub fn deleted(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.deletion == DeleteOutcome::Deleted)
            .count()
    }

    pub fn has_failures(&self) -> bool {
        self.status.is_failure() || self.messages.iter().any(MessageResult::is_failure)
    }
}

impl fmt::Display for AccountSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}, {} message{}, {} deleted ({:.2}s)",
            self.account,
            self.status,
            self.message_count,
            if self.message_count == 1 { "" } else { "s" },
            self.deleted(),
            self.elapsed.as_secs_f64()
        )?;
        if let Some(e) = &self.error {
            write!(f, ": {}", e)?;
        }
        Ok(())
    }
}

/// All account summaries of one run, sorted by account identifier.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    accounts: BTreeMap<String, AccountSummary>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, summary: AccountSummary) {
        self.accounts.insert(summary.account.clone(), summary);
    }

    pub fn get(&self, account: &str) -> Option<&AccountSummary> {
        self.accounts.get(account)
    }

    /// Summaries in account identifier order.
    pub fn summaries(&self) -> impl Iterator<Item = &AccountSummary> {
        self.accounts.values()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn has_failures(&self) -> bool {
        self.accounts.values().any(AccountSummary::has_failures)
    }
}
