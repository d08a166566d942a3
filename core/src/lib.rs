/*
 * lib.rs
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

//! m2m core: fetch POP3 mailboxes and deliver each message once into a Maildir.
//!
//! Layers, leaves first: [`localstorage::maildir`] (atomic delivery),
//! [`protocol::pop3`] (line protocol session), [`net`] (dial, SOCKS5, TLS),
//! [`fetch`] (per-account runner and the orchestrator).

pub mod config;
pub mod fetch;
pub mod localstorage;
pub mod lock;
pub mod net;
pub mod protocol;

pub use config::{AccountConfig, ConfigError};
pub use fetch::{
    AccountRunner, AccountStatus, AccountSummary, DeleteOutcome, DeliveryOutcome, MessageResult,
    Orchestrator, RunMode, RunReport,
};
