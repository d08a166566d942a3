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

//! Account fetching: one runner per account, driven by the orchestrator.

mod orchestrator;
mod runner;
mod summary;

pub use orchestrator::{Orchestrator, RunMode};
pub use runner::AccountRunner;
pub use summary::{
    AccountStatus, AccountSummary, DeleteOutcome, DeliveryOutcome, MessageResult, RunReport,
};
