/*
 * main.rs
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

//! m2m: fetch every configured POP3 account into its Maildir.

mod args;

use std::process::ExitCode;

use log::error;
use m2m_core::config::list_accounts;
use m2m_core::{AccountConfig, AccountStatus, AccountSummary, Orchestrator, RunReport};

use args::Options;

fn init_logging(verbosity: i8) {
    let level = match verbosity {
        i8::MIN..=-1 => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

/// Load every selected account. Files that fail to load become configuration-error summaries.
fn load_accounts(options: &Options) -> Result<(Vec<AccountConfig>, Vec<AccountSummary>), String> {
    let ids = if options.accounts.is_empty() {
        list_accounts(&options.accounts_dir).map_err(|e| e.to_string())?
    } else {
        options.accounts.clone()
    };
    let mut accounts = Vec::with_capacity(ids.len());
    let mut failures = Vec::new();
    for id in ids {
        match AccountConfig::load(&options.accounts_dir, &id) {
            Ok(account) => accounts.push(account),
            Err(e) => {
                error!("[{}] {}", id, e);
                failures.push(
                    AccountSummary::new(id, AccountStatus::ConfigurationError)
                        .with_error(e.to_string()),
                );
            }
        }
    }
    Ok((accounts, failures))
}

fn print_report(report: &RunReport, verbosity: i8) {
    if verbosity < 0 {
        return;
    }
    for summary in report.summaries() {
        println!("{}", summary);
        if verbosity > 0 {
            for message in &summary.messages {
                println!("  {}", message);
            }
        }
    }
    println!("total: {:.2}s", report.elapsed.as_secs_f64());
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = args::command().get_matches();
    let options = match Options::from_matches(&matches) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("m2m: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_logging(options.verbosity);

    let (accounts, failures) = match load_accounts(&options) {
        Ok(loaded) => loaded,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut report = Orchestrator::new(&options.lock_dir)
        .with_mode(options.mode)
        .run(accounts)
        .await;
    for failure in failures {
        report.record(failure);
    }
    print_report(&report, options.verbosity);

    if report.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
