/*
 * args.rs
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

//! Command line flags.

use std::path::PathBuf;

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use m2m_core::config::default_accounts_dir;
use m2m_core::RunMode;

/// Resolved command line.
#[derive(Debug)]
pub struct Options {
    pub accounts_dir: PathBuf,
    pub lock_dir: PathBuf,
    /// Accounts named on the command line, duplicates removed; empty means all.
    pub accounts: Vec<String>,
    pub mode: RunMode,
    /// -1 quiet, 0 normal, 1 and up verbose.
    pub verbosity: i8,
}

pub fn command() -> Command {
    Command::new("m2m")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Move mail from POP3 mailboxes into Maildir")
        .arg(
            Arg::new("accounts-dir")
                .short('d')
                .long("accounts-dir")
                .value_name("DIR")
                .help("Directory holding one <account>.json file per account")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("lock-dir")
                .long("lock-dir")
                .value_name("DIR")
                .help("Directory for per-account lock files [default: system temp dir]")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("serial")
                .short('s')
                .long("serial")
                .help("Process accounts one at a time")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("More output; repeat for protocol traces")
                .action(ArgAction::Count)
                .conflicts_with("quiet"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Only report errors")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("account")
                .value_name("ACCOUNT")
                .help("Accounts to process [default: all]")
                .num_args(0..)
                .action(ArgAction::Append),
        )
}

impl Options {
    pub fn from_matches(matches: &ArgMatches) -> Result<Self, String> {
        let accounts_dir = match matches.get_one::<PathBuf>("accounts-dir") {
            Some(dir) => dir.clone(),
            None => default_accounts_dir()
                .ok_or_else(|| "no configuration directory; pass --accounts-dir".to_string())?,
        };
        let lock_dir = matches
            .get_one::<PathBuf>("lock-dir")
            .cloned()
            .unwrap_or_else(std::env::temp_dir);
        let mut accounts: Vec<String> = Vec::new();
        for name in matches.get_many::<String>("account").into_iter().flatten() {
            if !accounts.contains(name) {
                accounts.push(name.clone());
            }
        }
        let mode = if matches.get_flag("serial") {
            RunMode::Serial
        } else {
            RunMode::Concurrent
        };
        let verbosity = if matches.get_flag("quiet") {
            -1
        } else {
            matches.get_count("verbose").min(2) as i8
        };
        Ok(Self {
            accounts_dir,
            lock_dir,
            accounts,
            mode,
            verbosity,
        })
    }
}
