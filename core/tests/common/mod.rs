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

//! In-memory POP3 server and connector for driving the runner and orchestrator without sockets.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use m2m_core::net::{Connector, Transport};
use m2m_core::AccountConfig;
use tempfile::TempDir;
use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::sync::Notify;

/// What the fake server holds and how it misbehaves.
#[derive(Debug, Clone)]
pub struct Mailbox {
    pub greeting: String,
    /// Message bodies with LF line endings; sent CRLF-terminated and dot-stuffed.
    pub messages: Vec<Vec<u8>>,
    /// Raw reply line for STAT instead of the computed `+OK n size`.
    pub stat_reply: Option<String>,
    pub retr_errors: HashMap<u32, String>,
    pub dele_errors: HashMap<u32, String>,
    pub reject_utf8: bool,
    pub reject_pass: bool,
    /// Close the connection when this RETR arrives.
    pub hang_up_on_retr: Option<u32>,
    /// Send the greeting, then read commands without ever answering.
    pub silent_after_greeting: bool,
}

impl Default for Mailbox {
    fn default() -> Self {
        Self {
            greeting: "+OK POP3 server ready".to_string(),
            messages: Vec::new(),
            stat_reply: None,
            retr_errors: HashMap::new(),
            dele_errors: HashMap::new(),
            reject_utf8: false,
            reject_pass: false,
            hang_up_on_retr: None,
            silent_after_greeting: false,
        }
    }
}

impl Mailbox {
    pub fn with_messages(messages: Vec<Vec<u8>>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }
}

fn encode_body(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let text = body.strip_suffix(b"\n").unwrap_or(body);
    for line in text.split(|b| *b == b'\n') {
        if line.starts_with(b".") {
            out.push(b'.');
        }
        out.extend_from_slice(line);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b".\r\n");
    out
}

async fn serve(stream: DuplexStream, mailbox: Mailbox, log: Arc<Mutex<Vec<String>>>) {
    let mut stream = BufReader::new(stream);
    let greeting = format!("{}\r\n", mailbox.greeting);
    if stream.get_mut().write_all(greeting.as_bytes()).await.is_err() {
        return;
    }
    let mut line = String::new();
    loop {
        line.clear();
        match stream.read_line(&mut line).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let command = line.trim_end().to_string();
        log.lock().unwrap().push(command.clone());
        if mailbox.silent_after_greeting {
            continue;
        }
        let mut parts = command.splitn(2, ' ');
        let verb = parts.next().unwrap_or("").to_ascii_uppercase();
        let arg: Option<u32> = parts.next().and_then(|a| a.trim().parse().ok());
        let reply: Vec<u8> = match verb.as_str() {
            "UTF8" if mailbox.reject_utf8 => b"-ERR UTF8 not supported\r\n".to_vec(),
            "UTF8" | "USER" => b"+OK\r\n".to_vec(),
            "PASS" if mailbox.reject_pass => b"-ERR authentication failed\r\n".to_vec(),
            "PASS" => b"+OK logged in\r\n".to_vec(),
            "STAT" => match &mailbox.stat_reply {
                Some(raw) => format!("{}\r\n", raw).into_bytes(),
                None => {
                    let total: usize = mailbox.messages.iter().map(Vec::len).sum();
                    format!("+OK {} {}\r\n", mailbox.messages.len(), total).into_bytes()
                }
            },
            "RETR" => {
                let n = arg.unwrap_or(0);
                if mailbox.hang_up_on_retr == Some(n) {
                    return;
                }
                if let Some(err) = mailbox.retr_errors.get(&n) {
                    format!("-ERR {}\r\n", err).into_bytes()
                } else if n >= 1 && (n as usize) <= mailbox.messages.len() {
                    let body = &mailbox.messages[n as usize - 1];
                    let mut out = format!("+OK {} octets\r\n", body.len()).into_bytes();
                    out.extend_from_slice(&encode_body(body));
                    out
                } else {
                    b"-ERR no such message\r\n".to_vec()
                }
            }
            "DELE" => match mailbox.dele_errors.get(&arg.unwrap_or(0)) {
                Some(err) => format!("-ERR {}\r\n", err).into_bytes(),
                None => b"+OK marked for deletion\r\n".to_vec(),
            },
            "QUIT" => {
                let _ = stream.get_mut().write_all(b"+OK bye\r\n").await;
                return;
            }
            _ => b"-ERR unknown command\r\n".to_vec(),
        };
        if stream.get_mut().write_all(&reply).await.is_err() {
            return;
        }
    }
}

/// Connector handing each account a duplex stream to its own fake server.
#[derive(Default)]
pub struct MockConnector {
    mailboxes: Mutex<HashMap<String, Mailbox>>,
    connects: Mutex<HashMap<String, usize>>,
    commands: Mutex<HashMap<String, Arc<Mutex<Vec<String>>>>>,
    refused: Mutex<Vec<String>>,
    panicking: Mutex<Vec<String>>,
    /// When set, connect notifies `entered` and waits for `release`.
    pub gate: Option<(Arc<Notify>, Arc<Notify>)>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gate(entered: Arc<Notify>, release: Arc<Notify>) -> Self {
        Self {
            gate: Some((entered, release)),
            ..Self::default()
        }
    }

    pub fn mailbox(&self, account: &str, mailbox: Mailbox) {
        self.mailboxes.lock().unwrap().insert(account.to_string(), mailbox);
    }

    pub fn refuse(&self, account: &str) {
        self.refused.lock().unwrap().push(account.to_string());
    }

    pub fn panic_on_connect(&self, account: &str) {
        self.panicking.lock().unwrap().push(account.to_string());
    }

    pub fn connects(&self, account: &str) -> usize {
        self.connects.lock().unwrap().get(account).copied().unwrap_or(0)
    }

    /// Command lines the fake server received for `account`, in order.
    pub fn commands(&self, account: &str) -> Vec<String> {
        self.commands
            .lock()
            .unwrap()
            .get(account)
            .map(|log| log.lock().unwrap().clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, account: &AccountConfig) -> io::Result<Box<dyn Transport>> {
        *self.connects.lock().unwrap().entry(account.id.clone()).or_insert(0) += 1;
        if let Some((entered, release)) = &self.gate {
            entered.notify_one();
            release.notified().await;
        }
        if self.panicking.lock().unwrap().contains(&account.id) {
            panic!("simulated crash while connecting {}", account.id);
        }
        if self.refused.lock().unwrap().contains(&account.id) {
            return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"));
        }
        let mailbox = self
            .mailboxes
            .lock()
            .unwrap()
            .get(&account.id)
            .cloned()
            .unwrap_or_default();
        let log = Arc::new(Mutex::new(Vec::new()));
        self.commands
            .lock()
            .unwrap()
            .insert(account.id.clone(), Arc::clone(&log));
        let (client, server) = duplex(256 * 1024);
        tokio::spawn(serve(server, mailbox, log));
        Ok(Box::new(client))
    }
}

/// Temporary Maildir with `cur`, `new` and `tmp`.
pub fn maildir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for sub in ["cur", "new", "tmp"] {
        fs::create_dir(dir.path().join(sub)).unwrap();
    }
    dir
}

/// Files currently visible in `<root>/new`, sorted.
pub fn delivered(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = fs::read_dir(root.join("new"))
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    files.sort();
    files
}

/// Plain-text account pointing at the fake server.
pub fn account(id: &str, maildir: &Path) -> AccountConfig {
    let mut account = AccountConfig::new(id, "bob", "secret", maildir);
    account.tls_domain = Some("pop.example.org".to_string());
    account
}

/// Message body of exactly `len` bytes.
pub fn body_of_len(len: usize) -> Vec<u8> {
    let mut body = b"Subject: test\n\n".to_vec();
    body.resize(len - 1, b'a');
    body.push(b'\n');
    body
}
