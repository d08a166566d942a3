/*
 * client.rs
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

//! POP3 session over any byte stream: greeting, USER/PASS, UTF8, STAT, RETR, DELE, QUIT.
//!
//! Strictly one outstanding command at a time. Every call consumes its full
//! reply (and body, for RETR) before returning, so the next command always
//! starts on a clean line boundary.

use super::Pop3Error;
use log::trace;
use std::fmt;
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

/// Status token of a reply line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Err,
}

/// Split a reply line into status and message text: `STATUS [SPACE MESSAGE]`.
pub fn parse_status_line(line: &str) -> Result<(Status, String), Pop3Error> {
    let (token, message) = line.split_once(' ').unwrap_or((line, ""));
    let status = match token {
        "+OK" => Status::Ok,
        "-ERR" => Status::Err,
        _ => return Err(Pop3Error::Protocol(format!("malformed status: {:?}", token))),
    };
    Ok((status, message.to_string()))
}

/// STAT response: message count and total size in octets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatResponse {
    pub count: u32,
    pub total_size: u64,
}

impl StatResponse {
    /// Parse the text after `+OK`: exactly two numeric tokens.
    pub fn parse(reply: &str) -> Result<Self, Pop3Error> {
        let parts: Vec<&str> = reply.split_whitespace().collect();
        let malformed = || Pop3Error::Protocol(format!("malformed STAT response: {:?}", reply));
        if parts.len() != 2 {
            return Err(malformed());
        }
        let count = parts[0].parse().map_err(|_| malformed())?;
        let total_size = parts[1].parse().map_err(|_| malformed())?;
        Ok(Self { count, total_size })
    }
}

async fn with_timeout<F, T>(limit: Option<Duration>, fut: F) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    match limit {
        Some(d) => tokio::time::timeout(d, fut)
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "timed out waiting for server"))?,
        None => fut.await,
    }
}

/// Read one line into `buf` without its CRLF (or bare LF).
async fn read_line<R>(stream: &mut R, buf: &mut Vec<u8>) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let n = stream.read_until(b'\n', buf).await?;
    if n == 0 || buf.last() != Some(&b'\n') {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed"));
    }
    buf.pop();
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    Ok(())
}

async fn write_line<W>(stream: &mut W, line: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut out = Vec::with_capacity(line.len() + 2);
    out.extend_from_slice(line.as_bytes());
    out.extend_from_slice(b"\r\n");
    stream.write_all(&out).await?;
    stream.flush().await?;
    Ok(())
}

/// Read a dot-terminated body. A leading ".." loses one dot; CRLF becomes LF.
async fn read_multiline<R>(
    stream: &mut R,
    buf: &mut Vec<u8>,
    io_timeout: Option<Duration>,
) -> io::Result<Vec<u8>>
where
    R: AsyncBufRead + Unpin,
{
    let mut out = Vec::new();
    loop {
        with_timeout(io_timeout, read_line(stream, buf)).await?;
        if buf.as_slice() == b"." {
            break;
        }
        let line = if buf.starts_with(b"..") { &buf[1..] } else { &buf[..] };
        out.extend_from_slice(line);
        out.push(b'\n');
    }
    Ok(out)
}

fn format_command(verb: &str, args: &[&(dyn fmt::Display + Sync)]) -> String {
    let mut line = verb.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(&arg.to_string());
    }
    line
}

/// POP3 session (connected stream). Open, login, STAT, RETR/DELE per message, then quit.
pub struct Pop3Session<S> {
    stream: BufReader<S>,
    read_buf: Vec<u8>,
    io_timeout: Option<Duration>,
    label: String,
    greeting: String,
    broken: bool,
}

impl<S> Pop3Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Read and check the greeting. A negative or malformed greeting is a protocol error.
    pub async fn open(
        stream: S,
        io_timeout: Option<Duration>,
        label: impl Into<String>,
    ) -> Result<Self, Pop3Error> {
        let mut session = Self {
            stream: BufReader::new(stream),
            read_buf: Vec::with_capacity(4096),
            io_timeout,
            label: label.into(),
            greeting: String::new(),
            broken: false,
        };
        let line = session.read_reply_line().await?;
        trace!("[{}] < {}", session.label, line);
        match parse_status_line(&line)? {
            (Status::Ok, message) => {
                session.greeting = message;
                Ok(session)
            }
            (Status::Err, message) => Err(Pop3Error::Protocol(format!(
                "server refused connection: {}",
                message
            ))),
        }
    }

    /// Text of the `+OK` greeting.
    pub fn greeting(&self) -> &str {
        &self.greeting
    }

    /// True once a transport or protocol error made the stream unusable.
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    fn poison<T>(&mut self, result: Result<T, Pop3Error>) -> Result<T, Pop3Error> {
        if let Err(e) = &result {
            if !e.is_recoverable() {
                self.broken = true;
            }
        }
        result
    }

    async fn read_reply_line(&mut self) -> Result<String, Pop3Error> {
        let io_timeout = self.io_timeout;
        let result = with_timeout(io_timeout, read_line(&mut self.stream, &mut self.read_buf))
            .await
            .map(|()| String::from_utf8_lossy(&self.read_buf).into_owned())
            .map_err(Pop3Error::from);
        self.poison(result)
    }

    async fn send(
        &mut self,
        verb: &str,
        args: &[&(dyn fmt::Display + Sync)],
    ) -> Result<(), Pop3Error> {
        if self.broken {
            return Err(Pop3Error::Transport(io::Error::new(
                io::ErrorKind::NotConnected,
                "session closed after an earlier failure",
            )));
        }
        let line = format_command(verb, args);
        if verb.eq_ignore_ascii_case("PASS") {
            trace!("[{}] > PASS ****", self.label);
        } else {
            trace!("[{}] > {}", self.label, line);
        }
        let io_timeout = self.io_timeout;
        let result = with_timeout(io_timeout, write_line(self.stream.get_mut(), &line))
            .await
            .map_err(Pop3Error::from);
        self.poison(result)
    }

    async fn read_status(&mut self) -> Result<String, Pop3Error> {
        let line = self.read_reply_line().await?;
        trace!("[{}] < {}", self.label, line);
        let parsed = parse_status_line(&line);
        match self.poison(parsed)? {
            (Status::Ok, message) => Ok(message),
            (Status::Err, message) => Err(Pop3Error::Server(message)),
        }
    }

    /// Send one command and read its single-line reply. Returns the text after `+OK`.
    pub async fn command(
        &mut self,
        verb: &str,
        args: &[&(dyn fmt::Display + Sync)],
    ) -> Result<String, Pop3Error> {
        self.send(verb, args).await?;
        self.read_status().await
    }

    /// As [`command`](Self::command), then read the dot-terminated body on `+OK`.
    pub async fn command_multi(
        &mut self,
        verb: &str,
        args: &[&(dyn fmt::Display + Sync)],
    ) -> Result<(String, Vec<u8>), Pop3Error> {
        let reply = self.command(verb, args).await?;
        let io_timeout = self.io_timeout;
        let body = read_multiline(&mut self.stream, &mut self.read_buf, io_timeout)
            .await
            .map_err(Pop3Error::from);
        let body = self.poison(body)?;
        trace!("[{}] < ({} byte body)", self.label, body.len());
        Ok((reply, body))
    }

    /// UTF8 capability request (RFC 6856).
    pub async fn utf8(&mut self) -> Result<String, Pop3Error> {
        self.command("UTF8", &[]).await
    }

    /// USER then PASS.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<(), Pop3Error> {
        self.command("USER", &[&username]).await?;
        self.command("PASS", &[&password]).await?;
        Ok(())
    }

    /// STAT -> count and total size.
    pub async fn stat(&mut self) -> Result<StatResponse, Pop3Error> {
        let reply = self.command("STAT", &[]).await?;
        let parsed = StatResponse::parse(&reply);
        self.poison(parsed)
    }

    /// RETR msg -> reply text and message bytes.
    pub async fn retr(&mut self, msg_no: u32) -> Result<(String, Vec<u8>), Pop3Error> {
        self.command_multi("RETR", &[&msg_no]).await
    }

    /// DELE msg.
    pub async fn dele(&mut self, msg_no: u32) -> Result<String, Pop3Error> {
        self.command("DELE", &[&msg_no]).await
    }

    /// QUIT, then shut the stream down whatever the reply.
    pub async fn quit(mut self) -> Result<(), Pop3Error> {
        let result = self.command("QUIT", &[]).await.map(|_| ());
        let _ = self.stream.get_mut().shutdown().await;
        result
    }
}
