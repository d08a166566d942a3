/*
 * net.rs
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

//! Connection setup: direct or SOCKS5 dial, then implicit TLS over rustls.
//!
//! The dialer is chosen once per account from its configuration. Whatever the
//! dial path, the result is a plain `TcpStream`, so the TLS layer is the same
//! for direct and proxied connections.

use std::io;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};

use async_trait::async_trait;
use log::debug;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::client::ClientConfig;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::RootCertStore;
use tokio_rustls::TlsConnector;
use tokio_socks::tcp::Socks5Stream;

use crate::config::AccountConfig;

/// Byte stream a POP3 session runs over.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// Build a root certificate store: platform native certs first, then webpki-roots as fallback.
fn build_root_store() -> RootCertStore {
    let mut root_store = RootCertStore::empty();
    if let Ok(certs) = rustls_native_certs::load_native_certs() {
        for cert in certs {
            let _ = root_store.add(cert);
        }
    }
    if root_store.is_empty() {
        root_store.roots = webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();
    }
    root_store
}

static DEFAULT_CONNECTOR: OnceLock<TlsConnector> = OnceLock::new();

fn default_connector() -> &'static TlsConnector {
    DEFAULT_CONNECTOR.get_or_init(|| {
        let config = ClientConfig::builder()
            .with_root_certificates(build_root_store())
            .with_no_client_auth();
        TlsConnector::from(Arc::new(config))
    })
}

/// Opens the raw TCP connection to the mail server.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self, host: &str, port: u16) -> io::Result<TcpStream>;
}

/// Plain TCP connect.
pub struct DirectDialer;

#[async_trait]
impl Dialer for DirectDialer {
    async fn dial(&self, host: &str, port: u16) -> io::Result<TcpStream> {
        TcpStream::connect((host, port)).await
    }
}

/// TCP connect relayed through a SOCKS5 proxy (`host:port`).
pub struct Socks5Dialer {
    proxy: String,
}

impl Socks5Dialer {
    pub fn new(proxy: impl Into<String>) -> Self {
        Self { proxy: proxy.into() }
    }
}

#[async_trait]
impl Dialer for Socks5Dialer {
    async fn dial(&self, host: &str, port: u16) -> io::Result<TcpStream> {
        let stream = Socks5Stream::connect(self.proxy.as_str(), (host, port))
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::ConnectionRefused, e))?;
        Ok(stream.into_inner())
    }
}

/// Dialer for this account: SOCKS5 when a proxy is configured, else direct.
pub fn dialer_for(account: &AccountConfig) -> Box<dyn Dialer> {
    match &account.proxy {
        Some(proxy) => Box::new(Socks5Dialer::new(proxy.clone())),
        None => Box::new(DirectDialer),
    }
}

/// Stream for POP3: plain TCP or TLS.
pub enum MailStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl MailStream {
    /// Handshake TLS on an already connected socket, validating the
    /// certificate against `server_name`.
    pub async fn upgrade_to_tls(tcp: TcpStream, server_name: &str) -> io::Result<Self> {
        let name = ServerName::try_from(server_name)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "invalid TLS server name"))?
            .to_owned();
        let tls = default_connector()
            .connect(name, tcp)
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::ConnectionRefused, e))?;
        Ok(MailStream::Tls(Box::new(tls)))
    }
}

impl AsyncRead for MailStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MailStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            MailStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for MailStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            MailStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            MailStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MailStream::Plain(s) => Pin::new(s).poll_flush(cx),
            MailStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MailStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            MailStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Produces the transport for one account: dial plus optional TLS, bounded by the account timeout.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, account: &AccountConfig) -> io::Result<Box<dyn Transport>>;
}

/// Real network connector.
#[derive(Debug, Default, Clone, Copy)]
pub struct NetConnector;

impl NetConnector {
    async fn open(account: &AccountConfig) -> io::Result<MailStream> {
        let host = account
            .dial_host()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no server host"))?;
        let dialer = dialer_for(account);
        debug!(
            "[{}] dialing {}:{}{}",
            account.id,
            host,
            account.port,
            account
                .proxy
                .as_deref()
                .map(|p| format!(" via SOCKS5 {}", p))
                .unwrap_or_default()
        );
        let tcp = dialer.dial(host, account.port).await?;
        if !account.tls {
            return Ok(MailStream::Plain(tcp));
        }
        let server_name = account
            .tls_domain
            .as_deref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no TLS server name"))?;
        MailStream::upgrade_to_tls(tcp, server_name).await
    }
}

#[async_trait]
impl Connector for NetConnector {
    async fn connect(&self, account: &AccountConfig) -> io::Result<Box<dyn Transport>> {
        let stream = tokio::time::timeout(account.timeout, Self::open(account))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "timed out connecting"))??;
        Ok(Box::new(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{AccountRunner, AccountStatus};
    use crate::lock::lock_path;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn plain_account(port: u16) -> AccountConfig {
        let mut account = AccountConfig::new("t", "bob", "pw", "/m");
        account.tls = false;
        account.entry_server = Some("127.0.0.1".to_string());
        account.port = port;
        account
    }

    #[tokio::test]
    async fn direct_plain_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            sock.write_all(b"+OK hello\r\n").await.unwrap();
        });
        let mut stream = NetConnector.connect(&plain_account(port)).await.unwrap();
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"+OK hello\r\n");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn refused_connection_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        assert!(NetConnector.connect(&plain_account(port)).await.is_err());
    }

    /// Minimal SOCKS5 proxy: no-auth handshake, one CONNECT, then greets as the target would.
    async fn fake_socks5_proxy(listener: TcpListener) -> Vec<u8> {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut hello = [0u8; 3];
        sock.read_exact(&mut hello).await.unwrap();
        assert_eq!(hello, [5, 1, 0]);
        sock.write_all(&[5, 0]).await.unwrap();
        let mut head = [0u8; 4];
        sock.read_exact(&mut head).await.unwrap();
        assert_eq!(&head[..3], &[5, 1, 0]);
        let addr_len = match head[3] {
            1 => 4,
            4 => 16,
            3 => {
                let mut len = [0u8; 1];
                sock.read_exact(&mut len).await.unwrap();
                len[0] as usize
            }
            other => panic!("unexpected address type {}", other),
        };
        let mut target = vec![0u8; addr_len + 2];
        sock.read_exact(&mut target).await.unwrap();
        sock.write_all(&[5, 0, 0, 1, 0, 0, 0, 0, 0, 0]).await.unwrap();
        sock.write_all(b"+OK via proxy\r\n").await.unwrap();
        target
    }

    #[tokio::test]
    async fn socks5_dial_reaches_target() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let proxy_addr = listener.local_addr().unwrap();
        let proxy = tokio::spawn(fake_socks5_proxy(listener));
        let mut account = plain_account(110);
        account.proxy = Some(proxy_addr.to_string());
        let mut stream = NetConnector.connect(&account).await.unwrap();
        let mut buf = [0u8; 15];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"+OK via proxy\r\n");
        let target = proxy.await.unwrap();
        assert_eq!(&target[target.len() - 2..], &[0, 110]);
    }

    /// Answers every connection with a plaintext greeting, whatever the client sends.
    fn plaintext_only_server(listener: TcpListener) {
        tokio::spawn(async move {
            while let Ok((mut sock, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let _ = sock.read(&mut buf).await;
                    let _ = sock.write_all(b"+OK\r\n").await;
                    while matches!(sock.read(&mut buf).await, Ok(n) if n > 0) {}
                });
            }
        });
    }

    fn tls_account(port: u16) -> AccountConfig {
        let mut account = plain_account(port);
        account.tls = true;
        account.tls_domain = Some("localhost".to_string());
        account.timeout = std::time::Duration::from_secs(5);
        account
    }

    #[tokio::test]
    async fn failed_tls_handshake_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        plaintext_only_server(listener);
        assert!(NetConnector.connect(&tls_account(port)).await.is_err());
    }

    #[tokio::test]
    async fn failed_tls_handshake_aborts_account() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        plaintext_only_server(listener);
        let maildir = tempfile::tempdir().unwrap();
        let locks = tempfile::tempdir().unwrap();
        let mut account = tls_account(port);
        account.id = "secure".to_string();
        account.maildir = maildir.path().to_path_buf();

        let summary = AccountRunner::new(account, Arc::new(NetConnector), locks.path())
            .run()
            .await;
        assert_eq!(summary.status, AccountStatus::ConnectionError);
        assert!(summary.error.is_some());
        assert!(!lock_path(locks.path(), "secure").exists());
    }
}
