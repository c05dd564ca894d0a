// Copyright 2026 sshjob contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Ownership of the SSH transport: connect, authenticate, open sessions,
//! open transfers, close.
//!
//! A [`Connection`] is opened once per task invocation and closed exactly
//! once on every exit path. Sessions are never reused; each command and
//! each transfer gets a fresh channel.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use russh::client::{self, Config, Handle, Handler, Msg};
use russh::keys::{HashAlg, PrivateKeyWithHashAlg};
use russh::{Channel, Disconnect};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::credentials::Credential;
use crate::transfer::scp::{ScpDownload, ScpError};

/// Default SSH port when none is configured.
pub const DEFAULT_PORT: u16 = 22;

/// Bound on TCP connect plus SSH handshake, per address attempt.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Network-level failures while establishing the transport.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("could not resolve {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("connection to {host}:{port} failed: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: russh::Error,
    },
    #[error("connection to {host}:{port} timed out after {seconds}s")]
    Timeout {
        host: String,
        port: u16,
        seconds: u64,
    },
    #[error("disconnect failed: {0}")]
    Disconnect(#[source] russh::Error),
}

/// Authentication failures after a successful handshake.
#[derive(Debug, Error)]
pub enum AuthenticationError {
    #[error("password authentication rejected for user {username}")]
    PasswordRejected { username: String },
    #[error("public key authentication rejected for user {username}")]
    KeyRejected { username: String },
    #[error("ssh error during authentication: {0}")]
    Ssh(#[from] russh::Error),
}

/// Everything needed to establish one authenticated connection.
#[derive(Debug)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub credential: Credential,
}

/// Transport event handler that accepts every presented host key.
///
/// Host-key verification is not part of this engine; the acceptance is
/// logged loudly with the key's fingerprint so it at least leaves a trace.
#[derive(Debug, Clone)]
struct TrustAllHandler {
    host: String,
    port: u16,
}

impl Handler for TrustAllHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &russh::keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        warn!(
            host = %self.host,
            port = self.port,
            fingerprint = %server_public_key.fingerprint(HashAlg::Sha256),
            "accepting server host key without verification"
        );
        Ok(true)
    }
}

/// An SSH transport to a single host.
///
/// Construct with [`Connection::connect`], then [`Connection::authenticate`]
/// before opening sessions or transfers.
pub struct Connection {
    handle: Handle<TrustAllHandler>,
    host: String,
    port: u16,
}

impl Connection {
    /// Resolve `host:port` and attempt each resolved address until one
    /// connects, each attempt bounded by [`CONNECT_TIMEOUT`].
    pub async fn connect(host: &str, port: u16) -> Result<Self, ConnectionError> {
        info!(host = %host, port = port, "attempting ssh connection");
        let config = Arc::new(Config::default());

        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|source| ConnectionError::Resolve {
                host: host.to_string(),
                port,
                source,
            })?
            .collect();

        let mut last_err = None;
        for addr in addrs {
            let handler = TrustAllHandler {
                host: host.to_string(),
                port,
            };
            match timeout(CONNECT_TIMEOUT, client::connect(config.clone(), addr, handler)).await {
                Ok(Ok(handle)) => {
                    debug!(address = %addr, "transport established");
                    return Ok(Self {
                        handle,
                        host: host.to_string(),
                        port,
                    });
                }
                Ok(Err(source)) => {
                    debug!(address = %addr, error = %source, "address attempt failed");
                    last_err = Some(ConnectionError::Connect {
                        host: host.to_string(),
                        port,
                        source,
                    });
                }
                Err(_) => {
                    last_err = Some(ConnectionError::Timeout {
                        host: host.to_string(),
                        port,
                        seconds: CONNECT_TIMEOUT.as_secs(),
                    });
                }
            }
        }

        Err(last_err.unwrap_or_else(|| ConnectionError::Resolve {
            host: host.to_string(),
            port,
            source: io::Error::new(
                io::ErrorKind::InvalidInput,
                "could not resolve to any addresses",
            ),
        }))
    }

    /// Authenticate with a resolved credential.
    ///
    /// Dispatch is exhaustive: password credentials use password auth, key
    /// pairs use public-key auth with the negotiated RSA hash.
    pub async fn authenticate(
        &mut self,
        credential: &Credential,
    ) -> Result<(), AuthenticationError> {
        match credential {
            Credential::Password { username, password } => {
                let auth = self
                    .handle
                    .authenticate_password(username, password.as_str())
                    .await?;
                if !auth.success() {
                    return Err(AuthenticationError::PasswordRejected {
                        username: username.clone(),
                    });
                }
            }
            Credential::KeyPair { username, key } => {
                let hash = self.handle.best_supported_rsa_hash().await?.flatten();
                let auth = self
                    .handle
                    .authenticate_publickey(
                        username,
                        PrivateKeyWithHashAlg::new(key.private_key(), hash),
                    )
                    .await?;
                if !auth.success() {
                    return Err(AuthenticationError::KeyRejected {
                        username: username.clone(),
                    });
                }
            }
        }
        info!(host = %self.host, user = %credential.username(), "connected and authenticated");
        Ok(())
    }

    /// Open a fresh exec session. One remote command per session.
    pub async fn open_session(&self) -> Result<Channel<Msg>, russh::Error> {
        self.handle.channel_open_session().await
    }

    /// Start a recursive scp source for `remote_path` on the remote side
    /// and return the protocol driver for its byte stream.
    pub async fn open_transfer(
        &self,
        remote_path: &str,
    ) -> Result<ScpDownload<impl AsyncRead + AsyncWrite + Unpin>, ScpError> {
        let channel = self.handle.channel_open_session().await?;
        let command = format!("scp -f -r {remote_path}");
        debug!(command = %command, "starting remote scp source");
        channel.exec(true, command.as_str()).await?;
        Ok(ScpDownload::new(channel.into_stream()))
    }

    /// Disconnect, idempotently and best-effort. Safe to call after errors.
    pub async fn close(&self) -> Result<(), ConnectionError> {
        if self.handle.is_closed() {
            return Ok(());
        }
        self.handle
            .disconnect(Disconnect::ByApplication, "", "")
            .await
            .map_err(ConnectionError::Disconnect)?;
        info!(host = %self.host, "disconnected from server");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_error_display() {
        let err = ConnectionError::Timeout {
            host: "build-3".to_string(),
            port: 2022,
            seconds: 30,
        };
        assert_eq!(
            err.to_string(),
            "connection to build-3:2022 timed out after 30s"
        );

        let err = ConnectionError::Resolve {
            host: "nowhere.invalid".to_string(),
            port: 22,
            source: io::Error::new(io::ErrorKind::NotFound, "no such host"),
        };
        assert!(err.to_string().starts_with("could not resolve nowhere.invalid:22"));
    }

    #[test]
    fn authentication_error_display() {
        let err = AuthenticationError::PasswordRejected {
            username: "deploy".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "password authentication rejected for user deploy"
        );

        let err = AuthenticationError::KeyRejected {
            username: "ci".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "public key authentication rejected for user ci"
        );
    }
}
