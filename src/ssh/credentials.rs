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

//! Credential resolution: a declared authentication kind plus opaque secret
//! strings become a typed credential.
//!
//! Resolution is a pure mapping. Secrets arrive already decrypted (secret
//! storage is someone else's job) and key material is parsed here, not at
//! authentication time, so a resolved credential cannot fail key parsing
//! later.

use clap::ValueEnum;
use serde::Deserialize;
use thiserror::Error;
use zeroize::Zeroizing;

use super::keys::{KeyMaterial, KeyParseError};

/// Declared authentication kind, parsed once at the input boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthKind {
    /// Username and password.
    Password,
    /// Private key without a passphrase.
    Key,
    /// Private key protected by a passphrase.
    #[value(name = "key-passphrase", alias = "key-with-passphrase")]
    #[serde(rename = "key-passphrase", alias = "key-with-passphrase")]
    KeyWithPassphrase,
}

/// Plaintext secret inputs for resolution.
///
/// Which fields matter depends on the auth kind; the rest are ignored.
#[derive(Default)]
pub struct SecretBundle {
    pub password: Option<Zeroizing<String>>,
    pub private_key: Option<Zeroizing<String>>,
    pub passphrase: Option<Zeroizing<String>>,
}

/// Errors produced while resolving secrets into a credential.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("password authentication requested but no password was provided")]
    MissingPassword,
    #[error("key authentication requested but no private key was provided")]
    MissingKey,
    #[error(transparent)]
    Key(#[from] KeyParseError),
}

/// A resolved, typed credential. Exactly one variant per connection.
#[derive(Clone)]
pub enum Credential {
    Password {
        username: String,
        password: Zeroizing<String>,
    },
    KeyPair {
        username: String,
        key: KeyMaterial,
    },
}

impl Credential {
    pub fn username(&self) -> &str {
        match self {
            Credential::Password { username, .. } | Credential::KeyPair { username, .. } => {
                username
            }
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Credential::KeyPair { username, key } => f
                .debug_struct("KeyPair")
                .field("username", username)
                .field("key", key)
                .finish(),
        }
    }
}

/// Map an auth kind plus secrets onto a typed credential.
///
/// The password kind ignores any supplied key material; the key kinds ignore
/// any supplied password. A passphrase is consulted only for
/// [`AuthKind::KeyWithPassphrase`].
pub fn resolve(
    username: &str,
    kind: AuthKind,
    secrets: &SecretBundle,
) -> Result<Credential, CredentialError> {
    match kind {
        AuthKind::Password => {
            let password = secrets
                .password
                .as_ref()
                .ok_or(CredentialError::MissingPassword)?;
            Ok(Credential::Password {
                username: username.to_string(),
                password: password.clone(),
            })
        }
        AuthKind::Key | AuthKind::KeyWithPassphrase => {
            let key_text = secrets
                .private_key
                .as_ref()
                .ok_or(CredentialError::MissingKey)?;
            let passphrase = match kind {
                AuthKind::KeyWithPassphrase => secrets.passphrase.as_ref().map(|p| p.as_str()),
                _ => None,
            };
            let key = KeyMaterial::parse(key_text, passphrase)?;
            Ok(Credential::KeyPair {
                username: username.to_string(),
                key,
            })
        }
    }
}
