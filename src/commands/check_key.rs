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

use std::path::Path;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use zeroize::Zeroizing;

use crate::ssh::{KeyMaterial, KeyParseError};

use super::read_key_file;

/// Parse a private key file and print its algorithm and fingerprint.
///
/// Never connects anywhere. Returns the process exit code: zero when the
/// key is usable for authentication.
pub async fn execute(identity: &Path, passphrase_env: Option<&str>) -> Result<i32> {
    let contents = read_key_file(identity)?;
    let env_passphrase = match passphrase_env {
        Some(var) => Some(
            std::env::var(var)
                .map(Zeroizing::new)
                .with_context(|| format!("environment variable {var} is not set"))?,
        ),
        None => None,
    };

    let parsed = match KeyMaterial::parse(&contents, env_passphrase.as_deref().map(|p| p.as_str()))
    {
        Err(KeyParseError::PassphraseRequired) if env_passphrase.is_none() => {
            let passphrase = Zeroizing::new(
                rpassword::prompt_password(format!("Enter passphrase for key {identity:?}: "))
                    .with_context(|| "Failed to read passphrase")?,
            );
            KeyMaterial::parse(&contents, Some(&passphrase))
        }
        other => other,
    };

    match parsed {
        Ok(material) => {
            println!(
                "{} {} key, fingerprint {}",
                "✓".green(),
                material.algorithm(),
                material.fingerprint()
            );
            Ok(0)
        }
        Err(e) => {
            println!(
                "{} there is something wrong with the private key: {e}",
                "✗".red()
            );
            Ok(1)
        }
    }
}
