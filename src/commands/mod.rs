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

pub mod check_key;
pub mod fetch;
pub mod run;

use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;
use zeroize::Zeroizing;

use crate::cli::ConnectionArgs;
use crate::config::JobFile;
use crate::ssh::{
    AuthKind, Connection, ConnectionConfig, DEFAULT_PORT, SecretBundle, resolve,
};

/// Merge command-line flags over the job file into a connection config,
/// gathering whatever secrets the chosen auth method needs.
pub(crate) fn build_connection_config(
    args: &ConnectionArgs,
    job: &JobFile,
) -> Result<ConnectionConfig> {
    let host = args
        .host
        .clone()
        .or_else(|| job.host.clone())
        .context("no host given (use --host or the job file)")?;
    let port = args.port.or(job.port).unwrap_or(DEFAULT_PORT);
    let user = args
        .user
        .clone()
        .or_else(|| job.user.clone())
        .context("no user given (use --user or the job file)")?;
    let kind = args.auth.or(job.auth).unwrap_or(AuthKind::Password);

    let mut secrets = SecretBundle::default();
    match kind {
        AuthKind::Password => {
            let var = args.password_env.as_deref().or(job.password_env.as_deref());
            secrets.password = Some(password_secret(var, &user, &host)?);
        }
        AuthKind::Key | AuthKind::KeyWithPassphrase => {
            let identity = args
                .identity
                .clone()
                .or_else(|| job.identity_path())
                .context("no identity file given (use --identity or the job file)")?;
            secrets.private_key = Some(read_key_file(&identity)?);
            if kind == AuthKind::KeyWithPassphrase {
                let var = args
                    .passphrase_env
                    .as_deref()
                    .or(job.passphrase_env.as_deref());
                secrets.passphrase = Some(passphrase_secret(var, &identity)?);
            }
        }
    }

    let credential = resolve(&user, kind, &secrets)?;
    Ok(ConnectionConfig {
        host,
        port,
        credential,
    })
}

pub(crate) fn read_key_file(path: &Path) -> Result<Zeroizing<String>> {
    std::fs::read_to_string(path)
        .map(Zeroizing::new)
        .with_context(|| format!("Failed to read SSH key file: {path:?}"))
}

fn password_secret(env_name: Option<&str>, user: &str, host: &str) -> Result<Zeroizing<String>> {
    if let Some(var) = env_name {
        return std::env::var(var)
            .map(Zeroizing::new)
            .with_context(|| format!("environment variable {var} is not set"));
    }
    let password = Zeroizing::new(
        rpassword::prompt_password(format!("Enter password for {user}@{host}: "))
            .with_context(|| "Failed to read password")?,
    );
    Ok(password)
}

fn passphrase_secret(env_name: Option<&str>, key_path: &Path) -> Result<Zeroizing<String>> {
    if let Some(var) = env_name {
        return std::env::var(var)
            .map(Zeroizing::new)
            .with_context(|| format!("environment variable {var} is not set"));
    }
    let passphrase = Zeroizing::new(
        rpassword::prompt_password(format!("Enter passphrase for key {key_path:?}: "))
            .with_context(|| "Failed to read passphrase")?,
    );
    Ok(passphrase)
}

/// Connect and authenticate, tearing the transport down again if the
/// credential is rejected.
pub(crate) async fn establish(config: &ConnectionConfig) -> Result<Connection> {
    let mut connection = Connection::connect(&config.host, config.port)
        .await
        .context("failed to connect to host")?;
    if let Err(e) = connection.authenticate(&config.credential).await {
        close_quietly(connection).await;
        return Err(e).context("authentication failed");
    }
    Ok(connection)
}

/// Best-effort close once the command's own outcome is already decided.
pub(crate) async fn close_quietly(connection: Connection) {
    if let Err(e) = connection.close().await {
        warn!(error = %e, "failed to close the connection cleanly");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssh::Credential;
    use crate::ssh::keys::fixtures::PLAIN_ED25519;
    use serial_test::serial;

    fn password_args(var: &str) -> ConnectionArgs {
        ConnectionArgs {
            host: Some("cli-host".to_string()),
            user: Some("cli-user".to_string()),
            password_env: Some(var.to_string()),
            ..Default::default()
        }
    }

    #[test]
    #[serial]
    fn test_flags_override_the_job_file() {
        unsafe {
            std::env::set_var("SSHJOB_TEST_PASSWORD_A", "hunter2");
        }
        let job = JobFile {
            host: Some("job-host".to_string()),
            port: Some(2222),
            user: Some("job-user".to_string()),
            ..Default::default()
        };
        let config =
            build_connection_config(&password_args("SSHJOB_TEST_PASSWORD_A"), &job).unwrap();
        assert_eq!(config.host, "cli-host");
        assert_eq!(config.port, 2222);
        assert_eq!(config.credential.username(), "cli-user");
        assert!(matches!(&config.credential, Credential::Password { .. }));
        unsafe {
            std::env::remove_var("SSHJOB_TEST_PASSWORD_A");
        }
    }

    #[test]
    #[serial]
    fn test_job_file_fills_in_missing_flags() {
        unsafe {
            std::env::set_var("SSHJOB_TEST_PASSWORD_B", "hunter2");
        }
        let args = ConnectionArgs {
            password_env: Some("SSHJOB_TEST_PASSWORD_B".to_string()),
            ..Default::default()
        };
        let job = JobFile {
            host: Some("job-host".to_string()),
            user: Some("job-user".to_string()),
            ..Default::default()
        };
        let config = build_connection_config(&args, &job).unwrap();
        assert_eq!(config.host, "job-host");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.credential.username(), "job-user");
        unsafe {
            std::env::remove_var("SSHJOB_TEST_PASSWORD_B");
        }
    }

    #[test]
    fn test_missing_host_is_reported() {
        let args = ConnectionArgs {
            user: Some("ci".to_string()),
            ..Default::default()
        };
        let err = build_connection_config(&args, &JobFile::default()).unwrap_err();
        assert!(err.to_string().contains("no host given"));
    }

    #[test]
    fn test_missing_user_is_reported() {
        let args = ConnectionArgs {
            host: Some("build1".to_string()),
            ..Default::default()
        };
        let err = build_connection_config(&args, &JobFile::default()).unwrap_err();
        assert!(err.to_string().contains("no user given"));
    }

    #[test]
    #[serial]
    fn test_unset_password_variable_is_reported() {
        unsafe {
            std::env::remove_var("SSHJOB_TEST_PASSWORD_MISSING");
        }
        let err = build_connection_config(
            &password_args("SSHJOB_TEST_PASSWORD_MISSING"),
            &JobFile::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("SSHJOB_TEST_PASSWORD_MISSING"));
    }

    #[test]
    fn test_key_auth_reads_the_identity_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let key_path = dir.path().join("id_ed25519");
        std::fs::write(&key_path, PLAIN_ED25519).unwrap();
        let args = ConnectionArgs {
            host: Some("build1".to_string()),
            user: Some("ci".to_string()),
            auth: Some(AuthKind::Key),
            identity: Some(key_path),
            ..Default::default()
        };
        let config = build_connection_config(&args, &JobFile::default()).unwrap();
        assert!(matches!(&config.credential, Credential::KeyPair { .. }));
    }

    #[test]
    fn test_key_auth_without_an_identity_is_reported() {
        let args = ConnectionArgs {
            host: Some("build1".to_string()),
            user: Some("ci".to_string()),
            auth: Some(AuthKind::Key),
            ..Default::default()
        };
        let err = build_connection_config(&args, &JobFile::default()).unwrap_err();
        assert!(err.to_string().contains("no identity file given"));
    }
}
