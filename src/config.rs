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

//! Optional YAML job file.
//!
//! Everything in the job file can also be given on the command line;
//! command-line values win. The file is strict about field names so a
//! typo fails loudly instead of silently prompting.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::ssh::AuthKind;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobFile {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub auth: Option<AuthKind>,
    /// Path to the private key file; `~/` expands against `$HOME`.
    pub identity: Option<String>,
    /// Environment variable holding the password.
    pub password_env: Option<String>,
    /// Environment variable holding the key passphrase.
    pub passphrase_env: Option<String>,
    /// Newline-delimited script to run.
    pub script: Option<String>,
    /// Per-command wait bound in seconds.
    pub timeout: Option<u64>,

    #[serde(default)]
    pub fetch: Option<FetchSection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FetchSection {
    pub remote_path: Option<String>,
    pub pattern: Option<String>,
    pub local_path: Option<String>,
    pub base_dir: Option<String>,
}

impl JobFile {
    /// Load the job file, or an empty one when no path was given.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let expanded_path = expand_tilde(path);

        let content = fs::read_to_string(&expanded_path)
            .await
            .with_context(|| format!("Failed to read job file at {expanded_path:?}. Please check the path and file permissions."))?;

        let job: JobFile = serde_yaml::from_str(&content).with_context(|| {
            format!("Failed to parse YAML job file at {expanded_path:?}. Please check the YAML syntax and field names.")
        })?;

        Ok(job)
    }

    pub fn identity_path(&self) -> Option<PathBuf> {
        self.identity
            .as_deref()
            .map(|identity| expand_tilde(Path::new(identity)))
    }
}

pub(crate) fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(path_str) = path.to_str()
        && path_str.starts_with("~/")
        && let Ok(home) = std::env::var("HOME")
    {
        return PathBuf::from(path_str.replacen("~", &home, 1));
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_expand_tilde() {
        unsafe {
            std::env::set_var("HOME", "/home/user");
        }
        let path = Path::new("~/.ssh/id_ed25519");
        let expanded = expand_tilde(path);
        assert_eq!(expanded, PathBuf::from("/home/user/.ssh/id_ed25519"));
    }

    #[test]
    fn test_plain_paths_are_untouched() {
        let path = Path::new("/etc/keys/deploy");
        assert_eq!(expand_tilde(path), PathBuf::from("/etc/keys/deploy"));
    }

    #[test]
    fn test_job_file_parsing() {
        let yaml = r#"
host: build-03.example.com
port: 2222
user: deploy
auth: key-passphrase
identity: ~/.ssh/deploy_key
passphrase_env: DEPLOY_PASSPHRASE
script: |
  make release
  make package
timeout: 120

fetch:
  remote_path: /srv/builds
  pattern: app.tar.gz,app.tar.gz.sha256
  local_path: incoming
"#;

        let job: JobFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(job.host, Some("build-03.example.com".to_string()));
        assert_eq!(job.port, Some(2222));
        assert_eq!(job.auth, Some(AuthKind::KeyWithPassphrase));
        assert_eq!(job.timeout, Some(120));
        assert_eq!(
            job.script.as_deref(),
            Some("make release\nmake package\n")
        );

        let fetch = job.fetch.unwrap();
        assert_eq!(fetch.remote_path, Some("/srv/builds".to_string()));
        assert_eq!(
            fetch.pattern,
            Some("app.tar.gz,app.tar.gz.sha256".to_string())
        );
        assert_eq!(fetch.local_path, Some("incoming".to_string()));
        assert_eq!(fetch.base_dir, None);
    }

    #[test]
    fn test_auth_kind_aliases() {
        let job: JobFile = serde_yaml::from_str("auth: key-with-passphrase").unwrap();
        assert_eq!(job.auth, Some(AuthKind::KeyWithPassphrase));
        let job: JobFile = serde_yaml::from_str("auth: password").unwrap();
        assert_eq!(job.auth, Some(AuthKind::Password));
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let result: std::result::Result<JobFile, _> =
            serde_yaml::from_str("pasword_env: OOPS");
        assert!(result.is_err());
    }
}
