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

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use tracing::warn;

use crate::cli::ConnectionArgs;
use crate::config::{JobFile, expand_tilde};
use crate::transfer::{self, TransferOutcome, TransferRequest};

use super::{build_connection_config, establish};

/// Download the expanded remote file set and report what was copied.
///
/// Returns the process exit code: zero when every file was copied and the
/// connection closed cleanly.
pub async fn execute(
    connection_args: &ConnectionArgs,
    remote_path: Option<&str>,
    pattern: Option<&str>,
    local_path: Option<&str>,
    base_dir: Option<&Path>,
    job: &JobFile,
) -> Result<i32> {
    let request = resolve_request(remote_path, pattern, local_path, base_dir, job)?;
    let config = build_connection_config(connection_args, job)?;
    let connection = establish(&config).await?;

    let outcome = transfer::fetch_all(&connection, &request).await;
    let close_result = connection.close().await;
    print_summary(&outcome);

    match close_result {
        Ok(()) => {}
        // A dirty disconnect taints an otherwise clean run; when files
        // already failed it adds nothing.
        Err(e) if !outcome.is_failed() => {
            return Err(anyhow::Error::new(e)
                .context("transfer completed but the connection failed to close"));
        }
        Err(e) => warn!(error = %e, "failed to close the connection cleanly"),
    }

    Ok(if outcome.is_failed() { 1 } else { 0 })
}

/// Merge command-line flags over the job file's fetch section.
fn resolve_request(
    remote_path: Option<&str>,
    pattern: Option<&str>,
    local_path: Option<&str>,
    base_dir: Option<&Path>,
    job: &JobFile,
) -> Result<TransferRequest> {
    let section = job.fetch.clone().unwrap_or_default();

    let remote_base_path = remote_path
        .map(str::to_string)
        .or(section.remote_path)
        .context("no remote path given (use --remote-path or the job file)")?;
    let remote_pattern = pattern.map(str::to_string).or(section.pattern);
    let local_relative_path = local_path
        .map(str::to_string)
        .or(section.local_path)
        .context("no local path given (use --local-path or the job file)")?;
    let local_base_dir = base_dir
        .map(Path::to_path_buf)
        .or_else(|| {
            section
                .base_dir
                .as_deref()
                .map(|dir| expand_tilde(Path::new(dir)))
        })
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    Ok(TransferRequest {
        local_base_dir,
        local_relative_path,
        remote_base_path,
        remote_pattern,
    })
}

fn print_summary(outcome: &TransferOutcome) {
    println!();
    for file in &outcome.copied {
        println!("{} {}", "●".green(), file.bold());
    }
    for file in &outcome.failed {
        println!(
            "{} {}: {}",
            "●".red(),
            file.bold(),
            "failed to download".red()
        );
    }

    let copied = outcome.copied.len();
    let failed = outcome.failed.len();
    println!();
    if outcome.is_failed() {
        println!(
            "{} {copied} copied, {failed} failed",
            "Failed:".red().bold()
        );
    } else {
        println!("{} {copied} file(s) copied", "Success:".green().bold());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetchSection;
    use serial_test::serial;

    fn job_with_fetch() -> JobFile {
        JobFile {
            fetch: Some(FetchSection {
                remote_path: Some("/srv/out".to_string()),
                pattern: Some("a,b".to_string()),
                local_path: Some("incoming".to_string()),
                base_dir: Some("/work".to_string()),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn flags_override_the_job_file() {
        let request = resolve_request(
            Some("/other"),
            Some("x"),
            Some("results"),
            Some(Path::new("/tmp")),
            &job_with_fetch(),
        )
        .unwrap();
        assert_eq!(request.remote_base_path, "/other");
        assert_eq!(request.remote_pattern.as_deref(), Some("x"));
        assert_eq!(request.local_relative_path, "results");
        assert_eq!(request.local_base_dir, PathBuf::from("/tmp"));
    }

    #[test]
    fn job_file_fills_in_missing_flags() {
        let request = resolve_request(None, None, None, None, &job_with_fetch()).unwrap();
        assert_eq!(request.remote_base_path, "/srv/out");
        assert_eq!(request.remote_pattern.as_deref(), Some("a,b"));
        assert_eq!(request.local_relative_path, "incoming");
        assert_eq!(request.local_base_dir, PathBuf::from("/work"));
    }

    #[test]
    fn missing_remote_path_is_an_error() {
        let job = JobFile::default();
        assert!(resolve_request(None, None, Some("incoming"), None, &job).is_err());
    }

    #[test]
    fn missing_local_path_is_an_error() {
        let job = JobFile::default();
        assert!(resolve_request(Some("/srv/out"), None, None, None, &job).is_err());
    }

    #[test]
    #[serial]
    fn base_dir_defaults_to_the_current_directory() {
        let job = JobFile {
            fetch: Some(FetchSection {
                remote_path: Some("/srv/out".to_string()),
                local_path: Some("incoming".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let request = resolve_request(None, None, None, None, &job).unwrap();
        assert_eq!(request.local_base_dir, std::env::current_dir().unwrap());
    }

    #[test]
    #[serial]
    fn job_base_dir_expands_tilde() {
        unsafe {
            std::env::set_var("HOME", "/home/user");
        }
        let mut job = job_with_fetch();
        if let Some(fetch) = &mut job.fetch {
            fetch.base_dir = Some("~/jobs".to_string());
        }
        let request = resolve_request(None, None, None, None, &job).unwrap();
        assert_eq!(request.local_base_dir, PathBuf::from("/home/user/jobs"));
    }
}
