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

//! Remote file retrieval over SCP.
//!
//! A fetch names a remote base path and an optional comma-separated
//! pattern. The pattern expands to a set of remote paths, each pulled with
//! its own `scp -f -r` conversation; every path is attempted even after
//! earlier ones fail, and the outcome keeps copied and failed paths apart.

pub mod scp;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

use crate::ssh::connection::Connection;
pub use scp::{ScpDownload, ScpError, ScpStats};

/// What to fetch and where to put it.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    /// Local directory the job works under.
    pub local_base_dir: PathBuf,
    /// Subdirectory of the base that receives the downloads.
    pub local_relative_path: String,
    /// Remote directory (or single file, with no pattern) to fetch from.
    pub remote_base_path: String,
    /// Comma-separated names under the base path; absent means the base
    /// path itself is the one entry.
    pub remote_pattern: Option<String>,
}

impl TransferRequest {
    /// Expand the pattern into the ordered set of remote paths to fetch.
    ///
    /// Entries are deduplicated and visited in descending lexicographic
    /// order. An empty or absent pattern selects the base path alone.
    /// Consecutive commas hold no token at all, but a whitespace-only
    /// token trims down to the bare `base/` entry and is attempted like
    /// any other.
    pub fn remote_file_set(&self) -> Vec<String> {
        let pattern = self.remote_pattern.as_deref().unwrap_or("");
        if pattern.is_empty() {
            return vec![self.remote_base_path.trim().to_string()];
        }
        let expanded: BTreeSet<String> = pattern
            .split(',')
            .filter(|token| !token.is_empty())
            .map(str::trim)
            .map(|token| format!("{}/{}", self.remote_base_path, token))
            .collect();
        expanded.into_iter().rev().collect()
    }

    /// The local directory the files land in.
    pub fn destination_dir(&self) -> PathBuf {
        self.local_base_dir.join(&self.local_relative_path)
    }
}

/// Disjoint accounting of one fetch run.
#[derive(Debug, Clone, Default)]
pub struct TransferOutcome {
    pub copied: BTreeSet<String>,
    pub failed: BTreeSet<String>,
}

impl TransferOutcome {
    pub fn is_failed(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Remembers which destination directories were already handled so each
/// is only set up once per run.
#[derive(Default)]
struct CreatedDirs {
    created: Vec<String>,
}

impl CreatedDirs {
    async fn ensure(&mut self, dir: &Path) {
        let candidate = absolute_key(dir);
        if self.created.iter().any(|known| known == &candidate) {
            return;
        }
        if let Some(known) = self.created.iter().find(|known| known.starts_with(&candidate)) {
            debug!(dir = %candidate, covered_by = %known, "directory already handled");
            return;
        }
        info!(dir = %candidate, "creating local directory");
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            // The copy itself will surface the failure if the directory
            // is genuinely unusable.
            debug!(dir = %candidate, error = %e, "could not create local directory");
        }
        self.created.push(candidate);
    }
}

fn absolute_key(dir: &Path) -> String {
    let absolute = if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(dir))
            .unwrap_or_else(|_| dir.to_path_buf())
    };
    absolute.to_string_lossy().into_owned()
}

/// Fetch every expanded remote path, best effort.
///
/// A failed path is recorded and the loop moves on; nothing short of the
/// caller dropping the connection stops the run early.
pub async fn fetch_all(connection: &Connection, request: &TransferRequest) -> TransferOutcome {
    let destination = request.destination_dir();
    let mut dirs = CreatedDirs::default();
    let mut outcome = TransferOutcome::default();

    for file in request.remote_file_set() {
        if outcome.copied.contains(&file) {
            info!(file = %file, "file already copied, skipping");
            continue;
        }
        dirs.ensure(&destination).await;
        info!(file = %file, "downloading");
        match download_one(connection, &file, &destination).await {
            Ok(stats) => {
                info!(
                    file = %file,
                    files = stats.files,
                    bytes = stats.bytes,
                    "downloaded successfully"
                );
                outcome.copied.insert(file);
            }
            Err(e) => {
                error!(file = %file, error = %e, "failed to download file");
                outcome.failed.insert(file);
            }
        }
    }

    if outcome.is_failed() {
        error!("copy failed: some files were not downloaded successfully");
    }
    outcome
}

async fn download_one(
    connection: &Connection,
    remote_path: &str,
    destination: &Path,
) -> Result<ScpStats, ScpError> {
    let download = connection.open_transfer(remote_path).await?;
    download.download_into(destination).await
}
