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

//! Sink side of the classic SCP source protocol.
//!
//! The remote `scp -f -r` process is the source; we are the sink that acks
//! each record with a zero byte and writes the transferred tree under a
//! local destination directory. Records are a single letter plus a line:
//! `C` for a file, `D`/`E` for entering and leaving a directory, `T` for
//! timestamps (acknowledged and ignored). Status bytes `\x01` and `\x02`
//! carry an error message from the source; either one fails the transfer,
//! which is how a missing remote path comes back.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

/// Upper bound on a single protocol line (names, messages).
const MAX_RECORD_LEN: usize = 4096;

/// Chunk size for file payload reads.
const DATA_BUFFER_SIZE: usize = 32 * 1024;

#[derive(Debug, Error)]
pub enum ScpError {
    #[error("local i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ssh transport error: {0}")]
    Ssh(#[from] russh::Error),

    #[error("remote scp failed: {0}")]
    Remote(String),

    #[error("scp protocol violation: {0}")]
    Protocol(String),

    #[error("remote sent an unsafe file name: {0:?}")]
    BadName(String),

    #[error("stream ended in the middle of a transfer")]
    UnexpectedEof,
}

/// Counters for one completed download.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScpStats {
    pub files: u64,
    pub directories: u64,
    pub bytes: u64,
}

/// One `scp -f` conversation over an exec channel stream.
pub struct ScpDownload<S> {
    stream: S,
}

impl<S: AsyncRead + AsyncWrite + Unpin> ScpDownload<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    /// Drive the protocol to completion, materialising everything the
    /// source sends under `dest_dir`.
    ///
    /// `dest_dir` must already exist. Nested directory records become
    /// subdirectories; the source decides the layout, we only refuse
    /// names that would escape the destination.
    pub async fn download_into(mut self, dest_dir: &Path) -> Result<ScpStats, ScpError> {
        let mut stats = ScpStats::default();
        let mut cwd = dest_dir.to_path_buf();
        let mut stack: Vec<PathBuf> = Vec::new();

        // The sink speaks first: one ack starts the source sending.
        self.send_ok().await?;

        loop {
            let first = match self.read_first_byte().await? {
                Some(byte) => byte,
                None if stack.is_empty() => {
                    // A conversation with no records delivered nothing.
                    if stats == ScpStats::default() {
                        return Err(ScpError::Protocol(
                            "source closed the stream without transferring anything".to_string(),
                        ));
                    }
                    return Ok(stats);
                }
                None => return Err(ScpError::UnexpectedEof),
            };
            match first {
                // Both status levels fail the transfer; a nonexistent path
                // arrives as `\x01scp: <path>: No such file or directory`.
                0x01 | 0x02 => {
                    let message = self.read_line().await?;
                    return Err(ScpError::Remote(message));
                }
                b'T' => {
                    // Timestamps are acknowledged but not applied.
                    let _ = self.read_line().await?;
                    self.send_ok().await?;
                }
                b'C' => {
                    let line = self.read_line().await?;
                    let (mode, length, name) = parse_entry(&line)?;
                    check_name(&name)?;
                    let path = cwd.join(&name);
                    trace!(path = %path.display(), length, "file record");
                    self.receive_file(&path, mode, length).await?;
                    stats.files += 1;
                    stats.bytes += length;
                }
                b'D' => {
                    let line = self.read_line().await?;
                    let (mode, _, name) = parse_entry(&line)?;
                    check_name(&name)?;
                    let dir = cwd.join(&name);
                    debug!(dir = %dir.display(), "entering directory");
                    tokio::fs::create_dir_all(&dir).await?;
                    apply_mode(&dir, mode).await;
                    stack.push(std::mem::replace(&mut cwd, dir));
                    stats.directories += 1;
                    self.send_ok().await?;
                }
                b'E' => {
                    let _ = self.read_line().await?;
                    match stack.pop() {
                        Some(parent) => cwd = parent,
                        None => {
                            return Err(ScpError::Protocol(
                                "directory end without a matching start".to_string(),
                            ));
                        }
                    }
                    self.send_ok().await?;
                }
                other => {
                    return Err(ScpError::Protocol(format!(
                        "unexpected record type byte {other:#04x}"
                    )));
                }
            }
        }
    }

    async fn receive_file(&mut self, path: &Path, mode: u32, length: u64) -> Result<(), ScpError> {
        // The file must be creatable before we commit to the payload;
        // a local failure here leaves the record unacknowledged.
        let mut file = File::create(path).await?;
        self.send_ok().await?;

        let mut buf = vec![0u8; DATA_BUFFER_SIZE];
        let mut remaining = length;
        while remaining > 0 {
            let want = remaining.min(DATA_BUFFER_SIZE as u64) as usize;
            let n = self.stream.read(&mut buf[..want]).await?;
            if n == 0 {
                return Err(ScpError::UnexpectedEof);
            }
            file.write_all(&buf[..n]).await?;
            remaining -= n as u64;
        }
        file.flush().await?;
        drop(file);
        apply_mode(path, mode).await;

        // The source follows the payload with its own status byte.
        match self.read_first_byte().await? {
            Some(0x00) => {}
            Some(0x01) | Some(0x02) => {
                let message = self.read_line().await?;
                return Err(ScpError::Remote(message));
            }
            Some(other) => {
                return Err(ScpError::Protocol(format!(
                    "unexpected status byte {other:#04x} after file payload"
                )));
            }
            None => return Err(ScpError::UnexpectedEof),
        }
        self.send_ok().await?;
        Ok(())
    }

    async fn send_ok(&mut self) -> Result<(), ScpError> {
        self.stream.write_all(&[0u8]).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// One byte, or `None` on a clean end of stream.
    async fn read_first_byte(&mut self) -> Result<Option<u8>, ScpError> {
        let mut byte = [0u8; 1];
        match self.stream.read(&mut byte).await? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    /// The remainder of a record line, without the trailing newline.
    async fn read_line(&mut self) -> Result<String, ScpError> {
        let mut line = Vec::new();
        loop {
            let mut byte = [0u8; 1];
            if self.stream.read(&mut byte).await? == 0 {
                return Err(ScpError::UnexpectedEof);
            }
            if byte[0] == b'\n' {
                break;
            }
            line.push(byte[0]);
            if line.len() > MAX_RECORD_LEN {
                return Err(ScpError::Protocol("record line too long".to_string()));
            }
        }
        Ok(String::from_utf8_lossy(&line).into_owned())
    }
}

/// Split a `C`/`D` record body into its mode, length and name fields.
fn parse_entry(line: &str) -> Result<(u32, u64, String), ScpError> {
    let mut parts = line.splitn(3, ' ');
    let mode = parts
        .next()
        .and_then(|field| u32::from_str_radix(field, 8).ok())
        .ok_or_else(|| ScpError::Protocol(format!("bad mode in record {line:?}")))?;
    let length = parts
        .next()
        .and_then(|field| field.parse::<u64>().ok())
        .ok_or_else(|| ScpError::Protocol(format!("bad length in record {line:?}")))?;
    let name = parts
        .next()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ScpError::Protocol(format!("missing name in record {line:?}")))?;
    Ok((mode, length, name.to_string()))
}

/// Names arrive from the remote side; only bare path components are safe.
fn check_name(name: &str) -> Result<(), ScpError> {
    let traversal = name == "." || name == "..";
    let separators = name.contains('/') || name.contains('\\') || name.contains('\0');
    if name.is_empty() || traversal || separators {
        return Err(ScpError::BadName(name.to_string()));
    }
    Ok(())
}

#[cfg(unix)]
async fn apply_mode(path: &Path, mode: u32) {
    use std::fs::Permissions;
    use std::os::unix::fs::PermissionsExt;

    let permissions = Permissions::from_mode(mode & 0o7777);
    if let Err(e) = tokio::fs::set_permissions(path, permissions).await {
        debug!(path = %path.display(), error = %e, "could not apply remote mode");
    }
}

#[cfg(not(unix))]
async fn apply_mode(_path: &Path, _mode: u32) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_parsing_reads_mode_length_and_name() {
        let (mode, length, name) = parse_entry("0644 1234 report.txt").unwrap();
        assert_eq!(mode, 0o644);
        assert_eq!(length, 1234);
        assert_eq!(name, "report.txt");
    }

    #[test]
    fn entry_names_may_contain_spaces() {
        let (_, _, name) = parse_entry("0644 5 a file name").unwrap();
        assert_eq!(name, "a file name");
    }

    #[test]
    fn entry_parsing_rejects_a_bad_mode() {
        assert!(matches!(
            parse_entry("notoctal 5 x"),
            Err(ScpError::Protocol(_))
        ));
    }

    #[test]
    fn entry_parsing_rejects_a_bad_length() {
        assert!(matches!(
            parse_entry("0644 many x"),
            Err(ScpError::Protocol(_))
        ));
    }

    #[test]
    fn entry_parsing_rejects_a_missing_name() {
        assert!(matches!(parse_entry("0644 5"), Err(ScpError::Protocol(_))));
        assert!(matches!(parse_entry("0644 5 "), Err(ScpError::Protocol(_))));
    }

    #[test]
    fn safe_names_pass() {
        assert!(check_name("notes.txt").is_ok());
        assert!(check_name("..hidden").is_ok());
    }

    #[test]
    fn traversal_names_are_rejected() {
        for name in [".", "..", "a/b", "a\\b", "nul\0byte", ""] {
            assert!(matches!(check_name(name), Err(ScpError::BadName(_))), "{name:?}");
        }
    }
}
