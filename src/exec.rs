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

//! Fail-fast execution of an ordered command sequence.
//!
//! Each command runs in its own fresh session. Standard output is captured
//! line by line as it arrives; the whole drive of a command is bounded by
//! the request timeout. The bound is a local join, not a kill: when it
//! expires the session is torn down but the remote process may keep
//! running.

use std::time::Duration;

use russh::client::Msg;
use russh::{Channel, ChannelMsg};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::ssh::connection::Connection;

/// Default bound on a single command's local wait.
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 300;

/// An ordered script plus the per-command wait bound.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub commands: Vec<String>,
    pub timeout: Duration,
}

impl ExecutionRequest {
    /// Split newline-delimited script text into the ordered command list.
    ///
    /// Order is preserved exactly. Blank lines are dropped; everything else
    /// is kept verbatim, leading whitespace included.
    pub fn from_script(script: &str, timeout: Duration) -> Self {
        let commands = script
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect();
        Self { commands, timeout }
    }
}

/// Everything recorded about one attempted command.
#[derive(Debug, Clone, Default)]
pub struct CommandLog {
    pub command: String,
    pub stdout_lines: Vec<String>,
    pub stderr_lines: Vec<String>,
    pub exit_code: Option<u32>,
    pub error_message: Option<String>,
}

impl CommandLog {
    fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            ..Default::default()
        }
    }

    /// A command succeeded only with a zero exit and no remote error.
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0) && self.error_message.is_none()
    }
}

/// Ordered per-command records plus the aggregate verdict.
///
/// `commands` holds an entry for every command actually attempted; after
/// the first failure nothing else is attempted.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOutcome {
    pub commands: Vec<CommandLog>,
    pub failed: bool,
}

impl ExecutionOutcome {
    /// Conclude an outcome from attempted command logs.
    ///
    /// The request failed when any attempted command failed, or when no
    /// command succeeded at all (an empty script succeeds at nothing).
    pub fn from_commands(commands: Vec<CommandLog>) -> Self {
        let any_failed = commands.iter().any(|log| !log.succeeded());
        let none_succeeded = !commands.iter().any(CommandLog::succeeded);
        Self {
            commands,
            failed: any_failed || none_succeeded,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }
}

/// Run every command in order, stopping at the first failure.
///
/// Failures are data, not errors: session-level problems become the failing
/// command's error message, so the outcome always lists every attempted
/// command in order.
pub async fn run(connection: &Connection, request: &ExecutionRequest) -> ExecutionOutcome {
    let mut logs = Vec::new();
    for command in &request.commands {
        info!(command = %command, "exec");
        let log = run_single(connection, command, request.timeout).await;
        let ok = log.succeeded();
        if !ok {
            report_failure(&log);
        }
        logs.push(log);
        if !ok {
            break;
        }
    }
    let outcome = ExecutionOutcome::from_commands(logs);
    if !outcome.failed {
        info!("successfully executed all commands");
    }
    outcome
}

fn report_failure(log: &CommandLog) {
    match log.exit_code {
        Some(code) => error!(command = %log.command, exit_code = code, "command failed"),
        None => error!(command = %log.command, "command produced no exit status"),
    }
    if let Some(message) = &log.error_message {
        error!(details = %message, "error details");
    } else if !log.stderr_lines.is_empty() {
        error!(details = %log.stderr_lines.join("\n"), "error details");
    }
}

async fn run_single(connection: &Connection, command: &str, limit: Duration) -> CommandLog {
    let mut log = CommandLog::new(command);
    let mut channel = match connection.open_session().await {
        Ok(channel) => channel,
        Err(e) => {
            log.error_message = Some(format!("failed to open session: {e}"));
            return log;
        }
    };

    match timeout(limit, drive(&mut channel, command, &mut log)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            log.error_message = Some(format!("session error: {e}"));
        }
        Err(_) => {
            log.error_message = Some(format!(
                "no completion within {}s; abandoning the local wait (the remote command may still be running)",
                limit.as_secs()
            ));
        }
    }

    // Session teardown on every path, timeout included. A close failure
    // is logged, never folded into the command's outcome.
    if let Err(e) = channel.close().await {
        warn!(error = %e, "failed to close command session");
    }
    log
}

async fn drive(
    channel: &mut Channel<Msg>,
    command: &str,
    log: &mut CommandLog,
) -> Result<(), russh::Error> {
    channel.exec(true, command).await?;

    let mut stdout = LineBuffer::default();
    let mut stderr = LineBuffer::default();
    while let Some(msg) = channel.wait().await {
        match msg {
            ChannelMsg::Data { ref data } => {
                for line in stdout.feed(data) {
                    info!("{line}");
                    log.stdout_lines.push(line);
                }
            }
            ChannelMsg::ExtendedData { ref data, ext } if ext == 1 => {
                for line in stderr.feed(data) {
                    debug!(stderr = %line, "remote stderr");
                    log.stderr_lines.push(line);
                }
            }
            // The exit status can arrive before trailing data; keep reading
            // until the channel itself ends.
            ChannelMsg::ExitStatus { exit_status } => log.exit_code = Some(exit_status),
            ChannelMsg::ExitSignal {
                signal_name,
                error_message,
                ..
            } => {
                log.error_message = Some(format!(
                    "remote command terminated by signal {signal_name:?}: {error_message}"
                ));
            }
            _ => {}
        }
    }
    if let Some(line) = stdout.flush() {
        info!("{line}");
        log.stdout_lines.push(line);
    }
    if let Some(line) = stderr.flush() {
        log.stderr_lines.push(line);
    }
    Ok(())
}

/// Incremental splitter turning a byte stream into UTF-8 text lines.
#[derive(Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Absorb a chunk and return the lines it completed.
    fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Drain whatever is left as a final unterminated line.
    fn flush(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(line)
    }
}
