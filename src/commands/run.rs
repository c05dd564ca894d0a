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
use std::time::Duration;

use anyhow::{Context, Result, bail};
use owo_colors::OwoColorize;
use tokio::fs;

use crate::cli::ConnectionArgs;
use crate::config::JobFile;
use crate::exec::{self, DEFAULT_COMMAND_TIMEOUT_SECS, ExecutionOutcome, ExecutionRequest};

use super::{build_connection_config, close_quietly, establish};

/// Run the command sequence and report per-command results.
///
/// Returns the process exit code: zero when every command succeeded.
pub async fn execute(
    connection_args: &ConnectionArgs,
    script_file: Option<&Path>,
    inline: &[String],
    timeout_secs: Option<u64>,
    job: &JobFile,
) -> Result<i32> {
    let script = load_script(script_file, inline, job).await?;
    let timeout = timeout_secs
        .or(job.timeout)
        .unwrap_or(DEFAULT_COMMAND_TIMEOUT_SECS);
    if timeout == 0 {
        bail!("the command timeout must be at least 1 second");
    }

    let request = ExecutionRequest::from_script(&script, Duration::from_secs(timeout));
    if request.commands.is_empty() {
        bail!("no commands to run: the script is empty");
    }

    let config = build_connection_config(connection_args, job)?;
    let connection = establish(&config).await?;
    let outcome = exec::run(&connection, &request).await;
    close_quietly(connection).await;

    print_summary(&outcome);
    Ok(if outcome.is_failed() { 1 } else { 0 })
}

/// The script source, in priority order: file flag, inline commands,
/// job file.
async fn load_script(
    script_file: Option<&Path>,
    inline: &[String],
    job: &JobFile,
) -> Result<String> {
    if let Some(path) = script_file {
        return fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read script file at {path:?}"));
    }
    if !inline.is_empty() {
        return Ok(inline.join("\n"));
    }
    if let Some(script) = &job.script {
        return Ok(script.clone());
    }
    bail!("no commands given (use --script, --command, or the job file)")
}

fn print_summary(outcome: &ExecutionOutcome) {
    println!();
    for log in &outcome.commands {
        if log.succeeded() {
            println!("{} {}", "●".green(), log.command.bold());
        } else {
            println!("{} {}", "●".red(), log.command.bold());
            match log.exit_code {
                Some(code) => println!("    {}", format!("exit code {code}").dimmed()),
                None => println!("    {}", "no exit status".dimmed()),
            }
            if let Some(message) = &log.error_message {
                for line in message.lines() {
                    println!("    {}", line.dimmed());
                }
            }
            for line in &log.stderr_lines {
                println!("    {}", line.dimmed());
            }
        }
    }

    let attempted = outcome.commands.len();
    let succeeded = outcome
        .commands
        .iter()
        .filter(|log| log.succeeded())
        .count();
    println!();
    if outcome.is_failed() {
        println!(
            "{} {succeeded}/{attempted} commands succeeded",
            "Failed:".red().bold()
        );
    } else {
        println!(
            "{} {attempted}/{attempted} commands succeeded",
            "Success:".green().bold()
        );
    }
}
