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

use anyhow::Result;
use clap::Parser;

use sshjob::{
    cli::{Cli, Commands},
    commands::{check_key, fetch, run},
    config::JobFile,
    utils::init_logging,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let job = JobFile::load(cli.job.as_deref()).await?;

    let exit_code = match &cli.command {
        Commands::Run {
            connection,
            script,
            command,
            timeout,
        } => run::execute(connection, script.as_deref(), command, *timeout, &job).await?,

        Commands::Fetch {
            connection,
            remote_path,
            pattern,
            local_path,
            base_dir,
        } => {
            fetch::execute(
                connection,
                remote_path.as_deref(),
                pattern.as_deref(),
                local_path.as_deref(),
                base_dir.as_deref(),
                &job,
            )
            .await?
        }

        Commands::CheckKey {
            identity,
            passphrase_env,
        } => check_key::execute(identity, passphrase_env.as_deref()).await?,
    };

    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}
