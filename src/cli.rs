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

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::ssh::AuthKind;

#[derive(Parser, Debug)]
#[command(
    name = "sshjob",
    version,
    about = "Run command sequences on a remote host over SSH and fetch the results",
    long_about = "sshjob connects to a single SSH host, runs a newline-delimited command sequence\nin order with fail-fast semantics, and retrieves result files over SCP.\nEach command gets a fresh session and a bounded local wait; the remote side is\nnever killed when the wait expires. Authentication supports passwords and\nprivate keys with or without a passphrase.",
    after_help = "EXAMPLES:\n  Run an inline command:        sshjob run -H build1 -u ci -c \"make test\"\n  Run a script file:            sshjob run -H build1 -u ci -f ./deploy.sh\n  Everything from a job file:   sshjob --job nightly.yaml run\n  Fetch build artifacts:        sshjob fetch -H build1 -u ci -r /srv/out --pattern \"app.tar.gz,app.sha256\" -l incoming\n  Inspect a private key:        sshjob check-key -i ~/.ssh/deploy_key\n\nSecrets are read from the environment (--password-env / --passphrase-env)\nor prompted for interactively when no variable is given."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        long,
        global = true,
        value_name = "FILE",
        help = "YAML job file with connection and job settings\nCommand-line flags override values from the file"
    )]
    pub job: Option<PathBuf>,

    #[arg(
        short = 'v',
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,
}

/// Connection flags shared by the subcommands that talk to a host.
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    #[arg(short = 'H', long, help = "Remote host name or address")]
    pub host: Option<String>,

    #[arg(short = 'p', long, help = "SSH port [default: 22]")]
    pub port: Option<u16>,

    #[arg(short = 'u', long, help = "Username for the SSH connection")]
    pub user: Option<String>,

    #[arg(
        long,
        value_enum,
        help = "Authentication method [default: password]\n  password       - username and password\n  key            - private key file\n  key-passphrase - encrypted private key file"
    )]
    pub auth: Option<AuthKind>,

    #[arg(
        short = 'i',
        long,
        help = "Private key file path (for key and key-passphrase auth)"
    )]
    pub identity: Option<PathBuf>,

    #[arg(
        long,
        value_name = "VAR",
        help = "Environment variable holding the password\nPrompts interactively when unset"
    )]
    pub password_env: Option<String>,

    #[arg(
        long,
        value_name = "VAR",
        help = "Environment variable holding the key passphrase\nPrompts interactively when unset"
    )]
    pub passphrase_env: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Execute a command sequence on the remote host",
        long_about = "Runs the given commands in order, one SSH session per command.\nExecution stops at the first command that fails; every command already\nattempted is reported with its exit code and captured output.\n\nExit codes: 0 (all commands succeeded), 1 (any failure)",
        after_help = "Examples:\n  sshjob run -H build1 -u ci -c \"make\" -c \"make test\"   # Inline commands, in order\n  sshjob run -H build1 -u ci -f ./nightly.sh            # Script file, one command per line\n  sshjob --job nightly.yaml run -t 600                  # Job file with a longer timeout"
    )]
    Run {
        #[command(flatten)]
        connection: ConnectionArgs,

        #[arg(
            short = 'f',
            long,
            conflicts_with = "command",
            help = "Script file with one command per line\nBlank lines are skipped; order is preserved"
        )]
        script: Option<PathBuf>,

        #[arg(
            short = 'c',
            long = "command",
            action = clap::ArgAction::Append,
            value_name = "CMD",
            help = "Command to run; repeat the flag to queue several in order"
        )]
        command: Vec<String>,

        #[arg(
            short = 't',
            long,
            value_parser = clap::value_parser!(u64).range(1..),
            help = "Local wait bound per command in seconds [default: 300]\nThe remote command is not killed when the bound expires"
        )]
        timeout: Option<u64>,
    },

    #[command(
        about = "Download result files from the remote host over SCP",
        long_about = "Expands the comma-separated pattern against the remote path and downloads\neach entry recursively over SCP. Every entry is attempted even when earlier\nones fail; the summary lists copied and failed paths separately.\n\nExit codes: 0 (everything copied), 1 (any path failed)",
        after_help = "Examples:\n  sshjob fetch -H build1 -u ci -r /srv/out/app.log          # Single file\n  sshjob fetch -H build1 -u ci -r /srv/out --pattern \"a,b\"  # /srv/out/a and /srv/out/b\n  sshjob --job nightly.yaml fetch -l incoming               # Destination under the base dir"
    )]
    Fetch {
        #[command(flatten)]
        connection: ConnectionArgs,

        #[arg(short = 'r', long, help = "Remote file or directory to fetch")]
        remote_path: Option<String>,

        #[arg(
            long,
            help = "Comma-separated names under the remote path\nAbsent or blank fetches the remote path itself"
        )]
        pattern: Option<String>,

        #[arg(
            short = 'l',
            long,
            help = "Local subdirectory (under the base dir) that receives the files"
        )]
        local_path: Option<String>,

        #[arg(
            long,
            help = "Local base directory [default: current directory]"
        )]
        base_dir: Option<PathBuf>,
    },

    #[command(
        name = "check-key",
        about = "Validate a private key file without connecting anywhere",
        long_about = "Parses the key file, prompting for a passphrase if the key is encrypted,\nand prints the key algorithm and fingerprint.\n\nExit codes: 0 (key is usable), 1 (key could not be parsed)"
    )]
    CheckKey {
        #[arg(short = 'i', long, help = "Private key file path")]
        identity: PathBuf,

        #[arg(
            long,
            value_name = "VAR",
            help = "Environment variable holding the key passphrase"
        )]
        passphrase_env: Option<String>,
    },
}
