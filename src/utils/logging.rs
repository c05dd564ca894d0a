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

use tracing_subscriber::EnvFilter;

/// Filter directives for a given verbosity level.
fn filter_directives(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "sshjob=warn",
        1 => "sshjob=info",
        // -vv: include russh debug logs for SSH troubleshooting
        2 => "sshjob=debug,russh=debug",
        // -vvv: full trace including the transport
        _ => "sshjob=trace,russh=trace",
    }
}

/// Create an environment filter based on verbosity level.
pub fn create_env_filter(verbosity: u8) -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        // Use RUST_LOG if set (allows debugging russh and other dependencies)
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(filter_directives(verbosity))
    }
}

/// Initialize console logging. Call once, before any command runs.
pub fn init_logging(verbosity: u8) {
    tracing_subscriber::fmt()
        .with_env_filter(create_env_filter(verbosity))
        .with_target(true)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_by_default() {
        assert_eq!(filter_directives(0), "sshjob=warn");
    }

    #[test]
    fn verbosity_raises_level() {
        assert_eq!(filter_directives(1), "sshjob=info");
        assert!(filter_directives(2).contains("sshjob=debug"));
        assert!(filter_directives(2).contains("russh=debug"));
    }

    #[test]
    fn high_verbosity_traces_transport() {
        assert!(filter_directives(3).contains("sshjob=trace"));
        assert!(filter_directives(200).contains("russh=trace"));
    }
}
