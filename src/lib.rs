pub mod cli;
pub mod commands;
pub mod config;
pub mod exec;
pub mod ssh;
pub mod transfer;
pub mod utils;

pub use cli::Cli;
pub use config::JobFile;
pub use exec::{ExecutionOutcome, ExecutionRequest};
pub use ssh::{Connection, Credential};
pub use transfer::{TransferOutcome, TransferRequest};
