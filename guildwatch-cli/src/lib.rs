//! guildwatch command line library.
//!
//! The binary in `main.rs` is a thin wrapper; everything testable lives here.

pub mod cli;
pub mod commands;
pub mod exit;
pub mod io;

pub use cli::{parse_from, CheckArgs, Cli, CliError, Command, GuardArgs, ReplayArgs, WatchArgs};
pub use commands::{CommandError, CommandResult, ShutdownFlag};
pub use exit::exit_code;
