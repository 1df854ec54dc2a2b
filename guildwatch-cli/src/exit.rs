//! Exit codes for the guildwatch CLI.

use crate::commands::CommandError;

pub mod codes {
    pub const SUCCESS: i32 = 0;
    pub const INVALID_ARGS: i32 = 1;
    pub const IO_ERROR: i32 = 2;
    /// Trusted-actor file could not be read or parsed.
    pub const TRUST_LIST_ERROR: i32 = 3;
    /// A stream line was not a valid record.
    pub const STREAM_ERROR: i32 = 4;
    /// Interrupted by signal (128 + signal number).
    pub const SIGINT: i32 = 130;
}

/// Map a CommandError to an exit code.
pub fn exit_code(error: &CommandError) -> i32 {
    match error {
        CommandError::InvalidArgument(_) => codes::INVALID_ARGS,
        CommandError::Filesystem(_) => codes::IO_ERROR,
        CommandError::TrustList(_) => codes::TRUST_LIST_ERROR,
        CommandError::Stream(_) => codes::STREAM_ERROR,
    }
}
