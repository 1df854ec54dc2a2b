//! Trusted-actor list loader.
//!
//! Format:
//! - One actor ID per line
//! - `#` starts a comment, on its own line or after an ID
//! - Empty lines are ignored

use std::num::ParseIntError;
use std::path::Path;

use guildwatch_fs::{Filesystem, FsError};
use guildwatch_schema::ActorId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrustLoadError {
    #[error("failed to read trusted list: {0}")]
    Read(#[from] FsError),

    #[error("invalid actor ID {value:?} on line {line}: {source}")]
    Parse {
        line: usize,
        value: String,
        #[source]
        source: ParseIntError,
    },
}

pub fn load_trusted<F: Filesystem>(fs: &F, path: &Path) -> Result<Vec<ActorId>, TrustLoadError> {
    let content = fs.read_file(path)?;
    parse_trusted(&content)
}

/// Parse trusted IDs in file order, dropping duplicates.
pub fn parse_trusted(content: &str) -> Result<Vec<ActorId>, TrustLoadError> {
    let mut trusted = Vec::new();

    for (line_num, line) in content.lines().enumerate() {
        let entry = match line.split_once('#') {
            Some((before, _)) => before.trim(),
            None => line.trim(),
        };
        if entry.is_empty() {
            continue;
        }

        let id = entry
            .parse::<u64>()
            .map(ActorId)
            .map_err(|source| TrustLoadError::Parse {
                line: line_num + 1,
                value: entry.to_string(),
                source,
            })?;
        if !trusted.contains(&id) {
            trusted.push(id);
        }
    }

    Ok(trusted)
}
