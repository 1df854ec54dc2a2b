//! File and stream input for CLI commands.
//!
//! - trusted-actor lists for the anti-nuke trust registry
//! - JSONL streams of events and admin commands

pub mod stream_reader;
pub mod trust_loader;

pub use stream_reader::{parse_record_line, parse_stream, StreamReadError};
pub use trust_loader::{load_trusted, parse_trusted, TrustLoadError};
