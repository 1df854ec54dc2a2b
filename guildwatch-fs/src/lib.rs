//! Filesystem abstraction for guildwatch.
//!
//! This crate provides:
//! - Filesystem trait for atomic writes, appends and reads
//! - AuditWriter for appending audit records to day-chunked JSONL files

pub mod writer;

pub use writer::{
    audit_filename, parse_audit_filename, AuditLogFile, AuditWriter, Filesystem, FsError,
    JsonlAuditWriter, MockFilesystem, RealFilesystem,
};
