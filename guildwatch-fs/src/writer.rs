//! Audit log writer.
//!
//! Audit records are appended as JSON lines to one file per UTC day:
//! `audit_YYYYMMDD.jsonl`.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use chrono::{TimeZone, Utc};
use guildwatch_schema::AuditRecord;
use thiserror::Error;

/// Errors from filesystem operations.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("path error: {0}")]
    Path(String),
}

/// An audit log file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditLogFile {
    pub path: PathBuf,
    /// Start of the file's UTC day, Unix milliseconds.
    pub day_start_ms: u64,
}

/// Trait for filesystem operations.
/// Abstracted for testing with mock implementations.
pub trait Filesystem: Send + Sync {
    /// Write data atomically to a path (write to temp, then rename).
    fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<(), FsError>;

    /// Append data to a file, creating it and its parents if needed.
    fn append(&self, path: &Path, data: &[u8]) -> Result<(), FsError>;

    fn read_file(&self, path: &Path) -> Result<String, FsError>;

    /// Audit log files in `dir`, oldest first.
    fn list_audit_logs(&self, dir: &Path) -> Result<Vec<AuditLogFile>, FsError>;

    fn exists(&self, path: &Path) -> bool;

    fn create_dir_all(&self, path: &Path) -> Result<(), FsError>;
}

/// Real filesystem implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFilesystem;

impl Filesystem for RealFilesystem {
    fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<(), FsError> {
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, data)?;
        // rename is atomic on the same filesystem
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    fn append(&self, path: &Path, data: &[u8]) -> Result<(), FsError> {
        use std::fs::OpenOptions;
        use std::io::Write;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(data)?;
        file.sync_data()?;
        Ok(())
    }

    fn read_file(&self, path: &Path) -> Result<String, FsError> {
        Ok(fs::read_to_string(path)?)
    }

    fn list_audit_logs(&self, dir: &Path) -> Result<Vec<AuditLogFile>, FsError> {
        let mut files = Vec::new();
        if !dir.exists() {
            return Ok(files);
        }

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|e| e == "jsonl") {
                if let Some(day_start_ms) = parse_audit_filename(&path) {
                    files.push(AuditLogFile { path, day_start_ms });
                }
            }
        }

        files.sort_by_key(|f| f.day_start_ms);
        Ok(files)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), FsError> {
        fs::create_dir_all(path)?;
        Ok(())
    }
}

/// Mock filesystem for testing.
/// Cloning creates a new handle to the same underlying data.
#[derive(Debug, Clone, Default)]
pub struct MockFilesystem {
    files: Arc<RwLock<HashMap<PathBuf, Vec<u8>>>>,
    dirs: Arc<RwLock<HashSet<PathBuf>>>,
}

impl MockFilesystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all files in the mock filesystem.
    pub fn files(&self) -> HashMap<PathBuf, Vec<u8>> {
        self.files.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn get_file(&self, path: &Path) -> Option<Vec<u8>> {
        self.files
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(path)
            .cloned()
    }

    /// Add a file directly (for test setup).
    pub fn add_file(&self, path: PathBuf, data: Vec<u8>) {
        self.files
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path, data);
    }
}

impl Filesystem for MockFilesystem {
    fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<(), FsError> {
        self.add_file(path.to_path_buf(), data.to_vec());
        Ok(())
    }

    fn append(&self, path: &Path, data: &[u8]) -> Result<(), FsError> {
        let mut files = self.files.write().unwrap_or_else(|e| e.into_inner());
        files
            .entry(path.to_path_buf())
            .or_default()
            .extend_from_slice(data);
        Ok(())
    }

    fn read_file(&self, path: &Path) -> Result<String, FsError> {
        match self.get_file(path) {
            Some(data) => String::from_utf8(data)
                .map_err(|e| FsError::Path(format!("invalid utf8: {}", e))),
            None => Err(FsError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("file not found: {}", path.display()),
            ))),
        }
    }

    fn list_audit_logs(&self, dir: &Path) -> Result<Vec<AuditLogFile>, FsError> {
        let files = self.files.read().unwrap_or_else(|e| e.into_inner());
        let mut logs: Vec<AuditLogFile> = files
            .keys()
            .filter(|p| p.parent() == Some(dir) && p.extension().is_some_and(|e| e == "jsonl"))
            .filter_map(|p| {
                parse_audit_filename(p).map(|day_start_ms| AuditLogFile {
                    path: p.clone(),
                    day_start_ms,
                })
            })
            .collect();
        logs.sort_by_key(|f| f.day_start_ms);
        Ok(logs)
    }

    fn exists(&self, path: &Path) -> bool {
        self.files
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(path)
            || self
                .dirs
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .contains(path)
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), FsError> {
        self.dirs
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.to_path_buf());
        Ok(())
    }
}

/// Parse the day from an audit log filename.
/// Expected format: audit_YYYYMMDD.jsonl
/// Returns the start of that UTC day in Unix milliseconds.
pub fn parse_audit_filename(path: &Path) -> Option<u64> {
    let stem = path.file_stem()?.to_str()?;
    let day = stem.strip_prefix("audit_")?;
    if day.len() != 8 || !day.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let year: i32 = day[0..4].parse().ok()?;
    let month: u32 = day[4..6].parse().ok()?;
    let date: u32 = day[6..8].parse().ok()?;

    Utc.with_ymd_and_hms(year, month, date, 0, 0, 0)
        .single()
        .and_then(|dt| u64::try_from(dt.timestamp_millis()).ok())
}

/// Daily audit log filename for a timestamp in Unix milliseconds.
pub fn audit_filename(ts_ms: u64) -> String {
    i64::try_from(ts_ms)
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .map(|dt| format!("audit_{}.jsonl", dt.format("%Y%m%d")))
        .unwrap_or_else(|| format!("audit_{}.jsonl", ts_ms))
}

/// Sink for audit records.
pub trait AuditWriter: Send + Sync {
    /// Persist one record. Returns the file it went to.
    fn write(&self, record: &AuditRecord) -> Result<PathBuf, FsError>;
}

/// Appends audit records to day-chunked JSONL files.
pub struct JsonlAuditWriter<F: Filesystem> {
    fs: F,
    output_dir: PathBuf,
}

impl<F: Filesystem> JsonlAuditWriter<F> {
    pub fn new(fs: F, output_dir: PathBuf) -> Self {
        Self { fs, output_dir }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn filesystem(&self) -> &F {
        &self.fs
    }
}

impl<F: Filesystem> AuditWriter for JsonlAuditWriter<F> {
    fn write(&self, record: &AuditRecord) -> Result<PathBuf, FsError> {
        self.fs.create_dir_all(&self.output_dir)?;

        let path = self.output_dir.join(audit_filename(record.ts_ms));
        let mut line = record.to_json();
        line.push('\n');
        self.fs.append(&path, line.as_bytes())?;

        Ok(path)
    }
}
