//! Acquisition timestamps embedded in file names.
//!
//! Files carry a canonical tag `DateTimeKeyStart_YYYY_MM_DD_HH_MM_SS_DateTimeKeyEnd`.
//! Untagged exports are normalized once by prefixing a tag built from their
//! modification time; after that the name alone determines the timestamp.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local, NaiveDateTime, Timelike};
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use crate::core::loaders::has_csv_extension;

/// Literal that opens the timestamp tag.
pub const TAG_START: &str = "DateTimeKeyStart_";

/// Literal that closes the timestamp tag.
pub const TAG_END: &str = "_DateTimeKeyEnd";

/// chrono format of the tag body.
pub const TAG_FORMAT: &str = "%Y_%m_%d_%H_%M_%S";

static TAG_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"DateTimeKeyStart_(\d{4}_\d{2}_\d{2}_\d{2}_\d{2}_\d{2})_DateTimeKeyEnd")
        .expect("timestamp tag pattern is valid")
});

/// Errors that can occur while resolving or assigning timestamps.
#[derive(Debug, Error)]
pub enum TimestampError {
    #[error("Failed to read metadata for {path}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to rename {from} -> {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Rename target already exists: {0}")]
    TargetExists(PathBuf),

    #[error("Path has no UTF-8 file name: {0}")]
    InvalidFileName(PathBuf),

    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),
}

/// Result type for timestamp operations.
pub type Result<T> = std::result::Result<T, TimestampError>;

/// Where a resolved timestamp came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TimestampSource {
    /// Parsed from the canonical tag in the name.
    Tag,
    /// Taken from the file's modification time.
    Modified,
}

/// A timestamp together with its provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTimestamp {
    pub timestamp: NaiveDateTime,
    pub source: TimestampSource,
}

/// A file renamed by [`normalize_directory`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenamedFile {
    pub from: PathBuf,
    pub to: PathBuf,
    pub timestamp: NaiveDateTime,
}

/// A file the normalization pass could not tag.
#[derive(Debug, Clone, Serialize)]
pub struct RenameFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of one normalization pass over a folder.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NormalizeReport {
    /// Files renamed (or that would be renamed in a dry run).
    pub renamed: Vec<RenamedFile>,
    /// Files left untagged because the rename failed.
    pub failed: Vec<RenameFailure>,
    /// Files that already carried a tag.
    pub already_tagged: usize,
}

impl NormalizeReport {
    /// Returns true if the pass changed (or would change) nothing.
    pub fn is_noop(&self) -> bool {
        self.renamed.is_empty() && self.failed.is_empty()
    }
}

/// Extract the timestamp encoded in a file name, if any.
///
/// Returns `None` when the name has no tag or the tag holds an impossible
/// calendar value (e.g. month 13).
pub fn parse_tag(file_name: &str) -> Option<NaiveDateTime> {
    let captures = TAG_PATTERN.captures(file_name)?;
    let body = captures.get(1)?.as_str();
    NaiveDateTime::parse_from_str(body, TAG_FORMAT).ok()
}

/// Format a timestamp as a complete tag.
pub fn format_tag(timestamp: &NaiveDateTime) -> String {
    format!("{}{}{}", TAG_START, timestamp.format(TAG_FORMAT), TAG_END)
}

/// Name an untagged file receives: the tag followed directly by the old name.
pub fn tagged_name(timestamp: &NaiveDateTime, file_name: &str) -> String {
    format!("{}{}", format_tag(timestamp), file_name)
}

/// Convert a filesystem time to local wall-clock time, truncated to seconds.
pub fn local_timestamp(time: SystemTime) -> NaiveDateTime {
    let local: DateTime<Local> = time.into();
    let naive = local.naive_local();
    naive.with_nanosecond(0).unwrap_or(naive)
}

/// Modification time of a file as a local timestamp.
pub fn modified_timestamp(path: &Path) -> Result<NaiveDateTime> {
    let modified = fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map_err(|source| TimestampError::Metadata {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(local_timestamp(modified))
}

/// Resolve a file's timestamp without touching the filesystem name.
///
/// The tag wins; otherwise the modification time is used.
pub fn resolve_timestamp(path: &Path) -> Result<ResolvedTimestamp> {
    let file_name = file_name_str(path)?;

    if let Some(timestamp) = parse_tag(file_name) {
        return Ok(ResolvedTimestamp {
            timestamp,
            source: TimestampSource::Tag,
        });
    }

    Ok(ResolvedTimestamp {
        timestamp: modified_timestamp(path)?,
        source: TimestampSource::Modified,
    })
}

/// Tag a single file in place if it has no tag yet.
///
/// Returns `Ok(None)` for files that are already tagged. An existing file at
/// the target name is never overwritten.
pub fn ensure_tagged(path: &Path, dry_run: bool) -> Result<Option<RenamedFile>> {
    let file_name = file_name_str(path)?;
    if parse_tag(file_name).is_some() {
        return Ok(None);
    }

    let timestamp = modified_timestamp(path)?;
    let dest = path.with_file_name(tagged_name(&timestamp, file_name));

    if dest.exists() {
        return Err(TimestampError::TargetExists(dest));
    }

    if !dry_run {
        fs::rename(path, &dest).map_err(|source| TimestampError::Rename {
            from: path.to_path_buf(),
            to: dest.clone(),
            source,
        })?;
    }

    Ok(Some(RenamedFile {
        from: path.to_path_buf(),
        to: dest,
        timestamp,
    }))
}

/// List the CSV files directly inside `directory`, sorted by path.
pub fn list_csv_files(directory: &Path) -> Result<Vec<PathBuf>> {
    if !directory.is_dir() {
        return Err(TimestampError::DirectoryNotFound(directory.to_path_buf()));
    }

    let mut csv_files: Vec<PathBuf> = fs::read_dir(directory)
        .map_err(|source| TimestampError::Metadata {
            path: directory.to_path_buf(),
            source,
        })?
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", directory.display(), e);
                None
            }
        })
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .map(has_csv_extension)
                    .unwrap_or(false)
        })
        .collect();

    csv_files.sort();
    Ok(csv_files)
}

/// Tag every untagged CSV file in a folder.
///
/// The folder is listed once up front and renames run afterwards in path
/// order, so the listing never observes a half-renamed directory. Running the
/// pass twice is a no-op the second time.
pub fn normalize_directory(directory: &Path, dry_run: bool) -> Result<NormalizeReport> {
    let csv_files = list_csv_files(directory)?;
    let mut report = NormalizeReport::default();

    for path in csv_files {
        match ensure_tagged(&path, dry_run) {
            Ok(Some(renamed)) => {
                if dry_run {
                    info!(
                        "Would rename {} -> {}",
                        renamed.from.display(),
                        renamed.to.display()
                    );
                } else {
                    debug!("Renamed {} -> {}", renamed.from.display(), renamed.to.display());
                }
                report.renamed.push(renamed);
            }
            Ok(None) => report.already_tagged += 1,
            Err(e) => {
                warn!("Could not tag {}: {}", path.display(), e);
                report.failed.push(RenameFailure {
                    path,
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(report)
}

fn file_name_str(path: &Path) -> Result<&str> {
    path.file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| TimestampError::InvalidFileName(path.to_path_buf()))
}
