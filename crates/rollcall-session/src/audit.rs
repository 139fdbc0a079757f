//! Append-only CSV audit trail, one file per session.
//!
//! Rows are `name,local time,rounded meters`. Every append is flushed to
//! the OS before returning so an export taken at any moment sees every
//! accepted submission.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use rollcall_core::error::{AppError, ErrorKind};
use rollcall_core::result::AppResult;

/// Column header written when a log is created.
pub const AUDIT_HEADER: [&str; 3] = ["ParticipantName", "Time", "Distance(m)"];

/// Local wall-clock format used in rows.
const ROW_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Timestamp format embedded in file names.
const FILE_TIME_FORMAT: &str = "%Y%m%d_%H%M%S";

const MAX_NAME_ATTEMPTS: u32 = 100;

/// One session's audit file.
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    file: Option<File>,
    rows: u64,
}

impl AuditLog {
    /// Create the log file under `directory` and write the header row.
    pub async fn create(
        directory: &Path,
        session_name: &str,
        started_at: DateTime<Utc>,
    ) -> AppResult<Self> {
        fs::create_dir_all(directory).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create audit directory {}", directory.display()),
                e,
            )
        })?;

        let (path, file) = create_unique(directory, &file_name(session_name, started_at)).await?;

        let mut log = Self {
            path,
            file: Some(file),
            rows: 0,
        };
        log.write_line(&render_row(&AUDIT_HEADER)).await?;
        debug!(path = %log.path.display(), "Audit log created");
        Ok(log)
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of data rows appended since creation.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    /// Append one submission row and flush.
    pub async fn append(
        &mut self,
        name: &str,
        at: DateTime<Utc>,
        distance_meters: f64,
    ) -> AppResult<()> {
        let time = format_local(at);
        let distance = format_distance(distance_meters);
        self.write_line(&render_row(&[name, &time, &distance])).await?;
        self.rows += 1;
        Ok(())
    }

    /// Flush buffered bytes to the OS.
    pub async fn flush(&mut self) -> AppResult<()> {
        if let Some(file) = self.file.as_mut() {
            file.flush().await?;
        }
        Ok(())
    }

    /// Flush, sync, and release the file handle. Idempotent.
    pub async fn close(&mut self) -> AppResult<()> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.sync_all().await?;
            debug!(path = %self.path.display(), rows = self.rows, "Audit log closed");
        }
        Ok(())
    }

    /// Flush, then read the whole file.
    pub async fn read_contents(&mut self) -> AppResult<String> {
        self.flush().await?;
        fs::read_to_string(&self.path).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to read audit log {}", self.path.display()),
                e,
            )
        })
    }

    async fn write_line(&mut self, line: &str) -> AppResult<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| AppError::storage(format!("Audit log {} is closed", self.path.display())))?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Open `name` under `directory` for writing without clobbering an
/// existing file; on collision a `-2`, `-3`, ... suffix is tried.
async fn create_unique(directory: &Path, name: &str) -> AppResult<(PathBuf, File)> {
    let stem = name.strip_suffix(".csv").unwrap_or(name);
    for attempt in 1..=MAX_NAME_ATTEMPTS {
        let candidate = if attempt == 1 {
            directory.join(name)
        } else {
            directory.join(format!("{stem}-{attempt}.csv"))
        };
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
            .await
        {
            Ok(file) => return Ok((candidate, file)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to create audit log {}", candidate.display()),
                    e,
                ));
            }
        }
    }
    Err(AppError::storage(format!(
        "No free audit log name for {name} in {}",
        directory.display()
    )))
}

/// Render a complete CSV document (header included) from rows of
/// `(name, submitted_at, distance)`.
pub fn render_document<'a>(
    rows: impl IntoIterator<Item = (&'a str, DateTime<Utc>, f64)>,
) -> String {
    let mut out = render_row(&AUDIT_HEADER);
    for (name, at, distance) in rows {
        let time = format_local(at);
        let distance = format_distance(distance);
        out.push_str(&render_row(&[name, &time, &distance]));
    }
    out
}

/// `{name}_{YYYYmmdd_HHMMSS}.csv`, with `Group` standing in for a blank name.
pub fn file_name(session_name: &str, started_at: DateTime<Utc>) -> String {
    let cleaned: String = session_name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let stem = if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "Group".to_string()
    } else {
        cleaned
    };
    format!(
        "{stem}_{}.csv",
        started_at.with_timezone(&Local).format(FILE_TIME_FORMAT)
    )
}

fn format_local(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format(ROW_TIME_FORMAT).to_string()
}

fn format_distance(distance_meters: f64) -> String {
    format!("{}", distance_meters.round() as i64)
}

fn render_row(fields: &[&str]) -> String {
    let mut line = fields
        .iter()
        .map(|f| escape_field(f))
        .collect::<Vec<_>>()
        .join(",");
    line.push('\n');
    line
}

fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}
