//! Value types produced by a sync check.
//!
//! Everything here is rebuilt from scratch on every check and handed to the
//! caller by value. [`DotenvFile`] and [`SyncReport`] keep their fields
//! private so that the derived parts (file type, status) can never drift from
//! the data they were derived from.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::parse::detect_file_type;

/// Reference used in a [`KeyMismatch`] when no single file holds every missing key.
pub const OTHER_FILES_REFERENCE: &str = "other files";

/// Semantic role of a dotenv file, derived from its file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileType {
  Base,
  Local,
  Example,
  Production,
  Development,
  Test,
}

impl FileType {
  pub fn as_str(&self) -> &'static str {
    match self {
      FileType::Base => "base",
      FileType::Local => "local",
      FileType::Example => "example",
      FileType::Production => "production",
      FileType::Development => "development",
      FileType::Test => "test",
    }
  }
}

impl fmt::Display for FileType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A successfully parsed dotenv file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DotenvFile {
  path: String,
  #[serde(rename = "type")]
  file_type: FileType,
  keys: Vec<String>,
  last_modified: i64,
}

impl DotenvFile {
  /// Builds a file record; the type is always derived from `path`.
  pub fn new(path: impl Into<String>, keys: Vec<String>, last_modified: i64) -> Self {
    let path = path.into();
    let file_type = detect_file_type(&path);

    Self {
      path,
      file_type,
      keys,
      last_modified,
    }
  }

  pub fn path(&self) -> &str {
    &self.path
  }

  pub fn file_type(&self) -> FileType {
    self.file_type
  }

  /// Keys in file order. May contain repeats when the file assigns a key twice.
  pub fn keys(&self) -> &[String] {
    &self.keys
  }

  /// Modification time in milliseconds since the Unix epoch.
  pub fn last_modified(&self) -> i64 {
    self.last_modified
  }

  pub fn has_key(&self, key: &str) -> bool {
    self.keys.iter().any(|k| k == key)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
  ParseError,
  ReadError,
  /// Reserved; handled like [`ErrorKind::ReadError`].
  AccessError,
}

impl ErrorKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      ErrorKind::ParseError => "parse-error",
      ErrorKind::ReadError => "read-error",
      ErrorKind::AccessError => "access-error",
    }
  }
}

impl fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A contained, per-file or per-pattern problem collected into a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseError {
  #[serde(rename = "type")]
  pub kind: ErrorKind,
  pub message: String,
  pub filepath: String,
}

impl ParseError {
  pub fn parse(message: impl Into<String>, filepath: impl Into<String>) -> Self {
    Self {
      kind: ErrorKind::ParseError,
      message: message.into(),
      filepath: filepath.into(),
    }
  }

  pub fn read(message: impl Into<String>, filepath: impl Into<String>) -> Self {
    Self {
      kind: ErrorKind::ReadError,
      message: message.into(),
      filepath: filepath.into(),
    }
  }
}

/// Keys a file lacks relative to the active reference set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyMismatch {
  pub filepath: String,
  /// Missing keys, in reference order.
  pub keys: Vec<String>,
  /// Path of a file holding all of `keys`, or [`OTHER_FILES_REFERENCE`].
  pub reference: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncStatus {
  InSync,
  MissingKeys,
  /// Declared for interface compatibility; never produced by the comparator.
  ExtraKeys,
  ParseError,
  NoFiles,
}

impl SyncStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      SyncStatus::InSync => "in-sync",
      SyncStatus::MissingKeys => "missing-keys",
      SyncStatus::ExtraKeys => "extra-keys",
      SyncStatus::ParseError => "parse-error",
      SyncStatus::NoFiles => "no-files",
    }
  }
}

impl fmt::Display for SyncStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Outcome of one sync check.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
  status: SyncStatus,
  files: Vec<DotenvFile>,
  missing_keys: Vec<KeyMismatch>,
  extra_keys: Vec<KeyMismatch>,
  errors: Vec<ParseError>,
  last_checked: DateTime<Utc>,
}

impl SyncReport {
  pub(crate) fn new(
    status: SyncStatus,
    files: Vec<DotenvFile>,
    missing_keys: Vec<KeyMismatch>,
    extra_keys: Vec<KeyMismatch>,
  ) -> Self {
    Self {
      status,
      files,
      missing_keys,
      extra_keys,
      errors: Vec::new(),
      last_checked: Utc::now(),
    }
  }

  /// Report for an empty file set (or a disabled check).
  pub fn no_files() -> Self {
    Self::new(SyncStatus::NoFiles, Vec::new(), Vec::new(), Vec::new())
  }

  /// Report for a check that failed as a whole.
  pub fn failed(error: ParseError) -> Self {
    Self {
      errors: vec![error],
      ..Self::new(SyncStatus::ParseError, Vec::new(), Vec::new(), Vec::new())
    }
  }

  /// Replaces the error list, leaving the status untouched.
  pub fn with_errors(self, errors: Vec<ParseError>) -> Self {
    Self { errors, ..self }
  }

  pub fn status(&self) -> SyncStatus {
    self.status
  }

  pub fn files(&self) -> &[DotenvFile] {
    &self.files
  }

  pub fn missing_keys(&self) -> &[KeyMismatch] {
    &self.missing_keys
  }

  pub fn extra_keys(&self) -> &[KeyMismatch] {
    &self.extra_keys
  }

  pub fn errors(&self) -> &[ParseError] {
    &self.errors
  }

  pub fn last_checked(&self) -> DateTime<Utc> {
    self.last_checked
  }

  /// Number shown next to the status: mismatches of either direction.
  pub fn issue_count(&self) -> usize {
    self.missing_keys.len() + self.extra_keys.len()
  }

  /// Missing keys summed over every mismatch entry.
  pub fn missing_key_count(&self) -> usize {
    self.missing_keys.iter().map(|m| m.keys.len()).sum()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompareMode {
  #[default]
  Auto,
  Template,
}

/// Per-call comparison settings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompareOptions {
  pub mode: CompareMode,
  /// Path (as stored in [`DotenvFile::path`]) of the template file.
  pub template_path: Option<String>,
}

impl CompareOptions {
  pub fn template(template_path: Option<String>) -> Self {
    Self {
      mode: CompareMode::Template,
      template_path,
    }
  }
}
