use std::{convert::TryFrom, sync::LazyLock};

use regex::Regex;

#[cfg(feature = "tracing")]
use tracing::{debug, trace, warn};

use crate::glob::GlobPattern;
use crate::model::{FileType, ParseError};

const COMMENT_PREFIX: &str = "#";
const ASSIGNMENT_OPERATOR: char = '=';
const BASE_FILENAME: &str = ".env";

static KEY_PATTERN: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").expect("key pattern is valid"));

/// Keys extracted from one dotenv file, plus the lines that could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParseResult {
  /// Always `true`: malformed lines are reported in `errors` and skipped.
  pub success: bool,
  /// Keys in file order; a key assigned twice appears twice.
  pub keys: Vec<String>,
  pub errors: Vec<ParseError>,
}

/// Extracts the variable keys of a dotenv file.
///
/// Values are never looked at. Every line that is neither blank, a comment,
/// nor a well-formed `KEY=...` assignment yields one `parse-error` and is
/// skipped; parsing always continues with the next line.
pub fn parse_dotenv_file(content: &str, filepath: &str) -> ParseResult {
  #[cfg(feature = "tracing")]
  debug!("Parsing {} with {} lines", filepath, content.lines().count());

  let mut keys = Vec::new();
  let mut errors = Vec::new();

  for (index, line) in content.lines().enumerate() {
    #[cfg(feature = "tracing")]
    trace!("Parsing line {}: {:?}", index + 1, line);

    match EnvLine::try_from(line) {
      Ok(EnvLine::Assignment(key)) => keys.push(key.to_string()),
      Ok(EnvLine::Blank) | Ok(EnvLine::Comment) => {}
      Err(err) => {
        #[cfg(feature = "tracing")]
        trace!("Skipping line {}: {}", index + 1, err);

        errors.push(ParseError::parse(
          format!("Line {}: {}", index + 1, err),
          filepath,
        ));
      }
    }
  }

  #[cfg(feature = "tracing")]
  debug!(
    "Parsed {} keys and {} errors from {}",
    keys.len(),
    errors.len(),
    filepath
  );

  ParseResult {
    success: true,
    keys,
    errors,
  }
}

/// One classified line of a dotenv file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvLine<'a> {
  Blank,
  Comment,
  Assignment(&'a str),
}

impl<'a> TryFrom<&'a str> for EnvLine<'a> {
  type Error = LineError;

  fn try_from(s: &'a str) -> Result<Self, Self::Error> {
    let trimmed = s.trim();

    if trimmed.is_empty() {
      return Ok(EnvLine::Blank);
    }
    if trimmed.starts_with(COMMENT_PREFIX) {
      return Ok(EnvLine::Comment);
    }

    let Some((key, _value)) = trimmed.split_once(ASSIGNMENT_OPERATOR) else {
      return Err(LineError::MissingEquals(trimmed.to_string()));
    };

    let key = key.trim();
    if key.is_empty() {
      Err(LineError::EmptyKey)
    } else if !KEY_PATTERN.is_match(key) {
      Err(LineError::InvalidKey(key.to_string()))
    } else {
      Ok(EnvLine::Assignment(key))
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LineError {
  #[error("Missing equals sign in \"{0}\"")]
  MissingEquals(String),
  #[error("Empty key before equals sign")]
  EmptyKey,
  #[error("Invalid key format \"{0}\"")]
  InvalidKey(String),
}

/// Classifies a dotenv file by the name in the last path segment.
///
/// The first matching rule wins: exact `.env`, then `.local`,
/// `.example`/`.template`, `.production`/`.prod`, `.development`/`.dev`,
/// `.test`; anything else is [`FileType::Base`].
pub fn detect_file_type(filepath: &str) -> FileType {
  let filename = filepath.rsplit('/').next().unwrap_or_default();

  if filename == BASE_FILENAME {
    FileType::Base
  } else if filename.contains(".local") {
    FileType::Local
  } else if filename.contains(".example") || filename.contains(".template") {
    FileType::Example
  } else if filename.contains(".production") || filename.contains(".prod") {
    FileType::Production
  } else if filename.contains(".development") || filename.contains(".dev") {
    FileType::Development
  } else if filename.contains(".test") {
    FileType::Test
  } else {
    FileType::Base
  }
}

/// Whether `relative_path` matches any of the exclude globs.
///
/// Patterns that fail to compile never match.
pub fn should_exclude_file<S: AsRef<str>>(relative_path: &str, patterns: &[S]) -> bool {
  patterns
    .iter()
    .any(|pattern| match GlobPattern::new(pattern.as_ref()) {
      Ok(glob) => glob.is_match(relative_path),
      Err(_err) => {
        #[cfg(feature = "tracing")]
        warn!("Ignoring exclude pattern: {}", _err);
        false
      }
    })
}
