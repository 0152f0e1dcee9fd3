//! Glob matching for workspace-relative paths.
//!
//! One matcher serves every place that filters paths (exclude patterns,
//! workspace discovery, the change watcher):
//!
//! - `**` matches any run of characters, `/` included
//! - `*` matches any run of characters within a single path segment
//! - every other character is literal, `?` and brackets included
//!
//! Matching is anchored, case-sensitive and expects `/` as the separator.

use regex::Regex;

#[cfg(feature = "tracing")]
use tracing::trace;

const DOUBLE_STAR: &str = "**";
const STAR: char = '*';
const SEPARATOR: char = '/';

const DOUBLE_STAR_EXPR: &str = ".*";
const STAR_EXPR: &str = "[^/]*";

/// A compiled glob.
#[derive(Debug, Clone)]
pub struct GlobPattern {
  source: String,
  regex: Regex,
}

impl GlobPattern {
  pub fn new(pattern: &str) -> Result<Self, GlobError> {
    if pattern.trim().is_empty() {
      return Err(GlobError::Empty);
    }
    if pattern.starts_with(SEPARATOR) {
      return Err(GlobError::Absolute(pattern.to_string()));
    }

    let mut expr = String::with_capacity(pattern.len() * 2 + 2);
    expr.push('^');
    for (i, chunk) in pattern.split(DOUBLE_STAR).enumerate() {
      if i > 0 {
        expr.push_str(DOUBLE_STAR_EXPR);
      }
      for (j, literal) in chunk.split(STAR).enumerate() {
        if j > 0 {
          expr.push_str(STAR_EXPR);
        }
        expr.push_str(&regex::escape(literal));
      }
    }
    expr.push('$');

    #[cfg(feature = "tracing")]
    trace!(pattern, %expr, "Compiled glob");

    let regex = Regex::new(&expr).map_err(|source| GlobError::Regex {
      pattern: pattern.to_string(),
      source,
    })?;

    Ok(Self {
      source: pattern.to_string(),
      regex,
    })
  }

  pub fn is_match(&self, path: &str) -> bool {
    self.regex.is_match(path)
  }

  pub fn as_str(&self) -> &str {
    &self.source
  }
}

#[derive(Debug, thiserror::Error)]
pub enum GlobError {
  #[error("Glob pattern is empty")]
  Empty,
  #[error("Glob pattern must be relative to the workspace: {0}")]
  Absolute(String),
  #[error("Invalid glob pattern {pattern}: {source}")]
  Regex {
    pattern: String,
    #[source]
    source: regex::Error,
  },
}
