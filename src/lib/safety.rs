//! Pre-flight checks for workspaces with many or large dotenv files.
//!
//! Estimates are rough: 50 ms per file plus 1 ms per KiB of content, and
//! twice the content size plus 1 KiB per file of memory.

use std::fmt::Write;

use serde::Serialize;

use crate::config::{ComparisonMode, SyncConfig};

const KIB: u64 = 1024;
const MIB: u64 = 1024 * 1024;

const MANY_FILES_WARN: usize = 50;
const MANY_FILES_ERROR: usize = 100;
const TOTAL_SIZE_WARN: u64 = 5 * MIB;
const TOTAL_SIZE_ERROR: u64 = 10 * MIB;
const LARGE_FILE_WARN: u64 = MIB;
const PROCESSING_TIME_WARN_MS: f64 = 5_000.0;
const PROCESSING_TIME_ERROR_MS: f64 = 10_000.0;
const MEMORY_WARN: u64 = 100 * MIB;

/// A candidate file and its size in bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyFile {
  pub path: String,
  pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyMetrics {
  pub file_count: usize,
  pub total_file_size: u64,
  pub largest_file_size: u64,
  pub average_file_size: f64,
  /// Milliseconds.
  pub estimated_processing_time: f64,
  /// Bytes.
  pub memory_usage: u64,
}

impl SafetyMetrics {
  pub fn calculate(files: &[SafetyFile]) -> Self {
    let file_count = files.len();
    let total_file_size: u64 = files.iter().map(|f| f.size).sum();
    let largest_file_size = files.iter().map(|f| f.size).max().unwrap_or(0);
    let average_file_size = if file_count > 0 {
      total_file_size as f64 / file_count as f64
    } else {
      0.0
    };

    Self {
      file_count,
      total_file_size,
      largest_file_size,
      average_file_size,
      estimated_processing_time: file_count as f64 * 50.0 + total_file_size as f64 / KIB as f64,
      memory_usage: total_file_size * 2 + file_count as u64 * KIB,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyCheckResult {
  pub safe: bool,
  pub warnings: Vec<String>,
  pub errors: Vec<String>,
  pub metrics: SafetyMetrics,
  pub recommendations: Vec<String>,
}

/// Runs every threshold check over `files`.
pub fn perform_safety_checks(files: &[SafetyFile]) -> SafetyCheckResult {
  let metrics = SafetyMetrics::calculate(files);
  let mut warnings = Vec::new();
  let mut errors = Vec::new();
  let mut recommendations = Vec::new();

  if metrics.file_count > MANY_FILES_ERROR {
    errors.push(format!(
      "Too many files ({}). This may cause performance issues.",
      metrics.file_count
    ));
    recommendations.push(
      "Consider using exclusion patterns to reduce the number of files being processed".to_string(),
    );
  } else if metrics.file_count > MANY_FILES_WARN {
    warnings.push(format!(
      "Many files detected ({}). Processing may take longer.",
      metrics.file_count
    ));
  }

  if metrics.total_file_size > TOTAL_SIZE_ERROR {
    errors.push(format!(
      "Total file size too large ({} MB). This may cause memory issues.",
      round_div(metrics.total_file_size as f64, MIB)
    ));
    recommendations
      .push("Consider processing files in batches or excluding large files".to_string());
  } else if metrics.total_file_size > TOTAL_SIZE_WARN {
    warnings.push(format!(
      "Large total file size ({} MB). Processing may take longer.",
      round_div(metrics.total_file_size as f64, MIB)
    ));
  }

  if metrics.largest_file_size > LARGE_FILE_WARN {
    warnings.push(format!(
      "Large file detected ({} KB). This may cause performance issues.",
      round_div(metrics.largest_file_size as f64, KIB)
    ));
    recommendations
      .push("Consider splitting large files or using streaming processing".to_string());
  }

  if metrics.estimated_processing_time > PROCESSING_TIME_ERROR_MS {
    errors.push(format!(
      "Estimated processing time too long ({} seconds). This may cause UI freezing.",
      round_div(metrics.estimated_processing_time, 1000)
    ));
    recommendations
      .push("Consider reducing the scope of the operation or processing in batches".to_string());
  } else if metrics.estimated_processing_time > PROCESSING_TIME_WARN_MS {
    warnings.push(format!(
      "Long processing time expected ({} seconds). Consider reducing scope.",
      round_div(metrics.estimated_processing_time, 1000)
    ));
  }

  if metrics.memory_usage > MEMORY_WARN {
    warnings.push(format!(
      "High memory usage expected ({} MB). Monitor system resources.",
      round_div(metrics.memory_usage as f64, MIB)
    ));
    recommendations
      .push("Consider processing files in smaller batches to reduce memory usage".to_string());
  }

  SafetyCheckResult {
    safe: errors.is_empty(),
    warnings,
    errors,
    metrics,
    recommendations,
  }
}

/// With safety disabled everything proceeds; otherwise errors block.
pub fn should_proceed(result: &SafetyCheckResult, config: &SyncConfig) -> bool {
  !config.safety.enabled || result.errors.is_empty()
}

/// The check's recommendations plus ones derived from the current settings.
pub fn safety_recommendations(result: &SafetyCheckResult, config: &SyncConfig) -> Vec<String> {
  let mut recommendations = result.recommendations.clone();

  if result.metrics.file_count > MANY_FILES_WARN && config.exclude_patterns.is_empty() {
    recommendations.push(
      "Consider adding exclusion patterns to reduce the number of files being processed"
        .to_string(),
    );
  }
  if result.metrics.total_file_size > TOTAL_SIZE_WARN && config.debounce_ms < 1000 {
    recommendations.push(
      "Consider increasing the debounce delay to improve performance with large files".to_string(),
    );
  }
  if result.metrics.file_count > 20 && config.comparison_mode == ComparisonMode::Auto {
    recommendations
      .push("Consider using template mode to reduce comparison complexity".to_string());
  }

  recommendations
}

/// Whether a single file is over the configured size limit.
pub fn should_exclude_file_for_safety(file: &SafetyFile, config: &SyncConfig) -> bool {
  config.safety.enabled && file.size > config.safety.file_size_warn_bytes
}

pub fn format_safety_report(result: &SafetyCheckResult) -> String {
  let mut out = String::new();
  let metrics = &result.metrics;

  let _ = writeln!(out, "# envsync Safety Report");
  let _ = writeln!(out);
  let _ = writeln!(
    out,
    "**Status**: {}",
    if result.safe { "✅ Safe" } else { "⚠️ Warnings/Errors" }
  );
  let _ = writeln!(out);
  let _ = writeln!(out, "## Metrics");
  let _ = writeln!(out, "- **Files**: {}", metrics.file_count);
  let total_size = format_file_size(metrics.total_file_size as f64);
  let largest_size = format_file_size(metrics.largest_file_size as f64);
  let _ = writeln!(out, "- **Total Size**: {}", total_size);
  let _ = writeln!(out, "- **Largest File**: {}", largest_size);
  let _ = writeln!(
    out,
    "- **Average File Size**: {}",
    format_file_size(metrics.average_file_size)
  );
  let _ = writeln!(
    out,
    "- **Estimated Processing Time**: {}s",
    round_div(metrics.estimated_processing_time, 1000)
  );
  let _ = writeln!(
    out,
    "- **Estimated Memory Usage**: {}",
    format_file_size(metrics.memory_usage as f64)
  );

  for (heading, items) in [
    ("## ⚠️ Warnings", &result.warnings),
    ("## ❌ Errors", &result.errors),
    ("## 💡 Recommendations", &result.recommendations),
  ] {
    if items.is_empty() {
      continue;
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", heading);
    for item in items {
      let _ = writeln!(out, "- {}", item);
    }
  }

  out
}

fn format_file_size(bytes: f64) -> String {
  if bytes < KIB as f64 {
    format!("{} B", bytes.round())
  } else if bytes < MIB as f64 {
    format!("{} KB", round_div(bytes, KIB))
  } else {
    format!("{} MB", round_div(bytes, MIB))
  }
}

fn round_div(value: f64, unit: u64) -> u64 {
  (value / unit as f64).round() as u64
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  fn files(sizes: &[u64]) -> Vec<SafetyFile> {
    sizes
      .iter()
      .enumerate()
      .map(|(i, size)| SafetyFile {
        path: format!(".env.{}", i),
        size: *size,
      })
      .collect()
  }

  #[test]
  fn test_metrics() {
    let metrics = SafetyMetrics::calculate(&files(&[1024, 3072]));

    assert_eq!(metrics.file_count, 2);
    assert_eq!(metrics.total_file_size, 4096);
    assert_eq!(metrics.largest_file_size, 3072);
    assert_eq!(metrics.average_file_size, 2048.0);
    assert_eq!(metrics.estimated_processing_time, 104.0);
    assert_eq!(metrics.memory_usage, 4096 * 2 + 2048);
  }

  #[test]
  fn test_metrics_empty() {
    let metrics = SafetyMetrics::calculate(&[]);
    assert_eq!(metrics.file_count, 0);
    assert_eq!(metrics.largest_file_size, 0);
    assert_eq!(metrics.average_file_size, 0.0);
  }

  #[test]
  fn test_small_workspace_is_safe() {
    let result = perform_safety_checks(&files(&[100, 200, 300]));

    assert!(result.safe);
    assert!(result.warnings.is_empty());
    assert!(result.errors.is_empty());
    assert!(result.recommendations.is_empty());
  }

  #[test]
  fn test_many_files_warn_then_error() {
    let result = perform_safety_checks(&files(&[10; 60]));
    assert!(result.safe);
    assert_eq!(result.warnings, vec!["Many files detected (60). Processing may take longer."]);

    let result = perform_safety_checks(&files(&[10; 101]));
    assert!(!result.safe);
    assert_eq!(result.errors, vec!["Too many files (101). This may cause performance issues."]);
    assert_eq!(
      result.warnings,
      vec!["Long processing time expected (5 seconds). Consider reducing scope."]
    );
  }

  #[test]
  fn test_large_file() {
    let result = perform_safety_checks(&files(&[2 * MIB]));

    assert!(result.safe);
    assert_eq!(
      result.warnings,
      vec!["Large file detected (2048 KB). This may cause performance issues."]
    );
    assert_eq!(result.recommendations.len(), 1);
  }

  #[test]
  fn test_large_total_size_is_an_error() {
    let result = perform_safety_checks(&files(&[6 * MIB, 6 * MIB]));

    assert!(!result.safe);
    assert!(
      result
        .errors
        .contains(&"Total file size too large (12 MB). This may cause memory issues.".to_string())
    );
    let too_long = "Estimated processing time too long (12 seconds). This may cause UI freezing.";
    assert!(result.errors.contains(&too_long.to_string()));
  }

  #[test]
  fn test_should_proceed() {
    let blocked = perform_safety_checks(&files(&[10; 101]));
    let mut config = SyncConfig::default();

    assert!(should_proceed(&blocked, &config));
    config.safety.enabled = true;
    assert!(!should_proceed(&blocked, &config));
    assert!(should_proceed(&perform_safety_checks(&files(&[10])), &config));
  }

  #[test]
  fn test_config_recommendations() {
    let result = perform_safety_checks(&files(&[10; 60]));
    let config = SyncConfig {
      exclude_patterns: Vec::new(),
      ..SyncConfig::default()
    };

    assert_eq!(
      safety_recommendations(&result, &config),
      vec![
        "Consider adding exclusion patterns to reduce the number of files being processed",
        "Consider using template mode to reduce comparison complexity",
      ]
    );
  }

  #[test]
  fn test_should_exclude_file_for_safety() {
    let mut config = SyncConfig::default();
    let big = SafetyFile {
      path: ".env".to_string(),
      size: 2 * MIB,
    };

    assert!(!should_exclude_file_for_safety(&big, &config));
    config.safety.enabled = true;
    assert!(should_exclude_file_for_safety(&big, &config));
    assert!(!should_exclude_file_for_safety(&SafetyFile { size: 10, ..big }, &config));
  }

  #[test]
  fn test_format_safety_report() {
    let report = format_safety_report(&perform_safety_checks(&files(&[2048])));

    assert!(report.starts_with("# envsync Safety Report\n\n**Status**: ✅ Safe\n"));
    assert!(report.contains("- **Files**: 1\n"));
    assert!(report.contains("- **Total Size**: 2 KB\n"));
    assert!(report.contains("- **Estimated Processing Time**: 0s\n"));
    assert!(!report.contains("Warnings"));
  }

  #[test]
  fn test_format_file_size() {
    assert_eq!(format_file_size(512.0), "512 B");
    assert_eq!(format_file_size(1536.0), "2 KB");
    assert_eq!(format_file_size((3 * MIB) as f64), "3 MB");
  }
}
