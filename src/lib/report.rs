//! Human and machine renditions of a [`SyncReport`].

use std::fmt::Write;

use crate::fs::FileSystem;
use crate::model::SyncReport;

/// Markdown summary of a report, with workspace-relative paths.
pub fn render_markdown(report: &SyncReport, fs: &dyn FileSystem) -> String {
  let mut out = String::new();

  // Writing into a String cannot fail.
  let _ = writeln!(out, "# envsync Sync Report");
  let _ = writeln!(out);
  let _ = writeln!(out, "- Checked files: {}", report.files().len());
  let _ = writeln!(out, "- Status: {}", report.status());
  let _ = writeln!(out, "- Missing keys: {}", report.missing_key_count());
  let _ = writeln!(out, "- Checked at: {}", report.last_checked().to_rfc3339());

  if !report.missing_keys().is_empty() {
    let _ = writeln!(out);
    let _ = writeln!(out, "## Missing Keys");
    for mismatch in report.missing_keys() {
      let _ = writeln!(out);
      let _ = writeln!(out, "### {}", fs.as_relative_path(&mismatch.filepath));
      let _ = writeln!(out, "Compared to: {}", fs.as_relative_path(&mismatch.reference));
      let _ = writeln!(out);
      for key in &mismatch.keys {
        let _ = writeln!(out, "- {}", key);
      }
    }
  }

  if !report.errors().is_empty() {
    let _ = writeln!(out);
    let _ = writeln!(out, "## Parse / Read Errors");
    let _ = writeln!(out);
    for error in report.errors() {
      let _ = writeln!(
        out,
        "- {}: {}",
        fs.as_relative_path(&error.filepath),
        error.message
      );
    }
  }

  out
}

pub fn render_json(report: &SyncReport) -> Result<String, serde_json::Error> {
  serde_json::to_string_pretty(report)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::compare::compare_files;
  use crate::fs::WorkspaceFs;
  use crate::model::{CompareOptions, DotenvFile, ParseError};
  use pretty_assertions::assert_eq;

  fn file(path: &str, keys: &[&str]) -> DotenvFile {
    DotenvFile::new(path, keys.iter().map(|k| k.to_string()).collect(), 0)
  }

  #[test]
  fn test_render_markdown() {
    let fs = WorkspaceFs::new("/ws");
    let files = vec![
      file("/ws/.env", &["A"]),
      file("/ws/.env.example", &["A", "B", "C"]),
    ];
    let report = compare_files(&files, &CompareOptions::default())
      .with_errors(vec![ParseError::parse("Line 3: Empty key before equals sign", "/ws/.env")]);

    let markdown = render_markdown(&report, &fs);
    let body: Vec<&str> = markdown
      .lines()
      .filter(|line| !line.starts_with("- Checked at:"))
      .collect();

    assert_eq!(
      body,
      vec![
        "# envsync Sync Report",
        "",
        "- Checked files: 2",
        "- Status: missing-keys",
        "- Missing keys: 2",
        "",
        "## Missing Keys",
        "",
        "### .env",
        "Compared to: .env.example",
        "",
        "- B",
        "- C",
        "",
        "## Parse / Read Errors",
        "",
        "- .env: Line 3: Empty key before equals sign",
      ]
    );
  }

  #[test]
  fn test_render_json_field_names() {
    let report = compare_files(
      &[file("/ws/.env", &["A"]), file("/ws/.env.local", &[])],
      &CompareOptions::default(),
    );
    let value: serde_json::Value = serde_json::from_str(&render_json(&report).unwrap()).unwrap();

    assert_eq!(value["status"], "missing-keys");
    assert_eq!(value["files"][0]["type"], "base");
    assert_eq!(value["missingKeys"][0]["filepath"], "/ws/.env.local");
    assert_eq!(value["missingKeys"][0]["reference"], "/ws/.env");
    assert!(value["extraKeys"].as_array().unwrap().is_empty());
    assert!(value["lastChecked"].is_string());
  }
}
