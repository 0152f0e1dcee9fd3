//! Terminal renditions of the detector's collaborators.

use std::io::{self, Write};

use colored::Colorize;

#[cfg(feature = "tracing")]
use tracing::{debug, info};

use crate::collaborators::{EventProperties, Notifier, StatusBar, Telemetry};
use crate::config::NotificationLevel;
use crate::model::SyncStatus;

const MAX_KEYS_SHOWN: usize = 3;

/// Prints notifications to stderr, honouring the notification level.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleNotifier {
  level: NotificationLevel,
}

impl ConsoleNotifier {
  pub fn new(level: NotificationLevel) -> Self {
    Self { level }
  }

  fn emit(&self, line: String) {
    // A closed stderr is not worth failing a check over.
    let _ = writeln!(io::stderr().lock(), "{}", line);
  }
}

impl Notifier for ConsoleNotifier {
  fn show_missing_keys(&self, filepath: &str, keys: &[String]) {
    if self.level == NotificationLevel::Silent {
      return;
    }
    self.emit(format!(
      "{} Missing keys in {}: {}",
      "warning:".yellow().bold(),
      file_name(filepath).bold(),
      key_list(keys)
    ));
  }

  fn show_extra_keys(&self, filepath: &str, keys: &[String]) {
    if self.level != NotificationLevel::All {
      return;
    }
    self.emit(format!(
      "{} Extra keys in {}: {}",
      "info:".cyan().bold(),
      file_name(filepath).bold(),
      key_list(keys)
    ));
  }

  fn show_error(&self, message: &str) {
    if self.level == NotificationLevel::Silent {
      return;
    }
    self.emit(format!("{} {}", "error:".red().bold(), message));
  }

  fn show_parse_error(&self, filepath: &str, message: &str) {
    if self.level == NotificationLevel::Silent {
      return;
    }
    self.emit(format!(
      "{} Failed to parse {}: {}",
      "error:".red().bold(),
      file_name(filepath).bold(),
      message
    ));
  }
}

/// A one-line status summary on stderr.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleStatusBar {
  enabled: bool,
}

impl ConsoleStatusBar {
  pub fn new(enabled: bool) -> Self {
    Self { enabled }
  }
}

impl StatusBar for ConsoleStatusBar {
  fn update_status(&self, status: SyncStatus, issue_count: usize) {
    if !self.enabled {
      return;
    }
    if let Some(line) = status_line(status, issue_count) {
      let _ = writeln!(io::stderr().lock(), "{}", line);
    }
  }
}

/// Text for the status line, `None` when nothing should be shown.
pub fn status_line(status: SyncStatus, issue_count: usize) -> Option<String> {
  let line = match status {
    SyncStatus::NoFiles => return None,
    SyncStatus::InSync => format!("{} Dotenv files in sync", "✓".green().bold()),
    SyncStatus::MissingKeys => format!(
      "{} {} dotenv {} out of sync",
      "✗".red().bold(),
      issue_count,
      if issue_count == 1 { "file" } else { "files" }
    ),
    SyncStatus::ExtraKeys => format!("{} Extra keys found", "!".yellow().bold()),
    SyncStatus::ParseError => format!("{} Dotenv parse errors", "!".red().bold()),
  };
  Some(line)
}

/// Forwards events to the log. Nothing leaves the machine.
#[derive(Debug, Clone, Copy)]
pub struct LogTelemetry {
  enabled: bool,
}

impl LogTelemetry {
  pub fn new(enabled: bool) -> Self {
    Self { enabled }
  }
}

impl Telemetry for LogTelemetry {
  #[allow(unused_variables)]
  fn event(&self, name: &str, properties: &EventProperties) {
    if !self.enabled {
      #[cfg(feature = "tracing")]
      debug!("Telemetry disabled, dropping {}", name);
      return;
    }

    #[cfg(feature = "tracing")]
    info!(event = name, ?properties, "telemetry");
  }
}

fn file_name(filepath: &str) -> &str {
  filepath.rsplit(['/', '\\']).next().unwrap_or(filepath)
}

fn key_list(keys: &[String]) -> String {
  let shown = keys
    .iter()
    .take(MAX_KEYS_SHOWN)
    .map(String::as_str)
    .collect::<Vec<_>>()
    .join(", ");
  if keys.len() > MAX_KEYS_SHOWN {
    format!("{}...", shown)
  } else {
    shown
  }
}
