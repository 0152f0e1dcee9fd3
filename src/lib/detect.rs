//! Sync checks over a workspace.
//!
//! A [`Detector`] ties the collaborators together. Each check resolves a fresh
//! settings snapshot, loads and parses the dotenv files, compares them and
//! then reports the outcome to the status bar, the notifier and telemetry.
//!
//! # Error containment
//!
//! A file that cannot be read, a malformed line, or a pattern that cannot be
//! searched becomes a [`ParseError`] entry in the report and never stops the
//! check. Only a failure of the check as a whole (unreadable settings) turns
//! into a `parse-error` report, and even that is returned, not raised.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

#[cfg(feature = "tracing")]
use tracing::{debug, info, warn};

use crate::collaborators::{EventProperties, Notifier, Silent, StatusBar, Telemetry};
use crate::compare::compare_files;
use crate::config::{
  ComparisonMode, ConfigError, ConfigSource, NotificationLevel, SyncConfig, is_settings_file,
};
use crate::fs::{FileSystem, FsError};
use crate::model::{CompareOptions, DotenvFile, ParseError, SyncReport, SyncStatus};
use crate::parse::{parse_dotenv_file, should_exclude_file};

/// Cap on files taken from a single watch pattern.
pub const MAX_FILES_PER_PATTERN: usize = 100;
/// Once more errors than this have been collected, remaining patterns are skipped.
pub const MAX_ERRORS: usize = 50;
const MAX_PARSE_ERRORS_SHOWN: usize = 3;

const WORKSPACE_SCOPE: &str = "workspace";
const PATTERN_SEARCH_SCOPE: &str = "pattern-search";
const SELECTED_FILES_SCOPE: &str = "selected-files";
const TOO_MANY_ERRORS_MESSAGE: &str =
  "Too many parse errors detected. Check workspace configuration.";

static FAILED_TO_PARSE_PREFIX: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^Failed to parse[^:]*:\s*").expect("prefix pattern is valid"));

/// Failure of a check as a whole.
#[derive(Debug, thiserror::Error)]
pub enum DetectError {
  #[error(transparent)]
  Config(#[from] ConfigError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CheckScope {
  Workspace,
  SelectedFiles,
}

impl CheckScope {
  fn event_name(&self) -> &'static str {
    match self {
      CheckScope::Workspace => "sync-check",
      CheckScope::SelectedFiles => "sync-check-selected",
    }
  }

  fn failure_filepath(&self) -> &'static str {
    match self {
      CheckScope::Workspace => WORKSPACE_SCOPE,
      CheckScope::SelectedFiles => SELECTED_FILES_SCOPE,
    }
  }

  fn failure_message(&self, err: &DetectError) -> String {
    match self {
      CheckScope::Workspace => format!("Failed to check sync: {}", err),
      CheckScope::SelectedFiles => format!("Failed to check selected files: {}", err),
    }
  }

  fn failure_notification(&self, err: &DetectError) -> String {
    match self {
      CheckScope::Workspace => format!("Failed to check dotenv sync: {}", err),
      CheckScope::SelectedFiles => format!("Failed to check selected files: {}", err),
    }
  }
}

/// Files and contained errors gathered while loading.
#[derive(Debug, Default)]
struct Loaded {
  files: Vec<DotenvFile>,
  errors: Vec<ParseError>,
  seen: HashSet<String>,
}

/// Runs sync checks and reports their outcome.
///
/// Holds no state between checks; concurrent checks are independent.
pub struct Detector {
  fs: Box<dyn FileSystem>,
  config: Box<dyn ConfigSource>,
  notifier: Box<dyn Notifier>,
  status_bar: Box<dyn StatusBar>,
  telemetry: Box<dyn Telemetry>,
}

impl Detector {
  /// A detector whose outbound collaborators discard everything.
  pub fn new(fs: impl FileSystem + 'static, config: impl ConfigSource + 'static) -> Self {
    Self {
      fs: Box::new(fs),
      config: Box::new(config),
      notifier: Box::new(Silent),
      status_bar: Box::new(Silent),
      telemetry: Box::new(Silent),
    }
  }

  pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
    self.notifier = Box::new(notifier);
    self
  }

  pub fn with_status_bar(mut self, status_bar: impl StatusBar + 'static) -> Self {
    self.status_bar = Box::new(status_bar);
    self
  }

  pub fn with_telemetry(mut self, telemetry: impl Telemetry + 'static) -> Self {
    self.telemetry = Box::new(telemetry);
    self
  }

  /// Discovers the workspace's dotenv files and compares them.
  pub fn check_sync(&self) -> SyncReport {
    #[cfg(feature = "tracing")]
    info!("Checking dotenv sync");

    let config = match self.config.snapshot() {
      Ok(config) => config,
      Err(err) => return self.fail(CheckScope::Workspace, &err.into()),
    };

    if !config.enabled {
      #[cfg(feature = "tracing")]
      debug!("Sync checks are disabled");
      return SyncReport::no_files();
    }

    let Loaded { files, errors, .. } = self.discover(&config);
    let files = self.filter_by_comparison_mode(files, &config);

    self.finish(CheckScope::Workspace, files, errors, &config)
  }

  /// Compares exactly the given files.
  ///
  /// Exclude patterns, the temporary ignore list and manual-mode filtering
  /// do not apply to an explicit selection.
  pub fn check_sync_for_files<S: AsRef<str>>(&self, paths: &[S]) -> SyncReport {
    #[cfg(feature = "tracing")]
    info!("Checking {} selected dotenv files", paths.len());

    let config = match self.config.snapshot() {
      Ok(config) => config,
      Err(err) => return self.fail(CheckScope::SelectedFiles, &err.into()),
    };

    let mut loaded = Loaded::default();
    for path in paths {
      self.load_file(path.as_ref(), &mut loaded);
    }

    self.finish(CheckScope::SelectedFiles, loaded.files, loaded.errors, &config)
  }

  /// Nothing to release; kept so owners can tear down every component alike.
  pub fn dispose(&self) {
    #[cfg(feature = "tracing")]
    debug!("Detector disposed");
  }

  fn discover(&self, config: &SyncConfig) -> Loaded {
    let mut loaded = Loaded::default();

    for pattern in &config.watch_patterns {
      if loaded.errors.len() > MAX_ERRORS {
        #[cfg(feature = "tracing")]
        warn!("Stopping discovery after {} errors", loaded.errors.len());

        loaded
          .errors
          .push(ParseError::read(TOO_MANY_ERRORS_MESSAGE, WORKSPACE_SCOPE));
        break;
      }

      let found = match self
        .fs
        .find_files(pattern, None, Some(MAX_FILES_PER_PATTERN))
      {
        Ok(found) => found,
        Err(err) => {
          #[cfg(feature = "tracing")]
          warn!("Failed to search pattern {}: {}", pattern, err);

          loaded.errors.push(ParseError::read(
            format!("Failed to search pattern {}: {}", pattern, err),
            PATTERN_SEARCH_SCOPE,
          ));
          continue;
        }
      };

      #[cfg(feature = "tracing")]
      debug!("Pattern {} matched {} files", pattern, found.len());

      for info in found {
        let relative = self.fs.as_relative_path(&info.filepath);

        if is_settings_file(&relative) {
          continue;
        }
        if should_exclude_file(&relative, &config.exclude_patterns) {
          #[cfg(feature = "tracing")]
          debug!("Excluded {}", relative);
          continue;
        }
        if config.temporary_ignore.contains(&relative) {
          #[cfg(feature = "tracing")]
          debug!("Temporarily ignored {}", relative);
          continue;
        }

        self.load_file(&info.filepath, &mut loaded);
      }
    }

    loaded
  }

  fn load_file(&self, filepath: &str, loaded: &mut Loaded) {
    if !loaded.seen.insert(filepath.to_string()) {
      return;
    }

    if let Err(err) = self.read_dotenv_file(filepath, loaded) {
      #[cfg(feature = "tracing")]
      warn!("Skipping {}: {}", filepath, err);

      loaded.errors.push(ParseError::read(err.to_string(), filepath));
    }
  }

  fn read_dotenv_file(&self, filepath: &str, loaded: &mut Loaded) -> Result<(), FsError> {
    let content = self.fs.read_file(filepath)?;
    let parsed = parse_dotenv_file(&content, filepath);
    loaded.errors.extend(parsed.errors);

    if parsed.success {
      let stats = self.fs.file_stats(filepath)?;
      loaded.files.push(DotenvFile::new(
        filepath,
        parsed.keys,
        stats.mtime.timestamp_millis(),
      ));
    }

    Ok(())
  }

  fn filter_by_comparison_mode(
    &self,
    files: Vec<DotenvFile>,
    config: &SyncConfig,
  ) -> Vec<DotenvFile> {
    if config.comparison_mode != ComparisonMode::Manual || config.compare_only_files.is_empty() {
      return files;
    }

    files
      .into_iter()
      .filter(|file| {
        let keep = config
          .compare_only_files
          .contains(&self.fs.as_relative_path(file.path()));

        #[cfg(feature = "tracing")]
        if !keep {
          debug!("{} is not in compareOnlyFiles", file.path());
        }

        keep
      })
      .collect()
  }

  fn compare_options(&self, files: &[DotenvFile], config: &SyncConfig) -> CompareOptions {
    match (config.comparison_mode, config.template_file.as_deref()) {
      (ComparisonMode::Template, Some(template)) => {
        let template_path = files
          .iter()
          .find(|file| self.fs.as_relative_path(file.path()) == template)
          .map(|file| file.path().to_string());

        #[cfg(feature = "tracing")]
        if template_path.is_none() {
          warn!("Template {} is not among the compared files", template);
        }

        CompareOptions::template(template_path)
      }
      _ => CompareOptions::default(),
    }
  }

  fn finish(
    &self,
    scope: CheckScope,
    files: Vec<DotenvFile>,
    errors: Vec<ParseError>,
    config: &SyncConfig,
  ) -> SyncReport {
    let options = self.compare_options(&files, config);
    let report = compare_files(&files, &options).with_errors(errors);

    #[cfg(feature = "tracing")]
    info!(
      "Checked {} files: {} ({} mismatches, {} errors)",
      report.files().len(),
      report.status(),
      report.missing_keys().len(),
      report.errors().len()
    );

    self.publish(scope, &report, config);
    report
  }

  fn publish(&self, scope: CheckScope, report: &SyncReport, config: &SyncConfig) {
    self
      .status_bar
      .update_status(report.status(), report.issue_count());

    if config.notification_level != NotificationLevel::Silent {
      if report.status() == SyncStatus::MissingKeys {
        for mismatch in report.missing_keys() {
          self
            .notifier
            .show_missing_keys(&mismatch.filepath, &mismatch.keys);
        }
      }

      for error in report.errors().iter().take(MAX_PARSE_ERRORS_SHOWN) {
        self
          .notifier
          .show_parse_error(&error.filepath, &sanitize_parse_message(&error.message));
      }
    }

    let properties = EventProperties::from([
      ("status".to_string(), report.status().to_string()),
      ("fileCount".to_string(), report.files().len().to_string()),
      (
        "missingKeyCount".to_string(),
        report.missing_keys().len().to_string(),
      ),
    ]);
    self.telemetry.event(scope.event_name(), &properties);
  }

  fn fail(&self, scope: CheckScope, err: &DetectError) -> SyncReport {
    #[cfg(feature = "tracing")]
    warn!("Sync check failed: {}", err);

    let report = SyncReport::failed(ParseError::read(
      scope.failure_message(err),
      scope.failure_filepath(),
    ));

    self.status_bar.update_status(SyncStatus::ParseError, 0);
    // Settings are unavailable here, so the default (non-silent) level applies.
    self.notifier.show_error(&scope.failure_notification(err));

    report
  }
}

/// Strips a leading `Failed to parse ...:` so the message does not repeat the
/// file name shown next to it.
pub fn sanitize_parse_message(message: &str) -> String {
  FAILED_TO_PARSE_PREFIX.replace(message, "").into_owned()
}
