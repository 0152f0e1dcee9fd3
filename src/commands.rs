use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use clap::ValueEnum;
use serde_json::{Value, json};

#[cfg(feature = "tracing")]
use tracing::{debug, info, warn};

use envsync::config::{ConfigError, ConfigFile, SyncConfig};
use envsync::console::{ConsoleNotifier, ConsoleStatusBar, LogTelemetry};
use envsync::detect::Detector;
use envsync::fs::{FileSystem, WorkspaceFs};
use envsync::model::{SyncReport, SyncStatus};
use envsync::report::{render_json, render_markdown};
use envsync::safety::{
  SafetyFile, format_safety_report, perform_safety_checks, safety_recommendations,
  should_exclude_file_for_safety, should_proceed,
};
use envsync::watch::{Debouncer, Fingerprint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
  Text,
  Json,
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
  #[error("Please select at least 2 .env files to compare")]
  NotEnoughFiles,
  #[error("Please select at least 2 .env files")]
  NotEnoughDotenvFiles,
  #[error("{0} is not a .env file")]
  NotDotenv(String),
  #[error(transparent)]
  Config(#[from] ConfigError),
  #[error("Failed to render report: {0}")]
  Render(#[from] serde_json::Error),
  #[error(transparent)]
  Io(#[from] std::io::Error),
}

/// The workspace a command runs against.
pub struct Workspace {
  fs: Arc<WorkspaceFs>,
  config: Arc<ConfigFile>,
}

impl Workspace {
  pub fn open(root: Option<PathBuf>) -> Result<Self, CommandError> {
    let root = match root {
      Some(root) => root,
      None => std::env::current_dir()?,
    };
    let root = std::fs::canonicalize(root)?;

    #[cfg(feature = "tracing")]
    debug!("Workspace root: {}", root.display());

    Ok(Self {
      config: Arc::new(ConfigFile::discover(&root)),
      fs: Arc::new(WorkspaceFs::new(root)),
    })
  }

  /// Settings for the console collaborators. A broken settings file is
  /// reported by the check itself, so defaults are fine here.
  fn settings(&self) -> SyncConfig {
    self.config.load().unwrap_or_default()
  }

  fn detector(&self, settings: &SyncConfig) -> Detector {
    Detector::new(Arc::clone(&self.fs), Arc::clone(&self.config))
      .with_notifier(ConsoleNotifier::new(settings.notification_level))
      .with_status_bar(ConsoleStatusBar::new(settings.status_bar_enabled))
      .with_telemetry(LogTelemetry::new(settings.telemetry_enabled))
  }

  fn resolve(&self, file: &Path) -> String {
    self.fs.root().join(file).to_string_lossy().into_owned()
  }

  fn recheck(&self) {
    let detector = self.detector(&self.settings());
    detector.check_sync();
    detector.dispose();
  }
}

fn is_dotenv(path: &str) -> bool {
  Path::new(path)
    .file_name()
    .is_some_and(|name| name.to_string_lossy().starts_with(".env"))
}

fn ensure_dotenv(ws: &Workspace, file: &Path) -> Result<String, CommandError> {
  let path = ws.resolve(file);
  if !is_dotenv(&path) {
    return Err(CommandError::NotDotenv(file.display().to_string()));
  }
  Ok(ws.fs.as_relative_path(&path))
}

fn exit_code(report: &SyncReport) -> ExitCode {
  match report.status() {
    SyncStatus::MissingKeys | SyncStatus::ParseError => ExitCode::FAILURE,
    _ => ExitCode::SUCCESS,
  }
}

fn print_report(ws: &Workspace, report: &SyncReport, format: Format) -> Result<(), CommandError> {
  match format {
    Format::Json => println!("{}", render_json(report)?),
    Format::Text if report.errors().is_empty() && report.status() == SyncStatus::NoFiles => {
      println!("No .env files found in workspace")
    }
    Format::Text if report.errors().is_empty() && report.status() == SyncStatus::InSync => {
      println!("All {} .env files are in sync", report.files().len())
    }
    Format::Text => print!("{}", render_markdown(report, &*ws.fs)),
  }
  Ok(())
}

pub fn check(ws: &Workspace, format: Format) -> Result<ExitCode, CommandError> {
  let detector = ws.detector(&ws.settings());
  let report = detector.check_sync();
  detector.dispose();

  print_report(ws, &report, format)?;
  Ok(exit_code(&report))
}

pub fn compare(
  ws: &Workspace,
  files: &[PathBuf],
  format: Format,
) -> Result<ExitCode, CommandError> {
  if files.len() < 2 {
    return Err(CommandError::NotEnoughFiles);
  }

  let paths: Vec<String> = files
    .iter()
    .map(|file| ws.resolve(file))
    .filter(|path| is_dotenv(path))
    .collect();
  if paths.len() < 2 {
    return Err(CommandError::NotEnoughDotenvFiles);
  }

  let detector = ws.detector(&ws.settings());
  let report = detector.check_sync_for_files(&paths);
  detector.dispose();

  print_report(ws, &report, format)?;
  Ok(exit_code(&report))
}

pub fn watch(ws: &Workspace, interval_ms: u64) -> Result<ExitCode, CommandError> {
  let runtime = tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()?;

  runtime.block_on(async {
    let mut settings = ws.settings();
    let detector = Arc::new(RwLock::new(Arc::new(ws.detector(&settings))));
    current_detector(&detector).check_sync();

    let job_detector = Arc::clone(&detector);
    let debouncer = Debouncer::new(Duration::from_millis(settings.debounce_ms), move || {
      let detector = current_detector(&job_detector);
      async move {
        if let Err(_err) = tokio::task::spawn_blocking(move || detector.check_sync()).await {
          #[cfg(feature = "tracing")]
          warn!("Sync check did not complete: {}", _err);
        }
      }
    });

    let mut fingerprint = Fingerprint::capture(&*ws.fs, &settings);
    let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms.max(10)));

    #[cfg(feature = "tracing")]
    info!(
      "Watching {} files (debounce {} ms)",
      fingerprint.len(),
      debouncer.delay().as_millis()
    );

    loop {
      tokio::select! {
        _ = ticker.tick() => {}
        _ = tokio::signal::ctrl_c() => break,
      }

      let latest_settings = ws.settings();
      let latest = Fingerprint::capture(&*ws.fs, &latest_settings);
      let events = fingerprint.changes(&latest);

      #[cfg(feature = "tracing")]
      for event in &events {
        debug!("{:?}", event);
      }

      if latest_settings != settings {
        #[cfg(feature = "tracing")]
        debug!("Settings changed, rebuilding the detector");

        let fresh = Arc::new(ws.detector(&latest_settings));
        let stale = std::mem::replace(
          &mut *detector.write().unwrap_or_else(PoisonError::into_inner),
          fresh,
        );
        stale.dispose();
      }
      if !events.is_empty() || latest_settings != settings {
        debouncer.trigger();
      }
      fingerprint = latest;
      settings = latest_settings;
    }

    debouncer.cancel();
    debouncer.idle().await;
    current_detector(&detector).dispose();

    Ok(ExitCode::SUCCESS)
  })
}

fn current_detector(slot: &RwLock<Arc<Detector>>) -> Arc<Detector> {
  slot.read().unwrap_or_else(PoisonError::into_inner).clone()
}

pub fn set_template(ws: &Workspace, file: &Path) -> Result<ExitCode, CommandError> {
  let relative = ensure_dotenv(ws, file)?;

  ws.config
    .update("templateFile", Some(Value::String(relative.clone())))?;
  ws.config.update("comparisonMode", Some(json!("template")))?;
  ws.recheck();

  println!(
    "Set {} as template. All .env files will be compared against it.",
    relative
  );
  Ok(ExitCode::SUCCESS)
}

pub fn clear_template(ws: &Workspace) -> Result<ExitCode, CommandError> {
  ws.config.update("templateFile", None)?;
  ws.config.update("comparisonMode", Some(json!("auto")))?;
  ws.recheck();

  println!("Cleared template. Returned to automatic comparison.");
  Ok(ExitCode::SUCCESS)
}

pub fn ignore(ws: &Workspace, file: &Path) -> Result<ExitCode, CommandError> {
  let relative = ensure_dotenv(ws, file)?;
  let mut ignored = ws.config.load()?.temporary_ignore;

  if ignored.contains(&relative) {
    println!("{} is already being ignored", relative);
    return Ok(ExitCode::SUCCESS);
  }

  ignored.push(relative.clone());
  ws.config.update("temporaryIgnore", Some(json!(ignored)))?;
  ws.recheck();

  println!(
    "Temporarily ignoring {}. Use `envsync unignore` to re-enable.",
    relative
  );
  Ok(ExitCode::SUCCESS)
}

pub fn unignore(ws: &Workspace, file: &Path) -> Result<ExitCode, CommandError> {
  let mut ignored = ws.config.load()?.temporary_ignore;
  if ignored.is_empty() {
    println!("No files are currently being ignored");
    return Ok(ExitCode::SUCCESS);
  }

  let relative = ws.fs.as_relative_path(&ws.resolve(file));
  if !ignored.contains(&relative) {
    println!("{} is not currently being ignored", relative);
    return Ok(ExitCode::SUCCESS);
  }

  ignored.retain(|path| *path != relative);
  ws.config.update("temporaryIgnore", Some(json!(ignored)))?;
  ws.recheck();

  println!("No longer ignoring {}", relative);
  Ok(ExitCode::SUCCESS)
}

pub fn clear_ignored(ws: &Workspace) -> Result<ExitCode, CommandError> {
  if ws.config.load()?.temporary_ignore.is_empty() {
    println!("No files are currently being ignored");
    return Ok(ExitCode::SUCCESS);
  }

  ws.config.update("temporaryIgnore", Some(json!([])))?;
  ws.recheck();

  println!("Cleared ignore list. All .env files will be checked again.");
  Ok(ExitCode::SUCCESS)
}

pub fn safety(ws: &Workspace) -> Result<ExitCode, CommandError> {
  let settings = ws.config.load()?;
  let files: Vec<SafetyFile> = Fingerprint::capture(&*ws.fs, &settings)
    .entries()
    .map(|(path, stamp)| SafetyFile {
      path: path.to_string(),
      size: stamp.size,
    })
    .collect();

  let mut result = perform_safety_checks(&files);
  result.recommendations = safety_recommendations(&result, &settings);
  print!("{}", format_safety_report(&result));

  let oversized: Vec<&SafetyFile> = files
    .iter()
    .filter(|file| should_exclude_file_for_safety(file, &settings))
    .collect();
  if !oversized.is_empty() {
    println!();
    println!("## Over the size limit");
    for file in oversized {
      println!("- {} ({} bytes)", ws.fs.as_relative_path(&file.path), file.size);
    }
  }

  Ok(if should_proceed(&result, &settings) {
    ExitCode::SUCCESS
  } else {
    ExitCode::FAILURE
  })
}
