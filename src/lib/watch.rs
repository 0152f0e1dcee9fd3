//! Re-checking on file changes.
//!
//! [`Fingerprint`] snapshots the watched files so a poller can tell when
//! something was created, changed or deleted. [`Debouncer`] turns a burst of
//! such events into a single run and never lets two runs overlap.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

#[cfg(feature = "tracing")]
use tracing::{debug, trace, warn};

use crate::config::{SyncConfig, is_settings_file};
use crate::detect::MAX_FILES_PER_PATTERN;
use crate::fs::FileSystem;
use crate::parse::should_exclude_file;

/// Coalesces triggers into one run after a quiet period.
///
/// Each [`trigger`](Debouncer::trigger) restarts the quiet period. When it
/// elapses, the run waits for the previous one (if still going) and only then
/// starts, so at most one run is in flight. Must be used inside a tokio
/// runtime.
pub struct Debouncer<F> {
  job: Arc<F>,
  delay: Duration,
  pending: Mutex<Option<JoinHandle<()>>>,
  current: Arc<tokio::sync::Mutex<Option<JoinHandle<()>>>>,
}

impl<F, Fut> Debouncer<F>
where
  F: Fn() -> Fut + Send + Sync + 'static,
  Fut: Future<Output = ()> + Send + 'static,
{
  pub fn new(delay: Duration, job: F) -> Self {
    Self {
      job: Arc::new(job),
      delay,
      pending: Mutex::new(None),
      current: Arc::new(tokio::sync::Mutex::new(None)),
    }
  }

  pub fn delay(&self) -> Duration {
    self.delay
  }

  /// Schedules a run after the quiet period, replacing any scheduled one.
  pub fn trigger(&self) {
    let job = Arc::clone(&self.job);
    let current = Arc::clone(&self.current);
    let delay = self.delay;

    let timer = tokio::spawn(async move {
      tokio::time::sleep(delay).await;

      let mut slot = current.lock().await;
      if let Some(running) = slot.as_mut() {
        if !running.is_finished() {
          #[cfg(feature = "tracing")]
          debug!("Waiting for the previous run to finish");

          if let Err(err) = running.await {
            #[cfg(feature = "tracing")]
            warn!("Previous run failed: {}", err);
            #[cfg(not(feature = "tracing"))]
            let _ = err;
          }
        }
      }

      #[cfg(feature = "tracing")]
      trace!("Starting debounced run");

      *slot = Some(tokio::spawn(job()));
    });

    let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(previous) = pending.replace(timer) {
      previous.abort();
    }
  }

  /// Drops the scheduled run, if any. A run already in flight continues.
  pub fn cancel(&self) {
    let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(timer) = pending.take() {
      timer.abort();
    }
  }

  /// Waits for the in-flight run, if any. Scheduled runs are not awaited.
  pub async fn idle(&self) {
    let mut slot = self.current.lock().await;
    if let Some(running) = slot.as_mut() {
      if !running.is_finished() {
        let _ = running.await;
      }
    }
  }
}

impl<F> Drop for Debouncer<F> {
  fn drop(&mut self) {
    let pending = self.pending.get_mut().unwrap_or_else(PoisonError::into_inner);
    if let Some(timer) = pending.take() {
      timer.abort();
    }
  }
}

/// Modification time (ms since the epoch) and size of a watched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
  pub modified: i64,
  pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEvent {
  Created(String),
  Changed(String),
  Deleted(String),
}

impl FileEvent {
  pub fn path(&self) -> &str {
    match self {
      FileEvent::Created(path) | FileEvent::Changed(path) | FileEvent::Deleted(path) => path,
    }
  }
}

/// The watched files of a workspace at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fingerprint {
  files: BTreeMap<String, FileStamp>,
}

impl Fingerprint {
  /// Stamps every file matched by the watch patterns that is neither
  /// excluded nor temporarily ignored. Unreadable entries are left out.
  pub fn capture(fs: &dyn FileSystem, config: &SyncConfig) -> Self {
    let mut files = BTreeMap::new();

    for pattern in &config.watch_patterns {
      let found = match fs.find_files(pattern, None, Some(MAX_FILES_PER_PATTERN)) {
        Ok(found) => found,
        Err(_err) => {
          #[cfg(feature = "tracing")]
          warn!("Failed to search pattern {}: {}", pattern, _err);
          continue;
        }
      };

      for info in found {
        let relative = fs.as_relative_path(&info.filepath);
        if is_settings_file(&relative)
          || should_exclude_file(&relative, &config.exclude_patterns)
          || config.temporary_ignore.contains(&relative)
        {
          continue;
        }

        match fs.file_stats(&info.filepath) {
          Ok(stats) => {
            files.insert(
              info.filepath,
              FileStamp {
                modified: stats.mtime.timestamp_millis(),
                size: stats.size,
              },
            );
          }
          Err(_err) => {
            #[cfg(feature = "tracing")]
            debug!("Not stamping {}: {}", info.filepath, _err);
          }
        }
      }
    }

    Self { files }
  }

  pub fn len(&self) -> usize {
    self.files.len()
  }

  pub fn is_empty(&self) -> bool {
    self.files.is_empty()
  }

  pub fn entries(&self) -> impl Iterator<Item = (&str, &FileStamp)> {
    self.files.iter().map(|(path, stamp)| (path.as_str(), stamp))
  }

  /// What happened between `self` and the later `newer`, in path order.
  pub fn changes(&self, newer: &Fingerprint) -> Vec<FileEvent> {
    let mut events: Vec<FileEvent> = newer
      .files
      .iter()
      .filter_map(|(path, stamp)| match self.files.get(path) {
        None => Some(FileEvent::Created(path.clone())),
        Some(old) if old != stamp => Some(FileEvent::Changed(path.clone())),
        Some(_) => None,
      })
      .collect();

    events.extend(
      self
        .files
        .keys()
        .filter(|path| !newer.files.contains_key(*path))
        .map(|path| FileEvent::Deleted(path.clone())),
    );
    events.sort_by(|a, b| a.path().cmp(b.path()));
    events
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::fs::WorkspaceFs;
  use pretty_assertions::assert_eq;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use tempfile::TempDir;
  use tokio::time::sleep;

  fn counting_job(
    runs: &Arc<AtomicUsize>,
  ) -> impl Fn() -> std::future::Ready<()> + Send + Sync + 'static {
    let runs = Arc::clone(runs);
    move || {
      runs.fetch_add(1, Ordering::SeqCst);
      std::future::ready(())
    }
  }

  #[tokio::test(start_paused = true)]
  async fn test_burst_coalesces_into_one_run() {
    let runs = Arc::new(AtomicUsize::new(0));
    let debouncer = Debouncer::new(Duration::from_millis(100), counting_job(&runs));

    for _ in 0..3 {
      debouncer.trigger();
      sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(runs.load(Ordering::SeqCst), 0);

    sleep(Duration::from_millis(200)).await;
    debouncer.idle().await;
    assert_eq!(runs.load(Ordering::SeqCst), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_separate_bursts_run_separately() {
    let runs = Arc::new(AtomicUsize::new(0));
    let debouncer = Debouncer::new(Duration::from_millis(100), counting_job(&runs));

    debouncer.trigger();
    sleep(Duration::from_millis(300)).await;
    debouncer.trigger();
    sleep(Duration::from_millis(300)).await;
    debouncer.idle().await;

    assert_eq!(runs.load(Ordering::SeqCst), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_cancel_drops_scheduled_run() {
    let runs = Arc::new(AtomicUsize::new(0));
    let debouncer = Debouncer::new(Duration::from_millis(100), counting_job(&runs));

    debouncer.trigger();
    debouncer.cancel();
    sleep(Duration::from_millis(500)).await;

    assert_eq!(runs.load(Ordering::SeqCst), 0);
  }

  #[tokio::test(start_paused = true)]
  async fn test_runs_never_overlap() {
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let runs = Arc::new(AtomicUsize::new(0));

    let debouncer = {
      let (active, peak, runs) = (active.clone(), peak.clone(), runs.clone());
      Debouncer::new(Duration::from_millis(100), move || {
        let (active, peak, runs) = (active.clone(), peak.clone(), runs.clone());
        async move {
          let now = active.fetch_add(1, Ordering::SeqCst) + 1;
          peak.fetch_max(now, Ordering::SeqCst);
          sleep(Duration::from_millis(300)).await;
          active.fetch_sub(1, Ordering::SeqCst);
          runs.fetch_add(1, Ordering::SeqCst);
        }
      })
    };

    debouncer.trigger();
    sleep(Duration::from_millis(150)).await;
    assert_eq!(active.load(Ordering::SeqCst), 1);

    debouncer.trigger();
    sleep(Duration::from_millis(1000)).await;
    debouncer.idle().await;

    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(peak.load(Ordering::SeqCst), 1);
  }

  fn workspace(files: &[(&str, &str)]) -> (TempDir, WorkspaceFs) {
    let dir = TempDir::new().unwrap();
    for (name, content) in files {
      std::fs::write(dir.path().join(name), content).unwrap();
    }
    let ws = WorkspaceFs::new(dir.path());
    (dir, ws)
  }

  #[test]
  fn test_capture_skips_excluded_and_ignored() {
    let (_dir, ws) = workspace(&[
      (".env", "A=1"),
      (".env.dev.local", "A=1"),
      (".env.test", "A=1"),
      ("README.md", "hi"),
    ]);
    let config = SyncConfig {
      temporary_ignore: vec![".env.test".to_string()],
      ..SyncConfig::default()
    };
    let fingerprint = Fingerprint::capture(&ws, &config);

    let paths: Vec<String> = fingerprint
      .entries()
      .map(|(path, _)| ws.as_relative_path(path))
      .collect();
    assert_eq!(paths, vec![".env"]);
    assert_eq!(fingerprint.entries().next().unwrap().1.size, 3);
  }

  #[test]
  fn test_changes() {
    let (dir, ws) = workspace(&[(".env", "A=1"), (".env.local", "A=1")]);
    let config = SyncConfig::default();
    let before = Fingerprint::capture(&ws, &config);

    std::fs::write(dir.path().join(".env"), "A=1\nB=2").unwrap();
    std::fs::remove_file(dir.path().join(".env.local")).unwrap();
    std::fs::write(dir.path().join(".env.test"), "A=1").unwrap();
    let after = Fingerprint::capture(&ws, &config);

    let events: Vec<(String, &str)> = before
      .changes(&after)
      .iter()
      .map(|event| {
        let kind = match event {
          FileEvent::Created(_) => "created",
          FileEvent::Changed(_) => "changed",
          FileEvent::Deleted(_) => "deleted",
        };
        (ws.as_relative_path(event.path()), kind)
      })
      .collect();

    assert_eq!(
      events,
      vec![
        (".env".to_string(), "changed"),
        (".env.local".to_string(), "deleted"),
        (".env.test".to_string(), "created"),
      ]
    );
    assert!(after.changes(&after).is_empty());
  }
}
