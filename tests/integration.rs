use envsync::collaborators::{EventProperties, Notifier, StatusBar, Telemetry};
use envsync::config::{ConfigFile, SyncConfig};
use envsync::detect::Detector;
use envsync::fs::{FileSystem, WorkspaceFs};
use envsync::model::{FileType, SyncStatus};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Default)]
struct Recorder {
  notes: Mutex<Vec<String>>,
  statuses: Mutex<Vec<(SyncStatus, usize)>>,
  events: Mutex<Vec<String>>,
}

impl Notifier for Recorder {
  fn show_missing_keys(&self, filepath: &str, keys: &[String]) {
    self
      .notes
      .lock()
      .unwrap()
      .push(format!("missing {} {}", filepath, keys.join(",")));
  }

  fn show_extra_keys(&self, filepath: &str, keys: &[String]) {
    self
      .notes
      .lock()
      .unwrap()
      .push(format!("extra {} {}", filepath, keys.join(",")));
  }

  fn show_error(&self, message: &str) {
    self.notes.lock().unwrap().push(format!("error {}", message));
  }

  fn show_parse_error(&self, filepath: &str, message: &str) {
    self
      .notes
      .lock()
      .unwrap()
      .push(format!("parse {} {}", filepath, message));
  }
}

impl StatusBar for Recorder {
  fn update_status(&self, status: SyncStatus, issue_count: usize) {
    self.statuses.lock().unwrap().push((status, issue_count));
  }
}

impl Telemetry for Recorder {
  fn event(&self, name: &str, _properties: &EventProperties) {
    self.events.lock().unwrap().push(name.to_string());
  }
}

fn write(root: &Path, name: &str, content: &str) {
  let path = root.join(name);
  fs::create_dir_all(path.parent().unwrap()).unwrap();
  fs::write(path, content).unwrap();
}

#[test]
fn test_workspace_check() {
  let temp_dir = TempDir::new().unwrap();
  let root = temp_dir.path();

  write(
    root,
    ".env",
    "# Database\nDB_HOST=localhost\nDB_PORT=5432\nAPI_KEY=secret\n",
  );
  write(
    root,
    ".env.example",
    "DB_HOST=\nDB_PORT=\nAPI_KEY=\nFEATURE_FLAG=\n",
  );
  write(root, ".env.dev.local", "ONLY_HERE=1\n");
  write(root, "README.md", "not a dotenv file\n");

  let ws = WorkspaceFs::new(root);
  let recorder = Arc::new(Recorder::default());
  let detector = Detector::new(ws.clone(), SyncConfig::default())
    .with_notifier(recorder.clone())
    .with_status_bar(recorder.clone())
    .with_telemetry(recorder.clone());

  let report = detector.check_sync();

  assert_eq!(report.status(), SyncStatus::MissingKeys);
  assert_eq!(report.files().len(), 2);
  assert_eq!(report.files()[0].file_type(), FileType::Base);
  assert_eq!(report.files()[1].file_type(), FileType::Example);
  assert!(report.errors().is_empty());

  let mismatch = &report.missing_keys()[0];
  assert_eq!(ws.as_relative_path(&mismatch.filepath), ".env");
  assert_eq!(mismatch.keys, vec!["FEATURE_FLAG"]);
  assert_eq!(ws.as_relative_path(&mismatch.reference), ".env.example");

  assert_eq!(*recorder.statuses.lock().unwrap(), vec![(SyncStatus::MissingKeys, 1)]);
  assert_eq!(*recorder.events.lock().unwrap(), vec!["sync-check"]);
  assert_eq!(recorder.notes.lock().unwrap().len(), 1);
}

#[test]
fn test_settings_file_drives_the_check() {
  let temp_dir = TempDir::new().unwrap();
  let root = temp_dir.path();
  fs::create_dir(root.join(".git")).unwrap();

  write(root, ".env", "A=1\n");
  write(root, ".env.example", "A=\nB=\n");
  write(root, "apps/api/.env", "A=1\nB=2\nC=3\n");
  write(
    root,
    ".envsyncrc.json",
    r#"{
  "watchPatterns": ["**/.env*"],
  "comparisonMode": "template",
  "templateFile": ".env.example",
  "temporaryIgnore": []
}
"#,
  );

  let config = ConfigFile::discover(&root.join("apps"));
  assert_eq!(config.path(), root.join(".envsyncrc.json"));

  let ws = WorkspaceFs::new(root);
  let detector = Detector::new(ws.clone(), config.clone());
  let report = detector.check_sync();

  assert_eq!(report.files().len(), 3);
  assert_eq!(report.missing_keys().len(), 1);
  assert_eq!(ws.as_relative_path(&report.missing_keys()[0].filepath), ".env");
  assert_eq!(report.missing_keys()[0].keys, vec!["B"]);

  config
    .update("temporaryIgnore", Some(serde_json::json!([".env"])))
    .unwrap();
  let report = detector.check_sync();

  assert_eq!(report.files().len(), 2);
  assert_eq!(report.status(), SyncStatus::InSync);
}

#[test]
fn test_broken_settings_become_a_report() {
  let temp_dir = TempDir::new().unwrap();
  let root = temp_dir.path();
  write(root, ".env", "A=1\n");
  write(root, ".envsyncrc.json", "{ not json");

  let recorder = Arc::new(Recorder::default());
  let detector = Detector::new(
    WorkspaceFs::new(root),
    ConfigFile::new(root.join(".envsyncrc.json")),
  )
  .with_notifier(recorder.clone())
  .with_status_bar(recorder.clone());

  let report = detector.check_sync();

  assert_eq!(report.status(), SyncStatus::ParseError);
  assert_eq!(report.errors()[0].filepath, "workspace");
  assert_eq!(*recorder.statuses.lock().unwrap(), vec![(SyncStatus::ParseError, 0)]);
  assert!(recorder.notes.lock().unwrap()[0].starts_with("error Failed to check dotenv sync:"));
}

#[test]
fn test_selected_files_with_parse_errors() {
  let temp_dir = TempDir::new().unwrap();
  let root = temp_dir.path();
  write(root, "config/.env.production", "URL=https://example.com\n=nokey\nPORT=80\n");
  write(root, "config/.env.test", "URL=\n");

  let ws = WorkspaceFs::new(root);
  let detector = Detector::new(ws.clone(), SyncConfig::default());
  let selected = vec![
    root.join("config/.env.production").display().to_string(),
    root.join("config/.env.test").display().to_string(),
  ];
  let report = detector.check_sync_for_files(&selected);

  assert_eq!(report.status(), SyncStatus::MissingKeys);
  assert_eq!(report.files()[0].file_type(), FileType::Production);
  assert_eq!(report.files()[0].keys(), &["URL".to_string(), "PORT".to_string()]);
  assert_eq!(report.errors().len(), 1);
  assert_eq!(report.errors()[0].message, "Line 2: Empty key before equals sign");
  assert_eq!(report.missing_keys()[0].keys, vec!["PORT"]);
}
