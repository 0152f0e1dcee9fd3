//! Outbound hooks the detector reports to after every check.
//!
//! All calls are fire-and-forget; nothing they return feeds back into a
//! report.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::model::SyncStatus;

pub trait Notifier: Send + Sync {
  fn show_missing_keys(&self, filepath: &str, keys: &[String]);
  fn show_extra_keys(&self, filepath: &str, keys: &[String]);
  fn show_error(&self, message: &str);
  fn show_parse_error(&self, filepath: &str, message: &str);
}

pub trait StatusBar: Send + Sync {
  fn update_status(&self, status: SyncStatus, issue_count: usize);
}

/// String-valued event properties, kept sorted for stable output.
pub type EventProperties = BTreeMap<String, String>;

pub trait Telemetry: Send + Sync {
  fn event(&self, name: &str, properties: &EventProperties);
}

impl<T: Notifier + ?Sized> Notifier for Arc<T> {
  fn show_missing_keys(&self, filepath: &str, keys: &[String]) {
    (**self).show_missing_keys(filepath, keys)
  }

  fn show_extra_keys(&self, filepath: &str, keys: &[String]) {
    (**self).show_extra_keys(filepath, keys)
  }

  fn show_error(&self, message: &str) {
    (**self).show_error(message)
  }

  fn show_parse_error(&self, filepath: &str, message: &str) {
    (**self).show_parse_error(filepath, message)
  }
}

impl<T: StatusBar + ?Sized> StatusBar for Arc<T> {
  fn update_status(&self, status: SyncStatus, issue_count: usize) {
    (**self).update_status(status, issue_count)
  }
}

impl<T: Telemetry + ?Sized> Telemetry for Arc<T> {
  fn event(&self, name: &str, properties: &EventProperties) {
    (**self).event(name, properties)
  }
}

/// Drops every call. Useful for headless checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl Notifier for Silent {
  fn show_missing_keys(&self, _filepath: &str, _keys: &[String]) {}
  fn show_extra_keys(&self, _filepath: &str, _keys: &[String]) {}
  fn show_error(&self, _message: &str) {}
  fn show_parse_error(&self, _filepath: &str, _message: &str) {}
}

impl StatusBar for Silent {
  fn update_status(&self, _status: SyncStatus, _issue_count: usize) {}
}

impl Telemetry for Silent {
  fn event(&self, _name: &str, _properties: &EventProperties) {}
}
