//! Key-set comparison across dotenv files.
//!
//! # Reference set
//!
//! In template mode with a template that is present among the compared files,
//! the reference is exactly the template's key set (file order). Otherwise it
//! is the union of every file's keys, in first-seen order across the input.
//!
//! Every file lacking part of the reference gets one [`KeyMismatch`]. Keys a
//! file has beyond the reference are not reported.

use std::collections::HashSet;

use indexmap::IndexSet;

#[cfg(feature = "tracing")]
use tracing::{debug, trace};

use crate::model::{
  CompareMode, CompareOptions, DotenvFile, KeyMismatch, OTHER_FILES_REFERENCE, SyncReport,
  SyncStatus,
};

/// Compares the key sets of `files` and builds a report.
///
/// Pure apart from the report timestamp; the returned `errors` list is always
/// empty.
pub fn compare_files(files: &[DotenvFile], options: &CompareOptions) -> SyncReport {
  if files.is_empty() {
    return SyncReport::no_files();
  }

  let reference = reference_keys(files, options);

  #[cfg(feature = "tracing")]
  debug!(
    "Comparing {} files against {} reference keys",
    files.len(),
    reference.len()
  );

  let missing_keys: Vec<KeyMismatch> = files
    .iter()
    .filter_map(|file| find_missing(file, files, &reference))
    .collect();

  let status = if missing_keys.is_empty() {
    SyncStatus::InSync
  } else {
    SyncStatus::MissingKeys
  };

  SyncReport::new(status, files.to_vec(), missing_keys, Vec::new())
}

fn reference_keys<'a>(files: &'a [DotenvFile], options: &CompareOptions) -> IndexSet<&'a str> {
  let template = match (options.mode, options.template_path.as_deref()) {
    (CompareMode::Template, Some(path)) => files.iter().find(|f| f.path() == path),
    _ => None,
  };

  match template {
    Some(template) => {
      #[cfg(feature = "tracing")]
      debug!("Using {} as the reference", template.path());

      template.keys().iter().map(String::as_str).collect()
    }
    None => files
      .iter()
      .flat_map(|f| f.keys().iter().map(String::as_str))
      .collect(),
  }
}

fn find_missing(
  file: &DotenvFile,
  files: &[DotenvFile],
  reference: &IndexSet<&str>,
) -> Option<KeyMismatch> {
  let own: HashSet<&str> = file.keys().iter().map(String::as_str).collect();
  let missing: Vec<&str> = reference
    .iter()
    .copied()
    .filter(|key| !own.contains(key))
    .collect();

  if missing.is_empty() {
    return None;
  }

  let reference_path = files
    .iter()
    .find(|other| other.path() != file.path() && missing.iter().all(|key| other.has_key(key)))
    .map_or(OTHER_FILES_REFERENCE, DotenvFile::path);

  #[cfg(feature = "tracing")]
  trace!(
    "{} is missing {:?} (reference: {})",
    file.path(),
    missing,
    reference_path
  );

  Some(KeyMismatch {
    filepath: file.path().to_string(),
    keys: missing.into_iter().map(str::to_string).collect(),
    reference: reference_path.to_string(),
  })
}

/// Whether every file has exactly the key set of the first one.
///
/// Symmetric: a file whose keys are a strict superset or subset of the
/// first file's is out of sync.
pub fn are_files_in_sync(files: &[DotenvFile]) -> bool {
  let Some((first, rest)) = files.split_first() else {
    return true;
  };

  let first_keys: HashSet<&str> = first.keys().iter().map(String::as_str).collect();

  rest.iter().all(|file| {
    let keys: HashSet<&str> = file.keys().iter().map(String::as_str).collect();
    keys.len() == first_keys.len() && first_keys.iter().all(|key| keys.contains(key))
  })
}
