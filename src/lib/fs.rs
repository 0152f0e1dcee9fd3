//! File-system access used by the detector.
//!
//! [`FileSystem`] is the seam the detector reads through; [`WorkspaceFs`] is
//! the real implementation, rooted at a workspace directory.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use walkdir::WalkDir;

#[cfg(feature = "tracing")]
use tracing::{debug, trace, warn};

use crate::glob::{GlobError, GlobPattern};

/// Directories never descended into during discovery.
const SKIPPED_DIRS: &[&str] = &[".git", "node_modules", "target"];

/// A file found by [`FileSystem::find_files`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
  pub filepath: String,
  pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStats {
  pub mtime: DateTime<Utc>,
  pub size: u64,
  pub is_file: bool,
  pub is_directory: bool,
}

pub trait FileSystem: Send + Sync {
  /// Files whose workspace-relative path matches `pattern` and not `exclude`.
  fn find_files(
    &self,
    pattern: &str,
    exclude: Option<&str>,
    max_results: Option<usize>,
  ) -> Result<Vec<FileInfo>, FsError>;

  fn read_file(&self, path: &str) -> Result<String, FsError>;

  fn file_stats(&self, path: &str) -> Result<FileStats, FsError>;

  /// Workspace-relative form of `path`, `/`-separated. Paths outside the
  /// workspace are returned unchanged.
  fn as_relative_path(&self, path: &str) -> String;

  fn file_exists(&self, path: &str) -> bool;
}

impl<T: FileSystem + ?Sized> FileSystem for std::sync::Arc<T> {
  fn find_files(
    &self,
    pattern: &str,
    exclude: Option<&str>,
    max_results: Option<usize>,
  ) -> Result<Vec<FileInfo>, FsError> {
    (**self).find_files(pattern, exclude, max_results)
  }

  fn read_file(&self, path: &str) -> Result<String, FsError> {
    (**self).read_file(path)
  }

  fn file_stats(&self, path: &str) -> Result<FileStats, FsError> {
    (**self).file_stats(path)
  }

  fn as_relative_path(&self, path: &str) -> String {
    (**self).as_relative_path(path)
  }

  fn file_exists(&self, path: &str) -> bool {
    (**self).file_exists(path)
  }
}

/// Errors raised by [`FileSystem`] implementations.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
  #[error("Failed to read {path}: {source}")]
  Read {
    path: String,
    #[source]
    source: std::io::Error,
  },
  #[error("Failed to stat {path}: {source}")]
  Stat {
    path: String,
    #[source]
    source: std::io::Error,
  },
  #[error("Failed to walk {root}: {source}")]
  Walk {
    root: String,
    #[source]
    source: walkdir::Error,
  },
  #[error(transparent)]
  Pattern(#[from] GlobError),
}

/// [`FileSystem`] over a directory on disk.
#[derive(Debug, Clone)]
pub struct WorkspaceFs {
  root: PathBuf,
}

impl WorkspaceFs {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  fn resolve(&self, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
      path.to_path_buf()
    } else {
      self.root.join(path)
    }
  }

  fn relative_to_root(&self, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(&self.root).ok()?;
    let parts: Vec<_> = relative
      .components()
      .map(|c| c.as_os_str().to_string_lossy())
      .collect();
    Some(parts.join("/"))
  }
}

impl FileSystem for WorkspaceFs {
  fn find_files(
    &self,
    pattern: &str,
    exclude: Option<&str>,
    max_results: Option<usize>,
  ) -> Result<Vec<FileInfo>, FsError> {
    let include = discovery_globs(pattern)?;
    let exclude = exclude.map(discovery_globs).transpose()?.unwrap_or_default();
    let limit = max_results.unwrap_or(usize::MAX);

    #[cfg(feature = "tracing")]
    debug!("Searching {} for {}", self.root.display(), pattern);

    let walker = WalkDir::new(&self.root)
      .sort_by_file_name()
      .into_iter()
      .filter_entry(|entry| {
        let name = entry.file_name().to_string_lossy();
        entry.depth() == 0
          || !entry.file_type().is_dir()
          || !SKIPPED_DIRS.iter().any(|dir| *dir == name)
      });

    let mut found = Vec::new();
    for entry in walker {
      let entry = match entry {
        Ok(entry) => entry,
        Err(source) if source.depth() == 0 => {
          return Err(FsError::Walk {
            root: self.root.display().to_string(),
            source,
          });
        }
        Err(_err) => {
          #[cfg(feature = "tracing")]
          warn!("Skipping unreadable entry: {}", _err);
          continue;
        }
      };
      if !entry.file_type().is_file() {
        continue;
      }

      let Some(relative) = self.relative_to_root(entry.path()) else {
        continue;
      };
      let any_match = |globs: &[GlobPattern]| globs.iter().any(|glob| glob.is_match(&relative));
      if !any_match(&include) || any_match(&exclude) {
        continue;
      }

      #[cfg(feature = "tracing")]
      trace!("Matched {}", relative);

      let filepath = entry.path().to_string_lossy().into_owned();
      found.push(FileInfo {
        uri: format!("file://{}", filepath),
        filepath,
      });
      if found.len() >= limit {
        break;
      }
    }

    Ok(found)
  }

  fn read_file(&self, path: &str) -> Result<String, FsError> {
    std::fs::read_to_string(self.resolve(path)).map_err(|source| FsError::Read {
      path: path.to_string(),
      source,
    })
  }

  fn file_stats(&self, path: &str) -> Result<FileStats, FsError> {
    let stat_error = |source| FsError::Stat {
      path: path.to_string(),
      source,
    };
    let metadata = std::fs::metadata(self.resolve(path)).map_err(stat_error)?;
    let modified = metadata.modified().map_err(stat_error)?;

    Ok(FileStats {
      mtime: DateTime::<Utc>::from(modified),
      size: metadata.len(),
      is_file: metadata.is_file(),
      is_directory: metadata.is_dir(),
    })
  }

  fn as_relative_path(&self, path: &str) -> String {
    self
      .relative_to_root(Path::new(path))
      .unwrap_or_else(|| path.to_string())
  }

  fn file_exists(&self, path: &str) -> bool {
    self.resolve(path).is_file()
  }
}

/// Globs for a discovery pattern. A leading `**/` also matches at the
/// workspace root, as editor file search treats it.
fn discovery_globs(pattern: &str) -> Result<Vec<GlobPattern>, GlobError> {
  let mut globs = vec![GlobPattern::new(pattern)?];
  if let Some(rest) = pattern.strip_prefix("**/").filter(|rest| !rest.is_empty()) {
    globs.push(GlobPattern::new(rest)?);
  }
  Ok(globs)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;
  use tempfile::TempDir;

  fn workspace(files: &[&str]) -> (TempDir, WorkspaceFs) {
    let dir = TempDir::new().unwrap();
    for file in files {
      let path = dir.path().join(file);
      fs::create_dir_all(path.parent().unwrap()).unwrap();
      fs::write(&path, "KEY=value\n").unwrap();
    }
    let ws = WorkspaceFs::new(dir.path());
    (dir, ws)
  }

  fn relative(ws: &WorkspaceFs, found: &[FileInfo]) -> Vec<String> {
    found.iter().map(|f| ws.as_relative_path(&f.filepath)).collect()
  }

  #[test]
  fn test_find_files_root_pattern() {
    let (_dir, ws) = workspace(&[".env", ".env.local", "apps/web/.env", "README.md"]);

    let found = ws.find_files(".env*", None, None).unwrap();
    assert_eq!(relative(&ws, &found), vec![".env", ".env.local"]);
    assert!(found[0].uri.starts_with("file://"));
  }

  #[test]
  fn test_find_files_recursive_with_exclude_and_limit() {
    let (_dir, ws) = workspace(&[".env", "apps/a/.env", "apps/b/.env", "apps/b/.env.dev.local"]);

    let found = ws.find_files("**/.env*", Some("**/.env.*.local"), None).unwrap();
    assert_eq!(relative(&ws, &found), vec![".env", "apps/a/.env", "apps/b/.env"]);

    let limited = ws.find_files("**.env", None, Some(2)).unwrap();
    assert_eq!(limited.len(), 2);
  }

  #[test]
  fn test_find_files_skips_vendor_dirs() {
    let (_dir, ws) = workspace(&["node_modules/pkg/.env", ".git/.env", "src/.env"]);

    let found = ws.find_files("**/.env", None, None).unwrap();
    assert_eq!(relative(&ws, &found), vec!["src/.env"]);
  }

  #[cfg(unix)]
  #[test]
  fn test_find_files_skips_unreadable_dir() {
    use std::os::unix::fs::PermissionsExt;

    let (dir, ws) = workspace(&[".env", ".env.example", "secret/.env", "apps/.env"]);
    let secret = dir.path().join("secret");
    fs::set_permissions(&secret, fs::Permissions::from_mode(0o000)).unwrap();

    // Permissions do not bind a privileged user.
    let readable = fs::read_dir(&secret).is_ok();
    let root_only = ws.find_files(".env*", None, None);
    let recursive = ws.find_files("**/.env*", None, None);
    fs::set_permissions(&secret, fs::Permissions::from_mode(0o755)).unwrap();
    if readable {
      return;
    }

    assert_eq!(relative(&ws, &root_only.unwrap()), vec![".env", ".env.example"]);
    assert_eq!(
      relative(&ws, &recursive.unwrap()),
      vec![".env", ".env.example", "apps/.env"]
    );
  }

  #[test]
  fn test_find_files_missing_root() {
    let ws = WorkspaceFs::new("/definitely/not/a/workspace");
    assert!(matches!(
      ws.find_files(".env*", None, None),
      Err(FsError::Walk { .. })
    ));
  }

  #[test]
  fn test_find_files_invalid_pattern() {
    let (_dir, ws) = workspace(&[".env"]);
    assert!(matches!(
      ws.find_files("", None, None),
      Err(FsError::Pattern(GlobError::Empty))
    ));
  }

  #[test]
  fn test_read_and_stat() {
    let (_dir, ws) = workspace(&[".env"]);

    assert_eq!(ws.read_file(".env").unwrap(), "KEY=value\n");
    let stats = ws.file_stats(".env").unwrap();
    assert!(stats.is_file);
    assert!(!stats.is_directory);
    assert_eq!(stats.size, 10);
    assert!(ws.file_exists(".env"));
    assert!(!ws.file_exists(".env.missing"));
  }

  #[test]
  fn test_read_missing_file() {
    let (_dir, ws) = workspace(&[]);
    let err = ws.read_file(".env").unwrap_err();
    assert!(matches!(err, FsError::Read { .. }));
    assert!(err.to_string().starts_with("Failed to read .env:"));
  }

  #[test]
  fn test_as_relative_path_outside_workspace() {
    let (_dir, ws) = workspace(&[]);
    assert_eq!(ws.as_relative_path("/somewhere/else/.env"), "/somewhere/else/.env");
  }
}
