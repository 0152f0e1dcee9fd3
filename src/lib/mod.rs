//! Dotenv key synchronization checks.
//!
//! This library finds the `.env*` files of a workspace, extracts their key
//! names and reports which files lack keys the others define. Values are
//! never looked at.
//!
//! # Features
//!
//! - **Lenient parsing**: malformed lines are reported and skipped, never fatal
//! - **Auto and template comparison**: against the union of all keys, or a chosen template
//! - **Contained failures**: unreadable files end up in the report, not as errors
//! - **Debounced watching**: bursts of file changes trigger a single re-check
//! - **Optional tracing**: Detailed logging when the `tracing` feature is enabled
//!
//! # Example
//!
//! ```rust,no_run
//! use envsync::config::ConfigFile;
//! use envsync::detect::Detector;
//! use envsync::fs::WorkspaceFs;
//!
//! let root = std::env::current_dir().unwrap();
//! let detector = Detector::new(WorkspaceFs::new(&root), ConfigFile::discover(&root));
//!
//! let report = detector.check_sync();
//! println!("{}", report.status());
//! ```

pub mod collaborators;
pub mod compare;
pub mod config;
pub mod console;
pub mod detect;
pub mod fs;
pub mod glob;
pub mod model;
pub mod parse;
pub mod report;
pub mod safety;
pub mod watch;
