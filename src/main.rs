use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;

use commands::{Format, Workspace};

#[derive(Parser)]
#[command(
  name = "envsync",
  about = "Find keys missing from the .env files of a project",
  version,
  author
)]
struct Cli {
  /// Workspace root (defaults to the current directory)
  #[arg(short, long, global = true)]
  root: Option<PathBuf>,

  /// Verbose output (-v for verbose, -vv for very verbose)
  #[arg(short, long, action = clap::ArgAction::Count, global = true)]
  verbose: u8,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Check every dotenv file in the workspace
  Check {
    #[arg(short, long, value_enum, default_value_t = Format::Text)]
    format: Format,
  },
  /// Compare only the given files
  Compare {
    /// At least two .env files, relative to the workspace root
    #[arg(required = true)]
    files: Vec<PathBuf>,
    #[arg(short, long, value_enum, default_value_t = Format::Text)]
    format: Format,
  },
  /// Re-check whenever a watched file changes
  Watch {
    /// How often to look for changes
    #[arg(long, default_value_t = 500)]
    interval_ms: u64,
  },
  /// Compare every file against this one
  SetTemplate { file: PathBuf },
  /// Go back to comparing against the union of all keys
  ClearTemplate,
  /// Leave a file out of checks until it is unignored
  Ignore { file: PathBuf },
  /// Stop ignoring a file
  Unignore { file: PathBuf },
  /// Stop ignoring every file
  ClearIgnored,
  /// Estimate the cost of checking this workspace
  Safety,
}

fn setup_tracing(verbose: u8) {
  use tracing_subscriber::fmt;
  use tracing_subscriber::prelude::*;

  let log_level = match verbose {
    1 => "debug",
    2 => "trace",
    _ => "warn",
  };

  tracing_subscriber::registry()
    .with(fmt::layer().with_writer(std::io::stderr))
    .with(tracing_subscriber::EnvFilter::new(
      std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
    ))
    .init();
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
  let cli = Cli::parse();

  setup_tracing(cli.verbose);

  let workspace = Workspace::open(cli.root)?;

  let code = match cli.command {
    Command::Check { format } => commands::check(&workspace, format)?,
    Command::Compare { files, format } => commands::compare(&workspace, &files, format)?,
    Command::Watch { interval_ms } => commands::watch(&workspace, interval_ms)?,
    Command::SetTemplate { file } => commands::set_template(&workspace, &file)?,
    Command::ClearTemplate => commands::clear_template(&workspace)?,
    Command::Ignore { file } => commands::ignore(&workspace, &file)?,
    Command::Unignore { file } => commands::unignore(&workspace, &file)?,
    Command::ClearIgnored => commands::clear_ignored(&workspace)?,
    Command::Safety => commands::safety(&workspace)?,
  };

  Ok(code)
}
