//! # Run Logging
//!
//! Every run writes a debug-level log file named `<YYYYmmddTHHMMSS>-<pid>.log`
//! into the log directory, and repoints the `latest` symlink there at it.
//! The console only shows warnings, or info with `--verbose`; `RUST_LOG`
//! overrides the console level.

use chrono::Local;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const LATEST_LINK: &str = "latest";

/// Keeps the file writer alive. Drop it only once the run is over.
pub struct RunLog {
    path: PathBuf,
    _guard: WorkerGuard,
}

impl RunLog {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// File name for a log started now by this process
pub fn log_file_name() -> String {
    format!("{}-{}.log", Local::now().format("%Y%m%dT%H%M%S"), process::id())
}

pub fn init_run_logging(directory: &Path, verbose: bool) -> io::Result<RunLog> {
    fs::create_dir_all(directory)?;

    let file_name = log_file_name();
    let path = directory.join(&file_name);
    update_latest_link(directory, &file_name)?;

    let file_appender = tracing_appender::rolling::never(directory, &file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let console_level = if verbose { "info" } else { "warn" };
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(console_level));

    let subscriber = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(io::stderr)
                .with_filter(console_filter),
        )
        .with(
            fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_target(true)
                .with_filter(EnvFilter::new("debug")),
        );

    if subscriber.try_init().is_err() {
        tracing::debug!("Global tracing subscriber already initialized, continuing with it");
    }

    tracing::info!(pid = process::id(), log_file = %path.display(), "Logging to {}", file_name);

    Ok(RunLog {
        path,
        _guard: guard,
    })
}

/// Replace `<directory>/latest` with a relative link to `file_name`
pub fn update_latest_link(directory: &Path, file_name: &str) -> io::Result<()> {
    let link = directory.join(LATEST_LINK);
    match fs::symlink_metadata(&link) {
        Ok(meta) if meta.file_type().is_symlink() => fs::remove_file(&link)?,
        Ok(_) => {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} exists and is not a symlink", link.display()),
            ))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    #[cfg(unix)]
    std::os::unix::fs::symlink(file_name, &link)?;
    #[cfg(not(unix))]
    let _ = file_name;

    Ok(())
}
