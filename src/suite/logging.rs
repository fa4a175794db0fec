//! Tracing setup for both binaries.
//!
//! `ssz-rings` only logs to stderr. A suite run additionally writes a plain
//! text log under `reports/<run_id>/logs/`, rotated by size. The suite
//! subscriber is installed as the thread default for the duration of a run, so
//! several runs in one process (the integration tests) each get their own file.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{Local, SecondsFormat};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, fmt};

/// Variable holding an `EnvFilter` directive.
pub const LOG_ENV: &str = "SSZ_LOG";

pub const MAX_LOG_BYTES: u64 = 2 * 1024 * 1024;
pub const LOG_BACKUPS: usize = 5;

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level))
}

/// Global stderr-only logging. A second call is a no-op.
pub fn init_stderr(level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

/// Install stderr + file logging for the current thread until the guard drops.
pub fn install_run_logging(log_path: &Path, level: &str) -> io::Result<tracing::subscriber::DefaultGuard> {
    let file = RotatingFile::open(log_path, MAX_LOG_BYTES, LOG_BACKUPS)?;
    let subscriber = tracing_subscriber::registry()
        .with(env_filter(level))
        .with(fmt::layer().compact().with_target(false).with_writer(io::stderr))
        .with(fmt::layer().with_ansi(false).event_format(LineFormat).with_writer(file));
    Ok(tracing::subscriber::set_default(subscriber))
}

/// `<rfc3339 timestamp> [LEVEL] message`
struct LineFormat;

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(&self, ctx: &FmtContext<'_, S, N>, mut writer: Writer<'_>, event: &Event<'_>) -> std::fmt::Result {
        let now = Local::now().to_rfc3339_opts(SecondsFormat::Secs, false);
        write!(writer, "{now} [{}] ", event.metadata().level())?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Size-rotating log file: `name`, `name.1`, ... `name.<backups>`.
pub struct RotatingFile {
    path: PathBuf,
    max_bytes: u64,
    backups: usize,
    state: Mutex<RotatingState>,
}

struct RotatingState {
    file: File,
    written: u64,
}

impl RotatingFile {
    pub fn open(path: &Path, max_bytes: u64, backups: usize) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let written = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            max_bytes,
            backups,
            state: Mutex::new(RotatingState { file, written }),
        })
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(format!(".{index}"));
        PathBuf::from(name)
    }

    fn rotate(&self, state: &mut RotatingState) -> io::Result<()> {
        state.file.flush()?;
        if self.backups == 0 {
            state.file = File::create(&self.path)?;
            state.written = 0;
            return Ok(());
        }
        let _ = std::fs::remove_file(self.backup_path(self.backups));
        for i in (1..self.backups).rev() {
            let from = self.backup_path(i);
            if from.exists() {
                std::fs::rename(&from, self.backup_path(i + 1))?;
            }
        }
        std::fs::rename(&self.path, self.backup_path(1))?;
        state.file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        state.written = 0;
        Ok(())
    }

    fn write_locked(&self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| io::Error::other("log file lock poisoned"))?;
        if state.written > 0 && state.written + buf.len() as u64 > self.max_bytes {
            self.rotate(&mut state)?;
        }
        state.file.write_all(buf)?;
        state.written += buf.len() as u64;
        Ok(buf.len())
    }
}

pub struct RotatingWriter<'a> {
    target: &'a RotatingFile,
}

impl Write for RotatingWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.target.write_locked(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.target.state.lock() {
            Ok(mut state) => state.file.flush(),
            Err(_) => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for RotatingFile {
    type Writer = RotatingWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        RotatingWriter { target: self }
    }
}
