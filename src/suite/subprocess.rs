//! Child processes with a timeout and captured, UTF-8-decoded output.
//!
//! On Unix the child leads its own process group, so a timeout or Ctrl-C
//! kills the shell wrapper together with everything it started.

use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

/// Locale and encoding variables every child inherits.
pub const UTF8_ENV: [(&str, &str); 4] = [
    ("LC_ALL", "C.UTF-8"),
    ("LANG", "C.UTF-8"),
    ("PYTHONUTF8", "1"),
    ("PYTHONIOENCODING", "utf-8"),
];

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long the pipe readers may keep going once the child is gone.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub timeout: Duration,
}

impl CommandSpec {
    /// Split `argv` into program and arguments; `None` when empty.
    pub fn from_argv(argv: &[String], cwd: &Path, timeout: Duration) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            cwd: cwd.to_path_buf(),
            timeout,
        })
    }

    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// `None` when the child was killed.
    pub status: Option<i32>,
    pub timed_out: bool,
    pub interrupted: bool,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0) && !self.timed_out && !self.interrupted
    }

    /// Short reason for a failed run.
    pub fn failure_reason(&self) -> Option<String> {
        if self.timed_out {
            Some("TIMEOUT".to_string())
        } else if self.interrupted {
            Some("interrupted".to_string())
        } else {
            match self.status {
                Some(0) => None,
                Some(code) => Some(format!("exit code {code}")),
                None => Some("terminated by signal".to_string()),
            }
        }
    }
}

/// Run `spec`, killing the child on timeout or when `interrupt` is raised.
///
/// Both pipes are drained on their own threads so a chatty child cannot
/// block on a full pipe while we poll. Output that arrives after the child
/// is gone is collected for at most `DRAIN_GRACE`.
pub fn run_command(spec: &CommandSpec, interrupt: Option<&AtomicBool>) -> std::io::Result<CommandOutput> {
    let started = Instant::now();
    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .current_dir(&spec.cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (key, value) in UTF8_ENV {
        command.env(key, value);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    tracing::info!(command = %spec.display(), timeout_s = spec.timeout.as_secs(), "spawning");
    let mut child = command.spawn()?;
    let stdout = Drain::spawn("stdout", child.stdout.take());
    let stderr = Drain::spawn("stderr", child.stderr.take());

    let (status, timed_out, interrupted) = wait(&mut child, spec.timeout, interrupt)?;

    let deadline = Instant::now() + DRAIN_GRACE;
    let stdout = stdout.finish(deadline);
    let stderr = stderr.finish(deadline);
    for line in stdout.lines() {
        tracing::info!(target: "subprocess", "{line}");
    }
    for line in stderr.lines() {
        tracing::warn!(target: "subprocess", "{line}");
    }

    Ok(CommandOutput {
        status,
        timed_out,
        interrupted,
        stdout,
        stderr,
        elapsed: started.elapsed(),
    })
}

/// A pipe read to EOF on its own thread into a shared buffer.
struct Drain {
    name: &'static str,
    buf: Arc<Mutex<Vec<u8>>>,
    handle: thread::JoinHandle<std::io::Result<()>>,
}

impl Drain {
    fn spawn<R: Read + Send + 'static>(name: &'static str, pipe: Option<R>) -> Self {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buf);
        let handle = thread::spawn(move || {
            let Some(mut pipe) = pipe else {
                return Ok(());
            };
            let mut chunk = [0u8; 8192];
            loop {
                match pipe.read(&mut chunk) {
                    Ok(0) => return Ok(()),
                    Ok(n) => sink
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .extend_from_slice(&chunk[..n]),
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                }
            }
        });
        Self { name, buf, handle }
    }

    /// Whatever was read by `deadline`; a reader still blocked then is abandoned.
    fn finish(self, deadline: Instant) -> String {
        while !self.handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        if self.handle.is_finished() {
            match self.handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(pipe = self.name, error = %e, "reading child output failed"),
                Err(_) => tracing::warn!(pipe = self.name, "pipe reader panicked"),
            }
        } else {
            tracing::warn!(pipe = self.name, "pipe still held open by a detached process; output truncated");
        }
        let bytes = self.buf.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

fn wait(child: &mut Child, timeout: Duration, interrupt: Option<&AtomicBool>) -> std::io::Result<(Option<i32>, bool, bool)> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok((status.code(), false, false));
        }
        let interrupted = interrupt.is_some_and(|flag| flag.load(Ordering::SeqCst));
        if interrupted || Instant::now() >= deadline {
            tracing::warn!(interrupted, pid = child.id(), "killing child process tree");
            kill_tree(child);
            child.wait()?;
            return Ok((None, !interrupted, interrupted));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// SIGKILL the child's process group; falls back to the child alone.
#[cfg(unix)]
fn kill_tree(child: &mut Child) {
    let Ok(pgid) = libc::pid_t::try_from(child.id()) else {
        kill_child(child);
        return;
    };
    // The child was spawned with `process_group(0)`, so its pid is the group id.
    if unsafe { libc::kill(-pgid, libc::SIGKILL) } != 0 {
        let err = std::io::Error::last_os_error();
        tracing::warn!(pgid, error = %err, "killing process group failed");
        kill_child(child);
    }
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) {
    kill_child(child);
}

fn kill_child(child: &mut Child) {
    if let Err(e) = child.kill() {
        tracing::warn!(error = %e, "killing child failed");
    }
}

/// Write the full transcript of a run to `path`.
pub fn write_transcript(path: &Path, spec: &CommandSpec, output: &CommandOutput) -> std::io::Result<()> {
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    writeln!(file, "$ {}", spec.display())?;
    writeln!(file, "--- stdout ---")?;
    file.write_all(output.stdout.as_bytes())?;
    writeln!(file, "\n--- stderr ---")?;
    file.write_all(output.stderr.as_bytes())?;
    writeln!(
        file,
        "\n--- {} after {:.3}s ---",
        output.failure_reason().unwrap_or_else(|| "ok".to_string()),
        output.elapsed.as_secs_f64()
    )?;
    file.flush()
}

/// Transcript for a command that could not be started at all.
pub fn write_spawn_failure(path: &Path, spec: &CommandSpec, error: &std::io::Error) -> std::io::Result<()> {
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    writeln!(file, "$ {}", spec.display())?;
    writeln!(file, "--- failed to start: {error} ---")?;
    file.flush()
}
