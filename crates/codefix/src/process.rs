use std::{
    collections::BTreeMap,
    io,
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
    time::Duration,
};

use tokio::{
    process::{Child, Command},
    time,
};
use tracing::{debug, warn};

use crate::{
    defaults::{CAPTURE_PREFIX, CAPTURE_SUFFIX},
    CommandSpec, DiagnoseError,
};

/// Where the diagnosed command's stdout goes. Stderr is always captured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StdoutMode {
    #[default]
    Inherit,
    Discard,
}

#[derive(Debug, Clone, Default)]
pub struct CaptureOptions {
    pub working_dir: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
    pub stdout: StdoutMode,
    pub timeout: Option<Duration>,
}

/// Result of one run: the exit status (absent if the command was killed on timeout) and
/// everything it wrote to stderr.
#[derive(Debug, Clone)]
pub struct CapturedRun {
    pub status: Option<ExitStatus>,
    pub stderr: String,
    pub timed_out: bool,
    /// Location the stderr was captured to. The file no longer exists once the run returns.
    pub capture_path: PathBuf,
}

impl CapturedRun {
    pub fn exit_code(&self) -> Option<i32> {
        self.status.and_then(|s| s.code())
    }

    pub fn success(&self) -> bool {
        self.status.map(|s| s.success()).unwrap_or(false)
    }
}

pub(crate) fn spawn_with_retry(
    command: &mut Command,
    program: &Path,
) -> Result<Child, DiagnoseError> {
    let mut backoff = Duration::from_millis(2);
    for attempt in 0..5 {
        match command.spawn() {
            Ok(child) => return Ok(child),
            Err(source) => {
                let is_busy = matches!(source.kind(), std::io::ErrorKind::ExecutableFileBusy)
                    || source.raw_os_error() == Some(26);
                if is_busy && attempt < 4 {
                    std::thread::sleep(backoff);
                    backoff = std::cmp::min(backoff * 2, Duration::from_millis(50));
                    continue;
                }
                return Err(DiagnoseError::Spawn {
                    program: program.to_path_buf(),
                    source,
                });
            }
        }
    }

    unreachable!("spawn_with_retry should return before exhausting retries")
}

#[cfg(unix)]
fn kill_process_group(child: &Child) -> io::Result<()> {
    use nix::{
        errno::Errno,
        sys::signal::{killpg, Signal},
        unistd::Pid,
    };

    let Some(pid) = child.id() else {
        return Ok(());
    };
    match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(errno.into()),
    }
}

#[cfg(not(unix))]
fn kill_process_group(_child: &Child) -> io::Result<()> {
    Ok(())
}

pub(crate) fn apply_env(command: &mut Command, env: &BTreeMap<String, String>) {
    for (k, v) in env {
        command.env(k, v);
    }
}

/// Runs `spec` with stderr redirected into a fresh temporary file, then reads it back.
///
/// A non-zero exit is not an error here; only failing to launch, wait, or read the
/// capture is.
pub async fn capture_stderr(
    spec: &CommandSpec,
    options: &CaptureOptions,
) -> Result<CapturedRun, DiagnoseError> {
    spec.validate()?;

    let capture = tempfile::Builder::new()
        .prefix(CAPTURE_PREFIX)
        .suffix(CAPTURE_SUFFIX)
        .tempfile()
        .map_err(|source| DiagnoseError::CaptureFile { source })?;
    let capture_path = capture.path().to_path_buf();
    let stderr_sink = capture
        .as_file()
        .try_clone()
        .map_err(|source| DiagnoseError::CaptureFile { source })?;

    let program = spec.program();
    let mut command = spec.to_command();
    command.stdin(Stdio::null());
    command.stdout(match options.stdout {
        StdoutMode::Inherit => Stdio::inherit(),
        StdoutMode::Discard => Stdio::null(),
    });
    command.stderr(Stdio::from(stderr_sink));
    command.kill_on_drop(true);
    // A timed-out command is killed together with everything it started. Without a
    // timeout the command stays in our group so terminal signals still reach it.
    #[cfg(unix)]
    {
        if options.timeout.is_some() {
            command.process_group(0);
        }
    }

    if let Some(dir) = options.working_dir.as_ref() {
        command.current_dir(dir);
    }
    apply_env(&mut command, &options.env);

    debug!(command = %spec, capture = %capture_path.display(), "spawning command");
    let mut child = spawn_with_retry(&mut command, &program)?;
    drop(command);

    let wait_err = |source| DiagnoseError::Wait {
        program: program.clone(),
        source,
    };

    let (status, timed_out) = match options.timeout {
        Some(dur) => {
            let waited = time::timeout(dur, child.wait()).await;
            match waited {
                Ok(status) => (Some(status.map_err(wait_err)?), false),
                Err(_) => {
                    warn!(command = %spec, timeout = ?dur, "command timed out; killing it");
                    if let Err(err) = kill_process_group(&child) {
                        warn!(error = %err, "failed to kill command's process group");
                    }
                    child.kill().await.map_err(wait_err)?;
                    (None, true)
                }
            }
        }
        None => (Some(child.wait().await.map_err(wait_err)?), false),
    };
    debug!(?status, timed_out, "command finished");

    let bytes = tokio::fs::read(&capture_path)
        .await
        .map_err(|source| DiagnoseError::CaptureRead {
            path: capture_path.clone(),
            source,
        })?;
    let stderr = String::from_utf8_lossy(&bytes).into_owned();

    if let Err(err) = capture.close() {
        warn!(capture = %capture_path.display(), error = %err, "failed to remove capture file");
    }

    Ok(CapturedRun {
        status,
        stderr,
        timed_out,
        capture_path,
    })
}
