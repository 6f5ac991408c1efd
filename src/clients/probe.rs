//! Best-effort process-presence probing.
//!
//! Probes must never hang the command: every subprocess runs under a
//! deadline and is killed when it expires. A probe failure is reported as
//! `Unknown`, which callers treat as "not running".

use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::models::RunningState;

/// Platform-specific process names for one client.
#[derive(Debug, Clone, Copy)]
pub struct ProcessProbe {
    /// Name matched by `pgrep` on macOS/Linux.
    pub unix_name: &'static str,
    /// Exact match (`pgrep -x`) vs. full-command-line match (`pgrep -f`).
    pub exact: bool,
    /// Image name matched by `tasklist` on Windows.
    pub windows_image: &'static str,
}

impl ProcessProbe {
    pub fn run(&self, timeout: Duration) -> RunningState {
        #[cfg(unix)]
        {
            let flag = if self.exact { "-x" } else { "-f" };
            let mut cmd = Command::new("pgrep");
            cmd.arg(flag).arg(self.unix_name);
            match run_with_timeout(&mut cmd, timeout) {
                Ok(Some((status, _))) if status.success() => RunningState::Running,
                // pgrep exits 1 when no process matched.
                Ok(Some((status, _))) if status.code() == Some(1) => RunningState::NotRunning,
                Ok(Some(_)) | Ok(None) => RunningState::Unknown,
                Err(err) => {
                    debug!(error = %err, process = self.unix_name, "process probe failed");
                    RunningState::Unknown
                }
            }
        }
        #[cfg(windows)]
        {
            let mut cmd = Command::new("tasklist");
            cmd.arg("/FI")
                .arg(format!("IMAGENAME eq {}", self.windows_image));
            match run_with_timeout(&mut cmd, timeout) {
                Ok(Some((status, output))) if status.success() => {
                    let text = String::from_utf8_lossy(&output);
                    if text.contains(self.windows_image) {
                        RunningState::Running
                    } else {
                        RunningState::NotRunning
                    }
                }
                Ok(Some(_)) | Ok(None) => RunningState::Unknown,
                Err(err) => {
                    debug!(error = %err, image = self.windows_image, "process probe failed");
                    RunningState::Unknown
                }
            }
        }
        #[cfg(not(any(unix, windows)))]
        {
            RunningState::Unknown
        }
    }
}

/// Run a command with captured output under a deadline. `Ok(None)` means the
/// deadline expired and the child was killed. Stdout is drained on a
/// separate thread so a chatty child cannot fill the pipe and stall until
/// the deadline.
pub fn run_with_timeout(
    cmd: &mut Command,
    timeout: Duration,
) -> std::io::Result<Option<(ExitStatus, Vec<u8>)>> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()?;

    let reader = child.stdout.take().map(|mut stdout| {
        std::thread::spawn(move || {
            use std::io::Read;
            let mut output = Vec::new();
            let _ = stdout.read_to_end(&mut output);
            output
        })
    });

    match wait_with_timeout(&mut child, timeout)? {
        Some(status) => {
            let output = reader
                .map(|handle| handle.join().unwrap_or_default())
                .unwrap_or_default();
            Ok(Some((status, output)))
        }
        None => {
            let _ = child.kill();
            let _ = child.wait();
            // Killing the child closes the pipe, so the reader finishes.
            if let Some(handle) = reader {
                let _ = handle.join();
            }
            Ok(None)
        }
    }
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}
