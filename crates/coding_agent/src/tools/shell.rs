//! Deadline- and size-bounded `/bin/sh -c` runner.
//!
//! Combined stdout/stderr flows through a single non-blocking pipe that the
//! parent multiplexes against the deadline with `poll(2)`. The child runs in
//! its own process group so a forced kill also reaches anything it spawned.

use std::fs::File;
use std::io::{self, Read};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use agent_provider::CancelSignal;
use serde::Serialize;

use super::ToolOutput;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const READ_CHUNK_BYTES: usize = 4096;
const ABNORMAL_EXIT_CODE: i32 = -1;

/// How a shell run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellTermination {
    /// The command exited on its own and was reaped.
    Exited,
    /// The deadline elapsed and the process group was killed.
    TimedOut,
    /// Output reached the byte cap and the process group was killed.
    OutputCapped,
    /// The interrupt flag was raised and the process group was killed.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellRun {
    /// Real exit status, or `-1` when the process did not exit normally.
    pub exit_code: i32,
    pub output: Vec<u8>,
    pub termination: ShellTermination,
}

impl ShellRun {
    #[must_use]
    pub fn truncated(&self) -> bool {
        self.termination != ShellTermination::Exited
    }
}

#[derive(Serialize)]
struct ShellReport<'a> {
    exit_code: i32,
    stdout: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<String>,
    error: Option<&'a str>,
}

pub(super) fn execute(
    command: &str,
    timeout_sec: u64,
    max_output_bytes: usize,
    cwd: &Path,
    cancel: Option<&CancelSignal>,
) -> ToolOutput {
    let run = match run_shell(
        command,
        Duration::from_secs(timeout_sec),
        max_output_bytes,
        cwd,
        cancel,
    ) {
        Ok(run) => run,
        Err(error) => {
            tracing::warn!(%error, "failed to launch shell command");
            return ToolOutput::fail(spawn_failure_json(&format!(
                "failed to launch shell: {error}"
            )));
        }
    };

    let stdout = String::from_utf8_lossy(&run.output);
    let note = match run.termination {
        ShellTermination::Exited => None,
        ShellTermination::OutputCapped => Some("Output was truncated".to_string()),
        ShellTermination::TimedOut => Some(format!(
            "Output was truncated: command timed out after {timeout_sec}s"
        )),
        ShellTermination::Cancelled => {
            Some("Output was truncated: command was interrupted".to_string())
        }
    };

    let report = ShellReport {
        exit_code: run.exit_code,
        stdout: &stdout,
        note,
        error: None,
    };
    let content = serde_json::to_string(&report).unwrap_or_default();

    if run.termination == ShellTermination::Exited && run.exit_code == 0 {
        ToolOutput::ok(content)
    } else {
        ToolOutput::fail(content)
    }
}

pub(super) fn spawn_failure_json(error: &str) -> String {
    let report = ShellReport {
        exit_code: ABNORMAL_EXIT_CODE,
        stdout: "",
        note: None,
        error: Some(error),
    };
    serde_json::to_string(&report).unwrap_or_default()
}

/// Runs `command` through `/bin/sh -c`, capturing combined output.
///
/// Returns once the command exits, the deadline elapses, the output reaches
/// `max_output_bytes`, or `cancel` is raised. Only launch
/// failures are reported as `Err`.
pub fn run_shell(
    command: &str,
    timeout: Duration,
    max_output_bytes: usize,
    cwd: &Path,
    cancel: Option<&CancelSignal>,
) -> io::Result<ShellRun> {
    let (mut reader, writer) = output_pipe()?;
    let stderr_writer = writer.try_clone()?;

    let mut builder = Command::new("/bin/sh");
    builder
        .arg("-c")
        .arg(command)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::from(writer))
        .stderr(Stdio::from(stderr_writer))
        .process_group(0);
    let mut child = builder.spawn()?;
    // Release the parent's copies of the write end so EOF can be observed.
    drop(builder);

    tracing::debug!(pid = child.id(), timeout_ms = timeout.as_millis() as u64, "spawned shell command");

    let deadline = Instant::now() + timeout;
    let mut output = Vec::new();
    let mut chunk = [0_u8; READ_CHUNK_BYTES];
    let mut termination = ShellTermination::Exited;

    'pump: loop {
        if cancel.is_some_and(|flag| flag.load(Ordering::Acquire)) {
            termination = ShellTermination::Cancelled;
            break;
        }

        let now = Instant::now();
        if now >= deadline {
            termination = ShellTermination::TimedOut;
            break;
        }

        let wait = (deadline - now).min(POLL_INTERVAL);
        match poll_readable(reader.as_raw_fd(), wait) {
            Ok(false) => continue,
            Ok(true) => {}
            Err(error) => {
                tracing::debug!(%error, "poll on shell output failed");
                break;
            }
        }

        loop {
            match reader.read(&mut chunk) {
                Ok(0) => break 'pump,
                Ok(read) => {
                    let room = max_output_bytes.saturating_sub(output.len());
                    if read > room {
                        output.extend_from_slice(&chunk[..room]);
                        termination = ShellTermination::OutputCapped;
                        break 'pump;
                    }
                    output.extend_from_slice(&chunk[..read]);
                }
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => break,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) => {
                    tracing::debug!(%error, "reading shell output failed");
                    break 'pump;
                }
            }
        }
    }
    drop(reader);

    // Closing its output does not mean the command is done.
    let mut exit_code = None;
    if termination == ShellTermination::Exited {
        match await_exit(&mut child, deadline, cancel) {
            Ok(code) => exit_code = Some(code),
            Err(reason) => termination = reason,
        }
    }

    if termination != ShellTermination::Exited {
        tracing::debug!(pid = child.id(), reason = ?termination, "killing shell command");
        kill_process_group(&child);
    }

    Ok(ShellRun {
        exit_code: exit_code.unwrap_or_else(|| reap(&mut child)),
        output,
        termination,
    })
}

/// Polls for the child's exit under the same deadline and cancel flag as the
/// output pump. `Err` carries the reason the child must be killed.
fn await_exit(
    child: &mut Child,
    deadline: Instant,
    cancel: Option<&CancelSignal>,
) -> Result<i32, ShellTermination> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status.code().unwrap_or(ABNORMAL_EXIT_CODE)),
            Ok(None) => {}
            Err(error) => {
                tracing::debug!(%error, "polling shell command status failed");
                return Ok(ABNORMAL_EXIT_CODE);
            }
        }

        if cancel.is_some_and(|flag| flag.load(Ordering::Acquire)) {
            return Err(ShellTermination::Cancelled);
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(ShellTermination::TimedOut);
        }
        std::thread::sleep((deadline - now).min(POLL_INTERVAL));
    }
}

fn reap(child: &mut Child) -> i32 {
    match child.wait() {
        Ok(status) => status.code().unwrap_or(ABNORMAL_EXIT_CODE),
        Err(error) => {
            tracing::debug!(%error, "waiting for shell command failed");
            ABNORMAL_EXIT_CODE
        }
    }
}

fn kill_process_group(child: &Child) {
    let Ok(pid) = libc::pid_t::try_from(child.id()) else {
        return;
    };
    let result = unsafe { libc::kill(-pid, libc::SIGKILL) };
    if result != 0 {
        tracing::debug!(error = %io::Error::last_os_error(), "killing shell process group failed");
    }
}

/// Creates a close-on-exec pipe whose read end is non-blocking.
fn output_pipe() -> io::Result<(File, OwnedFd)> {
    let mut fds: [libc::c_int; 2] = [-1, -1];
    let result = unsafe { libc::pipe(fds.as_mut_ptr()) };
    if result != 0 {
        return Err(io::Error::last_os_error());
    }

    let (read_end, write_end) =
        unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };
    set_fd_flag(read_end.as_raw_fd(), libc::F_GETFD, libc::F_SETFD, libc::FD_CLOEXEC)?;
    set_fd_flag(write_end.as_raw_fd(), libc::F_GETFD, libc::F_SETFD, libc::FD_CLOEXEC)?;
    set_fd_flag(read_end.as_raw_fd(), libc::F_GETFL, libc::F_SETFL, libc::O_NONBLOCK)?;

    Ok((File::from(read_end), write_end))
}

fn set_fd_flag(fd: RawFd, get: libc::c_int, set: libc::c_int, flag: libc::c_int) -> io::Result<()> {
    let current = unsafe { libc::fcntl(fd, get) };
    if current < 0 {
        return Err(io::Error::last_os_error());
    }
    let result = unsafe { libc::fcntl(fd, set, current | flag) };
    if result < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Waits up to `timeout` for `fd` to become readable or hung up.
fn poll_readable(fd: RawFd, timeout: Duration) -> io::Result<bool> {
    let mut fds = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let timeout_ms = libc::c_int::try_from(timeout.as_millis()).unwrap_or(libc::c_int::MAX);
    let result = unsafe { libc::poll(&mut fds, 1, timeout_ms) };
    if result < 0 {
        let error = io::Error::last_os_error();
        if error.kind() == io::ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(error);
    }
    Ok(result > 0 && (fds.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR)) != 0)
}
