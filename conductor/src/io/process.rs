//! Helpers for running child processes with timeouts and bounded output.

use std::io::{self, Read, Write};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// Captured bytes kept per stream when the caller has no limit of its own.
pub const DEFAULT_OUTPUT_LIMIT_BYTES: usize = 1_000_000;

/// How long pipes may stay open after a timed-out child was killed.
const DRAIN_GRACE: Duration = Duration::from_secs(2);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Captured child process output.
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
    pub elapsed: Duration,
}

impl ProcessOutput {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    pub fn stdout_truncated_notice(&self) -> String {
        truncated_notice("stdout", self.stdout_truncated)
    }

    pub fn stderr_truncated_notice(&self) -> String {
        truncated_notice("stderr", self.stderr_truncated)
    }

    /// Exit code, or `-N` when the process was killed by signal `N`.
    pub fn exit_code(&self) -> i32 {
        exit_code(&self.status)
    }
}

fn truncated_notice(stream: &str, bytes: usize) -> String {
    if bytes > 0 {
        format!("\n[{stream} truncated {bytes} bytes]\n")
    } else {
        String::new()
    }
}

#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
    truncated: usize,
}

/// Run a command, capturing stdout/stderr without risking pipe deadlocks.
///
/// Stdin is written and output drained on helper threads while the child
/// runs, so neither can stall the timeout. `output_limit_bytes` bounds what
/// is kept per stream; the rest is drained and counted.
///
/// On unix the child leads its own process group. When the timeout elapses
/// the whole group is killed and `timed_out` is set; whatever output arrived
/// up to that point is still returned. Only spawn and wait failures are
/// errors.
#[instrument(
    skip_all,
    fields(timeout_ms = timeout.map(|t| t.as_millis() as u64), output_limit_bytes)
)]
pub fn run_process(
    mut cmd: Command,
    stdin: Option<&[u8]>,
    timeout: Option<Duration>,
    output_limit_bytes: usize,
) -> io::Result<ProcessOutput> {
    if stdin.is_some() {
        cmd.stdin(Stdio::piped());
    } else {
        cmd.stdin(Stdio::null());
    }
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    debug!("spawning child process");
    let start = Instant::now();
    let mut child = cmd.spawn()?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::other("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| io::Error::other("stderr was not piped"))?;
    let stdout_handle = thread::spawn(move || read_stream_limited(stdout, output_limit_bytes));
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, output_limit_bytes));

    let stdin_handle = match stdin {
        Some(input) => {
            let child_stdin = child
                .stdin
                .take()
                .ok_or_else(|| io::Error::other("stdin was not piped"))?;
            let input = input.to_vec();
            Some(thread::spawn(move || write_input(child_stdin, &input)))
        }
        None => None,
    };

    let mut timed_out = false;
    let status = match timeout {
        None => child.wait()?,
        Some(limit) => match child.wait_timeout(limit)? {
            Some(status) => status,
            None => {
                warn!(timeout_ms = limit.as_millis() as u64, "command timed out, killing");
                timed_out = true;
                kill_tree(&mut child)?;
                child.wait()?
            }
        },
    };
    let elapsed = start.elapsed();

    // Descendants outside the group may still hold the pipes open.
    let deadline = timed_out.then(|| Instant::now() + DRAIN_GRACE);
    if let Some(handle) = stdin_handle {
        match join_within(handle, deadline) {
            Ok(_) => {}
            Err(err) if timed_out => debug!(err = %err, "stdin writer failed after timeout"),
            Err(err) => return Err(err),
        }
    }
    let stdout = join_within(stdout_handle, deadline)?.unwrap_or_else(|| {
        warn!("stdout still open after kill, abandoning reader");
        Captured::default()
    });
    let stderr = join_within(stderr_handle, deadline)?.unwrap_or_else(|| {
        warn!("stderr still open after kill, abandoning reader");
        Captured::default()
    });

    if stdout.truncated > 0 || stderr.truncated > 0 {
        warn!(
            stdout_truncated = stdout.truncated,
            stderr_truncated = stderr.truncated,
            "output truncated"
        );
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(ProcessOutput {
        status,
        stdout: stdout.bytes,
        stderr: stderr.bytes,
        stdout_truncated: stdout.truncated,
        stderr_truncated: stderr.truncated,
        timed_out,
        elapsed,
    })
}

/// Join a helper thread, giving up at `deadline`. `None` means abandoned.
fn join_within<T>(
    handle: JoinHandle<io::Result<T>>,
    deadline: Option<Instant>,
) -> io::Result<Option<T>> {
    if let Some(deadline) = deadline {
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                return Ok(None);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
    match handle.join() {
        Ok(result) => result.map(Some),
        Err(_) => Err(io::Error::other("process helper thread panicked")),
    }
}

/// The handle drops on return, closing the child's stdin.
fn write_input(mut stdin: ChildStdin, input: &[u8]) -> io::Result<()> {
    match stdin.write_all(input) {
        // A child that exits without reading its input closes the pipe early.
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> io::Result<Captured> {
    let mut captured = Captured::default();
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(captured.bytes.len());
        let keep = n.min(remaining);
        captured.bytes.extend_from_slice(&chunk[..keep]);
        captured.truncated += n - keep;
    }

    Ok(captured)
}

#[cfg(unix)]
fn kill_tree(child: &mut Child) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Ok(pgid) = i32::try_from(child.id()) else {
        return child.kill();
    };
    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(errno) => {
            warn!(err = %errno, "killing process group failed, killing child only");
            child.kill()
        }
    }
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) -> io::Result<()> {
    child.kill()
}

#[cfg(unix)]
fn exit_code(status: &ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    status
        .code()
        .or_else(|| status.signal().map(|signal| -signal))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: &ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}
