//! Child process helpers: bounded capture for chat commands, and interruptible
//! foreground runs for the generated entrypoint.

use std::io::{Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// Exit code used when the operator interrupts genloop itself.
const SIGINT_EXIT: i32 = 130;

/// Captured output of a bounded child process.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub timed_out: bool,
}

/// Run `cmd` feeding `stdin`, capturing stdout (up to `output_limit_bytes`) and
/// stderr, killing it after `timeout`.
///
/// Both pipes are drained on reader threads so a chatty child cannot block on a
/// full pipe while we wait on it.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), output_limit_bytes))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    stdin: &[u8],
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = cmd.spawn().context("spawn command")?;

    let mut child_stdin = child
        .stdin
        .take()
        .ok_or_else(|| anyhow!("stdin was not piped"))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_handle = thread::spawn(move || read_limited(stdout, output_limit_bytes));
    let stderr_handle = thread::spawn(move || read_limited(stderr, output_limit_bytes));

    let input = stdin.to_vec();
    let stdin_handle = thread::spawn(move || {
        // A child that exits without reading stdin closes the pipe; that is its answer.
        if let Err(err) = child_stdin.write_all(&input) {
            debug!(err = %err, "child closed stdin early");
        }
    });

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(timeout_secs = timeout.as_secs(), "command timed out, killing");
            timed_out = true;
            child.kill().context("kill command")?;
            child.wait().context("wait command after kill")?
        }
    };

    if stdin_handle.join().is_err() {
        return Err(anyhow!("stdin writer thread panicked"));
    }
    let (stdout, stdout_truncated) = join_reader(stdout_handle).context("join stdout")?;
    let (stderr, _) = join_reader(stderr_handle).context("join stderr")?;
    if stdout_truncated > 0 {
        warn!(stdout_truncated, "command output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        timed_out,
    })
}

/// How a foreground run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    Exited(ExitStatus),
    Interrupted,
}

/// Run `cmd` in the foreground (inherited stdio) until it exits or the operator
/// presses Ctrl-C, in which case the child is killed and reaped.
pub fn run_interruptible(mut cmd: Command) -> Result<RunExit> {
    let state = interrupt_state()?;
    state.interrupted.store(false, Ordering::SeqCst);
    let child = cmd.spawn().context("spawn command")?;
    state.child_running.store(true, Ordering::SeqCst);
    let result = wait_interruptible(child, &state.interrupted, Duration::from_millis(100));
    state.child_running.store(false, Ordering::SeqCst);
    result
}

/// Poll `child` until it exits or `interrupted` becomes true.
pub fn wait_interruptible(
    mut child: Child,
    interrupted: &AtomicBool,
    poll: Duration,
) -> Result<RunExit> {
    loop {
        if interrupted.load(Ordering::SeqCst) {
            warn!("interrupt received, killing child");
            child.kill().context("kill command")?;
            child.wait().context("wait command after kill")?;
            return Ok(RunExit::Interrupted);
        }
        if let Some(status) = child.wait_timeout(poll).context("wait for command")? {
            return Ok(RunExit::Exited(status));
        }
    }
}

struct InterruptState {
    child_running: AtomicBool,
    interrupted: AtomicBool,
}

/// Install the process-wide Ctrl-C handler once.
///
/// While a foreground child runs, Ctrl-C only flags the interrupt; otherwise it
/// exits genloop as the default handler would.
fn interrupt_state() -> Result<Arc<InterruptState>> {
    static STATE: Mutex<Option<Arc<InterruptState>>> = Mutex::new(None);
    let mut installed = STATE
        .lock()
        .map_err(|_| anyhow!("interrupt state lock poisoned"))?;
    if let Some(state) = installed.as_ref() {
        return Ok(state.clone());
    }
    let state = Arc::new(InterruptState {
        child_running: AtomicBool::new(false),
        interrupted: AtomicBool::new(false),
    });
    let handler_state = state.clone();
    ctrlc::set_handler(move || {
        if handler_state.child_running.load(Ordering::SeqCst) {
            handler_state.interrupted.store(true, Ordering::SeqCst);
        } else {
            std::process::exit(SIGINT_EXIT);
        }
    })
    .context("install Ctrl-C handler")?;
    *installed = Some(state.clone());
    Ok(state)
}

fn join_reader(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

/// Read to EOF keeping at most `limit` bytes; returns kept bytes and the count dropped.
fn read_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut dropped = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let keep = n.min(limit.saturating_sub(buf.len()));
        buf.extend_from_slice(&chunk[..keep]);
        dropped += n - keep;
    }

    Ok((buf, dropped))
}
