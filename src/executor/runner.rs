//! Time-bounded subprocess management
//!
//! This module handles:
//! - Spawning installer / compiler / probe processes in their own process group
//! - Capturing stdout and stderr
//! - Enforcing a hard timeout (SIGTERM to the group, SIGKILL after a grace period)
//! - Forwarding Ctrl-C to the running group, which is outside the terminal's
//!   foreground group and would otherwise never see it
//! - Collecting exit codes

use crate::error::{Error, Result};
use lazy_static::lazy_static;
use std::ffi::OsString;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Time between SIGTERM and SIGKILL when a timed-out process ignores the first signal
const KILL_GRACE: Duration = Duration::from_secs(5);

/// How often the watchdog checks whether a terminated group has gone
const GROUP_POLL_INTERVAL: Duration = Duration::from_millis(50);

lazy_static! {
    /// Process groups of commands currently running
    static ref ACTIVE_GROUPS: Mutex<Vec<u32>> = Mutex::new(Vec::new());
}

/// Set once SIGINT or SIGTERM reached ladder
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Forward SIGINT and SIGTERM to running commands and stop new ones
///
/// Called once by the binary. Library users that never call it keep their
/// own signal disposition.
pub fn install_interrupt_handler() -> Result<()> {
    ctrlc::set_handler(|| {
        INTERRUPTED.store(true, Ordering::SeqCst);
        interrupt_active_groups();
    })
    .map_err(|e| Error::Execution(format!("Failed to install interrupt handler: {}", e)))
}

/// Whether an interrupt has been received
pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

fn interrupt_active_groups() {
    if let Ok(groups) = ACTIVE_GROUPS.lock() {
        for pid in groups.iter() {
            interrupt_group(*pid);
        }
    }
}

/// Registers a spawned group for interrupt forwarding until dropped
struct ActiveGroup(u32);

impl ActiveGroup {
    fn register(pid: u32) -> Self {
        if let Ok(mut groups) = ACTIVE_GROUPS.lock() {
            groups.push(pid);
        }
        // An interrupt that landed between spawn and registration
        if interrupted() {
            interrupt_group(pid);
        }
        Self(pid)
    }
}

impl Drop for ActiveGroup {
    fn drop(&mut self) {
        if let Ok(mut groups) = ACTIVE_GROUPS.lock() {
            groups.retain(|pid| *pid != self.0);
        }
    }
}

/// Result of running a command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code (128 + signal when killed)
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// Wall-clock time until the process was reaped
    pub duration: Duration,
    /// Whether the watchdog had to terminate the process
    pub timed_out: bool,
}

impl CommandOutput {
    /// Exited on its own with status 0
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == 0
    }

    /// Last `max_lines` non-empty lines of stderr followed by stdout.
    ///
    /// pip reports most failures on stderr but build backends write compiler
    /// errors to stdout, so both are needed to diagnose a failed rung.
    pub fn tail(&self, max_lines: usize) -> String {
        let lines: Vec<&str> = self
            .stderr
            .lines()
            .chain(self.stdout.lines())
            .map(str::trim_end)
            .filter(|l| !l.trim().is_empty())
            .collect();
        let start = lines.len().saturating_sub(max_lines);
        lines[start..].join("\n")
    }

    /// stdout and stderr concatenated, for pattern matching
    pub fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

/// A command to run under the watchdog
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    /// Extra environment variables on top of the inherited environment
    pub env: Vec<(String, String)>,
    /// Kill the process group if it runs longer than this
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Render as a shell-like line for logs
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().map(|a| a.to_string_lossy().into_owned()));
        parts.join(" ")
    }
}

/// Run a command to completion or until its timeout expires
///
/// Returns `Err` only when the process cannot be spawned or an interrupt was
/// already received. A non-zero exit or a timeout is reported through
/// [`CommandOutput`].
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use ladder_cli::executor::runner::{run_command, CommandSpec};
///
/// let spec = CommandSpec::new("python3")
///     .args(["-m", "pip", "--version"])
///     .with_timeout(Duration::from_secs(30));
/// let output = run_command(&spec)?;
/// println!("exit {}: {}", output.exit_code, output.stdout);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn run_command(spec: &CommandSpec) -> Result<CommandOutput> {
    if interrupted() {
        return Err(Error::Interrupted);
    }
    let start = Instant::now();

    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    for (key, value) in &spec.env {
        cmd.env(key, value);
    }

    // Own process group so a timeout also reaches compilers spawned by pip
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let mut child = cmd.spawn()?;
    let pid = child.id();
    let _active = ActiveGroup::register(pid);

    let stdout_reader = child.stdout.take().map(spawn_reader);
    let stderr_reader = child.stderr.take().map(spawn_reader);

    let (exit_status, timed_out) = match spec.timeout {
        Some(timeout) => wait_with_timeout(&mut child, timeout)?,
        None => (child.wait()?, false),
    };

    // Leftovers of an interrupted command would keep the pipes open
    if interrupted() {
        kill_group(pid);
    }

    let stdout = stdout_reader.map(join_reader).unwrap_or_default();
    let stderr = stderr_reader.map(join_reader).unwrap_or_default();

    Ok(CommandOutput {
        exit_code: exit_code_from_status(&exit_status),
        stdout,
        stderr,
        duration: start.elapsed(),
        timed_out,
    })
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn join_reader(handle: thread::JoinHandle<Vec<u8>>) -> String {
    handle
        .join()
        .map(|buf| String::from_utf8_lossy(&buf).into_owned())
        .unwrap_or_default()
}

/// Wait for process with timeout
///
/// If the timeout expires, sends SIGTERM to the process group, then SIGKILL
/// to whatever is left of the group after [`KILL_GRACE`]. Reaping the direct
/// child does not end the escalation: a grandchild that ignores SIGTERM would
/// otherwise hold the output pipes open. Uses channel-based cancellation so
/// the watchdog is cleanly stopped when the process exits first.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<(ExitStatus, bool)> {
    let pid = child.id();
    let fired = Arc::new(AtomicBool::new(false));
    let fired_flag = fired.clone();

    let (tx, rx) = mpsc::channel::<()>();

    let watchdog = thread::spawn(move || {
        // Wait for timeout OR cancellation signal
        if rx.recv_timeout(timeout).is_err() {
            fired_flag.store(true, Ordering::SeqCst);
            terminate_group(pid);

            let escalate_at = Instant::now() + KILL_GRACE;
            while group_alive(pid) {
                if Instant::now() >= escalate_at {
                    kill_group(pid);
                    break;
                }
                thread::sleep(GROUP_POLL_INTERVAL);
            }
        }
    });

    let status = child.wait()?;
    let _ = tx.send(()); // Cancel watchdog (ignore error if thread already exited)
    let _ = watchdog.join();

    Ok((status, fired.load(Ordering::SeqCst)))
}

#[cfg(unix)]
fn terminate_group(pid: u32) {
    // Negative pid addresses the whole process group created at spawn
    unsafe {
        libc::kill(-(pid as i32), libc::SIGTERM);
    }
}

#[cfg(unix)]
fn interrupt_group(pid: u32) {
    unsafe {
        libc::kill(-(pid as i32), libc::SIGINT);
    }
}

#[cfg(unix)]
fn kill_group(pid: u32) {
    unsafe {
        libc::kill(-(pid as i32), libc::SIGKILL);
    }
}

/// Whether any process, zombies included, is still in the group
#[cfg(unix)]
fn group_alive(pid: u32) -> bool {
    unsafe { libc::kill(-(pid as i32), 0) == 0 }
}

#[cfg(not(unix))]
fn terminate_group(pid: u32) {
    let _ = Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/T", "/F"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}

// Windows delivers console Ctrl-C to every attached process already
#[cfg(not(unix))]
fn interrupt_group(_pid: u32) {}

// taskkill walks the tree itself and is already forceful; nothing to poll afterwards
#[cfg(not(unix))]
fn group_alive(_pid: u32) -> bool {
    false
}

#[cfg(not(unix))]
fn kill_group(pid: u32) {
    let _ = Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/T", "/F"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}

/// Extract exit code from ExitStatus
///
/// On Unix, handles both normal exits and signals:
/// - Normal exit: return code
/// - Signal: 128 + signal number
fn exit_code_from_status(status: &ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(code) = status.code() {
            code
        } else if let Some(signal) = status.signal() {
            128 + signal
        } else {
            -1
        }
    }

    #[cfg(not(unix))]
    {
        status.code().unwrap_or(-1)
    }
}
