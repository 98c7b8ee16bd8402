//! Frontend dev-server lifecycle.
//!
//! A dev server is a shell command started in the project's frontend
//! directory. Both of its output streams are forwarded line by line to
//! `tracing`, tagged with the project name: standard output at `info`,
//! standard error at `warn`.
//!
//! On Unix a detached server gets its own process group so that stopping it
//! also reaches whatever the package manager spawned underneath.

use std::{
    io::{self, BufRead, BufReader, ErrorKind, Read},
    process::{Child, Command, ExitStatus, Stdio},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use crate::{
    config::DevServerSettings,
    error::{Error, Result},
    layout,
    project::Project,
};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How a dev server relates to the terminal that started it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Launch {
    /// Own process group; outlives a Ctrl-C sent to the launcher.
    Detached,

    /// Shares the launcher's process group, so a terminal Ctrl-C reaches it too.
    Attached,
}

/// A running frontend dev server.
pub struct DevServer {
    project: String,
    pid: u32,
    started_at: DateTime<Local>,
    child: Child,
    forwarders: Vec<JoinHandle<()>>,
}

impl DevServer {
    #[must_use]
    pub fn project(&self) -> &str {
        &self.project
    }

    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    #[must_use]
    pub const fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    /// Whether the server has not exited yet.
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Block until the server exits on its own.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if waiting on the child fails.
    pub fn wait(mut self) -> Result<ExitStatus> {
        let status = self.child.wait()?;
        self.join_forwarders();
        info!(project = %self.project, "Dev server exited with {status}");
        Ok(status)
    }

    /// Ask the server to terminate, force-killing it after `grace`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProcessSignal`] if a signal cannot be delivered, or
    /// an I/O error if reaping the child fails.
    pub fn stop(mut self, grace: Duration) -> Result<()> {
        if !self.is_running() {
            debug!(project = %self.project, "Dev server {} already exited", self.pid);
            self.join_forwarders();
            return Ok(());
        }

        info!(project = %self.project, "Stopping dev server {}", self.pid);
        terminate(self.pid)?;

        let deadline = Instant::now() + grace;
        while Instant::now() < deadline {
            if self.child.try_wait()?.is_some() {
                self.join_forwarders();
                return Ok(());
            }
            thread::sleep(POLL_INTERVAL);
        }

        warn!(
            project = %self.project,
            "Dev server {} did not exit after {grace:?}, killing it", self.pid
        );
        force_kill(self.pid)?;
        self.child.wait()?;
        self.join_forwarders();

        Ok(())
    }

    fn join_forwarders(&mut self) {
        for handle in self.forwarders.drain(..) {
            if handle.join().is_err() {
                warn!(project = %self.project, "Output forwarder panicked");
            }
        }
    }
}

/// Start the dev server of `project` in its frontend directory.
///
/// # Errors
///
/// Returns [`Error::NoFrontendDir`] if no frontend manifest can be found,
/// or an I/O error if the command cannot be spawned.
pub fn start(project: &Project, settings: &DevServerSettings, launch: Launch) -> Result<DevServer> {
    let Some(dir) = layout::frontend_dir(project.directory(), project.name()) else {
        return Err(Error::NoFrontendDir(project.name().to_string()));
    };

    info!(
        project = %project.name(),
        "Starting `{}` in {}", settings.command, dir.display()
    );

    let mut command = shell(&settings.command);
    command
        .current_dir(&dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        if launch == Launch::Detached {
            command.process_group(0);
        }
    }
    #[cfg(not(unix))]
    let _ = launch;

    let mut child = command.spawn()?;
    let pid = child.id();

    let mut forwarders = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        forwarders.push(forward(project.name(), stdout, Stream::Stdout));
    }
    if let Some(stderr) = child.stderr.take() {
        forwarders.push(forward(project.name(), stderr, Stream::Stderr));
    }

    info!(project = %project.name(), "Dev server started with pid {pid}");

    Ok(DevServer {
        project: project.name().to_string(),
        pid,
        started_at: Local::now(),
        child,
        forwarders,
    })
}

/// Stop a dev server known only by its PID.
///
/// Sends a termination request, polls for up to `grace`, then force-kills.
/// A PID that is already gone is not an error.
///
/// # Errors
///
/// Returns [`Error::ProcessSignal`] for PIDs 0 and 1, which name a process
/// group or init rather than a dev server, or if a signal cannot be
/// delivered.
pub fn stop_pid(pid: u32, grace: Duration) -> Result<()> {
    check_target(pid)?;

    if !is_alive(pid) {
        debug!("Process {pid} is not running");
        return Ok(());
    }

    info!("Stopping process {pid}");
    terminate(pid)?;

    let deadline = Instant::now() + grace;
    while Instant::now() < deadline {
        if !is_alive(pid) {
            return Ok(());
        }
        thread::sleep(POLL_INTERVAL);
    }

    warn!("Process {pid} did not exit after {grace:?}, killing it");
    force_kill(pid)
}

fn check_target(pid: u32) -> Result<()> {
    if pid <= 1 {
        return Err(Error::ProcessSignal {
            pid,
            reason: "refusing to signal a process group or init".to_string(),
        });
    }

    Ok(())
}

/// Call `f` with every line of `reader` until end of input.
///
/// Lines are decoded lossily and stripped of their line ending, so output
/// that is not valid UTF-8 neither stops the reader nor leaves the writer
/// with a closed pipe.
///
/// # Errors
///
/// Returns the first read error other than an interruption.
pub(crate) fn for_each_line(reader: impl Read, mut f: impl FnMut(&str)) -> io::Result<()> {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => return Ok(()),
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                f(line.trim_end_matches(['\r', '\n']));
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
}

#[derive(Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

fn forward(project: &str, pipe: impl Read + Send + 'static, stream: Stream) -> JoinHandle<()> {
    let project = project.to_string();

    thread::spawn(move || {
        let result = for_each_line(pipe, |line| match stream {
            Stream::Stdout => info!(project = %project, "{line}"),
            Stream::Stderr => warn!(project = %project, "{line}"),
        });

        if let Err(e) = result {
            debug!(project = %project, "Output stream closed: {e}");
        }
    })
}

#[cfg(unix)]
fn shell(script: &str) -> Command {
    let mut command = Command::new("sh");
    command.arg("-c").arg(script);
    command
}

#[cfg(not(unix))]
fn shell(script: &str) -> Command {
    let mut command = Command::new("cmd");
    command.arg("/C").arg(script);
    command
}

#[cfg(unix)]
mod unix {
    use nix::{
        errno::Errno,
        sys::signal::{Signal, kill},
        unistd::{Pid, getpgid},
    };

    use crate::error::{Error, Result};

    fn raw_pid(pid: u32) -> Result<i32> {
        i32::try_from(pid).map_err(|_| Error::ProcessSignal {
            pid,
            reason: "pid out of range".to_string(),
        })
    }

    /// Signal the process group led by `pid`, or just `pid` if it leads none.
    pub fn signal(pid: u32, signal: Signal) -> Result<()> {
        super::check_target(pid)?;
        let target = Pid::from_raw(raw_pid(pid)?);

        let leads_group = getpgid(Some(target)).is_ok_and(|group| group == target);
        let result = if leads_group {
            kill(Pid::from_raw(-target.as_raw()), signal)
        } else {
            kill(target, signal)
        };

        match result {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(Error::ProcessSignal {
                pid,
                reason: e.to_string(),
            }),
        }
    }

    pub fn is_alive(pid: u32) -> bool {
        let Ok(raw) = raw_pid(pid) else {
            return false;
        };
        if raw == 0 {
            return false;
        }

        matches!(kill(Pid::from_raw(raw), None), Ok(()) | Err(Errno::EPERM))
    }
}

/// Whether a process with this PID exists.
#[cfg(unix)]
#[must_use]
pub fn is_alive(pid: u32) -> bool {
    unix::is_alive(pid)
}

/// Whether a process with this PID exists.
#[cfg(not(unix))]
#[must_use]
pub fn is_alive(pid: u32) -> bool {
    Command::new("tasklist")
        .args(["/FI", &format!("PID eq {pid}"), "/NH"])
        .output()
        .is_ok_and(|out| String::from_utf8_lossy(&out.stdout).contains(&pid.to_string()))
}

#[cfg(unix)]
fn terminate(pid: u32) -> Result<()> {
    unix::signal(pid, nix::sys::signal::Signal::SIGTERM)
}

#[cfg(unix)]
fn force_kill(pid: u32) -> Result<()> {
    unix::signal(pid, nix::sys::signal::Signal::SIGKILL)
}

#[cfg(not(unix))]
fn terminate(pid: u32) -> Result<()> {
    taskkill(pid, false)
}

#[cfg(not(unix))]
fn force_kill(pid: u32) -> Result<()> {
    taskkill(pid, true)
}

#[cfg(not(unix))]
fn taskkill(pid: u32, force: bool) -> Result<()> {
    let pid_arg = pid.to_string();
    let mut args = vec!["/PID", pid_arg.as_str(), "/T"];
    if force {
        args.push("/F");
    }

    let status = Command::new("taskkill").args(&args).status()?;
    if status.success() || !is_alive(pid) {
        Ok(())
    } else {
        Err(Error::ProcessSignal {
            pid,
            reason: format!("taskkill exited with {status}"),
        })
    }
}
