use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, OwnedFd};
use std::process::Stdio;
use std::time::Duration;

use nix::fcntl::{FcntlArg, FdFlag, OFlag, fcntl};
use nix::pty::openpty;
use nix::sys::signal::{Signal, killpg};
use nix::unistd::{Pid, setsid};
use tokio::io::unix::AsyncFd;
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::pty::pty_types::{MAX_READ_CHUNK, PtyConfig, PtyError, ReadOutcome, ShellExit};

/// Opens a pty pair and starts the configured shell on its slave side.
///
/// The executable is resolved before anything is allocated, so a missing or
/// non-executable shell fails with [`PtyError::Spawn`] and leaves nothing open.
/// The slave descriptors are closed before this returns; only the child holds
/// the slave side afterwards.
pub fn spawn_pty(config: &PtyConfig) -> Result<(PtyMaster, ShellProcess), PtyError> {
    let shell_name = config.shell.display().to_string();
    let shell = which::which(&config.shell).map_err(|e| PtyError::Spawn {
        shell: shell_name.clone(),
        reason: e.to_string(),
    })?;

    let pair = openpty(None, None)?;
    set_cloexec(&pair.master)?;
    set_cloexec(&pair.slave)?;
    set_nonblocking(&pair.master)?;
    let master = PtyMaster::new(pair.master)?;

    let mut command = Command::new(&shell);
    command
        .stdin(Stdio::from(pair.slave.try_clone()?))
        .stdout(Stdio::from(pair.slave.try_clone()?))
        .stderr(Stdio::from(pair.slave));
    // SAFETY: the hook only calls setsid and ioctl, both async-signal-safe.
    unsafe {
        command.pre_exec(attach_controlling_terminal);
    }

    let child = command.spawn().map_err(|e| PtyError::Spawn {
        shell: shell_name.clone(),
        reason: e.to_string(),
    })?;
    drop(command);

    let Some(pid) = child.id() else {
        return Err(PtyError::Spawn {
            shell: shell_name,
            reason: "child exited before its pid could be read".to_string(),
        });
    };

    info!(pid, shell = %shell.display(), "Spawned shell on pty");
    let process = ShellProcess::start(child, pid, config.kill_grace);
    Ok((master, process))
}

/// Runs in the child between fork and exec.
fn attach_controlling_terminal() -> io::Result<()> {
    setsid().map_err(io::Error::from)?;
    // SAFETY: fd 0 is the pty slave installed by the Stdio setup above.
    let rc = unsafe { nix::libc::ioctl(0, nix::libc::TIOCSCTTY as _, 0) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn set_nonblocking(fd: &OwnedFd) -> Result<(), PtyError> {
    let flags = fcntl(fd.as_raw_fd(), FcntlArg::F_GETFL)?;
    let flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
    fcntl(fd.as_raw_fd(), FcntlArg::F_SETFL(flags))?;
    Ok(())
}

fn set_cloexec(fd: &OwnedFd) -> Result<(), PtyError> {
    fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;
    Ok(())
}

// ================ Master side ================

/// Exclusively owned master side of a pty pair, registered with the tokio reactor.
///
/// Dropping the value closes the descriptor; [`PtyMaster::release`] does the same
/// eagerly and is idempotent. Every I/O call after release fails with
/// [`PtyError::Released`].
#[derive(Debug)]
pub struct PtyMaster {
    fd: Option<AsyncFd<File>>,
}

impl PtyMaster {
    fn new(fd: OwnedFd) -> Result<Self, PtyError> {
        let fd = AsyncFd::new(File::from(fd))?;
        Ok(Self { fd: Some(fd) })
    }

    fn io(&self) -> Result<&AsyncFd<File>, PtyError> {
        self.fd.as_ref().ok_or(PtyError::Released)
    }

    /// Waits for readiness and performs one read of at most [`MAX_READ_CHUNK`] bytes.
    ///
    /// Linux reports `EIO` once the last slave reference is closed; that is
    /// reported as [`ReadOutcome::Eof`] like a zero-length read.
    pub async fn read_nonblocking(&self, buf: &mut [u8]) -> Result<ReadOutcome, PtyError> {
        let fd = self.io()?;
        let limit = buf.len().min(MAX_READ_CHUNK);
        loop {
            let mut guard = fd.readable().await.map_err(PtyError::Read)?;
            let result = guard.try_io(|inner| {
                let mut file = inner.get_ref();
                file.read(&mut buf[..limit])
            });
            match result {
                Ok(Ok(0)) => return Ok(ReadOutcome::Eof),
                Ok(Ok(n)) => return Ok(ReadOutcome::Data(n)),
                Ok(Err(e)) if e.raw_os_error() == Some(nix::libc::EIO) => {
                    debug!("pty master reported EIO, slave side closed");
                    return Ok(ReadOutcome::Eof);
                }
                Ok(Err(e)) => return Err(PtyError::Read(e)),
                Err(_would_block) => continue,
            }
        }
    }

    /// Writes all of `data` to the shell's input, waiting for writability as needed.
    pub async fn write_all(&self, mut data: &[u8]) -> Result<(), PtyError> {
        let fd = self.io()?;
        while !data.is_empty() {
            let mut guard = fd.writable().await.map_err(PtyError::Write)?;
            let result = guard.try_io(|inner| {
                let mut file = inner.get_ref();
                file.write(data)
            });
            match result {
                Ok(Ok(0)) => return Err(PtyError::Write(io::ErrorKind::WriteZero.into())),
                Ok(Ok(n)) => data = &data[n..],
                Ok(Err(e)) => return Err(PtyError::Write(e)),
                Err(_would_block) => continue,
            }
        }
        Ok(())
    }

    /// Closes the master descriptor. Returns `false` if it was already released.
    pub fn release(&mut self) -> bool {
        match self.fd.take() {
            Some(fd) => {
                drop(fd);
                true
            }
            None => false,
        }
    }

    pub fn is_released(&self) -> bool {
        self.fd.is_none()
    }
}

// ================ Child process ================

/// Handle to the shell running on the slave side.
///
/// The `tokio::process::Child` itself lives in a reaper task so waiting for the
/// exit never blocks the bridge. Dropping the handle without calling
/// [`ShellProcess::terminate`] still hangs the shell up.
#[derive(Debug)]
pub struct ShellProcess {
    pid: u32,
    terminate_tx: Option<oneshot::Sender<()>>,
    exit_rx: watch::Receiver<Option<ShellExit>>,
}

impl ShellProcess {
    fn start(child: Child, pid: u32, kill_grace: Duration) -> Self {
        let (terminate_tx, terminate_rx) = oneshot::channel();
        let (exit_tx, exit_rx) = watch::channel(None);
        tokio::spawn(reap(child, pid, terminate_rx, kill_grace, exit_tx));
        Self {
            pid,
            terminate_tx: Some(terminate_tx),
            exit_rx,
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Requests termination without waiting for it.
    ///
    /// Only the first call signals the shell; later calls return `false`.
    pub fn terminate(&mut self) -> bool {
        match self.terminate_tx.take() {
            Some(tx) => {
                // An error here means the reaper already collected the exit status.
                let _ = tx.send(());
                true
            }
            None => false,
        }
    }

    pub fn exit_watch(&self) -> watch::Receiver<Option<ShellExit>> {
        self.exit_rx.clone()
    }

    /// Waits until the reaper has collected the shell.
    pub async fn wait(&mut self) -> ShellExit {
        match self.exit_rx.wait_for(Option::is_some).await {
            Ok(exit) => (*exit).unwrap_or_else(ShellExit::unknown),
            Err(_) => ShellExit::unknown(),
        }
    }
}

async fn reap(
    mut child: Child,
    pid: u32,
    mut terminate_rx: oneshot::Receiver<()>,
    kill_grace: Duration,
    exit_tx: watch::Sender<Option<ShellExit>>,
) {
    let status = tokio::select! {
        status = child.wait() => status,
        _ = &mut terminate_rx => {
            hang_up(pid);
            match tokio::time::timeout(kill_grace, child.wait()).await {
                Ok(status) => status,
                Err(_) => {
                    warn!(pid, "Shell ignored hangup, sending SIGKILL");
                    if let Err(e) = child.start_kill() {
                        error!(pid, "Failed to kill shell: {}", e);
                    }
                    child.wait().await
                }
            }
        }
    };

    let exit = match status {
        Ok(status) => {
            info!(pid, %status, "Shell process exited");
            ShellExit::from_status(status)
        }
        Err(e) => {
            error!(pid, "Failed to wait for shell process: {}", e);
            ShellExit::unknown()
        }
    };
    exit_tx.send_replace(Some(exit));
}

/// Sends SIGHUP to the shell's process group, as a terminal hangup would.
fn hang_up(pid: u32) {
    let Ok(raw) = i32::try_from(pid) else {
        warn!(pid, "pid out of range, not signalling");
        return;
    };
    match killpg(Pid::from_raw(raw), Signal::SIGHUP) {
        Ok(()) => debug!(pid, "Sent SIGHUP to shell process group"),
        Err(nix::errno::Errno::ESRCH) => debug!(pid, "Shell process group already gone"),
        Err(e) => warn!(pid, "Failed to send SIGHUP: {}", e),
    }
}
