use crate::config::Config;
use crate::debugger::capability::TargetKind;
use crate::debugger::error::Error;
use crate::mi::{CommandChannel, MiCommand};
use crate::{muted_error, weak_error};
use log::{debug, info};
use nix::sys::signal;
use nix::unistd::Pid;
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

/// What the session debugs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebugeeSource {
    /// Program started by the debugger.
    File {
        path: PathBuf,
        args: Vec<String>,
        cwd: Option<PathBuf>,
    },
    /// Already running process.
    Process { pid: Pid, program: Option<PathBuf> },
    /// Post-mortem core file.
    Core { program: PathBuf, core: PathBuf },
}

impl DebugeeSource {
    pub fn kind(&self) -> TargetKind {
        match self {
            DebugeeSource::File { .. } => TargetKind::Process,
            DebugeeSource::Process { .. } => TargetKind::Attach,
            DebugeeSource::Core { .. } => TargetKind::Core,
        }
    }

    /// Process that receives SIGINT when the debugger fails to interrupt the target.
    pub(super) fn interrupter(&self, gdb: Pid) -> Option<Pid> {
        match self {
            DebugeeSource::File { .. } => Some(gdb),
            DebugeeSource::Process { pid, .. } => Some(*pid),
            DebugeeSource::Core { .. } => None,
        }
    }

    /// Check that the source exists before the debugger is started.
    pub(super) fn validate(&self) -> Result<(), Error> {
        if let DebugeeSource::Process { pid, .. } = self {
            signal::kill(*pid, None).map_err(|_| Error::AttachedProcessNotFound(*pid))?;
        }
        Ok(())
    }

    /// Load the program, attach to the process or open the core file.
    pub(super) fn load(&self, channel: &CommandChannel) -> Result<(), Error> {
        let path = |p: &PathBuf| p.to_string_lossy().to_string();
        match self {
            DebugeeSource::File { path: exe, args, cwd } => {
                channel.post(&MiCommand::new("file-exec-and-symbols").param(path(exe)))?;
                if !args.is_empty() {
                    channel.post(&MiCommand::new("exec-arguments").params(args))?;
                }
                if let Some(cwd) = cwd {
                    channel.post(&MiCommand::new("environment-cd").param(path(cwd)))?;
                }
            }
            DebugeeSource::Process { pid, program } => {
                if let Some(program) = program {
                    channel.post(&MiCommand::new("file-exec-and-symbols").param(path(program)))?;
                }
                channel.post(&MiCommand::new("target-attach").param(pid.to_string()))?;
            }
            DebugeeSource::Core { program, core } => {
                channel.post(&MiCommand::new("file-exec-and-symbols").param(path(program)))?;
                channel.post(
                    &MiCommand::new("target-select")
                        .param("core")
                        .param(path(core)),
                )?;
            }
        }
        info!(target: "debugger", "{} target loaded", self.kind());
        Ok(())
    }
}

/// Debugger settings applied once per session.
pub(super) fn initialize(channel: &CommandChannel) -> Result<(), Error> {
    for setting in ["confirm off", "pagination off", "width 0", "height 0"] {
        let command = MiCommand::new("gdb-set").params(setting.split(' '));
        muted_error!(channel.post(&command), "debugger setting:");
    }

    let async_on = channel.post(&MiCommand::new("gdb-set").param("mi-async").param("on"));
    if let Err(e) = async_on {
        debug!(target: "debugger", "mi-async unsupported ({e}), try target-async");
        weak_error!(
            channel.post(&MiCommand::new("gdb-set").param("target-async").param("on")),
            "async execution unavailable:"
        );
    }
    Ok(())
}

/// Running debugger process, killed on drop.
pub struct GdbProcess {
    child: Child,
}

impl GdbProcess {
    /// Start the debugger in machine interface mode, return it with its output
    /// and input streams.
    pub fn spawn(config: &Config) -> Result<(Self, ChildStdout, ChildStdin), Error> {
        let exe = which::which(&config.gdb)?;
        debug!(target: "debugger", "start {}", exe.display());

        let mut child = Command::new(exe)
            .args(["--interpreter=mi2", "--nx", "--quiet"])
            .args(&config.gdb_args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("debugger stdout unavailable"))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| std::io::Error::other("debugger stdin unavailable"))?;
        Ok((Self { child }, stdout, stdin))
    }

    pub fn pid(&self) -> Pid {
        Pid::from_raw(self.child.id() as i32)
    }
}

impl Drop for GdbProcess {
    fn drop(&mut self) {
        if muted_error!(self.child.try_wait()).flatten().is_none() {
            weak_error!(self.child.kill(), "kill debugger:");
            weak_error!(self.child.wait(), "wait debugger:");
        }
    }
}
