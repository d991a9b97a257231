use crate::config::Config;
use crate::debugger::breakpoint::BreakpointRegistry;
use crate::debugger::capability::{TargetConfiguration, TargetKind};
use crate::debugger::expression::ExpressionRegistry;
use crate::debugger::frame::StackFrame;
use crate::debugger::memory::MemoryRegistry;
use crate::debugger::register::RegisterRegistry;
use crate::debugger::thread::ThreadCache;
use crate::debugger::variable::VariableRegistry;
use crate::debugger::{Error, EventHook};
use crate::mi::{CommandChannel, MiCommand, Reply, ResultClass};
use crate::weak_error;
use log::{debug, info};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use once_cell::sync;
use once_cell::sync::OnceCell;
use regex::Regex;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use strum_macros::Display;

/// Execution state of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ExecState {
    Running,
    Suspended,
    Terminated,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Endianness {
    Little,
    Big,
}

/// A place in the program where execution may be moved or resumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Line { file: String, line: u32 },
    Function { file: Option<String>, function: String },
    Address(u64),
}

impl Location {
    /// Textual debugger location (`file:line`, `[file:]function`, `*0xaddr`).
    pub fn to_wire(&self) -> Result<String, Error> {
        match self {
            Location::Line { file, line } => {
                if file.trim().is_empty() {
                    return Err(Error::InvalidLocation(format!(":{line}")));
                }
                Ok(format!("{file}:{line}"))
            }
            Location::Function { file, function } => match file {
                Some(file) if !file.is_empty() => Ok(format!("{file}:{function}")),
                _ => Ok(function.clone()),
            },
            Location::Address(addr) => Ok(format!("*{addr:#x}")),
        }
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Location::Line { file, line } => write!(f, "{file}:{line}"),
            Location::Function {
                file: Some(file),
                function,
            } => write!(f, "{file}:{function}"),
            Location::Function { function, .. } => f.write_str(function),
            Location::Address(addr) => write!(f, "*{addr:#x}"),
        }
    }
}

impl FromStr for Location {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(addr) = s.strip_prefix('*') {
            return crate::debugger::frame::parse_address(addr)
                .map(Location::Address)
                .ok_or_else(|| Error::InvalidLocation(s.to_string()));
        }

        match s.rsplit_once(':') {
            Some((file, line)) if line.chars().all(|c| c.is_ascii_digit()) && !line.is_empty() => {
                Ok(Location::Line {
                    file: file.to_string(),
                    line: line.parse()?,
                })
            }
            Some((file, function)) if !file.ends_with(':') => Ok(Location::Function {
                file: Some(file.to_string()),
                function: function.to_string(),
            }),
            _ if !s.is_empty() => Ok(Location::Function {
                file: None,
                function: s.to_string(),
            }),
            _ => Err(Error::InvalidLocation(s.to_string())),
        }
    }
}

/// A debug target: one process, attached process or core file driven through a
/// command channel.
pub struct Target {
    pub(super) channel: Arc<CommandChannel>,
    pub(super) hooks: Arc<dyn EventHook>,
    kind: TargetKind,
    configuration: TargetConfiguration,
    /// Process receiving SIGINT when the debugger can't interrupt the target itself.
    interrupter: Option<Pid>,
    pub(super) stack_depth: u32,
    poll_interval: Duration,
    state: Mutex<ExecState>,
    state_changed: Condvar,
    /// Target lock: serializes thread switches, stack queries and roster updates.
    pub(super) threads: Mutex<ThreadCache>,
    endianness: OnceCell<Endianness>,
    pub(super) breakpoints: BreakpointRegistry,
    pub(super) variables: VariableRegistry,
    pub(super) expressions: ExpressionRegistry,
    pub(super) registers: RegisterRegistry,
    pub(super) memory: MemoryRegistry,
}

impl Target {
    pub fn new(
        channel: Arc<CommandChannel>,
        hooks: Arc<dyn EventHook>,
        kind: TargetKind,
        interrupter: Option<Pid>,
        config: &Config,
    ) -> Self {
        let initial_state = match kind {
            TargetKind::Process => ExecState::Terminated,
            TargetKind::Attach | TargetKind::Core => ExecState::Suspended,
        };

        Self {
            channel,
            hooks,
            kind,
            configuration: TargetConfiguration::for_kind(kind),
            interrupter,
            stack_depth: config.stack_depth.max(1),
            poll_interval: config.suspend_poll_interval(),
            state: Mutex::new(initial_state),
            state_changed: Condvar::new(),
            threads: Mutex::default(),
            endianness: OnceCell::new(),
            breakpoints: BreakpointRegistry::new(config.deferred_breakpoints),
            variables: VariableRegistry::new(config.autoupdate.variables, config.type_cache_size),
            expressions: ExpressionRegistry::new(config.autoupdate.expressions),
            registers: RegisterRegistry::new(config.autoupdate.registers),
            memory: MemoryRegistry::new(config.autoupdate.memory),
        }
    }

    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    pub fn configuration(&self) -> &TargetConfiguration {
        &self.configuration
    }

    pub fn channel(&self) -> &CommandChannel {
        &self.channel
    }

    pub fn state(&self) -> ExecState {
        *self.state.lock().unwrap()
    }

    pub fn is_suspended(&self) -> bool {
        self.state() == ExecState::Suspended
    }

    pub fn is_terminated(&self) -> bool {
        matches!(
            self.state(),
            ExecState::Terminated | ExecState::Disconnected
        )
    }

    pub(super) fn set_state(&self, state: ExecState) {
        let mut current = self.state.lock().unwrap();
        if *current != state {
            debug!(target: "debugger", "target state {} -> {state}", *current);
            *current = state;
        }
        self.state_changed.notify_all();
    }

    /// Post a command whose reply is the only success criterion.
    pub(super) fn exec(&self, command: &MiCommand) -> Result<Reply, Error> {
        let reply = self.channel.post(command)?;
        match reply.class {
            ResultClass::Done | ResultClass::Running | ResultClass::Connected => Ok(reply),
            ResultClass::Error | ResultClass::Exit => Err(Error::TargetNotResponding),
        }
    }

    pub(super) fn require(&self, supported: bool, operation: &'static str) -> Result<(), Error> {
        if supported {
            Ok(())
        } else {
            Err(Error::Unsupported(operation))
        }
    }

    pub(super) fn guard_suspended(&self) -> Result<(), Error> {
        match self.state() {
            ExecState::Suspended => Ok(()),
            ExecState::Running => Err(Error::NotSuspended),
            ExecState::Terminated => Err(Error::Terminated),
            ExecState::Disconnected => Err(Error::Disconnected),
        }
    }

    /// Move a suspended target into running state atomically, return state to restore
    /// if the command fails.
    fn begin_execution(&self, allow_terminated: bool) -> Result<ExecState, Error> {
        let mut state = self.state.lock().unwrap();
        match *state {
            ExecState::Running => return Err(Error::AlreadyRunning),
            ExecState::Disconnected => return Err(Error::Disconnected),
            ExecState::Terminated if !allow_terminated => return Err(Error::Terminated),
            _ => {}
        }
        let previous = *state;
        *state = ExecState::Running;
        Ok(previous)
    }

    fn execute(&self, command: MiCommand, allow_terminated: bool) -> Result<(), Error> {
        let previous = self.begin_execution(allow_terminated)?;
        if let Err(e) = self.exec(&command) {
            let mut state = self.state.lock().unwrap();
            if *state == ExecState::Running {
                *state = previous;
            }
            return Err(e);
        }
        Ok(())
    }

    fn step_command(&self, operation: &str, count: u32) -> Result<(), Error> {
        self.guard_suspended()?;
        self.execute(
            MiCommand::new(operation).param(count.max(1).to_string()),
            false,
        )
    }

    /// Step into `count` source lines.
    pub fn step_into(&self, count: u32) -> Result<(), Error> {
        self.require(self.configuration.step, "step")?;
        self.step_command("exec-step", count)
    }

    /// Step over `count` source lines.
    pub fn step_over(&self, count: u32) -> Result<(), Error> {
        self.require(self.configuration.step, "step")?;
        self.step_command("exec-next", count)
    }

    pub fn step_into_instruction(&self, count: u32) -> Result<(), Error> {
        self.require(self.configuration.instruction_step, "instruction step")?;
        self.step_command("exec-step-instruction", count)
    }

    pub fn step_over_instruction(&self, count: u32) -> Result<(), Error> {
        self.require(self.configuration.instruction_step, "instruction step")?;
        self.step_command("exec-next-instruction", count)
    }

    /// Run until a location is reached or the current frame returns.
    pub fn run_until(&self, location: &Location) -> Result<(), Error> {
        self.require(self.configuration.step, "run until")?;
        self.guard_suspended()?;
        let location = location.to_wire()?;
        self.execute(MiCommand::new("exec-until").param(location), false)
    }

    /// Finish execution of a frame, stop right after it returns to its caller.
    pub fn step_return(&self, frame: &StackFrame) -> Result<(), Error> {
        self.require(self.configuration.step, "step return")?;
        self.guard_suspended()?;
        self.select_frame(frame, false)?;
        self.execute(MiCommand::new("exec-finish"), false)
    }

    /// Pop a frame off the stack without executing it. Optional value is returned
    /// to the caller.
    pub fn exec_return(&self, frame: &StackFrame, value: Option<&str>) -> Result<(), Error> {
        self.require(self.configuration.step, "return")?;
        self.guard_suspended()?;
        self.select_frame(frame, false)?;

        let mut cmd = MiCommand::new("exec-return");
        if let Some(value) = value {
            cmd = cmd.param(value);
        }
        self.exec(&cmd)?;

        // no stop record follows a return
        self.on_suspended(None);
        Ok(())
    }

    /// Resume a suspended target. A terminated process is restarted.
    ///
    /// With `pass_signal` the target continues through `signal 0`.
    pub fn resume(&self, pass_signal: bool) -> Result<(), Error> {
        self.require(self.configuration.resume, "resume")?;
        match self.state() {
            ExecState::Terminated if self.configuration.restart => self.restart(),
            _ if pass_signal => self.execute(MiCommand::cli("signal 0"), false),
            _ => self.execute(MiCommand::new("exec-continue"), false),
        }
    }

    /// Resume execution at a location (`jump`).
    pub fn resume_at(&self, location: &Location) -> Result<(), Error> {
        self.require(self.configuration.resume, "resume")?;
        self.guard_suspended()?;
        let location = location.to_wire()?;
        self.execute(MiCommand::cli(format!("jump {location}")), false)
    }

    /// Move execution to a location and stop there.
    ///
    /// A temporary breakpoint is inserted at the location before the jump so control
    /// returns to the session even if the location is never reached.
    pub fn move_instruction_pointer(&self, location: &Location) -> Result<(), Error> {
        self.require(self.configuration.resume, "move instruction pointer")?;
        self.guard_suspended()?;
        let location = location.to_wire()?;
        self.exec(
            &MiCommand::new("break-insert")
                .option("-t")
                .param(location.as_str()),
        )?;
        self.execute(MiCommand::cli(format!("jump {location}")), false)
    }

    /// Resume with a named signal delivered to the target.
    pub fn signal(&self, name: &str) -> Result<(), Error> {
        self.require(self.configuration.resume, "signal")?;
        self.guard_suspended()?;
        self.execute(MiCommand::cli(format!("signal {name}")), false)
    }

    /// Start the program from the beginning.
    pub fn restart(&self) -> Result<(), Error> {
        self.require(self.configuration.restart, "restart")?;
        self.execute(MiCommand::new("exec-run"), true)
    }

    /// Interrupt a running target and wait until it reports the stop.
    pub fn suspend(&self) -> Result<(), Error> {
        self.require(self.configuration.suspend, "suspend")?;
        match self.state() {
            ExecState::Running => {}
            ExecState::Suspended => return Ok(()),
            ExecState::Terminated => return Err(Error::Terminated),
            ExecState::Disconnected => return Err(Error::Disconnected),
        }

        if let Err(e) = self.exec(&MiCommand::new("exec-interrupt")) {
            if e.is_fatal() {
                return Err(e);
            }
            let pid = self.interrupter.ok_or(e)?;
            debug!(target: "debugger", "interrupt through SIGINT to {pid}");
            signal::kill(pid, Signal::SIGINT).map_err(|e| Error::Syscall("kill", e))?;
        }

        let attempts = self.channel.timeout().as_millis() / self.poll_interval.as_millis().max(1) + 1;
        let mut state = self.state.lock().unwrap();
        for _ in 0..attempts {
            if *state != ExecState::Running {
                return Ok(());
            }
            state = self
                .state_changed
                .wait_timeout(state, self.poll_interval)
                .unwrap()
                .0;
        }
        if *state == ExecState::Running {
            return Err(Error::InterruptFailed);
        }
        Ok(())
    }

    /// Detach from an attached process, leaving it running.
    pub fn disconnect(&self) -> Result<(), Error> {
        self.require(self.configuration.disconnect, "disconnect")?;
        if self.state() == ExecState::Disconnected {
            return Err(Error::Disconnected);
        }
        self.exec(&MiCommand::new("target-detach"))?;

        // no event follows a detach
        self.set_state(ExecState::Disconnected);
        self.hooks.on_detached();
        Ok(())
    }

    /// Kill the target process.
    pub fn terminate(&self) -> Result<(), Error> {
        self.require(self.configuration.terminate, "terminate")?;
        match self.state() {
            ExecState::Terminated | ExecState::Disconnected => return Ok(()),
            ExecState::Running if self.kind != TargetKind::Core => {
                weak_error!(self.suspend(), "suspend before kill:");
            }
            _ => {}
        }

        if self.kind != TargetKind::Core {
            self.exec(&MiCommand::cli("kill"))?;
        }
        self.on_terminated(None);
        Ok(())
    }

    pub(super) fn on_terminated(&self, code: Option<i32>) {
        if self.is_terminated() {
            return;
        }
        self.threads.lock().unwrap().clear();
        self.set_state(ExecState::Terminated);
        info!(target: "debugger", "target terminated, exit code: {code:?}");
        self.hooks.on_exit(code);
    }

    /// Byte order of the target, queried once.
    pub fn endianness(&self) -> Result<Endianness, Error> {
        self.endianness
            .get_or_try_init(|| {
                let reply = self.exec(&MiCommand::cli("show endian"))?;
                parse_endianness(&reply.console_text())
            })
            .copied()
    }
}

fn parse_endianness(text: &str) -> Result<Endianness, Error> {
    static ENDIAN_RE: sync::Lazy<Regex> =
        sync::Lazy::new(|| Regex::new(r"(little|big) endian").expect("must compile"));
    match ENDIAN_RE.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str()) {
        Some("little") => Ok(Endianness::Little),
        Some("big") => Ok(Endianness::Big),
        _ => Err(Error::MalformedReply(text.trim().to_string())),
    }
}
