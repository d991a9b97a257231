pub mod breakpoint;
pub mod capability;
pub mod error;
pub mod expression;
pub mod frame;
pub mod library;
pub mod memory;
pub mod process;
pub mod register;
pub mod signal;
pub mod source;
pub mod target;
pub mod thread;
pub mod variable;

pub use breakpoint::{Breakpoint, BreakpointKind, BreakpointOptions, Condition, Watch, WatchAccess};
pub use capability::{TargetConfiguration, TargetKind};
pub use error::Error;
pub use frame::{Place, StackFrame};
pub use library::SharedLibrary;
pub use process::{DebugeeSource, GdbProcess};
pub use signal::Signal;
pub use source::{DisassemblyRange, Instruction, MixedInstruction};
pub use target::{Endianness, ExecState, Location, Target};
pub use thread::ThreadHandle;
pub use variable::{Cast, Variable, VariableDescriptor};

use crate::config::Config;
use crate::mi::{CommandChannel, Listener, MiCommand, MiEvent, StopRecord, StreamKind};
use crate::{muted_error, weak_error};
use log::{debug, info};
use nix::unistd::Pid;
use std::io::{Read, Write};
use std::sync::{Arc, Weak};

/// Why and where a target stopped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StopInfo {
    pub thread: Option<u32>,
    pub reason: Option<String>,
    pub signal: Option<String>,
    /// Id of the client breakpoint that was hit.
    pub breakpoint: Option<u32>,
    pub place: Option<Place>,
}

/// Value change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueChanged {
    Variable {
        object: String,
        expression: String,
        value: String,
    },
    Expression {
        id: u32,
        value: String,
    },
    Register {
        name: String,
        value: String,
    },
    Memory {
        start: u64,
        addresses: Vec<u64>,
    },
}

/// Receiver of session notifications. Called from the event dispatcher thread
/// or from the thread that performed a mutation.
pub trait EventHook: Send + Sync {
    fn on_thread_created(&self, id: u32);
    fn on_thread_exited(&self, id: u32);
    fn on_breakpoint(&self, id: u32, place: Option<&Place>);
    fn on_suspended(&self, stop: &StopInfo);
    fn on_resumed(&self, thread: Option<u32>);
    fn on_value_changed(&self, change: &ValueChanged);
    fn on_exit(&self, code: Option<i32>);
    fn on_detached(&self);
    fn on_output(&self, kind: StreamKind, text: &str);
}

pub struct NopHook;

impl EventHook for NopHook {
    fn on_thread_created(&self, _: u32) {}
    fn on_thread_exited(&self, _: u32) {}
    fn on_breakpoint(&self, _: u32, _: Option<&Place>) {}
    fn on_suspended(&self, _: &StopInfo) {}
    fn on_resumed(&self, _: Option<u32>) {}
    fn on_value_changed(&self, _: &ValueChanged) {}
    fn on_exit(&self, _: Option<i32>) {}
    fn on_detached(&self) {}
    fn on_output(&self, _: StreamKind, _: &str) {}
}

/// Routes channel events to a target without keeping it alive.
struct TargetListener(Weak<Target>);

impl Listener for TargetListener {
    fn on_event(&self, event: &MiEvent) {
        if let Some(target) = self.0.upgrade() {
            target.handle_event(event);
        }
    }
}

/// A debugging session: one debugger process driving one target.
pub struct Session {
    target: Arc<Target>,
    process: Option<GdbProcess>,
}

impl Session {
    /// Start the debugger and load a program, attach to a process or open a core.
    pub fn launch(
        config: &Config,
        source: DebugeeSource,
        hooks: Arc<dyn EventHook>,
    ) -> Result<Self, Error> {
        source.validate()?;
        let (process, stdout, stdin) = GdbProcess::spawn(config)?;
        let interrupter = source.interrupter(process.pid());
        let session = Self::new(stdout, stdin, source.kind(), interrupter, config, hooks);

        let channel = session.target.channel();
        process::initialize(channel)?;
        source.load(channel)?;
        if source.kind() != TargetKind::Process {
            weak_error!(session.target.refresh_roster(), "initial thread roster:");
        }

        Ok(Self {
            process: Some(process),
            ..session
        })
    }

    /// Session over already connected debugger streams.
    pub fn from_streams<R, W>(
        reader: R,
        writer: W,
        kind: TargetKind,
        config: &Config,
        hooks: Arc<dyn EventHook>,
    ) -> Self
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        Self::new(reader, writer, kind, None, config, hooks)
    }

    fn new<R, W>(
        reader: R,
        writer: W,
        kind: TargetKind,
        interrupter: Option<Pid>,
        config: &Config,
        hooks: Arc<dyn EventHook>,
    ) -> Self
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let channel = Arc::new(CommandChannel::new(reader, writer, config.command_timeout()));
        let target = Arc::new(Target::new(
            channel.clone(),
            hooks,
            kind,
            interrupter,
            config,
        ));
        channel.subscribe(Arc::new(TargetListener(Arc::downgrade(&target))));
        Self {
            target,
            process: None,
        }
    }

    pub fn target(&self) -> &Arc<Target> {
        &self.target
    }

    /// Ask the debugger to exit. The debugger process is killed if it doesn't.
    pub fn exit(self) {
        let channel = self.target.channel();
        if !channel.is_closed() {
            muted_error!(channel.post(&MiCommand::new("gdb-exit")), "exit debugger:");
        }
    }
}

impl Target {
    fn handle_event(&self, event: &MiEvent) {
        match event {
            MiEvent::Stopped(stop) if stop.is_exit() => {
                let code = match stop.reason.as_deref() {
                    Some("exited-normally") => Some(0),
                    _ => stop.exit_code,
                };
                self.on_terminated(code);
            }
            MiEvent::Stopped(stop) => self.on_suspended(Some(stop)),
            MiEvent::Running { thread } => {
                self.set_state(ExecState::Running);
                self.invalidate_frames();
                self.variables.clear_types();
                self.hooks.on_resumed(*thread);
            }
            MiEvent::BreakpointModified(bkpt) => self.on_breakpoint_modified(bkpt),
            MiEvent::BreakpointDeleted(number) => self.on_breakpoint_deleted(*number),
            MiEvent::BreakpointCreated(_) => {
                debug!(target: "debugger", "breakpoint created outside of session");
            }
            MiEvent::LibraryLoaded { id, .. } => {
                debug!(target: "debugger", "library loaded: {id}");
                self.resolve_deferred();
            }
            MiEvent::Output(kind, text) => self.hooks.on_output(*kind, text),
            MiEvent::Closed => {
                info!(target: "debugger", "debugger exited");
                self.on_terminated(None);
            }
            MiEvent::ThreadCreated(_)
            | MiEvent::ThreadExited(_)
            | MiEvent::ThreadSelected(_)
            | MiEvent::Other { .. } => {}
        }
    }

    /// Bring caches in line with a stopped target and notify the hook.
    pub(super) fn on_suspended(&self, stop: Option<&StopRecord>) {
        self.variables.clear_types();
        weak_error!(
            self.refresh_roster_with(stop.and_then(|s| s.thread_id)),
            "refresh threads:"
        );
        self.set_state(ExecState::Suspended);

        let breakpoint = stop
            .and_then(|s| s.bkptno)
            .and_then(|number| self.breakpoint_by_number(number));
        self.resolve_deferred();
        self.cascade_update();

        let info = StopInfo {
            thread: stop
                .and_then(|s| s.thread_id)
                .or_else(|| Some(self.current_thread_id())),
            reason: stop.and_then(|s| s.reason.clone()),
            signal: stop.and_then(|s| s.signal.clone()),
            breakpoint: breakpoint.as_ref().map(|bp| bp.id()),
            place: stop
                .and_then(|s| s.frame.as_ref())
                .map(Place::from_record),
        };
        if let Some(bp) = breakpoint {
            self.hooks.on_breakpoint(bp.id(), info.place.as_ref());
            self.on_breakpoint_hit(&bp);
        }
        self.hooks.on_suspended(&info);
    }

    /// Refresh registers, expressions, variables and memory, in that order. Each
    /// manager takes part only if its autoupdate is on.
    pub(super) fn cascade_update(&self) {
        if self.registers.autoupdate() {
            weak_error!(self.update_registers(), "update registers:");
        }
        if self.expressions.autoupdate() {
            weak_error!(self.update_expressions(), "update expressions:");
        }
        if self.variables.autoupdate() {
            weak_error!(self.update_variables(), "update variables:");
        }
        if self.memory.autoupdate() {
            weak_error!(self.update_memory(), "update memory:");
        }
    }
}
