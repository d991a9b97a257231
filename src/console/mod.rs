//! Interactive terminal driver over a debugging session.

use crate::config::Config;
use crate::console::command::Command;
use crate::console::editor::{create_editor, MiEditor};
use crate::console::help::help_for_command;
use crate::console::hook::TerminalHook;
use crate::console::print::ExternalPrinter;
use crate::console::variable::render_variable;
use crate::debugger::{
    BreakpointOptions, Condition, DebugeeSource, DisassemblyRange, ExecState, Instruction,
    Session, StackFrame, Target, TargetKind, VariableDescriptor,
};
use crate::weak_error;
use crossterm::style::Stylize;
use itertools::Itertools;
use rustyline::error::ReadlineError;
use std::sync::mpsc::{Receiver, SyncSender};
use std::sync::{mpsc, Arc};
use std::thread;

pub mod command;
mod editor;
mod help;
pub mod hook;
pub mod print;
mod variable;

const WELCOME_TEXT: &str = r#"
migdb greets
"#;
const PROMT: &str = "(migdb) ";
/// Bytes disassembled around a frame without source information.
const DISASM_WINDOW: u64 = 64;

pub struct AppBuilder {
    config: Config,
}

impl AppBuilder {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn build(self, source: DebugeeSource) -> anyhow::Result<TerminalApplication> {
        let (control_tx, control_rx) = mpsc::sync_channel::<Control>(0);
        let mut editor = create_editor(PROMT)?;

        let hook = TerminalHook::new(ExternalPrinter::new(&mut editor));
        let session = Session::launch(&self.config, source, Arc::new(hook))?;

        Ok(TerminalApplication {
            session,
            editor,
            control_tx,
            control_rx,
        })
    }
}

enum Control {
    Cmd(String),
    Interrupt,
    Terminate,
}

pub struct TerminalApplication {
    session: Session,
    editor: MiEditor,
    control_tx: SyncSender<Control>,
    control_rx: Receiver<Control>,
}

impl TerminalApplication {
    pub fn run(mut self) -> anyhow::Result<()> {
        let app_loop = AppLoop {
            target: self.session.target().clone(),
            control_rx: self.control_rx,
            printer: ExternalPrinter::new(&mut self.editor),
            frame: None,
        };

        let mut editor = self.editor;
        {
            let control_tx = self.control_tx.clone();
            thread::spawn(move || {
                println!("{WELCOME_TEXT}");
                loop {
                    let line = editor.readline(PROMT);
                    match line {
                        Ok(input) => {
                            if input == "q" || input == "quit" {
                                _ = control_tx.send(Control::Terminate);
                                break;
                            } else {
                                _ = editor.add_history_entry(&input);
                                _ = control_tx.send(Control::Cmd(input));
                            }
                        }
                        Err(ReadlineError::Interrupted) => {
                            _ = control_tx.send(Control::Interrupt);
                        }
                        Err(ReadlineError::Eof) => {
                            _ = control_tx.send(Control::Terminate);
                            break;
                        }
                        Err(err) => {
                            println!("error: {:#}", err);
                            _ = control_tx.send(Control::Terminate);
                            break;
                        }
                    }
                }
            });
        }

        app_loop.run();

        let target = self.session.target().clone();
        if target.kind() != TargetKind::Core {
            weak_error!(target.terminate(), "terminate target:");
        }
        self.session.exit();
        Ok(())
    }
}

struct AppLoop {
    target: Arc<Target>,
    control_rx: Receiver<Control>,
    printer: ExternalPrinter,
    /// Frame selected with `frame`, innermost frame of the current thread if none.
    frame: Option<StackFrame>,
}

impl AppLoop {
    fn yes(&mut self, question: &str) -> anyhow::Result<bool> {
        self.printer.print(question);

        let act = self.control_rx.recv()?;
        match act {
            Control::Cmd(cmd) => {
                let cmd = cmd.to_lowercase();
                Ok(cmd == "y" || cmd == "yes")
            }
            Control::Interrupt | Control::Terminate => Ok(false),
        }
    }

    fn current_frame(&self) -> anyhow::Result<StackFrame> {
        if let Some(frame) = &self.frame {
            return Ok(frame.clone());
        }
        let thread = self.target.current_thread_id();
        self.target
            .stack_frames(thread, 0, 0)?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("no stack frames in thread {thread}"))
    }

    fn print_variables(&self, descriptors: Vec<VariableDescriptor>) -> anyhow::Result<()> {
        for descriptor in descriptors {
            let var = self.target.create_variable(&descriptor)?;
            self.printer.print(format!(
                "{} = {}",
                var.name(),
                render_variable(&self.target, &var, 0)
            ));
            weak_error!(self.target.destroy_variable(&var), "destroy variable:");
        }
        Ok(())
    }

    fn examine(&self, expression: &str, length: usize) -> anyhow::Result<()> {
        let block = self.target.create_memory_block(expression, 1, length)?;
        let bytes = block.bytes();
        let bad = block.bad_offsets();
        self.target.destroy_memory_block(&block);

        for (row, chunk) in bytes.chunks(8).enumerate() {
            let offset = row * 8;
            let line = chunk
                .iter()
                .enumerate()
                .map(|(i, b)| {
                    if bad.contains(&(offset + i)) {
                        "??".to_string()
                    } else {
                        format!("{b:02x}")
                    }
                })
                .join(" ");
            self.printer.print(format!(
                "{}: {line}",
                format!("{:#018x}", block.start() + offset as u64).blue()
            ));
        }
        Ok(())
    }

    fn handle_command(&mut self, cmd: &str) -> anyhow::Result<()> {
        let command = Command::parse(cmd)?;
        if matches!(
            command,
            Command::Run
                | Command::Continue
                | Command::Signal(_)
                | Command::Step(_)
                | Command::Next(_)
                | Command::StepInstruction(_)
                | Command::NextInstruction(_)
                | Command::Finish
                | Command::Return(_)
                | Command::Until(_)
                | Command::Jump(_)
                | Command::Thread(_)
        ) {
            self.frame = None;
        }

        match command {
            Command::Run => match self.target.state() {
                ExecState::Terminated => self.target.restart()?,
                _ => {
                    if self.yes("Restart program? (y or n)")? {
                        self.target.terminate()?;
                        self.target.restart()?;
                    }
                }
            },
            Command::Continue => self.target.resume(false)?,
            Command::Signal(name) => self.target.signal(&name)?,
            Command::Interrupt => self.target.suspend()?,
            Command::Step(count) => self.target.step_into(count)?,
            Command::Next(count) => self.target.step_over(count)?,
            Command::StepInstruction(count) => self.target.step_into_instruction(count)?,
            Command::NextInstruction(count) => self.target.step_over_instruction(count)?,
            Command::Finish => {
                let frame = self.current_frame()?;
                self.target.step_return(&frame)?
            }
            Command::Return(value) => {
                let frame = self.current_frame()?;
                self.target.exec_return(&frame, value.as_deref())?
            }
            Command::Until(location) => self.target.run_until(&location)?,
            Command::Jump(location) => self.target.resume_at(&location)?,
            Command::Break { kind, temporary } => {
                let options = BreakpointOptions {
                    temporary,
                    ..BreakpointOptions::default()
                };
                let bp = self
                    .target
                    .set_breakpoint(kind, options, Condition::default())?;
                let state = if bp.is_deferred() { " (pending)" } else { "" };
                self.printer.print(format!(
                    "Breakpoint {} at {}{state}",
                    bp.id().to_string().bold(),
                    bp.kind()
                ));
            }
            Command::Delete(None) => {
                if self.yes("Delete all breakpoints? (y or n)")? {
                    self.target.delete_all_breakpoints()?;
                }
            }
            Command::Delete(Some(id)) => {
                let bp = self.target.breakpoint(id)?;
                self.target.delete_breakpoint(&bp)?;
            }
            Command::Enable(id) => {
                let bp = self.target.breakpoint(id)?;
                self.target.set_breakpoint_enabled(&bp, true)?;
            }
            Command::Disable(id) => {
                let bp = self.target.breakpoint(id)?;
                self.target.set_breakpoint_enabled(&bp, false)?;
            }
            Command::Condition { id, expression } => {
                let bp = self.target.breakpoint(id)?;
                let condition = Condition {
                    expression,
                    ..bp.condition()
                };
                self.target.set_breakpoint_condition(&bp, condition)?;
            }
            Command::Breakpoints => {
                for bp in self.target.breakpoints() {
                    let mut line = format!(
                        "{:<4} {:<8} {} hits:{}",
                        bp.id(),
                        if bp.is_enabled() { "enabled" } else { "disabled" },
                        bp.kind(),
                        bp.hits()
                    );
                    if let Some(cond) = bp.condition().expression {
                        line = format!("{line} if {cond}");
                    }
                    if bp.is_deferred() {
                        line = format!("{line} (pending)");
                    }
                    self.printer.print(line);
                }
            }
            Command::Threads => {
                let current = self.target.current_thread_id();
                for thread in self.target.threads()? {
                    let marker = if thread.id() == current { "*" } else { " " };
                    self.printer.print(format!(
                        "{marker} {} {}",
                        thread.id(),
                        thread.name().unwrap_or_default()
                    ));
                }
            }
            Command::Thread(id) => self.target.set_current_thread(id)?,
            Command::Backtrace => {
                let thread = self.target.current_thread_id();
                let depth = self.target.stack_depth(thread)?;
                for frame in self.target.stack_frames(thread, 0, depth.saturating_sub(1))? {
                    self.printer
                        .print(format!("#{:<3} {}", frame.wire_level(), frame.place));
                }
            }
            Command::Frame(None) => {
                let frame = self.current_frame()?;
                self.printer
                    .print(format!("#{:<3} {}", frame.wire_level(), frame.place));
            }
            Command::Frame(Some(n)) => {
                let thread = self.target.current_thread_id();
                let frame = self
                    .target
                    .stack_frames(thread, n, n)?
                    .into_iter()
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("no frame #{n}"))?;
                self.target.select_frame(&frame, true)?;
                self.printer
                    .print(format!("#{:<3} {}", frame.wire_level(), frame.place));
                self.frame = Some(frame);
            }
            Command::Print(expression) => {
                let frame = self.current_frame()?;
                let value = self
                    .target
                    .evaluate_expression_to_string(&frame, &expression)?;
                self.printer.print(format!("{expression} = {value}"));
            }
            Command::Locals => {
                let frame = self.current_frame()?;
                let locals = self.target.local_variables(&frame)?;
                self.print_variables(locals)?;
            }
            Command::Args => {
                let frame = self.current_frame()?;
                let args = self.target.argument_variables(&frame)?;
                self.print_variables(args)?;
            }
            Command::SetVar { expression, value } => {
                let frame = self.current_frame()?;
                let descriptor = VariableDescriptor::in_frame(&expression, 0, &frame);
                let var = self.target.create_variable(&descriptor)?;
                let result = self.target.set_variable_value(&var, &value);
                weak_error!(self.target.destroy_variable(&var), "destroy variable:");
                result?;
            }
            Command::Examine { expression, length } => self.examine(&expression, length)?,
            Command::Registers(None) => {
                for register in self.target.register_values()? {
                    self.printer
                        .print(format!("{:10} {}", register.name, register.value));
                }
            }
            Command::Registers(Some(name)) => {
                let register = self.target.register_value(&name)?;
                self.printer
                    .print(format!("{:10} {}", register.name, register.value));
            }
            Command::SharedLibs => {
                for lib in self.target.shared_libraries()? {
                    let range = match (lib.from, lib.to) {
                        (Some(from), Some(to)) => format!("{from:#018x} {to:#018x}"),
                        _ => " ".repeat(37),
                    };
                    let syms = if lib.symbols_loaded { "yes" } else { "no" };
                    self.printer.print(format!("{range}  {syms:4} {}", lib.name));
                }
            }
            Command::Signals => {
                self.printer.print(format!(
                    "{:12} {:5} {:5} {:5} {}",
                    "signal", "stop", "print", "pass", "description"
                ));
                for signal in self.target.signals()? {
                    self.printer.print(format!(
                        "{:12} {:5} {:5} {:5} {}",
                        signal.name, signal.stop, signal.print, signal.pass, signal.description
                    ));
                }
            }
            Command::Handle { signal, stop, pass } => {
                let signal = self.target.handle_signal(&signal, stop, pass)?;
                self.printer.print(format!(
                    "{}: stop {}, print {}, pass {}",
                    signal.name, signal.stop, signal.print, signal.pass
                ));
            }
            Command::Disasm { mixed } => {
                let frame = self.current_frame()?;
                let range = match (&frame.place.file, frame.place.line, frame.place.address) {
                    (Some(file), Some(line), _) => DisassemblyRange::Line {
                        file,
                        line,
                        lines: None,
                    },
                    (_, _, Some(start)) => DisassemblyRange::Address {
                        start,
                        end: start.saturating_add(DISASM_WINDOW),
                    },
                    _ => anyhow::bail!("no location for frame #{}", frame.level),
                };
                let current = frame.place.address;
                let print_insn = |insn: &Instruction| {
                    let marker = if Some(insn.address) == current { "=>" } else { "  " };
                    self.printer
                        .print(format!("{marker} {:#018x} {}", insn.address, insn.text));
                };
                if mixed {
                    for line in self.target.mixed_instructions(&range)? {
                        if let (Some(file), Some(line)) = (&line.place.file, line.place.line) {
                            self.printer.print(format!("{file}:{line}").bold().to_string());
                        }
                        line.instructions.iter().for_each(print_insn);
                    }
                } else {
                    self.target
                        .instructions(&range)?
                        .iter()
                        .for_each(print_insn);
                }
            }
            Command::Directory(paths) => {
                let search_path = if paths.is_empty() {
                    self.target.source_paths()?
                } else {
                    self.target.add_source_paths(paths)?
                };
                self.printer
                    .print(format!("source path: {}", search_path.iter().join(":")));
            }
            Command::Detach => self.target.disconnect()?,
            Command::Kill => self.target.terminate()?,
            Command::SkipInput => {}
            Command::Help(command) => {
                self.printer.print(help_for_command(command.as_deref()));
            }
        }

        Ok(())
    }

    fn run(mut self) {
        loop {
            let Ok(action) = self.control_rx.recv() else {
                break;
            };

            match action {
                Control::Cmd(command) => {
                    if let Err(e) = self.handle_command(&command) {
                        self.printer.print(format!("error: {:#}", e));
                        if e
                            .downcast_ref::<crate::debugger::Error>()
                            .is_some_and(|e| e.is_fatal())
                        {
                            break;
                        }
                    }
                }
                Control::Interrupt => {
                    if self.target.state() == ExecState::Running {
                        weak_error!(self.target.suspend(), "interrupt:");
                    }
                }
                Control::Terminate => {
                    break;
                }
            }
        }
    }
}
