use crate::console::print::ExternalPrinter;
use crate::debugger::{EventHook, Place, StopInfo, ValueChanged};
use crate::mi::StreamKind;
use crossterm::style::Stylize;

/// Prints session notifications above the prompt.
pub struct TerminalHook {
    printer: ExternalPrinter,
}

impl TerminalHook {
    pub fn new(printer: ExternalPrinter) -> Self {
        Self { printer }
    }

    fn print_place(&self, place: Option<&Place>) {
        match place {
            Some(place) => self.printer.print(place.to_string().trim_start().to_string()),
            None => self.printer.print("undefined place"),
        }
    }
}

impl EventHook for TerminalHook {
    fn on_thread_created(&self, id: u32) {
        self.printer.print(format!("[new thread {id}]"));
    }

    fn on_thread_exited(&self, id: u32) {
        self.printer.print(format!("[thread {id} exited]"));
    }

    fn on_breakpoint(&self, id: u32, _: Option<&Place>) {
        self.printer
            .print(format!("Hit breakpoint {}", id.to_string().bold()));
    }

    fn on_suspended(&self, stop: &StopInfo) {
        if let Some(signal) = &stop.signal {
            self.printer
                .print(format!("Receive signal {}, debugee stopped", signal.clone().red()));
        }
        if let Some(thread) = stop.thread {
            self.printer.print(format!(
                "thread {} stopped: {}",
                thread,
                stop.reason.as_deref().unwrap_or("unknown reason")
            ));
        }
        self.print_place(stop.place.as_ref());
    }

    fn on_resumed(&self, _: Option<u32>) {}

    fn on_value_changed(&self, change: &ValueChanged) {
        let msg = match change {
            ValueChanged::Variable {
                expression, value, ..
            } => format!("{expression} = {value}"),
            ValueChanged::Expression { id, value } => format!("${id} = {value}"),
            ValueChanged::Register { name, value } => format!("${name} = {value}"),
            ValueChanged::Memory { start, addresses } => {
                format!("memory at {start:#x}: {} bytes changed", addresses.len())
            }
        };
        self.printer.print(msg.dark_grey().to_string());
    }

    fn on_exit(&self, code: Option<i32>) {
        match code {
            Some(code) => self.printer.print(format!("Program exit with code: {code}")),
            None => self.printer.print("Program terminated"),
        }
    }

    fn on_detached(&self) {
        self.printer.print("Detached from process");
    }

    fn on_output(&self, kind: StreamKind, text: &str) {
        let text = text.trim_end_matches('\n');
        match kind {
            StreamKind::Target | StreamKind::Console => self.printer.print(text),
            StreamKind::Log => log::debug!(target: "debugger", "gdb: {text}"),
        }
    }
}
