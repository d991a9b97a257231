use rustyline::history::History;
use rustyline::{Editor, ExternalPrinter as RLExternalPrinter, Helper};
use std::sync::Mutex;

/// [`ExternalPrinter`] safe print messages to stdout while a prompt is active.
///
/// Without a terminal (output redirected, tests) messages go straight to stdout.
pub struct ExternalPrinter {
    printer: Option<Mutex<Box<dyn RLExternalPrinter>>>,
}

// the inner printer is only reached through the mutex
unsafe impl Send for ExternalPrinter {}
unsafe impl Sync for ExternalPrinter {}

impl ExternalPrinter {
    pub fn new<H: Helper, I: History>(editor: &mut Editor<H, I>) -> Self {
        let printer = match editor.create_external_printer() {
            Ok(printer) => Some(Mutex::new(Box::new(printer) as Box<dyn RLExternalPrinter>)),
            Err(e) => {
                log::debug!(target: "debugger", "external printer unavailable: {e}");
                None
            }
        };
        Self { printer }
    }

    pub fn print(&self, msg: impl Into<String>) {
        let msg = msg.into();
        match &self.printer {
            None => {
                println!("{msg}")
            }
            Some(printer) => {
                if let Err(e) = printer.lock().unwrap().print(msg.clone()) {
                    log::debug!(target: "debugger", "external printer: {e}");
                    println!("{msg}")
                }
            }
        }
    }
}
