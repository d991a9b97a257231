//! Token-correlated command channel.
//!
//! A single reader thread consumes the debugger output. Result records are routed
//! to the caller that posted the command with the same token, everything else is
//! turned into [`MiEvent`]s and handed to a dispatcher thread which calls the
//! subscribed listeners in wire order. Listeners therefore may post commands
//! themselves without blocking the reader.
use crate::debugger::Error;
use crate::mi::command::MiCommand;
use crate::mi::event::MiEvent;
use crate::mi::output::{Record, ResultClass, StreamKind, Tuple};
use crate::mi_trace;
use indexmap::IndexMap;
use log::{debug, warn};
use std::io::{BufRead, BufReader, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender, SyncSender};
use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use std::time::Duration;

/// Receiver of unsolicited protocol events.
pub trait Listener: Send + Sync {
    fn on_event(&self, event: &MiEvent);
}

impl<F: Fn(&MiEvent) + Send + Sync> Listener for F {
    fn on_event(&self, event: &MiEvent) {
        self(event)
    }
}

/// Successful answer to a posted command.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub token: u64,
    pub class: ResultClass,
    pub results: Tuple,
    /// Console stream text printed while the command was in flight.
    pub console: Vec<String>,
    /// Log stream text printed while the command was in flight.
    pub log: Vec<String>,
}

impl Reply {
    /// Whole console output as a single string.
    pub fn console_text(&self) -> String {
        self.console.concat()
    }

    pub fn field(&self, name: &'static str) -> Result<&str, Error> {
        self.results.get_str(name).ok_or(Error::MissingField(name))
    }
}

struct InFlight {
    command: String,
    tx: SyncSender<Result<Reply, Error>>,
    console: Vec<String>,
    log: Vec<String>,
}

#[derive(Default)]
struct Shared {
    /// In-flight commands in issue order.
    pending: Mutex<IndexMap<u64, InFlight>>,
    listeners: RwLock<Vec<Arc<dyn Listener>>>,
    suppress_console: AtomicBool,
    closed: AtomicBool,
}

impl Shared {
    fn accept(&self, record: Record, events: &Sender<MiEvent>) {
        match record {
            Record::Result {
                token: Some(token),
                class,
                results,
            } => {
                let in_flight = self.pending.lock().unwrap().shift_remove(&token);
                match in_flight {
                    Some(cmd) => {
                        let reply = Reply {
                            token,
                            class,
                            results,
                            console: cmd.console,
                            log: cmd.log,
                        };
                        let _ = cmd.tx.send(Ok(reply));
                    }
                    None => {
                        debug!(target: "mi", "drop reply for unknown or expired token {token}")
                    }
                }
            }
            Record::Result { token: None, .. } => {
                warn!(target: "mi", "result record without token ignored")
            }
            Record::Async {
                kind,
                class,
                results,
                ..
            } => {
                let _ = events.send(MiEvent::from_async(kind, class, results));
            }
            Record::Stream { kind, text } => {
                let attached = {
                    let mut pending = self.pending.lock().unwrap();
                    match pending.first_mut() {
                        Some((_, cmd)) => {
                            match kind {
                                StreamKind::Console => cmd.console.push(text.clone()),
                                StreamKind::Log => cmd.log.push(text.clone()),
                                StreamKind::Target => {}
                            }
                            true
                        }
                        None => false,
                    }
                };

                let muted = attached
                    && kind == StreamKind::Console
                    && self.suppress_console.load(Ordering::SeqCst);
                if !muted {
                    let _ = events.send(MiEvent::Output(kind, text));
                }
            }
            Record::Prompt => {}
        }
    }

    fn reject(&self, line: &str, err: Error, events: &Sender<MiEvent>) {
        // a token followed by `^` still identifies the waiter
        let digits = line.chars().take_while(char::is_ascii_digit).count();
        if digits > 0 && line[digits..].starts_with('^') {
            if let Ok(token) = line[..digits].parse::<u64>() {
                if let Some(cmd) = self.pending.lock().unwrap().shift_remove(&token) {
                    let _ = cmd.tx.send(Err(err));
                    return;
                }
            }
        }

        // inferior output sharing the debugger terminal
        debug!(target: "mi", "not a record: {err}");
        let _ = events.send(MiEvent::Output(StreamKind::Target, line.to_string()));
    }

    fn forget(&self, token: u64) {
        self.pending.lock().unwrap().shift_remove(&token);
    }

    fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        // dropping senders wakes up every waiter with a disconnect
        self.pending.lock().unwrap().clear();
    }

    fn dispatch(&self, event: &MiEvent) {
        let listeners = self.listeners.read().unwrap().clone();
        for listener in listeners {
            listener.on_event(event);
        }
    }
}

/// Restores console visibility on drop, see [`CommandChannel::quiet`].
pub struct QuietGuard<'a> {
    channel: &'a CommandChannel,
    previous: bool,
}

impl Drop for QuietGuard<'_> {
    fn drop(&mut self) {
        self.channel.set_console_suppressed(self.previous);
    }
}

pub struct CommandChannel {
    writer: Mutex<Box<dyn Write + Send>>,
    next_token: AtomicU64,
    timeout: Duration,
    shared: Arc<Shared>,
}

impl CommandChannel {
    /// Create a channel over a debugger output stream (`reader`) and its command
    /// input (`writer`). Spawns the reader and the event dispatcher threads.
    pub fn new<R, W>(reader: R, writer: W, timeout: Duration) -> Self
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let shared = Arc::new(Shared::default());
        let (events_tx, events_rx) = mpsc::channel::<MiEvent>();

        let reader_shared = shared.clone();
        thread::spawn(move || {
            read_loop(BufReader::new(reader), &reader_shared, events_tx);
        });

        let dispatch_shared = shared.clone();
        thread::spawn(move || {
            for event in events_rx {
                dispatch_shared.dispatch(&event);
            }
        });

        Self {
            writer: Mutex::new(Box::new(writer)),
            next_token: AtomicU64::new(1),
            timeout,
            shared,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self, listener: Arc<dyn Listener>) {
        self.shared.listeners.write().unwrap().push(listener);
    }

    /// Set console suppression flag, return previous value.
    pub fn set_console_suppressed(&self, suppressed: bool) -> bool {
        self.shared
            .suppress_console
            .swap(suppressed, Ordering::SeqCst)
    }

    /// Hide console output of commands posted until the guard is dropped.
    pub fn quiet(&self) -> QuietGuard<'_> {
        QuietGuard {
            channel: self,
            previous: self.set_console_suppressed(true),
        }
    }

    /// Post a command and block until its reply, the timeout or channel teardown.
    ///
    /// An `^error` reply is returned as [`Error::Protocol`]. Tokens are never reused,
    /// a reply arriving after the timeout is dropped.
    pub fn post(&self, command: &MiCommand) -> Result<Reply, Error> {
        if self.is_closed() {
            return Err(Error::ChannelClosed);
        }

        let token = self.next_token.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::sync_channel(1);
        self.shared.pending.lock().unwrap().insert(
            token,
            InFlight {
                command: command.to_string(),
                tx,
                console: vec![],
                log: vec![],
            },
        );

        let line = command.encode(token);
        mi_trace!("-> {line}");
        let written = {
            let mut writer = self.writer.lock().unwrap();
            writeln!(writer, "{line}").and_then(|_| writer.flush())
        };
        if let Err(e) = written {
            self.shared.forget(token);
            return Err(e.into());
        }

        match rx.recv_timeout(self.timeout) {
            Ok(Ok(reply)) if reply.class == ResultClass::Error => Err(Error::Protocol {
                command: command.to_string(),
                message: reply.results.get_str("msg").unwrap_or_default().to_string(),
            }),
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                self.shared.forget(token);
                Err(Error::ProtocolTimeout(command.to_string(), self.timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(Error::ChannelClosed),
        }
    }

    /// Commands posted but not answered yet.
    pub fn in_flight(&self) -> Vec<String> {
        self.shared
            .pending
            .lock()
            .unwrap()
            .values()
            .map(|cmd| cmd.command.clone())
            .collect()
    }
}

fn read_loop(reader: impl BufRead, shared: &Shared, events: Sender<MiEvent>) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(target: "mi", "read debugger output: {e}");
                break;
            }
        };
        mi_trace!("<- {line}");
        if line.trim().is_empty() {
            continue;
        }

        match Record::parse(&line) {
            Ok(record) => shared.accept(record, &events),
            Err(e) => shared.reject(&line, e, &events),
        }
    }

    debug!(target: "mi", "debugger output closed");
    shared.shutdown();
    let _ = events.send(MiEvent::Closed);
}
