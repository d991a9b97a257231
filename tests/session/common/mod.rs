use migdb::config::{AutoUpdate, Config};
use migdb::debugger::{EventHook, Place, Session, StopInfo, TargetKind, ValueChanged};
use migdb::mi::StreamKind;
use std::io::{BufRead, BufReader, Write};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Plays the debugger side of a session. Every command line is recorded without its
/// token and answered by a responder. Reply lines starting with `^` get the token of
/// the command prepended, other lines are written as is.
pub struct MockGdb {
    commands: Arc<Mutex<Vec<String>>>,
    output: Arc<Mutex<os_pipe::PipeWriter>>,
}

impl MockGdb {
    /// Write an unsolicited record (async event or stream output).
    pub fn emit(&self, line: &str) {
        let mut output = self.output.lock().unwrap();
        writeln!(output, "{line}").unwrap();
        writeln!(output, "(gdb) ").unwrap();
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.commands.lock().unwrap().clear();
    }

    pub fn count(&self, command: &str) -> usize {
        self.commands().iter().filter(|c| *c == command).count()
    }
}

pub fn done(results: &str) -> Vec<String> {
    if results.is_empty() {
        vec!["^done".to_string()]
    } else {
        vec![format!("^done,{results}")]
    }
}

pub fn error(msg: &str) -> Vec<String> {
    vec![format!("^error,msg=\"{msg}\"")]
}

pub fn running() -> Vec<String> {
    vec!["^running".to_string()]
}

/// Session over a mock debugger.
pub fn session<F>(kind: TargetKind, config: Config, responder: F) -> (Session, MockGdb, Arc<RecordingHook>)
where
    F: Fn(&str) -> Vec<String> + Send + 'static,
{
    let (out_reader, out_writer) = os_pipe::pipe().unwrap();
    let (in_reader, in_writer) = os_pipe::pipe().unwrap();

    let commands = Arc::new(Mutex::new(vec![]));
    let output = Arc::new(Mutex::new(out_writer));

    let gdb_commands = commands.clone();
    let gdb_output = output.clone();
    thread::spawn(move || {
        for line in BufReader::new(in_reader).lines() {
            let Ok(line) = line else { break };
            let digits = line.chars().take_while(char::is_ascii_digit).count();
            let (token, command) = line.split_at(digits);
            gdb_commands.lock().unwrap().push(command.to_string());

            let reply = responder(command);
            let mut out = gdb_output.lock().unwrap();
            for reply_line in reply {
                if reply_line.starts_with('^') {
                    writeln!(out, "{token}{reply_line}").unwrap();
                } else {
                    writeln!(out, "{reply_line}").unwrap();
                }
            }
            writeln!(out, "(gdb) ").unwrap();
        }
    });

    let hook = Arc::new(RecordingHook::default());
    let session = Session::from_streams(out_reader, in_writer, kind, &config, hook.clone());
    (session, MockGdb { commands, output }, hook)
}

/// Config with a short timeout and every autoupdate off, so a stop produces only
/// the roster query.
pub fn config() -> Config {
    Config {
        command_timeout_ms: 2_000,
        autoupdate: AutoUpdate {
            registers: false,
            expressions: false,
            variables: false,
            memory: false,
        },
        ..Config::default()
    }
}

pub fn thread_info(threads: &[(u32, &str)], current: u32) -> Vec<String> {
    let list = threads
        .iter()
        .map(|(id, name)| format!(r#"{{id="{id}",target-id="LWP {id}",name="{name}",state="stopped"}}"#))
        .collect::<Vec<_>>()
        .join(",");
    done(&format!(r#"threads=[{list}],current-thread-id="{current}""#))
}

pub const SIGINT_STOP: &str = r#"*stopped,reason="signal-received",signal-name="SIGINT",signal-meaning="Interrupt",frame={addr="0x0000000000401136",func="main",args=[],file="main.c",fullname="/src/main.c",line="7"},thread-id="1",stopped-threads="all""#;

#[derive(Debug, Clone, PartialEq)]
pub enum HookEvent {
    ThreadCreated(u32),
    ThreadExited(u32),
    Breakpoint(u32, Option<Place>),
    Suspended(StopInfo),
    Resumed(Option<u32>),
    ValueChanged(ValueChanged),
    Exit(Option<i32>),
    Detached,
    Output(StreamKind, String),
}

#[derive(Default)]
pub struct RecordingHook {
    events: Mutex<Vec<HookEvent>>,
    changed: Condvar,
}

impl RecordingHook {
    fn record(&self, event: HookEvent) {
        self.events.lock().unwrap().push(event);
        self.changed.notify_all();
    }

    pub fn events(&self) -> Vec<HookEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Block until recorded events satisfy a predicate, panic after a timeout.
    pub fn wait_for(&self, predicate: impl Fn(&[HookEvent]) -> bool) -> Vec<HookEvent> {
        let deadline = Instant::now() + WAIT_TIMEOUT;
        let mut events = self.events.lock().unwrap();
        while !predicate(&events) {
            let now = Instant::now();
            if now >= deadline {
                panic!("hook events not reached, got: {:?}", *events);
            }
            events = self.changed.wait_timeout(events, deadline - now).unwrap().0;
        }
        events.clone()
    }

    pub fn wait_suspended(&self, count: usize) -> Vec<HookEvent> {
        self.wait_for(|events| {
            events
                .iter()
                .filter(|e| matches!(e, HookEvent::Suspended(_)))
                .count()
                >= count
        })
    }
}

impl EventHook for RecordingHook {
    fn on_thread_created(&self, id: u32) {
        self.record(HookEvent::ThreadCreated(id));
    }

    fn on_thread_exited(&self, id: u32) {
        self.record(HookEvent::ThreadExited(id));
    }

    fn on_breakpoint(&self, id: u32, place: Option<&Place>) {
        self.record(HookEvent::Breakpoint(id, place.cloned()));
    }

    fn on_suspended(&self, stop: &StopInfo) {
        self.record(HookEvent::Suspended(stop.clone()));
    }

    fn on_resumed(&self, thread: Option<u32>) {
        self.record(HookEvent::Resumed(thread));
    }

    fn on_value_changed(&self, change: &ValueChanged) {
        self.record(HookEvent::ValueChanged(change.clone()));
    }

    fn on_exit(&self, code: Option<i32>) {
        self.record(HookEvent::Exit(code));
    }

    fn on_detached(&self) {
        self.record(HookEvent::Detached);
    }

    fn on_output(&self, kind: StreamKind, text: &str) {
        self.record(HookEvent::Output(kind, text.to_string()));
    }
}

/// Poll a condition that changes on the event dispatcher thread.
pub fn wait_until(condition: impl Fn() -> bool) {
    let deadline = Instant::now() + WAIT_TIMEOUT;
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached");
        thread::sleep(Duration::from_millis(10));
    }
}
