//! Breakpoint registry.
//!
//! A client breakpoint owns zero or more wire breakpoint records. A breakpoint
//! without records is deferred, resolution is retried on every stop and library
//! load until the debugger accepts the location.
use crate::debugger::frame::Place;
use crate::debugger::target::Location;
use crate::debugger::{Error, Target};
use crate::mi::{MiCommand, Tuple, Value};
use crate::{muted_error, weak_error};
use itertools::Itertools;
use log::{debug, info};
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use strum_macros::Display;

/// Event types accepted by event breakpoints and the catch keyword for each.
const EVENT_KEYWORDS: &[(&str, &str)] = &[
    ("signal", "signal"),
    ("exception catch", "catch"),
    ("exception throw", "throw"),
    ("exception rethrow", "rethrow"),
    ("exec", "exec"),
    ("fork", "fork"),
    ("vfork", "vfork"),
    ("syscall", "syscall"),
    ("library load", "load"),
    ("library unload", "unload"),
];

/// Catch keyword for an event type.
pub fn event_keyword(event_type: &str) -> Result<&'static str, Error> {
    EVENT_KEYWORDS
        .iter()
        .find(|(ty, _)| *ty == event_type.trim())
        .map(|(_, keyword)| *keyword)
        .ok_or_else(|| Error::UnknownEventType(event_type.to_string()))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum WatchAccess {
    #[default]
    Write,
    Read,
    Access,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watch {
    pub expression: String,
    pub access: WatchAccess,
    pub memory_space: Option<String>,
    /// Number of watched bytes.
    pub range: Option<usize>,
}

impl Watch {
    pub fn new(expression: &str, access: WatchAccess) -> Self {
        Self {
            expression: expression.to_string(),
            access,
            memory_space: None,
            range: None,
        }
    }

    /// Expression handed to the debugger.
    ///
    /// An integer literal is an address and gets dereferenced. A memory space or a
    /// range turns the expression into a cast to a char array.
    pub fn wire_expression(&self) -> String {
        let expr = self.expression.trim();
        let expr = if is_integer_literal(expr) {
            format!("*{expr}")
        } else {
            expr.to_string()
        };

        let space = self
            .memory_space
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        match (space, self.range) {
            (None, None) => expr,
            (Some(space), Some(range)) => format!("(@{space} char[{range}])({expr})"),
            (Some(space), None) => format!("(@{space} char)({expr})"),
            (None, Some(range)) => format!("(char[{range}])({expr})"),
        }
    }
}

fn is_integer_literal(s: &str) -> bool {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakpointKind {
    Line {
        file: String,
        line: u32,
    },
    Function {
        file: Option<String>,
        function: String,
    },
    Address(u64),
    Watch(Watch),
    /// Raw catch keyword (`fork`, `syscall`, ...) with an optional argument.
    Catch {
        keyword: String,
        arg: Option<String>,
    },
    /// Event type mapped to a catch keyword.
    Event {
        event_type: String,
        arg: Option<String>,
    },
    /// C++ exceptions, one wire record per enabled side.
    Exception {
        throw: bool,
        catch: bool,
    },
}

impl BreakpointKind {
    fn location(&self) -> Option<Location> {
        match self {
            BreakpointKind::Line { file, line } => Some(Location::Line {
                file: file.clone(),
                line: *line,
            }),
            BreakpointKind::Function { file, function } => Some(Location::Function {
                file: file.clone(),
                function: function.clone(),
            }),
            BreakpointKind::Address(addr) => Some(Location::Address(*addr)),
            _ => None,
        }
    }

    /// Catch commands (keyword and argument) that create this breakpoint.
    fn catch_commands(&self) -> Result<Vec<(String, Option<String>)>, Error> {
        Ok(match self {
            BreakpointKind::Catch { keyword, arg } => vec![(keyword.clone(), arg.clone())],
            BreakpointKind::Event { event_type, arg } => {
                vec![(event_keyword(event_type)?.to_string(), arg.clone())]
            }
            BreakpointKind::Exception { throw, catch } => {
                let mut commands = vec![];
                if *throw {
                    commands.push(("throw".to_string(), None));
                }
                if *catch {
                    commands.push(("catch".to_string(), None));
                }
                commands
            }
            _ => vec![],
        })
    }

    fn validate(&self) -> Result<(), Error> {
        if let Some(location) = self.location() {
            location.to_wire()?;
        }
        match self {
            BreakpointKind::Watch(watch) if watch.expression.trim().is_empty() => {
                Err(Error::InvalidLocation(String::new()))
            }
            BreakpointKind::Catch { keyword, .. } if keyword.trim().is_empty() => {
                Err(Error::UnknownEventType(keyword.clone()))
            }
            BreakpointKind::Event { event_type, .. } => event_keyword(event_type).map(|_| ()),
            BreakpointKind::Exception {
                throw: false,
                catch: false,
            } => Err(Error::UnknownEventType("exception".to_string())),
            _ => Ok(()),
        }
    }

    /// Kind of a breakpoint created outside of the session.
    fn from_record(record: &BreakpointRecord) -> Self {
        let what = record.what.as_deref().unwrap_or_default();
        match what {
            "exception throw" => {
                return BreakpointKind::Exception {
                    throw: true,
                    catch: false,
                }
            }
            "exception catch" => {
                return BreakpointKind::Exception {
                    throw: false,
                    catch: true,
                }
            }
            _ => {}
        }

        if record.kind.contains("watchpoint") {
            let access = if record.kind.starts_with("read") {
                WatchAccess::Read
            } else if record.kind.starts_with("acc") {
                WatchAccess::Access
            } else {
                WatchAccess::Write
            };
            return BreakpointKind::Watch(Watch::new(what, access));
        }
        if record.kind == "catchpoint" {
            let mut words = what.splitn(2, ' ');
            return BreakpointKind::Catch {
                keyword: words.next().unwrap_or_default().to_string(),
                arg: words.next().map(ToString::to_string),
            };
        }

        match &record.place {
            Place {
                file: Some(file),
                line: Some(line),
                ..
            } => BreakpointKind::Line {
                file: file.clone(),
                line: *line,
            },
            Place {
                function: Some(function),
                ..
            } => BreakpointKind::Function {
                file: None,
                function: function.clone(),
            },
            Place {
                address: Some(addr),
                ..
            } => BreakpointKind::Address(*addr),
            _ => BreakpointKind::Function {
                file: None,
                function: record.original_location.clone().unwrap_or_default(),
            },
        }
    }
}

impl Display for BreakpointKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BreakpointKind::Watch(watch) => {
                write!(f, "{} watch {}", watch.access, watch.wire_expression())
            }
            BreakpointKind::Catch { keyword, arg } => match arg {
                Some(arg) => write!(f, "catch {keyword} {arg}"),
                None => write!(f, "catch {keyword}"),
            },
            BreakpointKind::Event { event_type, .. } => write!(f, "event {event_type}"),
            BreakpointKind::Exception { throw, catch } => {
                let sides = [(*throw, "throw"), (*catch, "catch")]
                    .iter()
                    .filter(|(on, _)| *on)
                    .map(|(_, side)| *side)
                    .join("/");
                write!(f, "exception {sides}")
            }
            _ => match self.location() {
                Some(location) => write!(f, "{location}"),
                None => Ok(()),
            },
        }
    }
}

/// Breakpoint condition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Condition {
    pub ignore_count: u32,
    pub expression: Option<String>,
    /// Stop only in these threads, empty means any thread.
    pub thread_ids: Vec<u32>,
}

impl Condition {
    fn expression(&self) -> Option<&str> {
        self.expression
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }
}

/// A breakpoint as the debugger knows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointRecord {
    pub number: u32,
    /// `breakpoint`, `hw watchpoint`, `catchpoint`...
    pub kind: String,
    pub temporary: bool,
    pub enabled: bool,
    pub place: Place,
    pub condition: Option<String>,
    pub ignore_count: u32,
    pub thread: Option<u32>,
    pub hits: u32,
    pub what: Option<String>,
    pub original_location: Option<String>,
}

impl BreakpointRecord {
    pub fn from_tuple(t: &Tuple) -> Option<Self> {
        Some(Self {
            number: t.get_parsed("number")?,
            kind: t.get_str("type").unwrap_or("breakpoint").to_string(),
            temporary: t.get_str("disp") == Some("del"),
            enabled: t.get_str("enabled") != Some("n"),
            place: Place::from_record(t),
            condition: t.get_str("cond").map(ToString::to_string),
            ignore_count: t.get_parsed("ignore").unwrap_or_default(),
            thread: t.get_parsed("thread"),
            hits: t.get_parsed("times").unwrap_or_default(),
            what: t
                .get_str("what")
                .or_else(|| t.get_str("exp"))
                .map(ToString::to_string),
            original_location: t.get_str("original-location").map(ToString::to_string),
        })
    }

    fn watchpoint(t: &Tuple, kind: &str) -> Option<Self> {
        Some(Self {
            number: t.get_parsed("number")?,
            kind: kind.to_string(),
            temporary: false,
            enabled: true,
            place: Place::default(),
            condition: None,
            ignore_count: 0,
            thread: None,
            hits: 0,
            what: t.get_str("exp").map(ToString::to_string),
            original_location: None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakpointOptions {
    pub temporary: bool,
    pub hardware: bool,
    pub enabled: bool,
}

impl Default for BreakpointOptions {
    fn default() -> Self {
        Self {
            temporary: false,
            hardware: false,
            enabled: true,
        }
    }
}

struct BreakpointState {
    enabled: bool,
    condition: Condition,
    records: Vec<BreakpointRecord>,
}

pub struct Breakpoint {
    id: u32,
    kind: BreakpointKind,
    options: BreakpointOptions,
    state: Mutex<BreakpointState>,
}

impl Breakpoint {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn kind(&self) -> &BreakpointKind {
        &self.kind
    }

    pub fn is_temporary(&self) -> bool {
        self.options.temporary
    }

    pub fn is_hardware(&self) -> bool {
        self.options.hardware
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().unwrap().enabled
    }

    pub fn condition(&self) -> Condition {
        self.state.lock().unwrap().condition.clone()
    }

    pub fn records(&self) -> Vec<BreakpointRecord> {
        self.state.lock().unwrap().records.clone()
    }

    /// A deferred breakpoint has no wire records yet.
    pub fn is_deferred(&self) -> bool {
        self.state.lock().unwrap().records.is_empty()
    }

    pub fn hits(&self) -> u32 {
        self.state.lock().unwrap().records.iter().map(|r| r.hits).sum()
    }

    fn numbers(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .records
            .iter()
            .map(|r| r.number.to_string())
            .collect()
    }

    fn update_record(&self, number: &str, f: impl FnOnce(&mut BreakpointRecord)) {
        let mut state = self.state.lock().unwrap();
        if let Some(record) = state
            .records
            .iter_mut()
            .find(|r| r.number.to_string() == number)
        {
            f(record);
        }
    }

    fn owns(&self, number: u32) -> bool {
        self.state
            .lock()
            .unwrap()
            .records
            .iter()
            .any(|r| r.number == number)
    }
}

pub struct BreakpointRegistry {
    next_id: AtomicU32,
    deferred: bool,
    breakpoints: Mutex<Vec<Arc<Breakpoint>>>,
}

impl BreakpointRegistry {
    pub(crate) fn new(deferred: bool) -> Self {
        Self {
            next_id: AtomicU32::new(1),
            deferred,
            breakpoints: Mutex::default(),
        }
    }

    fn create(
        &self,
        kind: BreakpointKind,
        options: BreakpointOptions,
        condition: Condition,
    ) -> Breakpoint {
        Breakpoint {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            kind,
            options,
            state: Mutex::new(BreakpointState {
                enabled: options.enabled,
                condition,
                records: vec![],
            }),
        }
    }

    fn add(&self, bp: Arc<Breakpoint>) {
        self.breakpoints.lock().unwrap().push(bp);
    }

    fn remove(&self, id: u32) -> Option<Arc<Breakpoint>> {
        let mut breakpoints = self.breakpoints.lock().unwrap();
        let pos = breakpoints.iter().position(|bp| bp.id == id)?;
        Some(breakpoints.remove(pos))
    }

    fn all(&self) -> Vec<Arc<Breakpoint>> {
        self.breakpoints.lock().unwrap().clone()
    }

    fn by_number(&self, number: u32) -> Option<Arc<Breakpoint>> {
        self.breakpoints
            .lock()
            .unwrap()
            .iter()
            .find(|bp| bp.owns(number))
            .cloned()
    }
}

impl Target {
    pub fn breakpoints(&self) -> Vec<Arc<Breakpoint>> {
        self.breakpoints.all()
    }

    pub fn breakpoint(&self, id: u32) -> Result<Arc<Breakpoint>, Error> {
        self.breakpoints
            .all()
            .into_iter()
            .find(|bp| bp.id == id)
            .ok_or(Error::BreakpointNotFound(id))
    }

    /// Client breakpoint owning a wire breakpoint number.
    pub fn breakpoint_by_number(&self, number: u32) -> Option<Arc<Breakpoint>> {
        self.breakpoints.by_number(number)
    }

    /// Create a breakpoint.
    ///
    /// A location the debugger rejects is kept as a deferred breakpoint when
    /// deferred breakpoints are on. Unknown event types are rejected before any
    /// command is posted.
    pub fn set_breakpoint(
        &self,
        kind: BreakpointKind,
        options: BreakpointOptions,
        condition: Condition,
    ) -> Result<Arc<Breakpoint>, Error> {
        self.require(self.configuration().breakpoints, "breakpoints")?;
        kind.validate()?;

        let bp = Arc::new(self.breakpoints.create(kind, options, condition.clone()));
        let deferrable = self.breakpoints.deferred && bp.kind.location().is_some();

        match self.insert_records(&bp, &condition, options.enabled) {
            Ok(records) if !records.is_empty() => {
                bp.state.lock().unwrap().records = records;
            }
            Ok(_) if deferrable => {
                info!(target: "debugger", "breakpoint {} at {} deferred", bp.id, bp.kind);
            }
            Ok(_) => return Err(Error::MalformedReply(format!("no record for {}", bp.kind))),
            Err(e) if deferrable && !e.is_fatal() => {
                info!(target: "debugger", "breakpoint {} at {} deferred: {e}", bp.id, bp.kind);
            }
            Err(e) => return Err(e),
        }

        self.breakpoints.add(bp.clone());
        Ok(bp)
    }

    fn insert_records(
        &self,
        bp: &Breakpoint,
        condition: &Condition,
        enabled: bool,
    ) -> Result<Vec<BreakpointRecord>, Error> {
        if let Some(location) = bp.kind.location() {
            return self.insert_location(bp, &location.to_wire()?, condition, enabled);
        }

        if !condition.thread_ids.is_empty() {
            return Err(Error::Unsupported("thread filter on watchpoints and catchpoints"));
        }
        let records = match &bp.kind {
            BreakpointKind::Watch(watch) => vec![self.insert_watch(watch)?],
            _ => self.insert_catch(bp)?,
        };

        let numbers: Vec<String> = records.iter().map(|r| r.number.to_string()).collect();
        if let Err(e) = self.apply_settings(&numbers, condition, enabled) {
            weak_error!(self.delete_numbers(&numbers), "rollback breakpoint:");
            return Err(e);
        }
        Ok(records)
    }

    /// One wire breakpoint per filtered thread, or a single one for any thread.
    fn insert_location(
        &self,
        bp: &Breakpoint,
        location: &str,
        condition: &Condition,
        enabled: bool,
    ) -> Result<Vec<BreakpointRecord>, Error> {
        let threads: Vec<Option<u32>> = if condition.thread_ids.is_empty() {
            vec![None]
        } else {
            condition.thread_ids.iter().copied().map(Some).collect()
        };

        let mut records = vec![];
        for thread in threads {
            let mut cmd = MiCommand::new("break-insert")
                .option_if(bp.options.temporary, "-t")
                .option_if(bp.options.hardware, "-h")
                .option_if(!enabled, "-d");
            if let Some(expression) = condition.expression() {
                cmd = cmd.option("-c").option(expression);
            }
            if condition.ignore_count > 0 {
                cmd = cmd.option("-i").option(condition.ignore_count.to_string());
            }
            if let Some(thread) = thread {
                cmd = cmd.option("-p").option(thread.to_string());
            }

            let result = self.exec(&cmd.param(location)).and_then(|reply| {
                reply
                    .results
                    .get_tuple("bkpt")
                    .and_then(BreakpointRecord::from_tuple)
                    .ok_or(Error::MissingField("bkpt"))
            });
            match result {
                Ok(record) => records.push(record),
                Err(e) => {
                    let numbers: Vec<String> =
                        records.iter().map(|r| r.number.to_string()).collect();
                    weak_error!(self.delete_numbers(&numbers), "rollback breakpoint:");
                    return Err(e);
                }
            }
        }
        Ok(records)
    }

    fn insert_watch(&self, watch: &Watch) -> Result<BreakpointRecord, Error> {
        let cmd = MiCommand::new("break-watch")
            .option_if(watch.access == WatchAccess::Read, "-r")
            .option_if(watch.access == WatchAccess::Access, "-a")
            .param(watch.wire_expression());
        let reply = self.exec(&cmd)?;

        [
            ("wpt", "hw watchpoint"),
            ("hw-rwpt", "read watchpoint"),
            ("hw-awpt", "acc watchpoint"),
        ]
        .iter()
        .find_map(|(key, kind)| {
            reply
                .results
                .get_tuple(key)
                .and_then(|t| BreakpointRecord::watchpoint(t, kind))
        })
        .ok_or(Error::MissingField("wpt"))
    }

    /// Catch commands have no structured reply, new records are found by diffing
    /// the breakpoint table.
    fn insert_catch(&self, bp: &Breakpoint) -> Result<Vec<BreakpointRecord>, Error> {
        let command = if bp.options.temporary { "tcatch" } else { "catch" };
        let mut records = vec![];
        for (keyword, arg) in bp.kind.catch_commands()? {
            let known: Vec<u32> = self.break_list()?.iter().map(|r| r.number).collect();
            let line = match arg {
                Some(arg) => format!("{command} {keyword} {arg}"),
                None => format!("{command} {keyword}"),
            };
            self.exec(&MiCommand::cli(line))?;
            records.extend(
                self.break_list()?
                    .into_iter()
                    .filter(|r| !known.contains(&r.number)),
            );
        }
        Ok(records)
    }

    fn apply_settings(
        &self,
        numbers: &[String],
        condition: &Condition,
        enabled: bool,
    ) -> Result<(), Error> {
        for number in numbers {
            if let Some(expression) = condition.expression() {
                self.exec(
                    &MiCommand::new("break-condition")
                        .param(number.as_str())
                        .param(expression),
                )?;
            }
            if condition.ignore_count > 0 {
                self.exec(
                    &MiCommand::new("break-after")
                        .param(number.as_str())
                        .param(condition.ignore_count.to_string()),
                )?;
            }
        }
        if !enabled && !numbers.is_empty() {
            self.exec(&MiCommand::new("break-disable").params(numbers))?;
        }
        Ok(())
    }

    fn delete_numbers(&self, numbers: &[String]) -> Result<(), Error> {
        if numbers.is_empty() {
            return Ok(());
        }
        self.exec(&MiCommand::new("break-delete").params(numbers))?;
        Ok(())
    }

    /// Wire breakpoint table.
    pub fn break_list(&self) -> Result<Vec<BreakpointRecord>, Error> {
        let reply = self.exec(&MiCommand::new("break-list"))?;
        let table = reply
            .results
            .get_tuple("BreakpointTable")
            .ok_or(Error::MissingField("BreakpointTable"))?;
        Ok(table
            .get_items("body")
            .into_iter()
            .filter_map(Value::as_tuple)
            .filter_map(BreakpointRecord::from_tuple)
            .collect())
    }

    /// Enable or disable a breakpoint. The debugger is updated first, the local
    /// state changes only if it accepts.
    pub fn set_breakpoint_enabled(&self, bp: &Breakpoint, enabled: bool) -> Result<(), Error> {
        let numbers = bp.numbers();
        if !numbers.is_empty() {
            let operation = if enabled { "break-enable" } else { "break-disable" };
            self.exec(&MiCommand::new(operation).params(&numbers))?;
        }

        let mut state = bp.state.lock().unwrap();
        state.enabled = enabled;
        state.records.iter_mut().for_each(|r| r.enabled = enabled);
        Ok(())
    }

    /// Change the condition of a breakpoint, debugger first.
    ///
    /// A new thread filter can't be applied in place: the breakpoint is inserted
    /// again with the new condition and the old records are deleted.
    pub fn set_breakpoint_condition(
        &self,
        bp: &Breakpoint,
        condition: Condition,
    ) -> Result<(), Error> {
        let (current, enabled, deferred) = {
            let state = bp.state.lock().unwrap();
            (state.condition.clone(), state.enabled, state.records.is_empty())
        };

        if !deferred {
            if current.thread_ids != condition.thread_ids {
                let records = self.insert_records(bp, &condition, enabled)?;
                weak_error!(self.delete_numbers(&bp.numbers()), "delete old records:");
                let mut state = bp.state.lock().unwrap();
                state.records = records;
                state.condition = condition;
                return Ok(());
            }

            // a record changes locally right after its own wire update
            let expression = condition.expression().map(ToString::to_string);
            for number in bp.numbers() {
                let mut cmd = MiCommand::new("break-condition").param(number.as_str());
                if let Some(expression) = expression.as_deref() {
                    cmd = cmd.param(expression);
                }
                self.exec(&cmd)?;
                bp.update_record(&number, |r| r.condition = expression.clone());

                self.exec(
                    &MiCommand::new("break-after")
                        .param(number.as_str())
                        .param(condition.ignore_count.to_string()),
                )?;
                bp.update_record(&number, |r| r.ignore_count = condition.ignore_count);
            }
        }

        let mut state = bp.state.lock().unwrap();
        for record in state.records.iter_mut() {
            record.condition = condition.expression().map(ToString::to_string);
            record.ignore_count = condition.ignore_count;
        }
        state.condition = condition;
        Ok(())
    }

    pub fn delete_breakpoint(&self, bp: &Breakpoint) -> Result<(), Error> {
        self.delete_numbers(&bp.numbers())?;
        self.breakpoints.remove(bp.id);
        Ok(())
    }

    pub fn delete_all_breakpoints(&self) -> Result<(), Error> {
        for bp in self.breakpoints.all() {
            self.delete_breakpoint(&bp)?;
        }
        Ok(())
    }

    /// Reconcile breakpoints with the wire breakpoint table. Records created outside
    /// of the session become new breakpoints.
    pub fn refresh_breakpoints(&self) -> Result<(), Error> {
        let table = self.break_list()?;

        for bp in self.breakpoints.all() {
            let gone = {
                let mut state = bp.state.lock().unwrap();
                if state.records.is_empty() {
                    continue;
                }
                state.records = state
                    .records
                    .iter()
                    .filter_map(|r| table.iter().find(|t| t.number == r.number).cloned())
                    .collect();
                state.records.is_empty()
            };
            if gone {
                debug!(target: "debugger", "breakpoint {} removed by debugger", bp.id);
                self.breakpoints.remove(bp.id);
            }
        }

        for record in table {
            if self.breakpoints.by_number(record.number).is_some() {
                continue;
            }
            self.adopt(record);
        }
        Ok(())
    }

    fn adopt(&self, record: BreakpointRecord) -> Arc<Breakpoint> {
        let condition = Condition {
            ignore_count: record.ignore_count,
            expression: record.condition.clone(),
            thread_ids: record.thread.into_iter().collect(),
        };
        let options = BreakpointOptions {
            temporary: record.temporary,
            hardware: record.kind.starts_with("hw"),
            enabled: record.enabled,
        };
        let bp = Arc::new(self.breakpoints.create(
            BreakpointKind::from_record(&record),
            options,
            condition,
        ));
        debug!(target: "debugger", "adopt wire breakpoint {} as {}", record.number, bp.id);
        bp.state.lock().unwrap().records.push(record);
        self.breakpoints.add(bp.clone());
        bp
    }

    pub(super) fn on_breakpoint_modified(&self, tuple: &Tuple) {
        let Some(record) = BreakpointRecord::from_tuple(tuple) else {
            return;
        };
        if let Some(bp) = self.breakpoints.by_number(record.number) {
            let mut state = bp.state.lock().unwrap();
            if let Some(r) = state.records.iter_mut().find(|r| r.number == record.number) {
                *r = record;
            }
        }
    }

    pub(super) fn on_breakpoint_deleted(&self, number: u32) {
        let Some(bp) = self.breakpoints.by_number(number) else {
            return;
        };
        let gone = {
            let mut state = bp.state.lock().unwrap();
            state.records.retain(|r| r.number != number);
            state.records.is_empty()
        };
        if gone {
            self.breakpoints.remove(bp.id);
        }
    }

    /// Temporary breakpoints are gone after the first hit.
    pub(super) fn on_breakpoint_hit(&self, bp: &Breakpoint) {
        if bp.options.temporary {
            self.breakpoints.remove(bp.id);
        }
    }

    /// Try to insert deferred breakpoints again.
    pub(super) fn resolve_deferred(&self) {
        for bp in self.breakpoints.all() {
            if !bp.is_deferred() {
                continue;
            }
            let (condition, enabled) = {
                let state = bp.state.lock().unwrap();
                (state.condition.clone(), state.enabled)
            };
            let records = {
                let _quiet = self.channel.quiet();
                muted_error!(self.insert_records(&bp, &condition, enabled))
            };
            if let Some(records) = records.filter(|r| !r.is_empty()) {
                info!(target: "debugger", "deferred breakpoint {} at {} resolved", bp.id, bp.kind);
                bp.state.lock().unwrap().records = records;
            }
        }
    }
}
