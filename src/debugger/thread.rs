use crate::debugger::frame::StackFrame;
use crate::debugger::{Error, Target};
use crate::mi::{MiCommand, Reply, Value};
use crate::weak_error;
use log::{debug, warn};
use once_cell::sync;
use regex::Regex;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct StackCache {
    /// Innermost frames first.
    frames: Vec<StackFrame>,
    depth: Option<u32>,
    /// Wire level of the frame selected in the debugger.
    selected: u32,
}

impl StackCache {
    /// Frames at positions `low..=high` (0 is the innermost), `None` if not cached.
    fn slice(&self, low: u32, high: u32) -> Option<Vec<StackFrame>> {
        let depth = self.depth?;
        if depth == 0 {
            return Some(vec![]);
        }
        let high = high.min(depth - 1);
        if high as usize >= self.frames.len() {
            return None;
        }
        Some(
            self.frames
                .get(low as usize..=high as usize)
                .map(<[_]>::to_vec)
                .unwrap_or_default(),
        )
    }
}

/// A thread of the debug target. Handles for the same id are the same object
/// across stops, only the cached stack is dropped.
pub struct ThreadHandle {
    id: u32,
    name: Mutex<Option<String>>,
    stack: Mutex<StackCache>,
}

impl ThreadHandle {
    fn new(id: u32, name: Option<String>) -> Self {
        Self {
            id,
            name: Mutex::new(name),
            stack: Mutex::default(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> Option<String> {
        self.name.lock().unwrap().clone()
    }

    /// Stack depth if already known for the current stop.
    pub fn cached_depth(&self) -> Option<u32> {
        self.stack.lock().unwrap().depth
    }

    /// Stack frames fetched during the current stop.
    pub fn cached_frames(&self) -> Vec<StackFrame> {
        self.stack.lock().unwrap().frames.clone()
    }

    fn selected(&self) -> u32 {
        self.stack.lock().unwrap().selected
    }

    fn set_selected(&self, wire_level: u32) {
        self.stack.lock().unwrap().selected = wire_level;
    }

    fn invalidate(&self) {
        *self.stack.lock().unwrap() = StackCache::default();
    }
}

#[derive(Debug, Default, PartialEq)]
pub(super) struct RosterDiff {
    pub created: Vec<u32>,
    pub exited: Vec<u32>,
}

/// Thread roster of a target and the id of the current thread.
///
/// Thread 0 is a placeholder used when the debugger reports no threads.
#[derive(Default)]
pub struct ThreadCache {
    roster: Vec<Arc<ThreadHandle>>,
    current: u32,
}

impl ThreadCache {
    pub fn threads(&self) -> &[Arc<ThreadHandle>] {
        &self.roster
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn find(&self, id: u32) -> Option<Arc<ThreadHandle>> {
        self.roster.iter().find(|t| t.id == id).cloned()
    }

    /// Replace the roster with a snapshot, keeping handles of surviving threads.
    pub(super) fn reconcile(
        &mut self,
        mut snapshot: Vec<(u32, Option<String>)>,
        current: Option<u32>,
    ) -> RosterDiff {
        if snapshot.is_empty() {
            snapshot.push((0, None));
        }

        let old = std::mem::take(&mut self.roster);
        let mut diff = RosterDiff::default();
        for (id, name) in snapshot {
            match old.iter().find(|t| t.id == id) {
                Some(thread) => {
                    thread.invalidate();
                    if name.is_some() {
                        *thread.name.lock().unwrap() = name;
                    }
                    self.roster.push(thread.clone());
                }
                None => {
                    if id != 0 {
                        diff.created.push(id);
                    }
                    self.roster.push(Arc::new(ThreadHandle::new(id, name)));
                }
            }
        }
        diff.exited = old
            .iter()
            .filter(|t| t.id != 0 && !self.roster.iter().any(|n| n.id == t.id))
            .map(|t| t.id)
            .collect();

        if let Some(current) = current {
            self.current = current;
        }
        if self.current == 0 || self.find(self.current).is_none() {
            self.current = self.roster[0].id;
        }
        diff
    }

    fn remove(&mut self, id: u32) {
        self.roster.retain(|t| t.id != id);
        if self.current == id {
            self.current = 0;
        }
    }

    pub(super) fn invalidate_frames(&self) {
        self.roster.iter().for_each(|t| t.invalidate());
    }

    pub(super) fn clear(&mut self) {
        self.roster.clear();
        self.current = 0;
    }
}

type RosterSnapshot = (Vec<(u32, Option<String>)>, Option<u32>);

/// Parse CLI `info threads` output, return roster and current thread.
fn parse_info_threads(text: &str) -> RosterSnapshot {
    static THREAD_RE: sync::Lazy<Regex> = sync::Lazy::new(|| {
        Regex::new(r#"^(\*)?\s*(\d+)\s+[^"\n]*(?:"([^"]*)")?"#).expect("must compile")
    });

    let mut threads = vec![];
    let mut current = None;
    for line in text.lines() {
        let Some(caps) = THREAD_RE.captures(line.trim_start()) else {
            continue;
        };
        let Some(id) = caps.get(2).and_then(|m| m.as_str().parse().ok()) else {
            continue;
        };
        if caps.get(1).is_some() {
            current = Some(id);
        }
        threads.push((id, caps.get(3).map(|m| m.as_str().to_string())));
    }
    (threads, current)
}

impl Target {
    /// Threads of the last roster snapshot, a snapshot is taken if there is none yet.
    pub fn threads(&self) -> Result<Vec<Arc<ThreadHandle>>, Error> {
        let empty = self.threads.lock().unwrap().roster.is_empty();
        if empty {
            self.refresh_roster()?;
        }
        Ok(self.threads.lock().unwrap().roster.clone())
    }

    pub fn thread(&self, id: u32) -> Option<Arc<ThreadHandle>> {
        self.threads.lock().unwrap().find(id)
    }

    pub fn current_thread_id(&self) -> u32 {
        self.threads.lock().unwrap().current
    }

    /// Take a new roster snapshot and reconcile it with the cached one.
    pub fn refresh_roster(&self) -> Result<(), Error> {
        self.refresh_roster_with(None)
    }

    pub(super) fn refresh_roster_with(&self, current: Option<u32>) -> Result<(), Error> {
        let diff = {
            let mut cache = self.threads.lock().unwrap();
            let (snapshot, reported) = {
                let _quiet = self.channel.quiet();
                self.query_roster()?
            };
            cache.reconcile(snapshot, current.or(reported))
        };

        for id in diff.created {
            self.hooks.on_thread_created(id);
        }
        for id in diff.exited {
            self.hooks.on_thread_exited(id);
        }
        Ok(())
    }

    fn query_roster(&self) -> Result<RosterSnapshot, Error> {
        match self.exec(&MiCommand::new("thread-info")) {
            Ok(reply) => {
                let threads = reply
                    .results
                    .get_items("threads")
                    .into_iter()
                    .filter_map(Value::as_tuple)
                    .filter_map(|t| {
                        Some((
                            t.get_parsed::<u32>("id")?,
                            t.get_str("name").map(ToString::to_string),
                        ))
                    })
                    .collect();
                Ok((threads, reply.results.get_parsed("current-thread-id")))
            }
            Err(e @ (Error::Protocol { .. } | Error::MissingField(_))) => {
                debug!(target: "debugger", "thread info unavailable ({e}), fall back to cli");
                let reply = self.exec(&MiCommand::cli("info threads"))?;
                Ok(parse_info_threads(&reply.console_text()))
            }
            Err(e) => Err(e),
        }
    }

    /// Make a thread current. Registers and variables are updated if their
    /// autoupdate is on.
    pub fn set_current_thread(&self, id: u32) -> Result<(), Error> {
        self.select_thread(id, true)
    }

    pub(super) fn select_thread(&self, id: u32, update: bool) -> Result<(), Error> {
        let changed = {
            let mut cache = self.threads.lock().unwrap();
            let previous = cache.current;
            self.switch_thread(&mut cache, id)?;
            previous != cache.current
        };
        if update && changed {
            if self.registers.autoupdate() {
                weak_error!(self.update_registers(), "update registers:");
            }
            if self.variables.autoupdate() {
                weak_error!(self.update_variables(), "update variables:");
            }
        }
        Ok(())
    }

    /// Select a thread in the debugger. Caller holds the target lock.
    pub(super) fn switch_thread(&self, cache: &mut ThreadCache, id: u32) -> Result<(), Error> {
        if id == 0 || id == cache.current {
            return Ok(());
        }

        let reply = self.exec(&MiCommand::new("thread-select").param(id.to_string()))?;
        let reported = reply.results.get_parsed::<u32>("new-thread-id").unwrap_or(id);
        if reported != id {
            cache.remove(id);
            self.hooks.on_thread_exited(id);
            return Err(Error::UnknownThread(id));
        }

        cache.current = id;
        // the debugger resets the selected frame on thread switch
        let level = reply
            .results
            .get_tuple("frame")
            .and_then(|f| f.get_parsed("level"))
            .unwrap_or(0);
        if let Some(thread) = cache.find(id) {
            thread.set_selected(level);
        }
        Ok(())
    }

    /// Select a frame in the debugger. Caller holds the target lock.
    pub(super) fn switch_frame(
        &self,
        cache: &mut ThreadCache,
        frame: &StackFrame,
    ) -> Result<(), Error> {
        self.switch_thread(cache, frame.thread)?;
        let thread = cache
            .find(frame.thread)
            .ok_or(Error::UnknownThread(frame.thread))?;
        self.select_wire_level(&thread, frame.wire_level())
    }

    fn select_wire_level(&self, thread: &ThreadHandle, level: u32) -> Result<(), Error> {
        if thread.selected() != level {
            self.exec(&MiCommand::new("stack-select-frame").param(level.to_string()))?;
            thread.set_selected(level);
        }
        Ok(())
    }

    /// Make a frame and its thread current.
    pub fn select_frame(&self, frame: &StackFrame, update: bool) -> Result<(), Error> {
        {
            let mut cache = self.threads.lock().unwrap();
            self.switch_frame(&mut cache, frame)?;
        }
        if update && self.variables.autoupdate() {
            weak_error!(self.update_variables(), "update variables:");
        }
        Ok(())
    }

    /// Stack frames of a thread at positions `low..=high`, 0 is the innermost.
    pub fn stack_frames(&self, thread: u32, low: u32, high: u32) -> Result<Vec<StackFrame>, Error> {
        let mut cache = self.threads.lock().unwrap();
        let handle = cache.find(thread).ok_or(Error::UnknownThread(thread))?;
        if let Some(frames) = handle.stack.lock().unwrap().slice(low, high) {
            return Ok(frames);
        }

        let original = cache.current;
        let result = self.fetch_frames(&mut cache, &handle, high);
        if cache.current != original && original != 0 {
            weak_error!(
                self.switch_thread(&mut cache, original),
                "restore current thread:"
            );
        }
        result?;

        let frames = handle.stack.lock().unwrap().slice(low, high);
        Ok(frames.unwrap_or_default())
    }

    /// Stack depth of a thread.
    pub fn stack_depth(&self, thread: u32) -> Result<u32, Error> {
        let mut cache = self.threads.lock().unwrap();
        let handle = cache.find(thread).ok_or(Error::UnknownThread(thread))?;
        if let Some(depth) = handle.cached_depth() {
            return Ok(depth);
        }

        let original = cache.current;
        let result = self
            .switch_thread(&mut cache, thread)
            .and_then(|_| self.query_stack_depth());
        if cache.current != original && original != 0 {
            weak_error!(
                self.switch_thread(&mut cache, original),
                "restore current thread:"
            );
        }
        let depth = result?;
        handle.stack.lock().unwrap().depth = Some(depth);
        Ok(depth)
    }

    fn fetch_frames(
        &self,
        cache: &mut ThreadCache,
        thread: &ThreadHandle,
        high: u32,
    ) -> Result<(), Error> {
        self.switch_thread(cache, thread.id)?;
        let depth = self.query_stack_depth()?;

        // shallow requests fetch a window, deep ones the whole stack
        let upper = if high < depth {
            depth.min(self.stack_depth).max(high + 1)
        } else {
            depth
        };

        let frames = if upper == 0 {
            vec![]
        } else {
            let reply = self.exec(
                &MiCommand::new("stack-list-frames")
                    .param("0")
                    .param((upper - 1).to_string()),
            )?;
            reply
                .results
                .get_items("stack")
                .into_iter()
                .filter_map(Value::as_tuple)
                .map(|record| StackFrame::from_record(thread.id, depth, record))
                .collect()
        };

        let mut stack = thread.stack.lock().unwrap();
        stack.depth = Some(depth);
        stack.frames = frames;
        Ok(())
    }

    /// Depth of the current thread stack.
    ///
    /// The first failure is retried once (the debugger repairs a corrupted frame on
    /// the first attempt), a value recovered this way is decremented by one. If the
    /// retry fails too a single frame is assumed.
    fn query_stack_depth(&self) -> Result<u32, Error> {
        let cmd = MiCommand::new("stack-info-depth");
        let parse = |reply: Reply| -> Result<u32, Error> { Ok(reply.field("depth")?.parse()?) };

        match self.exec(&cmd).and_then(parse) {
            Ok(depth) => Ok(depth),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(target: "debugger", "stack depth: {e}, retry");
                match self.exec(&cmd).and_then(parse) {
                    Ok(depth) => Ok(depth.saturating_sub(1)),
                    Err(e) if e.is_fatal() => Err(e),
                    Err(e) => {
                        warn!(target: "debugger", "stack depth: {e}, assume single frame");
                        Ok(1)
                    }
                }
            }
        }
    }

    /// Evaluate an expression in a frame, the previously selected thread and frame
    /// are restored afterwards.
    pub fn evaluate_expression_to_string(
        &self,
        frame: &StackFrame,
        expression: &str,
    ) -> Result<String, Error> {
        let mut cache = self.threads.lock().unwrap();
        let original = cache.find(cache.current);
        let original_level = original.as_ref().map(|t| t.selected());

        let result = self.switch_frame(&mut cache, frame).and_then(|_| {
            let reply =
                self.exec(&MiCommand::new("data-evaluate-expression").param(expression))?;
            Ok(reply.field("value")?.to_string())
        });

        if let (Some(thread), Some(level)) = (original, original_level) {
            if weak_error!(self.switch_thread(&mut cache, thread.id)).is_some() {
                weak_error!(self.select_wire_level(&thread, level), "restore frame:");
            }
        }
        result
    }

    pub(super) fn invalidate_frames(&self) {
        self.threads.lock().unwrap().invalidate_frames();
    }
}
