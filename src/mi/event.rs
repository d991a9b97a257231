use crate::mi::output::{AsyncKind, StreamKind, Tuple};

/// Payload of a `*stopped` record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StopRecord {
    pub reason: Option<String>,
    pub thread_id: Option<u32>,
    pub bkptno: Option<u32>,
    pub frame: Option<Tuple>,
    pub exit_code: Option<i32>,
    pub signal: Option<String>,
    pub results: Tuple,
}

impl StopRecord {
    fn new(results: Tuple) -> Self {
        Self {
            reason: results.get_str("reason").map(ToString::to_string),
            thread_id: results.get_parsed("thread-id"),
            bkptno: results.get_parsed("bkptno").or_else(|| {
                ["wpt", "hw-awpt", "hw-rwpt"]
                    .iter()
                    .find_map(|key| results.get_tuple(key))
                    .and_then(|wpt| wpt.get_parsed("number"))
            }),
            frame: results.get_tuple("frame").cloned(),
            // exit code printed in octal
            exit_code: results
                .get_str("exit-code")
                .and_then(|code| i32::from_str_radix(code, 8).ok()),
            signal: results.get_str("signal-name").map(ToString::to_string),
            results,
        }
    }

    /// True if the stop means the inferior is gone.
    pub fn is_exit(&self) -> bool {
        matches!(
            self.reason.as_deref(),
            Some("exited" | "exited-normally" | "exited-signalled")
        )
    }

    pub fn is_breakpoint_hit(&self) -> bool {
        matches!(
            self.reason.as_deref(),
            Some(
                "breakpoint-hit"
                    | "watchpoint-trigger"
                    | "read-watchpoint-trigger"
                    | "access-watchpoint-trigger"
                    | "watchpoint-scope"
            )
        ) || self.bkptno.is_some()
    }
}

/// Unsolicited protocol event.
#[derive(Debug, Clone, PartialEq)]
pub enum MiEvent {
    Stopped(StopRecord),
    /// `thread` is `None` when all threads resumed.
    Running {
        thread: Option<u32>,
    },
    ThreadCreated(u32),
    ThreadExited(u32),
    ThreadSelected(u32),
    BreakpointCreated(Tuple),
    BreakpointModified(Tuple),
    BreakpointDeleted(u32),
    LibraryLoaded {
        id: String,
        path: Option<String>,
    },
    Output(StreamKind, String),
    Other {
        kind: AsyncKind,
        class: String,
        results: Tuple,
    },
    /// Debugger output stream closed.
    Closed,
}

impl MiEvent {
    pub fn from_async(kind: AsyncKind, class: String, results: Tuple) -> Self {
        if kind == AsyncKind::Exec && class == "stopped" {
            return MiEvent::Stopped(StopRecord::new(results));
        }

        let id = |name: &str| results.get_parsed::<u32>(name);
        let bkpt = || results.get_tuple("bkpt").cloned();
        let event = match (kind, class.as_str()) {
            (AsyncKind::Exec, "running") => Some(MiEvent::Running {
                thread: id("thread-id"),
            }),
            (AsyncKind::Notify, "thread-created") => id("id").map(MiEvent::ThreadCreated),
            (AsyncKind::Notify, "thread-exited") => id("id").map(MiEvent::ThreadExited),
            (AsyncKind::Notify, "thread-selected") => id("id").map(MiEvent::ThreadSelected),
            (AsyncKind::Notify, "breakpoint-created") => bkpt().map(MiEvent::BreakpointCreated),
            (AsyncKind::Notify, "breakpoint-modified") => bkpt().map(MiEvent::BreakpointModified),
            (AsyncKind::Notify, "breakpoint-deleted") => id("id").map(MiEvent::BreakpointDeleted),
            (AsyncKind::Notify, "library-loaded") => Some(MiEvent::LibraryLoaded {
                id: results.get_str("id").unwrap_or_default().to_string(),
                path: results.get_str("target-name").map(ToString::to_string),
            }),
            _ => None,
        };

        event.unwrap_or(MiEvent::Other {
            kind,
            class,
            results,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mi::output::Record;

    fn event(line: &str) -> MiEvent {
        match Record::parse(line).unwrap() {
            Record::Async {
                kind,
                class,
                results,
                ..
            } => MiEvent::from_async(kind, class, results),
            r => panic!("unexpected record {r:?}"),
        }
    }

    #[test]
    fn test_classification() {
        struct TestCase {
            line: &'static str,
            expected: MiEvent,
        }
        let cases = vec![
            TestCase {
                line: r#"*running,thread-id="all""#,
                expected: MiEvent::Running { thread: None },
            },
            TestCase {
                line: r#"*running,thread-id="3""#,
                expected: MiEvent::Running { thread: Some(3) },
            },
            TestCase {
                line: r#"=thread-created,id="4",group-id="i1""#,
                expected: MiEvent::ThreadCreated(4),
            },
            TestCase {
                line: r#"=thread-exited,id="1",group-id="i1""#,
                expected: MiEvent::ThreadExited(1),
            },
            TestCase {
                line: r#"=breakpoint-deleted,id="5""#,
                expected: MiEvent::BreakpointDeleted(5),
            },
            TestCase {
                line: r#"=library-loaded,id="/lib/libc.so.6",target-name="/lib/libc.so.6""#,
                expected: MiEvent::LibraryLoaded {
                    id: "/lib/libc.so.6".to_string(),
                    path: Some("/lib/libc.so.6".to_string()),
                },
            },
        ];

        for tc in cases {
            assert_eq!(event(tc.line), tc.expected, "{}", tc.line);
        }
    }

    #[test]
    fn test_stop_record() {
        let MiEvent::Stopped(stop) = event(
            r#"*stopped,reason="breakpoint-hit",disp="keep",bkptno="2",frame={func="main",line="9"},thread-id="1",stopped-threads="all""#,
        ) else {
            panic!("stop expected");
        };
        assert_eq!(stop.bkptno, Some(2));
        assert_eq!(stop.thread_id, Some(1));
        assert!(stop.is_breakpoint_hit());
        assert!(!stop.is_exit());

        let MiEvent::Stopped(stop) = event(r#"*stopped,reason="exited",exit-code="012""#) else {
            panic!("stop expected");
        };
        assert!(stop.is_exit());
        assert_eq!(stop.exit_code, Some(10));
    }
}
