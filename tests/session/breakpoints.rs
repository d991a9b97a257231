use crate::common::{self, done, error, thread_info, wait_until, HookEvent};
use migdb::config::Config;
use migdb::debugger::{
    BreakpointKind, BreakpointOptions, Condition, Error, TargetKind, Watch, WatchAccess,
};
use std::sync::atomic::{AtomicUsize, Ordering};

const MAIN_BKPT: &str = r#"bkpt={number="1",type="breakpoint",disp="keep",enabled="y",addr="0x0000000000401136",func="main",file="main.c",fullname="/src/main.c",line="12",thread-groups=["i1"],times="0",original-location="main.c:12"}"#;

fn line(file: &str, line: u32) -> BreakpointKind {
    BreakpointKind::Line {
        file: file.to_string(),
        line,
    }
}

#[test]
fn test_line_breakpoint_hit() {
    let (session, gdb, hook) = common::session(TargetKind::Attach, common::config(), |cmd| {
        match cmd {
            "-break-insert main.c:12" => done(MAIN_BKPT),
            "-thread-info" => thread_info(&[(1, "app")], 1),
            _ => done(""),
        }
    });
    let target = session.target();

    let bp = target
        .set_breakpoint(line("main.c", 12), BreakpointOptions::default(), Condition::default())
        .unwrap();
    assert_eq!(bp.id(), 1);
    assert!(bp.is_enabled());
    assert!(!bp.is_deferred());
    assert_eq!(target.breakpoints().len(), 1);

    gdb.emit(r#"*stopped,reason="breakpoint-hit",disp="keep",bkptno="1",frame={addr="0x0000000000401136",func="main",args=[],file="main.c",fullname="/src/main.c",line="12"},thread-id="1",stopped-threads="all""#);
    let events = hook.wait_suspended(1);
    let hit = events
        .iter()
        .find_map(|e| match e {
            HookEvent::Breakpoint(id, place) => Some((*id, place.clone())),
            _ => None,
        })
        .unwrap();
    assert_eq!(hit.0, bp.id());
    assert_eq!(hit.1.and_then(|p| p.line), Some(12));
}

#[test]
fn test_insert_options() {
    let (session, gdb, _) = common::session(TargetKind::Attach, common::config(), |cmd| {
        if cmd.starts_with("-break-insert") {
            done(MAIN_BKPT)
        } else {
            done("")
        }
    });
    let target = session.target();

    let options = BreakpointOptions {
        temporary: true,
        hardware: false,
        enabled: false,
    };
    let condition = Condition {
        ignore_count: 2,
        expression: Some("i == 5".to_string()),
        thread_ids: vec![],
    };
    target
        .set_breakpoint(line("main.c", 12), options, condition)
        .unwrap();

    assert_eq!(
        gdb.commands(),
        vec![r#"-break-insert -t -d -c "i == 5" -i 2 main.c:12"#.to_string()]
    );
}

#[test]
fn test_deferred_breakpoint_resolved_on_library_load() {
    let attempts = AtomicUsize::new(0);
    let (session, gdb, _) = common::session(TargetKind::Attach, common::config(), move |cmd| {
        match cmd {
            "-break-insert lib.c:5" => match attempts.fetch_add(1, Ordering::SeqCst) {
                0 => error("No source file named lib.c."),
                _ => done(
                    r#"bkpt={number="4",type="breakpoint",disp="keep",enabled="y",addr="0x00007ffff7fc1100",func="lib_init",file="lib.c",line="5",times="0"}"#,
                ),
            },
            _ => done(""),
        }
    });
    let target = session.target();

    let bp = target
        .set_breakpoint(line("lib.c", 5), BreakpointOptions::default(), Condition::default())
        .unwrap();
    assert!(bp.is_deferred());

    gdb.emit(r#"=library-loaded,id="/lib/libfoo.so",target-name="/lib/libfoo.so",host-name="/lib/libfoo.so",symbols-loaded="0",thread-group="i1""#);
    wait_until(|| !bp.is_deferred());
    assert_eq!(gdb.count("-break-insert lib.c:5"), 2);
    assert_eq!(target.breakpoint_by_number(4).map(|b| b.id()), Some(bp.id()));
}

#[test]
fn test_rejected_location_without_deferral() {
    let config = Config {
        deferred_breakpoints: false,
        ..common::config()
    };
    let (session, _gdb, _) = common::session(TargetKind::Attach, config, |cmd| {
        match cmd {
            "-break-insert lib.c:5" => error("No source file named lib.c."),
            _ => done(""),
        }
    });
    let target = session.target();

    let result =
        target.set_breakpoint(line("lib.c", 5), BreakpointOptions::default(), Condition::default());
    assert!(matches!(result, Err(Error::Protocol { .. })));
    assert!(target.breakpoints().is_empty());
}

#[test]
fn test_rejected_before_wire() {
    let (session, gdb, _) = common::session(TargetKind::Attach, common::config(), |_| done(""));
    let target = session.target();

    let unknown_event = BreakpointKind::Event {
        event_type: "teleport".to_string(),
        arg: None,
    };
    assert!(matches!(
        target.set_breakpoint(unknown_event, BreakpointOptions::default(), Condition::default()),
        Err(Error::UnknownEventType(_))
    ));

    let filtered = Condition {
        thread_ids: vec![2],
        ..Condition::default()
    };
    assert!(matches!(
        target.set_breakpoint(
            BreakpointKind::Watch(Watch::new("counter", WatchAccess::Write)),
            BreakpointOptions::default(),
            filtered,
        ),
        Err(Error::Unsupported(_))
    ));

    assert!(matches!(
        target.set_breakpoint(line("", 5), BreakpointOptions::default(), Condition::default()),
        Err(Error::InvalidLocation(_))
    ));

    assert!(gdb.commands().is_empty());
    assert!(target.breakpoints().is_empty());
}

#[test]
fn test_enable_condition_delete() {
    let (session, gdb, _) = common::session(TargetKind::Attach, common::config(), |cmd| {
        match cmd {
            "-break-insert main.c:12" => done(MAIN_BKPT),
            _ => done(""),
        }
    });
    let target = session.target();
    let bp = target
        .set_breakpoint(line("main.c", 12), BreakpointOptions::default(), Condition::default())
        .unwrap();
    gdb.clear();

    target.set_breakpoint_enabled(&bp, false).unwrap();
    assert!(!bp.is_enabled());

    let condition = Condition {
        ignore_count: 0,
        expression: Some("n > 3".to_string()),
        thread_ids: vec![],
    };
    target.set_breakpoint_condition(&bp, condition.clone()).unwrap();
    assert_eq!(bp.condition(), condition);

    target.delete_breakpoint(&bp).unwrap();
    assert!(target.breakpoints().is_empty());
    assert!(matches!(
        target.breakpoint(bp.id()),
        Err(Error::BreakpointNotFound(_))
    ));

    assert_eq!(
        gdb.commands(),
        vec![
            "-break-disable 1".to_string(),
            r#"-break-condition 1 "n > 3""#.to_string(),
            "-break-after 1 0".to_string(),
            "-break-delete 1".to_string(),
        ]
    );
}

#[test]
fn test_breakpoint_deleted_outside() {
    let (session, gdb, _) = common::session(TargetKind::Attach, common::config(), |cmd| {
        match cmd {
            "-break-insert main.c:12" => done(MAIN_BKPT),
            _ => done(""),
        }
    });
    let target = session.target();
    target
        .set_breakpoint(line("main.c", 12), BreakpointOptions::default(), Condition::default())
        .unwrap();

    gdb.emit(r#"=breakpoint-deleted,id="1""#);
    wait_until(|| target.breakpoints().is_empty());
}

#[test]
fn test_partial_condition_failure_keeps_records_in_sync() {
    let record = |number: u32, thread: u32| {
        done(&format!(
            r#"bkpt={{number="{number}",type="breakpoint",disp="keep",enabled="y",addr="0x0000000000401136",func="main",file="main.c",fullname="/src/main.c",line="12",thread="{thread}",times="0",original-location="main.c:12"}}"#
        ))
    };
    let (session, gdb, _) = common::session(TargetKind::Attach, common::config(), move |cmd| {
        match cmd {
            "-break-insert -p 1 main.c:12" => record(1, 1),
            "-break-insert -p 2 main.c:12" => record(2, 2),
            r#"-break-condition 2 "n > 3""# => error("Breakpoint 2 is gone"),
            _ => done(""),
        }
    });
    let target = session.target();
    let filter = Condition {
        ignore_count: 0,
        expression: None,
        thread_ids: vec![1, 2],
    };
    let bp = target
        .set_breakpoint(line("main.c", 12), BreakpointOptions::default(), filter.clone())
        .unwrap();
    assert_eq!(bp.records().len(), 2);
    gdb.clear();

    let condition = Condition {
        expression: Some("n > 3".to_string()),
        ..filter.clone()
    };
    assert!(target.set_breakpoint_condition(&bp, condition).is_err());

    let records = bp.records();
    assert_eq!(records[0].condition.as_deref(), Some("n > 3"));
    assert_eq!(records[1].condition, None);
    assert_eq!(bp.condition(), filter);
    assert_eq!(
        gdb.commands(),
        vec![
            r#"-break-condition 1 "n > 3""#.to_string(),
            "-break-after 1 0".to_string(),
            r#"-break-condition 2 "n > 3""#.to_string(),
        ]
    );
}
