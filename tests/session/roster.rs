use crate::common::{self, done, error, thread_info, HookEvent, SIGINT_STOP};
use migdb::config::{AutoUpdate, Config};
use migdb::debugger::{Error, TargetKind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn test_roster_follows_stops() {
    let snapshots = AtomicUsize::new(0);
    let (session, gdb, hook) = common::session(TargetKind::Attach, common::config(), move |cmd| {
        match cmd {
            "-thread-info" => match snapshots.fetch_add(1, Ordering::SeqCst) {
                0 => thread_info(&[(1, "app"), (2, "worker")], 1),
                _ => thread_info(&[(1, "app"), (3, "worker")], 1),
            },
            _ => done(""),
        }
    });
    let target = session.target();

    gdb.emit(SIGINT_STOP);
    let events = hook.wait_suspended(1);
    assert_eq!(events[0], HookEvent::ThreadCreated(1));
    assert_eq!(events[1], HookEvent::ThreadCreated(2));
    let HookEvent::Suspended(stop) = &events[2] else {
        panic!("suspend expected, got {:?}", events[2]);
    };
    assert_eq!(stop.thread, Some(1));
    assert_eq!(stop.signal.as_deref(), Some("SIGINT"));
    assert_eq!(stop.place.as_ref().and_then(|p| p.line), Some(7));

    let main_thread = target.thread(1).unwrap();

    gdb.emit(SIGINT_STOP);
    let events = hook.wait_suspended(2);
    assert!(events.contains(&HookEvent::ThreadCreated(3)));
    assert!(events.contains(&HookEvent::ThreadExited(2)));
    assert!(!events.contains(&HookEvent::ThreadExited(1)));

    let ids: Vec<u32> = target.threads().unwrap().iter().map(|t| t.id()).collect();
    assert_eq!(ids, vec![1, 3]);
    assert!(Arc::ptr_eq(&main_thread, &target.thread(1).unwrap()));
    assert_eq!(target.thread(3).unwrap().name().as_deref(), Some("worker"));
    assert_eq!(target.current_thread_id(), 1);
}

#[test]
fn test_roster_from_cli_fallback() {
    let (session, gdb, _hook) = common::session(TargetKind::Attach, common::config(), |cmd| {
        match cmd {
            "-thread-info" => error("Undefined MI command: thread-info"),
            "-interpreter-exec console \"info threads\"" => vec![
                r#"~"  Id   Target Id                         Frame \n""#.to_string(),
                r#"~"  1    Thread 0x7ffff7d8a740 (LWP 100) \"app\" main () at main.c:7\n""#
                    .to_string(),
                r#"~"* 2    Thread 0x7ffff7589700 (LWP 101) \"worker\" run () at main.c:20\n""#
                    .to_string(),
                "^done".to_string(),
            ],
            _ => done(""),
        }
    });
    let target = session.target();

    target.refresh_roster().unwrap();

    let ids: Vec<u32> = target.threads().unwrap().iter().map(|t| t.id()).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(target.current_thread_id(), 2);
    assert_eq!(target.thread(1).unwrap().name().as_deref(), Some("app"));
    assert_eq!(gdb.count("-thread-info"), 1);
}

#[test]
fn test_empty_roster_placeholder() {
    let (session, _gdb, hook) = common::session(TargetKind::Attach, common::config(), |cmd| {
        match cmd {
            "-thread-info" => done("threads=[]"),
            _ => done(""),
        }
    });
    let target = session.target();

    target.refresh_roster().unwrap();

    let ids: Vec<u32> = target.threads().unwrap().iter().map(|t| t.id()).collect();
    assert_eq!(ids, vec![0]);
    assert!(hook.events().is_empty());
}

#[test]
fn test_switch_thread() {
    let (session, gdb, _hook) = common::session(TargetKind::Attach, common::config(), |cmd| {
        match cmd {
            "-thread-info" => thread_info(&[(1, "app"), (2, "worker")], 1),
            "-thread-select 2" => done(
                r#"new-thread-id="2",frame={level="0",addr="0x0000000000401200",func="run",args=[],file="main.c",line="20"}"#,
            ),
            "-thread-select 5" => done(r#"new-thread-id="1""#),
            _ => done(""),
        }
    });
    let target = session.target();
    target.refresh_roster().unwrap();

    target.set_current_thread(2).unwrap();
    assert_eq!(target.current_thread_id(), 2);
    // already current
    target.set_current_thread(2).unwrap();
    assert_eq!(gdb.count("-thread-select 2"), 1);

    assert!(target.set_current_thread(5).is_err());
}

#[test]
fn test_roster_timeout_not_retried_through_cli() {
    let config = Config {
        command_timeout_ms: 200,
        ..common::config()
    };
    let (session, gdb, hook) = common::session(TargetKind::Attach, config, |cmd| match cmd {
        "-thread-info" => vec![],
        _ => done(""),
    });
    let target = session.target();

    assert!(matches!(
        target.refresh_roster(),
        Err(Error::ProtocolTimeout(_, _))
    ));
    assert_eq!(gdb.count("-thread-info"), 1);
    assert_eq!(gdb.count("-interpreter-exec console \"info threads\""), 0);
    assert!(hook.events().is_empty());
}

#[test]
fn test_switch_thread_refreshes_registers() {
    let config = Config {
        autoupdate: AutoUpdate {
            registers: true,
            ..common::config().autoupdate
        },
        ..common::config()
    };
    let (session, gdb, _hook) = common::session(TargetKind::Attach, config, |cmd| match cmd {
        "-thread-info" => thread_info(&[(1, "app"), (2, "worker")], 1),
        "-thread-select 2" => done(r#"new-thread-id="2""#),
        "-data-list-changed-registers" => done("changed-registers=[]"),
        _ => done(""),
    });
    let target = session.target();
    target.refresh_roster().unwrap();
    gdb.clear();

    target.set_current_thread(2).unwrap();
    assert_eq!(
        gdb.commands(),
        vec!["-thread-select 2", "-data-list-changed-registers"]
    );

    // no switch, no refresh
    target.set_current_thread(2).unwrap();
    assert_eq!(gdb.count("-data-list-changed-registers"), 1);
}
