use crate::common::{self, done, running, thread_info, HookEvent, SIGINT_STOP};
use migdb::config::Config;
use migdb::debugger::{Endianness, Error, ExecState, Location, TargetKind};
use std::sync::atomic::{AtomicUsize, Ordering};

fn responder(cmd: &str) -> Vec<String> {
    match cmd {
        "-thread-info" => thread_info(&[(1, "app")], 1),
        "-exec-continue" | "-exec-run" | "-exec-next 1" | "-exec-step 3" => running(),
        _ => done(""),
    }
}

#[test]
fn test_initial_state_by_kind() {
    struct TestCase {
        kind: TargetKind,
        expected: ExecState,
    }
    let cases = [
        TestCase {
            kind: TargetKind::Process,
            expected: ExecState::Terminated,
        },
        TestCase {
            kind: TargetKind::Attach,
            expected: ExecState::Suspended,
        },
        TestCase {
            kind: TargetKind::Core,
            expected: ExecState::Suspended,
        },
    ];

    for tc in cases {
        let (session, gdb, _) = common::session(tc.kind, common::config(), responder);
        assert_eq!(session.target().state(), tc.expected, "{}", tc.kind);
        assert!(gdb.commands().is_empty());
    }
}

#[test]
fn test_resume_and_stop() {
    let (session, gdb, hook) = common::session(TargetKind::Attach, common::config(), responder);
    let target = session.target();

    target.resume(false).unwrap();
    assert_eq!(target.state(), ExecState::Running);
    assert_eq!(gdb.commands(), vec!["-exec-continue".to_string()]);

    gdb.emit(r#"*running,thread-id="all""#);
    hook.wait_for(|events| events.contains(&HookEvent::Resumed(None)));

    gdb.emit(SIGINT_STOP);
    hook.wait_suspended(1);
    assert_eq!(target.state(), ExecState::Suspended);
}

#[test]
fn test_guards_without_wire_traffic() {
    let (session, gdb, hook) = common::session(TargetKind::Attach, common::config(), responder);
    let target = session.target();

    gdb.emit(r#"*running,thread-id="all""#);
    hook.wait_for(|events| events.contains(&HookEvent::Resumed(None)));
    assert_eq!(target.state(), ExecState::Running);

    assert!(matches!(target.resume(false), Err(Error::AlreadyRunning)));
    assert!(matches!(target.step_over(1), Err(Error::NotSuspended)));
    assert!(matches!(
        target.create_memory_block("&buf", 1, 16),
        Err(Error::NotSuspended)
    ));
    assert!(gdb.commands().is_empty());
}

#[test]
fn test_unsupported_operations() {
    let (process, process_gdb, _) = common::session(TargetKind::Process, common::config(), responder);
    assert!(matches!(
        process.target().disconnect(),
        Err(Error::Unsupported(_))
    ));
    assert!(process_gdb.commands().is_empty());

    let (core, core_gdb, _) = common::session(TargetKind::Core, common::config(), responder);
    let target = core.target();
    assert!(matches!(target.resume(false), Err(Error::Unsupported(_))));
    assert!(matches!(target.step_into(1), Err(Error::Unsupported(_))));
    assert!(matches!(target.restart(), Err(Error::Unsupported(_))));
    assert!(core_gdb.commands().is_empty());
}

#[test]
fn test_step_count() {
    let (session, gdb, _) = common::session(TargetKind::Attach, common::config(), responder);
    let target = session.target();

    // zero steps means one
    target.step_over(0).unwrap();
    assert_eq!(gdb.commands(), vec!["-exec-next 1".to_string()]);
}

#[test]
fn test_failed_step_restores_state() {
    let (session, gdb, _) = common::session(TargetKind::Attach, common::config(), |cmd| {
        match cmd {
            "-exec-step 3" => common::error("Cannot find bounds of current function"),
            _ => done(""),
        }
    });
    let target = session.target();

    assert!(target.step_into(3).is_err());
    assert_eq!(target.state(), ExecState::Suspended);
    assert_eq!(gdb.commands(), vec!["-exec-step 3".to_string()]);
}

#[test]
fn test_restart_and_exit_code() {
    let (session, gdb, hook) = common::session(TargetKind::Process, common::config(), responder);
    let target = session.target();

    // a terminated process is started again on resume
    target.resume(false).unwrap();
    assert_eq!(gdb.commands(), vec!["-exec-run".to_string()]);

    gdb.emit(r#"*stopped,reason="exited",exit-code="012""#);
    hook.wait_for(|events| events.contains(&HookEvent::Exit(Some(10))));
    assert_eq!(target.state(), ExecState::Terminated);
}

#[test]
fn test_terminate_and_detach() {
    let (session, gdb, hook) = common::session(TargetKind::Attach, common::config(), responder);
    let target = session.target();

    target.disconnect().unwrap();
    assert_eq!(target.state(), ExecState::Disconnected);
    assert!(hook.events().contains(&HookEvent::Detached));
    assert!(matches!(target.disconnect(), Err(Error::Disconnected)));
    assert_eq!(gdb.count("-target-detach"), 1);

    let (session, gdb, hook) = common::session(TargetKind::Attach, common::config(), responder);
    let target = session.target();

    target.terminate().unwrap();
    assert_eq!(target.state(), ExecState::Terminated);
    assert_eq!(hook.events(), vec![HookEvent::Exit(None)]);
    assert_eq!(gdb.count("-interpreter-exec console kill"), 1);

    // already gone
    target.terminate().unwrap();
    assert_eq!(gdb.count("-interpreter-exec console kill"), 1);
}

#[test]
fn test_command_timeout() {
    let config = Config {
        command_timeout_ms: 200,
        ..common::config()
    };
    let attempts = AtomicUsize::new(0);
    let (session, _gdb, _) = common::session(TargetKind::Attach, config, move |cmd| {
        match cmd {
            "-interpreter-exec console \"show endian\"" => {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    return vec![];
                }
                vec![
                    r#"~"The target endianness is set automatically (currently little endian).\n""#
                        .to_string(),
                    "^done".to_string(),
                ]
            }
            _ => done(""),
        }
    });
    let target = session.target();

    assert!(matches!(
        target.endianness(),
        Err(Error::ProtocolTimeout(_, _))
    ));
    assert_eq!(target.endianness().unwrap(), Endianness::Little);
    // cached after the first success
    assert_eq!(target.endianness().unwrap(), Endianness::Little);
    assert!(target.channel().in_flight().is_empty());
}

#[test]
fn test_jump_sets_temporary_breakpoint_first() {
    let (session, gdb, _) = common::session(TargetKind::Attach, common::config(), |cmd| match cmd {
        "-break-insert -t main.c:20" => done(
            r#"bkpt={number="4",type="breakpoint",disp="del",enabled="y",addr="0x0000000000401200",func="run",file="main.c",fullname="/src/main.c",line="20",times="0"}"#,
        ),
        "-interpreter-exec console \"jump main.c:20\"" => running(),
        _ => done(""),
    });
    let target = session.target();

    let location = Location::Line {
        file: "main.c".to_string(),
        line: 20,
    };
    target.move_instruction_pointer(&location).unwrap();
    assert_eq!(
        gdb.commands(),
        vec![
            "-break-insert -t main.c:20".to_string(),
            "-interpreter-exec console \"jump main.c:20\"".to_string(),
        ]
    );
    assert_eq!(target.state(), ExecState::Running);
}
