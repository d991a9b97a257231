use crate::common::{self, done, thread_info};
use migdb::config::{AutoUpdate, Config};
use migdb::debugger::{TargetKind, VariableDescriptor};

const FRAMES: &str = r#"stack=[frame={level="0",addr="0x0000000000401180",func="leaf",file="main.c",fullname="/src/main.c",line="30"}]"#;

fn responder(cmd: &str) -> Vec<String> {
    match cmd {
        "-thread-info" => thread_info(&[(1, "app")], 1),
        "-stack-info-depth" => done(r#"depth="1""#),
        "-stack-list-frames 0 0" => done(FRAMES),
        "-var-create - * counter" => done(r#"name="var1",numchild="0",value="41",type="int",has_more="0""#),
        "-var-create - * total" => done(r#"name="var5",numchild="0",value="7",type="int",has_more="0""#),
        "-var-assign var1 42" => done(r#"value="42""#),
        "-data-list-changed-registers" => done("changed-registers=[]"),
        "-data-evaluate-expression &buf" => done(r#"value="0x601040 <buf>""#),
        "-interpreter-exec console \"show endian\"" => vec![
            r#"~"The target endianness is set automatically (currently little endian).\n""#.to_string(),
            "^done".to_string(),
        ],
        "-data-read-memory 0x601040 x 1 1 2" => done(
            r#"addr="0x601040",nr-bytes="2",total-bytes="2",memory=[{addr="0x601040",data=["0x01","0x02"]}]"#,
        ),
        _ => done(""),
    }
}

fn autoupdate(registers: bool, expressions: bool, variables: bool, memory: bool) -> Config {
    Config {
        autoupdate: AutoUpdate {
            registers,
            expressions,
            variables,
            memory,
        },
        ..common::config()
    }
}

#[test]
fn test_assignment_refreshes_by_own_flags() {
    let (session, gdb, _) =
        common::session(TargetKind::Attach, autoupdate(true, false, false, false), responder);
    let target = session.target();
    target.refresh_roster().unwrap();
    let frame = target.stack_frames(1, 0, 0).unwrap().remove(0);
    let var = target
        .create_variable(&VariableDescriptor::in_frame("counter", 0, &frame))
        .unwrap();
    gdb.clear();

    target.set_variable_value(&var, "42").unwrap();
    assert_eq!(
        gdb.commands(),
        vec![
            "-var-assign var1 42".to_string(),
            "-data-list-changed-registers".to_string(),
        ]
    );
}

#[test]
fn test_cascade_order() {
    let (session, gdb, _) =
        common::session(TargetKind::Attach, autoupdate(true, true, true, true), responder);
    let target = session.target();
    target.refresh_roster().unwrap();
    let frame = target.stack_frames(1, 0, 0).unwrap().remove(0);

    let var = target
        .create_variable(&VariableDescriptor::in_frame("counter", 0, &frame))
        .unwrap();
    let total = target.create_expression("total");
    assert_eq!(target.expression_value(&total, Some(&frame)).unwrap(), "7");
    let block = target.create_memory_block("&buf", 1, 2).unwrap();
    assert_eq!(block.bytes(), vec![1, 2]);
    gdb.clear();

    target.set_variable_value(&var, "42").unwrap();
    assert_eq!(
        gdb.commands(),
        vec![
            "-var-assign var1 42".to_string(),
            "-data-list-changed-registers".to_string(),
            "-var-update --all-values var5".to_string(),
            "-var-update --all-values var1".to_string(),
            "-data-read-memory 0x601040 x 1 1 2".to_string(),
        ]
    );
}
