use crate::common::{self, done, error, thread_info, HookEvent};
use migdb::debugger::variable::TypeKind;
use migdb::debugger::{Session, StackFrame, TargetKind, ValueChanged, VariableDescriptor};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const FRAMES: &str = r#"stack=[frame={level="0",addr="0x0000000000401180",func="leaf",file="main.c",fullname="/src/main.c",line="30"},frame={level="1",addr="0x00000000004011c0",func="middle",file="main.c",fullname="/src/main.c",line="40"},frame={level="2",addr="0x0000000000401200",func="main",file="main.c",fullname="/src/main.c",line="50"}]"#;

fn responder(cmd: &str) -> Vec<String> {
    match cmd {
        "-thread-info" => thread_info(&[(1, "app")], 1),
        "-stack-info-depth" => done(r#"depth="3""#),
        "-stack-list-frames 0 2" => done(FRAMES),
        "-var-create - * counter" => done(r#"name="var1",numchild="0",value="41",type="int",has_more="0""#),
        "-var-create - * handle" => {
            done(r#"name="var2",numchild="0",value="0x4",type="handle_t",has_more="0""#)
        }
        "-var-create - * origin" => {
            done(r#"name="var3",numchild="2",value="{...}",type="Point",has_more="0""#)
        }
        "-interpreter-exec console \"ptype Point\"" => vec![
            r#"~"type = struct Point {\n""#.to_string(),
            r#"~"    int x;\n""#.to_string(),
            r#"~"    int y;\n""#.to_string(),
            r#"~"}\n""#.to_string(),
            "^done".to_string(),
        ],
        "-var-list-children var3" => done(
            r#"numchild="2",children=[child={name="var3.x",exp="x",numchild="0",type="int"},child={name="var3.y",exp="y",numchild="0",type="int"}],has_more="0""#,
        ),
        "-var-create - * shape" => {
            done(r#"name="var4",numchild="1",value="{...}",type="Shape",has_more="0""#)
        }
        "-var-list-children var4" => done(
            r#"numchild="1",children=[child={name="var4.public",exp="public",numchild="2"}],has_more="0""#,
        ),
        "-var-list-children var4.public" => done(
            r#"numchild="2",children=[child={name="var4.public.w",exp="w",numchild="0",type="int"},child={name="var4.public.h",exp="h",numchild="0",type="int"}],has_more="0""#,
        ),
        "-var-create - * &(counter)" => {
            done(r#"name="var1",numchild="0",value="41",type="int",has_more="0""#)
        }
        "-var-assign var1 42" => done(r#"value="42""#),
        "-stack-select-frame 1" => done(""),
        "-stack-list-locals 0" => done(r#"locals=[name="counter",name="origin"]"#),
        cmd if cmd.starts_with("-interpreter-exec console \"ptype") => {
            error("No symbol \\\"handle_t\\\" in current context.")
        }
        _ => done(""),
    }
}

fn innermost_frame(session: &Session) -> StackFrame {
    let target = session.target();
    target.refresh_roster().unwrap();
    target.stack_frames(1, 0, 0).unwrap().remove(0)
}

#[test]
fn test_frame_levels_inverted() {
    let (session, gdb, _) = common::session(TargetKind::Attach, common::config(), responder);
    let target = session.target();
    target.refresh_roster().unwrap();

    let frames = target.stack_frames(1, 0, 2).unwrap();
    let levels: Vec<u32> = frames.iter().map(|f| f.level).collect();
    assert_eq!(levels, vec![3, 2, 1]);
    assert_eq!(frames[0].wire_level(), 0);
    assert!(frames[0].is_innermost());
    assert_eq!(frames[2].place.function.as_deref(), Some("main"));
    assert_eq!(target.stack_depth(1).unwrap(), 3);

    // cached until the next stop
    target.stack_frames(1, 1, 1).unwrap();
    assert_eq!(gdb.count("-stack-list-frames 0 2"), 1);
    assert_eq!(gdb.count("-stack-info-depth"), 1);
}

#[test]
fn test_bind_is_reused() {
    let (session, gdb, _) = common::session(TargetKind::Attach, common::config(), responder);
    let target = session.target();
    let frame = innermost_frame(&session);

    let descriptor = VariableDescriptor::in_frame("counter", 0, &frame);
    let var = target.create_variable(&descriptor).unwrap();
    assert_eq!(var.object(), "var1");
    assert_eq!(var.type_name(), "int");
    assert_eq!(target.variable_value(&var).unwrap(), "41");
    assert_eq!(target.variable_type(&var).kind, TypeKind::Int);

    let again = target.create_variable(&descriptor).unwrap();
    assert!(Arc::ptr_eq(&var, &again));
    assert_eq!(gdb.count("-var-create - * counter"), 1);
    assert_eq!(target.variables().len(), 1);

    target.destroy_variable(&var).unwrap();
    assert!(target.variables().is_empty());
    assert_eq!(gdb.count("-var-delete var1"), 1);
}

#[test]
fn test_type_resolution_fallback() {
    let (session, gdb, _) = common::session(TargetKind::Attach, common::config(), responder);
    let target = session.target();
    let frame = innermost_frame(&session);

    let handle = target
        .create_variable(&VariableDescriptor::in_frame("handle", 0, &frame))
        .unwrap();
    let ty = target.variable_type(&handle);
    assert_eq!(ty.kind, TypeKind::Incomplete);
    assert_eq!(ty.name, "handle_t");
    assert_eq!(gdb.count("-interpreter-exec console \"ptype handle_t\""), 1);
    assert_eq!(gdb.count("-interpreter-exec console \"ptype handle\""), 1);

    let origin = target
        .create_variable(&VariableDescriptor::in_frame("origin", 1, &frame))
        .unwrap();
    assert_eq!(target.variable_type(&origin).kind, TypeKind::Struct);

    let children = target.variable_children(&origin).unwrap();
    let names: Vec<&str> = children.iter().map(|c| c.name()).collect();
    assert_eq!(names, vec!["x", "y"]);
    assert_eq!(children[0].expression(), "(origin).x");
    // children are materialized once
    target.variable_children(&origin).unwrap();
    assert_eq!(gdb.count("-var-list-children var3"), 1);
}

#[test]
fn test_assign_fires_change() {
    let (session, _gdb, hook) = common::session(TargetKind::Attach, common::config(), responder);
    let target = session.target();
    let frame = innermost_frame(&session);

    let var = target
        .create_variable(&VariableDescriptor::in_frame("counter", 0, &frame))
        .unwrap();
    target.set_variable_value(&var, "42").unwrap();

    assert_eq!(target.variable_value(&var).unwrap(), "42");
    assert!(hook
        .events()
        .contains(&HookEvent::ValueChanged(ValueChanged::Variable {
            object: "var1".to_string(),
            expression: "counter".to_string(),
            value: "42".to_string(),
        })));
}

#[test]
fn test_locals_of_outer_frame() {
    let (session, gdb, _) = common::session(TargetKind::Attach, common::config(), responder);
    let target = session.target();
    target.refresh_roster().unwrap();
    let frames = target.stack_frames(1, 0, 2).unwrap();

    let locals = target.local_variables(&frames[1]).unwrap();
    let names: Vec<&str> = locals.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["counter", "origin"]);
    assert_eq!(locals[1].position, 1);
    assert_eq!(locals[0].frame.as_ref(), Some(&frames[1]));
    assert_eq!(gdb.count("-stack-select-frame 1"), 1);
}

#[test]
fn test_access_qualifiers_spliced() {
    let (session, gdb, _) = common::session(TargetKind::Attach, common::config(), responder);
    let target = session.target();
    let frame = innermost_frame(&session);

    let shape = target
        .create_variable(&VariableDescriptor::in_frame("shape", 0, &frame))
        .unwrap();
    let children = target.variable_children(&shape).unwrap();

    let names: Vec<&str> = children.iter().map(|c| c.name()).collect();
    assert_eq!(names, vec!["w", "h"]);
    assert_eq!(children[0].expression(), "(shape).w");
    assert_eq!(children[1].object(), "var4.public.h");
    assert_eq!(children[1].descriptor().position, 1);
    assert_eq!(gdb.count("-var-list-children var4"), 1);
    assert_eq!(gdb.count("-var-list-children var4.public"), 1);
}

#[test]
fn test_address_binding_to_itself_has_no_address() {
    let (session, gdb, _) = common::session(TargetKind::Attach, common::config(), responder);
    let target = session.target();
    let frame = innermost_frame(&session);

    let var = target
        .create_variable(&VariableDescriptor::in_frame("counter", 0, &frame))
        .unwrap();
    gdb.clear();

    assert_eq!(target.variable_address(&var).unwrap(), None);
    // cached
    assert_eq!(target.variable_address(&var).unwrap(), None);
    assert_eq!(gdb.commands(), vec!["-var-create - * &(counter)".to_string()]);
    assert_eq!(target.variables().len(), 1);
}

fn depth_gdb(answers: Vec<Vec<String>>) -> impl Fn(&str) -> Vec<String> + Send + 'static {
    let queries = AtomicUsize::new(0);
    move |cmd: &str| match cmd {
        "-thread-info" => thread_info(&[(1, "app")], 1),
        "-stack-info-depth" => {
            let n = queries.fetch_add(1, Ordering::SeqCst);
            answers.get(n).cloned().unwrap_or_else(|| done(r#"depth="9""#))
        }
        _ => done(""),
    }
}

#[test]
fn test_stack_depth_recovery() {
    struct TestCase {
        answers: Vec<Vec<String>>,
        expected: u32,
        queries: usize,
    }
    let cases = vec![
        TestCase {
            answers: vec![done(r#"depth="5""#)],
            expected: 5,
            queries: 1,
        },
        TestCase {
            answers: vec![error("Cannot access memory"), done(r#"depth="4""#)],
            expected: 3,
            queries: 2,
        },
        TestCase {
            answers: vec![error("Cannot access memory"), error("Cannot access memory")],
            expected: 1,
            queries: 2,
        },
    ];

    for tc in cases {
        let (session, gdb, _) =
            common::session(TargetKind::Attach, common::config(), depth_gdb(tc.answers));
        let target = session.target();
        target.refresh_roster().unwrap();

        assert_eq!(target.stack_depth(1).unwrap(), tc.expected);
        assert_eq!(gdb.count("-stack-info-depth"), tc.queries);
    }
}
