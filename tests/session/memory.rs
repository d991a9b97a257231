use crate::common::{self, done, HookEvent};
use migdb::debugger::{Error, TargetKind, ValueChanged};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

const BASE: u64 = 0x601040;

/// Debugger with six readable bytes at `BASE`, anything past them is unreadable.
fn memory_gdb(image: Arc<Mutex<Vec<u8>>>) -> impl Fn(&str) -> Vec<String> + Send + 'static {
    move |cmd: &str| {
        let args: Vec<&str> = cmd.split_whitespace().collect();
        match args.as_slice() {
            ["-data-evaluate-expression", "&buf"] => {
                done(r#"value="(char (*)[6]) 0x601040 <buf>""#)
            }
            ["-data-evaluate-expression", "&buf[2]"] => done(r#"value="0x601042 <buf+2>""#),
            ["-interpreter-exec", "console", ..] if cmd.contains("show endian") => vec![
                r#"~"The target endianness is set automatically (currently little endian).\n""#
                    .to_string(),
                "^done".to_string(),
            ],
            ["-data-read-memory", addr, "x", "1", "1", words] => {
                let addr = u64::from_str_radix(addr.trim_start_matches("0x"), 16).unwrap();
                let words: u64 = words.parse().unwrap();
                let image = image.lock().unwrap();
                let data: Vec<String> = (addr..addr + words)
                    .map(|a| match image.get((a - BASE) as usize) {
                        Some(byte) => format!(r#""{byte:#04x}""#),
                        None => r#""N/A""#.to_string(),
                    })
                    .collect();
                done(&format!(
                    r#"addr="{addr:#x}",nr-bytes="{words}",total-bytes="{words}",memory=[{{addr="{addr:#x}",data=[{}]}}]"#,
                    data.join(",")
                ))
            }
            ["-data-write-memory", "-o", offset, addr, "x", "1", value] => {
                let addr = u64::from_str_radix(addr.trim_start_matches("0x"), 16).unwrap();
                let offset: u64 = offset.parse().unwrap();
                let value = u8::from_str_radix(value.trim_start_matches("0x"), 16).unwrap();
                image.lock().unwrap()[(addr + offset - BASE) as usize] = value;
                done("")
            }
            _ => done(""),
        }
    }
}

#[test]
fn test_read_block_with_unreadable_tail() {
    let image = Arc::new(Mutex::new(vec![1, 2, 3, 4, 5, 6]));
    let (session, gdb, _) =
        common::session(TargetKind::Attach, common::config(), memory_gdb(image));
    let target = session.target();

    let block = target.create_memory_block("&buf[2]", 1, 6).unwrap();
    assert_eq!(block.start(), BASE + 2);
    assert_eq!(block.bytes(), vec![3, 4, 5, 6, 0, 0]);
    assert_eq!(block.bad_offsets(), BTreeSet::from([4, 5]));
    assert_eq!(gdb.count("-data-read-memory 0x601042 x 1 1 6"), 1);
}

#[test]
fn test_bad_offset_rejected_before_wire() {
    let image = Arc::new(Mutex::new(vec![1, 2, 3, 4, 5, 6]));
    let (session, gdb, _) =
        common::session(TargetKind::Attach, common::config(), memory_gdb(image));
    let target = session.target();
    let block = target.create_memory_block("&buf", 1, 4).unwrap();
    gdb.clear();

    struct TestCase {
        offset: usize,
        len: usize,
    }
    let cases = [
        TestCase { offset: 3, len: 2 },
        TestCase { offset: 5, len: 0 },
        TestCase { offset: 0, len: 5 },
    ];
    for tc in cases {
        let result = target.set_memory(&block, tc.offset, &vec![0; tc.len]);
        assert!(
            matches!(result, Err(Error::BadOffset { size: 4, .. })),
            "offset {} len {}",
            tc.offset,
            tc.len
        );
    }
    assert!(gdb.commands().is_empty());
    assert_eq!(block.bytes(), vec![1, 2, 3, 4]);
}

#[test]
fn test_write_propagates_to_overlapping_block() {
    let image = Arc::new(Mutex::new(vec![1, 2, 3, 4, 5, 6]));
    let (session, gdb, hook) = common::session(
        TargetKind::Attach,
        common::config(),
        memory_gdb(image.clone()),
    );
    let target = session.target();
    let whole = target.create_memory_block("&buf", 1, 4).unwrap();
    let tail = target.create_memory_block("&buf[2]", 1, 6).unwrap();
    gdb.clear();

    target.set_memory(&whole, 2, &[0xff, 0xee]).unwrap();

    assert_eq!(
        gdb.commands()
            .iter()
            .filter(|c| c.starts_with("-data-write-memory"))
            .cloned()
            .collect::<Vec<_>>(),
        vec![
            "-data-write-memory -o 2 0x601040 x 1 0xff".to_string(),
            "-data-write-memory -o 3 0x601040 x 1 0xee".to_string(),
        ]
    );
    assert_eq!(*image.lock().unwrap(), vec![1, 2, 0xff, 0xee, 5, 6]);
    assert_eq!(whole.bytes(), vec![1, 2, 0xff, 0xee]);
    assert_eq!(tail.bytes(), vec![0xff, 0xee, 5, 6, 0, 0]);

    let changes: Vec<ValueChanged> = hook
        .events()
        .into_iter()
        .filter_map(|e| match e {
            HookEvent::ValueChanged(change) => Some(change),
            _ => None,
        })
        .collect();
    assert_eq!(
        changes,
        vec![
            ValueChanged::Memory {
                start: BASE,
                addresses: vec![BASE + 2, BASE + 3],
            },
            ValueChanged::Memory {
                start: BASE + 2,
                addresses: vec![BASE + 2, BASE + 3],
            },
        ]
    );
}
