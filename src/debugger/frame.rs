use crate::mi::Tuple;
use std::fmt::{Display, Formatter};

/// Parse `0x`-prefixed hex or decimal address, trailing symbol info is ignored.
///
/// Pointer values may carry a type prefix: `(char (*)[6]) 0x601040 <buf>`.
pub(crate) fn parse_address(s: &str) -> Option<u64> {
    let s = s
        .split_whitespace()
        .find(|t| t.starts_with("0x") || t.starts_with("0X"))
        .or_else(|| s.split_whitespace().next())?;
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

/// Source and machine location of a frame or a stop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Place {
    pub address: Option<u64>,
    pub function: Option<String>,
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl Place {
    pub fn from_record(record: &Tuple) -> Self {
        Self {
            address: record.get_str("addr").and_then(parse_address),
            function: record.get_str("func").map(ToString::to_string),
            file: record
                .get_str("fullname")
                .or_else(|| record.get_str("file"))
                .map(ToString::to_string),
            line: record.get_parsed("line"),
        }
    }
}

impl Display for Place {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(addr) = self.address {
            write!(f, "{addr:#018x}")?;
        }
        if let Some(func) = &self.function {
            write!(f, " in {func}")?;
        }
        if let (Some(file), Some(line)) = (&self.file, self.line) {
            write!(f, " at {file}:{line}")?;
        }
        Ok(())
    }
}

/// A frame of some thread call stack.
///
/// Frame levels are session levels: the innermost frame has level `depth`, frames
/// further from the top have smaller numbers. Wire numbering restarts from zero on
/// each stop which makes frames of recursive calls indistinguishable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub thread: u32,
    pub level: u32,
    /// Stack depth at the moment of the query.
    pub depth: u32,
    pub place: Place,
}

impl StackFrame {
    pub fn from_record(thread: u32, depth: u32, record: &Tuple) -> Self {
        let wire_level: u32 = record.get_parsed("level").unwrap_or_default();
        Self {
            thread,
            level: depth.saturating_sub(wire_level),
            depth,
            place: Place::from_record(record),
        }
    }

    /// Frame number as the debugger counts it (innermost is 0).
    pub fn wire_level(&self) -> u32 {
        self.depth.saturating_sub(self.level)
    }

    pub fn is_innermost(&self) -> bool {
        self.wire_level() == 0
    }

    /// Two frames denote the same activation (same thread and level, same stop).
    pub fn same_activation(&self, other: &StackFrame) -> bool {
        self.thread == other.thread && self.level == other.level && self.depth == other.depth
    }
}
