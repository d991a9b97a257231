//! Disassembly and source search paths.

use crate::debugger::frame::{parse_address, Place};
use crate::debugger::{Error, Target};
use crate::mi::{MiCommand, Tuple, Value};

/// Single machine instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub address: u64,
    pub function: Option<String>,
    /// Offset from the function start.
    pub offset: Option<u64>,
    /// Instruction text (mnemonic and operands).
    pub text: String,
}

impl Instruction {
    fn from_record(t: &Tuple) -> Option<Self> {
        Some(Self {
            address: t.get_str("address").and_then(parse_address)?,
            function: t.get_str("func-name").map(ToString::to_string),
            offset: t.get_parsed("offset"),
            text: t.get_str("inst").unwrap_or_default().to_string(),
        })
    }
}

/// Source line with the instructions generated for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixedInstruction {
    pub place: Place,
    pub instructions: Vec<Instruction>,
}

/// Disassembled range.
pub enum DisassemblyRange<'a> {
    /// Instructions in `[start, end)`.
    Address { start: u64, end: u64 },
    /// Instructions of `lines` source lines starting at a line, `None` means up to
    /// the end of the function.
    Line {
        file: &'a str,
        line: u32,
        lines: Option<u32>,
    },
}

impl DisassemblyRange<'_> {
    fn command(&self, mixed: bool) -> Result<MiCommand, Error> {
        let cmd = MiCommand::new("data-disassemble");
        let cmd = match self {
            DisassemblyRange::Address { start, end } => cmd
                .option("-s")
                .option(format!("{start:#x}"))
                .option("-e")
                .option(format!("{end:#x}")),
            DisassemblyRange::Line { file, line, lines } => {
                if file.trim().is_empty() {
                    return Err(Error::InvalidLocation(format!(":{line}")));
                }
                let lines = lines.map(|n| n as i64).unwrap_or(-1);
                cmd.option("-f")
                    .option(file.to_string())
                    .option("-l")
                    .option(line.to_string())
                    .option("-n")
                    .option(lines.to_string())
            }
        };
        Ok(cmd.param(if mixed { "1" } else { "0" }))
    }
}

impl Target {
    /// Machine instructions of a range.
    pub fn instructions(&self, range: &DisassemblyRange) -> Result<Vec<Instruction>, Error> {
        let reply = self.exec(&range.command(false)?)?;
        Ok(reply
            .results
            .get_items("asm_insns")
            .into_iter()
            .filter_map(Value::as_tuple)
            .filter_map(Instruction::from_record)
            .collect())
    }

    /// Machine instructions of a range grouped by source line.
    pub fn mixed_instructions(
        &self,
        range: &DisassemblyRange,
    ) -> Result<Vec<MixedInstruction>, Error> {
        let reply = self.exec(&range.command(true)?)?;
        Ok(reply
            .results
            .get_items("asm_insns")
            .into_iter()
            .filter_map(Value::as_tuple)
            .map(|line| MixedInstruction {
                place: Place::from_record(line),
                instructions: line
                    .get_items("line_asm_insn")
                    .into_iter()
                    .filter_map(Value::as_tuple)
                    .filter_map(Instruction::from_record)
                    .collect(),
            })
            .collect())
    }

    /// Directories searched for source files, in search order.
    pub fn source_paths(&self) -> Result<Vec<String>, Error> {
        let reply = self.exec(&MiCommand::new("environment-directory"))?;
        Ok(split_source_path(reply.field("source-path")?))
    }

    /// Prepend directories to the source search path.
    pub fn add_source_paths<I, S>(&self, paths: I) -> Result<Vec<String>, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let reply = self.exec(&MiCommand::new("environment-directory").params(paths))?;
        Ok(split_source_path(reply.field("source-path")?))
    }
}

fn split_source_path(path: &str) -> Vec<String> {
    path.split(':')
        .filter(|p| !p.is_empty())
        .map(ToString::to_string)
        .collect()
}
