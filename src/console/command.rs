//! Console commands and their parser.

use crate::debugger::{BreakpointKind, Location, Watch, WatchAccess};
use anyhow::anyhow;
use chumsky::error::Rich;
use chumsky::prelude::{any, choice, end, just};
use chumsky::{extra, text, Boxed, IterParser, Parser};

pub const RUN_COMMAND: &str = "run";
pub const RUN_COMMAND_SHORT: &str = "r";
pub const CONTINUE_COMMAND: &str = "continue";
pub const CONTINUE_COMMAND_SHORT: &str = "c";
pub const SIGNAL_COMMAND: &str = "signal";
pub const INTERRUPT_COMMAND: &str = "interrupt";
pub const STEP_COMMAND: &str = "step";
pub const STEP_COMMAND_SHORT: &str = "s";
pub const NEXT_COMMAND: &str = "next";
pub const NEXT_COMMAND_SHORT: &str = "n";
pub const STEPI_COMMAND: &str = "stepi";
pub const STEPI_COMMAND_SHORT: &str = "si";
pub const NEXTI_COMMAND: &str = "nexti";
pub const NEXTI_COMMAND_SHORT: &str = "ni";
pub const FINISH_COMMAND: &str = "finish";
pub const RETURN_COMMAND: &str = "return";
pub const UNTIL_COMMAND: &str = "until";
pub const JUMP_COMMAND: &str = "jump";
pub const BREAK_COMMAND: &str = "break";
pub const BREAK_COMMAND_SHORT: &str = "b";
pub const TBREAK_COMMAND: &str = "tbreak";
pub const WATCH_COMMAND: &str = "watch";
pub const RWATCH_COMMAND: &str = "rwatch";
pub const AWATCH_COMMAND: &str = "awatch";
pub const CATCH_COMMAND: &str = "catch";
pub const DELETE_COMMAND: &str = "delete";
pub const DELETE_COMMAND_SHORT: &str = "d";
pub const ENABLE_COMMAND: &str = "enable";
pub const DISABLE_COMMAND: &str = "disable";
pub const CONDITION_COMMAND: &str = "condition";
pub const BREAKPOINTS_COMMAND: &str = "breakpoints";
pub const THREADS_COMMAND: &str = "threads";
pub const THREAD_COMMAND: &str = "thread";
pub const BACKTRACE_COMMAND: &str = "backtrace";
pub const BACKTRACE_COMMAND_SHORT: &str = "bt";
pub const FRAME_COMMAND: &str = "frame";
pub const FRAME_COMMAND_SHORT: &str = "f";
pub const PRINT_COMMAND: &str = "print";
pub const PRINT_COMMAND_SHORT: &str = "p";
pub const LOCALS_COMMAND: &str = "locals";
pub const ARGS_COMMAND: &str = "args";
pub const SET_VAR_COMMAND: &str = "set var";
pub const EXAMINE_COMMAND: &str = "x";
pub const REGISTERS_COMMAND: &str = "registers";
pub const REGISTERS_COMMAND_SHORT: &str = "reg";
pub const SHARED_LIBS_COMMAND: &str = "sharedlib";
pub const SIGNALS_COMMAND: &str = "signals";
pub const HANDLE_COMMAND: &str = "handle";
pub const DISASM_COMMAND: &str = "disasm";
pub const DIRECTORY_COMMAND: &str = "directory";
pub const DETACH_COMMAND: &str = "detach";
pub const KILL_COMMAND: &str = "kill";
pub const HELP_COMMAND: &str = "help";
pub const HELP_COMMAND_SHORT: &str = "h";

/// Bytes shown by `x` without an explicit length.
pub const DEFAULT_EXAMINE_LEN: usize = 16;

/// Console command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Run,
    Continue,
    Signal(String),
    Interrupt,
    Step(u32),
    Next(u32),
    StepInstruction(u32),
    NextInstruction(u32),
    Finish,
    Return(Option<String>),
    Until(Location),
    Jump(Location),
    Break {
        kind: BreakpointKind,
        temporary: bool,
    },
    Delete(Option<u32>),
    Enable(u32),
    Disable(u32),
    Condition {
        id: u32,
        expression: Option<String>,
    },
    Breakpoints,
    Threads,
    Thread(u32),
    Backtrace,
    Frame(Option<u32>),
    Print(String),
    Locals,
    Args,
    SetVar {
        expression: String,
        value: String,
    },
    Examine {
        expression: String,
        length: usize,
    },
    Registers(Option<String>),
    SharedLibs,
    Signals,
    Handle {
        signal: String,
        stop: bool,
        pass: bool,
    },
    /// Disassemble the function of the selected frame, with source lines if `mixed`.
    Disasm {
        mixed: bool,
    },
    /// Show the source search path, or prepend directories to it.
    Directory(Vec<String>),
    Detach,
    Kill,
    SkipInput,
    Help(Option<String>),
}

type Err<'a> = extra::Err<Rich<'a, char>>;

fn number<'a>() -> impl Parser<'a, &'a str, u32, Err<'a>> {
    text::int(10)
        .from_str()
        .unwrapped()
        .padded()
        .labelled("number")
}

/// Everything up to the end of input, trimmed. Fails on blank input.
fn rest<'a>() -> impl Parser<'a, &'a str, String, Err<'a>> {
    any()
        .repeated()
        .at_least(1)
        .to_slice()
        .try_map(|s: &str, span| {
            let s = s.trim();
            if s.is_empty() {
                Err(Rich::custom(span, "argument expected"))
            } else {
                Ok(s.to_string())
            }
        })
}

fn location<'a>() -> impl Parser<'a, &'a str, Location, Err<'a>> {
    rest()
        .try_map(|s, span| s.parse::<Location>().map_err(|e| Rich::custom(span, e)))
        .labelled("location")
}

fn breakpoint_kind(location: Location) -> BreakpointKind {
    match location {
        Location::Line { file, line } => BreakpointKind::Line { file, line },
        Location::Function { file, function } => BreakpointKind::Function { file, function },
        Location::Address(addr) => BreakpointKind::Address(addr),
    }
}

fn catch_kind(keyword: &str, arg: Option<String>) -> BreakpointKind {
    match keyword {
        "throw" => BreakpointKind::Exception {
            throw: true,
            catch: false,
        },
        "catch" => BreakpointKind::Exception {
            throw: false,
            catch: true,
        },
        _ => BreakpointKind::Catch {
            keyword: keyword.to_string(),
            arg,
        },
    }
}

fn command<'a, I>(ctx: &'static str, inner: I) -> Boxed<'a, 'a, &'a str, Command, Err<'a>>
where
    I: Parser<'a, &'a str, Command, Err<'a>> + 'a,
{
    inner.then_ignore(end()).labelled(ctx).boxed()
}

impl Command {
    /// Parse input string into command.
    pub fn parse(input: &str) -> anyhow::Result<Command> {
        if input.trim().is_empty() {
            return Ok(Command::SkipInput);
        }
        Self::parser()
            .parse(input)
            .into_result()
            .map_err(|e| anyhow!("{}", e[0]))
    }

    fn parser<'a>() -> impl Parser<'a, &'a str, Command, Err<'a>> {
        let op = |sym| just(sym).padded();
        let op2 = |full, short| op(full).or(op(short));
        // keyword followed by an argument
        let kw = |sym| {
            text::whitespace()
                .ignore_then(just(sym))
                .then_ignore(text::whitespace().at_least(1))
        };
        let kw2 = |full, short| kw(full).or(kw(short));

        let run = op2(RUN_COMMAND, RUN_COMMAND_SHORT).to(Command::Run);
        let r#continue = op2(CONTINUE_COMMAND, CONTINUE_COMMAND_SHORT).to(Command::Continue);
        let signal = kw(SIGNAL_COMMAND)
            .ignore_then(text::ident().padded())
            .map(|name: &str| Command::Signal(name.to_string()))
            .boxed();
        let interrupt = op(INTERRUPT_COMMAND).to(Command::Interrupt);

        let count = || number().or_not().map(|n| n.unwrap_or(1));
        let step = op2(STEP_COMMAND, STEP_COMMAND_SHORT)
            .ignore_then(count())
            .map(Command::Step)
            .boxed();
        let next = op2(NEXT_COMMAND, NEXT_COMMAND_SHORT)
            .ignore_then(count())
            .map(Command::Next)
            .boxed();
        let stepi = op2(STEPI_COMMAND, STEPI_COMMAND_SHORT)
            .ignore_then(count())
            .map(Command::StepInstruction)
            .boxed();
        let nexti = op2(NEXTI_COMMAND, NEXTI_COMMAND_SHORT)
            .ignore_then(count())
            .map(Command::NextInstruction)
            .boxed();
        let finish = op(FINISH_COMMAND).to(Command::Finish);
        let r#return = choice((
            kw(RETURN_COMMAND).ignore_then(rest()).map(Some),
            op(RETURN_COMMAND).to(None),
        ))
        .map(Command::Return)
        .boxed();
        let until = kw(UNTIL_COMMAND)
            .ignore_then(location())
            .map(Command::Until)
            .boxed();
        let jump = kw(JUMP_COMMAND)
            .ignore_then(location())
            .map(Command::Jump)
            .boxed();

        let r#break = kw2(BREAK_COMMAND, BREAK_COMMAND_SHORT)
            .ignore_then(location())
            .map(|loc| Command::Break {
                kind: breakpoint_kind(loc),
                temporary: false,
            })
            .boxed();
        let tbreak = kw(TBREAK_COMMAND)
            .ignore_then(location())
            .map(|loc| Command::Break {
                kind: breakpoint_kind(loc),
                temporary: true,
            })
            .boxed();

        let watch = choice((
            kw(WATCH_COMMAND).to(WatchAccess::Write),
            kw(RWATCH_COMMAND).to(WatchAccess::Read),
            kw(AWATCH_COMMAND).to(WatchAccess::Access),
        ))
        .then(rest())
        .map(|(access, expr)| Command::Break {
            kind: BreakpointKind::Watch(Watch::new(&expr, access)),
            temporary: false,
        })
        .boxed();

        let catch = kw(CATCH_COMMAND)
            .ignore_then(text::ident().padded())
            .then(rest().or_not())
            .map(|(keyword, arg): (&str, _)| Command::Break {
                kind: catch_kind(keyword, arg),
                temporary: false,
            })
            .boxed();

        let delete = op2(DELETE_COMMAND, DELETE_COMMAND_SHORT)
            .ignore_then(number().or_not())
            .map(Command::Delete)
            .boxed();
        let enable = op(ENABLE_COMMAND)
            .ignore_then(number())
            .map(Command::Enable)
            .boxed();
        let disable = op(DISABLE_COMMAND)
            .ignore_then(number())
            .map(Command::Disable)
            .boxed();
        let condition = op(CONDITION_COMMAND)
            .ignore_then(number())
            .then(rest().or_not())
            .map(|(id, expression)| Command::Condition { id, expression })
            .boxed();
        let breakpoints = op(BREAKPOINTS_COMMAND).to(Command::Breakpoints);

        let threads = op(THREADS_COMMAND).to(Command::Threads);
        let thread = op(THREAD_COMMAND)
            .ignore_then(number())
            .map(Command::Thread)
            .boxed();
        let backtrace = op2(BACKTRACE_COMMAND, BACKTRACE_COMMAND_SHORT).to(Command::Backtrace);
        let frame = op2(FRAME_COMMAND, FRAME_COMMAND_SHORT)
            .ignore_then(number().or_not())
            .map(Command::Frame)
            .boxed();

        let print = kw2(PRINT_COMMAND, PRINT_COMMAND_SHORT)
            .ignore_then(rest())
            .map(Command::Print)
            .boxed();
        let locals = op(LOCALS_COMMAND).to(Command::Locals);
        let args = op(ARGS_COMMAND).to(Command::Args);
        let set_var = op("set")
            .then(kw("var"))
            .ignore_then(
                any()
                    .filter(|c: &char| *c != '=')
                    .repeated()
                    .at_least(1)
                    .to_slice(),
            )
            .then_ignore(just('='))
            .then(rest())
            .map(|(expression, value): (&str, String)| Command::SetVar {
                expression: expression.trim().to_string(),
                value,
            })
            .boxed();
        let examine = text::whitespace()
            .ignore_then(just(EXAMINE_COMMAND))
            .ignore_then(
                just('/')
                    .ignore_then(text::int(10).from_str().unwrapped())
                    .or_not(),
            )
            .then_ignore(text::whitespace().at_least(1))
            .then(rest())
            .map(|(length, expression): (Option<usize>, String)| Command::Examine {
                expression,
                length: length.unwrap_or(DEFAULT_EXAMINE_LEN),
            })
            .boxed();
        let registers = op2(REGISTERS_COMMAND, REGISTERS_COMMAND_SHORT)
            .ignore_then(
                just('$')
                    .or_not()
                    .ignore_then(text::ident())
                    .padded()
                    .or_not(),
            )
            .map(|name: Option<&str>| Command::Registers(name.map(ToString::to_string)))
            .boxed();

        let shared_libs = op(SHARED_LIBS_COMMAND).to(Command::SharedLibs);
        let signals = op(SIGNALS_COMMAND).to(Command::Signals);
        let handle = kw(HANDLE_COMMAND)
            .ignore_then(text::ident().padded())
            .then(choice((op("stop").to(true), op("nostop").to(false))))
            .then(choice((op("pass").to(true), op("nopass").to(false))))
            .map(|((signal, stop), pass): ((&str, bool), bool)| Command::Handle {
                signal: signal.to_string(),
                stop,
                pass,
            })
            .boxed();
        let disasm = op(DISASM_COMMAND)
            .ignore_then(just("/s").padded().or_not())
            .map(|source| Command::Disasm {
                mixed: source.is_some(),
            })
            .boxed();
        let directory = op(DIRECTORY_COMMAND)
            .ignore_then(
                any()
                    .filter(|c: &char| !c.is_whitespace())
                    .repeated()
                    .at_least(1)
                    .to_slice()
                    .map(ToString::to_string)
                    .padded()
                    .repeated()
                    .collect::<Vec<_>>(),
            )
            .map(Command::Directory)
            .boxed();

        let detach = op(DETACH_COMMAND).to(Command::Detach);
        let kill = op(KILL_COMMAND).to(Command::Kill);
        let help = op2(HELP_COMMAND, HELP_COMMAND_SHORT)
            .ignore_then(text::ident().padded().or_not())
            .map(|s: Option<&str>| Command::Help(s.map(ToOwned::to_owned)))
            .boxed();

        choice((
            command(RUN_COMMAND, run),
            command(CONTINUE_COMMAND, r#continue),
            command(SIGNAL_COMMAND, signal),
            command(INTERRUPT_COMMAND, interrupt),
            command(STEPI_COMMAND, stepi),
            command(NEXTI_COMMAND, nexti),
            command(STEP_COMMAND, step),
            command(NEXT_COMMAND, next),
            command(FINISH_COMMAND, finish),
            command(RETURN_COMMAND, r#return),
            command(UNTIL_COMMAND, until),
            command(JUMP_COMMAND, jump),
            command(BACKTRACE_COMMAND, backtrace),
            command(BREAKPOINTS_COMMAND, breakpoints),
            command(TBREAK_COMMAND, tbreak),
            command(BREAK_COMMAND, r#break),
            command(WATCH_COMMAND, watch),
            command(CATCH_COMMAND, catch),
            command(DELETE_COMMAND, delete),
            command(DETACH_COMMAND, detach),
            command(DISABLE_COMMAND, disable),
            command(ENABLE_COMMAND, enable),
            command(CONDITION_COMMAND, condition),
            command(THREADS_COMMAND, threads),
            command(THREAD_COMMAND, thread),
            choice((
                command(FRAME_COMMAND, frame),
                command(PRINT_COMMAND, print),
                command(LOCALS_COMMAND, locals),
                command(ARGS_COMMAND, args),
                command(SET_VAR_COMMAND, set_var),
                command(EXAMINE_COMMAND, examine),
                command(REGISTERS_COMMAND, registers),
                command(SHARED_LIBS_COMMAND, shared_libs),
                command(SIGNALS_COMMAND, signals),
                command(HANDLE_COMMAND, handle),
                command(DISASM_COMMAND, disasm),
                command(DIRECTORY_COMMAND, directory),
                command(KILL_COMMAND, kill),
                command(HELP_COMMAND, help),
            )),
        ))
        .map_err(|e| {
            let span = e.span();
            if span.start == 0 && span.end == 0 {
                Rich::custom(*e.span(), "type help for list of commands")
            } else {
                e
            }
        })
    }
}
