use crate::console::command::{
    ARGS_COMMAND, AWATCH_COMMAND, BACKTRACE_COMMAND, BACKTRACE_COMMAND_SHORT, BREAKPOINTS_COMMAND,
    BREAK_COMMAND, BREAK_COMMAND_SHORT, CATCH_COMMAND, CONDITION_COMMAND, CONTINUE_COMMAND,
    CONTINUE_COMMAND_SHORT, DELETE_COMMAND, DELETE_COMMAND_SHORT, DETACH_COMMAND, DIRECTORY_COMMAND,
    DISABLE_COMMAND, DISASM_COMMAND, HANDLE_COMMAND, SHARED_LIBS_COMMAND, SIGNALS_COMMAND,
    ENABLE_COMMAND, EXAMINE_COMMAND, FINISH_COMMAND, FRAME_COMMAND, FRAME_COMMAND_SHORT,
    HELP_COMMAND, HELP_COMMAND_SHORT, INTERRUPT_COMMAND, JUMP_COMMAND, KILL_COMMAND,
    LOCALS_COMMAND, NEXTI_COMMAND, NEXTI_COMMAND_SHORT, NEXT_COMMAND, NEXT_COMMAND_SHORT,
    PRINT_COMMAND, PRINT_COMMAND_SHORT, REGISTERS_COMMAND, REGISTERS_COMMAND_SHORT,
    RETURN_COMMAND, RUN_COMMAND, RUN_COMMAND_SHORT, RWATCH_COMMAND, SET_VAR_COMMAND,
    SIGNAL_COMMAND, STEPI_COMMAND, STEPI_COMMAND_SHORT, STEP_COMMAND, STEP_COMMAND_SHORT,
    TBREAK_COMMAND, THREADS_COMMAND, THREAD_COMMAND, UNTIL_COMMAND, WATCH_COMMAND,
};
use crossterm::style::{Color, Stylize};
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::HistoryHinter;
use rustyline::history::MemHistory;
use rustyline::{CompletionType, Config, Context, Editor};
use rustyline_derive::{Completer, Helper, Hinter, Validator};
use std::borrow::Cow;
use std::borrow::Cow::{Borrowed, Owned};

struct CommandView {
    short: Option<&'static str>,
    long: &'static str,
}

impl CommandView {
    fn display_with_short(&self) -> String {
        match self.short {
            Some(short) if self.long.starts_with(short) => format!(
                "{}{}",
                short.bold().underlined(),
                &self.long[short.len()..]
            ),
            Some(short) => format!("{}|{}", self.long, short.bold().underlined()),
            None => self.long.to_string(),
        }
    }
}

impl From<&'static str> for CommandView {
    fn from(long: &'static str) -> Self {
        CommandView { short: None, long }
    }
}

impl From<(&'static str, &'static str)> for CommandView {
    fn from((short, long): (&'static str, &'static str)) -> Self {
        CommandView {
            short: Some(short),
            long,
        }
    }
}

pub struct CommandCompleter {
    commands: Vec<CommandView>,
}

impl CommandCompleter {
    fn new(commands: impl IntoIterator<Item = CommandView>) -> Self {
        Self {
            commands: commands.into_iter().collect(),
        }
    }
}

impl Completer for CommandCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        _pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Self::Candidate>)> {
        let pairs = self
            .commands
            .iter()
            .filter(|cmd| cmd.long.starts_with(line))
            .map(|cmd| Pair {
                display: cmd.display_with_short(),
                replacement: cmd.long.to_string(),
            })
            .collect();
        Ok((0, pairs))
    }
}

#[derive(Helper, Completer, Hinter, Validator)]
pub struct RLHelper {
    #[rustyline(Completer)]
    completer: CommandCompleter,
    #[rustyline(Hinter)]
    hinter: HistoryHinter,
    colored_prompt: String,
}

impl Highlighter for RLHelper {
    fn highlight_prompt<'b, 's: 'b, 'p: 'b>(
        &'s self,
        prompt: &'p str,
        default: bool,
    ) -> Cow<'b, str> {
        if default {
            Borrowed(&self.colored_prompt)
        } else {
            Borrowed(prompt)
        }
    }

    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Owned(format!("{}", hint.with(Color::Grey)))
    }
}

pub type MiEditor = Editor<RLHelper, MemHistory>;

pub fn create_editor(prompt: &str) -> anyhow::Result<MiEditor> {
    let config = Config::builder()
        .history_ignore_space(true)
        .completion_type(CompletionType::List)
        .build();

    let commands = [
        (RUN_COMMAND_SHORT, RUN_COMMAND).into(),
        (CONTINUE_COMMAND_SHORT, CONTINUE_COMMAND).into(),
        SIGNAL_COMMAND.into(),
        INTERRUPT_COMMAND.into(),
        (STEP_COMMAND_SHORT, STEP_COMMAND).into(),
        (NEXT_COMMAND_SHORT, NEXT_COMMAND).into(),
        (STEPI_COMMAND_SHORT, STEPI_COMMAND).into(),
        (NEXTI_COMMAND_SHORT, NEXTI_COMMAND).into(),
        FINISH_COMMAND.into(),
        RETURN_COMMAND.into(),
        UNTIL_COMMAND.into(),
        JUMP_COMMAND.into(),
        (BREAK_COMMAND_SHORT, BREAK_COMMAND).into(),
        TBREAK_COMMAND.into(),
        WATCH_COMMAND.into(),
        RWATCH_COMMAND.into(),
        AWATCH_COMMAND.into(),
        CATCH_COMMAND.into(),
        (DELETE_COMMAND_SHORT, DELETE_COMMAND).into(),
        ENABLE_COMMAND.into(),
        DISABLE_COMMAND.into(),
        CONDITION_COMMAND.into(),
        BREAKPOINTS_COMMAND.into(),
        THREADS_COMMAND.into(),
        THREAD_COMMAND.into(),
        (BACKTRACE_COMMAND_SHORT, BACKTRACE_COMMAND).into(),
        (FRAME_COMMAND_SHORT, FRAME_COMMAND).into(),
        (PRINT_COMMAND_SHORT, PRINT_COMMAND).into(),
        LOCALS_COMMAND.into(),
        ARGS_COMMAND.into(),
        SET_VAR_COMMAND.into(),
        EXAMINE_COMMAND.into(),
        (REGISTERS_COMMAND_SHORT, REGISTERS_COMMAND).into(),
        SHARED_LIBS_COMMAND.into(),
        SIGNALS_COMMAND.into(),
        HANDLE_COMMAND.into(),
        DISASM_COMMAND.into(),
        DIRECTORY_COMMAND.into(),
        DETACH_COMMAND.into(),
        KILL_COMMAND.into(),
        (HELP_COMMAND_SHORT, HELP_COMMAND).into(),
        ("q", "quit").into(),
    ];

    let h = RLHelper {
        completer: CommandCompleter::new(commands),
        hinter: HistoryHinter {},
        colored_prompt: format!("{}", prompt.to_string().green()),
    };

    let mut editor = Editor::with_history(config, MemHistory::new())?;
    editor.set_helper(Some(h));

    Ok(editor)
}
