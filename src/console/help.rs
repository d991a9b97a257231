pub const HELP: &str = r#"
Available debugger commands:

r, run                                      -- start or restart the program
c, continue                                 -- continue the program after a stop
signal <name>                               -- continue and deliver a signal
interrupt                                   -- stop a running program
s, step [n]                                 -- step into the next source line
n, next [n]                                 -- step over subroutine calls
si, stepi [n]                               -- step one instruction
ni, nexti [n]                               -- step one instruction over calls
finish                                      -- run until the selected frame returns
return [value]                              -- pop the selected frame
until <location>                            -- run until a location is reached
jump <location>                             -- resume at a location
b, break <location>                         -- set a breakpoint
tbreak <location>                           -- set a temporary breakpoint
watch|rwatch|awatch <expr>                  -- set a watchpoint
catch <event> [arg]                         -- set a catchpoint
d, delete [id]                              -- delete one or all breakpoints
enable|disable <id>                         -- enable or disable a breakpoint
condition <id> [expr]                       -- set or clear a breakpoint condition
breakpoints                                 -- list breakpoints
threads                                     -- list threads
thread <id>                                 -- switch current thread
bt, backtrace                               -- print the current thread stack
f, frame [n]                                -- print or select a stack frame
p, print <expr>                             -- evaluate an expression
locals, args                                -- print frame variables
set var <expr> = <value>                    -- assign a variable
x[/len] <expr>                              -- examine memory at an address
reg, registers [name]                       -- print registers
sharedlib                                   -- list loaded shared libraries
signals                                     -- print the signal table
handle <signal> stop|nostop pass|nopass     -- change how a signal is handled
disasm [/s]                                 -- disassemble the current function
directory [dir..]                           -- show or extend the source path
detach                                      -- detach from an attached process
kill                                        -- kill the program
h, help [command]                           -- show help
q, quit                                     -- exit migdb
"#;

pub const HELP_LOCATION: &str = "\
\x1b[32;1mlocation\x1b[0m
A location is one of:
<file>:<line>  - source line, the file part is required
[<file>:]<fn>  - function, optionally qualified by a file
*<address>     - machine address, like *0x401136
";

pub const HELP_BREAK: &str = "\
\x1b[32;1mbreak\x1b[0m
Set a breakpoint at a location (see `help location`).
A breakpoint the debugger can't resolve yet (code in a library not loaded so far)
is kept pending and inserted on the next stop or library load.

Examples of usage:
break main.c:12
b parse_args
tbreak *0x401136
";

pub const HELP_CATCH: &str = "\
\x1b[32;1mcatch\x1b[0m
Stop on an event.

catch throw|catch         - stop when a C++ exception is thrown or caught
catch fork|vfork|exec     - stop on process events
catch syscall [name]      - stop on system calls
catch signal [name]       - stop on signal delivery
catch load|unload [lib]   - stop on shared library events
";

pub const HELP_EXAMINE: &str = "\
\x1b[32;1mx\x1b[0m
Examine memory at the address an expression evaluates to, 16 bytes by default.
Unreadable bytes are shown as `??`.

Examples of usage:
x &counter
x/64 buf
";

pub fn help_for_command(command: Option<&str>) -> &'static str {
    match command {
        Some("location") => HELP_LOCATION,
        Some("break") | Some("b") | Some("tbreak") => HELP_BREAK,
        Some("catch") => HELP_CATCH,
        Some("x") => HELP_EXAMINE,
        _ => HELP,
    }
}
