use clap::Parser;
use migdb::config::Config;
use migdb::console::AppBuilder;
use migdb::debugger::DebugeeSource;
use nix::unistd::Pid;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Attach to a running process
    #[arg(short, long, conflicts_with = "core")]
    attach: Option<i32>,

    /// Open a core file, the program is required
    #[arg(long, requires = "program")]
    core: Option<PathBuf>,

    /// Config file, `~/.config/migdb/config.toml` by default
    #[arg(long, env = "MIGDB_CONFIG")]
    config: Option<PathBuf>,

    /// Reply timeout for a single debugger command, in milliseconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Log every command sent to the debugger and every record read back
    #[arg(long)]
    trace: bool,

    /// Debugged program
    program: Option<PathBuf>,

    /// Program arguments
    #[arg(last = true)]
    args: Vec<String>,
}

impl Args {
    fn source(&self) -> anyhow::Result<DebugeeSource> {
        if let Some(pid) = self.attach {
            return Ok(DebugeeSource::Process {
                pid: Pid::from_raw(pid),
                program: self.program.clone(),
            });
        }

        let Some(program) = self.program.clone() else {
            anyhow::bail!("program, --attach or --core expected");
        };
        Ok(match &self.core {
            Some(core) => DebugeeSource::Core {
                program,
                core: core.clone(),
            },
            None => DebugeeSource::File {
                path: program,
                args: self.args.clone(),
                cwd: None,
            },
        })
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref());
    if let Some(timeout) = args.timeout {
        config.command_timeout_ms = timeout;
    }
    if args.trace {
        migdb::log::enable();
    }

    let app = AppBuilder::new(config).build(args.source()?)?;
    app.run()
}
