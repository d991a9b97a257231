use crate::debugger::{Error, Target};
use crate::mi::MiCommand;
use once_cell::sync;
use regex::Regex;

/// How the debugger treats a signal delivered to the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signal {
    pub name: String,
    pub stop: bool,
    pub print: bool,
    /// Signal is passed to the program on resume.
    pub pass: bool,
    pub description: String,
}

/// Parse the signal table printed by `info signals` and `handle`.
fn parse_signal_table(text: &str) -> Vec<Signal> {
    static SIGNAL_RE: sync::Lazy<Regex> = sync::Lazy::new(|| {
        Regex::new(r"^(\S+)\s+(Yes|No)\s+(Yes|No)\s+(Yes|No)\s*(.*)$").expect("must compile")
    });

    text.lines()
        .filter_map(|line| SIGNAL_RE.captures(line.trim()))
        .map(|caps| Signal {
            name: caps[1].to_string(),
            stop: &caps[2] == "Yes",
            print: &caps[3] == "Yes",
            pass: &caps[4] == "Yes",
            description: caps[5].trim().to_string(),
        })
        .collect()
}

impl Target {
    /// Signal table of the debugger.
    pub fn signals(&self) -> Result<Vec<Signal>, Error> {
        let reply = {
            let _quiet = self.channel.quiet();
            self.exec(&MiCommand::cli("info signals"))?
        };
        Ok(parse_signal_table(&reply.console_text()))
    }

    /// Change how a signal is handled, return the resulting table entry.
    pub fn handle_signal(&self, name: &str, stop: bool, pass: bool) -> Result<Signal, Error> {
        // stopping implies printing, a silent signal can't stop
        let print = if stop { "print" } else { "noprint" };
        let stop = if stop { "stop" } else { "nostop" };
        let pass = if pass { "pass" } else { "nopass" };

        let reply = {
            let _quiet = self.channel.quiet();
            self.exec(&MiCommand::cli(format!("handle {name} {stop} {print} {pass}")))?
        };
        parse_signal_table(&reply.console_text())
            .into_iter()
            .find(|s| s.name == name)
            .ok_or(Error::MissingField("signal"))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_signal_table() {
        let text = "Signal        Stop\tPrint\tPass to program\tDescription\n\
                    \n\
                    SIGHUP        Yes\tYes\tYes\t\tHangup\n\
                    SIGINT        Yes\tYes\tNo\t\tInterrupt\n\
                    SIGALRM       No\tNo\tYes\t\tAlarm clock\n\
                    \n\
                    Use the \"handle\" command to change these tables.\n";

        let signals = parse_signal_table(text);
        let names: Vec<&str> = signals.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["SIGHUP", "SIGINT", "SIGALRM"]);
        assert_eq!(
            signals[1],
            Signal {
                name: "SIGINT".to_string(),
                stop: true,
                print: true,
                pass: false,
                description: "Interrupt".to_string(),
            }
        );
        assert!(!signals[2].stop && signals[2].pass);
        assert_eq!(signals[2].description, "Alarm clock");
    }
}
