use crate::debugger::frame::parse_address;
use crate::debugger::{Error, Target};
use crate::mi::{MiCommand, Tuple, Value};
use log::debug;
use once_cell::sync;
use regex::Regex;

/// Shared object mapped into the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedLibrary {
    pub name: String,
    /// Text section bounds, unknown until the library is loaded.
    pub from: Option<u64>,
    pub to: Option<u64>,
    pub symbols_loaded: bool,
}

impl SharedLibrary {
    fn from_record(t: &Tuple) -> Option<Self> {
        let name = t.get_str("target-name").or_else(|| t.get_str("id"))?;
        let range = t
            .get_items("ranges")
            .into_iter()
            .find_map(Value::as_tuple);
        Some(Self {
            name: name.to_string(),
            from: range.and_then(|r| r.get_str("from")).and_then(parse_address),
            to: range.and_then(|r| r.get_str("to")).and_then(parse_address),
            symbols_loaded: t.get_str("symbols-loaded") == Some("1"),
        })
    }
}

/// Parse `info sharedlibrary` output.
fn parse_info_sharedlibrary(text: &str) -> Vec<SharedLibrary> {
    static LIBRARY_RE: sync::Lazy<Regex> = sync::Lazy::new(|| {
        Regex::new(r"^(?:(0x[0-9a-fA-F]+)\s+(0x[0-9a-fA-F]+)\s+)?(Yes|No)(?: \(\*\))?\s+(\S.*)$")
            .expect("must compile")
    });

    text.lines()
        .filter_map(|line| LIBRARY_RE.captures(line.trim()))
        .map(|caps| SharedLibrary {
            name: caps[4].trim().to_string(),
            from: caps.get(1).and_then(|m| parse_address(m.as_str())),
            to: caps.get(2).and_then(|m| parse_address(m.as_str())),
            symbols_loaded: &caps[3] == "Yes",
        })
        .collect()
}

impl Target {
    /// Shared libraries currently known to the debugger.
    pub fn shared_libraries(&self) -> Result<Vec<SharedLibrary>, Error> {
        self.require(self.configuration().shared_libraries, "shared libraries")?;

        match self.exec(&MiCommand::new("file-list-shared-libraries")) {
            Ok(reply) => Ok(reply
                .results
                .get_items("shared-libraries")
                .into_iter()
                .filter_map(Value::as_tuple)
                .filter_map(SharedLibrary::from_record)
                .collect()),
            Err(e @ Error::Protocol { .. }) => {
                debug!(target: "debugger", "library list unavailable ({e}), fall back to cli");
                let reply = {
                    let _quiet = self.channel.quiet();
                    self.exec(&MiCommand::cli("info sharedlibrary"))?
                };
                Ok(parse_info_sharedlibrary(&reply.console_text()))
            }
            Err(e) => Err(e),
        }
    }

    /// Read symbols of libraries matching a regular expression.
    pub fn load_shared_library_symbols(&self, pattern: &str) -> Result<(), Error> {
        self.require(self.configuration().shared_libraries, "shared libraries")?;
        self.exec(&MiCommand::cli(format!("sharedlibrary {pattern}")))?;
        Ok(())
    }
}
