use crate::debugger::{Error, Target, ValueChanged};
use crate::mi::{MiCommand, Value};
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Register value as printed by the debugger in hexadecimal format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterValue {
    pub number: u32,
    pub name: String,
    pub value: String,
}

/// Register names and last known values of the current thread.
pub struct RegisterRegistry {
    autoupdate: AtomicBool,
    /// Indexed by register number, unnamed registers are empty.
    names: OnceCell<Vec<String>>,
    values: Mutex<HashMap<u32, String>>,
}

impl RegisterRegistry {
    pub(crate) fn new(autoupdate: bool) -> Self {
        Self {
            autoupdate: AtomicBool::new(autoupdate),
            names: OnceCell::new(),
            values: Mutex::default(),
        }
    }

    pub fn autoupdate(&self) -> bool {
        self.autoupdate.load(Ordering::SeqCst)
    }

    pub fn set_autoupdate(&self, autoupdate: bool) {
        self.autoupdate.store(autoupdate, Ordering::SeqCst)
    }
}

fn parse_values(items: Vec<&Value>) -> Vec<(u32, String)> {
    items
        .into_iter()
        .filter_map(Value::as_tuple)
        .filter_map(|t| Some((t.get_parsed("number")?, t.get_str("value")?.to_string())))
        .collect()
}

impl Target {
    pub fn register_autoupdate(&self) -> bool {
        self.registers.autoupdate()
    }

    pub fn set_register_autoupdate(&self, autoupdate: bool) {
        self.registers.set_autoupdate(autoupdate)
    }

    fn register_table(&self) -> Result<&[String], Error> {
        self.registers
            .names
            .get_or_try_init(|| {
                let reply = self.exec(&MiCommand::new("data-list-register-names"))?;
                Ok(reply
                    .results
                    .get_items("register-names")
                    .into_iter()
                    .map(|v| v.as_str().unwrap_or_default().to_string())
                    .collect())
            })
            .map(Vec::as_slice)
    }

    /// Names of target registers, queried once per session.
    pub fn register_names(&self) -> Result<Vec<String>, Error> {
        self.require(self.configuration().registers, "registers")?;
        Ok(self
            .register_table()?
            .iter()
            .filter(|name| !name.is_empty())
            .cloned()
            .collect())
    }

    fn register_number(&self, name: &str) -> Result<u32, Error> {
        let name = name.trim_start_matches('$');
        self.register_table()?
            .iter()
            .position(|n| n == name)
            .map(|pos| pos as u32)
            .ok_or_else(|| Error::RegisterNotFound(name.to_string()))
    }

    fn fetch_registers(&self, numbers: &[u32]) -> Result<Vec<RegisterValue>, Error> {
        let table = self.register_table()?;
        let mut cmd = MiCommand::new("data-list-register-values").param("x");
        for number in numbers {
            cmd = cmd.param(number.to_string());
        }
        let reply = self.exec(&cmd)?;

        let values = parse_values(reply.results.get_items("register-values"));
        let mut cache = self.registers.values.lock().unwrap();
        Ok(values
            .into_iter()
            .filter_map(|(number, value)| {
                let name = table.get(number as usize).filter(|n| !n.is_empty())?;
                cache.insert(number, value.clone());
                Some(RegisterValue {
                    number,
                    name: name.clone(),
                    value,
                })
            })
            .collect())
    }

    /// Values of all named registers in the current thread and frame.
    pub fn register_values(&self) -> Result<Vec<RegisterValue>, Error> {
        self.require(self.configuration().registers, "registers")?;
        self.guard_suspended()?;
        self.fetch_registers(&[])
    }

    pub fn register_value(&self, name: &str) -> Result<RegisterValue, Error> {
        self.require(self.configuration().registers, "registers")?;
        self.guard_suspended()?;
        let number = self.register_number(name)?;
        self.fetch_registers(&[number])?
            .pop()
            .ok_or_else(|| Error::RegisterNotFound(name.to_string()))
    }

    /// Assign a register, then run the update cascade.
    pub fn set_register_value(&self, name: &str, value: &str) -> Result<(), Error> {
        self.require(self.configuration().register_modification, "register modification")?;
        self.guard_suspended()?;
        let name = name.trim_start_matches('$');
        let number = self.register_number(name)?;

        self.exec(
            &MiCommand::new("gdb-set")
                .param("var")
                .param(format!("${name}={value}")),
        )?;
        let value = self
            .fetch_registers(&[number])?
            .pop()
            .map(|r| r.value)
            .unwrap_or_else(|| value.to_string());

        self.hooks.on_value_changed(&ValueChanged::Register {
            name: name.to_string(),
            value,
        });
        self.cascade_update();
        Ok(())
    }

    /// Fire change events for registers changed since the last query.
    pub fn update_registers(&self) -> Result<(), Error> {
        if !self.configuration().registers {
            return Ok(());
        }
        let reply = self.exec(&MiCommand::new("data-list-changed-registers"))?;
        let changed: Vec<u32> = reply
            .results
            .get_items("changed-registers")
            .into_iter()
            .filter_map(|v| v.as_str()?.parse().ok())
            .collect();
        if changed.is_empty() {
            return Ok(());
        }

        let previous = self.registers.values.lock().unwrap().clone();
        for register in self.fetch_registers(&changed)? {
            if previous.get(&register.number) != Some(&register.value) {
                self.hooks.on_value_changed(&ValueChanged::Register {
                    name: register.name,
                    value: register.value,
                });
            }
        }
        Ok(())
    }
}
