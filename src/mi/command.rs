use std::borrow::Cow;
use std::fmt::{Display, Formatter};

/// A machine interface command: `-operation [options] [--] [parameters]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiCommand {
    operation: String,
    options: Vec<String>,
    parameters: Vec<String>,
}

impl MiCommand {
    /// Create command for an operation name without leading dash (`exec-next`).
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            options: vec![],
            parameters: vec![],
        }
    }

    /// CLI command executed by the console interpreter.
    ///
    /// Unlike raw CLI input, the command keeps its correlation token and any
    /// console output it produces is attached to its reply.
    pub fn cli(line: impl Into<String>) -> Self {
        Self::new("interpreter-exec")
            .param("console")
            .param(line)
    }

    pub fn option(mut self, option: impl Into<String>) -> Self {
        self.options.push(option.into());
        self
    }

    pub fn option_if(self, cond: bool, option: impl Into<String>) -> Self {
        if cond {
            self.option(option)
        } else {
            self
        }
    }

    pub fn param(mut self, param: impl Into<String>) -> Self {
        self.parameters.push(param.into());
        self
    }

    pub fn params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameters.extend(params.into_iter().map(Into::into));
        self
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn is_cli(&self) -> bool {
        self.operation == "interpreter-exec"
    }

    /// Wire line (without terminator) for a given correlation token.
    pub fn encode(&self, token: u64) -> String {
        format!("{token}{self}")
    }
}

impl Display for MiCommand {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "-{}", self.operation)?;
        for opt in &self.options {
            write!(f, " {}", quote(opt))?;
        }
        if !self.options.is_empty() && self.parameters.iter().any(|p| p.starts_with('-')) {
            f.write_str(" --")?;
        }
        for param in &self.parameters {
            write!(f, " {}", quote(param))?;
        }
        Ok(())
    }
}

fn quote(s: &str) -> Cow<'_, str> {
    let needs_quotes =
        s.is_empty() || s.chars().any(|c| c.is_whitespace() || c == '"' || c == '\\');
    if !needs_quotes {
        return Cow::Borrowed(s);
    }

    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('"');
    for c in s.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            _ => quoted.push(c),
        }
    }
    quoted.push('"');
    Cow::Owned(quoted)
}
