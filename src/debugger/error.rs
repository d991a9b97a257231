use nix::unistd::Pid;
use std::num::ParseIntError;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // --------------------------------- generic errors --------------------------------------------
    #[error(transparent)]
    IO(#[from] std::io::Error),
    #[error(transparent)]
    ParseInt(#[from] ParseIntError),

    // --------------------------------- protocol errors -------------------------------------------
    #[error("no reply to `{0}` within {1:?}")]
    ProtocolTimeout(String, Duration),
    #[error("`{command}` failed: {message}")]
    Protocol { command: String, message: String },
    #[error("malformed reply: {0}")]
    MalformedReply(String),
    #[error("debugger connection closed")]
    ChannelClosed,
    #[error("target is not responding")]
    TargetNotResponding,
    #[error("field `{0}` missing in reply")]
    MissingField(&'static str),

    // --------------------------------- target guards ---------------------------------------------
    #[error("target already running")]
    AlreadyRunning,
    #[error("target is not suspended")]
    NotSuspended,
    #[error("target is terminated")]
    Terminated,
    #[error("target is disconnected")]
    Disconnected,
    #[error("operation not supported by target: {0}")]
    Unsupported(&'static str),
    #[error("target did not stop after interrupt")]
    InterruptFailed,
    #[error("invalid location: {0}")]
    InvalidLocation(String),

    // --------------------------------- debugger entity not found----------------------------------
    #[error("unknown thread {0}")]
    UnknownThread(u32),
    #[error("breakpoint {0} not found")]
    BreakpointNotFound(u32),
    #[error("type `{0}` not found")]
    TypeNotFound(String),
    #[error("unknown event type `{0}`")]
    UnknownEventType(String),
    #[error("unknown register `{0}`")]
    RegisterNotFound(String),

    // --------------------------------- memory errors ---------------------------------------------
    #[error("bad offset {offset} (+{len}) in block of {size} bytes")]
    BadOffset {
        offset: usize,
        len: usize,
        size: usize,
    },

    // --------------------------------- debugger process errors -----------------------------------
    #[error("debugger executable not found: {0}")]
    GdbNotFound(#[from] which::Error),
    #[error("process pid {0} not found")]
    AttachedProcessNotFound(Pid),
    #[error("{0} syscall error: {1}")]
    Syscall(&'static str, nix::Error),
}

impl Error {
    /// Return a hint to an interface - continue debugging after error or stop whole process.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::IO(_) => false,
            Error::ParseInt(_) => false,
            Error::ProtocolTimeout(_, _) => false,
            Error::Protocol { .. } => false,
            Error::MalformedReply(_) => false,
            Error::TargetNotResponding => false,
            Error::MissingField(_) => false,
            Error::AlreadyRunning => false,
            Error::NotSuspended => false,
            Error::Terminated => false,
            Error::Disconnected => false,
            Error::Unsupported(_) => false,
            Error::InterruptFailed => false,
            Error::InvalidLocation(_) => false,
            Error::UnknownThread(_) => false,
            Error::BreakpointNotFound(_) => false,
            Error::TypeNotFound(_) => false,
            Error::UnknownEventType(_) => false,
            Error::RegisterNotFound(_) => false,
            Error::BadOffset { .. } => false,
            Error::Syscall(_, _) => false,

            // currently fatal errors
            Error::ChannelClosed => true,
            Error::GdbNotFound(_) => true,
            Error::AttachedProcessNotFound(_) => true,
        }
    }

    /// Debugger message if the error is a protocol-level failure.
    pub fn protocol_message(&self) -> Option<&str> {
        match self {
            Error::Protocol { message, .. } => Some(message),
            _ => None,
        }
    }
}

#[macro_export]
macro_rules! _error {
    ($log_fn: path, $res: expr) => {
        match $res {
            Ok(value) => Some(value),
            Err(e) => {
                $log_fn!(target: "debugger", "{:#}", e);
                None
            }
        }
    };
    ($log_fn: path, $res: expr, $msg: tt) => {
        match $res {
            Ok(value) => Some(value),
            Err(e) => {
                $log_fn!(target: "debugger", concat!($msg, " {:#}"), e);
                None
            }
        }
    };
}

/// Transforms `Result` into `Option` and logs an error if it occurs.
#[macro_export]
macro_rules! weak_error {
    ($res: expr) => {
        $crate::_error!(::log::warn, $res)
    };
    ($res: expr, $msg: tt) => {
        $crate::_error!(::log::warn, $res, $msg)
    };
}

/// Transforms `Result` into `Option` and put error into debug logs if it occurs.
#[macro_export]
macro_rules! muted_error {
    ($res: expr) => {
        $crate::_error!(::log::debug, $res)
    };
    ($res: expr, $msg: tt) => {
        $crate::_error!(::log::debug, $res, $msg)
    };
}
