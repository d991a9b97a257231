//! GDB machine interface: record grammar, command encoding and the command channel.

pub mod channel;
pub mod command;
pub mod event;
pub mod output;

pub use channel::{CommandChannel, Listener, QuietGuard, Reply};
pub use command::MiCommand;
pub use event::{MiEvent, StopRecord};
pub use output::{AsyncKind, Record, ResultClass, StreamKind, Tuple, Value};
