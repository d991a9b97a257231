//! Debugger control engine over the GDB machine interface.
//!
//! A [`debugger::Session`] starts the debugger (or takes already connected streams),
//! and exposes the debug target as a [`debugger::Target`]: execution control, threads,
//! stack frames, bound variables, expressions, registers, breakpoints and memory.

pub mod config;
pub mod console;
pub mod debugger;
pub mod log;
pub mod mi;
