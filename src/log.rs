//! Protocol trace switch.
//!
//! When enabled, every command written to the debugger and every record read back is
//! logged at debug level with the `mi` target.

use std::sync::atomic::{AtomicBool, Ordering};

static ENABLED: AtomicBool = AtomicBool::new(false);

#[inline(always)]
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::SeqCst)
}

pub fn disable() {
    ENABLED.store(false, Ordering::SeqCst)
}

pub fn enable() {
    ENABLED.store(true, Ordering::SeqCst)
}

#[macro_export]
macro_rules! mi_trace {
    ($($arg:tt)+) => {
        if $crate::log::is_enabled() {
            ::log::debug!(target: "mi", $($arg)+)
        }
    };
}
