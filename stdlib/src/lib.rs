//! Native console commands for conscript.
//!
//! [`register_stdlib`] installs everything; each module also exposes its
//! own `register` for embedders that want a subset.

pub mod console;
pub mod math;
pub mod object;
pub mod string;


use conscript_core::Console;
use tracing::debug;

/// Register every stdlib command on `console`.
pub fn register_stdlib(console: &mut Console) {
    string::register(console);
    math::register(console);
    console::register(console);
    object::register(console);
    debug!("registered stdlib commands");
}
