pub mod ast;
pub mod intern;
pub mod util;
pub mod val;

// Compiler, persisted format and interpreter
pub mod vm;

pub use ast::Program;
pub use intern::Symbol;
pub use vm::{Console, ConsoleConfig, LogLevel};
