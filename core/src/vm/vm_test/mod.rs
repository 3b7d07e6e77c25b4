pub(super) use std::{cell::RefCell, rc::Rc};

pub(super) use crate::{
    ast::{AssignOp, BinaryOp, Program, Stmt, UnaryOp, build::*},
    vm::{Callback, Console, ConsoleConfig, LogLevel, ObjectRef},
};

/// Compile `statements` as a file and run it in a fresh frame.
pub(super) fn run(console: &mut Console, statements: Vec<Stmt>) -> String {
    console
        .exec_file_program(Some("test.cs"), &Program::new(statements))
        .unwrap()
}

pub(super) fn run_fresh(statements: Vec<Stmt>) -> String {
    let mut console = Console::new();
    run(&mut console, statements)
}

/// Every warning and error line printed from now on.
pub(super) fn capture(console: &mut Console) -> Rc<RefCell<Vec<(LogLevel, String)>>> {
    let lines = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&lines);
    console.add_consumer(move |level, line| sink.borrow_mut().push((level, line.to_owned())));
    lines
}

pub(super) fn assert_balanced(console: &Console) {
    let depths = console.stack_depths();
    assert_eq!(depths.int, 0, "int stack: {depths:?}");
    assert_eq!(depths.float, 0, "float stack: {depths:?}");
    assert_eq!(depths.value, 0, "value stack: {depths:?}");
    assert_eq!(depths.value_frames, 0, "value frames: {depths:?}");
    assert_eq!(depths.eval_frames, 0, "eval frames: {depths:?}");
}

mod breakpoints;
mod marshal;
mod natives;
mod objects;
mod packages;
mod persistence;
mod scenarios;
