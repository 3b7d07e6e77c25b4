use super::*;
use crate::vm::{BreakpointList, CompiledUnit, Debugger, Opcode};

type Stops = Rc<RefCell<Vec<(u32, String)>>>;

/// Records each stop with the value of `%x` at that moment.
struct Recorder {
    stops: Stops,
    auto_line: Option<u32>,
}

impl Recorder {
    fn install(console: &mut Console, auto_line: Option<u32>) -> Stops {
        let stops = Stops::default();
        console.set_debugger(Some(Box::new(Recorder {
            stops: Rc::clone(&stops),
            auto_line,
        })));
        stops
    }
}

impl Debugger for Recorder {
    fn execution_stopped(&mut self, console: &mut Console, _unit: &Rc<CompiledUnit>, line: u32) {
        let x = console.get_local_variable("%x").unwrap_or_default();
        self.stops.borrow_mut().push((line, x));
        console.set_variable("bpStopped", "1");
    }

    fn unit_loaded(&mut self, unit: &Rc<CompiledUnit>) {
        if let Some(line) = self.auto_line {
            unit.set_breakpoint(line);
        }
    }
}

/// Five lines; returns 5.
fn counting_program() -> Program {
    Program::new(vec![
        expr(assign("%x", int(1))).at(1),
        expr(assign("%x", add(var("%x"), int(1)))).at(2),
        for_loop(
            assign("%i", int(0)),
            binary(BinaryOp::Lt, var("%i"), int(3)),
            assign_op("%i", AssignOp::Add, int(1)),
            vec![expr(assign("%x", add(var("%x"), var("%i")))).at(4)],
        )
        .at(3),
        ret(var("%x")).at(5),
    ])
}

fn trapped(unit: &CompiledUnit, line: u32) -> bool {
    unit.line_breaks()
        .iter()
        .filter(|(inst_line, _)| inst_line >> 8 == line)
        .any(|&(_, ip)| unit.word(ip) == Opcode::Break.word())
}

#[test]
fn breakpoint_stops_each_pass_without_changing_the_result() {
    let mut console = Console::new();
    let stops = Recorder::install(&mut console, None);
    let unit = console.compile(Some("bp.cs"), &counting_program()).unwrap();
    let clean = unit.code_words();

    assert!(unit.set_breakpoint(4));
    assert!(!unit.set_breakpoint(9));
    assert!(trapped(&unit, 4));
    assert_eq!(unit.code_words(), clean);

    assert_eq!(console.run_unit(&unit), "5");
    assert_eq!(
        *stops.borrow(),
        vec![(4, "2".to_owned()), (4, "2".to_owned()), (4, "3".to_owned())]
    );
    assert_eq!(console.get_variable("bpStopped"), "1");
    assert_balanced(&console);

    assert!(unit.clear_breakpoint(4));
    assert!(!trapped(&unit, 4));
    assert_eq!(console.run_unit(&unit), "5");
    assert_eq!(stops.borrow().len(), 3);
}

#[test]
fn every_statement_can_be_trapped() {
    let mut console = Console::new();
    let stops = Recorder::install(&mut console, None);
    let unit = console.compile(Some("bp_all.cs"), &counting_program()).unwrap();

    unit.set_all_breaks();
    assert_eq!(console.run_unit(&unit), "5");
    let lines: Vec<u32> = stops.borrow().iter().map(|(line, _)| *line).collect();
    assert_eq!(lines, vec![1, 2, 3, 4, 4, 4, 5]);

    unit.clear_all_breaks();
    assert!((1..=5).all(|line| !trapped(&unit, line)));
}

#[test]
fn debugger_hears_about_new_units() {
    let mut console = Console::new();
    let stops = Recorder::install(&mut console, Some(2));
    let out = console.exec_file_program(Some("bp_auto.cs"), &counting_program()).unwrap();
    assert_eq!(out, "5");
    assert_eq!(*stops.borrow(), vec![(2, "1".to_owned())]);

    let previous = console.set_debugger(None);
    assert!(previous.is_some());
}

#[test]
fn breakpoint_list_applies_lines_to_units_loaded_later() {
    let mut list = BreakpointList::new();
    list.add("bp_list.cs", 2, None);
    list.add("bp_list.cs", 5, None);
    list.remove("bp_list.cs", 5, None);

    let mut console = Console::new();
    let unit = console.compile(Some("bp_list.cs"), &counting_program()).unwrap();
    assert!(!trapped(&unit, 2));
    list.unit_loaded(&unit);
    assert!(trapped(&unit, 2));
    assert!(!trapped(&unit, 5));

    list.execution_stopped(&mut console, &unit, 2);
    assert_eq!(list.hits(), &[("bp_list.cs".to_owned(), 2)]);

    list.remove("bp_list.cs", 2, Some(&unit));
    assert!(!trapped(&unit, 2));
}

#[test]
fn break_list_is_delta_encoded() {
    let mut console = Console::new();
    let unit = console
        .compile(
            Some("bp_lines.cs"),
            &Program::new(vec![
                expr(assign("%a", int(1))).at(2),
                expr(assign("%b", int(2))).at(5),
                ret(var("%a")).at(9),
            ]),
        )
        .unwrap();
    assert_eq!(unit.breakable_lines(), vec![2, 5, 9]);
    assert_eq!(unit.break_list(), vec![2, 3, 4]);
    assert_eq!(unit.find_first_break_line(6), Some(9));
    assert_eq!(unit.find_first_break_line(10), None);
    assert_eq!(unit.file_line(0), "bp_lines.cs (2)");
}
