use super::*;

fn answer(_: &mut Console, _: Option<&ObjectRef>, _: &[String]) -> i32 {
    42
}

fn half(_: &mut Console, _: Option<&ObjectRef>, argv: &[String]) -> f64 {
    crate::val::parse_float(&argv[1]) / 2.0
}

fn shout(_: &mut Console, _: Option<&ObjectRef>, argv: &[String]) -> String {
    argv[1..].join(" ").to_uppercase()
}

fn is_even(_: &mut Console, _: Option<&ObjectRef>, argv: &[String]) -> bool {
    crate::val::parse_int(&argv[1]) % 2 == 0
}

fn remember(console: &mut Console, _: Option<&ObjectRef>, argv: &[String]) {
    console.set_variable("natRemembered", &argv[1]);
}

fn register(console: &mut Console) {
    console.add_command(None, "natAnswer", Callback::Int(answer), "natAnswer()", 1, 1);
    console.add_command(None, "natHalf", Callback::Float(half), "natHalf(value)", 2, 2);
    console.add_command(None, "natShout", Callback::String(shout), "natShout(words...)", 2, 0);
    console.add_command(None, "natIsEven", Callback::Bool(is_even), "natIsEven(n)", 2, 2);
    console.add_command(None, "natRemember", Callback::Void(remember), "natRemember(value)", 2, 2);
}

#[test]
fn every_callback_shape_is_callable_from_script() {
    let mut console = Console::new();
    register(&mut console);
    let out = run(
        &mut console,
        vec![
            expr(call("natRemember", vec![text("kept")])),
            ret(concat_with(
                ' ',
                call("natAnswer", vec![]),
                concat_with(
                    ' ',
                    call("natHalf", vec![int(5)]),
                    concat_with(' ', call("natShout", vec![text("a"), text("b")]), call("natIsEven", vec![int(4)])),
                ),
            )),
        ],
    );
    assert_eq!(out, "42 2.5 A B 1");
    assert_eq!(console.get_variable("natRemembered"), "kept");
    assert_balanced(&console);
}

#[test]
fn numeric_results_feed_arithmetic_directly() {
    let mut console = Console::new();
    register(&mut console);
    let out = run(
        &mut console,
        vec![
            expr(assign("%sum", add(call("natAnswer", vec![]), call("natHalf", vec![int(3)])))),
            expr(assign(
                "%bits",
                binary(BinaryOp::BitOr, call("natIsEven", vec![int(2)]), call("natAnswer", vec![])),
            )),
            ret(concat_with(' ', var("%sum"), var("%bits"))),
        ],
    );
    assert_eq!(out, "43.5 43");
    assert_balanced(&console);
}

#[test]
fn void_result_reads_as_empty() {
    let mut console = Console::new();
    register(&mut console);
    let out = run(
        &mut console,
        vec![ret(concat(text("<"), concat(call("natRemember", vec![int(1)]), text(">"))))],
    );
    assert_eq!(out, "<>");
}

#[test]
fn wrong_arity_prints_usage() {
    let mut console = Console::new();
    register(&mut console);
    let lines = capture(&mut console);
    let out = run(&mut console, vec![ret(call("natHalf", vec![]))]);
    assert_eq!(out, "");
    let lines = lines.borrow();
    assert!(lines.iter().any(|(_, line)| line.contains("natHalf - wrong number of arguments.")));
    assert!(lines.iter().any(|(_, line)| line == "usage: natHalf(value)"));
}

#[test]
fn host_execute_reaches_script_and_native() {
    let mut console = Console::new();
    register(&mut console);
    run(
        &mut console,
        vec![function("natJoin", &["%a", "%b"], vec![ret(concat(var("%a"), var("%b")))])],
    );
    assert_eq!(console.execute(&["natJoin", "x", "y"]), "xy");
    assert_eq!(console.execute(&["natAnswer"]), "42");
    assert_eq!(console.execute(&["natIsEven", "3"]), "0");
    assert_eq!(console.execute(&[]), "");

    let lines = capture(&mut console);
    assert_eq!(console.execute(&["natMissing"]), "");
    assert_eq!(lines.borrow()[0].1, "natMissing: Unknown command.");
}

#[test]
fn namespaced_commands_and_documentation() {
    let mut console = Console::new();
    console.mark_group(Some("NatTools"), "Math", Some("math helpers"));
    console.add_command(Some("NatTools"), "answer", Callback::Int(answer), "answer()", 1, 1);
    console.add_overload(Some("NatTools"), "answer", "answer(ignored)");
    run(&mut console, vec![function("natLocal", &["%p"], vec![])]);

    assert!(console.is_function(Some("NatTools"), "answer"));
    assert!(!console.is_function(None, "answer"));
    assert!(!console.is_function(Some("NoSuchNamespaceAtAll"), "answer"));

    let out = run(&mut console, vec![ret(ns_call("NatTools", "answer", vec![]))]);
    assert_eq!(out, "42");

    let dump = console.dump_commands(Some("NatTools"));
    assert!(dump.contains(&"answer() - answer()".to_owned()), "{dump:?}");
    assert!(dump.contains(&"answer() - answer(ignored)".to_owned()), "{dump:?}");
    assert!(dump.contains(&"--- Math --- math helpers".to_owned()), "{dump:?}");
    let globals = console.dump_commands(None);
    assert!(globals.contains(&"natLocal(%p)".to_owned()), "{globals:?}");
}
