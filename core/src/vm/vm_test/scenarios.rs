use super::*;

#[test]
fn locals_add_to_three() {
    let out = run_fresh(vec![
        expr(assign("%a", int(1))),
        expr(assign("%b", int(2))),
        ret(add(var("%a"), var("%b"))),
    ]);
    assert_eq!(out, "3");
}

#[test]
fn unknown_function_yields_empty_and_keeps_locals() {
    let mut console = Console::new();
    let lines = capture(&mut console);
    let out = run(
        &mut console,
        vec![
            expr(assign("%keep", text("intact"))),
            expr(assign("%got", call("noSuchFunctionAnywhere", vec![int(1), var("%keep")]))),
            ret(concat_with(' ', var("%keep"), concat(text("["), concat(var("%got"), text("]"))))),
        ],
    );
    assert_eq!(out, "intact []");
    let lines = lines.borrow();
    assert!(
        lines
            .iter()
            .any(|(level, line)| *level == LogLevel::Warning && line.contains("Unknown command noSuchFunctionAnywhere"))
    );
    assert_balanced(&console);
}

#[test]
fn script_functions_take_arguments() {
    let out = run_fresh(vec![
        function("scnAdd", &["%a", "%b"], vec![ret(add(var("%a"), var("%b")))]),
        ret(call("scnAdd", vec![int(2), float(3.5)])),
    ]);
    assert_eq!(out, "5.5");
}

#[test]
fn missing_arguments_read_as_empty() {
    let out = run_fresh(vec![
        function("scnArgs", &["%a", "%b"], vec![ret(concat(var("%a"), concat(text("|"), var("%b"))))]),
        ret(call("scnArgs", vec![text("x")])),
    ]);
    assert_eq!(out, "x|");
}

#[test]
fn recursion_computes_fibonacci() {
    let body = vec![
        if_else(
            binary(BinaryOp::Lt, var("%n"), int(2)),
            vec![ret(var("%n"))],
            vec![],
        ),
        ret(add(
            call("scnFib", vec![binary(BinaryOp::Sub, var("%n"), int(1))]),
            call("scnFib", vec![binary(BinaryOp::Sub, var("%n"), int(2))]),
        )),
    ];
    let mut console = Console::new();
    let out = run(
        &mut console,
        vec![function("scnFib", &["%n"], body), ret(call("scnFib", vec![int(10)]))],
    );
    assert_eq!(out, "55");
    assert_balanced(&console);
}

#[test]
fn for_loop_accumulates() {
    let out = run_fresh(vec![
        expr(assign("%sum", int(0))),
        for_loop(
            assign("%i", int(0)),
            binary(BinaryOp::Lt, var("%i"), int(5)),
            assign_op("%i", AssignOp::Add, int(1)),
            vec![expr(assign_op("%sum", AssignOp::Add, var("%i")))],
        ),
        ret(var("%sum")),
    ]);
    assert_eq!(out, "10");
}

#[test]
fn break_and_continue_steer_loops() {
    let out = run_fresh(vec![
        expr(assign("%i", int(0))),
        expr(assign("%odd", text(""))),
        while_loop(
            int(1),
            vec![
                expr(assign_op("%i", AssignOp::Add, int(1))),
                if_else(binary(BinaryOp::Gt, var("%i"), int(7)), vec![brk()], vec![]),
                if_else(
                    binary(BinaryOp::Eq, binary(BinaryOp::Mod, var("%i"), int(2)), int(0)),
                    vec![cont()],
                    vec![],
                ),
                expr(assign("%odd", concat(var("%odd"), var("%i")))),
            ],
        ),
        ret(var("%odd")),
    ]);
    assert_eq!(out, "1357");
}

#[test]
fn do_while_runs_body_first() {
    let out = run_fresh(vec![
        expr(assign("%n", int(0))),
        Stmt::new(crate::ast::StmtKind::Loop {
            init: None,
            test: int(0),
            step: None,
            body: vec![expr(assign_op("%n", AssignOp::Add, int(1)))],
            post_test: true,
        }),
        ret(var("%n")),
    ]);
    assert_eq!(out, "1");
}

#[test]
fn string_operators() {
    let out = run_fresh(vec![
        expr(assign("%s", concat_with(' ', text("hello"), text("world")))),
        expr(assign("%t", concat_with('\t', var("%s"), int(7)))),
        ret(concat(var("%t"), concat(text("/"), str_eq(text("ABC"), text("abc"))))),
    ]);
    assert_eq!(out, "hello world\t7/1");
}

#[test]
fn string_inequality_negates() {
    let out = run_fresh(vec![ret(crate::ast::Expr::StrEq {
        lhs: Box::new(text("a")),
        rhs: Box::new(text("b")),
        negate: true,
    })]);
    assert_eq!(out, "1");
}

#[test]
fn ternary_and_logic() {
    let out = run_fresh(vec![
        expr(assign("%x", int(4))),
        ret(conditional(
            binary(
                BinaryOp::And,
                binary(BinaryOp::Gt, var("%x"), int(1)),
                binary(BinaryOp::Or, int(0), binary(BinaryOp::Le, var("%x"), int(4))),
            ),
            text("big"),
            text("small"),
        )),
    ]);
    assert_eq!(out, "big");
}

#[test]
fn short_circuit_skips_right_side() {
    let mut console = Console::new();
    let lines = capture(&mut console);
    let out = run(
        &mut console,
        vec![ret(binary(BinaryOp::And, int(0), call("scnNeverCalled", vec![])))],
    );
    assert_eq!(out, "0");
    assert!(lines.borrow().is_empty());
    assert_balanced(&console);
}

#[test]
fn integer_and_unary_operators() {
    let out = run_fresh(vec![
        expr(assign("%m", binary(BinaryOp::Mod, int(17), int(5)))),
        expr(assign("%z", binary(BinaryOp::Mod, int(3), int(0)))),
        expr(assign("%sh", binary(BinaryOp::Shl, int(1), int(4)))),
        expr(assign("%bits", binary(BinaryOp::BitOr, binary(BinaryOp::BitAnd, int(12), int(10)), int(1)))),
        expr(assign("%x", binary(BinaryOp::Xor, int(6), int(3)))),
        expr(assign("%not", unary(UnaryOp::Not, text("")))),
        expr(assign("%neg", unary(UnaryOp::Neg, float(2.5)))),
        expr(assign("%inv", unary(UnaryOp::BitNot, int(0)))),
        ret(concat_with(
            ' ',
            var("%m"),
            concat_with(
                ' ',
                var("%z"),
                concat_with(
                    ' ',
                    var("%sh"),
                    concat_with(
                        ' ',
                        var("%bits"),
                        concat_with(' ', var("%x"), concat_with(' ', var("%not"), concat_with(' ', var("%neg"), var("%inv")))),
                    ),
                ),
            ),
        )),
    ]);
    assert_eq!(out, "2 0 16 9 5 1 -2.5 -1");
}

#[test]
fn float_results_format_like_printf_g() {
    let out = run_fresh(vec![ret(binary(BinaryOp::Div, int(1), int(3)))]);
    assert_eq!(out, "0.333333");
    let out = run_fresh(vec![ret(binary(BinaryOp::Mul, float(2.5), int(4)))]);
    assert_eq!(out, "10");
}

#[test]
fn bare_words_as_numbers() {
    let out = run_fresh(vec![ret(add(ident("true"), ident("TRUE")))]);
    assert_eq!(out, "2");
    let out = run_fresh(vec![ret(add(ident("false"), ident("banana")))]);
    assert_eq!(out, "0");
}

#[test]
fn arrays_flatten_to_names() {
    let mut console = Console::new();
    let out = run(
        &mut console,
        vec![
            expr(assign_at("%arr", vec![int(1)], text("one"))),
            expr(assign_at("%arr", vec![int(2)], text("two"))),
            expr(assign_at("$grid", vec![int(1), int(2)], int(12))),
            ret(concat_with(' ', var_at("%arr", vec![int(1)]), concat_with(' ', var("%arr2"), var("$grid1_2")))),
        ],
    );
    assert_eq!(out, "one two 12");
    assert_eq!(console.get_variable("grid1_2"), "12");
    assert_balanced(&console);
}

#[test]
fn compound_assignment_on_array_elements() {
    let out = run_fresh(vec![
        expr(assign_at("%c", vec![text("k")], int(5))),
        expr(crate::ast::Expr::AssignOp {
            name: "%c".to_owned(),
            index: vec![text("k")],
            op: AssignOp::Sub,
            value: Box::new(int(2)),
        }),
        ret(var("%ck")),
    ]);
    assert_eq!(out, "3");
}

#[test]
fn globals_cross_the_host_boundary() {
    let mut console = Console::new();
    console.set_variable("scnIn", "21");
    let out = run(
        &mut console,
        vec![
            expr(assign("$scnOut", binary(BinaryOp::Mul, var("$scnIn"), int(2)))),
            ret(var("$scnOut")),
        ],
    );
    assert_eq!(out, "42");
    assert_eq!(console.get_variable("$scnOut"), "42");
    assert_eq!(console.get_variable("scnOut"), "42");
}

#[test]
fn identifiers_are_case_insensitive() {
    let out = run_fresh(vec![
        function("ScnMixedCase", &["%Value"], vec![ret(var("%VALUE"))]),
        expr(assign("%Local", text("v"))),
        ret(concat(call("scnmixedcase", vec![text("ok")]), var("%local"))),
    ]);
    assert_eq!(out, "okv");
}

#[test]
fn redefining_a_function_replaces_it() {
    let mut console = Console::new();
    run(&mut console, vec![function("scnRedef", &[], vec![ret(text("first"))])]);
    assert_eq!(console.execute(&["scnRedef"]), "first");
    run(&mut console, vec![function("scnRedef", &[], vec![ret(text("second"))])]);
    assert_eq!(console.execute(&["scnRedef"]), "second");
}

#[test]
fn empty_function_body_returns_empty() {
    let mut console = Console::new();
    run(&mut console, vec![function("scnEmpty", &["%a"], vec![])]);
    assert!(console.is_function(None, "scnEmpty"));
    assert_eq!(console.execute(&["scnEmpty", "1"]), "");
    assert_balanced(&console);
}

#[test]
fn local_access_without_a_frame_warns() {
    let mut console = Console::new();
    let lines = capture(&mut console);
    let out = console
        .eval_program(None, &Program::new(vec![expr(assign("%orphan", int(1))), ret(text("done"))]))
        .unwrap();
    assert_eq!(out, "done");
    assert!(
        lines
            .borrow()
            .iter()
            .any(|(_, line)| line.contains("Accessing local variable %orphan in global scope"))
    );
}

#[test]
fn eval_shares_the_callers_locals() {
    fn eval_inner(console: &mut Console, _this: Option<&ObjectRef>, _argv: &[String]) -> String {
        console
            .eval_program(None, &Program::new(vec![expr(assign("%shared", text("from eval")))]))
            .unwrap_or_default()
    }
    let mut console = Console::new();
    console.add_command(None, "scnEvalInner", Callback::String(eval_inner), "scnEvalInner()", 1, 1);
    let out = run(
        &mut console,
        vec![expr(call("scnEvalInner", vec![])), ret(var("%shared"))],
    );
    assert_eq!(out, "from eval");
}

#[test]
fn evaluate_json_runs_a_tree() {
    let mut console = Console::new();
    let json = r#"[
        {"line": 1, "kind": {"expr": {"assign": {"name": "$scnJson", "value": {"int": 7}}}}},
        {"line": 2, "kind": {"return": {"binary": {"op": "mul", "lhs": {"var": {"name": "$scnJson"}}, "rhs": {"int": 6}}}}}
    ]"#;
    assert_eq!(console.evaluate_json(json).unwrap(), "42");
    assert!(console.evaluate_json("not json").is_err());
}

#[test]
fn compile_errors_surface_as_err() {
    let mut console = Console::new();
    let err = console
        .exec_file_program(Some("bad.cs"), &Program::new(vec![brk().at(3)]))
        .unwrap_err();
    assert!(err.to_string().contains("line 3"));
}

#[test]
fn trace_logs_entry_and_exit() {
    let config = ConsoleConfig {
        trace: true,
        ..ConsoleConfig::default()
    };
    let mut console = Console::with_config(config);
    let lines = capture(&mut console);
    run(
        &mut console,
        vec![
            function("scnTraced", &["%a", "%b"], vec![ret(add(var("%a"), var("%b")))]),
            expr(call("scnTraced", vec![int(2), int(3)])),
        ],
    );
    let lines = lines.borrow();
    let normal: Vec<&str> = lines
        .iter()
        .filter(|(level, _)| *level == LogLevel::Normal)
        .map(|(_, line)| line.as_str())
        .collect();
    assert_eq!(normal, vec!["Entering scnTraced(2, 3)", "Leaving scnTraced() - return 5"]);
}

#[test]
fn call_depth_limit_stops_runaway_recursion() {
    let config = ConsoleConfig {
        max_call_depth: 16,
        ..ConsoleConfig::default()
    };
    let mut console = Console::with_config(config);
    let lines = capture(&mut console);
    let out = run(
        &mut console,
        vec![
            function(
                "scnForever",
                &["%n"],
                vec![ret(call("scnForever", vec![add(var("%n"), int(1))]))],
            ),
            ret(concat(text("end:"), call("scnForever", vec![int(0)]))),
        ],
    );
    assert_eq!(out, "end:");
    assert!(
        lines
            .borrow()
            .iter()
            .any(|(_, line)| line.contains("maximum call depth 16 exceeded"))
    );
    assert_balanced(&console);
}

#[test]
fn default_depth_limit_is_reached_without_overflowing() {
    let mut console = Console::new();
    let lines = capture(&mut console);
    let out = run(
        &mut console,
        vec![
            function(
                "scnDeep",
                &["%n"],
                vec![ret(call("scnDeep", vec![add(var("%n"), int(1))]))],
            ),
            ret(concat(text("end:"), call("scnDeep", vec![int(0)]))),
        ],
    );
    assert_eq!(out, "end:");
    let limit = ConsoleConfig::default().max_call_depth;
    let warnings: Vec<String> = lines
        .borrow()
        .iter()
        .filter(|(level, _)| *level == LogLevel::Warning)
        .map(|(_, line)| line.clone())
        .collect();
    assert_eq!(warnings.len(), 1, "{warnings:?}");
    assert!(warnings[0].contains(&format!("maximum call depth {limit} exceeded calling scnDeep")));
    assert_balanced(&console);
}

#[test]
fn undefined_variable_warning_is_opt_in() {
    let mut quiet = Console::new();
    let quiet_lines = capture(&mut quiet);
    run(&mut quiet, vec![ret(var("%never"))]);
    assert!(quiet_lines.borrow().is_empty());

    let config = ConsoleConfig {
        warn_undefined_variables: true,
        ..ConsoleConfig::default()
    };
    let mut loud = Console::with_config(config);
    let loud_lines = capture(&mut loud);
    run(&mut loud, vec![ret(var("%never"))]);
    assert!(
        loud_lines
            .borrow()
            .iter()
            .any(|(_, line)| line.contains("Variable referenced before assignment: %never"))
    );
}

#[test]
fn backtrace_names_the_running_functions() {
    fn trace_here(console: &mut Console, _this: Option<&ObjectRef>, _argv: &[String]) -> String {
        console.backtrace()
    }
    let mut console = Console::new();
    console.add_command(None, "scnTraceHere", Callback::String(trace_here), "", 1, 1);
    let out = run(
        &mut console,
        vec![
            function("scnOuter", &[], vec![ret(call("scnTraceHere", vec![]))]),
            ret(call("scnOuter", vec![])),
        ],
    );
    assert!(out.ends_with("->scnOuter"), "{out}");
}
