use super::*;
use crate::{
    ast::Expr,
    intern::Symbol,
    vm::{DYNAMIC_OBJECT_ID_FIRST, FieldType, HostObject},
};

struct Picky;

impl HostObject for Picky {
    fn on_add(&mut self) -> bool {
        false
    }
}

/// Keeps a numeric `level` of its own and accepts one constructor argument.
#[derive(Default)]
struct Gauge {
    level: i32,
}

impl HostObject for Gauge {
    fn get_field(&self, field: &str, _index: &str) -> Option<String> {
        field.eq_ignore_ascii_case("level").then(|| self.level.to_string())
    }

    fn set_field(&mut self, field: &str, _index: &str, value: &str) -> bool {
        if field.eq_ignore_ascii_case("level") {
            self.level = crate::val::parse_int(value);
            return true;
        }
        false
    }

    fn process_arguments(&mut self, args: &[String]) -> bool {
        match args {
            [] => true,
            [level] => {
                self.level = crate::val::parse_int(level);
                true
            }
            _ => false,
        }
    }
}

#[test]
fn named_object_gets_fields_and_an_id() {
    let mut console = Console::new();
    let out = run(
        &mut console,
        vec![
            expr(assign(
                "%id",
                new_object("ScriptObject", "ObjFoo")
                    .with_field("color", text("red"))
                    .into_expr(),
            )),
            ret(concat_with(' ', field(ident("ObjFoo"), "color"), var("%id"))),
        ],
    );
    let foo = console.find_object("ObjFoo").unwrap();
    assert_eq!(out, format!("red {}", foo.id()));
    assert!(foo.id() >= DYNAMIC_OBJECT_ID_FIRST);
    assert_eq!(foo.class_name(), "ScriptObject");
    assert_eq!(foo.get_field(Symbol::intern("COLOR"), ""), "red");
    assert_eq!(console.find_object(&foo.id().to_string()).unwrap().id(), foo.id());
    assert_balanced(&console);
}

#[test]
fn methods_dispatch_through_the_class_namespace() {
    let out = run_fresh(vec![
        method_fn(
            "ScriptObject",
            "objKind",
            &["%this"],
            vec![ret(concat(text("kind:"), field(var("%this"), "color")))],
        ),
        expr(assign(
            "%o",
            new_object("ScriptObject", "").with_field("color", text("blue")).into_expr(),
        )),
        ret(method(var("%o"), "objKind", vec![])),
    ]);
    assert_eq!(out, "kind:blue");
}

#[test]
fn named_object_namespace_sits_before_its_class() {
    let out = run_fresh(vec![
        method_fn("ScriptObject", "objWho", &["%this"], vec![ret(text("class"))]),
        method_fn(
            "ObjNamed",
            "objWho",
            &["%this"],
            vec![ret(concat(text("named/"), parent_call("objWho", vec![var("%this")])))],
        ),
        expr(new_object("ScriptObject", "ObjNamed").into_expr()),
        ret(method(ident("ObjNamed"), "objWho", vec![])),
    ]);
    assert_eq!(out, "named/class");
}

#[test]
fn parent_calls_walk_the_class_chain() {
    let out = run_fresh(vec![
        method_fn("SimObject", "objDescribe", &["%this"], vec![ret(text("base"))]),
        method_fn(
            "ScriptObject",
            "objDescribe",
            &["%this"],
            vec![ret(concat(text("script/"), parent_call("objDescribe", vec![var("%this")])))],
        ),
        expr(assign("%o", new_object("ScriptObject", "").into_expr())),
        ret(method(var("%o"), "objDescribe", vec![])),
    ]);
    assert_eq!(out, "script/base");
}

#[test]
fn unknown_method_names_the_object() {
    let mut console = Console::new();
    let lines = capture(&mut console);
    let out = run(
        &mut console,
        vec![
            expr(new_object("ScriptObject", "ObjQuiet").into_expr()),
            ret(method(ident("ObjQuiet"), "objNothing", vec![])),
        ],
    );
    assert_eq!(out, "");
    assert!(
        lines
            .borrow()
            .iter()
            .any(|(_, line)| line.contains("Unknown command objNothing.") && line.contains("ObjQuiet"))
    );
}

#[test]
fn method_on_missing_object_warns() {
    let mut console = Console::new();
    let lines = capture(&mut console);
    let out = run(&mut console, vec![ret(method(ident("ObjGhost"), "poke", vec![]))]);
    assert_eq!(out, "");
    assert!(
        lines
            .borrow()
            .iter()
            .any(|(_, line)| line.contains("Unable to find object: 'ObjGhost' attempting to call function 'poke'"))
    );
}

#[test]
fn children_join_their_group() {
    let mut console = Console::new();
    run(
        &mut console,
        vec![expr(
            new_object("SimGroup", "ObjGroup")
                .with_child(new_object("ScriptObject", "ObjKid1"))
                .with_child(new_object("ScriptObject", "ObjKid2").with_field("n", int(2)))
                .into_expr(),
        )],
    );
    let group = console.find_object("ObjGroup").unwrap();
    let names: Vec<_> = group.children().iter().map(|c| c.name().unwrap_or("")).collect();
    assert_eq!(names, vec!["ObjKid1", "ObjKid2"]);
    assert_eq!(
        console.find_object("ObjKid2").unwrap().get_field(Symbol::intern("n"), ""),
        "2"
    );
    assert_balanced(&console);

    console.delete_object(&group);
    assert!(console.find_object("ObjGroup").is_none());
    assert!(console.find_object("ObjKid1").is_none());
}

#[test]
fn children_of_a_plain_object_stay_loose() {
    let mut console = Console::new();
    let lines = capture(&mut console);
    run(
        &mut console,
        vec![expr(
            new_object("ScriptObject", "ObjNotGroup")
                .with_child(new_object("ScriptObject", "ObjLoose"))
                .into_expr(),
        )],
    );
    assert!(console.find_object("ObjNotGroup").unwrap().children().is_empty());
    assert!(console.find_object("ObjLoose").is_some());
    assert!(lines.borrow().iter().any(|(_, line)| line.contains("is not a group")));
    assert_balanced(&console);
}

#[test]
fn unknown_class_rolls_back_to_zero() {
    let mut console = Console::new();
    let lines = capture(&mut console);
    let out = run(
        &mut console,
        vec![ret(
            new_object("ObjNoSuchClass", "ObjX")
                .with_field("a", int(1))
                .with_child(new_object("ScriptObject", "ObjOrphan"))
                .into_expr(),
        )],
    );
    assert_eq!(out, "0");
    assert!(console.find_object("ObjX").is_none());
    assert!(console.find_object("ObjOrphan").is_none());
    assert!(
        lines
            .borrow()
            .iter()
            .any(|(_, line)| line.contains("Unable to instantiate non-conobject class ObjNoSuchClass."))
    );
    assert_balanced(&console);
}

#[test]
fn refused_add_unregisters_the_object() {
    let mut console = Console::new();
    console.register_class("PickyObject", Some("SimObject"), || Box::new(Picky));
    let lines = capture(&mut console);
    let out = run(
        &mut console,
        vec![ret(new_object("PickyObject", "ObjPicky").into_expr())],
    );
    assert_eq!(out, "0");
    assert!(console.find_object("ObjPicky").is_none());
    assert!(console.objects().is_empty());
    assert!(
        lines
            .borrow()
            .iter()
            .any(|(_, line)| line.contains("Register object failed for object ObjPicky of class PickyObject."))
    );
    assert_balanced(&console);
}

#[test]
fn prototype_fields_are_copied() {
    let mut console = Console::new();
    run(
        &mut console,
        vec![
            expr(new_object("ScriptObject", "ObjProto").with_field("color", text("green")).into_expr()),
            expr(
                new_object("ScriptObject", "ObjCopy")
                    .with_parent("ObjProto")
                    .with_field("size", int(3))
                    .into_expr(),
            ),
        ],
    );
    let copy = console.find_object("ObjCopy").unwrap();
    assert_eq!(copy.get_field(Symbol::intern("color"), ""), "green");
    assert_eq!(copy.get_field(Symbol::intern("size"), ""), "3");
}

#[test]
fn constructor_arguments_reach_the_host_object() {
    let mut console = Console::new();
    console.register_class("GaugeObject", Some("SimObject"), || Box::new(Gauge::default()));
    let mut decl = new_object("GaugeObject", "ObjGauge");
    decl.args.push(int(9));
    let out = run(
        &mut console,
        vec![
            expr(decl.into_expr()),
            expr(set_field(ident("ObjGauge"), "level", add(field(ident("ObjGauge"), "level"), int(1)))),
            ret(field(ident("ObjGauge"), "level")),
        ],
    );
    assert_eq!(out, "10");

    let mut rejected = new_object("ScriptObject", "ObjTooMany");
    rejected.args.push(text("extra"));
    let out = run(&mut console, vec![ret(rejected.into_expr())]);
    assert_eq!(out, "0");
    assert!(console.find_object("ObjTooMany").is_none());
}

#[test]
fn indexed_fields_and_compound_field_assignment() {
    let mut console = Console::new();
    let out = run(
        &mut console,
        vec![
            expr(assign("%o", new_object("ScriptObject", "ObjSlots").into_expr())),
            expr(Expr::FieldAssign {
                object: Box::new(var("%o")),
                name: "slot".to_owned(),
                index: vec![int(2)],
                value: Box::new(text("two")),
            }),
            expr(Expr::FieldAssignOp {
                object: Box::new(var("%o")),
                name: "count".to_owned(),
                index: Vec::new(),
                op: AssignOp::Add,
                value: Box::new(int(2)),
            }),
            expr(Expr::FieldAssignOp {
                object: Box::new(var("%o")),
                name: "count".to_owned(),
                index: Vec::new(),
                op: AssignOp::Add,
                value: Box::new(int(2)),
            }),
            ret(concat_with(
                ' ',
                Expr::Field {
                    object: Box::new(var("%o")),
                    name: "slot".to_owned(),
                    index: vec![int(2)],
                },
                field(var("%o"), "count"),
            )),
        ],
    );
    assert_eq!(out, "two 4");
    let slots = console.find_object("ObjSlots").unwrap();
    assert_eq!(slots.get_field(Symbol::intern("slot"), "2"), "two");
    assert_balanced(&console);
}

#[test]
fn fields_of_missing_objects_read_empty() {
    let out = run_fresh(vec![ret(concat(text("["), concat(field(ident("ObjNobody"), "x"), text("]"))))]);
    assert_eq!(out, "[]");
}

#[test]
fn host_calls_methods_with_execute_on() {
    let mut console = Console::new();
    run(
        &mut console,
        vec![method_fn(
            "ScriptObject",
            "objEcho",
            &["%this", "%x"],
            vec![ret(concat(var("%this"), concat(text(":"), var("%x"))))],
        )],
    );
    let obj = console.create_object("ScriptObject", "ObjHost").unwrap();
    assert_eq!(console.execute_on(&obj, &["objEcho", "hi"]), format!("{}:hi", obj.id()));
    assert_eq!(console.execute_on(&obj, &["objMissing"]), "");
}

#[test]
fn native_methods_see_this() {
    fn tag(_: &mut Console, this: Option<&ObjectRef>, argv: &[String]) -> String {
        format!("{}:{}", this.map(|o| o.id()).unwrap_or(0), argv[1])
    }
    let mut console = Console::new();
    console.add_command(Some("ScriptObject"), "objTag", Callback::String(tag), "objTag()", 0, 0);
    let out = run(
        &mut console,
        vec![
            expr(assign("%o", new_object("ScriptObject", "").into_expr())),
            ret(method(var("%o"), "objTag", vec![])),
        ],
    );
    assert_eq!(out, format!("{DYNAMIC_OBJECT_ID_FIRST}:{DYNAMIC_OBJECT_ID_FIRST}"));
    assert!(console.this_object().is_none());
}

#[test]
fn bound_globals_read_and_write_the_field() {
    let mut console = Console::new();
    let obj = console.create_object("ScriptObject", "ObjBound").unwrap();
    console.bind_variable("objLevel", &obj, "level", FieldType::Int);
    let out = run(
        &mut console,
        vec![
            expr(assign("$objLevel", text("7.9"))),
            ret(add(var("$objLevel"), int(1))),
        ],
    );
    assert_eq!(obj.get_field(Symbol::intern("level"), ""), "7");
    assert_eq!(out, "8");
    assert_eq!(console.get_variable("objLevel"), "7");
}

fn this_id(_: &mut Console, this: Option<&ObjectRef>, _argv: &[String]) -> i32 {
    this.map_or(-7, |o| o.id() as i32)
}

#[test]
fn parent_calls_keep_this_for_natives() {
    let mut console = Console::new();
    console.add_command(Some("SimObject"), "objThisId", Callback::Int(this_id), "objThisId()", 0, 0);
    let out = run(
        &mut console,
        vec![
            method_fn(
                "ScriptObject",
                "objThisId",
                &["%this"],
                vec![ret(parent_call("objThisId", vec![var("%this")]))],
            ),
            expr(new_object("ScriptObject", "ObjParentThis").into_expr()),
            ret(method(ident("ObjParentThis"), "objThisId", vec![])),
        ],
    );
    let id = console.find_object("ObjParentThis").unwrap().id();
    assert_eq!(out, id.to_string());
    assert!(console.this_object().is_none());
}

#[test]
fn plain_calls_from_a_method_keep_this() {
    let mut console = Console::new();
    console.add_command(None, "objGlobalThis", Callback::Int(this_id), "objGlobalThis()", 0, 0);
    let out = run(
        &mut console,
        vec![
            method_fn(
                "ScriptObject",
                "objViaFunction",
                &["%this"],
                vec![ret(call("objGlobalThis", vec![]))],
            ),
            expr(new_object("ScriptObject", "ObjFunctionThis").into_expr()),
            ret(concat_with(
                ' ',
                method(ident("ObjFunctionThis"), "objViaFunction", vec![]),
                call("objGlobalThis", vec![]),
            )),
        ],
    );
    let id = console.find_object("ObjFunctionThis").unwrap().id();
    assert_eq!(out, format!("{id} -7"));
}
