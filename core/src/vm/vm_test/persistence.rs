use super::*;
use crate::vm::dso;

fn library() -> Program {
    Program::new(vec![
        function(
            "dsoScale",
            &["%v"],
            vec![ret(binary(BinaryOp::Mul, var("%v"), float(2.5))).at(2)],
        )
        .at(1),
        method_fn(
            "ScriptObject",
            "dsoLabel",
            &["%this"],
            vec![ret(concat_with(' ', text("label"), field(var("%this"), "tag"))).at(5)],
        )
        .at(4),
        expr(new_object("ScriptObject", "DsoThing").with_field("tag", text("t1")).into_expr()).at(7),
        expr(assign("$dsoLoaded", text("yes"))).at(8),
        ret(concat_with(
            ' ',
            call("dsoScale", vec![int(4)]),
            method(ident("DsoThing"), "dsoLabel", vec![]),
        ))
        .at(9),
    ])
}

#[test]
fn persisted_unit_runs_like_the_compiled_one() {
    let mut first = Console::new();
    let unit = first.compile(Some("lib.cs"), &library()).unwrap();
    let bytes = dso::write_unit(&unit);
    let expected = first.run_unit(&unit);
    assert_eq!(expected, "10 label t1");

    let mut second = Console::new();
    let loaded = second.load_unit(&bytes, Some("lib.cs")).unwrap().unwrap();
    assert_eq!(loaded.code_words(), unit.code_words());
    assert_eq!(loaded.breakable_lines(), vec![1, 2, 4, 5, 7, 8, 9]);
    assert_eq!(second.run_unit(&loaded), expected);
    assert_eq!(second.get_variable("dsoLoaded"), "yes");
    assert_eq!(second.execute(&["dsoScale", "2"]), "5");
    assert!(second.find_unit("lib.cs").is_some());
    assert_balanced(&second);
}

#[test]
fn breakpoints_do_not_leak_into_the_image() {
    let mut console = Console::new();
    let unit = console.compile(Some("lib_bp.cs"), &library()).unwrap();
    let clean = dso::write_unit(&unit);
    unit.set_all_breaks();
    assert_eq!(dso::write_unit(&unit), clean);
}

#[test]
fn stale_image_asks_for_a_recompile() {
    let mut console = Console::new();
    let unit = console.compile(Some("lib_old.cs"), &library()).unwrap();
    let mut bytes = dso::write_unit(&unit);
    bytes[..4].copy_from_slice(&(dso::CURRENT_VERSION + 1).to_le_bytes());
    assert!(console.load_unit(&bytes, Some("lib_old.cs")).unwrap().is_none());
}

#[test]
fn damaged_image_is_an_error() {
    let mut console = Console::new();
    let unit = console.compile(Some("lib_cut.cs"), &library()).unwrap();
    let bytes = dso::write_unit(&unit);
    assert!(console.load_unit(&bytes[..bytes.len() / 2], Some("lib_cut.cs")).is_err());
    assert!(console.load_unit(&[], None).is_err());
}
