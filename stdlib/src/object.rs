//! Methods on the built-in object classes. Every command here runs with
//! the receiver as `this`; `argv[1]` is its id.

use conscript_core::{
    Console, Symbol,
    val,
    vm::{Callback, ObjectRef},
};

pub fn register(console: &mut Console) {
    let ns = Some("SimObject");
    console.add_command(ns, "getId", Callback::Int(get_id), "obj.getId()", 2, 2);
    console.add_command(ns, "getName", Callback::String(get_name), "obj.getName()", 2, 2);
    console.add_command(ns, "getClassName", Callback::String(get_class_name), "obj.getClassName()", 2, 2);
    console.add_command(ns, "getFieldValue", Callback::String(get_field_value), "obj.getFieldValue(field)", 3, 3);
    console.add_command(
        ns,
        "setFieldValue",
        Callback::Void(set_field_value),
        "obj.setFieldValue(field, value)",
        4,
        4,
    );
    console.add_command(ns, "dumpFields", Callback::Void(dump_fields), "obj.dumpFields()", 2, 2);
    console.add_command(ns, "delete", Callback::Void(delete), "obj.delete()", 2, 2);

    let set = Some("SimSet");
    console.add_command(set, "getCount", Callback::Int(get_count), "set.getCount()", 2, 2);
    console.add_command(set, "getObject", Callback::Int(get_object), "set.getObject(index)", 3, 3);
}

fn get_id(_: &mut Console, this: Option<&ObjectRef>, _: &[String]) -> i32 {
    this.map_or(0, |o| o.id() as i32)
}

fn get_name(_: &mut Console, this: Option<&ObjectRef>, _: &[String]) -> String {
    this.and_then(|o| o.name()).unwrap_or("").to_owned()
}

fn get_class_name(_: &mut Console, this: Option<&ObjectRef>, _: &[String]) -> String {
    this.map(|o| o.class_name()).unwrap_or("").to_owned()
}

fn get_field_value(_: &mut Console, this: Option<&ObjectRef>, argv: &[String]) -> String {
    this.map(|o| o.get_field(Symbol::intern(&argv[2]), "")).unwrap_or_default()
}

fn set_field_value(_: &mut Console, this: Option<&ObjectRef>, argv: &[String]) {
    if let Some(object) = this {
        object.set_field(Symbol::intern(&argv[2]), "", &argv[3]);
    }
}

fn dump_fields(console: &mut Console, this: Option<&ObjectRef>, _: &[String]) {
    let Some(object) = this else { return };
    for name in object.field_names() {
        let line = format!("  {name} = \"{}\"", object.get_field(Symbol::intern(name), ""));
        console.print(&line);
    }
}

fn delete(console: &mut Console, this: Option<&ObjectRef>, _: &[String]) {
    if let Some(object) = this {
        console.delete_object(object);
    }
}

fn get_count(_: &mut Console, this: Option<&ObjectRef>, _: &[String]) -> i32 {
    this.map_or(0, |o| o.children().len() as i32)
}

/// Id of the child at `index`, -1 when out of range.
fn get_object(_: &mut Console, this: Option<&ObjectRef>, argv: &[String]) -> i32 {
    let Some(object) = this else { return -1 };
    let index = val::parse_int(&argv[2]);
    if index < 0 {
        return -1;
    }
    object
        .children()
        .get(index as usize)
        .map_or(-1, |child| child.id() as i32)
}
