//! Commands that inspect or steer the console itself: packages, variables,
//! function lookup and tracing.

use conscript_core::{
    Console,
    val,
    vm::{Callback, ObjectRef},
};
use tracing::debug;

pub fn register(console: &mut Console) {
    console.mark_group(None, "Packages", Some("package activation"));
    console.add_command(None, "activatePackage", Callback::Void(activate_package), "activatePackage(name)", 2, 2);
    console.add_command(
        None,
        "deactivatePackage",
        Callback::Void(deactivate_package),
        "deactivatePackage(name)",
        2,
        2,
    );
    console.add_command(None, "isPackage", Callback::Bool(is_package), "isPackage(name)", 2, 2);
    console.add_command(None, "isActivePackage", Callback::Bool(is_active_package), "isActivePackage(name)", 2, 2);

    console.mark_group(None, "Console", Some("lookup, variables and tracing"));
    console.add_command(None, "isFunction", Callback::Bool(is_function), "isFunction(name)", 2, 2);
    console.add_command(None, "isMethod", Callback::Bool(is_method), "isMethod(namespace, name)", 3, 3);
    console.add_command(None, "isObject", Callback::Bool(is_object), "isObject(object)", 2, 2);
    console.add_command(None, "nameToID", Callback::Int(name_to_id), "nameToID(object)", 2, 2);
    console.add_command(None, "backtrace", Callback::Void(backtrace), "backtrace()", 1, 1);
    console.add_command(None, "trace", Callback::Void(trace), "trace(enable)", 2, 2);
    console.add_command(
        None,
        "exportVariables",
        Callback::Void(export_variables),
        "exportVariables(pattern)",
        2,
        2,
    );
    console.add_command(None, "deleteVariables", Callback::Void(delete_variables), "deleteVariables(pattern)", 2, 2);
}

fn activate_package(console: &mut Console, _: Option<&ObjectRef>, argv: &[String]) {
    if let Err(err) = console.activate_package(&argv[1]) {
        console.warn(&format!("activatePackage: {err:#}"));
    }
}

fn deactivate_package(console: &mut Console, _: Option<&ObjectRef>, argv: &[String]) {
    if !console.deactivate_package(&argv[1]) {
        debug!(package = %argv[1], "deactivatePackage on an inactive package");
    }
}

fn is_package(console: &mut Console, _: Option<&ObjectRef>, argv: &[String]) -> bool {
    console.is_package(&argv[1])
}

fn is_active_package(console: &mut Console, _: Option<&ObjectRef>, argv: &[String]) -> bool {
    console
        .namespaces()
        .active_packages()
        .iter()
        .any(|p| p.as_str().eq_ignore_ascii_case(&argv[1]))
}

fn is_function(console: &mut Console, _: Option<&ObjectRef>, argv: &[String]) -> bool {
    console.is_function(None, &argv[1])
}

fn is_method(console: &mut Console, _: Option<&ObjectRef>, argv: &[String]) -> bool {
    console.is_function(Some(&argv[1]), &argv[2])
}

fn is_object(console: &mut Console, _: Option<&ObjectRef>, argv: &[String]) -> bool {
    console.find_object(&argv[1]).is_some()
}

/// Id of the named object, -1 when there is none.
fn name_to_id(console: &mut Console, _: Option<&ObjectRef>, argv: &[String]) -> i32 {
    console.find_object(&argv[1]).map_or(-1, |o| o.id() as i32)
}

fn backtrace(console: &mut Console, _: Option<&ObjectRef>, _: &[String]) {
    let line = format!("BackTrace: {}", console.backtrace());
    console.print(&line);
}

fn trace(console: &mut Console, _: Option<&ObjectRef>, argv: &[String]) {
    let on = val::parse_bool(&argv[1]);
    console.set_trace(on);
    let line = format!("Console trace is {}", if on { "on" } else { "off" });
    console.print(&line);
}

/// Prints `name = "value"` for each global matching the pattern.
fn export_variables(console: &mut Console, _: Option<&ObjectRef>, argv: &[String]) {
    let pairs = console.eval_state().globals.export_variables(&argv[1]);
    for (name, value) in pairs {
        console.print(&format!("{name} = \"{value}\";"));
    }
}

fn delete_variables(console: &mut Console, _: Option<&ObjectRef>, argv: &[String]) {
    let removed = console.eval_state().globals.delete_variables(&argv[1]);
    debug!(pattern = %argv[1], removed, "deleted variables");
}
