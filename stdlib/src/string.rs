//! String commands. Words are separated by spaces, tabs or newlines.

use conscript_core::{
    Console,
    val,
    vm::{Callback, ObjectRef},
};

pub fn register(console: &mut Console) {
    console.mark_group(None, "String", Some("string inspection and case helpers"));
    console.add_command(None, "echo", Callback::Void(echo), "echo(text, ...)", 2, 0);
    console.add_command(None, "strlen", Callback::Int(strlen), "strlen(string)", 2, 2);
    console.add_command(None, "strupr", Callback::String(strupr), "strupr(string)", 2, 2);
    console.add_command(None, "strlwr", Callback::String(strlwr), "strlwr(string)", 2, 2);
    console.add_command(None, "strcmp", Callback::Int(strcmp), "strcmp(a, b)", 3, 3);
    console.add_command(None, "stricmp", Callback::Int(stricmp), "stricmp(a, b)", 3, 3);
    console.add_command(None, "strstr", Callback::Int(strstr), "strstr(haystack, needle)", 3, 3);
    console.add_command(None, "getWord", Callback::String(get_word), "getWord(text, index)", 3, 3);
    console.add_command(None, "getWordCount", Callback::Int(get_word_count), "getWordCount(text)", 2, 2);
}

fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split([' ', '\t', '\n']).filter(|w| !w.is_empty())
}

fn echo(console: &mut Console, _: Option<&ObjectRef>, argv: &[String]) {
    let line = argv[1..].concat();
    console.print(&line);
}

fn strlen(_: &mut Console, _: Option<&ObjectRef>, argv: &[String]) -> i32 {
    argv[1].len() as i32
}

fn strupr(_: &mut Console, _: Option<&ObjectRef>, argv: &[String]) -> String {
    argv[1].to_uppercase()
}

fn strlwr(_: &mut Console, _: Option<&ObjectRef>, argv: &[String]) -> String {
    argv[1].to_lowercase()
}

fn sign(ordering: std::cmp::Ordering) -> i32 {
    ordering as i32
}

fn strcmp(_: &mut Console, _: Option<&ObjectRef>, argv: &[String]) -> i32 {
    sign(argv[1].cmp(&argv[2]))
}

fn stricmp(_: &mut Console, _: Option<&ObjectRef>, argv: &[String]) -> i32 {
    sign(argv[1].to_ascii_lowercase().cmp(&argv[2].to_ascii_lowercase()))
}

/// Byte offset of the first match, -1 when absent.
fn strstr(_: &mut Console, _: Option<&ObjectRef>, argv: &[String]) -> i32 {
    argv[1].find(argv[2].as_str()).map_or(-1, |at| at as i32)
}

fn get_word(_: &mut Console, _: Option<&ObjectRef>, argv: &[String]) -> String {
    let index = val::parse_int(&argv[2]);
    if index < 0 {
        return String::new();
    }
    words(&argv[1]).nth(index as usize).unwrap_or("").to_owned()
}

fn get_word_count(_: &mut Console, _: Option<&ObjectRef>, argv: &[String]) -> i32 {
    words(&argv[1]).count() as i32
}
