//! A compiled unit: one source file or eval buffer worth of bytecode with
//! its literal tables and line/breakpoint metadata.
//!
//! Units are shared through `Rc`. Every namespace entry naming a script
//! function holds a strong reference, and so does the interpreter for the
//! duration of `exec`, so a unit whose last function gets replaced while
//! one of its statements is running stays alive until that statement
//! returns.

use std::{cell::Cell, fmt::Write as _, rc::Rc};

use crate::{intern::Symbol, val};

use super::{
    Console,
    bytecode::{CallType, Opcode, Operand},
    caches::CallSiteCaches,
    interp::FrameSelect,
    namespace::NamespaceId,
};

/// Where an identifier's spelling lives in the global string table and
/// which code words carry it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentFixup {
    pub offset: u32,
    pub ips: Vec<u32>,
}

/// Raw pieces a unit is assembled from, produced by the compiler or the
/// persisted-form reader.
#[derive(Debug, Default)]
pub(crate) struct UnitParts {
    pub code: Vec<u32>,
    pub global_strings: Vec<u8>,
    pub function_strings: Vec<u8>,
    pub global_floats: Vec<f64>,
    pub function_floats: Vec<f64>,
    pub line_breaks: Vec<(u32, u32)>,
    pub idents: Vec<IdentFixup>,
}

pub struct CompiledUnit {
    name: Option<Symbol>,
    pub(crate) code: Box<[Cell<u32>]>,
    pub(crate) global_strings: Box<[u8]>,
    pub(crate) function_strings: Box<[u8]>,
    pub(crate) global_floats: Box<[f64]>,
    pub(crate) function_floats: Box<[f64]>,
    /// `(line << 8 | saved opcode, ip)`, ascending by ip.
    pub(crate) line_breaks: Box<[(u32, u32)]>,
    pub(crate) idents: Box<[IdentFixup]>,
    pub(crate) call_sites: CallSiteCaches,
}

impl std::fmt::Debug for CompiledUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledUnit")
            .field("name", &self.name())
            .field("code_len", &self.code.len())
            .field("line_breaks", &self.line_breaks.len())
            .finish()
    }
}

impl CompiledUnit {
    pub(crate) fn from_parts(name: Option<&str>, parts: UnitParts) -> Self {
        Self {
            name: name.filter(|n| !n.is_empty()).map(Symbol::intern),
            code: parts.code.into_iter().map(Cell::new).collect(),
            global_strings: parts.global_strings.into_boxed_slice(),
            function_strings: parts.function_strings.into_boxed_slice(),
            global_floats: parts.global_floats.into_boxed_slice(),
            function_floats: parts.function_floats.into_boxed_slice(),
            line_breaks: parts.line_breaks.into_boxed_slice(),
            idents: parts.idents.into_boxed_slice(),
            call_sites: CallSiteCaches::default(),
        }
    }

    /// Source identifier, `None` for anonymous eval buffers.
    pub fn name(&self) -> Option<&'static str> {
        self.name.map(Symbol::as_str)
    }

    pub(crate) fn name_symbol(&self) -> Option<Symbol> {
        self.name
    }

    pub fn code_len(&self) -> usize {
        self.code.len()
    }

    /// The instruction stream with any breakpoint traps replaced by the
    /// opcodes they displaced.
    pub fn code_words(&self) -> Vec<u32> {
        let mut words: Vec<u32> = self.code.iter().map(Cell::get).collect();
        for &(inst_line, ip) in self.line_breaks.iter() {
            match words.get_mut(ip as usize) {
                Some(word) if *word == Opcode::Break.word() => *word = inst_line & 0xFF,
                _ => {}
            }
        }
        words
    }

    #[inline]
    pub(crate) fn word(&self, ip: u32) -> u32 {
        match self.code.get(ip as usize) {
            Some(cell) => cell.get(),
            None => Opcode::Invalid.word(),
        }
    }

    pub fn global_strings(&self) -> &[u8] {
        &self.global_strings
    }

    pub fn function_strings(&self) -> &[u8] {
        &self.function_strings
    }

    pub fn global_floats(&self) -> &[f64] {
        &self.global_floats
    }

    pub fn function_floats(&self) -> &[f64] {
        &self.function_floats
    }

    pub fn line_breaks(&self) -> &[(u32, u32)] {
        &self.line_breaks
    }

    pub fn idents(&self) -> &[IdentFixup] {
        &self.idents
    }

    #[inline]
    pub(crate) fn string_at(&self, in_function: bool, offset: u32) -> &str {
        let table = if in_function { &self.function_strings } else { &self.global_strings };
        string_at(table, offset)
    }

    #[inline]
    pub(crate) fn float_at(&self, in_function: bool, index: u32) -> f64 {
        let table = if in_function { &self.function_floats } else { &self.global_floats };
        table.get(index as usize).copied().unwrap_or(0.0)
    }

    /// Line and displaced opcode of the breakable instruction at `ip`.
    pub fn find_break_line(&self, ip: u32) -> Option<(u32, Opcode)> {
        let idx = self.line_breaks.binary_search_by_key(&ip, |&(_, at)| at).ok()?;
        let inst_line = self.line_breaks[idx].0;
        Some((inst_line >> 8, Opcode::from_word(inst_line & 0xFF)?))
    }

    /// Source line of the statement containing `ip`.
    pub fn line_for_ip(&self, ip: u32) -> u32 {
        let idx = self.line_breaks.partition_point(|&(_, at)| at <= ip);
        if idx == 0 { 0 } else { self.line_breaks[idx - 1].0 >> 8 }
    }

    pub fn file_line(&self, ip: u32) -> String {
        format!("{} ({})", self.name().unwrap_or("<input>"), self.line_for_ip(ip))
    }

    /// Trap the first statement starting on `line`.
    pub fn set_breakpoint(&self, line: u32) -> bool {
        match self.line_breaks.iter().find(|(inst_line, _)| inst_line >> 8 == line) {
            Some(&(_, ip)) => {
                self.code[ip as usize].set(Opcode::Break.word());
                true
            }
            None => false,
        }
    }

    pub fn clear_breakpoint(&self, line: u32) -> bool {
        let mut cleared = false;
        for &(inst_line, ip) in self.line_breaks.iter().filter(|(l, _)| l >> 8 == line) {
            self.code[ip as usize].set(inst_line & 0xFF);
            cleared = true;
        }
        cleared
    }

    pub fn set_all_breaks(&self) {
        for &(_, ip) in self.line_breaks.iter() {
            self.code[ip as usize].set(Opcode::Break.word());
        }
    }

    pub fn clear_all_breaks(&self) {
        for &(inst_line, ip) in self.line_breaks.iter() {
            self.code[ip as usize].set(inst_line & 0xFF);
        }
    }

    /// Sorted, deduplicated lines that carry a statement.
    pub fn breakable_lines(&self) -> Vec<u32> {
        let mut lines: Vec<u32> = self.line_breaks.iter().map(|(l, _)| l >> 8).collect();
        lines.sort_unstable();
        lines.dedup();
        lines
    }

    /// Breakable lines as a first absolute line followed by deltas, the
    /// form a remote debugger consumes.
    pub fn break_list(&self) -> Vec<u32> {
        let mut prev = 0;
        self.breakable_lines()
            .into_iter()
            .map(|line| {
                let delta = line - prev;
                prev = line;
                delta
            })
            .collect()
    }

    pub fn find_first_break_line(&self, line: u32) -> Option<u32> {
        self.breakable_lines().into_iter().find(|&l| l >= line)
    }

    /// Parameter names of the function whose body starts at `offset`.
    pub fn function_args(&self, offset: u32) -> Vec<&'static str> {
        let argc = self.word(offset + 5);
        (0..argc)
            .map(|i| Symbol::from_word(self.word(offset + 6 + i)).as_str())
            .collect()
    }

    /// Run the unit. `offset` is a function entry when `argv` is non-empty
    /// (`argv[0]` is the function name), otherwise the first top-level
    /// statement to execute.
    #[allow(clippy::too_many_arguments)]
    pub fn exec(
        self: &Rc<Self>,
        console: &mut Console,
        offset: u32,
        function_name: Option<Symbol>,
        namespace: Option<NamespaceId>,
        argv: &[String],
        no_calls: bool,
        package: Option<Symbol>,
        frame: FrameSelect,
    ) -> String {
        console.exec_unit(self, offset, function_name, namespace, argv, no_calls, package, frame)
    }

    /// Render the instruction stream as text.
    pub fn disassemble(&self) -> String {
        let code = self.code_words();
        let mut out = String::new();
        let mut ip = 0usize;
        let mut function_end: Option<usize> = None;
        while ip < code.len() {
            if function_end.is_some_and(|end| ip >= end) {
                function_end = None;
            }
            let in_function = function_end.is_some();
            let Some(op) = Opcode::from_word(code[ip]) else {
                let _ = writeln!(out, "{ip:>5}: .word {}", code[ip]);
                ip += 1;
                continue;
            };
            let _ = write!(out, "{ip:>5}: {}", op.mnemonic());
            for (slot, kind) in op.operands().iter().enumerate() {
                let word = code.get(ip + 1 + slot).copied().unwrap_or(0);
                out.push(' ');
                render_operand(&mut out, self, *kind, word, in_function);
            }
            if op == Opcode::FuncDecl {
                let argc = code.get(ip + 6).copied().unwrap_or(0) as usize;
                for i in 0..argc {
                    let word = code.get(ip + 7 + i).copied().unwrap_or(0);
                    out.push(' ');
                    render_operand(&mut out, self, Operand::Ident, word, in_function);
                }
                if code.get(ip + 4).copied().unwrap_or(0) != 0 {
                    function_end = code.get(ip + 5).map(|&end| end as usize);
                }
            }
            out.push('\n');
            ip += op.width(&code, ip);
        }
        out
    }
}

fn render_operand(out: &mut String, unit: &CompiledUnit, kind: Operand, word: u32, in_function: bool) {
    match kind {
        Operand::Ident => {
            let _ = write!(out, "'{}'", Symbol::from_word(word));
        }
        Operand::Jump => {
            let _ = write!(out, "->{word}");
        }
        Operand::Int => val::push_int(out, word as i32),
        Operand::Float => {
            out.push_str(&val::format_float(unit.float_at(in_function, word)));
        }
        Operand::Str => {
            let _ = write!(out, "{:?}", unit.string_at(in_function, word));
        }
        Operand::Char => {
            let _ = write!(out, "{:?}", char::from_u32(word).unwrap_or('?'));
        }
        Operand::CallKind => {
            let _ = write!(out, "{:?}", CallType::from_word(word));
        }
        Operand::Flag | Operand::Count => {
            let _ = write!(out, "{word}");
        }
    }
}

/// NUL-terminated string at `offset` of a packed table.
pub(crate) fn string_at(table: &[u8], offset: u32) -> &str {
    let Some(tail) = table.get(offset as usize..) else {
        return "";
    };
    let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
    std::str::from_utf8(&tail[..end]).unwrap_or("")
}
