use std::collections::hash_map::Entry;

use crate::{
    intern::Symbol,
    util::fast_map::{FastHashMap, fast_hash_map_new},
    vm::{
        bytecode::Opcode,
        unit::{IdentFixup, UnitParts},
    },
};

/// Which pass a [`CodeBuilder`] is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pass {
    /// Count words and collect literals.
    Size,
    /// Write words into the sized buffer.
    Emit,
}

/// Representation an expression must leave its result in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TypeReq {
    None,
    UInt,
    Float,
    String,
}

impl TypeReq {
    /// Instruction converting a result of type `self` into `to`.
    pub(crate) fn conversion_to(self, to: TypeReq) -> Option<Opcode> {
        use TypeReq::*;
        match (self, to) {
            (String, UInt) => Some(Opcode::StrToUint),
            (String, Float) => Some(Opcode::StrToFlt),
            (String, None) => Some(Opcode::StrToNone),
            (Float, UInt) => Some(Opcode::FltToUint),
            (Float, String) => Some(Opcode::FltToStr),
            (Float, None) => Some(Opcode::FltToNone),
            (UInt, Float) => Some(Opcode::UintToFlt),
            (UInt, String) => Some(Opcode::UintToStr),
            (UInt, None) => Some(Opcode::UintToNone),
            _ => Option::None,
        }
    }
}

/// NUL-packed string table with deduplication. Offsets stay stable as the
/// table grows, so offsets handed out in the sizing pass hold in the emit
/// pass.
#[derive(Debug, Default)]
pub(crate) struct StringTable {
    blob: Vec<u8>,
    offsets: FastHashMap<String, u32>,
}

impl StringTable {
    pub(crate) fn add(&mut self, text: &str) -> u32 {
        if let Some(&offset) = self.offsets.get(text) {
            return offset;
        }
        let offset = self.blob.len() as u32;
        self.blob.extend_from_slice(text.as_bytes());
        self.blob.push(0);
        self.offsets.insert(text.to_owned(), offset);
        offset
    }

    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.blob
    }
}

#[derive(Debug, Default)]
pub(crate) struct FloatTable {
    values: Vec<f64>,
    index: FastHashMap<u64, u32>,
}

impl FloatTable {
    pub(crate) fn add(&mut self, value: f64) -> u32 {
        match self.index.entry(value.to_bits()) {
            Entry::Occupied(slot) => *slot.get(),
            Entry::Vacant(slot) => {
                let idx = self.values.len() as u32;
                self.values.push(value);
                slot.insert(idx);
                idx
            }
        }
    }

    pub(crate) fn into_values(self) -> Vec<f64> {
        self.values
    }
}

/// Handle to a word whose value is a jump target not known yet.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FwdRef(usize);

#[derive(Debug, Default)]
pub(crate) struct LoopLabels {
    pub breaks: Vec<FwdRef>,
    pub continues: Vec<FwdRef>,
}

/// Code stream shared by both passes.
///
/// The sizing pass records every forward target in `targets` as it is
/// resolved; the emit pass replays the same walk and writes the recorded
/// target when it reaches the reserving word. Both passes must visit the
/// tree in the same order.
pub(crate) struct CodeBuilder {
    pass: Pass,
    ip: u32,
    code: Vec<u32>,
    targets: Vec<u32>,
    cursor: usize,
    target_mismatch: bool,
    global_strings: StringTable,
    function_strings: StringTable,
    global_floats: FloatTable,
    function_floats: FloatTable,
    pub(crate) in_function: bool,
    pub(crate) loops: Vec<LoopLabels>,
    break_count: usize,
    line_breaks: Vec<(u32, u32)>,
    idents: Vec<IdentFixup>,
    ident_slots: FastHashMap<u32, usize>,
}

impl CodeBuilder {
    pub(crate) fn new() -> Self {
        Self {
            pass: Pass::Size,
            ip: 0,
            code: Vec::new(),
            targets: Vec::new(),
            cursor: 0,
            target_mismatch: false,
            global_strings: StringTable::default(),
            function_strings: StringTable::default(),
            global_floats: FloatTable::default(),
            function_floats: FloatTable::default(),
            in_function: false,
            loops: Vec::new(),
            break_count: 0,
            line_breaks: Vec::new(),
            idents: Vec::new(),
            ident_slots: fast_hash_map_new(),
        }
    }

    /// Switch a finished sizing pass to the emit pass.
    pub(crate) fn into_emit(mut self) -> Self {
        self.code = Vec::with_capacity(self.ip as usize);
        self.line_breaks = Vec::with_capacity(self.break_count);
        self.pass = Pass::Emit;
        self.ip = 0;
        self.cursor = 0;
        self.in_function = false;
        self.loops.clear();
        self
    }

    pub(crate) fn pass(&self) -> Pass {
        self.pass
    }

    #[inline]
    pub(crate) fn ip(&self) -> u32 {
        self.ip
    }

    pub(crate) fn break_count(&self) -> usize {
        self.break_count
    }

    /// True when a forward target moved between the passes.
    pub(crate) fn target_mismatch(&self) -> bool {
        self.target_mismatch
    }

    #[inline]
    pub(crate) fn word(&mut self, word: u32) {
        if self.pass == Pass::Emit {
            self.code.push(word);
        }
        self.ip += 1;
    }

    #[inline]
    pub(crate) fn op(&mut self, op: Opcode) {
        self.word(op.word());
    }

    /// Emit an identifier operand and note it for load-time patching.
    pub(crate) fn ident(&mut self, name: Symbol) {
        if self.pass == Pass::Emit && !name.is_empty() {
            let offset = self.global_strings.add(name.as_str());
            let slot = match self.ident_slots.entry(offset) {
                Entry::Occupied(slot) => *slot.get(),
                Entry::Vacant(slot) => {
                    self.idents.push(IdentFixup { offset, ips: Vec::new() });
                    *slot.insert(self.idents.len() - 1)
                }
            };
            self.idents[slot].ips.push(self.ip);
        }
        self.word(name.index());
    }

    pub(crate) fn ident_str(&mut self, name: Option<&str>) {
        self.ident(name.map_or(Symbol::EMPTY, Symbol::intern));
    }

    pub(crate) fn convert(&mut self, from: TypeReq, to: TypeReq) {
        if let Some(op) = from.conversion_to(to) {
            self.op(op);
        }
    }

    /// Offset of `text` in the active string table.
    pub(crate) fn string_literal(&mut self, text: &str) -> u32 {
        if self.in_function {
            self.function_strings.add(text)
        } else {
            self.global_strings.add(text)
        }
    }

    /// Index of `value` in the active float table.
    pub(crate) fn float_literal(&mut self, value: f64) -> u32 {
        if self.in_function {
            self.function_floats.add(value)
        } else {
            self.global_floats.add(value)
        }
    }

    /// Record that a statement from `line` starts here.
    pub(crate) fn break_line(&mut self, line: u32) {
        match self.pass {
            Pass::Size => self.break_count += 1,
            Pass::Emit => self.line_breaks.push((line << 8, self.ip)),
        }
    }

    /// Reserve a word for a jump target resolved later.
    pub(crate) fn forward(&mut self) -> FwdRef {
        match self.pass {
            Pass::Size => {
                self.targets.push(u32::MAX);
                self.word(0);
                FwdRef(self.targets.len() - 1)
            }
            Pass::Emit => {
                let idx = self.cursor;
                self.cursor += 1;
                let target = self.targets.get(idx).copied().unwrap_or(u32::MAX);
                self.word(target);
                FwdRef(idx)
            }
        }
    }

    /// Point `fwd` at the current instruction.
    pub(crate) fn resolve(&mut self, fwd: FwdRef) {
        match self.pass {
            Pass::Size => self.targets[fwd.0] = self.ip,
            Pass::Emit => {
                if self.targets.get(fwd.0) != Some(&self.ip) {
                    self.target_mismatch = true;
                }
            }
        }
    }

    /// Jump to `target` unconditionally or with `op`.
    pub(crate) fn jump_to(&mut self, op: Opcode, target: u32) {
        self.op(op);
        self.word(target);
    }

    /// Jump with `op` to a target resolved later.
    pub(crate) fn jump_forward(&mut self, op: Opcode) -> FwdRef {
        self.op(op);
        self.forward()
    }

    pub(crate) fn finish(mut self) -> UnitParts {
        for (inst_line, ip) in self.line_breaks.iter_mut() {
            let displaced = self.code.get(*ip as usize).copied().unwrap_or(0) & 0xFF;
            *inst_line |= displaced;
        }
        UnitParts {
            code: self.code,
            global_strings: self.global_strings.into_bytes(),
            function_strings: self.function_strings.into_bytes(),
            global_floats: self.global_floats.into_values(),
            function_floats: self.function_floats.into_values(),
            line_breaks: self.line_breaks,
            idents: self.idents,
        }
    }
}
