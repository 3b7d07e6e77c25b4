//! Persisted form of a [`CompiledUnit`].
//!
//! Layout, all integers little endian:
//!
//! ```text
//! u32 version
//! u32 len, bytes          global string table
//! u32 len, bytes          function string table
//! u32 n, n x f64          global float table
//! u32 n, n x f64          function float table
//! u32 code_size
//! u32 pair_count
//! code_size words         byte, or 0xFF then u32
//! pair_count x 2 u32      (line << 8 | saved opcode, ip)
//! u32 n, n x ident        (u32 offset, u32 count, count x u32 ip)
//! ```
//!
//! Identifier operands are written as 0 and patched on load from the
//! spelling at `offset` in the global string table, so a persisted unit
//! does not depend on the interner state of the process that wrote it.

use anyhow::{Context, Result, bail, ensure};

use crate::intern::Symbol;

use super::{
    bytecode::{Opcode, Operand},
    unit::{CompiledUnit, IdentFixup, UnitParts, string_at},
};

pub const CURRENT_VERSION: u32 = 1;

const WIDE_WORD: u8 = 0xFF;

/// Result of reading a persisted unit.
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded(CompiledUnit),
    /// Written by a different format version; recompile from source.
    Stale { found: u32, expected: u32 },
}

/// Encode `unit`. Breakpoints set on the unit are not persisted.
pub fn write_unit(unit: &CompiledUnit) -> Vec<u8> {
    let mut code = unit.code_words();
    for fixup in unit.idents() {
        for &ip in &fixup.ips {
            if let Some(word) = code.get_mut(ip as usize) {
                *word = 0;
            }
        }
    }

    let mut out = Vec::with_capacity(code.len() * 2 + unit.global_strings().len() + 64);
    write_u32(&mut out, CURRENT_VERSION);
    write_bytes(&mut out, unit.global_strings());
    write_bytes(&mut out, unit.function_strings());
    write_floats(&mut out, unit.global_floats());
    write_floats(&mut out, unit.function_floats());
    write_u32(&mut out, code.len() as u32);
    write_u32(&mut out, unit.line_breaks().len() as u32);
    for &word in &code {
        if word < u32::from(WIDE_WORD) {
            out.push(word as u8);
        } else {
            out.push(WIDE_WORD);
            write_u32(&mut out, word);
        }
    }
    for &(inst_line, ip) in unit.line_breaks() {
        write_u32(&mut out, inst_line);
        write_u32(&mut out, ip);
    }
    write_u32(&mut out, unit.idents().len() as u32);
    for fixup in unit.idents() {
        write_u32(&mut out, fixup.offset);
        write_u32(&mut out, fixup.ips.len() as u32);
        for &ip in &fixup.ips {
            write_u32(&mut out, ip);
        }
    }
    out
}

/// Decode a persisted unit. A version other than [`CURRENT_VERSION`] is
/// reported as [`LoadOutcome::Stale`]; truncated or malformed input is an
/// error.
pub fn read_unit(bytes: &[u8], name: Option<&str>) -> Result<LoadOutcome> {
    let mut cursor = 0;
    let version = read_u32(bytes, &mut cursor).context("reading version")?;
    if version != CURRENT_VERSION {
        return Ok(LoadOutcome::Stale {
            found: version,
            expected: CURRENT_VERSION,
        });
    }

    let global_strings = read_bytes(bytes, &mut cursor).context("reading global strings")?;
    let function_strings = read_bytes(bytes, &mut cursor).context("reading function strings")?;
    let global_floats = read_floats(bytes, &mut cursor).context("reading global floats")?;
    let function_floats = read_floats(bytes, &mut cursor).context("reading function floats")?;
    let code_size = read_u32(bytes, &mut cursor)? as usize;
    let pair_count = read_u32(bytes, &mut cursor)? as usize;
    ensure!(code_size <= bytes.len(), "code size {} exceeds input", code_size);

    let mut code = Vec::with_capacity(code_size);
    for _ in 0..code_size {
        let byte = read_u8(bytes, &mut cursor).context("reading code")?;
        let word = if byte == WIDE_WORD {
            read_u32(bytes, &mut cursor).context("reading code")?
        } else {
            u32::from(byte)
        };
        code.push(word);
    }

    ensure!(pair_count <= bytes.len() / 8, "line table size {} exceeds input", pair_count);
    let mut line_breaks = Vec::with_capacity(pair_count);
    for _ in 0..pair_count {
        let inst_line = read_u32(bytes, &mut cursor)?;
        let ip = read_u32(bytes, &mut cursor)?;
        ensure!((ip as usize) < code.len(), "line table entry at {} is outside the code", ip);
        line_breaks.push((inst_line, ip));
    }

    let ident_count = read_u32(bytes, &mut cursor)? as usize;
    ensure!(ident_count <= bytes.len() / 8, "ident table size {} exceeds input", ident_count);
    let mut idents = Vec::with_capacity(ident_count);
    for _ in 0..ident_count {
        let offset = read_u32(bytes, &mut cursor)?;
        let count = read_u32(bytes, &mut cursor)? as usize;
        ensure!(count <= bytes.len() / 4, "ident patch count {} exceeds input", count);
        let sym = Symbol::intern(string_at(&global_strings, offset));
        let mut ips = Vec::with_capacity(count);
        for _ in 0..count {
            let ip = read_u32(bytes, &mut cursor)?;
            let Some(word) = code.get_mut(ip as usize) else {
                bail!("ident patch at {} is outside the code", ip);
            };
            *word = sym.index();
            ips.push(ip);
        }
        idents.push(IdentFixup { offset, ips });
    }
    ensure!(cursor == bytes.len(), "{} trailing bytes after unit", bytes.len() - cursor);
    validate_code(&code)?;

    let parts = UnitParts {
        code,
        global_strings,
        function_strings,
        global_floats,
        function_floats,
        line_breaks,
        idents,
    };
    Ok(LoadOutcome::Loaded(CompiledUnit::from_parts(name, parts)))
}

/// Every instruction decodes and every jump lands inside the unit.
fn validate_code(code: &[u32]) -> Result<()> {
    let mut ip = 0usize;
    while ip < code.len() {
        let Some(op) = Opcode::from_word(code[ip]) else {
            bail!("invalid opcode {} at {}", code[ip], ip);
        };
        ensure!(op != Opcode::Break, "persisted unit carries a breakpoint at {}", ip);
        let width = op.width(code, ip);
        ensure!(ip + width <= code.len(), "{} at {} runs past the end of the code", op, ip);
        for (slot, kind) in op.operands().iter().enumerate() {
            if *kind == Operand::Jump {
                let target = code[ip + 1 + slot] as usize;
                ensure!(target <= code.len(), "{} at {} jumps outside the code", op, ip);
            }
        }
        ip += width;
    }
    Ok(())
}

fn write_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn write_bytes(out: &mut Vec<u8>, value: &[u8]) {
    write_u32(out, value.len() as u32);
    out.extend_from_slice(value);
}

fn write_floats(out: &mut Vec<u8>, values: &[f64]) {
    write_u32(out, values.len() as u32);
    for value in values {
        out.extend_from_slice(&value.to_le_bytes());
    }
}

fn read_u8(bytes: &[u8], cursor: &mut usize) -> Result<u8> {
    if *cursor >= bytes.len() {
        bail!("unexpected end of input while reading u8");
    }
    let value = bytes[*cursor];
    *cursor += 1;
    Ok(value)
}

fn read_u32(bytes: &[u8], cursor: &mut usize) -> Result<u32> {
    if *cursor + 4 > bytes.len() {
        bail!("unexpected end of input while reading u32");
    }
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[*cursor..*cursor + 4]);
    *cursor += 4;
    Ok(u32::from_le_bytes(buf))
}

fn read_f64(bytes: &[u8], cursor: &mut usize) -> Result<f64> {
    if *cursor + 8 > bytes.len() {
        bail!("unexpected end of input while reading f64");
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[*cursor..*cursor + 8]);
    *cursor += 8;
    Ok(f64::from_le_bytes(buf))
}

fn read_bytes(bytes: &[u8], cursor: &mut usize) -> Result<Vec<u8>> {
    let len = read_u32(bytes, cursor)? as usize;
    if *cursor + len > bytes.len() {
        bail!("unexpected end of input while reading string table");
    }
    let slice = &bytes[*cursor..*cursor + len];
    *cursor += len;
    Ok(slice.to_vec())
}

fn read_floats(bytes: &[u8], cursor: &mut usize) -> Result<Vec<f64>> {
    let count = read_u32(bytes, cursor)? as usize;
    ensure!(count <= bytes.len() / 8, "float table size {} exceeds input", count);
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        values.push(read_f64(bytes, cursor)?);
    }
    Ok(values)
}
