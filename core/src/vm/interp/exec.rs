use std::rc::Rc;

use tracing::{debug, error};

use crate::{
    intern::Symbol,
    val,
    vm::{Console, bytecode::Opcode, host::ObjectRef, unit::CompiledUnit},
};

use super::{RunContext, object::PendingObject};

impl Console {
    #[inline]
    fn pop_int(&mut self) -> i32 {
        match self.int_stack.pop() {
            Some(v) => v,
            None => {
                error!("int stack underflow");
                0
            }
        }
    }

    #[inline]
    fn pop_float(&mut self) -> f64 {
        match self.float_stack.pop() {
            Some(v) => v,
            None => {
                error!("float stack underflow");
                0.0
            }
        }
    }

    #[inline]
    fn top_int(&mut self) -> &mut i32 {
        if self.int_stack.is_empty() {
            error!("int stack underflow");
            self.int_stack.push(0);
        }
        let last = self.int_stack.len() - 1;
        &mut self.int_stack[last]
    }

    #[inline]
    fn top_float(&mut self) -> &mut f64 {
        if self.float_stack.is_empty() {
            error!("float stack underflow");
            self.float_stack.push(0.0);
        }
        let last = self.float_stack.len() - 1;
        &mut self.float_stack[last]
    }

    /// Pop the left (top) and right operands of an int operator.
    #[inline]
    fn int_operands(&mut self) -> (i32, i32) {
        let left = self.pop_int();
        let right = self.pop_int();
        (left, right)
    }

    #[inline]
    fn float_operands(&mut self) -> (f64, f64) {
        let left = self.pop_float();
        let right = self.pop_float();
        (left, right)
    }

    /// The dispatch loop. Runs from `ip` until a return and yields the
    /// returned string.
    pub(super) fn run(&mut self, unit: &Rc<CompiledUnit>, mut ip: u32, ctx: RunContext) -> String {
        let mut cur_object: Option<ObjectRef> = None;
        let mut cur_field = Symbol::EMPTY;
        let mut cur_field_array = String::new();
        let mut pending: Vec<PendingObject> = Vec::new();

        loop {
            let raw = unit.word(ip);
            let mut op = match Opcode::from_word(raw) {
                Some(op) => op,
                None => {
                    error!("{}: invalid opcode {raw} at {ip}", unit.file_line(ip));
                    return String::new();
                }
            };
            if op == Opcode::Break {
                match unit.find_break_line(ip) {
                    Some((line, saved)) => {
                        self.notify_breakpoint(unit, line);
                        op = saved;
                    }
                    None => {
                        error!("{}: breakpoint trap without a line entry at {ip}", unit.file_line(ip));
                        return String::new();
                    }
                }
            }
            ip += 1;

            match op {
                Opcode::FuncDecl => {
                    let operands = ip;
                    let name = Symbol::from_word(unit.word(ip));
                    let ns = Symbol::from_word(unit.word(ip + 1));
                    let package = Symbol::from_word(unit.word(ip + 2));
                    let has_body = unit.word(ip + 3) != 0;
                    let end = unit.word(ip + 4);
                    if !ctx.no_calls {
                        self.namespaces.unlink_packages();
                        let ns_id = self.namespaces.find(Some(ns), Some(package));
                        let offset = if has_body { operands } else { 0 };
                        self.namespaces.add_function(ns_id, name, Rc::clone(unit), offset);
                        self.namespaces.relink_packages();
                        debug!(
                            function = %name,
                            namespace = %self.namespaces.display_name(ns_id),
                            "declared function"
                        );
                    }
                    ip = end;
                }
                Opcode::CreateObject => {
                    self.create_object_op(unit, &mut ip, &mut pending, ctx.no_calls);
                }
                Opcode::AddObject => {
                    self.add_object_op(unit, &mut ip, &mut pending);
                }
                Opcode::EndObject => {
                    pending.pop();
                }

                Opcode::JmpIfFNot => {
                    if self.pop_float() == 0.0 {
                        ip = unit.word(ip);
                    } else {
                        ip += 1;
                    }
                }
                Opcode::JmpIfNot => {
                    if self.pop_int() == 0 {
                        ip = unit.word(ip);
                    } else {
                        ip += 1;
                    }
                }
                Opcode::JmpIfF => {
                    if self.pop_float() != 0.0 {
                        ip = unit.word(ip);
                    } else {
                        ip += 1;
                    }
                }
                Opcode::JmpIf => {
                    if self.pop_int() != 0 {
                        ip = unit.word(ip);
                    } else {
                        ip += 1;
                    }
                }
                Opcode::JmpIfNotNp => {
                    if *self.top_int() == 0 {
                        ip = unit.word(ip);
                    } else {
                        self.pop_int();
                        ip += 1;
                    }
                }
                Opcode::JmpIfNp => {
                    if *self.top_int() != 0 {
                        ip = unit.word(ip);
                    } else {
                        self.pop_int();
                        ip += 1;
                    }
                }
                Opcode::Jmp => ip = unit.word(ip),
                Opcode::Return => return self.values.get_str().to_owned(),
                Opcode::ReturnVoid => return String::new(),

                Opcode::CmpEq | Opcode::CmpGr | Opcode::CmpGe | Opcode::CmpLt | Opcode::CmpLe | Opcode::CmpNe => {
                    let (left, right) = self.float_operands();
                    let result = match op {
                        Opcode::CmpEq => left == right,
                        Opcode::CmpGr => left > right,
                        Opcode::CmpGe => left >= right,
                        Opcode::CmpLt => left < right,
                        Opcode::CmpLe => left <= right,
                        _ => left != right,
                    };
                    self.int_stack.push(i32::from(result));
                }
                Opcode::Xor
                | Opcode::Mod
                | Opcode::BitAnd
                | Opcode::BitOr
                | Opcode::Shr
                | Opcode::Shl
                | Opcode::And
                | Opcode::Or => {
                    let (left, right) = self.int_operands();
                    let result = match op {
                        Opcode::Xor => left ^ right,
                        Opcode::Mod => left.checked_rem(right).unwrap_or(0),
                        Opcode::BitAnd => left & right,
                        Opcode::BitOr => left | right,
                        Opcode::Shr => left.wrapping_shr(right as u32),
                        Opcode::Shl => left.wrapping_shl(right as u32),
                        Opcode::And => i32::from(left != 0 && right != 0),
                        _ => i32::from(left != 0 || right != 0),
                    };
                    self.int_stack.push(result);
                }
                Opcode::Not => {
                    let top = self.top_int();
                    *top = i32::from(*top == 0);
                }
                Opcode::NotF => {
                    let v = self.pop_float();
                    self.int_stack.push(i32::from(v == 0.0));
                }
                Opcode::OnesComplement => {
                    let top = self.top_int();
                    *top = !*top;
                }
                Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div => {
                    let (left, right) = self.float_operands();
                    let result = match op {
                        Opcode::Add => left + right,
                        Opcode::Sub => left - right,
                        Opcode::Mul => left * right,
                        _ => left / right,
                    };
                    self.float_stack.push(result);
                }
                Opcode::Neg => {
                    let top = self.top_float();
                    *top = -*top;
                }

                Opcode::LoadVarUint => {
                    let name = Symbol::from_word(unit.word(ip));
                    ip += 1;
                    let v = self.load_var_int(name);
                    self.int_stack.push(v);
                }
                Opcode::LoadVarFlt => {
                    let name = Symbol::from_word(unit.word(ip));
                    ip += 1;
                    let v = self.load_var_float(name);
                    self.float_stack.push(v);
                }
                Opcode::LoadVarStr => {
                    let name = Symbol::from_word(unit.word(ip));
                    ip += 1;
                    self.load_var_str(name);
                }
                Opcode::SaveVarUint => {
                    let name = Symbol::from_word(unit.word(ip));
                    ip += 1;
                    let v = *self.top_int();
                    self.save_var_int(name, v);
                }
                Opcode::SaveVarFlt => {
                    let name = Symbol::from_word(unit.word(ip));
                    ip += 1;
                    let v = *self.top_float();
                    self.save_var_float(name, v);
                }
                Opcode::SaveVarStr => {
                    let name = Symbol::from_word(unit.word(ip));
                    ip += 1;
                    self.save_var_str(name);
                }
                Opcode::LoadVarArrayUint => {
                    let name = Symbol::intern(self.values.get_str());
                    let v = self.load_var_int(name);
                    self.int_stack.push(v);
                }
                Opcode::LoadVarArrayFlt => {
                    let name = Symbol::intern(self.values.get_str());
                    let v = self.load_var_float(name);
                    self.float_stack.push(v);
                }
                Opcode::LoadVarArrayStr => {
                    let name = Symbol::intern(self.values.get_str());
                    self.load_var_str(name);
                }
                Opcode::SaveVarArrayUint => {
                    let name = Symbol::intern(self.values.get_str());
                    let v = *self.top_int();
                    self.save_var_int(name, v);
                }
                Opcode::SaveVarArrayFlt => {
                    let name = Symbol::intern(self.values.get_str());
                    let v = *self.top_float();
                    self.save_var_float(name, v);
                }
                Opcode::SaveVarArrayStr => {
                    let name = Symbol::intern(self.values.get_str());
                    self.values.rewind_terminate();
                    self.save_var_str(name);
                }

                Opcode::SetCurObject => {
                    cur_object = self.objects.find(self.values.get_str());
                }
                Opcode::SetCurObjectNew => {
                    cur_object = pending.last().map(|p| Rc::clone(&p.object));
                }
                Opcode::SetCurField => {
                    cur_field = Symbol::from_word(unit.word(ip));
                    ip += 1;
                    cur_field_array.clear();
                }
                Opcode::SetCurFieldArray => {
                    cur_field_array.clear();
                    cur_field_array.push_str(self.values.get_str());
                }
                Opcode::LoadFieldUint => {
                    let v = cur_object
                        .as_ref()
                        .map_or(0, |o| val::parse_int(&o.get_field(cur_field, &cur_field_array)));
                    self.int_stack.push(v);
                }
                Opcode::LoadFieldFlt => {
                    let v = cur_object
                        .as_ref()
                        .map_or(0.0, |o| val::parse_float(&o.get_field(cur_field, &cur_field_array)));
                    self.float_stack.push(v);
                }
                Opcode::LoadFieldStr => match cur_object.as_ref() {
                    Some(o) => {
                        let text = o.get_field(cur_field, &cur_field_array);
                        self.values.set_str(&text);
                    }
                    None => self.values.set_str(""),
                },
                Opcode::SaveFieldUint => {
                    let v = *self.top_int();
                    if let Some(o) = cur_object.as_ref() {
                        o.set_field(cur_field, &cur_field_array, &val::format_int(v));
                    }
                }
                Opcode::SaveFieldFlt => {
                    let v = *self.top_float();
                    if let Some(o) = cur_object.as_ref() {
                        o.set_field(cur_field, &cur_field_array, &val::format_float(v));
                    }
                }
                Opcode::SaveFieldStr => {
                    if let Some(o) = cur_object.as_ref() {
                        o.set_field(cur_field, &cur_field_array, self.values.get_str());
                    }
                }

                Opcode::StrToUint => {
                    let v = self.values.get_int();
                    self.int_stack.push(v);
                }
                Opcode::StrToFlt => {
                    let v = self.values.get_float();
                    self.float_stack.push(v);
                }
                Opcode::StrToNone => {}
                Opcode::FltToUint => {
                    let v = self.pop_float();
                    self.int_stack.push(v as i32);
                }
                Opcode::FltToStr => {
                    let v = self.pop_float();
                    self.values.set_float(v);
                }
                Opcode::FltToNone => {
                    self.pop_float();
                }
                Opcode::UintToFlt => {
                    let v = self.pop_int();
                    self.float_stack.push(f64::from(v));
                }
                Opcode::UintToStr => {
                    let v = self.pop_int();
                    self.values.set_int(v);
                }
                Opcode::UintToNone => {
                    self.pop_int();
                }

                Opcode::LoadImmedUint => {
                    self.int_stack.push(unit.word(ip) as i32);
                    ip += 1;
                }
                Opcode::LoadImmedFlt => {
                    self.float_stack.push(unit.float_at(ctx.in_function, unit.word(ip)));
                    ip += 1;
                }
                Opcode::LoadImmedStr => {
                    self.values.set_str(unit.string_at(ctx.in_function, unit.word(ip)));
                    ip += 1;
                }
                Opcode::LoadImmedIdent => {
                    self.values.set_symbol(Symbol::from_word(unit.word(ip)));
                    ip += 1;
                }

                Opcode::CallFuncResolve | Opcode::CallFunc => {
                    self.dispatch_call(unit, &mut ip, ctx);
                }

                Opcode::AdvanceStr => self.values.advance(),
                Opcode::AdvanceStrAppendChar => {
                    let c = char::from_u32(unit.word(ip)).unwrap_or(' ');
                    ip += 1;
                    self.values.advance_char(c);
                }
                Opcode::AdvanceStrComma => self.values.advance_char('_'),
                Opcode::AdvanceStrNul => self.values.push(),
                Opcode::RewindStr => self.values.rewind(),
                Opcode::TerminateRewindStr => self.values.rewind_terminate(),
                Opcode::CompareStr => {
                    let equal = self.values.compare();
                    self.int_stack.push(i32::from(equal));
                }
                Opcode::Push => self.values.push(),
                Opcode::PushFrame => self.values.push_frame(),

                Opcode::Break | Opcode::Invalid => {
                    error!("{}: invalid instruction {op} at {}", unit.file_line(ip - 1), ip - 1);
                    return String::new();
                }
            }
        }
    }
}
