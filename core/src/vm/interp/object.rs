use std::rc::Rc;

use crate::{
    intern::Symbol,
    vm::{Console, host::ObjectRef, unit::CompiledUnit},
};

/// An object between `CREATE_OBJECT` and `END_OBJECT`.
#[derive(Debug)]
pub(super) struct PendingObject {
    pub object: ObjectRef,
    /// Where construction resumes if the object cannot be added.
    pub fail_ip: u32,
}

impl Console {
    /// `CREATE_OBJECT parent fail`. Consumes the argument frame
    /// `(class, name, args...)` and either pushes a pending object or
    /// returns the failure target.
    pub(super) fn create_object_op(
        &mut self,
        unit: &CompiledUnit,
        ip: &mut u32,
        pending: &mut Vec<PendingObject>,
        no_calls: bool,
    ) {
        let op_ip = *ip - 1;
        let parent = Symbol::from_word(unit.word(*ip));
        let fail_ip = unit.word(*ip + 1);
        *ip += 2;

        let argv = self.values.get_argc_argv(Symbol::EMPTY);
        if no_calls {
            *ip = fail_ip;
            return;
        }
        let class_name = argv.get(1).map(String::as_str).unwrap_or("");
        let object_name = argv.get(2).map(String::as_str).unwrap_or("");

        let Some(object) = self.classes.create(Symbol::intern(class_name)) else {
            self.warn(&format!(
                "{}: Unable to instantiate non-conobject class {class_name}.",
                unit.file_line(op_ip)
            ));
            *ip = fail_ip;
            return;
        };

        if !parent.is_empty() {
            match self.objects.find(parent.as_str()) {
                Some(proto) => object.assign_fields_from(&proto),
                None => self.warn(&format!(
                    "{}: Unable to find parent object {parent} for {class_name}.",
                    unit.file_line(op_ip)
                )),
            }
        }

        if !object.process_arguments(argv.get(3..).unwrap_or(&[])) {
            self.warn(&format!(
                "{}: Unable to create object {object_name} of class {class_name}: bad arguments.",
                unit.file_line(op_ip)
            ));
            *ip = fail_ip;
            return;
        }
        if !object_name.is_empty() {
            self.objects.assign_name(&object, object_name);
        }
        pending.push(PendingObject { object, fail_ip });
    }

    /// `ADD_OBJECT root`. Registers the innermost pending object and
    /// replaces the result slot on the int stack with its id.
    pub(super) fn add_object_op(&mut self, unit: &CompiledUnit, ip: &mut u32, pending: &mut Vec<PendingObject>) {
        let op_ip = *ip - 1;
        let root = unit.word(*ip) != 0;
        *ip += 1;

        let Some(top) = pending.last() else {
            self.error(&format!("{}: ADD_OBJECT without a pending object", unit.file_line(op_ip)));
            return;
        };
        let object = Rc::clone(&top.object);
        let fail_ip = top.fail_ip;

        if !self.register_object(&object) {
            self.warn(&format!(
                "{}: Register object failed for object {} of class {}.",
                unit.file_line(op_ip),
                object.name().unwrap_or(""),
                object.class_name()
            ));
            pending.pop();
            *ip = fail_ip;
            return;
        }

        if !root {
            let len = self.int_stack.len();
            let parent_id = if len >= 2 { self.int_stack[len - 2] } else { 0 };
            match self.objects.find_by_id(parent_id as u32) {
                Some(parent) if parent.is_group() => {
                    parent.add_child(Rc::clone(&object));
                }
                _ => self.warn(&format!(
                    "{}: Parent object {parent_id} is not a group, {} was not added to it.",
                    unit.file_line(op_ip),
                    object.id()
                )),
            }
        }

        match self.int_stack.last_mut() {
            Some(slot) => *slot = object.id() as i32,
            None => self.error(&format!("{}: ADD_OBJECT with no result slot", unit.file_line(op_ip))),
        }
    }
}
