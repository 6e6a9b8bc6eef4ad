//! Per-block translation of raw opcodes into graph instructions.
//!
//! A [`BlockTranslator`] walks one block's instruction range with a simulated
//! evaluation stack. Stack-effect-only opcodes (`ldc.*`, `dup`, `pop`)
//! manipulate the stack without emitting anything; everything else becomes a
//! graph instruction whose operands are the popped stack values. The
//! translator returns the residual stack for edge propagation.

use std::collections::BTreeMap;

use crate::graph::{
    assignable, binary_result, compare_ok, BlockId, CompareOp, Condition, Constant, MethodBody,
    Op, StackKind, UnaryOp, ValueId,
};
use crate::import::merge::EntrySlot;
use crate::import::stack::{PrefixState, ValueStack};
use crate::raw::{RawInstruction, RawOp};
use crate::Result;

pub(crate) struct BlockTranslator<'a> {
    body: &'a mut MethodBody,
    block: BlockId,
    stack: ValueStack,
    prefix: PrefixState,
    arguments: &'a [ValueId],
    locals: &'a [ValueId],
    return_kind: Option<StackKind>,
    entry_at: &'a BTreeMap<u32, BlockId>,
}

impl<'a> BlockTranslator<'a> {
    /// Creates a translator for one block, seeding the stack from the block's
    /// established entry shape.
    pub(crate) fn new(
        body: &'a mut MethodBody,
        block: BlockId,
        entry: &[EntrySlot],
        arguments: &'a [ValueId],
        locals: &'a [ValueId],
        return_kind: Option<StackKind>,
        entry_at: &'a BTreeMap<u32, BlockId>,
    ) -> Result<Self> {
        let offset = body.block(block).offset();
        let mut stack = ValueStack::new(body.max_stack());
        for slot in entry {
            stack.push(slot.value, slot.kind, offset)?;
        }
        Ok(Self {
            body,
            block,
            stack,
            prefix: PrefixState::default(),
            arguments,
            locals,
            return_kind,
            entry_at,
        })
    }

    /// Translates the block's instruction range.
    ///
    /// `fallthrough` is the offset of the next leader, when one exists. If the
    /// range does not end in a terminator, an unconditional branch to it is
    /// synthesized. Returns the residual stack, deepest first.
    pub(crate) fn run(
        mut self,
        instructions: &[RawInstruction],
        fallthrough: Option<u32>,
    ) -> Result<Vec<(ValueId, StackKind)>> {
        let mut terminated = false;
        let mut end_offset = self.body.block(self.block).offset();
        for instruction in instructions {
            end_offset = instruction.offset;
            if instruction.op.is_prefix() {
                self.prefix.apply(&instruction.op);
                continue;
            }
            self.translate(instruction)?;
            if instruction.op.is_terminator() {
                terminated = true;
            }
        }
        if !terminated {
            let target = match fallthrough {
                Some(offset) => self.target(end_offset, offset)?,
                None => {
                    return Err(invalid_program!(
                        end_offset,
                        "control falls through past the end of the method"
                    ))
                }
            };
            self.emit(Op::Branch { target }, vec![], end_offset, None);
        }
        Ok(self.stack.into_residual())
    }

    fn target(&self, offset: u32, target: u32) -> Result<BlockId> {
        self.entry_at.get(&target).copied().ok_or_else(|| {
            invalid_program!(offset, "branch target {target:#06X} is not a block start")
        })
    }

    fn emit(
        &mut self,
        op: Op,
        operands: Vec<ValueId>,
        offset: u32,
        result: Option<StackKind>,
    ) -> ValueId {
        let id = self.body.create_instruction(op, operands, offset, result);
        self.body.append_instruction(self.block, id);
        id
    }

    fn push_constant(&mut self, constant: Constant, offset: u32) -> Result<()> {
        let kind = constant.kind();
        let id = self.body.constant(constant);
        self.stack.push(id, kind, offset)
    }

    fn slot(&self, slots: &[ValueId], index: u16, what: &str, offset: u32) -> Result<ValueId> {
        slots.get(usize::from(index)).copied().ok_or_else(|| {
            invalid_program!(offset, "{what} index {index} out of range ({} declared)", slots.len())
        })
    }

    fn slot_kind(&self, slot: ValueId) -> StackKind {
        // arguments and variables always carry a kind
        self.body
            .value(slot)
            .result_kind()
            .unwrap_or(StackKind::Int32)
    }

    fn pop_address(&mut self, offset: u32) -> Result<ValueId> {
        let (address, kind) = self.stack.pop(offset)?;
        if !kind.is_address() {
            return Err(invalid_program!(
                offset,
                "expected an address on the stack, found {kind}"
            ));
        }
        Ok(address)
    }

    fn pop_object(&mut self, offset: u32) -> Result<ValueId> {
        let (object, kind) = self.stack.pop(offset)?;
        if kind != StackKind::Object {
            return Err(invalid_program!(
                offset,
                "expected an object reference on the stack, found {kind}"
            ));
        }
        Ok(object)
    }

    fn pop_index(&mut self, offset: u32) -> Result<ValueId> {
        let (index, kind) = self.stack.pop(offset)?;
        if !matches!(kind, StackKind::Int32 | StackKind::NativeInt) {
            return Err(invalid_program!(
                offset,
                "expected an int32 or native int index, found {kind}"
            ));
        }
        Ok(index)
    }

    fn pop_instance(&mut self, offset: u32) -> Result<ValueId> {
        let (object, kind) = self.stack.pop(offset)?;
        if !matches!(
            kind,
            StackKind::Object | StackKind::ByRef | StackKind::NativeInt | StackKind::Struct
        ) {
            return Err(invalid_program!(
                offset,
                "expected an object or pointer receiver, found {kind}"
            ));
        }
        Ok(object)
    }

    #[allow(clippy::too_many_lines)]
    fn translate(&mut self, instruction: &RawInstruction) -> Result<()> {
        let offset = instruction.offset;
        let emitted: Option<ValueId> = match &instruction.op {
            RawOp::Nop => None,

            RawOp::LdcI4(v) => {
                self.push_constant(Constant::I32(*v), offset)?;
                None
            }
            RawOp::LdcI8(v) => {
                self.push_constant(Constant::I64(*v), offset)?;
                None
            }
            RawOp::LdcR4(v) => {
                self.push_constant(Constant::F32(*v), offset)?;
                None
            }
            RawOp::LdcR8(v) => {
                self.push_constant(Constant::F64(*v), offset)?;
                None
            }
            RawOp::LdNull => {
                self.push_constant(Constant::Null, offset)?;
                None
            }
            RawOp::LdStr(index) => {
                self.push_constant(Constant::String(*index), offset)?;
                None
            }

            RawOp::Ldarg(index) => {
                let slot = self.slot(self.arguments, *index, "argument", offset)?;
                let kind = self.slot_kind(slot);
                let id = self.emit(Op::Load, vec![slot], offset, Some(kind));
                self.stack.push(id, kind, offset)?;
                Some(id)
            }
            RawOp::Ldloc(index) => {
                let slot = self.slot(self.locals, *index, "local", offset)?;
                let kind = self.slot_kind(slot);
                let id = self.emit(Op::Load, vec![slot], offset, Some(kind));
                self.stack.push(id, kind, offset)?;
                Some(id)
            }
            RawOp::Ldarga(index) => {
                let slot = self.slot(self.arguments, *index, "argument", offset)?;
                let id = self.emit(Op::LoadAddress, vec![slot], offset, Some(StackKind::ByRef));
                self.stack.push(id, StackKind::ByRef, offset)?;
                Some(id)
            }
            RawOp::Ldloca(index) => {
                let slot = self.slot(self.locals, *index, "local", offset)?;
                let id = self.emit(Op::LoadAddress, vec![slot], offset, Some(StackKind::ByRef));
                self.stack.push(id, StackKind::ByRef, offset)?;
                Some(id)
            }
            RawOp::Starg(index) => {
                let slot = self.slot(self.arguments, *index, "argument", offset)?;
                let (value, kind) = self.stack.pop(offset)?;
                let slot_kind = self.slot_kind(slot);
                if !assignable(kind, slot_kind) {
                    return Err(invalid_program!(
                        offset,
                        "cannot store {kind} into {slot_kind} argument {index}"
                    ));
                }
                Some(self.emit(Op::Store, vec![slot, value], offset, None))
            }
            RawOp::Stloc(index) => {
                let slot = self.slot(self.locals, *index, "local", offset)?;
                let (value, kind) = self.stack.pop(offset)?;
                let slot_kind = self.slot_kind(slot);
                if !assignable(kind, slot_kind) {
                    return Err(invalid_program!(
                        offset,
                        "cannot store {kind} into {slot_kind} local {index}"
                    ));
                }
                Some(self.emit(Op::Store, vec![slot, value], offset, None))
            }

            RawOp::Dup => {
                let (value, kind) = self.stack.peek(offset)?;
                self.stack.push(value, kind, offset)?;
                None
            }
            RawOp::Pop => {
                self.stack.pop(offset)?;
                None
            }

            RawOp::Binary {
                op,
                checked,
                unsigned,
            } => {
                let (rhs, rhs_kind) = self.stack.pop(offset)?;
                let (lhs, lhs_kind) = self.stack.pop(offset)?;
                let Some(result) = binary_result(*op, lhs_kind, rhs_kind) else {
                    return Err(invalid_program!(
                        offset,
                        "operator {op} not defined for {lhs_kind} and {rhs_kind}"
                    ));
                };
                let id = self.emit(
                    Op::Binary {
                        op: *op,
                        checked: *checked,
                        unsigned: *unsigned,
                    },
                    vec![lhs, rhs],
                    offset,
                    Some(result),
                );
                self.stack.push(id, result, offset)?;
                Some(id)
            }
            RawOp::Unary(op) => {
                let (value, kind) = self.stack.pop(offset)?;
                let valid = match op {
                    UnaryOp::Neg => kind.is_numeric(),
                    UnaryOp::Not => kind.is_integer(),
                };
                if !valid {
                    return Err(invalid_program!(
                        offset,
                        "operator {op} not defined for {kind}"
                    ));
                }
                let id = self.emit(Op::Unary { op: *op }, vec![value], offset, Some(kind));
                self.stack.push(id, kind, offset)?;
                Some(id)
            }
            RawOp::Compare { op, unsigned } => {
                let (rhs, rhs_kind) = self.stack.pop(offset)?;
                let (lhs, lhs_kind) = self.stack.pop(offset)?;
                if !compare_ok(*op, *unsigned, lhs_kind, rhs_kind) {
                    return Err(invalid_program!(
                        offset,
                        "comparison {op} not defined for {lhs_kind} and {rhs_kind}"
                    ));
                }
                let id = self.emit(
                    Op::Compare {
                        op: *op,
                        unsigned: *unsigned,
                    },
                    vec![lhs, rhs],
                    offset,
                    Some(StackKind::Int32),
                );
                self.stack.push(id, StackKind::Int32, offset)?;
                Some(id)
            }
            RawOp::Conv {
                target,
                checked,
                unsigned,
            } => {
                let (value, kind) = self.stack.pop(offset)?;
                if !kind.is_numeric() && kind != StackKind::ByRef {
                    return Err(invalid_program!(offset, "cannot convert {kind} to {target}"));
                }
                let id = self.emit(
                    Op::Convert {
                        target: *target,
                        checked: *checked,
                        unsigned: *unsigned,
                    },
                    vec![value],
                    offset,
                    Some(*target),
                );
                self.stack.push(id, *target, offset)?;
                Some(id)
            }

            RawOp::Ldfld(field) => {
                let object = self.pop_instance(offset)?;
                let id = self.emit(
                    Op::LoadField { field: *field },
                    vec![object],
                    offset,
                    Some(field.kind),
                );
                self.stack.push(id, field.kind, offset)?;
                Some(id)
            }
            RawOp::Stfld(field) => {
                let (value, kind) = self.stack.pop(offset)?;
                let object = self.pop_instance(offset)?;
                if !assignable(kind, field.kind) {
                    return Err(invalid_program!(
                        offset,
                        "cannot store {kind} into {} field {field}",
                        field.kind
                    ));
                }
                Some(self.emit(Op::StoreField { field: *field }, vec![object, value], offset, None))
            }
            RawOp::Ldsfld(field) => {
                let id = self.emit(
                    Op::LoadStaticField { field: *field },
                    vec![],
                    offset,
                    Some(field.kind),
                );
                self.stack.push(id, field.kind, offset)?;
                Some(id)
            }
            RawOp::Stsfld(field) => {
                let (value, kind) = self.stack.pop(offset)?;
                if !assignable(kind, field.kind) {
                    return Err(invalid_program!(
                        offset,
                        "cannot store {kind} into {} field {field}",
                        field.kind
                    ));
                }
                Some(self.emit(Op::StoreStaticField { field: *field }, vec![value], offset, None))
            }

            RawOp::Ldelem(kind) => {
                let index = self.pop_index(offset)?;
                let array = self.pop_object(offset)?;
                let kind = kind.unwrap_or(StackKind::Object);
                let id = self.emit(
                    Op::LoadElement { kind },
                    vec![array, index],
                    offset,
                    Some(kind),
                );
                self.stack.push(id, kind, offset)?;
                Some(id)
            }
            RawOp::Stelem(element) => {
                let (value, kind) = self.stack.pop(offset)?;
                let index = self.pop_index(offset)?;
                let array = self.pop_object(offset)?;
                let element = element.unwrap_or(StackKind::Object);
                if !assignable(kind, element) {
                    return Err(invalid_program!(
                        offset,
                        "cannot store {kind} into an array of {element}"
                    ));
                }
                Some(self.emit(
                    Op::StoreElement { kind: element },
                    vec![array, index, value],
                    offset,
                    None,
                ))
            }
            RawOp::Ldlen => {
                let array = self.pop_object(offset)?;
                let id = self.emit(Op::LoadLength, vec![array], offset, Some(StackKind::NativeInt));
                self.stack.push(id, StackKind::NativeInt, offset)?;
                Some(id)
            }
            RawOp::Newarr(elem) => {
                let length = self.pop_index(offset)?;
                let id = self.emit(
                    Op::NewArray { elem: *elem },
                    vec![length],
                    offset,
                    Some(StackKind::Object),
                );
                self.stack.push(id, StackKind::Object, offset)?;
                Some(id)
            }

            RawOp::Ldind(kind) => {
                let address = self.pop_address(offset)?;
                let kind = kind.unwrap_or(StackKind::Object);
                let id = self.emit(Op::LoadIndirect { kind }, vec![address], offset, Some(kind));
                self.stack.push(id, kind, offset)?;
                Some(id)
            }
            RawOp::Stind(target) => {
                let (value, kind) = self.stack.pop(offset)?;
                let address = self.pop_address(offset)?;
                let target = target.unwrap_or(StackKind::Object);
                if !assignable(kind, target) {
                    return Err(invalid_program!(
                        offset,
                        "cannot store {kind} through a {target} pointer"
                    ));
                }
                Some(self.emit(
                    Op::StoreIndirect { kind: target },
                    vec![address, value],
                    offset,
                    None,
                ))
            }

            RawOp::Castclass(ty) => {
                let object = self.pop_object(offset)?;
                let id = self.emit(
                    Op::CastClass { ty: *ty },
                    vec![object],
                    offset,
                    Some(StackKind::Object),
                );
                self.stack.push(id, StackKind::Object, offset)?;
                Some(id)
            }
            RawOp::Isinst(ty) => {
                let object = self.pop_object(offset)?;
                let id = self.emit(
                    Op::IsInst { ty: *ty },
                    vec![object],
                    offset,
                    Some(StackKind::Object),
                );
                self.stack.push(id, StackKind::Object, offset)?;
                Some(id)
            }

            RawOp::Call(method) => {
                let args = self.stack.pop_args(method.arg_count(), offset)?;
                let operands = args.into_iter().map(|(v, _)| v).collect();
                let tail = self.prefix.tail;
                let id = self.emit(
                    Op::Call {
                        method: *method,
                        tail,
                    },
                    operands,
                    offset,
                    method.return_kind,
                );
                if let Some(kind) = method.return_kind {
                    self.stack.push(id, kind, offset)?;
                }
                Some(id)
            }
            RawOp::Callvirt(method) => {
                let args = self.stack.pop_args(method.arg_count(), offset)?;
                let operands = args.into_iter().map(|(v, _)| v).collect();
                let tail = self.prefix.tail;
                let constrained = self.prefix.constrained.take();
                let id = self.emit(
                    Op::CallVirt {
                        method: *method,
                        tail,
                        constrained,
                    },
                    operands,
                    offset,
                    method.return_kind,
                );
                if let Some(kind) = method.return_kind {
                    self.stack.push(id, kind, offset)?;
                }
                Some(id)
            }
            RawOp::Newobj(method) => {
                let args = self
                    .stack
                    .pop_args(usize::from(method.params), offset)?;
                let operands = args.into_iter().map(|(v, _)| v).collect();
                let id = self.emit(
                    Op::NewObject { method: *method },
                    operands,
                    offset,
                    Some(StackKind::Object),
                );
                self.stack.push(id, StackKind::Object, offset)?;
                Some(id)
            }

            RawOp::Br(target) => {
                let target = self.target(offset, *target)?;
                Some(self.emit(Op::Branch { target }, vec![], offset, None))
            }
            RawOp::Brcond {
                condition,
                unsigned,
                target,
            } => {
                let operands = if condition.operand_count() == 1 {
                    let (value, kind) = self.stack.pop(offset)?;
                    if !kind.is_integer() && !matches!(kind, StackKind::Object | StackKind::ByRef) {
                        return Err(invalid_program!(
                            offset,
                            "cannot branch on a {kind} truth value"
                        ));
                    }
                    vec![value]
                } else {
                    let (rhs, rhs_kind) = self.stack.pop(offset)?;
                    let (lhs, lhs_kind) = self.stack.pop(offset)?;
                    let compare = match condition {
                        Condition::Eq | Condition::Ne => CompareOp::Eq,
                        Condition::Gt | Condition::Ge => CompareOp::Gt,
                        _ => CompareOp::Lt,
                    };
                    if !compare_ok(compare, *unsigned, lhs_kind, rhs_kind) {
                        return Err(invalid_program!(
                            offset,
                            "branch condition {condition} not defined for {lhs_kind} and {rhs_kind}"
                        ));
                    }
                    vec![lhs, rhs]
                };
                let target = self.target(offset, *target)?;
                let next = instruction.offset + 1;
                let fallthrough = match self.entry_at.range(next..).next() {
                    Some((_, &block)) => block,
                    None => {
                        return Err(invalid_program!(
                            offset,
                            "conditional branch falls through past the end of the method"
                        ))
                    }
                };
                Some(self.emit(
                    Op::CondBranch {
                        condition: *condition,
                        unsigned: *unsigned,
                        target,
                        fallthrough,
                    },
                    operands,
                    offset,
                    None,
                ))
            }
            RawOp::Switch(targets) => {
                let value = self.pop_index(offset)?;
                let blocks = targets
                    .iter()
                    .map(|&t| self.target(offset, t))
                    .collect::<Result<Vec<_>>>()?;
                let next = instruction.offset + 1;
                let default = match self.entry_at.range(next..).next() {
                    Some((_, &block)) => block,
                    None => {
                        return Err(invalid_program!(
                            offset,
                            "switch falls through past the end of the method"
                        ))
                    }
                };
                Some(self.emit(
                    Op::Switch {
                        targets: blocks,
                        default,
                    },
                    vec![value],
                    offset,
                    None,
                ))
            }
            RawOp::Ret => {
                let operands = match self.return_kind {
                    Some(expected) => {
                        let (value, kind) = self.stack.pop(offset)?;
                        if !assignable(kind, expected) {
                            return Err(invalid_program!(
                                offset,
                                "cannot return {kind} from a method returning {expected}"
                            ));
                        }
                        vec![value]
                    }
                    None => vec![],
                };
                if !self.stack.is_empty() {
                    return Err(invalid_program!(
                        offset,
                        "operand stack holds {} values at return",
                        self.stack.len()
                    ));
                }
                Some(self.emit(Op::Return, operands, offset, None))
            }
            RawOp::Throw => {
                let exception = self.pop_object(offset)?;
                self.stack.clear();
                Some(self.emit(Op::Throw, vec![exception], offset, None))
            }
            RawOp::Rethrow => {
                self.stack.clear();
                Some(self.emit(Op::Rethrow, vec![], offset, None))
            }
            RawOp::Leave(target) => {
                // leave discards the evaluation stack on region exit
                self.stack.clear();
                let target = self.target(offset, *target)?;
                Some(self.emit(Op::Leave { target }, vec![], offset, None))
            }
            RawOp::EndFinally => {
                self.stack.clear();
                Some(self.emit(Op::EndFinally, vec![], offset, None))
            }
            RawOp::EndFilter => {
                let (decision, kind) = self.stack.pop(offset)?;
                if kind != StackKind::Int32 {
                    return Err(invalid_program!(
                        offset,
                        "endfilter decision must be int32, found {kind}"
                    ));
                }
                if !self.stack.is_empty() {
                    return Err(invalid_program!(
                        offset,
                        "operand stack holds {} extra values at endfilter",
                        self.stack.len()
                    ));
                }
                Some(self.emit(Op::EndFilter, vec![decision], offset, None))
            }

            // prefixes are folded before reaching here
            RawOp::Unaligned(_)
            | RawOp::Volatile
            | RawOp::Tail
            | RawOp::Constrained(_)
            | RawOp::Readonly
            | RawOp::NoCheck(_) => None,
        };

        if let Some(id) = emitted {
            if !self.prefix.flags.is_empty() {
                self.body.set_flags(id, self.prefix.flags);
            }
        }
        self.prefix.clear();
        Ok(())
    }
}
