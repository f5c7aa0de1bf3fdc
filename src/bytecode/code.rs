use crate::bytecode::label::{Label, LabelError, LabelState, OFFSET_WIDTH, relative_offset};
use crate::bytecode::object::ObjectFile;
use crate::bytecode::op::OpCode;
use crate::bytecode::operand::{Condition, Operand, OperandKind};
use crate::diagnostics::Message;
use crate::symtab::TypeId;

/// Append-only instruction buffer plus the label engine.
///
/// Bytes past `max_size` are dropped and `overflowed` is set; the translator
/// turns that into a single "code too large" diagnostic.
#[derive(Debug, Clone)]
pub struct Code {
    buf: Vec<u8>,
    labels: Vec<LabelState>,
    /// Address of the `main` method, once seen.
    pub main_pc: Option<usize>,
    /// Number of global variable slots.
    pub data_size: usize,
    max_size: usize,
    overflowed: bool,
}

impl Code {
    /// Offsets are 16-bit, so the buffer never grows past `i16::MAX` bytes.
    pub fn new(max_size: usize) -> Self {
        Code {
            buf: Vec::new(),
            labels: Vec::new(),
            main_pc: None,
            data_size: 0,
            max_size: max_size.min(i16::MAX as usize),
            overflowed: false,
        }
    }

    pub fn pc(&self) -> usize {
        self.buf.len()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    pub fn into_object(self) -> ObjectFile {
        ObjectFile {
            data_size: self.data_size as i32,
            main_pc: self.main_pc.map_or(-1, |pc| pc as i32),
            code: self.buf,
        }
    }

    // -------------------------------------------------------------------------
    // raw emission
    // -------------------------------------------------------------------------

    pub fn put(&mut self, byte: u8) {
        if self.buf.len() < self.max_size {
            self.buf.push(byte);
        } else {
            self.overflowed = true;
        }
    }

    pub fn put_op(&mut self, op: OpCode) {
        self.put(op.byte());
    }

    /// Big-endian 16-bit immediate.
    pub fn put2(&mut self, value: i32) {
        for byte in (value as u16).to_be_bytes() {
            self.put(byte);
        }
    }

    /// Big-endian 32-bit immediate.
    pub fn put4(&mut self, value: i32) {
        for byte in value.to_be_bytes() {
            self.put(byte);
        }
    }

    /// Overwrites a previously emitted 16-bit immediate.
    fn put2_at(&mut self, pos: usize, value: i16) {
        if pos + OFFSET_WIDTH <= self.buf.len() {
            self.buf[pos..pos + OFFSET_WIDTH].copy_from_slice(&value.to_be_bytes());
        }
    }

    // -------------------------------------------------------------------------
    // labels
    // -------------------------------------------------------------------------

    pub fn new_label(&mut self) -> Label {
        self.labels.push(LabelState::default());
        Label(self.labels.len() - 1)
    }

    pub fn is_defined(&self, label: Label) -> bool {
        matches!(self.labels.get(label.0), Some(LabelState::Resolved(_)))
    }

    pub fn label_address(&self, label: Label) -> Option<usize> {
        match self.labels.get(label.0) {
            Some(LabelState::Resolved(adr)) => Some(*adr),
            _ => None,
        }
    }

    /// Number of placeholders waiting on an unresolved label.
    pub fn pending(&self, label: Label) -> usize {
        match self.labels.get(label.0) {
            Some(LabelState::Unresolved(fixups)) => fixups.len(),
            _ => 0,
        }
    }

    /// Emits the offset field of a jump to `label`.
    pub fn put_address(&mut self, label: Label) {
        let field = self.pc();
        match self.labels.get_mut(label.0) {
            Some(LabelState::Resolved(adr)) => {
                let offset = relative_offset(*adr, field);
                self.put2(i32::from(offset));
            }
            Some(LabelState::Unresolved(fixups)) => {
                fixups.push(field);
                self.put2(0);
            }
            None => self.put2(0),
        }
    }

    /// Defines `label` at the current position and patches every pending jump.
    ///
    /// Returns the number of placeholders that were patched.
    pub fn define(&mut self, label: Label) -> Result<usize, LabelError> {
        let here = self.pc();
        let state = self
            .labels
            .get_mut(label.0)
            .ok_or(LabelError::Unknown(label.0))?;

        let fixups = match std::mem::replace(state, LabelState::Resolved(here)) {
            LabelState::Resolved(adr) => {
                *state = LabelState::Resolved(adr);
                return Err(LabelError::DefinedTwice(label.0));
            }
            LabelState::Unresolved(fixups) => fixups,
        };

        for &field in &fixups {
            self.put2_at(field, relative_offset(here, field));
        }
        tracing::trace!(label = label.0, at = here, patched = fixups.len(), "label defined");
        Ok(fixups.len())
    }

    // -------------------------------------------------------------------------
    // operand lowering
    // -------------------------------------------------------------------------

    pub fn load_const(&mut self, val: i32) {
        match val {
            -1 => self.put_op(OpCode::ConstM1),
            0 => self.put_op(OpCode::Const0),
            1 => self.put_op(OpCode::Const1),
            2 => self.put_op(OpCode::Const2),
            3 => self.put_op(OpCode::Const3),
            4 => self.put_op(OpCode::Const4),
            5 => self.put_op(OpCode::Const5),
            _ => {
                self.put_op(OpCode::Const);
                self.put4(val);
            }
        }
    }

    fn load_local(&mut self, slot: i32) {
        match slot {
            0 => self.put_op(OpCode::Load0),
            1 => self.put_op(OpCode::Load1),
            2 => self.put_op(OpCode::Load2),
            3 => self.put_op(OpCode::Load3),
            _ => {
                self.put_op(OpCode::Load);
                self.put(slot as u8);
            }
        }
    }

    fn store_local(&mut self, slot: i32) {
        match slot {
            0 => self.put_op(OpCode::Store0),
            1 => self.put_op(OpCode::Store1),
            2 => self.put_op(OpCode::Store2),
            3 => self.put_op(OpCode::Store3),
            _ => {
                self.put_op(OpCode::Store);
                self.put(slot as u8);
            }
        }
    }

    fn elem_load_op(ty: TypeId) -> OpCode {
        if ty == TypeId::CHAR {
            OpCode::BALoad
        } else {
            OpCode::ALoad
        }
    }

    fn elem_store_op(ty: TypeId) -> OpCode {
        if ty == TypeId::CHAR {
            OpCode::BAStore
        } else {
            OpCode::AStore
        }
    }

    /// Brings the value of `x` onto the expression stack.
    pub fn load(&mut self, x: &mut Operand) -> Result<(), Message> {
        match x.kind {
            OperandKind::Con(val) => self.load_const(val),
            OperandKind::Local(slot) => self.load_local(slot),
            OperandKind::Static(slot) => {
                self.put_op(OpCode::GetStatic);
                self.put2(slot);
            }
            OperandKind::Field(offset) => {
                self.put_op(OpCode::GetField);
                self.put2(offset);
            }
            OperandKind::Elem => self.put_op(Self::elem_load_op(x.ty)),
            OperandKind::Stack => {}
            OperandKind::Meth(_) | OperandKind::Cond(_) => {
                x.kind = OperandKind::Stack;
                return Err(Message::NoVal);
            }
        }
        x.kind = OperandKind::Stack;
        Ok(())
    }

    /// Stores the value on top of the stack into the location `x`.
    pub fn store(&mut self, x: &Operand) -> Result<(), Message> {
        match x.kind {
            OperandKind::Local(slot) => self.store_local(slot),
            OperandKind::Static(slot) => {
                self.put_op(OpCode::PutStatic);
                self.put2(slot);
            }
            OperandKind::Field(offset) => {
                self.put_op(OpCode::PutField);
                self.put2(offset);
            }
            OperandKind::Elem => self.put_op(Self::elem_store_op(x.ty)),
            OperandKind::Con(_)
            | OperandKind::Stack
            | OperandKind::Meth(_)
            | OperandKind::Cond(_) => return Err(Message::NoVar),
        }
        Ok(())
    }

    pub fn assign(&mut self, dst: &Operand, src: &mut Operand) -> Result<(), Message> {
        self.load(src)?;
        self.store(dst)
    }

    /// Adds `delta` to the location `x` in place.
    pub fn increment(&mut self, x: &Operand, delta: i32) -> Result<(), Message> {
        match x.kind {
            OperandKind::Local(slot) => {
                self.put_op(OpCode::Inc);
                self.put(slot as u8);
                self.put(delta as i8 as u8);
                return Ok(());
            }
            OperandKind::Static(_) => {}
            OperandKind::Field(_) => self.put_op(OpCode::Dup),
            OperandKind::Elem => self.put_op(OpCode::Dup2),
            OperandKind::Con(_)
            | OperandKind::Stack
            | OperandKind::Meth(_)
            | OperandKind::Cond(_) => return Err(Message::NoVar),
        }

        let mut value = x.clone();
        self.load(&mut value)?;
        self.load_const(delta);
        self.put_op(OpCode::Add);
        self.store(x)
    }

    // -------------------------------------------------------------------------
    // jumps & calls
    // -------------------------------------------------------------------------

    pub fn jump(&mut self, label: Label) {
        self.put_op(OpCode::Jmp);
        self.put_address(label);
    }

    /// Jumps to the true label when the condition holds.
    pub fn true_jump(&mut self, cond: &Condition) {
        self.put_op(cond.op.jump());
        self.put_address(cond.t_label);
    }

    /// Jumps to the false label when the condition does not hold.
    pub fn false_jump(&mut self, cond: &Condition) {
        self.put_op(cond.op.invert().jump());
        self.put_address(cond.f_label);
    }

    /// Calls the method starting at `target`.
    pub fn call(&mut self, target: usize) {
        self.put_op(OpCode::Call);
        let field = self.pc();
        self.put2(i32::from(relative_offset(target, field)));
    }
}
