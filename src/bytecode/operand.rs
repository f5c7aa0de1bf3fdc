use crate::bytecode::label::Label;
use crate::bytecode::op::CompOp;
use crate::symtab::{SymbolId, TypeId};

/// A boolean result kept as a pending branch.
///
/// Exactly one of the two labels is reached at run time: `t_label` when the
/// comparison (after any `&&`/`||` chaining) holds, `f_label` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Condition {
    pub op: CompOp,
    pub t_label: Label,
    pub f_label: Label,
}

/// Where a value lives at the current point of translation.
#[derive(Debug, Clone, PartialEq)]
pub enum OperandKind {
    Con(i32),
    /// Frame slot of a local or parameter.
    Local(i32),
    /// Data slot of a global.
    Static(i32),
    /// Field offset; the object reference is on the stack.
    Field(i32),
    /// Array reference and index are on the stack.
    Elem,
    Stack,
    Meth(SymbolId),
    Cond(Condition),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Operand {
    pub kind: OperandKind,
    pub ty: TypeId,
}

impl Operand {
    /// An `int` constant.
    pub fn constant(val: i32) -> Self {
        Operand {
            kind: OperandKind::Con(val),
            ty: TypeId::INT,
        }
    }

    /// A value already on the expression stack.
    pub fn stack(ty: TypeId) -> Self {
        Operand {
            kind: OperandKind::Stack,
            ty,
        }
    }

    pub fn condition(cond: Condition) -> Self {
        Operand {
            kind: OperandKind::Cond(cond),
            ty: TypeId::NONE,
        }
    }

    pub fn as_condition(&self) -> Option<Condition> {
        match self.kind {
            OperandKind::Cond(c) => Some(c),
            _ => None,
        }
    }

    pub fn is_method(&self) -> bool {
        matches!(self.kind, OperandKind::Meth(_))
    }

    /// True for operands that name a storage location.
    pub fn is_assignable(&self) -> bool {
        matches!(
            self.kind,
            OperandKind::Local(_) | OperandKind::Static(_) | OperandKind::Field(_) | OperandKind::Elem
        )
    }
}
