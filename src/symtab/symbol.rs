use indexmap::IndexMap;

use super::types::TypeId;

/// Index of a symbol in the symbol arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(u32);

impl SymbolId {
    pub fn from_index(index: usize) -> Self {
        SymbolId(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Program,
    Type,
    Constant,
    Variable,
    Method,
}

/// A declared name.
///
/// `adr` is the frame slot of locals and parameters, the data slot of
/// globals, the field offset of fields, and the code address of methods.
/// `locals` holds the parameters and locals of a method, or the globals of
/// the program, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub kind: SymbolKind,
    pub name: String,
    pub ty: TypeId,
    pub val: i32,
    pub adr: i32,
    pub level: u8,
    pub n_pars: usize,
    pub locals: IndexMap<String, SymbolId>,
}

impl Symbol {
    pub fn new(kind: SymbolKind, name: impl Into<String>, ty: TypeId) -> Self {
        Symbol {
            kind,
            name: name.into(),
            ty,
            val: 0,
            adr: 0,
            level: 0,
            n_pars: 0,
            locals: IndexMap::new(),
        }
    }

    /// Formal parameters of a method, in order.
    pub fn params(&self) -> impl Iterator<Item = SymbolId> + '_ {
        self.locals.values().take(self.n_pars).copied()
    }
}
