use indexmap::IndexMap;

use super::symbol::SymbolId;

/// Index of a scope in the scope arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeId(pub(crate) usize);

/// One level of lexical nesting.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub outer: Option<ScopeId>,
    pub locals: IndexMap<String, SymbolId>,
    /// Running count of variables declared here; the next variable gets this slot.
    pub n_vars: usize,
}

impl Scope {
    pub fn new(outer: Option<ScopeId>) -> Self {
        Scope {
            outer,
            locals: IndexMap::new(),
            n_vars: 0,
        }
    }

    pub fn find_local(&self, name: &str) -> Option<SymbolId> {
        self.locals.get(name).copied()
    }
}

/// What a caller gets back when a scope is closed.
#[derive(Debug, Clone, Default)]
pub struct ClosedScope {
    pub locals: IndexMap<String, SymbolId>,
    pub n_vars: usize,
}
