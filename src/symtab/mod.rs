//! # Symbol table
//!
//! Symbols, types and scopes are kept in arenas and referred to by index.
//! Scopes form a LIFO chain: opening one pushes a record whose `outer`
//! points at the enclosing scope, closing pops it and hands its members to
//! the caller (which attaches them to the owning method, class or program).
//! The symbols themselves stay in the arena for the whole compilation.
//!
//! The language has two addressing levels: variables declared while the
//! program scope is open are globals (level 0), everything else is a local,
//! parameter or field (level 1).

pub mod scope;
pub mod symbol;
pub mod types;

use indexmap::IndexMap;

use crate::diagnostics::Message;

use scope::{ClosedScope, Scope, ScopeId};
pub use symbol::{Symbol, SymbolId, SymbolKind};
pub use types::{Type, TypeId, TypeTable};

/// Built-in methods that are compiled inline instead of called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intrinsic {
    /// `chr(int) -> char`, no code.
    Chr,
    /// `ord(char) -> int`, no code.
    Ord,
    /// `len(array) -> int`, an `arraylength` instruction.
    Len,
}

pub struct SymbolTable {
    pub types: TypeTable,
    symbols: Vec<Symbol>,
    scopes: Vec<Scope>,
    /// -1 for the universe, 0 while the program scope is innermost.
    level: i32,
    chr: SymbolId,
    ord: SymbolId,
    len: SymbolId,
    no_obj: SymbolId,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    /// Creates a table whose universe scope holds the predeclared names.
    pub fn new() -> Self {
        let placeholder = SymbolId::from_index(0);
        let mut tab = SymbolTable {
            types: TypeTable::new(),
            symbols: Vec::new(),
            scopes: vec![Scope::new(None)],
            level: 0,
            chr: placeholder,
            ord: placeholder,
            len: placeholder,
            no_obj: placeholder,
        };

        // Universe names are unique, so inserts cannot collide here.
        let _ = tab.insert(SymbolKind::Type, "int", TypeId::INT);
        let _ = tab.insert(SymbolKind::Type, "char", TypeId::CHAR);
        let _ = tab.insert(SymbolKind::Constant, "null", TypeId::NULL);

        tab.chr = tab.intrinsic_method("chr", TypeId::CHAR, "i", TypeId::INT);
        tab.ord = tab.intrinsic_method("ord", TypeId::INT, "ch", TypeId::CHAR);
        tab.len = tab.intrinsic_method("len", TypeId::INT, "arr", TypeId::ANY_ARRAY);

        // The error symbol lives in a scope of its own so it can never be found by name.
        tab.open_scope();
        let (no_obj, _) = tab.insert(SymbolKind::Variable, "noObj", TypeId::NONE);
        tab.no_obj = no_obj;
        tab.close_scope();

        tab.level = -1;
        tab
    }

    fn intrinsic_method(
        &mut self,
        name: &str,
        ret: TypeId,
        param: &str,
        param_ty: TypeId,
    ) -> SymbolId {
        let (meth, _) = self.insert(SymbolKind::Method, name, ret);
        self.open_scope();
        let _ = self.insert(SymbolKind::Variable, param, param_ty);
        let closed = self.close_scope();
        let sym = self.symbol_mut(meth);
        sym.locals = closed.locals;
        sym.n_pars = closed.n_vars;
        meth
    }

    pub fn open_scope(&mut self) {
        let outer = ScopeId(self.scopes.len() - 1);
        self.scopes.push(Scope::new(Some(outer)));
        self.level += 1;
        tracing::trace!(level = self.level, "open scope");
    }

    /// Closes the innermost scope and returns its members. The universe is never closed.
    pub fn close_scope(&mut self) -> ClosedScope {
        if self.scopes.len() == 1 {
            return ClosedScope::default();
        }
        self.level -= 1;
        let scope = self.scopes.pop().unwrap_or_default();
        tracing::trace!(level = self.level, members = scope.locals.len(), "close scope");
        ClosedScope {
            locals: scope.locals,
            n_vars: scope.n_vars,
        }
    }

    fn current(&self) -> &Scope {
        &self.scopes[self.scopes.len() - 1]
    }

    fn current_mut(&mut self) -> &mut Scope {
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    /// Nesting level of the innermost scope.
    pub fn level(&self) -> i32 {
        self.level
    }

    /// Number of variables declared so far in the innermost scope.
    pub fn n_vars(&self) -> usize {
        self.current().n_vars
    }

    /// Members of the innermost scope, in declaration order.
    pub fn locals(&self) -> &IndexMap<String, SymbolId> {
        &self.current().locals
    }

    /// Declares `name` in the innermost scope.
    ///
    /// A duplicate name is reported through the returned message, but the new
    /// symbol still replaces the old binding so that later references see the
    /// most recent declaration.
    pub fn insert(
        &mut self,
        kind: SymbolKind,
        name: &str,
        ty: TypeId,
    ) -> (SymbolId, Option<Message>) {
        let error = self
            .current()
            .find_local(name)
            .map(|_| Message::DeclName(name.to_string()));

        let mut sym = Symbol::new(kind, name, ty);
        if kind == SymbolKind::Variable {
            let scope = self.current_mut();
            sym.adr = scope.n_vars as i32;
            scope.n_vars += 1;
            sym.level = if self.level > 0 { 1 } else { 0 };
        }

        let id = SymbolId::from_index(self.symbols.len());
        self.symbols.push(sym);
        self.current_mut().locals.insert(name.to_string(), id);
        (id, error)
    }

    /// Resolves `name` from the innermost scope outwards.
    ///
    /// On failure the caller should report the message and continue with
    /// [`SymbolTable::no_obj`].
    pub fn find(&self, name: &str) -> Result<SymbolId, Message> {
        let mut scope = Some(ScopeId(self.scopes.len() - 1));
        while let Some(ScopeId(idx)) = scope {
            if let Some(id) = self.scopes[idx].find_local(name) {
                return Ok(id);
            }
            scope = self.scopes[idx].outer;
        }
        Err(Message::NotFound(name.to_string()))
    }

    /// Resolves a field of a class type, without searching outwards.
    pub fn find_field(&self, name: &str, ty: TypeId) -> Result<SymbolId, Message> {
        self.types
            .field(ty, name)
            .ok_or_else(|| Message::NoField(name.to_string()))
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.index()]
    }

    pub fn symbol_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.index()]
    }

    /// The stand-in for names that could not be resolved.
    pub fn no_obj(&self) -> SymbolId {
        self.no_obj
    }

    pub fn intrinsic(&self, id: SymbolId) -> Option<Intrinsic> {
        if id == self.chr {
            Some(Intrinsic::Chr)
        } else if id == self.ord {
            Some(Intrinsic::Ord)
        } else if id == self.len {
            Some(Intrinsic::Len)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_universe_is_seeded() {
        let tab = SymbolTable::new();
        let int = tab.find("int").unwrap();
        assert_eq!(tab.symbol(int).kind, SymbolKind::Type);
        assert_eq!(tab.symbol(int).ty, TypeId::INT);

        let null = tab.find("null").unwrap();
        assert_eq!(tab.symbol(null).kind, SymbolKind::Constant);
        assert_eq!(tab.symbol(null).ty, TypeId::NULL);

        for (name, intrinsic) in [
            ("chr", Intrinsic::Chr),
            ("ord", Intrinsic::Ord),
            ("len", Intrinsic::Len),
        ] {
            let id = tab.find(name).unwrap();
            assert_eq!(tab.symbol(id).kind, SymbolKind::Method);
            assert_eq!(tab.symbol(id).n_pars, 1);
            assert_eq!(tab.intrinsic(id), Some(intrinsic));
        }
        assert_eq!(tab.level(), -1);
    }

    #[test]
    fn test_intrinsic_signatures() {
        let tab = SymbolTable::new();
        let len = tab.symbol(tab.find("len").unwrap());
        let param = len.params().next().unwrap();
        assert_eq!(tab.symbol(param).ty, TypeId::ANY_ARRAY);
        assert_eq!(len.ty, TypeId::INT);

        let chr = tab.symbol(tab.find("chr").unwrap());
        assert_eq!(chr.ty, TypeId::CHAR);
    }

    #[test]
    fn test_error_symbol_is_not_findable() {
        let tab = SymbolTable::new();
        assert_eq!(
            tab.find("noObj"),
            Err(Message::NotFound("noObj".to_string()))
        );
        assert_eq!(tab.symbol(tab.no_obj()).ty, TypeId::NONE);
    }

    #[test]
    fn test_slots_follow_declaration_order() {
        let mut tab = SymbolTable::new();
        tab.open_scope();
        let (a, _) = tab.insert(SymbolKind::Variable, "a", TypeId::INT);
        let _ = tab.insert(SymbolKind::Constant, "k", TypeId::INT);
        let (b, _) = tab.insert(SymbolKind::Variable, "b", TypeId::CHAR);
        assert_eq!(tab.symbol(a).adr, 0);
        assert_eq!(tab.symbol(b).adr, 1);
        assert_eq!(tab.symbol(a).level, 0);

        tab.open_scope();
        let (c, _) = tab.insert(SymbolKind::Variable, "c", TypeId::INT);
        assert_eq!(tab.symbol(c).adr, 0);
        assert_eq!(tab.symbol(c).level, 1);

        let inner = tab.close_scope();
        assert_eq!(inner.n_vars, 1);
        let outer = tab.close_scope();
        assert_eq!(outer.n_vars, 2);
        assert_eq!(outer.locals.keys().collect::<Vec<_>>(), vec!["a", "k", "b"]);
    }

    #[test]
    fn test_shadowing_ends_with_scope() {
        let mut tab = SymbolTable::new();
        tab.open_scope();
        let (outer, _) = tab.insert(SymbolKind::Variable, "x", TypeId::INT);

        tab.open_scope();
        let (inner, err) = tab.insert(SymbolKind::Variable, "x", TypeId::CHAR);
        assert!(err.is_none());
        assert_eq!(tab.find("x"), Ok(inner));
        tab.close_scope();

        assert_eq!(tab.find("x"), Ok(outer));
    }

    #[test]
    fn test_duplicate_is_reported_and_last_wins() {
        let mut tab = SymbolTable::new();
        tab.open_scope();
        let (first, err) = tab.insert(SymbolKind::Variable, "x", TypeId::INT);
        assert!(err.is_none());
        let (second, err) = tab.insert(SymbolKind::Variable, "x", TypeId::CHAR);

        assert_eq!(err, Some(Message::DeclName("x".to_string())));
        assert_ne!(first, second);
        assert_eq!(tab.find("x"), Ok(second));
        assert_eq!(tab.symbol(second).adr, 1);
    }

    #[test]
    fn test_user_names_shadow_universe() {
        let mut tab = SymbolTable::new();
        tab.open_scope();
        let (mine, err) = tab.insert(SymbolKind::Variable, "len", TypeId::INT);
        assert!(err.is_none());
        assert_eq!(tab.find("len"), Ok(mine));
        assert_eq!(tab.intrinsic(mine), None);
    }

    #[test]
    fn test_find_field() {
        let mut tab = SymbolTable::new();
        let class = tab.types.new_class();
        tab.open_scope();
        tab.open_scope();
        let (f, _) = tab.insert(SymbolKind::Variable, "f", TypeId::INT);
        let closed = tab.close_scope();
        tab.types.finalize_class(class, closed.locals, closed.n_vars);

        assert_eq!(tab.find_field("f", class), Ok(f));
        assert_eq!(
            tab.find_field("g", class),
            Err(Message::NoField("g".to_string()))
        );
        assert!(tab.find("f").is_err());
    }

    #[test]
    fn test_universe_cannot_be_closed() {
        let mut tab = SymbolTable::new();
        let closed = tab.close_scope();
        assert_eq!(closed.n_vars, 0);
        assert!(tab.find("int").is_ok());
    }
}
