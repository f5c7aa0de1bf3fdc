use std::collections::HashMap;

use indexmap::IndexMap;

use super::symbol::SymbolId;

/// Index of a type descriptor in the [`TypeTable`].
///
/// Array types are interned, so two ids are equal exactly when the
/// descriptors are structurally equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(u32);

impl TypeId {
    /// Error/void sentinel.
    pub const NONE: TypeId = TypeId(0);
    pub const INT: TypeId = TypeId(1);
    pub const CHAR: TypeId = TypeId(2);
    /// Type of the `null` constant.
    pub const NULL: TypeId = TypeId(3);
    /// Array of `NONE`: the parameter type of `len`, accepts any array.
    pub const ANY_ARRAY: TypeId = TypeId(4);
    /// Root marker carried by the program symbol.
    pub const PROGRAM: TypeId = TypeId(5);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A type descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    None,
    Int,
    Char,
    Null,
    Program,
    /// Record type. `fields` is empty until the class body is closed.
    Class {
        fields: IndexMap<String, SymbolId>,
        n_fields: usize,
        finalized: bool,
    },
    Array {
        elem: TypeId,
    },
}

/// Arena of all type descriptors of one compilation.
#[derive(Debug, Clone)]
pub struct TypeTable {
    types: Vec<Type>,
    arrays: HashMap<TypeId, TypeId>,
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeTable {
    pub fn new() -> Self {
        let mut table = TypeTable {
            types: vec![
                Type::None,
                Type::Int,
                Type::Char,
                Type::Null,
                Type::Array { elem: TypeId::NONE },
                Type::Program,
            ],
            arrays: HashMap::new(),
        };
        table.arrays.insert(TypeId::NONE, TypeId::ANY_ARRAY);
        table
    }

    pub fn get(&self, id: TypeId) -> &Type {
        &self.types[id.index()]
    }

    /// Creates a new, still open, class type.
    pub fn new_class(&mut self) -> TypeId {
        self.push(Type::Class {
            fields: IndexMap::new(),
            n_fields: 0,
            finalized: false,
        })
    }

    /// Fixes the field list of a class. Later calls leave the type unchanged.
    pub fn finalize_class(&mut self, id: TypeId, members: IndexMap<String, SymbolId>, count: usize) {
        if let Type::Class {
            fields,
            n_fields,
            finalized,
        } = &mut self.types[id.index()]
        {
            if !*finalized {
                *fields = members;
                *n_fields = count;
                *finalized = true;
            }
        }
    }

    /// Returns the array type with element type `elem`, creating it on first use.
    pub fn array_of(&mut self, elem: TypeId) -> TypeId {
        if let Some(id) = self.arrays.get(&elem) {
            return *id;
        }
        let id = self.push(Type::Array { elem });
        self.arrays.insert(elem, id);
        id
    }

    fn push(&mut self, ty: Type) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(ty);
        id
    }

    pub fn elem_type(&self, id: TypeId) -> Option<TypeId> {
        match self.get(id) {
            Type::Array { elem } => Some(*elem),
            _ => None,
        }
    }

    pub fn is_class(&self, id: TypeId) -> bool {
        matches!(self.get(id), Type::Class { .. })
    }

    pub fn is_array(&self, id: TypeId) -> bool {
        matches!(self.get(id), Type::Array { .. })
    }

    pub fn is_ref_type(&self, id: TypeId) -> bool {
        self.is_class(id) || self.is_array(id)
    }

    pub fn is_numeric(&self, id: TypeId) -> bool {
        id == TypeId::INT || id == TypeId::CHAR
    }

    /// Looks up a field of a class type.
    pub fn field(&self, id: TypeId, name: &str) -> Option<SymbolId> {
        match self.get(id) {
            Type::Class { fields, .. } => fields.get(name).copied(),
            _ => None,
        }
    }

    /// Number of field slots an instance of a class needs.
    pub fn n_fields(&self, id: TypeId) -> usize {
        match self.get(id) {
            Type::Class { n_fields, .. } => *n_fields,
            _ => 0,
        }
    }

    /// Can a value of type `src` be stored into a location of type `dst`?
    pub fn assignable_to(&self, src: TypeId, dst: TypeId) -> bool {
        src == dst
            || (src == TypeId::NULL && self.is_ref_type(dst))
            || (dst == TypeId::ANY_ARRAY && self.is_array(src))
            || (src == TypeId::CHAR && dst == TypeId::INT)
    }

    /// Can values of the two types be compared with each other?
    pub fn compatible_with(&self, a: TypeId, b: TypeId) -> bool {
        self.assignable_to(a, b)
            || self.assignable_to(b, a)
            || (self.is_numeric(a) && self.is_numeric(b))
    }

    /// Human-readable spelling of a type.
    pub fn describe(&self, id: TypeId) -> String {
        match self.get(id) {
            Type::None => "none".to_string(),
            Type::Int => "int".to_string(),
            Type::Char => "char".to_string(),
            Type::Null => "null".to_string(),
            Type::Program => "program".to_string(),
            Type::Class { .. } => format!("class#{}", id.index()),
            Type::Array { elem } => format!("{}[]", self.describe(*elem)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arrays_are_interned() {
        let mut types = TypeTable::new();
        let a = types.array_of(TypeId::INT);
        let b = types.array_of(TypeId::INT);
        let c = types.array_of(TypeId::CHAR);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(types.elem_type(a), Some(TypeId::INT));
        assert_eq!(types.array_of(TypeId::NONE), TypeId::ANY_ARRAY);
    }

    #[test]
    fn test_arrays_of_arrays() {
        let mut types = TypeTable::new();
        let row = types.array_of(TypeId::INT);
        let matrix = types.array_of(row);
        assert_eq!(types.elem_type(matrix), Some(row));
        assert_eq!(types.describe(matrix), "int[][]");
        assert!(!types.assignable_to(matrix, row));
    }

    #[test]
    fn test_null_assignable_to_references_only() {
        let mut types = TypeTable::new();
        let class = types.new_class();
        let arr = types.array_of(TypeId::CHAR);
        assert!(types.assignable_to(TypeId::NULL, class));
        assert!(types.assignable_to(TypeId::NULL, arr));
        assert!(!types.assignable_to(TypeId::NULL, TypeId::INT));
        assert!(!types.assignable_to(class, TypeId::NULL));
    }

    #[test]
    fn test_char_widens_to_int() {
        let types = TypeTable::new();
        assert!(types.assignable_to(TypeId::CHAR, TypeId::INT));
        assert!(!types.assignable_to(TypeId::INT, TypeId::CHAR));
        assert!(types.compatible_with(TypeId::INT, TypeId::CHAR));
    }

    #[test]
    fn test_distinct_classes_are_incompatible() {
        let mut types = TypeTable::new();
        let a = types.new_class();
        let b = types.new_class();
        assert!(!types.assignable_to(a, b));
        assert!(!types.compatible_with(a, b));
        assert!(types.compatible_with(a, TypeId::NULL));
    }

    #[test]
    fn test_any_array_accepts_every_array() {
        let mut types = TypeTable::new();
        let ints = types.array_of(TypeId::INT);
        let class = types.new_class();
        let objs = types.array_of(class);
        assert!(types.assignable_to(ints, TypeId::ANY_ARRAY));
        assert!(types.assignable_to(objs, TypeId::ANY_ARRAY));
        assert!(!types.assignable_to(TypeId::INT, TypeId::ANY_ARRAY));
    }

    #[test]
    fn test_class_fields_are_fixed_once() {
        let mut types = TypeTable::new();
        let class = types.new_class();
        let mut fields = IndexMap::new();
        fields.insert("x".to_string(), SymbolId::from_index(7));
        types.finalize_class(class, fields, 1);
        types.finalize_class(class, IndexMap::new(), 0);

        assert_eq!(types.n_fields(class), 1);
        assert_eq!(types.field(class, "x"), Some(SymbolId::from_index(7)));
        assert_eq!(types.field(class, "y"), None);
    }
}
