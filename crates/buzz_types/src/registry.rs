//! The type registry.
//!
//! All types of one compilation root live in a single arena and are referred
//! to by [`TypeId`]. Structural types (primitives, lists, maps, functions)
//! are interned by their canonical string: asking twice for `[num]` yields
//! the same id. Object and enum *definitions* are nominal: each declaration
//! allocates a fresh slot, and their instances are memoized per definition.
//! Placeholders are never interned.

use crate::types::{TypeDef, TypeId, TypeKind};
use buzz_core::intern::{InternedString, StringInterner};
use rustc_hash::FxHashMap;

pub struct TypeRegistry {
    defs: Vec<TypeDef>,
    /// Canonical string -> id, structural types only.
    interned: FxHashMap<InternedString, TypeId>,
    /// (definition id, optional) -> instance id, for objects and enums.
    instances: FxHashMap<(TypeId, bool), TypeId>,
    interner: StringInterner,

    // Well-known primitives, created up front.
    pub bool_type: TypeId,
    pub number_type: TypeId,
    pub string_type: TypeId,
    pub type_type: TypeId,
    pub void_type: TypeId,
}

impl TypeRegistry {
    pub fn new(interner: StringInterner) -> Self {
        let mut registry = Self {
            defs: Vec::with_capacity(256),
            interned: FxHashMap::default(),
            instances: FxHashMap::default(),
            interner,
            bool_type: TypeId(0),
            number_type: TypeId(0),
            string_type: TypeId(0),
            type_type: TypeId(0),
            void_type: TypeId(0),
        };
        registry.bool_type = registry.get_or_intern(TypeDef::new(TypeKind::Bool));
        registry.number_type = registry.get_or_intern(TypeDef::new(TypeKind::Number));
        registry.string_type = registry.get_or_intern(TypeDef::new(TypeKind::String));
        registry.type_type = registry.get_or_intern(TypeDef::new(TypeKind::Type));
        registry.void_type = registry.get_or_intern(TypeDef::new(TypeKind::Void));
        registry
    }

    pub fn interner(&self) -> &StringInterner {
        &self.interner
    }

    #[inline]
    pub fn get(&self, id: TypeId) -> &TypeDef {
        &self.defs[id.index()]
    }

    #[inline]
    pub fn get_mut(&mut self, id: TypeId) -> &mut TypeDef {
        &mut self.defs[id.index()]
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    pub fn is_placeholder(&self, id: TypeId) -> bool {
        self.get(id).is_placeholder()
    }

    /// Push a definition without interning. Used for placeholders and for
    /// object/enum definitions, which are nominal.
    pub fn add(&mut self, def: TypeDef) -> TypeId {
        let id = TypeId(self.defs.len() as u32);
        self.defs.push(def);
        id
    }

    /// Intern a structural type by its canonical string, or allocate it.
    ///
    /// Placeholders and object/enum definitions are never deduplicated; they
    /// go through [`TypeRegistry::add`] semantics instead.
    pub fn get_or_intern(&mut self, def: TypeDef) -> TypeId {
        match def.kind {
            TypeKind::Placeholder(_) | TypeKind::Object(_) | TypeKind::Enum(_) => self.add(def),
            _ => {
                let canonical = self.interner.intern(&self.canonical_def(&def));
                if let Some(&existing) = self.interned.get(&canonical) {
                    return existing;
                }
                let id = self.add(def);
                self.interned.insert(canonical, id);
                id
            }
        }
    }

    /// The instance view of an object or enum definition.
    ///
    /// Returns the argument unchanged for any other kind, so callers can
    /// funnel declared types through this unconditionally.
    pub fn instance_of(&mut self, id: TypeId) -> TypeId {
        self.instance_with_optional(id, false)
    }

    pub fn instance_with_optional(&mut self, id: TypeId, optional: bool) -> TypeId {
        let kind = match self.get(id).kind {
            TypeKind::Object(_) => TypeKind::ObjectInstance { of: id },
            TypeKind::Enum(_) => TypeKind::EnumInstance { of: id },
            _ => return if optional { self.with_optional(id, true) } else { id },
        };
        if let Some(&existing) = self.instances.get(&(id, optional)) {
            return existing;
        }
        let instance = self.add(TypeDef { kind, optional });
        self.instances.insert((id, optional), instance);
        instance
    }

    /// A type identical to `id` with the optional flag overridden.
    ///
    /// Placeholders are returned unchanged: their optionality is unknown
    /// until they resolve.
    pub fn with_optional(&mut self, id: TypeId, optional: bool) -> TypeId {
        let def = self.get(id);
        if def.optional == optional {
            return id;
        }
        match def.kind {
            TypeKind::Placeholder(_) => id,
            TypeKind::ObjectInstance { of } | TypeKind::EnumInstance { of } => {
                self.instance_with_optional(of, optional)
            }
            TypeKind::Object(_) | TypeKind::Enum(_) => id,
            _ => {
                let mut clone = def.clone();
                clone.optional = optional;
                self.get_or_intern(clone)
            }
        }
    }

    // ========================================================================
    // Canonical strings
    // ========================================================================

    /// The canonical text form of a type; the interning key. Reproducible
    /// bit-exact: `canonical` of a parsed rendering equals the rendering.
    pub fn canonical(&self, id: TypeId) -> String {
        self.canonical_def(self.get(id))
    }

    pub fn canonical_def(&self, def: &TypeDef) -> String {
        let mut out = match &def.kind {
            TypeKind::Bool => "bool".to_string(),
            TypeKind::Number => "num".to_string(),
            TypeKind::String => "str".to_string(),
            TypeKind::Type => "type".to_string(),
            TypeKind::Void => "void".to_string(),
            TypeKind::List { item } => format!("[{}]", self.canonical(*item)),
            TypeKind::Map { key, value } => {
                format!("{{{},{}}}", self.canonical(*key), self.canonical(*value))
            }
            TypeKind::Object(object) => {
                format!("object {}", self.interner.resolve(object.name))
            }
            TypeKind::Enum(enum_def) => {
                format!("enum {}", self.interner.resolve(enum_def.name))
            }
            TypeKind::ObjectInstance { of } => match &self.get(*of).kind {
                TypeKind::Object(object) => self.interner.resolve(object.name).to_string(),
                _ => "instance".to_string(),
            },
            TypeKind::EnumInstance { of } => match &self.get(*of).kind {
                TypeKind::Enum(enum_def) => self.interner.resolve(enum_def.name).to_string(),
                _ => "instance".to_string(),
            },
            TypeKind::Function(function) => {
                let parameters = function
                    .parameters
                    .values()
                    .map(|&p| self.canonical(p))
                    .collect::<Vec<_>>()
                    .join(",");
                let prefix = if function.kind == crate::types::FunctionKind::Extern {
                    "extern "
                } else {
                    ""
                };
                format!(
                    "{}Function {}({}) > {}",
                    prefix,
                    self.interner.resolve(function.name),
                    parameters,
                    self.canonical(function.return_type)
                )
            }
            TypeKind::Placeholder(placeholder) => match placeholder.name {
                Some(name) => self.interner.resolve(name).to_string(),
                None => "placeholder".to_string(),
            },
        };
        if def.optional {
            out.push('?');
        }
        out
    }

    // ========================================================================
    // Compatibility
    // ========================================================================

    /// Whether a value of type `value` can be bound to a slot of type
    /// `target`. A non-optional value fits an optional slot; the converse
    /// does not hold.
    pub fn assignable(&mut self, value: TypeId, target: TypeId) -> bool {
        if value == target {
            return true;
        }
        // `null` (an optional void) fits any optional slot.
        if matches!(self.get(value).kind, TypeKind::Void)
            && self.get(value).optional
            && self.get(target).optional
        {
            return true;
        }
        let value_base = self.with_optional(value, false);
        let target_base = self.with_optional(target, false);
        if self.get(value).optional && !self.get(target).optional {
            return false;
        }
        value_base == target_base || self.canonical(value_base) == self.canonical(target_base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FunctionDef, FunctionKind};
    use indexmap::IndexMap;

    fn registry() -> TypeRegistry {
        TypeRegistry::new(StringInterner::new())
    }

    #[test]
    fn primitives_render() {
        let registry = registry();
        assert_eq!(registry.canonical(registry.bool_type), "bool");
        assert_eq!(registry.canonical(registry.number_type), "num");
        assert_eq!(registry.canonical(registry.string_type), "str");
        assert_eq!(registry.canonical(registry.type_type), "type");
        assert_eq!(registry.canonical(registry.void_type), "void");
    }

    #[test]
    fn structural_types_intern() {
        let mut registry = registry();
        let number = registry.number_type;
        let a = registry.get_or_intern(TypeDef::new(TypeKind::List { item: number }));
        let b = registry.get_or_intern(TypeDef::new(TypeKind::List { item: number }));
        assert_eq!(a, b);
        assert_eq!(registry.canonical(a), "[num]");
    }

    #[test]
    fn map_renders_key_and_value() {
        let mut registry = registry();
        let (key, value) = (registry.string_type, registry.number_type);
        let map = registry.get_or_intern(TypeDef::new(TypeKind::Map { key, value }));
        assert_eq!(registry.canonical(map), "{str,num}");
    }

    #[test]
    fn optional_is_a_distinct_interned_type() {
        let mut registry = registry();
        let number = registry.number_type;
        let optional = registry.with_optional(number, true);
        assert_ne!(number, optional);
        assert_eq!(registry.canonical(optional), "num?");
        assert_eq!(registry.with_optional(optional, false), number);
        // Asking again yields the same id.
        assert_eq!(registry.with_optional(number, true), optional);
    }

    #[test]
    fn function_canonical_form() {
        let mut registry = registry();
        let name = registry.interner().intern("fact");
        let n = registry.interner().intern("n");
        let number = registry.number_type;
        let mut parameters = IndexMap::new();
        parameters.insert(n, number);
        let function = registry.get_or_intern(TypeDef::new(TypeKind::Function(FunctionDef {
            name,
            return_type: number,
            parameters,
            has_defaults: Default::default(),
            kind: FunctionKind::Function,
            lambda: false,
        })));
        assert_eq!(registry.canonical(function), "Function fact(num) > num");
    }

    #[test]
    fn object_definitions_are_nominal() {
        let mut registry = registry();
        let name = registry.interner().intern("Point");
        let a = registry.get_or_intern(TypeDef::new(TypeKind::Object(
            crate::types::ObjectDef::new(name, false),
        )));
        let b = registry.get_or_intern(TypeDef::new(TypeKind::Object(
            crate::types::ObjectDef::new(name, false),
        )));
        assert_ne!(a, b);
        assert_eq!(registry.canonical(a), "object Point");

        let instance = registry.instance_of(a);
        assert_eq!(instance, registry.instance_of(a));
        assert_ne!(instance, registry.instance_of(b));
        assert_eq!(registry.canonical(instance), "Point");
    }

    #[test]
    fn assignable_respects_optionals() {
        let mut registry = registry();
        let number = registry.number_type;
        let optional = registry.with_optional(number, true);
        assert!(registry.assignable(number, optional));
        assert!(!registry.assignable(optional, number));
        assert!(!registry.assignable(registry.string_type, number));
    }
}
