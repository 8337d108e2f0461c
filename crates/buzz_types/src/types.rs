//! Type definition model.

use buzz_core::intern::InternedString;
use buzz_scanner::Token;
use indexmap::IndexMap;
use rustc_hash::FxHashMap;

/// A handle into the [`crate::TypeRegistry`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

impl TypeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// What kind of function a [`FunctionDef`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Function,
    Method,
    Anonymous,
    /// An inline recovery closure attached to a call.
    Catch,
    /// The implicit top-level function of an imported script.
    Script,
    /// The implicit top-level function of the root script.
    ScriptEntryPoint,
    /// `fun main(…)` of the root script.
    EntryPoint,
    Test,
    /// A function whose body is an external symbol.
    Extern,
}

/// How a child placeholder derived from its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// Child is the result type of calling the parent.
    Call,
    /// Child is the element type of indexing the parent.
    Subscript,
    /// Child is the key type when subscribing the parent as a map.
    Key,
    /// Child is the type of a named member of the parent.
    FieldAccess,
    /// Parent is the destination type, child the assigned value's type.
    Assignment,
    /// Child is the instance form of the parent: a type annotation that
    /// referenced the parent before it was declared.
    Instance,
}

#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: InternedString,
    pub return_type: TypeId,
    /// Parameters in declaration order; order is part of the canonical form.
    pub parameters: IndexMap<InternedString, TypeId>,
    /// Which parameters carry a default value.
    pub has_defaults: FxHashMap<InternedString, bool>,
    pub kind: FunctionKind,
    pub lambda: bool,
}

#[derive(Debug, Clone)]
pub struct ObjectDef {
    pub name: InternedString,
    pub fields: IndexMap<InternedString, TypeId>,
    pub methods: IndexMap<InternedString, TypeId>,
    pub static_fields: IndexMap<InternedString, TypeId>,
    /// Members referenced (through `self` access) before their declaration
    /// was parsed. Resolved as member declarations arrive.
    pub placeholders: FxHashMap<InternedString, TypeId>,
    pub static_placeholders: FxHashMap<InternedString, TypeId>,
    pub super_type: Option<TypeId>,
    pub inheritable: bool,
}

impl ObjectDef {
    pub fn new(name: InternedString, inheritable: bool) -> Self {
        Self {
            name,
            fields: IndexMap::new(),
            methods: IndexMap::new(),
            static_fields: IndexMap::new(),
            placeholders: FxHashMap::default(),
            static_placeholders: FxHashMap::default(),
            super_type: None,
            inheritable,
        }
    }

    /// Look up an instance member: fields win over methods.
    pub fn member(&self, name: InternedString) -> Option<TypeId> {
        self.fields
            .get(&name)
            .or_else(|| self.methods.get(&name))
            .copied()
    }
}

#[derive(Debug, Clone)]
pub struct EnumDef {
    pub name: InternedString,
    pub case_type: TypeId,
    pub cases: Vec<InternedString>,
}

/// A stand-in for a type that is not known yet.
///
/// Placeholders form a DAG: the root is a reference to an unknown symbol, and
/// each child records *how* it derived from its parent (called it,
/// subscripted it, accessed a member, …). Placeholders are never interned;
/// every one carries per-use state and must retain identity.
#[derive(Debug, Clone)]
pub struct PlaceholderDef {
    /// The unknown symbol's name, when the placeholder stands for one.
    pub name: Option<InternedString>,
    /// The token this placeholder was created at; diagnostics land here.
    pub where_token: Token,
    pub parent: Option<TypeId>,
    pub parent_relation: Option<Relation>,
    /// The member name, for a [`Relation::FieldAccess`] child.
    pub member_name: Option<InternedString>,
    pub children: Vec<TypeId>,
    /// Usage assumptions recorded at creation or merge time.
    pub callable: Option<bool>,
    pub subscriptable: Option<bool>,
    pub field_accessible: Option<bool>,
    pub assignable: Option<bool>,
    /// Types this placeholder was assumed to be at specific use sites,
    /// cross-checked when it resolves.
    pub assumptions: Vec<(TypeId, Token)>,
}

impl PlaceholderDef {
    pub fn new(name: Option<InternedString>, where_token: Token) -> Self {
        Self {
            name,
            where_token,
            parent: None,
            parent_relation: None,
            member_name: None,
            children: Vec::new(),
            callable: None,
            subscriptable: None,
            field_accessible: None,
            assignable: None,
            assumptions: Vec::new(),
        }
    }
}

/// The tagged type variant.
#[derive(Debug, Clone)]
pub enum TypeKind {
    Bool,
    Number,
    String,
    /// A first-class type value.
    Type,
    Void,
    List {
        item: TypeId,
    },
    Map {
        key: TypeId,
        value: TypeId,
    },
    /// An object or class *definition*.
    Object(ObjectDef),
    /// An instance of an object definition.
    ObjectInstance {
        of: TypeId,
    },
    Enum(EnumDef),
    EnumInstance {
        of: TypeId,
    },
    Function(FunctionDef),
    Placeholder(PlaceholderDef),
}

/// A type definition. Every type carries an `optional` flag; `str?` is the
/// optional form of `str`.
#[derive(Debug, Clone)]
pub struct TypeDef {
    pub kind: TypeKind,
    pub optional: bool,
}

impl TypeDef {
    pub fn new(kind: TypeKind) -> Self {
        Self {
            kind,
            optional: false,
        }
    }

    pub fn optional(kind: TypeKind) -> Self {
        Self {
            kind,
            optional: true,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.kind, TypeKind::Placeholder(_))
    }
}
