//! The placeholder engine.
//!
//! A placeholder is created whenever the parser references a name that is not
//! declared yet, or when an expression's type cannot be locally determined
//! because one of its inputs is a placeholder. Placeholders are linked into a
//! DAG by [`Relation`] edges; when a concrete type finally arrives,
//! [`resolve`] walks the DAG, turns every derived placeholder into its
//! concrete type, and reports mismatches at the token each placeholder was
//! created at: the original use site, not the declaration site.

use crate::registry::TypeRegistry;
use crate::types::{PlaceholderDef, Relation, TypeDef, TypeId, TypeKind};
use buzz_core::intern::InternedString;
use buzz_diagnostics::{format_message, messages, Diagnostic, DiagnosticCollection};
use buzz_scanner::Token;

/// A usage assumption recorded against a placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Use {
    Callable,
    Subscriptable,
    FieldAccessible,
    Assignable,
}

/// Link `child` under `parent` with the given relation. Both ends must
/// currently be placeholders; anything else is a caller bug and the link is
/// dropped.
pub fn link(registry: &mut TypeRegistry, parent: TypeId, child: TypeId, relation: Relation) {
    debug_assert!(registry.is_placeholder(parent) && registry.is_placeholder(child));
    if !registry.is_placeholder(parent) || !registry.is_placeholder(child) {
        return;
    }
    if let TypeKind::Placeholder(child_def) = &mut registry.get_mut(child).kind {
        child_def.parent = Some(parent);
        child_def.parent_relation = Some(relation);
    }
    if let TypeKind::Placeholder(parent_def) = &mut registry.get_mut(parent).kind {
        parent_def.children.push(child);
    }
}

/// Create a fresh placeholder derived from `parent` and link it.
pub fn child_placeholder(
    registry: &mut TypeRegistry,
    parent: TypeId,
    where_token: Token,
    relation: Relation,
    member_name: Option<InternedString>,
) -> TypeId {
    let mut def = PlaceholderDef::new(None, where_token);
    def.member_name = member_name;
    let child = registry.add(TypeDef::new(TypeKind::Placeholder(def)));
    link(registry, parent, child, relation);
    child
}

/// Record that a use site assumed the placeholder to be of type `expected`;
/// checked when the placeholder resolves, reported at `at`.
pub fn assume_type(registry: &mut TypeRegistry, placeholder: TypeId, expected: TypeId, at: Token) {
    if let TypeKind::Placeholder(def) = &mut registry.get_mut(placeholder).kind {
        def.assumptions.push((expected, at));
    }
}

/// Record a usage assumption. Returns whether the placeholder is still
/// coherent afterwards.
pub fn record_use(registry: &mut TypeRegistry, placeholder: TypeId, usage: Use) -> bool {
    if let TypeKind::Placeholder(def) = &mut registry.get_mut(placeholder).kind {
        match usage {
            Use::Callable => def.callable = Some(true),
            Use::Subscriptable => def.subscriptable = Some(true),
            Use::FieldAccessible => def.field_accessible = Some(true),
            Use::Assignable => def.assignable = Some(true),
        }
        is_coherent(def)
    } else {
        true
    }
}

/// A placeholder that is both callable and subscriptable, or both
/// field-accessible and subscriptable, cannot resolve to any type.
pub fn is_coherent(def: &PlaceholderDef) -> bool {
    let callable = def.callable.unwrap_or(false);
    let subscriptable = def.subscriptable.unwrap_or(false);
    let field_accessible = def.field_accessible.unwrap_or(false);
    !(callable && subscriptable) && !(field_accessible && subscriptable)
}

fn report(diagnostics: &mut DiagnosticCollection, registry: &TypeRegistry, at: Token, message: String) {
    let file = registry.interner().resolve(at.script).to_string();
    diagnostics.add(Diagnostic::new(file, at.line, at.column, message));
}

/// Resolve placeholder `P` to the concrete type `resolved`.
///
/// No-op when `resolved` is itself a placeholder (resolution will happen
/// later) or when `P` already resolved (idempotency). Otherwise the arena
/// slot of `P` is overwritten with the content of `resolved` and every child
/// is validated against its relation and recursively resolved. A failing
/// child never interrupts its siblings.
pub fn resolve(
    registry: &mut TypeRegistry,
    placeholder: TypeId,
    resolved: TypeId,
    constant: bool,
    diagnostics: &mut DiagnosticCollection,
) {
    if registry.is_placeholder(resolved) {
        return;
    }
    let def = match &registry.get(placeholder).kind {
        TypeKind::Placeholder(def) => def.clone(),
        // Already resolved; a second resolve is a no-op.
        _ => return,
    };

    // Overwrite first so cyclic placeholder graphs terminate: a child chain
    // reaching back to `placeholder` finds a non-placeholder and stops.
    let resolved_def = registry.get(resolved).clone();
    *registry.get_mut(placeholder) = resolved_def;

    for (expected, at) in &def.assumptions {
        let fits = registry.assignable(resolved, *expected) || registry.assignable(*expected, resolved);
        if !fits {
            let expected_name = registry.canonical(*expected);
            let actual_name = registry.canonical(resolved);
            report(
                diagnostics,
                registry,
                *at,
                format_message(messages::EXPECTED_GOT, &[&expected_name, &actual_name]),
            );
        }
    }

    for &child in &def.children {
        resolve_child(registry, child, resolved, constant, diagnostics);
    }
}

fn resolve_child(
    registry: &mut TypeRegistry,
    child: TypeId,
    parent_type: TypeId,
    constant: bool,
    diagnostics: &mut DiagnosticCollection,
) {
    let (relation, member_name, where_token) = match &registry.get(child).kind {
        TypeKind::Placeholder(def) => (def.parent_relation, def.member_name, def.where_token),
        _ => return,
    };
    let relation = match relation {
        Some(relation) => relation,
        None => return,
    };

    let child_type = match relation {
        Relation::Call => match &registry.get(parent_type).kind {
            TypeKind::Function(function) => Some(function.return_type),
            TypeKind::Object(_) => Some(registry.instance_of(parent_type)),
            _ => {
                let name = registry.canonical(parent_type);
                report(
                    diagnostics,
                    registry,
                    where_token,
                    format_message(messages::NOT_CALLABLE, &[&name]),
                );
                None
            }
        },
        Relation::Subscript => match registry.get(parent_type).kind {
            TypeKind::List { item } => Some(item),
            TypeKind::Map { value, .. } => Some(registry.with_optional(value, true)),
            _ => {
                let name = registry.canonical(parent_type);
                report(
                    diagnostics,
                    registry,
                    where_token,
                    format_message(messages::NOT_SUBSCRIPTABLE, &[&name]),
                );
                None
            }
        },
        Relation::Key => match registry.get(parent_type).kind {
            TypeKind::Map { key, .. } => Some(key),
            _ => {
                let name = registry.canonical(parent_type);
                report(
                    diagnostics,
                    registry,
                    where_token,
                    format_message(messages::NOT_SUBSCRIPTABLE, &[&name]),
                );
                None
            }
        },
        Relation::FieldAccess => {
            let member = match member_name {
                Some(member) => member,
                None => return,
            };
            match &registry.get(parent_type).kind {
                TypeKind::ObjectInstance { of } => {
                    let of = *of;
                    let found = match &registry.get(of).kind {
                        TypeKind::Object(object) => object.member(member),
                        _ => None,
                    };
                    if found.is_none() {
                        let type_name = registry.canonical(parent_type);
                        let member_name = registry.interner().resolve(member).to_string();
                        report(
                            diagnostics,
                            registry,
                            where_token,
                            format_message(messages::MEMBER_NOT_FOUND, &[&type_name, &member_name]),
                        );
                    }
                    found
                }
                TypeKind::Enum(enum_def) => {
                    let enum_name = enum_def.name;
                    let has_case = enum_def.cases.contains(&member);
                    if has_case {
                        Some(registry.instance_of(parent_type))
                    } else {
                        let enum_name = registry.interner().resolve(enum_name).to_string();
                        let case_name = registry.interner().resolve(member).to_string();
                        report(
                            diagnostics,
                            registry,
                            where_token,
                            format_message(messages::ENUM_CASE_NOT_FOUND, &[&enum_name, &case_name]),
                        );
                        None
                    }
                }
                _ => {
                    let type_name = registry.canonical(parent_type);
                    let member_name = registry.interner().resolve(member).to_string();
                    report(
                        diagnostics,
                        registry,
                        where_token,
                        format_message(messages::MEMBER_NOT_FOUND, &[&type_name, &member_name]),
                    );
                    None
                }
            }
        }
        Relation::Instance => Some(registry.instance_of(parent_type)),
        Relation::Assignment => {
            if constant {
                let name = registry.canonical(parent_type);
                report(
                    diagnostics,
                    registry,
                    where_token,
                    format_message(messages::ASSIGN_TO_CONSTANT, &[&name]),
                );
                None
            } else {
                Some(registry.instance_of(parent_type))
            }
        }
    };

    if let Some(child_type) = child_type {
        resolve(registry, child, child_type, false, diagnostics);
    }
}
