//! JSON serialization of the AST.
//!
//! Every node emits `{"node": "<Kind>", …, "type_def": "<canonical>|N/A"}`.
//! Field names are stable; the `buzz ast` tooling and tests consume them.
//! Canonical strings come from the registry, so serialization takes one.

use crate::node::*;
use buzz_core::intern::InternedString;
use buzz_types::{FunctionKind, TypeId, TypeKind, TypeRegistry};
use serde_json::{json, Value};

fn type_def_json(type_def: Option<TypeId>, registry: &TypeRegistry) -> Value {
    match type_def {
        Some(id) => json!(registry.canonical(id)),
        None => json!("N/A"),
    }
}

fn name_json(name: InternedString, registry: &TypeRegistry) -> Value {
    json!(registry.interner().resolve(name))
}

fn function_kind_name(kind: FunctionKind) -> &'static str {
    match kind {
        FunctionKind::Function => "Function",
        FunctionKind::Method => "Method",
        FunctionKind::Anonymous => "Anonymous",
        FunctionKind::Catch => "Catch",
        FunctionKind::Script => "Script",
        FunctionKind::ScriptEntryPoint => "ScriptEntryPoint",
        FunctionKind::EntryPoint => "EntryPoint",
        FunctionKind::Test => "Test",
        FunctionKind::Extern => "Extern",
    }
}

fn arguments_json(arguments: &[Argument<'_>], registry: &TypeRegistry) -> Value {
    Value::Array(
        arguments
            .iter()
            .map(|argument| {
                json!({
                    "name": argument
                        .name
                        .map(|n| name_json(n, registry))
                        .unwrap_or(Value::Null),
                    "value": argument.value.to_json(registry),
                })
            })
            .collect(),
    )
}

impl<'a> Expression<'a> {
    pub fn to_json(&self, registry: &TypeRegistry) -> Value {
        let mut value = match self {
            Expression::Binary(n) => json!({
                "node": "Binary",
                "left": n.left.to_json(registry),
                "operator": n.operator.describe(),
                "right": n.right.to_json(registry),
            }),
            Expression::Unary(n) => json!({
                "node": "Unary",
                "operator": n.operator.describe(),
                "left": n.operand.to_json(registry),
            }),
            Expression::Subscript(n) => json!({
                "node": "Subscript",
                "subscripted": n.subscripted.to_json(registry),
                "index": n.index.to_json(registry),
                "value": n.value.map(|v| v.to_json(registry)).unwrap_or(Value::Null),
            }),
            Expression::Unwrap(n) => json!({
                "node": "Unwrap",
                "unwrapped": n.unwrapped.to_json(registry),
            }),
            Expression::ForceUnwrap(n) => json!({
                "node": "ForceUnwrap",
                "unwrapped": n.unwrapped.to_json(registry),
            }),
            Expression::Is(n) => json!({
                "node": "Is",
                "left": n.left.to_json(registry),
                "constant": registry.canonical(n.constant),
            }),
            Expression::And(n) => json!({
                "node": "And",
                "left": n.left.to_json(registry),
                "right": n.right.to_json(registry),
            }),
            Expression::Or(n) => json!({
                "node": "Or",
                "left": n.left.to_json(registry),
                "right": n.right.to_json(registry),
            }),
            Expression::NamedVariable(n) => json!({
                "node": "NamedVariable",
                "identifier": name_json(n.identifier, registry),
                "value": n.value.map(|v| v.to_json(registry)).unwrap_or(Value::Null),
                "slot": slot_json(n.slot),
            }),
            Expression::Number(n) => json!({
                "node": "Number",
                "constant": n.value,
            }),
            Expression::String(n) => json!({
                "node": "String",
                "elements": n.parts.iter().map(|part| part.to_json(registry)).collect::<Vec<_>>(),
            }),
            Expression::StringLiteral(n) => json!({
                "node": "StringLiteral",
                "constant": name_json(n.value, registry),
            }),
            Expression::Boolean(n) => json!({
                "node": "Boolean",
                "constant": n.value,
            }),
            Expression::Null(_) => json!({
                "node": "Null",
            }),
            Expression::List(n) => json!({
                "node": "List",
                "items": n.items.iter().map(|item| item.to_json(registry)).collect::<Vec<_>>(),
            }),
            Expression::Map(n) => json!({
                "node": "Map",
                "keys": n.keys.iter().map(|key| key.to_json(registry)).collect::<Vec<_>>(),
                "values": n.values.iter().map(|value| value.to_json(registry)).collect::<Vec<_>>(),
            }),
            Expression::Super(n) => json!({
                "node": "Super",
                "identifier": name_json(n.identifier, registry),
            }),
            Expression::Dot(n) => json!({
                "node": "Dot",
                "callee": n.callee.to_json(registry),
                "identifier": name_json(n.identifier, registry),
                "value": n.value.map(|v| v.to_json(registry)).unwrap_or(Value::Null),
            }),
            Expression::ObjectInit(n) => json!({
                "node": "ObjectInit",
                "members": n.members.iter().map(|member| json!({
                    "name": name_json(member.name, registry),
                    "value": member.value.to_json(registry),
                })).collect::<Vec<_>>(),
            }),
            Expression::Call(n) => json!({
                "node": "Call",
                "callee": n.callee.to_json(registry),
                "arguments": arguments_json(n.arguments, registry),
                "catches": n.catches.iter().map(|c| c.to_json(registry)).collect::<Vec<_>>(),
            }),
            Expression::SuperCall(n) => json!({
                "node": "SuperCall",
                "identifier": name_json(n.identifier, registry),
                "arguments": arguments_json(n.arguments, registry),
            }),
            Expression::Function(n) => n.to_json(registry),
        };
        if let Value::Object(fields) = &mut value {
            if !fields.contains_key("type_def") {
                fields.insert(
                    "type_def".to_string(),
                    type_def_json(self.data().type_def, registry),
                );
            }
        }
        value
    }
}

fn slot_json(slot: Slot) -> Value {
    match slot {
        Slot::Local(index) => json!({ "kind": "Local", "index": index }),
        Slot::UpValue(index) => json!({ "kind": "UpValue", "index": index }),
        Slot::Global(index) => json!({ "kind": "Global", "index": index }),
    }
}

impl<'a> CatchNode<'a> {
    pub fn to_json(&self, registry: &TypeRegistry) -> Value {
        json!({
            "node": "Catch",
            "value": self.value.to_json(registry),
            "type_def": type_def_json(self.data.type_def, registry),
        })
    }
}

impl<'a> FunctionNode<'a> {
    pub fn to_json(&self, registry: &TypeRegistry) -> Value {
        let function_type = self.data.type_def.and_then(|id| match &registry.get(id).kind {
            TypeKind::Function(def) => Some(function_kind_name(def.kind)),
            _ => None,
        });
        json!({
            "node": "Function",
            "name": name_json(self.name, registry),
            "type": function_type.unwrap_or("Function"),
            "body": self.body.map(|b| b.to_json(registry)).unwrap_or(Value::Null),
            "type_def": type_def_json(self.data.type_def, registry),
        })
    }
}

impl<'a> BlockNode<'a> {
    pub fn to_json(&self, registry: &TypeRegistry) -> Value {
        json!({
            "node": "Block",
            "body": self
                .statements
                .iter()
                .map(|statement| statement.to_json(registry))
                .collect::<Vec<_>>(),
            "type_def": "N/A",
        })
    }
}

impl<'a> VarDeclarationNode<'a> {
    fn to_json_as(&self, kind: &str, registry: &TypeRegistry) -> Value {
        json!({
            "node": kind,
            "identifier": name_json(self.identifier, registry),
            "constant": self.constant,
            "value": self.value.map(|v| v.to_json(registry)).unwrap_or(Value::Null),
            "slot": slot_json(self.slot),
            "type_def": type_def_json(self.data.type_def, registry),
        })
    }

    pub fn to_json(&self, registry: &TypeRegistry) -> Value {
        self.to_json_as("VarDeclaration", registry)
    }
}

impl<'a> Statement<'a> {
    pub fn to_json(&self, registry: &TypeRegistry) -> Value {
        match self {
            Statement::Expression(expression) => expression.to_json(registry),
            Statement::VarDeclaration(n) => n.to_json(registry),
            Statement::ListDeclaration(n) => n.declaration.to_json_as("ListDeclaration", registry),
            Statement::MapDeclaration(n) => n.declaration.to_json_as("MapDeclaration", registry),
            Statement::FunDeclaration(n) => json!({
                "node": "FunDeclaration",
                "function": n.function.to_json(registry),
                "slot": slot_json(n.slot),
                "type_def": type_def_json(n.data.type_def, registry),
            }),
            Statement::ObjectDeclaration(n) => json!({
                "node": "ObjectDeclaration",
                "identifier": name_json(n.name, registry),
                "members": n.fields.iter().map(|field| json!({
                    "name": name_json(field.name, registry),
                    "type_def": registry.canonical(field.type_def),
                    "constant": false,
                    "value": field.default.map(|d| d.to_json(registry)).unwrap_or(Value::Null),
                    "static": field.is_static,
                })).chain(n.methods.iter().map(|method| json!({
                    "name": name_json(method.name, registry),
                    "value": method.method.to_json(registry),
                }))).collect::<Vec<_>>(),
                "type_def": type_def_json(n.data.type_def, registry),
            }),
            Statement::Enum(n) => json!({
                "node": "Enum",
                "identifier": name_json(n.name, registry),
                "cases": n.cases.iter().map(|case| json!({
                    "name": name_json(case.name, registry),
                    "value": case.value.map(|v| v.to_json(registry)).unwrap_or(Value::Null),
                })).collect::<Vec<_>>(),
                "type_def": type_def_json(n.data.type_def, registry),
            }),
            Statement::If(n) => json!({
                "node": "If",
                "condition": n.condition.to_json(registry),
                "body": n.body.to_json(registry),
                "else": n.else_branch.map(|e| e.to_json(registry)).unwrap_or(Value::Null),
                "type_def": "N/A",
            }),
            Statement::Block(n) => n.to_json(registry),
            Statement::While(n) => json!({
                "node": "While",
                "condition": n.condition.to_json(registry),
                "block": n.block.to_json(registry),
                "type_def": "N/A",
            }),
            Statement::DoUntil(n) => json!({
                "node": "DoUntil",
                "block": n.block.to_json(registry),
                "condition": n.condition.to_json(registry),
                "type_def": "N/A",
            }),
            Statement::For(n) => json!({
                "node": "For",
                "init_expression": n
                    .init_declarations
                    .iter()
                    .map(|statement| statement.to_json(registry))
                    .collect::<Vec<_>>(),
                "condition": n.condition.to_json(registry),
                "post_loop": n
                    .post_loop
                    .iter()
                    .map(|expression| expression.to_json(registry))
                    .collect::<Vec<_>>(),
                "body": n.body.to_json(registry),
                "type_def": "N/A",
            }),
            Statement::ForEach(n) => json!({
                "node": "ForEach",
                "key": n.key.as_ref().map(|k| k.to_json(registry)).unwrap_or(Value::Null),
                "value": n.value.to_json(registry),
                "iterable": n.iterable.to_json(registry),
                "block": n.block.to_json(registry),
                "type_def": "N/A",
            }),
            Statement::Return(n) => json!({
                "node": "Return",
                "value": n.value.map(|v| v.to_json(registry)).unwrap_or(Value::Null),
                "type_def": "N/A",
            }),
            Statement::Break(_) => json!({ "node": "Break", "type_def": "N/A" }),
            Statement::Continue(_) => json!({ "node": "Continue", "type_def": "N/A" }),
            Statement::Throw(n) => json!({
                "node": "Throw",
                "expression": n.expression.to_json(registry),
                "type_def": "N/A",
            }),
            Statement::Export(n) => json!({
                "node": "Export",
                "identifier": name_json(n.identifier, registry),
                "alias": n.alias.map(|a| name_json(a, registry)).unwrap_or(Value::Null),
                "type_def": "N/A",
            }),
            Statement::Import(n) => json!({
                "node": "Import",
                "imported_symbols": n
                    .imported_symbols
                    .iter()
                    .map(|&symbol| name_json(symbol, registry))
                    .collect::<Vec<_>>(),
                "prefix": n.prefix.map(|p| name_json(p, registry)).unwrap_or(Value::Null),
                "path": name_json(n.path, registry),
                "type_def": "N/A",
            }),
        }
    }
}
