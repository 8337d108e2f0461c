//! AST node definitions.
//!
//! Each node kind is a distinct variant carrying its children by arena
//! reference. The `NodeData` header holds the originating token and the
//! node's type annotation.

use buzz_core::intern::InternedString;
use buzz_scanner::{Token, TokenKind};
use buzz_types::TypeId;

/// Common data shared by all AST nodes.
#[derive(Debug, Clone, Copy)]
pub struct NodeData {
    /// The token this node originates at.
    pub location: Token,
    /// The node's type, when it has one. Statements usually do not.
    pub type_def: Option<TypeId>,
}

impl NodeData {
    pub fn new(location: Token) -> Self {
        Self {
            location,
            type_def: None,
        }
    }

    pub fn typed(location: Token, type_def: TypeId) -> Self {
        Self {
            location,
            type_def: Some(type_def),
        }
    }
}

/// Where a resolved variable reference lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Local(u8),
    UpValue(u8),
    Global(u32),
}

// ============================================================================
// Expressions
// ============================================================================

#[derive(Debug)]
pub enum Expression<'a> {
    Binary(BinaryNode<'a>),
    Unary(UnaryNode<'a>),
    Subscript(SubscriptNode<'a>),
    Unwrap(UnwrapNode<'a>),
    ForceUnwrap(ForceUnwrapNode<'a>),
    Is(IsNode<'a>),
    And(AndNode<'a>),
    Or(OrNode<'a>),
    NamedVariable(NamedVariableNode<'a>),
    Number(NumberNode),
    String(StringNode<'a>),
    StringLiteral(StringLiteralNode),
    Boolean(BooleanNode),
    Null(NullNode),
    List(ListNode<'a>),
    Map(MapNode<'a>),
    Super(SuperNode),
    Dot(DotNode<'a>),
    ObjectInit(ObjectInitNode<'a>),
    Call(CallNode<'a>),
    SuperCall(SuperCallNode<'a>),
    Function(FunctionNode<'a>),
}

impl<'a> Expression<'a> {
    pub fn data(&self) -> &NodeData {
        match self {
            Expression::Binary(n) => &n.data,
            Expression::Unary(n) => &n.data,
            Expression::Subscript(n) => &n.data,
            Expression::Unwrap(n) => &n.data,
            Expression::ForceUnwrap(n) => &n.data,
            Expression::Is(n) => &n.data,
            Expression::And(n) => &n.data,
            Expression::Or(n) => &n.data,
            Expression::NamedVariable(n) => &n.data,
            Expression::Number(n) => &n.data,
            Expression::String(n) => &n.data,
            Expression::StringLiteral(n) => &n.data,
            Expression::Boolean(n) => &n.data,
            Expression::Null(n) => &n.data,
            Expression::List(n) => &n.data,
            Expression::Map(n) => &n.data,
            Expression::Super(n) => &n.data,
            Expression::Dot(n) => &n.data,
            Expression::ObjectInit(n) => &n.data,
            Expression::Call(n) => &n.data,
            Expression::SuperCall(n) => &n.data,
            Expression::Function(n) => &n.data,
        }
    }

    /// The expression's type annotation, when it has one.
    pub fn type_def(&self) -> Option<TypeId> {
        self.data().type_def
    }
}

#[derive(Debug)]
pub struct BinaryNode<'a> {
    pub data: NodeData,
    pub left: &'a Expression<'a>,
    pub operator: TokenKind,
    pub right: &'a Expression<'a>,
}

#[derive(Debug)]
pub struct UnaryNode<'a> {
    pub data: NodeData,
    pub operator: TokenKind,
    pub operand: &'a Expression<'a>,
}

#[derive(Debug)]
pub struct SubscriptNode<'a> {
    pub data: NodeData,
    pub subscripted: &'a Expression<'a>,
    pub index: &'a Expression<'a>,
    /// Present when the subscript is an assignment target: `xs[0] = v`.
    pub value: Option<&'a Expression<'a>>,
}

#[derive(Debug)]
pub struct UnwrapNode<'a> {
    pub data: NodeData,
    pub unwrapped: &'a Expression<'a>,
}

#[derive(Debug)]
pub struct ForceUnwrapNode<'a> {
    pub data: NodeData,
    pub unwrapped: &'a Expression<'a>,
}

#[derive(Debug)]
pub struct IsNode<'a> {
    pub data: NodeData,
    pub left: &'a Expression<'a>,
    /// The type tested against.
    pub constant: TypeId,
}

#[derive(Debug)]
pub struct AndNode<'a> {
    pub data: NodeData,
    pub left: &'a Expression<'a>,
    pub right: &'a Expression<'a>,
}

#[derive(Debug)]
pub struct OrNode<'a> {
    pub data: NodeData,
    pub left: &'a Expression<'a>,
    pub right: &'a Expression<'a>,
}

#[derive(Debug)]
pub struct NamedVariableNode<'a> {
    pub data: NodeData,
    pub identifier: InternedString,
    /// Present when the reference is an assignment target: `x = v`.
    pub value: Option<&'a Expression<'a>>,
    pub slot: Slot,
}

#[derive(Debug)]
pub struct NumberNode {
    pub data: NodeData,
    pub value: f64,
}

/// An interpolated string: literal pieces and embedded expressions,
/// in source order.
#[derive(Debug)]
pub struct StringNode<'a> {
    pub data: NodeData,
    pub parts: &'a [Expression<'a>],
}

/// A plain string literal.
#[derive(Debug)]
pub struct StringLiteralNode {
    pub data: NodeData,
    pub value: InternedString,
}

#[derive(Debug)]
pub struct BooleanNode {
    pub data: NodeData,
    pub value: bool,
}

#[derive(Debug)]
pub struct NullNode {
    pub data: NodeData,
}

#[derive(Debug)]
pub struct ListNode<'a> {
    pub data: NodeData,
    pub items: &'a [Expression<'a>],
}

#[derive(Debug)]
pub struct MapNode<'a> {
    pub data: NodeData,
    pub keys: &'a [Expression<'a>],
    pub values: &'a [Expression<'a>],
}

#[derive(Debug)]
pub struct SuperNode {
    pub data: NodeData,
    /// The accessed member of the superclass.
    pub identifier: InternedString,
}

#[derive(Debug)]
pub struct DotNode<'a> {
    pub data: NodeData,
    pub callee: &'a Expression<'a>,
    pub identifier: InternedString,
    /// Present when the member access is an assignment target.
    pub value: Option<&'a Expression<'a>>,
}

#[derive(Debug)]
pub struct ObjectInitMember<'a> {
    pub name: InternedString,
    pub value: &'a Expression<'a>,
}

#[derive(Debug)]
pub struct ObjectInitNode<'a> {
    pub data: NodeData,
    pub members: &'a [ObjectInitMember<'a>],
}

#[derive(Debug)]
pub struct Argument<'a> {
    /// Named arguments: `fact(n: 3)`.
    pub name: Option<InternedString>,
    pub value: &'a Expression<'a>,
}

/// An inline recovery handler attached to a call.
#[derive(Debug)]
pub struct CatchNode<'a> {
    pub data: NodeData,
    /// A `Catch`-kind function, or a plain default value expression.
    pub value: &'a Expression<'a>,
}

#[derive(Debug)]
pub struct CallNode<'a> {
    pub data: NodeData,
    pub callee: &'a Expression<'a>,
    pub arguments: &'a [Argument<'a>],
    pub catches: &'a [CatchNode<'a>],
}

#[derive(Debug)]
pub struct SuperCallNode<'a> {
    pub data: NodeData,
    pub identifier: InternedString,
    pub arguments: &'a [Argument<'a>],
}

/// A function: root script, declaration body, method, lambda, test or catch
/// closure. The kind lives in the function's type.
#[derive(Debug)]
pub struct FunctionNode<'a> {
    pub data: NodeData,
    pub name: InternedString,
    pub body: Option<&'a BlockNode<'a>>,
    /// Parameter default values, by parameter name.
    pub defaults: &'a [Argument<'a>],
    pub upvalue_count: u8,
    /// Resolved native symbol, for `extern` functions.
    pub native: Option<usize>,
}

// ============================================================================
// Statements
// ============================================================================

#[derive(Debug)]
pub enum Statement<'a> {
    Expression(&'a Expression<'a>),
    VarDeclaration(VarDeclarationNode<'a>),
    ListDeclaration(ListDeclarationNode<'a>),
    MapDeclaration(MapDeclarationNode<'a>),
    FunDeclaration(FunDeclarationNode<'a>),
    ObjectDeclaration(ObjectDeclarationNode<'a>),
    Enum(EnumNode<'a>),
    If(IfNode<'a>),
    Block(BlockNode<'a>),
    While(WhileNode<'a>),
    DoUntil(DoUntilNode<'a>),
    For(ForNode<'a>),
    ForEach(ForEachNode<'a>),
    Return(ReturnNode<'a>),
    Break(BreakNode),
    Continue(ContinueNode),
    Throw(ThrowNode<'a>),
    Export(ExportNode),
    Import(ImportNode<'a>),
}

#[derive(Debug)]
pub struct VarDeclarationNode<'a> {
    /// `type_def` is the declared type, in instance form.
    pub data: NodeData,
    pub identifier: InternedString,
    pub constant: bool,
    pub value: Option<&'a Expression<'a>>,
    pub slot: Slot,
}

/// A variable declaration of list type; same shape, distinct kind.
#[derive(Debug)]
pub struct ListDeclarationNode<'a> {
    pub declaration: VarDeclarationNode<'a>,
}

/// A variable declaration of map type; same shape, distinct kind.
#[derive(Debug)]
pub struct MapDeclarationNode<'a> {
    pub declaration: VarDeclarationNode<'a>,
}

#[derive(Debug)]
pub struct FunDeclarationNode<'a> {
    pub data: NodeData,
    pub function: FunctionNode<'a>,
    pub slot: Slot,
}

#[derive(Debug)]
pub struct ObjectField<'a> {
    pub name: InternedString,
    pub type_def: TypeId,
    pub default: Option<&'a Expression<'a>>,
    pub is_static: bool,
}

#[derive(Debug)]
pub struct ObjectMethod<'a> {
    pub name: InternedString,
    pub method: FunctionNode<'a>,
}

#[derive(Debug)]
pub struct ObjectDeclarationNode<'a> {
    /// `type_def` is the object definition type.
    pub data: NodeData,
    pub name: InternedString,
    pub fields: &'a [ObjectField<'a>],
    pub methods: &'a [ObjectMethod<'a>],
    pub slot: Slot,
}

#[derive(Debug)]
pub struct EnumCase<'a> {
    pub name: InternedString,
    pub value: Option<&'a Expression<'a>>,
}

#[derive(Debug)]
pub struct EnumNode<'a> {
    /// `type_def` is the enum definition type.
    pub data: NodeData,
    pub name: InternedString,
    pub cases: &'a [EnumCase<'a>],
    pub slot: Slot,
}

#[derive(Debug)]
pub struct IfNode<'a> {
    pub data: NodeData,
    pub condition: &'a Expression<'a>,
    pub body: &'a Statement<'a>,
    pub else_branch: Option<&'a Statement<'a>>,
}

#[derive(Debug)]
pub struct BlockNode<'a> {
    pub data: NodeData,
    pub statements: &'a [Statement<'a>],
}

#[derive(Debug)]
pub struct WhileNode<'a> {
    pub data: NodeData,
    pub condition: &'a Expression<'a>,
    pub block: &'a BlockNode<'a>,
}

#[derive(Debug)]
pub struct DoUntilNode<'a> {
    pub data: NodeData,
    pub block: &'a BlockNode<'a>,
    pub condition: &'a Expression<'a>,
}

#[derive(Debug)]
pub struct ForNode<'a> {
    pub data: NodeData,
    pub init_declarations: &'a [Statement<'a>],
    pub condition: &'a Expression<'a>,
    pub post_loop: &'a [Expression<'a>],
    pub body: &'a BlockNode<'a>,
}

#[derive(Debug)]
pub struct ForEachNode<'a> {
    pub data: NodeData,
    pub key: Option<VarDeclarationNode<'a>>,
    pub value: VarDeclarationNode<'a>,
    pub iterable: &'a Expression<'a>,
    pub block: &'a BlockNode<'a>,
}

#[derive(Debug)]
pub struct ReturnNode<'a> {
    pub data: NodeData,
    pub value: Option<&'a Expression<'a>>,
}

#[derive(Debug)]
pub struct BreakNode {
    pub data: NodeData,
}

#[derive(Debug)]
pub struct ContinueNode {
    pub data: NodeData,
}

#[derive(Debug)]
pub struct ThrowNode<'a> {
    pub data: NodeData,
    pub expression: &'a Expression<'a>,
}

#[derive(Debug)]
pub struct ExportNode {
    pub data: NodeData,
    pub identifier: InternedString,
    pub alias: Option<InternedString>,
}

#[derive(Debug)]
pub struct ImportNode<'a> {
    pub data: NodeData,
    pub imported_symbols: &'a [InternedString],
    pub prefix: Option<InternedString>,
    pub path: InternedString,
    /// Root function of the imported unit; absent on a cache hit.
    pub function: Option<&'a FunctionNode<'a>>,
}
