//! Typed syntax tree consumed by the analysis.
//!
//! The front end (or the JSON export the CLI reads) hands over one
//! [`TranslationUnit`]: the source text, the arena of expression and
//! statement nodes, and the declarations they refer to. Nodes and
//! declarations are addressed by index ([`NodeId`], [`DeclId`]), so the
//! analysis can keep identity-keyed maps without borrowing the tree.

pub mod builder;
pub mod eval;
pub mod types;

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use builder::TreeBuilder;

use crate::buffers_ensure;
use crate::error::SafeBuffersResult;
pub use types::{RecordRef, Type};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeclId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl DeclId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Half-open byte range into [`SourceFile::text`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn at(offset: usize) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// True when `offset` lies inside the range. The end offset is included
    /// so that a point just past a macro expansion still counts as inside.
    pub fn covers_offset(&self, offset: usize) -> bool {
        self.start <= offset && offset <= self.end
    }

    pub fn overlaps(&self, other: Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "c++", alias = "cxx", alias = "cpp")]
    Cxx,
    #[serde(rename = "c")]
    C,
}

impl Language {
    pub fn is_cxx(self) -> bool {
        matches!(self, Language::Cxx)
    }
}

/// The text being analyzed, with the macro and opt-out bookkeeping the
/// front end performed while preprocessing it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceFile {
    #[serde(default)]
    pub path: String,
    pub text: String,
    /// Spelling ranges that came from macro expansion.
    #[serde(default)]
    pub macro_expansions: Vec<Span>,
    /// Ranges between `#pragma clang unsafe_buffer_usage begin`/`end`.
    #[serde(default)]
    pub opt_out_regions: Vec<Span>,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
            macro_expansions: Vec::new(),
            opt_out_regions: Vec::new(),
        }
    }

    /// Source text of `span`; empty when the range is not valid for this file.
    pub fn slice(&self, span: Span) -> &str {
        self.text.get(span.start..span.end).unwrap_or("")
    }

    pub fn in_macro(&self, offset: usize) -> bool {
        self.macro_expansions
            .iter()
            .any(|range| range.covers_offset(offset))
    }

    pub fn in_opt_out_region(&self, span: Span) -> bool {
        self.opt_out_regions
            .iter()
            .any(|region| region.start <= span.start && span.start < region.end)
    }

    /// 1-based line and column of a byte offset.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let clamped = offset.min(self.text.len());
        let before = self.text.get(..clamped).unwrap_or("");
        let line = before.matches('\n').count() + 1;
        let col = match before.rfind('\n') {
            Some(nl) => clamped - nl,
            None => clamped + 1,
        };
        (line, col)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CastKind {
    LValueToRValue,
    ArrayToPointerDecay,
    FunctionToPointerDecay,
    IntegralCast,
    IntegralToPointer,
    PointerToIntegral,
    PointerToBoolean,
    IntegralToBoolean,
    NullToPointer,
    BitCast,
    NoOp,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CastStyle {
    CStyle,
    Functional,
    Static,
    Reinterpret,
    Const,
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    PostInc,
    PostDec,
    PreInc,
    PreDec,
    AddrOf,
    Deref,
    Plus,
    Minus,
    Not,
    LNot,
}

impl UnaryOp {
    pub fn is_increment_decrement(self) -> bool {
        matches!(
            self,
            UnaryOp::PostInc | UnaryOp::PostDec | UnaryOp::PreInc | UnaryOp::PreDec
        )
    }

    pub fn is_prefix(self) -> bool {
        !matches!(self, UnaryOp::PostInc | UnaryOp::PostDec)
    }

    pub fn spelling(self) -> &'static str {
        match self {
            UnaryOp::PostInc | UnaryOp::PreInc => "++",
            UnaryOp::PostDec | UnaryOp::PreDec => "--",
            UnaryOp::AddrOf => "&",
            UnaryOp::Deref => "*",
            UnaryOp::Plus => "+",
            UnaryOp::Minus => "-",
            UnaryOp::Not => "~",
            UnaryOp::LNot => "!",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Shl,
    Shr,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    And,
    Xor,
    Or,
    LAnd,
    LOr,
    Assign,
    MulAssign,
    DivAssign,
    RemAssign,
    AddAssign,
    SubAssign,
    ShlAssign,
    ShrAssign,
    AndAssign,
    XorAssign,
    OrAssign,
    Comma,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge | BinaryOp::Eq | BinaryOp::Ne
        )
    }

    pub fn is_assignment(self) -> bool {
        matches!(
            self,
            BinaryOp::Assign
                | BinaryOp::MulAssign
                | BinaryOp::DivAssign
                | BinaryOp::RemAssign
                | BinaryOp::AddAssign
                | BinaryOp::SubAssign
                | BinaryOp::ShlAssign
                | BinaryOp::ShrAssign
                | BinaryOp::AndAssign
                | BinaryOp::XorAssign
                | BinaryOp::OrAssign
        )
    }

    pub fn spelling(self) -> &'static str {
        match self {
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::And => "&",
            BinaryOp::Xor => "^",
            BinaryOp::Or => "|",
            BinaryOp::LAnd => "&&",
            BinaryOp::LOr => "||",
            BinaryOp::Assign => "=",
            BinaryOp::MulAssign => "*=",
            BinaryOp::DivAssign => "/=",
            BinaryOp::RemAssign => "%=",
            BinaryOp::AddAssign => "+=",
            BinaryOp::SubAssign => "-=",
            BinaryOp::ShlAssign => "<<=",
            BinaryOp::ShrAssign => ">>=",
            BinaryOp::AndAssign => "&=",
            BinaryOp::XorAssign => "^=",
            BinaryOp::OrAssign => "|=",
            BinaryOp::Comma => ",",
        }
    }
}

/// Operators whose operand is never evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnevaluatedKind {
    Sizeof,
    Alignof,
    Typeof,
    Decltype,
    Noexcept,
    Typeid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum NodeKind {
    Compound {
        stmts: Vec<NodeId>,
    },
    /// Declaration statement; its children are the initializers of `decls`.
    DeclStmt {
        decls: Vec<DeclId>,
    },
    If {
        cond: NodeId,
        then: NodeId,
        #[serde(default)]
        otherwise: Option<NodeId>,
    },
    /// `for`, `while`, `do`: init, condition, increment and body, in order.
    Loop {
        parts: Vec<NodeId>,
    },
    Return {
        #[serde(default)]
        value: Option<NodeId>,
    },
    /// Any other statement (try blocks, switch, labels).
    Stmt {
        #[serde(default)]
        children: Vec<NodeId>,
    },
    DeclRef {
        decl: DeclId,
    },
    IntegerLiteral {
        value: i128,
    },
    StringLiteral {
        value: String,
    },
    /// `nullptr` / `__null`.
    NullPtr,
    /// `__func__`, `__PRETTY_FUNCTION__`.
    Predefined,
    Paren {
        inner: NodeId,
    },
    ImplicitCast {
        cast: CastKind,
        inner: NodeId,
    },
    ExplicitCast {
        cast: CastKind,
        style: CastStyle,
        inner: NodeId,
    },
    Unary {
        op: UnaryOp,
        operand: NodeId,
        op_span: Span,
    },
    Binary {
        op: BinaryOp,
        lhs: NodeId,
        rhs: NodeId,
        op_span: Span,
    },
    Conditional {
        cond: NodeId,
        then: NodeId,
        otherwise: NodeId,
    },
    Subscript {
        base: NodeId,
        index: NodeId,
    },
    /// Implicit index used by compiler-generated array copies.
    ArrayInitIndex,
    Call {
        #[serde(default)]
        callee: Option<DeclId>,
        #[serde(default)]
        callee_expr: Option<NodeId>,
        #[serde(default)]
        args: Vec<NodeId>,
    },
    MemberCall {
        object: NodeId,
        method: String,
        #[serde(default)]
        callee: Option<DeclId>,
        #[serde(default)]
        record: Option<RecordRef>,
        #[serde(default)]
        args: Vec<NodeId>,
    },
    Member {
        base: NodeId,
        field: String,
        #[serde(default)]
        is_field: bool,
        #[serde(default)]
        unsafe_buffer_usage: bool,
    },
    Construct {
        record: RecordRef,
        #[serde(default)]
        unsafe_buffer_usage: bool,
        #[serde(default)]
        args: Vec<NodeId>,
    },
    New {
        #[serde(default)]
        array_size: Option<NodeId>,
        /// `new T[]{...}` has no size expression but still allocates an array.
        #[serde(default)]
        is_array: bool,
        #[serde(default)]
        init: Option<NodeId>,
    },
    Unevaluated {
        op: UnevaluatedKind,
        #[serde(default)]
        operand: Option<NodeId>,
        #[serde(default)]
        value: Option<i128>,
    },
    GenericSelection {
        controlling: NodeId,
        #[serde(default)]
        associations: Vec<NodeId>,
        result: NodeId,
    },
    DefaultInit {
        #[serde(default)]
        expr: Option<NodeId>,
    },
    /// Lambda expression; the body is analyzed with the enclosing function.
    Lambda {
        body: NodeId,
    },
    /// Block literal; analyzed on its own.
    BlockExpr {
        decl: DeclId,
    },
    InitList {
        #[serde(default)]
        inits: Vec<NodeId>,
    },
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Compound { .. } => "CompoundStmt",
            NodeKind::DeclStmt { .. } => "DeclStmt",
            NodeKind::If { .. } => "IfStmt",
            NodeKind::Loop { .. } => "LoopStmt",
            NodeKind::Return { .. } => "ReturnStmt",
            NodeKind::Stmt { .. } => "Stmt",
            NodeKind::DeclRef { .. } => "DeclRefExpr",
            NodeKind::IntegerLiteral { .. } => "IntegerLiteral",
            NodeKind::StringLiteral { .. } => "StringLiteral",
            NodeKind::NullPtr => "NullPtrLiteralExpr",
            NodeKind::Predefined => "PredefinedExpr",
            NodeKind::Paren { .. } => "ParenExpr",
            NodeKind::ImplicitCast { .. } => "ImplicitCastExpr",
            NodeKind::ExplicitCast { .. } => "ExplicitCastExpr",
            NodeKind::Unary { .. } => "UnaryOperator",
            NodeKind::Binary { .. } => "BinaryOperator",
            NodeKind::Conditional { .. } => "ConditionalOperator",
            NodeKind::Subscript { .. } => "ArraySubscriptExpr",
            NodeKind::ArrayInitIndex => "ArrayInitIndexExpr",
            NodeKind::Call { .. } => "CallExpr",
            NodeKind::MemberCall { .. } => "CXXMemberCallExpr",
            NodeKind::Member { .. } => "MemberExpr",
            NodeKind::Construct { .. } => "CXXConstructExpr",
            NodeKind::New { .. } => "CXXNewExpr",
            NodeKind::Unevaluated { .. } => "UnevaluatedExpr",
            NodeKind::GenericSelection { .. } => "GenericSelectionExpr",
            NodeKind::DefaultInit { .. } => "CXXDefaultInitExpr",
            NodeKind::Lambda { .. } => "LambdaExpr",
            NodeKind::BlockExpr { .. } => "BlockExpr",
            NodeKind::InitList { .. } => "InitListExpr",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    #[serde(flatten)]
    pub kind: NodeKind,
    #[serde(default)]
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Storage {
    #[default]
    Local,
    StaticLocal,
    Parameter,
    Global,
    /// Structured binding.
    Binding,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarDecl {
    pub name: String,
    pub ty: Type,
    /// From the first declaration specifier to the end of the declarator,
    /// including the initializer.
    pub span: Span,
    pub name_span: Span,
    #[serde(default)]
    pub storage: Storage,
    /// Function (or block) the variable belongs to.
    #[serde(default)]
    pub owner: Option<DeclId>,
    #[serde(default)]
    pub init: Option<NodeId>,
    #[serde(default)]
    pub default_arg: Option<NodeId>,
    /// Top-level `const`.
    #[serde(default)]
    pub is_const: bool,
    #[serde(default)]
    pub is_inline: bool,
    #[serde(default)]
    pub is_constexpr: bool,
    #[serde(default)]
    pub has_constant_init: bool,
    #[serde(default)]
    pub is_init_capture: bool,
    /// Source ranges of attributes attached to the declaration.
    #[serde(default)]
    pub attrs: Vec<Span>,
}

impl VarDecl {
    pub fn is_local(&self) -> bool {
        matches!(self.storage, Storage::Local)
    }

    pub fn is_parameter(&self) -> bool {
        matches!(self.storage, Storage::Parameter)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallableKind {
    #[default]
    Function,
    Method,
    Constructor,
    LambdaOperator,
    Block,
    ObjcMethod,
}

impl CallableKind {
    pub fn is_method(self) -> bool {
        matches!(
            self,
            CallableKind::Method | CallableKind::Constructor | CallableKind::LambdaOperator
        )
    }
}

/// Parameters of `__attribute__((alloc_size(...)))`, 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocSize {
    pub elem_size_param: usize,
    #[serde(default)]
    pub num_elems_param: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSite {
    pub span: Span,
    #[serde(default)]
    pub name: Option<String>,
}

/// A prior declaration of a function that is not its definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redecl {
    /// Up to and including the closing `)`, excluding the `;`.
    pub span: Span,
    #[serde(default)]
    pub params: Vec<ParamSite>,
    #[serde(default)]
    pub unsafe_buffer_usage: bool,
    #[serde(default)]
    pub is_extern_c: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    /// From the first declaration specifier through the end of the body.
    pub span: Span,
    pub name_span: Span,
    #[serde(default)]
    pub kind: CallableKind,
    #[serde(default)]
    pub return_ty: Type,
    #[serde(default)]
    pub params: Vec<DeclId>,
    #[serde(default)]
    pub body: Option<NodeId>,
    /// The body is a function-try-block.
    #[serde(default)]
    pub is_function_try_block: bool,
    #[serde(default)]
    pub ctor_inits: Vec<NodeId>,
    #[serde(default)]
    pub redecls: Vec<Redecl>,
    #[serde(default)]
    pub alloc_size: Option<AllocSize>,
    #[serde(default)]
    pub is_constexpr: bool,
    #[serde(default)]
    pub is_template: bool,
    #[serde(default)]
    pub is_variadic: bool,
    #[serde(default)]
    pub is_overloaded_operator: bool,
    #[serde(default)]
    pub is_extern_c: bool,
    #[serde(default)]
    pub is_builtin: bool,
    #[serde(default)]
    pub in_std: bool,
    /// Carries `[[clang::unsafe_buffer_usage]]`.
    #[serde(default)]
    pub unsafe_buffer_usage: bool,
    /// Another declaration with the same name exists in scope.
    #[serde(default)]
    pub has_overloads: bool,
    /// Call operator of a lambda defined inside a function.
    #[serde(default)]
    pub in_local_class: bool,
}

impl FunctionDecl {
    pub fn is_main(&self) -> bool {
        self.name == "main"
    }

    pub fn any_extern_c(&self) -> bool {
        self.is_extern_c || self.redecls.iter().any(|r| r.is_extern_c)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decl", rename_all = "snake_case")]
pub enum Decl {
    Var(VarDecl),
    Function(FunctionDecl),
}

impl Decl {
    pub fn name(&self) -> &str {
        match self {
            Decl::Var(var) => &var.name,
            Decl::Function(fun) => &fun.name,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Decl::Var(var) => var.span,
            Decl::Function(fun) => fun.span,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyntaxTree {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub decls: Vec<Decl>,
}

impl SyntaxTree {
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn decl(&self, id: DeclId) -> Option<&Decl> {
        self.decls.get(id.index())
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.node(id).map(|n| &n.kind)
    }

    /// Type of a node; `void` for unknown ids.
    pub fn ty(&self, id: NodeId) -> &Type {
        const VOID: &Type = &Type::Void;
        self.node(id).map(|n| &n.ty).unwrap_or(VOID)
    }

    pub fn span(&self, id: NodeId) -> Span {
        self.node(id).map(|n| n.span).unwrap_or_default()
    }

    pub fn var(&self, id: DeclId) -> Option<&VarDecl> {
        match self.decl(id)? {
            Decl::Var(var) => Some(var),
            Decl::Function(_) => None,
        }
    }

    pub fn function(&self, id: DeclId) -> Option<&FunctionDecl> {
        match self.decl(id)? {
            Decl::Function(fun) => Some(fun),
            Decl::Var(_) => None,
        }
    }

    /// Declaration a `DeclRef` node points at.
    pub fn referenced_decl(&self, id: NodeId) -> Option<DeclId> {
        match self.kind(id)? {
            NodeKind::DeclRef { decl } => Some(*decl),
            _ => None,
        }
    }

    /// Variable a `DeclRef` node points at.
    pub fn referenced_var(&self, id: NodeId) -> Option<(DeclId, &VarDecl)> {
        let decl = self.referenced_decl(id)?;
        self.var(decl).map(|var| (decl, var))
    }

    /// Direct children in evaluation order.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        let Some(kind) = self.kind(id) else {
            return Vec::new();
        };
        match kind {
            NodeKind::Compound { stmts } => stmts.clone(),
            NodeKind::DeclStmt { decls } => decls
                .iter()
                .filter_map(|d| self.var(*d).and_then(|v| v.init))
                .collect(),
            NodeKind::If {
                cond,
                then,
                otherwise,
            } => std::iter::once(*cond)
                .chain(std::iter::once(*then))
                .chain(*otherwise)
                .collect(),
            NodeKind::Loop { parts } => parts.clone(),
            NodeKind::Return { value } => value.iter().copied().collect(),
            NodeKind::Stmt { children } => children.clone(),
            NodeKind::DeclRef { .. }
            | NodeKind::IntegerLiteral { .. }
            | NodeKind::StringLiteral { .. }
            | NodeKind::NullPtr
            | NodeKind::Predefined
            | NodeKind::ArrayInitIndex
            | NodeKind::BlockExpr { .. } => Vec::new(),
            NodeKind::Paren { inner }
            | NodeKind::ImplicitCast { inner, .. }
            | NodeKind::ExplicitCast { inner, .. } => vec![*inner],
            NodeKind::Unary { operand, .. } => vec![*operand],
            NodeKind::Binary { lhs, rhs, .. } => vec![*lhs, *rhs],
            NodeKind::Conditional {
                cond,
                then,
                otherwise,
            } => vec![*cond, *then, *otherwise],
            NodeKind::Subscript { base, index } => vec![*base, *index],
            NodeKind::Call {
                callee_expr, args, ..
            } => callee_expr.iter().chain(args.iter()).copied().collect(),
            NodeKind::MemberCall { object, args, .. } => {
                std::iter::once(*object).chain(args.iter().copied()).collect()
            }
            NodeKind::Member { base, .. } => vec![*base],
            NodeKind::Construct { args, .. } => args.clone(),
            NodeKind::New {
                array_size, init, ..
            } => array_size.iter().chain(init).copied().collect(),
            NodeKind::Unevaluated { operand, .. } => operand.iter().copied().collect(),
            NodeKind::GenericSelection {
                controlling,
                associations,
                ..
            } => std::iter::once(*controlling)
                .chain(associations.iter().copied())
                .collect(),
            NodeKind::DefaultInit { expr } => expr.iter().copied().collect(),
            NodeKind::Lambda { body } => vec![*body],
            NodeKind::InitList { inits } => inits.clone(),
        }
    }

    /// Child-to-parent map over every node in the arena.
    pub fn parent_map(&self) -> HashMap<NodeId, NodeId> {
        let mut parents = HashMap::new();
        for index in 0..self.nodes.len() {
            let id = NodeId(index as u32);
            for child in self.children(id) {
                parents.entry(child).or_insert(id);
            }
        }
        parents
    }

    pub fn ignore_parens(&self, mut id: NodeId) -> NodeId {
        while let Some(NodeKind::Paren { inner }) = self.kind(id) {
            id = *inner;
        }
        id
    }

    pub fn ignore_imp_casts(&self, mut id: NodeId) -> NodeId {
        while let Some(NodeKind::ImplicitCast { inner, .. }) = self.kind(id) {
            id = *inner;
        }
        id
    }

    pub fn ignore_paren_imp_casts(&self, mut id: NodeId) -> NodeId {
        while let Some(NodeKind::Paren { inner } | NodeKind::ImplicitCast { inner, .. }) =
            self.kind(id)
        {
            id = *inner;
        }
        id
    }

    /// Strips parentheses and every kind of cast.
    pub fn ignore_paren_casts(&self, mut id: NodeId) -> NodeId {
        while let Some(
            NodeKind::Paren { inner }
            | NodeKind::ImplicitCast { inner, .. }
            | NodeKind::ExplicitCast { inner, .. },
        ) = self.kind(id)
        {
            id = *inner;
        }
        id
    }
}

/// Everything the analysis needs about one source file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranslationUnit {
    pub file: SourceFile,
    #[serde(default)]
    pub language: Language,
    #[serde(flatten)]
    pub tree: SyntaxTree,
}

impl TranslationUnit {
    /// Functions, methods and blocks that have a body to analyze.
    pub fn callables_with_bodies(&self) -> Vec<DeclId> {
        self.tree
            .decls
            .iter()
            .enumerate()
            .filter_map(|(index, decl)| match decl {
                Decl::Function(fun) if fun.body.is_some() => Some(DeclId(index as u32)),
                _ => None,
            })
            .collect()
    }

    pub fn text(&self, span: Span) -> &str {
        self.file.slice(span)
    }

    /// Reads a front-end export and checks that every node and declaration
    /// index it contains resolves.
    pub fn from_json(json: &str) -> SafeBuffersResult<Self> {
        let tu: TranslationUnit = serde_json::from_str(json)?;
        let text_len = tu.file.text.len();
        for index in 0..tu.tree.nodes.len() {
            let id = NodeId(index as u32);
            for child in tu.tree.children(id) {
                buffers_ensure!(
                    child.index() < tu.tree.nodes.len(),
                    "node {index} refers to missing node {}",
                    child.0
                );
            }
            if let Some(decl) = tu.tree.referenced_decl(id) {
                buffers_ensure!(
                    decl.index() < tu.tree.decls.len(),
                    "node {index} refers to missing declaration {}",
                    decl.0
                );
            }
            buffers_ensure!(
                tu.tree.span(id).end <= text_len,
                "node {index} lies outside the source text"
            );
        }
        Ok(tu)
    }
}
