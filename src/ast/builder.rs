//! Incremental construction of a [`TranslationUnit`] over real source text.
//!
//! Spans are located by searching the text, so tests and fixtures can be
//! written against the C++ they describe instead of hand-counted offsets.
//! A failed lookup is remembered and reported by [`TreeBuilder::finish`].

use super::{
    BinaryOp, CallableKind, CastKind, CastStyle, Decl, DeclId, FunctionDecl, Language, Node,
    NodeId, NodeKind, ParamSite, RecordRef, Redecl, SourceFile, Span, Storage, SyntaxTree,
    TranslationUnit, Type, UnaryOp, UnevaluatedKind, VarDecl,
};
use crate::error::{SafeBuffersError, SafeBuffersResult};

const TYPE_KEYWORDS: &[&str] = &[
    "int", "char", "void", "unsigned", "signed", "long", "short", "double", "float", "bool",
    "const", "size_t", "wchar_t",
];

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

pub struct TreeBuilder {
    file: SourceFile,
    language: Language,
    tree: SyntaxTree,
    current_fn: Option<DeclId>,
    missing: Option<String>,
}

impl TreeBuilder {
    pub fn new(text: impl Into<String>) -> Self {
        Self::with_path("input.cpp", text)
    }

    pub fn with_path(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            file: SourceFile::new(path, text),
            language: Language::Cxx,
            tree: SyntaxTree::default(),
            current_fn: None,
            missing: None,
        }
    }

    pub fn set_language(&mut self, language: Language) {
        self.language = language;
    }

    pub fn text(&self) -> &str {
        &self.file.text
    }

    pub fn finish(self) -> SafeBuffersResult<TranslationUnit> {
        if let Some(needle) = self.missing {
            return Err(SafeBuffersError::precondition(format!(
                "`{needle}` does not occur in {}",
                self.file.path
            )));
        }
        Ok(TranslationUnit {
            file: self.file,
            language: self.language,
            tree: self.tree,
        })
    }

    fn not_found(&mut self, needle: &str) -> Span {
        if self.missing.is_none() {
            self.missing = Some(needle.to_string());
        }
        Span::default()
    }

    // ---- span lookup -------------------------------------------------------

    /// First occurrence of `needle`.
    pub fn find(&mut self, needle: &str) -> Span {
        self.find_nth(needle, 0)
    }

    /// `n`-th (0-based) occurrence of `needle`.
    pub fn find_nth(&mut self, needle: &str, n: usize) -> Span {
        match self.file.text.match_indices(needle).nth(n) {
            Some((start, _)) => Span::new(start, start + needle.len()),
            None => self.not_found(needle),
        }
    }

    /// First occurrence of `needle` inside `outer`.
    pub fn find_in(&mut self, outer: Span, needle: &str) -> Span {
        let hit = self
            .file
            .text
            .get(outer.start..outer.end)
            .and_then(|hay| hay.find(needle));
        match hit {
            Some(offset) => Span::new(outer.start + offset, outer.start + offset + needle.len()),
            None => self.not_found(needle),
        }
    }

    fn word_occurrences(&self, word: &str, from: usize) -> Vec<usize> {
        let bytes = self.file.text.as_bytes();
        self.file
            .text
            .match_indices(word)
            .map(|(start, _)| start)
            .filter(|&start| start >= from)
            .filter(|&start| {
                let end = start + word.len();
                let before_ok = start == 0 || !is_ident_byte(bytes[start - 1]);
                let after_ok = end >= bytes.len() || !is_ident_byte(bytes[end]);
                before_ok && after_ok
            })
            .collect()
    }

    /// `n`-th (0-based) whole-word occurrence of `word`.
    pub fn find_word(&mut self, word: &str, n: usize) -> Span {
        match self.word_occurrences(word, 0).get(n) {
            Some(&start) => Span::new(start, start + word.len()),
            None => self.not_found(word),
        }
    }

    fn find_word_in(&mut self, outer: Span, word: &str) -> Span {
        let hit = self
            .word_occurrences(word, outer.start)
            .into_iter()
            .find(|&start| start + word.len() <= outer.end);
        match hit {
            Some(start) => Span::new(start, start + word.len()),
            None => self.not_found(word),
        }
    }

    fn find_from(&mut self, from: usize, needle: &str) -> Span {
        let hit = self
            .file
            .text
            .get(from..)
            .and_then(|hay| hay.find(needle));
        match hit {
            Some(offset) => Span::new(from + offset, from + offset + needle.len()),
            None => self.not_found(needle),
        }
    }

    fn skip_ws_forward(&self, mut offset: usize) -> usize {
        let bytes = self.file.text.as_bytes();
        while offset < bytes.len() && bytes[offset].is_ascii_whitespace() {
            offset += 1;
        }
        offset
    }

    fn skip_ws_backward(&self, mut offset: usize) -> usize {
        let bytes = self.file.text.as_bytes();
        while offset > 0 && bytes[offset - 1].is_ascii_whitespace() {
            offset -= 1;
        }
        offset
    }

    /// Offset just past the bracket matching the `open` at `at`.
    fn matching_close(&self, at: usize, open: u8, close: u8) -> Option<usize> {
        let bytes = self.file.text.as_bytes();
        let mut depth = 0usize;
        for (offset, &b) in bytes.iter().enumerate().skip(at) {
            if b == open {
                depth += 1;
            } else if b == close {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(offset + 1);
                }
            }
        }
        None
    }

    // ---- source bookkeeping ------------------------------------------------

    pub fn macro_expansion(&mut self, span: Span) {
        self.file.macro_expansions.push(span);
    }

    pub fn opt_out_region(&mut self, span: Span) {
        self.file.opt_out_regions.push(span);
    }

    // ---- nodes ---------------------------------------------------------------

    pub fn push(&mut self, kind: NodeKind, ty: Type, span: Span) -> NodeId {
        let id = NodeId(self.tree.nodes.len() as u32);
        self.tree.nodes.push(Node { kind, ty, span });
        id
    }

    fn span_of(&self, id: NodeId) -> Span {
        self.tree.span(id)
    }

    fn ty_of(&self, id: NodeId) -> Type {
        self.tree.ty(id).clone()
    }

    pub fn int_lit(&mut self, value: i128, span: Span) -> NodeId {
        self.push(NodeKind::IntegerLiteral { value }, Type::int(), span)
    }

    pub fn typed_int_lit(&mut self, value: i128, ty: Type, span: Span) -> NodeId {
        self.push(NodeKind::IntegerLiteral { value }, ty, span)
    }

    /// Integer literal at the first whole-word occurrence of `text`.
    pub fn int_lit_at(&mut self, text: &str) -> NodeId {
        self.int_lit_nth(text, 0)
    }

    pub fn int_lit_nth(&mut self, text: &str, n: usize) -> NodeId {
        let span = self.find_word(text, n);
        let digits = text.trim_end_matches(['u', 'U', 'l', 'L']);
        let value = digits.parse::<i128>().unwrap_or_default();
        let ty = if text.len() != digits.len() && text.contains(['u', 'U']) {
            Type::unsigned()
        } else {
            Type::int()
        };
        self.typed_int_lit(value, ty, span)
    }

    /// String literal at the first occurrence of `quoted` (quotes included).
    pub fn string_lit_at(&mut self, quoted: &str) -> NodeId {
        let span = self.find(quoted);
        let (value, wide) = match quoted.strip_prefix('L') {
            Some(rest) => (rest.trim_matches('"').to_string(), true),
            None => (quoted.trim_matches('"').to_string(), false),
        };
        let (element, units) = if wide {
            (Type::wchar(), value.chars().count())
        } else {
            (Type::char(), value.len())
        };
        let ty = Type::array_of(element, units as u64 + 1);
        self.push(NodeKind::StringLiteral { value }, ty, span)
    }

    pub fn null_ptr(&mut self, span: Span) -> NodeId {
        self.push(NodeKind::NullPtr, Type::pointer_to(Type::Void), span)
    }

    pub fn predefined(&mut self, span: Span) -> NodeId {
        let ty = Type::array_of(Type::char(), 1);
        self.push(NodeKind::Predefined, ty, span)
    }

    pub fn var_ref(&mut self, decl: DeclId, span: Span) -> NodeId {
        let ty = match self.tree.decl(decl) {
            Some(Decl::Var(var)) => var.ty.clone(),
            _ => Type::Function,
        };
        self.push(NodeKind::DeclRef { decl }, ty, span)
    }

    /// Reference to `decl` at the `n`-th whole-word occurrence of `name`.
    pub fn var_ref_at(&mut self, decl: DeclId, name: &str, n: usize) -> NodeId {
        let span = self.find_word(name, n);
        self.var_ref(decl, span)
    }

    /// Wraps `inner` in the parentheses surrounding it in the source.
    pub fn paren(&mut self, inner: NodeId) -> NodeId {
        let inner_span = self.span_of(inner);
        let open = self.skip_ws_backward(inner_span.start);
        let close = self.skip_ws_forward(inner_span.end);
        let bytes = self.file.text.as_bytes();
        let span = if open > 0 && bytes.get(open - 1) == Some(&b'(') && bytes.get(close) == Some(&b')')
        {
            Span::new(open - 1, close + 1)
        } else {
            self.not_found("(...)")
        };
        let ty = self.ty_of(inner);
        self.push(NodeKind::Paren { inner }, ty, span)
    }

    pub fn implicit_cast(&mut self, cast: CastKind, inner: NodeId, ty: Type) -> NodeId {
        let span = self.span_of(inner);
        self.push(NodeKind::ImplicitCast { cast, inner }, ty, span)
    }

    /// Lvalue-to-rvalue conversion.
    pub fn load(&mut self, inner: NodeId) -> NodeId {
        let ty = self.ty_of(inner);
        self.implicit_cast(CastKind::LValueToRValue, inner, ty)
    }

    /// Array-to-pointer decay.
    pub fn decay(&mut self, inner: NodeId) -> NodeId {
        let ty = self.ty_of(inner).decayed();
        self.implicit_cast(CastKind::ArrayToPointerDecay, inner, ty)
    }

    pub fn explicit_cast(
        &mut self,
        cast: CastKind,
        style: CastStyle,
        inner: NodeId,
        ty: Type,
        span: Span,
    ) -> NodeId {
        self.push(NodeKind::ExplicitCast { cast, style, inner }, ty, span)
    }

    /// Unary operator; the operator token is located next to the operand.
    pub fn unary(&mut self, op: UnaryOp, operand: NodeId) -> NodeId {
        let operand_span = self.span_of(operand);
        let spelling = op.spelling();
        let (op_span, span) = if op.is_prefix() {
            let end = self.skip_ws_backward(operand_span.start);
            let start = end.saturating_sub(spelling.len());
            if self.file.text.get(start..end) == Some(spelling) {
                let op_span = Span::new(start, end);
                (op_span, Span::new(start, operand_span.end))
            } else {
                let missing = self.not_found(spelling);
                (missing, missing)
            }
        } else {
            let start = self.skip_ws_forward(operand_span.end);
            let end = start + spelling.len();
            if self.file.text.get(start..end) == Some(spelling) {
                let op_span = Span::new(start, end);
                (op_span, Span::new(operand_span.start, end))
            } else {
                let missing = self.not_found(spelling);
                (missing, missing)
            }
        };
        let operand_ty = self.ty_of(operand);
        let ty = match op {
            UnaryOp::Deref => operand_ty.accessed_element(),
            UnaryOp::AddrOf => Type::pointer_to(operand_ty),
            UnaryOp::LNot => Type::Bool,
            _ => operand_ty,
        };
        self.push(
            NodeKind::Unary {
                op,
                operand,
                op_span,
            },
            ty,
            span,
        )
    }

    /// Binary operator; the operator token is searched between the operands.
    pub fn binary(&mut self, op: BinaryOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        let lhs_span = self.span_of(lhs);
        let rhs_span = self.span_of(rhs);
        let spelling = op.spelling();
        let between = Span::new(lhs_span.end, rhs_span.start);
        let op_span = self.find_in(between, spelling);
        let lhs_ty = self.ty_of(lhs);
        let rhs_ty = self.ty_of(rhs);
        let ty = match op {
            _ if op.is_assignment() => lhs_ty,
            _ if op.is_comparison() => Type::Bool,
            BinaryOp::LAnd | BinaryOp::LOr => Type::Bool,
            BinaryOp::Sub if lhs_ty.is_pointer() && rhs_ty.is_pointer() => Type::long(),
            BinaryOp::Add | BinaryOp::Sub if rhs_ty.is_pointer() && !lhs_ty.is_pointer() => rhs_ty,
            BinaryOp::Comma => rhs_ty,
            _ => lhs_ty,
        };
        self.push(
            NodeKind::Binary {
                op,
                lhs,
                rhs,
                op_span,
            },
            ty,
            Span::new(lhs_span.start, rhs_span.end),
        )
    }

    pub fn conditional(&mut self, cond: NodeId, then: NodeId, otherwise: NodeId) -> NodeId {
        let span = Span::new(self.span_of(cond).start, self.span_of(otherwise).end);
        let ty = self.ty_of(then);
        self.push(
            NodeKind::Conditional {
                cond,
                then,
                otherwise,
            },
            ty,
            span,
        )
    }

    /// `base[index]`; the span runs to the closing bracket.
    pub fn subscript(&mut self, base: NodeId, index: NodeId) -> NodeId {
        let start = self.span_of(base).start;
        let close = self.find_from(self.span_of(index).end, "]");
        let ty = self.ty_of(base).accessed_element();
        self.push(
            NodeKind::Subscript { base, index },
            ty,
            Span::new(start, close.end),
        )
    }

    /// Call of a declared function; the result type is its return type.
    pub fn call(&mut self, callee: DeclId, args: Vec<NodeId>, span: Span) -> NodeId {
        let ty = self
            .tree
            .function(callee)
            .map(|f| f.return_ty.clone())
            .unwrap_or_default();
        self.push(
            NodeKind::Call {
                callee: Some(callee),
                callee_expr: None,
                args,
            },
            ty,
            span,
        )
    }

    pub fn member_call(
        &mut self,
        object: NodeId,
        method: &str,
        record: Option<RecordRef>,
        args: Vec<NodeId>,
        ty: Type,
    ) -> NodeId {
        let start = self.span_of(object).start;
        let name = self.find_from(self.span_of(object).end, method);
        let open = self.skip_ws_forward(name.end);
        let end = self
            .matching_close(open, b'(', b')')
            .unwrap_or_else(|| name.end);
        self.push(
            NodeKind::MemberCall {
                object,
                method: method.to_string(),
                callee: None,
                record,
                args,
            },
            ty,
            Span::new(start, end),
        )
    }

    pub fn member(
        &mut self,
        base: NodeId,
        field: &str,
        ty: Type,
        unsafe_buffer_usage: bool,
    ) -> NodeId {
        let start = self.span_of(base).start;
        let name = self.find_from(self.span_of(base).end, field);
        self.push(
            NodeKind::Member {
                base,
                field: field.to_string(),
                is_field: true,
                unsafe_buffer_usage,
            },
            ty,
            Span::new(start, name.end),
        )
    }

    pub fn construct(
        &mut self,
        record: RecordRef,
        args: Vec<NodeId>,
        span: Span,
        unsafe_buffer_usage: bool,
    ) -> NodeId {
        let ty = Type::Record {
            name: record.name.clone(),
            in_std: record.in_std,
        };
        self.push(
            NodeKind::Construct {
                record,
                unsafe_buffer_usage,
                args,
            },
            ty,
            span,
        )
    }

    /// `new T[size]` when `array_size` is given, `new T` otherwise.
    pub fn new_expr(&mut self, array_size: Option<NodeId>, element: Type, span: Span) -> NodeId {
        let is_array = array_size.is_some();
        self.push(
            NodeKind::New {
                array_size,
                is_array,
                init: None,
            },
            Type::pointer_to(element),
            span,
        )
    }

    /// `new T[]{...}`: an array allocation sized by its initializer list.
    pub fn new_array_unsized(&mut self, element: Type, init: Option<NodeId>, span: Span) -> NodeId {
        self.push(
            NodeKind::New {
                array_size: None,
                is_array: true,
                init,
            },
            Type::pointer_to(element),
            span,
        )
    }

    pub fn unevaluated(
        &mut self,
        op: UnevaluatedKind,
        operand: Option<NodeId>,
        value: Option<i128>,
        span: Span,
    ) -> NodeId {
        self.push(
            NodeKind::Unevaluated { op, operand, value },
            Type::size_t(),
            span,
        )
    }

    pub fn lambda(&mut self, body: NodeId, span: Span) -> NodeId {
        self.push(NodeKind::Lambda { body }, Type::record("lambda"), span)
    }

    pub fn init_list(&mut self, inits: Vec<NodeId>, ty: Type, span: Span) -> NodeId {
        self.push(NodeKind::InitList { inits }, ty, span)
    }

    // ---- statements ------------------------------------------------------------

    pub fn compound(&mut self, stmts: Vec<NodeId>, span: Span) -> NodeId {
        self.push(NodeKind::Compound { stmts }, Type::Void, span)
    }

    /// Compound statement spanning the braces that open at `open`.
    pub fn block_at(&mut self, stmts: Vec<NodeId>, open: Span) -> NodeId {
        let span = match self.matching_close(open.start, b'{', b'}') {
            Some(end) => Span::new(open.start, end),
            None => self.not_found("}"),
        };
        self.compound(stmts, span)
    }

    /// Declaration statement running through the `;` after the last decl.
    pub fn decl_stmt(&mut self, decls: Vec<DeclId>) -> NodeId {
        let spans: Vec<Span> = decls
            .iter()
            .filter_map(|d| self.tree.decl(*d).map(Decl::span))
            .collect();
        let start = spans.iter().map(|s| s.start).min().unwrap_or_default();
        let last_end = spans.iter().map(|s| s.end).max().unwrap_or_default();
        let semi = self.find_from(last_end, ";");
        self.push(NodeKind::DeclStmt { decls }, Type::Void, Span::new(start, semi.end))
    }

    pub fn if_stmt(
        &mut self,
        cond: NodeId,
        then: NodeId,
        otherwise: Option<NodeId>,
        span: Span,
    ) -> NodeId {
        self.push(
            NodeKind::If {
                cond,
                then,
                otherwise,
            },
            Type::Void,
            span,
        )
    }

    pub fn loop_stmt(&mut self, parts: Vec<NodeId>, span: Span) -> NodeId {
        self.push(NodeKind::Loop { parts }, Type::Void, span)
    }

    pub fn return_stmt(&mut self, value: Option<NodeId>, span: Span) -> NodeId {
        self.push(NodeKind::Return { value }, Type::Void, span)
    }

    pub fn stmt(&mut self, children: Vec<NodeId>, span: Span) -> NodeId {
        self.push(NodeKind::Stmt { children }, Type::Void, span)
    }

    // ---- declarations ----------------------------------------------------------

    fn push_decl(&mut self, decl: Decl) -> DeclId {
        let id = DeclId(self.tree.decls.len() as u32);
        self.tree.decls.push(decl);
        id
    }

    pub fn var_mut(&mut self, decl: DeclId) -> Option<&mut VarDecl> {
        match self.tree.decls.get_mut(decl.index())? {
            Decl::Var(var) => Some(var),
            Decl::Function(_) => None,
        }
    }

    pub fn function_mut(&mut self, decl: DeclId) -> Option<&mut FunctionDecl> {
        match self.tree.decls.get_mut(decl.index())? {
            Decl::Function(fun) => Some(fun),
            Decl::Var(_) => None,
        }
    }

    pub fn mark_const(&mut self, decl: DeclId) {
        if let Some(var) = self.var_mut(decl) {
            var.is_const = true;
        }
    }

    /// Variable declared by `decl_text` (declarator plus initializer).
    pub fn declare_var(
        &mut self,
        storage: Storage,
        name: &str,
        ty: Type,
        span: Span,
        init: Option<NodeId>,
    ) -> DeclId {
        let name_span = self.find_word_in(span, name);
        self.push_decl(Decl::Var(VarDecl {
            name: name.to_string(),
            ty,
            span,
            name_span,
            storage,
            owner: self.current_fn,
            init,
            default_arg: None,
            is_const: false,
            is_inline: false,
            is_constexpr: false,
            has_constant_init: false,
            is_init_capture: false,
            attrs: Vec::new(),
        }))
    }

    /// Local variable; `decl_text` is searched from the current function on.
    pub fn local(&mut self, name: &str, ty: Type, decl_text: &str, init: Option<NodeId>) -> DeclId {
        let from = self
            .current_fn
            .and_then(|f| self.tree.function(f))
            .map(|f| f.span.start)
            .unwrap_or_default();
        let span = self.find_from(from, decl_text);
        self.declare_var(Storage::Local, name, ty, span, init)
    }

    pub fn global(&mut self, name: &str, ty: Type, decl_text: &str) -> DeclId {
        let span = self.find(decl_text);
        let saved = self.current_fn.take();
        let id = self.declare_var(Storage::Global, name, ty, span, None);
        self.current_fn = saved;
        id
    }

    /// Function whose header is the last occurrence of `header`. When the
    /// header is followed by `{`, the span extends over the body.
    pub fn function(&mut self, name: &str, header: &str) -> DeclId {
        let header_span = match self.file.text.rfind(header) {
            Some(start) => Span::new(start, start + header.len()),
            None => self.not_found(header),
        };
        let after = self.skip_ws_forward(header_span.end);
        let end = if self.file.text.as_bytes().get(after) == Some(&b'{') {
            self.matching_close(after, b'{', b'}')
                .unwrap_or(header_span.end)
        } else {
            header_span.end
        };
        let name_span = self.find_word_in(header_span, name);
        let id = self.push_decl(Decl::Function(FunctionDecl {
            name: name.to_string(),
            span: Span::new(header_span.start, end),
            name_span,
            kind: CallableKind::Function,
            return_ty: Type::Void,
            params: Vec::new(),
            body: None,
            is_function_try_block: false,
            ctor_inits: Vec::new(),
            redecls: Vec::new(),
            alloc_size: None,
            is_constexpr: false,
            is_template: false,
            is_variadic: false,
            is_overloaded_operator: false,
            is_extern_c: false,
            is_builtin: false,
            in_std: false,
            unsafe_buffer_usage: false,
            has_overloads: false,
            in_local_class: false,
        }));
        self.current_fn = Some(id);
        id
    }

    /// Declared-only function (libc and friends) with unnamed parameters.
    pub fn extern_function(&mut self, name: &str, params: Vec<Type>, return_ty: Type) -> DeclId {
        let saved = self.current_fn.take();
        let id = self.push_decl(Decl::Function(FunctionDecl {
            name: name.to_string(),
            span: Span::default(),
            name_span: Span::default(),
            kind: CallableKind::Function,
            return_ty,
            params: Vec::new(),
            body: None,
            is_function_try_block: false,
            ctor_inits: Vec::new(),
            redecls: Vec::new(),
            alloc_size: None,
            is_constexpr: false,
            is_template: false,
            is_variadic: false,
            is_overloaded_operator: false,
            is_extern_c: false,
            is_builtin: false,
            in_std: false,
            unsafe_buffer_usage: false,
            has_overloads: false,
            in_local_class: false,
        }));
        let param_ids: Vec<DeclId> = params
            .into_iter()
            .enumerate()
            .map(|(index, ty)| {
                self.push_decl(Decl::Var(VarDecl {
                    name: format!("arg{index}"),
                    ty,
                    span: Span::default(),
                    name_span: Span::default(),
                    storage: Storage::Parameter,
                    owner: Some(id),
                    init: None,
                    default_arg: None,
                    is_const: false,
                    is_inline: false,
                    is_constexpr: false,
                    has_constant_init: false,
                    is_init_capture: false,
                    attrs: Vec::new(),
                }))
            })
            .collect();
        if let Some(fun) = self.function_mut(id) {
            fun.params = param_ids;
        }
        self.current_fn = saved;
        id
    }

    /// Parameter of `fun` declared by `decl_text` inside the function header.
    pub fn param(&mut self, fun: DeclId, name: &str, ty: Type, decl_text: &str) -> DeclId {
        let fun_span = self
            .tree
            .function(fun)
            .map(|f| f.span)
            .unwrap_or_default();
        let span = self.find_in(fun_span, decl_text);
        let saved = self.current_fn.replace(fun);
        let id = self.declare_var(Storage::Parameter, name, ty, span, None);
        self.current_fn = saved;
        if let Some(f) = self.function_mut(fun) {
            f.params.push(id);
        }
        id
    }

    pub fn set_body(&mut self, fun: DeclId, body: NodeId) {
        if let Some(f) = self.function_mut(fun) {
            f.body = Some(body);
        }
    }

    /// Earlier non-defining declaration of `fun`: the first occurrence of
    /// `header`, excluding the trailing `;`.
    pub fn redecl(&mut self, fun: DeclId, header: &str) {
        let span = self.find(header);
        let params = self.split_params(span);
        if let Some(f) = self.function_mut(fun) {
            f.redecls.push(Redecl {
                span,
                params,
                unsafe_buffer_usage: false,
                is_extern_c: false,
            });
        }
    }

    fn split_params(&self, header: Span) -> Vec<ParamSite> {
        let text = self.file.slice(header);
        let Some(open) = text.find('(') else {
            return Vec::new();
        };
        let Some(close) = text.rfind(')') else {
            return Vec::new();
        };
        let mut sites = Vec::new();
        let mut depth = 0usize;
        let mut piece_start = open + 1;
        for (offset, ch) in text.char_indices().skip(open + 1) {
            match ch {
                '(' | '<' | '[' => depth += 1,
                ')' | '>' | ']' if offset < close => depth = depth.saturating_sub(1),
                _ => {}
            }
            if (ch == ',' && depth == 0) || offset == close {
                let raw = &text[piece_start..offset];
                let lead = raw.len() - raw.trim_start().len();
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    let start = header.start + piece_start + lead;
                    sites.push(ParamSite {
                        span: Span::new(start, start + trimmed.len()),
                        name: param_name(trimmed),
                    });
                }
                piece_start = offset + 1;
            }
        }
        sites
    }
}

/// Trailing identifier of a parameter declaration, if it names the parameter.
fn param_name(param: &str) -> Option<String> {
    let text = param.split('=').next().unwrap_or(param).trim_end();
    let bytes = text.as_bytes();
    let mut start = bytes.len();
    while start > 0 && is_ident_byte(bytes[start - 1]) {
        start -= 1;
    }
    let word = &text[start..];
    let head = text[..start].trim();
    if word.is_empty() || head.is_empty() || TYPE_KEYWORDS.contains(&word) {
        return None;
    }
    Some(word.to_string())
}
