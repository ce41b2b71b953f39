//! The callback surface findings are reported through, and the bundled
//! implementation that turns them into [`Diagnostic`]s.

use crate::ast::{BinaryOp, DeclId, NodeId, NodeKind, Span, TranslationUnit, UnaryOp};
use crate::category::{FindingCategory, ReportSettings};
use crate::debug_note;
use crate::diagnostics::{Applicability, Diagnostic, Note, Position, Suggestion};
use crate::fix::TextEdit;
use crate::grouping::VariableGroups;
use crate::level::LintLevel;
use crate::libc::LibcCallKind;
use crate::strategy::{FixitStrategy, StrategyKind};

pub const UNSAFE_BUFFER_USAGE_ATTRIBUTE: &str = "[[clang::unsafe_buffer_usage]]";

/// Receives the findings of one analysis run and answers the policy
/// questions the analysis asks while matching.
pub trait UnsafeBufferUsageHandler {
    /// An unsafe operation. With `is_related_to_decl` it explains the
    /// variable finding reported just before it.
    fn handle_unsafe_operation(&mut self, node: NodeId, is_related_to_decl: bool);

    /// An unsafe construction of a bounds-carrying container.
    fn handle_unsafe_operation_in_container(&mut self, node: NodeId, is_related_to_decl: bool);

    fn handle_unsafe_libc_call(&mut self, call: NodeId, kind: LibcCallKind, unsafe_arg: Option<NodeId>);

    /// A variable used as an unchecked buffer, with the edits rewriting its
    /// whole group (empty when no fix is offered).
    fn handle_unsafe_variable_group(
        &mut self,
        var: DeclId,
        groups: &VariableGroups,
        edits: Vec<TextEdit>,
        function: DeclId,
        strategy: &FixitStrategy,
    );

    /// Whether `offset` lies in a region where findings are switched off.
    fn is_safe_buffer_opt_out(&self, offset: usize) -> bool;

    fn ignore_unsafe_buffer_in_container(&self, offset: usize) -> bool;

    fn ignore_unsafe_buffer_in_libc_call(&self, offset: usize) -> bool;

    /// Attribute spelling to insert at `offset`, followed by `suffix`.
    fn unsafe_buffer_usage_attribute_text(&self, _offset: usize, suffix: &str) -> String {
        format!("{UNSAFE_BUFFER_USAGE_ATTRIBUTE}{suffix}")
    }

    /// Why a fix for `var` was withheld.
    fn add_debug_note_for_var(&mut self, var: DeclId, offset: usize, note: &str) {
        debug_note!("var {:?} at byte {}: {}", var, offset, note);
    }
}

/// `'a'`, `'a' and 'b'`, `'a', 'b', and 'c'`: the other members of `group`.
pub fn list_variable_group(tu: &TranslationUnit, var: DeclId, group: &[DeclId]) -> String {
    let names: Vec<String> = group
        .iter()
        .filter(|&&mate| mate != var)
        .filter_map(|&mate| tu.tree.var(mate))
        .map(|mate| format!("'{}'", mate.name))
        .collect();
    match names.as_slice() {
        [] => String::new(),
        [one] => one.clone(),
        [first, second] => format!("{first} and {second}"),
        [init @ .., second_last, last] => {
            let mut listed = String::new();
            for name in init {
                listed.push_str(name);
                listed.push_str(", ");
            }
            listed.push_str(&format!("{second_last}, and {last}"));
            listed
        }
    }
}

/// Collects findings for one translation unit as [`Diagnostic`]s.
pub struct DiagnosticCollector<'a> {
    tu: &'a TranslationUnit,
    settings: &'a ReportSettings,
    diagnostics: Vec<Diagnostic>,
    /// Variable finding that related operations attach their notes to.
    current_variable: Option<usize>,
}

impl<'a> DiagnosticCollector<'a> {
    pub fn new(tu: &'a TranslationUnit, settings: &'a ReportSettings) -> Self {
        Self {
            tu,
            settings,
            diagnostics: Vec::new(),
            current_variable: None,
        }
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    fn push(&mut self, category: FindingCategory, span: Span, message: String) -> Option<usize> {
        let level = self.settings.level_for(category);
        if level == LintLevel::Allow {
            return None;
        }
        self.diagnostics.push(Diagnostic {
            category,
            level,
            file: self.tu.file.path.clone(),
            span,
            location: Position::at(&self.tu.file, span.start),
            message,
            notes: Vec::new(),
            suggestion: None,
        });
        Some(self.diagnostics.len() - 1)
    }

    fn note(&mut self, index: usize, span: Span, message: impl Into<String>) {
        let note = Note::new(&self.tu.file, span, message);
        if let Some(diagnostic) = self.diagnostics.get_mut(index) {
            diagnostic.notes.push(note);
        }
    }

    /// Where to point at and which noun to use for an unsafe operation.
    fn describe_operation(&self, node: NodeId) -> (Span, OperationKind) {
        let tree = &self.tu.tree;
        match tree.kind(node) {
            Some(NodeKind::Subscript { base, .. }) => (tree.span(*base), OperationKind::BufferAccess),
            Some(NodeKind::Binary { op, lhs, rhs, .. })
                if matches!(
                    op,
                    BinaryOp::Add | BinaryOp::AddAssign | BinaryOp::Sub | BinaryOp::SubAssign
                ) =>
            {
                let blamed = if tree.ty(*rhs).is_integer() || tree.ty(*rhs).is_enum() {
                    *lhs
                } else {
                    *rhs
                };
                (tree.span(blamed), OperationKind::PointerArithmetic)
            }
            Some(NodeKind::Unary { op, operand, .. })
                if matches!(
                    op,
                    UnaryOp::PreInc | UnaryOp::PreDec | UnaryOp::PostInc | UnaryOp::PostDec
                ) =>
            {
                (tree.span(*operand), OperationKind::PointerArithmetic)
            }
            Some(NodeKind::Call { .. } | NodeKind::MemberCall { .. } | NodeKind::Construct { .. }) => {
                (tree.span(node), OperationKind::UnsafeFunction)
            }
            Some(NodeKind::Member { field, .. }) => {
                (tree.span(node), OperationKind::UnsafeField(field.clone()))
            }
            Some(NodeKind::ExplicitCast { .. }) => (tree.span(node), OperationKind::DataInvocation),
            _ => (tree.span(node), OperationKind::Other),
        }
    }
}

enum OperationKind {
    Other,
    PointerArithmetic,
    BufferAccess,
    UnsafeFunction,
    DataInvocation,
    UnsafeField(String),
}

impl OperationKind {
    fn warning(&self) -> String {
        match self {
            OperationKind::Other => "unsafe pointer operation".to_string(),
            OperationKind::PointerArithmetic => "unsafe pointer arithmetic".to_string(),
            OperationKind::BufferAccess => "unsafe buffer access".to_string(),
            OperationKind::UnsafeFunction => "function introduces unsafe buffer manipulation".to_string(),
            OperationKind::DataInvocation => "unsafe invocation of 'data'".to_string(),
            OperationKind::UnsafeField(field) => {
                format!("field '{field}' prone to unsafe buffer manipulation")
            }
        }
    }

    fn related_note(&self) -> &'static str {
        match self {
            OperationKind::PointerArithmetic => "used in pointer arithmetic here",
            OperationKind::BufferAccess => "used in buffer access here",
            _ => "used here",
        }
    }
}

const CONTAINER_MESSAGE: &str = "the two-parameter std::span construction is unsafe as it can \
                                 introduce mismatch between buffer size and the bound information";

impl UnsafeBufferUsageHandler for DiagnosticCollector<'_> {
    fn handle_unsafe_operation(&mut self, node: NodeId, is_related_to_decl: bool) {
        let (span, kind) = self.describe_operation(node);
        match self.current_variable {
            Some(index) if is_related_to_decl => self.note(index, span, kind.related_note()),
            _ => {
                self.push(FindingCategory::UnsafeOperation, span, kind.warning());
            }
        }
    }

    fn handle_unsafe_operation_in_container(&mut self, node: NodeId, is_related_to_decl: bool) {
        let span = self.tu.tree.span(node);
        self.push(FindingCategory::UnsafeContainer, span, CONTAINER_MESSAGE.to_string());
        if let (true, Some(index)) = (is_related_to_decl, self.current_variable) {
            self.note(index, span, OperationKind::BufferAccess.related_note());
        }
    }

    fn handle_unsafe_libc_call(&mut self, call: NodeId, kind: LibcCallKind, unsafe_arg: Option<NodeId>) {
        let tree = &self.tu.tree;
        let callee = match tree.kind(call) {
            Some(NodeKind::Call {
                callee: Some(callee), ..
            }) => tree.function(*callee).map(|fun| fun.name.clone()),
            _ => None,
        }
        .unwrap_or_default();
        let span = tree.span(call);
        let note_span = unsafe_arg.map(|arg| tree.span(arg)).unwrap_or(span);
        let Some(index) = self.push(
            FindingCategory::UnsafeLibcCall,
            span,
            format!("function '{callee}' is unsafe"),
        ) else {
            return;
        };
        if let Some(note) = kind.note() {
            self.note(index, note_span, note);
        }
    }

    fn handle_unsafe_variable_group(
        &mut self,
        var: DeclId,
        groups: &VariableGroups,
        edits: Vec<TextEdit>,
        function: DeclId,
        strategy: &FixitStrategy,
    ) {
        self.current_variable = None;
        let Some(decl) = self.tu.tree.var(var) else {
            return;
        };
        let message = if decl.ty.is_pointer() {
            format!("'{}' is an unsafe pointer used for buffer access", decl.name)
        } else {
            format!("'{}' is an unsafe buffer that does not perform bounds checks", decl.name)
        };
        let Some(index) = self.push(FindingCategory::UnsafeVariable, decl.name_span, message) else {
            return;
        };
        self.current_variable = Some(index);
        if edits.is_empty() {
            return;
        }

        let (group, in_params) = groups.group_of_var(var);
        let kind = strategy.lookup(var);
        let mut note = format!("change type of '{}' to '{}' ", decl.name, kind.type_name());
        note.push_str(match kind {
            StrategyKind::Array => "to label it for hardening",
            _ => "to preserve bounds information",
        });
        if group.len() > 1 {
            let mates = list_variable_group(self.tu, var, group);
            if in_params {
                let function_name = self
                    .tu
                    .tree
                    .function(function)
                    .map(|fun| fun.name.as_str())
                    .unwrap_or_default();
                note.push_str(&format!(
                    ", and change {mates} to safe types to make function '{function_name}' bounds-safe"
                ));
            } else {
                note.push_str(&format!(
                    ", and change {mates} to '{}' to propagate bounds information between them",
                    kind.type_name()
                ));
            }
        }

        let applicability = Applicability::of(&edits);
        if let Some(diagnostic) = self.diagnostics.get_mut(index) {
            diagnostic.suggestion = Some(Suggestion {
                message: note.clone(),
                edits,
                applicability,
            });
        }
        self.note(index, decl.name_span, note);
    }

    fn is_safe_buffer_opt_out(&self, offset: usize) -> bool {
        self.tu.file.in_opt_out_region(Span::at(offset))
    }

    fn ignore_unsafe_buffer_in_container(&self, _offset: usize) -> bool {
        self.settings.level_for(FindingCategory::UnsafeContainer).is_allowed()
    }

    fn ignore_unsafe_buffer_in_libc_call(&self, _offset: usize) -> bool {
        self.settings.level_for(FindingCategory::UnsafeLibcCall).is_allowed()
    }
}
