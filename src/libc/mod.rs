//! Classification of calls to C library functions without a bounds contract.

pub mod format;

use serde::Serialize;

use crate::ast::{FunctionDecl, NodeId, NodeKind, SyntaxTree};
use crate::oracle::{is_null_terminated, ptr_buffer_fits_constant, ptr_buffer_is_safe};
use format::{Precision, parse_printf};

/// Sorted for binary search.
static PREDEFINED_UNSAFE: &[&str] = &[
    "atof", "atoi", "atol", "atoll", "bcopy", "bsearch", "bzero", "fgets", "fgetws", "fputs",
    "fputws", "fread", "fwrite", "gets", "memccpy", "memchr", "memcmp", "memcpy", "memmove",
    "mempcpy", "memset", "puts", "qsort", "strcasecmp", "strcat", "strchr", "strcmp", "strcoll",
    "strcpy", "strcspn", "strdup", "strerror_r", "strerror_s", "stricmp", "strlcat", "strlcpy",
    "strlen", "strncat", "strncmp", "strncpy", "strndup", "strnlen", "strpbrk", "strrchr",
    "strspn", "strstr", "strtod", "strtof", "strtoimax", "strtok", "strtol", "strtold",
    "strtoll", "strtoul", "strtoull", "strtoumax", "strxfrm", "wmemchr", "wmemcmp", "wmemcpy",
    "wmemmove", "wmemset",
];

/// Why a library call was reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LibcCallKind {
    /// The callee is unsafe whatever its arguments.
    Others = 0,
    /// `sprintf` family; the bounded `snprintf` variant should be used.
    Sprintf = 1,
    /// The buffer and size arguments of an `snprintf` call may not match.
    SizedBy = 2,
    /// A string argument is not guaranteed to be null-terminated.
    String = 3,
    /// `v*printf` taking a `va_list`, which cannot be checked.
    VaList = 4,
}

impl LibcCallKind {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn note(self) -> Option<&'static str> {
        match self {
            LibcCallKind::Others => None,
            LibcCallKind::Sprintf => Some("change to 'snprintf' for explicit bounds checking"),
            LibcCallKind::SizedBy => Some("buffer pointer and size may not match"),
            LibcCallKind::String => Some("string argument is not guaranteed to be null-terminated"),
            LibcCallKind::VaList => Some("'va_list' is unsafe"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnsafeLibcCall {
    pub kind: LibcCallKind,
    pub unsafe_arg: Option<NodeId>,
}

/// Strips `__builtin_` (builtins only), `__builtin___X_chk`, `__asan_` and
/// a trailing `_s` from a callee name.
pub fn core_name(name: &str, is_builtin: bool) -> &str {
    if is_builtin {
        if let Some(rest) = name.strip_prefix("__builtin_") {
            let unchecked = rest
                .strip_prefix("__")
                .and_then(|inner| inner.strip_suffix("_chk"))
                .unwrap_or(rest);
            return strip_secure_suffix(unchecked);
        }
    }
    if let Some(rest) = name.strip_prefix("__asan_") {
        return strip_secure_suffix(rest);
    }
    strip_secure_suffix(name)
}

fn strip_secure_suffix(name: &str) -> &str {
    name.strip_suffix("_s").unwrap_or(name)
}

fn fn_core_name(fun: &FunctionDecl) -> &str {
    core_name(&fun.name, fun.is_builtin)
}

fn is_predefined(name: &str) -> bool {
    PREDEFINED_UNSAFE.binary_search(&name).is_ok()
}

/// Listed string/memory/IO function (directly or as its `wcs` spelling), or
/// any `scanf` variant.
pub fn is_predefined_unsafe(fun: &FunctionDecl) -> bool {
    let name = fn_core_name(fun);
    if is_predefined(name) {
        return true;
    }
    if name.contains("wcs") && is_predefined(&name.replace("wcs", "str")) {
        return true;
    }
    name.ends_with("scanf")
}

pub fn is_va_list_printf(fun: &FunctionDecl) -> bool {
    let name = fn_core_name(fun);
    name.ends_with("printf") && name.starts_with('v')
}

/// Part of a printf-family name before `printf`, with a wide `w` dropped.
fn printf_prefix(name: &str) -> Option<&str> {
    if name.starts_with('v') {
        return None;
    }
    let prefix = name.strip_suffix("printf")?;
    Some(prefix.strip_suffix('w').unwrap_or(prefix))
}

pub fn is_sprintf(fun: &FunctionDecl) -> bool {
    printf_prefix(fn_core_name(fun)) == Some("s")
}

/// `printf`, `kprintf`, `fprintf`, `snprintf` and their wide versions.
pub fn is_normal_printf(fun: &FunctionDecl) -> bool {
    matches!(
        printf_prefix(fn_core_name(fun)),
        Some("" | "k" | "f" | "sn")
    )
}

fn param_types<'t>(tree: &'t SyntaxTree, fun: &FunctionDecl) -> Vec<&'t crate::ast::Type> {
    fun.params
        .iter()
        .filter_map(|p| tree.var(*p).map(|v| &v.ty))
        .collect()
}

/// First pointer argument that is not null-terminated.
fn first_unterminated_pointer(tree: &SyntaxTree, args: &[NodeId]) -> Option<NodeId> {
    args.iter()
        .copied()
        .find(|&arg| tree.ty(arg).is_pointer() && !is_null_terminated(tree, arg))
}

/// The `%s` argument (or, for a non-literal format, any pointer argument)
/// that is not provably null-terminated or precision-bounded.
fn unsafe_format_or_string_arg(
    tree: &SyntaxTree,
    args: &[NodeId],
    fmt_index: usize,
    is_kprintf: bool,
) -> Option<NodeId> {
    let fmt = *args.get(fmt_index)?;
    let literal = match tree.kind(tree.ignore_paren_imp_casts(fmt)) {
        Some(NodeKind::StringLiteral { value }) => value.clone(),
        _ => return first_unterminated_pointer(tree, &args[fmt_index..]),
    };

    for spec in parse_printf(&literal, is_kprintf).into_iter().filter(|s| s.is_string()) {
        let arg_index = spec.arg_index + 1 + fmt_index;
        let Some(&arg) = args.get(arg_index) else {
            continue;
        };
        if is_null_terminated(tree, arg) {
            continue;
        }
        let arg_ty = tree.ty(arg);
        let is_char_pointer = arg_ty.pointee().is_some_and(|pointee| {
            if spec.wide {
                pointee.is_wide_char()
            } else {
                pointee.is_char()
            }
        });
        let bounded = is_char_pointer
            && match spec.precision {
                Precision::NotSpecified => false,
                Precision::Constant(amount) => {
                    ptr_buffer_fits_constant(tree, arg, i128::from(amount))
                }
                Precision::DataArg(index) => match args.get(index + 1 + fmt_index) {
                    Some(&precision_arg) => {
                        ptr_buffer_is_safe(tree, arg, strip_int_cast(tree, precision_arg))
                    }
                    None => false,
                },
            };
        if !bounded {
            return Some(arg);
        }
    }
    None
}

/// `(int)n` as a precision argument stands for `n`.
fn strip_int_cast(tree: &SyntaxTree, arg: NodeId) -> NodeId {
    match tree.kind(arg) {
        Some(NodeKind::ImplicitCast { inner, .. } | NodeKind::ExplicitCast { inner, .. })
            if tree.ty(arg).is_signed_integer() =>
        {
            *inner
        }
        _ => arg,
    }
}

/// Finds the unsafe string argument of a normal printf call, recognizing the
/// variant by the callee's parameter shape.
pub fn unsafe_printf_string_arg(
    tree: &SyntaxTree,
    fun: &FunctionDecl,
    args: &[NodeId],
) -> Option<NodeId> {
    let params = param_types(tree, fun);
    let first = params.first()?;
    let first_pointee = first.pointee()?;

    if first_pointee.is_file_record() {
        return unsafe_format_or_string_arg(tree, args, 1, false);
    }
    if first.pointee_is_const() {
        return unsafe_format_or_string_arg(tree, args, 0, fun.name == "kprintf");
    }
    if params.len() > 2 && params[1].is_integer() {
        return unsafe_format_or_string_arg(tree, args, 2, false);
    }
    first_unterminated_pointer(tree, args)
}

/// `snprintf(buf, size, ...)` whose buffer and size are not a known-safe pair.
pub fn has_unsafe_snprintf_buffer(tree: &SyntaxTree, fun: &FunctionDecl, args: &[NodeId]) -> bool {
    let params = param_types(tree, fun);
    if params.len() < 3 {
        return false;
    }
    let first = params[0];
    let Some(first_pointee) = first.pointee() else {
        return false;
    };
    let (Some(&buf), Some(&size)) = (args.first(), args.get(1)) else {
        return false;
    };
    if first.pointee_is_const()
        || !first_pointee.is_any_char()
        || !tree.ty(buf).is_pointer()
        || !tree.ty(size).is_unsigned_integer()
    {
        return false;
    }
    !ptr_buffer_is_safe(tree, buf, size)
}

/// Classifies a call node. `None` when the call is not an unsafe library call.
pub fn classify_call(tree: &SyntaxTree, call: NodeId) -> Option<UnsafeLibcCall> {
    let Some(NodeKind::Call {
        callee: Some(callee),
        args,
        ..
    }) = tree.kind(call)
    else {
        return None;
    };
    let fun = tree.function(*callee)?;

    let single_string_literal = args.len() == 1
        && matches!(
            tree.kind(tree.ignore_paren_imp_casts(args[0])),
            Some(NodeKind::StringLiteral { .. })
        );

    if !single_string_literal {
        let kind = if is_predefined_unsafe(fun) {
            Some(LibcCallKind::Others)
        } else if is_va_list_printf(fun) {
            Some(LibcCallKind::VaList)
        } else if is_sprintf(fun) {
            Some(LibcCallKind::Sprintf)
        } else {
            None
        };
        if let Some(kind) = kind {
            return Some(UnsafeLibcCall {
                kind,
                unsafe_arg: None,
            });
        }
    }

    if is_normal_printf(fun) {
        if has_unsafe_snprintf_buffer(tree, fun, args) {
            return Some(UnsafeLibcCall {
                kind: LibcCallKind::SizedBy,
                unsafe_arg: args.first().copied(),
            });
        }
        if let Some(arg) = unsafe_printf_string_arg(tree, fun, args) {
            return Some(UnsafeLibcCall {
                kind: LibcCallKind::String,
                unsafe_arg: Some(arg),
            });
        }
    }
    None
}
