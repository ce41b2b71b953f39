#![allow(dead_code)]

use safe_buffers::ast::{BinaryOp, DeclId, NodeId, RecordRef, TranslationUnit, TreeBuilder, Type, UnaryOp};
use safe_buffers::diagnostics::Diagnostic;

/// A translation unit with the function under test and the variables the
/// assertions talk about, in source order.
pub struct Scenario {
    pub tu: TranslationUnit,
    pub function: DeclId,
    pub vars: Vec<DeclId>,
    /// Nodes the assertions talk about, in source order.
    pub nodes: Vec<NodeId>,
}

pub const LOCAL_BUFFER: &str = "void f() {\n  int *p = new int[10];\n  int x = p[5];\n}\n";

/// `p` is a local initialized from `new int[10]` and read through `p[5]`.
pub fn local_buffer() -> Scenario {
    local_buffer_with(|_| {})
}

/// [`local_buffer`] with extra bookkeeping (macro ranges, opt-out regions)
/// applied before the tree is finished.
pub fn local_buffer_with(extra: impl FnOnce(&mut TreeBuilder)) -> Scenario {
    let mut b = TreeBuilder::with_path("local.cpp", LOCAL_BUFFER);
    let f = b.function("f", "void f()");
    let ten = b.int_lit_at("10");
    let alloc_span = b.find("new int[10]");
    let alloc = b.new_expr(Some(ten), Type::int(), alloc_span);
    let p = b.local("p", Type::pointer_to(Type::int()), "int *p = new int[10]", Some(alloc));
    let decl_p = b.decl_stmt(vec![p]);

    let p_ref = b.var_ref_at(p, "p", 1);
    let p_load = b.load(p_ref);
    let five = b.int_lit_at("5");
    let access = b.subscript(p_load, five);
    let read = b.load(access);
    let x = b.local("x", Type::int(), "int x = p[5]", Some(read));
    let decl_x = b.decl_stmt(vec![x]);

    let open = b.find("{");
    let body = b.block_at(vec![decl_p, decl_x], open);
    b.set_body(f, body);
    extra(&mut b);
    Scenario {
        tu: b.finish().expect("scenario builds"),
        function: f,
        vars: vec![p, x],
        nodes: vec![p_ref, access],
    }
}

pub const PARAM_BUFFER: &str = "void f(int *p) {\n  int x = p[5];\n}\n";

/// `p` is a parameter read through `p[5]`.
pub fn param_buffer() -> Scenario {
    let mut b = TreeBuilder::with_path("param.cpp", PARAM_BUFFER);
    let f = b.function("f", "void f(int *p)");
    let p = b.param(f, "p", Type::pointer_to(Type::int()), "int *p");
    let p_ref = b.var_ref_at(p, "p", 1);
    let p_load = b.load(p_ref);
    let five = b.int_lit_at("5");
    let access = b.subscript(p_load, five);
    let read = b.load(access);
    let x = b.local("x", Type::int(), "int x = p[5]", Some(read));
    let decl_x = b.decl_stmt(vec![x]);
    let open = b.find("{");
    let body = b.block_at(vec![decl_x], open);
    b.set_body(f, body);
    Scenario {
        tu: b.finish().expect("scenario builds"),
        function: f,
        vars: vec![p, x],
        nodes: vec![p_ref, access],
    }
}

pub const ASSIGNED_PAIR: &str =
    "void f() {\n  int *p = new int[10];\n  int *q = p;\n  p[1] = 0;\n  q[2] = 0;\n}\n";

/// `q` is initialized from `p` and both are indexed, so they share a group.
pub fn assigned_pair() -> Scenario {
    let mut b = TreeBuilder::with_path("pair.cpp", ASSIGNED_PAIR);
    let f = b.function("f", "void f()");
    let ten = b.int_lit_at("10");
    let alloc_span = b.find("new int[10]");
    let alloc = b.new_expr(Some(ten), Type::int(), alloc_span);
    let p = b.local("p", Type::pointer_to(Type::int()), "int *p = new int[10]", Some(alloc));
    let decl_p = b.decl_stmt(vec![p]);

    let p_init = b.var_ref_at(p, "p", 1);
    let p_init_load = b.load(p_init);
    let q = b.local("q", Type::pointer_to(Type::int()), "int *q = p", Some(p_init_load));
    let decl_q = b.decl_stmt(vec![q]);

    let p_ref = b.var_ref_at(p, "p", 2);
    let p_load = b.load(p_ref);
    let one = b.int_lit_at("1");
    let p_access = b.subscript(p_load, one);
    let zero = b.int_lit_nth("0", 0);
    let store_p = b.binary(BinaryOp::Assign, p_access, zero);

    let q_ref = b.var_ref_at(q, "q", 1);
    let q_load = b.load(q_ref);
    let two = b.int_lit_at("2");
    let q_access = b.subscript(q_load, two);
    let zero = b.int_lit_nth("0", 1);
    let store_q = b.binary(BinaryOp::Assign, q_access, zero);

    let open = b.find("{");
    let body = b.block_at(vec![decl_p, decl_q, store_p, store_q], open);
    b.set_body(f, body);
    Scenario {
        tu: b.finish().expect("scenario builds"),
        function: f,
        vars: vec![p, q],
        nodes: vec![p_access, q_access],
    }
}

pub const ARITHMETIC_ESCAPE: &str = "void f(int *p) {\n  int *q = p + 1;\n  int x = p[5];\n}\n";

/// `p` is indexed, but also used in arithmetic no fix understands.
pub fn arithmetic_escape() -> Scenario {
    let mut b = TreeBuilder::with_path("escape.cpp", ARITHMETIC_ESCAPE);
    let f = b.function("f", "void f(int *p)");
    let p = b.param(f, "p", Type::pointer_to(Type::int()), "int *p");

    let p_arith = b.var_ref_at(p, "p", 1);
    let p_arith_load = b.load(p_arith);
    let one = b.int_lit_at("1");
    let sum = b.binary(BinaryOp::Add, p_arith_load, one);
    let q = b.local("q", Type::pointer_to(Type::int()), "int *q = p + 1", Some(sum));
    let decl_q = b.decl_stmt(vec![q]);

    let p_ref = b.var_ref_at(p, "p", 2);
    let p_load = b.load(p_ref);
    let five = b.int_lit_at("5");
    let access = b.subscript(p_load, five);
    let read = b.load(access);
    let x = b.local("x", Type::int(), "int x = p[5]", Some(read));
    let decl_x = b.decl_stmt(vec![x]);

    let open = b.find("{");
    let body = b.block_at(vec![decl_q, decl_x], open);
    b.set_body(f, body);
    Scenario {
        tu: b.finish().expect("scenario builds"),
        function: f,
        vars: vec![p, q, x],
        nodes: vec![p_arith, sum, access],
    }
}

pub const LIBC_COPY: &str = "void f(char *d, const char *s) {\n  strcpy(d, s);\n}\n";

/// `strcpy(d, s)` inside a function.
pub fn libc_copy(extra: impl FnOnce(&mut TreeBuilder)) -> Scenario {
    let mut b = TreeBuilder::with_path("copy.cpp", LIBC_COPY);
    let strcpy = b.extern_function(
        "strcpy",
        vec![Type::pointer_to(Type::char()), Type::const_pointer_to(Type::char())],
        Type::pointer_to(Type::char()),
    );
    let f = b.function("f", "void f(char *d, const char *s)");
    let d = b.param(f, "d", Type::pointer_to(Type::char()), "char *d");
    let s = b.param(f, "s", Type::const_pointer_to(Type::char()), "const char *s");
    let d_ref = b.var_ref_at(d, "d", 1);
    let d_load = b.load(d_ref);
    let s_ref = b.var_ref_at(s, "s", 1);
    let s_load = b.load(s_ref);
    let call_span = b.find("strcpy(d, s)");
    let call = b.call(strcpy, vec![d_load, s_load], call_span);
    let open = b.find("{");
    let body = b.block_at(vec![call], open);
    b.set_body(f, body);
    extra(&mut b);
    Scenario {
        tu: b.finish().expect("scenario builds"),
        function: f,
        vars: vec![d, s],
        nodes: vec![call],
    }
}

pub const LOCAL_ARRAY: &str = "void f(int idx) {\n  int arr[10];\n  arr[idx] = 0;\n}\n";

/// `arr` is a fixed-size local array indexed by a parameter.
pub fn local_array() -> Scenario {
    indexed_array("array.cpp", LOCAL_ARRAY, "int arr[10]", 10, |_| {})
}

pub const SIZEOF_ARRAY: &str =
    "int g[4];\nvoid f(int idx) {\n  int arr[sizeof(g[0])];\n  arr[idx] = 0;\n}\n";

/// [`local_array`] whose size expression contains its own subscript.
pub fn sizeof_sized_array() -> Scenario {
    indexed_array("sizeof.cpp", SIZEOF_ARRAY, "int arr[sizeof(g[0])]", 4, |b| {
        b.global("g", Type::array_of(Type::int(), 4), "int g[4]");
    })
}

fn indexed_array(
    path: &str,
    source: &str,
    decl_text: &str,
    size: u64,
    globals: impl FnOnce(&mut TreeBuilder),
) -> Scenario {
    let mut b = TreeBuilder::with_path(path, source);
    globals(&mut b);
    let f = b.function("f", "void f(int idx)");
    let idx = b.param(f, "idx", Type::int(), "int idx");
    let arr = b.local("arr", Type::array_of(Type::int(), size), decl_text, None);
    let decl_arr = b.decl_stmt(vec![arr]);

    let arr_ref = b.var_ref_at(arr, "arr", 1);
    let arr_decay = b.decay(arr_ref);
    let idx_ref = b.var_ref_at(idx, "idx", 1);
    let idx_load = b.load(idx_ref);
    let access = b.subscript(arr_decay, idx_load);
    let store_span = b.find("arr[idx] = 0");
    let zero_span = b.find_in(store_span, "0");
    let zero = b.int_lit(0, zero_span);
    let store = b.binary(BinaryOp::Assign, access, zero);

    let open = b.find("{");
    let body = b.block_at(vec![decl_arr, store], open);
    b.set_body(f, body);
    Scenario {
        tu: b.finish().expect("scenario builds"),
        function: f,
        vars: vec![arr, idx],
        nodes: vec![arr_ref, access],
    }
}

pub const SPAN_FROM_POINTER: &str =
    "void f(int *p, unsigned n) {\n  std::span<int>{p, 0};\n  std::span<int>{p, n};\n}\n";

/// Two `std::span<int>{p, size}` constructions: an empty one and one sized
/// by an unrelated parameter.
pub fn span_from_pointer() -> Scenario {
    let mut b = TreeBuilder::with_path("span.cpp", SPAN_FROM_POINTER);
    let f = b.function("f", "void f(int *p, unsigned n)");
    let p = b.param(f, "p", Type::pointer_to(Type::int()), "int *p");
    let n = b.param(f, "n", Type::unsigned(), "unsigned n");

    let empty_span = b.find("std::span<int>{p, 0}");
    let p_first = b.var_ref_at(p, "p", 1);
    let p_first = b.load(p_first);
    let zero_span = b.find_in(empty_span, "0");
    let zero = b.int_lit(0, zero_span);
    let empty = b.construct(RecordRef::std("span"), vec![p_first, zero], empty_span, false);

    let sized_span = b.find("std::span<int>{p, n}");
    let p_second = b.var_ref_at(p, "p", 2);
    let p_second = b.load(p_second);
    let n_ref = b.var_ref_at(n, "n", 1);
    let n_load = b.load(n_ref);
    let sized = b.construct(RecordRef::std("span"), vec![p_second, n_load], sized_span, false);

    let open = b.find("{");
    let body = b.block_at(vec![empty, sized], open);
    b.set_body(f, body);
    Scenario {
        tu: b.finish().expect("scenario builds"),
        function: f,
        vars: vec![p, n],
        nodes: vec![empty, sized],
    }
}

pub const FORMATTED_WRITE: &str = "void f(char *buf, int n) {\n  sprintf(buf, \"%d\", n);\n}\n";

/// `sprintf(buf, "%d", n)` into a parameter buffer.
pub fn formatted_write() -> Scenario {
    let mut b = TreeBuilder::with_path("sprintf.cpp", FORMATTED_WRITE);
    let sprintf = b.extern_function(
        "sprintf",
        vec![Type::pointer_to(Type::char()), Type::const_pointer_to(Type::char())],
        Type::int(),
    );
    let f = b.function("f", "void f(char *buf, int n)");
    let buf = b.param(f, "buf", Type::pointer_to(Type::char()), "char *buf");
    let n = b.param(f, "n", Type::int(), "int n");
    let buf_ref = b.var_ref_at(buf, "buf", 1);
    let buf_load = b.load(buf_ref);
    let fmt = b.string_lit_at("\"%d\"");
    let fmt = b.decay(fmt);
    let n_ref = b.var_ref_at(n, "n", 1);
    let n_load = b.load(n_ref);
    let call_span = b.find("sprintf(buf, \"%d\", n)");
    let call = b.call(sprintf, vec![buf_load, fmt, n_load], call_span);
    let open = b.find("{");
    let body = b.block_at(vec![call], open);
    b.set_body(f, body);
    Scenario {
        tu: b.finish().expect("scenario builds"),
        function: f,
        vars: vec![buf, n],
        nodes: vec![call],
    }
}

pub const CLASHING_PAIR: &str = "void f() {\n  unsigned *p = new unsigned[10];\n  unsigned *q = p;\n  p += *q;\n  p[1] = 0;\n  q[2] = 0;\n}\n";

/// `p` and `q` share a group, and rewriting `p += *q` for `p` touches the
/// same text as rewriting `*q` for `q`.
pub fn clashing_pair() -> Scenario {
    let mut b = TreeBuilder::with_path("clash.cpp", CLASHING_PAIR);
    let f = b.function("f", "void f()");
    let ten = b.int_lit_at("10");
    let alloc_span = b.find("new unsigned[10]");
    let alloc = b.new_expr(Some(ten), Type::unsigned(), alloc_span);
    let p = b.local(
        "p",
        Type::pointer_to(Type::unsigned()),
        "unsigned *p = new unsigned[10]",
        Some(alloc),
    );
    let decl_p = b.decl_stmt(vec![p]);

    let p_init = b.var_ref_at(p, "p", 1);
    let p_init_load = b.load(p_init);
    let q = b.local("q", Type::pointer_to(Type::unsigned()), "unsigned *q = p", Some(p_init_load));
    let decl_q = b.decl_stmt(vec![q]);

    let p_bump = b.var_ref_at(p, "p", 2);
    let q_deref_ref = b.var_ref_at(q, "q", 1);
    let q_deref_load = b.load(q_deref_ref);
    let deref = b.unary(UnaryOp::Deref, q_deref_load);
    let offset = b.load(deref);
    let bump = b.binary(BinaryOp::AddAssign, p_bump, offset);

    let p_ref = b.var_ref_at(p, "p", 3);
    let p_load = b.load(p_ref);
    let one = b.int_lit_at("1");
    let p_access = b.subscript(p_load, one);
    let zero = b.int_lit_nth("0", 0);
    let store_p = b.binary(BinaryOp::Assign, p_access, zero);

    let q_ref = b.var_ref_at(q, "q", 2);
    let q_load = b.load(q_ref);
    let two = b.int_lit_at("2");
    let q_access = b.subscript(q_load, two);
    let zero = b.int_lit_nth("0", 1);
    let store_q = b.binary(BinaryOp::Assign, q_access, zero);

    let open = b.find("{");
    let body = b.block_at(vec![decl_p, decl_q, bump, store_p, store_q], open);
    b.set_body(f, body);
    Scenario {
        tu: b.finish().expect("scenario builds"),
        function: f,
        vars: vec![p, q],
        nodes: vec![bump, p_access, q_access],
    }
}

pub const INDEXED_THEN_COPIED: &str =
    "void f(int *p, char *d, const char *s) {\n  p[5] = 0;\n  strcpy(d, s);\n}\n";

/// A parameter indexed before an unrelated `strcpy`.
pub fn indexed_then_copied() -> Scenario {
    let mut b = TreeBuilder::with_path("order.cpp", INDEXED_THEN_COPIED);
    let strcpy = b.extern_function(
        "strcpy",
        vec![Type::pointer_to(Type::char()), Type::const_pointer_to(Type::char())],
        Type::pointer_to(Type::char()),
    );
    let f = b.function("f", "void f(int *p, char *d, const char *s)");
    let p = b.param(f, "p", Type::pointer_to(Type::int()), "int *p");
    let d = b.param(f, "d", Type::pointer_to(Type::char()), "char *d");
    let s = b.param(f, "s", Type::const_pointer_to(Type::char()), "const char *s");

    let p_ref = b.var_ref_at(p, "p", 1);
    let p_load = b.load(p_ref);
    let five = b.int_lit_at("5");
    let access = b.subscript(p_load, five);
    let zero = b.int_lit_at("0");
    let store = b.binary(BinaryOp::Assign, access, zero);

    let d_ref = b.var_ref_at(d, "d", 1);
    let d_load = b.load(d_ref);
    let s_ref = b.var_ref_at(s, "s", 1);
    let s_load = b.load(s_ref);
    let call_span = b.find("strcpy(d, s)");
    let call = b.call(strcpy, vec![d_load, s_load], call_span);

    let open = b.find("{");
    let body = b.block_at(vec![store, call], open);
    b.set_body(f, body);
    Scenario {
        tu: b.finish().expect("scenario builds"),
        function: f,
        vars: vec![p, d, s],
        nodes: vec![access, call],
    }
}

/// One line per diagnostic and note: `row:col: level: category: message`.
pub fn render(diagnostics: &[Diagnostic]) -> String {
    let mut lines = Vec::new();
    for diag in diagnostics {
        lines.push(format!(
            "{}:{}: {}: {}: {}",
            diag.location.row,
            diag.location.column,
            diag.level.as_str(),
            diag.category.as_str(),
            diag.message
        ));
        for note in &diag.notes {
            lines.push(format!(
                "  {}:{}: note: {}",
                note.location.row, note.location.column, note.message
            ));
        }
    }
    lines.join("\n")
}
