//! Emitter integration tests: compile hand-built ASTs and execute them on
//! the VM, checking both the emitted shape and the observable results.

use cobble_bytecode::{Executable, Op, Value};
use cobble_interop::HostRegistry;
use cobble_types::ast::*;
use cobble_types::{DiagCode, DiagnosticSink, Span, TargetDesc};
use cobble_vm::Vm;

// ── AST construction helpers ─────────────────────────────────────────────────

fn sp() -> Span {
    Span::point(1, 1)
}

fn id(name: &str) -> Ident {
    Ident::new(name, sp())
}

fn tn(name: &str) -> TypeName {
    TypeName::new(name, 0, sp())
}

fn tnp(name: &str, depth: u32) -> TypeName {
    TypeName::new(name, depth, sp())
}

fn int(v: i64) -> Expr {
    Expr::int(v, sp())
}

fn var(name: &str) -> Expr {
    Expr::ident(name, sp())
}

fn bin(op: BinaryOp, l: Expr, r: Expr) -> Expr {
    Expr::binary(op, l, r, sp())
}

fn un(op: UnaryOp, e: Expr) -> Expr {
    Expr::unary(op, e, sp())
}

fn assign(target: Expr, value: Expr) -> Expr {
    Expr::assign(target, value, sp())
}

fn compound(op: BinaryOp, target: Expr, value: Expr) -> Expr {
    Expr::new(
        ExprKind::Assign {
            op: Some(op),
            target: Box::new(target),
            value: Box::new(value),
        },
        sp(),
    )
}

fn call(name: &str, args: Vec<Expr>) -> Expr {
    Expr::call(name, args, sp())
}

fn block(stmts: Vec<Stmt>) -> Block {
    Block { stmts, span: sp() }
}

fn ret(value: Option<Expr>) -> Stmt {
    Stmt::Return(ReturnStmt {
        value,
        span: sp(),
    })
}

fn decl_stmt(ty: &str, name: &str, init: Option<Expr>) -> Stmt {
    Stmt::Var(VarDecl {
        ty: tn(ty),
        name: id(name),
        array: ArraySuffix::None,
        init,
        span: sp(),
    })
}

fn global(ty: &str, name: &str, init: Option<Expr>) -> Decl {
    Decl::Var(VarDecl {
        ty: tn(ty),
        name: id(name),
        array: ArraySuffix::None,
        init,
        span: sp(),
    })
}

fn func(ret_ty: &str, name: &str, params: Vec<(&str, &str)>, body: Vec<Stmt>) -> Decl {
    Decl::Func(FuncDecl {
        ret: tn(ret_ty),
        name: id(name),
        params: params
            .into_iter()
            .map(|(t, n)| ParamDecl {
                ty: tn(t),
                name: id(n),
                default: None,
                span: sp(),
            })
            .collect(),
        body: Some(block(body)),
        span: sp(),
    })
}

fn unit(decls: Vec<Decl>) -> Unit {
    Unit { decls, span: sp() }
}

// ── Compile & run helpers ────────────────────────────────────────────────────

fn compile_clean(unit: &Unit) -> Executable {
    let registry = HostRegistry::new(TargetDesc::lp64());
    let mut sink = DiagnosticSink::new();
    let exe = cobble_emit::compile(unit, TargetDesc::lp64(), &registry, &mut sink).unwrap();
    assert!(
        !sink.has_errors(),
        "unexpected diagnostics: {:?}",
        sink.diagnostics()
    );
    exe
}

/// Compile, run `main`, and return the named globals' first cells.
fn run_main(unit: &Unit, globals: &[&str]) -> Vec<Value> {
    let exe = compile_clean(unit);
    let registry = HostRegistry::new(TargetDesc::lp64());
    let mut vm = Vm::new(&exe, &registry);
    vm.reset("main").unwrap();
    vm.run().unwrap();
    globals
        .iter()
        .map(|n| vm.global_cells(n).expect("global exists")[0])
        .collect()
}

// ── Constant folding & labels ────────────────────────────────────────────────

#[test]
fn test_global_init_folds_to_one_const() {
    let u = unit(vec![
        global(
            "int",
            "x",
            Some(bin(
                BinaryOp::Sub,
                bin(
                    BinaryOp::Mul,
                    bin(BinaryOp::Add, int(7), int(5)),
                    int(2),
                ),
                int(3),
            )),
        ),
        func("void", "main", vec![], vec![]),
    ]);
    let exe = compile_clean(&u);
    // (7 + 5) * 2 - 3 folded at compile time: a single constant load.
    assert!(exe
        .code
        .iter()
        .any(|op| matches!(op, Op::Const(v) if v.as_i32() == 21)));
    assert!(!exe.code.iter().any(|op| matches!(
        op,
        Op::Add(_) | Op::Mul(_) | Op::Sub(_)
    )));
}

#[test]
fn test_no_branch_left_unresolved() {
    let u = unit(vec![
        global("int", "x", None),
        func(
            "void",
            "main",
            vec![],
            vec![
                decl_stmt("int", "i", Some(int(0))),
                Stmt::While(WhileStmt {
                    cond: bin(BinaryOp::Lt, var("i"), int(3)),
                    body: Box::new(Stmt::Block(block(vec![
                        Stmt::If(IfStmt {
                            cond: bin(BinaryOp::Eq, var("i"), int(1)),
                            then_branch: Box::new(Stmt::Expr(compound(
                                BinaryOp::Add,
                                var("x"),
                                int(10),
                            ))),
                            else_branch: Some(Box::new(Stmt::Expr(compound(
                                BinaryOp::Add,
                                var("x"),
                                int(1),
                            )))),
                            span: sp(),
                        }),
                        Stmt::Expr(compound(BinaryOp::Add, var("i"), int(1))),
                    ]))),
                    span: sp(),
                }),
            ],
        ),
    ]);
    let exe = compile_clean(&u);
    // Every forward branch was patched to a real instruction offset.
    for op in &exe.code {
        let target = match op {
            Op::Jump(t)
            | Op::BranchZero(t)
            | Op::BranchNonZero(t)
            | Op::BranchZeroPeek(t)
            | Op::BranchNonZeroPeek(t) => *t,
            _ => continue,
        };
        assert!(
            (target as usize) <= exe.code.len(),
            "unpatched branch target {target:#x}"
        );
    }
}

#[test]
fn test_fold_and_runtime_agree_at_every_integer_width() {
    // (200 + 100) * 2 - 3 wraps differently at each narrow width; the
    // folded global and the runtime-computed global must match bit for
    // bit.
    for ty in [
        "char",
        "unsigned char",
        "short",
        "unsigned short",
        "int",
        "unsigned int",
        "long",
        "unsigned long",
        "long long",
        "unsigned long long",
    ] {
        let folded_expr = bin(
            BinaryOp::Sub,
            bin(
                BinaryOp::Mul,
                bin(BinaryOp::Add, int(200), int(100)),
                int(2),
            ),
            int(3),
        );
        let runtime_expr = bin(
            BinaryOp::Sub,
            bin(
                BinaryOp::Mul,
                bin(BinaryOp::Add, var("seed"), int(100)),
                int(2),
            ),
            int(3),
        );
        let u = unit(vec![
            global(ty, "a", Some(folded_expr)),
            global(ty, "b", None),
            func(
                "void",
                "main",
                vec![],
                vec![
                    decl_stmt("int", "seed", Some(int(200))),
                    Stmt::Expr(assign(var("b"), runtime_expr)),
                ],
            ),
        ]);
        let cells = run_main(&u, &["a", "b"]);
        assert_eq!(
            cells[0].raw(),
            cells[1].raw(),
            "fold/runtime divergence for {ty}"
        );
    }
}

// ── Control flow ─────────────────────────────────────────────────────────────

#[test]
fn test_while_loop_accumulates() {
    let u = unit(vec![
        global("int", "s", None),
        func(
            "void",
            "main",
            vec![],
            vec![
                decl_stmt("int", "i", Some(int(0))),
                Stmt::While(WhileStmt {
                    cond: bin(BinaryOp::Lt, var("i"), int(5)),
                    body: Box::new(Stmt::Block(block(vec![
                        Stmt::Expr(compound(BinaryOp::Add, var("s"), var("i"))),
                        Stmt::Expr(compound(BinaryOp::Add, var("i"), int(1))),
                    ]))),
                    span: sp(),
                }),
            ],
        ),
    ]);
    assert_eq!(run_main(&u, &["s"])[0].as_i32(), 10);
}

#[test]
fn test_for_with_break_and_continue() {
    // Sum odd numbers below 10, stopping at 7: 1 + 3 + 5 + 7 = 16.
    let u = unit(vec![
        global("int", "s", None),
        func(
            "void",
            "main",
            vec![],
            vec![Stmt::For(ForStmt {
                init: Some(Box::new(decl_stmt("int", "i", Some(int(0))))),
                cond: Some(bin(BinaryOp::Lt, var("i"), int(10))),
                step: Some(compound(BinaryOp::Add, var("i"), int(1))),
                body: Box::new(Stmt::Block(block(vec![
                    Stmt::If(IfStmt {
                        cond: bin(
                            BinaryOp::Eq,
                            bin(BinaryOp::Rem, var("i"), int(2)),
                            int(0),
                        ),
                        then_branch: Box::new(Stmt::Continue(sp())),
                        else_branch: None,
                        span: sp(),
                    }),
                    Stmt::Expr(compound(BinaryOp::Add, var("s"), var("i"))),
                    Stmt::If(IfStmt {
                        cond: bin(BinaryOp::Eq, var("i"), int(7)),
                        then_branch: Box::new(Stmt::Break(sp())),
                        else_branch: None,
                        span: sp(),
                    }),
                ]))),
                span: sp(),
            })],
        ),
    ]);
    assert_eq!(run_main(&u, &["s"])[0].as_i32(), 16);
}

#[test]
fn test_do_while_runs_once() {
    let u = unit(vec![
        global("int", "n", None),
        func(
            "void",
            "main",
            vec![],
            vec![Stmt::DoWhile(DoWhileStmt {
                body: Box::new(Stmt::Expr(compound(BinaryOp::Add, var("n"), int(1)))),
                cond: int(0),
                span: sp(),
            })],
        ),
    ]);
    assert_eq!(run_main(&u, &["n"])[0].as_i32(), 1);
}

fn switch_unit(scrutinee: i64) -> Unit {
    unit(vec![
        global("int", "x", None),
        func(
            "void",
            "main",
            vec![],
            vec![Stmt::Switch(SwitchStmt {
                scrutinee: int(scrutinee),
                cases: vec![
                    SwitchCase {
                        value: Some(int(1)),
                        body: vec![Stmt::Expr(compound(BinaryOp::Add, var("x"), int(1)))],
                        span: sp(),
                    },
                    SwitchCase {
                        value: Some(int(2)),
                        body: vec![Stmt::Expr(compound(BinaryOp::Add, var("x"), int(10)))],
                        span: sp(),
                    },
                    SwitchCase {
                        value: None,
                        body: vec![Stmt::Expr(compound(BinaryOp::Add, var("x"), int(100)))],
                        span: sp(),
                    },
                ],
                span: sp(),
            })],
        ),
    ])
}

#[test]
fn test_switch_falls_through_without_break() {
    // case 1 matches and falls through 1 → 2 → default.
    assert_eq!(run_main(&switch_unit(1), &["x"])[0].as_i32(), 111);
    assert_eq!(run_main(&switch_unit(2), &["x"])[0].as_i32(), 110);
    assert_eq!(run_main(&switch_unit(9), &["x"])[0].as_i32(), 100);
}

#[test]
fn test_switch_break_stops_fallthrough() {
    let u = unit(vec![
        global("int", "x", None),
        func(
            "void",
            "main",
            vec![],
            vec![Stmt::Switch(SwitchStmt {
                scrutinee: int(1),
                cases: vec![
                    SwitchCase {
                        value: Some(int(1)),
                        body: vec![
                            Stmt::Expr(compound(BinaryOp::Add, var("x"), int(1))),
                            Stmt::Break(sp()),
                        ],
                        span: sp(),
                    },
                    SwitchCase {
                        value: None,
                        body: vec![Stmt::Expr(compound(BinaryOp::Add, var("x"), int(100)))],
                        span: sp(),
                    },
                ],
                span: sp(),
            })],
        ),
    ]);
    assert_eq!(run_main(&u, &["x"])[0].as_i32(), 1);
}

#[test]
fn test_switch_diagnoses_duplicates() {
    let registry = HostRegistry::new(TargetDesc::lp64());
    let mut sink = DiagnosticSink::new();
    let u = unit(vec![
        global("int", "x", None),
        func(
            "void",
            "main",
            vec![],
            vec![Stmt::Switch(SwitchStmt {
                scrutinee: int(0),
                cases: vec![
                    SwitchCase {
                        value: Some(int(1)),
                        body: vec![],
                        span: Span::point(2, 1),
                    },
                    SwitchCase {
                        value: Some(int(1)),
                        body: vec![],
                        span: Span::point(3, 1),
                    },
                    SwitchCase {
                        value: None,
                        body: vec![],
                        span: Span::point(4, 1),
                    },
                    SwitchCase {
                        value: None,
                        body: vec![],
                        span: Span::point(5, 1),
                    },
                ],
                span: sp(),
            })],
        ),
    ]);
    cobble_emit::compile(&u, TargetDesc::lp64(), &registry, &mut sink).unwrap();
    let codes: Vec<_> = sink.diagnostics().iter().map(|d| d.code).collect();
    assert!(codes.contains(&DiagCode::DUPLICATE_CASE));
    assert!(codes.contains(&DiagCode::DUPLICATE_DEFAULT));
}

#[test]
fn test_break_outside_loop_is_diagnosed() {
    let registry = HostRegistry::new(TargetDesc::lp64());
    let mut sink = DiagnosticSink::new();
    let u = unit(vec![func(
        "void",
        "main",
        vec![],
        vec![Stmt::Break(sp()), Stmt::Continue(Span::point(2, 1))],
    )]);
    cobble_emit::compile(&u, TargetDesc::lp64(), &registry, &mut sink).unwrap();
    let codes: Vec<_> = sink.diagnostics().iter().map(|d| d.code).collect();
    assert!(codes.contains(&DiagCode::BREAK_OUTSIDE_LOOP));
    assert!(codes.contains(&DiagCode::CONTINUE_OUTSIDE_LOOP));
}

// ── Short-circuit evaluation ─────────────────────────────────────────────────

#[test]
fn test_logical_and_skips_right_side_effects() {
    // bump() increments `calls`; the right operand must not run.
    let bump = func(
        "int",
        "bump",
        vec![],
        vec![
            Stmt::Expr(compound(BinaryOp::Add, var("calls"), int(1))),
            ret(Some(int(1))),
        ],
    );
    let u = unit(vec![
        global("int", "calls", None),
        global("int", "t", None),
        bump,
        func(
            "void",
            "main",
            vec![],
            vec![Stmt::Expr(assign(
                var("t"),
                bin(BinaryOp::LogicalAnd, int(0), call("bump", vec![])),
            ))],
        ),
    ]);
    let cells = run_main(&u, &["calls", "t"]);
    assert_eq!(cells[0].as_i32(), 0, "right operand ran");
    assert_eq!(cells[1].as_i32(), 0);
}

#[test]
fn test_logical_or_skips_right_side_effects() {
    let bump = func(
        "int",
        "bump",
        vec![],
        vec![
            Stmt::Expr(compound(BinaryOp::Add, var("calls"), int(1))),
            ret(Some(int(0))),
        ],
    );
    let u = unit(vec![
        global("int", "calls", None),
        global("int", "t", None),
        bump,
        func(
            "void",
            "main",
            vec![],
            vec![Stmt::Expr(assign(
                var("t"),
                bin(BinaryOp::LogicalOr, int(1), call("bump", vec![])),
            ))],
        ),
    ]);
    let cells = run_main(&u, &["calls", "t"]);
    assert_eq!(cells[0].as_i32(), 0, "right operand ran");
    assert_eq!(cells[1].as_i32(), 1);
}

#[test]
fn test_logical_operands_do_run_when_needed() {
    let bump = func(
        "int",
        "bump",
        vec![],
        vec![
            Stmt::Expr(compound(BinaryOp::Add, var("calls"), int(1))),
            ret(Some(int(1))),
        ],
    );
    let u = unit(vec![
        global("int", "calls", None),
        global("int", "t", None),
        bump,
        func(
            "void",
            "main",
            vec![],
            vec![Stmt::Expr(assign(
                var("t"),
                bin(BinaryOp::LogicalAnd, int(1), call("bump", vec![])),
            ))],
        ),
    ]);
    let cells = run_main(&u, &["calls", "t"]);
    assert_eq!(cells[0].as_i32(), 1);
    assert_eq!(cells[1].as_i32(), 1);
}

// ── Functions ────────────────────────────────────────────────────────────────

#[test]
fn test_recursion() {
    let fact = func(
        "int",
        "fact",
        vec![("int", "n")],
        vec![Stmt::If(IfStmt {
            cond: bin(BinaryOp::Le, var("n"), int(1)),
            then_branch: Box::new(ret(Some(int(1)))),
            else_branch: Some(Box::new(ret(Some(bin(
                BinaryOp::Mul,
                var("n"),
                call("fact", vec![bin(BinaryOp::Sub, var("n"), int(1))]),
            ))))),
            span: sp(),
        })],
    );
    let u = unit(vec![
        global("int", "r", None),
        fact,
        func(
            "void",
            "main",
            vec![],
            vec![Stmt::Expr(assign(var("r"), call("fact", vec![int(5)])))],
        ),
    ]);
    assert_eq!(run_main(&u, &["r"])[0].as_i32(), 120);
}

#[test]
fn test_overload_resolution_prefers_exact_match() {
    let f_int = func("int", "f", vec![("int", "a")], vec![ret(Some(int(1)))]);
    let f_dbl = func("int", "f", vec![("double", "a")], vec![ret(Some(int(2)))]);
    let u = unit(vec![
        global("int", "a", None),
        global("int", "b", None),
        f_int,
        f_dbl,
        func(
            "void",
            "main",
            vec![],
            vec![
                Stmt::Expr(assign(var("a"), call("f", vec![int(3)]))),
                Stmt::Expr(assign(
                    var("b"),
                    call(
                        "f",
                        vec![Expr::new(
                            ExprKind::FloatLit {
                                value: 3.0,
                                single: false,
                            },
                            sp(),
                        )],
                    ),
                )),
            ],
        ),
    ]);
    let cells = run_main(&u, &["a", "b"]);
    assert_eq!(cells[0].as_i32(), 1);
    assert_eq!(cells[1].as_i32(), 2);
}

#[test]
fn test_default_argument_fills_missing_call_slot() {
    let scale = Decl::Func(FuncDecl {
        ret: tn("int"),
        name: id("scale"),
        params: vec![
            ParamDecl {
                ty: tn("int"),
                name: id("v"),
                default: None,
                span: sp(),
            },
            ParamDecl {
                ty: tn("int"),
                name: id("k"),
                default: Some(int(3)),
                span: sp(),
            },
        ],
        body: Some(block(vec![ret(Some(bin(
            BinaryOp::Mul,
            var("v"),
            var("k"),
        )))])),
        span: sp(),
    });
    let u = unit(vec![
        global("int", "r", None),
        global("int", "r2", None),
        scale,
        func(
            "void",
            "main",
            vec![],
            vec![
                Stmt::Expr(assign(var("r"), call("scale", vec![int(5)]))),
                Stmt::Expr(assign(var("r2"), call("scale", vec![int(5), int(4)]))),
            ],
        ),
    ]);
    let cells = run_main(&u, &["r", "r2"]);
    assert_eq!(cells[0].as_i32(), 15);
    assert_eq!(cells[1].as_i32(), 20);
}

#[test]
fn test_forward_declaration_then_definition() {
    let decl_only = Decl::Func(FuncDecl {
        ret: tn("int"),
        name: id("twice"),
        params: vec![ParamDecl {
            ty: tn("int"),
            name: id("v"),
            default: None,
            span: sp(),
        }],
        body: None,
        span: sp(),
    });
    let u = unit(vec![
        global("int", "r", None),
        decl_only,
        func(
            "void",
            "main",
            vec![],
            vec![Stmt::Expr(assign(var("r"), call("twice", vec![int(21)])))],
        ),
        func(
            "int",
            "twice",
            vec![("int", "v")],
            vec![ret(Some(bin(BinaryOp::Mul, var("v"), int(2))))],
        ),
    ]);
    assert_eq!(run_main(&u, &["r"])[0].as_i32(), 42);
}

// ── Pointers, arrays, structs, enums ─────────────────────────────────────────

#[test]
fn test_pointer_write_through() {
    let u = unit(vec![
        global("int", "g", None),
        func(
            "void",
            "main",
            vec![],
            vec![
                decl_stmt("int", "x", Some(int(1))),
                Stmt::Var(VarDecl {
                    ty: tnp("int", 1),
                    name: id("p"),
                    array: ArraySuffix::None,
                    init: Some(un(UnaryOp::AddrOf, var("x"))),
                    span: sp(),
                }),
                Stmt::Expr(assign(un(UnaryOp::Deref, var("p")), int(42))),
                Stmt::Expr(assign(var("g"), var("x"))),
            ],
        ),
    ]);
    assert_eq!(run_main(&u, &["g"])[0].as_i32(), 42);
}

#[test]
fn test_array_indexing_and_sum() {
    let u = unit(vec![
        global("int", "s", None),
        func(
            "void",
            "main",
            vec![],
            vec![
                Stmt::Var(VarDecl {
                    ty: tn("int"),
                    name: id("a"),
                    array: ArraySuffix::Sized(int(3)),
                    init: Some(Expr::new(
                        ExprKind::InitList(vec![int(10), int(20), int(30)]),
                        sp(),
                    )),
                    span: sp(),
                }),
                Stmt::For(ForStmt {
                    init: Some(Box::new(decl_stmt("int", "i", Some(int(0))))),
                    cond: Some(bin(BinaryOp::Lt, var("i"), int(3))),
                    step: Some(compound(BinaryOp::Add, var("i"), int(1))),
                    body: Box::new(Stmt::Expr(compound(
                        BinaryOp::Add,
                        var("s"),
                        Expr::new(
                            ExprKind::Index {
                                base: Box::new(var("a")),
                                index: Box::new(var("i")),
                            },
                            sp(),
                        ),
                    ))),
                    span: sp(),
                }),
            ],
        ),
    ]);
    assert_eq!(run_main(&u, &["s"])[0].as_i32(), 60);
}

#[test]
fn test_struct_fields_and_method() {
    let point = Decl::Struct(StructDecl {
        name: id("Point"),
        members: vec![
            StructMember::Field(FieldDecl {
                ty: tn("int"),
                name: id("x"),
                array: ArraySuffix::None,
                span: sp(),
            }),
            StructMember::Field(FieldDecl {
                ty: tn("int"),
                name: id("y"),
                array: ArraySuffix::None,
                span: sp(),
            }),
            StructMember::Method(FuncDecl {
                ret: tn("int"),
                name: id("sum"),
                params: vec![],
                // Bare field names resolve through `this`.
                body: Some(block(vec![ret(Some(bin(
                    BinaryOp::Add,
                    var("x"),
                    var("y"),
                )))])),
                span: sp(),
            }),
        ],
        span: sp(),
    });
    let member = |base: &str, name: &str| {
        Expr::new(
            ExprKind::Member {
                base: Box::new(var(base)),
                member: id(name),
                arrow: false,
            },
            sp(),
        )
    };
    let u = unit(vec![
        global("int", "r", None),
        point,
        func(
            "void",
            "main",
            vec![],
            vec![
                decl_stmt("Point", "p", None),
                Stmt::Expr(assign(member("p", "x"), int(3))),
                Stmt::Expr(assign(member("p", "y"), int(4))),
                Stmt::Expr(assign(
                    var("r"),
                    Expr::new(
                        ExprKind::Call {
                            callee: Box::new(member("p", "sum")),
                            args: vec![],
                        },
                        sp(),
                    ),
                )),
            ],
        ),
    ]);
    assert_eq!(run_main(&u, &["r"])[0].as_i32(), 7);
}

#[test]
fn test_enum_constants_count_up() {
    let colors = Decl::Enum(EnumDecl {
        name: id("Color"),
        members: vec![
            EnumMember {
                name: id("RED"),
                value: None,
                span: sp(),
            },
            EnumMember {
                name: id("GREEN"),
                value: Some(int(5)),
                span: sp(),
            },
            EnumMember {
                name: id("BLUE"),
                value: None,
                span: sp(),
            },
        ],
        span: sp(),
    });
    let u = unit(vec![
        global("int", "r", None),
        colors,
        func(
            "void",
            "main",
            vec![],
            vec![Stmt::Expr(assign(
                var("r"),
                bin(
                    BinaryOp::Add,
                    var("BLUE"),
                    bin(BinaryOp::Add, var("RED"), var("GREEN")),
                ),
            ))],
        ),
    ]);
    // RED = 0, GREEN = 5, BLUE = 6.
    assert_eq!(run_main(&u, &["r"])[0].as_i32(), 11);
}

#[test]
fn test_explicit_cast_truncates_float() {
    let u = unit(vec![
        global("int", "r", None),
        func(
            "void",
            "main",
            vec![],
            vec![Stmt::Expr(assign(
                var("r"),
                Expr::new(
                    ExprKind::Cast {
                        ty: tn("int"),
                        expr: Box::new(Expr::new(
                            ExprKind::FloatLit {
                                value: 3.9,
                                single: false,
                            },
                            sp(),
                        )),
                    },
                    sp(),
                ),
            ))],
        ),
    ]);
    assert_eq!(run_main(&u, &["r"])[0].as_i32(), 3);
}

#[test]
fn test_sizeof_folds_against_target() {
    let u = unit(vec![
        global(
            "unsigned long",
            "n",
            Some(Expr::new(ExprKind::SizeOfType(tn("long")), sp())),
        ),
        func("void", "main", vec![], vec![]),
    ]);
    // LP64: sizeof(long) == 8.
    assert_eq!(run_main(&u, &["n"])[0].as_u64(), 8);
}

#[test]
fn test_invalid_implicit_cast_is_diagnosed_not_fatal() {
    let registry = HostRegistry::new(TargetDesc::lp64());
    let mut sink = DiagnosticSink::new();
    let u = unit(vec![
        global("int", "x", None),
        func(
            "void",
            "main",
            vec![],
            vec![
                Stmt::Var(VarDecl {
                    ty: tnp("int", 1),
                    name: id("p"),
                    array: ArraySuffix::None,
                    init: None,
                    span: sp(),
                }),
                // int = pointer: no implicit conversion exists.
                Stmt::Expr(assign(var("x"), var("p"))),
            ],
        ),
    ]);
    let exe = cobble_emit::compile(&u, TargetDesc::lp64(), &registry, &mut sink).unwrap();
    assert!(sink.has_errors());
    assert!(sink
        .diagnostics()
        .iter()
        .any(|d| d.code == DiagCode::INVALID_CAST));
    // Compilation still produced a complete executable.
    assert!(!exe.code.is_empty());
}

#[test]
fn test_narrowing_initializer_warns_but_compiles() {
    let registry = HostRegistry::new(TargetDesc::lp64());
    let mut sink = DiagnosticSink::new();
    let u = unit(vec![
        global("char", "c", Some(int(300))),
        func("void", "main", vec![], vec![]),
    ]);
    cobble_emit::compile(&u, TargetDesc::lp64(), &registry, &mut sink).unwrap();
    assert!(!sink.has_errors());
    assert_eq!(sink.warning_count(), 1);

    // The stored cell wraps at the declared width.
    let exe = {
        let mut sink = DiagnosticSink::new();
        cobble_emit::compile(&u, TargetDesc::lp64(), &registry, &mut sink).unwrap()
    };
    let mut vm = Vm::new(&exe, &registry);
    vm.reset("main").unwrap();
    vm.run().unwrap();
    assert_eq!(vm.global_cells("c").unwrap()[0].as_i8(), 300i64 as i8);
}
