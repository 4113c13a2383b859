/// Integration tests for script evaluation

mod common;

use common::*;
use skein_ast::{Node, Param, TmplPart};
use skein_eval::{Attr, ErrorKind, InterpreterOptions, Value};

fn bools(values: &[bool]) -> Value {
    Value::arr(values.iter().map(|b| Value::Bool(*b)).collect())
}

#[tokio::test]
async fn test_and_or_short_circuit() {
    // `boom` is undefined, so reaching it would fail
    let script = vec![arr(vec![
        and(boolean(false), call_named("boom", vec![])),
        or(boolean(true), call_named("boom", vec![])),
        and(boolean(true), boolean(false)),
        or(boolean(false), boolean(true)),
    ])];
    assert_eq!(run_both(&script).await, bools(&[false, true, false, true]));
}

#[tokio::test]
async fn test_logical_operands_must_be_bool() {
    let interp = interpreter(InterpreterOptions::default());
    let err = interp.exec(&[and(boolean(true), num(1.0))]).await.unwrap_err();
    assert_eq!(err.kind.to_string(), "Expect bool, but got num.");

    let err = interp.exec(&[or(num(0.0), boolean(true))]).await.unwrap_err();
    assert!(matches!(err.kind, ErrorKind::TypeMismatch { expected: "bool", .. }));
}

#[tokio::test]
async fn test_compound_assignment_evaluates_target_once() {
    let script = vec![
        var("count", num(0.0)),
        let_("items", arr(vec![num(10.0)])),
        let_("next", func(&[], vec![add_assign(ident("count"), num(1.0)), num(0.0)])),
        add_assign(index(ident("items"), call_named("next", vec![])), num(5.0)),
        sub_assign(index(ident("items"), call_named("next", vec![])), num(1.0)),
        arr(vec![index(ident("items"), num(0.0)), ident("count")]),
    ];
    assert_eq!(run_both(&script).await, nums(&[14.0, 2.0]));
}

#[tokio::test]
async fn test_equality_is_deep() {
    let nested = || arr(vec![num(1.0), arr(vec![num(2.0)])]);
    let script = vec![
        let_("f", func(&[], vec![])),
        arr(vec![
            eq(nested(), nested()),
            eq(obj(vec![("a", arr(vec![num(1.0)]))]), obj(vec![("a", arr(vec![num(1.0)]))])),
            eq(arr(vec![num(1.0)]), arr(vec![num(2.0)])),
            eq(ident("f"), ident("f")),
            eq(func(&[], vec![]), func(&[], vec![])),
            neq(text("a"), text("b")),
            eq(null(), null()),
        ]),
    ];
    assert_eq!(
        run_both(&script).await,
        bools(&[true, true, false, true, false, true, true])
    );
}

#[tokio::test]
async fn test_equality_of_self_containing_arrays() {
    let push_self = |name: &str| call(prop(ident(name), "push"), vec![ident(name)]);
    let script = vec![
        let_("a", arr(vec![])),
        let_("b", arr(vec![])),
        push_self("a"),
        push_self("b"),
        eq(ident("a"), ident("b")),
    ];
    assert_eq!(run_both(&script).await, Value::Bool(true));
}

#[tokio::test]
async fn test_destructuring_definitions() {
    let script = vec![
        let_pattern(
            arr(vec![ident("a"), ident("b"), ident("c")]),
            arr(vec![num(1.0), num(2.0)]),
        ),
        let_pattern(
            obj(vec![("x", ident("x")), ("y", ident("z"))]),
            obj(vec![("x", text("X"))]),
        ),
        arr(vec![ident("a"), ident("b"), ident("c"), ident("x"), ident("z")]),
    ];
    assert_eq!(
        run_both(&script).await,
        Value::arr(vec![
            Value::Num(1.0),
            Value::Num(2.0),
            Value::Null,
            Value::str("X"),
            Value::Null,
        ])
    );
}

#[tokio::test]
async fn test_destructuring_assignment_swaps() {
    let script = vec![
        var("p", num(1.0)),
        var("q", num(2.0)),
        assign(arr(vec![ident("p"), ident("q")]), arr(vec![ident("q"), ident("p")])),
        arr(vec![ident("p"), ident("q")]),
    ];
    assert_eq!(run_both(&script).await, nums(&[2.0, 1.0]));
}

#[tokio::test]
async fn test_assignment_errors() {
    let interp = interpreter(InterpreterOptions::default());
    let err = interp
        .exec(&[let_("x", num(1.0)), assign(ident("x"), num(2.0))])
        .await
        .unwrap_err();
    assert_eq!(err.kind.to_string(), "Cannot assign to an immutable variable x.");

    let interp = interpreter(InterpreterOptions::default());
    let err = interp
        .exec(&[let_("x", num(1.0)), let_("x", num(2.0))])
        .await
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::AlreadyDefined { .. }));

    let interp = interpreter(InterpreterOptions::default());
    let err = interp.exec(&[assign(num(1.0), num(2.0))]).await.unwrap_err();
    assert!(matches!(err.kind, ErrorKind::InvalidTarget(_)));
}

#[tokio::test]
async fn test_for_range_sums_to_55() {
    let script = vec![
        var("sum", num(0.0)),
        for_range(
            None,
            "i",
            Some(num(1.0)),
            num(10.0),
            block(None, vec![add_assign(ident("sum"), ident("i"))]),
        ),
        ident("sum"),
    ];
    assert_eq!(run_both(&script).await, Value::Num(55.0));
}

#[tokio::test]
async fn test_break_and_continue_in_for() {
    let until_ten = vec![
        var("sum", num(0.0)),
        for_range(
            None,
            "i",
            Some(num(1.0)),
            num(100.0),
            block(
                None,
                vec![
                    if_(gt(ident("i"), num(10.0)), vec![brk(None, None)], None),
                    add_assign(ident("sum"), ident("i")),
                ],
            ),
        ),
        ident("sum"),
    ];
    assert_eq!(run_both(&until_ten).await, Value::Num(55.0));

    let odd = vec![
        var("odd", num(0.0)),
        for_range(
            None,
            "i",
            None,
            num(10.0),
            block(
                None,
                vec![
                    if_(eq(rem(ident("i"), num(2.0)), num(0.0)), vec![cont(None)], None),
                    add_assign(ident("odd"), ident("i")),
                ],
            ),
        ),
        ident("odd"),
    ];
    assert_eq!(run_both(&odd).await, Value::Num(25.0));
}

#[tokio::test]
async fn test_for_times_with_statement_body() {
    let script = vec![
        var("n", num(0.0)),
        for_times(num(4.0), add_assign(ident("n"), num(2.0))),
        ident("n"),
    ];
    assert_eq!(run_both(&script).await, Value::Num(8.0));
}

#[tokio::test]
async fn test_labeled_break_leaves_outer_loop() {
    let script = vec![
        var("n", num(0.0)),
        loop_(
            Some("outer"),
            vec![
                loop_(None, vec![add_assign(ident("n"), num(1.0)), brk(Some("outer"), None)]),
                add_assign(ident("n"), num(100.0)),
            ],
        ),
        ident("n"),
    ];
    assert_eq!(run_both(&script).await, Value::Num(1.0));
}

#[tokio::test]
async fn test_labeled_block_yields_break_value() {
    let script = vec![
        let_(
            "v",
            block(Some("b"), vec![brk(Some("b"), Some(num(42.0))), num(0.0)]),
        ),
        ident("v"),
    ];
    assert_eq!(run_both(&script).await, Value::Num(42.0));
}

#[tokio::test]
async fn test_each_sees_pushed_elements() {
    let script = vec![
        let_("items", arr(vec![num(1.0)])),
        var("sum", num(0.0)),
        each(
            "x",
            ident("items"),
            block(
                None,
                vec![
                    if_(
                        lt(ident("x"), num(3.0)),
                        vec![call(prop(ident("items"), "push"), vec![add(ident("x"), num(1.0))])],
                        None,
                    ),
                    add_assign(ident("sum"), ident("x")),
                ],
            ),
        ),
        ident("sum"),
    ];
    assert_eq!(run_both(&script).await, Value::Num(6.0));
}

#[tokio::test]
async fn test_match_uses_deep_equality() {
    let script = vec![
        let_(
            "pick",
            func(
                &["v"],
                vec![match_(
                    ident("v"),
                    vec![
                        (num(1.0), text("one")),
                        (arr(vec![num(1.0), num(2.0)]), text("pair")),
                    ],
                    Some(text("other")),
                )],
            ),
        ),
        arr(vec![
            call_named("pick", vec![num(1.0)]),
            call_named("pick", vec![arr(vec![num(1.0), num(2.0)])]),
            call_named("pick", vec![num(3.0)]),
        ]),
    ];
    assert_eq!(
        run_both(&script).await,
        Value::arr(vec![Value::str("one"), Value::str("pair"), Value::str("other")])
    );
}

#[tokio::test]
async fn test_if_elseif_chain() {
    let sign = func(
        &["x"],
        vec![if_chain(
            lt(ident("x"), num(0.0)),
            text("neg"),
            vec![(eq(ident("x"), num(0.0)), text("zero"))],
            Some(text("pos")),
        )],
    );
    let script = vec![
        let_("sign", sign),
        arr(vec![
            call_named("sign", vec![num(-3.0)]),
            call_named("sign", vec![num(0.0)]),
            call_named("sign", vec![num(9.0)]),
        ]),
    ];
    assert_eq!(
        run_both(&script).await,
        Value::arr(vec![Value::str("neg"), Value::str("zero"), Value::str("pos")])
    );

    let no_branch = vec![if_(boolean(false), vec![num(1.0)], None)];
    assert_eq!(run_both(&no_branch).await, Value::Null);
}

#[tokio::test]
async fn test_template_and_not() {
    let script = vec![arr(vec![
        tmpl(vec![
            TmplPart::Text("a".into()),
            TmplPart::Expr(add(num(1.0), num(1.0))),
            TmplPart::Text("b".into()),
        ]),
        not(boolean(false)),
    ])];
    assert_eq!(
        run_both(&script).await,
        Value::arr(vec![Value::str("a2b"), Value::Bool(true)])
    );
}

#[tokio::test]
async fn test_closures_share_captured_variables() {
    let script = vec![
        var("c", num(0.0)),
        let_("inc", func(&[], vec![add_assign(ident("c"), num(1.0)), ident("c")])),
        call_named("inc", vec![]),
        call_named("inc", vec![]),
    ];
    assert_eq!(run_both(&script).await, Value::Num(2.0));
}

#[tokio::test]
async fn test_recursion_with_early_return() {
    let fib = func(
        &["n"],
        vec![
            if_(lt(ident("n"), num(2.0)), vec![ret(ident("n"))], None),
            add(
                call_named("fib", vec![sub(ident("n"), num(1.0))]),
                call_named("fib", vec![sub(ident("n"), num(2.0))]),
            ),
        ],
    );
    let script = vec![let_("fib", fib), call_named("fib", vec![num(10.0)])];
    assert_eq!(run_both(&script).await, Value::Num(55.0));
}

/// `let depth = @(n) { if (n == 0) { return 0 } else { return 1 + depth(n - 1) } }`
fn counting_recursion() -> Node {
    let_(
        "depth",
        func(
            &["n"],
            vec![if_(
                eq(ident("n"), num(0.0)),
                vec![ret(num(0.0))],
                Some(vec![ret(add(
                    num(1.0),
                    call_named("depth", vec![sub(ident("n"), num(1.0))]),
                ))]),
            )],
        ),
    )
}

#[tokio::test]
async fn test_deep_recursion() {
    let script = vec![counting_recursion(), call_named("depth", vec![num(1000.0)])];
    assert_eq!(run_both(&script).await, Value::Num(1000.0));
}

#[tokio::test]
async fn test_call_depth_limit() {
    let script = vec![counting_recursion(), call_named("depth", vec![num(100.0)])];
    let opts = InterpreterOptions::new().max_call_depth(50);

    let err = interpreter(opts.clone()).exec_sync(&script).unwrap_err();
    assert_eq!(err.kind, ErrorKind::CallDepthExceeded(50));
    let err = interpreter(opts).exec(&script).await.unwrap_err();
    assert_eq!(err.to_string().lines().next(), Some("max call depth exceeded (50)"));

    let unlimited = InterpreterOptions::new().max_call_depth(0);
    let value = interpreter(unlimited).exec_sync(&script).unwrap();
    assert_eq!(value, Some(Value::Num(100.0)));
}

#[tokio::test]
async fn test_default_and_optional_parameters() {
    let params = vec![
        Param {
            dest: ident("a"),
            optional: false,
            default: None,
        },
        Param {
            dest: ident("b"),
            optional: false,
            default: Some(num(10.0)),
        },
        Param {
            dest: ident("c"),
            optional: true,
            default: None,
        },
    ];
    let script = vec![
        let_(
            "f",
            func_with(params, vec![arr(vec![ident("a"), ident("b"), ident("c")])]),
        ),
        arr(vec![
            call_named("f", vec![num(1.0)]),
            call_named("f", vec![num(1.0), num(2.0), num(3.0)]),
        ]),
    ];
    assert_eq!(
        run_both(&script).await,
        Value::arr(vec![
            Value::arr(vec![Value::Num(1.0), Value::Num(10.0), Value::Null]),
            nums(&[1.0, 2.0, 3.0]),
        ])
    );

    let interp = interpreter(InterpreterOptions::default());
    let err = interp
        .exec(&[let_("g", func(&["a"], vec![])), call_named("g", vec![])])
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ExpectedAny);
}

#[tokio::test]
async fn test_exists() {
    let script = vec![let_("x", num(1.0)), arr(vec![exists("x"), exists("nope")])];
    assert_eq!(run_both(&script).await, bools(&[true, false]));
}

#[tokio::test]
async fn test_attributes_recorded_on_binding_and_function() {
    let interp = interpreter(InterpreterOptions::default());
    let f = interp
        .exec(&[
            let_with_attr("f", func(&[], vec![]), ("tag", text("v"))),
            ident("f"),
        ])
        .await
        .unwrap()
        .unwrap();
    let expected = vec![Attr {
        name: "tag".into(),
        value: Value::str("v"),
    }];
    assert_eq!(interp.scope().attrs("f"), Some(expected.clone()));
    assert_eq!(f.as_fn().unwrap().attrs(), expected);
    assert_eq!(f.as_fn().unwrap().name().as_deref(), Some("f"));
}

#[tokio::test]
async fn test_indexing() {
    let script = vec![
        let_("o", obj(vec![("a", num(1.0))])),
        arr(vec![
            index(arr(vec![num(1.0), num(2.0)]), num(1.0)),
            index(ident("o"), text("b")),
            prop(ident("o"), "b"),
            index(text("abc"), num(1.0)),
            prop(text("abc"), "len"),
        ]),
    ];
    assert_eq!(
        run_both(&script).await,
        Value::arr(vec![
            Value::Num(2.0),
            Value::Null,
            Value::Null,
            Value::str("b"),
            Value::Num(3.0),
        ])
    );
}

#[tokio::test]
async fn test_index_errors() {
    let interp = interpreter(InterpreterOptions::default());
    let err = interp
        .exec(&[index(arr(vec![num(1.0), num(2.0)]), num(5.0))])
        .await
        .unwrap_err();
    assert_eq!(err.kind.to_string(), "Index out of range. index: 5 max: 1");

    let err = interp
        .exec(&[index(arr(vec![num(1.0)]), num(0.5))])
        .await
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::IndexOutOfRange { .. }));

    let err = interp.exec(&[index(num(5.0), num(0.0))]).await.unwrap_err();
    assert_eq!(err.kind.to_string(), "Cannot read prop (0) of num.");

    let err = interp.exec(&[prop(null(), "x")]).await.unwrap_err();
    assert_eq!(err.kind.to_string(), "No such property 'x' on null.");

    let err = interp
        .exec(&[assign(index(arr(vec![num(1.0)]), num(3.0)), num(0.0))])
        .await
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::IndexOutOfRange { .. }));
}

#[tokio::test]
async fn test_property_assignment() {
    let script = vec![
        let_("o", obj(vec![])),
        assign(prop(ident("o"), "k"), num(1.0)),
        assign(index(ident("o"), text("j")), num(2.0)),
        add_assign(prop(ident("o"), "k"), num(1.0)),
        arr(vec![prop(ident("o"), "k"), prop(ident("o"), "j")]),
    ];
    assert_eq!(run_both(&script).await, nums(&[2.0, 2.0]));
}

#[tokio::test]
async fn test_arr_map_in_both_modes() {
    let script = vec![call(
        prop(arr(vec![num(1.0), num(2.0), num(3.0)]), "map"),
        vec![func(&["x", "i"], vec![add(mul(ident("x"), num(2.0)), ident("i"))])],
    )];
    assert_eq!(run_both(&script).await, nums(&[2.0, 5.0, 8.0]));
}

#[tokio::test]
async fn test_arithmetic_goes_through_core_functions() {
    let script = vec![arr(vec![
        add(num(1.0), num(2.0)),
        sub(num(1.0), num(2.0)),
        mul(num(3.0), num(4.0)),
        div(num(1.0), num(4.0)),
        rem(num(7.0), num(4.0)),
    ])];
    assert_eq!(run_both(&script).await, nums(&[3.0, -1.0, 12.0, 0.25, 3.0]));

    let interp = interpreter(InterpreterOptions::default());
    let err = interp.exec(&[add(text("1"), num(2.0))]).await.unwrap_err();
    assert_eq!(err.kind.to_string(), "Expect num, but got str.");
}

#[tokio::test]
async fn test_operators_follow_rebound_core_functions() {
    let script = vec![
        let_(
            "inner",
            block(
                None,
                vec![
                    let_("Core:add", func(&["a", "b"], vec![text("overridden")])),
                    add(num(1.0), num(2.0)),
                ],
            ),
        ),
        arr(vec![ident("inner"), add(num(1.0), num(2.0))]),
    ];
    assert_eq!(
        run_both(&script).await,
        Value::arr(vec![Value::str("overridden"), Value::Num(3.0)])
    );
}

#[tokio::test]
async fn test_print_reaches_output_callback() {
    let (opts, printed) = capture_output(InterpreterOptions::new());
    let interp = interpreter(opts);
    let result = interp
        .exec(&[call_named("print", vec![text("hi")]), num(1.0)])
        .await
        .unwrap();
    assert_eq!(result, Some(Value::Num(1.0)));
    assert_eq!(*printed.borrow(), vec![Value::str("hi")]);
}

#[tokio::test]
async fn test_empty_script_yields_nothing() {
    let interp = interpreter(InterpreterOptions::default());
    assert_eq!(interp.exec(&[]).await.unwrap(), None);
}
