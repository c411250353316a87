mod common;

#[test]
fn function_call_returns_a_value() {
    common::assert_prints(
        "fun add(a, b) { return a + b; }\
         print add(2, 3);",
        &["5"],
    );
}

#[test]
fn function_without_a_return_statement_yields_nil() {
    common::assert_prints(
        "fun noop() {}\
         print noop();",
        &["nil"],
    );
}

#[test]
fn recursive_function_reference_resolves() {
    common::assert_prints(
        "fun fact(n) { if (n <= 1) return 1; return n * fact(n - 1); }\
         print fact(5);",
        &["120"],
    );
}

#[test]
fn calling_a_function_with_the_wrong_arity_is_a_runtime_error() {
    let run = common::run(
        "fun one(a) { return a; }\
         one(1, 2);",
    );
    assert!(run.had_runtime_error);
}

#[test]
fn calling_a_non_callable_value_is_a_runtime_error() {
    let run = common::run(
        "var x = 1;\
         x();",
    );
    assert!(run.had_runtime_error);
}

#[test]
fn returning_outside_a_function_is_a_compile_error() {
    let run = common::run("return 1;");
    assert!(run.had_compile_error);
}

#[test]
fn printing_a_function_shows_its_name() {
    common::assert_prints(
        "fun greet() {}\
         print greet;",
        &["<fn greet>"],
    );
}
