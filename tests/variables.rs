mod common;

#[test]
fn variable_declaration_and_read() {
    common::assert_prints("var a = 1; print a;", &["1"]);
}

#[test]
fn uninitialized_variable_defaults_to_nil() {
    common::assert_prints("var a; print a;", &["nil"]);
}

#[test]
fn assignment_updates_the_existing_binding() {
    common::assert_prints(
        "var a = 1;\
         a = 2;\
         print a;",
        &["2"],
    );
}

#[test]
fn block_scoped_variable_shadows_outer_one() {
    common::assert_prints(
        "var a = \"outer\";\
         { var a = \"inner\"; print a; }\
         print a;",
        &["inner", "outer"],
    );
}

#[test]
fn assignment_inside_a_block_writes_through_to_the_outer_binding() {
    common::assert_prints(
        "var a = 1;\
         { a = 2; }\
         print a;",
        &["2"],
    );
}

#[test]
fn redeclaring_a_name_in_the_same_local_scope_is_a_compile_error() {
    let run = common::run("{ var a = 1; var a = 2; }");
    assert!(run.had_compile_error);
}

#[test]
fn reading_a_local_variable_in_its_own_initializer_is_a_compile_error() {
    let run = common::run("{ var a = a; }");
    assert!(run.had_compile_error);
}

#[test]
fn referencing_an_undeclared_global_is_a_compile_error() {
    let run = common::run("print undeclared;");
    assert!(run.had_compile_error);
}

#[test]
fn this_used_outside_a_class_is_a_compile_error() {
    let run = common::run("print this;");
    assert!(run.had_compile_error);
}
