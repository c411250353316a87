mod common;

#[test]
fn arithmetic_follows_standard_precedence() {
    common::assert_prints("print 2 + 3 * 4;", &["14"]);
    common::assert_prints("print (2 + 3) * 4;", &["20"]);
}

#[test]
fn comparison_and_equality_operators() {
    common::assert_prints("print 1 < 2;", &["true"]);
    common::assert_prints("print 1 >= 2;", &["false"]);
    common::assert_prints("print 1 == 1.0;", &["true"]);
    common::assert_prints("print \"a\" != \"b\";", &["true"]);
}

#[test]
fn string_concatenation_and_mixed_type_stringification() {
    common::assert_prints("print \"ab\" + \"cd\";", &["abcd"]);
    common::assert_prints("print \"n=\" + 1;", &["n=1"]);
}

#[test]
fn and_or_combine_by_truthiness_without_short_circuit() {
    common::assert_prints("print true or false;", &["true"]);
    common::assert_prints("print false and true;", &["false"]);
}

#[test]
fn ternary_picks_the_matching_branch_and_is_right_associative() {
    common::assert_prints("print 1 < 2 ? \"yes\" : \"no\";", &["yes"]);
    common::assert_prints("print false ? 1 : false ? 2 : 3;", &["3"]);
}

#[test]
fn comma_expression_yields_its_last_value() {
    common::assert_prints("print (1, 2, 3);", &["3"]);
}

#[test]
fn number_stringification_strips_a_trailing_fractional_zero() {
    common::assert_prints("print 3.0;", &["3"]);
    common::assert_prints("print 3.5;", &["3.5"]);
}

#[test]
fn division_by_zero_is_a_runtime_error() {
    let run = common::run("print 1 / 0;");
    assert!(run.had_runtime_error);
}
