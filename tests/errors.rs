mod common;

fn run_script(name: &str, source: &str) -> std::process::Output {
    let path = common::write_script(name, source);
    let output = common::binary().arg(&path).output().expect("failed to run rlox");
    let _ = std::fs::remove_file(&path);
    output
}

#[test]
fn return_at_top_level_exits_65_and_reports_the_reason() {
    let output = run_script("return-top-level", "return 1;");
    assert_eq!(output.status.code(), Some(65));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("can only return from"), "stderr was: {stderr}");
}

#[test]
fn returning_a_value_from_an_initializer_exits_65() {
    let output = run_script("init-return-value", "class Foo { init() { return 1; } }");
    assert_eq!(output.status.code(), Some(65));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("cannot return value from an initializer"), "stderr was: {stderr}");
}

#[test]
fn division_by_zero_exits_70_with_a_runtime_error_format() {
    let output = run_script("div-by-zero", "print 1/0;");
    assert_eq!(output.status.code(), Some(70));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Divide by zero"), "stderr was: {stderr}");
    assert!(stderr.contains("[line"), "stderr was: {stderr}");
}

#[test]
fn unterminated_string_exits_65() {
    let output = run_script("unterminated-string", "\"abc");
    assert_eq!(output.status.code(), Some(65));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("must end with double quotes"), "stderr was: {stderr}");
}

#[test]
fn a_clean_run_exits_zero() {
    let output = run_script("clean-run", "print 1 + 2;");
    assert_eq!(output.status.code(), Some(0));
}

#[test]
fn missing_script_file_exits_66() {
    let output = common::binary().arg("/nonexistent/path/does-not-exist.lox").output().unwrap();
    assert_eq!(output.status.code(), Some(66));
}
