use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use rlox::Lox;

/// A `Write` sink backed by a ref-counted buffer, so a test can hold its own
/// handle to read back what the driver printed after `run` returns.
#[derive(Clone, Default)]
pub struct Capture(Rc<RefCell<Vec<u8>>>);

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Capture {
    fn contents(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).expect("print output is valid utf-8")
    }
}

pub struct Run {
    pub stdout: String,
    pub had_compile_error: bool,
    pub had_runtime_error: bool,
}

/// Runs `source` as one top-level program through the library driver and
/// captures everything it would have printed to stdout.
pub fn run(source: &str) -> Run {
    let capture = Capture::default();
    let mut lox = Lox::with_output(Box::new(capture.clone()));
    lox.run(source);

    Run {
        stdout: capture.contents(),
        had_compile_error: lox.reporter().had_compile_error(),
        had_runtime_error: lox.reporter().had_runtime_error(),
    }
}

/// Runs `source` and asserts it printed exactly `lines`, one per `print`,
/// with no compile or runtime error.
pub fn assert_prints(source: &str, lines: &[&str]) {
    let run = run(source);
    assert!(!run.had_compile_error, "unexpected compile error for: {source}");
    assert!(!run.had_runtime_error, "unexpected runtime error for: {source}\noutput so far: {}", run.stdout);

    let expected = if lines.is_empty() { String::new() } else { format!("{}\n", lines.join("\n")) };
    assert_eq!(run.stdout, expected);
}

/// Spawns the built `rlox` binary against a script file, for cases that need
/// to assert on the process's stderr text and exit code rather than just
/// captured stdout.
pub fn binary() -> assert_cmd::Command {
    assert_cmd::Command::cargo_bin("rlox").unwrap()
}

/// Writes `source` to a uniquely named file under the system temp directory
/// and returns its path, so exit-code tests can hand the binary a real script
/// path without committing throwaway `.lox` fixtures to the repo.
pub fn write_script(name: &str, source: &str) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!("rlox-test-{name}-{}.lox", std::process::id()));
    std::fs::write(&path, source).expect("failed to write temp script");
    path
}
