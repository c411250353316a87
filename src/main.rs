use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::{fs, io};

use clap::Parser as _;
use rlox::Lox;

/// A tree-walk interpreter for Lox.
#[derive(clap::Parser)]
#[command(version, about)]
struct Cli {
    /// Path to a Lox script. Omit to start a REPL.
    script: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.script {
        Some(path) => run_file(&path),
        None => run_prompt(),
    }
}

fn run_file(path: &std::path::Path) -> ExitCode {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(error) => {
            eprintln!("Could not read '{}': {error}", path.display());
            return ExitCode::from(66);
        }
    };

    let mut lox = Lox::new();
    lox.run(&source);
    lox.finish();

    if lox.reporter().had_compile_error() {
        ExitCode::from(65)
    } else if lox.reporter().had_runtime_error() {
        ExitCode::from(70)
    } else {
        ExitCode::SUCCESS
    }
}

fn run_prompt() -> ExitCode {
    let history_path = home::home_dir().map(|home| home.join(".rlox_history"));

    let mut editor = rustyline::DefaultEditor::new().expect("failed to initialize line editor");
    if let Some(path) = &history_path {
        let _ = editor.load_history(path);
    }

    let mut lox = Lox::new();

    loop {
        match editor.readline("> ") {
            Ok(line) => {
                let _ = editor.add_history_entry(line.as_str());
                lox.run(&line);
            }
            Err(rustyline::error::ReadlineError::Interrupted) | Err(rustyline::error::ReadlineError::Eof) => break,
            Err(error) => {
                eprintln!("Error reading input: {error}");
                break;
            }
        }
    }

    if let Some(path) = &history_path {
        let _ = editor.save_history(path);
    }
    io::stdout().flush().ok();

    ExitCode::SUCCESS
}
