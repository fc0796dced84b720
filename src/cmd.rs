use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::{fs, panic, thread};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lox_common::error::ErrorReporter;
use lox_interpreter::Interpreter;
use reedline::Signal;
use termcolor::{ColorChoice, StandardStream};
use tracing::info;

use crate::repl;

/// Deep Lox recursion is deep Rust recursion, so programs run on a thread
/// with a stack large enough to reach the interpreter's own frame limit.
const STACK_SIZE: usize = 256 * 1024 * 1024;

const EXIT_STATIC_ERROR: u8 = 65;
const EXIT_RUNTIME_ERROR: u8 = 70;
const EXIT_IO_ERROR: u8 = 74;

#[derive(Debug, Parser)]
#[clap(about, author, disable_help_subcommand = true, propagate_version = true, version)]
pub struct App {
    #[clap(subcommand)]
    cmd: Option<Cmd>,
}

#[derive(Debug, Subcommand)]
pub enum Cmd {
    /// Start an interactive session (the default).
    Repl,
    /// Run a Lox script.
    Run { path: PathBuf },
}

impl App {
    pub fn run(self) -> Result<ExitCode> {
        let cmd = self.cmd.unwrap_or(Cmd::Repl);
        let handle = thread::Builder::new()
            .name("lox".to_string())
            .stack_size(STACK_SIZE)
            .spawn(move || cmd.run())
            .context("could not spawn interpreter thread")?;
        handle.join().unwrap_or_else(|e| panic::resume_unwind(e))
    }
}

impl Cmd {
    fn run(&self) -> Result<ExitCode> {
        match self {
            Cmd::Repl => repl(),
            Cmd::Run { path } => run(path),
        }
    }
}

fn repl() -> Result<ExitCode> {
    let mut editor = repl::editor()?;
    let mut interpreter = Interpreter::new(io::stdout());

    loop {
        match editor.read_line(&repl::Prompt) {
            Ok(Signal::Success(line)) => {
                let mut reporter =
                    ErrorReporter::new(StandardStream::stderr(ColorChoice::Auto), "<stdin>", &*line);
                lox_interpreter::run(&mut interpreter, &line, &mut reporter);
                interpreter.stdout_mut().flush().context("could not flush stdout")?;
            }
            Ok(Signal::CtrlC) => eprintln!("CTRL-C"),
            Ok(Signal::CtrlD) => {
                eprintln!("CTRL-D");
                break;
            }
            Err(e) => return Err(e).context("could not read line"),
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn run(path: &Path) -> Result<ExitCode> {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("error: could not read {}: {e}", path.display());
            return Ok(ExitCode::from(EXIT_IO_ERROR));
        }
    };
    info!(path = %path.display(), bytes = source.len(), "running script");

    let stdout = io::stdout().lock();
    let mut interpreter = Interpreter::new(stdout);
    let stderr = StandardStream::stderr(ColorChoice::Auto);
    let mut reporter = ErrorReporter::new(stderr, path.display().to_string(), &*source);
    lox_interpreter::run(&mut interpreter, &source, &mut reporter);
    interpreter.stdout_mut().flush().context("could not flush stdout")?;

    Ok(if reporter.had_error {
        ExitCode::from(EXIT_STATIC_ERROR)
    } else if reporter.had_runtime_error {
        ExitCode::from(EXIT_RUNTIME_ERROR)
    } else {
        ExitCode::SUCCESS
    })
}
