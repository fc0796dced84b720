mod env;
mod interpreter;
mod object;
mod resolver;

use std::io::Write;

use lox_common::error::Reporter;
use tracing::debug;

pub use crate::interpreter::{Interpreter, FRAMES_MAX};
pub use crate::resolver::Resolver;

/// Parses, resolves and runs `source` on `interpreter`.
///
/// Syntax and resolution errors are all reported through `reporter.error`, and
/// nothing runs if there were any. A runtime error is reported through
/// `reporter.runtime_error` and ends the run. Globals defined by earlier calls
/// stay visible, so this can be called once per line of a REPL session.
pub fn run<W: Write>(interpreter: &mut Interpreter<W>, source: &str, reporter: &mut impl Reporter) {
    let (mut program, errors) = lox_syntax::parse(source);
    if !errors.is_empty() {
        debug!(count = errors.len(), "syntax errors");
        errors.into_iter().for_each(|e| reporter.error(e));
        return;
    }

    let errors = Resolver::default().resolve(&mut program);
    if !errors.is_empty() {
        debug!(count = errors.len(), "resolution errors");
        errors.into_iter().for_each(|e| reporter.error(e));
        return;
    }

    interpreter.interpret(&program, reporter);
}

#[cfg(test)]
mod tests {
    use super::*;

    use lox_common::error::{Error, ErrorS, NameError, SyntaxError};
    use pretty_assertions::assert_eq;

    fn run_all(sources: &[&str]) -> (String, Vec<ErrorS>) {
        let mut interpreter = Interpreter::new(Vec::new());
        let mut errors: Vec<ErrorS> = Vec::new();
        for source in sources {
            run(&mut interpreter, source, &mut errors);
        }
        (String::from_utf8(interpreter.into_stdout()).unwrap(), errors)
    }

    #[test]
    fn globals_persist_across_runs() {
        let (stdout, errors) = run_all(&["var a = 1;", "fun f() { return a + 1; }", "print f();"]);
        assert_eq!(errors, vec![]);
        assert_eq!(stdout, "2\n");
    }

    #[test]
    fn static_errors_prevent_execution() {
        let (stdout, errors) = run_all(&[r#"print "unreachable"; return 1;"#]);
        assert_eq!(stdout, "");
        assert_eq!(errors, vec![(Error::SyntaxError(SyntaxError::ReturnOutsideFunction), 21..30)]);
    }

    #[test]
    fn syntax_errors_skip_resolution() {
        let (stdout, errors) = run_all(&["print ;", "print 1;"]);
        assert_eq!(stdout, "1\n");
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn runtime_error_keeps_prior_output() {
        let (stdout, errors) = run_all(&["print 1; print b; print 2;"]);
        assert_eq!(stdout, "1\n");
        assert_eq!(errors, vec![(
            Error::NameError(NameError::NotDefined { name: "b".to_string() }),
            15..16
        )]);
    }
}
