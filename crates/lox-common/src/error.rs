use crate::types::Span;

use codespan_reporting::diagnostic::{Diagnostic, Label};
use codespan_reporting::files::SimpleFile;
use codespan_reporting::term;
use termcolor::WriteColor;
use thiserror::Error;

pub type ErrorS = (Error, Span);
pub type Result<T, E = ErrorS> = std::result::Result<T, E>;

#[remain::sorted]
#[derive(Debug, Error, Eq, PartialEq)]
pub enum Error {
    #[error("AttributeError: {0}")]
    AttributeError(AttributeError),
    #[error("IOError: {0}")]
    IoError(IoError),
    #[error("NameError: {0}")]
    NameError(NameError),
    #[error("OverflowError: {0}")]
    OverflowError(OverflowError),
    #[error("SyntaxError: {0}")]
    SyntaxError(SyntaxError),
    #[error("TypeError: {0}")]
    TypeError(TypeError),
}

impl AsDiagnostic for Error {
    fn as_diagnostic(&self, span: &Span) -> Diagnostic<()> {
        match self {
            Error::AttributeError(e) => e.as_diagnostic(span),
            Error::IoError(e) => e.as_diagnostic(span),
            Error::NameError(e) => e.as_diagnostic(span),
            Error::OverflowError(e) => e.as_diagnostic(span),
            Error::SyntaxError(e) => e.as_diagnostic(span),
            Error::TypeError(e) => e.as_diagnostic(span),
        }
    }
}

macro_rules! impl_from_error {
    ($($error:ident),+) => {$(
        impl From<$error> for Error {
            fn from(e: $error) -> Self {
                Error::$error(e)
            }
        }
    )+};
}

impl_from_error!(AttributeError, IoError, NameError, OverflowError, SyntaxError, TypeError);

#[remain::sorted]
#[derive(Debug, Error, Eq, PartialEq)]
pub enum AttributeError {
    #[error("Only instances have fields.")]
    FieldOnNonInstance { type_: String, name: String },
    #[error("Undefined property '{name}'.")]
    NoSuchAttribute { type_: String, name: String },
    #[error("Only instances have properties.")]
    PropertyOnNonInstance { type_: String, name: String },
}

impl AsDiagnostic for AttributeError {
    fn as_diagnostic(&self, span: &Span) -> Diagnostic<()> {
        let diagnostic = error_diagnostic("AttributeError", self, span);
        match self {
            AttributeError::FieldOnNonInstance { type_, .. }
            | AttributeError::PropertyOnNonInstance { type_, .. } => {
                diagnostic.with_notes(vec![format!("receiver has type {type_:?}")])
            }
            AttributeError::NoSuchAttribute { type_, .. } => {
                diagnostic.with_notes(vec![format!("no field or method on {type_:?}")])
            }
        }
    }
}

#[remain::sorted]
#[derive(Debug, Error, Eq, PartialEq)]
pub enum IoError {
    #[error("unable to write to file: {file:?}")]
    WriteError { file: String },
}

impl AsDiagnostic for IoError {
    fn as_diagnostic(&self, span: &Span) -> Diagnostic<()> {
        error_diagnostic("IOError", self, span)
    }
}

#[remain::sorted]
#[derive(Debug, Error, Eq, PartialEq)]
pub enum NameError {
    #[error("Can't read local variable in its own initializer.")]
    AccessInsideInitializer { name: String },
    #[error("Already a variable with this name in this scope.")]
    AlreadyDefined { name: String },
    #[error("Undefined variable '{name}'.")]
    NotDefined { name: String },
}

impl AsDiagnostic for NameError {
    fn as_diagnostic(&self, span: &Span) -> Diagnostic<()> {
        let diagnostic = error_diagnostic("NameError", self, span);
        match self {
            NameError::AccessInsideInitializer { name } | NameError::AlreadyDefined { name } => {
                diagnostic.with_notes(vec![format!("while declaring {name:?}")])
            }
            NameError::NotDefined { .. } => diagnostic,
        }
    }
}

#[remain::sorted]
#[derive(Debug, Error, Eq, PartialEq)]
pub enum OverflowError {
    #[error("Stack overflow.")]
    StackOverflow,
}

impl AsDiagnostic for OverflowError {
    fn as_diagnostic(&self, span: &Span) -> Diagnostic<()> {
        error_diagnostic("OverflowError", self, span)
            .with_notes(vec!["the call stack grew too deep, check for unbounded recursion".to_string()])
    }
}

#[remain::sorted]
#[derive(Debug, Error, Eq, PartialEq)]
pub enum SyntaxError {
    #[error("A class can't inherit from itself.")]
    InheritFromSelf { name: String },
    #[error("Invalid assignment target.")]
    InvalidAssignTarget,
    #[error("Can't return a value from an initializer.")]
    ReturnInInitializer,
    #[error("Can't return from top-level code.")]
    ReturnOutsideFunction,
    #[error("Can't use 'super' outside of a class.")]
    SuperOutsideClass,
    #[error("Can't use 'super' in a class with no superclass.")]
    SuperWithoutSuperclass,
    #[error("Can't use 'this' outside of a class.")]
    ThisOutsideClass,
    #[error("Can't have more than {max} arguments.")]
    TooManyArguments { max: usize },
    #[error("Can't have more than {max} parameters.")]
    TooManyParameters { max: usize },
    #[error("Unexpected input {token:?}.")]
    UnexpectedInput { token: String },
    #[error("Expect {expected}, found end of file.")]
    UnrecognizedEOF { expected: String },
    #[error("Expect {expected}, found {token:?}.")]
    UnrecognizedToken { token: String, expected: String },
    #[error("Unterminated string.")]
    UnterminatedString,
}

impl AsDiagnostic for SyntaxError {
    fn as_diagnostic(&self, span: &Span) -> Diagnostic<()> {
        error_diagnostic("SyntaxError", self, span)
    }
}

#[remain::sorted]
#[derive(Debug, Error, Eq, PartialEq)]
pub enum TypeError {
    #[error("Expected {exp_args} arguments but got {got_args}.")]
    ArityMismatch { name: String, exp_args: usize, got_args: usize },
    #[error("Operands must be two numbers or two strings.")]
    InvalidAddOperands { lt_type: String, rt_type: String },
    #[error("Operand must be a number.")]
    NonNumberOperand { op: String, rt_type: String },
    #[error("Operands must be numbers.")]
    NonNumberOperands { op: String, lt_type: String, rt_type: String },
    #[error("Can only call functions and classes.")]
    NotCallable { type_: String },
    #[error("Superclass must be a class.")]
    SuperclassInvalidType { type_: String },
}

impl AsDiagnostic for TypeError {
    fn as_diagnostic(&self, span: &Span) -> Diagnostic<()> {
        let diagnostic = error_diagnostic("TypeError", self, span);
        let note = match self {
            TypeError::ArityMismatch { name, .. } => format!("while calling {name}()"),
            TypeError::InvalidAddOperands { lt_type, rt_type } => {
                format!("operand types are {lt_type:?} and {rt_type:?}")
            }
            TypeError::NonNumberOperand { op, rt_type } => {
                format!("unsupported operand type for {op}: {rt_type:?}")
            }
            TypeError::NonNumberOperands { op, lt_type, rt_type } => {
                format!("unsupported operand types for {op}: {lt_type:?} and {rt_type:?}")
            }
            TypeError::NotCallable { type_ } => format!("{type_:?} object is not callable"),
            TypeError::SuperclassInvalidType { type_ } => format!("found {type_:?}"),
        };
        diagnostic.with_notes(vec![note])
    }
}

trait AsDiagnostic {
    fn as_diagnostic(&self, span: &Span) -> Diagnostic<()>;
}

fn error_diagnostic(code: &str, e: &impl ToString, span: &Span) -> Diagnostic<()> {
    Diagnostic::error()
        .with_code(code)
        .with_message(e.to_string())
        .with_labels(vec![Label::primary((), span.clone())])
}

/// The two channels through which the resolver and interpreter surface
/// failures. Static errors are accumulated; a runtime error ends the run.
pub trait Reporter {
    fn error(&mut self, error: ErrorS);
    fn runtime_error(&mut self, error: ErrorS);
}

impl Reporter for Vec<ErrorS> {
    fn error(&mut self, error: ErrorS) {
        self.push(error);
    }

    fn runtime_error(&mut self, error: ErrorS) {
        self.push(error);
    }
}

/// Renders errors as `codespan-reporting` diagnostics against a single source
/// file and remembers which channels were used, so that the caller can pick an
/// exit code afterwards.
pub struct ErrorReporter<W> {
    writer: W,
    file: SimpleFile<String, String>,
    pub had_error: bool,
    pub had_runtime_error: bool,
}

impl<W: WriteColor> ErrorReporter<W> {
    pub fn new(writer: W, name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            writer,
            file: SimpleFile::new(name.into(), source.into()),
            had_error: false,
            had_runtime_error: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn emit(&mut self, (e, span): &ErrorS) {
        let config = term::Config::default();
        let diagnostic = e.as_diagnostic(span);
        if let Err(e) = term::emit(&mut self.writer, &config, &self.file, &diagnostic) {
            tracing::warn!(%e, "could not emit diagnostic");
        }
    }
}

impl<W: WriteColor> Reporter for ErrorReporter<W> {
    fn error(&mut self, error: ErrorS) {
        self.emit(&error);
        self.had_error = true;
    }

    fn runtime_error(&mut self, error: ErrorS) {
        self.emit(&error);
        self.had_runtime_error = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use termcolor::Buffer;

    #[test]
    fn display_includes_kind() {
        let e = Error::TypeError(TypeError::ArityMismatch {
            name: "add".to_string(),
            exp_args: 2,
            got_args: 3,
        });
        assert_eq!(e.to_string(), "TypeError: Expected 2 arguments but got 3.");
    }

    #[test]
    fn reporter_tracks_channels() {
        let source = "print a;";
        let mut reporter = ErrorReporter::new(Buffer::no_color(), "<script>", source);
        reporter.runtime_error((NameError::NotDefined { name: "a".to_string() }.into(), 6..7));
        assert!(!reporter.had_error);
        assert!(reporter.had_runtime_error);

        let output = reporter.into_inner().into_inner();
        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("error[NameError]: Undefined variable 'a'."));
        assert!(output.contains("<script>:1:7"));
    }

    #[test]
    fn vec_reporter_collects() {
        let mut errors = Vec::new();
        errors.error((SyntaxError::ReturnOutsideFunction.into(), 0..6));
        errors.runtime_error((IoError::WriteError { file: "stdout".to_string() }.into(), 0..5));
        assert_eq!(errors.len(), 2);
    }
}
