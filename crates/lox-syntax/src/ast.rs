use std::fmt::{self, Display, Formatter};
use std::rc::Rc;

pub use lox_common::types::{Span, Spanned};

pub type StmtS = Spanned<Stmt>;
pub type ExprS = Spanned<Expr>;

#[derive(Debug, Default, PartialEq)]
pub struct Program {
    pub stmts: Vec<StmtS>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Block(StmtBlock),
    Class(Box<StmtClass>),
    Expr(StmtExpr),
    Fun(Rc<StmtFun>),
    If(Box<StmtIf>),
    Print(StmtPrint),
    Return(StmtReturn),
    Var(StmtVar),
    While(Box<StmtWhile>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct StmtBlock {
    pub stmts: Vec<StmtS>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StmtClass {
    pub name: String,
    pub super_: Option<ExprS>,
    pub methods: Vec<Spanned<Rc<StmtFun>>>,
}

/// An expression statement evaluates an expression and discards the result.
#[derive(Clone, Debug, PartialEq)]
pub struct StmtExpr {
    pub value: ExprS,
}

/// Shared with every closure created from the declaration, so running it
/// again does not copy the body.
#[derive(Clone, Debug, PartialEq)]
pub struct StmtFun {
    pub name: String,
    pub params: Vec<String>,
    pub body: StmtBlock,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StmtIf {
    pub cond: ExprS,
    pub then: StmtS,
    pub else_: Option<StmtS>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StmtPrint {
    pub value: ExprS,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StmtReturn {
    pub value: Option<ExprS>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StmtVar {
    pub var: Var,
    pub value: Option<ExprS>,
}

/// `for` loops are desugared into a `while` loop by the parser.
#[derive(Clone, Debug, PartialEq)]
pub struct StmtWhile {
    pub cond: ExprS,
    pub body: StmtS,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Assign(Box<ExprAssign>),
    Call(Box<ExprCall>),
    Get(Box<ExprGet>),
    Grouping(Box<ExprGrouping>),
    Infix(Box<ExprInfix>),
    Literal(ExprLiteral),
    Logical(Box<ExprLogical>),
    Prefix(Box<ExprPrefix>),
    Set(Box<ExprSet>),
    Super(ExprSuper),
    This(ExprThis),
    Var(ExprVar),
}

/// Fully parenthesized prefix form, e.g. `(* (- 123) (group 45.67))`.
impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Assign(assign) => write!(f, "(= {} {})", assign.var.name, assign.value.0),
            Expr::Call(call) => {
                write!(f, "(call {}", call.callee.0)?;
                for (arg, _) in &call.args {
                    write!(f, " {arg}")?;
                }
                write!(f, ")")
            }
            Expr::Get(get) => write!(f, "(. {} {})", get.object.0, get.name),
            Expr::Grouping(grouping) => write!(f, "(group {})", grouping.value.0),
            Expr::Infix(infix) => write!(f, "({} {} {})", infix.op, infix.lt.0, infix.rt.0),
            Expr::Literal(literal) => write!(f, "{literal}"),
            Expr::Logical(logical) => {
                write!(f, "({} {} {})", logical.op, logical.lt.0, logical.rt.0)
            }
            Expr::Prefix(prefix) => write!(f, "({} {})", prefix.op, prefix.rt.0),
            Expr::Set(set) => write!(f, "(= (. {} {}) {})", set.object.0, set.name, set.value.0),
            Expr::Super(super_) => write!(f, "(. super {})", super_.name),
            Expr::This(_) => write!(f, "this"),
            Expr::Var(var) => write!(f, "{}", var.var.name),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExprAssign {
    pub var: Var,
    pub value: ExprS,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExprCall {
    pub callee: ExprS,
    pub args: Vec<ExprS>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExprGet {
    pub object: ExprS,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExprGrouping {
    pub value: ExprS,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExprInfix {
    pub lt: ExprS,
    pub op: OpInfix,
    pub rt: ExprS,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OpInfix {
    Add,
    Subtract,
    Multiply,
    Divide,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
}

impl Display for OpInfix {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let op = match self {
            OpInfix::Add => "+",
            OpInfix::Subtract => "-",
            OpInfix::Multiply => "*",
            OpInfix::Divide => "/",
            OpInfix::Less => "<",
            OpInfix::LessEqual => "<=",
            OpInfix::Greater => ">",
            OpInfix::GreaterEqual => ">=",
            OpInfix::Equal => "==",
            OpInfix::NotEqual => "!=",
        };
        write!(f, "{op}")
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprLiteral {
    Bool(bool),
    Nil,
    Number(f64),
    String(String),
}

impl Display for ExprLiteral {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ExprLiteral::Bool(bool) => write!(f, "{bool}"),
            ExprLiteral::Nil => write!(f, "nil"),
            ExprLiteral::Number(number) => write!(f, "{number}"),
            ExprLiteral::String(string) => write!(f, "{string:?}"),
        }
    }
}

/// Short-circuiting `and` / `or`. The result is the last operand that was
/// evaluated, not a coerced boolean.
#[derive(Clone, Debug, PartialEq)]
pub struct ExprLogical {
    pub lt: ExprS,
    pub op: OpLogical,
    pub rt: ExprS,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OpLogical {
    And,
    Or,
}

impl Display for OpLogical {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let op = match self {
            OpLogical::And => "and",
            OpLogical::Or => "or",
        };
        write!(f, "{op}")
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExprPrefix {
    pub op: OpPrefix,
    pub rt: ExprS,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OpPrefix {
    Negate,
    Not,
}

impl Display for OpPrefix {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let op = match self {
            OpPrefix::Negate => "-",
            OpPrefix::Not => "!",
        };
        write!(f, "{op}")
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExprSet {
    pub object: ExprS,
    pub name: String,
    pub value: ExprS,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExprSuper {
    pub super_: Var,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExprThis {
    pub this: Var,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExprVar {
    pub var: Var,
}

/// A reference to a named binding.
///
/// `depth` is filled in by the resolver: it is the number of scopes between
/// the reference and the declaration. `None` means the name is looked up in
/// the global scope at runtime.
#[derive(Clone, Debug, PartialEq)]
pub struct Var {
    pub name: String,
    pub depth: Option<usize>,
}

impl Var {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), depth: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    fn show(source: &str) -> String {
        let (program, errors) = crate::parse(source);
        assert_eq!(errors, vec![]);
        match &program.stmts[..] {
            [(Stmt::Expr(expr), _)] => expr.value.0.to_string(),
            stmts => panic!("expected one expression statement, got {stmts:?}"),
        }
    }

    #[test]
    fn display_arithmetic() {
        assert_eq!(show("-123 * (45.67);"), "(* (- 123) (group 45.67))");
        assert_eq!(show("1 + 2 < 4 == !false;"), "(== (< (+ 1 2) 4) (! false))");
    }

    #[test]
    fn display_calls_and_properties() {
        assert_eq!(show(r#"a.b(1, "two").c = nil or x;"#), r#"(= (. (call (. a b) 1 "two") c) (or nil x))"#);
        assert_eq!(show("y = z and this;"), "(= y (and z this))");
    }
}
