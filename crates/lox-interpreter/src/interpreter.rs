use std::io::Write;

use lox_common::error::{AttributeError, IoError, OverflowError, Reporter, Result, TypeError};
use lox_common::types::Span;
use lox_syntax::ast::{
    Expr, ExprLiteral, ExprS, OpInfix, OpLogical, OpPrefix, Program, Stmt, StmtS, Var,
};
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::env::Env;
use crate::object::{Class, Function, Native, Object};

/// Upper bound on nested calls before a program is considered to have
/// recursed without end.
pub const FRAMES_MAX: usize = 1024;

/// How a statement finished executing.
///
/// `return` is not an error: it travels back through every enclosing block
/// as `Flow::Return` and is consumed by the function call that started the
/// body.
#[derive(Debug)]
pub enum Flow {
    Normal,
    Return(Object),
}

#[derive(Debug)]
pub struct Interpreter<W> {
    globals: Env,
    stdout: W,
    frames: usize,
}

impl<W: Write> Interpreter<W> {
    pub fn new(stdout: W) -> Self {
        let globals = Env::new();
        globals.define("clock", Native::Clock.into());
        Self { globals, stdout, frames: 0 }
    }

    pub fn stdout_mut(&mut self) -> &mut W {
        &mut self.stdout
    }

    pub fn into_stdout(self) -> W {
        self.stdout
    }

    /// Runs a resolved program and reports the first runtime error, if any,
    /// through `reporter`. Output produced before the error is kept.
    pub fn interpret(&mut self, program: &Program, reporter: &mut impl Reporter) {
        if let Err(e) = self.run(program) {
            debug!(error = %e.0, "runtime error");
            reporter.runtime_error(e);
        }
    }

    /// Runs each top-level statement in order, stopping at the first runtime
    /// error.
    #[tracing::instrument(level = "debug", skip_all, fields(stmts = program.stmts.len()))]
    pub fn run(&mut self, program: &Program) -> Result<()> {
        self.frames = 0;
        let globals = self.globals.clone();
        for stmt in &program.stmts {
            self.run_stmt(&globals, stmt)?;
        }
        Ok(())
    }

    /// Executes `stmts` in `env`. The caller's scope is untouched however the
    /// block exits, since `env` is dropped here.
    pub(crate) fn run_block(&mut self, stmts: &[StmtS], env: Env) -> Result<Flow> {
        for stmt in stmts {
            if let Flow::Return(object) = self.run_stmt(&env, stmt)? {
                return Ok(Flow::Return(object));
            }
        }
        Ok(Flow::Normal)
    }

    fn run_stmt(&mut self, env: &Env, stmt_s: &StmtS) -> Result<Flow> {
        let (stmt, span) = stmt_s;
        match stmt {
            Stmt::Block(block) => self.run_block(&block.stmts, Env::with_parent(env)),
            Stmt::Class(class) => {
                // Predefined so that methods can refer to the class by name.
                env.define(&class.name, Object::Nil);

                let super_ = match &class.super_ {
                    Some(super_s) => match self.run_expr(env, super_s)? {
                        Object::Class(ref super_) => Some(super_.clone()),
                        object => {
                            return Err((
                                TypeError::SuperclassInvalidType { type_: object.type_() }.into(),
                                super_s.1.clone(),
                            ));
                        }
                    },
                    None => None,
                };

                let method_env = match &super_ {
                    Some(super_) => {
                        let env = Env::with_parent(env);
                        env.define("super", super_.clone().into());
                        env
                    }
                    None => env.clone(),
                };
                let methods = class
                    .methods
                    .iter()
                    .map(|(decl, _)| {
                        let method = Function::new(decl, &method_env, decl.name == "init");
                        (decl.name.clone(), method)
                    })
                    .collect::<FxHashMap<_, _>>();

                debug!(name = %class.name, methods = methods.len(), "declared class");
                let class = Class::new(&class.name, super_, methods);
                env.assign(&class.name, class.clone().into(), span)?;
                Ok(Flow::Normal)
            }
            Stmt::Expr(expr) => {
                trace!(expr = %expr.value.0, "evaluating");
                self.run_expr(env, &expr.value)?;
                Ok(Flow::Normal)
            }
            Stmt::Fun(fun) => {
                // Bound before any call can happen, so the body may refer to
                // itself.
                let function = Function::new(fun, env, false);
                env.define(&fun.name, function.into());
                Ok(Flow::Normal)
            }
            Stmt::If(if_) => {
                let cond = self.run_expr(env, &if_.cond)?;
                if cond.bool() {
                    self.run_stmt(env, &if_.then)
                } else if let Some(else_) = &if_.else_ {
                    self.run_stmt(env, else_)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::Print(print) => {
                trace!(expr = %print.value.0, "printing");
                let value = self.run_expr(env, &print.value)?;
                writeln!(self.stdout, "{value}").map_err(|_| {
                    (IoError::WriteError { file: "stdout".to_string() }.into(), span.clone())
                })?;
                Ok(Flow::Normal)
            }
            Stmt::Return(return_) => {
                let object = match &return_.value {
                    Some(value) => self.run_expr(env, value)?,
                    None => Object::Nil,
                };
                Ok(Flow::Return(object))
            }
            Stmt::Var(var) => {
                let value = match &var.value {
                    Some(value) => self.run_expr(env, value)?,
                    None => Object::Nil,
                };
                env.define(&var.var.name, value);
                Ok(Flow::Normal)
            }
            Stmt::While(while_) => {
                while self.run_expr(env, &while_.cond)?.bool() {
                    if let Flow::Return(object) = self.run_stmt(env, &while_.body)? {
                        return Ok(Flow::Return(object));
                    }
                }
                Ok(Flow::Normal)
            }
        }
    }

    fn run_expr(&mut self, env: &Env, expr_s: &ExprS) -> Result<Object> {
        let (expr, span) = expr_s;
        match expr {
            Expr::Assign(assign) => {
                let value = self.run_expr(env, &assign.value)?;
                match assign.var.depth {
                    Some(depth) => env.assign_at(depth, &assign.var.name, value.clone()),
                    None => self.globals.assign(&assign.var.name, value.clone(), span)?,
                }
                Ok(value)
            }
            Expr::Call(call) => {
                let callee = self.run_expr(env, &call.callee)?;
                let args =
                    call.args.iter().map(|arg| self.run_expr(env, arg)).collect::<Result<Vec<_>>>()?;

                if self.frames >= FRAMES_MAX {
                    return Err((OverflowError::StackOverflow.into(), span.clone()));
                }
                self.frames += 1;
                let result = callee.call(self, args, span);
                self.frames -= 1;
                result
            }
            Expr::Get(get) => {
                let object = self.run_expr(env, &get.object)?;
                object.get(&get.name, span)
            }
            Expr::Grouping(grouping) => self.run_expr(env, &grouping.value),
            Expr::Infix(infix) => {
                let lt = self.run_expr(env, &infix.lt)?;
                let rt = self.run_expr(env, &infix.rt)?;
                match (infix.op, &lt, &rt) {
                    (OpInfix::Add, Object::Number(a), Object::Number(b)) => Ok(Object::Number(*a + *b)),
                    (OpInfix::Add, Object::String(a), Object::String(b)) => {
                        Ok(Object::String(a.clone() + b))
                    }
                    (OpInfix::Add, a, b) => Err((
                        TypeError::InvalidAddOperands { lt_type: a.type_(), rt_type: b.type_() }
                            .into(),
                        span.clone(),
                    )),
                    (OpInfix::Subtract, Object::Number(a), Object::Number(b)) => {
                        Ok(Object::Number(*a - *b))
                    }
                    (OpInfix::Multiply, Object::Number(a), Object::Number(b)) => {
                        Ok(Object::Number(*a * *b))
                    }
                    (OpInfix::Divide, Object::Number(a), Object::Number(b)) => {
                        Ok(Object::Number(*a / *b))
                    }
                    (OpInfix::Less, Object::Number(a), Object::Number(b)) => Ok(Object::Bool(*a < *b)),
                    (OpInfix::LessEqual, Object::Number(a), Object::Number(b)) => {
                        Ok(Object::Bool(*a <= *b))
                    }
                    (OpInfix::Greater, Object::Number(a), Object::Number(b)) => {
                        Ok(Object::Bool(*a > *b))
                    }
                    (OpInfix::GreaterEqual, Object::Number(a), Object::Number(b)) => {
                        Ok(Object::Bool(*a >= *b))
                    }
                    (OpInfix::Equal, a, b) => Ok(Object::Bool(*a == *b)),
                    (OpInfix::NotEqual, a, b) => Ok(Object::Bool(a != b)),
                    (op, a, b) => Err((
                        TypeError::NonNumberOperands {
                            op: op.to_string(),
                            lt_type: a.type_(),
                            rt_type: b.type_(),
                        }
                        .into(),
                        span.clone(),
                    )),
                }
            }
            Expr::Literal(literal) => Ok(match literal {
                ExprLiteral::Bool(bool) => Object::Bool(*bool),
                ExprLiteral::Nil => Object::Nil,
                ExprLiteral::Number(number) => Object::Number(*number),
                ExprLiteral::String(string) => Object::String(string.clone()),
            }),
            Expr::Logical(logical) => {
                let lt = self.run_expr(env, &logical.lt)?;
                match (logical.op, lt.bool()) {
                    (OpLogical::Or, true) | (OpLogical::And, false) => Ok(lt),
                    _ => self.run_expr(env, &logical.rt),
                }
            }
            Expr::Prefix(prefix) => {
                let rt = self.run_expr(env, &prefix.rt)?;
                match prefix.op {
                    OpPrefix::Negate => match rt {
                        Object::Number(number) => Ok(Object::Number(-number)),
                        object => Err((
                            TypeError::NonNumberOperand {
                                op: prefix.op.to_string(),
                                rt_type: object.type_(),
                            }
                            .into(),
                            span.clone(),
                        )),
                    },
                    OpPrefix::Not => Ok(Object::Bool(!rt.bool())),
                }
            }
            Expr::Set(set) => {
                let object = self.run_expr(env, &set.object)?;
                let instance = match object {
                    Object::Instance(ref instance) => instance.clone(),
                    object => {
                        return Err((
                            AttributeError::FieldOnNonInstance {
                                type_: object.type_(),
                                name: set.name.clone(),
                            }
                            .into(),
                            span.clone(),
                        ));
                    }
                };
                let value = self.run_expr(env, &set.value)?;
                instance.set(&set.name, value.clone());
                Ok(value)
            }
            Expr::Super(super_) => {
                let depth = super_.super_.depth.unwrap_or_else(|| {
                    unreachable!(r#""super" was not resolved to a local scope"#)
                });
                let class = match env.get_at(depth, "super") {
                    Object::Class(ref class) => class.clone(),
                    object => unreachable!(r#""super" bound to non-class: {object:?}"#),
                };
                // "this" is bound in the scope directly inside the one holding
                // "super".
                let instance = match env.get_at(depth - 1, "this") {
                    Object::Instance(ref instance) => instance.clone(),
                    object => unreachable!(r#""this" bound to non-instance: {object:?}"#),
                };
                match class.find_method(&super_.name) {
                    Some(method) => Ok(method.bind(&instance).into()),
                    None => Err((
                        AttributeError::NoSuchAttribute {
                            type_: class.name.clone(),
                            name: super_.name.clone(),
                        }
                        .into(),
                        span.clone(),
                    )),
                }
            }
            Expr::This(this) => self.lookup(env, &this.this, span),
            Expr::Var(var) => self.lookup(env, &var.var, span),
        }
    }

    /// Resolved references are read at their recorded depth; the rest are
    /// globals, looked up by name.
    fn lookup(&self, env: &Env, var: &Var, span: &Span) -> Result<Object> {
        match var.depth {
            Some(depth) => Ok(env.get_at(depth, &var.name)),
            None => self.globals.get(&var.name, span),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::rc::Rc;

    use lox_common::error::{Error, ErrorS};
    use pretty_assertions::assert_eq;

    use crate::resolver::Resolver;

    fn run(source: &str) -> (String, Vec<ErrorS>) {
        let (mut program, errors) = lox_syntax::parse(source);
        assert_eq!(errors, vec![]);
        assert_eq!(Resolver::default().resolve(&mut program), vec![]);

        let mut errors: Vec<ErrorS> = Vec::new();
        let mut interpreter = Interpreter::new(Vec::new());
        interpreter.interpret(&program, &mut errors);
        let stdout = String::from_utf8(interpreter.into_stdout()).unwrap();
        (stdout, errors)
    }

    #[test]
    fn arithmetic_matches_floats() {
        let (stdout, errors) = run("print 1 + 2; print 7 - 10; print 2 * 3.5; print 1 / 4; print 1 / 0;");
        assert_eq!(errors, vec![]);
        assert_eq!(stdout, "3\n-3\n7\n0.25\ninf\n");
    }

    #[test]
    fn comparison_and_equality() {
        let (stdout, _) =
            run(r#"print 1 < 2; print 2 <= 1; print 3 > 3; print 3 >= 3; print 1 == 1.0; print "1" == 1; print nil == nil; print nil != false;"#);
        assert_eq!(stdout, "True\nFalse\nFalse\nTrue\nTrue\nFalse\nTrue\nTrue\n");
    }

    #[test]
    fn logical_operators_yield_operands() {
        let (stdout, _) = run(r#"print nil or "default"; print 0 and "zero is truthy"; print false and boom; print "x" or boom;"#);
        assert_eq!(stdout, "default\nzero is truthy\nFalse\nx\n");
    }

    #[test]
    fn string_concatenation() {
        let (stdout, _) = run(r#"print "foo" + "bar";"#);
        assert_eq!(stdout, "foobar\n");
    }

    #[test]
    fn mixed_add_is_type_error() {
        let (stdout, errors) = run(r#"print "before"; print "a" + 1; print "after";"#);
        assert_eq!(stdout, "before\n");
        assert_eq!(
            errors,
            vec![(
                Error::TypeError(TypeError::InvalidAddOperands {
                    lt_type: "string".to_string(),
                    rt_type: "number".to_string(),
                }),
                22..29,
            )]
        );
    }

    #[test]
    fn negate_requires_number() {
        let (_, errors) = run(r#"-"a";"#);
        assert_eq!(errors[0].0.to_string(), "TypeError: Operand must be a number.");
    }

    #[test]
    fn return_unwinds_through_blocks_and_loops() {
        let source = r#"
            fun find() {
                var i = 0;
                while (true) {
                    {
                        if (i == 3) return i;
                    }
                    i = i + 1;
                }
            }
            print find();
        "#;
        let (stdout, errors) = run(source);
        assert_eq!(errors, vec![]);
        assert_eq!(stdout, "3\n");
    }

    #[test]
    fn function_without_return_yields_nil() {
        let (stdout, _) = run("fun f() {} print f();");
        assert_eq!(stdout, "nil\n");
    }

    #[test]
    fn closures_share_state() {
        let source = r#"
            fun make() {
                var i = 0;
                fun inc() { i = i + 1; return i; }
                return inc;
            }
            var c = make();
            c();
            print c();
        "#;
        let (stdout, _) = run(source);
        assert_eq!(stdout, "2\n");
    }

    #[test]
    fn local_recursive_closures_survive_collection() {
        // Each `count` lives in the scope it closes over, forming a cycle.
        let source = r#"
            for (var i = 0; i < 100; i = i + 1) {
                fun count(n) {
                    if (n > 0) return count(n - 1);
                    return i;
                }
                count(3);
            }
            {
                fun last(n) {
                    if (n > 0) return last(n - 1);
                    return n;
                }
                print last(2);
            }
        "#;
        let (stdout, errors) = run(source);
        assert_eq!(errors, vec![]);
        assert_eq!(stdout, "0\n");
        gc::force_collect();

        let (stdout, errors) = run(source);
        assert_eq!(errors, vec![]);
        assert_eq!(stdout, "0\n");
        gc::force_collect();
    }

    #[test]
    fn closures_share_declaration() {
        let source = r#"
            fun make() {
                fun inner() { return 1; }
                return inner;
            }
            var a = make();
            var b = make();
            print a == b;
        "#;
        let (mut program, errors) = lox_syntax::parse(source);
        assert_eq!(errors, vec![]);
        assert_eq!(Resolver::default().resolve(&mut program), vec![]);

        let mut interpreter = Interpreter::new(Vec::new());
        interpreter.run(&program).unwrap();
        assert_eq!(String::from_utf8(interpreter.stdout_mut().clone()).unwrap(), "False\n");

        let (Object::Function(ref a), Object::Function(ref b)) =
            (interpreter.globals.get("a", &(0..0)).unwrap(), interpreter.globals.get("b", &(0..0)).unwrap())
        else {
            panic!("expected functions");
        };
        assert!(Rc::ptr_eq(&a.decl, &b.decl));
    }

    #[test]
    fn arity_mismatch_runs_no_body() {
        let (stdout, errors) = run(r#"fun f(a, b) { print "body"; } f(1, 2, 3);"#);
        assert_eq!(stdout, "");
        assert_eq!(
            errors[0].0,
            Error::TypeError(TypeError::ArityMismatch {
                name: "f".to_string(),
                exp_args: 2,
                got_args: 3,
            })
        );
    }

    #[test]
    fn calling_non_callable() {
        let (_, errors) = run(r#""not a function"();"#);
        assert_eq!(errors[0].0.to_string(), "TypeError: Can only call functions and classes.");
    }

    #[test]
    fn properties_need_instances() {
        let (_, errors) = run("var a = 1; print a.b;");
        assert_eq!(errors[0].0.to_string(), "AttributeError: Only instances have properties.");
        let (_, errors) = run("var a = 1; a.b = 2;");
        assert_eq!(errors[0].0.to_string(), "AttributeError: Only instances have fields.");
    }

    #[test]
    fn initializer_returns_instance() {
        let source = r#"
            class Point {
                init(x) { this.x = x; if (x > 1) return; this.x = -x; }
            }
            print Point(1).x;
            print Point(2).x;
            var p = Point(3);
            print p.init(4) == p;
            print p.x;
        "#;
        let (stdout, errors) = run(source);
        assert_eq!(errors, vec![]);
        assert_eq!(stdout, "-1\n2\nTrue\n4\n");
    }

    #[test]
    fn super_dispatches_from_defining_class() {
        let source = r#"
            class A { name() { return "A"; } }
            class B < A { name() { return "B>" + super.name(); } }
            class C < B {}
            print C().name();
        "#;
        let (stdout, errors) = run(source);
        assert_eq!(errors, vec![]);
        assert_eq!(stdout, "B>A\n");
    }

    #[test]
    fn superclass_must_be_class() {
        let (_, errors) = run("var NotAClass = 1; class A < NotAClass {}");
        assert_eq!(errors[0].0.to_string(), "TypeError: Superclass must be a class.");
    }

    #[test]
    fn unbounded_recursion_overflows() {
        // Deep enough to need more than the default test-thread stack.
        let handle = std::thread::Builder::new()
            .stack_size(256 * 1024 * 1024)
            .spawn(|| run("fun f() { f(); } f();"))
            .unwrap();
        let (_, errors) = handle.join().unwrap();
        assert_eq!(errors[0].0, Error::OverflowError(OverflowError::StackOverflow));
    }

    #[test]
    fn clock_is_a_number() {
        let (stdout, _) = run("print clock() > 0; print clock;");
        assert_eq!(stdout, "True\n<native fn>\n");
    }
}
