use std::mem;
use std::rc::Rc;

use lox_common::error::{Error, ErrorS, NameError, SyntaxError};
use lox_common::types::Span;
use lox_syntax::ast::{Expr, ExprS, Program, Stmt, StmtFun, StmtS, Var};
use rustc_hash::FxHashMap;
use tracing::trace;

/// Static pass run between parsing and execution.
///
/// Every local reference is annotated with the number of scopes between the
/// use and its binding. References left unannotated are globals. Misuses of
/// `return`, `this` and `super` are reported here, before anything runs.
#[derive(Debug, Default)]
pub struct Resolver {
    /// Block scopes only; the global scope is never pushed. `false` marks a
    /// name that is declared but whose initializer has not finished.
    scopes: Vec<FxHashMap<String, bool>>,
    function: FunctionType,
    class: ClassType,
    errors: Vec<ErrorS>,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
enum FunctionType {
    #[default]
    None,
    Function,
    Initializer,
    Method,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
enum ClassType {
    #[default]
    None,
    Class,
    Subclass,
}

impl Resolver {
    /// Resolves the whole program in source order. Resolution carries on past
    /// errors so that all of them are returned at once.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn resolve(mut self, program: &mut Program) -> Vec<ErrorS> {
        for stmt_s in program.stmts.iter_mut() {
            self.resolve_stmt(stmt_s);
        }
        self.errors
    }

    fn resolve_stmt(&mut self, stmt_s: &mut StmtS) {
        let (stmt, span) = stmt_s;
        match stmt {
            Stmt::Block(block) => {
                self.begin_scope();
                for stmt_s in block.stmts.iter_mut() {
                    self.resolve_stmt(stmt_s);
                }
                self.end_scope();
            }
            Stmt::Class(class) => {
                let enclosing = mem::replace(&mut self.class, ClassType::Class);
                self.declare_define(&class.name, span);

                if let Some(super_) = &mut class.super_ {
                    self.class = ClassType::Subclass;
                    if let (Expr::Var(var), super_span) = super_ {
                        if var.var.name == class.name {
                            self.error(
                                SyntaxError::InheritFromSelf { name: class.name.clone() },
                                super_span,
                            );
                        }
                    }
                    self.resolve_expr(super_);
                    self.begin_scope();
                    self.declare_define("super", span);
                }

                self.begin_scope();
                self.declare_define("this", span);
                for (method, span) in class.methods.iter_mut() {
                    let type_ = if method.name == "init" {
                        FunctionType::Initializer
                    } else {
                        FunctionType::Method
                    };
                    self.resolve_fun(Rc::make_mut(method), type_, span);
                }
                self.end_scope();

                if class.super_.is_some() {
                    self.end_scope();
                }
                self.class = enclosing;
            }
            Stmt::Expr(expr) => self.resolve_expr(&mut expr.value),
            Stmt::Fun(fun) => {
                // Defined before the body is resolved, so that the function
                // can call itself.
                self.declare_define(&fun.name, span);
                self.resolve_fun(Rc::make_mut(fun), FunctionType::Function, span);
            }
            Stmt::If(if_) => {
                self.resolve_expr(&mut if_.cond);
                self.resolve_stmt(&mut if_.then);
                if let Some(else_) = &mut if_.else_ {
                    self.resolve_stmt(else_);
                }
            }
            Stmt::Print(print) => self.resolve_expr(&mut print.value),
            Stmt::Return(return_) => {
                if self.function == FunctionType::None {
                    self.error(SyntaxError::ReturnOutsideFunction, span);
                }
                if let Some(value) = &mut return_.value {
                    if self.function == FunctionType::Initializer {
                        self.error(SyntaxError::ReturnInInitializer, span);
                    }
                    self.resolve_expr(value);
                }
            }
            Stmt::Var(var) => {
                self.declare(&var.var.name, span);
                if let Some(value) = &mut var.value {
                    self.resolve_expr(value);
                }
                self.define(&var.var.name);
            }
            Stmt::While(while_) => {
                self.resolve_expr(&mut while_.cond);
                self.resolve_stmt(&mut while_.body);
            }
        }
    }

    fn resolve_expr(&mut self, expr_s: &mut ExprS) {
        let (expr, span) = expr_s;
        match expr {
            Expr::Assign(assign) => {
                self.resolve_expr(&mut assign.value);
                self.access(&mut assign.var);
            }
            Expr::Call(call) => {
                self.resolve_expr(&mut call.callee);
                for arg in call.args.iter_mut() {
                    self.resolve_expr(arg);
                }
            }
            Expr::Get(get) => self.resolve_expr(&mut get.object),
            Expr::Grouping(grouping) => self.resolve_expr(&mut grouping.value),
            Expr::Infix(infix) => {
                self.resolve_expr(&mut infix.lt);
                self.resolve_expr(&mut infix.rt);
            }
            Expr::Literal(_) => {}
            Expr::Logical(logical) => {
                self.resolve_expr(&mut logical.lt);
                self.resolve_expr(&mut logical.rt);
            }
            Expr::Prefix(prefix) => self.resolve_expr(&mut prefix.rt),
            Expr::Set(set) => {
                self.resolve_expr(&mut set.value);
                self.resolve_expr(&mut set.object);
            }
            Expr::Super(super_) => {
                match self.class {
                    ClassType::None => self.error(SyntaxError::SuperOutsideClass, span),
                    ClassType::Class => self.error(SyntaxError::SuperWithoutSuperclass, span),
                    ClassType::Subclass => {}
                }
                self.access(&mut super_.super_);
            }
            Expr::This(this) => {
                if self.class == ClassType::None {
                    self.error(SyntaxError::ThisOutsideClass, span);
                    return;
                }
                self.access(&mut this.this);
            }
            Expr::Var(var) => {
                if let Some(scope) = self.scopes.last() {
                    if scope.get(&var.var.name) == Some(&false) {
                        self.error(
                            NameError::AccessInsideInitializer { name: var.var.name.clone() },
                            span,
                        );
                    }
                }
                self.access(&mut var.var);
            }
        }
    }

    fn resolve_fun(&mut self, fun: &mut StmtFun, type_: FunctionType, span: &Span) {
        let enclosing = mem::replace(&mut self.function, type_);
        self.begin_scope();
        for param in &fun.params {
            self.declare_define(param, span);
        }
        for stmt_s in fun.body.stmts.iter_mut() {
            self.resolve_stmt(stmt_s);
        }
        self.end_scope();
        self.function = enclosing;
    }

    fn declare_define(&mut self, name: &str, span: &Span) {
        self.declare(name, span);
        self.define(name);
    }

    fn declare(&mut self, name: &str, span: &Span) {
        let Some(scope) = self.scopes.last_mut() else { return };
        if scope.insert(name.to_string(), false).is_some() {
            self.error(NameError::AlreadyDefined { name: name.to_string() }, span);
        }
    }

    fn define(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), true);
        }
    }

    /// Records how many scopes out `var` is bound. Not finding it in any
    /// block scope means it is global, and the depth stays `None`.
    fn access(&mut self, var: &mut Var) {
        var.depth = self.scopes.iter().rev().position(|scope| scope.contains_key(&var.name));
        trace!(name = %var.name, depth = ?var.depth, "resolved");
    }

    fn error(&mut self, error: impl Into<Error>, span: &Span) {
        self.errors.push((error.into(), span.clone()));
    }

    fn begin_scope(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    fn end_scope(&mut self) {
        self.scopes.pop().unwrap_or_else(|| unreachable!("attempted to pop global scope"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use lox_syntax::ast::{ExprVar, StmtPrint};
    use pretty_assertions::assert_eq;

    fn resolve(source: &str) -> (Program, Vec<ErrorS>) {
        let (mut program, errors) = lox_syntax::parse(source);
        assert_eq!(errors, vec![]);
        let errors = Resolver::default().resolve(&mut program);
        (program, errors)
    }

    fn messages(source: &str) -> Vec<String> {
        resolve(source).1.into_iter().map(|(e, _)| e.to_string()).collect()
    }

    /// Depth of the variable printed by the `print` statement at `path`,
    /// following nested blocks.
    fn printed_depth(program: &Program, path: &[usize]) -> Option<usize> {
        let mut stmts = &program.stmts;
        let (last, blocks) = path.split_last().unwrap();
        for &idx in blocks {
            match &stmts[idx].0 {
                Stmt::Block(block) => stmts = &block.stmts,
                stmt => panic!("expected block, got {stmt:?}"),
            }
        }
        match &stmts[*last].0 {
            Stmt::Print(StmtPrint { value: (Expr::Var(ExprVar { var }), _) }) => var.depth,
            stmt => panic!("expected print of variable, got {stmt:?}"),
        }
    }

    #[test]
    fn globals_stay_unresolved() {
        let (program, errors) = resolve("var a = 1; print a;");
        assert_eq!(errors, vec![]);
        assert_eq!(printed_depth(&program, &[1]), None);
    }

    #[test]
    fn depth_counts_enclosing_blocks() {
        let (program, errors) = resolve("{ var a = 1; { { print a; } } print a; }");
        assert_eq!(errors, vec![]);
        assert_eq!(printed_depth(&program, &[0, 1, 0, 0]), Some(2));
        assert_eq!(printed_depth(&program, &[0, 2]), Some(0));
    }

    #[test]
    fn closure_binding_is_fixed_at_resolution() {
        let source = r#"
            var a = "global";
            {
                fun show() { print a; }
                var a = "block";
            }
        "#;
        let (program, errors) = resolve(source);
        assert_eq!(errors, vec![]);
        let Stmt::Block(block) = &program.stmts[1].0 else { panic!("expected block") };
        let Stmt::Fun(fun) = &block.stmts[0].0 else { panic!("expected function") };
        match &fun.body.stmts[0].0 {
            Stmt::Print(StmtPrint { value: (Expr::Var(ExprVar { var }), _) }) => {
                assert_eq!(var.depth, None)
            }
            stmt => panic!("unexpected statement: {stmt:?}"),
        }
    }

    #[test]
    fn read_in_own_initializer() {
        assert_eq!(messages("{ var a = a; }"), vec![
            "NameError: Can't read local variable in its own initializer."
        ]);
        assert_eq!(messages("var a = a;"), Vec::<String>::new());
    }

    #[test]
    fn redeclaration_in_local_scope() {
        let (_, errors) = resolve("{ var a = 1; var a = 2; }");
        assert_eq!(errors, vec![(
            Error::NameError(NameError::AlreadyDefined { name: "a".to_string() }),
            13..23
        )]);
        assert_eq!(messages("var a = 1; var a = 2;"), Vec::<String>::new());
        assert_eq!(messages("fun f(a, a) {}"), vec![
            "NameError: Already a variable with this name in this scope."
        ]);
    }

    #[test]
    fn return_placement() {
        assert_eq!(messages("return 1;"), vec!["SyntaxError: Can't return from top-level code."]);
        assert_eq!(messages("class A { init() { return 1; } }"), vec![
            "SyntaxError: Can't return a value from an initializer."
        ]);
        assert_eq!(messages("class A { init() { return; } }"), Vec::<String>::new());
        assert_eq!(
            messages("class A { init() { fun f() { return 1; } } }"),
            Vec::<String>::new()
        );
    }

    #[test]
    fn this_and_super_placement() {
        assert_eq!(messages("print this;"), vec![
            "SyntaxError: Can't use 'this' outside of a class."
        ]);
        assert_eq!(messages("fun f() { return this; }"), vec![
            "SyntaxError: Can't use 'this' outside of a class."
        ]);
        assert_eq!(messages("super.foo();"), vec![
            "SyntaxError: Can't use 'super' outside of a class."
        ]);
        assert_eq!(messages("class A { foo() { super.foo(); } }"), vec![
            "SyntaxError: Can't use 'super' in a class with no superclass."
        ]);
        assert_eq!(
            messages("class A {} class B < A { foo() { super.foo(); } }"),
            Vec::<String>::new()
        );
    }

    #[test]
    fn class_inheriting_from_itself() {
        assert_eq!(messages("class A < A {}"), vec!["SyntaxError: A class can't inherit from itself."]);
    }

    #[test]
    fn errors_accumulate() {
        assert_eq!(messages("return; print this; { var a = 1; var a = 2; }").len(), 3);
    }
}
