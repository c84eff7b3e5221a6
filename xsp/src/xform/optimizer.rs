//! Constant folding and dead-statement removal.
//!
//! Folding is opportunistic: every expression is offered to the evaluator
//! and replaced by a literal on success; failures leave the tree untouched.
//! Null statements and empty code blocks are removed in place, and doubled
//! brackets collapse.

use crate::ast::{
    factory,
    visitor::{self, Visitor},
    Expr, ExprKind, Program, Stmt, StmtKind,
};
use crate::diag::Result;
use crate::eval;
use tracing::debug;

pub struct Optimizer;

impl Optimizer {
    pub fn optimize(prog: &mut Program) -> Result<()> {
        debug!(target: "xsp", "optimization");
        let mut optimizer = Optimizer;
        optimizer.visit_program(prog)
    }

    fn optimize_stmt_list(&mut self, stmts: &mut Vec<Stmt>) {
        stmts.retain(|stmt| !can_remove_stmt(stmt));
    }

    fn optimize_expr(&mut self, expr: &mut Expr, prog: &Program) {
        // skip expressions that are already literals
        if matches!(expr.kind, ExprKind::Literal { .. }) {
            return;
        }
        if let Some(value) = eval::evaluate(expr, prog) {
            if let Some(literal) = factory::make_literal_expr_or_null(&value) {
                *expr = literal;
            }
        }
    }
}

fn can_remove_stmt(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::Null => true,
        StmtKind::Scope(block) => block.stmts.is_empty(),
        _ => false,
    }
}

impl Visitor for Optimizer {
    fn visit_stmt(&mut self, stmt: &mut Stmt, prog: &mut Program) -> Result<()> {
        if let StmtKind::Scope(block) = &mut stmt.kind {
            self.optimize_stmt_list(&mut block.stmts);
        }
        visitor::walk_stmt(self, stmt, prog)
    }

    fn visit_switch_case(&mut self, case: &mut crate::ast::SwitchCase, prog: &mut Program) -> Result<()> {
        self.optimize_stmt_list(&mut case.stmts);
        visitor::walk_switch_case(self, case, prog)
    }

    fn visit_function_decl(&mut self, id: crate::ast::FunctionId, prog: &mut Program) -> Result<()> {
        if let Some(body) = &mut prog.functions[id].body {
            self.optimize_stmt_list(&mut body.stmts);
        }
        visitor::walk_function_decl(self, id, prog)
    }

    fn visit_expr(&mut self, expr: &mut Expr, prog: &mut Program) -> Result<()> {
        visitor::walk_expr(self, expr, prog)?;

        // ((x)) collapses to (x)
        if let ExprKind::Bracket(inner) = &mut expr.kind {
            if matches!(inner.kind, ExprKind::Bracket(_)) {
                let ExprKind::Bracket(inner_inner) = std::mem::replace(&mut inner.kind, ExprKind::Null) else {
                    unreachable!()
                };
                inner.kind = inner_inner.kind;
            }
        }

        self.optimize_expr(expr, prog);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, DataType};

    #[test]
    fn folds_constant_binary_expr() {
        let mut prog = Program::new();
        let mut expr = factory::make_binary_expr(
            factory::make_literal_expr(DataType::INT, "6"),
            BinaryOp::Mul,
            factory::make_literal_expr(DataType::INT, "7"),
        );
        Optimizer.visit_expr(&mut expr, &mut prog).unwrap();
        match expr.kind {
            ExprKind::Literal { value, .. } => assert_eq!(value, "42"),
            other => panic!("expected folded literal, got {other:?}"),
        }
    }

    #[test]
    fn removes_null_and_empty_block_stmts() {
        let mut prog = Program::new();
        let mut scope = factory::make_scope_stmt_list(vec![
            Stmt::new(StmtKind::Null),
            factory::make_scope_stmt_list(Vec::new()),
            Stmt::new(StmtKind::Return(None)),
        ]);
        Optimizer.visit_stmt(&mut scope, &mut prog).unwrap();
        match scope.kind {
            StmtKind::Scope(block) => {
                assert_eq!(block.stmts.len(), 1);
                assert!(matches!(block.stmts[0].kind, StmtKind::Return(None)));
            }
            other => panic!("expected scope, got {other:?}"),
        }
    }

    #[test]
    fn collapses_double_brackets() {
        let mut prog = Program::new();
        let ident = factory::make_literal_expr(DataType::INT, "1");
        let sum = factory::make_binary_expr(ident, BinaryOp::Add, factory::make_literal_expr(DataType::FLOAT, "0.5"));
        let mut expr = factory::make_bracket_expr(factory::make_bracket_expr(sum));
        Optimizer.visit_expr(&mut expr, &mut prog).unwrap();
        // folding runs after bracket reduction, so the whole thing is a literal
        match expr.kind {
            ExprKind::Literal { value, .. } => assert_eq!(value, "1.5"),
            other => panic!("expected literal, got {other:?}"),
        }
    }
}
