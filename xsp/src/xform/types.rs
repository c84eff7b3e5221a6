//! Type reset propagation.
//!
//! When a pass mutates a variable's declared type (e.g. an integer system
//! value semantic forces a GLSL-friendly type), every expression whose
//! transitive type depends on that variable must re-derive its buffered
//! type. The converter walks in post-order: an identifier resolving to a
//! converted symbol raises the reset flag, and every enclosing expression
//! resets its own buffered type on return.

use crate::ast::{
    visitor::{self, Visitor},
    Expr, ExprKind, Program, SymbolRef, VarId,
};
use crate::diag::Result;
use indexmap::IndexSet;
use tracing::debug;

pub struct TypeConverter<F> {
    on_visit_var_decl: F,
    converted_symbols: IndexSet<VarId>,
    reset_expr_types: bool,
}

impl<F> TypeConverter<F>
where
    F: FnMut(VarId, &mut Program) -> bool,
{
    /// Applies `on_visit_var_decl` to every variable declaration; the
    /// callback returns true when it changed the variable's type. All
    /// expressions depending on a changed variable re-derive their types.
    pub fn convert(prog: &mut Program, on_visit_var_decl: F) -> Result<()> {
        debug!(target: "xsp", "type conversion");
        let mut converter = TypeConverter {
            on_visit_var_decl,
            converted_symbols: IndexSet::new(),
            reset_expr_types: false,
        };
        converter.visit_program(prog)
    }
}

impl<F> Visitor for TypeConverter<F>
where
    F: FnMut(VarId, &mut Program) -> bool,
{
    fn visit_var_decl(&mut self, id: VarId, prog: &mut Program) -> Result<()> {
        visitor::walk_var_decl(self, id, prog)?;
        if (self.on_visit_var_decl)(id, prog) {
            self.converted_symbols.insert(id);
        }
        Ok(())
    }

    fn visit_expr(&mut self, expr: &mut Expr, prog: &mut Program) -> Result<()> {
        visitor::walk_expr(self, expr, prog)?;

        if let ExprKind::Ident(ident_expr) = &expr.kind {
            if let Some(SymbolRef::Var(id)) = ident_expr.symbol {
                if self.converted_symbols.contains(&id) {
                    self.reset_expr_types = true;
                }
            }
        }

        if self.reset_expr_types {
            expr.reset_type_denoter();
        }
        Ok(())
    }

    fn visit_stmt(&mut self, stmt: &mut crate::ast::Stmt, prog: &mut Program) -> Result<()> {
        // the reset flag does not leak across statement boundaries
        visitor::walk_stmt(self, stmt, prog)?;
        self.reset_expr_types = false;
        Ok(())
    }
}
