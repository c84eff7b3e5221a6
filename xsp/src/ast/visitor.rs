//! Tree walkers.
//!
//! [`Visitor`] has one method per node family with a default that descends
//! into owned children via the free `walk_*` functions; passes override the
//! methods they care about and call the walker for the rest. Function bodies
//! and variable initializers are detached from the program while they are
//! being walked, so a pass can mutate declarations through `&mut Program`
//! without aliasing the tree it is standing in.
//!
//! [`Tracker`] carries the context stacks later passes need (enclosing
//! function, struct, uniform buffer). Popping an empty stack is a contract
//! violation and panics.

use super::{
    Expr, ExprKind, FunctionId, NodeFlags, Program, Stmt, StmtKind, StructId, SwitchCase, SymbolRef, UniformBufferId,
    VarId,
};
use crate::diag::Result;

pub trait Visitor: Sized {
    fn visit_program(&mut self, prog: &mut Program) -> Result<()> {
        walk_program(self, prog)
    }

    fn visit_stmt(&mut self, stmt: &mut Stmt, prog: &mut Program) -> Result<()> {
        walk_stmt(self, stmt, prog)
    }

    fn visit_expr(&mut self, expr: &mut Expr, prog: &mut Program) -> Result<()> {
        walk_expr(self, expr, prog)
    }

    fn visit_switch_case(&mut self, case: &mut SwitchCase, prog: &mut Program) -> Result<()> {
        walk_switch_case(self, case, prog)
    }

    fn visit_var_decl(&mut self, id: VarId, prog: &mut Program) -> Result<()> {
        walk_var_decl(self, id, prog)
    }

    fn visit_buffer_decl(&mut self, id: super::BufferId, prog: &mut Program) -> Result<()> {
        let _ = (id, prog);
        Ok(())
    }

    fn visit_sampler_decl(&mut self, id: super::SamplerId, prog: &mut Program) -> Result<()> {
        let _ = (id, prog);
        Ok(())
    }

    fn visit_alias_decl(&mut self, id: super::AliasId, prog: &mut Program) -> Result<()> {
        let _ = (id, prog);
        Ok(())
    }

    fn visit_struct_decl(&mut self, id: StructId, prog: &mut Program) -> Result<()> {
        walk_struct_decl(self, id, prog)
    }

    fn visit_function_decl(&mut self, id: FunctionId, prog: &mut Program) -> Result<()> {
        walk_function_decl(self, id, prog)
    }

    fn visit_uniform_buffer_decl(&mut self, id: UniformBufferId, prog: &mut Program) -> Result<()> {
        walk_uniform_buffer_decl(self, id, prog)
    }
}

pub fn walk_program<V: Visitor>(v: &mut V, prog: &mut Program) -> Result<()> {
    let mut stmts = std::mem::take(&mut prog.global_stmts);
    let result = stmts.iter_mut().try_for_each(|stmt| v.visit_stmt(stmt, prog));
    prog.global_stmts = stmts;
    result
}

pub fn walk_stmt<V: Visitor>(v: &mut V, stmt: &mut Stmt, prog: &mut Program) -> Result<()> {
    match &mut stmt.kind {
        StmtKind::Null | StmtKind::CtrlTransfer(_) => Ok(()),
        StmtKind::Scope(block) => block.stmts.iter_mut().try_for_each(|stmt| v.visit_stmt(stmt, prog)),
        StmtKind::For {
            init,
            condition,
            iteration,
            body,
        } => {
            if let Some(init) = init {
                v.visit_stmt(init, prog)?;
            }
            if let Some(condition) = condition {
                v.visit_expr(condition, prog)?;
            }
            if let Some(iteration) = iteration {
                v.visit_expr(iteration, prog)?;
            }
            v.visit_stmt(body, prog)
        }
        StmtKind::While { condition, body } => {
            v.visit_expr(condition, prog)?;
            v.visit_stmt(body, prog)
        }
        StmtKind::DoWhile { body, condition } => {
            v.visit_stmt(body, prog)?;
            v.visit_expr(condition, prog)
        }
        StmtKind::If {
            condition,
            body,
            else_body,
        } => {
            v.visit_expr(condition, prog)?;
            v.visit_stmt(body, prog)?;
            if let Some(else_body) = else_body {
                v.visit_stmt(else_body, prog)?;
            }
            Ok(())
        }
        StmtKind::Switch { selector, cases } => {
            v.visit_expr(selector, prog)?;
            cases.iter_mut().try_for_each(|case| v.visit_switch_case(case, prog))
        }
        StmtKind::Expr(expr) => v.visit_expr(expr, prog),
        StmtKind::Return(expr) => match expr {
            Some(expr) => v.visit_expr(expr, prog),
            None => Ok(()),
        },
        StmtKind::VarDecl(decl_stmt) => {
            let vars: Vec<VarId> = decl_stmt.decls.iter().copied().collect();
            vars.into_iter().try_for_each(|id| v.visit_var_decl(id, prog))
        }
        StmtKind::BufferDecl(ids) => {
            let ids = ids.clone();
            ids.into_iter().try_for_each(|id| v.visit_buffer_decl(id, prog))
        }
        StmtKind::SamplerDecl(ids) => {
            let ids = ids.clone();
            ids.into_iter().try_for_each(|id| v.visit_sampler_decl(id, prog))
        }
        StmtKind::AliasDecl(ids) => {
            let ids = ids.clone();
            ids.into_iter().try_for_each(|id| v.visit_alias_decl(id, prog))
        }
        StmtKind::Basic(symbol) => match *symbol {
            SymbolRef::Function(id) => v.visit_function_decl(id, prog),
            SymbolRef::Struct(id) => v.visit_struct_decl(id, prog),
            SymbolRef::UniformBuffer(id) => v.visit_uniform_buffer_decl(id, prog),
            SymbolRef::Var(id) => v.visit_var_decl(id, prog),
            SymbolRef::Buffer(id) => v.visit_buffer_decl(id, prog),
            SymbolRef::Sampler(id) => v.visit_sampler_decl(id, prog),
            SymbolRef::Alias(id) => v.visit_alias_decl(id, prog),
        },
    }
}

pub fn walk_switch_case<V: Visitor>(v: &mut V, case: &mut SwitchCase, prog: &mut Program) -> Result<()> {
    if let Some(expr) = &mut case.expr {
        v.visit_expr(expr, prog)?;
    }
    case.stmts.iter_mut().try_for_each(|stmt| v.visit_stmt(stmt, prog))
}

pub fn walk_expr<V: Visitor>(v: &mut V, expr: &mut Expr, prog: &mut Program) -> Result<()> {
    match &mut expr.kind {
        ExprKind::Null | ExprKind::Literal { .. } | ExprKind::TypeSpecifier(_) => Ok(()),
        ExprKind::Sequence(exprs) | ExprKind::Initializer(exprs) => {
            exprs.iter_mut().try_for_each(|expr| v.visit_expr(expr, prog))
        }
        ExprKind::Ternary {
            cond,
            then_expr,
            else_expr,
        } => {
            v.visit_expr(cond, prog)?;
            v.visit_expr(then_expr, prog)?;
            v.visit_expr(else_expr, prog)
        }
        ExprKind::Binary { lhs, rhs, .. } => {
            v.visit_expr(lhs, prog)?;
            v.visit_expr(rhs, prog)
        }
        ExprKind::Unary { expr, .. } | ExprKind::PostUnary { expr, .. } | ExprKind::Bracket(expr) => {
            v.visit_expr(expr, prog)
        }
        ExprKind::Call(call) => {
            if let Some(prefix) = &mut call.prefix {
                v.visit_expr(prefix, prog)?;
            }
            call.args.iter_mut().try_for_each(|arg| v.visit_expr(arg, prog))
        }
        ExprKind::Ident(ident_expr) => match &mut ident_expr.prefix {
            Some(prefix) => v.visit_expr(prefix, prog),
            None => Ok(()),
        },
        ExprKind::Assign { lvalue, rvalue, .. } => {
            v.visit_expr(lvalue, prog)?;
            v.visit_expr(rvalue, prog)
        }
        ExprKind::Subscript { prefix, indices } => {
            v.visit_expr(prefix, prog)?;
            indices.iter_mut().try_for_each(|index| v.visit_expr(index, prog))
        }
        ExprKind::Cast { expr, .. } => v.visit_expr(expr, prog),
    }
}

/// Walks the initializer of a variable declaration with the initializer
/// detached, so the visitor can query and mutate other declarations.
pub fn walk_var_decl<V: Visitor>(v: &mut V, id: VarId, prog: &mut Program) -> Result<()> {
    if let Some(mut init) = prog.vars[id].initializer.take() {
        let result = v.visit_expr(&mut init, prog);
        prog.vars[id].initializer = Some(init);
        result
    } else {
        Ok(())
    }
}

pub fn walk_struct_decl<V: Visitor>(v: &mut V, id: StructId, prog: &mut Program) -> Result<()> {
    let members: Vec<VarId> = prog.structs[id].members.clone();
    members.into_iter().try_for_each(|member| v.visit_var_decl(member, prog))
}

/// Walks parameters and the (detached) body of a function.
pub fn walk_function_decl<V: Visitor>(v: &mut V, id: FunctionId, prog: &mut Program) -> Result<()> {
    let params: Vec<VarId> = prog.functions[id].params.clone();
    params.into_iter().try_for_each(|param| v.visit_var_decl(param, prog))?;

    if let Some(mut body) = prog.functions[id].body.take() {
        let result = body.stmts.iter_mut().try_for_each(|stmt| v.visit_stmt(stmt, prog));
        prog.functions[id].body = Some(body);
        result
    } else {
        Ok(())
    }
}

pub fn walk_uniform_buffer_decl<V: Visitor>(v: &mut V, id: UniformBufferId, prog: &mut Program) -> Result<()> {
    let members: Vec<VarId> = prog.uniform_buffers[id].members.clone();
    members.into_iter().try_for_each(|member| v.visit_var_decl(member, prog))
}

/// Context stacks maintained by the tracking passes.
///
/// Declaration contexts hold arena ids; expression contexts (enclosing
/// calls, l-value slots, declaration statements) are depth counters, since
/// the owning nodes live in the tree being walked.
#[derive(Debug, Default)]
pub struct Tracker {
    func_decl_stack: Vec<FunctionId>,
    entry_point_level: Option<usize>,
    secondary_entry_point_level: Option<usize>,
    struct_decl_stack: Vec<StructId>,
    uniform_buffer_stack: Vec<UniformBufferId>,
    self_param_stack: Vec<VarId>,
    call_expr_depth: usize,
    lvalue_expr_depth: usize,
    var_decl_stmt_depth: usize,
    alias_decl_stmt_depth: usize,
}

impl Tracker {
    pub fn new() -> Tracker {
        Tracker::default()
    }

    /* ----- Function declaration tracker ----- */

    pub fn push_function_decl(&mut self, id: FunctionId, prog: &Program) {
        self.func_decl_stack.push(id);
        let level = self.func_decl_stack.len();
        if prog.functions[id].flags.contains(NodeFlags::ENTRY_POINT) {
            self.entry_point_level = Some(level);
        } else if prog.functions[id].flags.contains(NodeFlags::SECONDARY_ENTRY_POINT) {
            self.secondary_entry_point_level = Some(level);
        }
    }

    pub fn pop_function_decl(&mut self) {
        let level = self.func_decl_stack.len();
        if self.entry_point_level == Some(level) {
            self.entry_point_level = None;
        }
        if self.secondary_entry_point_level == Some(level) {
            self.secondary_entry_point_level = None;
        }
        self.func_decl_stack.pop().expect("function declaration stack underflow");
    }

    pub fn inside_function_decl(&self) -> bool {
        !self.func_decl_stack.is_empty()
    }

    pub fn inside_entry_point(&self) -> bool {
        self.entry_point_level
            .map_or(false, |level| self.func_decl_stack.len() >= level)
    }

    pub fn inside_secondary_entry_point(&self) -> bool {
        self.secondary_entry_point_level
            .map_or(false, |level| self.func_decl_stack.len() >= level)
    }

    pub fn active_function_decl(&self) -> Option<FunctionId> {
        self.func_decl_stack.last().copied()
    }

    /* ----- Structure declaration tracker ----- */

    pub fn push_struct_decl(&mut self, id: StructId) {
        self.struct_decl_stack.push(id);
    }

    pub fn pop_struct_decl(&mut self) {
        self.struct_decl_stack.pop().expect("struct declaration stack underflow");
    }

    pub fn inside_struct_decl(&self) -> bool {
        !self.struct_decl_stack.is_empty()
    }

    pub fn active_struct_decl(&self) -> Option<StructId> {
        self.struct_decl_stack.last().copied()
    }

    /* ----- Uniform buffer tracker ----- */

    pub fn push_uniform_buffer_decl(&mut self, id: UniformBufferId) {
        self.uniform_buffer_stack.push(id);
    }

    pub fn pop_uniform_buffer_decl(&mut self) {
        self.uniform_buffer_stack.pop().expect("uniform buffer stack underflow");
    }

    pub fn inside_uniform_buffer_decl(&self) -> bool {
        !self.uniform_buffer_stack.is_empty()
    }

    /* ----- Self parameter tracker ----- */

    pub fn push_self_parameter(&mut self, id: VarId) {
        self.self_param_stack.push(id);
    }

    pub fn pop_self_parameter(&mut self) {
        self.self_param_stack.pop().expect("self parameter stack underflow");
    }

    pub fn active_self_parameter(&self) -> Option<VarId> {
        self.self_param_stack.last().copied()
    }

    /* ----- Expression context trackers ----- */

    pub fn push_call_expr(&mut self) {
        self.call_expr_depth += 1;
    }

    pub fn pop_call_expr(&mut self) {
        assert!(self.call_expr_depth > 0, "call expression stack underflow");
        self.call_expr_depth -= 1;
    }

    pub fn inside_call_expr(&self) -> bool {
        self.call_expr_depth > 0
    }

    /// Marks that the expressions below occupy an l-value slot.
    pub fn push_lvalue_expr(&mut self) {
        self.lvalue_expr_depth += 1;
    }

    pub fn pop_lvalue_expr(&mut self) {
        assert!(self.lvalue_expr_depth > 0, "l-value expression stack underflow");
        self.lvalue_expr_depth -= 1;
    }

    pub fn inside_lvalue_expr(&self) -> bool {
        self.lvalue_expr_depth > 0
    }

    pub fn push_var_decl_stmt(&mut self) {
        self.var_decl_stmt_depth += 1;
    }

    pub fn pop_var_decl_stmt(&mut self) {
        assert!(self.var_decl_stmt_depth > 0, "variable declaration stack underflow");
        self.var_decl_stmt_depth -= 1;
    }

    pub fn inside_var_decl_stmt(&self) -> bool {
        self.var_decl_stmt_depth > 0
    }

    pub fn push_alias_decl_stmt(&mut self) {
        self.alias_decl_stmt_depth += 1;
    }

    pub fn pop_alias_decl_stmt(&mut self) {
        assert!(self.alias_decl_stmt_depth > 0, "alias declaration stack underflow");
        self.alias_decl_stmt_depth -= 1;
    }

    pub fn inside_alias_decl_stmt(&self) -> bool {
        self.alias_decl_stmt_depth > 0
    }

    pub fn inside_global_scope(&self) -> bool {
        !self.inside_function_decl()
            && !self.inside_struct_decl()
            && !self.inside_uniform_buffer_decl()
            && !self.inside_var_decl_stmt()
    }
}
