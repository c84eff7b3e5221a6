//! Reachability analysis.
//!
//! Starting from the entry point(s), marks every declaration that can
//! execute, records intrinsic and matrix-subscript usage on the program,
//! marks written-to variables and image-read buffers, and rejects recursive
//! call chains (the full call path is attached to the report as a hint).

use crate::ast::{
    visitor::{self, Tracker, Visitor},
    BufferId, Expr, ExprKind, FunctionId, MatrixSubscript, NodeFlags, Program, SamplerId, Semantic,
    StorageFlags, StructId, SymbolRef, TypeDenoter, UniformBufferId, VarId,
};
use crate::ast::{AliasId, Intrinsic, Stmt};
use crate::diag::{CompileError, ReportHandler, Result};
use crate::ShaderTarget;
use tracing::debug;

pub struct ReferenceAnalyzer<'a> {
    shader_target: ShaderTarget,
    call_path: Vec<FunctionId>,
    tracker: Tracker,
    handler: &'a mut ReportHandler,
}

impl<'a> ReferenceAnalyzer<'a> {
    /// Marks everything reachable from the entry point and the secondary
    /// entry point (tessellation patch-constant function).
    pub fn mark_references_from_entry_point(
        prog: &mut Program,
        shader_target: ShaderTarget,
        handler: &'a mut ReportHandler,
    ) -> Result<()> {
        debug!(target: "xsp", "reference analysis");
        let mut analyzer = ReferenceAnalyzer {
            shader_target,
            call_path: Vec::new(),
            tracker: Tracker::new(),
            handler,
        };

        if let Some(entry) = prog.entry_point {
            analyzer.visit_function_decl(entry, prog)?;
        }
        if let Some(patch_const) = prog.layout_tess_control.patch_const_function {
            analyzer.visit_function_decl(patch_const, prog)?;
        }
        Ok(())
    }

    fn reachable_var(&mut self, id: VarId, prog: &mut Program) -> bool {
        prog.vars[id].flags.set_once(NodeFlags::REACHABLE)
    }

    fn visit_symbol(&mut self, symbol: SymbolRef, prog: &mut Program) -> Result<()> {
        match symbol {
            SymbolRef::Var(id) => self.visit_var_decl(id, prog),
            SymbolRef::Buffer(id) => self.visit_buffer_decl(id, prog),
            SymbolRef::Sampler(id) => self.visit_sampler_decl(id, prog),
            SymbolRef::Struct(id) => self.visit_struct_decl(id, prog),
            SymbolRef::Alias(id) => self.visit_alias_decl(id, prog),
            SymbolRef::Function(id) => self.visit_function_decl(id, prog),
            SymbolRef::UniformBuffer(id) => self.visit_uniform_buffer_decl(id, prog),
        }
    }

    /// Marks the declaration a type denoter refers to.
    fn visit_type_symbol(&mut self, ty: &TypeDenoter, prog: &mut Program) -> Result<()> {
        match ty {
            TypeDenoter::Array { sub, .. } => self.visit_type_symbol(sub, prog),
            other => match other.symbol_ref() {
                Some(symbol) => self.visit_symbol(symbol, prog),
                None => Ok(()),
            },
        }
    }

    fn visit_call(&mut self, expr: &mut Expr, prog: &mut Program) -> Result<()> {
        let area = expr.area;
        let can_inline_wrapper = expr.flags.contains(NodeFlags::CAN_INLINE_INTRINSIC_WRAPPER);
        let ExprKind::Call(call) = &mut expr.kind else {
            return Ok(());
        };

        if let Some(callee) = call.function {
            let callee = prog.function_impl(callee);

            // recursion shows as the callee already sitting on the call path
            if self.call_path.contains(&callee) {
                for &frame in &self.call_path {
                    self.handler.hint_for_next_report(format!(
                        "  '{}'",
                        prog.functions[frame].ident.original()
                    ));
                }
                return Err(CompileError::semantic(
                    format!("illegal recursive call of function '{}'", prog.functions[callee].ident.original()),
                    area,
                ));
            }

            self.call_path.push(callee);
            self.tracker.push_call_expr();
            let result = self.visit_function_decl(callee, prog);
            self.tracker.pop_call_expr();
            self.call_path.pop();
            result?;

            if let Some(owner) = prog.functions[callee].struct_ref {
                self.visit_struct_decl(owner, prog)?;
            }
        }

        if let Some(intrinsic) = call.intrinsic {
            // RW buffers touched by load/atomic intrinsics are read as images
            if intrinsic == Intrinsic::ImageLoad || intrinsic.is_image_atomic() || intrinsic.is_interlocked() {
                if let Some(arg0) = call.args.first_mut() {
                    if let Ok(ty) = arg0.type_denoter(prog) {
                        if let TypeDenoter::Buffer {
                            buffer_type,
                            decl: Some(buffer),
                            ..
                        } = ty.aliased(prog)
                        {
                            if buffer_type.is_rw_image() {
                                let buffer = *buffer;
                                prog.buffers[buffer].flags.insert(NodeFlags::USED_FOR_IMAGE_READ);
                            }
                        }
                    }
                }
            }

            if !can_inline_wrapper {
                let mut arg_types = Vec::with_capacity(call.args.len());
                for arg in call.args.iter_mut() {
                    if let Ok(ty) = arg.type_denoter(prog) {
                        if let Some(dt) = ty.aliased(prog).data_type() {
                            arg_types.push(dt);
                        }
                    }
                }
                prog.register_intrinsic_usage(intrinsic, arg_types);
            }
        }

        // arguments assigned to output parameters are l-values
        if let Some(function) = call.function {
            let function = prog.function_impl(function);
            for (index, param) in prog.functions[function].params.clone().into_iter().enumerate() {
                if prog.vars[param].storage.contains(StorageFlags::OUTPUT) {
                    if let Some(arg) = call.args.get(index) {
                        mark_lvalue_expr(arg, prog);
                    }
                }
            }
        }

        Ok(())
    }
}

/// Walks down through brackets and subscripts, marking every traversed
/// variable as written to.
fn mark_lvalue_expr(expr: &Expr, prog: &mut Program) {
    match &expr.kind {
        ExprKind::Ident(ident_expr) => {
            if let Some(prefix) = &ident_expr.prefix {
                mark_lvalue_expr(prefix, prog);
            }
            if let Some(SymbolRef::Var(id)) = ident_expr.symbol {
                prog.vars[id].flags.insert(NodeFlags::WRITTEN_TO);
            }
        }
        ExprKind::Bracket(inner) => mark_lvalue_expr(inner, prog),
        ExprKind::Subscript { prefix, .. } => mark_lvalue_expr(prefix, prog),
        _ => {}
    }
}

impl<'a> Visitor for ReferenceAnalyzer<'a> {
    fn visit_stmt(&mut self, stmt: &mut Stmt, prog: &mut Program) -> Result<()> {
        // dead statements do not contribute references
        if stmt.flags.contains(NodeFlags::DEAD_CODE) {
            return Ok(());
        }
        visitor::walk_stmt(self, stmt, prog)
    }

    fn visit_var_decl(&mut self, id: VarId, prog: &mut Program) -> Result<()> {
        if !self.reachable_var(id, prog) {
            return Ok(());
        }
        if let Some(buffer) = prog.vars[id].buffer_ref {
            self.visit_uniform_buffer_decl(buffer, prog)?;
        }
        let ty = prog.vars[id].ty.clone();
        self.visit_type_symbol(&ty, prog)?;
        visitor::walk_var_decl(self, id, prog)
    }

    fn visit_buffer_decl(&mut self, id: BufferId, prog: &mut Program) -> Result<()> {
        if !prog.buffers[id].flags.set_once(NodeFlags::REACHABLE) {
            return Ok(());
        }
        if let Some(generic) = prog.buffers[id].generic.clone() {
            self.visit_type_symbol(&generic, prog)?;
        }
        Ok(())
    }

    fn visit_sampler_decl(&mut self, id: SamplerId, prog: &mut Program) -> Result<()> {
        prog.samplers[id].flags.set_once(NodeFlags::REACHABLE);
        Ok(())
    }

    fn visit_alias_decl(&mut self, id: AliasId, prog: &mut Program) -> Result<()> {
        if !prog.aliases[id].flags.set_once(NodeFlags::REACHABLE) {
            return Ok(());
        }
        let ty = prog.aliases[id].ty.clone();
        self.visit_type_symbol(&ty, prog)
    }

    fn visit_struct_decl(&mut self, id: StructId, prog: &mut Program) -> Result<()> {
        if !prog.structs[id].flags.set_once(NodeFlags::REACHABLE) {
            return Ok(());
        }
        if let Some(base) = prog.structs[id].base_struct {
            self.visit_struct_decl(base, prog)?;
        }
        // member functions are only reached through call expressions
        visitor::walk_struct_decl(self, id, prog)
    }

    fn visit_function_decl(&mut self, id: FunctionId, prog: &mut Program) -> Result<()> {
        // forward declarations bounce to their implementation
        if prog.functions[id].is_forward_decl() {
            match prog.functions[id].impl_ref {
                Some(impl_id) => {
                    prog.functions[id].flags.insert(NodeFlags::REACHABLE);
                    return self.visit_function_decl(impl_id, prog);
                }
                None => {
                    return Err(CompileError::semantic(
                        format!(
                            "missing function implementation for '{}'",
                            prog.functions[id].ident.original()
                        ),
                        prog.functions[id].area,
                    ))
                }
            }
        }

        if !prog.functions[id].flags.set_once(NodeFlags::REACHABLE) {
            return Ok(());
        }

        let forward_decls = prog.functions[id].forward_decls.clone();
        for forward in forward_decls {
            prog.functions[forward].flags.insert(NodeFlags::REACHABLE);
        }

        let return_ty = prog.functions[id].return_ty.clone();
        self.visit_type_symbol(&return_ty, prog)?;

        self.tracker.push_function_decl(id, prog);
        let result = visitor::walk_function_decl(self, id, prog);
        self.tracker.pop_function_decl();
        result
    }

    fn visit_uniform_buffer_decl(&mut self, id: UniformBufferId, prog: &mut Program) -> Result<()> {
        if !prog.uniform_buffers[id].flags.set_once(NodeFlags::REACHABLE) {
            return Ok(());
        }
        visitor::walk_uniform_buffer_decl(self, id, prog)
    }

    fn visit_expr(&mut self, expr: &mut Expr, prog: &mut Program) -> Result<()> {
        match &mut expr.kind {
            ExprKind::Unary { op, expr: operand } | ExprKind::PostUnary { expr: operand, op } => {
                if op.is_lvalue_op() {
                    mark_lvalue_expr(operand, prog);
                }
            }
            ExprKind::Assign { lvalue, .. } => {
                mark_lvalue_expr(lvalue, prog);
            }
            ExprKind::Call(_) => {
                self.visit_call(expr, prog)?;
                return visitor::walk_expr(self, expr, prog);
            }
            ExprKind::Ident(_) => {
                self.visit_ident_expr(expr, prog)?;
                return visitor::walk_expr(self, expr, prog);
            }
            _ => {}
        }
        visitor::walk_expr(self, expr, prog)
    }
}

impl<'a> ReferenceAnalyzer<'a> {
    fn visit_ident_expr(&mut self, expr: &mut Expr, prog: &mut Program) -> Result<()> {
        let ExprKind::Ident(ident_expr) = &mut expr.kind else {
            return Ok(());
        };

        // fragment-coordinate usage feeds the fragment layout record
        if let Some(SymbolRef::Var(id)) = ident_expr.symbol {
            let is_frag_coord = matches!(
                prog.vars[id].semantic,
                Some(ref semantic) if semantic.semantic == Semantic::FragCoord
            );
            if is_frag_coord && self.shader_target == ShaderTarget::Fragment {
                prog.layout_fragment.frag_coord_used = true;
            }
        }

        // collect matrix subscripts for wrapper generation
        if let Some(prefix) = &mut ident_expr.prefix {
            if let Ok(prefix_ty) = prefix.type_denoter(prog) {
                if let Some(dt) = prefix_ty.aliased(prog).data_type() {
                    if dt.is_matrix() {
                        if let Some(subscript) = MatrixSubscript::parse(dt, &ident_expr.ident) {
                            prog.used_matrix_subscripts.insert(subscript);
                        }
                    }
                }
            }
        }

        let symbol = ident_expr.symbol;
        if let Some(symbol) = symbol {
            self.visit_symbol(symbol, prog)?;
        }
        Ok(())
    }
}
