//! Entry-point parameter struct analysis.
//!
//! Determines for every struct whether it is used purely as an entry-point
//! parameter container. A struct that is also used elsewhere (member
//! functions, non-entry-point variables or return values, buffer generics,
//! multiple output instances) is flagged `NON_ENTRY_POINT_PARAM`, and the
//! flag propagates through all enclosing parent structs.

use crate::ast::{
    visitor::{self, Tracker, Visitor},
    BufferId, Expr, ExprKind, FunctionId, NodeFlags, Program, Stmt, StructId, SymbolRef, TypeDenoter, VarId,
};
use crate::diag::Result;
use crate::ShaderTarget;
use indexmap::IndexSet;
use tracing::debug;

pub struct StructParameterAnalyzer {
    shader_target: ShaderTarget,
    entry_point: Option<FunctionId>,
    visited: IndexSet<SymbolRef>,
    tracker: Tracker,
}

impl StructParameterAnalyzer {
    /// Marks all structs reachable from the entry point(s).
    pub fn mark_structs_from_entry_point(prog: &mut Program, shader_target: ShaderTarget) -> Result<()> {
        debug!(target: "xsp", "struct parameter analysis");
        let mut analyzer = StructParameterAnalyzer {
            shader_target,
            entry_point: prog.entry_point,
            visited: IndexSet::new(),
            tracker: Tracker::new(),
        };

        if let Some(entry) = prog.entry_point {
            analyzer.visit_function_decl(entry, prog)?;
        }
        if let Some(patch_const) = prog.layout_tess_control.patch_const_function {
            analyzer.visit_function_decl(patch_const, prog)?;
        }

        propagate_to_component_structs(prog);
        Ok(())
    }

    fn not_visited(&mut self, symbol: SymbolRef) -> bool {
        self.visited.insert(symbol)
    }

    fn is_entry_point_parameter(&self, var: VarId, prog: &Program) -> bool {
        self.entry_point
            .map_or(false, |entry| prog.functions[entry].params.contains(&var))
    }

    fn is_active_function_entry_point(&self, prog: &Program) -> bool {
        self.tracker
            .active_function_decl()
            .map_or(false, |id| prog.functions[id].flags.contains(NodeFlags::ENTRY_POINT))
    }

    fn inside_shader_io_struct(&self, prog: &Program) -> bool {
        self.tracker.active_struct_decl().map_or(false, |id| {
            prog.structs[id]
                .flags
                .intersects(NodeFlags::SHADER_INPUT | NodeFlags::SHADER_OUTPUT)
        })
    }

    fn type_struct_decl(&self, ty: &TypeDenoter, prog: &Program) -> Option<StructId> {
        match ty.aliased(prog) {
            TypeDenoter::Struct { decl, .. } => *decl,
            TypeDenoter::Array { sub, .. } => match sub.aliased(prog) {
                TypeDenoter::Struct { decl, .. } => *decl,
                _ => None,
            },
            _ => None,
        }
    }
}

/// A materialized struct materializes its component types as well: the
/// flag flows into base structs and struct-typed members until a fixpoint
/// is reached.
fn propagate_to_component_structs(prog: &mut Program) {
    loop {
        let mut newly_flagged: Vec<StructId> = Vec::new();

        for (id, decl) in prog.structs.iter() {
            if !decl.flags.contains(NodeFlags::NON_ENTRY_POINT_PARAM) {
                continue;
            }
            if let Some(base) = decl.base_struct {
                if !prog.structs[base].flags.contains(NodeFlags::NON_ENTRY_POINT_PARAM) {
                    newly_flagged.push(base);
                }
            }
            for &member in &decl.members {
                if let TypeDenoter::Struct {
                    decl: Some(member_struct),
                    ..
                } = prog.vars[member].ty.aliased(prog)
                {
                    if !prog.structs[*member_struct].flags.contains(NodeFlags::NON_ENTRY_POINT_PARAM) {
                        newly_flagged.push(*member_struct);
                    }
                }
            }
        }

        if newly_flagged.is_empty() {
            return;
        }
        for id in newly_flagged {
            prog.structs[id].flags.insert(NodeFlags::NON_ENTRY_POINT_PARAM);
        }
    }
}

impl Visitor for StructParameterAnalyzer {
    fn visit_stmt(&mut self, stmt: &mut Stmt, prog: &mut Program) -> Result<()> {
        if stmt.flags.contains(NodeFlags::DEAD_CODE) {
            return Ok(());
        }
        visitor::walk_stmt(self, stmt, prog)
    }

    fn visit_var_decl(&mut self, id: VarId, prog: &mut Program) -> Result<()> {
        if !self.not_visited(SymbolRef::Var(id)) {
            return Ok(());
        }

        let is_entry_point_io = prog.vars[id].flags.contains(NodeFlags::ENTRY_POINT_OUTPUT);

        // variables inside shader I/O structs never disqualify their type
        if !self.inside_shader_io_struct(prog) {
            let entry_output = self.is_active_function_entry_point(prog) && is_entry_point_io;
            if !entry_output || self.shader_target == ShaderTarget::Geometry {
                if let Some(struct_id) = self.type_struct_decl(&prog.vars[id].ty, prog) {
                    let multiple_instances = prog.structs[struct_id].has_multiple_output_instances();
                    if (!entry_output || multiple_instances) && !self.is_entry_point_parameter(id, prog) {
                        prog.add_struct_flags_recursive_parents(struct_id, NodeFlags::NON_ENTRY_POINT_PARAM);
                    }
                }
            }
        }

        if let Some(struct_id) = self.type_struct_decl(&prog.vars[id].ty, prog) {
            self.visit_struct_decl(struct_id, prog)?;
        }
        visitor::walk_var_decl(self, id, prog)
    }

    fn visit_struct_decl(&mut self, id: StructId, prog: &mut Program) -> Result<()> {
        if !self.not_visited(SymbolRef::Struct(id)) {
            return Ok(());
        }

        // member functions force the struct out of the pure-parameter role
        if !prog.structs[id].member_fns.is_empty() {
            prog.add_struct_flags_recursive_parents(id, NodeFlags::NON_ENTRY_POINT_PARAM);
        }

        self.tracker.push_struct_decl(id);
        let result = visitor::walk_struct_decl(self, id, prog);
        self.tracker.pop_struct_decl();
        result
    }

    fn visit_buffer_decl(&mut self, id: BufferId, prog: &mut Program) -> Result<()> {
        if !self.not_visited(SymbolRef::Buffer(id)) {
            return Ok(());
        }
        // a struct used as buffer generic is not a pure parameter struct
        if let Some(generic) = prog.buffers[id].generic.clone() {
            if let Some(struct_id) = self.type_struct_decl(&generic, prog) {
                prog.add_struct_flags_recursive_parents(struct_id, NodeFlags::NON_ENTRY_POINT_PARAM);
                self.visit_struct_decl(struct_id, prog)?;
            }
        }
        Ok(())
    }

    fn visit_function_decl(&mut self, id: FunctionId, prog: &mut Program) -> Result<()> {
        if !self.not_visited(SymbolRef::Function(id)) {
            return Ok(());
        }

        let is_entry_point = prog.functions[id].flags.contains(NodeFlags::ENTRY_POINT);
        if !is_entry_point || self.shader_target == ShaderTarget::Geometry {
            if let Some(struct_id) = self.type_struct_decl(&prog.functions[id].return_ty.clone(), prog) {
                let multiple_instances = prog.structs[struct_id].has_multiple_output_instances();
                if !is_entry_point || multiple_instances {
                    prog.add_struct_flags_recursive_parents(struct_id, NodeFlags::NON_ENTRY_POINT_PARAM);
                }
            }
        }

        self.tracker.push_function_decl(id, prog);
        let result = visitor::walk_function_decl(self, id, prog);
        self.tracker.pop_function_decl();
        result
    }

    fn visit_expr(&mut self, expr: &mut Expr, prog: &mut Program) -> Result<()> {
        match &expr.kind {
            ExprKind::Call(call) => {
                if let Some(function) = call.function {
                    let function = prog.function_impl(function);
                    self.visit_function_decl(function, prog)?;
                }
            }
            ExprKind::Ident(ident_expr) => {
                if let Some(symbol) = ident_expr.symbol {
                    match symbol {
                        SymbolRef::Var(id) => self.visit_var_decl(id, prog)?,
                        SymbolRef::Buffer(id) => self.visit_buffer_decl(id, prog)?,
                        SymbolRef::Struct(id) => self.visit_struct_decl(id, prog)?,
                        SymbolRef::Function(id) => self.visit_function_decl(id, prog)?,
                        _ => {}
                    }
                }
            }
            _ => {}
        }
        visitor::walk_expr(self, expr, prog)
    }
}
