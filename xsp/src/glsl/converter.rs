//! The GLSL master rewriter.
//!
//! Consumes an HLSL-shaped program and produces a GLSL-shaped one: semantic
//! type canonicalization, the expression rewrite suite, identifier
//! registration and reserved-word renaming, sampler-state elision, member
//! function lowering, base-struct flattening, entry-point wrapping and
//! function-name disambiguation. What leaves this pass has a direct GLSL
//! surface form for every remaining construct.

use super::keywords;
use crate::ast::{
    factory,
    ty::TypeCompare,
    visitor::{Tracker, Visitor},
    BinaryOp, BufferId, DataType, Expr, ExprKind, FunctionId, Ident, Intrinsic, NodeFlags, Program, SamplerId,
    ScalarType, Stmt, StmtKind, StorageFlags, StructId, SymbolRef, TypeDenoter, VarDecl, VarId,
};
use crate::diag::{CompileError, Result, SourceArea};
use crate::sema::SymbolTable;
use crate::xform::{ConvertFlags, ExprConverter, FuncNameConverter, FuncNameFlags, TypeConverter};
use crate::{NameMangling, Options, ShaderOutput, ShaderTarget};
use indexmap::{IndexMap, IndexSet};
use smol_str::SmolStr;
use tracing::debug;

/// Where an entry-point return value lands.
#[derive(Clone, Debug)]
enum ReturnTarget {
    /// A single output variable (possibly renamed to a GLSL built-in).
    Var(VarId),
    /// Per-member assignment into output variables of a struct.
    Struct(StructId),
}

pub struct GlslConverter {
    shader_target: ShaderTarget,
    options: Options,
    name_mangling: NameMangling,
    is_vksl: bool,

    tracker: Tracker,
    symbols: SymbolTable,
    /// Entry-point I/O declarations reserved across all scopes.
    global_reserved: Vec<VarId>,

    /// Statements to splice in before the statement being visited.
    pending: Vec<Stmt>,

    /// Entry-point parameters of pure struct type; member accesses through
    /// them lose their prefix and resolve to the I/O globals.
    entry_io_instances: IndexSet<VarId>,
    /// Struct member -> synthesized output global.
    member_output_map: IndexMap<VarId, VarId>,
    return_target: Option<ReturnTarget>,

    anonymous_counter: u32,
    obfuscation_counter: u32,
    temp_counter: u32,
}

impl GlslConverter {
    /// Runs the full conversion: type canonicalization, expression
    /// rewrites, the GLSL-specific tree edits and the function-name pass.
    pub fn convert(prog: &mut Program, shader_target: ShaderTarget, output: &ShaderOutput) -> Result<()> {
        debug!(target: "xsp", ?shader_target, "GLSL conversion");

        let mut converter = GlslConverter {
            shader_target,
            options: output.options.clone(),
            name_mangling: output.name_mangling.clone(),
            is_vksl: output.shader_version.is_vksl(),
            tracker: Tracker::new(),
            symbols: SymbolTable::new(),
            global_reserved: Vec::new(),
            pending: Vec::new(),
            entry_io_instances: IndexSet::new(),
            member_output_map: IndexMap::new(),
            return_target: None,
            anonymous_counter: 0,
            obfuscation_counter: 0,
            temp_counter: 0,
        };

        // canonicalize types forced by system-value semantics
        TypeConverter::convert(prog, |id, prog| Self::convert_var_decl_type(id, prog))?;

        // expression rewrites; matrix subscripts run after reachability
        let mut flags = ConvertFlags::ALL - ConvertFlags::MATRIX_SUBSCRIPTS;
        if output.shader_version.has_420_pack() {
            flags -= ConvertFlags::VECTOR_SUBSCRIPTS | ConvertFlags::INITIALIZER_TO_CTOR;
        }
        ExprConverter::convert(prog, flags, &output.name_mangling)?;

        converter.visit_program(prog)?;

        // after the main conversion: owner structs may have been renamed
        FuncNameConverter::convert(
            prog,
            &output.name_mangling,
            |prog, lhs, rhs| FuncNameConverter::equal_signatures(prog, lhs, rhs, TypeCompare::IGNORE_GENERIC_SUB_TYPE),
            FuncNameFlags::ALL,
        )
    }

    /// System-value semantics that imply a fixed GLSL type coerce the
    /// variable's declared type.
    fn convert_var_decl_type(id: VarId, prog: &mut Program) -> bool {
        let Some(semantic) = &prog.vars[id].semantic else {
            return false;
        };
        if !semantic.is_system_value() {
            return false;
        }
        let Some(dt) = keywords::semantic_glsl_data_type(&semantic.semantic) else {
            return false;
        };
        let target = TypeDenoter::Base(dt);
        if prog.vars[id].ty == target {
            return false;
        }
        prog.vars[id].ty = target;
        true
    }

    fn make_temp_ident(&mut self) -> SmolStr {
        let ident = format!("{}temp{}", self.name_mangling.temporary_prefix, self.temp_counter);
        self.temp_counter += 1;
        SmolStr::from(ident)
    }

    /* ----- Name mangling ----- */

    /// Renames an identifier that collides with a reserved GLSL name.
    fn rename_reserved_keyword(&mut self, ident: &mut Ident) {
        if self.options.obfuscate {
            ident.rename_obfuscated(self.obfuscation_counter);
            self.obfuscation_counter += 1;
            return;
        }
        let name = ident.final_name();
        if keywords::is_reserved_word(&name) || name.starts_with("gl_") {
            ident.append_prefix(&self.name_mangling.reserved_word_prefix);
        }
    }

    fn must_rename_var_decl(&self, id: VarId, prog: &Program) -> bool {
        let decl = &prog.vars[id];
        if self.tracker.inside_struct_decl() || decl.flags.contains(NodeFlags::SHADER_INPUT) {
            return false;
        }
        let name = decl.ident.final_name();
        for &reserved in &self.global_reserved {
            if reserved != id && prog.vars[reserved].ident.final_name() == name {
                return true;
            }
        }
        self.symbols.fetch_from_current_scope(&name)
    }

    fn register_var_decl_ident(&mut self, id: VarId, prog: &mut Program, global: bool) {
        if self.must_rename_var_decl(id, prog) {
            prog.vars[id].ident.append_prefix(&self.name_mangling.temporary_prefix);
        }
        if !prog.vars[id].flags.contains(NodeFlags::IMMUTABLE) {
            let mut ident = std::mem::replace(&mut prog.vars[id].ident, Ident::new(""));
            self.rename_reserved_keyword(&mut ident);
            prog.vars[id].ident = ident;
        }
        if global {
            self.global_reserved.push(id);
        } else {
            self.symbols.register(prog.vars[id].ident.final_name());
        }
    }

    /* ----- Entry-point I/O ----- */

    /// Lowers entry-point parameters and the return value into globals:
    /// semantic-bearing variables become in/out declarations or built-in
    /// reads, struct parameters are flattened or materialized.
    fn prepare_entry_point_io(&mut self, prog: &mut Program, entry: FunctionId) -> Result<()> {
        prog.functions[entry].flags.insert(NodeFlags::ENTRY_POINT);

        let params = std::mem::take(&mut prog.functions[entry].params);
        let mut prologue: Vec<Stmt> = Vec::new();

        for param in params {
            if prog.vars[param].is_uniform() {
                // handled by the uniform packer
                prog.functions[entry].params.push(param);
                continue;
            }

            let param_ty = prog.vars[param].ty.aliased(prog).clone();
            match param_ty {
                TypeDenoter::Struct {
                    decl: Some(struct_id), ..
                } => {
                    prog.structs[struct_id].flags.insert(NodeFlags::SHADER_INPUT);
                    let members = prog.structs[struct_id].members.clone();

                    if prog.structs[struct_id].flags.contains(NodeFlags::NON_ENTRY_POINT_PARAM) {
                        // the struct exists elsewhere: materialize a local
                        // instance populated from fresh input globals
                        prog.vars[param].storage.remove(StorageFlags::INPUT);
                        prologue.push(Stmt::new(StmtKind::VarDecl(crate::ast::VarDeclStmt {
                            decls: smallvec::smallvec![param],
                        })));

                        for member in members {
                            let global = self.synthesize_io_var(prog, member, true);
                            self.register_entry_input_var(prog, entry, global)?;
                            let target = factory::make_prefixed_object_expr(
                                factory::make_var_object_expr(prog, param),
                                prog.vars[member].ident.original().clone(),
                                Some(SymbolRef::Var(member)),
                            );
                            prologue.push(factory::make_assign_stmt(
                                target,
                                factory::make_var_object_expr(prog, global),
                            ));
                        }
                    } else {
                        // pure parameter struct: accesses through the
                        // instance resolve directly to the input globals
                        self.entry_io_instances.insert(param);
                        for member in members {
                            self.register_entry_input_var(prog, entry, member)?;
                        }
                    }
                }
                _ => {
                    self.register_entry_input_var(prog, entry, param)?;
                }
            }
        }

        // the return value becomes output globals
        let return_ty = prog.functions[entry].return_ty.aliased(prog).clone();
        let fn_semantic = prog.functions[entry].semantic.clone();

        match return_ty {
            TypeDenoter::Struct {
                decl: Some(struct_id), ..
            } => {
                prog.structs[struct_id].flags.insert(NodeFlags::SHADER_OUTPUT);
                let members = prog.structs[struct_id].members.clone();
                for member in members {
                    let global = self.synthesize_io_var(prog, member, false);
                    self.register_entry_output_var(prog, entry, global)?;
                    self.member_output_map.insert(member, global);
                }
                self.return_target = Some(ReturnTarget::Struct(struct_id));
            }
            TypeDenoter::Void => {}
            _ => {
                if let Some(semantic) = fn_semantic {
                    let mut decl = VarDecl::new(
                        SmolStr::from(semantic.to_string()),
                        prog.functions[entry].return_ty.clone(),
                    );
                    decl.semantic = Some(semantic);
                    let global = prog.vars.push(decl);
                    self.register_entry_output_var(prog, entry, global)?;
                    self.return_target = Some(ReturnTarget::Var(global));
                }
            }
        }

        // the wrapped entry point is `void main()`
        let entry_decl = &mut prog.functions[entry];
        entry_decl.return_ty = TypeDenoter::Void;
        entry_decl.semantic = None;
        entry_decl.ident.rename_to("main");

        if !prologue.is_empty() {
            if let Some(body) = &mut entry_decl.body {
                body.stmts.splice(0..0, prologue);
            }
        }

        Ok(())
    }

    /// A fresh global variable mirroring a struct member's type and
    /// semantic.
    fn synthesize_io_var(&mut self, prog: &mut Program, member: VarId, _input: bool) -> VarId {
        let source = &prog.vars[member];
        let mut decl = VarDecl::new(source.ident.original().clone(), source.ty.clone());
        decl.semantic = source.semantic.clone();
        decl.interp = source.interp;
        prog.vars.push(decl)
    }

    fn register_entry_input_var(&mut self, prog: &mut Program, entry: FunctionId, var: VarId) -> Result<()> {
        self.rename_io_var(prog, var, true);
        prog.vars[var].storage.remove(StorageFlags::INPUT);
        prog.vars[var].flags.insert(NodeFlags::SHADER_INPUT);
        prog.functions[entry].input_semantics.push(var);
        Ok(())
    }

    fn register_entry_output_var(&mut self, prog: &mut Program, entry: FunctionId, var: VarId) -> Result<()> {
        self.rename_io_var(prog, var, false);
        prog.vars[var].storage.remove(StorageFlags::OUTPUT);
        prog.vars[var]
            .flags
            .insert(NodeFlags::SHADER_OUTPUT | NodeFlags::WRITTEN_TO);
        prog.functions[entry].output_semantics.push(var);
        Ok(())
    }

    /// Renames an I/O variable to its GLSL built-in or its semantic-derived
    /// in/out name.
    fn rename_io_var(&mut self, prog: &mut Program, var: VarId, input: bool) {
        let Some(semantic) = prog.vars[var].semantic.clone() else {
            return;
        };

        if semantic.is_system_value() {
            if let Some(builtin) = keywords::semantic_glsl_builtin(&semantic.semantic, self.shader_target, input) {
                prog.vars[var].ident.rename_to(builtin);
                prog.vars[var].flags.insert(NodeFlags::SYSTEM_VALUE | NodeFlags::IMMUTABLE);
                return;
            }
            prog.vars[var].flags.insert(NodeFlags::SYSTEM_VALUE);
        }

        let prefix = if input {
            &self.name_mangling.input_prefix
        } else {
            &self.name_mangling.output_prefix
        };
        let renamed = format!("{}{}", prefix, semantic);
        prog.vars[var].ident.rename_to(renamed);
    }

    /* ----- Statement lists ----- */

    fn convert_stmt_list(&mut self, stmts: &mut Vec<Stmt>, prog: &mut Program) -> Result<()> {
        // drop dead statements and sampler-state declarations
        let mut kept = Vec::with_capacity(stmts.len());
        for stmt in stmts.drain(..) {
            if stmt.flags.contains(NodeFlags::DEAD_CODE) || (!self.is_vksl && is_sampler_state_decl_stmt(&stmt, prog))
            {
                prog.disabled.push(crate::ast::DisabledNode::Stmt(stmt));
            } else {
                kept.push(stmt);
            }
        }
        *stmts = kept;

        if self.options.unroll_array_initializers {
            self.unroll_stmts(stmts, prog)?;
        }

        let mut index = 0;
        while index < stmts.len() {
            self.visit_stmt(&mut stmts[index], prog)?;
            if !self.pending.is_empty() {
                let pending = std::mem::take(&mut self.pending);
                let count = pending.len();
                for (offset, stmt) in pending.into_iter().enumerate() {
                    stmts.insert(index + offset, stmt);
                }
                index += count;
            }
            index += 1;
        }
        Ok(())
    }

    /// Visits a single-statement slot; pending insertions wrap the slot
    /// into a braced scope.
    fn convert_scoped_stmt(&mut self, stmt: &mut Stmt, prog: &mut Program) -> Result<()> {
        // bare returns in the entry point become code blocks so output
        // assignments have a place to live
        if self.tracker.inside_entry_point() && matches!(stmt.kind, StmtKind::Return(_)) {
            let single = std::mem::replace(stmt, Stmt::new(StmtKind::Null));
            *stmt = factory::make_scope_stmt(single);
        }

        let saved = std::mem::take(&mut self.pending);
        self.visit_stmt(stmt, prog)?;
        let pending = std::mem::replace(&mut self.pending, saved);
        if !pending.is_empty() {
            let body = std::mem::replace(stmt, Stmt::new(StmtKind::Null));
            let mut stmts = pending;
            stmts.push(body);
            *stmt = factory::make_scope_stmt_list(stmts);
        }
        Ok(())
    }

    /* ----- Array initializer unrolling ----- */

    fn unroll_stmts(&mut self, stmts: &mut Vec<Stmt>, prog: &mut Program) -> Result<()> {
        let mut index = 0;
        while index < stmts.len() {
            let mut unrolled: Vec<Stmt> = Vec::new();
            if let StmtKind::VarDecl(decl_stmt) = &stmts[index].kind {
                let vars: Vec<VarId> = decl_stmt.decls.iter().copied().collect();
                for var in vars {
                    self.unroll_var_decl_initializer(var, &mut unrolled, prog);
                }
            }
            index += 1;
            if !unrolled.is_empty() {
                let count = unrolled.len();
                for (offset, stmt) in unrolled.into_iter().enumerate() {
                    stmts.insert(index + offset, stmt);
                }
                index += count;
            }
        }
        Ok(())
    }

    /// `T a[N] = { e0, ..., eN-1 };` expands to `T a[N]; a[0] = e0; ...`
    fn unroll_var_decl_initializer(&mut self, var: VarId, unrolled: &mut Vec<Stmt>, prog: &mut Program) {
        let TypeDenoter::Array { dims, .. } = prog.vars[var].ty.aliased(prog) else {
            return;
        };
        let dim_sizes: Vec<i32> = dims.iter().map(|dim| dim.size).collect();
        if dim_sizes.iter().any(|&size| size <= 0) {
            return;
        }
        if !matches!(
            prog.vars[var].initializer.as_ref().map(|init| &init.kind),
            Some(ExprKind::Initializer(_))
        ) {
            return;
        }

        let Some(init) = prog.vars[var].initializer.take() else {
            return;
        };

        let mut indices = vec![0i32; dim_sizes.len()];
        loop {
            let Some(element) = fetch_initializer_sub_expr(&init, &indices) else {
                // malformed initializer: keep the original form
                prog.vars[var].initializer = Some(init);
                unrolled.clear();
                return;
            };
            unrolled.push(factory::make_array_assign_stmt(prog, var, &indices, element.clone()));

            // advance the index vector
            let mut level = indices.len();
            loop {
                if level == 0 {
                    return;
                }
                level -= 1;
                indices[level] += 1;
                if indices[level] < dim_sizes[level] {
                    break;
                }
                indices[level] = 0;
            }
        }
    }

    /* ----- Entry-point return statements ----- */

    fn convert_entry_point_return(&mut self, stmt: &mut Stmt, prog: &mut Program) -> Result<()> {
        let StmtKind::Return(expr_slot) = &mut stmt.kind else {
            return Ok(());
        };
        let Some(return_target) = self.return_target.clone() else {
            if let Some(expr) = expr_slot.take() {
                prog.disabled.push(crate::ast::DisabledNode::Expr(expr));
            }
            return Ok(());
        };
        let Some(expr) = expr_slot.take() else {
            return Ok(());
        };

        match return_target {
            ReturnTarget::Var(target) => {
                self.pending
                    .push(factory::make_assign_stmt(factory::make_var_object_expr(prog, target), expr));
            }
            ReturnTarget::Struct(struct_id) => {
                self.convert_entry_point_struct_return(expr, struct_id, prog)?;
            }
        }
        Ok(())
    }

    /// Return statements that construct an output struct become a sequence
    /// of per-member assignments to the output globals.
    fn convert_entry_point_struct_return(&mut self, expr: Expr, struct_id: StructId, prog: &mut Program) -> Result<()> {
        let members = prog.structs[struct_id].members.clone();

        // a constructor call or constructor-shaped cast yields the member
        // values directly
        let ctor_args = match expr.kind {
            ExprKind::Call(call)
                if matches!(
                    &call.type_ctor,
                    Some(TypeDenoter::Struct { decl: Some(id), .. }) if *id == struct_id
                ) =>
            {
                Some(call.args)
            }
            ExprKind::Cast { target, expr } if matches!(
                target.aliased(prog),
                TypeDenoter::Struct { decl: Some(id), .. } if *id == struct_id
            ) =>
            {
                match expr.kind {
                    ExprKind::Sequence(exprs) => Some(exprs),
                    other => Some(vec![Expr::new(other)]),
                }
            }
            other => {
                // an instance expression: copy member-wise; hoist calls into
                // a temporary so the instance is evaluated exactly once
                let instance = Expr::new(other);
                let instance = if matches!(instance.kind, ExprKind::Ident(_)) {
                    instance
                } else {
                    let temp_ident = self.make_temp_ident();
                    let instance_ty = prog.symbol_type_denoter(SymbolRef::Struct(struct_id));
                    let (temp_stmt, temp_var) =
                        factory::make_var_decl_stmt(prog, instance_ty, temp_ident, Some(instance));
                    self.pending.push(temp_stmt);
                    factory::make_var_object_expr(prog, temp_var)
                };

                // the struct is now materialized in the output
                prog.add_struct_flags_recursive_parents(struct_id, NodeFlags::NON_ENTRY_POINT_PARAM);

                for &member in &members {
                    let out_var = self.member_output_map[&member];
                    let access = factory::make_prefixed_object_expr(
                        instance.clone(),
                        prog.vars[member].ident.original().clone(),
                        Some(SymbolRef::Var(member)),
                    );
                    self.pending
                        .push(factory::make_assign_stmt(factory::make_var_object_expr(prog, out_var), access));
                }
                None
            }
        };

        if let Some(args) = ctor_args {
            for (member, value) in members.iter().zip(args) {
                let out_var = self.member_output_map[member];
                self.pending
                    .push(factory::make_assign_stmt(factory::make_var_object_expr(prog, out_var), value));
            }
        }
        Ok(())
    }

    /* ----- Object expressions ----- */

    fn convert_object_expr(&mut self, expr: &mut Expr, prog: &mut Program) -> Result<()> {
        let ExprKind::Ident(ident_expr) = &mut expr.kind else {
            return Ok(());
        };

        // static member access loses its object prefix
        if let Some(SymbolRef::Var(id)) = ident_expr.symbol {
            if prog.vars[id].is_static() && prog.vars[id].struct_ref.is_some() {
                ident_expr.prefix = None;
            }
        }

        // accesses through a pure entry-point parameter struct resolve
        // directly to the I/O globals
        let mut reset = false;
        if let Some(prefix) = &ident_expr.prefix {
            if let Some(prefix_var) = prefix.without_brackets().fetch_var_decl() {
                if self.entry_io_instances.contains(&prefix_var) {
                    ident_expr.prefix = None;
                    if let Some(SymbolRef::Var(member)) = ident_expr.symbol {
                        if let Some(&out_var) = self.member_output_map.get(&member) {
                            ident_expr.symbol = Some(SymbolRef::Var(out_var));
                        }
                    }
                    reset = true;
                } else {
                    let prefix_ty = prog.vars[prefix_var].ty.aliased(prog);
                    if let TypeDenoter::Struct {
                        decl: Some(struct_id), ..
                    } = prefix_ty
                    {
                        if prog.structs[*struct_id].flags.contains(NodeFlags::NON_ENTRY_POINT_PARAM) {
                            expr.flags.insert(NodeFlags::IMMUTABLE);
                        }
                    }
                }
            }
        }
        if reset {
            expr.reset_type_denoter();
            return Ok(());
        }

        let ExprKind::Ident(ident_expr) = &mut expr.kind else {
            unreachable!()
        };

        if ident_expr.is_static {
            self.convert_object_prefix_namespace(ident_expr, prog)?;
        } else if ident_expr.prefix.is_some() {
            self.convert_object_prefix_base_struct(ident_expr, prog)?;
        }

        // unqualified member access inside a member function reads through
        // the `self` parameter
        let ExprKind::Ident(ident_expr) = &mut expr.kind else {
            unreachable!()
        };
        if ident_expr.prefix.is_none() {
            if let (Some(active_struct), Some(SymbolRef::Var(id))) =
                (self.tracker.active_struct_decl(), ident_expr.symbol)
            {
                if prog.vars[id].struct_ref == Some(active_struct) && !prog.vars[id].is_static() {
                    if let Some(self_param) = self.tracker.active_self_parameter() {
                        ident_expr.prefix = Some(Box::new(factory::make_var_object_expr(prog, self_param)));
                    }
                }
            }
        }
        Ok(())
    }

    /// `obj.Base::member` namespace accesses become `obj.xsn_base.member`
    /// paths (one hop per inheritance level).
    fn convert_object_prefix_namespace(
        &mut self,
        ident_expr: &mut crate::ast::IdentExpr,
        prog: &mut Program,
    ) -> Result<()> {
        let Some(prefix) = &mut ident_expr.prefix else {
            return Ok(());
        };
        let ExprKind::Ident(namespace_expr) = &mut prefix.kind else {
            return Ok(());
        };
        let Some(SymbolRef::Struct(base_struct)) = namespace_expr.symbol else {
            return Ok(());
        };

        // the active struct is the prefix's prefix type, or the enclosing
        // struct declaration
        let active_struct = match &mut namespace_expr.prefix {
            Some(object) => match object.type_denoter(prog).ok().map(|ty| ty.aliased(prog).clone()) {
                Some(TypeDenoter::Struct { decl: Some(id), .. }) => Some(id),
                _ => None,
            },
            None => self.tracker.active_struct_decl(),
        };
        let Some(active_struct) = active_struct else {
            return Ok(());
        };

        ident_expr.is_static = false;

        if active_struct == base_struct {
            // redundant qualification: `obj.Base::member` where obj is Base
            let inner = namespace_expr.prefix.take();
            ident_expr.prefix = inner;
            return Ok(());
        }

        // replace the namespace link with the first `base` member, then
        // add further hops until the base struct is reached
        let Some(base_member) = prog.fetch_base_member(active_struct) else {
            return Ok(());
        };
        namespace_expr.symbol = Some(SymbolRef::Var(base_member));
        namespace_expr.ident = prog.vars[base_member].ident.original().clone();

        let mut current = prog.structs[active_struct].base_struct;
        while let Some(struct_id) = current {
            if struct_id == base_struct {
                break;
            }
            let Some(hop_member) = prog.fetch_base_member(struct_id) else {
                break;
            };
            let old_prefix = ident_expr.prefix.take().expect("namespace prefix");
            ident_expr.prefix = Some(Box::new(factory::make_prefixed_object_expr(
                *old_prefix,
                prog.vars[hop_member].ident.original().clone(),
                Some(SymbolRef::Var(hop_member)),
            )));
            current = prog.structs[struct_id].base_struct;
        }
        Ok(())
    }

    /// `derived.baseField` becomes `derived.xsn_base.baseField` (repeated
    /// for deeper hierarchies).
    fn convert_object_prefix_base_struct(
        &mut self,
        ident_expr: &mut crate::ast::IdentExpr,
        prog: &mut Program,
    ) -> Result<()> {
        let Some(SymbolRef::Var(member)) = ident_expr.symbol else {
            return Ok(());
        };
        let Some(owner) = prog.vars[member].struct_ref else {
            return Ok(());
        };
        let Some(prefix) = &mut ident_expr.prefix else {
            return Ok(());
        };
        let prefix_struct = match prefix.type_denoter(prog).ok().map(|ty| ty.aliased(prog).clone()) {
            Some(TypeDenoter::Struct { decl: Some(id), .. }) => id,
            _ => return Ok(()),
        };
        if prefix_struct == owner || !prog.is_base_of(owner, prefix_struct) {
            return Ok(());
        }

        // insert one `base` hop per inheritance level
        let mut current = prefix_struct;
        while current != owner {
            let Some(base_member) = prog.fetch_base_member(current) else {
                break;
            };
            let old_prefix = ident_expr.prefix.take().expect("member access prefix");
            ident_expr.prefix = Some(Box::new(factory::make_prefixed_object_expr(
                *old_prefix,
                prog.vars[base_member].ident.original().clone(),
                Some(SymbolRef::Var(base_member)),
            )));
            current = match prog.structs[current].base_struct {
                Some(base) => base,
                None => break,
            };
        }
        Ok(())
    }

    /* ----- Call expressions ----- */

    fn convert_call_expr(&mut self, expr: &mut Expr, prog: &mut Program) -> Result<()> {
        let area = expr.area;
        let ExprKind::Call(call) = &mut expr.kind else {
            return Ok(());
        };

        if let Some(intrinsic) = call.intrinsic {
            // texture intrinsics take the texture object as first argument
            if intrinsic.is_texture_intrinsic() && call.prefix.is_some() {
                if self.is_vksl {
                    // pair the texture with the sampler state argument
                    if let Some(arg0) = call.args.first_mut() {
                        if is_sampler_state_expr(arg0, prog) {
                            let texture = call.prefix.take().expect("texture prefix");
                            let sampler = std::mem::replace(arg0, Expr::new(ExprKind::Null));
                            let combined = combined_sampler_type_name(&texture.clone(), prog);
                            *arg0 =
                                factory::make_texture_sampler_binding_call_expr(*texture, sampler, combined);
                        }
                    }
                } else {
                    let texture = call.prefix.take().expect("texture prefix");
                    call.args.insert(0, *texture);
                }
            }

            if !self.is_vksl {
                // classic GLSL has no sampler state objects
                let mut kept = Vec::with_capacity(call.args.len());
                for arg in call.args.drain(..) {
                    let mut arg = arg;
                    if is_sampler_state_expr(&mut arg, prog) {
                        prog.disabled.push(crate::ast::DisabledNode::Expr(arg));
                    } else {
                        kept.push(arg);
                    }
                }
                call.args = kept;
            }

            match intrinsic {
                Intrinsic::Saturate => self.convert_intrinsic_saturate(expr, prog, area)?,
                Intrinsic::Tex1DLod | Intrinsic::Tex2DLod | Intrinsic::Tex3DLod | Intrinsic::TexCubeLod => {
                    self.convert_intrinsic_tex_lod(expr, prog, area)?
                }
                Intrinsic::TextureSample2
                | Intrinsic::TextureSample3
                | Intrinsic::TextureSample4
                | Intrinsic::TextureSample5 => self.convert_intrinsic_texture_sample(expr, prog, 1, 2)?,
                Intrinsic::TextureSampleLevel3 | Intrinsic::TextureSampleLevel4 => {
                    self.convert_intrinsic_texture_sample(expr, prog, 1, 3)?
                }
                _ if intrinsic.is_interlocked() => self.convert_intrinsic_image_atomic(expr, prog)?,
                Intrinsic::Mul => self.convert_intrinsic_mul(expr)?,
                Intrinsic::StreamOutputAppend => self.convert_intrinsic_stream_append(expr, prog)?,
                Intrinsic::StreamOutputRestartStrip => {
                    let ExprKind::Call(call) = &mut expr.kind else { unreachable!() };
                    call.prefix = None;
                    call.ident = "EndPrimitive".into();
                    call.args.clear();
                }
                _ => {}
            }
            return Ok(());
        }

        // member function calls become free-function calls with the object
        // as first argument
        if let Some(function) = call.function {
            let function = prog.function_impl(function);
            if let Some(owner) = prog.functions[function].struct_ref {
                if prog.functions[function].flags.contains(NodeFlags::STATIC) {
                    call.prefix = None;
                } else {
                    let active_struct = match &mut call.prefix {
                        Some(prefix) => match prefix.type_denoter(prog).ok().map(|ty| ty.aliased(prog).clone()) {
                            Some(TypeDenoter::Struct { decl: Some(id), .. }) => Some(id),
                            _ => None,
                        },
                        None => self.tracker.active_struct_decl(),
                    };

                    // no prefix: the enclosing method's `self` is the object
                    if call.prefix.is_none() {
                        if let Some(self_param) = self.tracker.active_self_parameter() {
                            call.prefix = Some(Box::new(factory::make_var_object_expr(prog, self_param)));
                        }
                    }

                    // the owner may be a base of the object's struct
                    if let Some(active) = active_struct {
                        if owner != active && prog.is_base_of(owner, active) {
                            let mut current = active;
                            while current != owner {
                                let Some(base_member) = prog.fetch_base_member(current) else {
                                    break;
                                };
                                let old_prefix = call.prefix.take().expect("member call prefix");
                                call.prefix = Some(Box::new(factory::make_prefixed_object_expr(
                                    *old_prefix,
                                    prog.vars[base_member].ident.original().clone(),
                                    Some(SymbolRef::Var(base_member)),
                                )));
                                current = match prog.structs[current].base_struct {
                                    Some(base) => base,
                                    None => break,
                                };
                            }
                        }
                    }

                    match call.prefix.take() {
                        Some(prefix) => call.args.insert(0, *prefix),
                        None => {
                            return Err(CompileError::semantic(
                                format!(
                                    "missing 'self' object for member function '{}'",
                                    prog.functions[function].ident.original()
                                ),
                                area,
                            ))
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// `saturate(x)` -> `clamp(x, T(0), T(1))` with scalar literal bounds.
    fn convert_intrinsic_saturate(&mut self, expr: &mut Expr, prog: &mut Program, area: SourceArea) -> Result<()> {
        let ExprKind::Call(call) = &mut expr.kind else { unreachable!() };
        if call.args.len() != 1 {
            return Err(CompileError::semantic(
                format!("invalid number of arguments for intrinsic 'saturate' (expected 1, got {})", call.args.len()),
                area,
            ));
        }
        let arg_ty = call.args[0].type_denoter(prog)?;
        let Some(dt) = arg_ty.aliased(prog).data_type() else {
            return Err(CompileError::semantic("invalid argument type for intrinsic 'saturate'", area));
        };
        let base = dt.base().unwrap_or(ScalarType::Float);

        call.intrinsic = Some(Intrinsic::Clamp);
        call.ident = "clamp".into();
        if base.is_real() {
            call.args.push(factory::make_literal_expr(DataType::Scalar(base), "0.0"));
            call.args.push(factory::make_literal_expr(DataType::Scalar(base), "1.0"));
        } else {
            call.args.push(factory::make_literal_expr(DataType::Scalar(base), "0"));
            call.args.push(factory::make_literal_expr(DataType::Scalar(base), "1"));
        }
        Ok(())
    }

    /// `tex2Dlod(s, t)` -> `textureLod(s, t.xyz, t.w)`; `t` is hoisted into
    /// a temporary when it is a call expression to avoid double evaluation.
    fn convert_intrinsic_tex_lod(&mut self, expr: &mut Expr, prog: &mut Program, area: SourceArea) -> Result<()> {
        let ExprKind::Call(call) = &mut expr.kind else { unreachable!() };
        if call.args.len() != 2 {
            return Err(CompileError::semantic(
                format!("invalid number of arguments for intrinsic (expected 2, got {})", call.args.len()),
                area,
            ));
        }

        let texture_dim = texture_dim_from_expr(&mut call.args[0], prog)
            .ok_or_else(|| CompileError::semantic("failed to determine dimension of texture object", area))?;

        crate::xform::exprs::convert_expr_if_cast_required(
            &mut call.args[1],
            &TypeDenoter::Base(DataType::Vector(ScalarType::Float, 4)),
            true,
            prog,
        )?;

        let mut coord = call.args.remove(1);
        if coord.contains_call() {
            let coord_ty = coord.type_denoter(prog)?;
            let temp_ident = self.make_temp_ident();
            let (temp_stmt, temp_var) = factory::make_var_decl_stmt(prog, coord_ty, temp_ident, Some(coord));
            self.pending.push(temp_stmt);
            coord = factory::make_var_object_expr(prog, temp_var);
        }

        let swizzle = &"xyzw"[..texture_dim as usize];
        let location = factory::make_prefixed_object_expr(coord.clone(), swizzle, None);
        let lod = factory::make_prefixed_object_expr(coord, "w", None);

        call.intrinsic = Some(Intrinsic::TextureSampleLevel3);
        call.ident = "textureLod".into();
        call.args.push(location);
        call.args.push(lod);
        Ok(())
    }

    /// Location and offset arguments of `Sample`/`SampleLevel` adopt the
    /// texture's coordinate dimension.
    fn convert_intrinsic_texture_sample(
        &mut self,
        expr: &mut Expr,
        prog: &mut Program,
        location_index: usize,
        offset_index: usize,
    ) -> Result<()> {
        let ExprKind::Call(call) = &mut expr.kind else { unreachable!() };
        let Some(first) = call.args.first_mut() else {
            return Ok(());
        };
        let Some(texture_dim) = texture_dim_from_expr(first, prog) else {
            return Ok(());
        };

        if let Some(location) = call.args.get_mut(location_index) {
            crate::xform::exprs::convert_expr_if_cast_required(
                location,
                &TypeDenoter::Base(DataType::vector_of(ScalarType::Float, texture_dim)),
                true,
                prog,
            )?;
        }
        if let Some(offset) = call.args.get_mut(offset_index + 1) {
            crate::xform::exprs::convert_expr_if_cast_required(
                offset,
                &TypeDenoter::Base(DataType::vector_of(ScalarType::Int, texture_dim)),
                true,
                prog,
            )?;
        }
        Ok(())
    }

    /// `InterlockedAdd(rwTex[i], v)` -> `imageAtomicAdd(rwTex, i, v)`.
    fn convert_intrinsic_image_atomic(&mut self, expr: &mut Expr, prog: &mut Program) -> Result<()> {
        let ExprKind::Call(call) = &mut expr.kind else { unreachable!() };
        if call.args.len() < 2 {
            return Ok(());
        }
        let intrinsic = call.intrinsic.expect("interlocked intrinsic");

        let arg0_is_rw_texture_subscript = match &mut call.args[0].kind {
            ExprKind::Subscript { prefix, .. } => {
                let ty = prefix.type_denoter(prog)?;
                matches!(
                    ty.aliased(prog),
                    TypeDenoter::Buffer { buffer_type, .. } if buffer_type.is_rw_texture()
                )
            }
            _ => {
                let ty = call.args[0].type_denoter(prog)?;
                let is_rw = matches!(
                    ty.aliased(prog),
                    TypeDenoter::Buffer { buffer_type, .. } if buffer_type.is_rw_texture()
                );
                if is_rw {
                    let image_atomic = intrinsic.to_image_atomic();
                    call.intrinsic = Some(image_atomic);
                    call.ident = keywords::intrinsic_glsl_name(image_atomic).unwrap_or("imageAtomicAdd").into();
                }
                return Ok(());
            }
        };
        if !arg0_is_rw_texture_subscript {
            return Ok(());
        }

        let image_atomic = intrinsic.to_image_atomic();
        call.intrinsic = Some(image_atomic);
        call.ident = keywords::intrinsic_glsl_name(image_atomic).unwrap_or("imageAtomicAdd").into();

        // split `rwTex[i]` into the image object and the coordinate argument
        let subscript = std::mem::replace(&mut call.args[0], Expr::new(ExprKind::Null));
        let ExprKind::Subscript { prefix, mut indices } = subscript.kind else {
            unreachable!()
        };
        let coordinate = indices.pop().expect("image atomic without coordinate");
        call.args[0] = if indices.is_empty() {
            *prefix
        } else {
            factory::make_array_expr(*prefix, indices)
        };
        call.args.insert(1, coordinate);
        Ok(())
    }

    /// `mul(a, b)` -> `(b * a)` (vector/vector was lowered to `dot` by the
    /// expression converter).
    fn convert_intrinsic_mul(&mut self, expr: &mut Expr) -> Result<()> {
        let ExprKind::Call(call) = &mut expr.kind else { unreachable!() };
        if call.args.len() != 2 {
            return Ok(());
        }
        let rhs = call.args.pop().expect("mul rhs");
        let lhs = call.args.pop().expect("mul lhs");
        *expr = factory::make_bracket_expr(factory::make_binary_expr(rhs, BinaryOp::Mul, lhs));
        Ok(())
    }

    /// `strm.Append(v)` -> per-member output assignments + `EmitVertex()`.
    fn convert_intrinsic_stream_append(&mut self, expr: &mut Expr, prog: &mut Program) -> Result<()> {
        let ExprKind::Call(call) = &mut expr.kind else { unreachable!() };
        call.prefix = None;
        call.ident = "EmitVertex".into();

        if let Some(mut vertex) = call.args.pop() {
            let vertex_ty = vertex.type_denoter(prog)?;
            if let TypeDenoter::Struct {
                decl: Some(struct_id), ..
            } = vertex_ty.aliased(prog)
            {
                let members = prog.structs[*struct_id].members.clone();
                for member in members {
                    if let Some(&out_var) = self.member_output_map.get(&member) {
                        let access = factory::make_prefixed_object_expr(
                            vertex.clone(),
                            prog.vars[member].ident.original().clone(),
                            Some(SymbolRef::Var(member)),
                        );
                        self.pending
                            .push(factory::make_assign_stmt(factory::make_var_object_expr(prog, out_var), access));
                    }
                }
            }
        }
        call.args.clear();
        Ok(())
    }

    /* ----- Cast expressions ----- */

    /// A cast to a struct type becomes a constructor list: one value per
    /// member. Call expressions are hoisted into a temporary first.
    fn convert_cast_expr(&mut self, expr: &mut Expr, prog: &mut Program) -> Result<()> {
        let ExprKind::Cast { target, expr: inner } = &mut expr.kind else {
            return Ok(());
        };
        let TypeDenoter::Struct {
            decl: Some(struct_id), ..
        } = target.aliased(prog)
        else {
            return Ok(());
        };
        let struct_id = *struct_id;

        let mut member_types = Vec::new();
        collect_member_type_denoters(prog, struct_id, &mut member_types);

        let value = std::mem::replace(inner.as_mut(), Expr::new(ExprKind::Null));
        let value = if value.contains_call() {
            let mut value = value;
            let value_ty = value.type_denoter(prog)?;
            let temp_ident = self.make_temp_ident();
            let (temp_stmt, temp_var) = factory::make_var_decl_stmt(prog, value_ty, temp_ident, Some(value));
            self.pending.push(temp_stmt);
            factory::make_var_object_expr(prog, temp_var)
        } else {
            value
        };

        **inner = factory::make_constructor_list_expr(value, &member_types);
        Ok(())
    }
}

/* ----- Free helpers ----- */

fn is_sampler_state_decl_stmt(stmt: &Stmt, prog: &Program) -> bool {
    match &stmt.kind {
        StmtKind::SamplerDecl(ids) => ids
            .iter()
            .all(|&id| prog.samplers[id].sampler_type.is_state()),
        StmtKind::VarDecl(decl_stmt) => decl_stmt.decls.iter().all(|&id| {
            matches!(
                prog.vars[id].ty.aliased(prog),
                TypeDenoter::Sampler { sampler_type, .. } if sampler_type.is_state()
            )
        }),
        _ => false,
    }
}

fn is_sampler_state_expr(expr: &mut Expr, prog: &mut Program) -> bool {
    match expr.type_denoter(prog) {
        Ok(ty) => matches!(
            ty.aliased(prog),
            TypeDenoter::Sampler { sampler_type, .. } if sampler_type.is_state()
        ),
        Err(_) => false,
    }
}

/// The combined sampler type for the VKSL texture/sampler pairing call.
fn combined_sampler_type_name(texture: &Expr, prog: &Program) -> SmolStr {
    let mut texture = texture.clone();
    if let Ok(ty) = texture.type_denoter(prog) {
        if let TypeDenoter::Buffer { buffer_type, .. } = ty.aliased(prog) {
            let generic_base = ty
                .aliased(prog)
                .buffer_generic()
                .and_then(|generic| generic.data_type())
                .and_then(DataType::base)
                .unwrap_or(ScalarType::Float);
            if let Some(name) = keywords::buffer_type_glsl_name(*buffer_type, generic_base) {
                return SmolStr::from(name);
            }
        }
    }
    "sampler2D".into()
}

fn texture_dim_from_expr(expr: &mut Expr, prog: &mut Program) -> Option<u8> {
    let ty = expr.type_denoter(prog).ok()?;
    match ty.aliased(prog) {
        TypeDenoter::Buffer { buffer_type, .. } => buffer_type.texture_dim(),
        TypeDenoter::Sampler { sampler_type, .. } => sampler_type.texture_dim(),
        _ => None,
    }
}

/// Member type denoters including all base-struct members, in declaration
/// order.
fn collect_member_type_denoters(prog: &Program, struct_id: StructId, out: &mut Vec<TypeDenoter>) {
    for &member in &prog.structs[struct_id].members {
        if prog.vars[member].flags.contains(NodeFlags::BASE_MEMBER) {
            if let TypeDenoter::Struct { decl: Some(base), .. } = prog.vars[member].ty.aliased(prog) {
                collect_member_type_denoters(prog, *base, out);
                continue;
            }
        }
        out.push(prog.vars[member].ty.clone());
    }
}

/// Fetches the sub-expression of a (possibly nested) initializer at the
/// given index vector.
fn fetch_initializer_sub_expr<'a>(init: &'a Expr, indices: &[i32]) -> Option<&'a Expr> {
    let mut current = init;
    for &index in indices {
        let ExprKind::Initializer(exprs) = &current.kind else {
            // a flat element covers the remaining dimensions
            return Some(current);
        };
        current = exprs.get(index as usize)?;
    }
    Some(current)
}

impl Visitor for GlslConverter {
    fn visit_program(&mut self, prog: &mut Program) -> Result<()> {
        let entry = prog
            .entry_point
            .ok_or_else(|| CompileError::semantic("entry point not found", SourceArea::ignore()))?;

        self.prepare_entry_point_io(prog, entry)?;

        // entry I/O identifiers are reserved in every scope
        let io_vars: Vec<VarId> = prog.functions[entry]
            .input_semantics
            .iter()
            .chain(&prog.functions[entry].output_semantics)
            .copied()
            .collect();
        for var in io_vars {
            self.global_reserved.push(var);
        }

        let mut stmts = std::mem::take(&mut prog.global_stmts);
        let result = self.convert_stmt_list(&mut stmts, prog);
        prog.global_stmts = stmts;
        result
    }

    fn visit_var_decl(&mut self, id: VarId, prog: &mut Program) -> Result<()> {
        // static member variables become globals named after their struct
        if prog.vars[id].is_static() {
            if let Some(struct_id) = prog.vars[id].struct_ref {
                if !prog.vars[id].flags.contains(NodeFlags::WAS_CONVERTED) {
                    let struct_name = prog.structs[struct_id].ident.original().clone();
                    let var_name = prog.vars[id].ident.original().clone();
                    let ident = &mut prog.vars[id].ident;
                    ident.rename_to(format!("{struct_name}_{var_name}"));
                    ident.append_prefix(&self.name_mangling.namespace_prefix);
                    prog.vars[id].flags.insert(NodeFlags::WAS_CONVERTED);
                }
            }
        }

        self.register_var_decl_ident(id, prog, false);
        crate::ast::visitor::walk_var_decl(self, id, prog)
    }

    fn visit_buffer_decl(&mut self, id: BufferId, prog: &mut Program) -> Result<()> {
        let mut ident = std::mem::replace(&mut prog.buffers[id].ident, Ident::new(""));
        self.rename_reserved_keyword(&mut ident);
        prog.buffers[id].ident = ident;
        self.symbols.register(prog.buffers[id].ident.final_name());
        Ok(())
    }

    fn visit_sampler_decl(&mut self, id: SamplerId, prog: &mut Program) -> Result<()> {
        let mut ident = std::mem::replace(&mut prog.samplers[id].ident, Ident::new(""));
        self.rename_reserved_keyword(&mut ident);
        prog.samplers[id].ident = ident;
        self.symbols.register(prog.samplers[id].ident.final_name());
        Ok(())
    }

    fn visit_alias_decl(&mut self, id: crate::ast::AliasId, prog: &mut Program) -> Result<()> {
        // an anonymous structure behind a type alias takes the alias name
        // (alias names disappear in the GLSL output)
        let alias_name = prog.aliases[id].ident.original().clone();
        let mut ty = std::mem::replace(&mut prog.aliases[id].ty, TypeDenoter::Void);
        ty.set_ident_if_anonymous(&alias_name);
        if let TypeDenoter::Struct {
            decl: Some(struct_id), ..
        } = &ty
        {
            if prog.structs[*struct_id].ident.is_anonymous() {
                prog.structs[*struct_id].ident.rename_to(alias_name.clone());
            }
        }
        prog.aliases[id].ty = ty;
        Ok(())
    }

    fn visit_struct_decl(&mut self, id: StructId, prog: &mut Program) -> Result<()> {
        // anonymous structures receive a generated label
        if prog.structs[id].ident.is_anonymous() {
            let label = format!("{}anonym{}", self.name_mangling.temporary_prefix, self.anonymous_counter);
            self.anonymous_counter += 1;
            prog.structs[id].ident.rename_to(label);
        }
        let mut ident = std::mem::replace(&mut prog.structs[id].ident, Ident::new(""));
        self.rename_reserved_keyword(&mut ident);
        prog.structs[id].ident = ident;

        // derived structs gain a leading member holding the base instance
        if let Some(base) = prog.structs[id].base_struct {
            let already_inserted = prog
                .fetch_base_member(id)
                .is_some();
            if !already_inserted {
                let base_ty = prog.symbol_type_denoter(SymbolRef::Struct(base));
                let base_name = format!("{}base", self.name_mangling.namespace_prefix);
                let mut member = VarDecl::new(base_name, base_ty);
                member.flags.insert(NodeFlags::BASE_MEMBER);
                member.struct_ref = Some(id);
                let member_id = prog.vars.push(member);
                prog.structs[id].members.insert(0, member_id);
            }
        }

        self.tracker.push_struct_decl(id);
        self.symbols.open_scope();
        let mut result = Ok(());
        let members = prog.structs[id].members.clone();
        for member in members {
            result = self.visit_var_decl(member, prog);
            if result.is_err() {
                break;
            }
        }
        self.symbols.close_scope();
        self.tracker.pop_struct_decl();
        result?;

        // sampler-state members disappear outside VKSL
        if !self.is_vksl {
            let sampler_members: Vec<VarId> = prog.structs[id]
                .members
                .iter()
                .copied()
                .filter(|&member| {
                    matches!(
                        prog.vars[member].ty.aliased(prog),
                        TypeDenoter::Sampler { sampler_type, .. } if sampler_type.is_state()
                    )
                })
                .collect();
            prog.structs[id].members.retain(|member| !sampler_members.contains(member));
        }

        // GLSL forbids empty structures
        if prog.structs[id].members.is_empty() {
            let mut dummy = VarDecl::new("xsp_dummy", TypeDenoter::Base(DataType::INT));
            dummy.struct_ref = Some(id);
            let dummy_id = prog.vars.push(dummy);
            prog.structs[id].members.push(dummy_id);
        }
        Ok(())
    }

    fn visit_function_decl(&mut self, id: FunctionId, prog: &mut Program) -> Result<()> {
        let is_entry = prog.functions[id].flags.contains(NodeFlags::ENTRY_POINT);

        // non-static member functions receive a leading `self` parameter
        let mut self_param = None;
        if let Some(owner) = prog.functions[id].struct_ref {
            if !prog.functions[id].flags.contains(NodeFlags::STATIC)
                && !prog.functions[id]
                    .params
                    .first()
                    .map_or(false, |&param| prog.vars[param].flags.contains(NodeFlags::SELF_PARAMETER))
            {
                let owner_ty = prog.symbol_type_denoter(SymbolRef::Struct(owner));
                let self_name = format!("{}self", self.name_mangling.namespace_prefix);
                let mut param = VarDecl::new(self_name, owner_ty);
                param.flags.insert(NodeFlags::SELF_PARAMETER);
                let param_id = prog.vars.push(param);
                prog.functions[id].params.insert(0, param_id);
                self_param = Some(param_id);
            } else if prog.functions[id]
                .params
                .first()
                .map_or(false, |&param| prog.vars[param].flags.contains(NodeFlags::SELF_PARAMETER))
            {
                self_param = prog.functions[id].params.first().copied();
            }
        }
        if let Some(self_param) = self_param {
            self.tracker.push_self_parameter(self_param);
        }
        if let Some(owner) = prog.functions[id].struct_ref {
            self.tracker.push_struct_decl(owner);
        }

        if !is_entry {
            let mut ident = std::mem::replace(&mut prog.functions[id].ident, Ident::new(""));
            self.rename_reserved_keyword(&mut ident);
            prog.functions[id].ident = ident;
        }

        self.tracker.push_function_decl(id, prog);
        self.symbols.open_scope();

        let params: Vec<VarId> = prog.functions[id].params.clone();
        let mut result = params
            .into_iter()
            .try_for_each(|param| self.visit_var_decl(param, prog));

        if result.is_ok() {
            if let Some(mut body) = prog.functions[id].body.take() {
                result = self.convert_stmt_list(&mut body.stmts, prog);

                // main() needs no trailing plain return
                if is_entry && result.is_ok() {
                    while matches!(body.stmts.last().map(|stmt| &stmt.kind), Some(StmtKind::Return(None))) {
                        body.stmts.pop();
                    }
                }
                prog.functions[id].body = Some(body);
            }
        }

        self.symbols.close_scope();
        self.tracker.pop_function_decl();
        if prog.functions[id].struct_ref.is_some() {
            self.tracker.pop_struct_decl();
        }
        if self_param.is_some() {
            self.tracker.pop_self_parameter();
        }
        result?;

        // sampler-state parameters disappear outside VKSL
        if !self.is_vksl {
            let params = std::mem::take(&mut prog.functions[id].params);
            prog.functions[id].params = params
                .into_iter()
                .filter(|&param| {
                    !matches!(
                        prog.vars[param].ty.aliased(prog),
                        TypeDenoter::Sampler { sampler_type, .. } if sampler_type.is_state()
                    )
                })
                .collect();
        }
        Ok(())
    }

    fn visit_stmt(&mut self, stmt: &mut Stmt, prog: &mut Program) -> Result<()> {
        match &mut stmt.kind {
            StmtKind::Scope(block) => {
                self.symbols.open_scope();
                let result = self.convert_stmt_list(&mut block.stmts, prog);
                self.symbols.close_scope();
                result
            }
            StmtKind::For {
                init,
                condition,
                iteration,
                body,
            } => {
                self.symbols.open_scope();
                if let Some(init) = init {
                    self.visit_stmt(init, prog)?;
                }
                if let Some(condition) = condition {
                    self.visit_expr(condition, prog)?;
                }
                if let Some(iteration) = iteration {
                    self.visit_expr(iteration, prog)?;
                }
                let result = self.convert_scoped_stmt(body, prog);
                self.symbols.close_scope();
                result
            }
            StmtKind::While { condition, body } => {
                self.symbols.open_scope();
                self.visit_expr(condition, prog)?;
                let result = self.convert_scoped_stmt(body, prog);
                self.symbols.close_scope();
                result
            }
            StmtKind::DoWhile { body, condition } => {
                self.symbols.open_scope();
                let result = self.convert_scoped_stmt(body, prog);
                if result.is_ok() {
                    self.visit_expr(condition, prog)?;
                }
                self.symbols.close_scope();
                result
            }
            StmtKind::If {
                condition,
                body,
                else_body,
            } => {
                self.symbols.open_scope();
                self.visit_expr(condition, prog)?;
                self.convert_scoped_stmt(body, prog)?;
                if let Some(else_body) = else_body {
                    self.convert_scoped_stmt(else_body, prog)?;
                }
                self.symbols.close_scope();
                Ok(())
            }
            StmtKind::Switch { selector, cases } => {
                self.symbols.open_scope();
                self.visit_expr(selector, prog)?;
                for case in cases.iter_mut() {
                    if let Some(expr) = &mut case.expr {
                        self.visit_expr(expr, prog)?;
                    }
                    self.convert_stmt_list(&mut case.stmts, prog)?;
                }
                self.symbols.close_scope();
                Ok(())
            }
            StmtKind::Return(_) => {
                if let StmtKind::Return(Some(expr)) = &mut stmt.kind {
                    self.visit_expr(expr, prog)?;
                }
                if self.tracker.inside_entry_point() {
                    self.convert_entry_point_return(stmt, prog)?;
                }
                Ok(())
            }
            StmtKind::VarDecl(_) => {
                self.tracker.push_var_decl_stmt();
                let result = crate::ast::visitor::walk_stmt(self, stmt, prog);
                self.tracker.pop_var_decl_stmt();
                result
            }
            StmtKind::AliasDecl(_) => {
                self.tracker.push_alias_decl_stmt();
                let result = crate::ast::visitor::walk_stmt(self, stmt, prog);
                self.tracker.pop_alias_decl_stmt();
                result
            }
            _ => crate::ast::visitor::walk_stmt(self, stmt, prog),
        }
    }

    fn visit_expr(&mut self, expr: &mut Expr, prog: &mut Program) -> Result<()> {
        match &mut expr.kind {
            ExprKind::Ident(_) => {
                self.convert_object_expr(expr, prog)?;
                crate::ast::visitor::walk_expr(self, expr, prog)
            }
            ExprKind::Call(_) => {
                // the prefix participates in the rewrite, so convert first
                self.convert_call_expr(expr, prog)?;
                self.tracker.push_call_expr();
                let result = crate::ast::visitor::walk_expr(self, expr, prog);
                self.tracker.pop_call_expr();
                result
            }
            ExprKind::Cast { .. } => {
                crate::ast::visitor::walk_expr(self, expr, prog)?;
                self.convert_cast_expr(expr, prog)
            }
            ExprKind::Assign { lvalue, rvalue, .. } => {
                self.tracker.push_lvalue_expr();
                let result = self.visit_expr(lvalue, prog);
                self.tracker.pop_lvalue_expr();
                result?;
                self.visit_expr(rvalue, prog)
            }
            _ => crate::ast::visitor::walk_expr(self, expr, prog),
        }
    }
}
