//! Expression rewrites.
//!
//! Closes the behavioral gap between HLSL and GLSL expression forms. The
//! converter carries a mask of enabled rewrites; each expression slot is
//! converted once before its children are visited (`ALL_PRE_VISIT`) and once
//! after (`ALL_POST_VISIT`). Compound assignments through image accesses
//! hoist their index expression into a temporary statement so the index is
//! evaluated exactly once.

use crate::ast::{
    factory,
    ty::{self, TypeDenoter},
    visitor::{self, Tracker, Visitor},
    BinaryOp, DataType, Expr, ExprKind, FunctionId, Intrinsic, NodeFlags, Program, ScalarType, Stmt, StmtKind,
    SymbolRef, VarId,
};
use crate::ast::{AssignOp, MatrixSubscript};
use crate::diag::{CompileError, Result};
use crate::NameMangling;
use smol_str::SmolStr;
use tracing::debug;

bitflags::bitflags! {
    /// Rewrite selection mask.
    pub struct ConvertFlags: u32 {
        /// Scalar vector subscripts become type constructors (`a.xxx` -> `vec3(a)`).
        const VECTOR_SUBSCRIPTS = 1 << 0;
        /// Vector comparisons become relational intrinsics (`a < b` -> `lessThan(a, b)`).
        const VECTOR_COMPARE = 1 << 1;
        /// RW texture accesses become `imageLoad`/`imageStore`.
        const IMAGE_ACCESS = 1 << 2;
        /// Implicit casts become explicit cast expressions.
        const IMPLICIT_CASTS = 1 << 3;
        /// Initializer lists become type constructors (`{1, 2, 3}` -> `float3(1, 2, 3)`).
        const INITIALIZER_TO_CTOR = 1 << 4;
        /// `log10(x)` becomes `(log(x) / log(10))`.
        const LOG10 = 1 << 5;
        /// Nested unary expressions get brackets (`- +x` -> `-(+x)`).
        const UNARY_EXPR = 1 << 6;
        /// `samplerBuffer[i]` becomes a `Load` intrinsic call.
        const SAMPLER_BUFFER_ACCESS = 1 << 7;
        /// `tex[i]` on textures becomes `tex.Load(i)`.
        const TEXTURE_BRACKET_OP = 1 << 9;
        /// Texture samples with non-4D texel types keep a 4-vector at the call site.
        const TEXTURE_INTRINSIC_VEC4 = 1 << 10;
        /// Matrix subscripts become wrapper calls or 2-index array accesses.
        const MATRIX_SUBSCRIPTS = 1 << 11;
        /// Member accesses are rebound to the compatible struct by position.
        const COMPATIBLE_STRUCTS = 1 << 12;
        /// `1.5h` literals become `1.5f`.
        const LITERAL_HALF_TO_FLOAT = 1 << 13;

        /// Rewrites applied before visiting the sub expressions.
        const ALL_PRE_VISIT = Self::VECTOR_COMPARE.bits
            | Self::IMAGE_ACCESS.bits
            | Self::LOG10.bits
            | Self::SAMPLER_BUFFER_ACCESS.bits
            | Self::TEXTURE_BRACKET_OP.bits
            | Self::COMPATIBLE_STRUCTS.bits;

        /// Rewrites applied after visiting the sub expressions.
        const ALL_POST_VISIT = Self::VECTOR_SUBSCRIPTS.bits
            | Self::MATRIX_SUBSCRIPTS.bits
            | Self::TEXTURE_INTRINSIC_VEC4.bits;

        const ALL = Self::VECTOR_SUBSCRIPTS.bits
            | Self::VECTOR_COMPARE.bits
            | Self::IMAGE_ACCESS.bits
            | Self::IMPLICIT_CASTS.bits
            | Self::INITIALIZER_TO_CTOR.bits
            | Self::LOG10.bits
            | Self::UNARY_EXPR.bits
            | Self::SAMPLER_BUFFER_ACCESS.bits
            | Self::TEXTURE_BRACKET_OP.bits
            | Self::TEXTURE_INTRINSIC_VEC4.bits
            | Self::MATRIX_SUBSCRIPTS.bits
            | Self::COMPATIBLE_STRUCTS.bits
            | Self::LITERAL_HALF_TO_FLOAT.bits;
    }
}

pub struct ExprConverter {
    flags: ConvertFlags,
    /// Rewrites suppressed while visiting interlocked intrinsic arguments
    /// (they require the buffer object itself, not its contents).
    suppressed: ConvertFlags,
    name_mangling: NameMangling,
    tracker: Tracker,
    hoisted: Vec<Stmt>,
    temp_counter: u32,
}

impl ExprConverter {
    pub fn convert(prog: &mut Program, flags: ConvertFlags, name_mangling: &NameMangling) -> Result<()> {
        if flags.is_empty() {
            return Ok(());
        }
        debug!(target: "xsp", ?flags, "expression conversion");
        let mut converter = ExprConverter {
            flags,
            suppressed: ConvertFlags::empty(),
            name_mangling: name_mangling.clone(),
            tracker: Tracker::new(),
            hoisted: Vec::new(),
            temp_counter: 0,
        };
        converter.visit_program(prog)
    }

    /// The identifier of the wrapper function for a matrix subscript.
    pub fn matrix_subscript_wrapper_ident(name_mangling: &NameMangling, subscript: &MatrixSubscript) -> SmolStr {
        SmolStr::from(format!(
            "{}subscript{}",
            name_mangling.temporary_prefix,
            subscript.indices_to_string()
        ))
    }

    fn make_temp_ident(&mut self) -> SmolStr {
        let ident = format!("{}temp{}", self.name_mangling.temporary_prefix, self.temp_counter);
        self.temp_counter += 1;
        SmolStr::from(ident)
    }

    fn enabled(&self, flags: ConvertFlags) -> ConvertFlags {
        flags & self.flags & !self.suppressed
    }

    /* ----- Statement lists with hoisting ----- */

    fn convert_stmt_list(&mut self, stmts: &mut Vec<Stmt>, prog: &mut Program) -> Result<()> {
        let mut index = 0;
        while index < stmts.len() {
            self.visit_stmt(&mut stmts[index], prog)?;
            if !self.hoisted.is_empty() {
                let hoisted = std::mem::take(&mut self.hoisted);
                let count = hoisted.len();
                for (offset, stmt) in hoisted.into_iter().enumerate() {
                    stmts.insert(index + offset, stmt);
                }
                index += count;
            }
            index += 1;
        }
        Ok(())
    }

    /// Visits a single-statement slot; statements hoisted inside it wrap the
    /// slot into a braced scope.
    fn convert_scoped_stmt(&mut self, stmt: &mut Stmt, prog: &mut Program) -> Result<()> {
        let pending = std::mem::take(&mut self.hoisted);
        self.visit_stmt(stmt, prog)?;
        let hoisted = std::mem::replace(&mut self.hoisted, pending);
        if !hoisted.is_empty() {
            let body = std::mem::replace(stmt, Stmt::new(StmtKind::Null));
            let mut stmts = hoisted;
            stmts.push(body);
            *stmt = factory::make_scope_stmt_list(stmts);
        }
        Ok(())
    }

    /* ----- Conversion dispatcher ----- */

    fn convert_expr(&mut self, expr: &mut Expr, flags: ConvertFlags, prog: &mut Program) -> Result<()> {
        let enabled = self.enabled(flags);
        if enabled.is_empty() {
            return Ok(());
        }

        if enabled.contains(ConvertFlags::TEXTURE_INTRINSIC_VEC4) {
            self.convert_expr_texture_intrinsic_vec4(expr, prog)?;
        }
        if enabled.contains(ConvertFlags::LOG10) {
            self.convert_expr_log10(expr, prog)?;
        }
        if enabled.contains(ConvertFlags::VECTOR_COMPARE) {
            self.convert_expr_vector_compare(expr, prog)?;
        }
        if enabled.contains(ConvertFlags::IMAGE_ACCESS) {
            self.convert_expr_image_access(expr, prog)?;
        }
        if enabled.contains(ConvertFlags::SAMPLER_BUFFER_ACCESS) {
            self.convert_expr_sampler_buffer_access(expr, prog)?;
        }
        if enabled.contains(ConvertFlags::VECTOR_SUBSCRIPTS) {
            self.convert_expr_vector_subscript(expr, prog)?;
        }
        if enabled.contains(ConvertFlags::MATRIX_SUBSCRIPTS) {
            self.convert_expr_matrix_subscript(expr, prog)?;
        }
        if enabled.contains(ConvertFlags::TEXTURE_BRACKET_OP) {
            self.convert_expr_texture_bracket_op(expr, prog)?;
        }
        if enabled.contains(ConvertFlags::COMPATIBLE_STRUCTS) {
            self.convert_expr_compatible_struct(expr, prog)?;
        }
        Ok(())
    }

    /* ----- Individual rewrites ----- */

    fn convert_expr_texture_intrinsic_vec4(&mut self, expr: &mut Expr, prog: &mut Program) -> Result<()> {
        let intrinsic = match &expr.kind {
            ExprKind::Call(call) => call.intrinsic,
            _ => return Ok(()),
        };
        let Some(intrinsic) = intrinsic else { return Ok(()) };
        if !(intrinsic.is_texture_load() || intrinsic.is_texture_sample() || intrinsic.is_texture_gather()) {
            return Ok(());
        }
        if intrinsic.is_texture_compare() {
            return Ok(());
        }

        let ty = expr.type_denoter(prog)?;
        let Some(dt) = ty.aliased(prog).data_type() else {
            return Ok(());
        };
        let dim = dt.vector_dim();
        if !(1..=3).contains(&dim) || dt.is_matrix() {
            return Ok(());
        }

        // color-style swizzle keeps the texel 4-dimensional at the call site
        let swizzle = &"rgba"[..dim as usize];
        let call = take_expr(expr);
        *expr = factory::make_prefixed_object_expr(call, swizzle, None);
        Ok(())
    }

    fn convert_expr_log10(&mut self, expr: &mut Expr, prog: &mut Program) -> Result<()> {
        let is_log10 = matches!(
            &expr.kind,
            ExprKind::Call(call) if call.intrinsic == Some(Intrinsic::Log10) && call.args.len() == 1
        );
        if !is_log10 {
            return Ok(());
        }

        let base = {
            let ExprKind::Call(call) = &mut expr.kind else { unreachable!() };
            let arg_ty = call.args[0].type_denoter(prog)?;
            match arg_ty.aliased(prog).data_type().and_then(DataType::base) {
                Some(base) => base,
                None => return Ok(()),
            }
        };

        let ExprKind::Call(call) = &mut expr.kind else { unreachable!() };
        call.intrinsic = Some(Intrinsic::Log);
        call.ident = "log".into();

        let literal = if base.is_real() {
            factory::make_literal_expr(DataType::Scalar(base), "10.0")
        } else {
            factory::make_literal_expr(DataType::INT, "10")
        };
        let rhs = factory::make_intrinsic_call_expr(
            Intrinsic::Log,
            "log",
            Some(TypeDenoter::Base(DataType::Scalar(base))),
            vec![literal],
        );

        let lhs = take_expr(expr);
        *expr = factory::make_bracket_expr(factory::make_binary_expr(lhs, BinaryOp::Div, rhs));
        Ok(())
    }

    fn convert_expr_vector_compare(&mut self, expr: &mut Expr, prog: &mut Program) -> Result<()> {
        match &mut expr.kind {
            ExprKind::Unary { op, .. } if op.is_logical() => {
                let ty = expr.type_denoter(prog)?;
                if !ty.aliased(prog).is_vector() {
                    return Ok(());
                }
                let ExprKind::Unary { expr: operand, .. } = take_expr(expr).kind else {
                    unreachable!()
                };
                *expr = factory::make_intrinsic_call_expr(Intrinsic::Not, "not", Some(ty), vec![*operand]);
            }
            ExprKind::Binary { op, .. } if op.is_compare() => {
                let op = *op;
                let ty = expr.type_denoter(prog)?;
                if !ty.aliased(prog).is_vector() {
                    return Ok(());
                }
                let Some(intrinsic) = crate::ast::intrinsics::compare_op_to_intrinsic(op) else {
                    return Ok(());
                };
                let ExprKind::Binary { lhs, rhs, .. } = take_expr(expr).kind else {
                    unreachable!()
                };
                *expr = factory::make_intrinsic_call_expr(
                    intrinsic,
                    glsl_relational_name(intrinsic),
                    Some(ty),
                    vec![*lhs, *rhs],
                );
            }
            ExprKind::Ternary { cond, .. } => {
                let cond_is_vector = cond.type_denoter(prog)?.aliased(prog).is_vector();
                if !cond_is_vector {
                    return Ok(());
                }
                let ty = expr.type_denoter(prog)?;
                let ExprKind::Ternary {
                    cond,
                    then_expr,
                    else_expr,
                } = take_expr(expr).kind
                else {
                    unreachable!()
                };
                *expr = factory::make_intrinsic_call_expr(
                    Intrinsic::Lerp,
                    "lerp",
                    Some(ty),
                    vec![*else_expr, *then_expr, *cond],
                );
            }
            _ => {}
        }
        Ok(())
    }

    fn convert_expr_image_access(&mut self, expr: &mut Expr, prog: &mut Program) -> Result<()> {
        if expr.flags.contains(NodeFlags::WAS_CONVERTED) {
            return Ok(());
        }
        match &expr.kind {
            ExprKind::Assign { lvalue, .. } if matches!(lvalue.kind, ExprKind::Subscript { .. }) => {
                let ExprKind::Assign { lvalue, op, rvalue } = take_expr(expr).kind else {
                    unreachable!()
                };
                match self.convert_image_access_array(*lvalue, Some((op, *rvalue)), prog)? {
                    ImageAccess::Converted(converted) => *expr = converted,
                    ImageAccess::NotAnImage(lvalue, assign) => {
                        let (op, rvalue) = assign.expect("assignment payload");
                        *expr = Expr::new(ExprKind::Assign {
                            lvalue: Box::new(lvalue),
                            op,
                            rvalue: Box::new(rvalue),
                        });
                    }
                }
            }
            ExprKind::Subscript { .. } => {
                let subscript = take_expr(expr);
                match self.convert_image_access_array(subscript, None, prog)? {
                    ImageAccess::Converted(converted) => *expr = converted,
                    ImageAccess::NotAnImage(subscript, _) => *expr = subscript,
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Builds `imageStore`/`imageLoad` calls out of an array access to a RW
    /// texture. Compound assignments evaluate the index through a hoisted
    /// temporary to avoid double evaluation.
    fn convert_image_access_array(
        &mut self,
        subscript: Expr,
        assign: Option<(AssignOp, Expr)>,
        prog: &mut Program,
    ) -> Result<ImageAccess> {
        let area = subscript.area;
        if !matches!(subscript.kind, ExprKind::Subscript { .. }) {
            return Ok(ImageAccess::NotAnImage(subscript, assign));
        }
        let ExprKind::Subscript { prefix, indices } = subscript.kind else {
            unreachable!()
        };
        let mut prefix = *prefix;
        let mut indices = indices;

        let prefix_ty = prefix.type_denoter(prog)?;
        let (num_dims, buffer_ty) = match prefix_ty.aliased(prog) {
            TypeDenoter::Array { sub, dims } => (dims.len(), sub.as_ref().clone()),
            other => (0, other.clone()),
        };
        let TypeDenoter::Buffer { buffer_type, .. } = &buffer_ty else {
            return Ok(ImageAccess::NotAnImage(rebuild_subscript(prefix, indices, area), assign));
        };
        if !buffer_type.is_rw_image() || num_dims >= indices.len() {
            return Ok(ImageAccess::NotAnImage(rebuild_subscript(prefix, indices, area), assign));
        }

        let generic_base = buffer_ty
            .buffer_generic()
            .and_then(|generic| generic.data_type())
            .and_then(DataType::base)
            .unwrap_or(ScalarType::Float);
        let call_ty = buffer_access_call_type(generic_base);
        let store_ty = call_ty.clone();

        // first argument: the image object with any leading array indices
        let remaining: Vec<Expr> = indices.drain(num_dims + 1..).collect();
        let mut index = indices.pop().expect("image access without index");
        let arg0 = if indices.is_empty() {
            prefix
        } else {
            factory::make_array_expr(prefix, indices)
        };

        // second argument: integer coordinates of the texture's dimension
        let texture_dim = buffer_type.texture_dim().ok_or_else(|| {
            CompileError::semantic("failed to determine dimension of texture object", area)
        })?;
        convert_expr_if_cast_required(
            &mut index,
            &TypeDenoter::Base(DataType::vector_of(ScalarType::Int, texture_dim)),
            true,
            prog,
        )?;

        let mut out = match assign {
            Some((op, rvalue)) => {
                let (arg0, index) = match op.to_binary_op() {
                    Some(binary_op) => {
                        // the image object and the index each appear in both
                        // the load and the store; hoist whatever would be
                        // evaluated twice
                        let arg0 = if arg0.contains_call() {
                            let mut arg0 = arg0;
                            let arg0_ty = arg0.type_denoter(prog)?;
                            let temp_ident = self.make_temp_ident();
                            let (temp_stmt, temp_var) =
                                factory::make_var_decl_stmt(prog, arg0_ty, temp_ident, Some(arg0));
                            self.hoisted.push(temp_stmt);
                            factory::make_var_object_expr(prog, temp_var)
                        } else {
                            arg0
                        };

                        let index_ty = index.type_denoter(prog)?;
                        let temp_ident = self.make_temp_ident();
                        let (temp_stmt, temp_var) =
                            factory::make_var_decl_stmt(prog, index_ty, temp_ident, Some(index));
                        self.hoisted.push(temp_stmt);
                        let index = factory::make_var_object_expr(prog, temp_var);

                        let load = factory::make_intrinsic_call_expr(
                            Intrinsic::ImageLoad,
                            "imageLoad",
                            Some(call_ty.clone()),
                            vec![arg0.clone(), index.clone()],
                        );
                        let mut value = factory::make_binary_expr(load, binary_op, rvalue);
                        convert_expr_if_cast_required(&mut value, &store_ty, true, prog)?;
                        return Ok(ImageAccess::Converted(wrap_remaining(
                            factory::make_intrinsic_call_expr(
                                Intrinsic::ImageStore,
                                "imageStore",
                                None,
                                vec![arg0, index, value],
                            ),
                            remaining,
                        )));
                    }
                    None => (arg0, index),
                };

                let mut value = rvalue;
                convert_expr_if_cast_required(&mut value, &store_ty, true, prog)?;
                factory::make_intrinsic_call_expr(Intrinsic::ImageStore, "imageStore", None, vec![arg0, index, value])
            }
            None => factory::make_intrinsic_call_expr(
                Intrinsic::ImageLoad,
                "imageLoad",
                Some(call_ty),
                vec![arg0, index],
            ),
        };

        out.flags.insert(NodeFlags::WAS_CONVERTED);
        Ok(ImageAccess::Converted(wrap_remaining(out, remaining)))
    }

    fn convert_expr_sampler_buffer_access(&mut self, expr: &mut Expr, prog: &mut Program) -> Result<()> {
        if expr.flags.contains(NodeFlags::WAS_CONVERTED) {
            return Ok(());
        }
        let ExprKind::Subscript { prefix, indices } = &mut expr.kind else {
            return Ok(());
        };

        let prefix_ty = prefix.type_denoter(prog)?;
        let (num_dims, buffer_ty) = match prefix_ty.aliased(prog) {
            TypeDenoter::Array { sub, dims } => (dims.len(), sub.as_ref().clone()),
            other => (0, other.clone()),
        };
        let TypeDenoter::Buffer {
            buffer_type: crate::ast::BufferType::Buffer,
            ..
        } = &buffer_ty
        else {
            return Ok(());
        };
        if num_dims >= indices.len() {
            return Ok(());
        }

        let generic_base = buffer_ty
            .buffer_generic()
            .and_then(|generic| generic.data_type())
            .and_then(DataType::base)
            .unwrap_or(ScalarType::Float);
        let call_ty = buffer_access_call_type(generic_base);

        let ExprKind::Subscript { prefix, mut indices } = take_expr(expr).kind else {
            unreachable!()
        };
        let index = indices.pop().expect("sampler buffer access without index");
        let object = if indices.is_empty() {
            *prefix
        } else {
            factory::make_array_expr(*prefix, indices)
        };

        let mut call = factory::make_intrinsic_call_expr(Intrinsic::TextureLoad1, "Load", Some(call_ty), vec![index]);
        if let ExprKind::Call(call_expr) = &mut call.kind {
            call_expr.prefix = Some(Box::new(object));
        }
        call.flags.insert(NodeFlags::WAS_CONVERTED);
        *expr = call;
        Ok(())
    }

    fn convert_expr_vector_subscript(&mut self, expr: &mut Expr, prog: &mut Program) -> Result<()> {
        let ExprKind::Ident(ident_expr) = &mut expr.kind else {
            return Ok(());
        };
        if ident_expr.symbol.is_some() {
            return Ok(());
        }
        let Some(prefix) = &mut ident_expr.prefix else {
            return Ok(());
        };

        let prefix_ty = prefix.type_denoter(prog)?;
        let Some(dt) = prefix_ty.aliased(prog).data_type() else {
            return Ok(());
        };
        if !dt.is_scalar() {
            return Ok(());
        }
        let Ok(vector_dt) = dt.swizzle(&ident_expr.ident) else {
            return Ok(());
        };

        let ExprKind::Ident(ident_expr) = take_expr(expr).kind else {
            unreachable!()
        };
        let prefix = ident_expr.prefix.expect("scalar subscript without prefix");
        *expr = factory::make_cast_expr(TypeDenoter::Base(vector_dt), *prefix);
        Ok(())
    }

    fn convert_expr_matrix_subscript(&mut self, expr: &mut Expr, prog: &mut Program) -> Result<()> {
        let ExprKind::Ident(ident_expr) = &mut expr.kind else {
            return Ok(());
        };
        if ident_expr.symbol.is_some() {
            return Ok(());
        }
        let Some(prefix) = &mut ident_expr.prefix else {
            return Ok(());
        };

        let prefix_ty = prefix.type_denoter(prog)?;
        let Some(dt) = prefix_ty.aliased(prog).data_type() else {
            return Ok(());
        };
        if !dt.is_matrix() {
            return Ok(());
        }
        let Some(subscript) = MatrixSubscript::parse(dt, &ident_expr.ident) else {
            return Ok(());
        };

        let ExprKind::Ident(ident_expr) = take_expr(expr).kind else {
            unreachable!()
        };
        let prefix = *ident_expr.prefix.expect("matrix subscript without prefix");

        if subscript.data_type_out.is_scalar() && subscript.indices.len() == 1 {
            // a single element becomes a direct 2-index array access
            let (row, col) = subscript.indices[0];
            *expr = factory::make_array_expr(prefix, factory::make_array_indices(&[row as i32, col as i32]));
        } else {
            let wrapper = Self::matrix_subscript_wrapper_ident(&self.name_mangling, &subscript);
            *expr =
                factory::make_wrapper_call_expr(wrapper, TypeDenoter::Base(subscript.data_type_out), vec![prefix]);
        }
        Ok(())
    }

    fn convert_expr_texture_bracket_op(&mut self, expr: &mut Expr, prog: &mut Program) -> Result<()> {
        if expr.flags.contains(NodeFlags::WAS_CONVERTED) {
            return Ok(());
        }
        let ExprKind::Subscript { prefix, indices } = &mut expr.kind else {
            return Ok(());
        };

        let prefix_ty = prefix.type_denoter(prog)?;
        let (num_dims, buffer_ty) = match prefix_ty.aliased(prog) {
            TypeDenoter::Array { sub, dims } => (dims.len(), sub.as_ref().clone()),
            other => (0, other.clone()),
        };
        let TypeDenoter::Buffer { buffer_type, .. } = &buffer_ty else {
            return Ok(());
        };
        if !buffer_type.is_texture() || buffer_type.is_rw() || num_dims >= indices.len() {
            return Ok(());
        }

        let generic = buffer_ty.buffer_generic();

        let ExprKind::Subscript { prefix, mut indices } = take_expr(expr).kind else {
            unreachable!()
        };
        let index = indices.pop().expect("texture bracket access without index");
        let object = if indices.is_empty() {
            *prefix
        } else {
            factory::make_array_expr(*prefix, indices)
        };

        let mut call = factory::make_intrinsic_call_expr(Intrinsic::TextureLoad1, "Load", generic, vec![index]);
        if let ExprKind::Call(call_expr) = &mut call.kind {
            call_expr.prefix = Some(Box::new(object));
        }
        call.flags.insert(NodeFlags::WAS_CONVERTED);
        *expr = call;
        Ok(())
    }

    fn convert_expr_compatible_struct(&mut self, expr: &mut Expr, prog: &mut Program) -> Result<()> {
        let ExprKind::Ident(ident_expr) = &mut expr.kind else {
            return Ok(());
        };
        let Some(SymbolRef::Var(member)) = ident_expr.symbol else {
            return Ok(());
        };
        let Some(prefix) = &mut ident_expr.prefix else {
            return Ok(());
        };

        let prefix_ty = prefix.type_denoter(prog)?;
        let TypeDenoter::Struct { decl: Some(struct_id), .. } = prefix_ty.aliased(prog) else {
            return Ok(());
        };
        let struct_id = *struct_id;
        let Some(compatible) = prog.structs[struct_id].compatible_struct else {
            return Ok(());
        };

        // rebind the member to the compatible struct by positional index
        if let Some(index) = prog.struct_member_index(struct_id, member) {
            if let Some(&compat_member) = prog.structs[compatible].members.get(index) {
                ident_expr.symbol = Some(SymbolRef::Var(compat_member));
                ident_expr.ident = prog.vars[compat_member].ident.original().clone();
                expr.reset_type_denoter();
            }
        }
        Ok(())
    }

    /* ----- Implicit casts ----- */

    /// Casts an expression to a target type and lowers initializer lists at
    /// a known target type.
    fn convert_expr_target_type(
        &mut self,
        expr: &mut Expr,
        target: &TypeDenoter,
        match_type_size: bool,
        prog: &mut Program,
    ) -> Result<()> {
        if self.flags.contains(ConvertFlags::IMPLICIT_CASTS) {
            convert_expr_if_cast_required(expr, target, match_type_size, prog)?;
        }

        if !matches!(expr.kind, ExprKind::Initializer(_)) {
            return Ok(());
        }

        // element-wise conversion for array targets
        if let TypeDenoter::Array { sub, .. } = target.aliased(prog) {
            let sub = sub.as_ref().clone();
            if let ExprKind::Initializer(exprs) = &mut expr.kind {
                let mut elements = std::mem::take(exprs);
                for element in &mut elements {
                    self.convert_expr_target_type(element, &sub, true, prog)?;
                }
                if let ExprKind::Initializer(exprs) = &mut expr.kind {
                    *exprs = elements;
                }
            }
            return Ok(());
        }

        if self.flags.contains(ConvertFlags::INITIALIZER_TO_CTOR) {
            let ExprKind::Initializer(exprs) = take_expr(expr).kind else {
                unreachable!()
            };
            *expr = factory::make_type_ctor_call_expr(target.clone(), exprs);
        } else if let Some(dt) = target.aliased(prog).data_type() {
            // re-format matrix initializers into per-row sub initializers
            if let Some((rows, cols)) = dt.matrix_dim() {
                let ExprKind::Initializer(exprs) = &mut expr.kind else {
                    unreachable!()
                };
                if exprs.len() == (rows as usize) * (cols as usize) {
                    let flat = std::mem::take(exprs);
                    let mut row_inits = Vec::with_capacity(rows as usize);
                    let mut iter = flat.into_iter();
                    for _ in 0..rows {
                        let row: Vec<Expr> = iter.by_ref().take(cols as usize).collect();
                        row_inits.push(factory::make_initializer_expr(row));
                    }
                    *exprs = row_inits;
                }
            }
        }
        Ok(())
    }
}

/// Inserts a cast when the expression's type does not agree with the
/// target type. Widening vector casts extend the constructor with zero
/// literals (`float3` to `float4` becomes `float4(v, 0)`).
pub fn convert_expr_if_cast_required(
    expr: &mut Expr,
    target: &TypeDenoter,
    match_type_size: bool,
    prog: &mut Program,
) -> Result<()> {
    let source = expr.type_denoter(prog)?;
    let Some(source_dt) = source.aliased(prog).data_type() else {
        return Ok(());
    };
    let Some(target_dt) = target.aliased(prog).data_type() else {
        return Ok(());
    };
    let Some(cast_dt) = must_cast_expr_to_data_type(target_dt, source_dt, match_type_size) else {
        return Ok(());
    };

    if source_dt.is_vector() && cast_dt.is_vector() && source_dt.vector_dim() < cast_dt.vector_dim() {
        let base = cast_dt.base().expect("vector base type");
        let mut args = vec![take_expr(expr)];
        for _ in source_dt.vector_dim()..cast_dt.vector_dim() {
            args.push(factory::make_literal_expr(DataType::Scalar(base), "0"));
        }
        *expr = factory::make_type_ctor_call_expr(TypeDenoter::Base(cast_dt), args);
    } else {
        let inner = take_expr(expr);
        *expr = factory::make_cast_expr(TypeDenoter::Base(cast_dt), inner);
    }
    Ok(())
}

enum ImageAccess {
    Converted(Expr),
    NotAnImage(Expr, Option<(AssignOp, Expr)>),
}

fn take_expr(expr: &mut Expr) -> Expr {
    std::mem::replace(expr, Expr::new(ExprKind::Null))
}

/// Re-types a scalar literal to the given base type, rewriting its value
/// text (`1` becomes `1.0` for real targets).
fn convert_literal_base_type(expr: &mut Expr, base: ScalarType) {
    let ExprKind::Literal {
        data_type: Some(dt),
        value,
    } = &mut expr.kind
    else {
        return;
    };
    if !dt.is_scalar() || dt.base() == Some(base) {
        return;
    }
    let Some(parsed) = crate::eval::parse_literal(*dt, value) else {
        return;
    };

    // only integral literals change their spelling; real literals keep
    // their source form (suffixes were normalized separately)
    if base.is_real() && dt.is_integral() {
        *value = SmolStr::from(crate::eval::format_real(parsed.to_real()));
        *dt = DataType::Scalar(base);
        expr.reset_type_denoter();
    } else if base.is_integral() && dt.is_integral() {
        *dt = DataType::Scalar(base);
        expr.reset_type_denoter();
    }
}

fn rebuild_subscript(prefix: Expr, indices: Vec<Expr>, area: crate::diag::SourceArea) -> Expr {
    Expr::with_area(
        ExprKind::Subscript {
            prefix: Box::new(prefix),
            indices,
        },
        area,
    )
}

fn wrap_remaining(expr: Expr, remaining: Vec<Expr>) -> Expr {
    if remaining.is_empty() {
        expr
    } else {
        factory::make_array_expr(expr, remaining)
    }
}

/// The 4-vector result type of buffer/image access calls.
fn buffer_access_call_type(base: ScalarType) -> TypeDenoter {
    let base = match base {
        ScalarType::Int => ScalarType::Int,
        ScalarType::UInt => ScalarType::UInt,
        _ => ScalarType::Float,
    };
    TypeDenoter::Base(DataType::Vector(base, 4))
}

fn glsl_relational_name(intrinsic: Intrinsic) -> &'static str {
    match intrinsic {
        Intrinsic::Equal => "equal",
        Intrinsic::NotEqual => "notEqual",
        Intrinsic::LessThan => "lessThan",
        Intrinsic::LessThanEqual => "lessThanEqual",
        Intrinsic::GreaterThan => "greaterThan",
        Intrinsic::GreaterThanEqual => "greaterThanEqual",
        _ => "equal",
    }
}

/// The data type an expression must be cast to, if the target and source
/// types are incompatible. `None` means no cast is required.
fn must_cast_expr_to_data_type(target: DataType, source: DataType, match_type_size: bool) -> Option<DataType> {
    let target_dim = target.vector_dim();
    let source_dim = source.vector_dim();

    let mismatch = (target_dim != source_dim && match_type_size)
        || target.is_boolean() != source.is_boolean()
        || (target.is_uint() && source.is_int())
        || (target.is_int() && source.is_uint())
        || (target.is_real() && source.is_integral())
        || (target.is_integral() && source.is_real())
        || target.is_double() != source.is_double();

    if !mismatch {
        return None;
    }

    if target_dim != source_dim && !match_type_size {
        // keep the source dimension, adopt the target base type
        let base = target.base()?;
        Some(DataType::vector_of(base, source_dim))
    } else {
        Some(target)
    }
}

impl Visitor for ExprConverter {
    fn visit_program(&mut self, prog: &mut Program) -> Result<()> {
        let mut stmts = std::mem::take(&mut prog.global_stmts);
        let result = self.convert_stmt_list(&mut stmts, prog);
        prog.global_stmts = stmts;
        result
    }

    fn visit_function_decl(&mut self, id: FunctionId, prog: &mut Program) -> Result<()> {
        self.tracker.push_function_decl(id, prog);

        let params: Vec<VarId> = prog.functions[id].params.clone();
        let mut result = params.into_iter().try_for_each(|param| self.visit_var_decl(param, prog));

        if result.is_ok() {
            if let Some(mut body) = prog.functions[id].body.take() {
                result = self.convert_stmt_list(&mut body.stmts, prog);
                prog.functions[id].body = Some(body);
            }
        }

        self.tracker.pop_function_decl();
        result
    }

    fn visit_var_decl(&mut self, id: VarId, prog: &mut Program) -> Result<()> {
        if let Some(mut init) = prog.vars[id].initializer.take() {
            let mut result = self.visit_expr(&mut init, prog);
            if result.is_ok() {
                let target = prog.vars[id].ty.clone();
                result = self.convert_expr_target_type(&mut init, &target, true, prog);
            }
            prog.vars[id].initializer = Some(init);
            result
        } else {
            Ok(())
        }
    }

    fn visit_stmt(&mut self, stmt: &mut Stmt, prog: &mut Program) -> Result<()> {
        match &mut stmt.kind {
            StmtKind::Scope(block) => self.convert_stmt_list(&mut block.stmts, prog),
            StmtKind::For {
                init,
                condition,
                iteration,
                body,
            } => {
                if let Some(init) = init {
                    self.visit_stmt(init, prog)?;
                }
                if let Some(condition) = condition {
                    self.visit_expr(condition, prog)?;
                }
                if let Some(iteration) = iteration {
                    self.visit_expr(iteration, prog)?;
                }
                self.convert_scoped_stmt(body, prog)
            }
            StmtKind::While { condition, body } => {
                self.visit_expr(condition, prog)?;
                self.convert_scoped_stmt(body, prog)
            }
            StmtKind::DoWhile { body, condition } => {
                self.convert_scoped_stmt(body, prog)?;
                self.visit_expr(condition, prog)
            }
            StmtKind::If {
                condition,
                body,
                else_body,
            } => {
                self.visit_expr(condition, prog)?;
                self.convert_scoped_stmt(body, prog)?;
                if let Some(else_body) = else_body {
                    self.convert_scoped_stmt(else_body, prog)?;
                }
                Ok(())
            }
            StmtKind::Switch { selector, cases } => {
                self.visit_expr(selector, prog)?;
                for case in cases {
                    if let Some(expr) = &mut case.expr {
                        self.visit_expr(expr, prog)?;
                    }
                    self.convert_stmt_list(&mut case.stmts, prog)?;
                }
                Ok(())
            }
            StmtKind::Return(Some(expr)) => {
                self.visit_expr(expr, prog)?;
                if let Some(function) = self.tracker.active_function_decl() {
                    let return_ty = prog.functions[function].return_ty.clone();
                    self.convert_expr_target_type(expr, &return_ty, true, prog)?;
                }
                Ok(())
            }
            _ => visitor::walk_stmt(self, stmt, prog),
        }
    }

    fn visit_expr(&mut self, expr: &mut Expr, prog: &mut Program) -> Result<()> {
        self.convert_expr(expr, ConvertFlags::ALL_PRE_VISIT, prog)?;
        self.visit_expr_children(expr, prog)?;
        self.convert_expr(expr, ConvertFlags::ALL_POST_VISIT, prog)?;
        Ok(())
    }
}

impl ExprConverter {
    fn visit_expr_children(&mut self, expr: &mut Expr, prog: &mut Program) -> Result<()> {
        match &mut expr.kind {
            ExprKind::Literal { data_type, value } => {
                // half literals have no GLSL spelling
                if !self.enabled(ConvertFlags::LITERAL_HALF_TO_FLOAT).is_empty() && *data_type == Some(DataType::HALF) {
                    *data_type = Some(DataType::FLOAT);
                    if let Some(stripped) = value.as_str().strip_suffix(['h', 'H']) {
                        *value = SmolStr::from(format!("{stripped}f"));
                    }
                }
                Ok(())
            }

            ExprKind::Ternary { .. } => {
                visitor::walk_expr(self, expr, prog)?;
                let ExprKind::Ternary { cond, .. } = &mut expr.kind else {
                    unreachable!()
                };
                // the condition becomes a plain boolean
                convert_expr_if_cast_required(cond, &TypeDenoter::Base(DataType::BOOL), false, prog)
            }

            ExprKind::Binary { .. } => {
                visitor::walk_expr(self, expr, prog)?;
                let ExprKind::Binary { lhs, op, rhs } = &mut expr.kind else {
                    unreachable!()
                };
                let op = *op;

                let lhs_ty = lhs.type_denoter(prog)?;
                let rhs_ty = rhs.type_denoter(prog)?;
                let common = ty::find_common_type(lhs_ty.aliased(prog), rhs_ty.aliased(prog), false);

                // division by a scalar and scalar multiplication preserve
                // the dimension of the non-scalar operand
                let match_type_size = match op {
                    BinaryOp::Div => !rhs_ty.aliased(prog).is_scalar(),
                    BinaryOp::Mul => !(lhs_ty.aliased(prog).is_scalar() || rhs_ty.aliased(prog).is_scalar()),
                    _ => true,
                };

                self.convert_expr_target_type(lhs, &common, match_type_size, prog)?;
                self.convert_expr_target_type(rhs, &common, match_type_size, prog)?;
                expr.reset_type_denoter();
                Ok(())
            }

            ExprKind::Unary { .. } => {
                visitor::walk_expr(self, expr, prog)?;
                let ExprKind::Unary { expr: operand, .. } = &mut expr.kind else {
                    unreachable!()
                };
                if !self.enabled(ConvertFlags::UNARY_EXPR).is_empty()
                    && matches!(operand.kind, ExprKind::Unary { .. })
                {
                    let inner = take_expr(operand);
                    **operand = factory::make_bracket_expr(inner);
                }
                Ok(())
            }

            ExprKind::Call(call) => {
                // vector-vector multiplication maps to the dot product
                if call.intrinsic == Some(Intrinsic::Mul) && call.args.len() == 2 {
                    let lhs_vec = call.args[0].type_denoter(prog)?.aliased(prog).is_vector();
                    let rhs_vec = call.args[1].type_denoter(prog)?.aliased(prog).is_vector();
                    if lhs_vec && rhs_vec {
                        call.intrinsic = Some(Intrinsic::Dot);
                        call.ident = "dot".into();
                    }
                }

                let interlocked = call.intrinsic.map_or(false, Intrinsic::is_interlocked);
                let saved = self.suppressed;
                if interlocked {
                    self.suppressed |= ConvertFlags::IMAGE_ACCESS | ConvertFlags::TEXTURE_BRACKET_OP;
                }
                let result = visitor::walk_expr(self, expr, prog);
                self.suppressed = saved;
                result?;

                // function call arguments adopt the parameter types
                let ExprKind::Call(call) = &mut expr.kind else {
                    return Ok(());
                };
                if let Some(function) = call.function {
                    let function = prog.function_impl(function);
                    let params = prog.functions[function].params.clone();
                    for (arg, param) in call.args.iter_mut().zip(params) {
                        let param_ty = prog.vars[param].ty.clone();
                        self.convert_expr_target_type(arg, &param_ty, true, prog)?;
                    }
                }

                // scalar literal arguments of type constructors adopt the
                // constructed base type (`float4(v, 1)` -> `float4(v, 1.0)`)
                let ExprKind::Call(call) = &mut expr.kind else {
                    return Ok(());
                };
                if let Some(TypeDenoter::Base(dt)) = &call.type_ctor {
                    if let Some(base) = dt.base() {
                        for arg in call.args.iter_mut() {
                            convert_literal_base_type(arg, base);
                        }
                    }
                }
                Ok(())
            }

            ExprKind::Assign { .. } => {
                visitor::walk_expr(self, expr, prog)?;
                let ExprKind::Assign { lvalue, rvalue, .. } = &mut expr.kind else {
                    unreachable!()
                };
                let target = lvalue.type_denoter(prog)?;
                self.convert_expr_target_type(rvalue, &target, true, prog)
            }

            ExprKind::Subscript { .. } => {
                visitor::walk_expr(self, expr, prog)?;
                let ExprKind::Subscript { indices, .. } = &mut expr.kind else {
                    unreachable!()
                };
                // array indices become integral types of the same dimension
                if self.flags.contains(ConvertFlags::IMPLICIT_CASTS) {
                    for index in indices.iter_mut() {
                        let index_ty = index.type_denoter(prog)?;
                        if let Some(dt) = index_ty.aliased(prog).data_type() {
                            let base = if dt.base() == Some(ScalarType::Int) {
                                ScalarType::Int
                            } else {
                                ScalarType::UInt
                            };
                            let target = DataType::vector_of(base, dt.vector_dim());
                            convert_expr_if_cast_required(index, &TypeDenoter::Base(target), true, prog)?;
                        }
                    }
                }
                Ok(())
            }

            _ => visitor::walk_expr(self, expr, prog),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cast_requirements() {
        // same type: no cast
        assert_eq!(must_cast_expr_to_data_type(DataType::FLOAT, DataType::FLOAT, true), None);

        // int -> float requires a cast
        assert_eq!(
            must_cast_expr_to_data_type(DataType::FLOAT, DataType::INT, true),
            Some(DataType::FLOAT)
        );

        // dimension mismatch with size matching casts to the target
        let f3 = DataType::Vector(ScalarType::Float, 3);
        let f4 = DataType::Vector(ScalarType::Float, 4);
        assert_eq!(must_cast_expr_to_data_type(f4, f3, true), Some(f4));

        // without size matching, the source dimension is preserved
        let i3 = DataType::Vector(ScalarType::Int, 3);
        assert_eq!(must_cast_expr_to_data_type(f4, i3, false), Some(f3));

        // same dimension, same base family: no cast
        assert_eq!(must_cast_expr_to_data_type(f3, f3, false), None);
    }
}
