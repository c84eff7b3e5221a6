//! Constructors for synthetic subtrees.
//!
//! Every rewriter builds its replacement nodes through these helpers so the
//! produced nodes are well formed: type denoters compute to the right thing
//! on first query and source areas carry the ignore marker. Callers never
//! mutate the denoter on a freshly constructed node.

use super::{
    ArrayDimension, AssignOp, BinaryOp, CallExpr, CodeBlock, DataType, Expr, ExprKind, Ident, IdentExpr, Intrinsic,
    Program, Register, RegisterClass, Stmt, StmtKind, SymbolRef, TypeDenoter, UniformBufferDecl, UniformBufferType,
    VarDecl, VarDeclStmt, VarId,
};
use crate::eval::Variant;
use smallvec::smallvec;
use smol_str::SmolStr;

/// `intrinsic(args...)` with an explicit result type (if the intrinsic's
/// return type is not derivable from its arguments).
pub fn make_intrinsic_call_expr(
    intrinsic: Intrinsic,
    ident: impl Into<SmolStr>,
    ret_ty: Option<TypeDenoter>,
    args: Vec<Expr>,
) -> Expr {
    Expr::new(ExprKind::Call(CallExpr {
        prefix: None,
        ident: ident.into(),
        type_ctor: None,
        ret_ty,
        intrinsic: Some(intrinsic),
        function: None,
        args,
    }))
}

/// A call to a generated wrapper function (e.g. a matrix-subscript wrapper).
pub fn make_wrapper_call_expr(ident: impl Into<SmolStr>, ret_ty: TypeDenoter, args: Vec<Expr>) -> Expr {
    Expr::new(ExprKind::Call(CallExpr {
        prefix: None,
        ident: ident.into(),
        type_ctor: None,
        ret_ty: Some(ret_ty),
        intrinsic: None,
        function: None,
        args,
    }))
}

/// A type constructor call, e.g. `float4(x, y, z, w)`.
pub fn make_type_ctor_call_expr(ty: TypeDenoter, args: Vec<Expr>) -> Expr {
    let ident = match &ty {
        TypeDenoter::Base(dt) => SmolStr::from(dt.desc()),
        other => other.ident().cloned().unwrap_or_default(),
    };
    Expr::new(ExprKind::Call(CallExpr {
        prefix: None,
        ident,
        type_ctor: Some(ty),
        ret_ty: None,
        intrinsic: None,
        function: None,
        args,
    }))
}

pub fn make_cast_expr(target: TypeDenoter, expr: Expr) -> Expr {
    Expr::new(ExprKind::Cast {
        target,
        expr: Box::new(expr),
    })
}

/// `(T)literal` — a literal wrapped in a cast to the given type.
pub fn make_literal_cast_expr(target: TypeDenoter, literal_type: DataType, value: impl Into<SmolStr>) -> Expr {
    make_cast_expr(target, make_literal_expr(literal_type, value))
}

/// Re-types an expression with a base-type cast.
pub fn convert_expr_base_type(data_type: DataType, expr: Expr) -> Expr {
    make_cast_expr(TypeDenoter::Base(data_type), expr)
}

pub fn make_literal_expr(data_type: DataType, value: impl Into<SmolStr>) -> Expr {
    Expr::new(ExprKind::Literal {
        data_type: Some(data_type),
        value: value.into(),
    })
}

/// A literal for an evaluated constant, or `None` if the value has no
/// representable literal form.
pub fn make_literal_expr_or_null(value: &Variant) -> Option<Expr> {
    let text = value.to_literal_string();
    if text.is_empty() {
        return None;
    }
    Some(make_literal_expr(value.data_type(), text))
}

/// An identifier expression bound to a declaration.
pub fn make_object_expr(ident: impl Into<SmolStr>, symbol: SymbolRef) -> Expr {
    Expr::new(ExprKind::Ident(IdentExpr {
        prefix: None,
        ident: ident.into(),
        symbol: Some(symbol),
        is_static: false,
    }))
}

pub fn make_var_object_expr(prog: &Program, var: VarId) -> Expr {
    make_object_expr(prog.vars[var].ident.original().clone(), SymbolRef::Var(var))
}

/// `prefix.ident`, optionally bound to a declaration (swizzles pass `None`).
pub fn make_prefixed_object_expr(prefix: Expr, ident: impl Into<SmolStr>, symbol: Option<SymbolRef>) -> Expr {
    Expr::new(ExprKind::Ident(IdentExpr {
        prefix: Some(Box::new(prefix)),
        ident: ident.into(),
        symbol,
        is_static: false,
    }))
}

pub fn make_bracket_expr(expr: Expr) -> Expr {
    Expr::new(ExprKind::Bracket(Box::new(expr)))
}

pub fn make_binary_expr(lhs: Expr, op: BinaryOp, rhs: Expr) -> Expr {
    Expr::new(ExprKind::Binary {
        lhs: Box::new(lhs),
        op,
        rhs: Box::new(rhs),
    })
}

pub fn make_assign_expr(lvalue: Expr, rvalue: Expr) -> Expr {
    Expr::new(ExprKind::Assign {
        lvalue: Box::new(lvalue),
        op: AssignOp::Set,
        rvalue: Box::new(rvalue),
    })
}

pub fn make_assign_stmt(lvalue: Expr, rvalue: Expr) -> Stmt {
    Stmt::new(StmtKind::Expr(make_assign_expr(lvalue, rvalue)))
}

/// `prefix[i0][i1]...` — an array access with integer literal indices.
pub fn make_array_indices(indices: &[i32]) -> Vec<Expr> {
    indices
        .iter()
        .map(|&index| make_literal_expr(DataType::INT, index.to_string()))
        .collect()
}

pub fn make_array_expr(prefix: Expr, indices: Vec<Expr>) -> Expr {
    Expr::new(ExprKind::Subscript {
        prefix: Box::new(prefix),
        indices,
    })
}

/// `var[indices...] = value;`
pub fn make_array_assign_stmt(prog: &Program, var: VarId, indices: &[i32], value: Expr) -> Stmt {
    let target = make_array_expr(make_var_object_expr(prog, var), make_array_indices(indices));
    make_assign_stmt(target, value)
}

pub fn make_array_dimension(size: i32) -> ArrayDimension {
    ArrayDimension::new(size)
}

pub fn make_type_specifier(ty: TypeDenoter) -> Expr {
    Expr::new(ExprKind::TypeSpecifier(ty))
}

pub fn make_initializer_expr(exprs: Vec<Expr>) -> Expr {
    Expr::new(ExprKind::Initializer(exprs))
}

pub fn make_sequence_expr(exprs: Vec<Expr>) -> Expr {
    Expr::new(ExprKind::Sequence(exprs))
}

/// Duplicates a scalar expression into the member shape of a struct, for
/// struct "constructors" like `(S)0`: one cast per member type.
pub fn make_constructor_list_expr(scalar: Expr, member_types: &[TypeDenoter]) -> Expr {
    match member_types {
        [] => scalar,
        [single] => make_cast_expr(single.clone(), scalar),
        types => {
            let exprs = types
                .iter()
                .map(|member_ty| make_cast_expr(member_ty.clone(), clone_simple_expr(&scalar)))
                .collect();
            make_sequence_expr(exprs)
        }
    }
}

/// Shallow duplication for literal and identifier expressions; the
/// constructor-list helper only ever duplicates those.
fn clone_simple_expr(expr: &Expr) -> Expr {
    match &expr.kind {
        ExprKind::Literal { data_type, value } => Expr::new(ExprKind::Literal {
            data_type: *data_type,
            value: value.clone(),
        }),
        ExprKind::Ident(ident_expr) => Expr::new(ExprKind::Ident(IdentExpr {
            prefix: None,
            ident: ident_expr.ident.clone(),
            symbol: ident_expr.symbol,
            is_static: ident_expr.is_static,
        })),
        _ => Expr::new(ExprKind::Null),
    }
}

/// Declares a fresh variable in the program and returns its statement.
pub fn make_var_decl_stmt(
    prog: &mut Program,
    ty: TypeDenoter,
    ident: impl Into<Ident>,
    initializer: Option<Expr>,
) -> (Stmt, VarId) {
    let mut decl = VarDecl::new(ident, ty);
    decl.initializer = initializer;
    let var = prog.vars.push(decl);
    let stmt = Stmt::new(StmtKind::VarDecl(VarDeclStmt { decls: smallvec![var] }));
    (stmt, var)
}

/// Wraps a single statement in a braced scope.
pub fn make_scope_stmt(stmt: Stmt) -> Stmt {
    Stmt::new(StmtKind::Scope(CodeBlock { stmts: vec![stmt] }))
}

pub fn make_scope_stmt_list(stmts: Vec<Stmt>) -> Stmt {
    Stmt::new(StmtKind::Scope(CodeBlock { stmts }))
}

/// A fresh uniform buffer with an explicit constant-buffer binding slot.
pub fn make_uniform_buffer_decl(ident: impl Into<Ident>, binding_slot: u32) -> UniformBufferDecl {
    UniformBufferDecl {
        ident: ident.into(),
        buffer_type: UniformBufferType::ConstantBuffer,
        register: Some(Register {
            class: RegisterClass::ConstantBuffer,
            slot: binding_slot,
        }),
        members: Vec::new(),
        area: crate::diag::SourceArea::ignore(),
        flags: super::NodeFlags::empty(),
    }
}

/// The Vulkan-GLSL texture/sampler pairing call: `sampler2D(tex, smp)`.
pub fn make_texture_sampler_binding_call_expr(texture: Expr, sampler: Expr, combined_type: impl Into<SmolStr>) -> Expr {
    Expr::new(ExprKind::Call(CallExpr {
        prefix: None,
        ident: combined_type.into(),
        type_ctor: None,
        ret_ty: None,
        intrinsic: None,
        function: None,
        args: vec![texture, sampler],
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ScalarType;

    #[test]
    fn type_ctor_call_derives_its_type() {
        let prog = Program::new();
        let ty = TypeDenoter::Base(DataType::Vector(ScalarType::Float, 4));
        let mut expr = make_type_ctor_call_expr(ty.clone(), vec![make_literal_expr(DataType::FLOAT, "1.0")]);
        assert_eq!(expr.type_denoter(&prog).unwrap(), ty);
    }

    #[test]
    fn array_assign_stmt_shape() {
        let mut prog = Program::new();
        let (_, var) = make_var_decl_stmt(&mut prog, TypeDenoter::Base(DataType::FLOAT), "a", None);
        let stmt = make_array_assign_stmt(&prog, var, &[0, 1], make_literal_expr(DataType::FLOAT, "2.0"));
        match stmt.kind {
            StmtKind::Expr(expr) => match expr.kind {
                ExprKind::Assign { lvalue, .. } => match lvalue.kind {
                    ExprKind::Subscript { indices, .. } => assert_eq!(indices.len(), 2),
                    other => panic!("expected subscript lvalue, got {other:?}"),
                },
                other => panic!("expected assignment, got {other:?}"),
            },
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn literal_from_variant() {
        let expr = make_literal_expr_or_null(&Variant::Real(1.0)).unwrap();
        match expr.kind {
            ExprKind::Literal { data_type, value } => {
                assert_eq!(data_type, Some(DataType::FLOAT));
                assert_eq!(value, "1.0");
            }
            other => panic!("expected literal, got {other:?}"),
        }
    }
}
