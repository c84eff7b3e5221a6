//! The abstract syntax tree.
//!
//! Owned children are stored by direct containment (`Stmt`/`Expr` trees);
//! declarations live in per-kind arenas on [`Program`] and everything that
//! refers to a declaration holds a typed [`Id`]. This removes the pointer
//! cycles of decl/use graphs: reachability is a visit-set DFS over ids, and
//! renaming a declaration renames every use site at once.

pub mod factory;
pub mod ident;
pub mod intrinsics;
pub mod ops;
pub mod semantics;
pub mod ty;
pub mod visitor;

pub use ident::Ident;
pub use intrinsics::{Intrinsic, IntrinsicUsage};
pub use ops::{AssignOp, BinaryOp, CtrlTransfer, UnaryOp};
pub use semantics::{IndexedSemantic, Semantic};
pub use ty::{ArrayDimension, BufferType, DataType, MatrixSubscript, SamplerType, ScalarType, TypeDenoter};

use crate::diag::{SourceArea, TypeError};
use indexmap::{IndexMap, IndexSet};
use smallvec::SmallVec;
use smol_str::SmolStr;
use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
    marker::PhantomData,
    num::NonZeroU32,
    ops::{Index, IndexMut},
};

#[repr(transparent)]
pub struct Id<T>(NonZeroU32, PhantomData<fn() -> T>);

impl<T> Id<T> {
    pub fn index(&self) -> usize {
        (self.0.get() - 1) as usize
    }

    fn from_index(index: usize) -> Id<T> {
        Id(NonZeroU32::new((index + 1) as u32).expect("arena index overflow"), PhantomData)
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T> Eq for Id<T> {}

impl<T> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

#[derive(Debug)]
pub struct Arena<T> {
    items: Vec<T>,
}

impl<T> Arena<T> {
    pub fn new() -> Arena<T> {
        Arena { items: Vec::new() }
    }

    pub fn push(&mut self, item: T) -> Id<T> {
        self.items.push(item);
        Id::from_index(self.items.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Id<T>, &T)> + '_ {
        self.items.iter().enumerate().map(|(i, item)| (Id::from_index(i), item))
    }

    pub fn ids(&self) -> impl Iterator<Item = Id<T>> {
        (0..self.items.len()).map(Id::from_index)
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Arena<T> {
        Arena::new()
    }
}

impl<T> Index<Id<T>> for Arena<T> {
    type Output = T;

    fn index(&self, id: Id<T>) -> &T {
        &self.items[id.index()]
    }
}

impl<T> IndexMut<Id<T>> for Arena<T> {
    fn index_mut(&mut self, id: Id<T>) -> &mut T {
        &mut self.items[id.index()]
    }
}

pub type VarId = Id<VarDecl>;
pub type BufferId = Id<BufferDecl>;
pub type SamplerId = Id<SamplerDecl>;
pub type StructId = Id<StructDecl>;
pub type AliasId = Id<AliasDecl>;
pub type FunctionId = Id<FunctionDecl>;
pub type UniformBufferId = Id<UniformBufferDecl>;

bitflags::bitflags! {
    /// Per-node analysis flags.
    pub struct NodeFlags: u32 {
        /// Reachable from the entry point(s).
        const REACHABLE = 1 << 30;
        /// Used by another expression or statement.
        const USED = 1 << 29;
        /// Dead code (after a return path).
        const DEAD_CODE = 1 << 28;

        const WRITTEN_TO = 1 << 0;
        const SHADER_INPUT = 1 << 1;
        const SHADER_OUTPUT = 1 << 2;
        const SYSTEM_VALUE = 1 << 3;
        const DYNAMIC_ARRAY = 1 << 4;
        const WAS_CONVERTED = 1 << 5;
        const ENTRY_POINT = 1 << 6;
        const SECONDARY_ENTRY_POINT = 1 << 7;
        const NON_ENTRY_POINT_PARAM = 1 << 8;
        const BASE_MEMBER = 1 << 9;
        const SELF_PARAMETER = 1 << 10;
        const IMMUTABLE = 1 << 11;
        const HAS_NON_RETURN_CONTROL_PATH = 1 << 12;
        const END_OF_FUNCTION = 1 << 13;
        const STATIC = 1 << 14;
        const CAN_INLINE_INTRINSIC_WRAPPER = 1 << 15;
        const USED_FOR_IMAGE_READ = 1 << 16;
        /// Local variable that stands in for an entry-point output struct.
        const ENTRY_POINT_OUTPUT = 1 << 17;
        const NESTED_STRUCT = 1 << 18;
        const DISABLE_CODEGEN = 1 << 19;
    }
}

impl NodeFlags {
    /// Sets the flag and reports whether it was newly set (set-once test
    /// used by the reachability traversal).
    pub fn set_once(&mut self, flag: NodeFlags) -> bool {
        if self.contains(flag) {
            false
        } else {
            self.insert(flag);
            true
        }
    }
}

impl Default for NodeFlags {
    fn default() -> NodeFlags {
        NodeFlags::empty()
    }
}

/// A reference to a declaration of any kind.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum SymbolRef {
    Var(VarId),
    Buffer(BufferId),
    Sampler(SamplerId),
    Struct(StructId),
    Alias(AliasId),
    Function(FunctionId),
    UniformBuffer(UniformBufferId),
}

/* ----- Declarations ----- */

bitflags::bitflags! {
    /// Storage and input modifiers of a variable declaration.
    pub struct StorageFlags: u32 {
        const INPUT = 1 << 0;
        const OUTPUT = 1 << 1;
        const UNIFORM = 1 << 2;
        const CONST = 1 << 3;
        const STATIC = 1 << 4;
        const GROUPSHARED = 1 << 5;
        const ROW_MAJOR = 1 << 6;
        const COLUMN_MAJOR = 1 << 7;
    }
}

impl Default for StorageFlags {
    fn default() -> StorageFlags {
        StorageFlags::empty()
    }
}

/// Interpolation modifiers of shader I/O variables.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum InterpModifier {
    Linear,
    Centroid,
    NoInterpolation,
    NoPerspective,
    Sample,
}

/// A `register(x#)` binding slot.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Register {
    pub class: RegisterClass,
    pub slot: u32,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum RegisterClass {
    /// `b` — constant buffer.
    ConstantBuffer,
    /// `t` — texture/shader resource.
    TextureBuffer,
    /// `s` — sampler.
    Sampler,
    /// `u` — unordered access.
    UnorderedAccess,
}

/// A `packoffset(c#.x)` layout hint on a constant-buffer field.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct PackOffset {
    pub register_name: SmolStr,
    pub vector_component: Option<char>,
}

#[derive(Debug)]
pub struct VarDecl {
    pub ident: Ident,
    /// Full type including array dimensions.
    pub ty: TypeDenoter,
    pub storage: StorageFlags,
    pub interp: Option<InterpModifier>,
    pub semantic: Option<IndexedSemantic>,
    pub pack_offset: Option<PackOffset>,
    pub initializer: Option<Expr>,
    /// Owning struct for member variables.
    pub struct_ref: Option<StructId>,
    /// Owning uniform buffer for constant-buffer fields.
    pub buffer_ref: Option<UniformBufferId>,
    pub area: SourceArea,
    pub flags: NodeFlags,
}

impl VarDecl {
    pub fn new(ident: impl Into<Ident>, ty: TypeDenoter) -> VarDecl {
        VarDecl {
            ident: ident.into(),
            ty,
            storage: StorageFlags::empty(),
            interp: None,
            semantic: None,
            pack_offset: None,
            initializer: None,
            struct_ref: None,
            buffer_ref: None,
            area: SourceArea::ignore(),
            flags: NodeFlags::empty(),
        }
    }

    pub fn is_static(&self) -> bool {
        self.storage.contains(StorageFlags::STATIC)
    }

    pub fn is_uniform(&self) -> bool {
        self.storage.contains(StorageFlags::UNIFORM)
    }
}

#[derive(Debug)]
pub struct BufferDecl {
    pub ident: Ident,
    pub buffer_type: BufferType,
    /// Generic sub type; `None` defaults to `float4`.
    pub generic: Option<TypeDenoter>,
    pub generic_size: i32,
    pub array_dims: SmallVec<[ArrayDimension; 2]>,
    pub register: Option<Register>,
    pub area: SourceArea,
    pub flags: NodeFlags,
}

#[derive(Debug)]
pub struct SamplerDecl {
    pub ident: Ident,
    pub sampler_type: SamplerType,
    pub register: Option<Register>,
    pub area: SourceArea,
    pub flags: NodeFlags,
}

#[derive(Debug)]
pub struct StructDecl {
    pub ident: Ident,
    /// Base structure for inheritance.
    pub base_struct: Option<StructId>,
    /// Enclosing structure for nested declarations.
    pub parent_struct: Option<StructId>,
    /// Target-side struct with positionally compatible members.
    pub compatible_struct: Option<StructId>,
    pub members: Vec<VarId>,
    pub member_fns: Vec<FunctionId>,
    /// Number of entry-point output instances of this structure.
    pub output_instances: u32,
    pub area: SourceArea,
    pub flags: NodeFlags,
}

impl StructDecl {
    pub fn new(ident: impl Into<Ident>) -> StructDecl {
        StructDecl {
            ident: ident.into(),
            base_struct: None,
            parent_struct: None,
            compatible_struct: None,
            members: Vec::new(),
            member_fns: Vec::new(),
            output_instances: 0,
            area: SourceArea::ignore(),
            flags: NodeFlags::empty(),
        }
    }

    pub fn has_multiple_output_instances(&self) -> bool {
        self.output_instances > 1
    }
}

#[derive(Debug)]
pub struct AliasDecl {
    pub ident: Ident,
    pub ty: TypeDenoter,
    pub area: SourceArea,
    pub flags: NodeFlags,
}

#[derive(Debug)]
pub struct FunctionDecl {
    pub ident: Ident,
    pub return_ty: TypeDenoter,
    pub semantic: Option<IndexedSemantic>,
    pub params: Vec<VarId>,
    /// `None` for forward declarations.
    pub body: Option<CodeBlock>,
    /// Owning struct for member functions.
    pub struct_ref: Option<StructId>,
    /// Implementation of this forward declaration.
    pub impl_ref: Option<FunctionId>,
    /// Forward declarations of this implementation.
    pub forward_decls: Vec<FunctionId>,
    /// Entry-point input/output semantic variables.
    pub input_semantics: Vec<VarId>,
    pub output_semantics: Vec<VarId>,
    pub area: SourceArea,
    pub flags: NodeFlags,
}

impl FunctionDecl {
    pub fn new(ident: impl Into<Ident>, return_ty: TypeDenoter) -> FunctionDecl {
        FunctionDecl {
            ident: ident.into(),
            return_ty,
            semantic: None,
            params: Vec::new(),
            body: None,
            struct_ref: None,
            impl_ref: None,
            forward_decls: Vec::new(),
            input_semantics: Vec::new(),
            output_semantics: Vec::new(),
            area: SourceArea::ignore(),
            flags: NodeFlags::empty(),
        }
    }

    pub fn is_forward_decl(&self) -> bool {
        self.body.is_none()
    }

    pub fn is_member_fn(&self) -> bool {
        self.struct_ref.is_some()
    }

    pub fn has_void_return_type(&self) -> bool {
        self.return_ty.is_void()
    }
}

/// `cbuffer`/`tbuffer` kinds.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum UniformBufferType {
    ConstantBuffer,
    TextureBuffer,
}

#[derive(Debug)]
pub struct UniformBufferDecl {
    pub ident: Ident,
    pub buffer_type: UniformBufferType,
    pub register: Option<Register>,
    pub members: Vec<VarId>,
    pub area: SourceArea,
    pub flags: NodeFlags,
}

/* ----- Statements ----- */

#[derive(Debug, Default)]
pub struct CodeBlock {
    pub stmts: Vec<Stmt>,
}

#[derive(Debug)]
pub struct SwitchCase {
    /// `None` marks the default case.
    pub expr: Option<Expr>,
    pub stmts: Vec<Stmt>,
}

/// A variable declaration statement; the declared variables (and their
/// shared type) live in the program's `vars` arena.
#[derive(Debug)]
pub struct VarDeclStmt {
    pub decls: SmallVec<[VarId; 1]>,
}

#[derive(Debug)]
pub struct Stmt {
    pub area: SourceArea,
    pub flags: NodeFlags,
    /// Optional commentary attached by the frontend.
    pub comment: Option<String>,
    pub kind: StmtKind,
}

impl Stmt {
    pub fn new(kind: StmtKind) -> Stmt {
        Stmt {
            area: SourceArea::ignore(),
            flags: NodeFlags::empty(),
            comment: None,
            kind,
        }
    }
}

#[derive(Debug)]
pub enum StmtKind {
    Null,
    Scope(CodeBlock),
    For {
        init: Option<Box<Stmt>>,
        condition: Option<Expr>,
        iteration: Option<Expr>,
        body: Box<Stmt>,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        condition: Expr,
    },
    If {
        condition: Expr,
        body: Box<Stmt>,
        else_body: Option<Box<Stmt>>,
    },
    Switch {
        selector: Expr,
        cases: Vec<SwitchCase>,
    },
    Expr(Expr),
    Return(Option<Expr>),
    CtrlTransfer(CtrlTransfer),
    VarDecl(VarDeclStmt),
    BufferDecl(Vec<BufferId>),
    SamplerDecl(Vec<SamplerId>),
    AliasDecl(Vec<AliasId>),
    /// Declaration statement for functions, structs and uniform buffers.
    Basic(SymbolRef),
}

/* ----- Expressions ----- */

#[derive(Clone, Debug)]
pub struct CallExpr {
    /// Object prefix of a member call (`tex.Sample(...)`).
    pub prefix: Option<Box<Expr>>,
    /// Callee spelling; for wrapper calls this is the final output name.
    pub ident: SmolStr,
    /// Set when the call is a type constructor (`float4(...)`).
    pub type_ctor: Option<TypeDenoter>,
    /// Explicit return type for synthesized intrinsic calls.
    pub ret_ty: Option<TypeDenoter>,
    pub intrinsic: Option<Intrinsic>,
    pub function: Option<FunctionId>,
    pub args: Vec<Expr>,
}

#[derive(Clone, Debug)]
pub struct IdentExpr {
    /// Prefix expression of a member access (`a.b` stores `a` here).
    pub prefix: Option<Box<Expr>>,
    pub ident: SmolStr,
    pub symbol: Option<SymbolRef>,
    /// Namespace access (`Base::member`).
    pub is_static: bool,
}

#[derive(Clone, Debug)]
pub struct Expr {
    pub area: SourceArea,
    pub flags: NodeFlags,
    pub kind: ExprKind,
    /// Lazily derived type; reset after any mutation of the subtree.
    ty: Option<TypeDenoter>,
}

#[derive(Clone, Debug)]
pub enum ExprKind {
    Null,
    Sequence(Vec<Expr>),
    Literal {
        /// `None` for the `NULL` literal.
        data_type: Option<DataType>,
        value: SmolStr,
    },
    TypeSpecifier(TypeDenoter),
    Ternary {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    Binary {
        lhs: Box<Expr>,
        op: BinaryOp,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    PostUnary {
        expr: Box<Expr>,
        op: UnaryOp,
    },
    Call(CallExpr),
    Bracket(Box<Expr>),
    Ident(IdentExpr),
    Assign {
        lvalue: Box<Expr>,
        op: AssignOp,
        rvalue: Box<Expr>,
    },
    Subscript {
        prefix: Box<Expr>,
        indices: Vec<Expr>,
    },
    Cast {
        target: TypeDenoter,
        expr: Box<Expr>,
    },
    Initializer(Vec<Expr>),
}

impl Expr {
    pub fn new(kind: ExprKind) -> Expr {
        Expr {
            area: SourceArea::ignore(),
            flags: NodeFlags::empty(),
            kind,
            ty: None,
        }
    }

    pub fn with_area(kind: ExprKind, area: SourceArea) -> Expr {
        Expr {
            area,
            flags: NodeFlags::empty(),
            kind,
            ty: None,
        }
    }

    /// Returns the buffered type denoter, deriving it on first query.
    pub fn type_denoter(&mut self, prog: &Program) -> Result<TypeDenoter, TypeError> {
        if self.ty.is_none() {
            let derived = self.derive_type(prog)?;
            self.ty = Some(derived);
        }
        Ok(self.ty.clone().expect("type denoter was just derived"))
    }

    /// Drops the buffered type so the next query re-derives it. Does not
    /// recurse; passes that rewrite subtrees reset along the spine they
    /// touched (the type converter handles transitive dependencies).
    pub fn reset_type_denoter(&mut self) {
        self.ty = None;
    }

    /// The variable this expression resolves to, looking through brackets.
    pub fn fetch_var_decl(&self) -> Option<VarId> {
        match &self.kind {
            ExprKind::Ident(ident_expr) => match ident_expr.symbol {
                Some(SymbolRef::Var(id)) => Some(id),
                _ => None,
            },
            ExprKind::Bracket(inner) => inner.fetch_var_decl(),
            _ => None,
        }
    }

    /// The innermost expression that is not a bracket.
    pub fn without_brackets(&self) -> &Expr {
        match &self.kind {
            ExprKind::Bracket(inner) => inner.without_brackets(),
            _ => self,
        }
    }

    /// True if a call expression occurs anywhere in this subtree (such an
    /// expression must not be duplicated by a rewrite).
    pub fn contains_call(&self) -> bool {
        match &self.kind {
            ExprKind::Call(_) => true,
            ExprKind::Null | ExprKind::Literal { .. } | ExprKind::TypeSpecifier(_) => false,
            ExprKind::Sequence(exprs) | ExprKind::Initializer(exprs) => exprs.iter().any(Expr::contains_call),
            ExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => cond.contains_call() || then_expr.contains_call() || else_expr.contains_call(),
            ExprKind::Binary { lhs, rhs, .. } => lhs.contains_call() || rhs.contains_call(),
            ExprKind::Unary { expr, .. } | ExprKind::PostUnary { expr, .. } | ExprKind::Bracket(expr) => {
                expr.contains_call()
            }
            ExprKind::Ident(ident_expr) => ident_expr.prefix.as_deref().map_or(false, Expr::contains_call),
            ExprKind::Assign { lvalue, rvalue, .. } => lvalue.contains_call() || rvalue.contains_call(),
            ExprKind::Subscript { prefix, indices } => {
                prefix.contains_call() || indices.iter().any(Expr::contains_call)
            }
            ExprKind::Cast { expr, .. } => expr.contains_call(),
        }
    }

    fn derive_type(&mut self, prog: &Program) -> Result<TypeDenoter, TypeError> {
        let area = self.area;
        match &mut self.kind {
            ExprKind::Null => Ok(TypeDenoter::Null),
            ExprKind::Sequence(exprs) => match exprs.first_mut() {
                Some(first) => first.type_denoter(prog),
                None => Ok(TypeDenoter::Void),
            },
            ExprKind::Literal { data_type, .. } => Ok(match data_type {
                Some(dt) => TypeDenoter::Base(*dt),
                None => TypeDenoter::Null,
            }),
            ExprKind::TypeSpecifier(ty) => Ok(ty.clone()),
            ExprKind::Ternary {
                then_expr, else_expr, ..
            } => {
                let then_ty = then_expr.type_denoter(prog)?;
                let else_ty = else_expr.type_denoter(prog)?;
                Ok(ty::find_common_type(&then_ty, &else_ty, false))
            }
            ExprKind::Binary { lhs, op, rhs } => {
                let lhs_ty = lhs.type_denoter(prog)?;
                let rhs_ty = rhs.type_denoter(prog)?;
                let common = ty::find_common_type(&lhs_ty, &rhs_ty, false);
                if op.is_boolean() {
                    Ok(ty::bool_type_with_dimension_of(&common))
                } else {
                    Ok(common)
                }
            }
            ExprKind::Unary { op, expr } => {
                let sub = expr.type_denoter(prog)?;
                if op.is_logical() {
                    Ok(ty::bool_type_with_dimension_of(&sub))
                } else {
                    Ok(sub)
                }
            }
            ExprKind::PostUnary { expr, .. } => expr.type_denoter(prog),
            ExprKind::Call(call) => derive_call_type(call, prog, area),
            ExprKind::Bracket(expr) => expr.type_denoter(prog),
            ExprKind::Ident(ident_expr) => derive_ident_type(ident_expr, prog, area),
            ExprKind::Assign { lvalue, .. } => lvalue.type_denoter(prog),
            ExprKind::Subscript { prefix, indices } => {
                let prefix_ty = prefix.type_denoter(prog)?;
                prefix_ty.get_sub_array(indices.len(), prog, area)
            }
            ExprKind::Cast { target, .. } => Ok(target.clone()),
            ExprKind::Initializer(exprs) => match exprs.first_mut() {
                Some(first) => {
                    let elem_ty = first.type_denoter(prog)?;
                    let dims = [ArrayDimension::new(exprs.len() as i32)];
                    Ok(elem_ty.as_array(&dims))
                }
                None => Ok(TypeDenoter::Void),
            },
        }
    }
}

fn derive_ident_type(ident_expr: &mut IdentExpr, prog: &Program, area: SourceArea) -> Result<TypeDenoter, TypeError> {
    if let Some(symbol) = ident_expr.symbol {
        return Ok(prog.symbol_type_denoter(symbol));
    }
    match &mut ident_expr.prefix {
        Some(prefix) => {
            let prefix_ty = prefix.type_denoter(prog)?;
            prefix_ty.get_sub_object(&ident_expr.ident, prog, area)
        }
        None => Err(TypeError::new(
            format!("undeclared identifier '{}'", ident_expr.ident),
            area,
        )),
    }
}

fn derive_call_type(call: &mut CallExpr, prog: &Program, area: SourceArea) -> Result<TypeDenoter, TypeError> {
    if let Some(ctor_ty) = &call.type_ctor {
        return Ok(ctor_ty.clone());
    }
    if let Some(ret_ty) = &call.ret_ty {
        return Ok(ret_ty.clone());
    }
    if let Some(function) = call.function {
        return Ok(prog.functions[function].return_ty.clone());
    }
    if let Some(intrinsic) = call.intrinsic {
        return derive_intrinsic_type(call, intrinsic, prog, area);
    }
    Err(TypeError::new(
        format!("unresolved call to '{}'", call.ident),
        area,
    ))
}

fn derive_intrinsic_type(
    call: &mut CallExpr,
    intrinsic: Intrinsic,
    prog: &Program,
    area: SourceArea,
) -> Result<TypeDenoter, TypeError> {
    use Intrinsic::*;

    let mut arg_ty = |call: &mut CallExpr, index: usize| -> Result<TypeDenoter, TypeError> {
        match call.args.get_mut(index) {
            Some(arg) => arg.type_denoter(prog),
            None => Err(TypeError::new(
                format!("missing argument {} for intrinsic call", index + 1),
                area,
            )),
        }
    };

    let scalar_of = |ty: &TypeDenoter| {
        let base = ty
            .data_type()
            .and_then(DataType::base)
            .unwrap_or(ScalarType::Float);
        TypeDenoter::Base(DataType::Scalar(base))
    };

    match intrinsic {
        // texture access goes through the prefix object's generic type
        _ if intrinsic.is_texture_sample() || intrinsic.is_texture_load() || intrinsic.is_texture_gather() => {
            if intrinsic.is_texture_compare() {
                return Ok(TypeDenoter::Base(DataType::FLOAT));
            }
            match &mut call.prefix {
                Some(prefix) => {
                    let prefix_ty = prefix.type_denoter(prog)?;
                    match prefix_ty.aliased(prog).buffer_generic() {
                        Some(generic) => Ok(generic),
                        None => Ok(TypeDenoter::Base(DataType::FLOAT4)),
                    }
                }
                None => Ok(TypeDenoter::Base(DataType::FLOAT4)),
            }
        }

        All | Any | IsInf | IsNaN => {
            let ty = arg_ty(call, 0)?;
            match intrinsic {
                All | Any => Ok(TypeDenoter::Base(DataType::BOOL)),
                _ => Ok(ty::bool_type_with_dimension_of(&ty)),
            }
        }

        Equal | NotEqual | LessThan | LessThanEqual | GreaterThan | GreaterThanEqual | Not => {
            let ty = arg_ty(call, 0)?;
            Ok(ty::bool_type_with_dimension_of(&ty))
        }

        Dot | Distance | Length | Determinant => {
            let ty = arg_ty(call, 0)?;
            Ok(scalar_of(&ty))
        }

        Cross => Ok(TypeDenoter::Base(DataType::Vector(ScalarType::Float, 3))),

        Transpose => {
            let ty = arg_ty(call, 0)?;
            match ty.data_type() {
                Some(DataType::Matrix(base, rows, cols)) => Ok(TypeDenoter::Base(DataType::Matrix(base, cols, rows))),
                _ => Ok(ty),
            }
        }

        Mul => {
            let lhs = arg_ty(call, 0)?;
            let rhs = arg_ty(call, 1)?;
            Ok(mul_intrinsic_type(&lhs, &rhs))
        }

        // HLSL 3 texture functions return a 4-vector texel
        Tex1D | Tex1DLod | Tex2D | Tex2DLod | Tex3D | Tex3DLod | TexCube | TexCubeLod => {
            Ok(TypeDenoter::Base(DataType::FLOAT4))
        }

        ImageLoad => Ok(TypeDenoter::Base(DataType::FLOAT4)),
        ImageStore | TextureGetDimensions | SinCos | Clip | AllMemoryBarrier | AllMemoryBarrierWithGroupSync
        | DeviceMemoryBarrier | DeviceMemoryBarrierWithGroupSync | GroupMemoryBarrier
        | GroupMemoryBarrierWithGroupSync | StreamOutputAppend | StreamOutputRestartStrip => Ok(TypeDenoter::Void),

        _ if intrinsic.is_interlocked() || intrinsic.is_image_atomic() => {
            // atomics return the original value through an out parameter in
            // HLSL form; the GLSL form returns it directly
            match call.args.last_mut() {
                Some(last) => last.type_denoter(prog),
                None => Ok(TypeDenoter::Void),
            }
        }

        // component-wise intrinsics inherit the first argument's type
        _ => arg_ty(call, 0),
    }
}

/// `mul` typing: matrix*vector, vector*matrix, matrix*matrix and the scalar
/// broadcast combinations.
fn mul_intrinsic_type(lhs: &TypeDenoter, rhs: &TypeDenoter) -> TypeDenoter {
    let (Some(a), Some(b)) = (lhs.data_type(), rhs.data_type()) else {
        return lhs.clone();
    };
    let base = a.base().or(b.base()).unwrap_or(ScalarType::Float);
    match (a, b) {
        (DataType::Matrix(_, rows, _), DataType::Vector(..)) => TypeDenoter::Base(DataType::vector_of(base, rows)),
        (DataType::Vector(..), DataType::Matrix(_, _, cols)) => TypeDenoter::Base(DataType::vector_of(base, cols)),
        (DataType::Matrix(_, rows, _), DataType::Matrix(_, _, cols)) => {
            TypeDenoter::Base(DataType::matrix_of(base, rows, cols))
        }
        (DataType::Scalar(_), _) => rhs.clone(),
        (_, DataType::Scalar(_)) => lhs.clone(),
        _ => lhs.clone(),
    }
}

/* ----- Program ----- */

/// Layout meta data for tessellation-control shaders.
#[derive(Debug, Default)]
pub struct LayoutTessControl {
    pub output_control_points: u32,
    pub max_tess_factor: f32,
    pub patch_const_function: Option<FunctionId>,
}

/// Layout meta data for tessellation-evaluation shaders.
#[derive(Debug, Default)]
pub struct LayoutTessEvaluation {
    pub domain: Option<SmolStr>,
    pub partitioning: Option<SmolStr>,
    pub output_topology: Option<SmolStr>,
}

/// Layout meta data for geometry shaders.
#[derive(Debug, Default)]
pub struct LayoutGeometry {
    pub input_primitive: Option<SmolStr>,
    pub output_primitive: Option<BufferType>,
    pub max_vertices: u32,
}

/// Layout meta data for fragment shaders.
#[derive(Debug, Default)]
pub struct LayoutFragment {
    pub frag_coord_used: bool,
    pub pixel_center_integer: bool,
    pub early_depth_stencil: bool,
}

/// Layout meta data for compute shaders.
#[derive(Debug, Default)]
pub struct LayoutCompute {
    pub num_threads: [u32; 3],
}

/// AST nodes removed from code generation but kept alive so references into
/// them stay valid until the end of the compilation. Append-only.
#[derive(Debug)]
pub enum DisabledNode {
    Stmt(Stmt),
    Expr(Expr),
}

/// The program root: global statements plus the declaration arenas.
#[derive(Debug, Default)]
pub struct Program {
    pub global_stmts: Vec<Stmt>,

    pub vars: Arena<VarDecl>,
    pub buffers: Arena<BufferDecl>,
    pub samplers: Arena<SamplerDecl>,
    pub structs: Arena<StructDecl>,
    pub aliases: Arena<AliasDecl>,
    pub functions: Arena<FunctionDecl>,
    pub uniform_buffers: Arena<UniformBufferDecl>,

    pub entry_point: Option<FunctionId>,

    /// All used intrinsics with their observed argument signatures.
    pub used_intrinsics: IndexMap<Intrinsic, IntrinsicUsage>,
    /// All used matrix subscripts (drive wrapper-function emission).
    pub used_matrix_subscripts: IndexSet<MatrixSubscript>,

    pub layout_tess_control: LayoutTessControl,
    pub layout_tess_evaluation: LayoutTessEvaluation,
    pub layout_geometry: LayoutGeometry,
    pub layout_fragment: LayoutFragment,
    pub layout_compute: LayoutCompute,

    pub disabled: Vec<DisabledNode>,
}

impl Program {
    pub fn new() -> Program {
        Program::default()
    }

    /// Records an intrinsic call with the data types of its arguments.
    pub fn register_intrinsic_usage(&mut self, intrinsic: Intrinsic, arg_types: Vec<DataType>) {
        self.used_intrinsics
            .entry(intrinsic)
            .or_default()
            .arg_lists
            .insert(arg_types);
    }

    /// The type denoter of any declaration.
    pub fn symbol_type_denoter(&self, symbol: SymbolRef) -> TypeDenoter {
        match symbol {
            SymbolRef::Var(id) => self.vars[id].ty.clone(),
            SymbolRef::Buffer(id) => self.buffer_type_denoter(id),
            SymbolRef::Sampler(id) => TypeDenoter::Sampler {
                sampler_type: self.samplers[id].sampler_type,
                decl: Some(id),
            },
            SymbolRef::Struct(id) => TypeDenoter::Struct {
                ident: self.structs[id].ident.original().clone(),
                decl: Some(id),
            },
            SymbolRef::Alias(id) => TypeDenoter::Alias {
                ident: self.aliases[id].ident.original().clone(),
                decl: Some(id),
            },
            SymbolRef::Function(id) => TypeDenoter::Function {
                ident: self.functions[id].ident.original().clone(),
                candidates: vec![id],
            },
            SymbolRef::UniformBuffer(_) => TypeDenoter::Void,
        }
    }

    pub fn buffer_type_denoter(&self, id: BufferId) -> TypeDenoter {
        let decl = &self.buffers[id];
        let buffer = TypeDenoter::Buffer {
            buffer_type: decl.buffer_type,
            generic: decl.generic.clone().map(Box::new),
            generic_size: decl.generic_size,
            decl: Some(id),
        };
        buffer.as_array(&decl.array_dims)
    }

    /// Looks up a member variable by original name, searching base structs.
    pub fn fetch_struct_member(&self, struct_id: StructId, ident: &str) -> Option<VarId> {
        let mut current = Some(struct_id);
        while let Some(id) = current {
            let decl = &self.structs[id];
            for &member in &decl.members {
                if self.vars[member].ident.original() == ident {
                    return Some(member);
                }
            }
            current = decl.base_struct;
        }
        None
    }

    /// The base member synthesized for derived structs (flagged
    /// `BASE_MEMBER`), if present.
    pub fn fetch_base_member(&self, struct_id: StructId) -> Option<VarId> {
        self.structs[struct_id]
            .members
            .iter()
            .copied()
            .find(|&member| self.vars[member].flags.contains(NodeFlags::BASE_MEMBER))
    }

    /// True if `base` appears in the inheritance chain of `derived`.
    pub fn is_base_of(&self, base: StructId, derived: StructId) -> bool {
        let mut current = self.structs[derived].base_struct;
        while let Some(id) = current {
            if id == base {
                return true;
            }
            current = self.structs[id].base_struct;
        }
        false
    }

    /// Sets flags on the struct and all enclosing parent structs (the flag
    /// is monotonic along parent links).
    pub fn add_struct_flags_recursive_parents(&mut self, struct_id: StructId, flags: NodeFlags) {
        let mut current = Some(struct_id);
        while let Some(id) = current {
            self.structs[id].flags.insert(flags);
            current = self.structs[id].parent_struct;
        }
    }

    /// Member index of a variable within a struct (positional, including
    /// base members), used by the compatible-struct rewiring.
    pub fn struct_member_index(&self, struct_id: StructId, member: VarId) -> Option<usize> {
        self.structs[struct_id].members.iter().position(|&m| m == member)
    }

    /// The function implementation behind a possibly-forward declaration.
    pub fn function_impl(&self, id: FunctionId) -> FunctionId {
        match self.functions[id].impl_ref {
            Some(impl_id) if self.functions[id].is_forward_decl() => impl_id,
            _ => id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_ids_are_stable() {
        let mut arena = Arena::new();
        let a = arena.push(1);
        let b = arena.push(2);
        assert_ne!(a, b);
        assert_eq!(arena[a], 1);
        assert_eq!(arena[b], 2);
        arena[a] = 10;
        assert_eq!(arena[a], 10);
    }

    #[test]
    fn set_once_reports_first_set_only() {
        let mut flags = NodeFlags::empty();
        assert!(flags.set_once(NodeFlags::REACHABLE));
        assert!(!flags.set_once(NodeFlags::REACHABLE));
        assert!(flags.contains(NodeFlags::REACHABLE));
    }

    #[test]
    fn struct_member_lookup_searches_base_chain() {
        let mut prog = Program::new();
        let base_member = prog.vars.push(VarDecl::new("base_field", TypeDenoter::Base(DataType::FLOAT)));
        let mut base = StructDecl::new("Base");
        base.members.push(base_member);
        let base_id = prog.structs.push(base);

        let derived_member = prog.vars.push(VarDecl::new("extra", TypeDenoter::Base(DataType::FLOAT)));
        let mut derived = StructDecl::new("Derived");
        derived.base_struct = Some(base_id);
        derived.members.push(derived_member);
        let derived_id = prog.structs.push(derived);

        assert_eq!(prog.fetch_struct_member(derived_id, "extra"), Some(derived_member));
        assert_eq!(prog.fetch_struct_member(derived_id, "base_field"), Some(base_member));
        assert!(prog.fetch_struct_member(derived_id, "missing").is_none());
        assert!(prog.is_base_of(base_id, derived_id));
    }

    #[test]
    fn non_entry_point_flag_propagates_to_parents() {
        let mut prog = Program::new();
        let outer = prog.structs.push(StructDecl::new("Outer"));
        let mut inner = StructDecl::new("Inner");
        inner.parent_struct = Some(outer);
        let inner_id = prog.structs.push(inner);

        prog.add_struct_flags_recursive_parents(inner_id, NodeFlags::NON_ENTRY_POINT_PARAM);

        assert!(prog.structs[inner_id].flags.contains(NodeFlags::NON_ENTRY_POINT_PARAM));
        assert!(prog.structs[outer].flags.contains(NodeFlags::NON_ENTRY_POINT_PARAM));
    }
}
