//! Data types and type denoters.
//!
//! A [`TypeDenoter`] describes the static type of any typed AST node. Owned
//! sub-types are stored by containment, references to declarations are typed
//! arena ids (see [`super::Arena`]). All derivation queries take the program
//! so struct members and aliases can be resolved.

use super::{AliasId, BufferId, FunctionId, Program, SamplerId, StructId, SymbolRef};
use crate::diag::{SourceArea, TypeError};
use smallvec::SmallVec;
use smol_str::SmolStr;
use std::fmt::Write;

/// Scalar base types, ordered by conversion rank (`bool < int < uint < half
/// < float < double`). The ordering drives [`find_common_type`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ScalarType {
    Bool,
    Int,
    UInt,
    Half,
    Float,
    Double,
}

impl ScalarType {
    pub fn is_integral(self) -> bool {
        matches!(self, ScalarType::Int | ScalarType::UInt)
    }

    pub fn is_real(self) -> bool {
        matches!(self, ScalarType::Half | ScalarType::Float | ScalarType::Double)
    }
}

/// Scalar, vector (1-4) and matrix (1-4 x 1-4) combinations over the scalar
/// base types, plus the string type of DX9 effect files.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum DataType {
    String,
    Scalar(ScalarType),
    Vector(ScalarType, u8),
    Matrix(ScalarType, u8, u8),
}

impl DataType {
    pub const BOOL: DataType = DataType::Scalar(ScalarType::Bool);
    pub const INT: DataType = DataType::Scalar(ScalarType::Int);
    pub const UINT: DataType = DataType::Scalar(ScalarType::UInt);
    pub const HALF: DataType = DataType::Scalar(ScalarType::Half);
    pub const FLOAT: DataType = DataType::Scalar(ScalarType::Float);
    pub const DOUBLE: DataType = DataType::Scalar(ScalarType::Double);
    pub const FLOAT4: DataType = DataType::Vector(ScalarType::Float, 4);

    pub fn is_scalar(self) -> bool {
        matches!(self, DataType::Scalar(_))
    }

    pub fn is_vector(self) -> bool {
        matches!(self, DataType::Vector(..))
    }

    pub fn is_matrix(self) -> bool {
        matches!(self, DataType::Matrix(..))
    }

    pub fn base(self) -> Option<ScalarType> {
        match self {
            DataType::String => None,
            DataType::Scalar(base) | DataType::Vector(base, _) | DataType::Matrix(base, _, _) => Some(base),
        }
    }

    pub fn is_boolean(self) -> bool {
        self.base() == Some(ScalarType::Bool)
    }

    pub fn is_integral(self) -> bool {
        self.base().map_or(false, ScalarType::is_integral)
    }

    pub fn is_int(self) -> bool {
        self.base() == Some(ScalarType::Int)
    }

    pub fn is_uint(self) -> bool {
        self.base() == Some(ScalarType::UInt)
    }

    pub fn is_real(self) -> bool {
        self.base().map_or(false, ScalarType::is_real)
    }

    pub fn is_half(self) -> bool {
        self.base() == Some(ScalarType::Half)
    }

    pub fn is_double(self) -> bool {
        self.base() == Some(ScalarType::Double)
    }

    /// Vector dimension: 1 for scalars, the length for vectors, rows for
    /// matrices (matches the cast-size rules of the expression converter).
    pub fn vector_dim(self) -> u8 {
        match self {
            DataType::String => 0,
            DataType::Scalar(_) => 1,
            DataType::Vector(_, n) => n,
            DataType::Matrix(_, rows, _) => rows,
        }
    }

    pub fn matrix_dim(self) -> Option<(u8, u8)> {
        match self {
            DataType::Matrix(_, rows, cols) => Some((rows, cols)),
            _ => None,
        }
    }

    /// Builds a scalar or vector type of the given base and dimension.
    pub fn vector_of(base: ScalarType, dim: u8) -> DataType {
        if dim <= 1 {
            DataType::Scalar(base)
        } else {
            DataType::Vector(base, dim.min(4))
        }
    }

    pub fn matrix_of(base: ScalarType, rows: u8, cols: u8) -> DataType {
        DataType::Matrix(base, rows.min(4), cols.min(4))
    }

    /// Resolves a vector swizzle like `xyz` or `rg` against this type.
    /// Scalars accept any swizzle whose components all address index 0.
    pub fn swizzle(self, subscript: &str) -> Result<DataType, String> {
        let dim = match self {
            DataType::Scalar(_) => 1,
            DataType::Vector(_, n) => n,
            _ => return Err(format!("vector subscript on non-vector type '{}'", self.desc())),
        };
        let base = self.base().expect("swizzle on string type");

        if subscript.is_empty() || subscript.len() > 4 {
            return Err(format!("invalid vector subscript '{subscript}'"));
        }

        for ch in subscript.chars() {
            let index = match ch {
                'x' | 'r' => 0,
                'y' | 'g' => 1,
                'z' | 'b' => 2,
                'w' | 'a' => 3,
                _ => return Err(format!("invalid character '{ch}' in vector subscript '{subscript}'")),
            };
            if index >= dim {
                return Err(format!(
                    "vector subscript '{subscript}' out of range for type '{}'",
                    self.desc()
                ));
            }
        }

        Ok(DataType::vector_of(base, subscript.len() as u8))
    }

    /// Descriptive HLSL-side spelling, used in diagnostics.
    pub fn desc(self) -> String {
        fn base_name(base: ScalarType) -> &'static str {
            match base {
                ScalarType::Bool => "bool",
                ScalarType::Int => "int",
                ScalarType::UInt => "uint",
                ScalarType::Half => "half",
                ScalarType::Float => "float",
                ScalarType::Double => "double",
            }
        }
        match self {
            DataType::String => "string".into(),
            DataType::Scalar(base) => base_name(base).into(),
            DataType::Vector(base, n) => format!("{}{}", base_name(base), n),
            DataType::Matrix(base, rows, cols) => format!("{}{}x{}", base_name(base), rows, cols),
        }
    }
}

/// One entry of a matrix subscript such as `_m12` (zero-based) or `_21`
/// (one-based); a full subscript concatenates several entries. The indices
/// stored here are always zero-based.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct MatrixSubscript {
    pub indices: SmallVec<[(u8, u8); 4]>,
    pub data_type_in: DataType,
    pub data_type_out: DataType,
}

impl MatrixSubscript {
    /// Parses a matrix subscript against the given matrix type. Returns
    /// `None` if the text is not a matrix subscript at all.
    pub fn parse(data_type_in: DataType, subscript: &str) -> Option<MatrixSubscript> {
        let (rows, cols) = data_type_in.matrix_dim()?;
        let base = data_type_in.base()?;

        let mut indices: SmallVec<[(u8, u8); 4]> = SmallVec::new();
        let bytes = subscript.as_bytes();
        let mut i = 0;

        while i < bytes.len() {
            if bytes[i] != b'_' {
                return None;
            }
            i += 1;
            let zero_based = i < bytes.len() && bytes[i] == b'm';
            if zero_based {
                i += 1;
            }
            let row = (bytes.get(i)?.wrapping_sub(b'0')) as i16;
            let col = (bytes.get(i + 1)?.wrapping_sub(b'0')) as i16;
            i += 2;

            let (row, col) = if zero_based { (row, col) } else { (row - 1, col - 1) };
            if row < 0 || col < 0 || row as u8 >= rows || col as u8 >= cols {
                return None;
            }
            indices.push((row as u8, col as u8));
        }

        if indices.is_empty() || indices.len() > 4 {
            return None;
        }

        let data_type_out = DataType::vector_of(base, indices.len() as u8);
        Some(MatrixSubscript {
            indices,
            data_type_in,
            data_type_out,
        })
    }

    /// Unique identifier fragment for the wrapper function, e.g. `_12_21`.
    pub fn indices_to_string(&self) -> String {
        let mut s = String::new();
        for &(row, col) in &self.indices {
            let _ = write!(s, "_{}{}", row, col);
        }
        s
    }
}

/// Buffer object types: storage buffers, textures, patches and streams.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum BufferType {
    Buffer,
    StructuredBuffer,
    ByteAddressBuffer,

    RwBuffer,
    RwStructuredBuffer,
    RwByteAddressBuffer,
    AppendStructuredBuffer,
    ConsumeStructuredBuffer,

    RwTexture1D,
    RwTexture1DArray,
    RwTexture2D,
    RwTexture2DArray,
    RwTexture3D,

    Texture1D,
    Texture1DArray,
    Texture2D,
    Texture2DArray,
    Texture3D,
    TextureCube,
    TextureCubeArray,
    Texture2DMs,
    Texture2DMsArray,

    InputPatch,
    OutputPatch,

    PointStream,
    LineStream,
    TriangleStream,
}

impl BufferType {
    pub fn is_storage_buffer(self) -> bool {
        matches!(
            self,
            BufferType::StructuredBuffer
                | BufferType::ByteAddressBuffer
                | BufferType::RwStructuredBuffer
                | BufferType::RwByteAddressBuffer
                | BufferType::AppendStructuredBuffer
                | BufferType::ConsumeStructuredBuffer
        )
    }

    pub fn is_rw(self) -> bool {
        matches!(
            self,
            BufferType::RwBuffer
                | BufferType::RwStructuredBuffer
                | BufferType::RwByteAddressBuffer
                | BufferType::AppendStructuredBuffer
                | BufferType::ConsumeStructuredBuffer
                | BufferType::RwTexture1D
                | BufferType::RwTexture1DArray
                | BufferType::RwTexture2D
                | BufferType::RwTexture2DArray
                | BufferType::RwTexture3D
        )
    }

    pub fn is_texture(self) -> bool {
        matches!(
            self,
            BufferType::RwTexture1D
                | BufferType::RwTexture1DArray
                | BufferType::RwTexture2D
                | BufferType::RwTexture2DArray
                | BufferType::RwTexture3D
                | BufferType::Texture1D
                | BufferType::Texture1DArray
                | BufferType::Texture2D
                | BufferType::Texture2DArray
                | BufferType::Texture3D
                | BufferType::TextureCube
                | BufferType::TextureCubeArray
                | BufferType::Texture2DMs
                | BufferType::Texture2DMsArray
        )
    }

    pub fn is_multisampled(self) -> bool {
        matches!(self, BufferType::Texture2DMs | BufferType::Texture2DMsArray)
    }

    /// RW textures lower to GLSL `image*` objects.
    pub fn is_rw_image(self) -> bool {
        matches!(
            self,
            BufferType::RwBuffer
                | BufferType::RwTexture1D
                | BufferType::RwTexture1DArray
                | BufferType::RwTexture2D
                | BufferType::RwTexture2DArray
                | BufferType::RwTexture3D
        )
    }

    pub fn is_rw_texture(self) -> bool {
        matches!(
            self,
            BufferType::RwTexture1D
                | BufferType::RwTexture1DArray
                | BufferType::RwTexture2D
                | BufferType::RwTexture2DArray
                | BufferType::RwTexture3D
        )
    }

    pub fn is_patch(self) -> bool {
        matches!(self, BufferType::InputPatch | BufferType::OutputPatch)
    }

    pub fn is_stream(self) -> bool {
        matches!(
            self,
            BufferType::PointStream | BufferType::LineStream | BufferType::TriangleStream
        )
    }

    /// Texture coordinate dimension in `[1, 4]`, or `None` for non-textures.
    pub fn texture_dim(self) -> Option<u8> {
        match self {
            BufferType::Texture1D | BufferType::RwTexture1D | BufferType::Buffer | BufferType::RwBuffer => Some(1),
            BufferType::Texture1DArray
            | BufferType::RwTexture1DArray
            | BufferType::Texture2D
            | BufferType::RwTexture2D
            | BufferType::Texture2DMs => Some(2),
            BufferType::Texture2DArray
            | BufferType::RwTexture2DArray
            | BufferType::Texture2DMsArray
            | BufferType::Texture3D
            | BufferType::RwTexture3D
            | BufferType::TextureCube => Some(3),
            BufferType::TextureCubeArray => Some(4),
            _ => None,
        }
    }

    pub fn desc(self) -> &'static str {
        match self {
            BufferType::Buffer => "Buffer",
            BufferType::StructuredBuffer => "StructuredBuffer",
            BufferType::ByteAddressBuffer => "ByteAddressBuffer",
            BufferType::RwBuffer => "RWBuffer",
            BufferType::RwStructuredBuffer => "RWStructuredBuffer",
            BufferType::RwByteAddressBuffer => "RWByteAddressBuffer",
            BufferType::AppendStructuredBuffer => "AppendStructuredBuffer",
            BufferType::ConsumeStructuredBuffer => "ConsumeStructuredBuffer",
            BufferType::RwTexture1D => "RWTexture1D",
            BufferType::RwTexture1DArray => "RWTexture1DArray",
            BufferType::RwTexture2D => "RWTexture2D",
            BufferType::RwTexture2DArray => "RWTexture2DArray",
            BufferType::RwTexture3D => "RWTexture3D",
            BufferType::Texture1D => "Texture1D",
            BufferType::Texture1DArray => "Texture1DArray",
            BufferType::Texture2D => "Texture2D",
            BufferType::Texture2DArray => "Texture2DArray",
            BufferType::Texture3D => "Texture3D",
            BufferType::TextureCube => "TextureCube",
            BufferType::TextureCubeArray => "TextureCubeArray",
            BufferType::Texture2DMs => "Texture2DMS",
            BufferType::Texture2DMsArray => "Texture2DMSArray",
            BufferType::InputPatch => "InputPatch",
            BufferType::OutputPatch => "OutputPatch",
            BufferType::PointStream => "PointStream",
            BufferType::LineStream => "LineStream",
            BufferType::TriangleStream => "TriangleStream",
        }
    }
}

/// Sampler object types, including the DX10+ sampler states that classic
/// GLSL has no analogue for.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum SamplerType {
    Sampler1D,
    Sampler2D,
    Sampler3D,
    SamplerCube,
    Sampler1DArray,
    Sampler2DArray,
    SamplerCubeArray,
    SamplerBuffer,
    Sampler2DMs,
    Sampler2DMsArray,
    Sampler1DShadow,
    Sampler2DShadow,
    SamplerCubeShadow,

    SamplerState,
    SamplerComparisonState,
}

impl SamplerType {
    pub fn is_state(self) -> bool {
        matches!(self, SamplerType::SamplerState | SamplerType::SamplerComparisonState)
    }

    pub fn is_shadow(self) -> bool {
        matches!(
            self,
            SamplerType::Sampler1DShadow | SamplerType::Sampler2DShadow | SamplerType::SamplerCubeShadow
        )
    }

    pub fn texture_dim(self) -> Option<u8> {
        match self {
            SamplerType::Sampler1D | SamplerType::Sampler1DShadow | SamplerType::SamplerBuffer => Some(1),
            SamplerType::Sampler2D
            | SamplerType::Sampler2DShadow
            | SamplerType::Sampler1DArray
            | SamplerType::Sampler2DMs => Some(2),
            SamplerType::Sampler3D
            | SamplerType::SamplerCube
            | SamplerType::SamplerCubeShadow
            | SamplerType::Sampler2DArray
            | SamplerType::Sampler2DMsArray => Some(3),
            SamplerType::SamplerCubeArray => Some(4),
            SamplerType::SamplerState | SamplerType::SamplerComparisonState => None,
        }
    }
}

/// A single array dimension; size 0 means dynamic (`[]`).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct ArrayDimension {
    pub size: i32,
}

impl ArrayDimension {
    pub fn new(size: i32) -> ArrayDimension {
        ArrayDimension { size }
    }

    pub fn is_dynamic(&self) -> bool {
        self.size == 0
    }
}

bitflags::bitflags! {
    /// Comparison flags for [`TypeDenoter::equals`].
    pub struct TypeCompare: u32 {
        /// Ignore generic sub types in buffer type denoters.
        const IGNORE_GENERIC_SUB_TYPE = 1 << 0;
    }
}

/// The static type of a typed AST node.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeDenoter {
    Void,
    /// The type of a `NULL` literal; castable to buffer and sampler objects.
    Null,
    Base(DataType),
    Buffer {
        buffer_type: BufferType,
        /// Generic sub type; `None` defaults to `float4`.
        generic: Option<Box<TypeDenoter>>,
        /// Sample count for multi-sampled textures, or patch size.
        generic_size: i32,
        decl: Option<BufferId>,
    },
    Sampler {
        sampler_type: SamplerType,
        decl: Option<SamplerId>,
    },
    Struct {
        ident: SmolStr,
        decl: Option<StructId>,
    },
    Alias {
        ident: SmolStr,
        decl: Option<AliasId>,
    },
    Array {
        /// Never an `Array` itself; nested arrays flatten their dimensions.
        sub: Box<TypeDenoter>,
        dims: SmallVec<[ArrayDimension; 2]>,
    },
    Function {
        ident: SmolStr,
        candidates: Vec<FunctionId>,
    },
}

impl TypeDenoter {
    pub fn base(data_type: DataType) -> TypeDenoter {
        TypeDenoter::Base(data_type)
    }

    pub fn buffer(buffer_type: BufferType, generic: Option<TypeDenoter>) -> TypeDenoter {
        TypeDenoter::Buffer {
            buffer_type,
            generic: generic.map(Box::new),
            generic_size: 1,
            decl: None,
        }
    }

    pub fn sampler(sampler_type: SamplerType) -> TypeDenoter {
        TypeDenoter::Sampler {
            sampler_type,
            decl: None,
        }
    }

    pub fn struct_ref(ident: impl Into<SmolStr>, decl: StructId) -> TypeDenoter {
        TypeDenoter::Struct {
            ident: ident.into(),
            decl: Some(decl),
        }
    }

    /* ----- Shortcuts ----- */

    pub fn is_void(&self) -> bool {
        matches!(self, TypeDenoter::Void)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, TypeDenoter::Null)
    }

    pub fn is_base(&self) -> bool {
        matches!(self, TypeDenoter::Base(_))
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, TypeDenoter::Base(dt) if dt.is_scalar())
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, TypeDenoter::Base(dt) if dt.is_vector())
    }

    pub fn is_matrix(&self) -> bool {
        matches!(self, TypeDenoter::Base(dt) if dt.is_matrix())
    }

    pub fn is_sampler(&self) -> bool {
        matches!(self, TypeDenoter::Sampler { .. })
    }

    pub fn is_buffer(&self) -> bool {
        matches!(self, TypeDenoter::Buffer { .. })
    }

    pub fn is_struct(&self) -> bool {
        matches!(self, TypeDenoter::Struct { .. })
    }

    pub fn is_alias(&self) -> bool {
        matches!(self, TypeDenoter::Alias { .. })
    }

    pub fn is_array(&self) -> bool {
        matches!(self, TypeDenoter::Array { .. })
    }

    pub fn data_type(&self) -> Option<DataType> {
        match self {
            TypeDenoter::Base(dt) => Some(*dt),
            _ => None,
        }
    }

    /* ----- Aliasing ----- */

    /// Follows alias declarations until a non-alias denoter is reached.
    pub fn aliased<'a>(&'a self, prog: &'a Program) -> &'a TypeDenoter {
        let mut ty = self;
        let mut steps = 0;
        while let TypeDenoter::Alias { decl, .. } = ty {
            let Some(id) = decl else { break };
            ty = &prog.aliases[*id].ty;
            steps += 1;
            if steps > 64 {
                break;
            }
        }
        ty
    }

    /// The identifier of a named type (structs, aliases, functions).
    pub fn ident(&self) -> Option<&SmolStr> {
        match self {
            TypeDenoter::Struct { ident, .. } | TypeDenoter::Alias { ident, .. } | TypeDenoter::Function { ident, .. } => {
                Some(ident)
            }
            _ => None,
        }
    }

    /// One-shot fill of an anonymous struct or alias name.
    pub fn set_ident_if_anonymous(&mut self, new_ident: &SmolStr) {
        match self {
            TypeDenoter::Struct { ident, .. } | TypeDenoter::Alias { ident, .. } if ident.is_empty() => {
                *ident = new_ident.clone();
            }
            _ => {}
        }
    }

    /// The declaration the denoter points at, if any.
    pub fn symbol_ref(&self) -> Option<SymbolRef> {
        match self {
            TypeDenoter::Buffer { decl: Some(id), .. } => Some(SymbolRef::Buffer(*id)),
            TypeDenoter::Sampler { decl: Some(id), .. } => Some(SymbolRef::Sampler(*id)),
            TypeDenoter::Struct { decl: Some(id), .. } => Some(SymbolRef::Struct(*id)),
            TypeDenoter::Alias { decl: Some(id), .. } => Some(SymbolRef::Alias(*id)),
            TypeDenoter::Array { sub, .. } => sub.symbol_ref(),
            _ => None,
        }
    }

    /// The generic of a buffer, defaulting to `float4` when unspecified.
    pub fn buffer_generic(&self) -> Option<TypeDenoter> {
        match self {
            TypeDenoter::Buffer { generic, .. } => Some(
                generic
                    .as_deref()
                    .cloned()
                    .unwrap_or(TypeDenoter::Base(DataType::FLOAT4)),
            ),
            _ => None,
        }
    }

    pub fn num_dimensions(&self, prog: &Program) -> usize {
        match self.aliased(prog) {
            TypeDenoter::Array { sub, dims } => dims.len() + sub.num_dimensions(prog),
            _ => 0,
        }
    }

    /* ----- Composition ----- */

    /// Wraps this denoter in an array with the given dimensions. Arrays of
    /// arrays flatten into a single dimension list.
    pub fn as_array(self, new_dims: &[ArrayDimension]) -> TypeDenoter {
        if new_dims.is_empty() {
            return self;
        }
        match self {
            TypeDenoter::Array { sub, mut dims } => {
                dims.extend_from_slice(new_dims);
                TypeDenoter::Array { sub, dims }
            }
            other => TypeDenoter::Array {
                sub: Box::new(other),
                dims: SmallVec::from_slice(new_dims),
            },
        }
    }

    /* ----- Comparison ----- */

    /// Structural equality on the aliased forms.
    pub fn equals(&self, rhs: &TypeDenoter, prog: &Program, compare: TypeCompare) -> bool {
        let lhs = self.aliased(prog);
        let rhs = rhs.aliased(prog);

        match (lhs, rhs) {
            (TypeDenoter::Void, TypeDenoter::Void) | (TypeDenoter::Null, TypeDenoter::Null) => true,
            (TypeDenoter::Base(a), TypeDenoter::Base(b)) => a == b,
            (
                TypeDenoter::Buffer {
                    buffer_type: a,
                    generic: ga,
                    ..
                },
                TypeDenoter::Buffer {
                    buffer_type: b,
                    generic: gb,
                    ..
                },
            ) => {
                a == b
                    && (compare.contains(TypeCompare::IGNORE_GENERIC_SUB_TYPE)
                        || match (ga, gb) {
                            (Some(ga), Some(gb)) => ga.equals(gb, prog, compare),
                            (None, None) => true,
                            _ => false,
                        })
            }
            (TypeDenoter::Sampler { sampler_type: a, .. }, TypeDenoter::Sampler { sampler_type: b, .. }) => a == b,
            (TypeDenoter::Struct { decl: da, ident: ia, .. }, TypeDenoter::Struct { decl: db, ident: ib, .. }) => {
                match (da, db) {
                    (Some(da), Some(db)) => da == db,
                    _ => ia == ib,
                }
            }
            (TypeDenoter::Array { sub: sa, .. }, TypeDenoter::Array { sub: sb, .. }) => sa.equals(sb, prog, compare),
            _ => false,
        }
    }

    /// HLSL cast rules. `Void` casts to nothing; `Null` casts to object
    /// types; base types and structs cast into each other; arrays cast
    /// elementwise.
    pub fn is_castable_to(&self, target: &TypeDenoter, prog: &Program) -> bool {
        let source = self.aliased(prog);
        let target = target.aliased(prog);

        match source {
            TypeDenoter::Void => false,
            TypeDenoter::Null => matches!(target, TypeDenoter::Buffer { .. } | TypeDenoter::Sampler { .. }),
            TypeDenoter::Base(_) | TypeDenoter::Struct { .. } => {
                matches!(target, TypeDenoter::Base(_) | TypeDenoter::Struct { .. })
            }
            TypeDenoter::Array { sub, .. } => match target {
                TypeDenoter::Array { sub: target_sub, .. } => sub.is_castable_to(target_sub, prog),
                _ => !sub.aliased(prog).is_array() && sub.is_castable_to(target, prog),
            },
            TypeDenoter::Buffer { .. } => matches!(target, TypeDenoter::Buffer { .. }),
            TypeDenoter::Sampler { .. } => matches!(target, TypeDenoter::Sampler { .. }),
            TypeDenoter::Alias { .. } | TypeDenoter::Function { .. } => false,
        }
    }

    /* ----- Derivation ----- */

    /// Follows an identifier or subscript expression one level down from
    /// this denoter; any other expression yields the denoter unchanged.
    pub fn get_sub(&self, expr: &super::Expr, prog: &Program) -> Result<TypeDenoter, TypeError> {
        match &expr.kind {
            super::ExprKind::Ident(ident_expr) => self.get_sub_object(&ident_expr.ident, prog, expr.area),
            super::ExprKind::Subscript { indices, .. } => self.get_sub_array(indices.len(), prog, expr.area),
            _ => Ok(self.clone()),
        }
    }

    /// Member access: struct fields, swizzles, matrix subscripts and buffer
    /// generics.
    pub fn get_sub_object(&self, ident: &str, prog: &Program, area: SourceArea) -> Result<TypeDenoter, TypeError> {
        match self.aliased(prog) {
            TypeDenoter::Base(dt) => {
                if dt.is_matrix() {
                    match MatrixSubscript::parse(*dt, ident) {
                        Some(sub) => Ok(TypeDenoter::Base(sub.data_type_out)),
                        None => Err(TypeError::new(
                            format!("invalid matrix subscript '{}' for type '{}'", ident, dt.desc()),
                            area,
                        )),
                    }
                } else {
                    dt.swizzle(ident)
                        .map(TypeDenoter::Base)
                        .map_err(|msg| TypeError::new(msg, area))
                }
            }
            TypeDenoter::Struct { decl, ident: name } => {
                let Some(struct_id) = decl else {
                    return Err(TypeError::new(
                        format!("missing reference to structure declaration '{name}'"),
                        area,
                    ));
                };
                match prog.fetch_struct_member(*struct_id, ident) {
                    Some(member) => Ok(prog.vars[member].ty.clone()),
                    None => Err(TypeError::new(
                        format!("identifier '{}' is not declared in 'struct {}'", ident, name),
                        area,
                    )),
                }
            }
            TypeDenoter::Buffer { .. } => {
                let generic = self.aliased(prog).buffer_generic().expect("buffer generic");
                generic.get_sub_object(ident, prog, area)
            }
            other => Err(TypeError::new(
                format!("member access '.{}' on non-struct type '{}'", ident, other.desc(prog)),
                area,
            )),
        }
    }

    /// Strips `num_indices` array dimensions; vectors and matrices accept
    /// one and two index levels, buffers forward the access to the generic.
    pub fn get_sub_array(&self, num_indices: usize, prog: &Program, area: SourceArea) -> Result<TypeDenoter, TypeError> {
        if num_indices == 0 {
            return Ok(self.clone());
        }
        match self.aliased(prog) {
            TypeDenoter::Array { sub, dims } => {
                if num_indices < dims.len() {
                    Ok(TypeDenoter::Array {
                        sub: sub.clone(),
                        dims: SmallVec::from_slice(&dims[..dims.len() - num_indices]),
                    })
                } else {
                    sub.get_sub_array(num_indices - dims.len(), prog, area)
                }
            }
            TypeDenoter::Base(dt) if dt.is_vector() => {
                if num_indices > 1 {
                    Err(TypeError::new("too many array dimensions for vector type", area))
                } else {
                    Ok(TypeDenoter::Base(DataType::Scalar(dt.base().expect("vector base"))))
                }
            }
            TypeDenoter::Base(dt) if dt.is_matrix() => {
                let (_, cols) = dt.matrix_dim().expect("matrix dims");
                let base = dt.base().expect("matrix base");
                match num_indices {
                    1 => Ok(TypeDenoter::Base(DataType::vector_of(base, cols))),
                    2 => Ok(TypeDenoter::Base(DataType::Scalar(base))),
                    _ => Err(TypeError::new("too many array dimensions for matrix type", area)),
                }
            }
            TypeDenoter::Buffer { .. } => {
                let generic = self.aliased(prog).buffer_generic().expect("buffer generic");
                generic.get_sub_array(num_indices - 1, prog, area)
            }
            other => Err(TypeError::new(
                format!("array access on non-array type '{}'", other.desc(prog)),
                area,
            )),
        }
    }

    /// Descriptive string for diagnostics.
    pub fn desc(&self, prog: &Program) -> String {
        match self {
            TypeDenoter::Void => "void".into(),
            TypeDenoter::Null => "NULL".into(),
            TypeDenoter::Base(dt) => dt.desc(),
            TypeDenoter::Buffer {
                buffer_type, generic, ..
            } => match generic {
                Some(generic) => format!("{}<{}>", buffer_type.desc(), generic.desc(prog)),
                None => buffer_type.desc().into(),
            },
            TypeDenoter::Sampler { sampler_type, .. } => {
                if sampler_type.is_state() {
                    "sampler state".into()
                } else {
                    "sampler".into()
                }
            }
            TypeDenoter::Struct { ident, .. } => {
                if ident.is_empty() {
                    "struct <anonymous>".into()
                } else {
                    format!("struct {ident}")
                }
            }
            TypeDenoter::Alias { ident, .. } => ident.to_string(),
            TypeDenoter::Array { sub, dims } => {
                let mut s = sub.desc(prog);
                for dim in dims {
                    if dim.is_dynamic() {
                        s.push_str("[]");
                    } else {
                        let _ = write!(s, "[{}]", dim.size);
                    }
                }
                s
            }
            TypeDenoter::Function { ident, .. } => format!("function {ident}"),
        }
    }
}

/// Highest-order scalar of the two, clamped at `Float` (doubles never arise
/// implicitly).
fn highest_order(lhs: ScalarType, rhs: ScalarType) -> ScalarType {
    lhs.max(rhs).min(ScalarType::Float)
}

/// Finds the best common type of two denoters for binary expressions.
///
/// Scalar/scalar takes the highest-order base; scalar/vector adopts the
/// vector dimension; vector/vector takes the max (or min when `use_min_dim`)
/// dimension. Anything else falls back to the left-hand side.
pub fn find_common_type(lhs: &TypeDenoter, rhs: &TypeDenoter, use_min_dim: bool) -> TypeDenoter {
    let (TypeDenoter::Base(a), TypeDenoter::Base(b)) = (lhs, rhs) else {
        return lhs.clone();
    };
    let (Some(base_a), Some(base_b)) = (a.base(), b.base()) else {
        return lhs.clone();
    };
    let base = highest_order(base_a, base_b);

    let common = match (*a, *b) {
        (DataType::Scalar(_), DataType::Scalar(_)) => DataType::Scalar(base),
        (DataType::Scalar(_), DataType::Vector(_, dim)) | (DataType::Vector(_, dim), DataType::Scalar(_)) => {
            DataType::vector_of(base, dim)
        }
        (DataType::Vector(_, dim_a), DataType::Vector(_, dim_b)) => {
            let dim = if use_min_dim { dim_a.min(dim_b) } else { dim_a.max(dim_b) };
            DataType::vector_of(base, dim)
        }
        (DataType::Matrix(_, rows_a, cols_a), DataType::Matrix(_, rows_b, cols_b)) => {
            if use_min_dim {
                DataType::matrix_of(base, rows_a.min(rows_b), cols_a.min(cols_b))
            } else {
                DataType::matrix_of(base, rows_a.max(rows_b), cols_a.max(cols_b))
            }
        }
        _ => return lhs.clone(),
    };

    TypeDenoter::Base(common)
}

/// A boolean denoter with the dimension of the given type (for comparisons).
pub fn bool_type_with_dimension_of(ty: &TypeDenoter) -> TypeDenoter {
    match ty {
        TypeDenoter::Base(DataType::Vector(_, n)) => TypeDenoter::Base(DataType::Vector(ScalarType::Bool, *n)),
        _ => TypeDenoter::Base(DataType::BOOL),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Program;

    #[test]
    fn common_type_scalar_scalar() {
        let int = TypeDenoter::Base(DataType::INT);
        let float = TypeDenoter::Base(DataType::FLOAT);
        assert_eq!(find_common_type(&int, &float, false), float);
        assert_eq!(find_common_type(&float, &int, false), float);

        // doubles are clamped to float when combined with lower orders
        let double = TypeDenoter::Base(DataType::DOUBLE);
        assert_eq!(find_common_type(&double, &int, false), float);
    }

    #[test]
    fn common_type_vector_rules() {
        let f3 = TypeDenoter::Base(DataType::Vector(ScalarType::Float, 3));
        let i4 = TypeDenoter::Base(DataType::Vector(ScalarType::Int, 4));
        let scalar = TypeDenoter::Base(DataType::INT);

        assert_eq!(
            find_common_type(&scalar, &f3, false),
            TypeDenoter::Base(DataType::Vector(ScalarType::Float, 3))
        );
        assert_eq!(
            find_common_type(&f3, &i4, false),
            TypeDenoter::Base(DataType::Vector(ScalarType::Float, 4))
        );
        assert_eq!(
            find_common_type(&f3, &i4, true),
            TypeDenoter::Base(DataType::Vector(ScalarType::Float, 3))
        );
    }

    #[test]
    fn array_of_array_flattens() {
        let base = TypeDenoter::Base(DataType::FLOAT);
        let inner = base.as_array(&[ArrayDimension::new(4)]);
        let outer = inner.as_array(&[ArrayDimension::new(2)]);

        match &outer {
            TypeDenoter::Array { sub, dims } => {
                assert!(!sub.is_array());
                assert_eq!(dims.len(), 2);
            }
            other => panic!("expected array type, got {other:?}"),
        }
    }

    #[test]
    fn void_casts_to_nothing() {
        let prog = Program::new();
        let void = TypeDenoter::Void;
        assert!(!void.is_castable_to(&TypeDenoter::Base(DataType::FLOAT), &prog));
        assert!(!void.is_castable_to(&TypeDenoter::Void, &prog));
    }

    #[test]
    fn null_casts_to_objects_only() {
        let prog = Program::new();
        let null = TypeDenoter::Null;
        assert!(null.is_castable_to(&TypeDenoter::buffer(BufferType::Texture2D, None), &prog));
        assert!(null.is_castable_to(&TypeDenoter::sampler(SamplerType::SamplerState), &prog));
        assert!(!null.is_castable_to(&TypeDenoter::Base(DataType::FLOAT), &prog));
    }

    #[test]
    fn swizzle_typing() {
        let f4 = DataType::Vector(ScalarType::Float, 4);
        assert_eq!(f4.swizzle("xyz").unwrap(), DataType::Vector(ScalarType::Float, 3));
        assert_eq!(f4.swizzle("w").unwrap(), DataType::FLOAT);
        assert_eq!(f4.swizzle("rgba").unwrap(), f4);
        assert!(f4.swizzle("q").is_err());

        let f2 = DataType::Vector(ScalarType::Float, 2);
        assert!(f2.swizzle("xyz").is_err());

        // scalar swizzle replicates component 0
        assert_eq!(
            DataType::FLOAT.swizzle("xxx").unwrap(),
            DataType::Vector(ScalarType::Float, 3)
        );
    }

    #[test]
    fn matrix_subscript_parsing() {
        let m4 = DataType::Matrix(ScalarType::Float, 4, 4);

        let sub = MatrixSubscript::parse(m4, "_m12_m21").unwrap();
        assert_eq!(sub.indices.as_slice(), &[(1, 2), (2, 1)]);
        assert_eq!(sub.data_type_out, DataType::Vector(ScalarType::Float, 2));
        assert_eq!(sub.indices_to_string(), "_12_21");

        // one-based form
        let sub = MatrixSubscript::parse(m4, "_11").unwrap();
        assert_eq!(sub.indices.as_slice(), &[(0, 0)]);
        assert_eq!(sub.data_type_out, DataType::FLOAT);

        assert!(MatrixSubscript::parse(m4, "_m44").is_none());
        assert!(MatrixSubscript::parse(m4, "xyzw").is_none());
    }

    #[test]
    fn buffer_generic_defaults_to_float4() {
        let buffer = TypeDenoter::buffer(BufferType::Texture2D, None);
        assert_eq!(buffer.buffer_generic().unwrap(), TypeDenoter::Base(DataType::FLOAT4));
    }
}
