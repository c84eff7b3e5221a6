//! HLSL intrinsic functions and their classification.

use super::ty::DataType;
use super::ops::BinaryOp;
use indexmap::IndexSet;

/// Intrinsic functions of the input language plus the GLSL-only intrinsics
/// the converters rewrite into (`Image*`, the vector relational functions).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum Intrinsic {
    /* --- Common global intrinsics --- */
    Abs,
    ACos,
    All,
    AllMemoryBarrier,
    AllMemoryBarrierWithGroupSync,
    Any,
    AsDouble,
    AsFloat,
    ASin,
    AsInt,
    AsUInt,
    ATan,
    ATan2,
    Ceil,
    Clamp,
    Clip,
    Cos,
    CosH,
    CountBits,
    Cross,
    Ddx,
    DdxCoarse,
    DdxFine,
    Ddy,
    DdyCoarse,
    DdyFine,
    Degrees,
    Determinant,
    DeviceMemoryBarrier,
    DeviceMemoryBarrierWithGroupSync,
    Distance,
    Dot,
    Exp,
    Exp2,
    FaceForward,
    FirstBitHigh,
    FirstBitLow,
    Floor,
    Fma,
    FMod,
    Frac,
    FrExp,
    FWidth,
    GroupMemoryBarrier,
    GroupMemoryBarrierWithGroupSync,
    InterlockedAdd,
    InterlockedAnd,
    InterlockedCompareExchange,
    InterlockedCompareStore,
    InterlockedExchange,
    InterlockedMax,
    InterlockedMin,
    InterlockedOr,
    InterlockedXor,
    IsInf,
    IsNaN,
    LdExp,
    Length,
    Lerp,
    Lit,
    Log,
    Log10,
    Log2,
    Mad,
    Max,
    Min,
    ModF,
    Mul,
    Normalize,
    Pow,
    Radians,
    Rcp,
    Reflect,
    Refract,
    Round,
    RSqrt,
    Saturate,
    Sign,
    Sin,
    SinCos,
    SinH,
    SmoothStep,
    Sqrt,
    Step,
    Tan,
    TanH,
    Transpose,
    Trunc,

    /* --- GLSL-only vector relational intrinsics --- */
    Equal,
    NotEqual,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    Not,

    /* --- HLSL 3 texture intrinsics --- */
    Tex1D,
    Tex1DLod,
    Tex2D,
    Tex2DLod,
    Tex3D,
    Tex3DLod,
    TexCube,
    TexCubeLod,

    /* --- HLSL 4+ texture object intrinsics --- */
    TextureGetDimensions,
    TextureQueryLod,
    TextureLoad1,
    TextureLoad2,
    TextureLoad3,
    TextureSample2,
    TextureSample3,
    TextureSample4,
    TextureSample5,
    TextureSampleBias3,
    TextureSampleBias4,
    TextureSampleCmp3,
    TextureSampleCmp4,
    TextureSampleCmpLevelZero3,
    TextureSampleGrad4,
    TextureSampleLevel3,
    TextureSampleLevel4,
    TextureGather2,
    TextureGather3,
    TextureGatherCmp3,

    /* --- Stream-output object intrinsics --- */
    StreamOutputAppend,
    StreamOutputRestartStrip,

    /* --- GLSL-only image intrinsics --- */
    ImageLoad,
    ImageStore,
    ImageAtomicAdd,
    ImageAtomicAnd,
    ImageAtomicOr,
    ImageAtomicXor,
    ImageAtomicMin,
    ImageAtomicMax,
    ImageAtomicCompSwap,
    ImageAtomicExchange,
}

impl Intrinsic {
    pub fn is_texture_intrinsic(self) -> bool {
        use Intrinsic::*;
        matches!(
            self,
            TextureGetDimensions
                | TextureQueryLod
                | TextureLoad1
                | TextureLoad2
                | TextureLoad3
                | TextureSample2
                | TextureSample3
                | TextureSample4
                | TextureSample5
                | TextureSampleBias3
                | TextureSampleBias4
                | TextureSampleCmp3
                | TextureSampleCmp4
                | TextureSampleCmpLevelZero3
                | TextureSampleGrad4
                | TextureSampleLevel3
                | TextureSampleLevel4
                | TextureGather2
                | TextureGather3
                | TextureGatherCmp3
        )
    }

    pub fn is_texture_sample(self) -> bool {
        use Intrinsic::*;
        matches!(
            self,
            TextureSample2
                | TextureSample3
                | TextureSample4
                | TextureSample5
                | TextureSampleBias3
                | TextureSampleBias4
                | TextureSampleCmp3
                | TextureSampleCmp4
                | TextureSampleCmpLevelZero3
                | TextureSampleGrad4
                | TextureSampleLevel3
                | TextureSampleLevel4
        )
    }

    /// Sample/gather variants with a compare operation return a scalar.
    pub fn is_texture_compare(self) -> bool {
        use Intrinsic::*;
        matches!(
            self,
            TextureSampleCmp3 | TextureSampleCmp4 | TextureSampleCmpLevelZero3 | TextureGatherCmp3
        )
    }

    pub fn is_texture_load(self) -> bool {
        matches!(self, Intrinsic::TextureLoad1 | Intrinsic::TextureLoad2 | Intrinsic::TextureLoad3)
    }

    pub fn is_texture_gather(self) -> bool {
        matches!(self, Intrinsic::TextureGather2 | Intrinsic::TextureGather3 | Intrinsic::TextureGatherCmp3)
    }

    pub fn is_stream_output(self) -> bool {
        matches!(self, Intrinsic::StreamOutputAppend | Intrinsic::StreamOutputRestartStrip)
    }

    pub fn is_interlocked(self) -> bool {
        use Intrinsic::*;
        matches!(
            self,
            InterlockedAdd
                | InterlockedAnd
                | InterlockedCompareExchange
                | InterlockedCompareStore
                | InterlockedExchange
                | InterlockedMax
                | InterlockedMin
                | InterlockedOr
                | InterlockedXor
        )
    }

    pub fn is_image(self) -> bool {
        use Intrinsic::*;
        matches!(
            self,
            ImageLoad
                | ImageStore
                | ImageAtomicAdd
                | ImageAtomicAnd
                | ImageAtomicOr
                | ImageAtomicXor
                | ImageAtomicMin
                | ImageAtomicMax
                | ImageAtomicCompSwap
                | ImageAtomicExchange
        )
    }

    pub fn is_image_atomic(self) -> bool {
        use Intrinsic::*;
        matches!(
            self,
            ImageAtomicAdd
                | ImageAtomicAnd
                | ImageAtomicOr
                | ImageAtomicXor
                | ImageAtomicMin
                | ImageAtomicMax
                | ImageAtomicCompSwap
                | ImageAtomicExchange
        )
    }

    /// Maps an interlocked intrinsic to its image atomic form (used when the
    /// destination is a RW texture).
    pub fn to_image_atomic(self) -> Intrinsic {
        use Intrinsic::*;
        match self {
            InterlockedAdd => ImageAtomicAdd,
            InterlockedAnd => ImageAtomicAnd,
            InterlockedOr => ImageAtomicOr,
            InterlockedXor => ImageAtomicXor,
            InterlockedMin => ImageAtomicMin,
            InterlockedMax => ImageAtomicMax,
            InterlockedCompareExchange => ImageAtomicCompSwap,
            InterlockedExchange => ImageAtomicExchange,
            other => other,
        }
    }
}

/// The vector relational intrinsic for a comparison operator.
pub fn compare_op_to_intrinsic(op: BinaryOp) -> Option<Intrinsic> {
    match op {
        BinaryOp::Equal => Some(Intrinsic::Equal),
        BinaryOp::NotEqual => Some(Intrinsic::NotEqual),
        BinaryOp::Less => Some(Intrinsic::LessThan),
        BinaryOp::LessEqual => Some(Intrinsic::LessThanEqual),
        BinaryOp::Greater => Some(Intrinsic::GreaterThan),
        BinaryOp::GreaterEqual => Some(Intrinsic::GreaterThanEqual),
        _ => None,
    }
}

/// Argument-type signatures observed for one intrinsic; collected by the
/// reference analyzer so the writer can emit per-type wrapper functions.
#[derive(Clone, Debug, Default)]
pub struct IntrinsicUsage {
    pub arg_lists: IndexSet<Vec<DataType>>,
}
