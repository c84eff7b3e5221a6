//! Constant lookup tables for the GLSL output language.

use crate::ast::{BufferType, DataType, Intrinsic, SamplerType, ScalarType, Semantic};
use crate::ShaderTarget;
use indexmap::IndexSet;
use once_cell::sync::Lazy;

/// GLSL keywords and built-in names an output identifier must not collide
/// with.
pub const RESERVED: &[&str] = &[
    // keywords
    "attribute",
    "const",
    "uniform",
    "varying",
    "buffer",
    "shared",
    "coherent",
    "volatile",
    "restrict",
    "readonly",
    "writeonly",
    "atomic_uint",
    "layout",
    "centroid",
    "flat",
    "smooth",
    "noperspective",
    "patch",
    "sample",
    "break",
    "continue",
    "do",
    "for",
    "while",
    "switch",
    "case",
    "default",
    "if",
    "else",
    "subroutine",
    "in",
    "out",
    "inout",
    "float",
    "double",
    "int",
    "void",
    "bool",
    "true",
    "false",
    "invariant",
    "precise",
    "discard",
    "return",
    "mat2",
    "mat3",
    "mat4",
    "dmat2",
    "dmat3",
    "dmat4",
    "mat2x2",
    "mat2x3",
    "mat2x4",
    "mat3x2",
    "mat3x3",
    "mat3x4",
    "mat4x2",
    "mat4x3",
    "mat4x4",
    "vec2",
    "vec3",
    "vec4",
    "ivec2",
    "ivec3",
    "ivec4",
    "bvec2",
    "bvec3",
    "bvec4",
    "dvec2",
    "dvec3",
    "dvec4",
    "uint",
    "uvec2",
    "uvec3",
    "uvec4",
    "lowp",
    "mediump",
    "highp",
    "precision",
    "sampler1D",
    "sampler2D",
    "sampler3D",
    "samplerCube",
    "sampler1DShadow",
    "sampler2DShadow",
    "samplerCubeShadow",
    "sampler1DArray",
    "sampler2DArray",
    "sampler1DArrayShadow",
    "sampler2DArrayShadow",
    "isampler1D",
    "isampler2D",
    "isampler3D",
    "isamplerCube",
    "isampler1DArray",
    "isampler2DArray",
    "usampler1D",
    "usampler2D",
    "usampler3D",
    "usamplerCube",
    "usampler1DArray",
    "usampler2DArray",
    "sampler2DRect",
    "sampler2DRectShadow",
    "isampler2DRect",
    "usampler2DRect",
    "samplerBuffer",
    "isamplerBuffer",
    "usamplerBuffer",
    "sampler2DMS",
    "isampler2DMS",
    "usampler2DMS",
    "sampler2DMSArray",
    "isampler2DMSArray",
    "usampler2DMSArray",
    "samplerCubeArray",
    "samplerCubeArrayShadow",
    "isamplerCubeArray",
    "usamplerCubeArray",
    "image1D",
    "iimage1D",
    "uimage1D",
    "image2D",
    "iimage2D",
    "uimage2D",
    "image3D",
    "iimage3D",
    "uimage3D",
    "imageCube",
    "imageBuffer",
    "image1DArray",
    "image2DArray",
    "struct",
    // common built-in functions
    "main",
    "abs",
    "sign",
    "floor",
    "ceil",
    "fract",
    "mod",
    "min",
    "max",
    "clamp",
    "mix",
    "step",
    "smoothstep",
    "length",
    "distance",
    "dot",
    "cross",
    "normalize",
    "reflect",
    "refract",
    "pow",
    "exp",
    "log",
    "exp2",
    "log2",
    "sqrt",
    "inversesqrt",
    "sin",
    "cos",
    "tan",
    "asin",
    "acos",
    "atan",
    "radians",
    "degrees",
    "texture",
    "textureLod",
    "textureProj",
    "textureGrad",
    "textureOffset",
    "texelFetch",
    "transpose",
    "determinant",
    "inverse",
    "filter",
    "input",
    "output",
    "active",
    "common",
    "partition",
];

static RESERVED_SET: Lazy<IndexSet<&'static str>> = Lazy::new(|| RESERVED.iter().copied().collect());

pub fn is_reserved_word(ident: &str) -> bool {
    RESERVED_SET.contains(ident)
}

/// The GLSL spelling of an intrinsic, or `None` when the intrinsic has no
/// direct GLSL equivalent and needs a wrapper.
pub fn intrinsic_glsl_name(intrinsic: Intrinsic) -> Option<&'static str> {
    use Intrinsic::*;
    let name = match intrinsic {
        Abs => "abs",
        ACos => "acos",
        All => "all",
        AllMemoryBarrier => "memoryBarrier",
        Any => "any",
        AsDouble => "uint64BitsToDouble",
        AsFloat => "uintBitsToFloat",
        ASin => "asin",
        AsInt => "floatBitsToInt",
        AsUInt => "floatBitsToUint",
        ATan => "atan",
        ATan2 => "atan",
        Ceil => "ceil",
        Clamp => "clamp",
        Cos => "cos",
        CosH => "cosh",
        CountBits => "bitCount",
        Cross => "cross",
        Ddx => "dFdx",
        DdxCoarse => "dFdxCoarse",
        DdxFine => "dFdxFine",
        Ddy => "dFdy",
        DdyCoarse => "dFdyCoarse",
        DdyFine => "dFdyFine",
        Degrees => "degrees",
        Determinant => "determinant",
        Distance => "distance",
        Dot => "dot",
        Exp => "exp",
        Exp2 => "exp2",
        FaceForward => "faceforward",
        FirstBitHigh => "findMSB",
        FirstBitLow => "findLSB",
        Floor => "floor",
        Fma | Mad => "fma",
        FMod => "mod",
        Frac => "fract",
        FrExp => "frexp",
        FWidth => "fwidth",
        GroupMemoryBarrier => "groupMemoryBarrier",
        InterlockedAdd => "atomicAdd",
        InterlockedAnd => "atomicAnd",
        InterlockedCompareExchange => "atomicCompSwap",
        InterlockedExchange => "atomicExchange",
        InterlockedMax => "atomicMax",
        InterlockedMin => "atomicMin",
        InterlockedOr => "atomicOr",
        InterlockedXor => "atomicXor",
        IsInf => "isinf",
        IsNaN => "isnan",
        LdExp => "ldexp",
        Length => "length",
        Lerp => "mix",
        Log => "log",
        Log2 => "log2",
        Max => "max",
        Min => "min",
        ModF => "modf",
        Normalize => "normalize",
        Pow => "pow",
        Radians => "radians",
        Reflect => "reflect",
        Refract => "refract",
        Round => "round",
        RSqrt => "inversesqrt",
        Sign => "sign",
        Sin => "sin",
        SinH => "sinh",
        SmoothStep => "smoothstep",
        Sqrt => "sqrt",
        Step => "step",
        Tan => "tan",
        TanH => "tanh",
        Transpose => "transpose",
        Trunc => "trunc",

        Equal => "equal",
        NotEqual => "notEqual",
        LessThan => "lessThan",
        LessThanEqual => "lessThanEqual",
        GreaterThan => "greaterThan",
        GreaterThanEqual => "greaterThanEqual",
        Not => "not",

        Tex1D | Tex2D | Tex3D | TexCube => "texture",
        Tex1DLod | Tex2DLod | Tex3DLod | TexCubeLod => "textureLod",

        TextureGetDimensions => "textureSize",
        TextureQueryLod => "textureQueryLod",
        TextureLoad1 | TextureLoad2 | TextureLoad3 => "texelFetch",
        TextureSample2 | TextureSample3 | TextureSample4 | TextureSample5 => "texture",
        TextureSampleBias3 | TextureSampleBias4 => "texture",
        TextureSampleCmp3 | TextureSampleCmp4 | TextureSampleCmpLevelZero3 => "texture",
        TextureSampleGrad4 => "textureGrad",
        TextureSampleLevel3 | TextureSampleLevel4 => "textureLod",
        TextureGather2 | TextureGather3 | TextureGatherCmp3 => "textureGather",

        StreamOutputAppend => "EmitVertex",
        StreamOutputRestartStrip => "EndPrimitive",

        ImageLoad => "imageLoad",
        ImageStore => "imageStore",
        ImageAtomicAdd => "imageAtomicAdd",
        ImageAtomicAnd => "imageAtomicAnd",
        ImageAtomicOr => "imageAtomicOr",
        ImageAtomicXor => "imageAtomicXor",
        ImageAtomicMin => "imageAtomicMin",
        ImageAtomicMax => "imageAtomicMax",
        ImageAtomicCompSwap => "imageAtomicCompSwap",
        ImageAtomicExchange => "imageAtomicExchange",

        // no GLSL equivalent; the writer emits a wrapper function
        Clip | SinCos | Lit | Rcp | Log10 | Saturate | Mul | AllMemoryBarrierWithGroupSync
        | DeviceMemoryBarrier | DeviceMemoryBarrierWithGroupSync | GroupMemoryBarrierWithGroupSync
        | InterlockedCompareStore => return None,
    };
    Some(name)
}

/// The GLSL built-in variable of a system-value semantic for the given
/// stage and direction, or `None` for semantics that lower to plain in/out
/// variables.
pub fn semantic_glsl_builtin(semantic: &Semantic, target: ShaderTarget, input: bool) -> Option<&'static str> {
    let builtin = match semantic {
        Semantic::UserDefined(_) => return None,
        Semantic::ClipDistance => "gl_ClipDistance",
        Semantic::CullDistance => "gl_CullDistance",
        Semantic::Coverage => {
            if input {
                "gl_SampleMaskIn"
            } else {
                "gl_SampleMask"
            }
        }
        Semantic::Depth | Semantic::DepthGreaterEqual | Semantic::DepthLessEqual => "gl_FragDepth",
        Semantic::DispatchThreadId => "gl_GlobalInvocationID",
        Semantic::DomainLocation => "gl_TessCoord",
        Semantic::FragCoord => "gl_FragCoord",
        Semantic::GroupId => "gl_WorkGroupID",
        Semantic::GroupIndex => "gl_LocalInvocationIndex",
        Semantic::GroupThreadId => "gl_LocalInvocationID",
        Semantic::GsInstanceId => "gl_InvocationID",
        Semantic::InnerCoverage => "gl_SampleMaskIn",
        Semantic::InsideTessFactor => "gl_TessLevelInner",
        Semantic::InstanceId => "gl_InstanceID",
        Semantic::IsFrontFace => "gl_FrontFacing",
        Semantic::OutputControlPointId => "gl_InvocationID",
        Semantic::PointSize => "gl_PointSize",
        Semantic::PrimitiveId => "gl_PrimitiveID",
        Semantic::RenderTargetArrayIndex => "gl_Layer",
        Semantic::SampleIndex => "gl_SampleID",
        Semantic::StencilRef => "gl_FragStencilRef",
        // render targets become declared `out` variables
        Semantic::Target => return None,
        Semantic::TessFactor => "gl_TessLevelOuter",
        Semantic::VertexId => "gl_VertexID",
        Semantic::VertexPosition => {
            if target == ShaderTarget::Fragment && input {
                "gl_FragCoord"
            } else {
                "gl_Position"
            }
        }
        Semantic::ViewportArrayIndex => "gl_ViewportIndex",
    };
    Some(builtin)
}

/// The fixed GLSL data type a system-value semantic forces on its variable.
pub fn semantic_glsl_data_type(semantic: &Semantic) -> Option<DataType> {
    match semantic {
        Semantic::DispatchThreadId | Semantic::GroupId | Semantic::GroupThreadId => {
            Some(DataType::Vector(ScalarType::UInt, 3))
        }
        Semantic::GroupIndex => Some(DataType::UINT),
        Semantic::GsInstanceId
        | Semantic::InstanceId
        | Semantic::OutputControlPointId
        | Semantic::PrimitiveId
        | Semantic::SampleIndex
        | Semantic::VertexId => Some(DataType::INT),
        Semantic::IsFrontFace => Some(DataType::BOOL),
        _ => None,
    }
}

/// GLSL spelling of a base data type.
pub fn data_type_glsl_name(dt: DataType) -> String {
    fn scalar_name(base: ScalarType) -> &'static str {
        match base {
            ScalarType::Bool => "bool",
            ScalarType::Int => "int",
            ScalarType::UInt => "uint",
            // half has no GLSL spelling; literals and types fall back to float
            ScalarType::Half | ScalarType::Float => "float",
            ScalarType::Double => "double",
        }
    }
    fn vector_prefix(base: ScalarType) -> &'static str {
        match base {
            ScalarType::Bool => "b",
            ScalarType::Int => "i",
            ScalarType::UInt => "u",
            ScalarType::Half | ScalarType::Float => "",
            ScalarType::Double => "d",
        }
    }

    match dt {
        DataType::String => "string".into(),
        DataType::Scalar(base) => scalar_name(base).into(),
        DataType::Vector(base, n) => format!("{}vec{}", vector_prefix(base), n),
        DataType::Matrix(base, rows, cols) => {
            let prefix = if base == ScalarType::Double { "d" } else { "" };
            if rows == cols {
                format!("{prefix}mat{rows}")
            } else {
                format!("{prefix}mat{rows}x{cols}")
            }
        }
    }
}

/// GLSL object spelling of a texture/buffer type combined with its generic
/// base type (`Texture2D<float4>` -> `sampler2D`, `RWTexture2D` ->
/// `image2D`).
pub fn buffer_type_glsl_name(buffer_type: BufferType, generic_base: ScalarType) -> Option<String> {
    let prefix = match generic_base {
        ScalarType::Int => "i",
        ScalarType::UInt => "u",
        _ => "",
    };
    let name = match buffer_type {
        BufferType::Texture1D => "sampler1D",
        BufferType::Texture1DArray => "sampler1DArray",
        BufferType::Texture2D => "sampler2D",
        BufferType::Texture2DArray => "sampler2DArray",
        BufferType::Texture3D => "sampler3D",
        BufferType::TextureCube => "samplerCube",
        BufferType::TextureCubeArray => "samplerCubeArray",
        BufferType::Texture2DMs => "sampler2DMS",
        BufferType::Texture2DMsArray => "sampler2DMSArray",
        BufferType::Buffer => "samplerBuffer",
        BufferType::RwBuffer => "imageBuffer",
        BufferType::RwTexture1D => "image1D",
        BufferType::RwTexture1DArray => "image1DArray",
        BufferType::RwTexture2D => "image2D",
        BufferType::RwTexture2DArray => "image2DArray",
        BufferType::RwTexture3D => "image3D",
        _ => return None,
    };
    Some(format!("{prefix}{name}"))
}

/// GLSL spelling of a sampler object (VKSL separates samplers from
/// textures; classic GLSL fuses them).
pub fn sampler_type_vksl_name(sampler_type: SamplerType) -> &'static str {
    match sampler_type {
        SamplerType::SamplerComparisonState => "samplerShadow",
        _ => "sampler",
    }
}
