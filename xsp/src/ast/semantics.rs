//! Shader I/O semantics.

use smol_str::SmolStr;
use std::fmt;

/// System-value and user-defined semantics. System values map one-to-one to
/// GLSL built-in variables per stage; user semantics become plain in/out
/// variables named `<prefix><SEMANTIC><INDEX>`.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Semantic {
    UserDefined(SmolStr),

    ClipDistance,
    CullDistance,
    Coverage,
    Depth,
    DepthGreaterEqual,
    DepthLessEqual,
    DispatchThreadId,
    DomainLocation,
    /// `SV_Position` read in a fragment shader (`gl_FragCoord`).
    FragCoord,
    GroupId,
    GroupIndex,
    GroupThreadId,
    GsInstanceId,
    InnerCoverage,
    InsideTessFactor,
    InstanceId,
    IsFrontFace,
    OutputControlPointId,
    PointSize,
    PrimitiveId,
    RenderTargetArrayIndex,
    SampleIndex,
    StencilRef,
    Target,
    TessFactor,
    VertexId,
    /// `SV_Position` written by a vertex-like stage (`gl_Position`).
    VertexPosition,
    ViewportArrayIndex,
}

impl Semantic {
    pub fn is_system_value(&self) -> bool {
        !matches!(self, Semantic::UserDefined(_))
    }

    /// HLSL-side spelling (used for user-variable naming and diagnostics).
    pub fn hlsl_name(&self) -> &str {
        match self {
            Semantic::UserDefined(name) => name,
            Semantic::ClipDistance => "SV_ClipDistance",
            Semantic::CullDistance => "SV_CullDistance",
            Semantic::Coverage => "SV_Coverage",
            Semantic::Depth => "SV_Depth",
            Semantic::DepthGreaterEqual => "SV_DepthGreaterEqual",
            Semantic::DepthLessEqual => "SV_DepthLessEqual",
            Semantic::DispatchThreadId => "SV_DispatchThreadID",
            Semantic::DomainLocation => "SV_DomainLocation",
            Semantic::FragCoord => "SV_Position",
            Semantic::GroupId => "SV_GroupID",
            Semantic::GroupIndex => "SV_GroupIndex",
            Semantic::GroupThreadId => "SV_GroupThreadID",
            Semantic::GsInstanceId => "SV_GSInstanceID",
            Semantic::InnerCoverage => "SV_InnerCoverage",
            Semantic::InsideTessFactor => "SV_InsideTessFactor",
            Semantic::InstanceId => "SV_InstanceID",
            Semantic::IsFrontFace => "SV_IsFrontFace",
            Semantic::OutputControlPointId => "SV_OutputControlPointID",
            Semantic::PointSize => "PSIZE",
            Semantic::PrimitiveId => "SV_PrimitiveID",
            Semantic::RenderTargetArrayIndex => "SV_RenderTargetArrayIndex",
            Semantic::SampleIndex => "SV_SampleIndex",
            Semantic::StencilRef => "SV_StencilRef",
            Semantic::Target => "SV_Target",
            Semantic::TessFactor => "SV_TessFactor",
            Semantic::VertexId => "SV_VertexID",
            Semantic::VertexPosition => "SV_Position",
            Semantic::ViewportArrayIndex => "SV_ViewportArrayIndex",
        }
    }
}

/// A semantic paired with its integer index (e.g. `TEXCOORD3`).
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct IndexedSemantic {
    pub semantic: Semantic,
    pub index: i32,
}

impl IndexedSemantic {
    pub fn new(semantic: Semantic, index: i32) -> IndexedSemantic {
        IndexedSemantic { semantic, index }
    }

    /// Parses a user-defined semantic string, splitting a trailing index
    /// (e.g. `TEXCOORD3` -> `TEXCOORD` + 3).
    pub fn user_defined(text: &str) -> IndexedSemantic {
        let trimmed = text.trim_end_matches(|ch: char| ch.is_ascii_digit());
        let index = text[trimmed.len()..].parse().unwrap_or(0);
        IndexedSemantic {
            semantic: Semantic::UserDefined(trimmed.into()),
            index,
        }
    }

    pub fn is_system_value(&self) -> bool {
        self.semantic.is_system_value()
    }
}

impl From<Semantic> for IndexedSemantic {
    fn from(semantic: Semantic) -> IndexedSemantic {
        IndexedSemantic { semantic, index: 0 }
    }
}

impl fmt::Display for IndexedSemantic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.semantic.hlsl_name(), self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_semantic_index_split() {
        let semantic = IndexedSemantic::user_defined("TEXCOORD3");
        assert_eq!(semantic.semantic, Semantic::UserDefined("TEXCOORD".into()));
        assert_eq!(semantic.index, 3);

        let semantic = IndexedSemantic::user_defined("POSITION");
        assert_eq!(semantic.index, 0);
        assert_eq!(semantic.to_string(), "POSITION0");
    }
}
