//! HLSL to GLSL shader cross-compiler.
//!
//! The input is an abstract syntax tree shaped like the HLSL dialect of
//! Direct3D (buffers, samplers, entry-point semantics); the output is a
//! semantically equivalent GLSL source string. The pipeline is a suite of
//! language-neutral transformation passes over a single mutable [`ast::Program`]
//! followed by a textual writer:
//!
//! 1. struct-parameter analysis ([`sema::StructParameterAnalyzer`])
//! 2. semantic type canonicalization ([`xform::TypeConverter`])
//! 3. expression rewrites ([`xform::ExprConverter`])
//! 4. the GLSL master rewriter ([`glsl::GlslConverter`])
//! 5. function-name disambiguation ([`xform::FuncNameConverter`])
//! 6. reachability analysis ([`sema::ReferenceAnalyzer`])
//! 7. late matrix-subscript rewrites and emission ([`glsl::Writer`])

pub mod ast;
pub mod diag;
pub mod eval;
pub mod glsl;
pub mod sema;
pub mod xform;

use diag::{Report, ReportHandler, Result};
use smol_str::SmolStr;

/// The shader stage being compiled.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ShaderTarget {
    Vertex,
    TessControl,
    TessEvaluation,
    Geometry,
    Fragment,
    Compute,
}

/// Output language family, stored in the high bits of
/// [`OutputShaderVersion`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum OutputShaderFamily {
    Glsl,
    Essl,
    Vksl,
    Metal,
}

/// Bit-encoded output language: family in the high bits, numeric version in
/// the low bits (e.g. GLSL 3.30 encodes as `0x0000_014A`).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct OutputShaderVersion(u32);

impl OutputShaderVersion {
    const FAMILY_SHIFT: u32 = 24;

    pub const GLSL110: OutputShaderVersion = OutputShaderVersion::new(OutputShaderFamily::Glsl, 110);
    pub const GLSL120: OutputShaderVersion = OutputShaderVersion::new(OutputShaderFamily::Glsl, 120);
    pub const GLSL130: OutputShaderVersion = OutputShaderVersion::new(OutputShaderFamily::Glsl, 130);
    pub const GLSL140: OutputShaderVersion = OutputShaderVersion::new(OutputShaderFamily::Glsl, 140);
    pub const GLSL150: OutputShaderVersion = OutputShaderVersion::new(OutputShaderFamily::Glsl, 150);
    pub const GLSL330: OutputShaderVersion = OutputShaderVersion::new(OutputShaderFamily::Glsl, 330);
    pub const GLSL400: OutputShaderVersion = OutputShaderVersion::new(OutputShaderFamily::Glsl, 400);
    pub const GLSL410: OutputShaderVersion = OutputShaderVersion::new(OutputShaderFamily::Glsl, 410);
    pub const GLSL420: OutputShaderVersion = OutputShaderVersion::new(OutputShaderFamily::Glsl, 420);
    pub const GLSL430: OutputShaderVersion = OutputShaderVersion::new(OutputShaderFamily::Glsl, 430);
    pub const GLSL440: OutputShaderVersion = OutputShaderVersion::new(OutputShaderFamily::Glsl, 440);
    pub const GLSL450: OutputShaderVersion = OutputShaderVersion::new(OutputShaderFamily::Glsl, 450);
    pub const ESSL300: OutputShaderVersion = OutputShaderVersion::new(OutputShaderFamily::Essl, 300);
    pub const ESSL310: OutputShaderVersion = OutputShaderVersion::new(OutputShaderFamily::Essl, 310);
    pub const VKSL450: OutputShaderVersion = OutputShaderVersion::new(OutputShaderFamily::Vksl, 450);

    pub const fn new(family: OutputShaderFamily, version: u32) -> OutputShaderVersion {
        let family_bits = match family {
            OutputShaderFamily::Glsl => 0,
            OutputShaderFamily::Essl => 1,
            OutputShaderFamily::Vksl => 2,
            OutputShaderFamily::Metal => 3,
        };
        OutputShaderVersion((family_bits << Self::FAMILY_SHIFT) | (version & 0x00FF_FFFF))
    }

    pub fn family(self) -> OutputShaderFamily {
        match self.0 >> Self::FAMILY_SHIFT {
            0 => OutputShaderFamily::Glsl,
            1 => OutputShaderFamily::Essl,
            2 => OutputShaderFamily::Vksl,
            _ => OutputShaderFamily::Metal,
        }
    }

    pub fn version(self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    pub fn is_vksl(self) -> bool {
        self.family() == OutputShaderFamily::Vksl
    }

    pub fn is_essl(self) -> bool {
        self.family() == OutputShaderFamily::Essl
    }

    /// True when the `GL_ARB_shading_language_420pack` feature set is part
    /// of the core version.
    pub fn has_420_pack(self) -> bool {
        self.is_vksl() || (self.family() == OutputShaderFamily::Glsl && self.version() >= 420)
    }
}

/// Behavioral options of the cross compilation.
#[derive(Clone, Debug)]
pub struct Options {
    /// Rename all identifiers to obfuscated numeric names.
    pub obfuscate: bool,
    /// Keep statement comments in the output.
    pub preserve_comments: bool,
    /// Allow `#extension` directives for features outside the core version.
    pub allow_extensions: bool,
    /// Map `register` slots to `layout(binding = N)`.
    pub explicit_binding: bool,
    /// Assign binding slots to resources without an explicit register.
    pub auto_binding: bool,
    pub auto_binding_slot: u32,
    /// Expand `T a[N] = { ... };` into per-element assignments.
    pub unroll_array_initializers: bool,
    /// Fold constant expressions and remove trivially dead statements.
    pub optimize: bool,
    /// Write braces around every control-flow body.
    pub always_braced_scopes: bool,
    /// Emit code compatible with separable shader objects.
    pub separate_shaders: bool,
    /// Keep samplers separate from textures (Vulkan-style output).
    pub separate_samplers: bool,
    /// Emit generated wrapper functions on a single line.
    pub compact_wrappers: bool,
    pub write_generator_header: bool,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            obfuscate: false,
            preserve_comments: true,
            allow_extensions: false,
            explicit_binding: false,
            auto_binding: false,
            auto_binding_slot: 0,
            unroll_array_initializers: false,
            optimize: false,
            always_braced_scopes: false,
            separate_shaders: false,
            separate_samplers: true,
            compact_wrappers: true,
            write_generator_header: false,
        }
    }
}

/// Textual formatting options of the writer.
#[derive(Clone, Debug)]
pub struct Formatting {
    pub indent: SmolStr,
    /// Open braces on their own line.
    pub new_line_open_scope: bool,
    /// Blank lines between global declarations.
    pub blanks: bool,
    /// Emit `#line` marks (requires the frontend to provide valid areas).
    pub line_marks: bool,
}

impl Default for Formatting {
    fn default() -> Formatting {
        Formatting {
            indent: "    ".into(),
            new_line_open_scope: false,
            blanks: true,
            line_marks: false,
        }
    }
}

/// Identifier mangling configuration.
#[derive(Clone, Debug)]
pub struct NameMangling {
    /// Prefix of entry-point input variables (`_in_TEXCOORD0`).
    pub input_prefix: SmolStr,
    /// Prefix of entry-point output variables (`_out_SV_Target0`).
    pub output_prefix: SmolStr,
    /// Prefix of reserved-word escapes.
    pub reserved_word_prefix: SmolStr,
    /// Prefix of compiler-generated temporaries.
    pub temporary_prefix: SmolStr,
    /// Prefix of names lowered out of struct namespaces.
    pub namespace_prefix: SmolStr,
    /// Rename entry-point I/O by semantic even where the source identifier
    /// could be preserved.
    pub use_always_semantics: bool,
    /// Apply the temporary prefix to storage-buffer fields.
    pub rename_buffer_fields: bool,
}

impl Default for NameMangling {
    fn default() -> NameMangling {
        NameMangling {
            input_prefix: "_in_".into(),
            output_prefix: "_out_".into(),
            reserved_word_prefix: "xsr_".into(),
            temporary_prefix: "xst_".into(),
            namespace_prefix: "xsn_".into(),
            use_always_semantics: false,
            rename_buffer_fields: false,
        }
    }
}

/// A vertex attribute location requested by the caller.
#[derive(Clone, Debug)]
pub struct VertexSemantic {
    pub semantic: SmolStr,
    pub location: u32,
}

bitflags::bitflags! {
    /// Warning categories the caller opts into.
    pub struct WarningFlags: u32 {
        const BASIC = 1 << 0;
        const SYNTAX = 1 << 1;
        const PREPROCESSOR = 1 << 2;
        const UNUSED_VARIABLES = 1 << 3;
        const EXTENSIONS = 1 << 4;
        const IMPLICIT_TYPE_CONVERSIONS = 1 << 5;
        const DECLARATION_SHADOWING = 1 << 6;
        const ALL = !0;
    }
}

bitflags::bitflags! {
    /// Input-language extension toggles.
    pub struct ExtensionFlags: u32 {
        /// Accept layout attributes on input declarations.
        const LAYOUT_ATTRIBUTE = 1 << 0;
        /// Accept vector-space annotations.
        const SPACE_ATTRIBUTE = 1 << 1;
    }
}

/// Compilation input: the program AST plus stage information.
#[derive(Debug)]
pub struct ShaderInput {
    pub program: ast::Program,
    pub entry_point: SmolStr,
    pub shader_target: ShaderTarget,
    pub source_name: SmolStr,
    pub warnings: WarningFlags,
    pub extensions: ExtensionFlags,
}

impl ShaderInput {
    pub fn new(program: ast::Program, entry_point: impl Into<SmolStr>, shader_target: ShaderTarget) -> ShaderInput {
        ShaderInput {
            program,
            entry_point: entry_point.into(),
            shader_target,
            source_name: "<input>".into(),
            warnings: WarningFlags::empty(),
            extensions: ExtensionFlags::empty(),
        }
    }
}

/// Compilation output configuration.
#[derive(Clone, Debug)]
pub struct ShaderOutput {
    pub shader_version: OutputShaderVersion,
    pub options: Options,
    pub formatting: Formatting,
    pub name_mangling: NameMangling,
    pub vertex_semantics: Vec<VertexSemantic>,
}

impl Default for ShaderOutput {
    fn default() -> ShaderOutput {
        ShaderOutput {
            shader_version: OutputShaderVersion::GLSL330,
            options: Options::default(),
            formatting: Formatting::default(),
            name_mangling: NameMangling::default(),
            vertex_semantics: Vec::new(),
        }
    }
}

/// The compilation result: the generated source plus all collected reports.
#[derive(Debug)]
pub struct CompileResult {
    pub source: String,
    pub reports: Vec<Report>,
}

/// Cross-compiles the program AST to GLSL text.
///
/// Runs the full pass pipeline and the writer. Errors abort the pipeline
/// after the failing pass; the error is also recorded in the returned
/// report list of the `Err` payload.
pub fn compile_shader(input: ShaderInput, output: &ShaderOutput) -> Result<CompileResult, Vec<Report>> {
    let ShaderInput {
        mut program,
        entry_point,
        shader_target,
        source_name,
        warnings,
        extensions,
    } = input;

    // resolve the entry point by name unless the frontend already did
    if program.entry_point.is_none() {
        program.entry_point = program
            .functions
            .iter()
            .find(|(_, func)| func.ident.original() == &entry_point)
            .map(|(id, _)| id);
    }

    let mut handler = ReportHandler::new(source_name, warnings);

    let result = glsl::compile_program(&mut program, shader_target, extensions, output, &mut handler);

    match result {
        Ok(source) => Ok(CompileResult {
            source,
            reports: handler.into_reports(),
        }),
        Err(err) => {
            handler.submit(err.into_report());
            Err(handler.into_reports())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_version_encoding() {
        let version = OutputShaderVersion::GLSL330;
        assert_eq!(version.family(), OutputShaderFamily::Glsl);
        assert_eq!(version.version(), 330);
        assert!(!version.has_420_pack());
        assert!(OutputShaderVersion::GLSL420.has_420_pack());
        assert!(OutputShaderVersion::VKSL450.is_vksl());
        assert!(OutputShaderVersion::ESSL300.is_essl());
    }
}
