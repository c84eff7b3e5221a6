//! GLSL output backend: the master rewriter and the textual writer.

pub mod converter;
pub mod keywords;
pub mod writer;

pub use converter::GlslConverter;
pub use writer::Writer;

use crate::ast::Program;
use crate::diag::{ReportHandler, Result};
use crate::sema::{ReferenceAnalyzer, StructParameterAnalyzer};
use crate::xform::{CbufferAttributes, ConvertFlags, ExprConverter, Optimizer, UniformPacker};
use crate::{ExtensionFlags, ShaderOutput, ShaderTarget};

/// Runs the full pass pipeline over the program and emits GLSL text.
///
/// Order matters: struct-parameter analysis feeds the entry-point wrapping
/// in the GLSL converter; reachability and matrix-subscript collection run
/// after all structural rewrites, immediately before emission.
pub fn compile_program(
    prog: &mut Program,
    shader_target: ShaderTarget,
    extensions: ExtensionFlags,
    output: &ShaderOutput,
    handler: &mut ReportHandler,
) -> Result<String> {
    StructParameterAnalyzer::mark_structs_from_entry_point(prog, shader_target)?;

    GlslConverter::convert(prog, shader_target, output)?;

    UniformPacker::convert(prog, &CbufferAttributes::default(), false)?;

    if output.options.optimize {
        Optimizer::optimize(prog)?;
    }

    ReferenceAnalyzer::mark_references_from_entry_point(prog, shader_target, handler)?;

    // late rewrites that depend on the collected matrix subscripts
    ExprConverter::convert(prog, ConvertFlags::MATRIX_SUBSCRIPTS, &output.name_mangling)?;

    Writer::write_program(prog, shader_target, extensions, output, handler)
}
