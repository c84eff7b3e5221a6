//! Textual GLSL emission.
//!
//! The writer consumes a converted program in which every remaining
//! construct has a direct GLSL surface form. It computes binding layout
//! slots, chooses `#version`/`#extension` directives, declares the
//! entry-point I/O, emits wrapper functions for intrinsics without a GLSL
//! equivalent, and prints reachable declarations with an indent/scope state
//! machine.

use super::keywords;
use crate::ast::{
    BufferId, DataType, Expr, ExprKind, FunctionId, Intrinsic, NodeFlags, Program, SamplerId,
    ScalarType, Stmt, StmtKind, StructId, SwitchCase, SymbolRef, TypeDenoter, UniformBufferId, VarId,
};
use crate::diag::{CompileError, Report, ReportHandler, Result, SourceArea};
use crate::xform::ExprConverter;
use crate::{ExtensionFlags, OutputShaderFamily, ShaderOutput, ShaderTarget, WarningFlags};
use std::fmt::Write as _;

pub struct Writer<'a> {
    out: String,
    indent_level: usize,
    output: &'a ShaderOutput,
    shader_target: ShaderTarget,
    /// Input-language extension toggles (the layout-attribute extension
    /// governs explicit vertex attribute locations).
    extensions: ExtensionFlags,
    next_binding_slot: u32,
}

impl<'a> Writer<'a> {
    pub fn write_program(
        prog: &Program,
        shader_target: ShaderTarget,
        extensions: ExtensionFlags,
        output: &'a ShaderOutput,
        handler: &mut ReportHandler,
    ) -> Result<String> {
        let mut writer = Writer {
            out: String::new(),
            indent_level: 0,
            output,
            shader_target,
            extensions,
            next_binding_slot: output.options.auto_binding_slot,
        };
        writer.write_all(prog, handler)?;
        Ok(writer.out)
    }

    fn write_all(&mut self, prog: &Program, handler: &mut ReportHandler) -> Result<()> {
        self.write_version_directive();
        self.write_extension_directives(prog, handler)?;

        if self.output.options.write_generator_header {
            let target = match self.shader_target {
                ShaderTarget::Vertex => "vertex",
                ShaderTarget::TessControl => "tessellation control",
                ShaderTarget::TessEvaluation => "tessellation evaluation",
                ShaderTarget::Geometry => "geometry",
                ShaderTarget::Fragment => "fragment",
                ShaderTarget::Compute => "compute",
            };
            self.line(format!("// GLSL {target} shader"));
        }

        self.write_stage_layouts(prog);

        // separable programs redeclare the built-in output block
        if self.output.options.separate_shaders && self.shader_target == ShaderTarget::Vertex {
            self.line("out gl_PerVertex { vec4 gl_Position; };".to_string());
        }

        self.write_entry_point_io(prog);
        self.write_wrapper_functions(prog);

        for stmt in &prog.global_stmts {
            self.write_global_stmt(stmt, prog)?;
        }
        Ok(())
    }

    /* ----- Directives ----- */

    fn write_version_directive(&mut self) {
        let version = self.output.shader_version;
        match version.family() {
            OutputShaderFamily::Essl => self.line(format!("#version {} es", version.version())),
            OutputShaderFamily::Glsl if version.version() >= 150 => {
                self.line(format!("#version {} core", version.version()))
            }
            _ => self.line(format!("#version {}", version.version())),
        }
    }

    /// Minimal extension agent: scans the used features and maps each to
    /// the minimum required GLSL extension.
    fn write_extension_directives(&mut self, prog: &Program, handler: &mut ReportHandler) -> Result<()> {
        let version = self.output.shader_version.version();
        let mut extensions: Vec<&str> = Vec::new();

        let uses_derivative_control = prog.used_intrinsics.keys().any(|intrinsic| {
            matches!(
                intrinsic,
                Intrinsic::DdxCoarse | Intrinsic::DdxFine | Intrinsic::DdyCoarse | Intrinsic::DdyFine
            )
        });
        if uses_derivative_control && version < 450 {
            extensions.push("GL_ARB_derivative_control");
        }

        let uses_image_access = prog
            .used_intrinsics
            .keys()
            .any(|intrinsic| intrinsic.is_image() || intrinsic.is_image_atomic());
        if uses_image_access && version < 420 {
            extensions.push("GL_ARB_shader_image_load_store");
        }

        let uses_explicit_binding = self.output.options.explicit_binding || self.output.options.auto_binding;
        if uses_explicit_binding && version < 420 {
            extensions.push("GL_ARB_shading_language_420pack");
        }

        for extension in extensions {
            if self.output.options.allow_extensions {
                self.line(format!("#extension {extension} : enable"));
                handler.submit_warning(
                    WarningFlags::EXTENSIONS,
                    Report::warning(
                        format!("output requires extension '{extension}'"),
                        SourceArea::ignore(),
                    ),
                );
            } else {
                return Err(CompileError::semantic(
                    format!("feature requires extension '{extension}', which is disallowed"),
                    SourceArea::ignore(),
                ));
            }
        }
        Ok(())
    }

    fn write_stage_layouts(&mut self, prog: &Program) {
        match self.shader_target {
            ShaderTarget::Compute => {
                let [x, y, z] = prog.layout_compute.num_threads;
                if x + y + z > 0 {
                    self.line(format!(
                        "layout(local_size_x = {}, local_size_y = {}, local_size_z = {}) in;",
                        x.max(1),
                        y.max(1),
                        z.max(1)
                    ));
                }
            }
            ShaderTarget::Geometry => {
                if let Some(primitive) = &prog.layout_geometry.input_primitive {
                    self.line(format!("layout({primitive}) in;"));
                }
                if let Some(primitive) = prog.layout_geometry.output_primitive {
                    let topology = match primitive {
                        crate::ast::BufferType::PointStream => "points",
                        crate::ast::BufferType::LineStream => "line_strip",
                        _ => "triangle_strip",
                    };
                    self.line(format!(
                        "layout({topology}, max_vertices = {}) out;",
                        prog.layout_geometry.max_vertices
                    ));
                }
            }
            ShaderTarget::Fragment => {
                if prog.layout_fragment.early_depth_stencil {
                    self.line("layout(early_fragment_tests) in;".to_string());
                }
            }
            ShaderTarget::TessControl => {
                if prog.layout_tess_control.output_control_points > 0 {
                    self.line(format!(
                        "layout(vertices = {}) out;",
                        prog.layout_tess_control.output_control_points
                    ));
                }
            }
            _ => {}
        }
    }

    /* ----- Entry-point I/O ----- */

    fn write_entry_point_io(&mut self, prog: &Program) {
        let Some(entry) = prog.entry_point else { return };

        let inputs = prog.functions[entry].input_semantics.clone();
        let outputs = prog.functions[entry].output_semantics.clone();

        for var in inputs {
            self.write_io_var(var, prog, true);
        }
        for var in outputs {
            self.write_io_var(var, prog, false);
        }
    }

    fn write_io_var(&mut self, var: VarId, prog: &Program, input: bool) {
        let decl = &prog.vars[var];
        // GLSL built-ins need no declaration
        if decl.flags.contains(NodeFlags::IMMUTABLE) {
            return;
        }

        let mut line = String::new();

        // vertex attribute locations requested by the caller; explicit
        // locations are the layout-attribute feature and are emitted only
        // when that extension (or explicit binding) is enabled
        let allow_locations =
            self.extensions.contains(ExtensionFlags::LAYOUT_ATTRIBUTE) || self.output.options.explicit_binding;
        if input && self.shader_target == ShaderTarget::Vertex && allow_locations {
            if let Some(semantic) = &decl.semantic {
                let semantic_name = semantic.to_string();
                if let Some(requested) = self
                    .output
                    .vertex_semantics
                    .iter()
                    .find(|entry| entry.semantic.as_str() == semantic_name)
                {
                    let _ = write!(line, "layout(location = {}) ", requested.location);
                }
            }
        }

        // integer interpolants require flat interpolation
        let is_integral = matches!(
            decl.ty.aliased(prog).data_type(),
            Some(dt) if dt.is_integral() || dt.is_boolean()
        );
        if is_integral && self.shader_target == ShaderTarget::Fragment {
            line.push_str("flat ");
        } else if let Some(interp) = decl.interp {
            let spelling = match interp {
                crate::ast::InterpModifier::NoInterpolation => "flat ",
                crate::ast::InterpModifier::NoPerspective => "noperspective ",
                crate::ast::InterpModifier::Centroid => "centroid ",
                crate::ast::InterpModifier::Sample => "sample ",
                crate::ast::InterpModifier::Linear => "",
            };
            line.push_str(spelling);
        }

        line.push_str(if input { "in " } else { "out " });
        let (type_name, dims) = self.type_spelling(&decl.ty, prog);
        let _ = write!(line, "{} {}{};", type_name, decl.ident.final_name(), dims);
        self.line(line);
    }

    /* ----- Wrapper functions ----- */

    /// One generated wrapper: single-line in compact mode, a regular braced
    /// function otherwise.
    fn write_wrapper(&mut self, signature: String, body: &[String]) {
        if self.output.options.compact_wrappers {
            self.line(format!("{signature} {{ {} }}", body.join(" ")));
        } else {
            self.begin_scope(signature);
            for line in body {
                self.line(line.clone());
            }
            self.end_scope();
        }
    }

    fn write_wrapper_functions(&mut self, prog: &Program) {
        for subscript in &prog.used_matrix_subscripts {
            let ident = ExprConverter::matrix_subscript_wrapper_ident(&self.output.name_mangling, subscript);
            let in_type = keywords::data_type_glsl_name(subscript.data_type_in);
            let out_type = keywords::data_type_glsl_name(subscript.data_type_out);

            let mut elements = String::new();
            for (index, (row, col)) in subscript.indices.iter().enumerate() {
                if index > 0 {
                    elements.push_str(", ");
                }
                let _ = write!(elements, "m[{row}][{col}]");
            }
            let body = if subscript.indices.len() == 1 {
                format!("return {elements};")
            } else {
                format!("return {out_type}({elements});")
            };
            self.write_wrapper(format!("{out_type} {ident}({in_type} m)"), &[body]);
        }

        for (&intrinsic, usage) in &prog.used_intrinsics {
            if keywords::intrinsic_glsl_name(intrinsic).is_some() {
                continue;
            }
            match intrinsic {
                Intrinsic::Clip => {
                    for args in &usage.arg_lists {
                        let Some(&dt) = args.first() else { continue };
                        let type_name = keywords::data_type_glsl_name(dt);
                        let ident = self.wrapper_ident("clip");
                        let condition = if dt.is_scalar() {
                            "x < 0.0".to_string()
                        } else {
                            format!("any(lessThan(x, {type_name}(0.0)))")
                        };
                        self.write_wrapper(
                            format!("void {ident}({type_name} x)"),
                            &[format!("if ({condition}) discard;")],
                        );
                    }
                }
                Intrinsic::SinCos => {
                    for args in &usage.arg_lists {
                        let Some(&dt) = args.first() else { continue };
                        let type_name = keywords::data_type_glsl_name(dt);
                        let ident = self.wrapper_ident("sincos");
                        self.write_wrapper(
                            format!("void {ident}({type_name} x, out {type_name} s, out {type_name} c)"),
                            &["s = sin(x);".to_string(), "c = cos(x);".to_string()],
                        );
                    }
                }
                Intrinsic::Rcp => {
                    for args in &usage.arg_lists {
                        let Some(&dt) = args.first() else { continue };
                        let type_name = keywords::data_type_glsl_name(dt);
                        let ident = self.wrapper_ident("rcp");
                        self.write_wrapper(
                            format!("{type_name} {ident}({type_name} x)"),
                            &[format!("return {type_name}(1.0) / x;")],
                        );
                    }
                }
                _ => {}
            }
        }
    }

    fn wrapper_ident(&self, name: &str) -> String {
        format!("{}{}", self.output.name_mangling.temporary_prefix, name)
    }

    /* ----- Global declarations ----- */

    fn write_global_stmt(&mut self, stmt: &Stmt, prog: &Program) -> Result<()> {
        match &stmt.kind {
            StmtKind::VarDecl(decl_stmt) => {
                for &var in &decl_stmt.decls {
                    if !prog.vars[var].flags.contains(NodeFlags::REACHABLE) {
                        continue;
                    }
                    // entry-point I/O was already declared
                    if prog.vars[var]
                        .flags
                        .intersects(NodeFlags::SHADER_INPUT | NodeFlags::SHADER_OUTPUT)
                    {
                        continue;
                    }
                    let line = self.var_decl_spelling(var, prog, true)?;
                    self.line(line);
                }
                Ok(())
            }
            StmtKind::BufferDecl(ids) => {
                for &id in ids {
                    if prog.buffers[id].flags.contains(NodeFlags::REACHABLE) {
                        self.write_buffer_decl(id, prog);
                    }
                }
                Ok(())
            }
            StmtKind::SamplerDecl(ids) => {
                for &id in ids {
                    if prog.samplers[id].flags.contains(NodeFlags::REACHABLE) {
                        self.write_sampler_decl(id, prog);
                    }
                }
                Ok(())
            }
            StmtKind::Basic(SymbolRef::Struct(id)) => {
                self.write_struct_decl(*id, prog)?;
                Ok(())
            }
            StmtKind::Basic(SymbolRef::UniformBuffer(id)) => {
                self.write_uniform_buffer_decl(*id, prog)?;
                Ok(())
            }
            StmtKind::Basic(SymbolRef::Function(id)) => self.write_function_decl(*id, prog),
            StmtKind::AliasDecl(_) | StmtKind::Null => Ok(()),
            _ => Ok(()),
        }
    }

    fn binding_layout(&mut self, register: Option<crate::ast::Register>) -> Option<u32> {
        if self.output.options.explicit_binding {
            if let Some(register) = register {
                return Some(register.slot);
            }
        }
        if self.output.options.auto_binding {
            let slot = self.next_binding_slot;
            self.next_binding_slot += 1;
            return Some(slot);
        }
        None
    }

    fn write_buffer_decl(&mut self, id: BufferId, prog: &Program) {
        let decl = &prog.buffers[id];
        let generic_base = decl
            .generic
            .as_ref()
            .and_then(|generic| generic.aliased(prog).data_type())
            .and_then(DataType::base)
            .unwrap_or(ScalarType::Float);

        if decl.buffer_type.is_storage_buffer() {
            // structured buffers map to shader storage blocks
            let binding = self.binding_layout(decl.register);
            let layout = match binding {
                Some(slot) => format!("layout(std430, binding = {slot}) "),
                None => "layout(std430) ".to_string(),
            };
            let element_type = match &decl.generic {
                Some(generic) => self.type_spelling(generic, prog).0,
                None => "vec4".to_string(),
            };
            let name = decl.ident.final_name();
            self.line(format!("{layout}buffer {name}_t {{ {element_type} {name}[]; }};"));
            return;
        }

        let Some(object_type) = keywords::buffer_type_glsl_name(decl.buffer_type, generic_base) else {
            return;
        };
        let binding = self.binding_layout(decl.register);
        let layout = match binding {
            Some(slot) => format!("layout(binding = {slot}) "),
            None => String::new(),
        };
        let mut dims = String::new();
        for dim in &decl.array_dims {
            if dim.is_dynamic() {
                dims.push_str("[]");
            } else {
                let _ = write!(dims, "[{}]", dim.size);
            }
        }
        self.line(format!("{layout}uniform {object_type} {}{dims};", decl.ident.final_name()));
    }

    fn write_sampler_decl(&mut self, id: SamplerId, prog: &Program) {
        let decl = &prog.samplers[id];
        let spelling = if decl.sampler_type.is_state() {
            // reaching here implies the Vulkan-style output
            keywords::sampler_type_vksl_name(decl.sampler_type)
        } else {
            "sampler2D"
        };
        let binding = self.binding_layout(decl.register);
        let layout = match binding {
            Some(slot) => format!("layout(binding = {slot}) "),
            None => String::new(),
        };
        self.line(format!("{layout}uniform {spelling} {};", decl.ident.final_name()));
    }

    fn write_struct_decl(&mut self, id: StructId, prog: &Program) -> Result<()> {
        let decl = &prog.structs[id];
        // pure entry-point parameter containers are flattened away
        if !decl.flags.contains(NodeFlags::REACHABLE) || !decl.flags.contains(NodeFlags::NON_ENTRY_POINT_PARAM) {
            return Ok(());
        }

        self.begin_scope(format!("struct {}", decl.ident.final_name()));
        for &member in &decl.members {
            let line = self.var_decl_spelling(member, prog, false)?;
            self.line(line);
        }
        self.end_scope_with(";");
        self.blank();
        Ok(())
    }

    fn write_uniform_buffer_decl(&mut self, id: UniformBufferId, prog: &Program) -> Result<()> {
        let decl = &prog.uniform_buffers[id];
        if !decl.flags.contains(NodeFlags::REACHABLE) {
            return Ok(());
        }

        let binding = self.binding_layout(decl.register);
        let layout = match binding {
            Some(slot) => format!("layout(std140, binding = {slot}) "),
            None => "layout(std140) ".to_string(),
        };
        self.begin_scope(format!("{layout}uniform {}", decl.ident.final_name()));
        for &member in &decl.members {
            let line = self.var_decl_spelling(member, prog, false)?;
            self.line(line);
        }
        self.end_scope_with(";");
        self.blank();
        Ok(())
    }

    fn write_function_decl(&mut self, id: FunctionId, prog: &Program) -> Result<()> {
        let decl = &prog.functions[id];
        if !decl.flags.contains(NodeFlags::REACHABLE) || decl.is_forward_decl() {
            return Ok(());
        }

        if self.output.formatting.line_marks && decl.area.is_valid() {
            self.line(format!("#line {}", decl.area.pos.row));
        }

        let (return_type, _) = self.type_spelling(&decl.return_ty, prog);
        let mut signature = format!("{} {}(", return_type, decl.ident.final_name());
        for (index, &param) in decl.params.iter().enumerate() {
            if index > 0 {
                signature.push_str(", ");
            }
            let param_decl = &prog.vars[param];
            if param_decl.storage.contains(crate::ast::StorageFlags::OUTPUT) {
                signature.push_str(if param_decl.storage.contains(crate::ast::StorageFlags::INPUT) {
                    "inout "
                } else {
                    "out "
                });
            }
            let (type_name, dims) = self.type_spelling(&param_decl.ty, prog);
            let _ = write!(signature, "{} {}{}", type_name, param_decl.ident.final_name(), dims);
        }
        signature.push(')');

        self.begin_scope(signature);
        if let Some(body) = &decl.body {
            for stmt in &body.stmts {
                self.write_stmt(stmt, prog)?;
            }
        }
        self.end_scope();
        self.blank();
        Ok(())
    }

    /* ----- Statements ----- */

    fn write_stmt(&mut self, stmt: &Stmt, prog: &Program) -> Result<()> {
        if self.output.options.preserve_comments {
            if let Some(comment) = &stmt.comment {
                for line in comment.lines() {
                    self.line(format!("// {line}"));
                }
            }
        }

        match &stmt.kind {
            StmtKind::Null => Ok(()),
            StmtKind::Scope(block) => {
                self.begin_scope(String::new());
                for stmt in &block.stmts {
                    self.write_stmt(stmt, prog)?;
                }
                self.end_scope();
                Ok(())
            }
            StmtKind::For {
                init,
                condition,
                iteration,
                body,
            } => {
                let mut header = "for (".to_string();
                match init {
                    Some(init) => match &init.kind {
                        StmtKind::VarDecl(decl_stmt) => {
                            for &var in &decl_stmt.decls {
                                header.push_str(&self.var_decl_spelling(var, prog, false)?);
                            }
                        }
                        StmtKind::Expr(expr) => {
                            header.push_str(&self.expr_spelling(expr, prog)?);
                            header.push(';');
                        }
                        _ => header.push(';'),
                    },
                    None => header.push(';'),
                }
                header.push(' ');
                if let Some(condition) = condition {
                    header.push_str(&self.expr_spelling(condition, prog)?);
                }
                header.push_str("; ");
                if let Some(iteration) = iteration {
                    header.push_str(&self.expr_spelling(iteration, prog)?);
                }
                header.push(')');
                self.write_body(header, body, prog)
            }
            StmtKind::While { condition, body } => {
                let header = format!("while ({})", self.expr_spelling(condition, prog)?);
                self.write_body(header, body, prog)
            }
            StmtKind::DoWhile { body, condition } => {
                self.begin_scope("do".to_string());
                self.write_stmt_unwrapped(body, prog)?;
                let condition = self.expr_spelling(condition, prog)?;
                self.end_scope_with(&format!(" while ({condition});"));
                Ok(())
            }
            StmtKind::If {
                condition,
                body,
                else_body,
            } => {
                let header = format!("if ({})", self.expr_spelling(condition, prog)?);
                self.write_body(header, body, prog)?;
                if let Some(else_body) = else_body {
                    self.write_body("else".to_string(), else_body, prog)?;
                }
                Ok(())
            }
            StmtKind::Switch { selector, cases } => {
                let header = format!("switch ({})", self.expr_spelling(selector, prog)?);
                self.begin_scope(header);
                for case in cases {
                    self.write_switch_case(case, prog)?;
                }
                self.end_scope();
                Ok(())
            }
            StmtKind::Expr(expr) => {
                let spelling = self.expr_spelling(expr, prog)?;
                self.line(format!("{spelling};"));
                Ok(())
            }
            StmtKind::Return(expr) => {
                match expr {
                    Some(expr) => {
                        let spelling = self.expr_spelling(expr, prog)?;
                        self.line(format!("return {spelling};"));
                    }
                    None => self.line("return;".to_string()),
                }
                Ok(())
            }
            StmtKind::CtrlTransfer(transfer) => {
                self.line(format!("{transfer};"));
                Ok(())
            }
            StmtKind::VarDecl(decl_stmt) => {
                for &var in &decl_stmt.decls {
                    let line = self.var_decl_spelling(var, prog, true)?;
                    self.line(line);
                }
                Ok(())
            }
            // local declaration statements of other kinds have been lifted
            // to globals by the converter
            _ => Ok(()),
        }
    }

    /// Writes a control-flow body, honoring the braced-scope option.
    fn write_body(&mut self, header: String, body: &Stmt, prog: &Program) -> Result<()> {
        let braced = self.output.options.always_braced_scopes || matches!(body.kind, StmtKind::Scope(_));
        if braced {
            self.begin_scope(header);
            self.write_stmt_unwrapped(body, prog)?;
            self.end_scope();
        } else {
            self.line(header);
            self.indent_level += 1;
            self.write_stmt(body, prog)?;
            self.indent_level -= 1;
        }
        Ok(())
    }

    /// Writes the statements of a scope body without opening another brace
    /// level.
    fn write_stmt_unwrapped(&mut self, stmt: &Stmt, prog: &Program) -> Result<()> {
        match &stmt.kind {
            StmtKind::Scope(block) => {
                for stmt in &block.stmts {
                    self.write_stmt(stmt, prog)?;
                }
                Ok(())
            }
            _ => self.write_stmt(stmt, prog),
        }
    }

    fn write_switch_case(&mut self, case: &SwitchCase, prog: &Program) -> Result<()> {
        match &case.expr {
            Some(expr) => {
                let spelling = self.expr_spelling(expr, prog)?;
                self.line(format!("case {spelling}:"));
            }
            None => self.line("default:".to_string()),
        }
        self.indent_level += 1;
        for stmt in &case.stmts {
            self.write_stmt(stmt, prog)?;
        }
        self.indent_level -= 1;
        Ok(())
    }

    /* ----- Declarations ----- */

    fn var_decl_spelling(&self, var: VarId, prog: &Program, with_initializer: bool) -> Result<String> {
        let decl = &prog.vars[var];
        let mut line = String::new();

        if decl.storage.contains(crate::ast::StorageFlags::CONST) {
            line.push_str("const ");
        }
        if decl.storage.contains(crate::ast::StorageFlags::GROUPSHARED) {
            line.push_str("shared ");
        }

        let (type_name, dims) = self.type_spelling(&decl.ty, prog);
        let _ = write!(line, "{} {}{}", type_name, decl.ident.final_name(), dims);

        if with_initializer {
            if let Some(init) = &decl.initializer {
                let _ = write!(line, " = {}", self.expr_spelling(init, prog)?);
            }
        }
        line.push(';');
        Ok(line)
    }

    /// GLSL spelling of a type denoter: the leading type name plus the
    /// array-dimension suffix that follows the identifier.
    fn type_spelling(&self, ty: &TypeDenoter, prog: &Program) -> (String, String) {
        match ty {
            TypeDenoter::Void => ("void".to_string(), String::new()),
            TypeDenoter::Null => ("void".to_string(), String::new()),
            TypeDenoter::Base(dt) => (keywords::data_type_glsl_name(*dt), String::new()),
            TypeDenoter::Buffer {
                buffer_type,
                generic,
                decl,
                ..
            } => {
                let generic_base = generic
                    .as_deref()
                    .and_then(|generic| generic.aliased(prog).data_type())
                    .and_then(DataType::base)
                    .unwrap_or(ScalarType::Float);
                let name = keywords::buffer_type_glsl_name(*buffer_type, generic_base)
                    .unwrap_or_else(|| "samplerBuffer".to_string());
                let _ = decl;
                (name, String::new())
            }
            TypeDenoter::Sampler { sampler_type, .. } => {
                (keywords::sampler_type_vksl_name(*sampler_type).to_string(), String::new())
            }
            TypeDenoter::Struct { decl, ident } => {
                let name = match decl {
                    Some(id) => prog.structs[*id].ident.final_name().to_string(),
                    None => ident.to_string(),
                };
                (name, String::new())
            }
            TypeDenoter::Alias { decl, ident } => match decl {
                Some(id) => self.type_spelling(&prog.aliases[*id].ty, prog),
                None => (ident.to_string(), String::new()),
            },
            TypeDenoter::Array { sub, dims } => {
                let (name, _) = self.type_spelling(sub, prog);
                let mut suffix = String::new();
                for dim in dims {
                    if dim.is_dynamic() {
                        suffix.push_str("[]");
                    } else {
                        let _ = write!(suffix, "[{}]", dim.size);
                    }
                }
                (name, suffix)
            }
            TypeDenoter::Function { ident, .. } => (ident.to_string(), String::new()),
        }
    }

    /* ----- Expressions ----- */

    fn expr_spelling(&self, expr: &Expr, prog: &Program) -> Result<String> {
        let mut out = String::new();
        self.append_expr(&mut out, expr, prog)?;
        Ok(out)
    }

    fn append_expr(&self, out: &mut String, expr: &Expr, prog: &Program) -> Result<()> {
        match &expr.kind {
            ExprKind::Null => Ok(()),
            ExprKind::Sequence(exprs) | ExprKind::Initializer(exprs) => {
                let braces = matches!(expr.kind, ExprKind::Initializer(_));
                if braces {
                    out.push_str("{ ");
                }
                for (index, sub) in exprs.iter().enumerate() {
                    if index > 0 {
                        out.push_str(", ");
                    }
                    self.append_expr(out, sub, prog)?;
                }
                if braces {
                    out.push_str(" }");
                }
                Ok(())
            }
            ExprKind::Literal { value, .. } => {
                out.push_str(value);
                Ok(())
            }
            ExprKind::TypeSpecifier(ty) => {
                let (name, _) = self.type_spelling(ty, prog);
                out.push_str(&name);
                Ok(())
            }
            ExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => {
                self.append_expr(out, cond, prog)?;
                out.push_str(" ? ");
                self.append_expr(out, then_expr, prog)?;
                out.push_str(" : ");
                self.append_expr(out, else_expr, prog)
            }
            ExprKind::Binary { lhs, op, rhs } => {
                self.append_expr(out, lhs, prog)?;
                let _ = write!(out, " {op} ");
                self.append_expr(out, rhs, prog)
            }
            ExprKind::Unary { op, expr } => {
                let _ = write!(out, "{op}");
                self.append_expr(out, expr, prog)
            }
            ExprKind::PostUnary { expr, op } => {
                self.append_expr(out, expr, prog)?;
                let _ = write!(out, "{op}");
                Ok(())
            }
            ExprKind::Call(call) => self.append_call_expr(out, expr, call, prog),
            ExprKind::Bracket(inner) => {
                out.push('(');
                self.append_expr(out, inner, prog)?;
                out.push(')');
                Ok(())
            }
            ExprKind::Ident(ident_expr) => {
                if let Some(prefix) = &ident_expr.prefix {
                    self.append_expr(out, prefix, prog)?;
                    out.push('.');
                }
                match ident_expr.symbol {
                    Some(symbol) => out.push_str(&self.symbol_name(symbol, prog)),
                    None => out.push_str(&ident_expr.ident),
                }
                Ok(())
            }
            ExprKind::Assign { lvalue, op, rvalue } => {
                self.append_expr(out, lvalue, prog)?;
                let _ = write!(out, " {op} ");
                self.append_expr(out, rvalue, prog)
            }
            ExprKind::Subscript { prefix, indices } => {
                self.append_expr(out, prefix, prog)?;
                for index in indices {
                    out.push('[');
                    self.append_expr(out, index, prog)?;
                    out.push(']');
                }
                Ok(())
            }
            ExprKind::Cast { target, expr } => {
                let (name, _) = self.type_spelling(target, prog);
                out.push_str(&name);
                out.push('(');
                // struct constructors carry their member values as a sequence
                match &expr.kind {
                    ExprKind::Sequence(exprs) => {
                        for (index, sub) in exprs.iter().enumerate() {
                            if index > 0 {
                                out.push_str(", ");
                            }
                            self.append_expr(out, sub, prog)?;
                        }
                    }
                    _ => self.append_expr(out, expr, prog)?,
                }
                out.push(')');
                Ok(())
            }
        }
    }

    fn append_call_expr(&self, out: &mut String, expr: &Expr, call: &crate::ast::CallExpr, prog: &Program) -> Result<()> {
        let _ = expr;

        // resolve the callee spelling
        let callee: String = if let Some(ctor_ty) = &call.type_ctor {
            self.type_spelling(ctor_ty, prog).0
        } else if let Some(function) = call.function {
            prog.functions[prog.function_impl(function)].ident.final_name().to_string()
        } else if let Some(intrinsic) = call.intrinsic {
            match keywords::intrinsic_glsl_name(intrinsic) {
                Some(name) => name.to_string(),
                // wrapper functions carry the temporary prefix
                None => format!("{}{}", self.output.name_mangling.temporary_prefix, call.ident),
            }
        } else {
            call.ident.to_string()
        };

        out.push_str(&callee);
        out.push('(');

        // a remaining prefix object becomes the first argument
        let mut first = true;
        if let Some(prefix) = &call.prefix {
            self.append_expr(out, prefix, prog)?;
            first = false;
        }
        for arg in &call.args {
            if !first {
                out.push_str(", ");
            }
            self.append_expr(out, arg, prog)?;
            first = false;
        }
        out.push(')');
        Ok(())
    }

    fn symbol_name(&self, symbol: SymbolRef, prog: &Program) -> String {
        match symbol {
            SymbolRef::Var(id) => prog.vars[id].ident.final_name().to_string(),
            SymbolRef::Buffer(id) => prog.buffers[id].ident.final_name().to_string(),
            SymbolRef::Sampler(id) => prog.samplers[id].ident.final_name().to_string(),
            SymbolRef::Struct(id) => prog.structs[id].ident.final_name().to_string(),
            SymbolRef::Alias(id) => prog.aliases[id].ident.final_name().to_string(),
            SymbolRef::Function(id) => prog.functions[id].ident.final_name().to_string(),
            SymbolRef::UniformBuffer(id) => prog.uniform_buffers[id].ident.final_name().to_string(),
        }
    }

    /* ----- Output primitives ----- */

    fn line(&mut self, text: String) {
        for _ in 0..self.indent_level {
            self.out.push_str(&self.output.formatting.indent);
        }
        self.out.push_str(&text);
        self.out.push('\n');
    }

    fn blank(&mut self) {
        if self.output.formatting.blanks {
            self.out.push('\n');
        }
    }

    fn begin_scope(&mut self, header: String) {
        if header.is_empty() {
            self.line("{".to_string());
        } else if self.output.formatting.new_line_open_scope {
            self.line(header);
            self.line("{".to_string());
        } else {
            self.line(format!("{header} {{"));
        }
        self.indent_level += 1;
    }

    fn end_scope(&mut self) {
        self.indent_level -= 1;
        self.line("}".to_string());
    }

    fn end_scope_with(&mut self, suffix: &str) {
        self.indent_level -= 1;
        self.line(format!("}}{suffix}"));
    }
}
