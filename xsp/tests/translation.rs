//! End-to-end translation scenarios: programs are built through the AST
//! factory, run through the full pass pipeline, and the emitted GLSL is
//! checked for the expected surface forms.

use xsp::ast::{
    factory, BufferDecl, BufferType, CodeBlock, DataType, Expr, ExprKind, FunctionDecl, IndexedSemantic, Intrinsic,
    Program, ScalarType, Semantic, Stmt, StmtKind, StorageFlags, StructDecl, SymbolRef, TypeDenoter, UniformBufferDecl,
    UniformBufferType, VarDecl, VarDeclStmt, VarId,
};
use xsp::{compile_shader, ShaderInput, ShaderOutput, ShaderTarget};

fn float_n(n: u8) -> TypeDenoter {
    TypeDenoter::Base(DataType::Vector(ScalarType::Float, n))
}

fn float_scalar() -> TypeDenoter {
    TypeDenoter::Base(DataType::FLOAT)
}

fn var_decl_stmt(var: VarId) -> Stmt {
    Stmt::new(StmtKind::VarDecl(VarDeclStmt {
        decls: [var].into_iter().collect(),
    }))
}

fn return_stmt(expr: Expr) -> Stmt {
    Stmt::new(StmtKind::Return(Some(expr)))
}

fn expr_stmt(expr: Expr) -> Stmt {
    Stmt::new(StmtKind::Expr(expr))
}

fn push_function(prog: &mut Program, func: FunctionDecl) -> xsp::ast::FunctionId {
    let id = prog.functions.push(func);
    prog.global_stmts.push(Stmt::new(StmtKind::Basic(SymbolRef::Function(id))));
    id
}

fn compile(program: Program, target: ShaderTarget, output: &ShaderOutput) -> String {
    let mut input = ShaderInput::new(program, "main", target);
    input.source_name = "test.hlsl".into();
    match compile_shader(input, output) {
        Ok(result) => result.source,
        Err(reports) => panic!("compilation failed: {reports:#?}"),
    }
}

fn compile_default(program: Program, target: ShaderTarget) -> String {
    compile(program, target, &ShaderOutput::default())
}

/// `float4 main(float3 p : POSITION) : SV_Position { return float4(p, 1); }`
#[test]
fn vertex_passthrough() {
    let mut prog = Program::new();

    let mut p = VarDecl::new("p", float_n(3));
    p.semantic = Some(IndexedSemantic::user_defined("POSITION"));
    let p = prog.vars.push(p);

    let ctor = factory::make_type_ctor_call_expr(
        TypeDenoter::Base(DataType::FLOAT4),
        vec![
            factory::make_var_object_expr(&prog, p),
            factory::make_literal_expr(DataType::INT, "1"),
        ],
    );

    let mut entry = FunctionDecl::new("main", TypeDenoter::Base(DataType::FLOAT4));
    entry.semantic = Some(Semantic::VertexPosition.into());
    entry.params.push(p);
    entry.body = Some(CodeBlock {
        stmts: vec![return_stmt(ctor)],
    });
    let entry = push_function(&mut prog, entry);
    prog.entry_point = Some(entry);

    let glsl = compile_default(prog, ShaderTarget::Vertex);

    assert!(glsl.contains("in vec3 _in_POSITION0;"), "missing input declaration:\n{glsl}");
    assert!(
        glsl.contains("gl_Position = vec4(_in_POSITION0, 1.0);"),
        "missing position assignment:\n{glsl}"
    );
    assert!(glsl.contains("void main()"), "missing main:\n{glsl}");
    // the built-in output needs no declaration
    assert!(!glsl.contains("out vec4 gl_Position"), "built-in must not be declared:\n{glsl}");
}

/// `cbuffer B : register(b0) { float4x4 M; };` with `mul(M, float4(p, 1))`.
#[test]
fn constant_buffer_and_mul() {
    let mut prog = Program::new();

    let mut m = VarDecl::new("M", TypeDenoter::Base(DataType::Matrix(ScalarType::Float, 4, 4)));
    let buffer = prog.uniform_buffers.push(UniformBufferDecl {
        ident: "B".into(),
        buffer_type: UniformBufferType::ConstantBuffer,
        register: Some(xsp::ast::Register {
            class: xsp::ast::RegisterClass::ConstantBuffer,
            slot: 0,
        }),
        members: Vec::new(),
        area: Default::default(),
        flags: Default::default(),
    });
    m.buffer_ref = Some(buffer);
    let m = prog.vars.push(m);
    prog.uniform_buffers[buffer].members.push(m);
    prog.global_stmts
        .push(Stmt::new(StmtKind::Basic(SymbolRef::UniformBuffer(buffer))));

    let p = prog.vars.push(VarDecl::new("p", float_n(3)));

    let ctor = factory::make_type_ctor_call_expr(
        TypeDenoter::Base(DataType::FLOAT4),
        vec![
            factory::make_var_object_expr(&prog, p),
            factory::make_literal_expr(DataType::INT, "1"),
        ],
    );
    let mul = factory::make_intrinsic_call_expr(
        Intrinsic::Mul,
        "mul",
        None,
        vec![factory::make_var_object_expr(&prog, m), ctor],
    );

    let mut entry = FunctionDecl::new("main", TypeDenoter::Base(DataType::FLOAT4));
    entry.semantic = Some(Semantic::VertexPosition.into());
    entry.params.push(p);
    entry.body = Some(CodeBlock {
        stmts: vec![return_stmt(mul)],
    });
    let entry = push_function(&mut prog, entry);
    prog.entry_point = Some(entry);

    let mut output = ShaderOutput::default();
    output.options.explicit_binding = true;

    let glsl = compile(prog, ShaderTarget::Vertex, &output);

    assert!(
        glsl.contains("layout(std140, binding = 0) uniform B {"),
        "missing uniform block:\n{glsl}"
    );
    assert!(glsl.contains("mat4 M;"), "missing block member:\n{glsl}");
    // the `mul` rewrite swaps the argument order
    assert!(
        glsl.contains("gl_Position = (vec4(p, 1.0) * M);"),
        "missing swapped multiplication:\n{glsl}"
    );
}

/// `RWTexture2D<float4> img; img[int2(1, 2)] = float4(0, 0, 0, 1);`
#[test]
fn image_store() {
    let mut prog = Program::new();

    let img = prog.buffers.push(BufferDecl {
        ident: "img".into(),
        buffer_type: BufferType::RwTexture2D,
        generic: Some(TypeDenoter::Base(DataType::FLOAT4)),
        generic_size: 1,
        array_dims: Default::default(),
        register: None,
        area: Default::default(),
        flags: Default::default(),
    });
    prog.global_stmts.push(Stmt::new(StmtKind::BufferDecl(vec![img])));

    let coords = factory::make_type_ctor_call_expr(
        TypeDenoter::Base(DataType::Vector(ScalarType::Int, 2)),
        vec![
            factory::make_literal_expr(DataType::INT, "1"),
            factory::make_literal_expr(DataType::INT, "2"),
        ],
    );
    let texel = factory::make_type_ctor_call_expr(
        TypeDenoter::Base(DataType::FLOAT4),
        vec![
            factory::make_literal_expr(DataType::INT, "0"),
            factory::make_literal_expr(DataType::INT, "0"),
            factory::make_literal_expr(DataType::INT, "0"),
            factory::make_literal_expr(DataType::INT, "1"),
        ],
    );
    let store = factory::make_assign_expr(
        factory::make_array_expr(
            factory::make_object_expr("img", SymbolRef::Buffer(img)),
            vec![coords],
        ),
        texel,
    );

    let mut entry = FunctionDecl::new("main", TypeDenoter::Void);
    entry.body = Some(CodeBlock {
        stmts: vec![expr_stmt(store)],
    });
    let entry = push_function(&mut prog, entry);
    prog.entry_point = Some(entry);

    // image access is core since 4.20; use a version that needs no extension
    let mut output = ShaderOutput::default();
    output.shader_version = xsp::OutputShaderVersion::GLSL430;
    let glsl = compile(prog, ShaderTarget::Compute, &output);

    assert!(
        glsl.contains("imageStore(img, ivec2(1, 2), vec4(0.0, 0.0, 0.0, 1.0));"),
        "missing image store:\n{glsl}"
    );
    assert!(glsl.contains("uniform image2D img;"), "missing image declaration:\n{glsl}");
}

/// `float saturated(float x) { return saturate(x); }`
#[test]
fn saturate_becomes_clamp() {
    let mut prog = Program::new();

    let x = prog.vars.push(VarDecl::new("x", float_scalar()));
    let saturate = factory::make_intrinsic_call_expr(
        Intrinsic::Saturate,
        "saturate",
        None,
        vec![factory::make_var_object_expr(&prog, x)],
    );
    let mut saturated = FunctionDecl::new("saturated", float_scalar());
    saturated.params.push(x);
    saturated.body = Some(CodeBlock {
        stmts: vec![return_stmt(saturate)],
    });
    let saturated = push_function(&mut prog, saturated);

    // main target writes the result so the helper is reachable
    let call = Expr::new(ExprKind::Call(xsp::ast::CallExpr {
        prefix: None,
        ident: "saturated".into(),
        type_ctor: None,
        ret_ty: None,
        intrinsic: None,
        function: Some(saturated),
        args: vec![factory::make_literal_expr(DataType::FLOAT, "0.5")],
    }));

    let mut entry = FunctionDecl::new("main", float_scalar());
    entry.semantic = Some(IndexedSemantic::new(Semantic::Target, 0));
    entry.body = Some(CodeBlock {
        stmts: vec![return_stmt(call)],
    });
    let entry = push_function(&mut prog, entry);
    prog.entry_point = Some(entry);

    let glsl = compile_default(prog, ShaderTarget::Fragment);

    assert!(
        glsl.contains("return clamp(x, 0.0, 1.0);"),
        "missing clamp rewrite:\n{glsl}"
    );
    assert!(glsl.contains("out float _out_SV_Target0;"), "missing target output:\n{glsl}");
}

/// `struct Derived : Base { float extra; };` with `d.baseField + d.extra`.
#[test]
fn base_struct_member_access() {
    let mut prog = Program::new();

    let mut base_field = VarDecl::new("baseField", float_scalar());
    let base_struct = prog.structs.push(StructDecl::new("Base"));
    base_field.struct_ref = Some(base_struct);
    let base_field = prog.vars.push(base_field);
    prog.structs[base_struct].members.push(base_field);
    prog.global_stmts
        .push(Stmt::new(StmtKind::Basic(SymbolRef::Struct(base_struct))));

    let mut extra = VarDecl::new("extra", float_scalar());
    let mut derived_decl = StructDecl::new("Derived");
    derived_decl.base_struct = Some(base_struct);
    let derived = prog.structs.push(derived_decl);
    extra.struct_ref = Some(derived);
    let extra = prog.vars.push(extra);
    prog.structs[derived].members.push(extra);
    prog.global_stmts
        .push(Stmt::new(StmtKind::Basic(SymbolRef::Struct(derived))));

    let d = prog.vars.push(VarDecl::new("d", TypeDenoter::struct_ref("Derived", derived)));

    let sum = factory::make_binary_expr(
        factory::make_prefixed_object_expr(
            factory::make_var_object_expr(&prog, d),
            "baseField",
            Some(SymbolRef::Var(base_field)),
        ),
        xsp::ast::BinaryOp::Add,
        factory::make_prefixed_object_expr(
            factory::make_var_object_expr(&prog, d),
            "extra",
            Some(SymbolRef::Var(extra)),
        ),
    );

    let mut f = FunctionDecl::new("f", float_scalar());
    f.params.push(d);
    f.body = Some(CodeBlock {
        stmts: vec![return_stmt(sum)],
    });
    let f = push_function(&mut prog, f);

    let call = Expr::new(ExprKind::Call(xsp::ast::CallExpr {
        prefix: None,
        ident: "f".into(),
        type_ctor: None,
        ret_ty: None,
        intrinsic: None,
        function: Some(f),
        args: vec![{
            let local = prog.vars.push(VarDecl::new("d0", TypeDenoter::struct_ref("Derived", derived)));
            factory::make_var_object_expr(&prog, local)
        }],
    }));

    let mut entry = FunctionDecl::new("main", float_scalar());
    entry.semantic = Some(IndexedSemantic::new(Semantic::Target, 0));
    entry.body = Some(CodeBlock {
        stmts: vec![return_stmt(call)],
    });
    let entry = push_function(&mut prog, entry);
    prog.entry_point = Some(entry);

    let glsl = compile_default(prog, ShaderTarget::Fragment);

    assert!(glsl.contains("struct Derived {"), "missing struct declaration:\n{glsl}");
    assert!(glsl.contains("Base xsn_base;"), "missing synthesized base member:\n{glsl}");
    assert!(
        glsl.contains("d.xsn_base.baseField + d.extra"),
        "missing rewritten base access:\n{glsl}"
    );
}

/// `half3 c = half3(0.5h, 1.0h, 0.0h);` lowers to float literals.
#[test]
fn half_literals_become_float() {
    let mut prog = Program::new();

    let half3 = TypeDenoter::Base(DataType::Vector(ScalarType::Half, 3));
    let ctor = factory::make_type_ctor_call_expr(
        half3.clone(),
        vec![
            factory::make_literal_expr(DataType::HALF, "0.5h"),
            factory::make_literal_expr(DataType::HALF, "1.0h"),
            factory::make_literal_expr(DataType::HALF, "0.0h"),
        ],
    );
    let mut c = VarDecl::new("c", half3);
    c.initializer = Some(ctor);
    let c = prog.vars.push(c);

    let mut entry = FunctionDecl::new("main", float_n(3));
    entry.semantic = Some(IndexedSemantic::new(Semantic::Target, 0));
    entry.body = Some(CodeBlock {
        stmts: vec![var_decl_stmt(c), return_stmt(factory::make_var_object_expr(&prog, c))],
    });
    let entry = push_function(&mut prog, entry);
    prog.entry_point = Some(entry);

    let glsl = compile_default(prog, ShaderTarget::Fragment);

    assert!(
        glsl.contains("vec3 c = vec3(0.5f, 1.0f, 0.0f);"),
        "missing converted literals:\n{glsl}"
    );
}

/// `log10(x)` with a `float3` argument becomes `(log(x) / log(10.0))`.
#[test]
fn log10_lowering() {
    let mut prog = Program::new();

    let x = prog.vars.push(VarDecl::new("x", float_n(3)));
    let log10 = factory::make_intrinsic_call_expr(
        Intrinsic::Log10,
        "log10",
        None,
        vec![factory::make_var_object_expr(&prog, x)],
    );

    let mut entry = FunctionDecl::new("main", float_n(3));
    entry.semantic = Some(IndexedSemantic::new(Semantic::Target, 0));
    entry.params.push(x);
    prog.vars[x].semantic = Some(IndexedSemantic::user_defined("TEXCOORD"));
    entry.body = Some(CodeBlock {
        stmts: vec![return_stmt(log10)],
    });
    let entry = push_function(&mut prog, entry);
    prog.entry_point = Some(entry);

    let glsl = compile_default(prog, ShaderTarget::Fragment);

    assert!(
        glsl.contains("(log(_in_TEXCOORD0) / log(10.0))"),
        "missing log10 lowering:\n{glsl}"
    );
}

/// A matrix subscript generates a wrapper function and a call to it.
#[test]
fn matrix_subscript_wrapper() {
    let mut prog = Program::new();

    let mut m = VarDecl::new("m", TypeDenoter::Base(DataType::Matrix(ScalarType::Float, 4, 4)));
    m.storage.insert(StorageFlags::UNIFORM);
    let m = prog.vars.push(m);
    prog.global_stmts.push(var_decl_stmt(m));

    let subscript = factory::make_prefixed_object_expr(factory::make_var_object_expr(&prog, m), "_m12_m21", None);
    let swizzled = factory::make_prefixed_object_expr(subscript, "x", None);

    let mut entry = FunctionDecl::new("main", float_scalar());
    entry.semantic = Some(IndexedSemantic::new(Semantic::Target, 0));
    entry.body = Some(CodeBlock {
        stmts: vec![return_stmt(swizzled)],
    });
    let entry = push_function(&mut prog, entry);
    prog.entry_point = Some(entry);

    let glsl = compile_default(prog, ShaderTarget::Fragment);

    assert!(
        glsl.contains("vec2 xst_subscript_12_21(mat4 m) { return vec2(m[1][2], m[2][1]); }"),
        "missing wrapper function:\n{glsl}"
    );
    assert!(
        glsl.contains("xst_subscript_12_21(m)"),
        "missing wrapper call:\n{glsl}"
    );
}

/// An empty struct gains a dummy member.
#[test]
fn empty_struct_dummy_member() {
    let mut prog = Program::new();

    let empty = prog.structs.push(StructDecl::new("S"));
    prog.global_stmts.push(Stmt::new(StmtKind::Basic(SymbolRef::Struct(empty))));

    let s = prog.vars.push(VarDecl::new("s", TypeDenoter::struct_ref("S", empty)));

    let mut helper = FunctionDecl::new("use_struct", float_scalar());
    helper.body = Some(CodeBlock {
        stmts: vec![
            var_decl_stmt(s),
            return_stmt(factory::make_literal_expr(DataType::FLOAT, "0.0")),
        ],
    });
    let helper = push_function(&mut prog, helper);

    let call = Expr::new(ExprKind::Call(xsp::ast::CallExpr {
        prefix: None,
        ident: "use_struct".into(),
        type_ctor: None,
        ret_ty: None,
        intrinsic: None,
        function: Some(helper),
        args: Vec::new(),
    }));

    let mut entry = FunctionDecl::new("main", float_scalar());
    entry.semantic = Some(IndexedSemantic::new(Semantic::Target, 0));
    entry.body = Some(CodeBlock {
        stmts: vec![return_stmt(call)],
    });
    let entry = push_function(&mut prog, entry);
    prog.entry_point = Some(entry);

    let glsl = compile_default(prog, ShaderTarget::Fragment);

    assert!(glsl.contains("struct S {"), "missing struct:\n{glsl}");
    assert!(glsl.contains("int xsp_dummy;"), "missing dummy member:\n{glsl}");
}

/// `void f() { f(); }` produces a recursion diagnostic.
#[test]
fn recursive_call_is_rejected() {
    let mut prog = Program::new();

    let mut f = FunctionDecl::new("f", TypeDenoter::Void);
    f.body = Some(CodeBlock::default());
    let f_id = prog.functions.push(f);

    // the body calls the function itself
    let call = Expr::new(ExprKind::Call(xsp::ast::CallExpr {
        prefix: None,
        ident: "f".into(),
        type_ctor: None,
        ret_ty: None,
        intrinsic: None,
        function: Some(f_id),
        args: Vec::new(),
    }));
    prog.functions[f_id].body = Some(CodeBlock {
        stmts: vec![expr_stmt(call)],
    });
    prog.global_stmts.push(Stmt::new(StmtKind::Basic(SymbolRef::Function(f_id))));

    let entry_call = Expr::new(ExprKind::Call(xsp::ast::CallExpr {
        prefix: None,
        ident: "f".into(),
        type_ctor: None,
        ret_ty: None,
        intrinsic: None,
        function: Some(f_id),
        args: Vec::new(),
    }));
    let mut entry = FunctionDecl::new("main", TypeDenoter::Void);
    entry.body = Some(CodeBlock {
        stmts: vec![expr_stmt(entry_call)],
    });
    let entry = push_function(&mut prog, entry);
    prog.entry_point = Some(entry);

    let input = ShaderInput::new(prog, "main", ShaderTarget::Vertex);
    let reports = compile_shader(input, &ShaderOutput::default()).expect_err("recursion must be rejected");
    let message = format!("{reports:?}");
    assert!(message.contains("recursive call"), "unexpected reports: {message}");
}

/// Loose uniforms are packed into the generated constant buffer.
#[test]
fn loose_uniforms_are_packed() {
    let mut prog = Program::new();

    let mut gain = VarDecl::new("gain", float_scalar());
    gain.storage.insert(StorageFlags::UNIFORM);
    let gain = prog.vars.push(gain);
    prog.global_stmts.push(var_decl_stmt(gain));

    let mut entry = FunctionDecl::new("main", float_scalar());
    entry.semantic = Some(IndexedSemantic::new(Semantic::Target, 0));
    entry.body = Some(CodeBlock {
        stmts: vec![return_stmt(factory::make_var_object_expr(&prog, gain))],
    });
    let entry = push_function(&mut prog, entry);
    prog.entry_point = Some(entry);

    let glsl = compile_default(prog, ShaderTarget::Fragment);

    assert!(
        glsl.contains("uniform xsp_cbuffer {"),
        "missing generated uniform block:\n{glsl}"
    );
    assert!(glsl.contains("float gain;"), "missing packed member:\n{glsl}");
}

/// Reserved GLSL words on declarations pick up the reserved-word prefix.
#[test]
fn reserved_word_renaming() {
    let mut prog = Program::new();

    let input_var = prog.vars.push(VarDecl::new("filter", float_scalar()));

    let mut entry = FunctionDecl::new("main", float_scalar());
    entry.semantic = Some(IndexedSemantic::new(Semantic::Target, 0));
    entry.body = Some(CodeBlock {
        stmts: vec![
            var_decl_stmt(input_var),
            return_stmt(factory::make_var_object_expr(&prog, input_var)),
        ],
    });
    let entry = push_function(&mut prog, entry);
    prog.entry_point = Some(entry);

    let glsl = compile_default(prog, ShaderTarget::Fragment);

    assert!(glsl.contains("float xsr_filter;"), "missing renamed declaration:\n{glsl}");
    assert!(glsl.contains("return xsr_filter;"), "missing renamed use:\n{glsl}");
}

/// Statements flagged as dead code are dropped from the output.
#[test]
fn dead_code_is_elided() {
    let mut prog = Program::new();

    let mut dead = expr_stmt(factory::make_literal_expr(DataType::INT, "1"));
    dead.flags.insert(xsp::ast::NodeFlags::DEAD_CODE);

    let mut entry = FunctionDecl::new("main", float_scalar());
    entry.semantic = Some(IndexedSemantic::new(Semantic::Target, 0));
    entry.body = Some(CodeBlock {
        stmts: vec![
            return_stmt(factory::make_literal_expr(DataType::FLOAT, "1.0")),
            dead,
        ],
    });
    let entry = push_function(&mut prog, entry);
    prog.entry_point = Some(entry);

    let glsl = compile_default(prog, ShaderTarget::Fragment);

    assert!(!glsl.contains("1;"), "dead statement must not be emitted:\n{glsl}");
}
