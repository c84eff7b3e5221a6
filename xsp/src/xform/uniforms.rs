//! Loose-uniform packing.
//!
//! GLSL has no direct analogue of free `uniform` globals with HLSL
//! constant-register semantics; they are collected into a single generated
//! uniform buffer. The buffer is created at the first conversion site and
//! reused afterwards. Uniform entry-point parameters are packed the same
//! way. Packed variables lose their `uniform` qualifier and their default
//! initializer (uniform blocks cannot carry initializers).

use crate::ast::{
    factory, NodeFlags, Program, Stmt, StmtKind, StorageFlags, SymbolRef, TypeDenoter, UniformBufferId, VarId,
};
use crate::diag::Result;
use smol_str::SmolStr;
use tracing::debug;

/// Attributes of the generated constant buffer.
#[derive(Clone, Debug)]
pub struct CbufferAttributes {
    pub name: SmolStr,
    pub binding_slot: u32,
}

impl Default for CbufferAttributes {
    fn default() -> CbufferAttributes {
        CbufferAttributes {
            name: "xsp_cbuffer".into(),
            binding_slot: 0,
        }
    }
}

pub struct UniformPacker;

impl UniformPacker {
    pub fn convert(prog: &mut Program, attribs: &CbufferAttributes, only_reachable_stmts: bool) -> Result<()> {
        if attribs.name.is_empty() {
            return Ok(());
        }
        debug!(target: "xsp", name = %attribs.name, "uniform packing");

        let mut buffer: Option<UniformBufferId> = None;

        // global statements first
        let mut globals = std::mem::take(&mut prog.global_stmts);
        let mut converted = Vec::with_capacity(globals.len());

        for stmt in globals.drain(..) {
            match stmt_packable_vars(&stmt, prog, only_reachable_stmts) {
                Some(vars) => {
                    let reachable = vars.iter().any(|&id| prog.vars[id].flags.contains(NodeFlags::REACHABLE));
                    let buffer_id = Self::ensure_buffer(prog, attribs, &mut buffer, &mut converted);
                    for var in vars {
                        Self::append_uniform(prog, buffer_id, var);
                    }
                    if reachable {
                        prog.uniform_buffers[buffer_id].flags.insert(NodeFlags::REACHABLE);
                    }
                }
                None => converted.push(stmt),
            }
        }
        prog.global_stmts = converted;

        // uniform parameters of the entry point
        if let Some(entry) = prog.entry_point {
            let params = prog.functions[entry].params.clone();
            let mut kept = Vec::with_capacity(params.len());
            for param in params {
                if prog.vars[param].is_uniform() && can_pack_type(&prog.vars[param].ty, prog) {
                    let buffer_id = Self::ensure_buffer_front(prog, attribs, &mut buffer);
                    Self::append_uniform(prog, buffer_id, param);
                    prog.uniform_buffers[buffer_id].flags.insert(NodeFlags::REACHABLE);
                } else {
                    kept.push(param);
                }
            }
            prog.functions[entry].params = kept;
        }

        Ok(())
    }

    /// Creates the buffer at the current conversion site on first use.
    fn ensure_buffer(
        prog: &mut Program,
        attribs: &CbufferAttributes,
        buffer: &mut Option<UniformBufferId>,
        converted: &mut Vec<Stmt>,
    ) -> UniformBufferId {
        *buffer.get_or_insert_with(|| {
            let id = prog
                .uniform_buffers
                .push(factory::make_uniform_buffer_decl(attribs.name.as_str(), attribs.binding_slot));
            converted.push(Stmt::new(StmtKind::Basic(SymbolRef::UniformBuffer(id))));
            id
        })
    }

    /// Same, but the declaration statement goes to the front of the global
    /// list (used when the first packed uniform is an entry-point parameter).
    fn ensure_buffer_front(
        prog: &mut Program,
        attribs: &CbufferAttributes,
        buffer: &mut Option<UniformBufferId>,
    ) -> UniformBufferId {
        *buffer.get_or_insert_with(|| {
            let id = prog
                .uniform_buffers
                .push(factory::make_uniform_buffer_decl(attribs.name.as_str(), attribs.binding_slot));
            prog.global_stmts
                .insert(0, Stmt::new(StmtKind::Basic(SymbolRef::UniformBuffer(id))));
            id
        })
    }

    fn append_uniform(prog: &mut Program, buffer: UniformBufferId, var: VarId) {
        prog.uniform_buffers[buffer].members.push(var);
        let decl = &mut prog.vars[var];
        decl.buffer_ref = Some(buffer);
        decl.storage.remove(StorageFlags::UNIFORM | StorageFlags::INPUT | StorageFlags::OUTPUT);
        decl.initializer = None;
    }
}

/// The variables of a global statement that are packable uniforms, or
/// `None` if the statement stays untouched.
fn stmt_packable_vars(stmt: &Stmt, prog: &Program, only_reachable: bool) -> Option<Vec<VarId>> {
    let StmtKind::VarDecl(decl_stmt) = &stmt.kind else {
        return None;
    };
    let vars: Vec<VarId> = decl_stmt.decls.iter().copied().collect();
    let packable = vars.iter().all(|&id| {
        let decl = &prog.vars[id];
        decl.is_uniform() && can_pack_type(&decl.ty, prog)
    });
    if !packable || vars.is_empty() {
        return None;
    }
    if only_reachable && !vars.iter().any(|&id| prog.vars[id].flags.contains(NodeFlags::REACHABLE)) {
        return None;
    }
    Some(vars)
}

/// Samplers and buffers keep their own binding model and stay out of the
/// generated block.
fn can_pack_type(ty: &TypeDenoter, prog: &Program) -> bool {
    let aliased = ty.aliased(prog);
    !(aliased.is_sampler() || aliased.is_buffer())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{DataType, SamplerType, VarDecl, VarDeclStmt};
    use smallvec::smallvec;

    fn make_uniform(prog: &mut Program, name: &str, ty: TypeDenoter) -> VarId {
        let mut decl = VarDecl::new(name, ty);
        decl.storage.insert(StorageFlags::UNIFORM);
        decl.initializer = Some(factory::make_literal_expr(DataType::FLOAT, "1.0"));
        prog.vars.push(decl)
    }

    #[test]
    fn packs_loose_uniforms_into_one_buffer() {
        let mut prog = Program::new();
        let a = make_uniform(&mut prog, "gain", TypeDenoter::Base(DataType::FLOAT));
        let b = make_uniform(&mut prog, "bias", TypeDenoter::Base(DataType::FLOAT));
        let sampler = {
            let mut decl = VarDecl::new("smp", TypeDenoter::sampler(SamplerType::SamplerState));
            decl.storage.insert(StorageFlags::UNIFORM);
            prog.vars.push(decl)
        };

        for id in [a, sampler, b] {
            prog.global_stmts.push(Stmt::new(StmtKind::VarDecl(VarDeclStmt {
                decls: smallvec![id],
            })));
        }

        UniformPacker::convert(&mut prog, &CbufferAttributes::default(), false).unwrap();

        assert_eq!(prog.uniform_buffers.len(), 1);
        let (buffer_id, buffer) = prog.uniform_buffers.iter().next().unwrap();
        assert_eq!(buffer.ident.original(), "xsp_cbuffer");
        assert_eq!(buffer.members, vec![a, b]);

        // qualifier and initializer are gone, back-reference installed
        assert!(!prog.vars[a].is_uniform());
        assert!(prog.vars[a].initializer.is_none());
        assert_eq!(prog.vars[a].buffer_ref, Some(buffer_id));

        // the sampler statement survives, plus the buffer declaration
        assert_eq!(prog.global_stmts.len(), 2);
        assert!(matches!(
            prog.global_stmts[0].kind,
            StmtKind::Basic(SymbolRef::UniformBuffer(_))
        ));
    }
}
