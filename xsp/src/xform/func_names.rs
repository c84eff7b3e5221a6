//! Function-name lowering.
//!
//! Member functions become free functions named
//! `<namespacePrefix><Struct>_<func>`; afterwards all functions are bucketed
//! by final identifier and equal signatures within a bucket are suffixed
//! `_0`, `_1`, ... so the output has no overload ambiguity the target
//! language cannot express.

use crate::ast::{ty::TypeCompare, FunctionId, Program};
use crate::diag::Result;
use crate::NameMangling;
use indexmap::IndexMap;
use smol_str::SmolStr;
use tracing::debug;

bitflags::bitflags! {
    pub struct FuncNameFlags: u32 {
        const RENAME_MEMBER_FUNCTIONS = 1 << 0;
        const RENAME_FUNCTION_SIGNATURES = 1 << 1;
        const ALL = Self::RENAME_MEMBER_FUNCTIONS.bits | Self::RENAME_FUNCTION_SIGNATURES.bits;
    }
}

pub struct FuncNameConverter;

impl FuncNameConverter {
    /// `compare` decides signature equality; the GLSL instantiation ignores
    /// generic sub types on buffers.
    pub fn convert<F>(
        prog: &mut Program,
        name_mangling: &NameMangling,
        compare: F,
        flags: FuncNameFlags,
    ) -> Result<()>
    where
        F: Fn(&Program, FunctionId, FunctionId) -> bool,
    {
        debug!(target: "xsp", "function name conversion");

        let mut buckets: IndexMap<SmolStr, Vec<FunctionId>> = IndexMap::new();

        for id in prog.functions.ids() {
            if flags.contains(FuncNameFlags::RENAME_MEMBER_FUNCTIONS) {
                if let Some(struct_id) = prog.functions[id].struct_ref {
                    let struct_name = prog.structs[struct_id].ident.original().clone();
                    let func_name = prog.functions[id].ident.original().clone();
                    let ident = &mut prog.functions[id].ident;
                    ident.remove_prefix(&name_mangling.namespace_prefix);
                    ident.rename_to(format!("{struct_name}_{func_name}"));
                    ident.append_prefix(&name_mangling.namespace_prefix);
                }
            }

            if flags.contains(FuncNameFlags::RENAME_FUNCTION_SIGNATURES) && !prog.functions[id].is_forward_decl() {
                buckets
                    .entry(prog.functions[id].ident.final_name())
                    .or_default()
                    .push(id);
            }
        }

        // pairwise comparison within each bucket; equal signatures get an
        // index suffix unique to the bucket
        for (_, bucket) in buckets {
            let mut slots: Vec<Option<FunctionId>> = bucket.into_iter().map(Some).collect();
            let mut name_index = 0u32;

            for i in 0..slots.len() {
                let Some(lhs) = slots[i] else { continue };
                for j in (i + 1)..slots.len() {
                    let Some(rhs) = slots[j] else { continue };
                    if compare(prog, lhs, rhs) {
                        if name_index == 0 {
                            rename_with_index(prog, lhs, name_mangling, &mut name_index);
                        }
                        rename_with_index(prog, rhs, name_mangling, &mut name_index);
                        slots[j] = None;
                    }
                }
            }
        }

        Ok(())
    }

    /// Signature equality: same parameter count and pairwise equal
    /// parameter types under the given comparison flags.
    pub fn equal_signatures(prog: &Program, lhs: FunctionId, rhs: FunctionId, compare: TypeCompare) -> bool {
        let lhs_params = &prog.functions[lhs].params;
        let rhs_params = &prog.functions[rhs].params;
        if lhs_params.len() != rhs_params.len() {
            return false;
        }
        lhs_params.iter().zip(rhs_params).all(|(&a, &b)| {
            prog.vars[a].ty.equals(&prog.vars[b].ty, prog, compare)
        })
    }
}

fn rename_with_index(prog: &mut Program, id: FunctionId, name_mangling: &NameMangling, name_index: &mut u32) {
    let ident = &mut prog.functions[id].ident;
    let renamed = format!("{}_{}", ident.original(), name_index);
    ident.rename_to(renamed);
    ident.append_prefix(&name_mangling.namespace_prefix);
    *name_index += 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{DataType, FunctionDecl, StructDecl, TypeDenoter, VarDecl};

    #[test]
    fn member_functions_become_free_functions() {
        let mut prog = Program::new();
        let struct_id = prog.structs.push(StructDecl::new("Light"));
        let mut func = FunctionDecl::new("intensity", TypeDenoter::Base(DataType::FLOAT));
        func.struct_ref = Some(struct_id);
        let func_id = prog.functions.push(func);
        prog.structs[struct_id].member_fns.push(func_id);

        FuncNameConverter::convert(
            &mut prog,
            &NameMangling::default(),
            |_, _, _| false,
            FuncNameFlags::ALL,
        )
        .unwrap();

        assert_eq!(prog.functions[func_id].ident.final_name(), "xsn_Light_intensity");
    }

    #[test]
    fn equal_signatures_are_disambiguated() {
        let mut prog = Program::new();

        // two overloads that collapse to the same GLSL signature
        // (StructuredBuffer<float> vs StructuredBuffer<int> parameters)
        for generic in [DataType::FLOAT, DataType::INT] {
            let param = prog.vars.push(VarDecl::new(
                "buf",
                TypeDenoter::buffer(crate::ast::BufferType::StructuredBuffer, Some(TypeDenoter::Base(generic))),
            ));
            let mut func = FunctionDecl::new("load", TypeDenoter::Base(DataType::FLOAT));
            func.params.push(param);
            func.body = Some(Default::default());
            prog.functions.push(func);
        }

        FuncNameConverter::convert(
            &mut prog,
            &NameMangling::default(),
            |prog, lhs, rhs| {
                FuncNameConverter::equal_signatures(prog, lhs, rhs, TypeCompare::IGNORE_GENERIC_SUB_TYPE)
            },
            FuncNameFlags::ALL,
        )
        .unwrap();

        let names: Vec<_> = prog.functions.iter().map(|(_, f)| f.ident.final_name()).collect();
        assert_eq!(names, vec!["xsn_load_0", "xsn_load_1"]);
    }
}
