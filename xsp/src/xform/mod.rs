//! Language-neutral transformation passes.

pub mod exprs;
pub mod func_names;
pub mod optimizer;
pub mod types;
pub mod uniforms;

pub use exprs::{ConvertFlags, ExprConverter};
pub use func_names::{FuncNameConverter, FuncNameFlags};
pub use optimizer::Optimizer;
pub use types::TypeConverter;
pub use uniforms::{CbufferAttributes, UniformPacker};
