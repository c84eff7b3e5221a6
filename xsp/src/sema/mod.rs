//! Semantic analyses over the converted AST.

pub mod reference;
pub mod struct_params;
pub mod symbols;

pub use reference::ReferenceAnalyzer;
pub use struct_params::StructParameterAnalyzer;
pub use symbols::SymbolTable;
