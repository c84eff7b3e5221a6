//! Scoped identifier registry.
//!
//! The GLSL converter only needs collision checks against previously
//! registered names (HLSL and GLSL scope rules differ), so scopes map plain
//! identifier strings and carry no payload.

use indexmap::IndexSet;
use smol_str::SmolStr;

#[derive(Debug, Default)]
pub struct SymbolTable {
    scopes: Vec<IndexSet<SmolStr>>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable {
            scopes: vec![IndexSet::new()],
        }
    }

    pub fn open_scope(&mut self) {
        self.scopes.push(IndexSet::new());
    }

    pub fn close_scope(&mut self) {
        assert!(self.scopes.len() > 1, "symbol table scope underflow");
        self.scopes.pop();
    }

    /// Registers an identifier in the current scope.
    pub fn register(&mut self, ident: impl Into<SmolStr>) {
        self.scopes
            .last_mut()
            .expect("symbol table has no open scope")
            .insert(ident.into());
    }

    /// True if the identifier is registered in any open scope.
    pub fn fetch(&self, ident: &str) -> bool {
        self.scopes.iter().rev().any(|scope| scope.contains(ident))
    }

    /// True if the identifier is registered in the current scope.
    pub fn fetch_from_current_scope(&self, ident: &str) -> bool {
        self.scopes
            .last()
            .map_or(false, |scope| scope.contains(ident))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoping_rules() {
        let mut table = SymbolTable::new();
        table.register("a");
        table.open_scope();
        table.register("b");

        assert!(table.fetch("a"));
        assert!(table.fetch("b"));
        assert!(table.fetch_from_current_scope("b"));
        assert!(!table.fetch_from_current_scope("a"));

        table.close_scope();
        assert!(!table.fetch("b"));
        assert!(table.fetch("a"));
    }

    #[test]
    #[should_panic(expected = "scope underflow")]
    fn close_without_open_panics() {
        let mut table = SymbolTable::new();
        table.close_scope();
    }
}
