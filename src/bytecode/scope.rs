//! Compile-time symbol and function bookkeeping.
//!
//! Parameters are addressed by position through `LoadArg`. Locals are
//! addressed by the stack depth at which they were pushed, so reading one is
//! a `Dup` whose depth is the distance from the current top.

use std::collections::HashMap;

use crate::error::CompileError;
use crate::span::Span;
use crate::types::Type;

/// Maximum number of symbols visible in one function.
pub const MAX_SYMBOLS: usize = 1024;
/// Maximum number of functions in a program.
pub const MAX_FUNCTIONS: usize = 1024;
/// Maximum number of parameters of one function.
pub const MAX_PARAMS: usize = 255;

type ScopeResult<T> = Result<T, CompileError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    Parameter,
    Local,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub ty: Type,
    pub storage: StorageClass,
    /// Parameter index, or the stack depth the local occupies.
    pub slot: u32,
}

/// The symbols visible in the function being compiled, innermost last.
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything; called when a new function body starts.
    pub fn reset(&mut self) {
        self.symbols.clear();
    }

    pub fn declare_param(&mut self, name: &str, ty: Type, span: Span) -> ScopeResult<u32> {
        let slot = self
            .symbols
            .iter()
            .filter(|s| s.storage == StorageClass::Parameter)
            .count() as u32;
        self.declare(name, ty, StorageClass::Parameter, slot, span)?;
        Ok(slot)
    }

    /// Bind `name` to the value sitting at stack depth `slot`.
    pub fn declare_local(&mut self, name: &str, ty: Type, slot: u32, span: Span) -> ScopeResult<()> {
        self.declare(name, ty, StorageClass::Local, slot, span)
    }

    fn declare(
        &mut self,
        name: &str,
        ty: Type,
        storage: StorageClass,
        slot: u32,
        span: Span,
    ) -> ScopeResult<()> {
        if self.resolve(name).is_some() {
            return Err(CompileError::DuplicateDeclaration {
                name: name.to_string(),
                span,
            });
        }
        if self.symbols.len() >= MAX_SYMBOLS {
            return Err(CompileError::DeclarationLimit {
                what: "symbols",
                limit: MAX_SYMBOLS,
                span,
            });
        }

        self.symbols.push(Symbol {
            name: name.to_string(),
            ty,
            storage,
            slot,
        });
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Option<&Symbol> {
        self.symbols.iter().rev().find(|s| s.name == name)
    }

    /// Snapshot to restore with [`SymbolTable::truncate`].
    pub fn mark(&self) -> usize {
        self.symbols.len()
    }

    pub fn truncate(&mut self, mark: usize) {
        self.symbols.truncate(mark);
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionEntry {
    pub name: String,
    pub params: Vec<Type>,
    pub return_type: Type,
    pub address: u32,
}

/// Functions in registration order. Lookups only see functions registered
/// so far, so a call can never reach forward in the source.
#[derive(Debug, Default)]
pub struct FunctionTable {
    entries: Vec<FunctionEntry>,
    by_name: HashMap<String, usize>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, entry: FunctionEntry, span: Span) -> ScopeResult<()> {
        if self.by_name.contains_key(&entry.name) {
            return Err(CompileError::DuplicateDeclaration {
                name: entry.name,
                span,
            });
        }
        if self.entries.len() >= MAX_FUNCTIONS {
            return Err(CompileError::DeclarationLimit {
                what: "functions",
                limit: MAX_FUNCTIONS,
                span,
            });
        }
        if entry.params.len() > MAX_PARAMS {
            return Err(CompileError::DeclarationLimit {
                what: "parameters",
                limit: MAX_PARAMS,
                span,
            });
        }

        self.by_name.insert(entry.name.clone(), self.entries.len());
        self.entries.push(entry);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&FunctionEntry> {
        self.by_name.get(name).map(|&i| &self.entries[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &FunctionEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span() -> Span {
        Span::default()
    }

    #[test]
    fn test_params_get_positional_slots() {
        let mut table = SymbolTable::new();
        assert_eq!(table.declare_param("a", Type::Int, span()), Ok(0));
        assert_eq!(table.declare_param("b", Type::Double, span()), Ok(1));
        table.declare_local("x", Type::Int, 5, span()).unwrap();
        assert_eq!(table.declare_param("c", Type::Int, span()), Ok(2));

        let b = table.resolve("b").unwrap();
        assert_eq!(b.storage, StorageClass::Parameter);
        assert_eq!(b.ty, Type::Double);
        assert_eq!(table.resolve("x").unwrap().slot, 5);
    }

    #[test]
    fn test_duplicate_is_rejected() {
        let mut table = SymbolTable::new();
        table.declare_param("a", Type::Int, span()).unwrap();
        let err = table.declare_local("a", Type::Int, 4, span()).unwrap_err();
        assert!(matches!(err, CompileError::DuplicateDeclaration { ref name, .. } if name == "a"));
    }

    #[test]
    fn test_truncate_restores_snapshot() {
        let mut table = SymbolTable::new();
        table.declare_local("x", Type::Int, 0, span()).unwrap();
        let mark = table.mark();
        table.declare_local("y", Type::Int, 1, span()).unwrap();
        assert_eq!(table.len(), 2);

        table.truncate(mark);
        assert!(table.resolve("y").is_none());
        assert!(table.resolve("x").is_some());
        table.declare_local("y", Type::Double, 1, span()).unwrap();
    }

    #[test]
    fn test_symbol_limit() {
        let mut table = SymbolTable::new();
        for i in 0..MAX_SYMBOLS {
            table
                .declare_local(&format!("v{}", i), Type::Int, i as u32, span())
                .unwrap();
        }
        let err = table
            .declare_local("overflow", Type::Int, 0, span())
            .unwrap_err();
        assert!(matches!(err, CompileError::DeclarationLimit { limit: MAX_SYMBOLS, .. }));
    }

    #[test]
    fn test_function_table_registration_order() {
        let mut functions = FunctionTable::new();
        let entry = FunctionEntry {
            name: "add".to_string(),
            params: vec![Type::Int, Type::Int],
            return_type: Type::Int,
            address: 0,
        };
        functions.register(entry.clone(), span()).unwrap();

        assert_eq!(functions.lookup("add"), Some(&entry));
        assert!(functions.lookup("sub").is_none());
        assert!(matches!(
            functions.register(entry, span()),
            Err(CompileError::DuplicateDeclaration { .. })
        ));
    }

    #[test]
    fn test_parameter_limit() {
        let mut functions = FunctionTable::new();
        let err = functions
            .register(
                FunctionEntry {
                    name: "wide".to_string(),
                    params: vec![Type::Int; MAX_PARAMS + 1],
                    return_type: Type::Void,
                    address: 0,
                },
                span(),
            )
            .unwrap_err();
        assert!(matches!(err, CompileError::DeclarationLimit { what: "parameters", .. }));
    }
}
