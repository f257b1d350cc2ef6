use std::collections::HashMap;

use crate::parser::ast::VarId;

use super::types::Type;

/// Signature of a function declared in the program being compiled.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncSig {
    pub params: Vec<Type>,
}

/// Lexical name environment for one function plus the program's signatures.
#[derive(Debug)]
pub struct TypeEnv {
    scopes: Vec<HashMap<String, VarId>>,
    pub functions: HashMap<String, FuncSig>,
}

impl Default for TypeEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeEnv {
    pub fn new() -> Self {
        Self { scopes: vec![HashMap::new()], functions: HashMap::new() }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop_scope(&mut self) {
        // The outermost scope is never popped.
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Bind `name` in the innermost scope, shadowing outer bindings.
    pub fn define(&mut self, name: String, var: VarId) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name, var);
        }
    }

    pub fn lookup(&self, name: &str) -> Option<VarId> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name).copied())
    }

    /// Whether `name` is bound in the innermost scope itself.
    pub fn defined_in_current_scope(&self, name: &str) -> bool {
        self.scopes.last().is_some_and(|scope| scope.contains_key(name))
    }

    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    /// Drop every scope but the outermost; used between functions.
    pub fn reset_scopes(&mut self) {
        self.scopes.truncate(1);
        if let Some(scope) = self.scopes.first_mut() {
            scope.clear();
        }
    }
}
