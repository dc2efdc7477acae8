//! Variable scopes, function registry, and call stack.
//!
//! State is organized as a chain of [`Scope`]s. The chain always bottoms out
//! at the global scope; entering a function pushes a fresh scope on top and
//! leaving pops it, discarding its locals. Reads walk the chain innermost to
//! outermost. Writes always land in the innermost scope, shadowing an outer
//! name instead of mutating it.
//!
//! Functions live outside the scope chain on purpose: definitions are code,
//! not data, so rollback and scope teardown never touch them.

use rustc_hash::FxHashMap;

use crate::program::FunctionDef;
use crate::runtime::errors::AuraError;
use crate::value::Value;

/// One lexical scope: a variable table plus an ownership link to the scope
/// that encloses it. The root of the chain (no parent) is the global scope.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    variables: FxHashMap<String, Value>,
    parent: Option<Box<Scope>>,
}

impl Scope {
    pub fn new() -> Self {
        Scope::default()
    }

    fn with_parent(parent: Scope) -> Self {
        Scope {
            variables: FxHashMap::default(),
            parent: Some(Box::new(parent)),
        }
    }

    /// Looks `name` up through the chain, innermost first.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self.variables.get(name) {
            Some(value) => Some(value),
            None => self.parent.as_ref().and_then(|parent| parent.get(name)),
        }
    }

    /// Writes `name` into this scope only.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Bindings in this scope alone, not the chain.
    pub fn local_vars(&self) -> &FxHashMap<String, Value> {
        &self.variables
    }

    /// 1 for the global scope, +1 per enclosing link.
    pub fn depth(&self) -> usize {
        match &self.parent {
            Some(parent) => parent.depth() + 1,
            None => 1,
        }
    }

    fn root(&self) -> &Scope {
        match &self.parent {
            Some(parent) => parent.root(),
            None => self,
        }
    }

    fn root_mut(&mut self) -> &mut Scope {
        match self.parent {
            Some(ref mut parent) => parent.root_mut(),
            None => self,
        }
    }

    fn binding_count(&self) -> usize {
        let own = self.variables.len();
        match &self.parent {
            Some(parent) => own + parent.binding_count(),
            None => own,
        }
    }
}

/// All mutable program state: the scope chain, registered functions, and the
/// call stack of function names currently executing.
#[derive(Debug, Clone, Default)]
pub struct StateManager {
    current: Scope,
    functions: FxHashMap<String, FunctionDef>,
    call_stack: Vec<String>,
}

impl StateManager {
    pub fn new() -> Self {
        StateManager::default()
    }

    // ========== Variables ==========

    /// Writes into the innermost scope. An outer binding with the same name
    /// is shadowed, never mutated.
    pub fn set_var(&mut self, name: impl Into<String>, value: Value) {
        self.current.set(name, value);
    }

    /// Reads through the whole chain, failing with a Variable error when the
    /// name is bound nowhere.
    pub fn get_var(&self, name: &str) -> Result<Value, AuraError> {
        self.current
            .get(name)
            .cloned()
            .ok_or_else(|| AuraError::variable(format!("Variable '{}' is not defined", name)))
    }

    pub fn has_var(&self, name: &str) -> bool {
        self.current.has(name)
    }

    /// Merged view of the chain, outermost first so inner bindings win.
    pub fn get_all_vars(&self) -> FxHashMap<String, Value> {
        let mut scopes = Vec::new();
        let mut scope = Some(&self.current);
        while let Some(s) = scope {
            scopes.push(s);
            scope = s.parent.as_deref();
        }
        let mut merged = FxHashMap::default();
        for s in scopes.iter().rev() {
            for (name, value) in &s.variables {
                merged.insert(name.clone(), value.clone());
            }
        }
        merged
    }

    /// Total bindings across the chain. Shadowed names count once per scope;
    /// this is a resource measure, not a name count.
    pub fn var_count(&self) -> usize {
        self.current.binding_count()
    }

    pub fn current_vars(&self) -> &FxHashMap<String, Value> {
        &self.current.variables
    }

    pub fn current_vars_mut(&mut self) -> &mut FxHashMap<String, Value> {
        &mut self.current.variables
    }

    pub fn global_vars(&self) -> &FxHashMap<String, Value> {
        &self.current.root().variables
    }

    pub fn global_vars_mut(&mut self) -> &mut FxHashMap<String, Value> {
        &mut self.current.root_mut().variables
    }

    // ========== Scopes ==========

    /// Pushes a fresh innermost scope chained to the current one.
    pub fn push_scope(&mut self) {
        let parent = std::mem::take(&mut self.current);
        self.current = Scope::with_parent(parent);
    }

    /// Pops the innermost scope, discarding its locals. A no-op at the global
    /// scope, which can never be popped.
    pub fn pop_scope(&mut self) {
        if let Some(parent) = self.current.parent.take() {
            self.current = *parent;
        }
    }

    pub fn scope_depth(&self) -> usize {
        self.current.depth()
    }

    // ========== Functions ==========

    pub fn register_function(&mut self, def: FunctionDef) {
        self.functions.insert(def.name.clone(), def);
    }

    pub fn get_function(&self, name: &str) -> Result<&FunctionDef, AuraError> {
        self.functions
            .get(name)
            .ok_or_else(|| AuraError::function(format!("Function '{}' is not defined", name)))
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered function names, sorted for stable display.
    pub fn function_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    // ========== Call stack ==========

    pub fn push_call(&mut self, name: impl Into<String>) {
        self.call_stack.push(name.into());
    }

    pub fn pop_call(&mut self) -> Option<String> {
        self.call_stack.pop()
    }

    pub fn call_stack(&self) -> &[String] {
        &self.call_stack
    }

    pub fn call_depth(&self) -> usize {
        self.call_stack.len()
    }

    pub fn clear_call_stack(&mut self) {
        self.call_stack.clear();
    }

    // ========== Lifecycle ==========

    /// Drops everything: scopes, functions, call stack. Used by reset and by
    /// hot reload (which re-seeds variables afterwards).
    pub fn clear(&mut self) {
        self.current = Scope::new();
        self.functions.clear();
        self.call_stack.clear();
    }
}
