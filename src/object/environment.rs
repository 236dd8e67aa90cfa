use rustc_hash::FxHashMap;

use crate::object::Object;

/// Handle to one scope record inside an [`Environment`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

#[derive(Debug, Default)]
struct Scope {
    store: FxHashMap<String, Object>,
    outer: Option<ScopeId>,
}

/// Arena of variable scopes for the tree-walking evaluator.
///
/// Scopes refer to their enclosing scope by index and function values hold
/// the index of the scope they were created in, so closures share (rather
/// than copy) their defining scope without reference-counted cycles. Records
/// live as long as the arena.
#[derive(Debug)]
pub struct Environment {
    scopes: Vec<Scope>,
}

impl Environment {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
        }
    }

    pub fn global(&self) -> ScopeId {
        ScopeId(0)
    }

    /// Creates a fresh scope whose lookups fall back to `outer`.
    pub fn enclosed(&mut self, outer: ScopeId) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            store: FxHashMap::default(),
            outer: Some(outer),
        });
        id
    }

    /// Walks the chain outward from `scope`.
    pub fn get(&self, scope: ScopeId, name: &str) -> Option<&Object> {
        let mut current = Some(scope);
        while let Some(ScopeId(index)) = current {
            let record = &self.scopes[index];
            if let Some(value) = record.store.get(name) {
                return Some(value);
            }
            current = record.outer;
        }
        None
    }

    /// Binds `name` in `scope` itself, shadowing any outer binding.
    pub fn set(&mut self, scope: ScopeId, name: impl Into<String>, value: Object) {
        self.scopes[scope.0].store.insert(name.into(), value);
    }

    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
