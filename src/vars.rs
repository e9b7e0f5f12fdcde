//! Scoped script variables
//!
//! Variables live in a stack of scopes. Lookups search the newest scope
//! first and fall back towards the base scope. Assigning to a name that is
//! already bound updates it where it lives; new names go into the newest
//! scope. Popping a scope discards only the names created inside it.

use std::collections::{BTreeSet, HashMap};

use crate::common::{Error, Result};

/// Stack of variable scopes; always holds at least the base scope
#[derive(Debug, Clone)]
pub struct Vars {
    /// Scopes, oldest first
    scopes: Vec<HashMap<String, String>>,
    /// When set, push and pop are no-ops
    flat: bool,
}

impl Vars {
    /// Create a stack holding only the base scope
    pub fn new() -> Self {
        Self {
            scopes: vec![HashMap::new()],
            flat: false,
        }
    }

    /// Copy every binding into a new single-scope stack.
    ///
    /// Where a name is bound in several scopes, the newest binding wins.
    pub fn flattened(&self) -> Self {
        let mut base = HashMap::new();
        for scope in &self.scopes {
            for (name, value) in scope {
                base.insert(name.clone(), value.clone());
            }
        }
        Self {
            scopes: vec![base],
            flat: self.flat,
        }
    }

    /// Enable or disable flat mode.
    ///
    /// While flat, no scopes are created or destroyed; existing scopes stay
    /// usable and are kept when flat mode is turned off again.
    pub fn set_flat(&mut self, flat: bool) {
        self.flat = flat;
    }

    pub fn is_flat(&self) -> bool {
        self.flat
    }

    /// Number of scopes, including the base scope
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn push(&mut self) {
        if self.flat {
            return;
        }
        self.scopes.push(HashMap::new());
    }

    /// Discard the newest scope; the base scope can never be popped
    pub fn pop(&mut self) -> Result<()> {
        if self.flat {
            return Ok(());
        }
        if self.scopes.len() <= 1 {
            return Err(Error::ScopeUnderflow);
        }
        self.scopes.pop();
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Assign a value, updating an existing binding wherever it lives
    pub fn put(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();

        if let Some(scope) = self.scopes.iter_mut().rev().find(|s| s.contains_key(&name)) {
            scope.insert(name, value);
            return;
        }

        if let Some(newest) = self.scopes.last_mut() {
            newest.insert(name, value);
        }
    }

    /// Remove the newest binding of `name`, returning its value
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.remove(name))
    }

    /// Every visible variable name, sorted
    pub fn names(&self) -> BTreeSet<&str> {
        self.scopes
            .iter()
            .flat_map(|scope| scope.keys().map(String::as_str))
            .collect()
    }
}

impl Default for Vars {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_missing() {
        let vars = Vars::new();
        assert_eq!(vars.get("nope"), None);
        assert_eq!(vars.depth(), 1);
    }

    #[test]
    fn test_outer_binding_visible_inside() {
        let mut vars = Vars::new();
        vars.put("user", "admin");
        vars.push();
        vars.push();
        assert_eq!(vars.get("user"), Some("admin"));
    }

    #[test]
    fn test_put_updates_outer_in_place() {
        let mut vars = Vars::new();
        vars.put("count", "1");
        vars.push();
        vars.put("count", "2");
        vars.put("inner", "x");
        assert_eq!(vars.get("count"), Some("2"));

        vars.pop().unwrap();
        assert_eq!(vars.get("count"), Some("2"));
        assert_eq!(vars.get("inner"), None);
    }

    #[test]
    fn test_pop_never_removes_base() {
        let mut vars = Vars::new();
        vars.push();
        assert!(vars.pop().is_ok());
        assert!(matches!(vars.pop(), Err(Error::ScopeUnderflow)));
        assert_eq!(vars.depth(), 1);
    }

    #[test]
    fn test_balanced_push_pop_sequences() {
        let mut vars = Vars::new();
        vars.put("base", "b");
        for round in 0..5 {
            for level in 0..round {
                vars.push();
                vars.put(format!("level{}", level), level.to_string());
            }
            assert_eq!(vars.depth(), round + 1);
            for _ in 0..round {
                vars.pop().unwrap();
            }
            assert_eq!(vars.depth(), 1);
            assert_eq!(vars.get("base"), Some("b"));
            assert_eq!(vars.names().len(), 1);
        }
    }

    #[test]
    fn test_remove_newest_first() {
        let mut vars = Vars::new();
        vars.put("a", "outer");
        vars.push();
        // put would update the outer binding, so bind directly in the new scope
        vars.scopes.last_mut().unwrap().insert("a".into(), "inner".into());

        assert_eq!(vars.remove("a").as_deref(), Some("inner"));
        assert_eq!(vars.get("a"), Some("outer"));
        assert_eq!(vars.remove("a").as_deref(), Some("outer"));
        assert_eq!(vars.remove("a"), None);
    }

    #[test]
    fn test_flat_mode() {
        let mut vars = Vars::new();
        vars.push();
        vars.put("kept", "1");
        vars.set_flat(true);

        vars.push();
        assert_eq!(vars.depth(), 2);
        vars.pop().unwrap();
        vars.pop().unwrap();
        assert_eq!(vars.depth(), 2);
        assert_eq!(vars.get("kept"), Some("1"));

        vars.set_flat(false);
        vars.pop().unwrap();
        assert_eq!(vars.get("kept"), None);
    }

    #[test]
    fn test_flattened() {
        let mut vars = Vars::new();
        vars.put("a", "1");
        vars.push();
        vars.put("b", "2");
        let flat = vars.flattened();
        assert_eq!(flat.depth(), 1);
        assert_eq!(flat.get("a"), Some("1"));
        assert_eq!(flat.get("b"), Some("2"));
    }
}
