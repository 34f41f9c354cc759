//! Execution scopes
//!
//! A scope is one frame of named variables plus the last produced result.
//! Frames form a stack; the bottom frame is the root scope and is never
//! popped. The active frame is tracked explicitly so that a deserialized
//! workflow can bind it independently of stack order.

use crate::types::RuntimeValue;
use crate::CoreError;
use indexmap::IndexMap;

/// A single frame of variables
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionScope {
    variables: IndexMap<String, RuntimeValue>,
    last_result: Option<RuntimeValue>,
}

impl ExecutionScope {
    /// Create an empty scope
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable, replacing any previous value of the same name in this frame
    pub fn set_variable(&mut self, name: impl Into<String>, value: RuntimeValue) {
        self.variables.insert(name.into(), value);
    }

    /// Read a variable from this frame only
    #[inline]
    pub fn variable(&self, name: &str) -> Option<&RuntimeValue> {
        self.variables.get(name)
    }

    /// Remove a variable from this frame
    pub fn remove_variable(&mut self, name: &str) -> Option<RuntimeValue> {
        self.variables.shift_remove(name)
    }

    /// Variables in insertion order
    #[inline]
    pub fn variables(&self) -> &IndexMap<String, RuntimeValue> {
        &self.variables
    }

    /// The most recent value produced in this scope
    #[inline]
    pub fn last_result(&self) -> Option<&RuntimeValue> {
        self.last_result.as_ref()
    }

    /// Record the value produced by the last executed activity
    pub fn set_last_result(&mut self, value: Option<RuntimeValue>) {
        self.last_result = value;
    }
}

/// Stack of execution scopes with an explicit current frame
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeStack {
    scopes: Vec<ExecutionScope>,
    current: usize,
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeStack {
    /// Create a stack holding a single root scope, which is also current
    pub fn new() -> Self {
        Self {
            scopes: vec![ExecutionScope::new()],
            current: 0,
        }
    }

    /// Build a stack from existing frames (bottom first) and a current index
    pub fn from_scopes(scopes: Vec<ExecutionScope>, current: usize) -> Result<Self, CoreError> {
        if scopes.is_empty() {
            return Err(CoreError::ScopeError(
                "A scope stack needs at least the root scope".to_string(),
            ));
        }
        if current >= scopes.len() {
            return Err(CoreError::ScopeError(format!(
                "Current scope index {} is outside a stack of {} scopes",
                current,
                scopes.len()
            )));
        }
        Ok(Self { scopes, current })
    }

    /// Enter a nested execution context; the new frame becomes current
    pub fn push(&mut self) -> &mut ExecutionScope {
        self.scopes.push(ExecutionScope::new());
        self.current = self.scopes.len() - 1;
        let index = self.current;
        &mut self.scopes[index]
    }

    /// Leave the innermost execution context
    ///
    /// The root scope cannot be popped. After popping, the new top of stack
    /// becomes current.
    pub fn pop(&mut self) -> Result<ExecutionScope, CoreError> {
        if self.scopes.len() <= 1 {
            return Err(CoreError::ScopeError(
                "The root scope cannot be popped".to_string(),
            ));
        }
        let scope = self.scopes.pop().ok_or_else(|| {
            CoreError::ScopeError("The root scope cannot be popped".to_string())
        })?;
        self.current = self.scopes.len() - 1;
        Ok(scope)
    }

    /// Rebind the current frame
    pub fn set_current(&mut self, index: usize) -> Result<(), CoreError> {
        if index >= self.scopes.len() {
            return Err(CoreError::ScopeError(format!(
                "Scope index {} is outside a stack of {} scopes",
                index,
                self.scopes.len()
            )));
        }
        self.current = index;
        Ok(())
    }

    /// Index of the current frame, counted from the bottom
    #[inline]
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// The current frame
    #[inline]
    pub fn current(&self) -> &ExecutionScope {
        &self.scopes[self.current]
    }

    /// The current frame, mutably
    #[inline]
    pub fn current_mut(&mut self) -> &mut ExecutionScope {
        &mut self.scopes[self.current]
    }

    /// The root frame
    #[inline]
    pub fn root(&self) -> &ExecutionScope {
        &self.scopes[0]
    }

    /// Frames from bottom (root) to top
    #[inline]
    pub fn scopes(&self) -> &[ExecutionScope] {
        &self.scopes
    }

    /// Number of frames
    #[inline]
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    /// Always false; the root scope is never removed
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_stack_has_root_scope() {
        let stack = ScopeStack::new();
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.current_index(), 0);
        assert!(stack.current().variables().is_empty());
        assert!(stack.current().last_result().is_none());
    }

    #[test]
    fn test_push_and_pop() {
        let mut stack = ScopeStack::new();
        stack.current_mut().set_variable("outer", RuntimeValue::from(1i64));

        let inner = stack.push();
        inner.set_variable("outer", RuntimeValue::from(2i64));
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.current_index(), 1);
        assert_eq!(stack.current().variable("outer"), Some(&RuntimeValue::from(2i64)));

        let popped = stack.pop().unwrap();
        assert_eq!(popped.variable("outer"), Some(&RuntimeValue::from(2i64)));
        assert_eq!(stack.current_index(), 0);
        assert_eq!(stack.current().variable("outer"), Some(&RuntimeValue::from(1i64)));
    }

    #[test]
    fn test_root_scope_is_never_popped() {
        let mut stack = ScopeStack::new();
        assert!(matches!(stack.pop(), Err(CoreError::ScopeError(_))));
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn test_set_current_out_of_range() {
        let mut stack = ScopeStack::new();
        stack.push();
        assert!(stack.set_current(0).is_ok());
        assert_eq!(stack.current_index(), 0);
        assert!(stack.set_current(2).is_err());
    }

    #[test]
    fn test_from_scopes_validation() {
        assert!(ScopeStack::from_scopes(Vec::new(), 0).is_err());
        assert!(ScopeStack::from_scopes(vec![ExecutionScope::new()], 1).is_err());

        let stack =
            ScopeStack::from_scopes(vec![ExecutionScope::new(), ExecutionScope::new()], 0).unwrap();
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.current_index(), 0);
    }

    #[test]
    fn test_variables_keep_insertion_order() {
        let mut scope = ExecutionScope::new();
        scope.set_variable("b", RuntimeValue::from("first"));
        scope.set_variable("a", RuntimeValue::from("second"));
        scope.set_variable("b", RuntimeValue::json(json!({"replaced": true})));

        let names: Vec<&str> = scope.variables().keys().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert!(scope.remove_variable("a").is_some());
        assert_eq!(scope.variables().len(), 1);
    }

    #[test]
    fn test_last_result() {
        let mut scope = ExecutionScope::new();
        scope.set_last_result(Some(RuntimeValue::from(42i64)));
        assert_eq!(scope.last_result(), Some(&RuntimeValue::from(42i64)));
        scope.set_last_result(None);
        assert!(scope.last_result().is_none());
    }
}
