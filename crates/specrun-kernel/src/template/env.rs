//! Lexical variable scopes for template expansion.

use std::collections::HashMap;

use specrun_types::Value;

/// Variable bindings with nested frames.
///
/// Variables are looked up from innermost to outermost frame. A name may
/// shadow an outer binding from a child frame, but defining it twice in
/// the same frame is rejected.
#[derive(Debug, Clone)]
pub struct Env {
    /// Stack of binding frames. Last element is the innermost scope.
    frames: Vec<HashMap<String, Value>>,
}

impl Env {
    /// Create an environment with one empty frame.
    pub fn new() -> Self {
        Self {
            frames: vec![HashMap::new()],
        }
    }

    /// Push a new (innermost) frame.
    pub fn push_frame(&mut self) {
        self.frames.push(HashMap::new());
    }

    /// Pop the innermost frame.
    ///
    /// Panics if attempting to pop the last frame.
    pub fn pop_frame(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        } else {
            panic!("cannot pop the root env frame");
        }
    }

    /// Bind a variable in the innermost frame.
    ///
    /// Returns `false` without mutating anything when the name is already
    /// bound in that frame.
    pub fn define(&mut self, name: impl Into<String>, value: Value) -> bool {
        let name = name.into();
        let Some(frame) = self.frames.last_mut() else {
            return false;
        };
        if frame.contains_key(&name) {
            return false;
        }
        frame.insert(name, value);
        true
    }

    /// Look up a variable, innermost frame first.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}
