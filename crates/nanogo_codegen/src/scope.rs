use indexmap::IndexMap;
use nanogo_frontend::ast::Span;

use crate::error::{CodegenErrorKind, Result};
use crate::value::Value;

/// Stack of name → storage-cell bindings, one frame per function activation.
///
/// Lookup walks frames innermost first. Rebinding a name in the same frame
/// replaces the earlier binding.
#[derive(Debug, Default)]
pub struct ScopeStack<'ctx> {
    frames: Vec<IndexMap<String, Value<'ctx>>>,
}

impl<'ctx> ScopeStack<'ctx> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self) {
        self.frames.push(IndexMap::new());
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Bind `name` in the innermost frame, returning the binding it replaced.
    pub fn bind(&mut self, name: impl Into<String>, value: Value<'ctx>) -> Option<Value<'ctx>> {
        match self.frames.last_mut() {
            Some(frame) => frame.insert(name.into(), value),
            None => {
                let mut frame = IndexMap::new();
                frame.insert(name.into(), value);
                self.frames.push(frame);
                None
            }
        }
    }

    pub fn resolve(&self, name: &str, span: Span) -> Result<&Value<'ctx>> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(name))
            .ok_or_else(|| CodegenErrorKind::UnboundIdentifier(name.to_string()).at(span))
    }

    /// Names bound in the innermost frame, in declaration order.
    pub fn innermost_names(&self) -> impl Iterator<Item = &str> {
        self.frames
            .last()
            .into_iter()
            .flat_map(|frame| frame.keys().map(String::as_str))
    }
}
