use std::collections::HashMap;

use super::value::Value;
use crate::error::ErrorKind;

/// Nested variable environments for one compilation.
///
/// Environments live in an arena and point to their parent by index. Lookup
/// and assignment walk the parent chain; `define` always binds in the current
/// environment. Block constructs open a child with [`Scope::child`] and drop it
/// again with [`Scope::restore`].
#[derive(Clone, Debug)]
pub struct Scope {
    frames: Vec<Frame>,
    current: usize,
}

#[derive(Clone, Debug, Default)]
struct Frame {
    parent: Option<usize>,
    bindings: HashMap<String, Value>,
}

/// Marks the environment that was current before [`Scope::child`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use = "pass the checkpoint to `Scope::restore` to leave the child environment"]
pub struct ScopeCheckpoint {
    frame: usize,
    frames: usize,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope {
    /// Create a scope holding a single root environment
    pub fn new() -> Self {
        Self {
            frames: vec![Frame::default()],
            current: 0,
        }
    }

    pub fn from_bindings<I, S>(bindings: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        let mut scope = Self::new();
        for (name, value) in bindings {
            scope.define(name, value);
        }
        scope
    }

    /// Looks `name` up from the current environment outwards.
    pub fn resolve(&self, name: &str) -> Result<Value, ErrorKind> {
        self.lookup(name)
            .cloned()
            .ok_or_else(|| ErrorKind::UnboundIdentifier(name.to_string()))
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.find_frame(name)
            .and_then(|index| self.frames[index].bindings.get(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find_frame(name).is_some()
    }

    /// Binds `name` in the current environment, shadowing outer bindings.
    pub fn define<S: Into<String>>(&mut self, name: S, value: Value) {
        self.frames[self.current]
            .bindings
            .insert(name.into(), value);
    }

    /// Binds `name` in the root environment.
    pub fn define_global<S: Into<String>>(&mut self, name: S, value: Value) {
        self.frames[0].bindings.insert(name.into(), value);
    }

    /// Overwrites the nearest existing binding of `name`.
    pub fn assign(&mut self, name: &str, value: Value) -> Result<(), ErrorKind> {
        *self.binding_mut(name)? = value;
        Ok(())
    }

    /// Mutable access to the nearest existing binding of `name`.
    pub fn binding_mut(&mut self, name: &str) -> Result<&mut Value, ErrorKind> {
        let index = self
            .find_frame(name)
            .ok_or_else(|| ErrorKind::UnboundIdentifier(name.to_string()))?;
        self.frames[index]
            .bindings
            .get_mut(name)
            .ok_or_else(|| ErrorKind::UnboundIdentifier(name.to_string()))
    }

    /// Opens a child of the current environment and makes it current.
    pub fn child(&mut self) -> ScopeCheckpoint {
        let checkpoint = ScopeCheckpoint {
            frame: self.current,
            frames: self.frames.len(),
        };
        self.frames.push(Frame {
            parent: Some(self.current),
            bindings: HashMap::new(),
        });
        self.current = self.frames.len() - 1;
        checkpoint
    }

    /// Returns to the environment current at `checkpoint`, dropping every
    /// environment opened since.
    pub fn restore(&mut self, checkpoint: ScopeCheckpoint) {
        if checkpoint.frames > 0 && checkpoint.frames <= self.frames.len() {
            self.frames.truncate(checkpoint.frames);
            self.current = checkpoint.frame;
        }
    }

    /// Number of environments on the current parent chain.
    pub fn depth(&self) -> usize {
        let mut depth = 1;
        let mut frame = &self.frames[self.current];
        while let Some(parent) = frame.parent {
            depth += 1;
            frame = &self.frames[parent];
        }
        depth
    }

    fn find_frame(&self, name: &str) -> Option<usize> {
        let mut index = Some(self.current);
        while let Some(i) = index {
            let frame = &self.frames[i];
            if frame.bindings.contains_key(name) {
                return Some(i);
            }
            index = frame.parent;
        }
        None
    }
}
