//! Purpose-keyed stacks of immutable context collections.
//!
//! Rule execution binds names like `entity` dynamically: whatever was pushed
//! most recently wins, and leaving a frame restores the outer binding. That
//! discipline is implemented here as explicit stacks rather than anything
//! resembling a call stack, so nested and reentrant executions compose as
//! matched parentheses.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::token::TokenScope;
use crate::value::{EntityRef, TypedValue, Value};

/// Purpose key used by the engine itself for subject and action bindings.
pub const DEFAULT_PURPOSE: &str = "karakuri";

/// A named value as it appears inside a context collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ContextValue {
    /// Reference to an entity.
    Entity(EntityRef),
    /// Any other value, tagged with its declared data type.
    Scalar(TypedValue),
}

impl ContextValue {
    pub fn entity(entity: EntityRef) -> Self {
        ContextValue::Entity(entity)
    }

    pub fn scalar(typed: TypedValue) -> Self {
        ContextValue::Scalar(typed)
    }

    /// Collapse a scalar that merely wraps an entity reference into the
    /// entity itself. Any other value passes through unchanged.
    pub fn normalized(self) -> Self {
        match self {
            ContextValue::Scalar(TypedValue {
                value: Value::Entity(entity),
                ..
            }) => ContextValue::Entity(entity),
            other => other,
        }
    }

    /// Name this value binds to when pushed without an explicit name.
    ///
    /// Entities always bind as `entity`; scalars bind under the terminal
    /// segment of their data-type name.
    pub fn key(&self) -> &str {
        match self {
            ContextValue::Entity(_) => "entity",
            ContextValue::Scalar(typed) => typed.key(),
        }
    }

    /// Plain value view, for condition plugins that read context bindings.
    pub fn to_value(&self) -> Value {
        match self {
            ContextValue::Entity(entity) => Value::Entity(entity.clone()),
            ContextValue::Scalar(typed) => typed.value.clone(),
        }
    }
}

impl From<Value> for ContextValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Entity(entity) => ContextValue::Entity(entity),
            other => ContextValue::Scalar(TypedValue::of(other)),
        }
    }
}

/// An immutable set of named context values.
///
/// Collections are created, pushed and eventually popped as a unit; nothing
/// may mutate their entries afterwards. Frames that have no real values to
/// contribute still push a placeholder collection so that their exit always
/// has a marker to unwind to.
#[derive(Debug, Default, PartialEq)]
pub struct ContextCollection {
    entries: Vec<(String, ContextValue)>,
    placeholder: bool,
}

impl ContextCollection {
    pub fn new(entries: Vec<(String, ContextValue)>) -> Self {
        Self {
            entries,
            placeholder: false,
        }
    }

    pub fn single(name: impl Into<String>, value: ContextValue) -> Self {
        Self::new(vec![(name.into(), value)])
    }

    /// Empty collection that exists only to serve as an unwind marker.
    pub fn placeholder() -> Self {
        Self {
            entries: Vec::new(),
            placeholder: true,
        }
    }

    pub fn get(&self, name: &str) -> Option<&ContextValue> {
        self.entries
            .iter()
            .find(|(entry_name, _)| entry_name == name)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }
}

/// LIFO stack of shared context collections for one purpose.
#[derive(Clone, Debug, Default)]
pub struct ContextStack {
    items: Vec<Arc<ContextCollection>>,
}

impl ContextStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a fresh collection and hand back the shared handle that later
    /// identifies it as an unwind marker.
    pub fn push(&mut self, collection: ContextCollection) -> Arc<ContextCollection> {
        let shared = Arc::new(collection);
        self.items.push(Arc::clone(&shared));
        shared
    }

    fn push_shared(&mut self, collection: Arc<ContextCollection>) {
        self.items.push(collection);
    }

    /// Remove and return the top collection. Never errors on an empty stack.
    pub fn pop(&mut self) -> Option<Arc<ContextCollection>> {
        self.items.pop()
    }

    pub fn peek(&self) -> Option<&Arc<ContextCollection>> {
        self.items.last()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_context(&self, name: &str) -> bool {
        self.get_context(name).is_some()
    }

    /// Scan from the top of the stack downwards; the innermost binding wins.
    pub fn get_context(&self, name: &str) -> Option<&ContextValue> {
        self.items
            .iter()
            .rev()
            .find_map(|collection| collection.get(name))
    }

    /// Push a one-entry collection binding `name` to `value`.
    pub fn add_context(
        &mut self,
        name: impl Into<String>,
        value: ContextValue,
    ) -> Arc<ContextCollection> {
        self.push(ContextCollection::single(name, value))
    }

    /// Pop until the marker, then replay everything popped above it.
    ///
    /// Collections pushed after the marker by deeper logic survive in their
    /// original order; the marker itself and everything below it end up
    /// exactly as they were before the marker was pushed. A marker that was
    /// already removed elsewhere drains the loop at the empty stack and the
    /// replay then restores the stack unchanged.
    pub fn unwind(&mut self, marker: &Arc<ContextCollection>) {
        let mut children: Vec<Arc<ContextCollection>> = Vec::new();
        let mut found = false;
        while let Some(top) = self.pop() {
            if Arc::ptr_eq(&top, marker) {
                found = true;
                break;
            }
            children.insert(0, top);
        }
        if !found {
            debug!(
                replayed = children.len(),
                "unwind marker already removed, stack left as found"
            );
        }
        for child in children {
            self.push_shared(child);
        }
    }
}

/// All context stacks of one engine, keyed by purpose.
///
/// Purposes other than [`DEFAULT_PURPOSE`] come from events that carry extra
/// context groups; each purpose gets an independent stack created on first
/// use.
#[derive(Clone, Debug, Default)]
pub struct ContextStacks {
    stacks: Arc<DashMap<String, ContextStack>>,
}

impl ContextStacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &self,
        purpose: &str,
        collection: ContextCollection,
    ) -> Arc<ContextCollection> {
        self.stacks
            .entry(purpose.to_string())
            .or_default()
            .push(collection)
    }

    pub fn pop(&self, purpose: &str) -> Option<Arc<ContextCollection>> {
        self.stacks
            .get_mut(purpose)
            .and_then(|mut stack| stack.pop())
    }

    pub fn peek(&self, purpose: &str) -> Option<Arc<ContextCollection>> {
        self.stacks
            .get(purpose)
            .and_then(|stack| stack.peek().cloned())
    }

    pub fn depth(&self, purpose: &str) -> usize {
        self.stacks.get(purpose).map_or(0, |stack| stack.len())
    }

    pub fn has_context(&self, purpose: &str, name: &str) -> bool {
        self.stacks
            .get(purpose)
            .is_some_and(|stack| stack.has_context(name))
    }

    pub fn get_context(&self, purpose: &str, name: &str) -> Option<ContextValue> {
        self.stacks
            .get(purpose)
            .and_then(|stack| stack.get_context(name).cloned())
    }

    pub fn add_context(
        &self,
        purpose: &str,
        name: impl Into<String>,
        value: ContextValue,
    ) -> Arc<ContextCollection> {
        self.stacks
            .entry(purpose.to_string())
            .or_default()
            .add_context(name, value)
    }

    pub fn unwind(&self, purpose: &str, marker: &Arc<ContextCollection>) {
        if let Some(mut stack) = self.stacks.get_mut(purpose) {
            stack.unwind(marker);
        }
    }

    pub fn purposes(&self) -> Vec<String> {
        self.stacks.iter().map(|entry| entry.key().clone()).collect()
    }
}

/// Shared mutable state of one engine: the purpose-keyed context stacks plus
/// the flat token scope.
///
/// All handles are cheap clones backed by the same storage, so frames and
/// brackets can each hold their own copy and still observe one another.
#[derive(Clone, Debug, Default)]
pub struct EngineContext {
    pub stacks: ContextStacks,
    pub tokens: TokenScope,
}

impl EngineContext {
    pub fn new() -> Self {
        Self::default()
    }
}
