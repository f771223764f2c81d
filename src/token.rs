//! Flat token scope holding named values for the currently executing rule.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::value::Value;

/// Mutable name/value bindings visible to conditions and actions.
///
/// There is one scope per engine, not one per rule: nesting is handled by
/// snapshotting on frame entry and restoring on frame exit, so a nested
/// execution starts from a clean scope and the outer bindings reappear
/// unchanged afterwards.
#[derive(Clone, Debug, Default)]
pub struct TokenScope {
    tokens: Arc<DashMap<String, Value>>,
}

impl TokenScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.tokens.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.tokens.get(name).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, name: &str) -> Option<Value> {
        self.tokens.remove(name).map(|(_, value)| value)
    }

    pub fn clear(&self) {
        self.tokens.clear();
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.tokens.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Capture the current bindings.
    pub fn snapshot(&self) -> TokenSnapshot {
        TokenSnapshot {
            tokens: self
                .tokens
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().clone()))
                .collect(),
        }
    }

    /// Drop everything, then reinstate the snapshot one binding at a time.
    pub fn restore(&self, snapshot: TokenSnapshot) {
        debug!(restored = snapshot.tokens.len(), "restoring token scope");
        self.clear();
        for (name, value) in snapshot.tokens {
            self.set(name, value);
        }
    }
}

/// Immutable copy of a token scope taken on frame entry.
#[derive(Clone, Debug, Default)]
pub struct TokenSnapshot {
    tokens: HashMap<String, Value>,
}

impl TokenSnapshot {
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
