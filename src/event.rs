//! Events that trigger rule execution.
//!
//! An event carries three things the engine cares about: a kind that rules
//! match their triggers against, an optional primary subject, and zero or
//! more context groups destined for specific purpose stacks.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::context::ContextValue;
use crate::value::Value;

/// Kind of a dispatched event; rules declare one of these as their trigger.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    EntityInserted { entity_type: String },
    EntityUpdated { entity_type: String },
    EntityDeleted { entity_type: String },
    Timer,
    Custom(String),
}

impl EventKind {
    pub fn inserted(entity_type: impl Into<String>) -> Self {
        EventKind::EntityInserted {
            entity_type: entity_type.into(),
        }
    }

    pub fn updated(entity_type: impl Into<String>) -> Self {
        EventKind::EntityUpdated {
            entity_type: entity_type.into(),
        }
    }

    pub fn deleted(entity_type: impl Into<String>) -> Self {
        EventKind::EntityDeleted {
            entity_type: entity_type.into(),
        }
    }

    pub fn custom(name: impl Into<String>) -> Self {
        EventKind::Custom(name.into())
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EventKind::EntityInserted { entity_type } => {
                write!(f, "entity_inserted:{}", entity_type)
            }
            EventKind::EntityUpdated { entity_type } => {
                write!(f, "entity_updated:{}", entity_type)
            }
            EventKind::EntityDeleted { entity_type } => {
                write!(f, "entity_deleted:{}", entity_type)
            }
            EventKind::Timer => write!(f, "timer"),
            EventKind::Custom(name) => write!(f, "custom:{}", name),
        }
    }
}

/// Named context values an event contributes to one purpose stack.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContextGroup {
    pub purpose: String,
    pub entries: Vec<(String, ContextValue)>,
}

impl ContextGroup {
    pub fn new(purpose: impl Into<String>) -> Self {
        Self {
            purpose: purpose.into(),
            entries: Vec::new(),
        }
    }

    pub fn with_entry(mut self, name: impl Into<String>, value: ContextValue) -> Self {
        self.entries.push((name.into(), value));
        self
    }
}

/// A discrete occurrence the engine dispatches rules for.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    /// Free-form payload, readable by condition and action plugins.
    pub parameters: HashMap<String, Value>,
    /// The value this event is primarily about, if any. Bound under the
    /// name `entity` on the default purpose stack while the event's rules
    /// run.
    pub subject: Option<ContextValue>,
    /// Extra context pushed onto purpose stacks for the duration of the
    /// frame.
    pub groups: Vec<ContextGroup>,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            parameters: HashMap::new(),
            subject: None,
            groups: Vec::new(),
        }
    }

    pub fn with_subject(mut self, subject: ContextValue) -> Self {
        self.subject = Some(subject);
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    pub fn with_group(mut self, group: ContextGroup) -> Self {
        self.groups.push(group);
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    /// Purposes this event contributes context groups for, deduplicated in
    /// first-seen order.
    pub fn group_purposes(&self) -> Vec<&str> {
        let mut purposes: Vec<&str> = Vec::new();
        for group in &self.groups {
            if !purposes.contains(&group.purpose.as_str()) {
                purposes.push(group.purpose.as_str());
            }
        }
        purposes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::EntityRef;

    #[test]
    fn test_kind_display() {
        assert_eq!(EventKind::inserted("node").to_string(), "entity_inserted:node");
        assert_eq!(EventKind::Timer.to_string(), "timer");
        assert_eq!(EventKind::custom("cron").to_string(), "custom:cron");
    }

    #[test]
    fn test_builder() {
        let event = Event::new(EventKind::updated("user"))
            .with_subject(ContextValue::entity(EntityRef::new("user", "7")))
            .with_parameter("changed", Value::from("mail"));

        assert_eq!(event.kind, EventKind::updated("user"));
        assert_eq!(event.parameter("changed"), Some(&Value::from("mail")));
        assert!(event.subject.is_some());
    }

    #[test]
    fn test_group_purposes_deduplicate() {
        let event = Event::new(EventKind::Timer)
            .with_group(ContextGroup::new("forms"))
            .with_group(ContextGroup::new("views"))
            .with_group(ContextGroup::new("forms"));

        assert_eq!(event.group_purposes(), vec!["forms", "views"]);
    }
}
