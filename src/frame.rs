//! Execution frames and action brackets.
//!
//! A frame wraps the handling of one event: on entry it pushes the event's
//! context onto the stacks and swaps in a clean token scope, on exit it
//! restores both. A bracket wraps one action inside a frame, binding the
//! action's subject for exactly as long as the action runs. Both guarantee
//! cleanup even when the logic in between fails or forgets to pop.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::context::{
    ContextCollection, ContextValue, EngineContext, DEFAULT_PURPOSE,
};
use crate::event::Event;
use crate::token::TokenSnapshot;

/// Frame state for one event dispatch.
///
/// `enter` and `exit` never fail; `exit` is idempotent and also runs on drop
/// so a frame abandoned mid-dispatch cannot leak bindings into its parent.
#[derive(Debug)]
pub struct ExecutionFrame {
    context: EngineContext,
    saved: Option<TokenSnapshot>,
    pushed: Vec<(String, Arc<ContextCollection>)>,
    exited: bool,
}

impl ExecutionFrame {
    /// Enter a frame for `event`.
    ///
    /// Context groups the event carries are pushed onto their purpose
    /// stacks, one merged collection per purpose. The event subject, if any
    /// and not already bound, goes onto the default purpose stack under the
    /// name `entity`. The default purpose always records at least one
    /// collection, pushing an empty placeholder when nothing else was
    /// recorded, so `exit` has a deterministic unwind marker.
    #[instrument(level = "debug", skip_all, fields(kind = %event.kind))]
    pub fn enter(context: EngineContext, event: &Event) -> Self {
        let mut pushed: Vec<(String, Arc<ContextCollection>)> = Vec::new();

        for purpose in event.group_purposes() {
            let mut entries: Vec<(String, ContextValue)> = Vec::new();
            for group in event.groups.iter().filter(|g| g.purpose == purpose) {
                entries.extend(group.entries.iter().cloned());
            }
            let marker = context.stacks.push(purpose, ContextCollection::new(entries));
            pushed.push((purpose.to_string(), marker));
        }

        if let Some(subject) = &event.subject {
            let subject = subject.clone().normalized();
            let already_bound = context
                .stacks
                .get_context(DEFAULT_PURPOSE, "entity")
                .is_some_and(|bound| bound == subject);
            if !already_bound {
                let marker = context.stacks.add_context(DEFAULT_PURPOSE, "entity", subject);
                pushed.push((DEFAULT_PURPOSE.to_string(), marker));
            }
        }
        if !pushed.iter().any(|(purpose, _)| purpose == DEFAULT_PURPOSE) {
            let marker = context
                .stacks
                .push(DEFAULT_PURPOSE, ContextCollection::placeholder());
            pushed.push((DEFAULT_PURPOSE.to_string(), marker));
        }

        let saved = context.tokens.snapshot();
        context.tokens.clear();
        debug!(collections = pushed.len(), "entered execution frame");

        Self {
            context,
            saved: Some(saved),
            pushed,
            exited: false,
        }
    }

    /// Restore the token scope and unwind every collection this frame
    /// recorded, most recently pushed first. Calling `exit` again is a no-op.
    #[instrument(level = "debug", skip_all)]
    pub fn exit(&mut self) {
        if self.exited {
            return;
        }
        self.context.tokens.clear();
        self.context
            .tokens
            .restore(self.saved.take().unwrap_or_default());

        for (purpose, marker) in self.pushed.drain(..).rev() {
            self.context.stacks.unwind(&purpose, &marker);
        }
        self.exited = true;
        debug!("exited execution frame");
    }

    pub fn is_exited(&self) -> bool {
        self.exited
    }
}

impl Drop for ExecutionFrame {
    fn drop(&mut self) {
        if !self.exited {
            warn!("execution frame dropped without exit, unwinding now");
            self.exit();
        }
    }
}

/// Binds one action's subject on the default purpose stack while the action
/// executes.
///
/// Entities bind under `entity`; other values bind under the terminal
/// segment of their data-type name. A subject already bound to the same
/// value records no collection, making the paired [`ActionBracket::after`]
/// a no-op.
#[derive(Debug)]
pub struct ActionBracket {
    context: EngineContext,
    pushed: Option<Arc<ContextCollection>>,
}

impl ActionBracket {
    pub fn before(context: EngineContext, subject: Option<&ContextValue>) -> Self {
        let pushed = subject.and_then(|subject| {
            let subject = subject.clone().normalized();
            let key = subject.key().to_string();
            let already_bound = context
                .stacks
                .get_context(DEFAULT_PURPOSE, &key)
                .is_some_and(|bound| bound == subject);
            if already_bound {
                debug!(%key, "subject already bound, skipping push");
                None
            } else {
                Some(context.stacks.add_context(DEFAULT_PURPOSE, key, subject))
            }
        });
        Self { context, pushed }
    }

    /// Unwind the collection recorded by `before`, if any.
    pub fn after(&mut self) {
        if let Some(marker) = self.pushed.take() {
            self.context.stacks.unwind(DEFAULT_PURPOSE, &marker);
        }
    }
}

impl Drop for ActionBracket {
    fn drop(&mut self) {
        if self.pushed.is_some() {
            warn!("action bracket dropped without after, unwinding now");
            self.after();
        }
    }
}
