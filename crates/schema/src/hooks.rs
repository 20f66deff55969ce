//! Lifecycle hooks
//!
//! Pre hooks run before `save`, `remove` or `index` and may veto the
//! operation by returning an error message; the operation then fails with
//! `Error::HookRejected`. Post hooks run after the operation succeeded and
//! cannot fail it. Hooks of one event run in registration order.

use settee_core::{Error, Lifecycle, Result};
use std::fmt;
use std::sync::Arc;

use crate::node::FieldAccess;

/// Hook run before an operation
pub type PreHookFn =
    Arc<dyn Fn(&mut dyn FieldAccess) -> std::result::Result<(), String> + Send + Sync>;

/// Hook run after an operation
pub type PostHookFn = Arc<dyn Fn(&dyn FieldAccess) + Send + Sync>;

/// Registered hooks of one schema
#[derive(Clone, Default)]
pub struct HookQueue {
    pre: Vec<(Lifecycle, PreHookFn)>,
    post: Vec<(Lifecycle, PostHookFn)>,
}

impl HookQueue {
    /// Empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pre hook
    pub fn add_pre(&mut self, event: Lifecycle, hook: PreHookFn) {
        self.pre.push((event, hook));
    }

    /// Register a post hook
    pub fn add_post(&mut self, event: Lifecycle, hook: PostHookFn) {
        self.post.push((event, hook));
    }

    /// Number of hooks registered for `event`
    pub fn count(&self, event: Lifecycle) -> usize {
        self.pre.iter().filter(|(e, _)| *e == event).count()
            + self.post.iter().filter(|(e, _)| *e == event).count()
    }

    /// Check if no hooks are registered
    pub fn is_empty(&self) -> bool {
        self.pre.is_empty() && self.post.is_empty()
    }

    /// Run the pre hooks of `event`, stopping at the first rejection
    pub fn run_pre(&self, event: Lifecycle, doc: &mut dyn FieldAccess) -> Result<()> {
        for (_, hook) in self.pre.iter().filter(|(e, _)| *e == event) {
            hook(doc).map_err(|reason| Error::HookRejected {
                hook: event.as_str().to_string(),
                reason,
            })?;
        }
        Ok(())
    }

    /// Run the post hooks of `event`
    pub fn run_post(&self, event: Lifecycle, doc: &dyn FieldAccess) {
        for (_, hook) in self.post.iter().filter(|(e, _)| *e == event) {
            hook(doc);
        }
    }
}

impl fmt::Debug for HookQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookQueue")
            .field("pre", &self.pre.iter().map(|(e, _)| *e).collect::<Vec<_>>())
            .field("post", &self.post.iter().map(|(e, _)| *e).collect::<Vec<_>>())
            .finish()
    }
}

/// Something hooks can be registered on
pub trait Hookable: Sized {
    /// The queue hooks are added to
    fn hook_queue(&mut self) -> &mut HookQueue;

    /// Register a pre hook for `event`
    fn pre<F>(mut self, event: Lifecycle, hook: F) -> Self
    where
        F: Fn(&mut dyn FieldAccess) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        self.hook_queue().add_pre(event, Arc::new(hook));
        self
    }

    /// Register a post hook for `event`
    fn post<F>(mut self, event: Lifecycle, hook: F) -> Self
    where
        F: Fn(&dyn FieldAccess) + Send + Sync + 'static,
    {
        self.hook_queue().add_post(event, Arc::new(hook));
        self
    }
}
