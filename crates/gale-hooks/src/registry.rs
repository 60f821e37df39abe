//! Hook registry.
//!
//! Maintains a priority-sorted collection of [`HookHandler`] instances per
//! [`HookPoint`]. The registry is the source of truth for which hooks are
//! active and what order they run in.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::handler::HookHandler;
use crate::types::HookPoint;

/// Handle returned on registration, used to remove the handler later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

struct Entry {
    id: HookId,
    handler: Arc<dyn HookHandler>,
}

/// Registry of hook handlers.
///
/// Handlers are organized by [`HookPoint`] and sorted by priority (descending)
/// within each point. The sort is stable, so equal priorities keep
/// registration order.
#[derive(Default)]
pub struct HookRegistry {
    hooks: HashMap<HookPoint, Vec<Entry>>,
    next_id: u64,
}

impl HookRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook handler.
    ///
    /// If a handler with the same name already exists for the same point, it
    /// is replaced.
    pub fn register(&mut self, handler: Arc<dyn HookHandler>) -> HookId {
        let point = handler.point();
        let name = handler.name().to_string();
        self.next_id += 1;
        let id = HookId(self.next_id);

        let handlers = self.hooks.entry(point).or_default();
        handlers.retain(|e| e.handler.name() != name);

        debug!(name = %name, point = %point, priority = handler.priority(), "Registering hook");
        handlers.push(Entry { id, handler });
        handlers.sort_by_key(|e| std::cmp::Reverse(e.handler.priority()));
        id
    }

    /// Unregister a handler by ID. Returns `true` if it was found.
    pub fn unregister(&mut self, id: HookId) -> bool {
        self.remove_where(|e| e.id == id)
    }

    /// Unregister every handler with the given name, across all points.
    pub fn unregister_named(&mut self, name: &str) -> bool {
        self.remove_where(|e| e.handler.name() == name)
    }

    fn remove_where(&mut self, pred: impl Fn(&Entry) -> bool) -> bool {
        let mut found = false;
        for handlers in self.hooks.values_mut() {
            let before_len = handlers.len();
            handlers.retain(|e| !pred(e));
            found |= handlers.len() < before_len;
        }
        found
    }

    /// Handlers for a point, in execution order.
    #[must_use]
    pub fn get_handlers(&self, point: HookPoint) -> Vec<Arc<dyn HookHandler>> {
        self.hooks
            .get(&point)
            .map(|entries| entries.iter().map(|e| Arc::clone(&e.handler)).collect())
            .unwrap_or_default()
    }

    /// Whether any handler is registered for `point`.
    #[must_use]
    pub fn has(&self, point: HookPoint) -> bool {
        self.hooks.get(&point).is_some_and(|h| !h.is_empty())
    }

    /// Get the total number of registered handlers.
    #[must_use]
    pub fn count(&self) -> usize {
        self.hooks.values().map(Vec::len).sum()
    }

    /// Clear handlers of one point, or all of them.
    pub fn clear(&mut self, point: Option<HookPoint>) {
        match point {
            Some(point) => {
                let _ = self.hooks.remove(&point);
            }
            None => self.hooks.clear(),
        }
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("hook_count", &self.count())
            .finish()
    }
}
