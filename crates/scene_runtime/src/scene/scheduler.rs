//! Per-tick scheduling: delayed invocations and the update traversal

use std::mem;

use log::{trace, warn};

use super::components::Hook;
use super::Scene;
use crate::ecs::EntityId;

/// Callback run once after a delay
pub(super) struct DelayedInvocation {
    delay: f64,
    elapsed: f64,
    callback: Box<dyn FnOnce(&mut Scene)>,
}

impl Scene {
    /// Run `callback` once, in the first tick where at least `delay_ms` has
    /// elapsed since scheduling
    ///
    /// A delay of zero fires on the next tick. There is no cancellation; a
    /// `clear()` drops everything still pending.
    pub fn invoke_with_delay<F>(&mut self, delay_ms: f64, callback: F)
    where
        F: FnOnce(&mut Self) + 'static,
    {
        self.delayed.push(DelayedInvocation {
            delay: delay_ms.max(0.0),
            elapsed: 0.0,
            callback: Box::new(callback),
        });
        if self.delayed.len() > self.config.max_delayed {
            warn!(
                "{} delayed invocations pending (soft limit {})",
                self.delayed.len(),
                self.config.max_delayed
            );
        }
    }

    /// Number of delayed invocations that have not fired yet
    pub fn pending_invocations(&self) -> usize {
        self.delayed.len()
    }

    /// Advance the scene by one frame
    ///
    /// Fires due delayed invocations in scheduling order, then runs
    /// `on_update` over the live tree: an entity's own components in insertion
    /// order, then its children in render-tree order. `delta` reaches
    /// `on_update` as supplied; only the delay queue ignores negative steps.
    pub fn tick(&mut self, delta: f64, absolute: f64) {
        self.absolute = absolute;
        self.fire_due(delta.max(0.0));
        let root = self.root;
        self.update_entity(root, delta, absolute);
    }

    fn fire_due(&mut self, delta: f64) {
        if self.delayed.is_empty() {
            return;
        }
        let mut due = Vec::new();
        for mut invocation in mem::take(&mut self.delayed) {
            invocation.elapsed += delta;
            if invocation.elapsed >= invocation.delay {
                due.push(invocation);
            } else {
                self.delayed.push(invocation);
            }
        }
        if due.is_empty() {
            return;
        }

        trace!("Firing {} delayed invocations", due.len());
        let generation = self.generation;
        for invocation in due {
            (invocation.callback)(self);
            if self.generation != generation {
                // scene was cleared; remaining callbacks belong to the old world
                break;
            }
        }
    }

    fn update_entity(&mut self, id: EntityId, delta: f64, absolute: f64) {
        let generation = self.generation;
        let Some(entity) = self.entities.get(&id) else {
            return;
        };
        let components = entity.components().to_vec();
        for component in components {
            if !self.is_runnable(component, id) {
                continue;
            }
            self.run_hook(component, Hook::Update, |c, ctx| c.on_update(ctx, delta, absolute));
            if self.generation != generation {
                return;
            }
        }

        let Some(entity) = self.entities.get(&id) else {
            return;
        };
        let children = entity.children().to_vec();
        for child in children {
            let still_ours = self.entities.get(&child).is_some_and(|c| c.parent() == Some(id));
            if still_ours {
                self.update_entity(child, delta, absolute);
                if self.generation != generation {
                    return;
                }
            }
        }
    }
}
