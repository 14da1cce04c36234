//! Component attachment, lifecycle and typed lookup
//!
//! Components are stored in a slot map. While one of its hooks runs, a
//! component's behavior is taken out of its slot and handed a [`Context`]
//! over the whole scene; the slot remembers finish/remove requests and queues
//! messages published to it in the meantime, and they are completed as soon as
//! the behavior is put back.

use std::any::TypeId;
use std::collections::VecDeque;
use std::fmt;

use log::{debug, error, trace};

use super::{Scene, SceneError};
use crate::ecs::{Component, ComponentId, Context, EntityId, HookResult, Message};

/// Storage for one attached component
pub(super) struct ComponentSlot {
    owner: EntityId,
    type_id: TypeId,
    name: &'static str,
    /// `None` while a hook of this component is running
    behavior: Option<Box<dyn Component>>,
    finished: bool,
    finish_delivered: bool,
    /// Removal requested; the slot lingers until `on_remove` is delivered
    detached: bool,
    /// Messages published while the behavior was lent out
    pending: VecDeque<Message>,
}

#[derive(Debug, Clone, Copy)]
pub(super) enum Hook {
    Init,
    Update,
    Message,
    Finish,
    Remove,
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Init => "on_init",
            Self::Update => "on_update",
            Self::Message => "on_message",
            Self::Finish => "on_finish",
            Self::Remove => "on_remove",
        })
    }
}

impl Scene {
    /// Attach a component to an entity
    ///
    /// `on_init` runs synchronously before this returns; afterwards the
    /// component is listed in the entity's owned set. The entity may be live or
    /// still detached.
    pub fn add_component<C: Component>(
        &mut self,
        entity: EntityId,
        component: C,
    ) -> Result<ComponentId, SceneError> {
        self.add_boxed_component(entity, Box::new(component))
    }

    /// Attach an already boxed component
    pub fn add_boxed_component(
        &mut self,
        entity: EntityId,
        component: Box<dyn Component>,
    ) -> Result<ComponentId, SceneError> {
        if !self.entities.contains_key(&entity) {
            return Err(SceneError::UnknownEntity(entity));
        }
        let type_id = component.as_ref().as_any().type_id();
        let name = component.name();
        let id = self.components.insert(ComponentSlot {
            owner: entity,
            type_id,
            name,
            behavior: None,
            finished: false,
            finish_delivered: false,
            detached: false,
            pending: VecDeque::new(),
        });
        debug!("Attaching {name} ({id:?}) to entity {entity}");

        let mut behavior = component;
        let result = behavior.on_init(&mut Context::new(self, id, entity));
        report(Hook::Init, name, id, result);

        let detached = self.components.get(id).map_or(true, |slot| slot.detached);
        match self.entities.get_mut(&entity) {
            Some(owner) if !detached => owner.push_component(id),
            Some(_) => {}
            None => {
                // owner destroyed by its own component's on_init
                if let Some(slot) = self.components.get_mut(id) {
                    slot.detached = true;
                    slot.finished = true;
                }
            }
        }
        self.check_in(id, behavior);
        Ok(id)
    }

    /// Detach a component from its owner
    ///
    /// Delivers `on_finish` (unless already delivered) then `on_remove`, drops
    /// every subscription and removes it from the owner's set. Returns `false`
    /// for a component that is already removed. When called on a component
    /// whose hook is currently running, index cleanup happens immediately and
    /// the hooks run as soon as that hook returns.
    pub fn remove_component(&mut self, id: ComponentId) -> bool {
        let Some(slot) = self.components.get_mut(id) else {
            return false;
        };
        if slot.detached {
            return false;
        }
        slot.detached = true;
        slot.finished = true;
        let owner = slot.owner;
        let behavior = slot.behavior.take();

        self.unsubscribe_all(id);
        if let Some(entity) = self.entities.get_mut(&owner) {
            entity.drop_component(id);
        }
        if let Some(behavior) = behavior {
            self.check_in(id, behavior);
        }
        true
    }

    /// Mark a component finished
    ///
    /// It stays attached and subscribed but receives no further `on_update`.
    /// `on_finish` is delivered once. Returns `false` if already finished or
    /// unknown.
    pub fn finish_component(&mut self, id: ComponentId) -> bool {
        let Some(slot) = self.components.get_mut(id) else {
            return false;
        };
        if slot.finished {
            return false;
        }
        slot.finished = true;
        if let Some(behavior) = slot.behavior.take() {
            self.check_in(id, behavior);
        }
        true
    }

    /// Run one hook of a component
    ///
    /// Returns `false` when the component is gone or its behavior is already
    /// lent out to a hook further up the stack.
    pub(super) fn run_hook<F>(&mut self, id: ComponentId, hook: Hook, call: F) -> bool
    where
        F: FnOnce(&mut dyn Component, &mut Context<'_>) -> HookResult,
    {
        let Some(slot) = self.components.get_mut(id) else {
            return false;
        };
        if slot.detached {
            return false;
        }
        let Some(mut behavior) = slot.behavior.take() else {
            debug!("Skipping re-entrant {hook} for {} ({id:?})", slot.name);
            return false;
        };
        let (owner, name) = (slot.owner, slot.name);

        let result = call(behavior.as_mut(), &mut Context::new(self, id, owner));
        report(hook, name, id, result);
        self.check_in(id, behavior);
        true
    }

    /// Deliver one message to a component
    ///
    /// A component whose behavior is lent out to a hook further up the stack
    /// gets the message queued and handled as soon as that hook returns.
    pub(super) fn deliver(&mut self, id: ComponentId, msg: &Message) -> bool {
        let Some(slot) = self.components.get_mut(id) else {
            return false;
        };
        if slot.detached {
            return false;
        }
        if slot.behavior.is_none() {
            trace!("Queueing {} for busy {} ({id:?})", msg.action(), slot.name);
            slot.pending.push_back(msg.clone());
            return true;
        }
        self.run_hook(id, Hook::Message, |c, ctx| c.on_message(ctx, msg))
    }

    /// Put a lent-out behavior back, completing pending finish/remove requests
    /// and queued messages
    fn check_in(&mut self, id: ComponentId, mut behavior: Box<dyn Component>) {
        loop {
            let Some(slot) = self.components.get_mut(id) else {
                return;
            };
            let (owner, name) = (slot.owner, slot.name);

            if slot.finished && !slot.finish_delivered {
                slot.finish_delivered = true;
                let result = behavior.on_finish(&mut Context::new(self, id, owner));
                report(Hook::Finish, name, id, result);
                continue;
            }

            if slot.detached {
                slot.pending.clear();
                let result = behavior.on_remove(&mut Context::new(self, id, owner));
                report(Hook::Remove, name, id, result);
                // hooks may have subscribed again on their way out
                self.unsubscribe_all(id);
                self.components.remove(id);
                debug!("Removed {name} ({id:?}) from entity {owner}");
                return;
            }

            if let Some(msg) = slot.pending.pop_front() {
                if self.is_subscribed(id, msg.action()) {
                    let result = behavior.on_message(&mut Context::new(self, id, owner), &msg);
                    report(Hook::Message, name, id, result);
                }
                continue;
            }

            slot.behavior = Some(behavior);
            return;
        }
    }

    pub(super) fn is_runnable(&self, id: ComponentId, owner: EntityId) -> bool {
        self.components
            .get(id)
            .is_some_and(|slot| slot.owner == owner && !slot.detached && !slot.finished)
    }

    /// Whether the component is attached (not removed)
    pub fn is_attached(&self, id: ComponentId) -> bool {
        self.components.get(id).is_some_and(|slot| !slot.detached)
    }

    /// Whether the component has been finished; `false` for unknown ids
    pub fn is_finished(&self, id: ComponentId) -> bool {
        self.components.get(id).is_some_and(|slot| slot.finished)
    }

    /// Owning entity of an attached component
    pub fn component_owner(&self, id: ComponentId) -> Option<EntityId> {
        self.attached_slot(id).map(|slot| slot.owner)
    }

    /// Name the component reported when attached
    pub fn component_name(&self, id: ComponentId) -> Option<&'static str> {
        self.attached_slot(id).map(|slot| slot.name)
    }

    /// Attached components of an entity in insertion order
    pub fn components_of(&self, entity: EntityId) -> &[ComponentId] {
        self.entities.get(&entity).map(|e| e.components()).unwrap_or(&[])
    }

    /// First component of type `T` on the entity
    pub fn find_component<T: Component>(&self, entity: EntityId) -> Option<ComponentId> {
        let wanted = TypeId::of::<T>();
        self.components_of(entity)
            .iter()
            .copied()
            .find(|id| self.attached_slot(*id).is_some_and(|slot| slot.type_id == wanted))
    }

    /// First component on the entity whose name matches
    pub fn find_component_by_name(&self, entity: EntityId, name: &str) -> Option<ComponentId> {
        self.components_of(entity)
            .iter()
            .copied()
            .find(|id| self.attached_slot(*id).is_some_and(|slot| slot.name == name))
    }

    /// Typed access to a component
    ///
    /// `None` if the id is unknown, of another type, or the component's own
    /// hook is currently running.
    pub fn component<T: Component>(&self, id: ComponentId) -> Option<&T> {
        self.attached_slot(id)?.behavior.as_deref()?.as_any().downcast_ref()
    }

    /// Typed mutable access to a component
    pub fn component_mut<T: Component>(&mut self, id: ComponentId) -> Option<&mut T> {
        let slot = self.components.get_mut(id).filter(|slot| !slot.detached)?;
        slot.behavior.as_deref_mut()?.as_any_mut().downcast_mut()
    }

    /// First component of type `T` on the entity, borrowed
    pub fn get_component<T: Component>(&self, entity: EntityId) -> Option<&T> {
        self.component(self.find_component::<T>(entity)?)
    }

    /// First component of type `T` on the entity, mutably borrowed
    pub fn get_component_mut<T: Component>(&mut self, entity: EntityId) -> Option<&mut T> {
        let id = self.find_component::<T>(entity)?;
        self.component_mut(id)
    }

    fn attached_slot(&self, id: ComponentId) -> Option<&ComponentSlot> {
        self.components.get(id).filter(|slot| !slot.detached)
    }
}

fn report(hook: Hook, name: &str, id: ComponentId, result: HookResult) {
    if let Err(err) = result {
        error!("{hook} of {name} ({id:?}) failed: {err}");
    }
}
