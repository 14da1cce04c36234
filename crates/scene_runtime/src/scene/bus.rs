//! Synchronous message bus
//!
//! Two indices are kept in lockstep: action → subscribed components (in
//! subscription order, which is delivery order) and component → actions, so a
//! removed component drops all of its subscriptions in one pass.

use std::collections::HashSet;

use log::{trace, warn};

use super::Scene;
use crate::ecs::{Action, ComponentId, Message};

impl Scene {
    /// Subscribe a component to an action
    ///
    /// Subscribing twice has the effect of subscribing once. Returns whether a
    /// new subscription was recorded.
    pub fn subscribe(&mut self, component: ComponentId, action: impl Into<Action>) -> bool {
        let action = action.into();
        if !self.is_attached(component) {
            warn!("Ignoring subscription of removed component {component:?} to {action}");
            return false;
        }
        let Some(actions) = self.subscriptions.entry(component).map(|e| e.or_default()) else {
            return false;
        };
        if !actions.insert(action.clone()) {
            return false;
        }
        self.subscribers.entry(action).or_default().push(component);
        true
    }

    /// Unsubscribe a component from an action; returns whether it was subscribed
    pub fn unsubscribe(&mut self, component: ComponentId, action: impl Into<Action>) -> bool {
        let action = action.into();
        let Some(actions) = self.subscriptions.get_mut(component) else {
            return false;
        };
        if !actions.remove(&action) {
            return false;
        }
        if actions.is_empty() {
            self.subscriptions.remove(component);
        }
        self.drop_subscriber(component, &action);
        true
    }

    /// Drop every subscription of a component
    pub(super) fn unsubscribe_all(&mut self, component: ComponentId) {
        let Some(actions) = self.subscriptions.remove(component) else {
            return;
        };
        for action in actions {
            self.drop_subscriber(component, &action);
        }
    }

    fn drop_subscriber(&mut self, component: ComponentId, action: &Action) {
        if let Some(list) = self.subscribers.get_mut(action) {
            list.retain(|c| *c != component);
            if list.is_empty() {
                self.subscribers.remove(action);
            }
        }
    }

    /// Whether the component currently receives `action`
    ///
    /// Wildcard subscribers receive every action.
    pub fn is_subscribed(&self, component: ComponentId, action: &Action) -> bool {
        self.subscriptions
            .get(component)
            .is_some_and(|actions| actions.contains(action) || actions.contains(&Action::ANY))
    }

    /// Actions a component is subscribed to
    pub fn subscriptions_of(&self, component: ComponentId) -> Vec<Action> {
        let mut actions: Vec<Action> = self
            .subscriptions
            .get(component)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        actions.sort();
        actions
    }

    /// Components subscribed to exactly `action`, in delivery order
    pub fn subscribers_of(&self, action: &Action) -> &[ComponentId] {
        self.subscribers.get(action).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Deliver a message synchronously to every subscriber
    ///
    /// Recipients are the subscribers of the message's action followed by the
    /// wildcard subscribers, snapshotted before the first handler runs. A
    /// component that is removed or unsubscribed by an earlier handler is
    /// skipped; components subscribing during dispatch first receive the next
    /// message. A recipient whose own hook is running further up the stack
    /// gets the message queued until that hook returns. Returns the number of
    /// recipients the message was handed to.
    pub fn send_message(&mut self, msg: &Message) -> usize {
        let action = msg.action();
        let mut recipients: Vec<ComponentId> = self.subscribers_of(action).to_vec();
        if !action.is_any() {
            let wildcard = self.subscribers_of(&Action::ANY);
            if !wildcard.is_empty() {
                let mut seen: HashSet<ComponentId> = recipients.iter().copied().collect();
                recipients.extend(wildcard.iter().copied().filter(|c| seen.insert(*c)));
            }
        }
        if recipients.is_empty() {
            return 0;
        }
        trace!("Dispatching {action} to {} subscribers", recipients.len());

        let mut delivered = 0;
        for component in recipients {
            if !self.is_subscribed(component, action) {
                continue;
            }
            if self.deliver(component, msg) {
                delivered += 1;
            }
        }
        delivered
    }
}
