use enumset::enum_set;
use enumset::EnumSet;
use enumset::EnumSetType;

use crate::containers::HashMap;
use crate::containers::StorageKey;
use crate::engine::VarId;

/// A change to the domain of a binary variable that watchers can subscribe to.
#[derive(Debug, EnumSetType)]
pub enum DomainEvent {
    /// The lower bound was tightened (the variable was fixed to 1).
    LowerBound,
    /// The upper bound was tightened (the variable was fixed to 0).
    UpperBound,
    /// The variable became fixed.
    Fixed,
}

/// A set of [`DomainEvent`]s to subscribe to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DomainEvents(EnumSet<DomainEvent>);

impl DomainEvents {
    /// Any change to the variable's domain.
    pub const ANY: DomainEvents = DomainEvents(enum_set!(
        DomainEvent::LowerBound | DomainEvent::UpperBound | DomainEvent::Fixed
    ));
    /// Only the event of the variable becoming fixed.
    pub const FIXED: DomainEvents = DomainEvents(enum_set!(DomainEvent::Fixed));

    pub fn contains(self, event: DomainEvent) -> bool {
        self.0.contains(event)
    }
}

/// Identifies a constraint registered with the notification engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConstraintId {
    pub id: u32,
}

impl StorageKey for ConstraintId {
    fn index(&self) -> usize {
        self.id as usize
    }

    fn create_from_index(index: usize) -> Self {
        ConstraintId { id: index as u32 }
    }
}

#[derive(Clone, Debug)]
struct Watcher {
    constraint: ConstraintId,
    events: DomainEvents,
}

/// Delivers bound-change events to the constraints watching each variable.
///
/// Delivery is eager dirty-marking: a notified constraint only clears its cached
/// "propagation fixpoint reached" flag, so notifications arriving re-entrantly during a
/// propagation pass are harmless.
#[derive(Debug, Default)]
pub struct NotificationEngine {
    watchers: HashMap<VarId, Vec<Watcher>>,
}

impl NotificationEngine {
    /// Subscribes `constraint` to the given events on `var`.
    pub fn subscribe(&mut self, var: VarId, constraint: ConstraintId, events: DomainEvents) {
        self.watchers
            .entry(var)
            .or_default()
            .push(Watcher { constraint, events });
    }

    /// Drops all subscriptions of `constraint` on `var`.
    pub fn unsubscribe(&mut self, var: VarId, constraint: ConstraintId) {
        if let Some(watchers) = self.watchers.get_mut(&var) {
            watchers.retain(|watcher| watcher.constraint != constraint);
        }
    }

    /// Delivers drained events, invoking `on_notify` once per (event, watcher) match.
    pub fn dispatch(
        &self,
        events: Vec<(VarId, DomainEvent)>,
        mut on_notify: impl FnMut(ConstraintId),
    ) {
        for (var, event) in events {
            let Some(watchers) = self.watchers.get(&var) else {
                continue;
            };
            for watcher in watchers {
                if watcher.events.contains(event) {
                    on_notify(watcher.constraint);
                }
            }
        }
    }
}
