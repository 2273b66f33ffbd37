//! Subscription plumbing.
//!
//! Two kinds of subscriber exist. Adapters subscribe to a [`Topic`] through the
//! [`Hub`], which only records *who* is interested; the session looks the
//! subscribers up and calls into the adapter arena itself. Hosts subscribe to
//! outward events with plain closures held by [`Listeners`].
//!
//! Both are built on [`Registry`], which keeps entries in subscription order and
//! hands out a [`Subscription`] token per entry. Dropping the token does nothing;
//! only [`Registry::remove`] ends a subscription.

use crate::patch::NodeId;

/// Token for one registry entry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Subscription(u64);

/// Entries in subscription order, each addressed by a token.
pub struct Registry<T> {
    next: u64,
    entries: Vec<(Subscription, T)>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self { next: 0, entries: Vec::new() }
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, value: T) -> Subscription {
        let token = Subscription(self.next);
        self.next += 1;
        self.entries.push((token, value));
        token
    }

    /// Remove an entry. Removing twice is a no-op.
    pub fn remove(&mut self, token: Subscription) -> Option<T> {
        let pos = self.entries.iter().position(|(t, _)| *t == token)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn contains(&self, token: Subscription) -> bool {
        self.entries.iter().any(|(t, _)| *t == token)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Subscription, &T)> {
        self.entries.iter().map(|(t, v)| (*t, v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Subscription, &mut T)> {
        self.entries.iter_mut().map(|(t, v)| (*t, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outward event listeners.
pub struct Listeners<E> {
    registry: Registry<Box<dyn FnMut(&E)>>,
}

impl<E> Default for Listeners<E> {
    fn default() -> Self {
        Self { registry: Registry::new() }
    }
}

impl<E> Listeners<E> {
    pub fn subscribe(&mut self, f: impl FnMut(&E) + 'static) -> Subscription {
        self.registry.insert(Box::new(f))
    }

    pub fn unsubscribe(&mut self, token: Subscription) -> bool {
        self.registry.remove(token).is_some()
    }

    /// Call every listener in subscription order.
    pub fn emit(&mut self, event: &E) {
        for (_, f) in self.registry.iter_mut() {
            f(event);
        }
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }
}

/// What an adapter can subscribe to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Topic {
    ContextReplaced,
    Play,
    Stop,
    /// Parameter changes of one node
    Parameter(NodeId),
}

/// Adapter subscriptions, keyed by topic.
#[derive(Default)]
pub struct Hub {
    registry: Registry<(Topic, NodeId)>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, topic: Topic, node: NodeId) -> Subscription {
        self.registry.insert((topic, node))
    }

    pub fn unsubscribe(&mut self, token: Subscription) -> bool {
        self.registry.remove(token).is_some()
    }

    /// Snapshot of the nodes subscribed to `topic`, in subscription order.
    ///
    /// Delivery iterates the snapshot, so a subscriber that unsubscribes and
    /// resubscribes while handling the event is not called twice.
    pub fn subscribers(&self, topic: Topic) -> Vec<NodeId> {
        self.registry
            .iter()
            .filter(|(_, (t, _))| *t == topic)
            .map(|(_, (_, node))| *node)
            .collect()
    }

    /// Number of live subscriptions held for `node`.
    pub fn count_for(&self, node: NodeId) -> usize {
        self.registry.iter().filter(|(_, (_, n))| *n == node).count()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }
}
