//! Listener registry for change notifications.
//!
//! Owners publish while still holding their own state lock. Values are queued
//! in that order and delivered by whichever publisher finds the queue idle, so
//! notifications reach listeners in the order the mutations happened. No lock
//! is held while a listener runs: listeners may read the owner, mutate it
//! (their own notification is queued behind the current one) or unsubscribe.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Registry<T> {
    next_id: u64,
    /// (id, first sequence number the listener may see, callback)
    listeners: Vec<(u64, u64, Listener<T>)>,
}

struct Outbox<T> {
    next_seq: u64,
    queue: VecDeque<(u64, T)>,
    draining: bool,
}

/// A set of callbacks interested in values of type `T`.
pub struct Listeners<T> {
    registry: Arc<Mutex<Registry<T>>>,
    outbox: Mutex<Outbox<T>>,
}

impl<T: 'static> Listeners<T> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry { next_id: 0, listeners: Vec::new() })),
            outbox: Mutex::new(Outbox { next_seq: 0, queue: VecDeque::new(), draining: false }),
        }
    }

    /// Register a callback. It receives every value published from now on.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        // Lock order: outbox, then registry.
        let outbox = self.outbox.lock();
        let id = {
            let mut registry = self.registry.lock();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.listeners.push((id, outbox.next_seq, Arc::new(listener)));
            id
        };
        drop(outbox);

        let weak = Arc::downgrade(&self.registry);
        Subscription {
            id,
            detach: Box::new(move |id| {
                if let Some(registry) = weak.upgrade() {
                    registry.lock().listeners.retain(|(lid, _, _)| *lid != id);
                }
            }),
        }
    }

    /// Deliver `value` to every listener.
    ///
    /// `state_guard` is the caller's lock over the state `value` was taken
    /// from; it is released once the value has its place in the queue.
    pub fn publish<G>(&self, state_guard: G, value: T) {
        self.publish_all(state_guard, std::iter::once(value));
    }

    /// Like `publish`, for several values produced under one guard.
    pub fn publish_all<G, I>(&self, state_guard: G, values: I)
    where
        I: IntoIterator<Item = T>,
    {
        {
            let mut outbox = self.outbox.lock();
            for value in values {
                let seq = outbox.next_seq;
                outbox.next_seq += 1;
                outbox.queue.push_back((seq, value));
            }
            if outbox.draining {
                return;
            }
            outbox.draining = true;
        }
        drop(state_guard);
        self.drain();
    }

    fn drain(&self) {
        let _reset = ResetOnPanic(&self.outbox);
        loop {
            let (seq, value) = {
                let mut outbox = self.outbox.lock();
                match outbox.queue.pop_front() {
                    Some(next) => next,
                    None => {
                        outbox.draining = false;
                        return;
                    }
                }
            };

            let listeners: Vec<Listener<T>> = self
                .registry
                .lock()
                .listeners
                .iter()
                .filter(|(_, since, _)| *since <= seq)
                .map(|(_, _, l)| l.clone())
                .collect();

            for listener in &listeners {
                listener(&value);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.registry.lock().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: 'static> Default for Listeners<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Hands the queue to the next publisher if a listener panics mid-delivery.
struct ResetOnPanic<'a, T>(&'a Mutex<Outbox<T>>);

impl<T> Drop for ResetOnPanic<'_, T> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.lock().draining = false;
        }
    }
}

/// Handle returned by `subscribe`.
///
/// Dropping it does not unsubscribe; call [`Subscription::unsubscribe`].
pub struct Subscription {
    id: u64,
    detach: Box<dyn Fn(u64) + Send + Sync>,
}

impl Subscription {
    /// Stop receiving notifications. Calling it again is a no-op.
    pub fn unsubscribe(&self) {
        (self.detach)(self.id);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
