//! Typed publish/subscribe for engine events.
//!
//! Handlers run synchronously, in registration order, on the thread that
//! emits. That ordering is load-bearing: `BeforeTransaction` subscribers must
//! have flushed their pending field values before the engine copies the
//! tree, and `Transaction` events must arrive in the order commands were
//! applied.
//!
//! # Example
//!
//! ```ignore
//! let token = engine.subscribe(Topic::Transaction, |event| {
//!     if let EngineEvent::Transaction { seq, .. } = event {
//!         tracing::info!(seq, "tree changed");
//!     }
//! });
//! engine.unsubscribe(token);
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use crate::engine::EditorState;
use crate::render::Signature;
use crate::{Attributes, BlockId, CommandError};

// ============================================================================
// Generic bus
// ============================================================================

/// Trait for events that know which topic they belong to.
pub trait HasTopic {
    type Topic: Copy + Eq + std::fmt::Debug;

    /// Get the topic for this event.
    fn topic(&self) -> Self::Topic;
}

/// Handle returned by [`EventBus::subscribe`]; pass it back to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionToken(u64);

type Handler<E> = Box<dyn Fn(&E)>;

/// Synchronous, registration-ordered event bus.
pub struct EventBus<E: HasTopic> {
    handlers: Vec<(SubscriptionToken, E::Topic, Handler<E>)>,
    next_token: u64,
}

impl<E: HasTopic> EventBus<E> {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            next_token: 0,
        }
    }

    /// Register a handler for one topic.
    pub fn subscribe<F>(&mut self, topic: E::Topic, handler: F) -> SubscriptionToken
    where
        F: Fn(&E) + 'static,
    {
        let token = SubscriptionToken(self.next_token);
        self.next_token += 1;
        self.handlers.push((token, topic, Box::new(handler)));
        token
    }

    /// Remove a handler. Returns false if the token was unknown.
    pub fn unsubscribe(&mut self, token: SubscriptionToken) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(t, _, _)| *t != token);
        self.handlers.len() != before
    }

    /// Deliver an event to every handler of its topic. Returns how many ran.
    pub fn emit(&self, event: &E) -> usize {
        let topic = event.topic();
        let mut delivered = 0;
        for (_, handler_topic, handler) in &self.handlers {
            if *handler_topic == topic {
                handler(event);
                delivered += 1;
            }
        }
        delivered
    }
}

impl<E: HasTopic> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: HasTopic> std::fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field(
                "handlers",
                &self.handlers.iter().map(|(t, topic, _)| (t, topic)).collect::<Vec<_>>(),
            )
            .finish()
    }
}

// ============================================================================
// Engine events
// ============================================================================

/// Engine event topics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Topic {
    BeforeTransaction,
    Transaction,
    FragmentAttached,
    Error,
}

/// Collector handed to `BeforeTransaction` subscribers.
///
/// Subscribers push attribute values they hold outside the tree; the engine
/// merges them into the working copy before running the command.
#[derive(Clone, Debug, Default)]
pub struct Writeback(Rc<RefCell<Vec<(BlockId, Attributes)>>>);

impl Writeback {
    /// Queue attribute values for a block.
    pub fn push(&self, id: BlockId, attributes: Attributes) {
        if !attributes.is_empty() {
            self.0.borrow_mut().push((id, attributes));
        }
    }

    /// Check if anything was queued.
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub(crate) fn take(&self) -> Vec<(BlockId, Attributes)> {
        std::mem::take(&mut *self.0.borrow_mut())
    }
}

/// Events emitted by the [`Engine`](crate::Engine).
#[derive(Clone, Debug)]
pub enum EngineEvent {
    /// A command is about to copy the tree. Flush pending values now.
    BeforeTransaction {
        command: &'static str,
        writeback: Writeback,
    },
    /// A command was applied; `state` is the newly installed state.
    Transaction {
        command: &'static str,
        /// Monotonic transaction counter.
        seq: u64,
        state: EditorState,
    },
    /// A block's editing fragment was attached (from seed, cache, or fetch).
    FragmentAttached { id: BlockId, signature: Signature },
    /// A command was rejected. The tree is unchanged.
    Error {
        command: &'static str,
        error: CommandError,
    },
}

impl HasTopic for EngineEvent {
    type Topic = Topic;

    fn topic(&self) -> Topic {
        match self {
            EngineEvent::BeforeTransaction { .. } => Topic::BeforeTransaction,
            EngineEvent::Transaction { .. } => Topic::Transaction,
            EngineEvent::FragmentAttached { .. } => Topic::FragmentAttached,
            EngineEvent::Error { .. } => Topic::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug)]
    struct Ping(&'static str);

    impl HasTopic for Ping {
        type Topic = &'static str;
        fn topic(&self) -> &'static str {
            self.0
        }
    }

    #[test]
    fn test_delivery_in_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::<Ping>::new();

        for n in 0..3 {
            let log = log.clone();
            bus.subscribe("a", move |_| log.borrow_mut().push(n));
        }
        let other = log.clone();
        bus.subscribe("b", move |_| other.borrow_mut().push(99));

        assert_eq!(bus.emit(&Ping("a")), 3);
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn test_unsubscribe_by_token() {
        let count = Rc::new(RefCell::new(0));
        let mut bus = EventBus::<Ping>::new();
        let c = count.clone();
        let token = bus.subscribe("a", move |_| *c.borrow_mut() += 1);

        bus.emit(&Ping("a"));
        assert!(bus.unsubscribe(token));
        assert!(!bus.unsubscribe(token));
        bus.emit(&Ping("a"));

        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn test_writeback_ignores_empty_sets() {
        let wb = Writeback::default();
        wb.push(BlockId::new("x"), Attributes::new());
        assert!(wb.is_empty());

        let mut attrs = Attributes::new();
        attrs.insert("title".into(), "hi".into());
        wb.push(BlockId::new("x"), attrs);
        assert!(!wb.is_empty());
        assert_eq!(wb.take().len(), 1);
        assert!(wb.is_empty());
    }
}
