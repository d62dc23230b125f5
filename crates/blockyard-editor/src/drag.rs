//! Drag sessions and the deferred command queue.
//!
//! Pointer handlers never mutate the tree directly. `over` only enqueues a
//! move; the host drains the queue at a fixed point of its update loop, so
//! hover storms collapse into at most one pending move and every mutation
//! goes through the normal transaction protocol.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::position::{DropTarget, resolve_position};
use crate::{BlockId, Command, Engine, Outcome, Position, Tree};

/// FIFO of commands waiting to be dispatched.
#[derive(Clone, Debug, Default)]
pub struct CommandQueue {
    pending: VecDeque<Command>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: Command) {
        self.pending.push_back(command);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop everything pending without dispatching.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Dispatch every pending command in order.
    pub fn drain_into(&mut self, engine: &mut Engine) -> Vec<Outcome> {
        self.pending
            .drain(..)
            .map(|command| engine.dispatch(command))
            .collect()
    }
}

#[derive(Debug)]
struct Session {
    active: BlockId,
    /// Tree as it was when the drag started.
    snapshot: Arc<Tree>,
    /// Last placement enqueued, to drop repeats while hovering.
    last: Option<Position>,
}

/// Tracks one drag at a time.
#[derive(Debug, Default)]
pub struct DragController {
    session: Option<Session>,
    queue: CommandQueue,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin dragging `id`, capturing the current snapshot for cancel.
    ///
    /// Returns false (and starts nothing) if the block does not exist.
    pub fn start(&mut self, engine: &Engine, id: &BlockId) -> bool {
        if !engine.units().contains(id) {
            return false;
        }
        if let Some(previous) = self.session.take() {
            tracing::debug!(active = %previous.active, "drag restarted before end");
        }
        self.queue.clear();
        self.session = Some(Session {
            active: id.clone(),
            snapshot: engine.snapshot(),
            last: None,
        });
        true
    }

    /// Pointer moved over `target`. Enqueues a move when it resolves to a
    /// new placement; returns the placement that was enqueued.
    pub fn over(&mut self, engine: &Engine, target: &DropTarget) -> Option<Position> {
        let session = self.session.as_mut()?;
        let position = resolve_position(&session.active, target, engine.units())?;

        if session.last.as_ref() == Some(&position)
            || engine.units().position_of(&session.active).as_ref() == Some(&position)
        {
            return None;
        }

        session.last = Some(position.clone());
        // Only the latest placement matters.
        self.queue.clear();
        self.queue.push(Command::MoveToPosition {
            id: session.active.clone(),
            position: position.clone(),
        });
        Some(position)
    }

    /// Apply queued moves. Call at the host's update point.
    pub fn flush(&mut self, engine: &mut Engine) -> Vec<Outcome> {
        let outcomes = self.queue.drain_into(engine);
        if let Some(session) = &mut self.session {
            session.last = None;
        }
        outcomes
    }

    /// Drop: apply anything pending and finish the session.
    pub fn end(&mut self, engine: &mut Engine) -> Vec<Outcome> {
        let outcomes = self.flush(engine);
        self.session = None;
        outcomes
    }

    /// Abort: discard pending moves and put the drag-start tree back.
    pub fn cancel(&mut self, engine: &mut Engine) -> Outcome {
        self.queue.clear();
        match self.session.take() {
            Some(session) => engine.restore(session.snapshot),
            None => Outcome::Unchanged,
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn active_id(&self) -> Option<&BlockId> {
        self.session.as_ref().map(|s| &s.active)
    }

    /// Commands waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}
