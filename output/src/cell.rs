use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::{Context, Dependencies, ElementType, Error, Resolved, Value};

/// Terminal (or not-yet-terminal) outcome stored in a cell.
pub(crate) type Outcome = Result<Resolved<Value>, Error>;

/// Resolution state of an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Pending,
    Resolved,
    Rejected,
}

/// Shared promise state behind every output handle.
///
/// `outcome` is `None` while pending and is written exactly once;
/// later attempts to fulfill the cell are ignored.
pub(crate) struct Cell {
    outcome: Mutex<Option<Outcome>>,
    cond: Condvar,
    element: ElementType,
    deps: Dependencies,
}

impl Cell {
    pub fn new(element: ElementType, deps: Dependencies) -> Self {
        Self {
            outcome: Mutex::new(None),
            cond: Condvar::new(),
            element,
            deps,
        }
    }

    pub fn element_type(&self) -> ElementType {
        self.element
    }

    pub fn dependencies(&self) -> &Dependencies {
        &self.deps
    }

    pub fn state(&self) -> State {
        match &*self.outcome.lock() {
            None => State::Pending,
            Some(Ok(_)) => State::Resolved,
            Some(Err(_)) => State::Rejected,
        }
    }

    /// Settle the cell if it is still pending.
    /// Returns true if this call was the one that settled it.
    pub fn fulfill(&self, outcome: Outcome) -> bool {
        let fulfilled = {
            let mut slot = self.outcome.lock();
            if slot.is_some() {
                false
            } else {
                *slot = Some(outcome);
                true
            }
        };
        self.cond.notify_all();
        fulfilled
    }

    /// Wake all waiters so they re-check their contexts.
    pub fn wake(&self) {
        // taking the lock orders this wakeup after any waiter's context check:
        drop(self.outcome.lock());
        self.cond.notify_all();
    }

    /// Block until the cell is settled or `ctx` is done.
    ///
    /// A context that is already done only matters while the cell is pending;
    /// a settled cell always reports its outcome.
    pub fn wait(self: &Arc<Self>, ctx: &Context) -> Outcome {
        let _watch = ctx.watch(self);
        let mut slot = self.outcome.lock();
        loop {
            if let Some(outcome) = slot.as_ref() {
                return outcome.clone();
            }
            if let Some(err) = ctx.err() {
                return Err(err);
            }
            match ctx.deadline() {
                Some(deadline) => {
                    self.cond.wait_until(&mut slot, deadline);
                }
                None => self.cond.wait(&mut slot),
            }
        }
    }
}
