use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::cell::Cell;
use crate::Error;

/// Cancellation token threaded through awaits and appliers.
///
/// Cloning a `Context` shares the same token. Canceling a context cancels
/// all of its children, and wakes every task currently blocked awaiting
/// an output under it.
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

struct Inner {
    /// false for background contexts, which are never canceled.
    cancelable: bool,
    deadline: Option<Instant>,
    /// set exactly once, when the context is canceled.
    cause: Mutex<Option<Error>>,
    /// cells currently being awaited under this context, keyed by watch id.
    waiters: Mutex<Vec<(u64, Weak<Cell>)>>,
    next_watch: AtomicU64,
    children: Mutex<Vec<Weak<Inner>>>,
}

impl Inner {
    fn new(cancelable: bool, deadline: Option<Instant>) -> Self {
        Self {
            cancelable,
            deadline,
            cause: Mutex::new(None),
            waiters: Mutex::new(Vec::with_capacity(0)),
            next_watch: AtomicU64::new(0),
            children: Mutex::new(Vec::with_capacity(0)),
        }
    }

    fn cancel(&self, cause: Error) {
        if !self.cancelable {
            return;
        }
        {
            let mut slot = self.cause.lock();
            if slot.is_some() {
                return;
            }
            *slot = Some(cause.clone());
        }

        // collect first so we never hold our own locks while taking a cell's lock:
        let waiters: Vec<Arc<Cell>> = self
            .waiters
            .lock()
            .iter()
            .filter_map(|(_, cell)| cell.upgrade())
            .collect();
        let children: Vec<Arc<Inner>> = self
            .children
            .lock()
            .drain(..)
            .filter_map(|child| child.upgrade())
            .collect();

        log::trace!(
            "context canceled ({cause}); waking {} waiters and {} children",
            waiters.len(),
            children.len()
        );

        for cell in waiters {
            cell.wake();
        }
        for child in children {
            child.cancel(cause.clone());
        }
    }
}

impl Context {
    /// A context that is never canceled and has no deadline.
    pub fn background() -> Self {
        Self {
            inner: Arc::new(Inner::new(false, None)),
        }
    }

    /// A new root context that can be canceled with [`Context::cancel`].
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner::new(true, None)),
        }
    }

    /// A cancelable context that is also canceled when `self` is.
    pub fn child(&self) -> Self {
        self.derive(self.inner.deadline)
    }

    /// A child context that expires after `timeout`.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// A child context that expires at `deadline`, or at the parent's deadline if that is sooner.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.inner.deadline {
            Some(parent) if parent < deadline => parent,
            _ => deadline,
        };
        self.derive(Some(deadline))
    }

    fn derive(&self, deadline: Option<Instant>) -> Self {
        let child = Arc::new(Inner::new(true, deadline));
        if self.inner.cancelable {
            let mut children = self.inner.children.lock();
            // checked under the children lock so a concurrent cancel can't miss this child:
            let cause = self.inner.cause.lock().clone();
            match cause {
                Some(cause) => {
                    drop(children);
                    child.cancel(cause);
                }
                None => {
                    children.retain(|c| c.strong_count() > 0);
                    children.push(Arc::downgrade(&child));
                }
            }
        }
        Self { inner: child }
    }

    /// Cancel this context and all of its children.
    /// Has no effect on background contexts or contexts that are already canceled.
    pub fn cancel(&self) {
        self.inner.cancel(Error::Canceled);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// The reason this context is done, if it is.
    pub fn err(&self) -> Option<Error> {
        if let Some(cause) = self.inner.cause.lock().clone() {
            return Some(cause);
        }
        match self.inner.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Error::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_canceled(&self) -> bool {
        self.err().is_some()
    }

    /// Register `cell` to be woken if this context is canceled.
    /// The registration lasts as long as the returned guard.
    pub(crate) fn watch(&self, cell: &Arc<Cell>) -> Watch<'_> {
        if !self.inner.cancelable {
            return Watch { ctx: self, id: None };
        }
        let id = self.inner.next_watch.fetch_add(1, Ordering::Relaxed);
        self.inner.waiters.lock().push((id, Arc::downgrade(cell)));
        Watch { ctx: self, id: Some(id) }
    }

    #[cfg(test)]
    pub(crate) fn waiter_count(&self) -> usize {
        self.inner.waiters.lock().len()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("cancelable", &self.inner.cancelable)
            .field("deadline", &self.inner.deadline)
            .field("err", &self.err())
            .finish()
    }
}

/// Guard returned by [`Context::watch`].
pub(crate) struct Watch<'a> {
    ctx: &'a Context,
    id: Option<u64>,
}

impl Drop for Watch<'_> {
    fn drop(&mut self) {
        if let Some(id) = self.id {
            self.ctx.inner.waiters.lock().retain(|(watch, _)| *watch != id);
        }
    }
}
