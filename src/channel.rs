//! Bounded task queue between producer threads and the writer thread.
//!
//! The queue is a fixed-capacity ring buffer plus a close flag. Sends never
//! block; a full queue hands the task back so the caller can back off and
//! retry without holding any lock. The writer parks between batches and is
//! unparked on every push, on every rejected push and on close.

use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_queue::ArrayQueue;
use crossbeam_utils::sync::Unparker;

use crate::task::Task;

/// Reason a [`Queue::try_send`] did not take the task.
#[derive(Debug)]
pub(crate) enum TrySendError {
    /// No free slot right now. The task is handed back.
    Full(Task),
    /// The writer is gone or leaving. The task is handed back.
    Closed(Task),
}

pub(crate) struct Queue {
    /// Lock-free ring buffer holding pending tasks in FIFO order.
    rb: ArrayQueue<Task>,

    /// Set once; no task is accepted afterwards.
    closed: AtomicBool,

    /// Wakes the writer thread parked on the matching `Parker`.
    unparker: Unparker,
}

impl Queue {
    /// Creates a queue holding at most `capacity` tasks.
    ///
    /// # Panics
    ///
    /// If `capacity` is zero. The builder rejects that before it gets here.
    pub(crate) fn new(capacity: usize, unparker: Unparker) -> Self {
        Self {
            rb: ArrayQueue::new(capacity),
            closed: AtomicBool::new(false),
            unparker,
        }
    }

    /// Pushes without blocking.
    #[inline]
    pub(crate) fn try_send(&self, task: Task) -> Result<(), TrySendError> {
        if self.is_closed() {
            return Err(TrySendError::Closed(task));
        }

        match self.rb.push(task) {
            Ok(()) => {
                self.unparker.unpark();
                Ok(())
            }
            Err(task) => {
                // make sure the writer is awake to free a slot
                self.unparker.unpark();
                Err(TrySendError::Full(task))
            }
        }
    }

    #[inline]
    pub(crate) fn pop(&self) -> Option<Task> {
        self.rb.pop()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.rb.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.rb.is_empty()
    }

    /// Refuses further sends and wakes the writer so it can drain and exit.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.unparker.unpark();
    }

    #[inline]
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
