//! Writer thread lifecycle.
//!
//! ```text
//!            enqueue                 close()
//! [Stopped] --------> [Active] ------------> [Draining] --join--> [Stopped]
//!     ^                  |
//!     +---- idle for `cooldown`, queue still empty ----+
//! ```
//!
//! The writer thread exists only while there is something to write. The first
//! entry after a quiet period allocates a fresh queue and spawns the thread;
//! the thread retires itself once it has seen nothing for `cooldown`.
//!
//! Every lifecycle decision is taken under the same `RwLock` as the
//! configuration. Producers push while holding the read lock, so neither an
//! idle stop nor an explicit close can slip in between their state check and
//! their push. Anyone who finds the lifecycle `Draining` waits on a condvar
//! until the closing thread has joined the writer and moved it to `Stopped`.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Instant,
};

use crossbeam_utils::{sync::Parker, Backoff};
use parking_lot::{Condvar, Mutex, RwLock};

use crate::{
    channel::{Queue, TrySendError},
    config::Config,
    task::Task,
    writer::LogWriter,
};

pub(crate) struct Worker {
    queue: Arc<Queue>,
    handle: JoinHandle<()>,
}

pub(crate) enum Lifecycle {
    Stopped,
    Active(Worker),
    /// Closed by `stop_and_drain`; the writer is finishing the backlog.
    Draining(Arc<Queue>),
}

pub(crate) struct State {
    pub config: Config,
    pub lifecycle: Lifecycle,
    /// Handle of a writer that retired itself. It may still be unwinding its
    /// stack, so it is joined before the next writer is spawned.
    pub retired: Option<JoinHandle<()>>,
}

/// Start and stop counts of the writer thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkerStats {
    pub starts: u64,
    pub stops: u64,
}

/// Owns the configuration and decides when the writer thread exists.
pub(crate) struct Controller {
    state: RwLock<State>,
    /// Paired with `drained`; held while checking for `Draining`.
    drain_lock: Mutex<()>,
    drained: Condvar,
    starts: AtomicU64,
    stops: AtomicU64,
}

impl Controller {
    pub(crate) fn new(config: Config) -> Self {
        Self {
            state: RwLock::new(State {
                config,
                lifecycle: Lifecycle::Stopped,
                retired: None,
            }),
            drain_lock: Mutex::new(()),
            drained: Condvar::new(),
            starts: AtomicU64::new(0),
            stops: AtomicU64::new(0),
        }
    }

    pub(crate) fn state(&self) -> &RwLock<State> {
        &self.state
    }

    pub(crate) fn stats(&self) -> WorkerStats {
        WorkerStats {
            starts: self.starts.load(Ordering::Acquire),
            stops: self.stops.load(Ordering::Acquire),
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        matches!(self.state.read().lifecycle, Lifecycle::Active(_))
    }

    pub(crate) fn is_draining(&self) -> bool {
        matches!(self.state.read().lifecycle, Lifecycle::Draining(_))
    }

    /// Entries queued but not yet picked up by the writer.
    pub(crate) fn pending(&self) -> usize {
        match &self.state.read().lifecycle {
            Lifecycle::Stopped => 0,
            Lifecycle::Active(worker) => worker.queue.len(),
            Lifecycle::Draining(queue) => queue.len(),
        }
    }

    /// Makes sure a writer thread is running, waiting out a close in
    /// progress first.
    ///
    /// Returns `false` only if the thread could not be spawned.
    pub(crate) fn ensure_started(self: &Arc<Self>) -> bool {
        loop {
            let draining = match &self.state.read().lifecycle {
                Lifecycle::Active(_) => return true,
                Lifecycle::Draining(_) => true,
                Lifecycle::Stopped => false,
            };
            if draining {
                self.wait_until_stopped();
                continue;
            }

            let mut state = self.state.write();
            match &state.lifecycle {
                Lifecycle::Active(_) => return true,
                // a close began between the two locks
                Lifecycle::Draining(_) => continue,
                Lifecycle::Stopped => {}
            }
            return self.spawn(&mut state);
        }
    }

    fn spawn(self: &Arc<Self>, state: &mut State) -> bool {
        if let Some(previous) = state.retired.take() {
            // already past its last lock; this returns promptly
            let _ = previous.join();
        }

        let parker = Parker::new();
        let queue = Arc::new(Queue::new(
            state.config.capacity,
            parker.unparker().clone(),
        ));
        let controller = self.clone();
        let consumer = queue.clone();

        let spawned = thread::Builder::new()
            .name("lumo-writer".into())
            .spawn(move || controller.run(consumer, parker));

        match spawned {
            Ok(handle) => {
                state.lifecycle = Lifecycle::Active(Worker { queue, handle });
                self.starts.fetch_add(1, Ordering::AcqRel);
                true
            }
            Err(_) => false,
        }
    }

    /// Hands `task` to the writer thread, starting it if needed.
    ///
    /// Spins with backoff while the queue is full. An entry that meets a
    /// close or an idle stop is sent to the next writer instead; it is lost
    /// only if no writer thread can be spawned.
    pub(crate) fn enqueue(self: &Arc<Self>, task: Task) {
        let backoff = Backoff::new();
        let mut task = task;

        loop {
            if !self.ensure_started() {
                return;
            }

            let state = self.state.read();
            let queue = match &state.lifecycle {
                Lifecycle::Active(worker) => &worker.queue,
                // closed or retired since the start check
                Lifecycle::Draining(_) | Lifecycle::Stopped => continue,
            };

            match queue.try_send(task) {
                Ok(()) => return,
                Err(TrySendError::Closed(returned)) => task = returned,
                Err(TrySendError::Full(returned)) => {
                    task = returned;
                    // the writer needs the read lock between batches
                    drop(state);
                    backoff.snooze();
                }
            }
        }
    }

    /// Closes the queue and waits until every entry written before the call
    /// has reached the sink and the writer thread has exited.
    ///
    /// If another close is in progress this waits for it to finish. With no
    /// writer running it only reaps a retired thread.
    pub(crate) fn stop_and_drain(&self) {
        let worker = {
            let mut state = self.state.write();
            match std::mem::replace(&mut state.lifecycle, Lifecycle::Stopped) {
                Lifecycle::Active(worker) => {
                    worker.queue.close();
                    state.lifecycle = Lifecycle::Draining(worker.queue.clone());
                    worker
                }
                Lifecycle::Draining(queue) => {
                    state.lifecycle = Lifecycle::Draining(queue);
                    drop(state);
                    self.wait_until_stopped();
                    return;
                }
                Lifecycle::Stopped => {
                    let retired = state.retired.take();
                    drop(state);
                    if let Some(handle) = retired {
                        let _ = handle.join();
                    }
                    return;
                }
            }
        };

        let _ = worker.handle.join();

        {
            let mut state = self.state.write();
            if matches!(state.lifecycle, Lifecycle::Draining(_)) {
                state.lifecycle = Lifecycle::Stopped;
            }
        }
        self.stops.fetch_add(1, Ordering::AcqRel);
        self.notify_stopped();
    }

    fn wait_until_stopped(&self) {
        let mut guard = self.drain_lock.lock();
        while self.is_draining() {
            self.drained.wait(&mut guard);
        }
    }

    fn notify_stopped(&self) {
        let _guard = self.drain_lock.lock();
        self.drained.notify_all();
    }

    /// Writer thread body.
    fn run(&self, queue: Arc<Queue>, parker: Parker) {
        let (mut wr, cooldown) = {
            let state = self.state.read();
            (
                LogWriter::new(state.config.render_settings()),
                state.config.cooldown,
            )
        };
        let mut idle_deadline = Instant::now() + cooldown;

        loop {
            if let Some(task) = queue.pop() {
                idle_deadline = Instant::now() + cooldown;
                wr.reconfigure(self.state.read().config.render_settings());

                wr.write_task(task);
                // bounded so a fast producer cannot starve the flush
                for _ in 0..queue.len() {
                    match queue.pop() {
                        Some(task) => wr.write_task(task),
                        None => break,
                    }
                }
                let _ = wr.flush();
                continue;
            }

            if queue.is_closed() {
                while let Some(task) = queue.pop() {
                    wr.write_task(task);
                }
                let _ = wr.flush();
                return;
            }

            let now = Instant::now();
            if now >= idle_deadline {
                if self.retire(&queue) {
                    return;
                }
                idle_deadline = now + cooldown;
                continue;
            }

            parker.park_timeout(idle_deadline - now);
        }
    }

    /// Idle stop. Commits only if the queue is still empty under the lock.
    fn retire(&self, queue: &Arc<Queue>) -> bool {
        let mut state = self.state.write();

        if queue.is_closed() {
            // stop_and_drain owns the transition; finish via the drain path
            return false;
        }
        if !queue.is_empty() {
            return false;
        }

        queue.close();
        match std::mem::replace(&mut state.lifecycle, Lifecycle::Stopped) {
            Lifecycle::Active(worker) if Arc::ptr_eq(&worker.queue, queue) => {
                state.retired = Some(worker.handle);
            }
            // an open queue is always the active writer's
            other => state.lifecycle = other,
        }
        self.stops.fetch_add(1, Ordering::AcqRel);
        true
    }
}
