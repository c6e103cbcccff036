use crate::clock::FlushClock;
use crate::config::SchedulerConfig;
use crate::deferral::Deferral;
use crate::error::{FlushError, JobError};
use crate::hooks::{ErrorReporter, FlushObserver, LifecycleNotifier};
use crate::job::{Component, Job, JobId};
use crate::queue::JobQueue;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

/// How many times one job may re-mark itself within a single flush before
/// the cycle is treated as a runaway update loop.
pub const MAX_UPDATE_DEPTH: u32 = 100;

type AfterFlush = Box<dyn FnOnce() -> Result<(), JobError>>;
type ActivatedQueue = SmallVec<[Rc<dyn Component>; 4]>;

/// The update scheduler: batches enqueued jobs, runs each at most once per
/// flush cycle in ascending id order, drains after-flush callbacks to a
/// fixed point, and dispatches the per-cycle lifecycle notifications.
///
/// Single-threaded; construct one per runtime (or per test) via
/// [`Scheduler::new`]. Every entry point takes `&self`, and no internal
/// borrow is held while a job or callback runs, so jobs may call back into
/// the scheduler freely. The one thing a job must not do is trigger a flush
/// from its own evaluation; the reentrancy guard turns that into a hard
/// error instead of corrupting the queue.
pub struct Scheduler {
    config: SchedulerConfig,
    clock: FlushClock,
    queue: RefCell<JobQueue>,
    after_flush: RefCell<VecDeque<AfterFlush>>,
    activated: RefCell<ActivatedQueue>,
    circular: RefCell<FxHashMap<JobId, u32>>,
    flushing: Cell<bool>,
    pending: Cell<bool>,
    inside_run: Rc<Cell<bool>>,
    flush_timestamp: Cell<f64>,
    weak: Weak<Scheduler>,
    deferral: RefCell<Option<Rc<dyn Deferral>>>,
    reporter: RefCell<Option<Rc<dyn ErrorReporter>>>,
    lifecycle: RefCell<Option<Rc<dyn LifecycleNotifier>>>,
    observer: RefCell<Option<Rc<dyn FlushObserver>>>,
}

struct EvalGuard {
    flag: Rc<Cell<bool>>,
    prev: bool,
}

impl Drop for EvalGuard {
    fn drop(&mut self) {
        self.flag.set(self.prev);
    }
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Rc<Self> {
        Self::with_clock(config, FlushClock::default())
    }

    pub fn with_clock(config: SchedulerConfig, clock: FlushClock) -> Rc<Self> {
        Rc::new_cyclic(|weak| Self {
            config,
            clock,
            queue: RefCell::new(JobQueue::new()),
            after_flush: RefCell::new(VecDeque::new()),
            activated: RefCell::new(SmallVec::new()),
            circular: RefCell::new(FxHashMap::default()),
            flushing: Cell::new(false),
            pending: Cell::new(false),
            inside_run: Rc::new(Cell::new(false)),
            flush_timestamp: Cell::new(0.0),
            weak: weak.clone(),
            deferral: RefCell::new(None),
            reporter: RefCell::new(None),
            lifecycle: RefCell::new(None),
            observer: RefCell::new(None),
        })
    }

    pub fn set_deferral(&self, deferral: Rc<dyn Deferral>) {
        *self.deferral.borrow_mut() = Some(deferral);
    }

    pub fn set_error_reporter(&self, reporter: Rc<dyn ErrorReporter>) {
        *self.reporter.borrow_mut() = Some(reporter);
    }

    pub fn set_lifecycle(&self, lifecycle: Rc<dyn LifecycleNotifier>) {
        *self.lifecycle.borrow_mut() = Some(lifecycle);
    }

    pub fn set_observer(&self, observer: Rc<dyn FlushObserver>) {
        *self.observer.borrow_mut() = Some(observer);
    }

    pub fn is_flushing(&self) -> bool {
        self.flushing.get()
    }

    /// Timestamp captured at the start of the most recent flush, in the
    /// clock's milliseconds. Zero before the first flush.
    pub fn current_flush_timestamp(&self) -> f64 {
        self.flush_timestamp.get()
    }

    /// Schedule a job for the next flush cycle. A job already scheduled is
    /// left where it is.
    ///
    /// In synchronous mode this may run the flush before returning, so a
    /// job failure from that flush surfaces here. In deferred mode this
    /// never fails.
    pub fn enqueue(&self, job: Rc<dyn Job>) -> Result<(), FlushError> {
        let inserted = self
            .queue
            .borrow_mut()
            .schedule(job, self.flushing.get());
        if !inserted {
            return Ok(());
        }
        self.request_flush()
    }

    /// Run `callback` once the jobs enqueued so far have run, before the
    /// current (or next) cycle is declared complete. An `Err` from the
    /// callback is routed to the error reporter and does not abort the
    /// cycle.
    pub fn schedule_after_flush(
        &self,
        callback: impl FnOnce() -> Result<(), JobError> + 'static,
    ) -> Result<(), FlushError> {
        self.after_flush.borrow_mut().push_back(Box::new(callback));
        self.request_flush()
    }

    /// Note a kept-alive component as re-activated. It is notified exactly
    /// once, after the main job pass of the cycle, independent of job
    /// ordering.
    pub fn queue_activated(&self, component: Rc<dyn Component>) {
        component.set_inactive(false);
        self.activated.borrow_mut().push(component);
    }

    /// Flush synchronously, right now, regardless of the deferral mode. A
    /// deferred flush already scheduled will later find an empty queue.
    pub fn force_flush(&self, loop_limit: Option<u32>) -> Result<(), FlushError> {
        self.flush(loop_limit)
    }

    /// Wrap a job's core computation so the scheduler can tell when any
    /// evaluation is on the stack. Nests: each call saves and restores the
    /// previous state, also on unwind.
    pub fn wrap_evaluation<F, R>(&self, mut f: F) -> impl FnMut() -> R + use<F, R>
    where
        F: FnMut() -> R,
    {
        let flag = Rc::clone(&self.inside_run);
        move || {
            let prev = flag.replace(true);
            let _guard = EvalGuard {
                flag: Rc::clone(&flag),
                prev,
            };
            f()
        }
    }

    /// Idempotent: while a flush is pending (requested but its cycle not
    /// yet reset) further requests are no-ops.
    fn request_flush(&self) -> Result<(), FlushError> {
        if self.pending.get() {
            return Ok(());
        }
        self.pending.set(true);

        if !self.config.deferred {
            return self.flush(None);
        }

        let deferral = self.deferral.borrow().clone();
        match deferral {
            Some(deferral) => {
                let weak = self.weak.clone();
                deferral.schedule(Box::new(move || {
                    if let Some(scheduler) = weak.upgrade() {
                        if let Err(error) = scheduler.flush(None) {
                            scheduler.report(Box::new(error), None, "deferred flush");
                        }
                    }
                }));
                Ok(())
            }
            None => {
                tracing::warn!(
                    "deferred flush requested with no deferral installed, flushing synchronously"
                );
                self.flush(None)
            }
        }
    }

    /// One complete flush cycle.
    ///
    /// Cleanup and hook dispatch run whether the cycle completed or a job
    /// failed out of it; the job's error is returned afterwards.
    fn flush(&self, loop_limit: Option<u32>) -> Result<(), FlushError> {
        if self.flushing.get() {
            return Err(FlushError::AlreadyFlushing);
        }
        if self.inside_run.get() {
            return Err(FlushError::ReentrantEvaluation);
        }

        let limit = loop_limit.unwrap_or(MAX_UPDATE_DEPTH);

        // One timestamp per cycle; everything time-sensitive downstream
        // observes the same flush time.
        self.flush_timestamp.set(self.clock.now());
        self.flushing.set(true);
        // Jobs enqueued from here until the reset belong to this cycle and
        // must not request another flush.
        self.pending.set(true);

        // Ids reflect creation order: producers before consumers, user jobs
        // before render jobs. Ascending ids give parent-before-child
        // execution without dependency edges.
        self.queue.borrow_mut().sort();
        tracing::debug!(jobs = self.queue.borrow().len(), "flushing update queue");

        let outcome = self.run_cycle(limit);

        let (ran, activated) = self.reset_state();
        self.dispatch_hooks(&ran, activated);
        self.emit_flush_event();

        outcome
    }

    /// Drain jobs and after-flush callbacks to a fixed point.
    fn run_cycle(&self, limit: u32) -> Result<(), FlushError> {
        loop {
            // The tail is re-read every step: a running job may grow it.
            while let Some(job) = self.current_job() {
                let id = job.id();
                job.before();
                // Cleared before the run so the job may re-enqueue itself.
                self.queue.borrow_mut().clear_scheduled(id);
                job.run().map_err(|source| FlushError::Job {
                    id,
                    label: job.describe(),
                    source,
                })?;

                if self.config.track_circular && self.queue.borrow().contains(id) {
                    let count = self.bump_circular(id);
                    if count > limit {
                        tracing::warn!(
                            job = %job.describe(),
                            count,
                            "possible infinite update loop, dropping remaining jobs this flush"
                        );
                        self.queue.borrow_mut().abandon_tail();
                        break;
                    }
                }
                self.queue.borrow_mut().advance();
            }

            // Jobs are drained; give one callback the chance to queue more
            // work before the cycle is declared complete.
            let callback = self.after_flush.borrow_mut().pop_front();
            match callback {
                Some(callback) => {
                    if let Err(error) = callback() {
                        self.report(error, None, "after-flush callback");
                    }
                }
                None => return Ok(()),
            }
        }
    }

    fn current_job(&self) -> Option<Rc<dyn Job>> {
        self.queue.borrow().current()
    }

    fn bump_circular(&self, id: JobId) -> u32 {
        let mut circular = self.circular.borrow_mut();
        let count = circular.entry(id).or_insert(0);
        *count += 1;
        *count
    }

    /// End-of-cycle reset. Returns the snapshots hook dispatch works from:
    /// the jobs run this cycle, in run order, and the activated components.
    fn reset_state(&self) -> (Vec<Rc<dyn Job>>, ActivatedQueue) {
        let ran = self.queue.borrow_mut().reset();
        let activated = std::mem::take(&mut *self.activated.borrow_mut());
        if self.config.track_circular {
            self.circular.borrow_mut().clear();
        }
        self.pending.set(false);
        self.flushing.set(false);
        (ran, activated)
    }

    fn dispatch_hooks(&self, ran: &[Rc<dyn Job>], activated: ActivatedQueue) {
        let lifecycle = self.lifecycle.borrow().clone();

        for component in activated {
            component.set_inactive(true);
            if let Some(lifecycle) = &lifecycle {
                lifecycle.notify_activated(&component, true);
            }
        }

        // Reverse run order: children finish updating before their parents,
        // so updated notifications surface child-first, like mount order.
        for job in ran.iter().rev() {
            let Some(owner) = job.owner() else { continue };
            if owner.active_job() == Some(job.id()) && owner.is_mounted() && !owner.is_destroyed() {
                if let Some(lifecycle) = &lifecycle {
                    lifecycle.notify_updated(&owner);
                }
            }
        }
    }

    fn emit_flush_event(&self) {
        if !self.config.devtools {
            return;
        }
        let observer = self.observer.borrow().clone();
        if let Some(observer) = observer {
            observer.on_flush_complete();
        }
    }

    fn report(&self, error: JobError, context: Option<&dyn Component>, description: &str) {
        let reporter = self.reporter.borrow().clone();
        match reporter {
            Some(reporter) => reporter.report(error, context, description),
            None => tracing::error!(%description, %error, "unreported scheduler error"),
        }
    }
}
