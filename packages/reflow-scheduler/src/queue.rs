use crate::job::{Job, JobId};
use rustc_hash::FxHashSet;
use std::rc::Rc;

/// The flush queue: an ordered, growable sequence of jobs plus a dedup set
/// keyed by job id.
///
/// During a flush, `[0, cursor)` holds jobs already processed (or skipped)
/// this cycle and `[cursor, len)` the pending tail. The tail may grow while
/// the cursor advances. The dedup set holds an id exactly while that job has
/// an unprocessed entry, or is the one currently running (its entry is
/// cleared right before `run`, which is what lets a job re-enqueue itself).
pub struct JobQueue {
    jobs: Vec<Rc<dyn Job>>,
    scheduled: FxHashSet<JobId>,
    cursor: usize,
}

impl JobQueue {
    pub fn new() -> Self {
        Self {
            jobs: Vec::new(),
            scheduled: FxHashSet::default(),
            cursor: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn contains(&self, id: JobId) -> bool {
        self.scheduled.contains(&id)
    }

    /// True once the cursor has passed the last entry.
    pub fn exhausted(&self) -> bool {
        self.cursor >= self.jobs.len()
    }

    /// Add a job unless it is already scheduled. Returns whether anything
    /// was inserted.
    ///
    /// Outside a flush the job goes on the end; the pre-run sort puts it in
    /// place. During a flush we splice it into the pending tail so the tail
    /// stays sorted by id: scan back from the end while the scanned id is
    /// greater, stopping at the cursor. A job whose id sorts behind the
    /// cursor still lands just after it and runs this cycle, merely out of
    /// strict ascending order.
    pub fn schedule(&mut self, job: Rc<dyn Job>, flushing: bool) -> bool {
        let id = job.id();
        if !self.scheduled.insert(id) {
            return false;
        }
        if !flushing {
            self.jobs.push(job);
        } else {
            let mut at = self.jobs.len();
            while at > self.cursor + 1 && self.jobs[at - 1].id() > id {
                at -= 1;
            }
            self.jobs.insert(at, job);
        }
        true
    }

    /// Sort the whole queue ascending by id. Called once per flush before
    /// the scan starts, while the cursor is at zero.
    pub fn sort(&mut self) {
        self.jobs.sort_by_key(|job| job.id());
    }

    /// The job under the cursor, if the tail is non-empty.
    pub fn current(&self) -> Option<Rc<dyn Job>> {
        self.jobs.get(self.cursor).cloned()
    }

    pub fn advance(&mut self) {
        self.cursor += 1;
    }

    /// Drop the dedup entry for a job about to run.
    pub fn clear_scheduled(&mut self, id: JobId) {
        self.scheduled.remove(&id);
    }

    /// Jump the cursor past every pending entry, dropping them from this
    /// cycle. Safety valve for a detected infinite-update loop; the entries
    /// are not retried.
    pub fn abandon_tail(&mut self) {
        self.cursor = self.jobs.len();
    }

    /// End-of-cycle reset. Removes the processed prefix (the whole queue if
    /// the cursor reached the end), clears the dedup set, rewinds the
    /// cursor, and returns the jobs that ran this cycle in run order.
    pub fn reset(&mut self) -> Vec<Rc<dyn Job>> {
        self.scheduled.clear();
        let processed = if self.exhausted() {
            std::mem::take(&mut self.jobs)
        } else {
            self.jobs.drain(..self.cursor).collect()
        };
        self.cursor = 0;
        processed
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}
