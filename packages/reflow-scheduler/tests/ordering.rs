use reflow_scheduler::{Job, JobError, JobId, LocalDeferral, Scheduler, SchedulerConfig};
use std::cell::RefCell;
use std::rc::Rc;

struct LogJob {
    id: JobId,
    log: Rc<RefCell<Vec<JobId>>>,
}

impl Job for LogJob {
    fn id(&self) -> JobId {
        self.id
    }

    fn run(&self) -> Result<(), JobError> {
        self.log.borrow_mut().push(self.id);
        Ok(())
    }
}

/// Logs its own id, then enqueues a fresh `LogJob` for each spawn id.
struct SpawnJob {
    id: JobId,
    log: Rc<RefCell<Vec<JobId>>>,
    scheduler: Rc<Scheduler>,
    spawn: Vec<JobId>,
}

impl Job for SpawnJob {
    fn id(&self) -> JobId {
        self.id
    }

    fn run(&self) -> Result<(), JobError> {
        self.log.borrow_mut().push(self.id);
        for &id in &self.spawn {
            self.scheduler.enqueue(Rc::new(LogJob {
                id,
                log: self.log.clone(),
            }))?;
        }
        Ok(())
    }
}

fn deferred_scheduler() -> (Rc<Scheduler>, Rc<LocalDeferral>) {
    let scheduler = Scheduler::new(SchedulerConfig::default());
    let deferral = Rc::new(LocalDeferral::new());
    scheduler.set_deferral(deferral.clone());
    (scheduler, deferral)
}

#[test]
fn test_duplicate_enqueue_runs_once() {
    let (scheduler, deferral) = deferred_scheduler();
    let log = Rc::new(RefCell::new(Vec::new()));

    let job = Rc::new(LogJob {
        id: 1,
        log: log.clone(),
    });
    scheduler.enqueue(job.clone()).unwrap();
    scheduler.enqueue(job).unwrap();

    deferral.tick();
    assert_eq!(*log.borrow(), vec![1]);
}

#[test]
fn test_flush_runs_ascending_id_order() {
    let (scheduler, deferral) = deferred_scheduler();
    let log = Rc::new(RefCell::new(Vec::new()));

    for id in [3, 1, 2] {
        scheduler
            .enqueue(Rc::new(LogJob {
                id,
                log: log.clone(),
            }))
            .unwrap();
    }

    deferral.tick();
    assert_eq!(*log.borrow(), vec![1, 2, 3]);
}

#[test]
fn test_job_enqueued_mid_flush_runs_late_in_same_cycle() {
    // Job 5 enqueues job 2 while running. The cursor has already passed
    // id 2's sorted position, so 2 runs after 5, but still this cycle.
    let (scheduler, deferral) = deferred_scheduler();
    let log = Rc::new(RefCell::new(Vec::new()));

    scheduler
        .enqueue(Rc::new(SpawnJob {
            id: 5,
            log: log.clone(),
            scheduler: scheduler.clone(),
            spawn: vec![2],
        }))
        .unwrap();

    deferral.tick();
    assert_eq!(*log.borrow(), vec![5, 2]);

    // Nothing carried over to another turn.
    assert!(deferral.is_idle());
}

#[test]
fn test_mid_flush_inserts_keep_tail_sorted() {
    let (scheduler, deferral) = deferred_scheduler();
    let log = Rc::new(RefCell::new(Vec::new()));

    scheduler
        .enqueue(Rc::new(LogJob {
            id: 1,
            log: log.clone(),
        }))
        .unwrap();
    scheduler
        .enqueue(Rc::new(SpawnJob {
            id: 5,
            log: log.clone(),
            scheduler: scheduler.clone(),
            spawn: vec![9, 7],
        }))
        .unwrap();

    deferral.tick();
    assert_eq!(*log.borrow(), vec![1, 5, 7, 9]);
}

struct HookJob {
    id: JobId,
    log: Rc<RefCell<Vec<String>>>,
}

impl Job for HookJob {
    fn id(&self) -> JobId {
        self.id
    }

    fn before(&self) {
        self.log.borrow_mut().push(format!("before:{}", self.id));
    }

    fn run(&self) -> Result<(), JobError> {
        self.log.borrow_mut().push(format!("run:{}", self.id));
        Ok(())
    }
}

#[test]
fn test_before_hook_runs_before_each_job() {
    let (scheduler, _deferral) = deferred_scheduler();
    let log = Rc::new(RefCell::new(Vec::new()));

    for id in [2, 1] {
        scheduler
            .enqueue(Rc::new(HookJob {
                id,
                log: log.clone(),
            }))
            .unwrap();
    }

    scheduler.force_flush(None).unwrap();
    assert_eq!(
        *log.borrow(),
        vec!["before:1", "run:1", "before:2", "run:2"]
    );
}
