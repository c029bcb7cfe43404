//! Scheduler - Cooperative Turn Management
//!
//! A single-threaded run-to-completion task queue. Every piece of deferred
//! work (a resumed continuation, a block body, a freshly spawned process) is
//! a task; a *turn* is one task executed from start to finish.
//!
//! ## Guarantees
//!
//! - Tasks run in FIFO order of scheduling.
//! - A task never runs inside another task: `later` only enqueues, and
//!   [`run_until_idle`] refuses to start a nested drain. The dispatch depth
//!   recorded in [`SchedulerStats`] therefore stays at 1, which is what the
//!   suspension discipline relies on.
//! - Timers scheduled with [`after`] become ready tasks once due, in
//!   deadline order (ties broken by scheduling order).
//!
//! ## Lifecycle counters
//!
//! Process and message counters live here too, next to the turn counters,
//! so the at-exit report reads one snapshot. They are plain integers: the
//! whole runtime is confined to one thread.
//!
//! ## Epochs
//!
//! Each host evaluation runs in its own epoch. A continuation parked on a
//! dataflow variable, a process or a mailbox remembers the epoch it was
//! parked in; once the host abandons that epoch (the evaluation stalled or
//! failed), waking the continuation is a no-op.

use slang_core::{SlangError, SlangResult};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet, VecDeque};
use std::time::{Duration, Instant};

type Task = Box<dyn FnOnce()>;

struct Timer {
    due: Instant,
    seq: u64,
    task: Task,
}

// BinaryHeap is a max-heap; reverse so the earliest deadline pops first.
impl Ord for Timer {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Timer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Timer {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Timer {}

/// Snapshot of scheduler and lifecycle counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub tasks_scheduled: u64,
    pub tasks_executed: u64,
    pub timers_fired: u64,
    /// High-water mark of nested dispatch; 1 once anything has run
    pub max_dispatch_depth: usize,
    pub processes_spawned: u64,
    pub processes_completed: u64,
    pub active_processes: usize,
    pub peak_processes: usize,
    pub messages_posted: u64,
    pub messages_received: u64,
}

#[derive(Default)]
struct Scheduler {
    ready: VecDeque<Task>,
    timers: BinaryHeap<Timer>,
    next_timer_seq: u64,
    dispatch_depth: usize,
    started: Option<Instant>,
    stats: SchedulerStats,
    epoch: u64,
    abandoned: HashSet<u64>,
}

impl Scheduler {
    /// Move every due timer onto the ready queue
    fn promote_due_timers(&mut self, now: Instant) {
        while self.timers.peek().is_some_and(|t| t.due <= now) {
            if let Some(timer) = self.timers.pop() {
                self.ready.push_back(timer.task);
                self.stats.timers_fired += 1;
            }
        }
    }
}

thread_local! {
    static SCHEDULER: RefCell<Scheduler> = RefCell::new(Scheduler::default());
}

fn with_scheduler<R>(f: impl FnOnce(&mut Scheduler) -> R) -> R {
    SCHEDULER.with(|s| f(&mut s.borrow_mut()))
}

/// Queue `task` to run on a later turn
pub fn later(task: impl FnOnce() + 'static) {
    with_scheduler(|s| {
        s.ready.push_back(Box::new(task));
        s.stats.tasks_scheduled += 1;
    });
}

/// The instant `delay` from now, if the clock can represent it
pub fn deadline(delay: Duration) -> SlangResult<Instant> {
    Instant::now()
        .checked_add(delay)
        .ok_or_else(|| SlangError::invalid("after", format!("delay of {:?} is out of range", delay)))
}

/// Queue `task` to run on a turn no earlier than `delay` from now
pub fn after(delay: Duration, task: impl FnOnce() + 'static) -> SlangResult<()> {
    at(deadline(delay)?, task);
    Ok(())
}

/// Queue `task` to run on a turn no earlier than `due`
pub fn at(due: Instant, task: impl FnOnce() + 'static) {
    with_scheduler(|s| {
        let seq = s.next_timer_seq;
        s.next_timer_seq += 1;
        s.timers.push(Timer {
            due,
            seq,
            task: Box::new(task),
        });
        s.stats.tasks_scheduled += 1;
    });
}

/// Ready tasks plus pending timers
pub fn pending() -> usize {
    with_scheduler(|s| s.ready.len() + s.timers.len())
}

/// True while a task is executing
pub fn is_dispatching() -> bool {
    with_scheduler(|s| s.dispatch_depth > 0)
}

/// Decrements the dispatch depth even if the task unwinds
struct DispatchGuard;

impl DispatchGuard {
    fn enter() -> Self {
        with_scheduler(|s| {
            s.dispatch_depth += 1;
            s.stats.max_dispatch_depth = s.stats.max_dispatch_depth.max(s.dispatch_depth);
            s.stats.tasks_executed += 1;
        });
        DispatchGuard
    }
}

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        with_scheduler(|s| s.dispatch_depth -= 1);
    }
}

/// Execute tasks until nothing is ready and no timer is pending.
///
/// Sleeps until the next deadline when only timers remain. Returns the
/// number of turns taken, or `TurnLimit` once `max_turns` turns have run
/// and more work is still queued (that work stays queued).
///
/// Called from inside a task this is a no-op: the outer drain will get to
/// the queued work.
pub fn run_until_idle(max_turns: Option<u64>) -> SlangResult<u64> {
    if is_dispatching() {
        tracing::debug!("run_until_idle called from inside a turn; ignoring");
        return Ok(0);
    }
    with_scheduler(|s| {
        s.started.get_or_insert_with(Instant::now);
    });

    let mut turns = 0u64;
    loop {
        let next = with_scheduler(|s| {
            s.promote_due_timers(Instant::now());
            if s.ready.is_empty() {
                return Err(s.timers.peek().map(|t| t.due));
            }
            if let Some(limit) = max_turns
                && turns >= limit
            {
                return Ok(None);
            }
            Ok(s.ready.pop_front())
        });

        match next {
            Ok(Some(task)) => {
                turns += 1;
                let _guard = DispatchGuard::enter();
                task();
            }
            Ok(None) => {
                if let Some(limit) = max_turns {
                    tracing::warn!(limit, pending = pending(), "turn limit reached");
                    return Err(SlangError::TurnLimit(limit));
                }
            }
            Err(Some(due)) => {
                let now = Instant::now();
                if due > now {
                    std::thread::sleep(due - now);
                }
            }
            Err(None) => break,
        }
    }

    tracing::trace!(turns, "scheduler idle");
    Ok(turns)
}

/// Drop every queued task and timer.
///
/// The tasks are dropped outside the scheduler borrow: dropping a task can
/// release scope guards and processes.
pub fn discard_pending() -> usize {
    let (ready, timers) = with_scheduler(|s| {
        (
            std::mem::take(&mut s.ready),
            std::mem::take(&mut s.timers),
        )
    });
    let discarded = ready.len() + timers.len();
    if discarded > 0 {
        tracing::debug!(discarded, "discarding pending tasks");
    }
    drop(ready);
    drop(timers);
    discarded
}

/// Start a new epoch and return it
pub fn begin_epoch() -> u64 {
    with_scheduler(|s| {
        s.epoch += 1;
        s.epoch
    })
}

pub fn epoch() -> u64 {
    with_scheduler(|s| s.epoch)
}

/// Mark `epoch` abandoned: continuations parked in it will not be resumed
pub fn abandon_epoch(epoch: u64) {
    tracing::debug!(epoch, "abandoning epoch");
    with_scheduler(|s| s.abandoned.insert(epoch));
}

pub fn is_abandoned(epoch: u64) -> bool {
    with_scheduler(|s| s.abandoned.contains(&epoch))
}

pub fn stats() -> SchedulerStats {
    with_scheduler(|s| s.stats)
}

pub fn reset_stats() {
    with_scheduler(|s| {
        s.stats = SchedulerStats::default();
        s.started = None;
    });
}

/// Time since the first drain on this thread
pub fn elapsed() -> Option<Duration> {
    with_scheduler(|s| s.started.map(|t| t.elapsed()))
}

// Lifecycle counters

pub fn process_spawned() {
    with_scheduler(|s| {
        s.stats.processes_spawned += 1;
        s.stats.active_processes += 1;
        s.stats.peak_processes = s.stats.peak_processes.max(s.stats.active_processes);
    });
}

pub fn process_completed() {
    with_scheduler(|s| {
        s.stats.processes_completed += 1;
        s.stats.active_processes = s.stats.active_processes.saturating_sub(1);
    });
}

pub fn message_posted() {
    with_scheduler(|s| s.stats.messages_posted += 1);
}

pub fn message_received() {
    with_scheduler(|s| s.stats.messages_received += 1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn log() -> (Rc<RefCell<Vec<u32>>>, impl Fn(u32) -> Box<dyn FnOnce()>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let record = move |n: u32| -> Box<dyn FnOnce()> {
            let sink = sink.clone();
            Box::new(move || sink.borrow_mut().push(n))
        };
        (seen, record)
    }

    #[test]
    fn test_fifo_order() {
        let (seen, record) = log();
        for n in 0..5 {
            later(record(n));
        }
        assert_eq!(run_until_idle(None).unwrap(), 5);
        assert_eq!(*seen.borrow(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_tasks_scheduled_from_tasks_run_later() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let outer = seen.clone();
        later(move || {
            let inner = outer.clone();
            later(move || inner.borrow_mut().push("inner"));
            outer.borrow_mut().push("outer");
        });
        let tail = seen.clone();
        later(move || tail.borrow_mut().push("second"));

        run_until_idle(None).unwrap();
        assert_eq!(*seen.borrow(), vec!["outer", "second", "inner"]);
    }

    #[test]
    fn test_never_nests_dispatch() {
        reset_stats();
        later(|| {
            assert!(is_dispatching());
            later(|| {});
            assert_eq!(run_until_idle(None).unwrap(), 0);
        });
        run_until_idle(None).unwrap();
        assert_eq!(stats().max_dispatch_depth, 1);
        assert!(!is_dispatching());
    }

    #[test]
    fn test_timers_fire_in_deadline_order() {
        let (seen, record) = log();
        after(Duration::from_millis(20), record(2)).unwrap();
        after(Duration::from_millis(5), record(1)).unwrap();
        after(Duration::from_millis(5), record(11)).unwrap();
        later(record(0));

        let start = Instant::now();
        run_until_idle(None).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert_eq!(*seen.borrow(), vec![0, 1, 11, 2]);
    }

    #[test]
    fn test_turn_limit_leaves_work_queued() {
        fn spin() {
            later(spin);
        }
        later(spin);
        assert_eq!(run_until_idle(Some(10)), Err(SlangError::TurnLimit(10)));
        assert!(pending() > 0);
        discard_pending();
        assert_eq!(pending(), 0);
    }

    #[test]
    fn test_unrepresentable_deadline_is_rejected() {
        let before = pending();
        let err = after(Duration::MAX, || {}).unwrap_err();
        assert!(matches!(err, SlangError::InvalidArgument { .. }));
        assert_eq!(pending(), before);
    }

    #[test]
    fn test_epochs() {
        let first = begin_epoch();
        let second = begin_epoch();
        assert_eq!(epoch(), second);
        abandon_epoch(first);
        assert!(is_abandoned(first));
        assert!(!is_abandoned(second));
    }

    #[test]
    fn test_lifecycle_counters() {
        reset_stats();
        process_spawned();
        process_spawned();
        process_completed();
        message_posted();
        message_received();

        let s = stats();
        assert_eq!(s.processes_spawned, 2);
        assert_eq!(s.processes_completed, 1);
        assert_eq!(s.active_processes, 1);
        assert_eq!(s.peak_processes, 2);
        assert_eq!((s.messages_posted, s.messages_received), (1, 1));
    }
}
