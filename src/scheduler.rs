//! Cooperative task scheduler.
//!
//! A ready queue of polled tasks over the slot arena, driven once per
//! main-loop pass. Tasks are plain functions over four opaque
//! parameters returning "done"; a task that is not done stays busy and
//! is polled again on its next turn, so multi-pass asynchronous work
//! (an SRAM flush, a network exchange) counts as a single run.
//!
//! Fairness is round-robin through the queue, one action call per
//! `step`, except for exclusive tasks which pin the cursor until they
//! retire. A busy task that overstays its timeout budget is retired
//! with a fault record; an idle task is never timed out, whatever its
//! age.

use crate::arena::{FixedArenaList, NodeIndex};
use crate::fault::{FaultCode, FaultLog};

/// Opaque parameter slots per task.
pub const TASK_PARAM_COUNT: usize = 4;

/// Polled task body: returns `true` when the work is complete.
pub type TaskAction = fn(&mut [u32; TASK_PARAM_COUNT]) -> bool;

/// Handle to a scheduled task (its arena slot).
pub type TaskId = NodeIndex;

/// Everything `add_task` needs. Plain fields; the defaults describe a
/// run-once immediate task.
#[derive(Clone, Copy)]
pub struct TaskSpec {
    pub action: TaskAction,
    pub params: [u32; TASK_PARAM_COUNT],
    /// Completions before the task retires. Ignored when `infinite`.
    pub runs: u32,
    /// Minimum ticks between completions of a periodic task.
    pub interval: u32,
    /// Busy-time budget in ticks; 0 means unlimited.
    pub timeout: u32,
    /// Pin the cursor here until the task retires.
    pub exclusive: bool,
    /// Never retire on run count.
    pub infinite: bool,
    /// Gate invocations on `interval` since the last completion.
    pub periodic: bool,
}

impl TaskSpec {
    pub fn new(action: TaskAction) -> Self {
        Self {
            action,
            params: [0; TASK_PARAM_COUNT],
            runs: 1,
            interval: 0,
            timeout: 0,
            exclusive: false,
            infinite: false,
            periodic: false,
        }
    }
}

/// A scheduled task. Lives in its arena slot from `add_task` until it
/// exhausts its runs or overruns its timeout.
#[derive(Clone, Copy)]
pub struct Task {
    pub action: TaskAction,
    pub params: [u32; TASK_PARAM_COUNT],
    runs_remaining: u32,
    /// Tick of the last completion (or creation, before the first run).
    last_run: u32,
    interval: u32,
    timeout: u32,
    exclusive: bool,
    infinite: bool,
    periodic: bool,
    busy: bool,
}

impl Task {
    fn from_spec(spec: &TaskSpec, now: u32) -> Self {
        Self {
            action: spec.action,
            params: spec.params,
            runs_remaining: spec.runs,
            // Stamped at creation: a periodic task's first run waits one
            // full interval.
            last_run: now,
            interval: spec.interval,
            timeout: spec.timeout,
            exclusive: spec.exclusive,
            infinite: spec.infinite,
            periodic: spec.periodic,
            busy: false,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn runs_remaining(&self) -> u32 {
        self.runs_remaining
    }

    pub fn last_run(&self) -> u32 {
        self.last_run
    }
}

/// Round-robin scheduler over the task arena.
pub struct TaskScheduler {
    queue: FixedArenaList<Task>,
    /// The task the next `step` will consider.
    current: Option<TaskId>,
}

impl TaskScheduler {
    pub const fn new() -> Self {
        Self {
            queue: FixedArenaList::new(),
            current: None,
        }
    }

    /// Append a task in FIFO position. `None` when all slots are taken.
    pub fn add_task(&mut self, spec: &TaskSpec, now: u32) -> Option<TaskId> {
        self.queue.push_back(Task::from_spec(spec, now))
    }

    /// Drop a task regardless of state.
    pub fn remove_task(&mut self, id: TaskId) {
        if self.current == Some(id) {
            self.current = self.queue.next(id);
        }
        self.queue.remove(id);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn current(&self) -> Option<TaskId> {
        self.current
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.queue.get(id)
    }

    /// Walk the ready queue in FIFO order.
    pub fn tasks(&self) -> impl Iterator<Item = (TaskId, &Task)> {
        let mut cursor = self.queue.first();
        core::iter::from_fn(move || {
            let id = cursor?;
            cursor = self.queue.next(id);
            Some((id, self.queue.get(id)?))
        })
    }

    /// One scheduling pass: at most one action call.
    pub fn step(&mut self, faults: &mut FaultLog, now: u32) {
        let id = match self.current.filter(|id| self.queue.get(*id).is_some()) {
            Some(id) => id,
            None => match self.queue.first() {
                Some(id) => id,
                None => {
                    self.current = None;
                    return;
                }
            },
        };
        self.current = Some(id);

        // Task is Copy: work on a snapshot, write back or retire below.
        let mut task = match self.queue.get(id) {
            Some(task) => *task,
            None => return,
        };

        let elapsed = now.wrapping_sub(task.last_run);

        // Only a task that itself signaled "not done" for too long is
        // killed; an idle task is never timed out.
        if task.busy && task.timeout != 0 && elapsed > task.timeout {
            faults.report(FaultCode::TaskTimeout, [id as u32, elapsed, 0, 0], now);
            self.retire(id);
            return;
        }

        // Busy tasks are re-polled regardless of interval: the pending
        // run has already started.
        if task.periodic && !task.busy && elapsed < task.interval {
            self.advance(id, task.exclusive);
            return;
        }

        if (task.action)(&mut task.params) {
            task.busy = false;
            task.last_run = now;
            if !task.infinite {
                task.runs_remaining = task.runs_remaining.saturating_sub(1);
                if task.runs_remaining == 0 {
                    self.retire(id);
                    return;
                }
            }
        } else {
            task.busy = true;
        }

        if let Some(slot) = self.queue.get_mut(id) {
            *slot = task;
        }
        self.advance(id, task.exclusive);
    }

    fn advance(&mut self, id: TaskId, exclusive: bool) {
        if exclusive {
            return;
        }
        self.current = self.queue.next(id).or_else(|| self.queue.first());
    }

    fn retire(&mut self, id: TaskId) {
        let next = self.queue.next(id);
        self.queue.remove(id);
        self.current = next.or_else(|| self.queue.first());
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::SLOT_COUNT;

    fn count_up(params: &mut [u32; TASK_PARAM_COUNT]) -> bool {
        params[0] += 1;
        true
    }

    fn never_done(params: &mut [u32; TASK_PARAM_COUNT]) -> bool {
        params[0] += 1;
        false
    }

    /// Done on the third poll; params[1] counts polls.
    fn third_time(params: &mut [u32; TASK_PARAM_COUNT]) -> bool {
        params[1] += 1;
        params[1] % 3 == 0
    }

    #[test]
    fn test_one_shot_runs_once_then_removed() {
        let mut sched = TaskScheduler::new();
        let mut faults = FaultLog::new();

        sched.add_task(&TaskSpec::new(count_up), 0).unwrap();
        assert_eq!(sched.len(), 1);

        sched.step(&mut faults, 1);
        assert!(sched.is_empty());

        // Further steps are no-ops.
        sched.step(&mut faults, 2);
        assert!(faults.drain().is_none());
    }

    #[test]
    fn test_run_count_exhausts_exactly() {
        let mut sched = TaskScheduler::new();
        let mut faults = FaultLog::new();

        let mut spec = TaskSpec::new(count_up);
        spec.runs = 3;
        let id = sched.add_task(&spec, 0).unwrap();

        sched.step(&mut faults, 1);
        sched.step(&mut faults, 2);
        assert_eq!(sched.task(id).unwrap().params[0], 2);
        assert_eq!(sched.task(id).unwrap().runs_remaining(), 1);

        sched.step(&mut faults, 3);
        assert!(sched.task(id).is_none());
    }

    #[test]
    fn test_infinite_never_retires() {
        let mut sched = TaskScheduler::new();
        let mut faults = FaultLog::new();

        let mut spec = TaskSpec::new(count_up);
        spec.runs = 1;
        spec.infinite = true;
        let id = sched.add_task(&spec, 0).unwrap();

        for tick in 0..50 {
            sched.step(&mut faults, tick);
        }
        assert_eq!(sched.task(id).unwrap().params[0], 50);
        assert_eq!(sched.task(id).unwrap().runs_remaining(), 1);
    }

    #[test]
    fn test_periodic_first_run_waits_one_interval() {
        let mut sched = TaskScheduler::new();
        let mut faults = FaultLog::new();

        let mut spec = TaskSpec::new(count_up);
        spec.periodic = true;
        spec.infinite = true;
        spec.interval = 10;
        let id = sched.add_task(&spec, 100).unwrap();

        sched.step(&mut faults, 105);
        assert_eq!(sched.task(id).unwrap().params[0], 0); // not yet

        sched.step(&mut faults, 110);
        assert_eq!(sched.task(id).unwrap().params[0], 1);
    }

    #[test]
    fn test_periodic_respects_interval_after_completion() {
        let mut sched = TaskScheduler::new();
        let mut faults = FaultLog::new();

        let mut spec = TaskSpec::new(count_up);
        spec.periodic = true;
        spec.infinite = true;
        spec.interval = 10;
        let id = sched.add_task(&spec, 0).unwrap();

        for tick in 0..100 {
            sched.step(&mut faults, tick);
        }
        // Completions at t=10,20,...,90: never twice within an interval.
        assert_eq!(sched.task(id).unwrap().params[0], 9);
    }

    #[test]
    fn test_busy_task_repolled_ignoring_interval() {
        let mut sched = TaskScheduler::new();
        let mut faults = FaultLog::new();

        let mut spec = TaskSpec::new(third_time);
        spec.periodic = true;
        spec.infinite = true;
        spec.interval = 1000;
        let id = sched.add_task(&spec, 0).unwrap();

        // First invocation after one interval; the two "not done" polls
        // continue on consecutive passes.
        sched.step(&mut faults, 1000);
        assert!(sched.task(id).unwrap().is_busy());
        sched.step(&mut faults, 1001);
        sched.step(&mut faults, 1002);

        let task = sched.task(id).unwrap();
        assert_eq!(task.params[1], 3);
        assert!(!task.is_busy());
        // Multi-pass run counts once: next invocation waits an interval.
        sched.step(&mut faults, 1003);
        assert_eq!(sched.task(id).unwrap().params[1], 3);
    }

    #[test]
    fn test_timeout_retires_busy_task_with_record() {
        let mut sched = TaskScheduler::new();
        let mut faults = FaultLog::new();

        let mut spec = TaskSpec::new(never_done);
        spec.infinite = true;
        spec.timeout = 500;
        let id = sched.add_task(&spec, 0).unwrap();

        sched.step(&mut faults, 100); // goes busy
        assert!(sched.task(id).unwrap().is_busy());
        sched.step(&mut faults, 300); // within budget, re-polled
        assert_eq!(sched.task(id).unwrap().params[0], 2);

        sched.step(&mut faults, 501); // elapsed 501 > 500 since last_run=0
        assert!(sched.task(id).is_none());

        let rec = faults.last_error().unwrap();
        assert_eq!(rec.code, FaultCode::TaskTimeout);
        assert_eq!(rec.values[0], id as u32);
        assert_eq!(rec.values[1], 501);
        // Exactly one record.
        assert!(faults.drain().is_some());
        assert!(faults.drain().is_none());
    }

    #[test]
    fn test_idle_task_never_times_out() {
        let mut sched = TaskScheduler::new();
        let mut faults = FaultLog::new();

        let mut spec = TaskSpec::new(count_up);
        spec.infinite = true;
        spec.timeout = 10;
        let id = sched.add_task(&spec, 0).unwrap();

        // Always completes within the pass; huge gaps between passes are
        // not the task's fault.
        sched.step(&mut faults, 1_000);
        sched.step(&mut faults, 50_000);
        assert_eq!(sched.task(id).unwrap().params[0], 2);
        assert!(faults.drain().is_none());
    }

    #[test]
    fn test_round_robin_alternates() {
        let mut sched = TaskScheduler::new();
        let mut faults = FaultLog::new();

        let mut spec = TaskSpec::new(count_up);
        spec.infinite = true;
        let a = sched.add_task(&spec, 0).unwrap();
        let b = sched.add_task(&spec, 0).unwrap();

        for tick in 0..6 {
            sched.step(&mut faults, tick);
        }
        assert_eq!(sched.task(a).unwrap().params[0], 3);
        assert_eq!(sched.task(b).unwrap().params[0], 3);
    }

    #[test]
    fn test_exclusive_starves_others_until_done() {
        let mut sched = TaskScheduler::new();
        let mut faults = FaultLog::new();

        let mut excl = TaskSpec::new(third_time);
        excl.exclusive = true;
        let ex = sched.add_task(&excl, 0).unwrap();

        let mut other = TaskSpec::new(count_up);
        other.infinite = true;
        let ot = sched.add_task(&other, 0).unwrap();

        sched.step(&mut faults, 1);
        sched.step(&mut faults, 2);
        assert_eq!(sched.task(ot).unwrap().params[0], 0); // starved

        sched.step(&mut faults, 3); // third poll completes and retires it
        assert!(sched.task(ex).is_none());

        sched.step(&mut faults, 4);
        assert_eq!(sched.task(ot).unwrap().params[0], 1);
    }

    #[test]
    fn test_queue_capacity_and_remove() {
        let mut sched = TaskScheduler::new();

        let spec = TaskSpec::new(count_up);
        let mut ids = Vec::new();
        for _ in 0..SLOT_COUNT {
            ids.push(sched.add_task(&spec, 0).unwrap());
        }
        assert!(sched.add_task(&spec, 0).is_none());

        sched.remove_task(ids[3]);
        assert_eq!(sched.len(), SLOT_COUNT - 1);
        assert!(sched.add_task(&spec, 0).is_some());
    }
}
