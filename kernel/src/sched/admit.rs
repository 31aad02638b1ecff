// Copyright (c) 2025 vivo Mobile Communication Co., Ltd.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//       http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Admission of a task that just became runnable, and its inverse.
//! Both entry points assume the caller established a critical section
//! and already detached the task from whatever wait list held it.

#[cfg(feature = "smp")]
use super::cpu_select;
use super::queues::{insert_prioritized, RunQueues, TaskList, QUEUES};
#[cfg(feature = "smp")]
use crate::cpu::{self, IRQ_LOCK, SCHED_LOCK};
#[cfg(feature = "smp")]
use crate::types::TaskPriority;
use crate::{
    arch,
    task::{self, Task, TaskNode},
};
use log::trace;

/// Queues the runnable task `t` and reports whether the caller must
/// context switch: true iff the head of the local CPU's queue changed.
/// A head change effected on a paused peer CPU reports false; the peer
/// picks up its new head when resumed.
pub fn add_ready_to_run(t: TaskNode) -> bool {
    assert!(
        !arch::local_irq_enabled(),
        "admission requires a critical section"
    );
    let mut q = QUEUES.lock();
    add_locked(&mut q, t)
}

/// Takes the runnable task `t` out of scheduling, leaving it
/// `BLOCKED`. Returns true iff the local CPU must context switch.
pub fn remove_ready_to_run(t: TaskNode) -> bool {
    assert!(
        !arch::local_irq_enabled(),
        "removal requires a critical section"
    );
    let mut q = QUEUES.lock();
    remove_locked(&mut q, t)
}

#[cfg(not(feature = "smp"))]
pub(crate) fn add_locked(q: &mut RunQueues, t: TaskNode) -> bool {
    assert!(t.link.is_detached());

    let running = q.ready.front().expect("ready list seeds the running task");

    // The running task has pre-emption disabled and would be displaced
    // by the newcomer: park it until the scheduler is unlocked.
    if running.lock_count() > 0 && running.priority() < t.priority() {
        trace!(
            "task 0x{:x} pri {} pended, scheduler locked",
            Task::id(&t),
            t.priority()
        );
        t.set_state(task::PENDING);
        insert_prioritized(&mut q.pending, t);
        return false;
    }

    if insert_prioritized(&mut q.ready, t.clone()) {
        debug_assert_eq!(running.lock_count(), 0);
        t.set_state(task::RUNNING);
        running.set_state(task::READY_TO_RUN);
        trace!(
            "task 0x{:x} pri {} displaces 0x{:x}",
            Task::id(&t),
            t.priority(),
            Task::id(&running)
        );
        return true;
    }
    t.set_state(task::READY_TO_RUN);
    false
}

#[cfg(not(feature = "smp"))]
pub(crate) fn remove_locked(q: &mut RunQueues, t: TaskNode) -> bool {
    assert!(!t.is_idle(), "idle tasks never block");
    let was_head = q.ready.front().map_or(false, |h| h.is(&t));
    let ok = TaskList::detach(&t);
    assert!(ok, "task is not queued");
    t.set_state(task::BLOCKED);
    if was_head {
        let next = q.ready.front().expect("idle task pins the ready list");
        next.set_state(task::RUNNING);
        return true;
    }
    false
}

#[cfg(feature = "smp")]
pub(crate) fn add_locked(q: &mut RunQueues, t: TaskNode) -> bool {
    assert!(t.link.is_detached());
    assert!(!t.affinity().is_empty());
    if t.pinned() {
        assert!(t.affinity().contains(t.cpu()));
    }

    let me = arch::current_cpu_id();

    // Selection and insertion both run under the queue lock, so the
    // chosen CPU cannot be raced from here; the bounded retry keeps
    // the procedure safe should that ever cease to hold.
    for attempt in 0..2 {
        // A pinned task has no choice of CPU; everyone else goes where
        // the lowest-priority task is running.
        let cpu = if t.pinned() {
            t.cpu()
        } else {
            cpu_select::select_cpu(q, t.affinity())
        };
        let running = q.assigned[cpu].front().expect("every cpu runs a task");

        let target = if running.priority() < t.priority() {
            task::RUNNING
        } else if t.pinned() {
            task::ASSIGNED
        } else {
            task::READY_TO_RUN
        };

        // A pre-emption lock anywhere, or the IRQ lock on some other
        // CPU, defers every admission that could cause a context
        // switch. Assigned placements cannot, so they are exempt.
        if (SCHED_LOCK.is_locked() || cpu::irq_locked_by_other(me)) && target != task::ASSIGNED {
            trace!(
                "task 0x{:x} pri {} pended, scheduler or irq locked",
                Task::id(&t),
                t.priority()
            );
            t.set_state(task::PENDING);
            insert_prioritized(&mut q.pending, t);
            return false;
        }

        if target == task::READY_TO_RUN {
            t.set_state(task::READY_TO_RUN);
            insert_prioritized(&mut q.ready, t);
            return false;
        }

        // Rewriting a peer's queue requires the peer halted.
        if cpu != me {
            cpu::pause_cpu(cpu);
        }

        let switched = insert_prioritized(&mut q.assigned[cpu], t.clone());
        if switched != (target == task::RUNNING) {
            // The queue changed between selection and insertion; undo
            // and pick again.
            assert_eq!(attempt, 0, "cpu selection raced twice");
            let ok = TaskList::detach(&t);
            debug_assert!(ok);
            if cpu != me {
                cpu::resume_cpu(cpu);
            }
            continue;
        }

        if switched {
            finish_preemption(q, cpu, &t);
            if cpu != me {
                cpu::resume_cpu(cpu);
                // Only the peer's head changed; it resumes into the
                // new task on its own.
                return false;
            }
            return true;
        }

        // Pinned, and not strong enough to displace cpu's runner.
        t.set_cpu(cpu);
        t.set_state(task::ASSIGNED);
        trace!(
            "task 0x{:x} pri {} assigned behind cpu{}",
            Task::id(&t),
            t.priority(),
            cpu
        );
        if cpu != me {
            cpu::resume_cpu(cpu);
        }
        return false;
    }
    unreachable!("admission retry exhausted");
}

/// Books `t` in as the new running head of `cpu`: state, CPU binding,
/// global lock sets, and a home for the task it displaced.
#[cfg(feature = "smp")]
fn finish_preemption(q: &mut RunQueues, cpu: usize, t: &TaskNode) {
    t.set_cpu(cpu);
    t.set_state(task::RUNNING);
    trace!(
        "task 0x{:x} pri {} now running on cpu{}",
        Task::id(t),
        t.priority(),
        cpu
    );
    sync_lock_masks(cpu, t);

    // The displaced task sits right behind the new head and cannot be
    // a head itself, so no displacement cascades from here.
    let next = q.assigned[cpu]
        .next_of(t)
        .expect("the displaced task follows the new head");
    if next.pinned() {
        debug_assert_eq!(next.cpu(), cpu);
        next.set_state(task::ASSIGNED);
        return;
    }
    let ok = TaskList::detach(&next);
    debug_assert!(ok);
    // The takeover may just have re-locked the scheduler; re-check
    // before rehoming the loser.
    if SCHED_LOCK.is_locked() {
        next.set_state(task::PENDING);
        insert_prioritized(&mut q.pending, next);
    } else {
        next.set_state(task::READY_TO_RUN);
        insert_prioritized(&mut q.ready, next);
    }
}

/// The global lock sets mirror whichever task runs on each CPU.
#[cfg(feature = "smp")]
fn sync_lock_masks(cpu: usize, t: &TaskNode) {
    if t.lock_count() > 0 {
        SCHED_LOCK.set_holder(cpu);
    } else {
        SCHED_LOCK.clear_holder(cpu);
    }
    if t.irq_count() > 0 {
        IRQ_LOCK.set_holder(cpu);
    } else {
        IRQ_LOCK.clear_holder(cpu);
    }
}

#[cfg(feature = "smp")]
pub(crate) fn remove_locked(q: &mut RunQueues, t: TaskNode) -> bool {
    assert!(!t.is_idle(), "idle tasks never block");
    match t.state() {
        task::READY_TO_RUN | task::PENDING => {
            let ok = TaskList::detach(&t);
            assert!(ok, "task is not queued");
            t.set_state(task::BLOCKED);
            false
        }
        task::ASSIGNED | task::RUNNING => {
            let cpu = t.cpu();
            let me = arch::current_cpu_id();
            if cpu != me {
                cpu::pause_cpu(cpu);
            }
            let was_head = q.assigned[cpu].front().map_or(false, |h| h.is(&t));
            let ok = TaskList::detach(&t);
            assert!(ok, "task is not queued");
            t.set_state(task::BLOCKED);
            let mut switch = false;
            if was_head {
                promote_next(q, cpu);
                switch = true;
            }
            if cpu != me {
                cpu::resume_cpu(cpu);
                switch = false;
            }
            switch
        }
        other => panic!("removing task in state {}", other),
    }
}

/// After the running head of `cpu` left: the next queued task takes
/// over, unless the ready list holds a higher-priority task eligible
/// for this CPU.
#[cfg(feature = "smp")]
fn promote_next(q: &mut RunQueues, cpu: usize) {
    // Non-head entries are all pinned here, the idle task at least.
    let next = q.assigned[cpu].front().expect("idle task pins the queue");
    debug_assert_eq!(next.cpu(), cpu);
    next.set_state(task::RUNNING);
    sync_lock_masks(cpu, &next);

    let Some(winner) = best_ready_for(q, cpu, next.priority()) else {
        return;
    };
    let ok = TaskList::detach(&winner);
    debug_assert!(ok);
    let became_head = insert_prioritized(&mut q.assigned[cpu], winner.clone());
    assert!(became_head);
    finish_preemption(q, cpu, &winner);
}

/// Highest-priority ready task allowed on `cpu` and strictly above
/// `min_priority`. The ready list is ordered, so the first eligible
/// member wins.
#[cfg(feature = "smp")]
fn best_ready_for(q: &RunQueues, cpu: usize, min_priority: TaskPriority) -> Option<TaskNode> {
    for t in q.ready.iter() {
        debug_assert!(!t.pinned());
        if t.priority() <= min_priority {
            return None;
        }
        if t.affinity().contains(cpu) {
            return Some(t);
        }
    }
    None
}


#[cfg(all(test, not(feature = "smp")))]
mod up_tests {
    use super::*;
    use crate::{
        sched::{lock_preemption, testing, unlock_preemption},
        support::IrqGuard,
        task::TaskBuilder,
    };

    fn spawn(name: &'static str, priority: u8) -> TaskNode {
        TaskBuilder::new(name).priority(priority).build()
    }

    fn admit(t: &TaskNode) -> bool {
        let _irq = IrqGuard::new();
        add_ready_to_run(t.clone())
    }

    fn remove(t: &TaskNode) -> bool {
        let _irq = IrqGuard::new();
        remove_ready_to_run(t.clone())
    }

    fn running() -> TaskNode {
        let q = QUEUES.lock();
        q.ready.front().expect("ready list seeds the running task")
    }

    fn ready_priorities() -> Vec<u8> {
        let q = QUEUES.lock();
        q.ready.iter().map(|t| t.priority()).collect()
    }

    #[test]
    fn simple_wake_no_preemption() {
        testing::run(|| {
            let a = spawn("a", 100);
            assert!(admit(&a));
            assert_eq!(a.state(), task::RUNNING);

            let b = spawn("b", 80);
            assert!(!admit(&b));
            assert_eq!(b.state(), task::READY_TO_RUN);
            assert_eq!(ready_priorities(), vec![100, 80, 0]);
            assert!(running().is(&a));
            testing::check();
        });
    }

    #[test]
    fn wake_with_preemption() {
        testing::run(|| {
            let a = spawn("a", 50);
            assert!(admit(&a));
            let b = spawn("b", 200);
            assert!(admit(&b));
            assert_eq!(b.state(), task::RUNNING);
            assert_eq!(a.state(), task::READY_TO_RUN);
            assert_eq!(ready_priorities(), vec![200, 50, 0]);
            testing::check();
        });
    }

    #[test]
    fn wake_blocked_by_lock_then_replayed() {
        testing::run(|| {
            let a = spawn("a", 50);
            assert!(admit(&a));
            lock_preemption();

            let b = spawn("b", 200);
            assert!(!admit(&b));
            assert_eq!(b.state(), task::PENDING);
            assert!(running().is(&a));
            testing::check();

            assert!(unlock_preemption());
            assert!(running().is(&b));
            assert_eq!(a.state(), task::READY_TO_RUN);
            testing::check();
        });
    }

    #[test]
    fn lower_priority_wake_ignores_lock() {
        testing::run(|| {
            let a = spawn("a", 50);
            assert!(admit(&a));
            lock_preemption();
            // No displacement, the lock does not apply.
            let b = spawn("b", 10);
            assert!(!admit(&b));
            assert_eq!(b.state(), task::READY_TO_RUN);
            assert!(!unlock_preemption());
            testing::check();
        });
    }

    #[test]
    fn remove_head_hands_over() {
        testing::run(|| {
            let a = spawn("a", 100);
            let b = spawn("b", 60);
            assert!(admit(&a));
            assert!(!admit(&b));
            assert!(remove(&a));
            assert_eq!(a.state(), task::BLOCKED);
            assert!(running().is(&b));
            assert_eq!(b.state(), task::RUNNING);
            // Taking the head again hands the CPU to the idle task.
            assert!(remove(&b));
            assert!(running().is_idle());
            testing::check();
        });
    }
}
