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

mod admit;
#[cfg(feature = "smp")]
mod cpu_select;
mod idle;
pub(crate) mod queues;

pub use admit::{add_ready_to_run, remove_ready_to_run};

use crate::{support::IrqGuard, task::Task, task::TaskNode};
use core::sync::atomic::{AtomicBool, Ordering};
use log::trace;
use queues::{RunQueues, TaskList, QUEUES};

static INITED: AtomicBool = AtomicBool::new(false);

/// Brings the run queues up: sentinels linked, one idle task running
/// per CPU, multitasking declared started.
pub fn init() {
    let _irq = IrqGuard::new();
    let already = INITED.swap(true, Ordering::SeqCst);
    assert!(!already, "scheduler is already initialized");
    let mut q = QUEUES.lock();
    q.init();
    idle::create_idle_tasks(&mut q);
    drop(q);
    crate::cpu::set_multitasking_started(true);
}

fn current_task_locked(q: &RunQueues) -> TaskNode {
    #[cfg(feature = "smp")]
    {
        q.assigned[crate::arch::current_cpu_id()]
            .front()
            .expect("every cpu runs a task")
    }
    #[cfg(not(feature = "smp"))]
    {
        q.ready.front().expect("ready list seeds the running task")
    }
}

/// The task currently running on the calling CPU.
pub fn current_task() -> TaskNode {
    let _irq = IrqGuard::new();
    let q = QUEUES.lock();
    current_task_locked(&q)
}

/// Disables pre-emption kernel-wide on behalf of the running task.
/// Nests; only the outermost call changes the lock set.
pub fn lock_preemption() {
    let _irq = IrqGuard::new();
    let q = QUEUES.lock();
    let t = current_task_locked(&q);
    if t.lock_count_inc() == 0 {
        #[cfg(feature = "smp")]
        crate::cpu::SCHED_LOCK.set_holder(crate::arch::current_cpu_id());
        trace!("task 0x{:x} locked pre-emption", Task::id(&t));
    }
}

/// Drops one pre-emption lock level. When the last level goes, pended
/// admissions are replayed; returns true iff the caller must context
/// switch as a result.
pub fn unlock_preemption() -> bool {
    let _irq = IrqGuard::new();
    let mut q = QUEUES.lock();
    let t = current_task_locked(&q);
    if t.lock_count_dec() != 1 {
        return false;
    }
    #[cfg(feature = "smp")]
    crate::cpu::SCHED_LOCK.clear_holder(crate::arch::current_cpu_id());
    trace!("task 0x{:x} unlocked pre-emption", Task::id(&t));
    merge_pending_locked(&mut q)
}

/// Replays deferred admissions while nothing defers them anymore.
/// Returns true iff some replay requires the caller to context switch.
pub fn merge_pending() -> bool {
    let _irq = IrqGuard::new();
    let mut q = QUEUES.lock();
    merge_pending_locked(&mut q)
}

fn merge_pending_locked(q: &mut RunQueues) -> bool {
    let mut reschedule = false;
    loop {
        // Each replay may re-assert a lock (the admitted task may own
        // one); check again every round.
        #[cfg(feature = "smp")]
        {
            let me = crate::arch::current_cpu_id();
            if crate::cpu::SCHED_LOCK.is_locked() || crate::cpu::irq_locked_by_other(me) {
                break;
            }
        }
        #[cfg(not(feature = "smp"))]
        {
            if current_task_locked(q).lock_count() > 0 {
                break;
            }
        }
        let Some(t) = q.pending.front() else {
            break;
        };
        let ok = TaskList::detach(&t);
        debug_assert!(ok);
        trace!(
            "replaying pended task 0x{:x} pri {}",
            Task::id(&t),
            t.priority()
        );
        reschedule |= admit::add_locked(q, t);
    }
    reschedule
}
