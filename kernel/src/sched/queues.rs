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

#[cfg(feature = "smp")]
use crate::config::NUM_CORES;
use crate::{
    sync::SpinLock,
    task::{OffsetOfLink, Task, TaskNode},
    types::KrefList,
};

pub(crate) type TaskList = KrefList<Task, OffsetOfLink>;

/// The process-wide run queues. `ready` holds runnable tasks not bound
/// to a CPU (on uniprocessor builds its head is the running task);
/// `pending` holds admissions deferred by pre-emption or IRQ locking;
/// each `assigned` list is headed by the task its CPU is running,
/// followed by tasks pinned there.
pub(crate) struct RunQueues {
    pub ready: TaskList,
    pub pending: TaskList,
    #[cfg(feature = "smp")]
    pub assigned: [TaskList; NUM_CORES],
}

// Queue linkage is only touched while holding `QUEUES`.
unsafe impl Send for RunQueues {}

impl RunQueues {
    pub const fn new() -> Self {
        Self {
            ready: TaskList::new(),
            pending: TaskList::new(),
            #[cfg(feature = "smp")]
            assigned: [const { TaskList::new() }; NUM_CORES],
        }
    }

    /// Links the queue sentinels; the queues must already sit at their
    /// final address. Safe to call again after a drain.
    pub fn init(&mut self) {
        self.ready.init();
        self.pending.init();
        #[cfg(feature = "smp")]
        for list in self.assigned.iter_mut() {
            list.init();
        }
    }
}

pub(crate) static QUEUES: SpinLock<RunQueues> = SpinLock::new(RunQueues::new());

/// Inserts `t` in front of the first member with strictly lower
/// priority, keeping the list non-increasing and FIFO among equal
/// priorities. Returns true iff `t` became the new head.
pub(crate) fn insert_prioritized(list: &mut TaskList, t: TaskNode) -> bool {
    debug_assert!(t.link.is_detached());
    let priority = t.priority();
    let mut at_head = true;
    for other in list.iter() {
        if other.priority() < priority {
            let node = unsafe { TaskList::node_of_mut(&other) };
            let ok = TaskList::insert_before(node, t);
            debug_assert!(ok);
            return at_head;
        }
        at_head = false;
    }
    let ok = list.push_back(t);
    debug_assert!(ok);
    at_head
}

#[cfg(test)]
pub(crate) fn assert_ordered(list: &TaskList) {
    let mut last: Option<u8> = None;
    for t in list.iter() {
        if let Some(prev) = last {
            assert!(
                prev >= t.priority(),
                "queue out of order: {} before {}",
                prev,
                t.priority()
            );
        }
        last = Some(t.priority());
    }
}

/// Walks every queue and asserts the cross-queue invariants: ordering,
/// state/queue agreement, running heads, and (SMP) lock-mask accord.
#[cfg(test)]
pub(crate) fn assert_consistent(q: &RunQueues) {
    use crate::task;

    assert_ordered(&q.ready);
    assert_ordered(&q.pending);
    for t in q.pending.iter() {
        assert_eq!(t.state(), task::PENDING);
    }

    #[cfg(feature = "smp")]
    {
        use crate::cpu::{IRQ_LOCK, SCHED_LOCK};

        for t in q.ready.iter() {
            assert_eq!(t.state(), task::READY_TO_RUN);
            assert!(!t.pinned());
        }
        for cpu in 0..NUM_CORES {
            let list = &q.assigned[cpu];
            assert_ordered(list);
            let head = list.front().expect("every cpu must be running a task");
            assert_eq!(head.state(), task::RUNNING);
            assert_eq!(head.cpu(), cpu);
            let mut first = true;
            for t in list.iter() {
                if first {
                    first = false;
                    continue;
                }
                assert_eq!(t.state(), task::ASSIGNED);
                assert!(t.pinned());
                assert_eq!(t.cpu(), cpu);
            }
            assert_eq!(SCHED_LOCK.held_by(cpu), head.lock_count() > 0);
            assert_eq!(IRQ_LOCK.held_by(cpu), head.irq_count() > 0);
        }
    }

    #[cfg(not(feature = "smp"))]
    {
        let head = q.ready.front().expect("ready list seeds the running task");
        assert_eq!(head.state(), task::RUNNING);
        let mut first = true;
        for t in q.ready.iter() {
            if first {
                first = false;
                continue;
            }
            assert_eq!(t.state(), task::READY_TO_RUN);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cpu::CpuSet, types::Kref};
    use quickcheck_macros::quickcheck;

    fn make(priority: u8) -> TaskNode {
        Kref::new(Task::new("q", priority, CpuSet::ALL, None, false))
    }

    fn priorities(list: &TaskList) -> Vec<u8> {
        list.iter().map(|t| t.priority()).collect()
    }

    #[test]
    fn empty_insert_reports_head() {
        let mut list = TaskList::new();
        list.init();
        assert!(insert_prioritized(&mut list, make(5)));
        assert!(!insert_prioritized(&mut list, make(5)));
        assert!(insert_prioritized(&mut list, make(6)));
        assert_eq!(priorities(&list), vec![6, 5, 5]);
        list.clear();
    }

    #[test]
    fn equal_priorities_keep_fifo_order() {
        let mut list = TaskList::new();
        list.init();
        let a = make(7);
        let b = make(7);
        let c = make(7);
        insert_prioritized(&mut list, a.clone());
        insert_prioritized(&mut list, b.clone());
        insert_prioritized(&mut list, c.clone());
        let order: Vec<bool> = list
            .iter()
            .zip([&a, &b, &c])
            .map(|(got, want)| got.is(want))
            .collect();
        assert_eq!(order, vec![true, true, true]);
        list.clear();
    }

    #[test]
    fn lower_priority_lands_behind() {
        let mut list = TaskList::new();
        list.init();
        insert_prioritized(&mut list, make(100));
        assert!(!insert_prioritized(&mut list, make(80)));
        assert!(!insert_prioritized(&mut list, make(90)));
        assert_eq!(priorities(&list), vec![100, 90, 80]);
        list.clear();
    }

    #[quickcheck]
    fn prop_insert_keeps_order_and_reports_head(prios: Vec<u8>) -> bool {
        let mut list = TaskList::new();
        list.init();
        let mut inserted: Vec<TaskNode> = Vec::new();
        let mut ok = true;
        for p in prios {
            let t = make(p);
            let was_head = insert_prioritized(&mut list, t.clone());
            inserted.push(t.clone());
            let front = list.front().expect("nonempty after insert");
            ok &= was_head == front.is(&t);
        }
        // Non-increasing order, FIFO among equals.
        let seq: Vec<(u8, usize)> = list
            .iter()
            .map(|t| {
                let idx = inserted
                    .iter()
                    .position(|i| i.is(&t))
                    .expect("member was inserted here");
                (t.priority(), idx)
            })
            .collect();
        for w in seq.windows(2) {
            ok &= w[0].0 > w[1].0 || (w[0].0 == w[1].0 && w[0].1 < w[1].1);
        }
        list.clear();
        ok
    }
}
