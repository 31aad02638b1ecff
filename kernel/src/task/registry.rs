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

//! Global task table. Owns a share of every live task; run queues only
//! borrow additional shares on top.

use super::{OffsetOfRegistry, Task, TaskNode};
use crate::{
    sync::SpinLock,
    types::{KrefList, KrefListIter, ListHead},
};

type Head = ListHead<Task, OffsetOfRegistry>;
type TaskTable = KrefList<Task, OffsetOfRegistry>;

// An open list anchored at a bare head needs no runtime init.
struct RegistryHead(Head);

// Linkage is only touched under the spinlock.
unsafe impl Send for RegistryHead {}

static REGISTRY: SpinLock<RegistryHead> = SpinLock::new(RegistryHead(Head::new()));

pub(crate) fn register(t: TaskNode) {
    let mut head = REGISTRY.irqsave_lock();
    let ok = TaskTable::insert_after(&mut head.0, t);
    assert!(ok, "task is already registered");
}

pub fn unregister(t: &TaskNode) -> bool {
    let _head = REGISTRY.irqsave_lock();
    TaskTable::detach(t)
}

pub fn contains(t: &TaskNode) -> bool {
    let head = REGISTRY.irqsave_lock();
    KrefListIter::from_head(&head.0).any(|m| m.is(t))
}

pub fn count() -> usize {
    let head = REGISTRY.irqsave_lock();
    KrefListIter::from_head(&head.0).count()
}

/// Calls `f` on every live task, under the table lock.
pub fn for_each(mut f: impl FnMut(&TaskNode)) {
    let head = REGISTRY.irqsave_lock();
    for t in KrefListIter::from_head(&head.0) {
        f(&t);
    }
}

/// Empties the table. Test harness only.
#[cfg(not(target_os = "none"))]
pub fn clear() -> usize {
    let head = REGISTRY.irqsave_lock();
    let mut n = 0;
    for t in KrefListIter::from_head(&head.0) {
        TaskTable::detach(&t);
        n += 1;
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cpu::CpuSet, sched::testing, types::Kref};

    #[test]
    fn register_and_unregister() {
        testing::run(|| {
            let before = count();
            let t = Kref::new(Task::new("reg", 1, CpuSet::ALL, None, false));
            register(t.clone());
            assert!(contains(&t));
            assert_eq!(count(), before + 1);
            assert!(unregister(&t));
            assert!(!contains(&t));
            assert!(!unregister(&t));
        });
    }
}
