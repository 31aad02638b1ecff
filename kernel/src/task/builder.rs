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

use super::{registry, Task, TaskNode};
use crate::{
    config::SCHED_PRIORITY_DEFAULT,
    cpu::CpuSet,
    types::{Kref, TaskPriority},
};

/// Builds a task control block and enters it into the task table. The
/// block comes out `BLOCKED` and unqueued; admission is a separate
/// step. Stack and entry-point setup belong to the execution layer and
/// are not handled here.
pub struct TaskBuilder {
    name: &'static str,
    priority: TaskPriority,
    affinity: CpuSet,
    pinned_to: Option<usize>,
    is_idle: bool,
}

impl TaskBuilder {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            priority: SCHED_PRIORITY_DEFAULT,
            affinity: CpuSet::ALL,
            pinned_to: None,
            is_idle: false,
        }
    }

    #[inline]
    pub fn priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    #[inline]
    pub fn affinity(mut self, affinity: CpuSet) -> Self {
        self.affinity = affinity;
        self
    }

    /// Locks the task to `cpu`. The affinity mask is widened to
    /// include it if necessary.
    #[inline]
    pub fn pin_to(mut self, cpu: usize) -> Self {
        self.pinned_to = Some(cpu);
        self.affinity.insert(cpu);
        self
    }

    #[inline]
    pub(crate) fn idle(mut self) -> Self {
        self.is_idle = true;
        self
    }

    pub fn build(self) -> TaskNode {
        assert!(!self.affinity.is_empty());
        if let Some(cpu) = self.pinned_to {
            assert!(self.affinity.contains(cpu));
        }
        let t = Kref::new(Task::new(
            self.name,
            self.priority,
            self.affinity,
            self.pinned_to,
            self.is_idle,
        ));
        registry::register(t.clone());
        t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{sched::testing, task};

    #[test]
    fn builder_defaults() {
        testing::run(|| {
            let t = TaskBuilder::new("worker").priority(42).build();
            assert_eq!(t.name(), "worker");
            assert_eq!(t.priority(), 42);
            assert!(!t.pinned());
            assert_eq!(t.affinity(), CpuSet::ALL);
            assert_eq!(t.state(), task::BLOCKED);
            assert!(registry::contains(&t));
            assert!(registry::unregister(&t));
        });
    }

    #[test]
    fn builder_pinning() {
        testing::run(|| {
            let t = TaskBuilder::new("pinned")
                .affinity(CpuSet::single(0))
                .pin_to(0)
                .build();
            assert!(t.pinned());
            assert_eq!(t.cpu(), 0);
            assert!(t.affinity().contains(0));
            assert!(registry::unregister(&t));
        });
    }
}
