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

use super::queues::RunQueues;
use crate::{
    config::{IDLE_TASK_PRIORITY, NUM_CORES},
    task::{self, Task, TaskBuilder},
};

/// Seeds one idle task per CPU as the initial running head of its
/// queue. Idle tasks are pinned and never block, so every queue a
/// runner is taken from keeps at least one member.
pub(crate) fn create_idle_tasks(q: &mut RunQueues) {
    for cpu in 0..NUM_CORES {
        let t = TaskBuilder::new("idle")
            .priority(IDLE_TASK_PRIORITY)
            .pin_to(cpu)
            .idle()
            .build();
        t.set_state(task::RUNNING);
        t.set_cpu(cpu);
        #[cfg(feature = "smp")]
        let ok = q.assigned[cpu].push_back(t.clone());
        #[cfg(not(feature = "smp"))]
        let ok = q.ready.push_back(t.clone());
        assert!(ok);
        log::debug!("idle task 0x{:x} seeded on cpu{}", Task::id(&t), cpu);
    }
}
