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
use crate::{cpu::CpuSet, types::TaskPriority};

/// Picks the CPU in `affinity` whose running task has the lowest
/// priority, lowest CPU id on ties. The mask must be non-empty.
pub(crate) fn select_cpu(q: &RunQueues, affinity: CpuSet) -> usize {
    let mut best: Option<(usize, TaskPriority)> = None;
    for cpu in affinity.iter() {
        let priority = q.assigned[cpu]
            .front()
            .map(|t| t.priority())
            .expect("every cpu runs a task");
        // Strict comparison keeps the lowest id among equals.
        if best.map_or(true, |(_, p)| priority < p) {
            best = Some((cpu, priority));
        }
    }
    let Some((cpu, _)) = best else {
        panic!("cpu selection over an empty affinity mask");
    };
    cpu
}
