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

// FIXME: We should use kconfig to generate this file.
use crate::types::TaskPriority;

#[cfg(feature = "smp")]
pub const NUM_CORES: usize = 4;
#[cfg(not(feature = "smp"))]
pub const NUM_CORES: usize = 1;

/// Higher value means higher priority.
pub const SCHED_PRIORITY_MIN: TaskPriority = 0;
pub const SCHED_PRIORITY_MAX: TaskPriority = 255;
pub const SCHED_PRIORITY_DEFAULT: TaskPriority = 100;

pub const IDLE_TASK_PRIORITY: TaskPriority = SCHED_PRIORITY_MIN;
