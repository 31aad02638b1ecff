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

use crate::{
    cpu::CpuSet,
    types::{impl_intrusive_adapter, AtomicTaskPriority, AtomicUint, ListHead, Kref, TaskPriority, Uint},
};
use core::sync::atomic::{AtomicUsize, Ordering};

mod builder;
pub mod registry;
pub use builder::TaskBuilder;

pub type TaskNode = Kref<Task>;

impl_intrusive_adapter!(OffsetOfLink, Task, link);
impl_intrusive_adapter!(OffsetOfRegistry, Task, registry);

// Task states. A runnable task is in exactly one run queue and its
// state names which one.
pub const BLOCKED: Uint = 0;
pub const READY_TO_RUN: Uint = 1;
pub const ASSIGNED: Uint = 2;
pub const RUNNING: Uint = 3;
pub const PENDING: Uint = 4;

/// Task control block. Queue membership is intrusive: `link` lives in
/// at most one run queue, `registry` in the global task table. The
/// block is shared through [`TaskNode`]; fields the scheduler mutates
/// after publication are atomics, everything else is fixed at build
/// time (`priority` belongs to the priority-inheritance subsystem and
/// may change underneath us at any point).
#[derive(Debug)]
pub struct Task {
    pub link: ListHead<Task, OffsetOfLink>,
    pub registry: ListHead<Task, OffsetOfRegistry>,
    name: &'static str,
    priority: AtomicTaskPriority,
    state: AtomicUint,
    cpu: AtomicUsize,
    pinned: bool,
    affinity: CpuSet,
    lock_count: AtomicUint,
    irq_count: AtomicUint,
    is_idle: bool,
}

impl Task {
    pub(crate) fn new(
        name: &'static str,
        priority: TaskPriority,
        affinity: CpuSet,
        pinned_to: Option<usize>,
        is_idle: bool,
    ) -> Self {
        Self {
            link: ListHead::new(),
            registry: ListHead::new(),
            name,
            priority: AtomicTaskPriority::new(priority),
            state: AtomicUint::new(BLOCKED),
            cpu: AtomicUsize::new(pinned_to.unwrap_or(0)),
            pinned: pinned_to.is_some(),
            affinity,
            lock_count: AtomicUint::new(0),
            irq_count: AtomicUint::new(0),
            is_idle,
        }
    }

    #[inline]
    pub fn id(me: &TaskNode) -> usize {
        TaskNode::get_handle(me) as usize
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn state(&self) -> Uint {
        self.state.load(Ordering::Relaxed)
    }

    /// CAS state transition; fails if the task is not in `from`.
    pub fn transfer_state(&self, from: Uint, to: Uint) -> bool {
        self.state
            .compare_exchange(from, to, Ordering::SeqCst, Ordering::Relaxed)
            .is_ok()
    }

    /// Unconditional store; only the run-queue lock holder may use it.
    #[inline]
    pub(crate) fn set_state(&self, to: Uint) {
        self.state.store(to, Ordering::Relaxed);
    }

    pub fn state_name(&self) -> &'static str {
        match self.state() {
            BLOCKED => "blocked",
            READY_TO_RUN => "ready",
            ASSIGNED => "assigned",
            RUNNING => "running",
            PENDING => "pending",
            _ => "unknown",
        }
    }

    #[inline]
    pub fn priority(&self) -> TaskPriority {
        self.priority.load(Ordering::Relaxed)
    }

    /// Entry point for the priority-inheritance subsystem; the new
    /// value takes effect at the next admission of this task.
    #[inline]
    pub fn set_priority(&self, priority: TaskPriority) {
        self.priority.store(priority, Ordering::Relaxed);
    }

    #[inline]
    pub fn cpu(&self) -> usize {
        self.cpu.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn set_cpu(&self, cpu: usize) {
        self.cpu.store(cpu, Ordering::Relaxed);
    }

    /// True when the task may only execute on [`Self::cpu`].
    #[inline]
    pub fn pinned(&self) -> bool {
        self.pinned
    }

    #[inline]
    pub fn affinity(&self) -> CpuSet {
        self.affinity
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.is_idle
    }

    #[inline]
    pub fn lock_count(&self) -> Uint {
        self.lock_count.load(Ordering::Relaxed)
    }

    /// Returns the previous count.
    #[inline]
    pub(crate) fn lock_count_inc(&self) -> Uint {
        self.lock_count.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns the previous count.
    #[inline]
    pub(crate) fn lock_count_dec(&self) -> Uint {
        let old = self.lock_count.fetch_sub(1, Ordering::Relaxed);
        debug_assert!(old > 0);
        old
    }

    #[inline]
    pub fn irq_count(&self) -> Uint {
        self.irq_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn irq_count_inc(&self) -> Uint {
        self.irq_count.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn irq_count_dec(&self) -> Uint {
        let old = self.irq_count.fetch_sub(1, Ordering::Relaxed);
        debug_assert!(old > 0);
        old
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        assert!(self.link.is_detached());
        assert!(self.registry.is_detached());
    }
}

unsafe impl Send for Task {}
unsafe impl Sync for Task {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_transfer() {
        let t = Task::new("t", 10, CpuSet::ALL, None, false);
        assert_eq!(t.state(), BLOCKED);
        assert!(t.transfer_state(BLOCKED, READY_TO_RUN));
        assert!(!t.transfer_state(BLOCKED, RUNNING));
        assert_eq!(t.state_name(), "ready");
        t.set_state(RUNNING);
        assert_eq!(t.state(), RUNNING);
    }

    #[test]
    fn counts() {
        let t = Task::new("t", 10, CpuSet::ALL, Some(1), false);
        assert!(t.pinned());
        assert_eq!(t.cpu(), 1);
        assert_eq!(t.lock_count_inc(), 0);
        assert_eq!(t.lock_count(), 1);
        assert_eq!(t.lock_count_dec(), 1);
        assert_eq!(t.irq_count_inc(), 0);
        assert_eq!(t.irq_count_dec(), 1);
        assert_eq!(t.irq_count(), 0);
    }
}
