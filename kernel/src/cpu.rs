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

use crate::config::NUM_CORES;
#[cfg(feature = "smp")]
use crate::{arch, sync::RawSpin};
use core::sync::atomic::{AtomicBool, Ordering};
#[cfg(feature = "smp")]
use core::sync::atomic::AtomicU32;

/// Set of CPUs a task may run on.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct CpuSet(u32);

impl CpuSet {
    pub const ALL: CpuSet = CpuSet((1u32 << NUM_CORES) - 1);

    pub const fn empty() -> Self {
        CpuSet(0)
    }

    pub const fn single(cpu: usize) -> Self {
        CpuSet(1 << cpu)
    }

    pub const fn contains(&self, cpu: usize) -> bool {
        self.0 & (1 << cpu) != 0
    }

    pub fn insert(&mut self, cpu: usize) -> &mut Self {
        self.0 |= 1 << cpu;
        self
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..NUM_CORES).filter(move |cpu| self.contains(*cpu))
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }
}

impl Default for CpuSet {
    fn default() -> Self {
        Self::ALL
    }
}

/// A kernel-wide lock whose holders are tracked as a CPU bitmask. The
/// mask answers "do I hold it" in O(1); the coarse `lock` alongside
/// mirrors mask emptiness for subsystems that only observe a boolean.
/// The mask and the coarse lock change together under `guard`.
#[cfg(feature = "smp")]
#[derive(Debug)]
pub(crate) struct CpuBitLock {
    holders: AtomicU32,
    guard: RawSpin,
    lock: RawSpin,
}

#[cfg(feature = "smp")]
impl CpuBitLock {
    pub const fn new() -> Self {
        Self {
            holders: AtomicU32::new(0),
            guard: RawSpin::new(),
            lock: RawSpin::new(),
        }
    }

    /// Marks `cpu` as a holder; on the 0 -> nonzero transition the
    /// coarse lock is taken.
    pub fn set_holder(&self, cpu: usize) {
        self.guard.lock();
        let old = self.holders.load(Ordering::Relaxed);
        if old == 0 {
            self.lock.lock();
        }
        self.holders.store(old | 1 << cpu, Ordering::Relaxed);
        self.guard.unlock();
    }

    /// Drops `cpu` from the holders; on the nonzero -> 0 transition the
    /// coarse lock is released.
    pub fn clear_holder(&self, cpu: usize) {
        self.guard.lock();
        let old = self.holders.load(Ordering::Relaxed);
        let new = old & !(1 << cpu);
        self.holders.store(new, Ordering::Relaxed);
        if old != 0 && new == 0 {
            self.lock.unlock();
        }
        self.guard.unlock();
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }

    #[inline]
    pub fn held_by(&self, cpu: usize) -> bool {
        self.holders.load(Ordering::Relaxed) & (1 << cpu) != 0
    }

    #[inline]
    pub fn holders(&self) -> u32 {
        self.holders.load(Ordering::Relaxed)
    }

    #[cfg(not(target_os = "none"))]
    pub(crate) fn force_reset(&self) {
        self.holders.store(0, Ordering::SeqCst);
        self.guard.force_reset();
        self.lock.force_reset();
    }
}

/// Pre-emption lock: while any CPU holds it, no admission may displace
/// a running task.
#[cfg(feature = "smp")]
pub(crate) static SCHED_LOCK: CpuBitLock = CpuBitLock::new();

/// IRQ lock: ownership of the kernel-wide interrupt critical section.
#[cfg(feature = "smp")]
pub(crate) static IRQ_LOCK: CpuBitLock = CpuBitLock::new();

static MULTITASKING_STARTED: AtomicBool = AtomicBool::new(false);

#[inline]
pub fn multitasking_started() -> bool {
    MULTITASKING_STARTED.load(Ordering::Acquire)
}

pub(crate) fn set_multitasking_started(on: bool) {
    MULTITASKING_STARTED.store(on, Ordering::Release);
}

/// True iff the IRQ lock is held by a CPU other than `me`. Before
/// multitasking starts we are single threaded and the answer is always
/// false, whatever state the coarse lock is in.
#[cfg(feature = "smp")]
pub(crate) fn irq_locked_by_other(me: usize) -> bool {
    IRQ_LOCK.guard.lock();
    let ret = if !multitasking_started() {
        false
    } else {
        let holders = IRQ_LOCK.holders.load(Ordering::Relaxed);
        if holders != 0 {
            debug_assert!(IRQ_LOCK.lock.is_locked());
            holders & (1 << me) == 0
        } else {
            // The coarse lock with no holder recorded only happens for
            // critical sections taken from an interrupt handler.
            debug_assert!(!IRQ_LOCK.lock.is_locked() || arch::in_interrupt());
            false
        }
    };
    IRQ_LOCK.guard.unlock();
    ret
}

/// Halts a peer CPU so its run queue can be rewritten. Must be called
/// inside a critical section; failure is unrecoverable.
#[cfg(feature = "smp")]
pub fn pause_cpu(cpu: usize) {
    debug_assert!(!arch::local_irq_enabled());
    debug_assert_ne!(cpu, arch::current_cpu_id());
    let ok = arch::cpu_pause(cpu);
    assert!(ok, "failed to pause cpu{}", cpu);
    log::debug!("cpu{} paused", cpu);
}

#[cfg(feature = "smp")]
pub fn resume_cpu(cpu: usize) {
    let ok = arch::cpu_resume(cpu);
    assert!(ok, "failed to resume cpu{}", cpu);
    log::debug!("cpu{} resumed", cpu);
}
