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

//! Simulation port for hosted builds. CPU identity, interrupt masking
//! and pause/resume are plain atomics a harness can drive; "pausing" a
//! peer just marks it paused, which is enough for a single-threaded
//! reenactment of the SMP protocol.

use crate::config::NUM_CORES;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

static CURRENT_CPU: AtomicUsize = AtomicUsize::new(0);
static IRQ_DEPTH: [AtomicUsize; NUM_CORES] = [const { AtomicUsize::new(0) }; NUM_CORES];
static IN_INTERRUPT: [AtomicBool; NUM_CORES] = [const { AtomicBool::new(false) }; NUM_CORES];
static PAUSED: [AtomicBool; NUM_CORES] = [const { AtomicBool::new(false) }; NUM_CORES];
static PAUSE_EVENTS: AtomicUsize = AtomicUsize::new(0);
static RESUME_EVENTS: AtomicUsize = AtomicUsize::new(0);

#[inline]
pub fn current_cpu_id() -> usize {
    CURRENT_CPU.load(Ordering::Relaxed)
}

/// Masks local interrupts, returning the previous nesting depth.
pub fn irq_save() -> usize {
    IRQ_DEPTH[current_cpu_id()].fetch_add(1, Ordering::SeqCst)
}

pub fn irq_restore(state: usize) {
    let old = IRQ_DEPTH[current_cpu_id()].fetch_sub(1, Ordering::SeqCst);
    debug_assert_eq!(old, state + 1, "unbalanced irq save/restore");
}

#[inline]
pub fn local_irq_enabled() -> bool {
    IRQ_DEPTH[current_cpu_id()].load(Ordering::SeqCst) == 0
}

#[inline]
pub fn in_interrupt() -> bool {
    IN_INTERRUPT[current_cpu_id()].load(Ordering::SeqCst)
}

/// Marks `cpu` paused. Fails when targeting the calling CPU or a CPU
/// that is already paused.
pub fn cpu_pause(cpu: usize) -> bool {
    if cpu == current_cpu_id() || cpu >= NUM_CORES {
        return false;
    }
    let was = PAUSED[cpu].swap(true, Ordering::SeqCst);
    if was {
        return false;
    }
    PAUSE_EVENTS.fetch_add(1, Ordering::Relaxed);
    true
}

pub fn cpu_resume(cpu: usize) -> bool {
    if cpu >= NUM_CORES {
        return false;
    }
    let was = PAUSED[cpu].swap(false, Ordering::SeqCst);
    if was {
        RESUME_EVENTS.fetch_add(1, Ordering::Relaxed);
    }
    was
}

// Simulation controls. The harness pins the "calling CPU", flips
// interrupt context and inspects pause/resume traffic through these.

pub fn set_current_cpu(cpu: usize) {
    assert!(cpu < NUM_CORES);
    CURRENT_CPU.store(cpu, Ordering::Relaxed);
}

pub fn set_in_interrupt(on: bool) {
    IN_INTERRUPT[current_cpu_id()].store(on, Ordering::SeqCst);
}

pub fn is_paused(cpu: usize) -> bool {
    PAUSED[cpu].load(Ordering::SeqCst)
}

pub fn pause_events() -> usize {
    PAUSE_EVENTS.load(Ordering::Relaxed)
}

pub fn resume_events() -> usize {
    RESUME_EVENTS.load(Ordering::Relaxed)
}

/// Returns the simulation to power-on state.
pub fn reset() {
    CURRENT_CPU.store(0, Ordering::SeqCst);
    for cpu in 0..NUM_CORES {
        IRQ_DEPTH[cpu].store(0, Ordering::SeqCst);
        IN_INTERRUPT[cpu].store(false, Ordering::SeqCst);
        PAUSED[cpu].store(false, Ordering::SeqCst);
    }
    PAUSE_EVENTS.store(0, Ordering::SeqCst);
    RESUME_EVENTS.store(0, Ordering::SeqCst);
}
