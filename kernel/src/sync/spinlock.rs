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

use crate::support::IrqGuard;
use core::{
    ops::{Deref, DerefMut},
    sync::atomic::{compiler_fence, AtomicBool, Ordering},
};
use spin::{Mutex, MutexGuard};

#[derive(Debug)]
pub struct SpinLock<T: ?Sized> {
    lock: Mutex<T>,
}

// Field order matters: the mutex guard must drop before interrupts are
// re-enabled. See
// https://doc.rust-lang.org/reference/destructors.html#r-destructors.operation
#[derive(Debug)]
pub struct SpinLockGuard<'a, T: ?Sized> {
    mutex_guard: MutexGuard<'a, T>,
    irq_guard: Option<IrqGuard>,
}

impl<'a, T: 'a + ?Sized> Deref for SpinLockGuard<'a, T> {
    type Target = T;
    #[inline]
    fn deref(&self) -> &T {
        self.mutex_guard.deref()
    }
}

impl<'a, T: 'a + ?Sized> DerefMut for SpinLockGuard<'a, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        self.mutex_guard.deref_mut()
    }
}

impl<T> SpinLock<T> {
    pub const fn new(val: T) -> Self {
        Self {
            lock: Mutex::new(val),
        }
    }
}

impl<T: ?Sized> SpinLock<T> {
    pub fn try_lock(&self) -> Option<SpinLockGuard<'_, T>> {
        let mutex_guard = self.lock.try_lock()?;
        Some(SpinLockGuard {
            mutex_guard,
            irq_guard: None,
        })
    }

    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        loop {
            let Some(guard) = self.try_lock() else {
                core::hint::spin_loop();
                continue;
            };
            return guard;
        }
    }

    pub fn try_irqsave_lock(&self) -> Option<SpinLockGuard<'_, T>> {
        let irq_guard = IrqGuard::new();
        compiler_fence(Ordering::SeqCst);
        let Some(mut guard) = self.try_lock() else {
            return None;
        };
        guard.irq_guard = Some(irq_guard);
        Some(guard)
    }

    pub fn irqsave_lock(&self) -> SpinLockGuard<'_, T> {
        loop {
            let Some(guard) = self.try_irqsave_lock() else {
                core::hint::spin_loop();
                continue;
            };
            return guard;
        }
    }

    /// Steals a lock that a defunct owner left held. Test harness only.
    ///
    /// # Safety
    ///
    /// No live guard may exist.
    #[cfg(not(target_os = "none"))]
    pub unsafe fn force_unlock(&self) {
        unsafe { self.lock.force_unlock() };
    }
}

unsafe impl<T: ?Sized + Send> Send for SpinLock<T> {}
unsafe impl<T: ?Sized + Send> Sync for SpinLock<T> {}

/// Manually paired test-and-set spinlock. Unlike [`SpinLock`] it has no
/// guard: acquisition and release may happen in different scopes, and
/// other subsystems may observe its held state.
#[derive(Debug)]
pub struct RawSpin {
    locked: AtomicBool,
}

impl RawSpin {
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }

    pub fn lock(&self) {
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            core::hint::spin_loop();
        }
    }

    pub fn try_lock(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    pub fn unlock(&self) {
        debug_assert!(self.is_locked());
        self.locked.store(false, Ordering::Release);
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }

    #[cfg(not(target_os = "none"))]
    pub(crate) fn force_reset(&self) {
        self.locked.store(false, Ordering::SeqCst);
    }
}

impl Default for RawSpin {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_spin_pairs() {
        let s = RawSpin::new();
        assert!(!s.is_locked());
        s.lock();
        assert!(s.is_locked());
        assert!(!s.try_lock());
        s.unlock();
        assert!(!s.is_locked());
        assert!(s.try_lock());
        s.unlock();
    }

    #[test]
    fn spinlock_guards_data() {
        let l = SpinLock::new(41);
        {
            let mut g = l.irqsave_lock();
            *g += 1;
            assert!(l.try_lock().is_none());
        }
        assert_eq!(*l.lock(), 42);
    }
}
