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

//! Port layer. On bare metal every primitive resolves to a symbol the
//! integrating kernel provides at link time; elsewhere a simulation
//! port backs the same calls so the scheduler can run hosted.

cfg_if::cfg_if! {
    if #[cfg(target_os = "none")] {
        extern "Rust" {
            fn keel_port_current_cpu() -> usize;
            fn keel_port_irq_save() -> usize;
            fn keel_port_irq_restore(state: usize);
            fn keel_port_irq_enabled() -> bool;
            fn keel_port_in_interrupt() -> bool;
            fn keel_port_cpu_pause(cpu: usize) -> bool;
            fn keel_port_cpu_resume(cpu: usize) -> bool;
        }

        #[inline]
        pub fn current_cpu_id() -> usize {
            unsafe { keel_port_current_cpu() }
        }

        #[inline]
        pub fn irq_save() -> usize {
            unsafe { keel_port_irq_save() }
        }

        #[inline]
        pub fn irq_restore(state: usize) {
            unsafe { keel_port_irq_restore(state) }
        }

        #[inline]
        pub fn local_irq_enabled() -> bool {
            unsafe { keel_port_irq_enabled() }
        }

        #[inline]
        pub fn in_interrupt() -> bool {
            unsafe { keel_port_in_interrupt() }
        }

        /// Asks `cpu` to spin in a safe state until resumed. Returns
        /// false on failure; callers treat that as fatal.
        #[inline]
        pub fn cpu_pause(cpu: usize) -> bool {
            unsafe { keel_port_cpu_pause(cpu) }
        }

        #[inline]
        pub fn cpu_resume(cpu: usize) -> bool {
            unsafe { keel_port_cpu_resume(cpu) }
        }
    } else {
        mod hosted;
        pub use hosted::*;
    }
}
