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

extern crate alloc;
use crate::{
    intrusive::Adapter,
    list::{ListHead, ListIterator},
};
use alloc::boxed::Box;
use core::{
    ops::Deref,
    ptr::NonNull,
    sync::atomic::{fence, AtomicUsize, Ordering},
};

/// Control block of a [`Kref`]. May also live in a static for objects
/// that are never deallocated.
#[derive(Debug)]
pub struct KrefInner<T: Sized> {
    data: T,
    rc: AtomicUsize,
}

impl<T: Sized> KrefInner<T> {
    pub const fn new(data: T) -> Self {
        Self {
            data,
            rc: AtomicUsize::new(1),
        }
    }
}

unsafe impl<T> Send for KrefInner<T> {}
unsafe impl<T> Sync for KrefInner<T> {}

/// A minimal atomically refcounted handle. Unlike `alloc::sync::Arc`
/// there is no weak count, and an intrusive list may share ownership
/// of the pointee (see [`KrefList`]).
//
// repr(transparent) keeps Option<Kref<T>> pointer sized.
#[derive(Debug)]
#[repr(transparent)]
pub struct Kref<T: Sized> {
    inner: NonNull<KrefInner<T>>,
}

impl<T> Kref<T> {
    pub fn new(data: T) -> Self {
        let boxed = Box::new(KrefInner::new(data));
        Self {
            inner: unsafe { NonNull::new_unchecked(Box::into_raw(boxed)) },
        }
    }

    /// # Safety
    ///
    /// `inner` must point to a live control block.
    pub unsafe fn from_inner(inner: NonNull<KrefInner<T>>) -> Self {
        inner.as_ref().rc.fetch_add(1, Ordering::Relaxed);
        Self { inner }
    }

    /// Stable identity of the pointee, usable as an id.
    pub fn get_handle(this: &Self) -> *const u8 {
        this.inner.as_ptr() as *const u8
    }

    pub fn strong_count(this: &Self) -> usize {
        unsafe { this.inner.as_ref() }.rc.load(Ordering::Relaxed)
    }

    /// # Safety
    ///
    /// Every manual increment must be paired with a decrement.
    pub unsafe fn increment_strong_count(this: &Self) {
        let old = this.inner.as_ref().rc.fetch_add(1, Ordering::Relaxed);
        assert_ne!(old, 0);
    }

    /// # Safety
    ///
    /// Must only drop a count added by `increment_strong_count`; the
    /// count must not reach zero here.
    pub unsafe fn decrement_strong_count(this: &Self) {
        let old = this.inner.as_ref().rc.fetch_sub(1, Ordering::Relaxed);
        assert!(old > 1);
    }

    /// Pointee identity comparison.
    pub fn is(&self, other: &Self) -> bool {
        Self::get_handle(self) == Self::get_handle(other)
    }
}

impl<T: Sized> Clone for Kref<T> {
    fn clone(&self) -> Self {
        let old = unsafe { self.inner.as_ref() }
            .rc
            .fetch_add(1, Ordering::Relaxed);
        assert!(old >= 1);
        Self { inner: self.inner }
    }
}

impl<T: Sized> Drop for Kref<T> {
    fn drop(&mut self) {
        let old = unsafe { self.inner.as_ref() }
            .rc
            .fetch_sub(1, Ordering::Acquire);
        if old != 1 {
            return;
        }
        fence(Ordering::SeqCst);
        // Statically allocated control blocks never reach zero.
        drop(unsafe { Box::from_raw(self.inner.as_ptr()) });
    }
}

impl<T: Sized> Deref for Kref<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        unsafe { &self.inner.as_ref().data }
    }
}

// The handle is a pointer to the value, not the value itself.
unsafe impl<T: Sized> Send for Kref<T> {}
unsafe impl<T: Sized> Sync for Kref<T> {}

/// Sentinel-pair intrusive list whose members are [`Kref`]s; linking a
/// node adds a strong count on behalf of the list, unlinking drops it.
/// Not concurrency safe on its own; callers hold a lock.
#[derive(Debug)]
pub struct KrefList<T: Sized, A: Adapter> {
    head: ListHead<T, A>,
    tail: ListHead<T, A>,
}

impl<T: Sized, A: Adapter> KrefList<T, A> {
    pub const fn new() -> Self {
        Self {
            head: ListHead::new(),
            tail: ListHead::new(),
        }
    }

    /// Links the sentinels. Must run once before any other operation,
    /// after the list has reached its final address.
    pub fn init(&mut self) -> bool {
        ListHead::insert_after(&mut self.head, NonNull::from_mut(&mut self.tail))
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        debug_assert!(self.head.next.is_some(), "list not initialized");
        self.head.next == Some(NonNull::from_ref(&self.tail))
    }

    /// The embedded node of `this`.
    pub fn node_of(this: &Kref<T>) -> NonNull<ListHead<T, A>> {
        let base = this.deref() as *const T as *const u8;
        let node = unsafe { base.add(A::offset()) as *const ListHead<T, A> };
        NonNull::from_ref(unsafe { &*node })
    }

    /// # Safety
    ///
    /// The caller must be the unique mutator of the list linkage.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn node_of_mut(this: &Kref<T>) -> &mut ListHead<T, A> {
        let base = this.deref() as *const T as *const u8;
        let node = base.add(A::offset()) as *mut ListHead<T, A>;
        &mut *node
    }

    /// Rebuilds a handle from an embedded node, adding a strong count.
    ///
    /// # Safety
    ///
    /// `node` must be embedded in a `T` managed by a live `KrefInner`.
    pub unsafe fn make_ref_from(node: &ListHead<T, A>) -> Kref<T> {
        let offset = A::offset() + core::mem::offset_of!(KrefInner<T>, data);
        let ptr = node as *const _ as *const u8;
        let inner = &*(ptr.sub(offset) as *const KrefInner<T>);
        Kref::from_inner(NonNull::from_ref(inner))
    }

    pub fn insert_after(at: &mut ListHead<T, A>, me: Kref<T>) -> bool {
        if !ListHead::insert_after(at, Self::node_of(&me)) {
            return false;
        }
        // The list now shares ownership of `me`.
        unsafe { Kref::increment_strong_count(&me) };
        true
    }

    pub fn insert_before(at: &mut ListHead<T, A>, me: Kref<T>) -> bool {
        if !ListHead::insert_before(at, Self::node_of(&me)) {
            return false;
        }
        unsafe { Kref::increment_strong_count(&me) };
        true
    }

    pub fn push_back(&mut self, me: Kref<T>) -> bool {
        Self::insert_before(&mut self.tail, me)
    }

    /// Drops the list's share of `me`. Returns false if `me` was not
    /// linked.
    pub fn detach(me: &Kref<T>) -> bool {
        if !ListHead::detach(Self::node_of(me)) {
            return false;
        }
        unsafe { Kref::decrement_strong_count(me) };
        true
    }

    pub fn pop_front(&mut self) -> Option<Kref<T>> {
        if self.is_empty() {
            return None;
        }
        let first = self.head.next.expect("list not initialized");
        let me = unsafe { Self::make_ref_from(first.as_ref()) };
        let ok = ListHead::detach(first);
        debug_assert!(ok);
        unsafe { Kref::decrement_strong_count(&me) };
        Some(me)
    }

    /// Peeks the first member without unlinking it.
    pub fn front(&self) -> Option<Kref<T>> {
        if self.is_empty() {
            return None;
        }
        let first = self.head.next.expect("list not initialized");
        Some(unsafe { Self::make_ref_from(first.as_ref()) })
    }

    /// The member following `me`, if `me` is not the last one.
    pub fn next_of(&self, me: &Kref<T>) -> Option<Kref<T>> {
        let node = Self::node_of(me);
        let next = unsafe { node.as_ref().next }.expect("node not linked");
        if next == NonNull::from_ref(&self.tail) {
            return None;
        }
        Some(unsafe { Self::make_ref_from(next.as_ref()) })
    }

    pub fn iter(&self) -> KrefListIter<T, A> {
        KrefListIter {
            it: ListIterator::new(&self.head, Some(NonNull::from_ref(&self.tail))),
        }
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Unlinks every member, dropping the list's shares.
    pub fn clear(&mut self) -> usize {
        let mut n = 0;
        while self.pop_front().is_some() {
            n += 1;
        }
        n
    }
}

impl<T: Sized, A: Adapter> Default for KrefList<T, A> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct KrefListIter<T, A: Adapter> {
    it: ListIterator<T, A>,
}

impl<T, A: Adapter> KrefListIter<T, A> {
    /// Iterates an open list anchored at a bare head node.
    pub fn from_head(head: &ListHead<T, A>) -> Self {
        Self {
            it: ListIterator::new(head, None),
        }
    }
}

impl<T, A: Adapter> Iterator for KrefListIter<T, A> {
    type Item = Kref<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.it.next()?;
        Some(unsafe { KrefList::<T, A>::make_ref_from(node.as_ref()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impl_intrusive_adapter;

    impl_intrusive_adapter!(OffsetOfRun, Job, run_node);
    impl_intrusive_adapter!(OffsetOfAll, Job, all_node);

    #[derive(Default, Debug)]
    struct Job {
        run_node: ListHead<Job, OffsetOfRun>,
        all_node: ListHead<Job, OffsetOfAll>,
        id: usize,
    }

    impl Job {
        fn new(id: usize) -> Self {
            Job {
                id,
                ..Default::default()
            }
        }
    }

    type RunList = KrefList<Job, OffsetOfRun>;
    type AllList = KrefList<Job, OffsetOfAll>;

    #[test]
    fn node_addresses() {
        let j = Kref::new(Job::default());
        assert_eq!(
            &j.run_node as *const _,
            RunList::node_of(&j).as_ptr() as *const _
        );
        assert_eq!(
            &j.all_node as *const _,
            AllList::node_of(&j).as_ptr() as *const _
        );
    }

    #[test]
    fn list_shares_ownership() {
        let mut l = RunList::new();
        l.init();
        let j = Kref::new(Job::new(1));
        assert_eq!(Kref::strong_count(&j), 1);
        assert!(l.push_back(j.clone()));
        assert_eq!(Kref::strong_count(&j), 2);
        // Double insertion is refused and adds no count.
        assert!(!l.push_back(j.clone()));
        assert_eq!(Kref::strong_count(&j), 2);
        assert!(RunList::detach(&j));
        assert_eq!(Kref::strong_count(&j), 1);
        assert!(l.is_empty());
    }

    #[test]
    fn push_pop_fifo() {
        let mut l = RunList::new();
        l.init();
        for i in 0..8 {
            assert!(l.push_back(Kref::new(Job::new(i))));
        }
        assert_eq!(l.len(), 8);
        for i in 0..8 {
            let j = l.pop_front().expect("list should not be empty yet");
            assert_eq!(j.id, i);
            assert_eq!(Kref::strong_count(&j), 1);
        }
        assert!(l.pop_front().is_none());
    }

    #[test]
    fn front_and_next_of_peek() {
        let mut l = RunList::new();
        l.init();
        assert!(l.front().is_none());
        let a = Kref::new(Job::new(10));
        let b = Kref::new(Job::new(11));
        l.push_back(a.clone());
        l.push_back(b.clone());
        let f = l.front().expect("front");
        assert!(f.is(&a));
        assert_eq!(Kref::strong_count(&a), 3); // a, list, f
        let n = l.next_of(&f).expect("next");
        assert!(n.is(&b));
        assert!(l.next_of(&n).is_none());
        l.clear();
        assert_eq!(Kref::strong_count(&a), 2);
    }

    #[test]
    fn member_of_two_lists() {
        let mut run = RunList::new();
        let mut all = AllList::new();
        run.init();
        all.init();
        let j = Kref::new(Job::new(3));
        run.push_back(j.clone());
        all.push_back(j.clone());
        assert_eq!(Kref::strong_count(&j), 3);
        assert!(RunList::detach(&j));
        assert!(!all.is_empty());
        assert!(AllList::detach(&j));
        assert_eq!(Kref::strong_count(&j), 1);
    }

    #[test]
    fn clear_detaches_everything() {
        let mut l = RunList::new();
        l.init();
        let handles: Vec<Kref<Job>> = (0..4).map(|i| Kref::new(Job::new(i))).collect();
        for h in handles.iter() {
            l.push_back(h.clone());
        }
        assert_eq!(l.clear(), 4);
        assert!(l.is_empty());
        for h in handles.iter() {
            assert_eq!(Kref::strong_count(h), 1);
            assert!(h.run_node.is_detached());
        }
    }
}
