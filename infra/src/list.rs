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

// Typed intrusive doubly linked list node. We deliberately avoid Pin
// here; nodes are always reached through a smart pointer or a static,
// so the address of a linked node is stable by convention. The node
// itself is **NOT** concurrency safe; callers serialize access.

use crate::intrusive::Adapter;
use core::{marker::PhantomData, ptr::NonNull};

#[derive(Debug)]
pub struct ListHead<T, A: Adapter> {
    pub(crate) prev: Option<NonNull<ListHead<T, A>>>,
    pub(crate) next: Option<NonNull<ListHead<T, A>>>,
    _t: PhantomData<T>,
    _a: PhantomData<A>,
}

// Not derived: that would put a `T: Default` bound on the impl.
impl<T, A: Adapter> Default for ListHead<T, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, A: Adapter> ListHead<T, A> {
    pub const fn new() -> Self {
        Self {
            prev: None,
            next: None,
            _t: PhantomData,
            _a: PhantomData,
        }
    }

    /// The structure this node is embedded in.
    pub fn owner(&self) -> &T {
        let ptr = self as *const _ as *const u8;
        let base = unsafe { ptr.sub(A::offset()) as *const T };
        unsafe { &*base }
    }

    #[inline]
    pub fn is_detached(&self) -> bool {
        self.prev.is_none() && self.next.is_none()
    }

    /// Links `me` right after `at`. Fails if `me` is already linked
    /// somewhere.
    pub fn insert_after(at: &mut ListHead<T, A>, mut me: NonNull<ListHead<T, A>>) -> bool {
        unsafe {
            if !me.as_ref().is_detached() {
                return false;
            }
            let next = at.next.replace(me);
            me.as_mut().next = next;
            me.as_mut().prev = Some(NonNull::from_mut(at));
            if let Some(mut n) = next {
                n.as_mut().prev = Some(me);
            }
            true
        }
    }

    /// Links `me` right before `at`.
    pub fn insert_before(at: &mut ListHead<T, A>, mut me: NonNull<ListHead<T, A>>) -> bool {
        unsafe {
            if !me.as_ref().is_detached() {
                return false;
            }
            let prev = at.prev.replace(me);
            me.as_mut().prev = prev;
            me.as_mut().next = Some(NonNull::from_mut(at));
            if let Some(mut p) = prev {
                p.as_mut().next = Some(me);
            }
            true
        }
    }

    /// Unlinks `me` from whatever list it is in. Returns false if it
    /// was not linked.
    pub fn detach(mut me: NonNull<ListHead<T, A>>) -> bool {
        unsafe {
            let node = me.as_mut();
            if node.is_detached() {
                return false;
            }
            if let Some(mut prev) = node.prev {
                prev.as_mut().next = node.next;
            }
            if let Some(mut next) = node.next {
                next.as_mut().prev = node.prev;
            }
            node.prev = None;
            node.next = None;
            true
        }
    }
}

pub struct ListIterator<T, A: Adapter> {
    next: Option<NonNull<ListHead<T, A>>>,
    tail: Option<NonNull<ListHead<T, A>>>,
}

impl<T, A: Adapter> ListIterator<T, A> {
    /// Walks from the node after `head` up to (excluding) `tail`, or
    /// until the chain ends when `tail` is None.
    pub fn new(head: &ListHead<T, A>, tail: Option<NonNull<ListHead<T, A>>>) -> Self {
        Self {
            next: head.next,
            tail,
        }
    }
}

impl<T, A: Adapter> Iterator for ListIterator<T, A> {
    type Item = NonNull<ListHead<T, A>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next == self.tail {
            return None;
        }
        let current = self.next?;
        self.next = unsafe { current.as_ref().next };
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::mem::offset_of;

    #[derive(Default, Debug)]
    struct OffsetOfNode;

    impl Adapter for OffsetOfNode {
        fn offset() -> usize {
            offset_of!(Item, node)
        }
    }

    #[derive(Default, Debug)]
    struct Item {
        tag: usize,
        node: ListHead<Item, OffsetOfNode>,
    }

    type Node = ListHead<Item, OffsetOfNode>;

    #[test]
    fn owner_round_trip() {
        let it = Item {
            tag: 7,
            ..Default::default()
        };
        assert_eq!(it.node.owner().tag, 7);
        assert!(core::ptr::eq(it.node.owner(), &it));
    }

    #[test]
    fn insert_and_detach() {
        let mut a = Item::default();
        let b = Item::default();
        assert!(a.node.is_detached());
        assert!(Node::insert_after(&mut a.node, NonNull::from_ref(&b.node)));
        assert!(!a.node.is_detached());
        assert!(!b.node.is_detached());
        // Second insertion of a linked node is rejected.
        assert!(!Node::insert_after(&mut a.node, NonNull::from_ref(&b.node)));
        assert!(Node::detach(NonNull::from_ref(&b.node)));
        assert!(a.node.is_detached());
        assert!(b.node.is_detached());
        assert!(!Node::detach(NonNull::from_ref(&b.node)));
    }

    #[test]
    fn iterate_between_sentinels() {
        let mut head = Node::new();
        let mut tail = Node::new();
        Node::insert_after(&mut head, NonNull::from_mut(&mut tail));
        let items: [Item; 3] = [
            Item {
                tag: 0,
                ..Default::default()
            },
            Item {
                tag: 1,
                ..Default::default()
            },
            Item {
                tag: 2,
                ..Default::default()
            },
        ];
        for it in items.iter() {
            Node::insert_before(&mut tail, NonNull::from_ref(&it.node));
        }
        let tags: Vec<usize> = ListIterator::new(&head, Some(NonNull::from_ref(&tail)))
            .map(|n| unsafe { n.as_ref() }.owner().tag)
            .collect();
        assert_eq!(tags, vec![0, 1, 2]);
        for it in items.iter() {
            Node::detach(NonNull::from_ref(&it.node));
        }
    }
}
