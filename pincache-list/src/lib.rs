//  Copyright 2025 Pincache Authors
//
//  Licensed under the Apache License, Version 2.0 (the "License");
//  you may not use this file except in compliance with the License.
//  You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.

//! A generic intrusive-style doubly linked list.
//!
//! Nodes live in an arena (`Vec<Slot<T>>`) owned by the list itself and are
//! addressed by a stable [`NodeId`] rather than a raw pointer, so the list is
//! plain safe Rust and is movable. Both the cache's LRU ordering and each
//! hash bucket's chain are built on this same type.

/// A stable handle to a node living in a [`List`]'s arena.
///
/// `NodeId`s are only meaningful relative to the `List` that produced them;
/// using one against a different list (or after its node has been removed)
/// is a logic error and will panic in debug builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// The raw arena index this id wraps. Exposed so embedders can stash a
    /// `NodeId` inside another structure (e.g. as a pool slot's owner tag)
    /// and reconstruct it later with [`NodeId::from_index`].
    pub fn index(self) -> u32 {
        self.0
    }

    /// Reconstructs a `NodeId` from a raw arena index previously obtained
    /// from [`NodeId::index`]. Passing an index that was never produced by
    /// the corresponding `List` is a logic error.
    pub fn from_index(index: u32) -> Self {
        Self(index)
    }
}

/// The outcome a traversal visitor returns for the node it was just given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Stop traversing; this node is the result.
    Stop,
    /// Keep traversing.
    Continue,
    /// Stop traversing; there is no result.
    Abort,
}

struct Slot<T> {
    prev: Option<NodeId>,
    next: Option<NodeId>,
    // `None` marks an arena slot that is currently on the free list.
    value: Option<T>,
}

/// A doubly linked list of `T`, with O(1) push/pop at either end, O(1)
/// removal given a [`NodeId`], and forward/reverse visitor traversal.
pub struct List<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    head: Option<NodeId>,
    tail: Option<NodeId>,
    len: usize,
}

impl<T> Default for List<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> List<T> {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    /// Returns `true` if the list holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of nodes currently in the list.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns the id of the front (most recently pushed-front) node.
    pub fn front(&self) -> Option<NodeId> {
        self.head
    }

    /// Returns the id of the back (most recently pushed-back) node.
    pub fn back(&self) -> Option<NodeId> {
        self.tail
    }

    /// Borrows the value stored at `id`.
    ///
    /// Panics if `id` does not refer to a live node in this list.
    pub fn get(&self, id: NodeId) -> &T {
        self.slots[id.0 as usize]
            .value
            .as_ref()
            .expect("NodeId does not refer to a live node")
    }

    /// Mutably borrows the value stored at `id`.
    ///
    /// Panics if `id` does not refer to a live node in this list.
    pub fn get_mut(&mut self, id: NodeId) -> &mut T {
        self.slots[id.0 as usize]
            .value
            .as_mut()
            .expect("NodeId does not refer to a live node")
    }

    fn alloc(&mut self, value: T) -> NodeId {
        if let Some(idx) = self.free.pop() {
            let slot = &mut self.slots[idx as usize];
            slot.value = Some(value);
            slot.prev = None;
            slot.next = None;
            NodeId(idx)
        } else {
            let idx = self.slots.len() as u32;
            self.slots.push(Slot {
                prev: None,
                next: None,
                value: Some(value),
            });
            NodeId(idx)
        }
    }

    fn link_front(&mut self, id: NodeId) {
        match self.head {
            Some(head) => {
                self.slots[id.0 as usize].next = Some(head);
                self.slots[head.0 as usize].prev = Some(id);
                self.head = Some(id);
            }
            None => {
                self.head = Some(id);
                self.tail = Some(id);
            }
        }
        self.len += 1;
    }

    fn link_back(&mut self, id: NodeId) {
        match self.tail {
            Some(tail) => {
                self.slots[id.0 as usize].prev = Some(tail);
                self.slots[tail.0 as usize].next = Some(id);
                self.tail = Some(id);
            }
            None => {
                self.head = Some(id);
                self.tail = Some(id);
            }
        }
        self.len += 1;
    }

    /// Inserts `value` at the front of the list.
    pub fn push_front(&mut self, value: T) -> NodeId {
        let id = self.alloc(value);
        self.link_front(id);
        id
    }

    /// Inserts `value` at the back of the list.
    pub fn push_back(&mut self, value: T) -> NodeId {
        let id = self.alloc(value);
        self.link_back(id);
        id
    }

    fn unlink(&mut self, id: NodeId) {
        let (prev, next) = {
            let slot = &self.slots[id.0 as usize];
            (slot.prev, slot.next)
        };
        match prev {
            Some(p) => self.slots[p.0 as usize].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slots[n.0 as usize].prev = prev,
            None => self.tail = prev,
        }
        self.slots[id.0 as usize].prev = None;
        self.slots[id.0 as usize].next = None;
        self.len -= 1;
    }

    fn dealloc(&mut self, id: NodeId) -> T {
        let value = self.slots[id.0 as usize]
            .value
            .take()
            .expect("double removal of the same NodeId");
        self.free.push(id.0);
        value
    }

    /// Removes `id` from the list. Assumes `id` is currently a member of
    /// this list and does not search for it first.
    ///
    /// Panics if `id` has already been removed.
    pub fn remove(&mut self, id: NodeId) -> T {
        self.unlink(id);
        self.dealloc(id)
    }

    /// Removes and returns the front node, if any.
    pub fn pop_front(&mut self) -> Option<(NodeId, T)> {
        let id = self.head?;
        self.unlink(id);
        Some((id, self.dealloc(id)))
    }

    /// Removes and returns the back node, if any.
    pub fn pop_back(&mut self) -> Option<(NodeId, T)> {
        let id = self.tail?;
        self.unlink(id);
        Some((id, self.dealloc(id)))
    }

    /// Walks the list front-to-back, calling `visitor` on each node until it
    /// returns [`Signal::Stop`] or [`Signal::Abort`], or the list is
    /// exhausted. Returns the id of the node the visitor stopped at, if any.
    pub fn foreach<F>(&self, mut visitor: F) -> Option<NodeId>
    where
        F: FnMut(NodeId, &T) -> Signal,
    {
        let mut cur = self.head;
        while let Some(id) = cur {
            match visitor(id, self.get(id)) {
                Signal::Stop => return Some(id),
                Signal::Abort => return None,
                Signal::Continue => cur = self.slots[id.0 as usize].next,
            }
        }
        None
    }

    /// Like [`List::foreach`], but walks back-to-front.
    pub fn foreach_reverse<F>(&self, mut visitor: F) -> Option<NodeId>
    where
        F: FnMut(NodeId, &T) -> Signal,
    {
        let mut cur = self.tail;
        while let Some(id) = cur {
            match visitor(id, self.get(id)) {
                Signal::Stop => return Some(id),
                Signal::Abort => return None,
                Signal::Continue => cur = self.slots[id.0 as usize].prev,
            }
        }
        None
    }

    /// Removes every node, calling `finalizer` on each in front-to-back
    /// order, and leaves the list empty.
    pub fn clear<F>(&mut self, mut finalizer: F)
    where
        F: FnMut(NodeId, T),
    {
        while let Some((id, value)) = self.pop_front() {
            finalizer(id, value);
        }
        self.slots.clear();
        self.free.clear();
    }
}
