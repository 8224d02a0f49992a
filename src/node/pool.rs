//! Per-root arena: a sequence of fixed-size slabs threaded by a doubly
//! linked free list, guarded by a mutex (spec §4.2). Each root owns its
//! pool exclusively; destroying the root destroys the whole arena in one
//! shot without traversing the tree.

use super::{NodeId, Value};
use crate::SLAB_SIZE;
use crate::error::AllocationError;
use crate::op::Kind;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Process-wide live node counter, mirroring the original's
/// `NodePool::totalCount` (spec §5, "shared resources").
static TOTAL_LIVE: AtomicUsize = AtomicUsize::new(0);

pub fn total_live_count() -> usize {
    TOTAL_LIVE.load(Ordering::Relaxed)
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Free {
        next: Option<NodeId>,
        prev: Option<NodeId>,
    },
    Var {
        kind: Kind,
        value: Value,
        parent: Option<NodeId>,
    },
    Op {
        kind: Kind,
        children: [Option<NodeId>; 2],
        parent: Option<NodeId>,
    },
}

struct Inner {
    slabs: Vec<Box<[Slot; SLAB_SIZE]>>,
    free_head: Option<NodeId>,
    live_count: usize,
}

impl Inner {
    fn slot(&self, id: NodeId) -> &Slot {
        let (slab, offset) = Self::locate(id);
        &self.slabs[slab][offset]
    }
    fn slot_mut(&mut self, id: NodeId) -> &mut Slot {
        let (slab, offset) = Self::locate(id);
        &mut self.slabs[slab][offset]
    }
    fn locate(id: NodeId) -> (usize, usize) {
        let flat = id.0 as usize;
        (flat / SLAB_SIZE, flat % SLAB_SIZE)
    }

    /// Append a new slab, threading its slots onto the tail of the current
    /// free list (spec §4.2: "append a new slab linked to the tail").
    fn grow(&mut self) {
        let base = self.slabs.len() * SLAB_SIZE;
        let mut slab: Box<[Slot; SLAB_SIZE]> = Box::new(
            [Slot::Free {
                next: None,
                prev: None,
            }; SLAB_SIZE],
        );
        for i in 0..SLAB_SIZE {
            let id = NodeId((base + i) as u32);
            let next = if i + 1 < SLAB_SIZE {
                Some(NodeId((base + i + 1) as u32))
            } else {
                None
            };
            let prev = if i > 0 {
                Some(NodeId((base + i - 1) as u32))
            } else {
                None
            };
            slab[i] = Slot::Free { next, prev };
        }
        self.slabs.push(slab);
        let new_slab_head = NodeId(base as u32);
        match self.free_head {
            None => self.free_head = Some(new_slab_head),
            Some(head) => {
                // walk to the tail of the existing free list and splice on
                let mut tail = head;
                loop {
                    match self.slot(tail) {
                        Slot::Free { next: Some(n), .. } => tail = *n,
                        Slot::Free { next: None, .. } => break,
                        _ => unreachable!("free list contains an occupied slot"),
                    }
                }
                if let Slot::Free { next, .. } = self.slot_mut(tail) {
                    *next = Some(new_slab_head);
                }
                if let Slot::Free { prev, .. } = self.slot_mut(new_slab_head) {
                    *prev = Some(tail);
                }
            }
        }
    }

    /// Pop the free list head, or grow and retry once.
    fn pop_free(&mut self) -> Result<NodeId, AllocationError> {
        if self.free_head.is_none() {
            self.grow();
        }
        let head = self.free_head.ok_or(AllocationError)?;
        let next = match self.slot(head) {
            Slot::Free { next, .. } => *next,
            _ => unreachable!("free_head did not point to a free slot"),
        };
        if let Some(n) = next {
            if let Slot::Free { prev, .. } = self.slot_mut(n) {
                *prev = None;
            }
        }
        self.free_head = next;
        self.live_count += 1;
        TOTAL_LIVE.fetch_add(1, Ordering::Relaxed);
        Ok(head)
    }

    /// Push `id` onto the head of the free list (spec §4.2: "deallocations
    /// re-insert at the head"). Does not recurse into children.
    fn push_free(&mut self, id: NodeId) {
        let old_head = self.free_head;
        *self.slot_mut(id) = Slot::Free {
            next: old_head,
            prev: None,
        };
        if let Some(h) = old_head {
            if let Slot::Free { prev, .. } = self.slot_mut(h) {
                *prev = Some(id);
            }
        }
        self.free_head = Some(id);
        self.live_count -= 1;
        TOTAL_LIVE.fetch_sub(1, Ordering::Relaxed);
    }
}

pub struct Pool {
    inner: Mutex<Inner>,
}

impl Pool {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                slabs: Vec::new(),
                free_head: None,
                live_count: 0,
            }),
        }
    }

    pub fn live_count(&self) -> usize {
        self.inner.lock().unwrap().live_count
    }

    pub fn allocate_op(
        &self,
        kind: Kind,
        children: [Option<NodeId>; 2],
        parent: Option<NodeId>,
    ) -> Result<NodeId, AllocationError> {
        debug_assert!(kind.is_operator());
        let mut inner = self.inner.lock().unwrap();
        let id = inner.pop_free()?;
        *inner.slot_mut(id) = Slot::Op {
            kind,
            children,
            parent,
        };
        drop(inner);
        for c in children.into_iter().flatten() {
            self.set_parent(c, Some(id));
        }
        Ok(id)
    }

    pub fn allocate_var(
        &self,
        kind: Kind,
        value: Value,
        parent: Option<NodeId>,
    ) -> Result<NodeId, AllocationError> {
        debug_assert!(kind.is_leaf());
        let mut inner = self.inner.lock().unwrap();
        let id = inner.pop_free()?;
        *inner.slot_mut(id) = Slot::Var {
            kind,
            value,
            parent,
        };
        Ok(id)
    }

    /// Release `id`'s slot. Does not recurse into children; callers that
    /// want a recursive free must walk the tree themselves (see
    /// `Root::free_all`).
    pub fn deallocate(&self, id: NodeId) {
        let mut inner = self.inner.lock().unwrap();
        inner.push_free(id);
    }

    pub fn kind(&self, id: NodeId) -> Kind {
        match self.inner.lock().unwrap().slot(id) {
            Slot::Var { kind, .. } | Slot::Op { kind, .. } => *kind,
            Slot::Free { .. } => panic!("kind() called on a free slot"),
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        match self.inner.lock().unwrap().slot(id) {
            Slot::Var { parent, .. } | Slot::Op { parent, .. } => *parent,
            Slot::Free { .. } => panic!("parent() called on a free slot"),
        }
    }

    pub fn set_parent(&self, id: NodeId, parent: Option<NodeId>) {
        match self.inner.lock().unwrap().slot_mut(id) {
            Slot::Var { parent: p, .. } | Slot::Op { parent: p, .. } => *p = parent,
            Slot::Free { .. } => panic!("set_parent() called on a free slot"),
        }
    }

    pub fn child(&self, id: NodeId, idx: usize) -> Option<NodeId> {
        match self.inner.lock().unwrap().slot(id) {
            Slot::Op { children, .. } => children[idx],
            Slot::Var { .. } => None,
            Slot::Free { .. } => panic!("child() called on a free slot"),
        }
    }

    /// Set `id`'s child slot `idx` to `child`, updating the child's parent
    /// pointer to `id` (spec §4.3: mirrors `setchild`).
    pub fn set_child(&self, id: NodeId, idx: usize, child: Option<NodeId>) {
        {
            let mut inner = self.inner.lock().unwrap();
            match inner.slot_mut(id) {
                Slot::Op { children, .. } => children[idx] = child,
                _ => panic!("set_child() called on a non-operator slot"),
            }
        }
        if let Some(c) = child {
            self.set_parent(c, Some(id));
        }
    }

    pub fn value(&self, id: NodeId) -> Value {
        match self.inner.lock().unwrap().slot(id) {
            Slot::Var { value, .. } => *value,
            _ => panic!("value() called on a non-leaf slot"),
        }
    }

    pub fn set_value(&self, id: NodeId, value: Value) {
        match self.inner.lock().unwrap().slot_mut(id) {
            Slot::Var { value: v, .. } => *v = value,
            _ => panic!("set_value() called on a non-leaf slot"),
        }
    }

    /// Reshape `id` in place into a leaf of `kind`/`value`, preserving its
    /// parent pointer (`mutate_change`, spec §4.5). Caller has already
    /// freed any children the old shape held that the new shape sheds.
    pub fn set_kind_leaf(&self, id: NodeId, kind: Kind, value: Value) {
        debug_assert!(kind.is_leaf());
        let mut inner = self.inner.lock().unwrap();
        let parent = match inner.slot(id) {
            Slot::Var { parent, .. } | Slot::Op { parent, .. } => *parent,
            Slot::Free { .. } => panic!("set_kind_leaf() called on a free slot"),
        };
        *inner.slot_mut(id) = Slot::Var {
            kind,
            value,
            parent,
        };
    }

    /// Reshape `id` in place into an operator of `kind`/`children`,
    /// preserving its parent pointer and updating each child's parent
    /// pointer to `id`.
    pub fn set_kind_op(&self, id: NodeId, kind: Kind, children: [Option<NodeId>; 2]) {
        debug_assert!(kind.is_operator());
        {
            let mut inner = self.inner.lock().unwrap();
            let parent = match inner.slot(id) {
                Slot::Var { parent, .. } | Slot::Op { parent, .. } => *parent,
                Slot::Free { .. } => panic!("set_kind_op() called on a free slot"),
            };
            *inner.slot_mut(id) = Slot::Op {
                kind,
                children,
                parent,
            };
        }
        for c in children.into_iter().flatten() {
            self.set_parent(c, Some(id));
        }
    }
}

impl Default for Pool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_and_deallocate_round_trip_live_count() {
        let pool = Pool::new();
        let a = pool.allocate_var(Kind::Constant, Value::of(1.0), None).unwrap();
        let b = pool.allocate_var(Kind::Constant, Value::of(2.0), None).unwrap();
        assert_eq!(pool.live_count(), 2);
        pool.deallocate(a);
        pool.deallocate(b);
        assert_eq!(pool.live_count(), 0);
    }

    #[test]
    fn grows_past_one_slab() {
        let pool = Pool::new();
        let mut ids = Vec::new();
        for i in 0..(SLAB_SIZE * 3) {
            ids.push(
                pool.allocate_var(Kind::Constant, Value::of(i as f64), None)
                    .unwrap(),
            );
        }
        assert_eq!(pool.live_count(), SLAB_SIZE * 3);
        for id in ids {
            pool.deallocate(id);
        }
        assert_eq!(pool.live_count(), 0);
    }

    #[test]
    fn set_child_updates_parent_pointer() {
        let pool = Pool::new();
        let leaf = pool.allocate_var(Kind::Variable, Value::of(0.0), None).unwrap();
        let op = pool
            .allocate_op(Kind::Sin, [None, None], None)
            .unwrap();
        pool.set_child(op, 0, Some(leaf));
        assert_eq!(pool.parent(leaf), Some(op));
        assert_eq!(pool.child(op, 0), Some(leaf));
    }
}
