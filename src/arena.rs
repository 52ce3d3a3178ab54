//! Fixed 16-slot doubly linked list over a static arena.
//!
//! Replaces dynamic allocation with an occupancy bitmap: allocate and
//! free are O(1), links are slot indices rather than pointers, and the
//! whole structure lives wherever it is declared (typically a `static`
//! or inside the top-level context). The scheduler uses this as its
//! ready queue.

use core::mem::MaybeUninit;

/// Number of slots in the arena. Fixed by design.
pub const SLOT_COUNT: usize = 16;

/// Handle to an occupied slot.
pub type NodeIndex = usize;

#[derive(Clone, Copy, Default)]
struct Links {
    next: Option<u8>,
    prev: Option<u8>,
}

/// Doubly linked list with O(1) allocate/free via a free-slot bitmap.
///
/// Element data is copied into the arena on insert and left untouched on
/// free (only the occupancy bit and links change).
///
/// Invariant: every occupied slot is reachable from `first` via the
/// next-chain and from `last` via the prev-chain; bitmap bit `i` is set
/// iff slot `i` is occupied.
pub struct FixedArenaList<T> {
    data: [MaybeUninit<T>; SLOT_COUNT],
    links: [Links; SLOT_COUNT],
    bitmap: u16,
    first: Option<u8>,
    last: Option<u8>,
}

impl<T: Copy> FixedArenaList<T> {
    pub const fn new() -> Self {
        Self {
            data: unsafe { MaybeUninit::uninit().assume_init() },
            links: [Links { next: None, prev: None }; SLOT_COUNT],
            bitmap: 0,
            first: None,
            last: None,
        }
    }

    /// Number of occupied slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.bitmap.count_ones() as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bitmap == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.bitmap == u16::MAX
    }

    #[inline]
    pub fn first(&self) -> Option<NodeIndex> {
        self.first.map(usize::from)
    }

    #[inline]
    pub fn last(&self) -> Option<NodeIndex> {
        self.last.map(usize::from)
    }

    #[inline]
    pub fn next(&self, node: NodeIndex) -> Option<NodeIndex> {
        self.links[node].next.map(usize::from)
    }

    #[inline]
    pub fn prev(&self, node: NodeIndex) -> Option<NodeIndex> {
        self.links[node].prev.map(usize::from)
    }

    #[inline]
    fn occupied(&self, node: NodeIndex) -> bool {
        node < SLOT_COUNT && self.bitmap & (1 << node) != 0
    }

    /// Element data for an occupied slot.
    pub fn get(&self, node: NodeIndex) -> Option<&T> {
        if !self.occupied(node) {
            return None;
        }
        // SAFETY: occupancy bit set, so the slot was written on insert.
        Some(unsafe { self.data[node].assume_init_ref() })
    }

    pub fn get_mut(&mut self, node: NodeIndex) -> Option<&mut T> {
        if !self.occupied(node) {
            return None;
        }
        // SAFETY: as in `get`.
        Some(unsafe { self.data[node].assume_init_mut() })
    }

    /// Claim the lowest free slot. Marks it occupied and resets its
    /// links, but does not splice it into the chain — callers normally
    /// want [`insert`](Self::insert) or [`push_back`](Self::push_back).
    ///
    /// Returns `None` when all 16 slots are used.
    pub fn allocate(&mut self) -> Option<NodeIndex> {
        let slot = lowest_free_slot(self.bitmap)?;
        self.bitmap |= 1 << slot;
        self.links[slot] = Links::default();
        Some(slot)
    }

    /// Release a slot: clears the occupancy bit and severs its links.
    /// Slot data is left untouched.
    pub fn free(&mut self, node: NodeIndex) {
        if node < SLOT_COUNT {
            self.bitmap &= !(1 << node);
            self.links[node] = Links::default();
        }
    }

    /// Copy `data` into a fresh slot and splice it adjacent to `anchor`
    /// (`before` selects the side). `anchor = None` appends at the tail.
    /// The first insert into an empty list sets first = last = node.
    ///
    /// Returns `None` when the arena is full or `anchor` names a free
    /// slot.
    pub fn insert(&mut self, anchor: Option<NodeIndex>, data: T, before: bool) -> Option<NodeIndex> {
        let anchor = match anchor {
            Some(a) if !self.occupied(a) => return None,
            other => other,
        };

        let node = self.allocate()?;
        self.data[node] = MaybeUninit::new(data);

        if self.first.is_none() {
            self.first = Some(node as u8);
            self.last = Some(node as u8);
            return Some(node);
        }

        // Appending: splice after the current last node.
        let (anchor, before) = match anchor {
            Some(a) => (a, before),
            None => (usize::from(self.last.unwrap_or(node as u8)), false),
        };

        if before {
            let prev = self.links[anchor].prev;
            self.links[node].next = Some(anchor as u8);
            self.links[node].prev = prev;
            match prev {
                Some(p) => self.links[usize::from(p)].next = Some(node as u8),
                None => self.first = Some(node as u8),
            }
            self.links[anchor].prev = Some(node as u8);
        } else {
            let next = self.links[anchor].next;
            self.links[node].prev = Some(anchor as u8);
            self.links[node].next = next;
            match next {
                Some(n) => self.links[usize::from(n)].prev = Some(node as u8),
                None => self.last = Some(node as u8),
            }
            self.links[anchor].next = Some(node as u8);
        }

        Some(node)
    }

    /// Append at the tail (FIFO order).
    #[inline]
    pub fn push_back(&mut self, data: T) -> Option<NodeIndex> {
        self.insert(None, data, false)
    }

    /// Unsplice a node, fix up first/last if affected, and free the slot.
    pub fn remove(&mut self, node: NodeIndex) {
        if !self.occupied(node) {
            return;
        }

        let Links { next, prev } = self.links[node];
        if self.first == Some(node as u8) {
            self.first = next;
        }
        if self.last == Some(node as u8) {
            self.last = prev;
        }
        if let Some(n) = next {
            self.links[usize::from(n)].prev = prev;
        }
        if let Some(p) = prev {
            self.links[usize::from(p)].next = next;
        }

        self.free(node);
    }

    /// Walk the next-chain from `first`, returning the first node whose
    /// data satisfies the predicate.
    pub fn find_first(&self, mut pred: impl FnMut(&T) -> bool) -> Option<NodeIndex> {
        let mut cursor = self.first();
        while let Some(node) = cursor {
            // SAFETY: chain nodes are occupied by the list invariant.
            if pred(unsafe { self.data[node].assume_init_ref() }) {
                return Some(node);
            }
            cursor = self.next(node);
        }
        None
    }

    /// Walk the prev-chain from `last`, returning the last node whose
    /// data satisfies the predicate.
    pub fn find_last(&self, mut pred: impl FnMut(&T) -> bool) -> Option<NodeIndex> {
        let mut cursor = self.last();
        while let Some(node) = cursor {
            // SAFETY: as in `find_first`.
            if pred(unsafe { self.data[node].assume_init_ref() }) {
                return Some(node);
            }
            cursor = self.prev(node);
        }
        None
    }
}

impl<T: Copy> Default for FixedArenaList<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Index of the rightmost zero bit (Gaudet's algorithm), or `None` when
/// all 16 bits are set.
fn lowest_free_slot(bitmap: u16) -> Option<usize> {
    let y = !bitmap & bitmap.wrapping_add(1); // isolate rightmost zero
    let bz: usize = if y != 0 { 0 } else { 1 };
    let b3: usize = if y & 0x00FF != 0 { 0 } else { 8 };
    let b2: usize = if y & 0x0F0F != 0 { 0 } else { 4 };
    let b1: usize = if y & 0x3333 != 0 { 0 } else { 2 };
    let b0: usize = if y & 0x5555 != 0 { 0 } else { 1 };
    let slot = bz + b3 + b2 + b1 + b0;
    if slot == SLOT_COUNT {
        None
    } else {
        Some(slot)
    }
}
