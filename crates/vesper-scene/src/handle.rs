use std::fmt;

use serde::{Deserialize, Serialize};

/// A generational node handle. Uses compact u32 index + generation so copies
/// stay cheap and stale handles can never alias a later node in the same slot.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl NodeId {
    /// Create a handle from raw parts (mainly for testing).
    pub fn from_raw(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// The slot index of this node.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The generation of this node (incremented when the slot is retired).
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Allocates node slots with generational tracking and a two-phase free
/// protocol: `retire` invalidates every outstanding handle immediately, while
/// the slot only becomes reusable after a later `reclaim`.
pub(crate) struct SlotAllocator {
    pub(crate) generations: Vec<u32>,
    pub(crate) alive: Vec<bool>,
    free_list: Vec<u32>,
    live: usize,
}

impl SlotAllocator {
    pub fn new() -> Self {
        Self {
            generations: Vec::new(),
            alive: Vec::new(),
            free_list: Vec::new(),
            live: 0,
        }
    }

    /// Allocate a new node handle, reusing a reclaimed slot if available.
    pub fn allocate(&mut self) -> NodeId {
        self.live += 1;
        if let Some(index) = self.free_list.pop() {
            self.alive[index as usize] = true;
            NodeId {
                index,
                generation: self.generations[index as usize],
            }
        } else {
            let index = self.generations.len() as u32;
            self.generations.push(0);
            self.alive.push(true);
            NodeId {
                index,
                generation: 0,
            }
        }
    }

    /// Invalidate a handle. Bumps the slot generation so every copy of the
    /// handle reads as dead from this point on; the slot itself stays out of
    /// circulation until `reclaim`. Returns `true` if the handle was alive.
    pub fn retire(&mut self, id: NodeId) -> bool {
        let idx = id.index as usize;
        if idx >= self.alive.len() {
            return false;
        }
        if !self.alive[idx] || self.generations[idx] != id.generation {
            return false;
        }
        self.alive[idx] = false;
        self.generations[idx] += 1;
        self.live -= 1;
        true
    }

    /// Return a retired slot to the free list for reuse.
    pub fn reclaim(&mut self, index: u32) {
        let idx = index as usize;
        debug_assert!(idx < self.alive.len() && !self.alive[idx]);
        debug_assert!(!self.free_list.contains(&index));
        self.free_list.push(index);
    }

    /// Check if a handle refers to a live node.
    pub fn is_alive(&self, id: NodeId) -> bool {
        let idx = id.index as usize;
        idx < self.alive.len() && self.alive[idx] && self.generations[idx] == id.generation
    }

    /// Check if a handle was ever minted by this allocator, live or dead.
    /// A handle whose generation has not been handed out yet is unknown.
    pub fn minted(&self, id: NodeId) -> bool {
        let idx = id.index as usize;
        if idx >= self.generations.len() {
            return false;
        }
        id.generation < self.generations[idx]
            || (id.generation == self.generations[idx] && self.alive[idx])
    }

    /// Number of currently live nodes.
    pub fn live(&self) -> usize {
        self.live
    }

    /// Total number of slots ever allocated.
    pub fn slot_count(&self) -> usize {
        self.generations.len()
    }
}

impl Default for SlotAllocator {
    fn default() -> Self {
        Self::new()
    }
}
