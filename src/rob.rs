//! Reorder buffer
//!
//! A circular FIFO of `ROB_SIZE` entries in program order. Entries are
//! created at dispatch (tail) and destroyed only at commit (head). An
//! explicit count disambiguates full from empty when `head == tail`.

use crate::cpu::ROB_SIZE;
use crate::instruction::Opcode;
use crate::rename::regfile::PhysReg;

/// Index of a reorder buffer slot
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RobIndex(usize);

impl RobIndex {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Exception code carried to commit
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Exception {
    #[default]
    None,
}

/// A single entry in the reorder buffer
#[derive(Clone, Copy, Debug)]
pub struct RobEntry {
    pub pc: i32,
    pub opcode: Opcode,
    pub srcs: [Option<PhysReg>; 3],
    pub rd: Option<usize>,
    pub dest: Option<PhysReg>,
    /// Register result, link value, branch target or store value
    pub result: i32,
    pub result_valid: bool,
    /// Load/store operands were available when it entered the memory unit
    pub mem_ready: bool,
    /// Data memory word a load or store touches
    pub address: Option<usize>,
    /// Resolved direction of a branch or jump
    pub taken: bool,
    pub exception: Exception,
    /// Dispatch order
    pub seq: u64,
}

impl RobEntry {
    pub fn new(pc: i32, opcode: Opcode, seq: u64) -> Self {
        Self {
            pc,
            opcode,
            srcs: [None; 3],
            rd: None,
            dest: None,
            result: 0,
            result_valid: false,
            mem_ready: false,
            address: None,
            taken: false,
            exception: Exception::None,
            seq,
        }
    }
}

/// Reorder buffer
#[derive(Clone, Debug)]
pub struct ReorderBuffer {
    entries: [Option<RobEntry>; ROB_SIZE],
    /// Oldest entry (commit point)
    head: usize,
    /// Next allocation
    tail: usize,
    count: usize,
}

impl Default for ReorderBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ReorderBuffer {
    pub fn new() -> Self {
        Self { entries: [None; ROB_SIZE], head: 0, tail: 0, count: 0 }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == ROB_SIZE
    }

    pub fn head(&self) -> usize {
        self.head
    }

    pub fn tail(&self) -> usize {
        self.tail
    }

    /// Appends an entry at the tail. Callers check `is_full` first.
    pub fn allocate(&mut self, entry: RobEntry) -> RobIndex {
        assert!(!self.is_full(), "reorder buffer overflow");
        let index = self.tail;
        self.entries[index] = Some(entry);
        self.tail = (self.tail + 1) % ROB_SIZE;
        self.count += 1;
        RobIndex(index)
    }

    /// Oldest entry
    pub fn peek_head(&self) -> Option<(RobIndex, &RobEntry)> {
        if self.is_empty() {
            return None;
        }
        self.entries[self.head].as_ref().map(|e| (RobIndex(self.head), e))
    }

    /// Removes the oldest entry
    pub fn pop_head(&mut self) -> Option<RobEntry> {
        if self.is_empty() {
            return None;
        }
        let entry = self.entries[self.head].take();
        self.head = (self.head + 1) % ROB_SIZE;
        self.count -= 1;
        entry
    }

    pub fn get_mut(&mut self, index: RobIndex) -> Option<&mut RobEntry> {
        self.entries[index.0].as_mut()
    }

    /// Distance from the head, i.e. how many older entries there are
    pub fn age(&self, index: RobIndex) -> usize {
        (index.0 + ROB_SIZE - self.head) % ROB_SIZE
    }

    /// Discards every entry and rewinds both cursors to slot 0.
    /// Returns the discarded entries, oldest first.
    pub fn reset(&mut self) -> Vec<RobEntry> {
        let discarded: Vec<RobEntry> = self.iter().map(|(_, e)| *e).collect();
        self.entries = [None; ROB_SIZE];
        self.head = 0;
        self.tail = 0;
        self.count = 0;
        discarded
    }

    /// Entries from head to tail
    pub fn iter(&self) -> impl Iterator<Item = (RobIndex, &RobEntry)> {
        (0..self.count).filter_map(move |offset| {
            let index = (self.head + offset) % ROB_SIZE;
            self.entries[index].as_ref().map(|e| (RobIndex(index), e))
        })
    }

    /// Entries older than `index`, oldest first
    pub fn older_than(
        &self,
        index: RobIndex,
    ) -> impl Iterator<Item = (RobIndex, &RobEntry)> {
        let age = self.age(index);
        self.iter().take(age)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn rob_index(index: usize) -> RobIndex {
        RobIndex(index % ROB_SIZE)
    }

    fn entry(seq: u64) -> RobEntry {
        RobEntry::new(4000 + 4 * seq as i32, Opcode::Add, seq)
    }

    #[test]
    fn test_fifo_order() {
        let mut rob = ReorderBuffer::new();
        assert!(rob.is_empty());
        let a = rob.allocate(entry(0));
        let b = rob.allocate(entry(1));
        assert_eq!(rob.len(), 2);
        assert_eq!(rob.age(a), 0);
        assert_eq!(rob.age(b), 1);
        assert_eq!(rob.peek_head().map(|(i, _)| i), Some(a));
        assert_eq!(rob.pop_head().map(|e| e.seq), Some(0));
        assert_eq!(rob.pop_head().map(|e| e.seq), Some(1));
        assert_eq!(rob.pop_head().map(|e| e.seq), None);
    }

    #[test]
    fn test_full_is_not_empty() {
        let mut rob = ReorderBuffer::new();
        for seq in 0..ROB_SIZE as u64 {
            rob.allocate(entry(seq));
        }
        assert_eq!(rob.head(), rob.tail());
        assert!(rob.is_full());
        assert!(!rob.is_empty());
        assert_eq!(rob.iter().count(), ROB_SIZE);
    }

    #[test]
    fn test_wraparound() {
        let mut rob = ReorderBuffer::new();
        for seq in 0..ROB_SIZE as u64 - 1 {
            rob.allocate(entry(seq));
            rob.pop_head();
        }
        let a = rob.allocate(entry(100));
        let b = rob.allocate(entry(101));
        assert_eq!(a.index(), ROB_SIZE - 1);
        assert_eq!(b.index(), 0);
        assert_eq!(rob.age(b), 1);
        let seqs: Vec<u64> = rob.iter().map(|(_, e)| e.seq).collect();
        assert_eq!(seqs, vec![100, 101]);
        let older: Vec<u64> = rob.older_than(b).map(|(_, e)| e.seq).collect();
        assert_eq!(older, vec![100]);
    }

    #[test]
    fn test_reset() {
        let mut rob = ReorderBuffer::new();
        rob.allocate(entry(0));
        rob.allocate(entry(1));
        rob.pop_head();
        let discarded = rob.reset();
        assert_eq!(discarded.len(), 1);
        assert_eq!(discarded[0].seq, 1);
        assert!(rob.is_empty());
        assert_eq!((rob.head(), rob.tail()), (0, 0));
    }

    #[test]
    #[should_panic(expected = "overflow")]
    fn test_overflow_panics() {
        let mut rob = ReorderBuffer::new();
        for seq in 0..=ROB_SIZE as u64 {
            rob.allocate(entry(seq));
        }
    }
}
