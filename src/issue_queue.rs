//! Centralized issue queue

use crate::cpu::IQ_SIZE;
use crate::instruction::{FuClass, Opcode};
use crate::pipelined::latch::Stage;
use crate::rename::regfile::PhysReg;
use crate::rob::RobIndex;

/// Index of an issue queue slot
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IqSlot(usize);

impl IqSlot {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A renamed micro-op waiting for its operands
#[derive(Clone, Copy, Debug)]
pub struct IqEntry {
    pub pc: i32,
    pub opcode: Opcode,
    /// Physical sources; None when unused or reading an unmapped register
    pub srcs: [Option<PhysReg>; 3],
    pub imm: i32,
    pub dest: Option<PhysReg>,
    pub rd: Option<usize>,
    pub fu: FuClass,
    pub rob: RobIndex,
    /// Dispatch order
    pub seq: u64,
    pub reached: Stage,
}

impl IqEntry {
    /// Records that the entry has reached `stage`
    pub fn advance(&mut self, stage: Stage) {
        assert!(
            stage > self.reached,
            "pc({}) processed twice: {:?} after {:?}",
            self.pc,
            stage,
            self.reached
        );
        self.reached = stage;
    }
}

/// Issue queue: an unordered pool of slots
#[derive(Clone, Debug)]
pub struct IssueQueue {
    slots: [Option<IqEntry>; IQ_SIZE],
}

impl Default for IssueQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl IssueQueue {
    pub fn new() -> Self {
        Self { slots: [None; IQ_SIZE] }
    }

    pub fn has_free_slot(&self) -> bool {
        self.slots.iter().any(Option::is_none)
    }

    /// Places an entry in the first free slot.
    /// Callers check `has_free_slot` first.
    pub fn insert(&mut self, entry: IqEntry) -> IqSlot {
        let Some(index) = self.slots.iter().position(Option::is_none) else {
            panic!("issue queue overflow");
        };
        self.slots[index] = Some(entry);
        IqSlot(index)
    }

    /// Frees a slot, returning its entry
    pub fn remove(&mut self, slot: IqSlot) -> IqEntry {
        let Some(entry) = self.slots[slot.0].take() else {
            panic!("IQ[{}] freed while empty", slot.0);
        };
        entry
    }

    /// Frees every slot, returning how many were occupied
    pub fn clear(&mut self) -> usize {
        let occupied = self.len();
        self.slots = [None; IQ_SIZE];
        occupied
    }

    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Whether any waiting entry targets the given unit
    pub fn contains_fu(&self, fu: FuClass) -> bool {
        self.iter().any(|(_, entry)| entry.fu == fu)
    }

    /// Occupied slots in slot order
    pub fn iter(&self) -> impl Iterator<Item = (IqSlot, &IqEntry)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|entry| (IqSlot(i), entry)))
    }
}
