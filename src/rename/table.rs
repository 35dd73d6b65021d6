//! Architectural to physical register mapping

use super::regfile::PhysReg;
use crate::cpu::NUM_ARCH_REGS;

/// One rename table row
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenameEntry {
    /// None until the register is first written
    pub mapping: Option<PhysReg>,
    /// The mapped register holds the committed value
    pub valid: bool,
}

/// Rename table over the 16 architectural registers
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenameTable {
    entries: [RenameEntry; NUM_ARCH_REGS],
}

impl RenameTable {
    pub fn get(&self, reg: usize) -> Option<PhysReg> {
        self.entries[reg].mapping
    }

    pub fn entry(&self, reg: usize) -> RenameEntry {
        self.entries[reg]
    }

    pub fn set(&mut self, reg: usize, preg: PhysReg, valid: bool) {
        self.entries[reg] = RenameEntry { mapping: Some(preg), valid };
    }

    pub fn mark_valid(&mut self, reg: usize) {
        self.entries[reg].valid = true;
    }

    /// Physical registers currently mapped
    pub fn mapped(&self) -> impl Iterator<Item = PhysReg> + '_ {
        self.entries.iter().filter_map(|e| e.mapping)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &RenameEntry)> {
        self.entries.iter().enumerate()
    }
}
