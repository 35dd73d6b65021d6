//! Physical register file with a first-free allocator

use crate::cpu::NUM_PHYS_REGS;

/// Index of a physical register slot
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PhysReg(usize);

impl PhysReg {
    pub fn index(self) -> usize {
        self.0
    }
}

/// One physical register slot
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PhysSlot {
    pub value: i32,
    /// Data produced and consumable
    pub has_result: bool,
    /// Allocated to an in-flight or architectural destination
    pub busy: bool,
}

/// Physical register file
#[derive(Clone, Debug)]
pub struct PhysRegFile {
    slots: [PhysSlot; NUM_PHYS_REGS],
}

impl Default for PhysRegFile {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysRegFile {
    pub fn new() -> Self {
        Self { slots: [PhysSlot::default(); NUM_PHYS_REGS] }
    }

    /// Claims the first free slot, marking it busy with no result yet.
    /// Returns None when every slot is busy.
    pub fn allocate(&mut self) -> Option<PhysReg> {
        let index = self.slots.iter().position(|slot| !slot.busy)?;
        let slot = &mut self.slots[index];
        slot.busy = true;
        slot.has_result = false;
        Some(PhysReg(index))
    }

    /// Releases a slot back to the pool
    pub fn free(&mut self, reg: PhysReg) {
        let slot = &mut self.slots[reg.0];
        assert!(slot.busy, "P{} freed while not allocated", reg.0);
        slot.busy = false;
    }

    /// Writes a produced value and marks it consumable
    pub fn write(&mut self, reg: PhysReg, value: i32) {
        let slot = &mut self.slots[reg.0];
        assert!(slot.busy, "P{} written while not allocated", reg.0);
        slot.value = value;
        slot.has_result = true;
    }

    /// Reads a slot as an operand source
    pub fn read(&self, reg: PhysReg) -> i32 {
        let slot = &self.slots[reg.0];
        assert!(slot.busy, "P{} read as an operand while free", reg.0);
        slot.value
    }

    /// Raw slot value, for reporting
    pub fn value(&self, reg: PhysReg) -> i32 {
        self.slots[reg.0].value
    }

    pub fn has_result(&self, reg: PhysReg) -> bool {
        self.slots[reg.0].has_result
    }

    pub fn is_busy(&self, reg: PhysReg) -> bool {
        self.slots[reg.0].busy
    }

    pub fn has_free(&self) -> bool {
        self.slots.iter().any(|slot| !slot.busy)
    }

    pub fn busy_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.busy).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PhysReg, &PhysSlot)> {
        self.slots.iter().enumerate().map(|(i, slot)| (PhysReg(i), slot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_first_free() {
        let mut prf = PhysRegFile::new();
        let a = prf.allocate().unwrap();
        let b = prf.allocate().unwrap();
        assert_eq!((a.index(), b.index()), (0, 1));
        assert!(!prf.has_result(a));

        prf.free(a);
        assert_eq!(prf.allocate().unwrap().index(), 0);
        assert_eq!(prf.busy_count(), 2);
    }

    #[test]
    fn test_exhaustion() {
        let mut prf = PhysRegFile::new();
        for _ in 0..NUM_PHYS_REGS {
            assert!(prf.allocate().is_some());
        }
        assert!(!prf.has_free());
        assert_eq!(prf.allocate(), None);
    }

    #[test]
    fn test_write_then_read() {
        let mut prf = PhysRegFile::new();
        let reg = prf.allocate().unwrap();
        prf.write(reg, -3);
        assert!(prf.has_result(reg));
        assert_eq!(prf.read(reg), -3);
    }

    #[test]
    fn test_reallocation_clears_result() {
        let mut prf = PhysRegFile::new();
        let reg = prf.allocate().unwrap();
        prf.write(reg, 9);
        prf.free(reg);
        let again = prf.allocate().unwrap();
        assert_eq!(again, reg);
        assert!(!prf.has_result(again));
    }

    #[test]
    #[should_panic(expected = "freed while not allocated")]
    fn test_double_free_panics() {
        let mut prf = PhysRegFile::new();
        let reg = prf.allocate().unwrap();
        prf.free(reg);
        prf.free(reg);
    }

    #[test]
    #[should_panic(expected = "read as an operand while free")]
    fn test_read_free_slot_panics() {
        let prf = PhysRegFile::new();
        prf.read(PhysReg(3));
    }
}
