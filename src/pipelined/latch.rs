//! Pipeline latches
use crate::instruction::Instruction;
use crate::issue_queue::IqEntry;

/// Pipeline stage a micro-op has reached.
/// Declaration order is pipeline order, so the marker only grows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Stage {
    #[default]
    Fetch,
    Decode,
    IssueQueue,
    IntFu,
    Mul1,
    Mul2,
    Mul3,
    Bru1,
    Bru2,
    Mem1,
    Mem2,
}

/// Latch between two stages: at most one operation plus a stall flag
#[derive(Clone, Copy, Debug)]
pub struct Latch<T> {
    pub op: Option<T>,
    pub stalled: bool,
}

impl<T> Default for Latch<T> {
    fn default() -> Self {
        Self { op: None, stalled: false }
    }
}

impl<T> Latch<T> {
    pub fn has_insn(&self) -> bool {
        self.op.is_some()
    }

    pub fn take(&mut self) -> Option<T> {
        self.op.take()
    }

    /// Fills the latch. The upstream stage only writes a latch its
    /// downstream neighbor has already drained this cycle.
    pub fn put(&mut self, op: T) {
        assert!(self.op.is_none(), "latch overwritten while occupied");
        self.op = Some(op);
        self.stalled = false;
    }

    pub fn clear(&mut self) {
        self.op = None;
        self.stalled = false;
    }
}

/// Fetch and decode latch contents
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchedInsn {
    pub pc: i32,
    pub inst: Instruction,
}

/// A micro-op inside a functional unit
#[derive(Clone, Copy, Debug)]
pub struct FuOp {
    pub entry: IqEntry,
    /// Computed value (ALU result, product, link value)
    pub result: i32,
    /// Control-flow target computed by BRU1
    pub target: i32,
    /// Data memory word index computed by MEM1
    pub address: usize,
    /// Value a store will write
    pub store_value: i32,
}

impl FuOp {
    pub fn new(entry: IqEntry) -> Self {
        Self { entry, result: 0, target: 0, address: 0, store_value: 0 }
    }

    /// Records that the op has reached `stage`
    pub fn advance(&mut self, stage: Stage) {
        self.entry.advance(stage);
    }
}

/// All stage boundaries of the machine
#[derive(Clone, Debug, Default)]
pub struct PipelineLatches {
    pub fetch: Latch<FetchedInsn>,
    pub decode: Latch<FetchedInsn>,
    pub intfu: Latch<FuOp>,
    pub mul1: Latch<FuOp>,
    pub mul2: Latch<FuOp>,
    pub mul3: Latch<FuOp>,
    pub bru1: Latch<FuOp>,
    pub bru2: Latch<FuOp>,
    pub mem1: Latch<FuOp>,
    pub mem2: Latch<FuOp>,
}

impl PipelineLatches {
    /// Discards the fetch and decode latches
    pub fn clear_front_end(&mut self) {
        self.fetch.clear();
        self.decode.clear();
    }

    /// Discards every functional unit latch
    pub fn clear_units(&mut self) {
        for latch in self.units_mut() {
            latch.clear();
        }
    }

    pub fn units(&self) -> [(&'static str, &Latch<FuOp>); 8] {
        [
            ("INTFU", &self.intfu),
            ("MUL1", &self.mul1),
            ("MUL2", &self.mul2),
            ("MUL3", &self.mul3),
            ("BRU1", &self.bru1),
            ("BRU2", &self.bru2),
            ("MEM1", &self.mem1),
            ("MEM2", &self.mem2),
        ]
    }

    fn units_mut(&mut self) -> [&mut Latch<FuOp>; 8] {
        [
            &mut self.intfu,
            &mut self.mul1,
            &mut self.mul2,
            &mut self.mul3,
            &mut self.bru1,
            &mut self.bru2,
            &mut self.mem1,
            &mut self.mem2,
        ]
    }

    pub fn units_idle(&self) -> bool {
        self.units().iter().all(|(_, latch)| !latch.has_insn())
    }

    pub fn is_empty(&self) -> bool {
        !self.fetch.has_insn() && !self.decode.has_insn() && self.units_idle()
    }
}
