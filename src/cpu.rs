//! APEX out-of-order CPU state

use crate::alu;
use crate::issue_queue::IssueQueue;
use crate::loader::CodeMemory;
use crate::memory::DataMemory;
use crate::pipelined::latch::PipelineLatches;
use crate::rename::regfile::{PhysReg, PhysRegFile};
use crate::rename::RenameTables;
use crate::rob::{ReorderBuffer, RobIndex};

/// Architectural registers visible to programs
pub const NUM_ARCH_REGS: usize = 16;
/// Physical registers backing the rename tables
pub const NUM_PHYS_REGS: usize = 48;
pub const IQ_SIZE: usize = 24;
pub const ROB_SIZE: usize = 64;
/// Data memory size in words
pub const DATA_MEMORY_SIZE: usize = 4096;
/// PC of the first instruction
pub const CODE_BASE_PC: i32 = 4000;
pub const INSN_WIDTH: i32 = 4;

/// CPU state
pub struct CPUState {
    /// Fetch program counter
    pub pc: i32,
    /// Zero flag of the last committed flag-setting instruction
    pub zero_flag: bool,

    /// Instruction store
    pub code: CodeMemory,
    /// Physical register file and allocator
    pub prf: PhysRegFile,
    /// Speculative and retirement rename tables
    pub rat: RenameTables,
    pub iq: IssueQueue,
    pub rob: ReorderBuffer,
    pub data_memory: DataMemory,
    /// One latch per stage boundary
    pub latches: PipelineLatches,

    /// HALT has been fetched; fetch stops
    pub fetch_halted: bool,
    /// A branch redirected the PC this cycle; fetch resumes next cycle
    pub redirected: bool,
    /// The unresolved control-flow instruction, if any.
    /// Decode is frozen until it commits.
    pub branch_in_flight: Option<RobIndex>,
    /// HALT retired
    pub halted: bool,
    /// Dispatch order of the next instruction
    pub next_seq: u64,

    /// CPU policy
    pub policy: CPUPolicy,

    /// History of execution
    pub history: CPUHistory,
}

impl CPUState {
    pub fn make(code: CodeMemory, policy: CPUPolicy) -> Self {
        Self {
            pc: CODE_BASE_PC,
            zero_flag: false,
            code,
            prf: PhysRegFile::new(),
            rat: RenameTables::default(),
            iq: IssueQueue::new(),
            rob: ReorderBuffer::new(),
            data_memory: DataMemory::new(),
            latches: PipelineLatches::default(),
            fetch_halted: false,
            redirected: false,
            branch_in_flight: None,
            halted: false,
            next_seq: 0,
            policy,
            history: CPUHistory::default(),
        }
    }

    /// Installs an initial architectural register value.
    /// Must be called before the first cycle.
    pub fn preload_register(&mut self, reg: usize, value: i32) {
        assert!(reg < NUM_ARCH_REGS, "R{} is not an architectural register", reg);
        assert!(self.rob.is_empty(), "preload after dispatch started");

        if let Some(old) = self.rat.retirement.get(reg) {
            self.prf.free(old);
        }
        let Some(preg) = self.prf.allocate() else {
            panic!("no free physical register to preload R{}", reg);
        };
        self.prf.write(preg, value);
        self.rat.retirement.set(reg, preg, true);
        self.rat.resync();
    }

    /// Committed value of an architectural register
    pub fn arch_reg(&self, reg: usize) -> i32 {
        self.rat.retirement.get(reg).map_or(0, |p| self.prf.value(p))
    }

    /// Value of a source operand; unused or unmapped sources read 0
    pub fn operand(&self, src: Option<PhysReg>) -> i32 {
        src.map_or(0, |p| self.prf.read(p))
    }

    /// Whether a source operand can be consumed
    pub fn operand_ready(&self, src: Option<PhysReg>) -> bool {
        src.map_or(true, |p| self.prf.has_result(p))
    }

    /// Zero flag as seen by the instruction at `rob`: the result of the
    /// youngest older flag-setting entry, or the committed flag when no
    /// such entry is in flight. None until that entry has executed.
    pub fn zero_flag_for(&self, rob: RobIndex) -> Option<bool> {
        let producer = self
            .rob
            .older_than(rob)
            .filter(|(_, e)| alu::sets_zero_flag(e.opcode))
            .last();
        match producer {
            Some((_, e)) if e.result_valid => Some(e.result == 0),
            Some(_) => None,
            None => Some(self.zero_flag),
        }
    }

    /// Nothing left to fetch and nothing in flight
    pub fn is_drained(&self) -> bool {
        let fetch_done =
            self.fetch_halted || self.code.fetch(self.pc).is_none();
        fetch_done
            && self.latches.is_empty()
            && self.iq.is_empty()
            && self.rob.is_empty()
    }

    /// Increments history cycle count
    pub fn update_cycle_count(&mut self, value: u64) {
        self.history.cycle_count += value;
    }

    /// Increments history committed instruction count
    pub fn update_inst_count(&mut self, value: u64) {
        self.history.inst_count += value;
    }

    /// Snapshot of resource occupancy at the end of a cycle
    pub fn sample(&self, committed: usize) -> CycleSample {
        CycleSample {
            cycle: self.history.cycle_count,
            iq_occupancy: self.iq.len(),
            rob_occupancy: self.rob.len(),
            busy_phys_regs: self.prf.busy_count(),
            committed,
        }
    }
}

/// How the driver advances the machine
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunMode {
    /// Run silently for the given number of cycles
    Simulate(u64),
    /// Print the machine state after every cycle
    Display(u64),
    /// Print the machine state and wait for input after every cycle
    SingleStep,
}

impl Default for RunMode {
    fn default() -> Self {
        RunMode::Simulate(u64::MAX)
    }
}

/// CPU policy
#[derive(Clone, Copy, Debug, Default)]
pub struct CPUPolicy {
    pub verbose: bool,
    pub history: bool,
    pub mode: RunMode,
}

/// Reason decode could not dispatch this cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StallCause {
    NoPhysReg,
    NoIqSlot,
    RobFull,
    /// Waiting on an unresolved branch, or draining the
    /// issue queue before dispatching one
    ControlFlow,
}

/// History module
#[derive(Clone, Copy, Debug, Default)]
pub struct CPUHistory {
    pub cycle_count: u64,
    /// Instructions retired
    pub inst_count: u64,
    pub dispatch_count: u64,
    pub stall_no_phys_reg: u64,
    pub stall_no_iq_slot: u64,
    pub stall_rob_full: u64,
    pub stall_control_flow: u64,
    pub squash_count: u64,
}

impl CPUHistory {
    pub fn record_stall(&mut self, cause: StallCause) {
        match cause {
            StallCause::NoPhysReg => self.stall_no_phys_reg += 1,
            StallCause::NoIqSlot => self.stall_no_iq_slot += 1,
            StallCause::RobFull => self.stall_rob_full += 1,
            StallCause::ControlFlow => self.stall_control_flow += 1,
        }
    }

    /// Committed instructions per cycle
    pub fn ipc(&self) -> f64 {
        if self.cycle_count == 0 {
            0.0
        } else {
            self.inst_count as f64 / self.cycle_count as f64
        }
    }
}

/// Per-cycle occupancy record
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CycleSample {
    pub cycle: u64,
    pub iq_occupancy: usize,
    pub rob_occupancy: usize,
    pub busy_phys_regs: usize,
    pub committed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Opcode;
    use crate::loader::parse_program;
    use crate::rob::RobEntry;

    fn cpu() -> CPUState {
        CPUState::make(parse_program("HALT").unwrap(), CPUPolicy::default())
    }

    #[test]
    fn test_preload_register() {
        let mut cpu = cpu();
        assert_eq!(cpu.arch_reg(1), 0);
        cpu.preload_register(1, 77);
        assert_eq!(cpu.arch_reg(1), 77);
        assert_eq!(cpu.rat.speculative, cpu.rat.retirement);
        assert_eq!(cpu.prf.busy_count(), 1);

        // Preloading again replaces the mapping without leaking
        cpu.preload_register(1, 5);
        assert_eq!(cpu.arch_reg(1), 5);
        assert_eq!(cpu.prf.busy_count(), 1);
    }

    #[test]
    fn test_unmapped_operand_reads_zero() {
        let cpu = cpu();
        assert_eq!(cpu.operand(None), 0);
        assert!(cpu.operand_ready(None));
    }

    #[test]
    fn test_zero_flag_follows_program_order() {
        let mut cpu = cpu();
        cpu.zero_flag = true;

        let mut movc = RobEntry::new(4000, Opcode::MovC, 0);
        movc.result_valid = true;
        let first = cpu.rob.allocate(movc);
        let subl = cpu.rob.allocate(RobEntry::new(4004, Opcode::SubL, 1));
        cpu.rob.allocate(RobEntry::new(4008, Opcode::Mul, 2));
        let branch = cpu.rob.allocate(RobEntry::new(4012, Opcode::Bnz, 3));

        // The youngest flag setter has not executed yet
        assert_eq!(cpu.zero_flag_for(branch), None);

        if let Some(entry) = cpu.rob.get_mut(subl) {
            entry.result = 5;
            entry.result_valid = true;
        }
        assert_eq!(cpu.zero_flag_for(branch), Some(false));
        assert_eq!(cpu.zero_flag_for(subl), Some(true));
        // Nothing older: the committed flag
        assert_eq!(cpu.zero_flag_for(first), Some(true));
    }

    #[test]
    fn test_history_ipc() {
        let mut history = CPUHistory::default();
        assert_eq!(history.ipc(), 0.0);
        history.cycle_count = 10;
        history.inst_count = 4;
        assert!((history.ipc() - 0.4).abs() < 1e-9);
        history.record_stall(StallCause::NoIqSlot);
        assert_eq!(history.stall_no_iq_slot, 1);
    }
}
