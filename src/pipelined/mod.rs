//! Out-of-order pipeline
//!
//! Every cycle evaluates the stages back to front, so each stage reads
//! the latch its upstream neighbor filled in the previous cycle and a
//! value never crosses two stages at once.

use crate::cpu::CPUState;

pub mod commit;
pub mod latch;
pub mod stages;
pub mod units;

pub(crate) const LOG_TARGET: &str = "sim::pipeline";

/// Why a run stopped
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// HALT retired
    Halted,
    /// Ran off the end of the program with nothing left in flight
    Drained,
    /// The cycle budget ran out first
    CycleLimit,
}

/// Advances the machine by one cycle.
/// Returns the number of instructions committed.
pub fn step(cpu: &mut CPUState) -> usize {
    cpu.update_cycle_count(1);
    tracing::trace!(
        target: LOG_TARGET,
        "cycle {} pc({})",
        cpu.history.cycle_count,
        cpu.pc
    );

    let committed = commit::commit(cpu);
    if cpu.halted {
        return committed;
    }

    units::mem2(cpu);
    units::mem1(cpu);
    units::bru2(cpu);
    units::bru1(cpu);
    units::mul3(cpu);
    units::mul2(cpu);
    units::mul1(cpu);
    units::int_unit(cpu);
    stages::issue(cpu);
    stages::decode_dispatch(cpu);
    stages::fetch(cpu);

    committed
}

/// Runs until HALT retires, the program drains, or `max_cycles`
/// cycles have elapsed in total
pub fn run(cpu: &mut CPUState, max_cycles: u64) -> RunOutcome {
    let outcome = loop {
        if cpu.halted {
            break RunOutcome::Halted;
        }
        if cpu.is_drained() {
            break RunOutcome::Drained;
        }
        if cpu.history.cycle_count >= max_cycles {
            break RunOutcome::CycleLimit;
        }
        step(cpu);
    };

    tracing::debug!(
        target: LOG_TARGET,
        "stopped after {} cycles: {:?}",
        cpu.history.cycle_count,
        outcome
    );
    outcome
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::cpu::{CPUPolicy, NUM_ARCH_REGS};
    use crate::instruction::Opcode;
    use crate::loader::parse_program;

    const BUDGET: u64 = 1_000;

    fn machine(program: &str, preload: &[(usize, i32)]) -> CPUState {
        let mut cpu =
            CPUState::make(parse_program(program).unwrap(), CPUPolicy::default());
        for &(reg, value) in preload {
            cpu.preload_register(reg, value);
        }
        cpu
    }

    fn registers(cpu: &CPUState) -> Vec<i32> {
        (0..NUM_ARCH_REGS).map(|r| cpu.arch_reg(r)).collect()
    }

    #[rstest]
    #[case::add("MOVC R1,#5\nMOVC R2,#10\nADD R3,R1,R2\nHALT", &[], &[(1, 5), (2, 10), (3, 15)])]
    #[case::taken_bz("MOVC R1,#0\nBZ #8\nMOVC R1,#99\nHALT", &[], &[(1, 0)])]
    #[case::mul("MOVC R1,#7\nMUL R2,R1,R1\nHALT", &[], &[(1, 7), (2, 49)])]
    #[case::store_then_load("STORE R1,R2,#4\nLOAD R3,R2,#4\nHALT", &[(1, 77)], &[(1, 77), (2, 0), (3, 77)])]
    #[case::same_register_writers(
        "MOVC R1,#1\nMOVC R1,#2\nADD R2,R1,R1\nHALT",
        &[],
        &[(1, 2), (2, 4)]
    )]
    #[case::counted_loop(
        "MOVC R2,#1\nMOVC R3,#2\nMOVC R1,#3\nMUL R2,R2,R3\nSUBL R1,R1,#1\nBNZ #-8\nHALT",
        &[],
        &[(1, 0), (2, 8), (3, 2)]
    )]
    #[case::jal_skips(
        "MOVC R1,#4000\nJAL R2,R1,#12\nMOVC R3,#1\nHALT",
        &[],
        &[(2, 4008), (3, 0)]
    )]
    #[case::bz_sees_flag_in_program_order(
        "MOVC R5,#3\nMUL R6,R5,R5\nADDL R7,R6,#0\nMOVC R1,#0\nBZ #8\nMOVC R2,#99\nHALT",
        &[],
        &[(1, 0), (2, 0), (7, 9)]
    )]
    #[case::bnz_after_late_flag_setter(
        "MOVC R5,#2\nMUL R6,R5,R5\nSUBL R7,R6,#4\nMOVC R1,#1\nBNZ #8\nMOVC R2,#99\nHALT",
        &[],
        &[(2, 0), (7, 0)]
    )]
    #[case::indexed_memory(
        "MOVC R1,#9\nMOVC R2,#3\nMOVC R3,#5\nSTR R1,R2,R3\nLDR R4,R2,R3\nHALT",
        &[],
        &[(4, 9)]
    )]
    fn test_program(
        #[case] program: &str,
        #[case] preload: &[(usize, i32)],
        #[case] expected: &[(usize, i32)],
    ) {
        let mut cpu = machine(program, preload);
        assert_eq!(run(&mut cpu, BUDGET), RunOutcome::Halted);
        for &(reg, value) in expected {
            assert_eq!(cpu.arch_reg(reg), value, "R{}", reg);
        }
        assert!(cpu.rat.in_sync());
    }

    #[test]
    fn test_store_reaches_memory() {
        let mut cpu = machine("STORE R1,R2,#4\nLOAD R3,R2,#4\nHALT", &[(1, 77)]);
        run(&mut cpu, BUDGET);
        assert_eq!(cpu.data_memory.read(4), 77);
    }

    #[test]
    fn test_mul_latency() {
        let mut cpu = machine("MOVC R1,#7\nMUL R2,R1,R1\nHALT", &[]);
        while !cpu.latches.mul1.has_insn() {
            step(&mut cpu);
        }
        let issued = cpu.history.cycle_count;

        // Still in flight for the next three cycles
        for _ in 0..3 {
            assert_eq!(cpu.arch_reg(2), 0);
            step(&mut cpu);
        }
        assert!(cpu.rob.iter().any(|(_, e)| e.opcode == Opcode::Mul));

        run(&mut cpu, BUDGET);
        assert_eq!(cpu.arch_reg(2), 49);
        assert!(cpu.history.cycle_count >= issued + 4);
    }

    #[test]
    fn test_squash_redirects_atomically() {
        let mut cpu = machine("MOVC R1,#0\nBZ #8\nMOVC R1,#99\nHALT", &[]);
        while cpu.history.squash_count == 0 {
            assert!(cpu.history.cycle_count < BUDGET);
            step(&mut cpu);
        }

        assert_eq!(cpu.pc, 4012);
        assert!(cpu.iq.is_empty());
        assert!(!cpu.latches.fetch.has_insn());
        assert!(!cpu.latches.decode.has_insn());
        // The wrong-path MOVC never dispatched
        assert!(cpu.rob.iter().all(|(_, e)| e.pc != 4008));

        assert_eq!(run(&mut cpu, BUDGET), RunOutcome::Halted);
        assert_eq!(cpu.arch_reg(1), 0);
    }

    #[test]
    fn test_not_taken_branch_falls_through() {
        let mut cpu = machine("MOVC R1,#1\nBZ #8\nMOVC R2,#99\nHALT", &[]);
        assert_eq!(run(&mut cpu, BUDGET), RunOutcome::Halted);
        assert_eq!(cpu.arch_reg(2), 99);
        assert_eq!(cpu.history.squash_count, 0);
    }

    #[test]
    fn test_drains_without_halt() {
        let mut cpu = machine("MOVC R1,#1\nADDL R1,R1,#1", &[]);
        assert_eq!(run(&mut cpu, BUDGET), RunOutcome::Drained);
        assert_eq!(cpu.arch_reg(1), 2);
    }

    #[test]
    fn test_cycle_limit() {
        let mut cpu = machine("MOVC R1,#1\nJUMP R0,#4000", &[]);
        assert_eq!(run(&mut cpu, 50), RunOutcome::CycleLimit);
        assert_eq!(cpu.history.cycle_count, 50);
    }

    #[test]
    fn test_deterministic() {
        let program =
            "MOVC R2,#1\nMOVC R3,#2\nMOVC R1,#4\nMUL R2,R2,R3\nSTORE R2,R1,#0\nSUBL R1,R1,#1\nBNZ #-12\nLOAD R5,R0,#1\nHALT";
        let mut a = machine(program, &[]);
        let mut b = machine(program, &[]);
        run(&mut a, BUDGET);
        run(&mut b, BUDGET);

        assert_eq!(registers(&a), registers(&b));
        assert_eq!(a.data_memory, b.data_memory);
        assert_eq!(a.history.cycle_count, b.history.cycle_count);
        assert_eq!(a.arch_reg(5), 16);
    }

    #[test]
    fn test_full_issue_queue_stalls_dispatch() {
        // Each link waits for the previous one to commit
        let program = format!(
            "MOVC R1,#0\nMOVC R2,#2\n{}HALT",
            "MUL R1,R1,R2\nADDL R1,R1,#1\n".repeat(30)
        );
        let mut cpu = machine(&program, &[]);
        let mut peak = 0;
        while !cpu.halted {
            assert!(cpu.history.cycle_count < BUDGET);
            step(&mut cpu);
            peak = peak.max(cpu.iq.len());
        }

        assert!(cpu.history.stall_no_iq_slot > 0);
        assert_eq!(peak, crate::cpu::IQ_SIZE);
        assert_eq!(cpu.arch_reg(1), (1 << 30) - 1);
        assert_eq!(cpu.history.inst_count, 63);
    }

    #[test]
    fn test_full_rob_stalls_dispatch() {
        let program = format!(
            "MOVC R1,#1\nMOVC R2,#-1\n{}{}HALT",
            "MUL R1,R1,R2\n".repeat(23),
            "NOP\n".repeat(100)
        );
        let mut cpu = machine(&program, &[]);
        assert_eq!(run(&mut cpu, BUDGET), RunOutcome::Halted);

        assert!(cpu.history.stall_rob_full > 0);
        assert_eq!(cpu.history.stall_no_iq_slot, 0);
        assert_eq!(cpu.arch_reg(1), -1);
        assert_eq!(cpu.history.inst_count, 126);
    }

    #[test]
    fn test_physical_register_exhaustion_stalls_dispatch() {
        // Loads bypass the issue queue, so only the register file runs out
        let program = format!(
            "MOVC R1,#1\nMOVC R2,#-1\n{}{}HALT",
            "MUL R1,R1,R2\n".repeat(20),
            "LOAD R3,R0,#0\n".repeat(60)
        );
        let mut cpu = machine(&program, &[]);
        assert_eq!(run(&mut cpu, BUDGET), RunOutcome::Halted);

        assert!(cpu.history.stall_no_phys_reg > 0);
        assert_eq!(cpu.arch_reg(1), 1);
        assert_eq!(cpu.arch_reg(3), 0);
        assert_eq!(cpu.history.inst_count, 83);
        assert_eq!(cpu.prf.busy_count(), cpu.rat.retirement.mapped().count());
    }

    #[test]
    fn test_no_physical_register_leak() {
        let mut cpu = machine(
            "MOVC R4,#3\nMOVC R2,#1\nMOVC R1,#3\nMUL R2,R2,R4\nSUBL R1,R1,#1\nBNZ #-8\nHALT",
            &[],
        );
        assert_eq!(run(&mut cpu, BUDGET), RunOutcome::Halted);
        assert_eq!(cpu.arch_reg(2), 27);
        // One physical register per mapped architectural register
        assert_eq!(cpu.prf.busy_count(), cpu.rat.retirement.mapped().count());
    }
}
