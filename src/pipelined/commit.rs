//! In-order commit from the reorder buffer head

use super::LOG_TARGET;
use crate::alu;
use crate::cpu::CPUState;
use crate::instruction::Opcode;
use crate::rename::regfile::PhysReg;
use crate::rob::RobEntry;

/// Retires completed instructions from the head of the reorder buffer,
/// oldest first, stopping at the first one still in flight.
/// Returns the number retired this cycle.
pub fn commit(cpu: &mut CPUState) -> usize {
    let mut committed = 0;

    while let Some((_, head)) = cpu.rob.peek_head() {
        if !head.result_valid {
            break;
        }
        let Some(entry) = cpu.rob.pop_head() else {
            break;
        };
        committed += 1;
        cpu.update_inst_count(1);

        tracing::debug!(
            target: LOG_TARGET,
            "commit pc({}) {} result {}",
            entry.pc,
            entry.opcode,
            entry.result
        );

        if alu::sets_zero_flag(entry.opcode) {
            cpu.zero_flag = entry.result == 0;
        }
        match entry.opcode {
            Opcode::Add
            | Opcode::Sub
            | Opcode::AddL
            | Opcode::SubL
            | Opcode::And
            | Opcode::Or
            | Opcode::Xor
            | Opcode::Mul
            | Opcode::MovC
            | Opcode::Load
            | Opcode::Ldr => retire_entry(cpu, &entry),
            Opcode::Store | Opcode::Str => {
                if let Some(address) = entry.address {
                    cpu.data_memory.write(address, entry.result);
                }
            }
            // Result lives in the reorder buffer only
            Opcode::Cmp | Opcode::Nop => {}
            Opcode::Jal => {
                retire_entry(cpu, &entry);
                if resolve_control_flow(cpu, &entry) {
                    break;
                }
            }
            Opcode::Jump | Opcode::Bz | Opcode::Bnz => {
                if resolve_control_flow(cpu, &entry) {
                    break;
                }
            }
            Opcode::Halt => {
                cpu.halted = true;
                cpu.rat.resync();
                tracing::debug!(target: LOG_TARGET, "HALT retired at pc({})", entry.pc);
                break;
            }
        }
    }

    committed
}

fn retire_entry(cpu: &mut CPUState, entry: &RobEntry) {
    if let (Some(rd), Some(dest)) = (entry.rd, entry.dest) {
        retire(cpu, entry.result, rd, dest);
    }
}

/// Makes `pd` the committed home of `rd`
fn retire(cpu: &mut CPUState, value: i32, rd: usize, pd: PhysReg) {
    cpu.prf.write(pd, value);

    if let Some(prev) = cpu.rat.retirement.get(rd) {
        if prev != pd {
            cpu.prf.free(prev);
        }
    }
    cpu.rat.retirement.set(rd, pd, true);

    // Still the newest mapping: later readers can use it
    if cpu.rat.speculative.get(rd) == Some(pd) {
        cpu.rat.speculative.mark_valid(rd);
    }
}

/// Unblocks decode after a branch or jump retires.
/// Returns whether the reorder buffer was reset.
fn resolve_control_flow(cpu: &mut CPUState, entry: &RobEntry) -> bool {
    cpu.branch_in_flight = None;
    if !entry.taken {
        return false;
    }
    reset_rob(cpu);
    true
}

/// Drops everything younger than a taken branch and rolls the
/// speculative rename table back to the committed state
fn reset_rob(cpu: &mut CPUState) {
    let discarded = cpu.rob.reset();
    for dest in discarded.iter().filter_map(|e| e.dest) {
        cpu.prf.free(dest);
    }
    cpu.iq.clear();
    cpu.latches.clear_units();
    cpu.rat.resync();

    tracing::debug!(
        target: LOG_TARGET,
        "ROB reset, {} younger entries discarded",
        discarded.len()
    );
}
