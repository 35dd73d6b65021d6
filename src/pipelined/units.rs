//! Functional units
//!
//! Integer (1 cycle), multiply (MUL1 -> MUL2 -> MUL3), branch/jump
//! (BRU1 -> BRU2) and memory (MEM1 address generation -> MEM2 access).
//! Each stage drains its own latch and fills the downstream one, which
//! the downstream stage has already drained earlier in the cycle.

use super::latch::{FuOp, Stage};
use super::LOG_TARGET;
use crate::alu;
use crate::cpu::{CPUState, INSN_WIDTH};
use crate::instruction::Opcode;
use crate::memory::DataMemory;
use crate::rob::RobIndex;

/// Writes a finished result into the reorder buffer
fn complete(cpu: &mut CPUState, rob: RobIndex, result: i32) {
    if let Some(entry) = cpu.rob.get_mut(rob) {
        entry.result = result;
        entry.result_valid = true;
    }
}

/// Integer unit
pub fn int_unit(cpu: &mut CPUState) {
    let Some(mut op) = cpu.latches.intfu.take() else {
        return;
    };
    op.advance(Stage::IntFu);

    let entry = op.entry;
    let [src1, src2, _] = entry.srcs;
    let result =
        alu::execute(entry.opcode, cpu.operand(src1), cpu.operand(src2), entry.imm);

    tracing::trace!(
        target: LOG_TARGET,
        "INT pc({}) {} = {}",
        entry.pc,
        entry.opcode,
        result
    );
    complete(cpu, entry.rob, result);
}

/// MUL1: compute the product
pub fn mul1(cpu: &mut CPUState) {
    let Some(mut op) = cpu.latches.mul1.take() else {
        return;
    };
    op.advance(Stage::Mul1);

    let [src1, src2, _] = op.entry.srcs;
    op.result =
        alu::execute(op.entry.opcode, cpu.operand(src1), cpu.operand(src2), 0);
    tracing::trace!(target: LOG_TARGET, "MUL1 pc({}) = {}", op.entry.pc, op.result);
    cpu.latches.mul2.put(op);
}

/// MUL2: latency only
pub fn mul2(cpu: &mut CPUState) {
    let Some(mut op) = cpu.latches.mul2.take() else {
        return;
    };
    op.advance(Stage::Mul2);
    cpu.latches.mul3.put(op);
}

/// MUL3: write back to the reorder buffer
pub fn mul3(cpu: &mut CPUState) {
    let Some(mut op) = cpu.latches.mul3.take() else {
        return;
    };
    op.advance(Stage::Mul3);
    tracing::trace!(target: LOG_TARGET, "MUL3 pc({}) done", op.entry.pc);
    complete(cpu, op.entry.rob, op.result);
}

/// BRU1: compute the target and the link value
pub fn bru1(cpu: &mut CPUState) {
    let Some(mut op) = cpu.latches.bru1.take() else {
        return;
    };
    op.advance(Stage::Bru1);

    let entry = op.entry;
    match entry.opcode {
        Opcode::Jump => {
            op.target = cpu.operand(entry.srcs[0]).wrapping_add(entry.imm);
        }
        Opcode::Jal => {
            op.target = cpu.operand(entry.srcs[0]).wrapping_add(entry.imm);
            op.result = entry.pc + INSN_WIDTH;
        }
        Opcode::Bz | Opcode::Bnz => {
            op.target = entry.pc.wrapping_add(entry.imm);
        }
        other => unreachable!("{} in the branch unit", other),
    }
    tracing::trace!(target: LOG_TARGET, "BRU1 pc({}) target {}", entry.pc, op.target);
    cpu.latches.bru2.put(op);
}

/// BRU2: resolve, record the outcome and squash on a taken branch
pub fn bru2(cpu: &mut CPUState) {
    let Some(mut op) = cpu.latches.bru2.take() else {
        return;
    };
    op.advance(Stage::Bru2);

    let entry = op.entry;
    // Issue waited for the flag producer, so the flag is known here
    let zero = cpu.zero_flag_for(entry.rob).unwrap_or(cpu.zero_flag);
    let taken = match entry.opcode {
        Opcode::Jump | Opcode::Jal => true,
        Opcode::Bz => zero,
        Opcode::Bnz => !zero,
        other => unreachable!("{} in the branch unit", other),
    };

    if let Some(rob_entry) = cpu.rob.get_mut(entry.rob) {
        rob_entry.result = match entry.opcode {
            Opcode::Jal => op.result,
            _ => op.target,
        };
        rob_entry.taken = taken;
        rob_entry.result_valid = true;
    }

    tracing::debug!(
        target: LOG_TARGET,
        "BRU2 pc({}) {} {}",
        entry.pc,
        entry.opcode,
        if taken { format!("taken to {}", op.target) } else { "not taken".to_string() }
    );
    if taken {
        squash(cpu, op.target);
    }
}

/// Discards in-flight front end state and redirects fetch
pub fn squash(cpu: &mut CPUState, target: i32) {
    cpu.latches.clear_front_end();
    let discarded = cpu.iq.clear();
    cpu.pc = target;
    cpu.redirected = true;
    // A HALT fetched down the wrong path no longer counts
    cpu.fetch_halted = false;
    cpu.history.squash_count += 1;

    tracing::debug!(
        target: LOG_TARGET,
        "squash: fetch redirected to {}, {} IQ entries discarded",
        target,
        discarded
    );
}

/// MEM1: effective address generation
pub fn mem1(cpu: &mut CPUState) {
    let Some(mut op) = cpu.latches.mem1.take() else {
        return;
    };
    op.advance(Stage::Mem1);

    let entry = op.entry;
    let [s1, s2, s3] = entry.srcs.map(|src| cpu.operand(src));
    let (base, offset) = match entry.opcode {
        Opcode::Load => (s1, entry.imm),
        Opcode::Ldr => (s1, s2),
        Opcode::Store => (s2, entry.imm),
        Opcode::Str => (s2, s3),
        other => unreachable!("{} in the memory unit", other),
    };
    if entry.opcode.is_store() {
        op.store_value = s1;
    }
    op.address = DataMemory::word_index(base.wrapping_add(offset));

    tracing::trace!(target: LOG_TARGET, "MEM1 pc({}) address {}", entry.pc, op.address);
    cpu.latches.mem2.put(op);
}

/// MEM2: load data, or stage a store for commit
pub fn mem2(cpu: &mut CPUState) {
    let Some(mut op) = cpu.latches.mem2.take() else {
        return;
    };
    op.advance(Stage::Mem2);

    let entry = op.entry;
    let value = if entry.opcode.is_load() {
        load_value(cpu, &op)
    } else {
        op.store_value
    };

    if let Some(rob_entry) = cpu.rob.get_mut(entry.rob) {
        rob_entry.result = value;
        rob_entry.address = Some(op.address);
        rob_entry.result_valid = true;
    }
    tracing::trace!(
        target: LOG_TARGET,
        "MEM2 pc({}) {} [{}] = {}",
        entry.pc,
        entry.opcode,
        op.address,
        value
    );
}

/// Value a load observes: the youngest older store to the same word
/// still waiting in the reorder buffer, else data memory
fn load_value(cpu: &CPUState, op: &FuOp) -> i32 {
    cpu.rob
        .older_than(op.entry.rob)
        .filter(|(_, e)| {
            e.opcode.is_store() && e.result_valid && e.address == Some(op.address)
        })
        .last()
        .map_or_else(|| cpu.data_memory.read(op.address), |(_, e)| e.result)
}
