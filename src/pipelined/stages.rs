//! Front end: fetch, decode/dispatch (rename) and issue/select

use super::latch::{FetchedInsn, FuOp, Latch, Stage};
use super::LOG_TARGET;
use crate::cpu::{CPUState, StallCause, INSN_WIDTH};
use crate::instruction::{FuClass, Opcode};
use crate::issue_queue::{IqEntry, IqSlot};
use crate::rob::RobEntry;

/// IF stage
pub fn fetch(cpu: &mut CPUState) {
    // A redirect this cycle: the target is fetched next cycle
    if cpu.redirected {
        cpu.redirected = false;
        return;
    }

    if !cpu.latches.fetch.has_insn() && !cpu.fetch_halted {
        if let Some(inst) = cpu.code.fetch(cpu.pc) {
            tracing::trace!(target: LOG_TARGET, "IF  pc({}) {}", cpu.pc, inst);
            cpu.latches.fetch.put(FetchedInsn { pc: cpu.pc, inst });
            cpu.pc += INSN_WIDTH;
            // Stop fetching new instructions once HALT is fetched
            if inst.opcode == Opcode::Halt {
                cpu.fetch_halted = true;
            }
        }
    }

    if cpu.latches.fetch.has_insn() {
        if cpu.latches.decode.has_insn() {
            // Decode is still holding its instruction
            cpu.latches.fetch.stalled = true;
        } else if let Some(fetched) = cpu.latches.fetch.take() {
            cpu.latches.fetch.stalled = false;
            cpu.latches.decode.put(fetched);
        }
    }
}

/// ID stage: rename and dispatch the decode latch instruction.
/// On any allocation failure the instruction stays put and is retried
/// unmodified next cycle.
pub fn decode_dispatch(cpu: &mut CPUState) {
    let Some(fetched) = cpu.latches.decode.op else {
        return;
    };

    match dispatch(cpu, fetched) {
        Ok(()) => {
            cpu.latches.decode.clear();
            cpu.history.dispatch_count += 1;
        }
        Err(cause) => {
            tracing::trace!(
                target: LOG_TARGET,
                "ID  pc({}) {} stalled: {:?}",
                fetched.pc,
                fetched.inst,
                cause
            );
            cpu.latches.decode.stalled = true;
            cpu.history.record_stall(cause);
        }
    }
}

fn dispatch(cpu: &mut CPUState, fetched: FetchedInsn) -> Result<(), StallCause> {
    let FetchedInsn { pc, inst } = fetched;
    let opcode = inst.opcode;
    let fu = opcode.fu_class();

    // One unresolved control-flow instruction at a time, and it only
    // enters once every older instruction has left the issue queue
    if cpu.branch_in_flight.is_some()
        || (opcode.is_control_flow() && !cpu.iq.is_empty())
    {
        return Err(StallCause::ControlFlow);
    }
    if cpu.rob.is_full() {
        return Err(StallCause::RobFull);
    }

    // Resolve sources before renaming the destination
    let srcs = inst
        .sources()
        .map(|reg| reg.and_then(|r| cpu.rat.speculative.get(r)));
    let srcs_ready = srcs.iter().all(|src| cpu.operand_ready(*src));

    // Memory ops with ready operands go straight to MEM1, as long as
    // that keeps memory operations in program order
    let bypass = fu == Some(FuClass::Mem)
        && srcs_ready
        && !cpu.latches.mem1.has_insn()
        && !cpu.iq.contains_fu(FuClass::Mem);
    let needs_iq = fu.is_some() && !bypass;

    if needs_iq && !cpu.iq.has_free_slot() {
        return Err(StallCause::NoIqSlot);
    }
    if inst.rd.is_some() && !cpu.prf.has_free() {
        return Err(StallCause::NoPhysReg);
    }

    // Nothing below can fail
    let dest = inst.rd.and_then(|_| cpu.prf.allocate());
    if let (Some(rd), Some(preg)) = (inst.rd, dest) {
        cpu.rat.speculative.set(rd, preg, false);
    }

    let seq = cpu.next_seq;
    cpu.next_seq += 1;

    let mut rob_entry = RobEntry::new(pc, opcode, seq);
    rob_entry.srcs = srcs;
    rob_entry.rd = inst.rd;
    rob_entry.dest = dest;
    // NOP and HALT have nothing to execute
    rob_entry.result_valid = fu.is_none();
    rob_entry.mem_ready = bypass;
    let rob = cpu.rob.allocate(rob_entry);

    if opcode.is_control_flow() {
        cpu.branch_in_flight = Some(rob);
    }

    tracing::trace!(
        target: LOG_TARGET,
        "ID  pc({}) {} -> ROB[{}] dest {:?} srcs {:?}{}",
        pc,
        inst,
        rob.index(),
        dest.map(|p| p.index()),
        srcs.map(|s| s.map(|p| p.index())),
        if bypass { " (bypass to MEM1)" } else { "" }
    );

    let Some(fu) = fu else {
        return Ok(());
    };
    let entry = IqEntry {
        pc,
        opcode,
        srcs,
        imm: inst.imm,
        dest,
        rd: inst.rd,
        fu,
        rob,
        seq,
        reached: Stage::Decode,
    };
    if bypass {
        cpu.latches.mem1.put(FuOp::new(entry));
    } else {
        cpu.iq.insert(entry);
    }

    Ok(())
}

/// Whether every source of an entry can be read.
/// BZ and BNZ carry no register sources but wait for the zero flag of
/// the newest older flag-setting instruction.
fn is_ready(cpu: &CPUState, entry: &IqEntry) -> bool {
    let flag_ready = match entry.opcode {
        Opcode::Bz | Opcode::Bnz => cpu.zero_flag_for(entry.rob).is_some(),
        _ => true,
    };
    flag_ready && entry.srcs.iter().all(|src| cpu.operand_ready(*src))
}

/// Picks the entry to issue to a unit, if any
fn select(cpu: &CPUState, fu: FuClass) -> Option<IqSlot> {
    let candidates = cpu.iq.iter().filter(|(_, entry)| entry.fu == fu);
    match fu {
        // Memory operations leave in program order
        FuClass::Mem => candidates
            .min_by_key(|(_, entry)| entry.seq)
            .filter(|(_, entry)| is_ready(cpu, entry))
            .map(|(slot, _)| slot),
        // Oldest ready entry wins
        FuClass::Int | FuClass::Mul | FuClass::Branch => candidates
            .filter(|(_, entry)| is_ready(cpu, entry))
            .min_by_key(|(_, entry)| entry.seq)
            .map(|(slot, _)| slot),
    }
}

fn unit_latch(cpu: &mut CPUState, fu: FuClass) -> &mut Latch<FuOp> {
    match fu {
        FuClass::Int => &mut cpu.latches.intfu,
        FuClass::Mul => &mut cpu.latches.mul1,
        FuClass::Branch => &mut cpu.latches.bru1,
        FuClass::Mem => &mut cpu.latches.mem1,
    }
}

/// Issue stage: at most one entry per functional unit class
pub fn issue(cpu: &mut CPUState) {
    for fu in FuClass::ALL {
        if unit_latch(cpu, fu).has_insn() {
            continue;
        }
        let Some(slot) = select(cpu, fu) else {
            continue;
        };

        let mut entry = cpu.iq.remove(slot);
        entry.advance(Stage::IssueQueue);
        if fu == FuClass::Mem {
            if let Some(rob_entry) = cpu.rob.get_mut(entry.rob) {
                rob_entry.mem_ready = true;
            }
        }

        tracing::trace!(
            target: LOG_TARGET,
            "IQ  pc({}) {} issued from IQ[{}] to {}",
            entry.pc,
            entry.opcode,
            slot.index(),
            fu
        );
        unit_latch(cpu, fu).put(FuOp::new(entry));
    }
}
