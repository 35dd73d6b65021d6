//! Human-readable dumps of machine state

use std::fmt;

use crate::cpu::{CPUState, NUM_ARCH_REGS};
use crate::issue_queue::IssueQueue;
use crate::memory::DataMemory;
use crate::rename::regfile::{PhysReg, PhysRegFile};
use crate::rename::{RenameTable, RenameTables};
use crate::rob::ReorderBuffer;

fn phys(reg: Option<PhysReg>) -> String {
    reg.map_or_else(|| "-".to_string(), |p| format!("P{}", p.index()))
}

impl fmt::Display for PhysRegFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Physical registers (busy only):")?;
        for (reg, slot) in self.iter().filter(|(_, slot)| slot.busy) {
            writeln!(
                f,
                "  P{:<2} = {:>11}  {}",
                reg.index(),
                slot.value,
                if slot.has_result { "valid" } else { "pending" }
            )?;
        }
        Ok(())
    }
}

fn write_table(f: &mut fmt::Formatter<'_>, table: &RenameTable) -> fmt::Result {
    for (reg, entry) in table.iter() {
        if let Some(preg) = entry.mapping {
            writeln!(
                f,
                "  R{:<2} -> P{:<2} {}",
                reg,
                preg.index(),
                if entry.valid { "" } else { "(in flight)" }
            )?;
        }
    }
    Ok(())
}

impl fmt::Display for RenameTables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Speculative rename table:")?;
        write_table(f, &self.speculative)?;
        writeln!(f, "Retirement rename table:")?;
        write_table(f, &self.retirement)
    }
}

impl fmt::Display for IssueQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Issue queue ({} entries):", self.len())?;
        for (slot, entry) in self.iter() {
            writeln!(
                f,
                "  IQ[{:<2}] pc({}) {:<5} {} dest {} srcs {} {} {} #{} ROB[{}]",
                slot.index(),
                entry.pc,
                entry.opcode,
                entry.fu,
                phys(entry.dest),
                phys(entry.srcs[0]),
                phys(entry.srcs[1]),
                phys(entry.srcs[2]),
                entry.imm,
                entry.rob.index()
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for ReorderBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Reorder buffer (head {}, tail {}, {} entries):",
            self.head(),
            self.tail(),
            self.len()
        )?;
        for (index, entry) in self.iter() {
            write!(
                f,
                "  ROB[{:<2}] pc({}) {:<5} dest {} ",
                index.index(),
                entry.pc,
                entry.opcode,
                phys(entry.dest)
            )?;
            if entry.result_valid {
                write!(f, "result {}", entry.result)?;
            } else {
                write!(f, "pending")?;
            }
            if let Some(address) = entry.address {
                write!(f, " [{}]", address)?;
            }
            if entry.opcode.is_control_flow() && entry.result_valid {
                write!(f, " {}", if entry.taken { "taken" } else { "not taken" })?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl fmt::Display for DataMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Data memory (non-zero words):")?;
        for (index, value) in self.iter_nonzero() {
            writeln!(f, "  MEM[{:<4}] = {}", index, value)?;
        }
        Ok(())
    }
}

/// Committed register values
pub struct ArchRegisters<'a>(pub &'a CPUState);

impl fmt::Display for ArchRegisters<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Architectural registers:")?;
        for row in (0..NUM_ARCH_REGS).collect::<Vec<_>>().chunks(4) {
            write!(f, " ")?;
            for &reg in row {
                write!(f, " R{:<2} = {:>11}", reg, self.0.arch_reg(reg))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Full machine dump for display and single-step modes
pub struct MachineDump<'a>(pub &'a CPUState);

impl fmt::Display for MachineDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cpu = self.0;
        writeln!(
            f,
            "=== cycle {} | pc({}) | Z={} ===",
            cpu.history.cycle_count,
            cpu.pc,
            u8::from(cpu.zero_flag)
        )?;

        let fetch = cpu.latches.fetch.op.map(|op| (op.pc, op.inst));
        let decode = cpu.latches.decode.op.map(|op| (op.pc, op.inst));
        for (name, latch, stalled) in [
            ("IF", fetch, cpu.latches.fetch.stalled),
            ("ID", decode, cpu.latches.decode.stalled),
        ] {
            match latch {
                Some((pc, inst)) => writeln!(
                    f,
                    "  {:<6} pc({}) {}{}",
                    name,
                    pc,
                    inst,
                    if stalled { " (stalled)" } else { "" }
                )?,
                None => writeln!(f, "  {:<6} empty", name)?,
            }
        }
        for (name, latch) in cpu.latches.units() {
            match &latch.op {
                Some(op) => {
                    writeln!(f, "  {:<6} pc({}) {}", name, op.entry.pc, op.entry.opcode)?
                }
                None => writeln!(f, "  {:<6} empty", name)?,
            }
        }

        write!(f, "{}", cpu.iq)?;
        write!(f, "{}", cpu.rob)?;
        write!(f, "{}", cpu.rat)?;
        write!(f, "{}", cpu.prf)?;
        write!(f, "{}", ArchRegisters(cpu))?;
        write!(f, "{}", cpu.data_memory)
    }
}
