//! A simulator wrapper

use std::path::Path;

use crate::cpu::{CPUHistory, CPUPolicy, CPUState, CycleSample, RunMode};
use crate::dump::{ArchRegisters, MachineDump};
use crate::error::SimulatorResult;
use crate::loader;
use crate::pipelined::{self, RunOutcome};

const LOG_TARGET: &str = "sim::driver";

/// Summary of one simulation
#[derive(Clone, Debug)]
pub struct RunStats {
    /// None when the user quit single-step mode
    pub outcome: Option<RunOutcome>,
    pub history: CPUHistory,
    /// One sample per simulated cycle
    pub samples: Vec<CycleSample>,
}

impl RunStats {
    pub fn ipc(&self) -> f64 {
        self.history.ipc()
    }
}

/// Run simulation on the given program file
pub fn run(
    program: &Path,
    policy: CPUPolicy,
    trace_csv: Option<&Path>,
) -> SimulatorResult<RunStats> {
    let code = loader::load_program(program)?;
    let mut cpu = CPUState::make(code, policy);

    let stats = drive(&mut cpu);

    if let Some(path) = trace_csv {
        write_samples(path, &stats.samples)?;
        tracing::info!(
            target: LOG_TARGET,
            "wrote {} cycle samples to {}",
            stats.samples.len(),
            path.display()
        );
    }

    match policy.mode {
        RunMode::Simulate(_) => print!("{}", MachineDump(&cpu)),
        RunMode::Display(_) | RunMode::SingleStep => {
            print!("{}", ArchRegisters(&cpu));
            print!("{}", cpu.data_memory);
        }
    }
    if policy.history {
        print_history(&stats);
    }

    Ok(stats)
}

/// Advances an already loaded machine according to its policy
pub fn drive(cpu: &mut CPUState) -> RunStats {
    let mode = cpu.policy.mode;
    let limit = match mode {
        RunMode::Simulate(cycles) | RunMode::Display(cycles) => cycles,
        RunMode::SingleStep => u64::MAX,
    };

    let mut samples = Vec::new();
    let outcome = loop {
        if cpu.halted {
            break Some(RunOutcome::Halted);
        }
        if cpu.is_drained() {
            break Some(RunOutcome::Drained);
        }
        if cpu.history.cycle_count >= limit {
            break Some(RunOutcome::CycleLimit);
        }

        let committed = pipelined::step(cpu);
        let sample = cpu.sample(committed);
        if cpu.policy.verbose {
            eprintln!(
                "[VERBOSE] cycle {}: committed {}, IQ {}, ROB {}, busy phys regs {}",
                sample.cycle,
                sample.committed,
                sample.iq_occupancy,
                sample.rob_occupancy,
                sample.busy_phys_regs
            );
        }
        samples.push(sample);

        match mode {
            RunMode::Simulate(_) => {}
            RunMode::Display(_) => println!("{}", MachineDump(cpu)),
            RunMode::SingleStep => {
                println!("{}", MachineDump(cpu));
                if !wait_for_step() {
                    break None;
                }
            }
        }
    };

    tracing::info!(
        target: LOG_TARGET,
        "stopped after {} cycles ({} committed): {:?}",
        cpu.history.cycle_count,
        cpu.history.inst_count,
        outcome
    );

    RunStats { outcome, history: cpu.history, samples }
}

/// Blocks until the user asks for another cycle.
/// Returns false on `q` or end of input.
fn wait_for_step() -> bool {
    println!("[Enter] next cycle, [q] quit");
    let line: String = match text_io::try_read!("{}\n") {
        Ok(line) => line,
        Err(_) => return false,
    };
    !line.trim().eq_ignore_ascii_case("q")
}

/// Writes per-cycle occupancy samples as CSV
pub fn write_samples(path: &Path, samples: &[CycleSample]) -> SimulatorResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["cycle", "iq", "rob", "busy_phys_regs", "committed"])?;
    for sample in samples {
        writer.write_record([
            sample.cycle.to_string(),
            sample.iq_occupancy.to_string(),
            sample.rob_occupancy.to_string(),
            sample.busy_phys_regs.to_string(),
            sample.committed.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn print_history(stats: &RunStats) {
    let history = &stats.history;
    eprintln!("[HISTORY] outcome = {:?}", stats.outcome);
    eprintln!(
        "[HISTORY] # cycles = {}, # committed = {}, IPC = {:.3}",
        history.cycle_count,
        history.inst_count,
        stats.ipc()
    );
    eprintln!(
        "[HISTORY] # dispatched = {}, # squashes = {}",
        history.dispatch_count, history.squash_count
    );
    eprintln!(
        "[HISTORY] dispatch stalls: no phys reg = {}, no IQ slot = {}, ROB full = {}, control flow = {}",
        history.stall_no_phys_reg,
        history.stall_no_iq_slot,
        history.stall_rob_full,
        history.stall_control_flow
    );
}
