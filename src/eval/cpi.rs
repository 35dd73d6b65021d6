use std::fs;
use std::path::Path;
use std::process;

use sim_lib::cpu::{CPUPolicy, CPUState};
use sim_lib::error::SimulatorResult;
use sim_lib::loader;
use sim_lib::run_wrapper::{drive, RunStats};

fn main() {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    if let Err(e) = run_eval() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn simulate(program_path: &Path) -> SimulatorResult<RunStats> {
    let code = loader::load_program(program_path)?;
    let mut cpu = CPUState::make(code, CPUPolicy::default());
    Ok(drive(&mut cpu))
}

fn run_eval() -> SimulatorResult<()> {
    fs::create_dir_all("eval")?;
    let output_path = "eval/sim_eval.csv";
    let mut writer = csv::Writer::from_path(output_path)?;

    writer.write_record([
        "Program",
        "Outcome",
        "Cycles",
        "Committed",
        "IPC",
        "Squashes",
        "Stall (phys reg)",
        "Stall (IQ)",
        "Stall (ROB)",
        "Stall (control flow)",
    ])?;

    let programs = [
        "add",
        "branch_skip",
        "mul",
        "store_load",
        "power_loop",
        "call_return",
        "mixed",
    ];

    for program in programs {
        let program_path = format!("programs/{}.asm", program);
        eprintln!("Running program: {}", program_path);

        match simulate(Path::new(&program_path)) {
            Ok(stats) => {
                let history = &stats.history;
                writer.write_record([
                    program.to_string(),
                    format!("{:?}", stats.outcome),
                    history.cycle_count.to_string(),
                    history.inst_count.to_string(),
                    format!("{:.3}", stats.ipc()),
                    history.squash_count.to_string(),
                    history.stall_no_phys_reg.to_string(),
                    history.stall_no_iq_slot.to_string(),
                    history.stall_rob_full.to_string(),
                    history.stall_control_flow.to_string(),
                ])?;
            }
            Err(e) => {
                eprintln!("Warning: Failed to run program '{}': {}", program, e);
                let mut record = vec![program.to_string()];
                record.extend(std::iter::repeat("Error".to_string()).take(9));
                writer.write_record(record)?;
            }
        }
    }

    writer.flush()?;
    eprintln!("Wrote {}", output_path);
    Ok(())
}
