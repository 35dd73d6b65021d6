use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::cpu::{CPUPolicy, RunMode};

/// APEX out-of-order pipeline simulator.
#[derive(Debug, Parser)]
#[command(name = "sim", version)]
pub struct SimArgs {
    /// Path to the program file to simulate.
    pub program: PathBuf,

    /// How to advance the machine.
    #[arg(value_enum, default_value_t = ModeArg::Simulate)]
    pub mode: ModeArg,

    /// Number of cycles to run in simulate and display modes.
    /// Runs until HALT or the end of the program when omitted.
    pub cycles: Option<u64>,

    /// Print cycle, commit and stall counts after simulation.
    #[arg(long)]
    pub history: bool,

    /// Log pipeline events at debug level, unless RUST_LOG says otherwise.
    #[arg(short, long)]
    pub verbose: bool,

    /// Write one row of occupancy counters per cycle to this CSV file.
    #[arg(long, value_name = "PATH")]
    pub trace_csv: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Run silently, then print the final state
    Simulate,
    /// Print the machine state after every cycle
    Display,
    /// Print the machine state and wait for Enter after every cycle
    SingleStep,
}

impl SimArgs {
    pub fn policy(&self) -> CPUPolicy {
        let cycles = self.cycles.unwrap_or(u64::MAX);
        let mode = match self.mode {
            ModeArg::Simulate => RunMode::Simulate(cycles),
            ModeArg::Display => RunMode::Display(cycles),
            ModeArg::SingleStep => RunMode::SingleStep,
        };
        CPUPolicy { verbose: self.verbose, history: self.history, mode }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mode_and_cycles() {
        let args =
            SimArgs::try_parse_from(["sim", "prog.asm", "display", "20", "--history"])
                .unwrap();
        assert_eq!(args.program, PathBuf::from("prog.asm"));
        let policy = args.policy();
        assert_eq!(policy.mode, RunMode::Display(20));
        assert!(policy.history);
        assert!(!policy.verbose);
    }

    #[test]
    fn test_defaults() {
        let args = SimArgs::try_parse_from(["sim", "prog.asm"]).unwrap();
        assert_eq!(args.policy().mode, RunMode::Simulate(u64::MAX));
        assert_eq!(args.trace_csv, None);
    }

    #[test]
    fn test_single_step_and_trace() {
        let args = SimArgs::try_parse_from([
            "sim",
            "prog.asm",
            "single-step",
            "--trace-csv",
            "out.csv",
            "-v",
        ])
        .unwrap();
        assert_eq!(args.policy().mode, RunMode::SingleStep);
        assert_eq!(args.trace_csv, Some(PathBuf::from("out.csv")));
        assert!(args.verbose);
    }

    #[test]
    fn test_rejects_unknown_mode() {
        assert!(SimArgs::try_parse_from(["sim", "prog.asm", "warp"]).is_err());
    }
}
