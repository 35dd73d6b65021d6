use std::process;

use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use sim_lib::flags::SimArgs;
use sim_lib::run_wrapper;

fn setup_logger(verbose: bool) {
    let default = if verbose { LevelFilter::DEBUG } else { LevelFilter::WARN };
    let filter = EnvFilter::builder()
        .with_default_directive(default.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

fn main() {
    let args = SimArgs::parse();
    setup_logger(args.verbose);

    if let Err(e) = run_wrapper::run(&args.program, args.policy(), args.trace_csv.as_deref()) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
