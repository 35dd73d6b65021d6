use std::fs;
use std::path::Path;

use plotters::prelude::*;

use sim_lib::cpu::{CPUPolicy, CPUState, CycleSample, IQ_SIZE, NUM_PHYS_REGS, ROB_SIZE};
use sim_lib::error::{SimulatorError, SimulatorResult};
use sim_lib::loader;
use sim_lib::run_wrapper::{drive, write_samples};

fn plot_error(e: impl std::fmt::Display) -> SimulatorError {
    SimulatorError::PlotError(e.to_string())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let param_tokens: Vec<String> = std::env::args().collect();
    let program_path = param_tokens
        .get(1)
        .ok_or("You should specify exactly one program file")?;
    let program_path = Path::new(program_path);

    let code = loader::load_program(program_path)?;
    let mut cpu = CPUState::make(code, CPUPolicy::default());
    let stats = drive(&mut cpu);
    if stats.samples.is_empty() {
        return Err(SimulatorError::ConfigError("program ran for zero cycles".into()).into());
    }

    let base_name = program_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "program".to_string());
    fs::create_dir_all("eval")?;
    write_samples(
        Path::new(&format!("eval/occupancy_{}.csv", base_name)),
        &stats.samples,
    )?;
    plot(&base_name, &stats.samples)?;

    eprintln!(
        "{}: {:?} after {} cycles, IPC = {:.3}",
        base_name,
        stats.outcome,
        stats.history.cycle_count,
        stats.ipc()
    );
    Ok(())
}

/// Line chart of IQ, ROB and physical register occupancy per cycle
fn plot(base_name: &str, samples: &[CycleSample]) -> SimulatorResult<()> {
    let plot_title = format!("Occupancy per cycle: {}", base_name);
    let output_path = format!("eval/occupancy_{}.svg", base_name);

    let x_max = samples.last().map_or(1, |s| s.cycle);
    let y_max = IQ_SIZE.max(ROB_SIZE).max(NUM_PHYS_REGS) as u64;

    let root = SVGBackend::new(output_path.as_str(), (800, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_error)?;

    let mut ctx = ChartBuilder::on(&root)
        .caption(plot_title.as_str(), ("sans-serif", 32).into_font())
        .margin(5)
        .x_label_area_size(40)
        .y_label_area_size(40)
        .build_cartesian_2d(0..x_max, 0..y_max + 4)
        .map_err(plot_error)?;
    ctx.configure_mesh()
        .x_desc("Cycle")
        .y_desc("Entries in use")
        .draw()
        .map_err(plot_error)?;

    let series: [(&str, fn(&CycleSample) -> usize, usize); 3] = [
        ("Issue queue", |s: &CycleSample| s.iq_occupancy, IQ_SIZE),
        ("Reorder buffer", |s: &CycleSample| s.rob_occupancy, ROB_SIZE),
        ("Busy physical registers", |s: &CycleSample| s.busy_phys_regs, NUM_PHYS_REGS),
    ];
    for (i, (name, field, capacity)) in series.into_iter().enumerate() {
        let points = samples.iter().map(|s| (s.cycle, field(s) as u64));
        let label = format!("{} (of {})", name, capacity);
        let color = Palette99::pick(i).to_rgba();
        ctx.draw_series(LineSeries::new(points, color))
            .map_err(plot_error)?
            .label(label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }

    ctx.configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .map_err(plot_error)?;
    root.present().map_err(plot_error)?;

    eprintln!("Wrote {}", output_path);
    Ok(())
}
