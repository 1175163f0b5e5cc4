use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tl_app::{
    AppError, AppResult, Column, Demo, Progress, RunReport, SimConfig, Simulation, build_demo,
    load_sim_config, query,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tl-cli")]
#[command(about = "TLM multi-domain simulation kernel - command line front end", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered component types
    List,
    /// Show ports and parameters of a component type
    Describe {
        /// Type name, e.g. HydraulicVolumeC
        type_name: String,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the built-in demo models
    Demos,
    /// Run a demo model
    Run(RunArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// Demo name (see `demos`)
    demo: String,
    /// Time step in seconds (defaults to the demo's)
    #[arg(long)]
    dt: Option<f64>,
    /// End time in seconds (defaults to the demo's)
    #[arg(long)]
    t_end: Option<f64>,
    /// Worker threads; more than one enables multicore stepping
    #[arg(long)]
    threads: Option<usize>,
    /// Run configuration YAML
    #[arg(long)]
    config: Option<PathBuf>,
    /// Parameter override as comp.param=value (repeatable)
    #[arg(long = "set", value_name = "COMP.PARAM=VALUE")]
    assignments: Vec<String>,
    /// Series to export as component.port.variable (repeatable; defaults to the demo's)
    #[arg(long = "column")]
    columns: Vec<String>,
    /// Write the exported series as CSV
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Print the run report as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> AppResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List => cmd_list(),
        Commands::Describe { type_name, json } => cmd_describe(&type_name, json),
        Commands::Demos => cmd_demos(),
        Commands::Run(args) => cmd_run(&args),
    }
}

fn cmd_list() -> AppResult<()> {
    let sim = Simulation::new("registry")?;
    println!("Component types:");
    for name in sim.component_types() {
        let info = sim.describe_type(&name)?;
        println!("  {:<34} {:<6} {}", name, info.cqs, info.description);
    }
    Ok(())
}

fn cmd_describe(type_name: &str, json: bool) -> AppResult<()> {
    let sim = Simulation::new("registry")?;
    let info = sim.describe_type(type_name)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("{} ({}) - {}", info.type_name, info.cqs, info.description);
    println!("\nPorts:");
    for p in &info.ports {
        let required = if p.required { "" } else { " (optional)" };
        println!("  {:<8} {:?} {}{}", p.name, p.kind, p.node_type, required);
    }
    println!("\nParameters:");
    for p in &info.parameters {
        let unit = if p.unit.is_empty() { "-" } else { p.unit };
        println!(
            "  {:<10} {:>12} [{}]  {}",
            p.name, p.default, unit, p.description
        );
    }
    Ok(())
}

fn cmd_demos() -> AppResult<()> {
    println!("Demo models:");
    for demo in Demo::ALL {
        let (dt, t_end) = demo.timing();
        println!(
            "  {:<14} dt={:<8} t_end={:<5} {}",
            demo.name(),
            dt,
            t_end,
            demo.description()
        );
    }
    Ok(())
}

fn cmd_run(args: &RunArgs) -> AppResult<()> {
    let demo: Demo = args.demo.parse()?;
    let (default_dt, default_t_end) = demo.timing();
    let dt = args.dt.unwrap_or(default_dt);
    let t_end = args.t_end.unwrap_or(default_t_end);

    let mut config = match &args.config {
        Some(path) => load_sim_config(path)?,
        None => SimConfig::default(),
    };
    if let Some(threads) = args.threads {
        config.threads = threads;
        config.multicore = threads > 1;
    }

    let columns = if args.columns.is_empty() {
        demo.columns()
    } else {
        args.columns
            .iter()
            .map(|c| c.parse())
            .collect::<AppResult<Vec<Column>>>()?
    };

    let mut sim = build_demo(demo)?;
    sim.apply_assignments(args.assignments.iter().map(String::as_str))?;

    if !args.json {
        println!("Running demo: {}", demo.name());
        println!("  dt = {dt} s, t_end = {t_end} s");
    }
    sim.initialize(0.0, dt, t_end, &config)?;
    let handle = sim.simulate_in_background()?;
    while !handle.is_finished() {
        if !args.json {
            render_cli_progress(&handle.progress());
        }
        thread::sleep(Duration::from_millis(100));
    }
    let report = handle.wait()?;
    if !args.json {
        clear_progress_line();
    }

    for message in sim.messages() {
        tracing::debug!("{message}");
    }

    let summary = sim.with_generation(None, query::summarize)??;
    if args.json {
        let out = serde_json::json!({ "report": report, "summary": summary });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_report(&report);
        println!(
            "  Time range: {:.4} - {:.4} s ({} samples)",
            summary.time_range.0, summary.time_range.1, summary.sample_count
        );
        println!("  Ports: {}", summary.port_count);
    }

    let csv = sim.with_generation(None, |g| query::to_csv(g, &columns))??;
    match &args.output {
        Some(path) => write_csv(path, &csv, columns.len(), args.json)?,
        None if !args.json => print_final_values(&csv, &columns),
        None => {}
    }
    sim.finalize()?;

    if report.is_completed() {
        Ok(())
    } else {
        Err(AppError::InvalidInput(format!("run ended: {}", report.status)))
    }
}

fn write_csv(path: &Path, csv: &str, columns: usize, quiet: bool) -> AppResult<()> {
    std::fs::write(path, csv)?;
    if !quiet {
        println!("✓ Exported {columns} series to {}", path.display());
    }
    Ok(())
}

fn print_final_values(csv: &str, columns: &[Column]) {
    let Some(last) = csv.lines().last() else {
        return;
    };
    println!("\nFinal values:");
    for (column, value) in columns.iter().zip(last.split(',').skip(1)) {
        println!("  {column:<32} {value}");
    }
}

fn print_report(report: &RunReport) {
    let mark = if report.is_completed() { "✓" } else { "✗" };
    println!("{mark} Simulation {}", report.status);
    println!(
        "  Steps: {}/{}  final t = {:.4} s  wall = {:.3} s",
        report.steps_completed, report.total_steps, report.final_time, report.wall_time_s
    );
    if let Some(generation) = report.generation {
        println!("  Generation: {generation}");
    }
}

fn clear_progress_line() {
    print!("\r{}\r", " ".repeat(100));
    let _ = io::stdout().flush();
}

fn render_cli_progress(progress: &Progress) {
    let width = 28usize;
    let filled = ((progress.fraction * width as f64).round() as usize).min(width);
    let bar = format!(
        "{}{}",
        "#".repeat(filled),
        "-".repeat(width.saturating_sub(filled))
    );
    print!(
        "\r[{}] {:>6.2}%  t={:.4}s  step={}/{}",
        bar,
        progress.fraction * 100.0,
        progress.time,
        progress.step,
        progress.total_steps
    );
    let _ = io::stdout().flush();
}
