//! PWR Heatup Simulator - Main Entry Point
//!
//! Runs a scenario against the simulator and prints a periodic plant summary.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use pwr_heatup_simulator_lib::scenario::{FixedScenario, HeatupScenario, Scenario};
use pwr_heatup_simulator_lib::{PlantSimulator, PlantSnapshot, SimConfig, SimError, SimulatorHandle};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ScenarioKind {
    /// Cold shutdown through bubble draw to two-phase heatup
    Heatup,
    /// Water-solid plant at cold shutdown
    Solid,
    /// Hot standby, pressurizer 10% above program
    TwoPhase,
}

#[derive(Debug, Parser)]
#[command(
    name = "pwr-heatup-simulator",
    version,
    about = "PWR heatup CVCS and inventory simulator"
)]
struct Args {
    /// Configuration file (TOML, or JSON by extension); default search paths otherwise
    #[arg(long)]
    config: Option<PathBuf>,

    /// Simulated hours to run
    #[arg(long, default_value_t = 12.0)]
    hours: f64,

    /// Timestep [s]
    #[arg(long, default_value_t = 10.0)]
    dt_seconds: f64,

    #[arg(long, value_enum, default_value_t = ScenarioKind::Heatup)]
    scenario: ScenarioKind,

    /// Simulated hours between summaries
    #[arg(long, default_value_t = 0.5)]
    report_every: f64,

    /// Print the final snapshot as JSON
    #[arg(long)]
    json: bool,

    /// Write the effective configuration as TOML and exit
    #[arg(long)]
    dump_config: bool,
}

fn summary(snap: &PlantSnapshot) -> String {
    format!(
        "t={:6.2} hr {:?} T={:5.1} F P={:6.1} psia PZR={:5.1}% (sp {:4.1}) \
         chg={:5.1} ltdn={:5.1} gpm [{}] VCT={:4.1}% BRS={:4.1}% audit={:.3} gal",
        snap.time_hr,
        snap.regime,
        snap.thermal.rcs_temp_f,
        snap.thermal.pressure_psia,
        snap.thermal.pzr_level_pct,
        snap.cvcs.level_setpoint_pct,
        snap.cvcs.charging_gpm,
        snap.cvcs.letdown_gpm,
        snap.lineup_description,
        snap.vct.level_pct,
        snap.brs.holdup_level_pct,
        snap.audit.error_gal,
    )
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let cfg = match &args.config {
        Some(path) => SimConfig::from_path(path)?,
        None => SimConfig::load_or_default()?,
    };
    if args.dump_config {
        println!("{}", cfg.to_toml()?);
        return Ok(());
    }

    let mut scenario: Box<dyn Scenario> = match args.scenario {
        ScenarioKind::Heatup => Box::new(HeatupScenario::default()),
        ScenarioKind::Solid => Box::new(FixedScenario::solid_plant()),
        ScenarioKind::TwoPhase => {
            let level = cfg.level_program.setpoint(557.0) + 10.0;
            Box::new(FixedScenario::two_phase(level))
        }
    };

    let dt_hr = args.dt_seconds / 3600.0;
    if !(dt_hr.is_finite() && dt_hr > 0.0) {
        return Err(SimError::InvalidInput(format!("dt-seconds {}", args.dt_seconds)).into());
    }
    let steps = (args.hours / dt_hr).round().max(0.0) as u64;
    let report_every = ((args.report_every / dt_hr).round() as u64).max(1);

    let simulator = PlantSimulator::new(cfg, scenario.initial_conditions())?;
    let handle = SimulatorHandle::new(simulator);
    log::info!("running scenario '{}' for {} steps", scenario.name(), steps);

    let mut snapshot = handle.get_snapshot();
    if !args.json {
        println!("{}", summary(&snapshot));
    }
    for step in 1..=steps {
        let inputs = scenario.next_inputs(&snapshot, dt_hr);
        snapshot = handle.step_on_worker(inputs).await?.snapshot;
        if !args.json && step % report_every == 0 {
            println!("{}", summary(&snapshot));
            for alert in &snapshot.alerts {
                println!("    {alert}");
            }
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&*snapshot)?);
    } else {
        let audit = &snapshot.audit;
        println!(
            "inventory audit: error {:.3} gal (max {:.3}, tolerance {:.1}) {}",
            audit.error_gal,
            audit.max_error_gal,
            audit.tolerance_gal,
            if audit.ever_exceeded { "EXCEEDED" } else { "PASS" }
        );
        println!("orifice events: {}", snapshot.orifice_events.len());
        println!("BRS batches completed: {}", snapshot.brs.batches.len());
        if let Some(h) = snapshot.rcs_enthalpy_btu_lbm {
            println!("RCS coolant enthalpy: {h:.1} Btu/lbm");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init();

    let args = Args::parse();
    if let Err(err) = run(args).await {
        log::error!("{err}");
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
