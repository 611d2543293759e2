use approx::assert_relative_eq;

use pwr_heatup_simulator_lib::cvcs::LetdownPath;
use pwr_heatup_simulator_lib::inventory::SkipReason;
use pwr_heatup_simulator_lib::orifice::OrificeAction;
use pwr_heatup_simulator_lib::scenario::{
    self, FixedScenario, HeatupPhase, HeatupScenario, Scenario,
};
use pwr_heatup_simulator_lib::{
    PlantEngine, PlantRegime, PlantSimulator, PlantSnapshot, SimConfig, SimulatorHandle,
};

const DT_HR: f64 = 10.0 / 3600.0;

fn run_fixed(cfg: SimConfig, mut scenario: FixedScenario, hours: f64) -> Vec<PlantSnapshot> {
    let mut engine = PlantEngine::new(cfg, scenario.initial_conditions()).expect("engine");
    let mut history = vec![engine.snapshot()];
    scenario::run(&mut engine, &mut scenario, hours, DT_HR, |snap| {
        history.push(snap.clone())
    })
    .expect("run");
    history
}

#[test]
fn solid_plant_lineup_stays_balanced() {
    let history = run_fixed(SimConfig::default(), FixedScenario::solid_plant(), 1.0);
    let initial_mass = history[0].thermal.rcs_mass_lbm;

    for snap in &history[1..] {
        assert_eq!(snap.regime, PlantRegime::SolidPlant);
        assert_relative_eq!(snap.cvcs.charging_gpm, 75.0);
        assert_relative_eq!(snap.cvcs.letdown_gpm, 75.0);
        assert!(!snap.cvcs.letdown_isolated);
        assert_eq!(snap.cvcs.letdown_path, Some(LetdownPath::RhrCrossconnect));
        assert_eq!(snap.integrator.skipped, Some(SkipReason::AuthorityOwned));
        assert_relative_eq!(snap.thermal.pzr_level_pct, 100.0);
    }
    let last = history.last().expect("history");
    assert_relative_eq!(last.thermal.rcs_mass_lbm, initial_mass, max_relative = 1e-12);
    assert!(last.orifice_events.is_empty());
    assert!(!last.audit.ever_exceeded);
}

#[test]
fn charging_tracks_letdown_as_level_returns_to_program() {
    let cfg = SimConfig::default();
    let setpoint = cfg.level_program.setpoint(557.0);
    let history = run_fixed(cfg, FixedScenario::two_phase(setpoint + 10.0), 0.5);

    let gap = |snap: &PlantSnapshot| {
        (snap.cvcs.charging_gpm - (snap.cvcs.letdown_gpm + snap.cvcs.seals.leakoff_gpm())).abs()
    };
    let first = &history[1];
    let last = history.last().expect("history");

    // one action per evaluation: the small orifice opens on the first step only
    assert_eq!(first.orifice_events.len(), 1);
    assert_eq!(first.orifice_events[0].action, OrificeAction::OpenSmall);
    assert!(last.orifice_events.iter().all(|e| e.action != OrificeAction::OpenSecondLarge));
    assert!(
        last.lineup.small_open
            || last.orifice_events.iter().any(|e| e.action == OrificeAction::CloseSmall)
    );

    assert!(first.cvcs.charging_gpm < first.cvcs.letdown_gpm);
    assert!(gap(last) < gap(first), "gap {} -> {}", gap(first), gap(last));
    assert!(last.cvcs.level_error_pct > 0.0 && last.cvcs.level_error_pct < 10.0);
    assert!(last.alarms.divert_active || last.vct.level_pct > history[0].vct.level_pct);
}

#[test]
fn low_level_isolates_letdown_until_reset_band() {
    let cfg = SimConfig::default();
    let reset_pct = cfg.letdown.isolation_level_pct + cfg.letdown.isolation_hysteresis_pct;
    let history = run_fixed(cfg, FixedScenario::two_phase(16.0), 1.0);

    assert!(history[1].cvcs.letdown_isolated);
    assert!(history[1].alarms.letdown_isolated);
    assert_eq!(history[1].cvcs.letdown_path, Some(LetdownPath::Isolated));

    let restored = history
        .iter()
        .skip(1)
        .position(|s| !s.cvcs.letdown_isolated)
        .map(|i| i + 1)
        .expect("letdown restored within the hour");
    for snap in &history[1..restored] {
        assert_eq!(snap.cvcs.letdown_gpm, 0.0);
    }
    // isolation is judged on the level at the start of the step
    assert!(history[restored - 1].thermal.pzr_level_pct > reset_pct);
    assert!(history[restored - 2].thermal.pzr_level_pct <= reset_pct);
    assert!(history[restored].cvcs.letdown_gpm > 0.0);
    assert!(history[restored..].iter().all(|s| !s.cvcs.letdown_isolated));
}

#[test]
fn seal_injection_alarm_follows_pump_capacity() {
    let scenario = FixedScenario::two_phase(25.0).with_rcp_count(4);
    let history = run_fixed(SimConfig::default(), scenario, 0.1);
    let last = history.last().expect("history");
    assert!(last.cvcs.seal_injection_ok);
    assert_relative_eq!(last.cvcs.seals.injection_gpm, 28.0);
    assert!(!last.alarms.seal_injection_low);

    let mut cfg = SimConfig::default();
    cfg.charging.max_gpm = 20.0;
    let history = run_fixed(cfg, FixedScenario::two_phase(25.0).with_rcp_count(4), 0.1);
    let last = history.last().expect("history");
    assert!(!last.cvcs.seal_injection_ok);
    assert!(last.alarms.seal_injection_low);
    assert!(last.alarms.charging_limited);
    assert!(last.alerts.iter().any(|a| a.contains("seal injection low")));
}

#[test]
fn heatup_to_hot_standby_keeps_level_and_seal_injection() {
    let cfg = SimConfig::default();
    let isolation_pct = cfg.letdown.isolation_level_pct;
    let mut scenario = HeatupScenario::default();
    let mut engine = PlantEngine::new(cfg, scenario.initial_conditions()).expect("engine");
    let dt_hr = 30.0 / 3600.0;

    let mut two_phase_steps = 0;
    let mut max_error = f64::MIN;
    let mut min_level = f64::MAX;
    let mut at_no_load: Option<f64> = None;
    let mut settled_error = 0.0_f64;
    let last = scenario::run(&mut engine, &mut scenario, 20.0, dt_hr, |snap| {
        if snap.regime != PlantRegime::TwoPhase {
            return;
        }
        two_phase_steps += 1;
        let level = snap.thermal.pzr_level_pct;
        assert!(snap.cvcs.seal_injection_ok, "seal injection low at t = {:.2} hr", snap.time_hr);
        assert!(snap.cvcs.seals.injection_gpm >= 28.0 - 1e-9);
        assert!(!snap.cvcs.letdown_isolated, "letdown isolated at t = {:.2} hr", snap.time_hr);
        assert!(level > isolation_pct, "level {level:.2}% at t = {:.2} hr", snap.time_hr);
        min_level = min_level.min(level);
        max_error = max_error.max(snap.cvcs.level_error_pct);

        if snap.thermal.rcs_temp_f >= 557.0 {
            let since = snap.time_hr - *at_no_load.get_or_insert(snap.time_hr);
            if since > 2.0 {
                settled_error = settled_error.max(snap.cvcs.level_error_pct.abs());
            }
        }
    })
    .expect("run");

    assert_eq!(scenario.phase(), HeatupPhase::TwoPhaseHeatup);
    assert!(two_phase_steps > 1_000, "{two_phase_steps} two-phase steps");
    let reached = at_no_load.expect("hot standby reached");
    assert!(last.time_hr - reached > 4.0, "hot standby at t = {reached:.2} hr");
    assert_relative_eq!(last.thermal.pressure_psia, 2250.0, epsilon = 1e-9);

    // thermal expansion pushes the level above program, the ramp end pulls it back
    assert!(max_error > 3.0 && max_error < 20.0, "peak level error {max_error:.2}%");
    assert!(min_level > isolation_pct + 2.0, "lowest level {min_level:.2}%");
    assert!(settled_error < 3.0, "level error {settled_error:.2}% at hot standby");
    assert!((last.thermal.pzr_level_pct - last.cvcs.level_setpoint_pct).abs() < 1.0);
    assert!(!last.alarms.seal_injection_low);
    assert!(!last.audit.ever_exceeded, "audit error {:.3} gal", last.audit.max_error_gal);
}

#[tokio::test]
async fn heatup_on_worker_reaches_bubble_draw() {
    let mut scenario = HeatupScenario::default();
    let sim =
        PlantSimulator::new(SimConfig::default(), scenario.initial_conditions()).expect("sim");
    let handle = SimulatorHandle::new(sim);
    let dt_hr = 60.0 / 3600.0;

    let mut snapshot = handle.get_snapshot();
    let mut drawing = false;
    for _ in 0..600 {
        let inputs = scenario.next_inputs(&snapshot, dt_hr);
        snapshot = handle.step_on_worker(inputs).await.expect("step").snapshot;
        if snapshot.regime == PlantRegime::PreDrain && snapshot.thermal.pzr_level_pct < 95.0 {
            drawing = true;
            break;
        }
    }

    assert!(drawing, "no bubble after {} steps", snapshot.step_count);
    assert!(snapshot.time_hr > 1.5);
    assert!(snapshot.cvcs.letdown_gpm > snapshot.cvcs.charging_gpm);
    assert!(!snapshot.audit.ever_exceeded, "audit error {:.3} gal", snapshot.audit.max_error_gal);
    assert_eq!(handle.get_snapshot().step_count, snapshot.step_count);
}
