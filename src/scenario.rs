//! Scenario drivers
//!
//! Stand in for the regime authority and the thermal model: each step they look at
//! the last published snapshot and produce the next [`StepInputs`].

use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::inventory::PlantRegime;
use crate::plant::{InitialConditions, PlantEngine, PlantSnapshot, StepInputs};

pub trait Scenario: Send {
    fn name(&self) -> &str;

    fn initial_conditions(&self) -> InitialConditions;

    fn next_inputs(&mut self, last: &PlantSnapshot, dt_hr: f64) -> StepInputs;
}

/// Constant conditions in a single regime.
#[derive(Debug, Clone)]
pub struct FixedScenario {
    name: String,
    initial: InitialConditions,
    rcp_count: u32,
}

impl FixedScenario {
    /// Cold shutdown, water-solid at 320 psig with no RCPs running.
    pub fn solid_plant() -> Self {
        Self {
            name: "solid".to_string(),
            initial: InitialConditions::cold_shutdown(),
            rcp_count: 0,
        }
    }

    /// Hot standby with the pressurizer at `level_pct` and two RCPs running.
    pub fn two_phase(level_pct: f64) -> Self {
        Self {
            name: "two-phase".to_string(),
            initial: InitialConditions::TwoPhase {
                temp_f: 557.0,
                pressure_psia: 2250.0,
                level_pct,
            },
            rcp_count: 2,
        }
    }

    pub fn with_rcp_count(mut self, rcp_count: u32) -> Self {
        self.rcp_count = rcp_count;
        self
    }
}

impl Scenario for FixedScenario {
    fn name(&self) -> &str {
        &self.name
    }

    fn initial_conditions(&self) -> InitialConditions {
        self.initial
    }

    fn next_inputs(&mut self, _last: &PlantSnapshot, dt_hr: f64) -> StepInputs {
        let (rcs_temp_f, pressure_psia) = match self.initial {
            InitialConditions::Solid { temp_f, pressure_psia } => (temp_f, pressure_psia),
            InitialConditions::TwoPhase {
                temp_f,
                pressure_psia,
                ..
            } => (temp_f, pressure_psia),
        };
        StepInputs {
            regime: self.initial.regime(),
            rcs_temp_f,
            pressure_psia,
            rcp_count: self.rcp_count,
            dt_hr,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeatupPhase {
    SolidHeatup,
    BubbleDraw,
    TwoPhaseHeatup,
}

/// Cold shutdown to hot standby.
///
/// Solid-plant heatup at a fixed rate up to the bubble temperature, then the
/// pressurizer is drained to program level at constant temperature, then RCPs
/// start and the plant heats and pressurizes along a straight line in (T, P)
/// to no-load conditions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeatupScenario {
    pub heatup_rate_f_per_hr: f64,
    pub start_temp_f: f64,
    pub solid_pressure_psia: f64,
    pub bubble_temp_f: f64,
    pub no_load_temp_f: f64,
    pub no_load_pressure_psia: f64,
    pub rcp_count: u32,
    /// Bubble draw ends this far above the level setpoint [%]
    pub drain_margin_pct: f64,
    phase: HeatupPhase,
    temp_f: f64,
}

impl Default for HeatupScenario {
    fn default() -> Self {
        Self {
            heatup_rate_f_per_hr: 50.0,
            start_temp_f: 150.0,
            solid_pressure_psia: 334.7,
            bubble_temp_f: 230.0,
            no_load_temp_f: 557.0,
            no_load_pressure_psia: 2250.0,
            rcp_count: 4,
            drain_margin_pct: 0.0,
            phase: HeatupPhase::SolidHeatup,
            temp_f: 150.0,
        }
    }
}

impl HeatupScenario {
    pub fn phase(&self) -> HeatupPhase {
        self.phase
    }

    fn pressure_for(&self, temp_f: f64) -> f64 {
        let span = self.no_load_temp_f - self.bubble_temp_f;
        if span <= 0.0 {
            return self.no_load_pressure_psia;
        }
        let frac = ((temp_f - self.bubble_temp_f) / span).clamp(0.0, 1.0);
        self.solid_pressure_psia + frac * (self.no_load_pressure_psia - self.solid_pressure_psia)
    }

    fn set_phase(&mut self, phase: HeatupPhase, last: &PlantSnapshot) {
        log::info!(
            "heatup: {:?} -> {:?} at t = {:.2} hr, {:.1} F, pressurizer {:.1}%",
            self.phase,
            phase,
            last.time_hr,
            self.temp_f,
            last.thermal.pzr_level_pct
        );
        self.phase = phase;
    }
}

impl Scenario for HeatupScenario {
    fn name(&self) -> &str {
        "heatup"
    }

    fn initial_conditions(&self) -> InitialConditions {
        InitialConditions::Solid {
            temp_f: self.start_temp_f,
            pressure_psia: self.solid_pressure_psia,
        }
    }

    fn next_inputs(&mut self, last: &PlantSnapshot, dt_hr: f64) -> StepInputs {
        let drained = last.regime == PlantRegime::PreDrain
            && last.thermal.pzr_level_pct <= last.cvcs.level_setpoint_pct + self.drain_margin_pct;
        match self.phase {
            HeatupPhase::SolidHeatup if self.temp_f >= self.bubble_temp_f => {
                self.set_phase(HeatupPhase::BubbleDraw, last);
            }
            HeatupPhase::BubbleDraw if drained => {
                self.set_phase(HeatupPhase::TwoPhaseHeatup, last);
            }
            _ => {}
        }

        let ramp = self.heatup_rate_f_per_hr * dt_hr;
        let (regime, rcp_count) = match self.phase {
            HeatupPhase::SolidHeatup => {
                self.temp_f = (self.temp_f + ramp).min(self.bubble_temp_f);
                (PlantRegime::SolidPlant, 0)
            }
            HeatupPhase::BubbleDraw => (PlantRegime::PreDrain, 0),
            HeatupPhase::TwoPhaseHeatup => {
                self.temp_f = (self.temp_f + ramp).min(self.no_load_temp_f);
                (PlantRegime::TwoPhase, self.rcp_count)
            }
        };

        StepInputs {
            regime,
            rcs_temp_f: self.temp_f,
            pressure_psia: self.pressure_for(self.temp_f),
            rcp_count,
            dt_hr,
        }
    }
}

/// Drive an engine through `hours` of a scenario, calling `on_step` after every step.
pub fn run<F>(
    engine: &mut PlantEngine,
    scenario: &mut dyn Scenario,
    hours: f64,
    dt_hr: f64,
    mut on_step: F,
) -> Result<PlantSnapshot, SimError>
where
    F: FnMut(&PlantSnapshot),
{
    if !(dt_hr.is_finite() && dt_hr > 0.0) {
        return Err(SimError::InvalidInput(format!("timestep {dt_hr} hr")));
    }
    let steps = (hours / dt_hr).round().max(0.0) as u64;
    let mut snapshot = engine.snapshot();
    for _ in 0..steps {
        let inputs = scenario.next_inputs(&snapshot, dt_hr);
        snapshot = engine.advance(&inputs)?;
        on_step(&snapshot);
    }
    Ok(snapshot)
}
