//! Plant simulation engine
//!
//! `PlantEngine` advances the CVCS/inventory core by one timestep in a fixed
//! order: properties, flow decision (controller or regime authority), boron,
//! pre-solver delta, integrator, pressurizer surge, VCT, BRS, audit. It holds no
//! locks; `PlantSimulator` wraps it for shared use and publishes an immutable
//! snapshot after every completed step.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::audit::InventoryAudit;
use crate::authority::{FixedLineupAuthority, RegimeAuthority};
use crate::brs::{BrsInputs, BrsState};
use crate::config::SimConfig;
use crate::cvcs::{self, ControllerState, CvcsInputs, CvcsOutput};
use crate::error::{PropertyError, SimError};
use crate::inventory::{
    self, gal_to_lbm, InventoryUpdate, PlantRegime, PlantThermalState, PreAppliedDelta,
};
use crate::orifice::{OrificeEvent, OrificeLineupState};
use crate::vct::{MakeupSettlement, VctFlows, VctState};
use crate::water_props;

/// Orifice events kept in the published snapshot
pub const EVENT_LOG_LEN: usize = 64;

/// Conditions at simulation start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InitialConditions {
    /// Water-solid pressurizer
    Solid { temp_f: f64, pressure_psia: f64 },
    /// Saturated pressurizer at the given level
    TwoPhase {
        temp_f: f64,
        pressure_psia: f64,
        level_pct: f64,
    },
}

impl InitialConditions {
    /// Cold shutdown, solid plant at 320 psig.
    pub fn cold_shutdown() -> Self {
        InitialConditions::Solid {
            temp_f: 150.0,
            pressure_psia: 334.7,
        }
    }

    pub fn regime(&self) -> PlantRegime {
        match self {
            InitialConditions::Solid { .. } => PlantRegime::SolidPlant,
            InitialConditions::TwoPhase { .. } => PlantRegime::TwoPhase,
        }
    }
}

/// Per-step inputs from the regime authority or prior-step physics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepInputs {
    pub regime: PlantRegime,
    pub rcs_temp_f: f64,
    pub pressure_psia: f64,
    pub rcp_count: u32,
    pub dt_hr: f64,
}

impl StepInputs {
    fn validate(&self) -> Result<(), SimError> {
        if !(self.dt_hr.is_finite() && self.dt_hr > 0.0) {
            return Err(SimError::InvalidInput(format!("timestep {} hr", self.dt_hr)));
        }
        if !self.rcs_temp_f.is_finite() {
            return Err(SimError::InvalidInput(format!("RCS temperature {}", self.rcs_temp_f)));
        }
        if !(self.pressure_psia.is_finite() && self.pressure_psia > 0.0) {
            return Err(SimError::InvalidInput(format!("pressure {} psia", self.pressure_psia)));
        }
        Ok(())
    }
}

/// Alarm conditions for the annunciator layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmFlags {
    pub vct_low_level: bool,
    pub vct_high_level: bool,
    pub divert_active: bool,
    pub makeup_active: bool,
    pub makeup_from_brs: bool,
    pub raw_source_suction: bool,
    pub letdown_isolated: bool,
    pub seal_injection_low: bool,
    pub charging_limited: bool,
    pub brs_holdup_high: bool,
    pub inventory_error: bool,
    pub property_fault: bool,
}

/// Everything consumers may read about one completed step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlantSnapshot {
    pub time_hr: f64,
    pub step_count: u64,
    pub regime: PlantRegime,
    pub thermal: PlantThermalState,
    pub cvcs: CvcsOutput,
    pub integrator: InventoryUpdate,
    pub lineup: OrificeLineupState,
    pub lineup_description: String,
    pub vct: VctState,
    pub brs: BrsState,
    pub audit: InventoryAudit,
    pub alarms: AlarmFlags,
    pub alerts: Vec<String>,
    pub orifice_events: Vec<OrificeEvent>,
    /// Saturation temperature minus RCS temperature [°F]
    pub subcooling_margin_f: Option<f64>,
    /// Specific enthalpy of the RCS coolant [Btu/lbm]
    pub rcs_enthalpy_btu_lbm: Option<f64>,
}

/// Last good property values, held when the provider fails.
#[derive(Debug, Clone, Copy)]
struct PropertyCache {
    rcs_density: f64,
    sat_liquid_density: f64,
    sat_vapor_density: f64,
}

/// Single-writer simulation engine.
pub struct PlantEngine {
    cfg: SimConfig,
    time_hr: f64,
    step_count: u64,
    regime: PlantRegime,
    thermal: PlantThermalState,
    controller: ControllerState,
    lineup: OrificeLineupState,
    vct: VctState,
    brs: BrsState,
    audit: InventoryAudit,
    authority: Box<dyn RegimeAuthority>,
    pending_delta: Option<PreAppliedDelta>,
    events: VecDeque<OrificeEvent>,
    properties: PropertyCache,
    property_fault: bool,
    last_cvcs: CvcsOutput,
    last_update: InventoryUpdate,
    alarms: AlarmFlags,
    alerts: Vec<String>,
    subcooling_margin_f: Option<f64>,
    rcs_enthalpy_btu_lbm: Option<f64>,
    /// Set by the first step that leaves non-finite state behind
    corrupted: Option<String>,
}

impl PlantEngine {
    pub fn new(cfg: SimConfig, initial: InitialConditions) -> Result<Self, SimError> {
        cfg.validate()?;
        let thermal = match initial {
            InitialConditions::Solid { temp_f, pressure_psia } => {
                PlantThermalState::solid(&cfg.plant, temp_f, pressure_psia)?
            }
            InitialConditions::TwoPhase {
                temp_f,
                pressure_psia,
                level_pct,
            } => PlantThermalState::two_phase(&cfg.plant, temp_f, pressure_psia, level_pct)?,
        };
        let properties = PropertyCache {
            rcs_density: thermal.rcs_density_lbm_ft3,
            sat_liquid_density: water_props::saturated_liquid_density(thermal.pressure_psia)?,
            sat_vapor_density: water_props::saturated_vapor_density(thermal.pressure_psia)?,
        };
        let brs = BrsState::new(&cfg.brs);
        let vct = VctState::new(&cfg.vct, brs.distillate_ready(&cfg.brs))?;
        let audit = InventoryAudit::new(&thermal, &vct, &brs, &cfg.audit);
        let lineup = OrificeLineupState::new(&cfg.orifice);
        let subcooling_margin_f = water_props::saturation_temperature(thermal.pressure_psia)
            .ok()
            .map(|t_sat| t_sat - thermal.rcs_temp_f);
        let rcs_enthalpy_btu_lbm =
            water_props::specific_enthalpy(thermal.rcs_temp_f, thermal.pressure_psia).ok();

        log::info!(
            "plant engine initialized: {:?}, {:.1} F, {:.1} psia, pressurizer {:.1}%",
            initial.regime(),
            thermal.rcs_temp_f,
            thermal.pressure_psia,
            thermal.pzr_level_pct
        );

        Ok(Self {
            cfg,
            time_hr: 0.0,
            step_count: 0,
            regime: initial.regime(),
            thermal,
            controller: ControllerState::default(),
            lineup,
            vct,
            brs,
            audit,
            authority: Box::new(FixedLineupAuthority),
            pending_delta: None,
            events: VecDeque::with_capacity(EVENT_LOG_LEN),
            properties,
            property_fault: false,
            last_cvcs: CvcsOutput::default(),
            last_update: InventoryUpdate::default(),
            alarms: AlarmFlags::default(),
            alerts: Vec::new(),
            subcooling_margin_f,
            rcs_enthalpy_btu_lbm,
            corrupted: None,
        })
    }

    /// Replace the default fixed-lineup authority.
    pub fn with_authority(mut self, authority: Box<dyn RegimeAuthority>) -> Self {
        self.authority = authority;
        self
    }

    pub fn config(&self) -> &SimConfig {
        &self.cfg
    }

    pub fn time_hr(&self) -> f64 {
        self.time_hr
    }

    pub fn regime(&self) -> PlantRegime {
        self.regime
    }

    pub fn thermal(&self) -> &PlantThermalState {
        &self.thermal
    }

    pub fn vct(&self) -> &VctState {
        &self.vct
    }

    pub fn brs(&self) -> &BrsState {
        &self.brs
    }

    pub fn audit(&self) -> &InventoryAudit {
        &self.audit
    }

    /// Why the engine stopped accepting steps, if it has.
    pub fn corruption(&self) -> Option<&str> {
        self.corrupted.as_deref()
    }

    pub fn has_pending_delta(&self) -> bool {
        self.pending_delta.is_some()
    }

    /// Hand the pre-solver stage a mass delta to apply on the next step.
    ///
    /// The delta replaces the integrator's (or the authority's) own RCS mass change
    /// for that step. A second submission before the first is consumed would apply
    /// the same drain twice: fatal in debug builds, logged and rejected otherwise.
    pub fn submit_pre_applied_delta(&mut self, delta: PreAppliedDelta) -> Result<(), SimError> {
        if let Some(pending) = &self.pending_delta {
            let msg = format!(
                "pre-applied delta of {:+.1} lbm submitted while {:+.1} lbm is still pending",
                delta.mass_lbm(),
                pending.mass_lbm()
            );
            debug_assert!(false, "{msg}");
            log::error!("{msg}; rejected");
            return Err(SimError::InvariantViolation(msg));
        }
        self.pending_delta = Some(delta);
        Ok(())
    }

    fn hold_property(
        result: Result<f64, PropertyError>,
        last: &mut f64,
        fault: &mut bool,
        what: &str,
    ) -> f64 {
        match result {
            Ok(value) => {
                *last = value;
                value
            }
            Err(e) => {
                if !*fault {
                    log::warn!("{what} unavailable ({e}), holding {:.3}", *last);
                }
                *fault = true;
                *last
            }
        }
    }

    /// Advance one timestep.
    ///
    /// Once a step has left non-finite state behind, every later call returns
    /// [`SimError::Corrupted`] without touching the state.
    pub fn advance(&mut self, inputs: &StepInputs) -> Result<PlantSnapshot, SimError> {
        if let Some(reason) = &self.corrupted {
            return Err(SimError::Corrupted(reason.clone()));
        }
        inputs.validate()?;
        let cfg = &self.cfg;
        let dt_hr = inputs.dt_hr;
        let dt_min = dt_hr * 60.0;

        if inputs.regime != self.regime {
            log::info!(
                "regime change {:?} -> {:?} at t = {:.3} hr (pressurizer {:.1}%)",
                self.regime,
                inputs.regime,
                self.time_hr,
                self.thermal.pzr_level_pct
            );
            self.regime = inputs.regime;
        }
        let regime = self.regime;
        self.thermal.rcs_temp_f = inputs.rcs_temp_f;
        self.thermal.pressure_psia = inputs.pressure_psia;

        // properties, holding the last good value on failure
        let mut fault = false;
        let rho = Self::hold_property(
            water_props::liquid_density(inputs.rcs_temp_f, inputs.pressure_psia),
            &mut self.properties.rcs_density,
            &mut fault,
            "RCS density",
        );
        let (rho_l, rho_v) = if regime.has_bubble() {
            let rho_l = Self::hold_property(
                water_props::saturated_liquid_density(inputs.pressure_psia),
                &mut self.properties.sat_liquid_density,
                &mut fault,
                "saturated liquid density",
            );
            let rho_v = Self::hold_property(
                water_props::saturated_vapor_density(inputs.pressure_psia),
                &mut self.properties.sat_vapor_density,
                &mut fault,
                "saturated vapour density",
            );
            (rho_l, rho_v)
        } else {
            (self.properties.sat_liquid_density, self.properties.sat_vapor_density)
        };
        if self.property_fault && !fault {
            log::info!("water property provider recovered");
        }
        self.property_fault = fault;
        self.thermal.rcs_density_lbm_ft3 = rho;
        self.subcooling_margin_f = water_props::saturation_temperature(inputs.pressure_psia)
            .ok()
            .map(|t_sat| t_sat - inputs.rcs_temp_f);
        self.rcs_enthalpy_btu_lbm =
            water_props::specific_enthalpy(inputs.rcs_temp_f, inputs.pressure_psia).ok();

        let setpoint = cfg.level_program.setpoint(inputs.rcs_temp_f);

        // flow decision
        let (cvcs_out, authority_delta) = if regime.authority_owned() {
            let cmd = self
                .authority
                .command(regime, &self.thermal, inputs.rcp_count, dt_hr, cfg);
            log::trace!(
                "{} authority: charging {:.1} gpm, letdown {:.1} gpm",
                self.authority.name(),
                cmd.charging_gpm,
                cmd.letdown_gpm
            );
            let out = CvcsOutput {
                charging_gpm: cmd.charging_gpm,
                charging_to_rcs_gpm: cmd.charging_gpm - cmd.seals.injection_gpm,
                seals: cmd.seals,
                seal_injection_ok: cvcs::seal_injection_adequate(
                    inputs.rcp_count,
                    cmd.seals.injection_gpm,
                    cfg.seals.injection_per_pump_gpm,
                ),
                letdown_gpm: cmd.letdown_gpm,
                letdown_isolated: false,
                letdown_path: Some(cvcs::select_letdown_path(
                    inputs.rcs_temp_f,
                    inputs.pressure_psia,
                    false,
                    &cfg.letdown,
                )),
                level_setpoint_pct: setpoint,
                level_error_pct: self.thermal.pzr_level_pct - setpoint,
                charging_limited: false,
            };
            (out, Some(PreAppliedDelta::new(cmd.rcs_mass_delta_lbm)))
        } else {
            if let Some(event) =
                self.lineup
                    .evaluate(self.thermal.pzr_level_pct, setpoint, self.time_hr, &cfg.orifice)
            {
                if self.events.len() == EVENT_LOG_LEN {
                    self.events.pop_front();
                }
                self.events.push_back(event);
            }
            let cvcs_inputs = CvcsInputs {
                level_pct: self.thermal.pzr_level_pct,
                program_temp_f: inputs.rcs_temp_f,
                rcs_temp_f: inputs.rcs_temp_f,
                pressure_psia: inputs.pressure_psia,
                rcs_density_lbm_ft3: rho,
                rcp_count: inputs.rcp_count,
                dt_hr,
            };
            (self.controller.compute(&cvcs_inputs, &self.lineup, cfg), None)
        };

        // boron: charging header water mixes into the pre-step inventory
        let charging_ppm = self.vct.charging_boron_ppm(&cfg.vct);
        let rcs_inflow_gal = (cvcs_out.charging_to_rcs_gpm + cvcs_out.seals.inleakage_gpm) * dt_min;
        inventory::mix_rcs_boron(&mut self.thermal, gal_to_lbm(rcs_inflow_gal, rho), charging_ppm);

        // pre-solver: a host-submitted delta takes the place of the authority's
        let token = match (self.pending_delta.take(), authority_delta) {
            (Some(host), Some(own)) => {
                log::debug!(
                    "host drain adjustment {:+.1} lbm supersedes authority delta {:+.1} lbm",
                    host.mass_lbm(),
                    own.mass_lbm()
                );
                Some(host)
            }
            (host, own) => host.or(own),
        };
        let receipt = token.map(|delta| delta.apply(&mut self.thermal));

        let update = inventory::integrate(
            &mut self.thermal,
            cvcs_out.net_to_rcs_gpm(),
            rho,
            dt_hr,
            regime,
            receipt,
        );
        if let Some(gal) = update.forwarded_gal {
            self.vct.record_rcs_change(gal);
        }

        if regime.has_bubble() {
            let insurge =
                inventory::redistribute_surge(&mut self.thermal, &cfg.plant, rho_l, rho_v);
            log::trace!("surge {insurge:+.1} lbm, pressurizer {:.2}%", self.thermal.pzr_level_pct);
        }

        // VCT, then BRS, then settle makeup
        let rcs_ppm = self.thermal.rcs_boron_ppm;
        let flows = VctFlows {
            letdown_lbm: gal_to_lbm(cvcs_out.letdown_gpm * dt_min, rho),
            letdown_ppm: rcs_ppm,
            charging_lbm: gal_to_lbm(cvcs_out.charging_gpm * dt_min, rho),
            seal_return_lbm: gal_to_lbm(cvcs_out.seals.return_to_vct_gpm * dt_min, rho),
            seal_return_ppm: charging_ppm,
            cbo_loss_lbm: gal_to_lbm(cvcs_out.seals.cbo_loss_gpm * dt_min, rho),
        };
        let report = self.vct.update(&flows, rcs_ppm, dt_hr, &cfg.vct);

        let brs_inputs = BrsInputs {
            divert_gal: report.divert_gal,
            divert_ppm: report.divert_ppm,
            makeup_request_gal: report.brs_request_gal,
        };
        let withdrawn = self.brs.update(&brs_inputs, self.time_hr, dt_hr, &cfg.brs);
        let settlement = MakeupSettlement {
            requested_gal: report.brs_request_gal,
            withdrawn_gal: withdrawn,
            distillate_ppm: self.brs.distillate_ppm,
        };
        let distillate_ready = self.brs.distillate_ready(&cfg.brs);
        self.vct
            .complete_makeup(settlement, rcs_ppm, distillate_ready, &cfg.vct);

        self.audit.update(&self.thermal, &self.vct, &self.brs);

        self.last_cvcs = cvcs_out;
        self.last_update = update;
        if let Err(e) = self.check_finite() {
            if let SimError::Corrupted(reason) = &e {
                log::error!("engine corrupted: {reason}");
                self.corrupted = Some(reason.clone());
            }
            return Err(e);
        }

        self.time_hr += dt_hr;
        self.step_count += 1;
        self.refresh_alarms();
        Ok(self.snapshot())
    }

    fn check_finite(&self) -> Result<(), SimError> {
        let t = &self.thermal;
        let values = [
            ("RCS mass", t.rcs_mass_lbm),
            ("pressurizer water", t.pzr_water_mass_lbm),
            ("pressurizer steam", t.pzr_steam_mass_lbm),
            ("pressurizer level", t.pzr_level_pct),
            ("RCS boron", t.rcs_boron_ppm),
            ("charging", self.last_cvcs.charging_gpm),
            ("letdown", self.last_cvcs.letdown_gpm),
            ("VCT mass", self.vct.mass_lbm),
            ("VCT boron", self.vct.boron_ppm),
            ("BRS holdup", self.brs.holdup_gal),
            ("audit total", self.audit.total_lbm),
        ];
        for (name, value) in values {
            if !value.is_finite() {
                return Err(SimError::Corrupted(format!(
                    "{name} is {value} at t = {:.4} hr",
                    self.time_hr
                )));
            }
        }
        Ok(())
    }

    fn refresh_alarms(&mut self) {
        let cvcs = &self.last_cvcs;
        self.alarms = AlarmFlags {
            vct_low_level: self.vct.low_level_alarm,
            vct_high_level: self.vct.high_level_alarm,
            divert_active: self.vct.divert_active,
            makeup_active: self.vct.makeup_active,
            makeup_from_brs: self.vct.makeup_from_brs(),
            raw_source_suction: self.vct.rwst_suction_active,
            letdown_isolated: cvcs.letdown_isolated,
            seal_injection_low: !cvcs.seal_injection_ok,
            charging_limited: cvcs.charging_limited,
            brs_holdup_high: self.brs.holdup_high_alarm,
            inventory_error: self.audit.alarm,
            property_fault: self.property_fault,
        };

        let a = &self.alarms;
        let mut alerts = Vec::new();
        if a.vct_low_level {
            alerts.push(format!("WARNING: VCT level low ({:.1}%)", self.vct.level_pct));
        }
        if a.vct_high_level {
            alerts.push(format!("WARNING: VCT level high ({:.1}%)", self.vct.level_pct));
        }
        if a.raw_source_suction {
            alerts.push("WARNING: Charging suction on RWST".to_string());
        }
        if a.letdown_isolated {
            alerts.push("WARNING: Letdown isolated on low pressurizer level".to_string());
        }
        if a.seal_injection_low {
            alerts.push(format!(
                "WARNING: RCP seal injection low ({:.1} gpm)",
                cvcs.seals.injection_gpm
            ));
        }
        if a.charging_limited {
            alerts.push(format!("WARNING: Charging at pump limit ({:.1} gpm)", cvcs.charging_gpm));
        }
        if a.brs_holdup_high {
            alerts.push(format!(
                "WARNING: BRS holdup high ({:.0} gal, {:.1}%)",
                self.brs.holdup_gal, self.brs.holdup_level_pct
            ));
        }
        if a.inventory_error {
            alerts.push(format!(
                "CRITICAL: Inventory audit error {:.2} gal exceeds {:.2} gal",
                self.audit.error_gal, self.audit.tolerance_gal
            ));
        }
        if a.property_fault {
            alerts.push("CRITICAL: Water property fault, holding last good values".to_string());
        }
        self.alerts = alerts;
    }

    /// Build an immutable snapshot of the current state.
    pub fn snapshot(&self) -> PlantSnapshot {
        PlantSnapshot {
            time_hr: self.time_hr,
            step_count: self.step_count,
            regime: self.regime,
            thermal: self.thermal.clone(),
            cvcs: self.last_cvcs.clone(),
            integrator: self.last_update,
            lineup: self.lineup.clone(),
            lineup_description: self.lineup.describe(&self.cfg.letdown),
            vct: self.vct.clone(),
            brs: self.brs.clone(),
            audit: self.audit.clone(),
            alarms: self.alarms.clone(),
            alerts: self.alerts.clone(),
            orifice_events: self.events.iter().cloned().collect(),
            subcooling_margin_f: self.subcooling_margin_f,
            rcs_enthalpy_btu_lbm: self.rcs_enthalpy_btu_lbm,
        }
    }
}

/// Shared simulator: one engine, one published snapshot.
pub struct PlantSimulator {
    engine: Mutex<PlantEngine>,
    snapshot: Mutex<Arc<PlantSnapshot>>,
    corrupted: Mutex<Option<String>>,
    initial: InitialConditions,
}

impl PlantSimulator {
    pub fn new(cfg: SimConfig, initial: InitialConditions) -> Result<Self, SimError> {
        Ok(Self::from_engine(PlantEngine::new(cfg, initial)?, initial))
    }

    pub fn from_engine(engine: PlantEngine, initial: InitialConditions) -> Self {
        let snapshot = Arc::new(engine.snapshot());
        Self {
            engine: Mutex::new(engine),
            snapshot: Mutex::new(snapshot),
            corrupted: Mutex::new(None),
            initial,
        }
    }

    fn lock_engine(&self) -> Result<MutexGuard<'_, PlantEngine>, SimError> {
        if let Some(reason) = self.corruption() {
            return Err(SimError::Corrupted(reason));
        }
        self.engine.lock().map_err(|_| {
            let reason = "engine lock poisoned by a failed step".to_string();
            self.mark_corrupted(&reason);
            SimError::Corrupted(reason)
        })
    }

    fn mark_corrupted(&self, reason: &str) {
        log::error!("simulator corrupted: {reason}");
        let mut corrupted = self.corrupted.lock().unwrap_or_else(|p| p.into_inner());
        corrupted.get_or_insert_with(|| reason.to_string());
    }

    pub fn corruption(&self) -> Option<String> {
        self.corrupted.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn is_corrupted(&self) -> bool {
        self.corruption().is_some()
    }

    /// Perform one simulation step and publish its snapshot.
    pub fn step(&self, inputs: &StepInputs) -> Result<Arc<PlantSnapshot>, SimError> {
        let mut engine = self.lock_engine()?;
        match engine.advance(inputs) {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                *self.snapshot.lock().unwrap_or_else(|p| p.into_inner()) = Arc::clone(&snapshot);
                Ok(snapshot)
            }
            Err(SimError::Corrupted(reason)) => {
                self.mark_corrupted(&reason);
                Err(SimError::Corrupted(reason))
            }
            // rejected before any state was touched
            Err(e) => Err(e),
        }
    }

    /// Latest published snapshot.
    pub fn get_snapshot(&self) -> Arc<PlantSnapshot> {
        Arc::clone(&self.snapshot.lock().unwrap_or_else(|p| p.into_inner()))
    }

    /// Submit a pre-solver drain adjustment for the next step.
    pub fn submit_drain_adjustment(&self, mass_lbm: f64) -> Result<(), SimError> {
        let mut engine = self.lock_engine()?;
        engine.submit_pre_applied_delta(PreAppliedDelta::new(mass_lbm))
    }

    pub fn get_config(&self) -> Result<SimConfig, SimError> {
        Ok(self.lock_engine()?.config().clone())
    }

    /// Reset to the initial conditions with the default authority.
    pub fn reset(&self) -> Result<(), SimError> {
        let cfg = {
            let engine = self.engine.lock().unwrap_or_else(|p| p.into_inner());
            engine.config().clone()
        };
        let engine = PlantEngine::new(cfg, self.initial)?;
        let snapshot = Arc::new(engine.snapshot());
        *self.engine.lock().unwrap_or_else(|p| p.into_inner()) = engine;
        *self.snapshot.lock().unwrap_or_else(|p| p.into_inner()) = snapshot;
        *self.corrupted.lock().unwrap_or_else(|p| p.into_inner()) = None;
        log::info!("simulation reset");
        Ok(())
    }
}
