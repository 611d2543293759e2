//! Volume Control Tank
//!
//! The tank is tracked as water mass at its own (fixed) temperature; volume and
//! level are derived from that mass. Every leg that crosses the VCT/BRS boundary or
//! the plant boundary is booked in VCT-equivalent gallons so the inventory audit can
//! rebuild the external net flow from this ledger and the BRS ledger alone.

use serde::{Deserialize, Serialize};

use crate::config::VctConfig;
use crate::error::PropertyError;
use crate::inventory::{gal_to_lbm, lbm_to_gal, mix_ppm};
use crate::water_props;

/// Where auto makeup draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MakeupSource {
    BrsDistillate,
    RawWater,
}

/// Water arriving at / leaving the tank this step, as mass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VctFlows {
    pub letdown_lbm: f64,
    pub letdown_ppm: f64,
    /// Charging pump suction
    pub charging_lbm: f64,
    pub seal_return_lbm: f64,
    pub seal_return_ppm: f64,
    /// Controlled bleed-off leaving the system
    pub cbo_loss_lbm: f64,
}

/// Transfers the BRS and the engine act on after [`VctState::update`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VctStepReport {
    /// Letdown sent to BRS holdup [gal]
    pub divert_gal: f64,
    pub divert_ppm: f64,
    /// Distillate requested from the BRS [gal]
    pub brs_request_gal: f64,
    pub raw_makeup_gal: f64,
    /// Supplied from the refuelling water tank, suction swap plus overdraw [gal]
    pub rwst_supplied_gal: f64,
}

/// What the BRS actually delivered against a makeup request.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MakeupSettlement {
    pub requested_gal: f64,
    pub withdrawn_gal: f64,
    pub distillate_ppm: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VctState {
    pub mass_lbm: f64,
    /// Fixed at initialization from the tank temperature
    pub density_lbm_ft3: f64,
    pub volume_gal: f64,
    pub level_pct: f64,
    pub boron_ppm: f64,

    pub divert_active: bool,
    pub divert_gpm: f64,
    pub makeup_active: bool,
    pub makeup_source: MakeupSource,
    pub makeup_gpm: f64,
    /// Charging suction swapped to the refuelling water tank
    pub rwst_suction_active: bool,

    pub external_in_gal: f64,
    pub external_out_gal: f64,
    pub divert_total_gal: f64,
    pub brs_return_total_gal: f64,
    pub raw_makeup_total_gal: f64,
    pub rwst_total_gal: f64,
    pub cbo_total_gal: f64,
    /// RCS inventory change forwarded by the integrator [gal at RCS conditions]
    pub rcs_change_gal: f64,

    pub low_level_alarm: bool,
    pub high_level_alarm: bool,
}

impl VctState {
    pub fn new(cfg: &VctConfig, distillate_ready: bool) -> Result<Self, PropertyError> {
        let density = water_props::liquid_density(cfg.temperature_f, cfg.pressure_psia)?;
        let volume_gal = cfg.capacity_gal * cfg.initial_level_pct / 100.0;
        let mut vct = Self {
            mass_lbm: gal_to_lbm(volume_gal, density),
            density_lbm_ft3: density,
            volume_gal,
            level_pct: cfg.initial_level_pct,
            boron_ppm: cfg.initial_boron_ppm,
            divert_active: false,
            divert_gpm: 0.0,
            makeup_active: false,
            makeup_source: MakeupSource::RawWater,
            makeup_gpm: 0.0,
            rwst_suction_active: false,
            external_in_gal: 0.0,
            external_out_gal: 0.0,
            divert_total_gal: 0.0,
            brs_return_total_gal: 0.0,
            raw_makeup_total_gal: 0.0,
            rwst_total_gal: 0.0,
            cbo_total_gal: 0.0,
            rcs_change_gal: 0.0,
            low_level_alarm: false,
            high_level_alarm: false,
        };
        vct.refresh(cfg);
        vct.evaluate_modes(distillate_ready, cfg);
        Ok(vct)
    }

    fn to_gal(&self, lbm: f64) -> f64 {
        lbm_to_gal(lbm, self.density_lbm_ft3)
    }

    fn to_lbm(&self, gal: f64) -> f64 {
        gal_to_lbm(gal, self.density_lbm_ft3)
    }

    fn add_inflow(&mut self, lbm: f64, ppm: f64) {
        if lbm <= 0.0 {
            return;
        }
        self.boron_ppm = mix_ppm(self.boron_ppm, self.mass_lbm, ppm, lbm);
        self.mass_lbm += lbm;
    }

    fn refresh(&mut self, cfg: &VctConfig) {
        self.volume_gal = self.to_gal(self.mass_lbm);
        self.level_pct = self.volume_gal / cfg.capacity_gal * 100.0;
    }

    /// Boron concentration at the charging pump suction.
    pub fn charging_boron_ppm(&self, cfg: &VctConfig) -> f64 {
        if self.rwst_suction_active {
            cfg.rwst_boron_ppm
        } else {
            self.boron_ppm
        }
    }

    pub fn makeup_from_brs(&self) -> bool {
        self.makeup_active && self.makeup_source == MakeupSource::BrsDistillate
    }

    /// Accumulate the gallon change the integrator applied to the RCS.
    pub fn record_rcs_change(&mut self, gal: f64) {
        self.rcs_change_gal += gal;
    }

    /// Apply this step's CVCS legs and any raw makeup.
    ///
    /// Divert, makeup and suction modes are the ones latched at the end of the
    /// previous step. A BRS makeup is only requested here and settled by
    /// [`VctState::complete_makeup`] once the BRS has run.
    pub fn update(
        &mut self,
        flows: &VctFlows,
        rcs_ppm: f64,
        dt_hr: f64,
        cfg: &VctConfig,
    ) -> VctStepReport {
        let dt_min = dt_hr * 60.0;
        let mut report = VctStepReport::default();

        if self.divert_active {
            report.divert_gal = self.to_gal(flows.letdown_lbm);
            report.divert_ppm = flows.letdown_ppm;
            self.external_out_gal += report.divert_gal;
            self.divert_total_gal += report.divert_gal;
            self.divert_gpm = if dt_min > 0.0 { report.divert_gal / dt_min } else { 0.0 };
        } else {
            self.add_inflow(flows.letdown_lbm, flows.letdown_ppm);
            self.divert_gpm = 0.0;
        }

        self.add_inflow(flows.seal_return_lbm, flows.seal_return_ppm);
        if flows.cbo_loss_lbm > 0.0 {
            let gal = self.to_gal(flows.cbo_loss_lbm);
            self.external_out_gal += gal;
            self.cbo_total_gal += gal;
        }

        if self.rwst_suction_active {
            let gal = self.to_gal(flows.charging_lbm);
            self.external_in_gal += gal;
            self.rwst_total_gal += gal;
            report.rwst_supplied_gal += gal;
        } else {
            self.mass_lbm -= flows.charging_lbm;
        }

        if self.makeup_active {
            let gal = cfg.makeup_gpm * dt_min;
            self.makeup_gpm = cfg.makeup_gpm;
            match self.makeup_source {
                MakeupSource::RawWater => {
                    self.add_raw_makeup(gal, rcs_ppm, cfg);
                    report.raw_makeup_gal = gal;
                }
                MakeupSource::BrsDistillate => report.brs_request_gal = gal,
            }
        } else {
            self.makeup_gpm = 0.0;
        }

        if self.mass_lbm < 0.0 {
            let deficit = self.to_gal(-self.mass_lbm);
            log::warn!("VCT overdrawn by {deficit:.1} gal, deficit supplied from RWST");
            self.mass_lbm = 0.0;
            self.external_in_gal += deficit;
            self.rwst_total_gal += deficit;
            report.rwst_supplied_gal += deficit;
        }

        self.refresh(cfg);
        report
    }

    fn add_raw_makeup(&mut self, gal: f64, rcs_ppm: f64, cfg: &VctConfig) {
        if gal <= 0.0 {
            return;
        }
        let ppm = cfg.raw_makeup_boron_ppm.unwrap_or(rcs_ppm);
        self.add_inflow(self.to_lbm(gal), ppm);
        self.external_in_gal += gal;
        self.raw_makeup_total_gal += gal;
    }

    /// Take in what the BRS returned, make up any shortfall from raw water, and
    /// latch the modes for the next step.
    pub fn complete_makeup(
        &mut self,
        settlement: MakeupSettlement,
        rcs_ppm: f64,
        distillate_ready: bool,
        cfg: &VctConfig,
    ) {
        if settlement.withdrawn_gal > 0.0 {
            self.add_inflow(self.to_lbm(settlement.withdrawn_gal), settlement.distillate_ppm);
            self.external_in_gal += settlement.withdrawn_gal;
            self.brs_return_total_gal += settlement.withdrawn_gal;
        }
        let shortfall = (settlement.requested_gal - settlement.withdrawn_gal).max(0.0);
        if shortfall > 0.0 {
            log::debug!("BRS distillate short by {shortfall:.1} gal, made up from raw water");
            self.add_raw_makeup(shortfall, rcs_ppm, cfg);
        }
        self.refresh(cfg);
        self.evaluate_modes(distillate_ready, cfg);
    }

    /// Threshold/hysteresis decisions on the current level.
    pub fn evaluate_modes(&mut self, distillate_ready: bool, cfg: &VctConfig) {
        let level = self.level_pct;

        if !self.divert_active && level >= cfg.divert_on_pct {
            self.divert_active = true;
            log::info!("VCT divert to BRS on at {level:.1}%");
        } else if self.divert_active && level <= cfg.divert_off_pct {
            self.divert_active = false;
            log::info!("VCT divert to BRS off at {level:.1}%");
        }

        let source = if distillate_ready {
            MakeupSource::BrsDistillate
        } else {
            MakeupSource::RawWater
        };
        if !self.makeup_active && level <= cfg.makeup_start_pct {
            self.makeup_active = true;
            self.makeup_source = source;
            log::info!("VCT auto makeup started at {level:.1}% from {source:?}");
        } else if self.makeup_active && level >= cfg.makeup_stop_pct {
            self.makeup_active = false;
            log::info!("VCT auto makeup stopped at {level:.1}%");
        } else if self.makeup_active && self.makeup_source != source {
            log::info!("VCT makeup source switched to {source:?}");
            self.makeup_source = source;
        }

        if !self.rwst_suction_active && level <= cfg.low_low_level_pct {
            self.rwst_suction_active = true;
            log::warn!("VCT low-low level {level:.1}%, charging suction swapped to RWST");
        } else if self.rwst_suction_active && level >= cfg.low_low_reset_pct {
            self.rwst_suction_active = false;
            log::info!("charging suction back on VCT at {level:.1}%");
        }

        let low = level < cfg.low_level_alarm_pct;
        if low && !self.low_level_alarm {
            log::warn!("VCT low level alarm ({level:.1}%)");
        }
        self.low_level_alarm = low;

        let high = level > cfg.high_level_alarm_pct;
        if high && !self.high_level_alarm {
            log::warn!("VCT high level alarm ({level:.1}%)");
        }
        self.high_level_alarm = high;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tank(level_pct: f64, distillate_ready: bool) -> (VctState, VctConfig) {
        let cfg = VctConfig {
            initial_level_pct: level_pct,
            ..VctConfig::default()
        };
        let vct = VctState::new(&cfg, distillate_ready).expect("vct");
        (vct, cfg)
    }

    fn gal(vct: &VctState, gal: f64) -> f64 {
        gal_to_lbm(gal, vct.density_lbm_ft3)
    }

    #[test]
    fn balanced_legs_hold_level() {
        let (mut vct, cfg) = tank(50.0, false);
        let flows = VctFlows {
            letdown_lbm: gal(&vct, 75.0),
            letdown_ppm: 2_000.0,
            charging_lbm: gal(&vct, 81.0),
            seal_return_lbm: gal(&vct, 6.0),
            seal_return_ppm: 2_000.0,
            cbo_loss_lbm: 0.0,
        };
        let report = vct.update(&flows, 2_000.0, 1.0 / 60.0, &cfg);
        assert_eq!(report, VctStepReport::default());
        assert_relative_eq!(vct.level_pct, 50.0, epsilon = 1e-9);
        assert_eq!(vct.external_in_gal, 0.0);
        assert_eq!(vct.external_out_gal, 0.0);
    }

    #[test]
    fn high_level_diverts_whole_letdown_stream() {
        let (mut vct, cfg) = tank(75.0, false);
        assert!(vct.divert_active);
        let flows = VctFlows {
            letdown_lbm: gal(&vct, 450.0),
            letdown_ppm: 1_500.0,
            ..VctFlows::default()
        };
        let report = vct.update(&flows, 1_500.0, 0.1, &cfg);
        assert_relative_eq!(report.divert_gal, 450.0, epsilon = 1e-9);
        assert_relative_eq!(report.divert_ppm, 1_500.0);
        assert_relative_eq!(vct.divert_gpm, 75.0, epsilon = 1e-9);
        assert_relative_eq!(vct.external_out_gal, 450.0, epsilon = 1e-9);
        assert_relative_eq!(vct.level_pct, 75.0, epsilon = 1e-9);
    }

    #[test]
    fn divert_holds_until_reset_band() {
        let (mut vct, cfg) = tank(75.0, false);
        let draw = |vct: &VctState, g: f64| VctFlows {
            charging_lbm: gal(vct, g),
            ..VctFlows::default()
        };
        // 75% -> 65%: still diverting
        let flows = draw(&vct, 400.0);
        vct.update(&flows, 2_000.0, 0.01, &cfg);
        vct.complete_makeup(MakeupSettlement::default(), 2_000.0, false, &cfg);
        assert_relative_eq!(vct.level_pct, 65.0, epsilon = 1e-9);
        assert!(vct.divert_active);
        // 65% -> 59%: off
        let flows = draw(&vct, 240.0);
        vct.update(&flows, 2_000.0, 0.01, &cfg);
        vct.complete_makeup(MakeupSettlement::default(), 2_000.0, false, &cfg);
        assert!(!vct.divert_active);
    }

    #[test]
    fn raw_makeup_is_external_inflow() {
        let (mut vct, cfg) = tank(15.0, false);
        assert!(vct.makeup_active);
        assert_eq!(vct.makeup_source, MakeupSource::RawWater);
        let report = vct.update(&VctFlows::default(), 1_200.0, 0.1, &cfg);
        assert_relative_eq!(report.raw_makeup_gal, 480.0, epsilon = 1e-9);
        assert_relative_eq!(vct.external_in_gal, 480.0, epsilon = 1e-9);
        assert_relative_eq!(vct.level_pct, 27.0, epsilon = 1e-9);
        // blended to RCS boron when no fixed raw concentration is configured
        assert!(vct.boron_ppm < 2_000.0 && vct.boron_ppm > 1_200.0);
    }

    #[test]
    fn brs_shortfall_comes_from_raw() {
        let (mut vct, cfg) = tank(15.0, true);
        assert!(vct.makeup_from_brs());
        let report = vct.update(&VctFlows::default(), 2_000.0, 1.0 / 60.0, &cfg);
        assert_relative_eq!(report.brs_request_gal, 80.0, epsilon = 1e-9);
        assert_eq!(vct.external_in_gal, 0.0);

        let settlement = MakeupSettlement {
            requested_gal: report.brs_request_gal,
            withdrawn_gal: 30.0,
            distillate_ppm: 0.0,
        };
        vct.complete_makeup(settlement, 2_000.0, false, &cfg);
        assert_relative_eq!(vct.brs_return_total_gal, 30.0);
        assert_relative_eq!(vct.raw_makeup_total_gal, 50.0, epsilon = 1e-9);
        assert_relative_eq!(vct.external_in_gal, 80.0, epsilon = 1e-9);
        assert_relative_eq!(vct.volume_gal, 680.0, epsilon = 1e-9);
        // next step falls back to raw water
        assert_eq!(vct.makeup_source, MakeupSource::RawWater);
    }

    #[test]
    fn overdraw_is_clamped_and_booked() {
        let (mut vct, cfg) = tank(10.0, false);
        let flows = VctFlows {
            charging_lbm: gal(&vct, 1_000.0),
            ..VctFlows::default()
        };
        let mut cfg = cfg;
        cfg.makeup_gpm = 0.0;
        let report = vct.update(&flows, 2_000.0, 0.01, &cfg);
        assert_eq!(vct.mass_lbm, 0.0);
        assert_relative_eq!(report.rwst_supplied_gal, 600.0, epsilon = 1e-6);
        assert_relative_eq!(vct.external_in_gal, 600.0, epsilon = 1e-6);
    }

    #[test]
    fn low_low_level_swaps_suction() {
        let (mut vct, cfg) = tank(4.0, false);
        assert!(vct.rwst_suction_active);
        assert!(vct.low_level_alarm);
        assert_relative_eq!(vct.charging_boron_ppm(&cfg), cfg.rwst_boron_ppm);

        let before = vct.mass_lbm;
        let flows = VctFlows {
            charging_lbm: gal(&vct, 100.0),
            ..VctFlows::default()
        };
        let mut quiet = cfg.clone();
        quiet.makeup_gpm = 0.0;
        let report = vct.update(&flows, 2_000.0, 0.01, &quiet);
        assert_eq!(vct.mass_lbm, before);
        assert_relative_eq!(report.rwst_supplied_gal, 100.0, epsilon = 1e-9);
    }

    #[test]
    fn cbo_loss_is_external_outflow() {
        let (mut vct, cfg) = tank(50.0, false);
        let flows = VctFlows {
            cbo_loss_lbm: gal(&vct, 12.0),
            ..VctFlows::default()
        };
        vct.update(&flows, 2_000.0, 0.01, &cfg);
        assert_relative_eq!(vct.external_out_gal, 12.0, epsilon = 1e-9);
        assert_relative_eq!(vct.cbo_total_gal, 12.0, epsilon = 1e-9);
    }
}
