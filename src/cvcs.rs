//! CVCS flow controller
//!
//! Charging is a PI loop on pressurizer level against the level program, fed
//! forward with the letdown and seal leakoff it has to replace. Letdown is whatever
//! the open orifices pass at current RCS conditions, unless the low-level interlock
//! has isolated it.

use serde::{Deserialize, Serialize};

use crate::config::{LetdownConfig, SealConfig, SimConfig};
use crate::orifice::OrificeLineupState;

/// Route taken by letdown flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LetdownPath {
    /// Low-temperature path through the residual heat removal crossconnect
    RhrCrossconnect,
    /// Normal path through the letdown orifices
    Orifices,
    /// Letdown isolated, no flow on either path
    Isolated,
}

/// Persistent controller memory, threaded through every call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControllerState {
    /// Integral of level error [%·min]
    pub integral_error: f64,
    pub charging_gpm: f64,
    pub letdown_gpm: f64,
    pub letdown_isolated: bool,
}

/// Per-step inputs to the controller.
#[derive(Debug, Clone, Copy)]
pub struct CvcsInputs {
    pub level_pct: f64,
    /// Temperature used to read the level program [°F]
    pub program_temp_f: f64,
    pub rcs_temp_f: f64,
    pub pressure_psia: f64,
    pub rcs_density_lbm_ft3: f64,
    pub rcp_count: u32,
    pub dt_hr: f64,
}

/// Split of charging flow at the reactor-coolant-pump seals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SealFlows {
    pub injection_gpm: f64,
    /// Leakoff routed back to the VCT
    pub return_to_vct_gpm: f64,
    /// Leakoff lost out of the system
    pub cbo_loss_gpm: f64,
    /// Seal injection that passes the seals into the RCS
    pub inleakage_gpm: f64,
}

impl SealFlows {
    pub fn compute(charging_gpm: f64, rcp_count: u32, cfg: &SealConfig) -> Self {
        let pumps = rcp_count as f64;
        let injection_gpm = charging_gpm.max(0.0).min(cfg.injection_per_pump_gpm * pumps);
        let leakoff = (cfg.leakoff_per_pump_gpm * pumps).min(injection_gpm);
        let cbo_loss_gpm = (cfg.cbo_loss_per_pump_gpm * pumps).min(leakoff);
        Self {
            injection_gpm,
            return_to_vct_gpm: leakoff - cbo_loss_gpm,
            cbo_loss_gpm,
            inleakage_gpm: injection_gpm - leakoff,
        }
    }

    /// Total leakoff leaving the seals (returned plus lost).
    pub fn leakoff_gpm(&self) -> f64 {
        self.return_to_vct_gpm + self.cbo_loss_gpm
    }
}

/// Everything the controller decided this step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CvcsOutput {
    /// Total charging pump discharge [gpm]
    pub charging_gpm: f64,
    /// Charging reaching the RCS net of seal injection [gpm]
    pub charging_to_rcs_gpm: f64,
    pub seals: SealFlows,
    pub seal_injection_ok: bool,
    pub letdown_gpm: f64,
    pub letdown_isolated: bool,
    pub letdown_path: Option<LetdownPath>,
    pub level_setpoint_pct: f64,
    pub level_error_pct: f64,
    /// Charging demand hit a pump limit this step
    pub charging_limited: bool,
}

impl CvcsOutput {
    /// Net volumetric flow into the RCS [gpm]
    pub fn net_to_rcs_gpm(&self) -> f64 {
        self.charging_to_rcs_gpm + self.seals.inleakage_gpm - self.letdown_gpm
    }
}

/// Seal injection is adequate iff no pump is running or every running pump gets its share.
pub fn seal_injection_adequate(rcp_count: u32, seal_flow_gpm: f64, per_pump_gpm: f64) -> bool {
    rcp_count == 0 || seal_flow_gpm >= per_pump_gpm * rcp_count as f64
}

/// Pick the letdown route from RCS conditions and the isolation state.
pub fn select_letdown_path(
    rcs_temp_f: f64,
    pressure_psia: f64,
    isolated: bool,
    cfg: &LetdownConfig,
) -> LetdownPath {
    if isolated {
        LetdownPath::Isolated
    } else if rcs_temp_f < cfg.crossconnect_isolation_temp_f
        && pressure_psia < cfg.rhr_max_pressure_psia
    {
        LetdownPath::RhrCrossconnect
    } else {
        LetdownPath::Orifices
    }
}

/// Flow one orifice passes at the given RCS pressure and density.
///
/// Volumetric flow through a fixed orifice scales with sqrt(ΔP / ρ); the rating is
/// taken at `reference_dp_psid` and `reference_density_lbm_ft3`.
pub fn orifice_capacity_gpm(
    nominal_gpm: f64,
    pressure_psia: f64,
    density_lbm_ft3: f64,
    cfg: &LetdownConfig,
) -> f64 {
    if density_lbm_ft3 <= 0.0 {
        return 0.0;
    }
    let dp = (pressure_psia - cfg.backpressure_psia).max(0.0);
    let density_ratio = cfg.reference_density_lbm_ft3 / density_lbm_ft3;
    nominal_gpm * (dp / cfg.reference_dp_psid).sqrt() * density_ratio.sqrt()
}

/// Combined capacity of every orifice in the lineup.
pub fn letdown_capacity_gpm(
    lineup: &OrificeLineupState,
    pressure_psia: f64,
    density_lbm_ft3: f64,
    cfg: &LetdownConfig,
) -> f64 {
    let large = orifice_capacity_gpm(cfg.large_orifice_gpm, pressure_psia, density_lbm_ft3, cfg);
    let small = orifice_capacity_gpm(cfg.small_orifice_gpm, pressure_psia, density_lbm_ft3, cfg);
    let mut total = large * lineup.large_open.count() as f64;
    if lineup.small_open {
        total += small;
    }
    total
}

impl ControllerState {
    /// Low-level letdown isolation with a reset band above the trip point.
    pub fn update_isolation(&mut self, level_pct: f64, cfg: &LetdownConfig) -> bool {
        if !self.letdown_isolated && level_pct < cfg.isolation_level_pct {
            self.letdown_isolated = true;
            log::warn!("letdown isolated on low pressurizer level ({level_pct:.2}%)");
        } else if self.letdown_isolated
            && level_pct > cfg.isolation_level_pct + cfg.isolation_hysteresis_pct
        {
            self.letdown_isolated = false;
            log::info!("letdown isolation reset ({level_pct:.2}%)");
        }
        self.letdown_isolated
    }

    /// Run one controller step.
    pub fn compute(
        &mut self,
        inputs: &CvcsInputs,
        lineup: &OrificeLineupState,
        cfg: &SimConfig,
    ) -> CvcsOutput {
        let setpoint = cfg.level_program.setpoint(inputs.program_temp_f);
        let level_error = inputs.level_pct - setpoint;

        let isolated = self.update_isolation(inputs.level_pct, &cfg.letdown);
        let letdown_gpm = if isolated {
            0.0
        } else {
            let density = inputs.rcs_density_lbm_ft3;
            letdown_capacity_gpm(lineup, inputs.pressure_psia, density, &cfg.letdown)
        };
        let letdown_path =
            select_letdown_path(inputs.rcs_temp_f, inputs.pressure_psia, isolated, &cfg.letdown);

        let (charging_gpm, charging_limited) =
            self.pi_charging(-level_error, letdown_gpm, inputs, cfg);

        let seals = SealFlows::compute(charging_gpm, inputs.rcp_count, &cfg.seals);
        let seal_injection_ok = seal_injection_adequate(
            inputs.rcp_count,
            seals.injection_gpm,
            cfg.seals.injection_per_pump_gpm,
        );

        self.charging_gpm = charging_gpm;
        self.letdown_gpm = letdown_gpm;

        log::trace!(
            "cvcs: level {:.2}% (sp {:.2}%), charging {:.1} gpm, letdown {:.1} gpm, I = {:.3}",
            inputs.level_pct,
            setpoint,
            charging_gpm,
            letdown_gpm,
            self.integral_error
        );

        CvcsOutput {
            charging_gpm,
            charging_to_rcs_gpm: charging_gpm - seals.injection_gpm,
            seals,
            seal_injection_ok,
            letdown_gpm,
            letdown_isolated: isolated,
            letdown_path: Some(letdown_path),
            level_setpoint_pct: setpoint,
            level_error_pct: level_error,
            charging_limited,
        }
    }

    /// PI charging demand with back-calculated anti-windup.
    ///
    /// `error` is setpoint minus level, so a low level raises charging. Charging never
    /// drops below the seal injection the running pumps need. The integral term is
    /// recomputed from the clamped output whenever the demand saturates, and its
    /// contribution is held inside both the pump headroom left by the feedforward and
    /// `integral_authority_gpm`.
    fn pi_charging(
        &mut self,
        error: f64,
        letdown_gpm: f64,
        inputs: &CvcsInputs,
        cfg: &SimConfig,
    ) -> (f64, bool) {
        let limits = &cfg.charging;
        let gains = &cfg.pi;
        let ki = gains.ki_gpm_per_pct_min;
        let pumps = inputs.rcp_count as f64;
        let dt_min = inputs.dt_hr * 60.0;

        let feedforward = letdown_gpm + cfg.seals.leakoff_per_pump_gpm * pumps;
        let floor = (cfg.seals.injection_per_pump_gpm * pumps)
            .max(limits.min_gpm)
            .min(limits.max_gpm);
        let proportional = feedforward + gains.kp_gpm_per_pct * error;

        let mut trial = proportional;
        if ki > 0.0 {
            let mut integral = self.integral_error + error * dt_min;
            trial = proportional + ki * integral;
            let clamped = trial.clamp(floor, limits.max_gpm);
            if clamped != trial {
                integral = (clamped - proportional) / ki;
            }

            let authority = gains.integral_authority_gpm;
            let low = (floor - feedforward).max(-authority);
            let high = (limits.max_gpm - feedforward).min(authority);
            let contribution = if low <= high {
                (ki * integral).clamp(low, high)
            } else {
                (ki * integral).clamp(-authority, authority)
            };
            if contribution.is_finite() {
                self.integral_error = contribution / ki;
            }
        } else {
            self.integral_error = 0.0;
        }

        let mut demand = proportional + ki * self.integral_error;
        if !demand.is_finite() {
            log::error!("charging demand not finite, holding {:.1} gpm", self.charging_gpm);
            demand = self.charging_gpm;
        }
        let charging = demand.clamp(floor, limits.max_gpm);
        let limited = trial > limits.max_gpm;
        (charging, limited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrificeConfig;
    use approx::assert_relative_eq;

    fn inputs(level_pct: f64, rcp_count: u32) -> CvcsInputs {
        CvcsInputs {
            level_pct,
            program_temp_f: 557.0,
            rcs_temp_f: 557.0,
            pressure_psia: 2250.0,
            rcs_density_lbm_ft3: 45.7,
            rcp_count,
            dt_hr: 10.0 / 3600.0,
        }
    }

    #[test]
    fn orifice_passes_rating_at_reference_conditions() {
        let cfg = LetdownConfig::default();
        let p = cfg.backpressure_psia + cfg.reference_dp_psid;
        let q = orifice_capacity_gpm(75.0, p, cfg.reference_density_lbm_ft3, &cfg);
        assert_relative_eq!(q, 75.0, epsilon = 1e-9);
        let low = orifice_capacity_gpm(75.0, 415.0, cfg.reference_density_lbm_ft3, &cfg);
        assert!(low < 40.0 && low > 0.0);
        assert_eq!(orifice_capacity_gpm(75.0, 50.0, 60.0, &cfg), 0.0);
    }

    #[test]
    fn letdown_sums_open_orifices() {
        let cfg = LetdownConfig::default();
        let mut lineup = OrificeLineupState::new(&OrificeConfig::default());
        let p = cfg.backpressure_psia + cfg.reference_dp_psid;
        let rho = cfg.reference_density_lbm_ft3;
        assert_relative_eq!(letdown_capacity_gpm(&lineup, p, rho, &cfg), 75.0, epsilon = 1e-9);
        lineup.small_open = true;
        assert_relative_eq!(letdown_capacity_gpm(&lineup, p, rho, &cfg), 120.0, epsilon = 1e-9);
        lineup.large_open = crate::orifice::LargeOrifices::Two;
        assert_relative_eq!(letdown_capacity_gpm(&lineup, p, rho, &cfg), 195.0, epsilon = 1e-9);
    }

    #[test]
    fn seal_adequacy() {
        assert!(seal_injection_adequate(0, 0.0, 7.0));
        assert!(seal_injection_adequate(0, 3.0, 7.0));
        assert!(seal_injection_adequate(2, 14.0, 7.0));
        assert!(seal_injection_adequate(2, 20.0, 7.0));
        assert!(!seal_injection_adequate(2, 13.9, 7.0));
    }

    #[test]
    fn seal_flows_split_injection() {
        let seals = SealFlows::compute(100.0, 2, &SealConfig::default());
        assert_relative_eq!(seals.injection_gpm, 14.0);
        assert_relative_eq!(seals.return_to_vct_gpm, 6.0);
        assert_relative_eq!(seals.inleakage_gpm, 8.0);
        assert_relative_eq!(seals.cbo_loss_gpm, 0.0);

        let starved = SealFlows::compute(10.0, 2, &SealConfig::default());
        assert_relative_eq!(starved.injection_gpm, 10.0);
        assert!(!seal_injection_adequate(2, starved.injection_gpm, 7.0));
    }

    #[test]
    fn letdown_path_selection() {
        let cfg = LetdownConfig::default();
        assert_eq!(select_letdown_path(250.0, 400.0, false, &cfg), LetdownPath::RhrCrossconnect);
        assert_eq!(select_letdown_path(400.0, 400.0, false, &cfg), LetdownPath::Orifices);
        assert_eq!(select_letdown_path(250.0, 1_000.0, false, &cfg), LetdownPath::Orifices);
        assert_eq!(select_letdown_path(250.0, 400.0, true, &cfg), LetdownPath::Isolated);
        assert_eq!(select_letdown_path(557.0, 2250.0, true, &cfg), LetdownPath::Isolated);
    }

    #[test]
    fn low_level_isolates_letdown_with_reset_band() {
        let cfg = SimConfig::default();
        let lineup = OrificeLineupState::new(&cfg.orifice);
        let mut ctrl = ControllerState::default();

        let out = ctrl.compute(&inputs(25.0, 0), &lineup, &cfg);
        assert!(!out.letdown_isolated);
        assert!(out.letdown_gpm > 70.0);

        let out = ctrl.compute(&inputs(16.5, 0), &lineup, &cfg);
        assert!(out.letdown_isolated);
        assert_eq!(out.letdown_gpm, 0.0);
        assert_eq!(out.letdown_path, Some(LetdownPath::Isolated));

        // back above the trip but inside the reset band
        let out = ctrl.compute(&inputs(19.5, 0), &lineup, &cfg);
        assert!(out.letdown_isolated);
        assert_eq!(out.letdown_gpm, 0.0);

        let out = ctrl.compute(&inputs(20.5, 0), &lineup, &cfg);
        assert!(!out.letdown_isolated);
        assert!(out.letdown_gpm > 70.0);
    }

    #[test]
    fn high_level_reduces_charging_below_feedforward() {
        let cfg = SimConfig::default();
        let lineup = OrificeLineupState::new(&cfg.orifice);
        let mut ctrl = ControllerState::default();
        let out = ctrl.compute(&inputs(35.0, 2), &lineup, &cfg);
        let feedforward = out.letdown_gpm + 6.0;
        let proportional = cfg.pi.kp_gpm_per_pct * 10.0;
        assert!(out.charging_gpm < feedforward);
        assert_relative_eq!(out.charging_gpm, feedforward - proportional, epsilon = 0.1);
        assert_relative_eq!(out.charging_to_rcs_gpm, out.charging_gpm - 14.0, epsilon = 1e-9);
        assert!(out.seal_injection_ok);
        assert!(!out.charging_limited);
    }

    #[test]
    fn charging_never_starves_running_seals() {
        let cfg = SimConfig::default();
        let lineup = OrificeLineupState::new(&cfg.orifice);
        let mut ctrl = ControllerState::default();
        let mut out = CvcsOutput::default();
        // far above program: the PI demand alone would be negative for an hour
        for _ in 0..360 {
            out = ctrl.compute(&inputs(55.0, 4), &lineup, &cfg);
            assert_relative_eq!(out.charging_gpm, 28.0, epsilon = 1e-9);
            assert!(out.seal_injection_ok);
            assert!(!out.charging_limited);
        }
        assert_relative_eq!(out.seals.injection_gpm, 28.0, epsilon = 1e-9);
        assert_relative_eq!(out.charging_to_rcs_gpm, 0.0, epsilon = 1e-9);

        // with no pumps running the floor is the configured pump minimum
        let out = ctrl.compute(&inputs(55.0, 0), &lineup, &cfg);
        assert_relative_eq!(out.charging_gpm, cfg.charging.min_gpm);
        assert!(out.seal_injection_ok);
    }

    #[test]
    fn on_program_level_balances_letdown_and_leakoff() {
        let cfg = SimConfig::default();
        let lineup = OrificeLineupState::new(&cfg.orifice);
        let mut ctrl = ControllerState::default();
        let out = ctrl.compute(&inputs(25.0, 2), &lineup, &cfg);
        assert_relative_eq!(out.net_to_rcs_gpm(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn integral_is_bounded_under_sustained_saturation() {
        let mut cfg = SimConfig::default();
        cfg.charging.max_gpm = 100.0;
        let lineup = OrificeLineupState::new(&cfg.orifice);
        let mut ctrl = ControllerState::default();
        let mut out = CvcsOutput::default();
        for _ in 0..5_000 {
            out = ctrl.compute(&inputs(18.0, 0), &lineup, &cfg);
        }
        assert_relative_eq!(out.charging_gpm, cfg.charging.max_gpm, epsilon = 1e-9);
        assert!(out.charging_limited);
        // the integral is recomputed so that the demand sits on the pump limit
        let contribution = cfg.pi.ki_gpm_per_pct_min * ctrl.integral_error;
        assert!(contribution.abs() <= cfg.pi.integral_authority_gpm + 1e-9);
        let demand = out.letdown_gpm + cfg.pi.kp_gpm_per_pct * 7.0 + contribution;
        assert_relative_eq!(demand, cfg.charging.max_gpm, epsilon = 1e-9);

        // the stored integral holds no more than the headroom, so the loop unwinds at once
        let out = ctrl.compute(&inputs(30.0, 0), &lineup, &cfg);
        assert!(out.charging_gpm < out.letdown_gpm);
        assert!(!out.charging_limited);
    }

    #[test]
    fn saturated_demand_reaches_pump_capacity() {
        let cfg = SimConfig::default();
        let lineup = OrificeLineupState::new(&cfg.orifice);
        let mut ctrl = ControllerState::default();
        // letdown alone nearly fills the pump, so any low level saturates it
        let mut low = inputs(18.0, 4);
        low.rcs_density_lbm_ft3 = 20.0;
        let out = ctrl.compute(&low, &lineup, &cfg);
        assert!(out.letdown_gpm + 12.0 + cfg.pi.kp_gpm_per_pct * 7.0 > cfg.charging.max_gpm);
        assert_relative_eq!(out.charging_gpm, cfg.charging.max_gpm, epsilon = 1e-9);
        assert!(out.charging_limited);

        for _ in 0..1_000 {
            ctrl.compute(&low, &lineup, &cfg);
        }
        let integral = ctrl.integral_error;
        let out = ctrl.compute(&low, &lineup, &cfg);
        assert_relative_eq!(out.charging_gpm, cfg.charging.max_gpm, epsilon = 1e-9);
        assert!(out.charging_limited);
        assert_relative_eq!(ctrl.integral_error, integral, epsilon = 1e-6);
    }

    #[test]
    fn zero_integral_gain_is_proportional_only() {
        let mut cfg = SimConfig::default();
        cfg.pi.ki_gpm_per_pct_min = 0.0;
        let lineup = OrificeLineupState::new(&cfg.orifice);
        let mut ctrl = ControllerState::default();
        for _ in 0..100 {
            ctrl.compute(&inputs(22.0, 2), &lineup, &cfg);
        }
        let out = ctrl.compute(&inputs(22.0, 2), &lineup, &cfg);
        assert_eq!(ctrl.integral_error, 0.0);
        let expected = out.letdown_gpm + 6.0 + 3.0 * cfg.pi.kp_gpm_per_pct;
        assert_relative_eq!(out.charging_gpm, expected, epsilon = 1e-9);
    }
}
