//! Regime authority
//!
//! Until the pressurizer has a bubble under level control, flows and RCS mass belong
//! to an external authority rather than the CVCS controller and integrator.

use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::cvcs::SealFlows;
use crate::inventory::{gal_to_lbm, PlantRegime, PlantThermalState};

/// Flows and RCS mass change dictated for one step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorityCommand {
    pub charging_gpm: f64,
    pub letdown_gpm: f64,
    pub seals: SealFlows,
    /// RCS mass change the authority owns this step [lbm]
    pub rcs_mass_delta_lbm: f64,
}

impl AuthorityCommand {
    /// Net volumetric flow into the RCS [gpm]
    pub fn net_to_rcs_gpm(&self) -> f64 {
        self.charging_gpm - self.seals.leakoff_gpm() - self.letdown_gpm
    }
}

/// Owner of flows and RCS mass outside the two-phase regime.
pub trait RegimeAuthority: Send {
    fn command(
        &mut self,
        regime: PlantRegime,
        thermal: &PlantThermalState,
        rcp_count: u32,
        dt_hr: f64,
        cfg: &SimConfig,
    ) -> AuthorityCommand;

    fn name(&self) -> &str;
}

/// Fixed charging/letdown lineup.
///
/// Solid plant holds letdown and charging balanced at the lineup flow. During the
/// pre-drain phase letdown is raised to draw pressurizer level down to program.
#[derive(Debug, Clone, Default)]
pub struct FixedLineupAuthority;

impl RegimeAuthority for FixedLineupAuthority {
    fn command(
        &mut self,
        regime: PlantRegime,
        thermal: &PlantThermalState,
        rcp_count: u32,
        dt_hr: f64,
        cfg: &SimConfig,
    ) -> AuthorityCommand {
        let lineup = cfg.plant.solid_plant_lineup_gpm;
        let leakoff = cfg.seals.leakoff_per_pump_gpm * rcp_count as f64;
        let letdown_gpm = match regime {
            PlantRegime::PreDrain => cfg.plant.drain_letdown_gpm,
            _ => lineup,
        };
        let charging_gpm = lineup + leakoff;
        let seals = SealFlows::compute(charging_gpm, rcp_count, &cfg.seals);

        let mut command = AuthorityCommand {
            charging_gpm,
            letdown_gpm,
            seals,
            rcs_mass_delta_lbm: 0.0,
        };
        let net_gal = command.net_to_rcs_gpm() * dt_hr * 60.0;
        command.rcs_mass_delta_lbm = gal_to_lbm(net_gal, thermal.rcs_density_lbm_ft3);
        command
    }

    fn name(&self) -> &str {
        "fixed lineup"
    }
}
