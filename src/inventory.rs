//! RCS inventory integration
//!
//! Converts net CVCS flow into RCS water mass, keeps the loop water-full by
//! surging the excess into or out of the pressurizer, and mixes boron into the
//! lumped RCS/pressurizer inventory.

use serde::{Deserialize, Serialize};

use crate::config::PlantConfig;
use crate::error::PropertyError;
use crate::water_props::{self, GAL_PER_FT3};

/// Who owns RCS mass and letdown this step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlantRegime {
    /// Pressurizer water-solid; the solid-plant authority owns flows and mass
    SolidPlant,
    /// Bubble drawn, level being drained to program; still authority-owned
    PreDrain,
    /// Normal two-phase pressurizer under CVCS control
    TwoPhase,
}

impl PlantRegime {
    pub fn authority_owned(self) -> bool {
        !matches!(self, PlantRegime::TwoPhase)
    }

    pub fn has_bubble(self) -> bool {
        !matches!(self, PlantRegime::SolidPlant)
    }
}

/// Primary-side thermal and inventory state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlantThermalState {
    pub rcs_temp_f: f64,
    pub pressure_psia: f64,
    pub rcs_mass_lbm: f64,
    pub rcs_density_lbm_ft3: f64,
    pub pzr_water_mass_lbm: f64,
    pub pzr_steam_mass_lbm: f64,
    pub pzr_water_volume_ft3: f64,
    pub pzr_steam_volume_ft3: f64,
    pub pzr_level_pct: f64,
    /// Lumped RCS + pressurizer concentration
    pub rcs_boron_ppm: f64,
}

impl PlantThermalState {
    /// Water-solid plant: loop and pressurizer full at a single temperature.
    pub fn solid(
        cfg: &PlantConfig,
        rcs_temp_f: f64,
        pressure_psia: f64,
    ) -> Result<Self, PropertyError> {
        let rho = water_props::liquid_density(rcs_temp_f, pressure_psia)?;
        Ok(Self {
            rcs_temp_f,
            pressure_psia,
            rcs_mass_lbm: cfg.rcs_loop_volume_ft3 * rho,
            rcs_density_lbm_ft3: rho,
            pzr_water_mass_lbm: cfg.pressurizer_volume_ft3 * rho,
            pzr_steam_mass_lbm: 0.0,
            pzr_water_volume_ft3: cfg.pressurizer_volume_ft3,
            pzr_steam_volume_ft3: 0.0,
            pzr_level_pct: 100.0,
            rcs_boron_ppm: cfg.initial_boron_ppm,
        })
    }

    /// Two-phase plant with a saturated pressurizer at the given level.
    pub fn two_phase(
        cfg: &PlantConfig,
        rcs_temp_f: f64,
        pressure_psia: f64,
        level_pct: f64,
    ) -> Result<Self, PropertyError> {
        let rho = water_props::liquid_density(rcs_temp_f, pressure_psia)?;
        let rho_l = water_props::saturated_liquid_density(pressure_psia)?;
        let rho_v = water_props::saturated_vapor_density(pressure_psia)?;
        let water_volume = cfg.pressurizer_volume_ft3 * level_pct.clamp(0.0, 100.0) / 100.0;
        let steam_volume = cfg.pressurizer_volume_ft3 - water_volume;
        Ok(Self {
            rcs_temp_f,
            pressure_psia,
            rcs_mass_lbm: cfg.rcs_loop_volume_ft3 * rho,
            rcs_density_lbm_ft3: rho,
            pzr_water_mass_lbm: water_volume * rho_l,
            pzr_steam_mass_lbm: steam_volume * rho_v,
            pzr_water_volume_ft3: water_volume,
            pzr_steam_volume_ft3: steam_volume,
            pzr_level_pct: level_pct.clamp(0.0, 100.0),
            rcs_boron_ppm: cfg.initial_boron_ppm,
        })
    }

    pub fn pressurizer_mass_lbm(&self) -> f64 {
        self.pzr_water_mass_lbm + self.pzr_steam_mass_lbm
    }

    /// RCS + pressurizer water and steam.
    pub fn primary_mass_lbm(&self) -> f64 {
        self.rcs_mass_lbm + self.pressurizer_mass_lbm()
    }
}

/// Mass-weighted mixing of an inflow into an inventory. Never negative.
pub fn mix_ppm(inventory_ppm: f64, inventory_mass: f64, inflow_ppm: f64, inflow_mass: f64) -> f64 {
    let total = inventory_mass.max(0.0) + inflow_mass.max(0.0);
    if total <= 0.0 {
        return inventory_ppm.max(0.0);
    }
    let ppm = (inventory_ppm * inventory_mass.max(0.0) + inflow_ppm * inflow_mass.max(0.0)) / total;
    ppm.max(0.0)
}

/// Gallons at the given density to lbm.
pub fn gal_to_lbm(gal: f64, density_lbm_ft3: f64) -> f64 {
    gal / GAL_PER_FT3 * density_lbm_ft3
}

/// lbm to gallons at the given density.
pub fn lbm_to_gal(lbm: f64, density_lbm_ft3: f64) -> f64 {
    if density_lbm_ft3 <= 0.0 {
        return 0.0;
    }
    lbm / density_lbm_ft3 * GAL_PER_FT3
}

/// Mass change already applied by the pre-solver drain adjustment.
///
/// Deliberately neither `Clone` nor `Copy`: applying it consumes it, and the receipt
/// it hands back is consumed in turn by [`integrate`]. A delta can therefore reach
/// the RCS exactly once.
#[derive(Debug)]
pub struct PreAppliedDelta {
    mass_lbm: f64,
}

impl PreAppliedDelta {
    pub fn new(mass_lbm: f64) -> Self {
        Self { mass_lbm }
    }

    pub fn mass_lbm(&self) -> f64 {
        self.mass_lbm
    }

    /// Apply the adjustment to RCS mass and return the receipt for the integrator.
    pub fn apply(self, thermal: &mut PlantThermalState) -> AppliedDeltaReceipt {
        thermal.rcs_mass_lbm = (thermal.rcs_mass_lbm + self.mass_lbm).max(0.0);
        log::debug!("pre-solver drain adjustment applied: {:+.1} lbm", self.mass_lbm);
        AppliedDeltaReceipt { mass_lbm: self.mass_lbm }
    }
}

/// Proof that a pre-applied delta reached the RCS this step.
#[derive(Debug)]
#[must_use = "the integrator must consume the receipt to skip its own update"]
pub struct AppliedDeltaReceipt {
    mass_lbm: f64,
}

impl AppliedDeltaReceipt {
    pub fn mass_lbm(&self) -> f64 {
        self.mass_lbm
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// The same mass delta was applied by the pre-solver stage
    PreApplied,
    /// The regime authority owns RCS mass
    AuthorityOwned,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InventoryUpdate {
    pub mass_delta_lbm: f64,
    /// Gallon change to forward to the VCT cross-check accumulator, if applied
    pub forwarded_gal: Option<f64>,
    pub skipped: Option<SkipReason>,
}

/// Integrate net CVCS flow into RCS water mass.
///
/// `Δm = net_gpm · Δt_min / 7.48052 · ρ(T,P)`. Skipped when the regime authority
/// owns RCS mass or when a pre-applied receipt is presented; the receipt is consumed
/// either way.
pub fn integrate(
    thermal: &mut PlantThermalState,
    net_gpm: f64,
    density_lbm_ft3: f64,
    dt_hr: f64,
    regime: PlantRegime,
    receipt: Option<AppliedDeltaReceipt>,
) -> InventoryUpdate {
    let skipped = match (regime.authority_owned(), receipt) {
        (true, _) => Some(SkipReason::AuthorityOwned),
        (false, Some(receipt)) => {
            log::debug!("integrator skipped: {:+.1} lbm already applied", receipt.mass_lbm());
            Some(SkipReason::PreApplied)
        }
        (false, None) => None,
    };
    if skipped.is_some() {
        return InventoryUpdate {
            mass_delta_lbm: 0.0,
            forwarded_gal: None,
            skipped,
        };
    }

    let net_gal = net_gpm * dt_hr * 60.0;
    let mass_delta_lbm = gal_to_lbm(net_gal, density_lbm_ft3);
    thermal.rcs_mass_lbm = (thermal.rcs_mass_lbm + mass_delta_lbm).max(0.0);
    InventoryUpdate {
        mass_delta_lbm,
        forwarded_gal: Some(net_gal),
        skipped: None,
    }
}

/// Split a pressurizer mass into saturated liquid and vapour filling `volume_ft3`.
///
/// Returns `(liquid_lbm, vapour_lbm)`. A mass dense enough to fill the vessel with
/// saturated liquid leaves it water-solid.
pub fn pressurizer_split(mass_lbm: f64, volume_ft3: f64, rho_l: f64, rho_v: f64) -> (f64, f64) {
    let mass = mass_lbm.max(0.0);
    if mass >= volume_ft3 * rho_l {
        return (mass, 0.0);
    }
    if mass <= volume_ft3 * rho_v || rho_l <= rho_v {
        return (0.0, mass);
    }
    let liquid = (volume_ft3 - mass / rho_v) / (1.0 / rho_l - 1.0 / rho_v);
    let liquid = liquid.clamp(0.0, mass);
    (liquid, mass - liquid)
}

/// Keep the RCS loop water-full and surge the difference through the pressurizer.
///
/// Returns the insurge mass (positive into the pressurizer). Conserves
/// RCS + pressurizer mass exactly.
pub fn redistribute_surge(
    thermal: &mut PlantThermalState,
    cfg: &PlantConfig,
    rho_l: f64,
    rho_v: f64,
) -> f64 {
    let loop_target = cfg.rcs_loop_volume_ft3 * thermal.rcs_density_lbm_ft3;
    let pzr_mass = thermal.pressurizer_mass_lbm();
    // the pressurizer cannot give more than it holds
    let insurge = (thermal.rcs_mass_lbm - loop_target).max(-pzr_mass);
    thermal.rcs_mass_lbm -= insurge;

    let (liquid, vapour) =
        pressurizer_split(pzr_mass + insurge, cfg.pressurizer_volume_ft3, rho_l, rho_v);
    let water_volume = (liquid / rho_l).min(cfg.pressurizer_volume_ft3);
    thermal.pzr_water_mass_lbm = liquid;
    thermal.pzr_steam_mass_lbm = vapour;
    thermal.pzr_water_volume_ft3 = water_volume;
    thermal.pzr_steam_volume_ft3 = cfg.pressurizer_volume_ft3 - water_volume;
    thermal.pzr_level_pct = water_volume / cfg.pressurizer_volume_ft3 * 100.0;
    insurge
}

/// Mix charging-header water into the lumped RCS boron inventory.
pub fn mix_rcs_boron(thermal: &mut PlantThermalState, inflow_lbm: f64, inflow_ppm: f64) {
    let inventory = thermal.primary_mass_lbm();
    thermal.rcs_boron_ppm = mix_ppm(thermal.rcs_boron_ppm, inventory, inflow_ppm, inflow_lbm);
}
