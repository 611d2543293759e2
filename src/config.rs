//! Simulator configuration
//!
//! Every constant the control laws and tank models depend on lives here so that a
//! training scenario can override it from a TOML or JSON file without a rebuild.
//! All sections use `#[serde(default)]`: a file only needs the values it changes.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ConfigError;

/// Search order used by [`SimConfig::load_or_default`].
const CONFIG_PATHS: [&str; 4] = [
    "config/pwr_heatup.toml",
    "pwr_heatup.toml",
    "config/pwr_heatup.json",
    "pwr_heatup.json",
];

/// Primary-loop geometry and the fixed solid-plant lineup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlantConfig {
    pub rcs_loop_volume_ft3: f64,
    pub pressurizer_volume_ft3: f64,
    pub initial_boron_ppm: f64,
    /// Charging and letdown held by the solid-plant authority [gpm]
    pub solid_plant_lineup_gpm: f64,
    /// Letdown used while drawing the pressurizer bubble down [gpm]
    pub drain_letdown_gpm: f64,
}

impl Default for PlantConfig {
    fn default() -> Self {
        Self {
            rcs_loop_volume_ft3: 10_400.0,
            pressurizer_volume_ft3: 1_800.0,
            initial_boron_ppm: 2_000.0,
            solid_plant_lineup_gpm: 75.0,
            drain_letdown_gpm: 120.0,
        }
    }
}

/// One point of the pressurizer level program.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgramPoint {
    pub temp_f: f64,
    pub level_pct: f64,
}

/// Pressurizer level program: average RCS temperature -> level setpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelProgram {
    pub points: Vec<ProgramPoint>,
}

impl Default for LevelProgram {
    fn default() -> Self {
        Self {
            points: vec![
                ProgramPoint { temp_f: 200.0, level_pct: 25.0 },
                ProgramPoint { temp_f: 557.0, level_pct: 25.0 },
                ProgramPoint { temp_f: 584.7, level_pct: 61.5 },
            ],
        }
    }
}

impl LevelProgram {
    /// Piecewise-linear setpoint, held flat beyond either end of the curve.
    pub fn setpoint(&self, temp_f: f64) -> f64 {
        let (first, last) = match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return 0.0,
        };
        if temp_f <= first.temp_f {
            return first.level_pct;
        }
        if temp_f >= last.temp_f {
            return last.level_pct;
        }
        for pair in self.points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if temp_f <= b.temp_f {
                let span = b.temp_f - a.temp_f;
                if span <= 0.0 {
                    return b.level_pct;
                }
                let frac = (temp_f - a.temp_f) / span;
                return a.level_pct + frac * (b.level_pct - a.level_pct);
            }
        }
        last.level_pct
    }
}

/// Charging PI gains. Error is measured in % level, integral in %·min.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PiConfig {
    pub kp_gpm_per_pct: f64,
    pub ki_gpm_per_pct_min: f64,
    /// Largest charging change the integral term may command either way [gpm]
    pub integral_authority_gpm: f64,
}

impl Default for PiConfig {
    fn default() -> Self {
        Self {
            kp_gpm_per_pct: 5.0,
            ki_gpm_per_pct_min: 0.05,
            integral_authority_gpm: 20.0,
        }
    }
}

/// Charging pump limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChargingConfig {
    pub min_gpm: f64,
    pub max_gpm: f64,
}

impl Default for ChargingConfig {
    fn default() -> Self {
        Self {
            min_gpm: 0.0,
            max_gpm: 150.0,
        }
    }
}

/// Reactor-coolant-pump seal flows, per running pump.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SealConfig {
    pub injection_per_pump_gpm: f64,
    /// Leakoff returned to the VCT
    pub leakoff_per_pump_gpm: f64,
    /// Part of the leakoff lost out of the system (controlled bleed-off)
    pub cbo_loss_per_pump_gpm: f64,
}

impl Default for SealConfig {
    fn default() -> Self {
        Self {
            injection_per_pump_gpm: 7.0,
            leakoff_per_pump_gpm: 3.0,
            cbo_loss_per_pump_gpm: 0.0,
        }
    }
}

/// Letdown isolation interlock, path selection and orifice hydraulics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LetdownConfig {
    pub isolation_level_pct: f64,
    pub isolation_hysteresis_pct: f64,
    /// Below this RCS temperature letdown runs through the RHR crossconnect
    pub crossconnect_isolation_temp_f: f64,
    /// RHR suction interlock; above it the crossconnect is unavailable
    pub rhr_max_pressure_psia: f64,
    pub large_orifice_gpm: f64,
    pub small_orifice_gpm: f64,
    /// Differential pressure at which the orifices pass their rated flow
    pub reference_dp_psid: f64,
    pub reference_density_lbm_ft3: f64,
    pub backpressure_psia: f64,
}

impl Default for LetdownConfig {
    fn default() -> Self {
        Self {
            isolation_level_pct: 17.0,
            isolation_hysteresis_pct: 3.0,
            crossconnect_isolation_temp_f: 350.0,
            rhr_max_pressure_psia: 450.0,
            large_orifice_gpm: 75.0,
            small_orifice_gpm: 45.0,
            reference_dp_psid: 2_135.0,
            reference_density_lbm_ft3: 45.7,
            backpressure_psia: 115.0,
        }
    }
}

/// Operator orifice lineup thresholds (level error above program).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrificeConfig {
    pub small_open_error_pct: f64,
    pub large_open_error_pct: f64,
    pub hysteresis_pct: f64,
    /// Minimum simulated time between two operator actions [hr]
    pub min_action_interval_hr: f64,
    /// Large orifices open at start (1 or 2)
    pub initial_large_open: u8,
}

impl Default for OrificeConfig {
    fn default() -> Self {
        Self {
            small_open_error_pct: 5.0,
            large_open_error_pct: 10.0,
            hysteresis_pct: 2.0,
            min_action_interval_hr: 0.0,
            initial_large_open: 1,
        }
    }
}

/// Volume Control Tank.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VctConfig {
    pub capacity_gal: f64,
    pub temperature_f: f64,
    pub pressure_psia: f64,
    pub initial_level_pct: f64,
    pub initial_boron_ppm: f64,
    pub divert_on_pct: f64,
    pub divert_off_pct: f64,
    pub makeup_start_pct: f64,
    pub makeup_stop_pct: f64,
    pub makeup_gpm: f64,
    /// Fixed raw makeup concentration; `None` blends to the RCS concentration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_makeup_boron_ppm: Option<f64>,
    pub low_level_alarm_pct: f64,
    pub high_level_alarm_pct: f64,
    /// Charging suction swaps to the refuelling water tank below this level
    pub low_low_level_pct: f64,
    pub low_low_reset_pct: f64,
    pub rwst_boron_ppm: f64,
}

impl Default for VctConfig {
    fn default() -> Self {
        Self {
            capacity_gal: 4_000.0,
            temperature_f: 115.0,
            pressure_psia: 30.0,
            initial_level_pct: 50.0,
            initial_boron_ppm: 2_000.0,
            divert_on_pct: 70.0,
            divert_off_pct: 60.0,
            makeup_start_pct: 20.0,
            makeup_stop_pct: 40.0,
            makeup_gpm: 80.0,
            raw_makeup_boron_ppm: None,
            low_level_alarm_pct: 17.0,
            high_level_alarm_pct: 80.0,
            low_low_level_pct: 5.0,
            low_low_reset_pct: 15.0,
            rwst_boron_ppm: 2_600.0,
        }
    }
}

/// Boron Recycle System holdup and evaporator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrsConfig {
    pub holdup_capacity_gal: f64,
    pub initial_holdup_gal: f64,
    pub initial_holdup_ppm: f64,
    pub initial_distillate_gal: f64,
    pub evaporator_gpm: f64,
    pub batch_start_gal: f64,
    pub batch_stop_gal: f64,
    pub distillate_ppm: f64,
    pub concentrate_ppm: f64,
    /// Distillate needed before auto makeup selects the BRS as source
    pub min_distillate_for_makeup_gal: f64,
    pub holdup_high_alarm_fraction: f64,
}

impl Default for BrsConfig {
    fn default() -> Self {
        Self {
            holdup_capacity_gal: 112_000.0,
            initial_holdup_gal: 0.0,
            initial_holdup_ppm: 0.0,
            initial_distillate_gal: 5_000.0,
            evaporator_gpm: 30.0,
            batch_start_gal: 5_000.0,
            batch_stop_gal: 500.0,
            distillate_ppm: 0.0,
            concentrate_ppm: 7_000.0,
            min_distillate_for_makeup_gal: 100.0,
            holdup_high_alarm_fraction: 0.9,
        }
    }
}

/// System inventory audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub tolerance_gal: f64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { tolerance_gal: 5.0 }
    }
}

/// Complete simulator configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub plant: PlantConfig,
    pub level_program: LevelProgram,
    pub pi: PiConfig,
    pub charging: ChargingConfig,
    pub seals: SealConfig,
    pub letdown: LetdownConfig,
    pub orifice: OrificeConfig,
    pub vct: VctConfig,
    pub brs: BrsConfig,
    pub audit: AuditConfig,
}

impl SimConfig {
    /// Load a configuration file; `.json` is parsed as JSON, anything else as TOML.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let cfg: SimConfig = if is_json {
            serde_json::from_str(&content)?
        } else {
            toml::from_str(&content)?
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Try the default search paths, falling back to built-in defaults.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        for path in &CONFIG_PATHS {
            if Path::new(path).exists() {
                log::info!("loading configuration from {path}");
                return Self::from_path(path);
            }
        }
        log::warn!("no configuration file found, using built-in defaults");
        Ok(Self::default())
    }

    /// Serialize to pretty TOML, e.g. to write out a template for editing.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Check positivity and the ordering of every threshold pair.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn require(ok: bool, msg: &str) -> Result<(), ConfigError> {
            if ok {
                Ok(())
            } else {
                Err(ConfigError::Invalid(msg.to_string()))
            }
        }

        let p = &self.plant;
        require(p.rcs_loop_volume_ft3 > 0.0, "plant.rcs_loop_volume_ft3 must be positive")?;
        require(p.pressurizer_volume_ft3 > 0.0, "plant.pressurizer_volume_ft3 must be positive")?;
        require(p.initial_boron_ppm >= 0.0, "plant.initial_boron_ppm must not be negative")?;
        require(
            p.solid_plant_lineup_gpm >= 0.0,
            "plant.solid_plant_lineup_gpm must not be negative",
        )?;
        require(p.drain_letdown_gpm >= 0.0, "plant.drain_letdown_gpm must not be negative")?;

        require(!self.level_program.points.is_empty(), "level_program.points must not be empty")?;
        require(
            self.level_program
                .points
                .windows(2)
                .all(|w| w[0].temp_f < w[1].temp_f),
            "level_program.points must be sorted by strictly increasing temperature",
        )?;

        require(self.pi.kp_gpm_per_pct >= 0.0, "pi.kp_gpm_per_pct must not be negative")?;
        require(self.pi.ki_gpm_per_pct_min >= 0.0, "pi.ki_gpm_per_pct_min must not be negative")?;
        require(
            self.pi.integral_authority_gpm >= 0.0,
            "pi.integral_authority_gpm must not be negative",
        )?;

        let c = &self.charging;
        require(
            c.min_gpm >= 0.0 && c.max_gpm > c.min_gpm,
            "charging limits must satisfy 0 <= min < max",
        )?;

        let s = &self.seals;
        require(
            s.injection_per_pump_gpm >= 0.0,
            "seals.injection_per_pump_gpm must not be negative",
        )?;
        require(
            s.leakoff_per_pump_gpm >= 0.0 && s.leakoff_per_pump_gpm <= s.injection_per_pump_gpm,
            "seals.leakoff_per_pump_gpm must lie within [0, injection]",
        )?;
        require(
            s.cbo_loss_per_pump_gpm >= 0.0 && s.cbo_loss_per_pump_gpm <= s.leakoff_per_pump_gpm,
            "seals.cbo_loss_per_pump_gpm must lie within [0, leakoff]",
        )?;

        let l = &self.letdown;
        require(
            l.isolation_hysteresis_pct > 0.0,
            "letdown.isolation_hysteresis_pct must be positive",
        )?;
        require(
            l.large_orifice_gpm > 0.0 && l.small_orifice_gpm > 0.0,
            "letdown orifice capacities must be positive",
        )?;
        require(
            l.reference_dp_psid > 0.0 && l.reference_density_lbm_ft3 > 0.0,
            "letdown reference conditions must be positive",
        )?;

        let o = &self.orifice;
        require(
            o.small_open_error_pct < o.large_open_error_pct,
            "orifice.small_open_error_pct must be below large_open_error_pct",
        )?;
        require(
            o.hysteresis_pct > 0.0 && o.hysteresis_pct < o.small_open_error_pct,
            "orifice.hysteresis_pct must lie within (0, small_open_error_pct)",
        )?;
        require(
            o.min_action_interval_hr >= 0.0,
            "orifice.min_action_interval_hr must not be negative",
        )?;
        require(
            matches!(o.initial_large_open, 1 | 2),
            "orifice.initial_large_open must be 1 or 2",
        )?;

        let v = &self.vct;
        require(v.capacity_gal > 0.0, "vct.capacity_gal must be positive")?;
        require(
            (0.0..=100.0).contains(&v.initial_level_pct),
            "vct.initial_level_pct must lie within [0, 100]",
        )?;
        require(
            v.divert_off_pct < v.divert_on_pct,
            "vct.divert_off_pct must be below divert_on_pct",
        )?;
        require(
            v.makeup_start_pct < v.makeup_stop_pct,
            "vct.makeup_start_pct must be below makeup_stop_pct",
        )?;
        require(
            v.makeup_stop_pct < v.divert_off_pct,
            "vct.makeup_stop_pct must be below divert_off_pct",
        )?;
        require(
            v.low_low_level_pct < v.low_low_reset_pct,
            "vct.low_low_level_pct must be below low_low_reset_pct",
        )?;
        require(v.makeup_gpm >= 0.0, "vct.makeup_gpm must not be negative")?;

        let b = &self.brs;
        require(b.holdup_capacity_gal > 0.0, "brs.holdup_capacity_gal must be positive")?;
        require(b.evaporator_gpm >= 0.0, "brs.evaporator_gpm must not be negative")?;
        require(
            b.batch_stop_gal < b.batch_start_gal,
            "brs.batch_stop_gal must be below batch_start_gal",
        )?;
        require(
            b.distillate_ppm >= 0.0 && b.distillate_ppm < b.concentrate_ppm,
            "brs product concentrations must satisfy 0 <= distillate < concentrate",
        )?;

        require(self.audit.tolerance_gal > 0.0, "audit.tolerance_gal must be positive")?;
        Ok(())
    }
}
