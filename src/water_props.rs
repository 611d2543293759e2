//! Water/steam property provider
//!
//! Thin wrappers around the IAPWS-IF97 formulation in `seuif97`, converted to the
//! plant units used everywhere else in the crate (°F, psia, lbm/ft³, Btu/lbm).
//! All functions are pure; non-finite results are reported as [`PropertyError`]
//! so callers can hold the last good value instead of propagating NaN.

use seuif97::{pt, OH, OV};

use crate::error::PropertyError;

pub const GAL_PER_FT3: f64 = 7.480_52;
const MPA_PER_PSIA: f64 = 0.006_894_757;
const LBM_FT3_PER_KG_M3: f64 = 0.062_427_96;
const BTU_LBM_PER_KJ_KG: f64 = 0.429_922_6;

/// IF97 region-4 backward-equation coefficients n1..n10
const R4_N: [f64; 10] = [
    1_167.052_145_276_7,
    -724_213.167_032_06,
    -17.073_846_940_092,
    12_020.824_702_47,
    -3_232_555.032_233_3,
    14.915_108_613_53,
    -4_823.265_736_159_1,
    405_113.405_420_57,
    -0.238_555_575_678_49,
    650.175_348_447_98,
];

const P_CRIT_MPA: f64 = 22.064;
const P_TRIPLE_MPA: f64 = 611.213e-6;
/// Above this pressure saturation lies in IF97 region 3
const P_REGION3_MPA: f64 = 16.529;
/// Offset from saturation used to pick the liquid/vapour side [°C]
const SAT_SIDE_OFFSET_C: f64 = 0.01;

pub fn f_to_c(t_f: f64) -> f64 {
    (t_f - 32.0) / 1.8
}

pub fn c_to_f(t_c: f64) -> f64 {
    t_c * 1.8 + 32.0
}

fn psia_to_mpa(p_psia: f64) -> f64 {
    p_psia * MPA_PER_PSIA
}

fn density_from_specific_volume(v_m3_kg: f64, context: &str) -> Result<f64, PropertyError> {
    if !v_m3_kg.is_finite() || v_m3_kg <= 0.0 {
        return Err(PropertyError::Calculation {
            context: format!("{context}: specific volume {v_m3_kg}"),
        });
    }
    Ok(LBM_FT3_PER_KG_M3 / v_m3_kg)
}

fn check_pressure(p_psia: f64) -> Result<f64, PropertyError> {
    let p_mpa = psia_to_mpa(p_psia);
    if !p_mpa.is_finite() || p_mpa <= 0.0 {
        return Err(PropertyError::OutOfDomain {
            context: format!("pressure {p_psia} psia"),
        });
    }
    Ok(p_mpa)
}

/// Density of water at the given temperature and pressure.
///
/// # Arguments
/// * `t_f` - Temperature [°F]
/// * `p_psia` - Pressure [psia]
///
/// # Returns
/// Density [lbm/ft³]
pub fn liquid_density(t_f: f64, p_psia: f64) -> Result<f64, PropertyError> {
    let p_mpa = check_pressure(p_psia)?;
    let v = pt(p_mpa, f_to_c(t_f), OV);
    density_from_specific_volume(v, &format!("density at {t_f:.1} F / {p_psia:.1} psia"))
}

/// Specific enthalpy of water at the given temperature and pressure.
///
/// # Returns
/// Enthalpy [Btu/lbm]
pub fn specific_enthalpy(t_f: f64, p_psia: f64) -> Result<f64, PropertyError> {
    let p_mpa = check_pressure(p_psia)?;
    let h_kj = pt(p_mpa, f_to_c(t_f), OH);
    if !h_kj.is_finite() {
        return Err(PropertyError::Calculation {
            context: format!("enthalpy at {t_f:.1} F / {p_psia:.1} psia"),
        });
    }
    Ok(h_kj * BTU_LBM_PER_KJ_KG)
}

/// Saturation temperature from the IF97 region-4 backward equation.
///
/// # Arguments
/// * `p_psia` - Pressure [psia], between the triple point and the critical point
///
/// # Returns
/// Saturation temperature [°F]
pub fn saturation_temperature(p_psia: f64) -> Result<f64, PropertyError> {
    let p_mpa = check_pressure(p_psia)?;
    if !(P_TRIPLE_MPA..=P_CRIT_MPA).contains(&p_mpa) {
        return Err(PropertyError::OutOfDomain {
            context: format!("saturation temperature at {p_psia:.1} psia"),
        });
    }
    let n = &R4_N;
    let beta = p_mpa.powf(0.25);
    let e = beta * beta + n[2] * beta + n[5];
    let f = n[0] * beta * beta + n[3] * beta + n[6];
    let g = n[1] * beta * beta + n[4] * beta + n[7];
    let d = 2.0 * g / (-f - (f * f - 4.0 * e * g).sqrt());
    let t_k = (n[9] + d - ((n[9] + d).powi(2) - 4.0 * (n[8] + n[9] * d)).sqrt()) / 2.0;
    if !t_k.is_finite() {
        return Err(PropertyError::Calculation {
            context: format!("saturation temperature at {p_psia:.1} psia"),
        });
    }
    Ok(c_to_f(t_k - 273.15))
}

/// Saturated liquid density at the given pressure.
///
/// # Returns
/// Density [lbm/ft³]
pub fn saturated_liquid_density(p_psia: f64) -> Result<f64, PropertyError> {
    let p_mpa = check_pressure(p_psia)?;
    let t_c = f_to_c(saturation_temperature(p_psia)?) - SAT_SIDE_OFFSET_C;
    let region = if p_mpa > P_REGION3_MPA { 3 } else { 1 };
    let v = pt(p_mpa, t_c, (OV, region));
    density_from_specific_volume(v, &format!("saturated liquid at {p_psia:.1} psia"))
}

/// Saturated vapour density at the given pressure.
///
/// # Returns
/// Density [lbm/ft³]
pub fn saturated_vapor_density(p_psia: f64) -> Result<f64, PropertyError> {
    let p_mpa = check_pressure(p_psia)?;
    let t_c = f_to_c(saturation_temperature(p_psia)?) + SAT_SIDE_OFFSET_C;
    let region = if p_mpa > P_REGION3_MPA { 3 } else { 2 };
    let v = pt(p_mpa, t_c, (OV, region));
    density_from_specific_volume(v, &format!("saturated vapour at {p_psia:.1} psia"))
}
