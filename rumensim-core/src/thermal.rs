//! Thermal normalization and headspace gas accounting.
//!
//! Pressure readings are taken at incubation temperature (~39 °C) and
//! standardized to 0 °C through the ideal-gas proportionality. The mole
//! helpers back the initial vessel configuration command (PV = nRT).

/// 0 °C in Kelvin.
pub const ZERO_CELSIUS_K: f64 = 273.15;

/// Ideal gas constant in L·bar/(mol·K).
pub const GAS_CONSTANT_L_BAR: f64 = 0.08314;

/// Standardize a measured pressure to 0 °C.
///
/// `P_std = P_meas * 273.15 / (T_C + 273.15)`. Callers must reject
/// temperatures at or below -273.15 °C before calling.
pub fn normalize(p_bar: f64, t_celsius: f64) -> f64 {
    p_bar * ZERO_CELSIUS_K / (t_celsius + ZERO_CELSIUS_K)
}

pub fn kelvin(t_celsius: f64) -> f64 {
    t_celsius + ZERO_CELSIUS_K
}

/// Gas headspace of a vessel in liters, from total and solution volumes in ml.
pub fn headspace_liters(total_ml: f64, solution_ml: f64) -> f64 {
    (total_ml - solution_ml) / 1000.0
}

/// Moles of gas via PV = nRT.
pub fn moles(p_bar: f64, volume_l: f64, t_celsius: f64) -> f64 {
    (p_bar * volume_l) / (GAS_CONSTANT_L_BAR * kelvin(t_celsius))
}
