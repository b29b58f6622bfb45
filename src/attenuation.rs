//! Signal loss through building materials.
//!
//! The loss of a slab combines a conductive term from the plane-wave
//! attenuation constant and a dielectric term from the reflections at its two
//! air/material interfaces. Both terms are linear in the traversed thickness.

use crate::material::Material;
use std::f64::consts::PI;

/// Vacuum permittivity in F/m.
pub const VACUUM_PERMITTIVITY: f64 = 8.854_187_8128e-12;
/// Speed of light in m/s.
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;
/// Conversion factor from nepers to decibels (20 / ln 10).
pub const NEPER_TO_DB: f64 = 8.685_889_638;

/// Conductivity above which a material is treated as a conductor.
pub const CONDUCTOR_THRESHOLD: f64 = 1e3;
/// Upper bound on the loss through a conductor.
pub const METAL_ATTENUATION_DB: f64 = 40.0;

/// Loss in dB of a signal at `frequency_ghz` crossing `thickness` meters of `material`.
pub fn attenuation_db(material: &Material, thickness: f64, frequency_ghz: f64) -> f64 {
    if thickness <= 0.0 {
        return 0.0;
    }

    let conductive = conductive_loss_db_per_m(material, frequency_ghz) * thickness;
    if material.conductivity >= CONDUCTOR_THRESHOLD {
        return conductive.min(METAL_ATTENUATION_DB);
    }

    let dielectric = interface_loss_db(material) * thickness / material.thickness;
    conductive + dielectric
}

/// Conductive loss per meter from the real part of the propagation constant.
///
/// With εc = εr - jσ/(ωε0), the attenuation constant is
/// α = (ω/c) · sqrt((|εc| - εr) / 2).
pub fn conductive_loss_db_per_m(material: &Material, frequency_ghz: f64) -> f64 {
    let omega = 2.0 * PI * frequency_ghz * 1e9;
    let loss_ratio = material.conductivity / (omega * VACUUM_PERMITTIVITY);
    let eps_r = material.permittivity;
    let eps_abs = eps_r.hypot(loss_ratio);
    // `eps_abs - eps_r` cancels badly for small ratios.
    let half_diff = 0.5 * loss_ratio * loss_ratio / (eps_abs + eps_r);
    let alpha = omega / SPEED_OF_LIGHT * half_diff.sqrt();
    NEPER_TO_DB * alpha
}

/// Reflection loss of a slab of reference thickness at normal incidence.
pub fn interface_loss_db(material: &Material) -> f64 {
    let n = material.permittivity.sqrt();
    let gamma = (1.0 - n) / (1.0 + n);
    -20.0 * (1.0 - gamma * gamma).log10()
}
