//! Indoor WiFi coverage simulation.
//!
//! A [`layout::BuildingLayout`] holds a material grid and the access points of
//! a floor. The [`engine`] evaluates the propagation model of [`propagation`]
//! for every access point at every point of a sampling grid, and [`coverage`]
//! reduces the resulting per-AP grids into a best-server surface with
//! coverage statistics.

pub mod attenuation;
pub mod config;
pub mod coverage;
pub mod engine;
pub mod error;
pub mod export;
pub mod floor_plan;
pub mod geometry;
pub mod layout;
pub mod material;
pub mod propagation;
pub mod stats;

pub use error::{Error, Result};
