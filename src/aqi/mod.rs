//! Air Quality Index calculation.
//!
//! Includes:
//! - `breakpoints`: EPA breakpoint tables per pollutant and provider unit normalisation.
//! - `calculator`: sub-index interpolation and the overall (worst pollutant) AQI.

mod breakpoints;
mod calculator;

pub use breakpoints::*;
pub use calculator::*;
