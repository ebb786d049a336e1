//! AQI computation: piecewise-linear interpolation per pollutant, worst pollutant wins.
//!
//! Nothing here fails. Missing or negative concentrations are skipped, values above a
//! table's ceiling saturate at 500, and an empty reading yields AQI 0 with no
//! dominant pollutant.

use super::breakpoints::BreakpointTable;
use crate::models::{AqiCategory, Pollutant, PollutantReading};
use serde::Serialize;

/// Largest value the index can take.
pub const MAX_AQI: u16 = 500;

/// Overall AQI for a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AqiResult {
    pub aqi: u16,
    pub category: AqiCategory,
    /// Pollutant whose sub-index produced `aqi`; `None` when nothing was reported.
    pub dominant_pollutant: Option<Pollutant>,
}

impl AqiResult {
    /// A zero AQI with no dominant pollutant means "no data", not "clean air".
    pub fn is_measured(&self) -> bool {
        self.dominant_pollutant.is_some()
    }
}

/// Sub-index for a concentration expressed in the table's own unit.
///
/// Returns `None` for negative or non-finite input; those count as "not reported".
pub fn compute_sub_index(concentration: f64, table: &BreakpointTable) -> Option<u16> {
    if !concentration.is_finite() || concentration < 0.0 {
        return None;
    }

    let c = table.truncate(concentration);
    if c > table.ceiling() {
        return Some(MAX_AQI);
    }

    let row = table
        .rows
        .iter()
        .find(|row| c >= row.conc_low && c <= row.conc_high)
        // Truncation leaves no gaps, so this only triggers on a malformed table.
        .or_else(|| table.rows.iter().find(|row| c <= row.conc_high))?;

    let (i_low, i_high) = (f64::from(row.aqi_low), f64::from(row.aqi_high));
    let index = (i_high - i_low) / (row.conc_high - row.conc_low) * (c - row.conc_low) + i_low;
    Some(index.round().clamp(0.0, f64::from(MAX_AQI)) as u16)
}

/// Sub-index for a pollutant value in the reading's canonical unit (µg/m³, mg/m³ for CO).
pub fn pollutant_sub_index(pollutant: Pollutant, value: f64) -> Option<u16> {
    let table = BreakpointTable::for_pollutant(pollutant);
    compute_sub_index(table.from_reading_unit(value), table)
}

/// Every computable sub-index in the reading, in canonical pollutant order.
pub fn sub_indices(reading: &PollutantReading) -> Vec<(Pollutant, u16)> {
    reading
        .reported()
        .filter_map(|(pollutant, value)| {
            pollutant_sub_index(pollutant, value).map(|index| (pollutant, index))
        })
        .collect()
}

/// Overall AQI: the maximum sub-index across reported pollutants.
///
/// Ties keep the earlier pollutant in canonical order as the dominant one.
pub fn compute_aqi(reading: &PollutantReading) -> AqiResult {
    let worst = sub_indices(reading)
        .into_iter()
        .fold(None::<(Pollutant, u16)>, |acc, (pollutant, index)| match acc {
            Some((_, best)) if best >= index => acc,
            _ => Some((pollutant, index)),
        });

    match worst {
        Some((pollutant, aqi)) => AqiResult {
            aqi,
            category: AqiCategory::from_aqi(aqi),
            dominant_pollutant: Some(pollutant),
        },
        None => AqiResult {
            aqi: 0,
            category: AqiCategory::Good,
            dominant_pollutant: None,
        },
    }
}
