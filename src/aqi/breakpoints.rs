//! US EPA breakpoint tables and unit handling.
//!
//! Each table works in its pollutant's native EPA unit (µg/m³ for particulates,
//! ppb for NO2/O3/SO2, ppm for CO). Readings are stored in µg/m³ (mg/m³ for CO), so
//! `BreakpointTable::from_reading_unit` converts before lookup.

use crate::models::Pollutant;

// µg/m³ per ppb at 25 °C. For CO the same figure is mg/m³ per ppm.
const NO2_UG_PER_PPB: f64 = 1.88;
const O3_UG_PER_PPB: f64 = 1.96;
const SO2_UG_PER_PPB: f64 = 2.62;
const CO_MG_PER_PPM: f64 = 1.145;

/// One row: concentrations `[conc_low, conc_high]` map onto `[aqi_low, aqi_high]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breakpoint {
    pub conc_low: f64,
    pub conc_high: f64,
    pub aqi_low: u16,
    pub aqi_high: u16,
}

const fn bp(conc_low: f64, conc_high: f64, aqi_low: u16, aqi_high: u16) -> Breakpoint {
    Breakpoint {
        conc_low,
        conc_high,
        aqi_low,
        aqi_high,
    }
}

/// Ascending, non-overlapping rows for one pollutant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakpointTable {
    pub pollutant: Pollutant,
    /// Unit of `conc_low`/`conc_high`.
    pub unit: &'static str,
    /// Concentrations are truncated to this many decimals before lookup.
    pub decimals: i32,
    pub rows: &'static [Breakpoint],
}

pub const PM25_TABLE: BreakpointTable = BreakpointTable {
    pollutant: Pollutant::Pm25,
    unit: "µg/m³",
    decimals: 1,
    rows: &[
        bp(0.0, 12.0, 0, 50),
        bp(12.1, 35.4, 51, 100),
        bp(35.5, 55.4, 101, 150),
        bp(55.5, 150.4, 151, 200),
        bp(150.5, 250.4, 201, 300),
        bp(250.5, 350.4, 301, 400),
        bp(350.5, 500.4, 401, 500),
    ],
};

pub const PM10_TABLE: BreakpointTable = BreakpointTable {
    pollutant: Pollutant::Pm10,
    unit: "µg/m³",
    decimals: 0,
    rows: &[
        bp(0.0, 54.0, 0, 50),
        bp(55.0, 154.0, 51, 100),
        bp(155.0, 254.0, 101, 150),
        bp(255.0, 354.0, 151, 200),
        bp(355.0, 424.0, 201, 300),
        bp(425.0, 504.0, 301, 400),
        bp(505.0, 604.0, 401, 500),
    ],
};

pub const NO2_TABLE: BreakpointTable = BreakpointTable {
    pollutant: Pollutant::No2,
    unit: "ppb",
    decimals: 0,
    rows: &[
        bp(0.0, 53.0, 0, 50),
        bp(54.0, 100.0, 51, 100),
        bp(101.0, 360.0, 101, 150),
        bp(361.0, 649.0, 151, 200),
        bp(650.0, 1249.0, 201, 300),
        bp(1250.0, 1649.0, 301, 400),
        bp(1650.0, 2049.0, 401, 500),
    ],
};

// 8-hour rows up to 200 ppb; the top two rows follow the 1-hour table and start
// where the 8-hour table ends so the table stays contiguous.
pub const O3_TABLE: BreakpointTable = BreakpointTable {
    pollutant: Pollutant::O3,
    unit: "ppb",
    decimals: 0,
    rows: &[
        bp(0.0, 54.0, 0, 50),
        bp(55.0, 70.0, 51, 100),
        bp(71.0, 85.0, 101, 150),
        bp(86.0, 105.0, 151, 200),
        bp(106.0, 200.0, 201, 300),
        bp(201.0, 504.0, 301, 400),
        bp(505.0, 604.0, 401, 500),
    ],
};

pub const SO2_TABLE: BreakpointTable = BreakpointTable {
    pollutant: Pollutant::So2,
    unit: "ppb",
    decimals: 0,
    rows: &[
        bp(0.0, 35.0, 0, 50),
        bp(36.0, 75.0, 51, 100),
        bp(76.0, 185.0, 101, 150),
        bp(186.0, 304.0, 151, 200),
        bp(305.0, 604.0, 201, 300),
        bp(605.0, 804.0, 301, 400),
        bp(805.0, 1004.0, 401, 500),
    ],
};

pub const CO_TABLE: BreakpointTable = BreakpointTable {
    pollutant: Pollutant::Co,
    unit: "ppm",
    decimals: 1,
    rows: &[
        bp(0.0, 4.4, 0, 50),
        bp(4.5, 9.4, 51, 100),
        bp(9.5, 12.4, 101, 150),
        bp(12.5, 15.4, 151, 200),
        bp(15.5, 30.4, 201, 300),
        bp(30.5, 40.4, 301, 400),
        bp(40.5, 50.4, 401, 500),
    ],
};

impl BreakpointTable {
    /// The table used for a pollutant.
    pub fn for_pollutant(pollutant: Pollutant) -> &'static BreakpointTable {
        match pollutant {
            Pollutant::Pm25 => &PM25_TABLE,
            Pollutant::Pm10 => &PM10_TABLE,
            Pollutant::No2 => &NO2_TABLE,
            Pollutant::O3 => &O3_TABLE,
            Pollutant::So2 => &SO2_TABLE,
            Pollutant::Co => &CO_TABLE,
        }
    }

    /// Converts a value in the reading's canonical unit into this table's unit.
    pub fn from_reading_unit(&self, value: f64) -> f64 {
        match self.pollutant {
            Pollutant::Pm25 | Pollutant::Pm10 => value,
            Pollutant::No2 => value / NO2_UG_PER_PPB,
            Pollutant::O3 => value / O3_UG_PER_PPB,
            Pollutant::So2 => value / SO2_UG_PER_PPB,
            Pollutant::Co => value / CO_MG_PER_PPM,
        }
    }

    /// EPA truncation to the table's precision.
    pub fn truncate(&self, concentration: f64) -> f64 {
        let scale = 10f64.powi(self.decimals);
        // The epsilon keeps values like 35.4 * 10 = 354.00000000000006 or
        // 0.3 * 10 = 2.9999999999999996 on the intended integer.
        (concentration * scale + 1e-9).floor() / scale
    }

    /// Top of the highest row.
    pub fn ceiling(&self) -> f64 {
        self.rows.last().map_or(0.0, |row| row.conc_high)
    }
}

/// Converts a provider value and unit into the canonical reading unit for `pollutant`
/// (µg/m³, or mg/m³ for CO). Returns `None` for unknown units or nonsensical
/// combinations such as particulates in ppm.
pub fn normalize_concentration(pollutant: Pollutant, value: f64, unit: &str) -> Option<f64> {
    let unit = canonical_unit(unit);
    let per_ppb = match pollutant {
        Pollutant::No2 => Some(NO2_UG_PER_PPB),
        Pollutant::O3 => Some(O3_UG_PER_PPB),
        Pollutant::So2 => Some(SO2_UG_PER_PPB),
        Pollutant::Co => Some(CO_MG_PER_PPM),
        Pollutant::Pm25 | Pollutant::Pm10 => None,
    };

    match (pollutant, unit.as_str()) {
        (Pollutant::Co, "ug/m3") => Some(value / 1000.0),
        (Pollutant::Co, "mg/m3") => Some(value),
        (Pollutant::Co, "ppm") => Some(value * CO_MG_PER_PPM),
        (Pollutant::Co, "ppb") => Some(value / 1000.0 * CO_MG_PER_PPM),
        (_, "ug/m3") => Some(value),
        (_, "mg/m3") => Some(value * 1000.0),
        (_, "ppm") => per_ppb.map(|f| value * 1000.0 * f),
        (_, "ppb") => per_ppb.map(|f| value * f),
        _ => None,
    }
}

/// Lowercase ASCII spelling of a unit: both micro signs become `u`, `³` becomes `3`.
fn canonical_unit(unit: &str) -> String {
    unit.trim()
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            'µ' | 'μ' => 'u',
            '³' => '3',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}
