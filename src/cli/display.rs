//! Terminal rendering of reports and statistics with `comfy-table`.

use crate::aqi::AqiResult;
use crate::models::{
    AqiCategory, CityAqiHistory, DataQuality, GroupSummary, NetworkStats, Pollutant,
    PollutantReading, RankingReport,
};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

/// Shown instead of an empty table.
pub const NO_DATA_MESSAGE: &str = "No data currently available";

fn category_color(category: AqiCategory) -> Color {
    match category {
        AqiCategory::Good => Color::Green,
        AqiCategory::Moderate => Color::Yellow,
        AqiCategory::Unhealthy => Color::DarkYellow,
        AqiCategory::VeryUnhealthy => Color::Red,
        AqiCategory::Hazardous => Color::Magenta,
    }
}

fn quality_color(quality: DataQuality) -> Color {
    match quality {
        DataQuality::Excellent => Color::Green,
        DataQuality::Good => Color::Cyan,
        DataQuality::Fair => Color::Yellow,
        DataQuality::Poor => Color::DarkGrey,
    }
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            header
                .into_iter()
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold)),
        );
    table
}

fn numeric(value: impl ToString) -> Cell {
    Cell::new(value).set_alignment(CellAlignment::Right)
}

fn or_dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

fn category_cell(category: AqiCategory) -> Cell {
    Cell::new(category.label()).fg(category_color(category))
}

/// Ranked stations, or the no-data message when the report is empty.
pub fn render_rankings(report: &RankingReport) -> String {
    if report.is_empty() {
        return NO_DATA_MESSAGE.to_string();
    }

    let mut table = new_table(vec![
        "#", "Station", "City", "Country", "AQI", "Category", "Dominant", "Quality", "Observed (UTC)",
    ]);
    for entry in &report.entries {
        let observation = &entry.observation;
        table.add_row(vec![
            numeric(entry.rank),
            Cell::new(&observation.name),
            Cell::new(or_dash(observation.city.as_deref())),
            Cell::new(or_dash(observation.region.as_deref())),
            numeric(observation.aqi()).fg(category_color(observation.category())),
            category_cell(observation.category()),
            Cell::new(
                observation
                    .dominant_pollutant()
                    .map(Pollutant::label)
                    .unwrap_or("-"),
            ),
            Cell::new(entry.quality.key()).fg(quality_color(entry.quality)),
            Cell::new(observation.observed_at.format("%Y-%m-%d %H:%M")),
        ]);
    }
    table.to_string()
}

/// Network totals followed by the category and data-quality distributions.
pub fn render_stats(stats: &NetworkStats) -> String {
    if stats.total_stations == 0 {
        return NO_DATA_MESSAGE.to_string();
    }

    let fmt_aqi = |aqi: Option<u16>| aqi.map(|a| a.to_string()).unwrap_or_else(|| "-".to_string());
    let mut totals = new_table(vec!["Metric", "Value"]);
    totals.add_row(vec![Cell::new("Stations"), numeric(stats.total_stations)]);
    totals.add_row(vec![Cell::new("Measured stations"), numeric(stats.measured_stations)]);
    totals.add_row(vec![Cell::new("Cities"), numeric(stats.total_cities)]);
    totals.add_row(vec![Cell::new("Countries"), numeric(stats.total_countries)]);
    totals.add_row(vec![Cell::new("Average AQI"), numeric(format!("{:.1}", stats.average_aqi))]);
    totals.add_row(vec![Cell::new("Max AQI"), numeric(fmt_aqi(stats.max_aqi))]);
    totals.add_row(vec![Cell::new("Min AQI"), numeric(fmt_aqi(stats.min_aqi))]);

    let mut categories = new_table(vec!["Category", "Stations"]);
    for (category, count) in &stats.category_distribution {
        categories.add_row(vec![category_cell(*category), numeric(count)]);
    }

    let mut quality = new_table(vec!["Data quality", "Stations"]);
    for (tag, count) in &stats.quality_distribution {
        quality.add_row(vec![
            Cell::new(tag.key()).fg(quality_color(*tag)),
            numeric(count),
        ]);
    }

    format!("{}\n{}\n{}", totals, categories, quality)
}

/// Country or city roll-ups; `label` names the key column.
pub fn render_groups(label: &str, summaries: &[GroupSummary]) -> String {
    if summaries.is_empty() {
        return NO_DATA_MESSAGE.to_string();
    }

    let mut table = new_table(vec![label, "Stations", "Measured", "Cities", "Avg AQI", "Worst"]);
    for summary in summaries {
        table.add_row(vec![
            Cell::new(&summary.key),
            numeric(summary.stations),
            numeric(summary.measured_stations),
            numeric(summary.cities),
            numeric(format!("{:.1}", summary.average_aqi)),
            summary
                .worst_category
                .map(category_cell)
                .unwrap_or_else(|| Cell::new("-")),
        ]);
    }
    table.to_string()
}

/// Per-pollutant sub-indices and the overall result of an ad hoc calculation.
pub fn render_aqi(reading: &PollutantReading, sub_indices: &[(Pollutant, u16)], result: &AqiResult) -> String {
    if !result.is_measured() {
        return "No usable pollutant values given".to_string();
    }

    let mut table = new_table(vec!["Pollutant", "Concentration", "Sub-index"]);
    for (pollutant, sub_index) in sub_indices {
        let concentration = reading
            .valid(*pollutant)
            .map(|v| format!("{} {}", v, pollutant.unit()))
            .unwrap_or_else(|| "-".to_string());
        let mut cell = numeric(sub_index);
        if Some(*pollutant) == result.dominant_pollutant {
            cell = cell.add_attribute(Attribute::Bold);
        }
        table.add_row(vec![Cell::new(pollutant.label()), numeric(concentration), cell]);
    }
    table.add_row(vec![
        Cell::new("AQI").add_attribute(Attribute::Bold),
        category_cell(result.category),
        numeric(result.aqi).fg(category_color(result.category)),
    ]);
    table.to_string()
}

/// Daily archive history for one city.
pub fn render_history(rows: &[CityAqiHistory]) -> String {
    if rows.is_empty() {
        return NO_DATA_MESSAGE.to_string();
    }

    let mut table = new_table(vec!["Day", "City", "Avg AQI", "Max AQI", "Samples"]);
    for row in rows {
        let worst = u16::try_from(row.max_aqi).map(AqiCategory::from_aqi).ok();
        let max_cell = match worst {
            Some(category) => numeric(row.max_aqi).fg(category_color(category)),
            None => numeric(row.max_aqi),
        };
        table.add_row(vec![
            Cell::new(row.day.format("%Y-%m-%d")),
            Cell::new(&row.city),
            numeric(format!("{:.1}", row.average_aqi)),
            max_cell,
            numeric(row.samples),
        ]);
    }
    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{compute_stats, rank_worst};
    use crate::aqi::{compute_aqi, sub_indices};
    use crate::models::{GeoPoint, RankingKind, StationObservation};
    use chrono::{TimeZone, Utc};

    fn observations() -> Vec<StationObservation> {
        let at = Utc.with_ymd_and_hms(2024, 12, 1, 12, 0, 0).unwrap();
        vec![
            StationObservation::new(
                "s-1",
                "Tuzla Centar",
                GeoPoint::new(18.67, 44.54),
                PollutantReading::default().with(Pollutant::Pm25, 80.0),
                at,
            )
            .with_city("Tuzla")
            .with_region("BA"),
            StationObservation::new(
                "s-2",
                "Ljubljana Bežigrad",
                GeoPoint::new(14.51, 46.07),
                PollutantReading::default().with(Pollutant::Pm10, 20.0),
                at,
            )
            .with_city("Ljubljana")
            .with_region("SI"),
        ]
    }

    fn report(entries_from: &[StationObservation]) -> RankingReport {
        let as_of = Utc.with_ymd_and_hms(2024, 12, 1, 12, 30, 0).unwrap();
        RankingReport {
            kind: RankingKind::Worst,
            limit: 10,
            generated_at: as_of,
            entries: rank_worst(entries_from, 10, as_of),
            stats: compute_stats(entries_from, as_of),
        }
    }

    #[test]
    fn test_render_rankings_lists_stations() {
        let rendered = render_rankings(&report(&observations()));
        assert!(rendered.contains("Tuzla Centar"));
        assert!(rendered.contains("Ljubljana Bežigrad"));
        assert!(rendered.contains("Very Unhealthy"));
        assert!(rendered.find("Tuzla Centar") < rendered.find("Ljubljana Bežigrad"));
    }

    #[test]
    fn test_empty_outputs_show_no_data() {
        let empty = report(&[]);
        assert_eq!(render_rankings(&empty), NO_DATA_MESSAGE);
        assert_eq!(render_stats(&empty.stats), NO_DATA_MESSAGE);
        assert_eq!(render_groups("Country", &[]), NO_DATA_MESSAGE);
        assert_eq!(render_history(&[]), NO_DATA_MESSAGE);
    }

    #[test]
    fn test_render_stats_and_aqi() {
        let stats = report(&observations()).stats;
        let rendered = render_stats(&stats);
        assert!(rendered.contains("Average AQI"));
        assert!(rendered.contains("excellent"));

        let reading = PollutantReading::default().with(Pollutant::Pm25, 35.5);
        let rendered = render_aqi(&reading, &sub_indices(&reading), &compute_aqi(&reading));
        assert!(rendered.contains("101"));
        assert!(rendered.contains("Unhealthy"));

        let empty = PollutantReading::default();
        assert!(render_aqi(&empty, &[], &compute_aqi(&empty)).starts_with("No usable"));
    }
}
