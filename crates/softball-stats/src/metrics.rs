// Derived batting metrics from counting totals.

use serde::Serialize;
use softball_core::model::StatTotals;

/// Derived values presented alongside raw totals. Rates are rounded to three
/// decimal places; OPS is summed before rounding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DerivedMetrics {
    pub plate_appearances: u64,
    pub total_bases: u64,
    pub average: f64,
    pub slugging: f64,
    pub on_base_percent: f64,
    pub on_base_percent_plus_slugging: f64,
}

/// `AB + BB + HBP + SF`
pub fn plate_appearances(t: &StatTotals) -> u64 {
    t.at_bats + t.walks + t.hit_by_pitches + t.sac_flies
}

/// `1B + 2*2B + 3*3B + 4*HR`
pub fn total_bases(t: &StatTotals) -> u64 {
    t.singles + 2 * t.doubles + 3 * t.triples + 4 * t.home_runs
}

/// Ratio that is exactly 0.0 when the denominator is zero, never NaN or
/// infinite.
pub fn safe_div(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Round half away from zero to three decimal places.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

pub fn derive(t: &StatTotals) -> DerivedMetrics {
    let pa = plate_appearances(t);
    let tb = total_bases(t);

    let average = safe_div(t.hits, t.at_bats);
    let slugging = safe_div(tb, t.at_bats);
    let on_base = safe_div(t.hits + t.walks + t.hit_by_pitches, pa);

    DerivedMetrics {
        plate_appearances: pa,
        total_bases: tb,
        average: round3(average),
        slugging: round3(slugging),
        on_base_percent: round3(on_base),
        on_base_percent_plus_slugging: round3(on_base + slugging),
    }
}
