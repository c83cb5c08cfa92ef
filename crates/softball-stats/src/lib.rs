// Batting metrics and aggregation over recorded stat lines.

pub mod aggregate;
pub mod metrics;
