// Internal-consistency rules for a single box score.

use serde::Deserialize;
use thiserror::Error;

use crate::model::StatCounts;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("`{field}` must be >= 0, got {value}")]
    NegativeValue { field: &'static str, value: i32 },

    #[error("hits ({hits}) must equal singles + doubles + triples + home_runs ({sum})")]
    HitDecompositionMismatch { hits: i64, sum: i64 },

    #[error("hits ({hits}) cannot exceed at_bats + hit_by_pitches + walks + sac_flies ({limit})")]
    HitsExceedPlateAppearances { hits: i64, limit: i64 },
}

/// A proposed box score as submitted by a client. Omitted counts default to
/// zero, except `sac_bunts` which stays `None` so an overwrite can keep the
/// stored value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BoxScore {
    pub at_bats: i32,
    pub hits: i32,
    pub singles: i32,
    pub doubles: i32,
    pub triples: i32,
    pub home_runs: i32,
    pub rbis: i32,
    pub walks: i32,
    pub strikeouts: i32,
    pub sac_flies: i32,
    pub hit_by_pitches: i32,
    pub errors: i32,
    pub sac_bunts: Option<i32>,
}

/// A box score that passed [`validate`]. Only obtainable through validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedBoxScore {
    counts: StatCounts,
    sac_bunts_supplied: bool,
}

impl ValidatedBoxScore {
    /// The counting fields. `sac_bunts` is zero when it was not supplied.
    pub fn counts(&self) -> &StatCounts {
        &self.counts
    }

    pub fn sac_bunts(&self) -> Option<u32> {
        self.sac_bunts_supplied.then_some(self.counts.sac_bunts)
    }
}

/// Check a box score for internal consistency. Checks run in order and the
/// first failure wins:
///
/// 1. every count is non-negative,
/// 2. `hits == singles + doubles + triples + home_runs`,
/// 3. `hits <= at_bats + hit_by_pitches + walks + sac_flies`.
pub fn validate(candidate: &BoxScore) -> Result<ValidatedBoxScore, ValidationError> {
    let b = candidate;
    let fields: [(&'static str, i32); 12] = [
        ("at_bats", b.at_bats),
        ("hits", b.hits),
        ("singles", b.singles),
        ("doubles", b.doubles),
        ("triples", b.triples),
        ("home_runs", b.home_runs),
        ("rbis", b.rbis),
        ("walks", b.walks),
        ("strikeouts", b.strikeouts),
        ("sac_flies", b.sac_flies),
        ("hit_by_pitches", b.hit_by_pitches),
        ("errors", b.errors),
    ];
    for (field, value) in fields {
        non_negative(field, value)?;
    }
    let sac_bunts = b
        .sac_bunts
        .map(|v| non_negative("sac_bunts", v))
        .transpose()?;

    let hits = i64::from(b.hits);
    let sum = [b.singles, b.doubles, b.triples, b.home_runs]
        .into_iter()
        .map(i64::from)
        .sum::<i64>();
    if hits != sum {
        return Err(ValidationError::HitDecompositionMismatch { hits, sum });
    }

    let limit = [b.at_bats, b.hit_by_pitches, b.walks, b.sac_flies]
        .into_iter()
        .map(i64::from)
        .sum::<i64>();
    if hits > limit {
        return Err(ValidationError::HitsExceedPlateAppearances { hits, limit });
    }

    Ok(ValidatedBoxScore {
        counts: StatCounts {
            at_bats: b.at_bats.unsigned_abs(),
            hits: b.hits.unsigned_abs(),
            singles: b.singles.unsigned_abs(),
            doubles: b.doubles.unsigned_abs(),
            triples: b.triples.unsigned_abs(),
            home_runs: b.home_runs.unsigned_abs(),
            rbis: b.rbis.unsigned_abs(),
            walks: b.walks.unsigned_abs(),
            strikeouts: b.strikeouts.unsigned_abs(),
            sac_flies: b.sac_flies.unsigned_abs(),
            sac_bunts: sac_bunts.unwrap_or(0),
            hit_by_pitches: b.hit_by_pitches.unsigned_abs(),
            errors: b.errors.unsigned_abs(),
        },
        sac_bunts_supplied: sac_bunts.is_some(),
    })
}

fn non_negative(field: &'static str, value: i32) -> Result<u32, ValidationError> {
    u32::try_from(value).map_err(|_| ValidationError::NegativeValue { field, value })
}
