// Record types for players, games, and per-game stat lines.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Rejected player/game/pagination input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("`{field}` must not be empty")]
    Empty { field: &'static str },

    #[error("`{field}` must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("`{field}` must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: i64,
        max: i64,
        value: i64,
    },
}

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_JERSEY_NUMBER: i64 = 999;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Player {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub jersey_number: Option<u16>,
    pub created_at: DateTime<Utc>,
}

/// Unchecked player fields as they arrive from a client.
#[derive(Debug, Clone, Deserialize)]
pub struct PlayerInput {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub jersey_number: Option<i64>,
}

/// A player that passed [`PlayerInput::validate`]; names are trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPlayer {
    pub first_name: String,
    pub last_name: String,
    pub jersey_number: Option<u16>,
}

impl PlayerInput {
    pub fn validate(self) -> Result<NewPlayer, InputError> {
        let first_name = required_text("first_name", &self.first_name, MAX_NAME_LEN)?;
        let last_name = required_text("last_name", &self.last_name, MAX_NAME_LEN)?;
        let jersey_number = self
            .jersey_number
            .map(|n| bounded("jersey_number", n, 0, MAX_JERSEY_NUMBER))
            .transpose()?
            .map(|n| n as u16);
        Ok(NewPlayer {
            first_name,
            last_name,
            jersey_number,
        })
    }
}

// ---------------------------------------------------------------------------
// Games
// ---------------------------------------------------------------------------

pub const MAX_OPPONENT_LEN: usize = 150;
pub const MAX_TIME_LEN: usize = 10;
pub const MAX_LOCATION_LEN: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Game {
    pub id: i64,
    pub opponent: String,
    pub date: NaiveDate,
    pub time: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub score_ours: Option<u32>,
    pub score_opponent: Option<u32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GameInput {
    pub opponent: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub score_ours: Option<i64>,
    #[serde(default)]
    pub score_opponent: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGame {
    pub opponent: String,
    pub date: NaiveDate,
    pub time: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub score_ours: Option<u32>,
    pub score_opponent: Option<u32>,
}

impl GameInput {
    /// Trims the opponent and location, bounds every text field, and rejects
    /// negative scores. A location that is blank after trimming is dropped.
    pub fn validate(self) -> Result<NewGame, InputError> {
        let opponent = required_text("opponent", &self.opponent, MAX_OPPONENT_LEN)?;

        if let Some(time) = &self.time {
            if time.chars().count() > MAX_TIME_LEN {
                return Err(InputError::TooLong {
                    field: "time",
                    max: MAX_TIME_LEN,
                });
            }
        }

        let location = match self.location.as_deref().map(str::trim) {
            Some(loc) if loc.chars().count() > MAX_LOCATION_LEN => {
                return Err(InputError::TooLong {
                    field: "location",
                    max: MAX_LOCATION_LEN,
                });
            }
            Some("") | None => None,
            Some(loc) => Some(loc.to_string()),
        };

        let score_ours = self
            .score_ours
            .map(|s| bounded("score_ours", s, 0, i64::from(u32::MAX)))
            .transpose()?
            .map(|s| s as u32);
        let score_opponent = self
            .score_opponent
            .map(|s| bounded("score_opponent", s, 0, i64::from(u32::MAX)))
            .transpose()?
            .map(|s| s as u32);

        Ok(NewGame {
            opponent,
            date: self.date,
            time: self.time,
            location,
            notes: self.notes,
            score_ours,
            score_opponent,
        })
    }
}

// ---------------------------------------------------------------------------
// Stat lines
// ---------------------------------------------------------------------------

/// The thirteen counting columns of one player's line in one game.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatCounts {
    pub at_bats: u32,
    pub hits: u32,
    pub singles: u32,
    pub doubles: u32,
    pub triples: u32,
    pub home_runs: u32,
    pub rbis: u32,
    pub walks: u32,
    pub strikeouts: u32,
    pub sac_flies: u32,
    pub sac_bunts: u32,
    pub hit_by_pitches: u32,
    pub errors: u32,
}

/// A persisted box score. Semantic identity is `(player_id, game_id)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatLine {
    pub id: i64,
    pub player_id: i64,
    pub game_id: i64,
    #[serde(flatten)]
    pub counts: StatCounts,
    pub created_at: DateTime<Utc>,
}

/// A stat line with the owning player's name attached for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatLineView {
    #[serde(flatten)]
    pub stat_line: StatLine,
    pub player_first_name: String,
    pub player_last_name: String,
}

/// Column sums over a set of stat lines. Every field is zero for an empty set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatTotals {
    pub at_bats: u64,
    pub hits: u64,
    pub singles: u64,
    pub doubles: u64,
    pub triples: u64,
    pub home_runs: u64,
    pub rbis: u64,
    pub walks: u64,
    pub strikeouts: u64,
    pub sac_flies: u64,
    pub sac_bunts: u64,
    pub hit_by_pitches: u64,
    pub errors: u64,
}

/// Sums plus the number of lines they cover, read in one statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatSums {
    pub totals: StatTotals,
    pub lines: u64,
}

/// Conjunctive restriction on which stat lines to sum. Date bounds apply to
/// the owning game's date and are inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct StatFilter {
    #[serde(default)]
    pub player_id: Option<i64>,
    #[serde(default)]
    pub game_id: Option<i64>,
    #[serde(default)]
    pub date_from: Option<NaiveDate>,
    #[serde(default)]
    pub date_to: Option<NaiveDate>,
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    pub const PLAYERS_DEFAULT: u32 = 100;
    pub const PLAYERS_MAX: u32 = 500;
    pub const GAMES_DEFAULT: u32 = 100;
    pub const GAMES_MAX: u32 = 500;
    pub const STAT_LINES_DEFAULT: u32 = 200;
    pub const STAT_LINES_MAX: u32 = 1000;

    /// Resolve optional client bounds against a listing's default and maximum.
    pub fn resolve(
        limit: Option<i64>,
        offset: Option<i64>,
        default_limit: u32,
        max_limit: u32,
    ) -> Result<Self, InputError> {
        let limit = match limit {
            Some(l) => bounded("limit", l, 1, i64::from(max_limit))? as u32,
            None => default_limit,
        };
        let offset = match offset {
            Some(o) => bounded("offset", o, 0, i64::from(u32::MAX))? as u32,
            None => 0,
        };
        Ok(Self { limit, offset })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn required_text(field: &'static str, raw: &str, max: usize) -> Result<String, InputError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(InputError::Empty { field });
    }
    if trimmed.chars().count() > max {
        return Err(InputError::TooLong { field, max });
    }
    Ok(trimmed.to_string())
}

fn bounded(field: &'static str, value: i64, min: i64, max: i64) -> Result<i64, InputError> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(InputError::OutOfRange {
            field,
            min,
            max,
            value,
        })
    }
}
