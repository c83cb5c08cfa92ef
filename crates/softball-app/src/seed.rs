// Demo data for a fresh database. Safe to run repeatedly.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use softball_core::boxscore::{self, BoxScore};
use softball_core::db::Database;
use softball_core::model::{GameInput, PlayerInput};
use tracing::info;

const PLAYERS: [(&str, &str, i64); 3] = [
    ("Alex", "Morgan", 10),
    ("Riley", "Parker", 7),
    ("Taylor", "Kim", 22),
];

const GAMES: [(&str, (i32, u32, u32), &str); 2] = [
    ("Blue Jays", (2025, 4, 12), "Field 1"),
    ("Cardinals", (2025, 4, 19), "Field 2"),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub players_created: usize,
    pub games_created: usize,
    pub stat_lines_written: usize,
}

/// Insert the demo roster, two games, and three stat lines. Existing players
/// (by name) and games (by opponent and date) are reused, and the stat lines
/// are upserted, so a second run changes nothing.
pub fn seed(db: &Database) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    let mut player_ids = Vec::with_capacity(PLAYERS.len());
    for (first, last, jersey) in PLAYERS {
        let id = match db.find_player_by_name(first, last)? {
            Some(existing) => existing.id,
            None => {
                let input = PlayerInput {
                    first_name: first.to_string(),
                    last_name: last.to_string(),
                    jersey_number: Some(jersey),
                };
                report.players_created += 1;
                db.create_player(&input.validate()?)?.id
            }
        };
        player_ids.push(id);
    }

    let mut game_ids = Vec::with_capacity(GAMES.len());
    for (opponent, (y, m, d), location) in GAMES {
        let date = NaiveDate::from_ymd_opt(y, m, d).context("invalid seed date")?;
        let id = match db.find_game(opponent, date)? {
            Some(existing) => existing.id,
            None => {
                let input = GameInput {
                    opponent: opponent.to_string(),
                    date,
                    time: None,
                    location: Some(location.to_string()),
                    notes: None,
                    score_ours: None,
                    score_opponent: None,
                };
                report.games_created += 1;
                db.create_game(&input.validate()?)?.id
            }
        };
        game_ids.push(id);
    }

    let lines = [
        (
            player_ids[0],
            game_ids[0],
            BoxScore {
                at_bats: 4,
                hits: 2,
                singles: 1,
                doubles: 1,
                rbis: 2,
                walks: 1,
                strikeouts: 1,
                ..BoxScore::default()
            },
        ),
        (
            player_ids[1],
            game_ids[0],
            BoxScore {
                at_bats: 3,
                hits: 1,
                singles: 1,
                rbis: 1,
                strikeouts: 1,
                errors: 1,
                ..BoxScore::default()
            },
        ),
        (
            player_ids[2],
            game_ids[1],
            BoxScore {
                at_bats: 4,
                hits: 3,
                singles: 1,
                doubles: 1,
                home_runs: 1,
                rbis: 3,
                ..BoxScore::default()
            },
        ),
    ];

    for (player_id, game_id, line) in lines {
        let validated = boxscore::validate(&line)?;
        db.upsert_stat_line(player_id, game_id, &validated)?;
        report.stat_lines_written += 1;
    }

    info!(
        players = report.players_created,
        games = report.games_created,
        stat_lines = report.stat_lines_written,
        "seed complete"
    );
    Ok(report)
}
