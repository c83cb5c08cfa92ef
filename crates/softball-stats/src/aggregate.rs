// Per-player and filtered rollups of stat lines.

use anyhow::Result;
use serde::Serialize;
use softball_core::db::Database;
use softball_core::model::{Page, Player, StatFilter, StatTotals};
use tracing::debug;

use crate::metrics::{self, DerivedMetrics};

/// Raw totals plus the metrics derived from them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BattingStats {
    #[serde(flatten)]
    pub totals: StatTotals,
    #[serde(flatten)]
    pub derived: DerivedMetrics,
}

impl BattingStats {
    pub fn from_totals(totals: StatTotals) -> Self {
        Self {
            totals,
            derived: metrics::derive(&totals),
        }
    }
}

/// Result of a filtered rollup. Carries no games-played count.
pub type AggregateStats = BattingStats;

/// A player's career rollup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PlayerStats {
    pub games_played: u64,
    #[serde(flatten)]
    pub batting: BattingStats,
}

/// A player record merged with their rollup, serialized as one flat object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerWithStats {
    #[serde(flatten)]
    pub player: Player,
    #[serde(flatten)]
    pub stats: PlayerStats,
}

/// Sum all of a player's stat lines and count them as games played. A player
/// with no lines (or an unknown id) gets all-zero totals.
pub fn aggregate_for_player(db: &Database, player_id: i64) -> Result<PlayerStats> {
    let sums = db.sum_stat_lines(&StatFilter {
        player_id: Some(player_id),
        ..StatFilter::default()
    })?;
    Ok(PlayerStats {
        games_played: sums.lines,
        batting: BattingStats::from_totals(sums.totals),
    })
}

/// Sum stat lines matching every supplied filter. No filters means all lines.
pub fn aggregate_filtered(db: &Database, filter: &StatFilter) -> Result<AggregateStats> {
    let sums = db.sum_stat_lines(filter)?;
    debug!(?filter, lines = sums.lines, "aggregated stat lines");
    Ok(BattingStats::from_totals(sums.totals))
}

/// One player merged with their rollup, or `None` for an unknown id.
pub fn player_with_stats(db: &Database, player_id: i64) -> Result<Option<PlayerWithStats>> {
    let Some(player) = db.get_player(player_id)? else {
        return Ok(None);
    };
    let stats = aggregate_for_player(db, player.id)?;
    Ok(Some(PlayerWithStats { player, stats }))
}

/// The player listing: name search, ordering, and pagination as in
/// [`Database::list_players`], each player merged with their rollup.
pub fn list_players_with_stats(
    db: &Database,
    search: Option<&str>,
    page: Page,
) -> Result<Vec<PlayerWithStats>> {
    db.list_players(search, page)?
        .into_iter()
        .map(|player| {
            let stats = aggregate_for_player(db, player.id)?;
            Ok(PlayerWithStats { player, stats })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use softball_core::boxscore::{validate, BoxScore};
    use softball_core::model::{GameInput, PlayerInput};

    fn test_db() -> Database {
        Database::open(":memory:").expect("in-memory database should open")
    }

    fn player(db: &Database, first: &str, last: &str) -> i64 {
        let input = PlayerInput {
            first_name: first.into(),
            last_name: last.into(),
            jersey_number: None,
        };
        db.create_player(&input.validate().unwrap()).unwrap().id
    }

    fn game(db: &Database, opponent: &str, (y, m, d): (i32, u32, u32)) -> i64 {
        let input = GameInput {
            opponent: opponent.into(),
            date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            time: None,
            location: None,
            notes: None,
            score_ours: None,
            score_opponent: None,
        };
        db.create_game(&input.validate().unwrap()).unwrap().id
    }

    fn record(db: &Database, player_id: i64, game_id: i64, line: BoxScore) {
        db.upsert_stat_line(player_id, game_id, &validate(&line).unwrap())
            .unwrap();
    }

    #[test]
    fn player_without_lines_is_all_zero() {
        let db = test_db();
        let id = player(&db, "Alex", "Morgan");
        let stats = aggregate_for_player(&db, id).unwrap();
        assert_eq!(stats, PlayerStats::default());
    }

    #[test]
    fn player_rollup_sums_every_game() {
        let db = test_db();
        let id = player(&db, "Alex", "Morgan");
        let g1 = game(&db, "Blue Jays", (2025, 4, 12));
        let g2 = game(&db, "Cardinals", (2025, 4, 19));
        record(
            &db,
            id,
            g1,
            BoxScore {
                at_bats: 4,
                hits: 2,
                singles: 1,
                doubles: 1,
                walks: 1,
                sac_bunts: Some(1),
                ..BoxScore::default()
            },
        );
        record(
            &db,
            id,
            g2,
            BoxScore {
                at_bats: 4,
                hits: 1,
                home_runs: 1,
                rbis: 3,
                ..BoxScore::default()
            },
        );

        let stats = aggregate_for_player(&db, id).unwrap();
        assert_eq!(stats.games_played, 2);
        assert_eq!(stats.batting.totals.at_bats, 8);
        assert_eq!(stats.batting.totals.hits, 3);
        assert_eq!(stats.batting.totals.rbis, 3);
        assert_eq!(stats.batting.totals.sac_bunts, 1);
        assert_eq!(stats.batting.derived.total_bases, 7);
        assert!((stats.batting.derived.average - 0.375).abs() < 1e-9);
        assert!((stats.batting.derived.slugging - 0.875).abs() < 1e-9);
    }

    #[test]
    fn filtered_rollup_intersects_player_and_dates() {
        let db = test_db();
        let alex = player(&db, "Alex", "Morgan");
        let riley = player(&db, "Riley", "Parker");
        let early = game(&db, "Blue Jays", (2025, 4, 12));
        let late = game(&db, "Cardinals", (2025, 4, 19));
        let line = BoxScore {
            at_bats: 3,
            hits: 1,
            singles: 1,
            ..BoxScore::default()
        };
        record(&db, alex, early, line);
        record(&db, alex, late, line);
        record(&db, riley, late, line);

        let stats = aggregate_filtered(
            &db,
            &StatFilter {
                player_id: Some(alex),
                date_from: Some(NaiveDate::from_ymd_opt(2025, 4, 15).unwrap()),
                ..StatFilter::default()
            },
        )
        .unwrap();
        // Only Alex's late game: not Riley's (other player), not Alex's early one.
        assert_eq!(stats.totals.at_bats, 3);

        let none = aggregate_filtered(
            &db,
            &StatFilter {
                date_to: Some(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()),
                ..StatFilter::default()
            },
        )
        .unwrap();
        assert_eq!(none, AggregateStats::default());
    }

    #[test]
    fn listing_merges_player_identity_with_rollup() {
        let db = test_db();
        let alex = player(&db, "Alex", "Morgan");
        player(&db, "Riley", "Parker");
        let g = game(&db, "Blue Jays", (2025, 4, 12));
        record(
            &db,
            alex,
            g,
            BoxScore {
                at_bats: 4,
                hits: 2,
                singles: 2,
                ..BoxScore::default()
            },
        );

        let listed = list_players_with_stats(&db, None, Page { limit: 10, offset: 0 }).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].player.last_name, "Morgan");
        assert_eq!(listed[0].stats.games_played, 1);
        assert_eq!(listed[1].player.last_name, "Parker");
        assert_eq!(listed[1].stats, PlayerStats::default());
    }

    #[test]
    fn player_with_stats_unknown_id_is_none() {
        let db = test_db();
        assert!(player_with_stats(&db, 5).unwrap().is_none());
    }

    #[test]
    fn serialized_player_is_flat() {
        let db = test_db();
        let id = player(&db, "Alex", "Morgan");
        let merged = player_with_stats(&db, id).unwrap().unwrap();
        let json = serde_json::to_value(&merged).unwrap();
        assert_eq!(json["first_name"], "Alex");
        assert_eq!(json["games_played"], 0);
        assert_eq!(json["at_bats"], 0);
        assert_eq!(json["on_base_percent_plus_slugging"], 0.0);
    }
}
