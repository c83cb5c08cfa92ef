// SQLite persistence layer for players, games, and per-game stat lines.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::boxscore::ValidatedBoxScore;
use crate::model::{
    Game, NewGame, NewPlayer, Page, Player, StatCounts, StatFilter, StatLine, StatLineView,
    StatSums, StatTotals,
};

/// Failure modes of [`Database::upsert_stat_line`].
#[derive(Debug, Error)]
pub enum UpsertError {
    #[error("player {0} not found")]
    PlayerNotFound(i64),

    #[error("game {0} not found")]
    GameNotFound(i64),

    #[error("failed to write stat line: {0}")]
    Store(#[from] rusqlite::Error),
}

/// Optional restrictions for [`Database::list_games`].
#[derive(Debug, Clone, Default)]
pub struct GameFilter {
    pub opponent: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

const PLAYER_COLUMNS: &str = "id, first_name, last_name, jersey_number, created_at";

const GAME_COLUMNS: &str =
    "id, opponent, date, time, location, notes, score_ours, score_opponent, created_at";

/// Stat line joined with the owning player's name, in the column order
/// expected by [`stat_line_view_from_row`].
const STAT_VIEW_SELECT: &str = "
    SELECT s.id, s.player_id, s.game_id,
           s.at_bats, s.hits, s.singles, s.doubles, s.triples, s.home_runs,
           s.rbis, s.walks, s.strikeouts, s.sac_flies, s.sac_bunts,
           s.hit_by_pitches, s.errors, s.created_at,
           p.first_name, p.last_name
    FROM player_game_stats s
    JOIN players p ON p.id = s.player_id";

/// SQLite-backed store. The uniqueness of `(player_id, game_id)`, the
/// non-negative counts, and the cascades from players and games to their stat
/// lines are all enforced by the schema as well as by the callers.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database (useful
    /// for tests).
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA busy_timeout = 5000;
             PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS players (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                first_name    TEXT NOT NULL CHECK (length(first_name) > 0),
                last_name     TEXT NOT NULL CHECK (length(last_name) > 0),
                jersey_number INTEGER CHECK (jersey_number BETWEEN 0 AND 999),
                created_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE IF NOT EXISTS games (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                opponent       TEXT NOT NULL CHECK (length(opponent) > 0),
                date           TEXT NOT NULL,
                time           TEXT,
                location       TEXT,
                notes          TEXT,
                score_ours     INTEGER CHECK (score_ours >= 0),
                score_opponent INTEGER CHECK (score_opponent >= 0),
                created_at     TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE IF NOT EXISTS player_game_stats (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                player_id      INTEGER NOT NULL REFERENCES players(id) ON DELETE CASCADE,
                game_id        INTEGER NOT NULL REFERENCES games(id) ON DELETE CASCADE,
                at_bats        INTEGER NOT NULL DEFAULT 0,
                hits           INTEGER NOT NULL DEFAULT 0,
                singles        INTEGER NOT NULL DEFAULT 0,
                doubles        INTEGER NOT NULL DEFAULT 0,
                triples        INTEGER NOT NULL DEFAULT 0,
                home_runs      INTEGER NOT NULL DEFAULT 0,
                rbis           INTEGER NOT NULL DEFAULT 0,
                walks          INTEGER NOT NULL DEFAULT 0,
                strikeouts     INTEGER NOT NULL DEFAULT 0,
                sac_flies      INTEGER NOT NULL DEFAULT 0,
                sac_bunts      INTEGER NOT NULL DEFAULT 0,
                hit_by_pitches INTEGER NOT NULL DEFAULT 0,
                errors         INTEGER NOT NULL DEFAULT 0,
                created_at     TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                CONSTRAINT uq_player_game UNIQUE (player_id, game_id),
                CONSTRAINT ck_nonneg_hits CHECK (
                    at_bats >= 0 AND hits >= 0 AND singles >= 0 AND doubles >= 0
                    AND triples >= 0 AND home_runs >= 0
                ),
                CONSTRAINT ck_nonneg_other CHECK (
                    rbis >= 0 AND walks >= 0 AND strikeouts >= 0 AND sac_flies >= 0
                    AND sac_bunts >= 0 AND hit_by_pitches >= 0 AND errors >= 0
                )
            );

            CREATE INDEX IF NOT EXISTS idx_player_game_stats_game_id
                ON player_game_stats(game_id);
            CREATE INDEX IF NOT EXISTS idx_games_date ON games(date);
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    /// Returns `true` if the store answers a trivial query.
    pub fn ping(&self) -> bool {
        self.conn()
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .is_ok()
    }

    // ------------------------------------------------------------------
    // Players
    // ------------------------------------------------------------------

    pub fn create_player(&self, player: &NewPlayer) -> Result<Player> {
        let conn = self.conn();
        let created = conn
            .query_row(
                &format!(
                    "INSERT INTO players (first_name, last_name, jersey_number)
                     VALUES (?1, ?2, ?3)
                     RETURNING {PLAYER_COLUMNS}"
                ),
                params![player.first_name, player.last_name, player.jersey_number],
                player_from_row,
            )
            .context("failed to insert player")?;
        info!(player_id = created.id, "created player {} {}", created.first_name, created.last_name);
        Ok(created)
    }

    pub fn get_player(&self, player_id: i64) -> Result<Option<Player>> {
        let conn = self.conn();
        query_player(&conn, player_id).context("failed to load player")
    }

    /// Exact (case-sensitive) lookup by first and last name.
    pub fn find_player_by_name(&self, first_name: &str, last_name: &str) -> Result<Option<Player>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {PLAYER_COLUMNS} FROM players
                 WHERE first_name = ?1 AND last_name = ?2
                 ORDER BY id LIMIT 1"
            ),
            params![first_name, last_name],
            player_from_row,
        )
        .optional()
        .context("failed to look up player by name")
    }

    /// List players ordered by last name, then first name. `search` matches a
    /// case-insensitive substring of either name; blank means no filter.
    pub fn list_players(&self, search: Option<&str>, page: Page) -> Result<Vec<Player>> {
        let search = search.map(str::trim).filter(|s| !s.is_empty());
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {PLAYER_COLUMNS} FROM players
                 WHERE ?1 IS NULL
                    OR instr(lower(first_name), lower(?1)) > 0
                    OR instr(lower(last_name), lower(?1)) > 0
                 ORDER BY last_name, first_name, id
                 LIMIT ?2 OFFSET ?3"
            ))
            .context("failed to prepare list_players query")?;

        let players = stmt
            .query_map(params![search, page.limit, page.offset], player_from_row)
            .context("failed to query players")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map player rows")?;
        Ok(players)
    }

    /// Delete a player and, through the foreign-key cascade, all of their
    /// stat lines. Returns `false` if no such player existed.
    pub fn delete_player(&self, player_id: i64) -> Result<bool> {
        let conn = self.conn();
        let deleted = conn
            .execute("DELETE FROM players WHERE id = ?1", params![player_id])
            .context("failed to delete player")?;
        if deleted > 0 {
            info!(player_id, "deleted player");
        }
        Ok(deleted > 0)
    }

    // ------------------------------------------------------------------
    // Games
    // ------------------------------------------------------------------

    pub fn create_game(&self, game: &NewGame) -> Result<Game> {
        let conn = self.conn();
        let created = conn
            .query_row(
                &format!(
                    "INSERT INTO games (opponent, date, time, location, notes, score_ours, score_opponent)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     RETURNING {GAME_COLUMNS}"
                ),
                params![
                    game.opponent,
                    game.date,
                    game.time,
                    game.location,
                    game.notes,
                    game.score_ours,
                    game.score_opponent,
                ],
                game_from_row,
            )
            .context("failed to insert game")?;
        info!(game_id = created.id, "created game vs {} on {}", created.opponent, created.date);
        Ok(created)
    }

    pub fn get_game(&self, game_id: i64) -> Result<Option<Game>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {GAME_COLUMNS} FROM games WHERE id = ?1"),
            params![game_id],
            game_from_row,
        )
        .optional()
        .context("failed to load game")
    }

    /// Exact lookup by opponent and date.
    pub fn find_game(&self, opponent: &str, date: NaiveDate) -> Result<Option<Game>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {GAME_COLUMNS} FROM games
                 WHERE opponent = ?1 AND date = ?2
                 ORDER BY id LIMIT 1"
            ),
            params![opponent, date],
            game_from_row,
        )
        .optional()
        .context("failed to look up game")
    }

    /// List games newest first. Date bounds are inclusive; `opponent` matches
    /// a case-insensitive substring.
    pub fn list_games(&self, filter: &GameFilter, page: Page) -> Result<Vec<Game>> {
        let opponent = filter
            .opponent
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {GAME_COLUMNS} FROM games
                 WHERE (?1 IS NULL OR instr(lower(opponent), lower(?1)) > 0)
                   AND (?2 IS NULL OR date >= ?2)
                   AND (?3 IS NULL OR date <= ?3)
                 ORDER BY date DESC, id DESC
                 LIMIT ?4 OFFSET ?5"
            ))
            .context("failed to prepare list_games query")?;

        let games = stmt
            .query_map(
                params![opponent, filter.date_from, filter.date_to, page.limit, page.offset],
                game_from_row,
            )
            .context("failed to query games")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map game rows")?;
        Ok(games)
    }

    /// Delete a game and, through the foreign-key cascade, every stat line
    /// recorded for it. Returns `false` if no such game existed.
    pub fn delete_game(&self, game_id: i64) -> Result<bool> {
        let conn = self.conn();
        let deleted = conn
            .execute("DELETE FROM games WHERE id = ?1", params![game_id])
            .context("failed to delete game")?;
        if deleted > 0 {
            info!(game_id, "deleted game");
        }
        Ok(deleted > 0)
    }

    // ------------------------------------------------------------------
    // Stat lines
    // ------------------------------------------------------------------

    /// Insert the stat line for `(player_id, game_id)` or overwrite the
    /// counting fields of the existing one. `created_at` is never changed.
    /// When the box score omits sacrifice bunts, an overwrite keeps the
    /// stored value.
    ///
    /// Parent checks and the write share one IMMEDIATE transaction, and the
    /// write itself is a single `ON CONFLICT DO UPDATE` statement. A unique
    /// violation on the pair (another connection won a race on the same file)
    /// is retried as a plain update instead of being surfaced.
    pub fn upsert_stat_line(
        &self,
        player_id: i64,
        game_id: i64,
        box_score: &ValidatedBoxScore,
    ) -> Result<StatLineView, UpsertError> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if query_player(&tx, player_id)?.is_none() {
            return Err(UpsertError::PlayerNotFound(player_id));
        }
        let game_exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM games WHERE id = ?1)",
            params![game_id],
            |row| row.get(0),
        )?;
        if !game_exists {
            return Err(UpsertError::GameNotFound(game_id));
        }

        let id = match insert_or_update_stat_line(&tx, player_id, game_id, box_score) {
            Ok(id) => id,
            Err(e) if is_unique_violation(&e) => {
                warn!(player_id, game_id, "stat line insert raced; retrying as update");
                update_stat_line(&tx, player_id, game_id, box_score)?
            }
            Err(e) => return Err(e.into()),
        };

        let view = tx.query_row(
            &format!("{STAT_VIEW_SELECT} WHERE s.id = ?1"),
            params![id],
            stat_line_view_from_row,
        )?;
        tx.commit()?;

        debug!(stat_line_id = id, player_id, game_id, "upserted stat line");
        Ok(view)
    }

    /// List stat lines with player names, ordered by game id descending then
    /// player id ascending.
    pub fn list_stat_lines(
        &self,
        player_id: Option<i64>,
        game_id: Option<i64>,
        page: Page,
    ) -> Result<Vec<StatLineView>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "{STAT_VIEW_SELECT}
                 WHERE (?1 IS NULL OR s.player_id = ?1)
                   AND (?2 IS NULL OR s.game_id = ?2)
                 ORDER BY s.game_id DESC, s.player_id ASC
                 LIMIT ?3 OFFSET ?4"
            ))
            .context("failed to prepare list_stat_lines query")?;

        let lines = stmt
            .query_map(
                params![player_id, game_id, page.limit, page.offset],
                stat_line_view_from_row,
            )
            .context("failed to query stat lines")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map stat line rows")?;
        Ok(lines)
    }

    /// Sum every counting column over the stat lines matching `filter` and
    /// count those lines, in one statement so both see the same rows.
    /// Filters combine with AND; an empty match yields all zeros.
    pub fn sum_stat_lines(&self, filter: &StatFilter) -> Result<StatSums> {
        let conn = self.conn();
        conn.query_row(
            "SELECT COALESCE(SUM(s.at_bats), 0),
                    COALESCE(SUM(s.hits), 0),
                    COALESCE(SUM(s.singles), 0),
                    COALESCE(SUM(s.doubles), 0),
                    COALESCE(SUM(s.triples), 0),
                    COALESCE(SUM(s.home_runs), 0),
                    COALESCE(SUM(s.rbis), 0),
                    COALESCE(SUM(s.walks), 0),
                    COALESCE(SUM(s.strikeouts), 0),
                    COALESCE(SUM(s.sac_flies), 0),
                    COALESCE(SUM(s.sac_bunts), 0),
                    COALESCE(SUM(s.hit_by_pitches), 0),
                    COALESCE(SUM(s.errors), 0),
                    COUNT(*)
             FROM player_game_stats s
             JOIN games g ON g.id = s.game_id
             WHERE (?1 IS NULL OR s.player_id = ?1)
               AND (?2 IS NULL OR s.game_id = ?2)
               AND (?3 IS NULL OR g.date >= ?3)
               AND (?4 IS NULL OR g.date <= ?4)",
            params![filter.player_id, filter.game_id, filter.date_from, filter.date_to],
            |row| {
                let totals = StatTotals {
                    at_bats: total(row, 0)?,
                    hits: total(row, 1)?,
                    singles: total(row, 2)?,
                    doubles: total(row, 3)?,
                    triples: total(row, 4)?,
                    home_runs: total(row, 5)?,
                    rbis: total(row, 6)?,
                    walks: total(row, 7)?,
                    strikeouts: total(row, 8)?,
                    sac_flies: total(row, 9)?,
                    sac_bunts: total(row, 10)?,
                    hit_by_pitches: total(row, 11)?,
                    errors: total(row, 12)?,
                };
                Ok(StatSums {
                    totals,
                    lines: total(row, 13)?,
                })
            },
        )
        .context("failed to sum stat lines")
    }
}

// ---------------------------------------------------------------------------
// Statement helpers
// ---------------------------------------------------------------------------

fn query_player(conn: &Connection, player_id: i64) -> rusqlite::Result<Option<Player>> {
    conn.query_row(
        &format!("SELECT {PLAYER_COLUMNS} FROM players WHERE id = ?1"),
        params![player_id],
        player_from_row,
    )
    .optional()
}

fn insert_or_update_stat_line(
    conn: &Connection,
    player_id: i64,
    game_id: i64,
    box_score: &ValidatedBoxScore,
) -> rusqlite::Result<i64> {
    let c = box_score.counts();
    conn.query_row(
        "INSERT INTO player_game_stats
            (player_id, game_id, at_bats, hits, singles, doubles, triples, home_runs,
             rbis, walks, strikeouts, sac_flies, hit_by_pitches, errors, sac_bunts)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, COALESCE(?15, 0))
         ON CONFLICT(player_id, game_id) DO UPDATE SET
            at_bats        = excluded.at_bats,
            hits           = excluded.hits,
            singles        = excluded.singles,
            doubles        = excluded.doubles,
            triples        = excluded.triples,
            home_runs      = excluded.home_runs,
            rbis           = excluded.rbis,
            walks          = excluded.walks,
            strikeouts     = excluded.strikeouts,
            sac_flies      = excluded.sac_flies,
            hit_by_pitches = excluded.hit_by_pitches,
            errors         = excluded.errors,
            sac_bunts      = COALESCE(?15, player_game_stats.sac_bunts)
         RETURNING id",
        params![
            player_id,
            game_id,
            c.at_bats,
            c.hits,
            c.singles,
            c.doubles,
            c.triples,
            c.home_runs,
            c.rbis,
            c.walks,
            c.strikeouts,
            c.sac_flies,
            c.hit_by_pitches,
            c.errors,
            box_score.sac_bunts(),
        ],
        |row| row.get(0),
    )
}

fn update_stat_line(
    conn: &Connection,
    player_id: i64,
    game_id: i64,
    box_score: &ValidatedBoxScore,
) -> rusqlite::Result<i64> {
    let c = box_score.counts();
    conn.query_row(
        "UPDATE player_game_stats SET
            at_bats = ?3, hits = ?4, singles = ?5, doubles = ?6, triples = ?7,
            home_runs = ?8, rbis = ?9, walks = ?10, strikeouts = ?11, sac_flies = ?12,
            hit_by_pitches = ?13, errors = ?14, sac_bunts = COALESCE(?15, sac_bunts)
         WHERE player_id = ?1 AND game_id = ?2
         RETURNING id",
        params![
            player_id,
            game_id,
            c.at_bats,
            c.hits,
            c.singles,
            c.doubles,
            c.triples,
            c.home_runs,
            c.rbis,
            c.walks,
            c.strikeouts,
            c.sac_flies,
            c.hit_by_pitches,
            c.errors,
            box_score.sac_bunts(),
        ],
        |row| row.get(0),
    )
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

// ---------------------------------------------------------------------------
// Row mappers
// ---------------------------------------------------------------------------

fn player_from_row(row: &Row<'_>) -> rusqlite::Result<Player> {
    Ok(Player {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        jersey_number: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn game_from_row(row: &Row<'_>) -> rusqlite::Result<Game> {
    Ok(Game {
        id: row.get(0)?,
        opponent: row.get(1)?,
        date: row.get(2)?,
        time: row.get(3)?,
        location: row.get(4)?,
        notes: row.get(5)?,
        score_ours: row.get(6)?,
        score_opponent: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn stat_line_view_from_row(row: &Row<'_>) -> rusqlite::Result<StatLineView> {
    Ok(StatLineView {
        stat_line: StatLine {
            id: row.get(0)?,
            player_id: row.get(1)?,
            game_id: row.get(2)?,
            counts: StatCounts {
                at_bats: row.get(3)?,
                hits: row.get(4)?,
                singles: row.get(5)?,
                doubles: row.get(6)?,
                triples: row.get(7)?,
                home_runs: row.get(8)?,
                rbis: row.get(9)?,
                walks: row.get(10)?,
                strikeouts: row.get(11)?,
                sac_flies: row.get(12)?,
                sac_bunts: row.get(13)?,
                hit_by_pitches: row.get(14)?,
                errors: row.get(15)?,
            },
            created_at: row.get(16)?,
        },
        player_first_name: row.get(17)?,
        player_last_name: row.get(18)?,
    })
}

/// Read a SUM column. The CHECK constraints keep sums non-negative.
fn total(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let value: i64 = row.get(idx)?;
    Ok(u64::try_from(value).unwrap_or(0))
}
