// Request dispatch: authorization gate, then validation and the engine.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use softball_core::boxscore;
use softball_core::config::Config;
use softball_core::db::{Database, GameFilter};
use softball_core::model::Page;
use softball_core::ws_server::RequestHandler;
use softball_stats::aggregate;
use tracing::{debug, error, info};

use crate::error::RequestError;
use crate::protocol::{Envelope, Reply, Request};

/// Last-resort reply when encoding a reply fails.
const ENCODE_FAILURE_REPLY: &str =
    r#"{"id":null,"ok":false,"error":{"kind":"internal","message":"internal error"}}"#;

/// Serves protocol requests against one store. Cheap to share behind an `Arc`.
pub struct StatsService {
    db: Arc<Database>,
    admin_token: Option<String>,
}

impl StatsService {
    pub fn new(db: Arc<Database>, config: &Config) -> Self {
        Self::with_admin_token(db, config.admin_token().map(str::to_string))
    }

    /// `None` blocks every mutating operation.
    pub fn with_admin_token(db: Arc<Database>, admin_token: Option<String>) -> Self {
        Self { db, admin_token }
    }

    /// Mutating operations need the configured token, compared exactly.
    fn authorize(&self, token: Option<&str>) -> Result<(), RequestError> {
        let Some(expected) = self.admin_token.as_deref() else {
            return Err(RequestError::Unavailable);
        };
        match token {
            None | Some("") => Err(RequestError::Unauthorized),
            Some(t) if t == expected => Ok(()),
            Some(_) => Err(RequestError::Forbidden),
        }
    }

    pub fn dispatch(&self, envelope: Envelope) -> Result<Value, RequestError> {
        let Envelope { token, request, .. } = envelope;
        if request.is_mutating() {
            self.authorize(token.as_deref())?;
        }

        let db = self.db.as_ref();
        match request {
            Request::Health => Ok(json!({ "ok": true, "db": db.ping() })),
            Request::HealthAdmin => Ok(json!({ "ok": true, "admin": true })),

            Request::CreatePlayer(input) => {
                let player = db.create_player(&input.validate()?)?;
                to_json(&player)
            }
            Request::ListPlayers { q, limit, offset } => {
                let page = Page::resolve(limit, offset, Page::PLAYERS_DEFAULT, Page::PLAYERS_MAX)?;
                let players = aggregate::list_players_with_stats(db, q.as_deref(), page)?;
                to_json(&players)
            }
            Request::GetPlayer { player_id } => {
                match aggregate::player_with_stats(db, player_id)? {
                    Some(player) => to_json(&player),
                    None => Err(RequestError::NotFound("Player")),
                }
            }
            Request::DeletePlayer { player_id } => {
                if !db.delete_player(player_id)? {
                    return Err(RequestError::NotFound("Player"));
                }
                Ok(json!({ "deleted": true }))
            }

            Request::CreateGame(input) => {
                let game = db.create_game(&input.validate()?)?;
                to_json(&game)
            }
            Request::ListGames {
                opponent,
                date_from,
                date_to,
                limit,
                offset,
            } => {
                let page = Page::resolve(limit, offset, Page::GAMES_DEFAULT, Page::GAMES_MAX)?;
                let filter = GameFilter {
                    opponent,
                    date_from,
                    date_to,
                };
                to_json(&db.list_games(&filter, page)?)
            }
            Request::GetGame { game_id } => match db.get_game(game_id)? {
                Some(game) => to_json(&game),
                None => Err(RequestError::NotFound("Game")),
            },
            Request::DeleteGame { game_id } => {
                if !db.delete_game(game_id)? {
                    return Err(RequestError::NotFound("Game"));
                }
                Ok(json!({ "deleted": true }))
            }

            Request::UpsertStatLine(input) => {
                let validated = boxscore::validate(&input.box_score)?;
                let view = db.upsert_stat_line(input.player_id, input.game_id, &validated)?;
                to_json(&view)
            }
            Request::ListStatLines {
                player_id,
                game_id,
                limit,
                offset,
            } => {
                let page = Page::resolve(
                    limit,
                    offset,
                    Page::STAT_LINES_DEFAULT,
                    Page::STAT_LINES_MAX,
                )?;
                to_json(&db.list_stat_lines(player_id, game_id, page)?)
            }
            Request::AggregateStats(filter) => {
                to_json(&aggregate::aggregate_filtered(db, &filter)?)
            }
        }
    }
}

impl RequestHandler for StatsService {
    fn handle(&self, request: &str) -> String {
        let (id, result) = match serde_json::from_str::<Value>(request) {
            Ok(raw) => {
                let id = raw.get("id").cloned().unwrap_or(Value::Null);
                let result = serde_json::from_value::<Envelope>(raw)
                    .map_err(|e| RequestError::Malformed(e.to_string()))
                    .and_then(|envelope| {
                        let op = envelope.request.name();
                        debug!(op, "dispatching request");
                        self.dispatch(envelope)
                    });
                (id, result)
            }
            Err(e) => (Value::Null, Err(RequestError::Malformed(e.to_string()))),
        };

        let reply = match result {
            Ok(data) => Reply::success(id, data),
            Err(err) => {
                match &err {
                    RequestError::Internal(source) => error!("request failed: {source:#}"),
                    RequestError::Unauthorized
                    | RequestError::Forbidden
                    | RequestError::Unavailable => info!("rejected request: {err}"),
                    _ => debug!("invalid request: {err}"),
                }
                Reply::failure(id, &err)
            }
        };

        serde_json::to_string(&reply).unwrap_or_else(|e| {
            error!("failed to encode reply: {e}");
            ENCODE_FAILURE_REPLY.to_string()
        })
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, RequestError> {
    Ok(serde_json::to_value(value)?)
}
