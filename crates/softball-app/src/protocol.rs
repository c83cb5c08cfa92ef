// Wire protocol: JSON request envelopes and replies.
//
// Request:  {"id": <any>, "token": "<admin token>", "op": "<name>", ...params}
// Success:  {"id": <echoed>, "ok": true, "data": <result>}
// Failure:  {"id": <echoed>, "ok": false, "error": {"kind": "...", "message": "..."}}

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use softball_core::boxscore::BoxScore;
use softball_core::model::{GameInput, PlayerInput, StatFilter};

use crate::error::RequestError;

#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    /// Opaque correlation value echoed in the reply.
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(flatten)]
    pub request: Request,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Health,
    HealthAdmin,
    CreatePlayer(PlayerInput),
    ListPlayers {
        #[serde(default)]
        q: Option<String>,
        #[serde(default)]
        limit: Option<i64>,
        #[serde(default)]
        offset: Option<i64>,
    },
    GetPlayer {
        player_id: i64,
    },
    DeletePlayer {
        player_id: i64,
    },
    CreateGame(GameInput),
    ListGames {
        #[serde(default)]
        opponent: Option<String>,
        #[serde(default)]
        date_from: Option<NaiveDate>,
        #[serde(default)]
        date_to: Option<NaiveDate>,
        #[serde(default)]
        limit: Option<i64>,
        #[serde(default)]
        offset: Option<i64>,
    },
    GetGame {
        game_id: i64,
    },
    DeleteGame {
        game_id: i64,
    },
    UpsertStatLine(StatLineInput),
    ListStatLines {
        #[serde(default)]
        player_id: Option<i64>,
        #[serde(default)]
        game_id: Option<i64>,
        #[serde(default)]
        limit: Option<i64>,
        #[serde(default)]
        offset: Option<i64>,
    },
    AggregateStats(StatFilter),
}

impl Request {
    /// Operations that require the admin token.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Request::HealthAdmin
                | Request::CreatePlayer(_)
                | Request::DeletePlayer { .. }
                | Request::CreateGame(_)
                | Request::DeleteGame { .. }
                | Request::UpsertStatLine(_)
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Request::Health => "health",
            Request::HealthAdmin => "health_admin",
            Request::CreatePlayer(_) => "create_player",
            Request::ListPlayers { .. } => "list_players",
            Request::GetPlayer { .. } => "get_player",
            Request::DeletePlayer { .. } => "delete_player",
            Request::CreateGame(_) => "create_game",
            Request::ListGames { .. } => "list_games",
            Request::GetGame { .. } => "get_game",
            Request::DeleteGame { .. } => "delete_game",
            Request::UpsertStatLine(_) => "upsert_stat_line",
            Request::ListStatLines { .. } => "list_stat_lines",
            Request::AggregateStats(_) => "aggregate_stats",
        }
    }
}

/// Key plus box score for `upsert_stat_line`.
#[derive(Debug, Clone, Deserialize)]
pub struct StatLineInput {
    pub player_id: i64,
    pub game_id: i64,
    #[serde(flatten)]
    pub box_score: BoxScore,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub id: Value,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Reply {
    pub fn success(id: Value, data: Value) -> Self {
        Self {
            id,
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(id: Value, err: &RequestError) -> Self {
        Self {
            id,
            ok: false,
            data: None,
            error: Some(ErrorBody {
                kind: err.kind(),
                message: err.to_string(),
            }),
        }
    }
}
