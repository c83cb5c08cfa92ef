// Library root for the softball stats core: record types, box-score
// validation, configuration, SQLite persistence, and the WebSocket transport.

pub mod boxscore;
pub mod config;
pub mod db;
pub mod model;
pub mod ws_server;
