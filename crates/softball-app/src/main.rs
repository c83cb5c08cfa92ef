// Softball stats entry point.
//
// Startup sequence:
// 1. Initialize tracing (stderr)
// 2. Load config (copying defaults on first run)
// 3. Open database
// 4. `seed`: insert demo data and exit
//    `serve` (default): run the WebSocket server until Ctrl+C

use std::sync::Arc;

use anyhow::{bail, Context};
use softball_app::seed;
use softball_app::service::StatsService;
use softball_core::config;
use softball_core::db::Database;
use softball_core::ws_server;
use tracing::{error, info, warn};

enum Command {
    Serve,
    Seed,
}

fn parse_command() -> anyhow::Result<Command> {
    let mut args = std::env::args().skip(1);
    let command = match args.next().as_deref() {
        None | Some("serve") => Command::Serve,
        Some("seed") => Command::Seed,
        Some(other) => bail!("unknown command `{other}`; expected `serve` or `seed`"),
    };
    if let Some(extra) = args.next() {
        bail!("unexpected argument `{extra}`");
    }
    Ok(command)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing()?;
    let command = parse_command()?;

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: bind={}:{}, database={}",
        config.server.bind, config.server.port, config.db_path
    );

    // 3. Open database
    let db = Database::open(&config.db_path).context("failed to open database")?;
    info!("Database opened at {}", config.db_path);

    // 4. Run the command
    match command {
        Command::Seed => {
            let report = seed::seed(&db).context("failed to seed database")?;
            println!(
                "Seeded {} players, {} games, {} stat lines",
                report.players_created, report.games_created, report.stat_lines_written
            );
            Ok(())
        }
        Command::Serve => serve(db, &config).await,
    }
}

async fn serve(db: Database, config: &config::Config) -> anyhow::Result<()> {
    if config.admin_token().is_none() {
        warn!(
            "No admin token configured; mutating requests will be refused. \
             Set {} or config/credentials.toml",
            config::ADMIN_TOKEN_ENV
        );
    }

    let service = Arc::new(StatsService::new(Arc::new(db), config));
    let bind = config.server.bind.clone();
    let port = config.server.port;

    tokio::select! {
        result = ws_server::run(&bind, port, service) => {
            if let Err(e) = &result {
                error!("WebSocket server error: {e:#}");
            }
            result.context("WebSocket server stopped")
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl+C")?;
            info!("Shutdown requested; exiting");
            Ok(())
        }
    }
}

/// Initialize tracing to stderr so stdout stays free for command output.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("softball=info,warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
