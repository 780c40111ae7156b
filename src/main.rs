//! sqlreplay - Replay large SQL dumps against a live MySQL server.

use std::path::Path;
use std::sync::Arc;

use sqlreplay::cli::{prompt_password, Cli};
use sqlreplay::config::{Config, ConnectionConfig, ReplaySettings, DEFAULT_HOST};
use sqlreplay::db::{self, DatabaseClient, MockDatabaseClient};
use sqlreplay::error::{ReplayError, Result};
use sqlreplay::logging;
use sqlreplay::replay::{ConsoleProgress, Replayer};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Environment defaults may come from a local .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();

    let logs_to_file = cli.log_file.is_some();
    if let Err(e) = logging::init(cli.log_file.as_deref()) {
        eprintln!("Warning: {e}; logging to stderr");
        logging::init_stderr_logging();
    }

    if let Err(e) = run(cli).await {
        error!("{}: {}", e.category(), e);
        if logs_to_file {
            eprintln!("{}: {}", e.category(), e);
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let config = Config::load_from_file(&config_path)?;

    let mut settings = config.replay.clone();
    cli.apply_replay_overrides(&mut settings);
    settings.validate()?;

    let mut connection = resolve_connection(&cli, &config)?;

    if !cli.dry_run && connection.password.as_deref().map_or(true, str::is_empty) {
        connection.password = Some(prompt_password("Password: ")?);
    }

    print_header(&connection, &settings, &cli.dump_file);

    let client: Arc<dyn DatabaseClient> = if cli.dry_run {
        info!("Dry run: statements are classified but not executed");
        Arc::new(MockDatabaseClient::new())
    } else {
        info!("Connecting to {}", connection.display_string());
        db::connect(&connection, settings.workers).await?
    };

    let replayer = Replayer::new(settings, client.clone(), Arc::new(ConsoleProgress::stdout()))?;
    let report = replayer.run_file(&cli.dump_file).await?;

    if let Some(e) = &report.error {
        println!("{}", describe_stop(e));
    }
    println!("{}", report.stats);

    client.close().await?;
    report.into_result().map(|_| ())
}

/// Resolves the final connection configuration from CLI args, config file, and environment.
///
/// Precedence: CLI flags, then the named (or default) connection from the
/// config file, then MYSQL_* environment variables.
fn resolve_connection(cli: &Cli, config: &Config) -> Result<ConnectionConfig> {
    let mut connection = match cli.connection_name() {
        Some(name) => config.get_connection(Some(name)).cloned().ok_or_else(|| {
            ReplayError::config(format!("Connection '{}' not found in config file", name))
        })?,
        None => config.get_connection(None).cloned().unwrap_or_default(),
    };

    cli.apply_connection_overrides(&mut connection)?;
    connection.apply_env_defaults();

    Ok(connection)
}

fn print_header(connection: &ConnectionConfig, settings: &ReplaySettings, file: &Path) {
    println!(
        "Host        : {}:{}",
        connection.host.as_deref().unwrap_or(DEFAULT_HOST),
        connection.port
    );
    println!("User        : {}", connection.user.as_deref().unwrap_or(""));
    println!("Database    : {}", connection.database.as_deref().unwrap_or(""));
    println!("Buffer size : {} bytes", settings.buffer_size);
    println!("Workers     : {}", settings.workers);
    println!("File        : {}", file.display());
}

/// Wording for the error that ended a replay early.
fn describe_stop(e: &ReplayError) -> String {
    match e {
        ReplayError::Stream(_) | ReplayError::Config(_) => {
            format!("error returned from scanner: {e}")
        }
        _ => format!("{}: {e}", e.category()),
    }
}
