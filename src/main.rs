use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info};

use flatwatch::config::AppConfig;
use flatwatch::db::{init_db, runs, Database};
use flatwatch::notify::TelegramChannel;
use flatwatch::pipeline::{Pipeline, PipelineSettings};
use flatwatch::scrape::BlockingHttp;
use flatwatch::telemetry;

/// Polls a listings search page and posts new offers to Telegram.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Run a single tick and exit.
    #[arg(long)]
    once: bool,

    /// Print the last N recorded ticks and exit.
    #[arg(long, value_name = "N", conflicts_with = "once")]
    history: Option<usize>,

    /// Dotenv file to read before the process environment.
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(path) = &cli.env_file {
        if let Err(e) = dotenvy::from_path(path) {
            eprintln!("cannot read {}: {e}", path.display());
            return ExitCode::FAILURE;
        }
    }

    let config = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = telemetry::init(&config.log_level) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    let outcome = match cli.history {
        Some(limit) => print_history(&config, limit),
        None => run(&config, cli.once),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "startup failed");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &AppConfig, once: bool) -> Result<(), Box<dyn std::error::Error>> {
    info!("starting flatwatch");

    let db = Database::new(config.db_path.clone());
    init_db(&db)?;

    let http = BlockingHttp::new(config.http_timeout)?;
    let channel = TelegramChannel::new(&config.telegram_api_base, &config.bot_token, config.http_timeout)?;
    let pipeline = Pipeline::new(&http, &db, &channel, PipelineSettings::from_config(config))?;

    loop {
        let tick_started = Instant::now();
        let report = pipeline.run_once(Utc::now());

        if let Err(e) = db.with_conn(|conn| runs::record_run(conn, &report)) {
            error!(error = %e, "failed to record tick");
        }

        if once {
            return Ok(());
        }

        // ticks run back to back on this thread, so they can never overlap
        let wait = config.poll_interval.saturating_sub(tick_started.elapsed());
        info!(next_in_secs = wait.as_secs(), "waiting for next tick");
        std::thread::sleep(wait);
    }
}

fn print_history(config: &AppConfig, limit: usize) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::new(config.db_path.clone());
    init_db(&db)?;

    for run in db.with_conn(|conn| runs::recent_runs(conn, limit))? {
        println!(
            "{}  {:>3} new  {:>3} sent  {:>3} failed  {}",
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            run.discovered,
            run.notified,
            run.failed,
            run.error_message.as_deref().unwrap_or(""),
        );
    }
    Ok(())
}
