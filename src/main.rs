mod aggregator;
mod api;
mod cli;
mod config;
mod error;
mod estimator;
mod flags;
mod model;
mod progress;
mod report;

use std::io::{self, Write};
use std::process;

use anyhow::Context;
use clap::Parser;
use log::LevelFilter;

use crate::aggregator::{aggregate_from_reader, StreamOptions, StreamOutcome, StreamStop};
use crate::api::LichessClient;
use crate::config::{Config, Settings};
use crate::error::LichessError;
use crate::flags::ProfileFlags;
use crate::progress::Progress;
use crate::report::Summary;

fn main() {
    dotenvy::dotenv().ok();
    let args = cli::Cli::parse();
    init_logging(&args);
    let cfg = Config::load();

    match run(&args, &cfg) {
        Ok(code) => process::exit(code),
        Err(e) => {
            log::error!("{:#}", e);
            if let Some(text) = lichess_error(&e).and_then(LichessError::server_text) {
                log::error!("{}", text);
            }
            process::exit(lichess_error(&e).map(LichessError::exit_code).unwrap_or(1));
        }
    }
}

fn init_logging(args: &cli::Cli) {
    let level = if args.quiet {
        LevelFilter::Error
    } else if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn lichess_error(e: &anyhow::Error) -> Option<&LichessError> {
    e.chain().find_map(|c| c.downcast_ref::<LichessError>())
}

/// Returns the exit code: 0, or the status of a failure that cut the stream short.
/// A cut-short stream still prints what was gathered, marked partial.
fn run(args: &cli::Cli, cfg: &Config) -> anyhow::Result<i32> {
    let settings = Settings::resolve(args, cfg, config::read_token(&cfg.token_env))?;
    let client = LichessClient::new(&settings.api_base, &settings.token, settings.timeout)
        .context("building HTTP client")?;

    if settings.check_token {
        let me = client.account().context("verifying access token")?;
        log::info!("authenticated as {}", me.username);
    }

    let est = estimator::estimate(&client, &settings.username, settings.max_games, settings.all)?;
    log::debug!("{} has played {} games in total", settings.username, est.total_games);
    if !settings.quiet {
        eprintln!("Loading... Estimated time to completion: {} seconds.", est.seconds());
    }

    let mut progress = Progress::new(
        est.games,
        settings.progress_start,
        settings.progress_step,
        settings.quiet,
    );
    let flags = ProfileFlags::new(&client);
    let opts = StreamOptions {
        keep_games: settings.keep_games,
        on_lookup_error: settings.on_lookup_error,
    };
    let mut outcome = match client.export_games(&settings.username, &settings.query) {
        Ok(reader) => {
            aggregate_from_reader(reader, &settings.username, &flags, opts, |n| progress.update(n))
        }
        Err(e) => StreamOutcome::failed(e),
    };
    progress.finish();

    let interrupted = match outcome.stopped.take() {
        Some(StreamStop::Aborted { opponent, error }) => {
            log::error!(
                "Analysed {} games before the profile lookup for {} failed: {}",
                outcome.aggregate.games(),
                opponent,
                error
            );
            if let Some(text) = error.server_text() {
                log::error!("{}", text);
            }
            Some(error)
        }
        Some(StreamStop::Interrupted(e)) => {
            log::warn!("Analysed {} games before receiving error: {}", outcome.aggregate.games(), e);
            if let Some(text) = e.server_text() {
                log::warn!("{}", text);
            }
            Some(e)
        }
        None => None,
    };

    let entries = report::select(&outcome.aggregate.flags, settings.top_n, settings.hide_unknown);
    let mut summary = Summary::new(
        &settings.username,
        entries,
        outcome.aggregate.games(),
        outcome.aggregate.average_rating(),
    );
    summary.skipped = outcome.skipped;
    summary.complete = interrupted.is_none();
    if settings.keep_games {
        summary.game_records = Some(outcome.games.as_slice());
    }

    let mut stdout = io::stdout().lock();
    if settings.json {
        report::write_json(&mut stdout, &summary)?;
    } else {
        report::write_text(&mut stdout, &summary)?;
    }
    stdout.flush()?;

    Ok(interrupted.map(|e| e.exit_code()).unwrap_or(0))
}
