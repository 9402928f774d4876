use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::api::ExportQuery;
use crate::cli::Cli;
use crate::error::LichessError;
use crate::flags::LookupFailurePolicy;

/// Optional `config.toml` in the working directory. Every field has a default.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub api_base: String,
    pub token_env: String,                 // env var holding the OAuth token
    pub max_games: u64,                    // cap when neither --max-games nor --all
    pub progress_start: f64,               // first progress report at this fraction
    pub progress_step: f64,                // then every step
    pub on_lookup_error: LookupFailurePolicy,
    pub request_timeout_secs: Option<u64>, // None = no client timeout
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: "https://lichess.org".to_string(),
            token_env: "OAUTH_2_LICHESS_KEY".to_string(),
            max_games: 50,
            progress_start: 0.05,
            progress_step: 0.05,
            on_lookup_error: LookupFailurePolicy::Abort,
            request_timeout_secs: None,
        }
    }
}

impl Config {
    pub fn load() -> Self {
        Self::load_from(Path::new("config.toml"))
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(s) => toml::from_str(&s).unwrap_or_else(|e| {
                log::warn!("ignoring {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }
}

/// Read the token once; empty counts as missing.
pub fn read_token(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|t| !t.trim().is_empty())
}

/// Everything one run needs, resolved from CLI > config.toml > defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    pub username: String,
    pub token: String,
    pub api_base: String,
    pub timeout: Option<Duration>,
    pub max_games: u64,
    pub all: bool,
    pub top_n: Option<usize>,
    pub hide_unknown: bool,
    pub quiet: bool,
    pub keep_games: bool,
    pub json: bool,
    pub check_token: bool,
    pub on_lookup_error: LookupFailurePolicy,
    pub progress_start: f64,
    pub progress_step: f64,
    pub query: ExportQuery,
}

impl Settings {
    pub fn resolve(cli: &Cli, cfg: &Config, token: Option<String>) -> Result<Self, LichessError> {
        let token = token.ok_or_else(|| LichessError::MissingToken(cfg.token_env.clone()))?;
        let max_games = cli.max_games.unwrap_or(cfg.max_games);
        let query = ExportQuery {
            max: if cli.all { None } else { Some(max_games) },
            since: cli.since,
            until: cli.until,
            perf_types: cli.perf_type.clone(),
            rated: cli.rated.then_some(true),
        };
        Ok(Self {
            username: cli.username.clone(),
            token,
            api_base: cli.api_base.clone().unwrap_or_else(|| cfg.api_base.clone()),
            timeout: cfg.request_timeout_secs.map(Duration::from_secs),
            max_games,
            all: cli.all,
            top_n: cli.number.filter(|&n| n > 0),
            hide_unknown: cli.hide_unknown,
            quiet: cli.quiet,
            keep_games: cli.games,
            json: cli.json,
            check_token: cli.check_token,
            on_lookup_error: cli.on_lookup_error.unwrap_or(cfg.on_lookup_error),
            progress_start: cfg.progress_start,
            progress_step: cfg.progress_step,
            query,
        })
    }
}
