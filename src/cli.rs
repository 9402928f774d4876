use std::sync::LazyLock;

use chrono::NaiveDate;
use clap::Parser;
use regex::Regex;

use crate::error::LichessError;
use crate::flags::LookupFailurePolicy;

static USERNAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{2,30}$").expect("valid username regex"));

const PERF_TYPES: [&str; 14] = [
    "ultraBullet", "bullet", "blitz", "rapid", "classical", "correspondence", "chess960",
    "crazyhouse", "antichess", "atomic", "horde", "kingOfTheHill", "racingKings", "threeCheck",
];

#[derive(Debug, Parser)]
#[command(name = "lcc", version)]
#[command(
    about = "'Lichess Country Counter' counts the number of games played against each country on Lichess.",
    after_help = "Please ensure you've set the OAUTH_2_LICHESS_KEY environment variable (a .env file works)."
)]
pub struct Cli {
    /// The Lichess username whose games you'd like to analyse
    #[arg(value_parser = parse_username)]
    pub username: String,

    /// Only show the top N most frequent countries (default: all)
    #[arg(short = 'n', long = "number")]
    pub number: Option<usize>,

    /// Maximum number of games to analyse [default: 50, or max_games in config.toml]
    #[arg(short, long, conflicts_with = "all")]
    pub max_games: Option<u64>,

    /// Analyse all games
    #[arg(short, long)]
    pub all: bool,

    /// Only print the result (no progress, errors only)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Debug logging (request timings)
    #[arg(short, long)]
    pub verbose: bool,

    /// Leave opponents without a flag out of the result
    #[arg(long)]
    pub hide_unknown: bool,

    /// Only games played on or after this day (YYYY-MM-DD, UTC)
    #[arg(long, value_parser = parse_since)]
    pub since: Option<i64>,

    /// Only games played on or before this day (YYYY-MM-DD, UTC)
    #[arg(long, value_parser = parse_until)]
    pub until: Option<i64>,

    /// Only these performance types (comma-separated)
    #[arg(long, value_delimiter = ',', value_parser = PERF_TYPES)]
    pub perf_type: Vec<String>,

    /// Only rated games
    #[arg(long)]
    pub rated: bool,

    /// What to do when an opponent's profile lookup fails [default: abort, or config.toml]
    #[arg(long, value_enum)]
    pub on_lookup_error: Option<LookupFailurePolicy>,

    /// Also print every analysed game
    #[arg(long)]
    pub games: bool,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,

    /// Verify the access token before starting
    #[arg(long)]
    pub check_token: bool,

    /// Override the Lichess API base URL
    #[arg(long)]
    pub api_base: Option<String>,
}

fn parse_username(s: &str) -> Result<String, String> {
    if USERNAME.is_match(s) {
        Ok(s.to_string())
    } else {
        Err(LichessError::InvalidUsername(s.to_string()).to_string())
    }
}

fn parse_day(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

fn start_of_day_ms(day: NaiveDate) -> Result<i64, String> {
    day.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp_millis())
        .ok_or_else(|| format!("invalid day {day}"))
}

fn parse_since(s: &str) -> Result<i64, String> {
    start_of_day_ms(parse_day(s)?)
}

// inclusive: up to the start of the following day
fn parse_until(s: &str) -> Result<i64, String> {
    let day = parse_day(s)?;
    let next = day.succ_opt().ok_or_else(|| format!("day out of range: {s}"))?;
    start_of_day_ms(next)
}
