use std::io::{self, Write};

use serde::Serialize;

use crate::aggregator::FlagCounts;
use crate::model::{GameRecord, UNKNOWN};

/// Top-N first, then drop "Unknown". The order matters: an "Unknown" bucket
/// that won a top-N slot is removed without being replaced.
pub fn select(counts: &FlagCounts, top_n: Option<usize>, hide_unknown: bool) -> Vec<(String, u64)> {
    let mut entries = counts.most_common(top_n);
    if hide_unknown {
        entries.retain(|(flag, _)| flag != UNKNOWN);
    }
    entries
}

#[derive(Debug, Serialize)]
pub struct CountryCount {
    pub flag: String,
    pub games: u64,
}

#[derive(Debug, Serialize)]
pub struct Summary<'a> {
    pub username: &'a str,
    pub games: u64,
    pub skipped: u64,
    pub complete: bool,
    pub countries: Vec<CountryCount>,
    pub average_rating: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_records: Option<&'a [GameRecord]>,
}

impl<'a> Summary<'a> {
    pub fn new(username: &'a str, entries: Vec<(String, u64)>, games: u64, average_rating: f64) -> Self {
        Self {
            username,
            games,
            skipped: 0,
            complete: true,
            countries: entries
                .into_iter()
                .map(|(flag, games)| CountryCount { flag, games })
                .collect(),
            average_rating,
            game_records: None,
        }
    }
}

pub fn write_text<W: Write>(mut w: W, s: &Summary<'_>) -> io::Result<()> {
    if let Some(records) = s.game_records {
        for g in records {
            writeln!(
                w,
                "{} {:<14} {} vs {} ({}, {}) {:<10} winner: {}",
                g.id, g.perf, g.color, g.opponent, g.opponent_rating, g.opponent_flag, g.status, g.winner
            )?;
        }
        if !records.is_empty() {
            writeln!(w)?;
        }
    }

    let partial = if s.complete { "" } else { ", partial" };
    writeln!(w, "Opponent countries for {} ({} games{}):", s.username, s.games, partial)?;
    let width = s.countries.iter().map(|c| c.flag.len()).max().unwrap_or(0);
    for c in &s.countries {
        writeln!(w, "  {:<width$}  {}", c.flag, c.games, width = width)?;
    }
    if s.skipped > 0 {
        writeln!(w, "Skipped {} games against unrated or anonymous opponents.", s.skipped)?;
    }
    writeln!(w, "Avg. Rating: {:.0}", s.average_rating)?;
    Ok(())
}

pub fn write_json<W: Write>(mut w: W, s: &Summary<'_>) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut w, s)?;
    writeln!(w)
}
