use std::collections::HashMap;
use std::io::BufRead;

use thiserror::Error;

use crate::error::LichessError;
use crate::flags::{FlagLookup, LookupFailurePolicy};
use crate::model::{Color, GameRecord, RawGame, UNKNOWN};

/// Flag -> count, remembering the order in which flags were first seen.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlagCounts {
    entries: Vec<(String, u64)>,
    index: HashMap<String, usize>,
}

impl FlagCounts {
    pub fn add(&mut self, flag: &str) {
        match self.index.get(flag) {
            Some(&i) => self.entries[i].1 += 1,
            None => {
                self.index.insert(flag.to_string(), self.entries.len());
                self.entries.push((flag.to_string(), 1));
            }
        }
    }

    pub fn get(&self, flag: &str) -> u64 {
        self.index.get(flag).map(|&i| self.entries[i].1).unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.entries.iter().map(|(_, c)| c).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest counts first; equal counts keep discovery order.
    /// `n = None` or `Some(0)` keeps everything.
    pub fn most_common(&self, n: Option<usize>) -> Vec<(String, u64)> {
        let mut sorted = self.entries.clone();
        sorted.sort_by_key(|(_, c)| std::cmp::Reverse(*c));
        if let Some(n) = n.filter(|&n| n > 0) {
            sorted.truncate(n);
        }
        sorted
    }
}

impl<S: AsRef<str>> FromIterator<S> for FlagCounts {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut counts = FlagCounts::default();
        for flag in iter {
            counts.add(flag.as_ref());
        }
        counts
    }
}

/// Mean updated in place: `mean += (x - mean) / n`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RunningMean {
    mean: f64,
    n: u64,
}

impl RunningMean {
    pub fn push(&mut self, value: f64) {
        self.n += 1;
        self.mean += (value - self.mean) / self.n as f64;
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn count(&self) -> u64 {
        self.n
    }
}

/// Everything accumulated over the stream so far.
#[derive(Clone, Debug, Default)]
pub struct Aggregate {
    pub flags: FlagCounts,
    pub rating: RunningMean,
}

impl Aggregate {
    pub fn fold(&mut self, game: &GameRecord) {
        self.flags.add(&game.opponent_flag);
        self.rating.push(f64::from(game.opponent_rating));
    }

    pub fn games(&self) -> u64 {
        self.rating.count()
    }

    pub fn average_rating(&self) -> f64 {
        self.rating.mean()
    }
}

/// A game that cannot be attributed to an opponent's country.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SkipReason {
    #[error("game {0}: opponent has no account (AI or anonymous)")]
    NoOpponentAccount(String),
    #[error("game {0}: opponent has no rating")]
    NoOpponentRating(String),
}

/// The lookup-free half of normalization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pairing {
    pub color: Color,
    pub opponent_color: Color,
    pub opponent: String,
    pub opponent_rating: i32,
    pub winner: String,
}

impl Pairing {
    pub fn from_game(username: &str, game: &RawGame) -> Result<Self, SkipReason> {
        let color = match game.players.white.name() {
            Some(white) if white.eq_ignore_ascii_case(username) => Color::White,
            _ => Color::Black,
        };
        let opponent_color = color.opposite();
        let side = game.players.side(opponent_color);
        let opponent = side
            .name()
            .ok_or_else(|| SkipReason::NoOpponentAccount(game.id.clone()))?
            .to_string();
        let opponent_rating = side
            .rating
            .ok_or_else(|| SkipReason::NoOpponentRating(game.id.clone()))?;
        let winner = game
            .winner
            .and_then(|w| game.players.side(w).name())
            .unwrap_or(UNKNOWN)
            .to_string();
        Ok(Self { color, opponent_color, opponent, opponent_rating, winner })
    }

    pub fn into_record(self, game: RawGame, opponent_flag: String) -> GameRecord {
        GameRecord {
            id: game.id,
            perf: game.perf,
            opponent: self.opponent,
            opponent_rating: self.opponent_rating,
            opponent_flag,
            winner: self.winner,
            status: game.status,
            color: self.color,
            opponent_color: self.opponent_color,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct StreamOptions {
    pub keep_games: bool,
    pub on_lookup_error: LookupFailurePolicy,
}

/// Why the stream stopped before its natural end.
#[derive(Debug)]
pub enum StreamStop {
    /// The request or the body failed; the partial aggregate stands.
    Interrupted(LichessError),
    /// An opponent lookup failed under `LookupFailurePolicy::Abort`.
    Aborted { opponent: String, error: LichessError },
}

#[derive(Debug, Default)]
pub struct StreamOutcome {
    pub aggregate: Aggregate,
    pub games: Vec<GameRecord>,
    pub skipped: u64,
    pub stopped: Option<StreamStop>,
}

impl StreamOutcome {
    /// A stream that never opened.
    pub fn failed(err: LichessError) -> Self {
        Self { stopped: Some(StreamStop::Interrupted(err)), ..Default::default() }
    }

    /// Games taken off the stream, counted or skipped.
    pub fn consumed(&self) -> u64 {
        self.aggregate.games() + self.skipped
    }
}

/// Fold an NDJSON game stream into counts and a mean rating.
/// Stops at the first unreadable line and keeps what was gathered before it.
/// `on_progress` gets the number of games consumed so far, skipped ones included.
pub fn aggregate_from_reader<R, L, P>(
    reader: R,
    username: &str,
    lookup: &L,
    opts: StreamOptions,
    mut on_progress: P,
) -> StreamOutcome
where
    R: BufRead,
    L: FlagLookup + ?Sized,
    P: FnMut(u64),
{
    let mut out = StreamOutcome::default();

    for line_res in reader.lines() {
        let line = match line_res {
            Ok(l) => l,
            Err(e) => {
                out.stopped = Some(StreamStop::Interrupted(e.into()));
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let game: RawGame = match serde_json::from_str(&line) {
            Ok(g) => g,
            Err(e) => {
                out.stopped = Some(StreamStop::Interrupted(e.into()));
                break;
            }
        };
        let pairing = match Pairing::from_game(username, &game) {
            Ok(p) => p,
            Err(reason) => {
                log::warn!("skipping {}", reason);
                out.skipped += 1;
                on_progress(out.consumed());
                continue;
            }
        };
        let flag = match lookup.flag(&pairing.opponent) {
            Ok(f) => f,
            Err(error) => match opts.on_lookup_error {
                LookupFailurePolicy::Abort => {
                    out.stopped = Some(StreamStop::Aborted { opponent: pairing.opponent, error });
                    break;
                }
                LookupFailurePolicy::Unknown => {
                    log::warn!("flag lookup for {} failed ({}); counting as {}", pairing.opponent, error, UNKNOWN);
                    UNKNOWN.to_string()
                }
            },
        };

        let record = pairing.into_record(game, flag);
        out.aggregate.fold(&record);
        if opts.keep_games {
            out.games.push(record);
        }
        on_progress(out.consumed());
    }

    log::debug!(
        "aggregate: {} games, {} skipped, {} flags",
        out.aggregate.games(),
        out.skipped,
        out.aggregate.flags.len()
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Cursor, Read};

    fn game_line(id: &str, white: &str, white_rating: i32, black: &str, black_rating: i32, winner: Option<&str>) -> String {
        let winner = winner.map(|w| format!(r#","winner":"{w}""#)).unwrap_or_default();
        format!(
            r#"{{"id":"{id}","perf":"blitz","status":"resign"{winner},"players":{{"white":{{"user":{{"name":"{white}"}},"rating":{white_rating}}},"black":{{"user":{{"name":"{black}"}},"rating":{black_rating}}}}}}}"#
        )
    }

    fn stub_flags(name: &str) -> Result<String, LichessError> {
        Ok(match name {
            "Hans" | "Greta" => "DE",
            "Pierre" => "FR",
            "Nobody" => UNKNOWN,
            "Broken" => return Err(LichessError::from_status(500, name, "down".into())),
            _ => "GB",
        }
        .to_string())
    }

    fn run(body: &str, opts: StreamOptions) -> StreamOutcome {
        aggregate_from_reader(Cursor::new(body.to_string()), "me", &stub_flags, opts, |_| {})
    }

    /// Yields `data`, then fails the next read.
    struct FailingReader {
        data: Cursor<Vec<u8>>,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.data.read(buf)?;
            if n == 0 {
                return Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"));
            }
            Ok(n)
        }
    }

    #[test]
    fn running_mean_matches_batch_mean() {
        let ratings = [1500, 1723, 2011, 987, 1850, 1600, 2400, 1333];
        let body: String = ratings
            .iter()
            .enumerate()
            .map(|(i, r)| game_line(&format!("g{i}"), "me", 1700, "Hans", *r, None) + "\n")
            .collect();
        let out = run(&body, StreamOptions::default());
        let batch = ratings.iter().map(|&r| f64::from(r)).sum::<f64>() / ratings.len() as f64;
        assert!(out.stopped.is_none());
        assert_eq!(out.aggregate.games(), ratings.len() as u64);
        assert!((out.aggregate.average_rating() - batch).abs() < 1e-9);
    }

    #[test]
    fn counts_sum_to_games_including_unknown() {
        let body = [
            game_line("a", "me", 1500, "Hans", 1500, Some("white")),
            game_line("b", "Pierre", 1500, "me", 1500, Some("black")),
            String::new(),
            game_line("c", "me", 1500, "Nobody", 1500, None),
            game_line("d", "Greta", 1500, "me", 1500, None),
        ]
        .join("\n");
        let out = run(&body, StreamOptions::default());
        assert_eq!(out.aggregate.games(), 4);
        assert_eq!(out.aggregate.flags.total(), 4);
        assert_eq!(out.aggregate.flags.get("DE"), 2);
        assert_eq!(out.aggregate.flags.get("FR"), 1);
        assert_eq!(out.aggregate.flags.get(UNKNOWN), 1);
    }

    #[test]
    fn color_follows_white_name() {
        let white: RawGame = serde_json::from_str(&game_line("w", "me", 1500, "Hans", 1400, None)).unwrap();
        let p = Pairing::from_game("me", &white).unwrap();
        assert_eq!((p.color, p.opponent_color), (Color::White, Color::Black));
        assert_eq!((p.opponent.as_str(), p.opponent_rating), ("Hans", 1400));

        let black: RawGame = serde_json::from_str(&game_line("b", "Hans", 1400, "me", 1500, None)).unwrap();
        let p = Pairing::from_game("me", &black).unwrap();
        assert_eq!((p.color, p.opponent_color), (Color::Black, Color::White));
        assert_eq!(p.opponent, "Hans");
    }

    #[test]
    fn username_match_ignores_case() {
        let g: RawGame = serde_json::from_str(&game_line("w", "DrNykterstein", 3000, "Hans", 2000, None)).unwrap();
        assert_eq!(Pairing::from_game("drnykterstein", &g).unwrap().color, Color::White);
    }

    #[test]
    fn draw_has_unknown_winner() {
        let g: RawGame = serde_json::from_str(&game_line("d", "me", 1500, "Hans", 1500, None)).unwrap();
        assert_eq!(Pairing::from_game("me", &g).unwrap().winner, UNKNOWN);

        let g: RawGame = serde_json::from_str(&game_line("w", "me", 1500, "Hans", 1500, Some("black"))).unwrap();
        assert_eq!(Pairing::from_game("me", &g).unwrap().winner, "Hans");
    }

    #[test]
    fn ai_opponent_is_skipped() {
        let ai = r#"{"id":"ai1","perf":"blitz","status":"mate","players":{"white":{"user":{"name":"me"},"rating":1500},"black":{"aiLevel":4}}}"#;
        let body = format!("{ai}\n{}\n", game_line("h", "me", 1500, "Pierre", 1620, None));
        let out = run(&body, StreamOptions::default());
        assert_eq!(out.skipped, 1);
        assert_eq!(out.aggregate.games(), 1);
        assert_eq!(out.aggregate.average_rating(), 1620.0);
    }

    #[test]
    fn skipped_games_still_advance_progress() {
        let ai = r#"{"id":"ai1","perf":"blitz","status":"mate","players":{"white":{"user":{"name":"me"},"rating":1500},"black":{"aiLevel":4}}}"#;
        let body = format!("{ai}\n{ai}\n{}\n", game_line("h", "me", 1500, "Pierre", 1620, None));
        let mut seen = Vec::new();
        let out = aggregate_from_reader(
            Cursor::new(body),
            "me",
            &stub_flags,
            StreamOptions::default(),
            |n| seen.push(n),
        );
        assert_eq!((out.skipped, out.aggregate.games()), (2, 1));
        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(out.consumed(), 3);
    }

    #[test]
    fn read_failure_keeps_partial_aggregate() {
        let ratings = [1500, 1600, 1700];
        let body: String = ratings
            .iter()
            .map(|r| game_line("g", "me", 1500, "Hans", *r, None) + "\n")
            .collect();
        let reader = BufReader::new(FailingReader { data: Cursor::new(body.into_bytes()) });
        let mut seen = Vec::new();
        let out = aggregate_from_reader(reader, "me", &stub_flags, StreamOptions::default(), |n| seen.push(n));
        assert_eq!(out.aggregate.games(), 3);
        assert_eq!(out.aggregate.average_rating(), 1600.0);
        assert_eq!(seen, vec![1, 2, 3]);
        assert!(matches!(out.stopped, Some(StreamStop::Interrupted(LichessError::Stream(_)))));
    }

    #[test]
    fn garbage_line_stops_at_last_good_game() {
        let body = format!(
            "{}\n{}\nnot json\n{}\n",
            game_line("1", "me", 1500, "Hans", 1000, None),
            game_line("2", "me", 1500, "Pierre", 2000, None),
            game_line("3", "me", 1500, "Greta", 3000, None),
        );
        let out = run(&body, StreamOptions::default());
        assert_eq!(out.aggregate.games(), 2);
        assert_eq!(out.aggregate.average_rating(), 1500.0);
        assert!(matches!(out.stopped, Some(StreamStop::Interrupted(LichessError::Decode(_)))));
    }

    #[test]
    fn lookup_failure_aborts_by_default() {
        let body = format!(
            "{}\n{}\n{}\n",
            game_line("1", "me", 1500, "Hans", 1000, None),
            game_line("2", "me", 1500, "Broken", 2000, None),
            game_line("3", "me", 1500, "Greta", 3000, None),
        );
        let out = run(&body, StreamOptions::default());
        assert_eq!(out.aggregate.games(), 1);
        match out.stopped {
            Some(StreamStop::Aborted { ref opponent, ref error }) => {
                assert_eq!(opponent, "Broken");
                assert_eq!(error.exit_code(), 500);
            }
            ref other => panic!("unexpected stop: {other:?}"),
        }
    }

    #[test]
    fn lookup_failure_can_count_as_unknown() {
        let body = format!(
            "{}\n{}\n",
            game_line("1", "me", 1500, "Broken", 1000, None),
            game_line("2", "me", 1500, "Greta", 3000, None),
        );
        let opts = StreamOptions { keep_games: true, on_lookup_error: LookupFailurePolicy::Unknown };
        let out = run(&body, opts);
        assert!(out.stopped.is_none());
        assert_eq!(out.aggregate.flags.get(UNKNOWN), 1);
        assert_eq!(out.games.len(), 2);
        assert_eq!(out.games[0].opponent_flag, UNKNOWN);
    }

    #[test]
    fn kept_games_are_in_stream_order() {
        let body = format!(
            "{}\n{}\n",
            game_line("first", "me", 1500, "Pierre", 1000, Some("white")),
            game_line("second", "Hans", 1500, "me", 1600, Some("white")),
        );
        let out = run(&body, StreamOptions { keep_games: true, ..Default::default() });
        let ids: Vec<&str> = out.games.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, ["first", "second"]);
        assert_eq!(out.games[0].winner, "me");
        assert_eq!(out.games[1].color, Color::Black);
        assert_eq!(out.games[1].opponent_flag, "DE");
        assert_eq!(out.games[1].winner, "Hans");
    }

    #[test]
    fn empty_stream_leaves_zero_mean() {
        let out = run("", StreamOptions::default());
        assert!(out.aggregate.flags.is_empty());
        assert_eq!(out.aggregate.average_rating(), 0.0);
        assert_eq!(out.aggregate.games(), 0);
    }

    #[test]
    fn most_common_breaks_ties_by_discovery() {
        let counts: FlagCounts = ["A", "B", "A", "C", "A", "B", "C", "A", "B", "D", "C", "A"]
            .into_iter()
            .collect();
        assert_eq!((counts.get("A"), counts.get("B"), counts.get("C")), (5, 3, 3));
        let top = counts.most_common(Some(2));
        assert_eq!(top, vec![("A".to_string(), 5), ("B".to_string(), 3)]);
        assert_eq!(counts.most_common(Some(0)).len(), 4);
        assert_eq!(counts.most_common(None).len(), 4);
    }
}
