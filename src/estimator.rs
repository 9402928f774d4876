use crate::api::UserDirectory;
use crate::error::LichessError;

/// How many games the progress display should count towards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Estimate {
    pub games: u64,
    pub total_games: u64,
}

impl Estimate {
    /// Rough wall-clock guess: one profile lookup per game, about a second each.
    pub fn seconds(&self) -> u64 {
        self.games
    }
}

/// One user lookup. `all` targets every game the user has played; otherwise
/// the cap, clamped to the user's total. Streaming is never limited by this.
pub fn estimate<D: UserDirectory + ?Sized>(
    directory: &D,
    username: &str,
    max_games: u64,
    all: bool,
) -> Result<Estimate, LichessError> {
    let user = directory.user(username)?;
    let total_games = user.total_games();
    let games = if all { total_games } else { max_games.min(total_games) };
    log::debug!("estimate: {} has {} games, target {}", username, total_games, games);
    Ok(Estimate { games, total_games })
}
