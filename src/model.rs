use std::fmt;

use serde::{Deserialize, Serialize};

pub const UNKNOWN: &str = "Unknown";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opposite(self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Color::White => "white",
            Color::Black => "black",
        })
    }
}

// ---- /api/games/user export (one JSON object per line) ----

#[derive(Clone, Debug, Deserialize)]
pub struct RawGame {
    pub id: String,
    pub perf: String,
    pub status: String,
    #[serde(default)]
    pub winner: Option<Color>,
    pub players: RawPlayers,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawPlayers {
    pub white: RawPlayer,
    pub black: RawPlayer,
}

/// One side of a game. `user` is absent for the Lichess AI and anonymous players.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawPlayer {
    #[serde(default)]
    pub user: Option<LightUser>,
    #[serde(default)]
    pub rating: Option<i32>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LightUser {
    pub name: String,
}

impl RawPlayers {
    pub fn side(&self, color: Color) -> &RawPlayer {
        match color {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }
}

impl RawPlayer {
    pub fn name(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.name.as_str())
    }
}

// ---- /api/user/{name} and /api/account ----

#[derive(Clone, Debug, Default, Deserialize)]
pub struct User {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub count: Option<GameCount>,
    #[serde(default)]
    pub profile: Option<Profile>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct GameCount {
    #[serde(default)]
    pub all: u64,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub flag: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl User {
    /// Profile flag, falling back to the older `country` field.
    pub fn flag(&self) -> Option<&str> {
        let profile = self.profile.as_ref()?;
        profile.flag.as_deref().or(profile.country.as_deref())
    }

    pub fn total_games(&self) -> u64 {
        self.count.as_ref().map(|c| c.all).unwrap_or(0)
    }
}

/// A game reduced to what the counter cares about.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GameRecord {
    pub id: String,
    pub perf: String,
    pub opponent: String,
    pub opponent_rating: i32,
    pub opponent_flag: String,
    pub winner: String,
    pub status: String,
    pub color: Color,
    pub opponent_color: Color,
}
