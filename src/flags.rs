use serde::Deserialize;

use crate::api::UserDirectory;
use crate::error::LichessError;
use crate::model::UNKNOWN;

/// Resolves a username to the flag code shown on their profile.
pub trait FlagLookup {
    fn flag(&self, username: &str) -> Result<String, LichessError>;
}

impl<F> FlagLookup for F
where
    F: Fn(&str) -> Result<String, LichessError>,
{
    fn flag(&self, username: &str) -> Result<String, LichessError> {
        self(username)
    }
}

/// One profile request per call; nothing is remembered between calls.
pub struct ProfileFlags<'a, D: ?Sized> {
    directory: &'a D,
}

impl<'a, D: UserDirectory + ?Sized> ProfileFlags<'a, D> {
    pub fn new(directory: &'a D) -> Self {
        Self { directory }
    }
}

impl<D: UserDirectory + ?Sized> FlagLookup for ProfileFlags<'_, D> {
    fn flag(&self, username: &str) -> Result<String, LichessError> {
        let user = self.directory.user(username)?;
        Ok(user.flag().unwrap_or(UNKNOWN).to_string())
    }
}

/// What to do when an opponent's profile cannot be fetched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LookupFailurePolicy {
    /// Stop the run.
    #[default]
    Abort,
    /// Count the opponent as "Unknown" and keep going.
    Unknown,
}
