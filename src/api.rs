use std::io::BufReader;
use std::time::{Duration, Instant};

use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderValue, ACCEPT};

use crate::error::LichessError;
use crate::model::User;

const NDJSON: &str = "application/x-ndjson";
const JSON: &str = "application/json";

/// Anything that can answer "who is this user".
pub trait UserDirectory {
    fn user(&self, username: &str) -> Result<User, LichessError>;
}

/// Query parameters for the game export.
/// See https://lichess.org/api#tag/Games/operation/apiGamesUser
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExportQuery {
    pub max: Option<u64>, // None = every game
    pub since: Option<i64>, // epoch ms
    pub until: Option<i64>, // epoch ms
    pub perf_types: Vec<String>,
    pub rated: Option<bool>,
}

impl ExportQuery {
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut p = vec![
            ("moves", "false".to_string()),
            ("tags", "false".to_string()),
        ];
        if let Some(max) = self.max {
            p.push(("max", max.to_string()));
        }
        if let Some(since) = self.since {
            p.push(("since", since.to_string()));
        }
        if let Some(until) = self.until {
            p.push(("until", until.to_string()));
        }
        if !self.perf_types.is_empty() {
            p.push(("perfType", self.perf_types.join(",")));
        }
        if let Some(rated) = self.rated {
            p.push(("rated", rated.to_string()));
        }
        p
    }
}

/// Blocking client bound to one API base and one bearer token.
pub struct LichessClient {
    http: Client,
    base: String,
    token: String,
}

impl LichessClient {
    pub fn new(base: &str, token: &str, timeout: Option<Duration>) -> Result<Self, LichessError> {
        let http = Client::builder()
            .user_agent(concat!("lcc/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base: base.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn get_json(&self, url: &str, subject: &str) -> Result<Response, LichessError> {
        log::debug!("api: GET {}", url);
        let t0 = Instant::now();
        let resp = self
            .http
            .get(url)
            .header(ACCEPT, HeaderValue::from_static(JSON))
            .bearer_auth(&self.token)
            .send()?;
        log::debug!("api: {} in {:.3}s", resp.status(), t0.elapsed().as_secs_f64());
        check_status(resp, subject)
    }

    /// The account owning the token.
    pub fn account(&self) -> Result<User, LichessError> {
        let url = format!("{}/api/account", self.base);
        let resp = self.get_json(&url, "account")?;
        Ok(serde_json::from_str(&resp.text()?)?)
    }

    /// Open the NDJSON game export. The body is read lazily by the caller.
    pub fn export_games(
        &self,
        username: &str,
        query: &ExportQuery,
    ) -> Result<BufReader<Response>, LichessError> {
        let url = format!("{}/api/games/user/{}", self.base, username);
        let params = query.params();
        log::debug!("api: GET {} {:?}", url, params);
        let t0 = Instant::now();
        let resp = self
            .http
            .get(&url)
            .header(ACCEPT, HeaderValue::from_static(NDJSON))
            .bearer_auth(&self.token)
            .query(&params)
            .send()?;
        log::debug!("api: export connected in {:.3}s", t0.elapsed().as_secs_f64());
        Ok(BufReader::new(check_status(resp, username)?))
    }
}

impl UserDirectory for LichessClient {
    fn user(&self, username: &str) -> Result<User, LichessError> {
        let url = format!("{}/api/user/{}", self.base, username);
        let resp = self.get_json(&url, username)?;
        Ok(serde_json::from_str(&resp.text()?)?)
    }
}

fn check_status(resp: Response, subject: &str) -> Result<Response, LichessError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    Err(LichessError::from_status(status.as_u16(), subject, body))
}
