use thiserror::Error;

/// Everything that can go wrong talking to Lichess or reading its stream.
#[derive(Debug, Error)]
pub enum LichessError {
    #[error("API key not found. Please set {0} in your environment or .env file")]
    MissingToken(String),

    #[error("'{0}' is not a valid Lichess username")]
    InvalidUsername(String),

    #[error("user '{username}' not found. Please verify that the user exists")]
    UserNotFound { username: String },

    #[error("rate limited by Lichess (HTTP {status}). Please try again later")]
    RateLimited { status: u16, body: String },

    #[error("access token rejected (HTTP {status})")]
    Unauthorized { status: u16, body: String },

    #[error("Lichess returned HTTP {status}")]
    Upstream { status: u16, body: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("stream interrupted: {0}")]
    Stream(#[from] std::io::Error),

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl LichessError {
    /// Classify a non-success response.
    pub fn from_status(status: u16, username: &str, body: String) -> Self {
        match status {
            404 => LichessError::UserNotFound { username: username.to_string() },
            429 => LichessError::RateLimited { status, body },
            401 | 403 => LichessError::Unauthorized { status, body },
            _ => LichessError::Upstream { status, body },
        }
    }

    /// HTTP status reported by the server, if the error came from one.
    pub fn status(&self) -> Option<u16> {
        match self {
            LichessError::UserNotFound { .. } => Some(404),
            LichessError::RateLimited { status, .. }
            | LichessError::Unauthorized { status, .. }
            | LichessError::Upstream { status, .. } => Some(*status),
            LichessError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Process exit code: the upstream status when there is one, else 1.
    pub fn exit_code(&self) -> i32 {
        self.status().map(i32::from).unwrap_or(1)
    }

    /// Raw server text worth echoing to the user. Kept out of `Display`
    /// so callers print it exactly once.
    pub fn server_text(&self) -> Option<&str> {
        match self {
            LichessError::RateLimited { body, .. }
            | LichessError::Unauthorized { body, .. }
            | LichessError::Upstream { body, .. } => Some(body.as_str()).filter(|b| !b.is_empty()),
            _ => None,
        }
    }
}
