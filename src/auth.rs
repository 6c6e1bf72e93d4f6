use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::{DriveError, Result};

pub const TOKEN_ENV_VAR: &str = "DRIVE_ACCESS_TOKEN";

/// Bearer token for the Drive API. Obtaining and refreshing it is left to
/// whatever wrote the token file.
#[derive(Clone)]
pub struct AccessToken(String);

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(..)")
    }
}

#[derive(Deserialize)]
struct TokenFile {
    #[serde(alias = "access_token")]
    token: Option<String>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }

    /// Environment value wins over the token file.
    pub fn load(env_value: Option<String>, token_path: &Path) -> Result<Self> {
        if let Some(token) = env_value.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()) {
            debug!("using access token from {}", TOKEN_ENV_VAR);
            return Ok(Self(token));
        }
        let data = fs::read_to_string(token_path).map_err(|e| {
            DriveError::Auth(format!(
                "set {} or provide {} ({})",
                TOKEN_ENV_VAR,
                token_path.display(),
                e
            ))
        })?;
        Self::parse(&data)
    }

    /// Accepts the authorized-user format (`token`) as well as a raw OAuth
    /// token response (`access_token`).
    pub fn parse(data: &str) -> Result<Self> {
        let file: TokenFile = serde_json::from_str(data)?;
        file.token
            .filter(|t| !t.trim().is_empty())
            .map(|t| Self(t.trim().to_string()))
            .ok_or_else(|| DriveError::Auth("token file has no access token".into()))
    }
}
