//! Client configuration.
//!
//! A [`ClientConfig`] is built in code or read from the environment:
//! - `CRONYX_URL`: base address of the lock server (required)
//! - `CRONYX_USERNAME` / `CRONYX_PASSWORD`: basic-auth credentials (optional,
//!   both or neither)

use reqwest::Url;
use secrecy::SecretString;

use crate::error::ConfigError;

pub const URL_ENV: &str = "CRONYX_URL";
pub const USERNAME_ENV: &str = "CRONYX_USERNAME";
pub const PASSWORD_ENV: &str = "CRONYX_PASSWORD";

/// Static basic-auth credentials attached to every request.
///
/// The password is kept in a [`SecretString`] so it never shows up in `Debug`
/// output or logs.
#[derive(Debug)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }
}

/// Where the lock server lives and how to authenticate against it.
#[derive(Debug)]
pub struct ClientConfig {
    pub url: Url,
    pub credentials: Option<Credentials>,
}

impl ClientConfig {
    /// Parses and checks the base address.
    pub fn new(url: &str) -> Result<Self, ConfigError> {
        Ok(ClientConfig {
            url: parse_base_url(url)?,
            credentials: None,
        })
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Reads the configuration from `CRONYX_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());

        let url = get(URL_ENV).ok_or(ConfigError::Missing(URL_ENV))?;
        let config = ClientConfig::new(&url)?;

        match (get(USERNAME_ENV), get(PASSWORD_ENV)) {
            (Some(username), Some(password)) => {
                Ok(config.with_credentials(Credentials::new(username, password)))
            }
            (None, None) => Ok(config),
            (Some(_), None) => Err(ConfigError::PartialCredentials(
                "CRONYX_USERNAME is set without CRONYX_PASSWORD",
            )),
            (None, Some(_)) => Err(ConfigError::PartialCredentials(
                "CRONYX_PASSWORD is set without CRONYX_USERNAME",
            )),
        }
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    };
    let url = Url::parse(raw).map_err(|err| invalid(&err.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.cannot_be_a_base() {
        return Err(invalid("url cannot carry path segments"));
    }
    Ok(url)
}
