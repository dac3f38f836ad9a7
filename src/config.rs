//! Connection configuration loaded from the process environment
//!
//! All six variables are mandatory. Loading stops at the first variable that
//! is unset or empty and reports it by name; nothing is defaulted.

use std::env::VarError;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};

use crate::error::{Error, Result};

pub const ENV_HOST: &str = "MONGODB_HOST";
pub const ENV_PORT: &str = "MONGODB_PORT";
pub const ENV_USER: &str = "MONGODB_USER";
pub const ENV_PASSWORD: &str = "MONGODB_PASSWORD";
pub const ENV_ADMIN_PASSWORD: &str = "MONGODB_ADMIN_PASSWORD";
pub const ENV_DATABASE: &str = "MONGODB_DATABASE";

/// Every required variable, in the order they are checked
pub const REQUIRED_ENV: [&str; 6] = [
    ENV_HOST,
    ENV_PORT,
    ENV_USER,
    ENV_PASSWORD,
    ENV_ADMIN_PASSWORD,
    ENV_DATABASE,
];

/// Immutable connection parameters for the application and admin sessions
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: String,
    pub username: String,
    pub password: String,
    pub admin_password: String,
    pub database_name: String,
}

impl ConnectionConfig {
    /// Load from the real process environment
    pub fn from_env() -> Result<Self> {
        Self::try_from_lookup(env_var)
    }

    /// Load through an arbitrary lookup function
    ///
    /// The lookup returns `None` for unset variables. Empty values are
    /// treated the same as unset ones.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::try_from_lookup(|key| Ok(lookup(key)))
    }

    /// Load through a lookup that can reject a present but unusable value
    pub fn try_from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<Option<String>>,
    {
        let require = |key: &'static str| -> Result<String> {
            lookup(key)?
                .filter(|value| !value.is_empty())
                .ok_or(Error::MissingEnv(key))
        };

        let config = Self {
            host: require(ENV_HOST)?,
            port: require(ENV_PORT)?,
            username: require(ENV_USER)?,
            password: require(ENV_PASSWORD)?,
            admin_password: require(ENV_ADMIN_PASSWORD)?,
            database_name: require(ENV_DATABASE)?,
        };

        config.port_number()?;
        Ok(config)
    }

    /// Port parsed as a TCP port number
    pub fn port_number(&self) -> Result<u16> {
        self.port.parse::<u16>().map_err(|e| {
            Error::InvalidConfig(format!("{ENV_PORT} '{}' is not a valid port: {e}", self.port))
        })
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("admin_password", &"***")
            .field("database_name", &self.database_name)
            .finish()
    }
}

/// Read one variable; a value that is not valid UTF-8 is a config error
fn env_var(key: &str) -> Result<Option<String>> {
    match std::env::var(key) {
        Ok(value) => Ok(Some(value)),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => Err(Error::InvalidConfig(format!(
            "{key} is set but is not valid UTF-8"
        ))),
    }
}

/// Parse the metrics listen address
///
/// An empty value disables the endpoint. A bare `:port` binds every
/// interface.
pub fn parse_listen_addr(listen: &str) -> Result<Option<SocketAddr>> {
    let listen = listen.trim();
    if listen.is_empty() {
        return Ok(None);
    }

    let invalid = |e: std::num::ParseIntError| {
        Error::InvalidConfig(format!("invalid listen address '{listen}': {e}"))
    };

    if let Some(port) = listen.strip_prefix(':') {
        let port = port.parse::<u16>().map_err(invalid)?;
        return Ok(Some(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))));
    }

    listen
        .parse::<SocketAddr>()
        .map(Some)
        .map_err(|e| Error::InvalidConfig(format!("invalid listen address '{listen}': {e}")))
}
