use crate::errors::{ServiceError, ServiceResult};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

const PREFIX: &str = "PRIM_ENGINE_";

/// Runtime configuration, read from the environment (and `.env` when present)
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: SocketAddr,
    pub hashid_salt: String,
    pub hashid_min_length: usize,
    pub jwt_secret: String,
    pub request_timeout_secs: u64,
    pub max_connections: u32,
}

impl Config {
    /// Read the process environment. Call `dotenv::dotenv()` first to pick up `.env`.
    pub fn from_env() -> ServiceResult<Self> {
        let vars: HashMap<String, String> = std::env::vars()
            .filter(|(key, _)| key.starts_with(PREFIX))
            .collect();
        Self::from_vars(&vars)
    }

    /// Build a configuration from `PRIM_ENGINE_*` variables
    pub fn from_vars(vars: &HashMap<String, String>) -> ServiceResult<Self> {
        let get = |name: &str| -> Option<&str> {
            vars.get(&format!("{}{}", PREFIX, name))
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };
        let required = |name: &str| -> ServiceResult<String> {
            get(name).map(str::to_string).ok_or_else(|| {
                ServiceError::Configuration(format!("{}{} must be set", PREFIX, name))
            })
        };
        fn parsed<T: std::str::FromStr>(name: &str, raw: Option<&str>, default: T) -> ServiceResult<T> {
            match raw {
                None => Ok(default),
                Some(raw) => raw.parse().map_err(|_| {
                    ServiceError::Configuration(format!("{}{} has an invalid value: {}", PREFIX, name, raw))
                }),
            }
        }

        let bind_address = get("BIND_ADDRESS").unwrap_or("127.0.0.1:3000");
        let bind_address = bind_address.parse().map_err(|_| {
            ServiceError::Configuration(format!("{}BIND_ADDRESS is not a socket address: {}", PREFIX, bind_address))
        })?;

        let max_connections = parsed("MAX_CONNECTIONS", get("MAX_CONNECTIONS"), 5u32)?;
        if max_connections == 0 {
            return Err(ServiceError::Configuration(format!("{}MAX_CONNECTIONS must be positive", PREFIX)));
        }

        Ok(Self {
            database_url: get("DATABASE_URL").unwrap_or("sqlite://prim_engine.db").to_string(),
            bind_address,
            hashid_salt: required("HASHID_SALT")?,
            hashid_min_length: parsed("HASHID_MIN_LENGTH", get("HASHID_MIN_LENGTH"), 8usize)?,
            jwt_secret: required("JWT_SECRET")?,
            request_timeout_secs: parsed("REQUEST_TIMEOUT_SECS", get("REQUEST_TIMEOUT_SECS"), 30u64)?,
            max_connections,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
