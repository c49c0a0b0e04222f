use std::env;
use std::net::SocketAddr;

use thiserror::Error;

const DEFAULT_PG_TABLE: &str = "processed_documents";
const DEFAULT_MARK_FIELD: &str = "gleaner_processed";
const DEFAULT_BATCH_SIZE: usize = 100;
const DEFAULT_INTERVAL_MINUTES: u64 = 60;
const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Runtime settings, read once at startup. Malformed values are fatal rather
/// than silently replaced with defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    pub mongo_uri: String,
    pub mongo_db: String,
    pub mongo_collection: String,
    pub pg_uri: String,
    pub pg_table: String,
    pub batch_size: usize,
    pub mark_field: String,
    pub mark_processed: bool,
    pub interval_minutes: u64,
    pub http_addr: SocketAddr,
}

impl Settings {
    pub fn from_env() -> crate::Result<Self> {
        let pg_table = var_or("GLEANER_PG_TABLE", DEFAULT_PG_TABLE);
        if !is_sql_identifier(&pg_table) {
            return Err(ConfigError::Invalid {
                var: "GLEANER_PG_TABLE",
                reason: format!("{pg_table:?} is not a plain SQL identifier"),
            }
            .into());
        }

        let mark_field = var_or("GLEANER_MARK_FIELD", DEFAULT_MARK_FIELD);
        if mark_field.trim().is_empty() {
            return Err(ConfigError::Invalid {
                var: "GLEANER_MARK_FIELD",
                reason: "must not be empty".to_string(),
            }
            .into());
        }

        Ok(Self {
            mongo_uri: require("GLEANER_MONGO_URI")?,
            mongo_db: require("GLEANER_MONGO_DB")?,
            mongo_collection: require("GLEANER_MONGO_COLLECTION")?,
            pg_uri: require("GLEANER_PG_URI")?,
            pg_table,
            batch_size: parse_var("GLEANER_BATCH_SIZE", DEFAULT_BATCH_SIZE, |raw| {
                raw.parse::<usize>().ok().filter(|n| *n > 0)
            })?,
            mark_field,
            mark_processed: parse_var("GLEANER_MARK_PROCESSED", true, parse_bool)?,
            interval_minutes: parse_var("GLEANER_INTERVAL_MINUTES", DEFAULT_INTERVAL_MINUTES, |raw| {
                raw.parse::<u64>().ok().filter(|n| *n > 0)
            })?,
            http_addr: parse_var("GLEANER_HTTP_ADDR", default_http_addr(), |raw| {
                raw.parse::<SocketAddr>().ok()
            })?,
        })
    }
}

fn require(var: &'static str) -> Result<String, ConfigError> {
    env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(var))
}

fn var_or(var: &str, default: &str) -> String {
    env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_var<T>(
    var: &'static str,
    default: T,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(raw) if !raw.trim().is_empty() => parse(raw.trim()).ok_or_else(|| ConfigError::Invalid {
            var,
            reason: format!("could not parse {raw:?}"),
        }),
        _ => Ok(default),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    if raw == "1" || raw.eq_ignore_ascii_case("true") {
        Some(true)
    } else if raw == "0" || raw.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

// The table name is interpolated into DDL, so it is restricted to a bare
// identifier instead of being quoted.
fn is_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn default_http_addr() -> SocketAddr {
    DEFAULT_HTTP_ADDR
        .parse()
        .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 8000)))
}
