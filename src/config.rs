//! Runtime configuration loaded from environment variables.
//!
//! Every knob has a default so a bare `cargo run` starts a usable server
//! against a local `songboard.db` file. Unparseable numbers fall back to
//! their defaults rather than aborting startup.

const DEFAULT_DATABASE_URL: &str = "sqlite://songboard.db";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_SESSION_TTL_HOURS: i64 = 168;
const DEFAULT_WS_TICKET_TTL_SECS: i64 = 60;
const DEFAULT_CLIENT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite connection string (`sqlite://path.db` or `sqlite::memory:`).
    pub database_url: String,
    /// Port the HTTP server binds to.
    pub port: u16,
    pub db_max_connections: u32,
    /// Lifetime of a login session.
    pub session_ttl_hours: i64,
    /// Lifetime of a one-time websocket ticket.
    pub ws_ticket_ttl_secs: i64,
    /// Outbound frame buffer per websocket connection. A full buffer drops
    /// events for that connection only.
    pub client_queue_capacity: usize,
    pub cookie_secure: bool,
    /// `(name, password)` of an account promoted to admin at startup.
    pub bootstrap_admin: Option<(String, String)>,
}

impl Config {
    /// Load configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.into()),
            port: env_parse("PORT", DEFAULT_PORT),
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            session_ttl_hours: env_parse("SESSION_TTL_HOURS", DEFAULT_SESSION_TTL_HOURS),
            ws_ticket_ttl_secs: env_parse("WS_TICKET_TTL_SECS", DEFAULT_WS_TICKET_TTL_SECS),
            client_queue_capacity: env_parse("CLIENT_QUEUE_CAPACITY", DEFAULT_CLIENT_QUEUE_CAPACITY).max(1),
            cookie_secure: env_bool("COOKIE_SECURE").unwrap_or(false),
            bootstrap_admin: std::env::var("BOOTSTRAP_ADMIN")
                .ok()
                .and_then(|raw| parse_bootstrap_admin(&raw)),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.into(),
            port: DEFAULT_PORT,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            ws_ticket_ttl_secs: DEFAULT_WS_TICKET_TTL_SECS,
            client_queue_capacity: DEFAULT_CLIENT_QUEUE_CAPACITY,
            cookie_secure: false,
            bootstrap_admin: None,
        }
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

pub(crate) fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key).ok().and_then(|raw| parse_bool(&raw))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Split `name:password`. Both halves must be non-empty after trimming.
fn parse_bootstrap_admin(raw: &str) -> Option<(String, String)> {
    let (name, password) = raw.split_once(':')?;
    let (name, password) = (name.trim(), password.trim());
    if name.is_empty() || password.is_empty() {
        return None;
    }
    Some((name.to_owned(), password.to_owned()))
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
