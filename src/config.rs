//! Session configuration from the environment

use crate::session::{Backoff, SessionContext};
use std::time::Duration;
use thiserror::Error;

/// Path of the chat socket on the backend
pub const CHAT_PATH: &str = "/ws/chat/";

const DEFAULT_WS_URL: &str = "ws://localhost:8000";
const DEFAULT_API_URL: &str = "http://localhost:8000";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a non-negative integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },
    #[error("{var} must start with {expected}, got {value:?}")]
    InvalidScheme {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
    #[error("reconnect base delay ({base_ms}ms) exceeds the maximum ({max_ms}ms)")]
    BackoffInverted { base_ms: u64, max_ms: u64 },
    #[error("{var} must be greater than zero")]
    Zero { var: &'static str },
}

/// Where the backend lives and how to reach it
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base URL of the socket server, e.g. `ws://localhost:8000`
    pub ws_url: String,
    /// Base URL of the REST API, e.g. `http://localhost:8000`
    pub api_url: String,
    /// `Cookie` header carrying an already-established login session
    pub session_cookie: Option<String>,
    pub backoff: Backoff,
    pub http_timeout: Duration,
    /// Deadline for the WebSocket handshake; an attempt past it counts as failed
    pub connect_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            session_cookie: None,
            backoff: Backoff::default(),
            http_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl SessionConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable lookup; unset variables keep their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let ws_url = lookup("DAYBOOK_WS_URL").unwrap_or(defaults.ws_url);
        if !(ws_url.starts_with("ws://") || ws_url.starts_with("wss://")) {
            return Err(ConfigError::InvalidScheme {
                var: "DAYBOOK_WS_URL",
                expected: "ws:// or wss://",
                value: ws_url,
            });
        }

        let api_url = lookup("DAYBOOK_API_URL").unwrap_or(defaults.api_url);
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(ConfigError::InvalidScheme {
                var: "DAYBOOK_API_URL",
                expected: "http:// or https://",
                value: api_url,
            });
        }

        let base_ms = parse_u64(&lookup, "DAYBOOK_RECONNECT_BASE_MS")?
            .unwrap_or(millis(defaults.backoff.base));
        let max_ms = parse_u64(&lookup, "DAYBOOK_RECONNECT_MAX_MS")?
            .unwrap_or(millis(defaults.backoff.max));
        if base_ms == 0 {
            return Err(ConfigError::Zero {
                var: "DAYBOOK_RECONNECT_BASE_MS",
            });
        }
        if base_ms > max_ms {
            return Err(ConfigError::BackoffInverted { base_ms, max_ms });
        }

        let http_timeout = parse_u64(&lookup, "DAYBOOK_HTTP_TIMEOUT_SECS")?
            .map_or(defaults.http_timeout, Duration::from_secs);
        let connect_timeout = match parse_u64(&lookup, "DAYBOOK_CONNECT_TIMEOUT_SECS")? {
            Some(0) => {
                return Err(ConfigError::Zero {
                    var: "DAYBOOK_CONNECT_TIMEOUT_SECS",
                })
            }
            Some(secs) => Duration::from_secs(secs),
            None => defaults.connect_timeout,
        };

        Ok(Self {
            ws_url,
            api_url,
            session_cookie: lookup("DAYBOOK_SESSION_COOKIE").filter(|c| !c.is_empty()),
            backoff: Backoff {
                base: Duration::from_millis(base_ms),
                max: Duration::from_millis(max_ms),
            },
            http_timeout,
            connect_timeout,
        })
    }

    /// Full URL of the chat socket
    pub fn chat_url(&self) -> String {
        format!("{}{CHAT_PATH}", self.ws_url.trim_end_matches('/'))
    }

    /// Context for a new session, with a fresh id
    pub fn session_context(&self) -> SessionContext {
        SessionContext::new(uuid::Uuid::new_v4().to_string(), self.backoff)
    }
}

fn parse_u64(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<u64>, ConfigError> {
    lookup(var)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidNumber { var, value })
        })
        .transpose()
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
