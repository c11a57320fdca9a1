use thiserror::Error;

/// Top-level error type for the `sitepulse-api` crate.
///
/// Covers both external surfaces: the metrics WebSocket stream and the
/// share-persistence HTTP backend. `sitepulse-core` maps these into its
/// user-facing taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket handshake or mid-stream transport failure.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed by the peer with a non-normal code.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    // ── Share backend ───────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Structured error from the share backend.
    #[error("Share API error (HTTP {status}): {message}")]
    ShareApi { message: String, status: u16 },

    // ── Common ──────────────────────────────────────────────────────
    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::WebSocketConnect(_) => true,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::ShareApi { status: 404, .. } => true,
            _ => false,
        }
    }
}
