// ── Core error types ──
//
// User-facing errors from sitepulse-core. Consumers never see raw HTTP
// status codes or JSON parse failures -- the `From<sitepulse_api::Error>`
// impl translates transport-layer errors into domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Cannot connect to stream at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    #[error(transparent)]
    Share(#[from] crate::share::ShareError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<sitepulse_api::Error> for CoreError {
    fn from(err: sitepulse_api::Error) -> Self {
        match err {
            sitepulse_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason,
            },
            sitepulse_api::Error::WebSocketClosed { code, reason } => {
                CoreError::ConnectionFailed {
                    url: String::new(),
                    reason: format!("WebSocket closed (code {code}): {reason}"),
                }
            }
            sitepulse_api::Error::Transport(ref e) => {
                if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map(|u| u.to_string())
                            .unwrap_or_else(|| "<unknown>".into()),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            sitepulse_api::Error::ShareApi { message, status } => CoreError::Api {
                message,
                status: Some(status),
            },
            sitepulse_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            sitepulse_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn websocket_close_maps_to_connection_failed() {
        let err = CoreError::from(sitepulse_api::Error::WebSocketClosed {
            code: 1006,
            reason: "abnormal".into(),
        });
        assert!(matches!(err, CoreError::ConnectionFailed { .. }));
        assert!(err.to_string().contains("1006"));
    }

    #[test]
    fn share_api_error_keeps_status() {
        let err = CoreError::from(sitepulse_api::Error::ShareApi {
            message: "storage offline".into(),
            status: 503,
        });
        let CoreError::Api { status, .. } = err else {
            panic!("expected Api variant");
        };
        assert_eq!(status, Some(503));
    }

    #[test]
    fn validator_errors_nest_transparently() {
        let err = CoreError::from(crate::share::ShareError::CircuitOpen);
        assert_eq!(
            err.to_string(),
            "share lookups temporarily suspended for this token"
        );
    }
}
