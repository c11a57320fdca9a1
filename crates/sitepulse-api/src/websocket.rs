//! Metrics WebSocket stream with bounded auto-reconnect.
//!
//! Connects to the analytics event source and fans decoded
//! [`MetricsFrame`]s out through a [`tokio::sync::broadcast`] channel.
//! Connection status is published through a `watch` channel so consumers
//! can render connectivity without polling.
//!
//! Reconnection policy: a fixed delay between attempts and a hard ceiling
//! on the attempt counter. Once the ceiling is reached the stream stays
//! [`ConnectionState::Disconnected`] until the owner builds a fresh handle
//! (a manual reconnect). A successful connection resets the counter, so
//! transient flakiness never accumulates toward the ceiling.
//!
//! # Example
//!
//! ```rust,ignore
//! use sitepulse_api::websocket::{ReconnectConfig, StreamHandle};
//! use tokio_util::sync::CancellationToken;
//! use url::Url;
//!
//! let cancel = CancellationToken::new();
//! let url = Url::parse("wss://stream.example.com/metrics")?;
//!
//! let handle = StreamHandle::connect(url, ReconnectConfig::default(), cancel.clone());
//! let mut rx = handle.subscribe();
//!
//! while let Ok(frame) = rx.recv().await {
//!     println!("{}: {} views", frame.site_id, frame.traffic.page_views);
//! }
//!
//! handle.shutdown();
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, watch};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::frame::MetricsFrame;

// ── Broadcast channel capacity ───────────────────────────────────────

const FRAME_CHANNEL_CAPACITY: usize = 1024;

// ── ConnectionState ──────────────────────────────────────────────────

/// Observable connection status of the metrics stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection attempt has been made yet.
    Idle,
    /// Handshake in progress. `attempt` is 0 for the initial connect and
    /// counts reconnection attempts after that.
    Connecting { attempt: u32 },
    Connected,
    /// Closed. Terminal once the reconnect ceiling is reached or the peer
    /// closed with a normal code — only a manual reconnect leaves it.
    Disconnected,
    /// A transport-level failure occurred. Transient: followed by either
    /// another `Connecting` or a terminal `Disconnected`.
    Errored,
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Reconnection policy for the metrics stream.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Fixed delay between reconnection attempts. Default: 3s.
    pub delay: Duration,

    /// Ceiling on the reconnect-attempt counter. Once reached, the stream
    /// stays disconnected until manually reconnected. Default: 10.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(3),
            max_attempts: 10,
        }
    }
}

// ── StreamHandle ─────────────────────────────────────────────────────

/// Handle to a running metrics stream.
///
/// Dropping the handle does not stop the background task; call
/// [`shutdown`](Self::shutdown) (or cancel the token passed to
/// [`connect`](Self::connect)) to tear it down.
pub struct StreamHandle {
    frame_rx: broadcast::Receiver<Arc<MetricsFrame>>,
    status_rx: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
}

impl StreamHandle {
    /// Spawn the socket loop and return immediately.
    ///
    /// The first connection attempt happens asynchronously — subscribe to
    /// the frame receiver and the status watch to observe progress.
    pub fn connect(url: Url, reconnect: ReconnectConfig, cancel: CancellationToken) -> Self {
        let (frame_tx, frame_rx) = broadcast::channel(FRAME_CHANNEL_CAPACITY);
        let (status_tx, status_rx) = watch::channel(ConnectionState::Idle);

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            ws_loop(url, frame_tx, status_tx, reconnect, task_cancel).await;
        });

        Self {
            frame_rx,
            status_rx,
            cancel,
        }
    }

    /// Get a new broadcast receiver for decoded frames.
    ///
    /// Multiple consumers can subscribe concurrently. A consumer that
    /// falls behind receives [`broadcast::error::RecvError::Lagged`].
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<MetricsFrame>> {
        self.frame_rx.resubscribe()
    }

    /// Subscribe to connection status transitions.
    pub fn status(&self) -> watch::Receiver<ConnectionState> {
        self.status_rx.clone()
    }

    /// Signal the socket loop to shut down.
    ///
    /// The loop sends a normal close frame before exiting. Frames already
    /// in flight may still be delivered to subscribers that have not been
    /// dropped; the engine joins its bridge task to guarantee quiescence.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Close-code policy ────────────────────────────────────────────────

/// Whether a peer close code should trigger reconnection.
///
/// 1000 (normal), 1001 (going away), and 1008 (policy violation) signal an
/// intentional teardown. 1005 means the close frame carried no code at
/// all, which peers use for a plain goodbye — also intentional.
fn should_reconnect(code: u16) -> bool {
    !matches!(code, 1000 | 1001 | 1005 | 1008)
}

// ── Background socket loop ───────────────────────────────────────────

/// How a single connected session ended.
enum SessionEnd {
    /// Peer closed with an intentional/normal code. No reconnect.
    NormalClose,
    /// Peer closed abnormally or the stream ended without a close frame.
    AbnormalClose(u16),
    /// Transport-level failure (handshake or mid-stream).
    TransportError(Error),
    /// Cancellation token fired.
    Cancelled,
}

/// Main loop: connect → read until the session ends → classify → either
/// stop or wait the fixed delay and reconnect, up to the attempt ceiling.
async fn ws_loop(
    url: Url,
    frame_tx: broadcast::Sender<Arc<MetricsFrame>>,
    status_tx: watch::Sender<ConnectionState>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        let _ = status_tx.send(ConnectionState::Connecting { attempt });
        tracing::info!(url = %url, attempt, "connecting to metrics stream");

        let connect_result = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = status_tx.send(ConnectionState::Disconnected);
                break;
            }
            result = tokio_tungstenite::connect_async(url.as_str()) => result,
        };

        let end = match connect_result {
            Ok((stream, _response)) => {
                // A successful handshake resets the counter: transient
                // flakiness must not accumulate toward the ceiling.
                attempt = 0;
                let _ = status_tx.send(ConnectionState::Connected);
                tracing::info!("metrics stream connected");
                read_session(stream, &frame_tx, &cancel).await
            }
            Err(e) => SessionEnd::TransportError(Error::WebSocketConnect(e.to_string())),
        };

        match end {
            SessionEnd::Cancelled => {
                let _ = status_tx.send(ConnectionState::Disconnected);
                break;
            }
            SessionEnd::NormalClose => {
                tracing::info!("metrics stream closed normally, not reconnecting");
                let _ = status_tx.send(ConnectionState::Disconnected);
                break;
            }
            SessionEnd::AbnormalClose(code) => {
                tracing::warn!(code, attempt, "metrics stream closed abnormally");
                let _ = status_tx.send(ConnectionState::Disconnected);
            }
            SessionEnd::TransportError(e) => {
                tracing::warn!(error = %e, attempt, "metrics stream transport error");
                let _ = status_tx.send(ConnectionState::Errored);
            }
        }

        if attempt >= reconnect.max_attempts {
            tracing::error!(
                max_attempts = reconnect.max_attempts,
                "reconnection limit reached, giving up until manual reconnect"
            );
            let _ = status_tx.send(ConnectionState::Disconnected);
            break;
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = status_tx.send(ConnectionState::Disconnected);
                break;
            }
            () = tokio::time::sleep(reconnect.delay) => {}
        }

        attempt += 1;
    }

    tracing::debug!("metrics stream loop exiting");
}

// ── Single session lifecycle ─────────────────────────────────────────

/// Read frames from one connected socket until it drops or is cancelled.
///
/// On cancellation a normal close frame is sent before returning, so the
/// peer sees an intentional teardown rather than a vanished client.
async fn read_session<S>(
    stream: WebSocketStream<S>,
    frame_tx: &broadcast::Sender<Arc<MetricsFrame>>,
    cancel: &CancellationToken,
) -> SessionEnd
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let close = CloseFrame {
                    code: CloseCode::Normal,
                    reason: "client shutdown".into(),
                };
                let _ = write.send(Message::Close(Some(close))).await;
                return SessionEnd::Cancelled;
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        decode_and_broadcast(&text, frame_tx);
                    }
                    Some(Ok(Message::Ping(_))) => {
                        // tungstenite replies with pongs automatically
                        tracing::trace!("metrics stream ping");
                    }
                    Some(Ok(Message::Close(close))) => {
                        let code = close.as_ref().map_or(1005, |cf| u16::from(cf.code));
                        tracing::info!(code, "metrics stream close frame received");
                        return if should_reconnect(code) {
                            SessionEnd::AbnormalClose(code)
                        } else {
                            SessionEnd::NormalClose
                        };
                    }
                    Some(Err(e)) => {
                        return SessionEnd::TransportError(
                            Error::WebSocketConnect(e.to_string()),
                        );
                    }
                    None => {
                        // Stream ended without a close frame: the server
                        // went away, so treat it as an abnormal close.
                        return SessionEnd::AbnormalClose(1006);
                    }
                    _ => {
                        // Binary, Pong, Frame — ignore
                    }
                }
            }
        }
    }
}

// ── Frame decoding ───────────────────────────────────────────────────

/// Decode one text frame and broadcast it. Malformed frames are logged
/// and dropped — they are not transport errors.
fn decode_and_broadcast(text: &str, frame_tx: &broadcast::Sender<Arc<MetricsFrame>>) {
    match MetricsFrame::parse(text) {
        Ok(frame) => {
            // Ignore send errors — just means no active subscribers.
            let _ = frame_tx.send(Arc::new(frame));
        }
        Err(e) => {
            tracing::debug!(error = %e, "dropping malformed metrics frame");
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.delay, Duration::from_secs(3));
        assert_eq!(config.max_attempts, 10);
    }

    #[test]
    fn normal_close_codes_suppress_reconnection() {
        assert!(!should_reconnect(1000));
        assert!(!should_reconnect(1001));
        assert!(!should_reconnect(1005));
        assert!(!should_reconnect(1008));
    }

    #[test]
    fn abnormal_close_codes_trigger_reconnection() {
        assert!(should_reconnect(1002));
        assert!(should_reconnect(1006));
        assert!(should_reconnect(1011));
        assert!(should_reconnect(4000));
    }

    #[test]
    fn decode_and_broadcast_valid_frame() {
        let (tx, mut rx) = broadcast::channel(16);

        let raw = serde_json::json!({
            "timestamp": "2026-02-10T12:00:00Z",
            "siteId": "site_1",
            "siteName": "Marketing Site",
            "pageViews": 10,
            "uniqueVisitors": 4,
            "bounceRate": 0.25,
            "avgSessionDuration": 31.0
        });

        decode_and_broadcast(&raw.to_string(), &tx);

        let frame = rx.try_recv().unwrap();
        assert_eq!(frame.site_id, "site_1");
        assert_eq!(frame.traffic.page_views, 10);
    }

    #[test]
    fn decode_and_broadcast_drops_malformed_frame() {
        let (tx, mut rx) = broadcast::channel::<Arc<MetricsFrame>>(16);

        decode_and_broadcast("not json at all", &tx);
        decode_and_broadcast("{\"siteId\": \"missing everything else\"}", &tx);

        assert!(rx.try_recv().is_err());
    }

    /// The loop must stop permanently once the attempt counter reaches the
    /// ceiling. Uses a freshly freed local port so every handshake fails
    /// with connection refused.
    #[tokio::test(flavor = "multi_thread")]
    async fn reconnection_stops_at_attempt_ceiling() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let url = Url::parse(&format!("ws://127.0.0.1:{port}/metrics")).unwrap();
        let reconnect = ReconnectConfig {
            delay: Duration::from_millis(10),
            max_attempts: 2,
        };

        let cancel = CancellationToken::new();
        let handle = StreamHandle::connect(url, reconnect, cancel);
        let mut status = handle.status();

        // Initial attempt + 2 reconnects all fail, then the loop gives up.
        let outcome = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if *status.borrow_and_update() == ConnectionState::Disconnected {
                    return;
                }
                status.changed().await.unwrap();
            }
        })
        .await;

        assert!(outcome.is_ok(), "stream never reached terminal Disconnected");
    }

    /// Cancelling the token while waiting out the reconnect delay must end
    /// the loop in Disconnected without further attempts.
    #[tokio::test(flavor = "multi_thread")]
    async fn shutdown_cancels_pending_reconnect() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let url = Url::parse(&format!("ws://127.0.0.1:{port}/metrics")).unwrap();
        let reconnect = ReconnectConfig {
            delay: Duration::from_secs(60),
            max_attempts: 10,
        };

        let cancel = CancellationToken::new();
        let handle = StreamHandle::connect(url, reconnect, cancel.clone());
        let mut status = handle.status();

        // Wait for the first failure (Errored), then shut down mid-delay.
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if *status.borrow_and_update() == ConnectionState::Errored {
                    return;
                }
                status.changed().await.unwrap();
            }
        })
        .await
        .expect("first attempt never failed");

        handle.shutdown();

        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if *status.borrow_and_update() == ConnectionState::Disconnected {
                    return;
                }
                status.changed().await.unwrap();
            }
        })
        .await
        .expect("shutdown did not stop the loop");
    }
}
