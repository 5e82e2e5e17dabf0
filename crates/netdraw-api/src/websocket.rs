//! Topology WebSocket with auto-reconnect.
//!
//! Connects to the server's `/network_ui/topology` (or `/network_ui/test`)
//! endpoint and shuttles raw JSON text frames both ways. Inbound frames and
//! connection transitions arrive on an [`mpsc`] channel; outbound frames are
//! queued on another one that survives reconnects. Reconnection uses
//! exponential backoff with jitter.
//!
//! Frames are not parsed here: the editor core owns the wire format.
//!
//! # Example
//!
//! ```rust,ignore
//! use netdraw_api::websocket::{ReconnectConfig, SocketEvent, TopologySocket, topology_url};
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let url = topology_url(&"https://awx.local".parse()?, 1)?;
//!
//! let mut socket = TopologySocket::connect(url, ReconnectConfig::default(), cancel.clone(), None);
//! while let Some(event) = socket.recv().await {
//!     if let SocketEvent::Frame(text) = event {
//!         println!("{text}");
//!     }
//! }
//! ```

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;

// ── Channel capacities ───────────────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 1024;
const OUTBOUND_CHANNEL_CAPACITY: usize = 1024;

// ── Endpoints ────────────────────────────────────────────────────────

/// `ws(s)://host/network_ui/topology?inventory_id=N`
pub fn topology_url(base: &Url, inventory_id: u64) -> Result<Url, Error> {
    endpoint_url(base, "network_ui/topology", inventory_id)
}

/// `ws(s)://host/network_ui/test?inventory_id=N`
pub fn test_url(base: &Url, inventory_id: u64) -> Result<Url, Error> {
    endpoint_url(base, "network_ui/test", inventory_id)
}

fn endpoint_url(base: &Url, path: &str, inventory_id: u64) -> Result<Url, Error> {
    let scheme = match base.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(Error::UnsupportedScheme {
                scheme: other.to_owned(),
            });
        }
    };

    let mut url = base.join(&format!("/{path}"))?;
    url.set_scheme(scheme).map_err(|()| Error::UnsupportedScheme {
        scheme: scheme.to_owned(),
    })?;
    url.query_pairs_mut()
        .clear()
        .append_pair("inventory_id", &inventory_id.to_string());
    Ok(url)
}

// ── SocketEvent ──────────────────────────────────────────────────────

/// What the background task reports to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// A connection was (re-)established.
    Connected,
    /// The connection dropped; a reconnect is pending unless shut down.
    Disconnected,
    /// One inbound text frame, verbatim.
    Frame(String),
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for WebSocket reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 300ms.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(300),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── TopologySocket ───────────────────────────────────────────────────

/// Handle to a running topology socket.
///
/// Drop it or call [`shutdown`](Self::shutdown) to tear down the
/// background task.
pub struct TopologySocket {
    event_rx: mpsc::Receiver<SocketEvent>,
    outbound_tx: mpsc::Sender<String>,
    cancel: CancellationToken,
}

impl TopologySocket {
    /// Spawn the reconnection loop for `ws_url`.
    ///
    /// Returns immediately. The first connection attempt happens
    /// asynchronously and is reported as [`SocketEvent::Connected`].
    pub fn connect(
        ws_url: Url,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
        authorization: Option<String>,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CHANNEL_CAPACITY);

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            ws_loop(
                ws_url,
                event_tx,
                outbound_rx,
                reconnect,
                task_cancel,
                authorization,
            )
            .await;
        });

        Self {
            event_rx,
            outbound_tx,
            cancel,
        }
    }

    /// Wrap channels fed by something other than the reconnection loop,
    /// such as an in-process bridge.
    pub fn from_channels(
        event_rx: mpsc::Receiver<SocketEvent>,
        outbound_tx: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            event_rx,
            outbound_tx,
            cancel,
        }
    }

    /// Next event from the socket. `None` once the task has exited.
    pub async fn recv(&mut self) -> Option<SocketEvent> {
        self.event_rx.recv().await
    }

    /// Queue a text frame for delivery.
    ///
    /// Frames queued while disconnected are written after the next
    /// successful reconnect.
    pub async fn send(&self, frame: String) -> Result<(), Error> {
        self.outbound_tx
            .send(frame)
            .await
            .map_err(|_| Error::SocketShutdown)
    }

    /// A cloneable sender for outbound frames.
    pub fn sender(&self) -> mpsc::Sender<String> {
        self.outbound_tx.clone()
    }

    /// Signal the background task to shut down gracefully.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for TopologySocket {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → pump frames → on error, backoff → reconnect.
async fn ws_loop(
    ws_url: Url,
    event_tx: mpsc::Sender<SocketEvent>,
    mut outbound_rx: mpsc::Receiver<String>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
    authorization: Option<String>,
) {
    let mut attempt: u32 = 0;

    loop {
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_pump(
                &ws_url,
                &event_tx,
                &mut outbound_rx,
                &cancel,
                authorization.as_deref(),
            ) => result,
        };

        if cancel.is_cancelled() {
            break;
        }

        match result {
            // Clean disconnect (server close frame or stream ended).
            Ok(true) => {
                tracing::info!("topology socket closed cleanly, reconnecting");
                attempt = 0;
            }
            Ok(false) => {
                tracing::debug!("topology socket owner is gone");
                break;
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt, "topology socket error");

                if let Some(max) = reconnect.max_retries {
                    if attempt >= max {
                        tracing::error!(
                            max_retries = max,
                            "topology socket reconnection limit reached, giving up"
                        );
                        break;
                    }
                }

                let delay = calculate_backoff(attempt, &reconnect);
                tracing::info!(
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    attempt,
                    "waiting before reconnect"
                );

                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }

                attempt = attempt.saturating_add(1);
            }
        }
    }

    tracing::debug!("topology socket loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Establish one connection and pump frames until it drops.
///
/// Returns `Ok(true)` on a clean close, `Ok(false)` when the owner dropped
/// its receiver (nobody is listening, so stop reconnecting).
async fn connect_and_pump(
    url: &Url,
    event_tx: &mpsc::Sender<SocketEvent>,
    outbound_rx: &mut mpsc::Receiver<String>,
    cancel: &CancellationToken,
    authorization: Option<&str>,
) -> Result<bool, Error> {
    tracing::info!(url = %url, "connecting to topology socket");

    let uri: tungstenite::http::Uri = url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;

    let mut request = ClientRequestBuilder::new(uri);
    if let Some(value) = authorization {
        request = request.with_header("Authorization", value);
    }

    let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    tracing::info!("topology socket connected");
    if event_tx.send(SocketEvent::Connected).await.is_err() {
        return Ok(false);
    }

    let (mut write, mut read) = ws_stream.split();

    let outcome = loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = write.send(tungstenite::Message::Close(None)).await;
                break Ok(true);
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        if event_tx.send(SocketEvent::Frame(text.as_str().to_owned())).await.is_err() {
                            break Ok(false);
                        }
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite handles pong replies automatically
                        tracing::trace!("topology socket ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            tracing::info!(
                                code = %cf.code,
                                reason = %cf.reason,
                                "topology socket close frame received"
                            );
                        } else {
                            tracing::info!("topology socket close frame received (no payload)");
                        }
                        break Ok(true);
                    }
                    Some(Err(e)) => {
                        break Err(Error::WebSocketConnect(e.to_string()));
                    }
                    None => {
                        tracing::info!("topology socket stream ended");
                        break Ok(true);
                    }
                    _ => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
            outbound = outbound_rx.recv() => {
                let Some(text) = outbound else {
                    break Ok(false);
                };
                if let Err(e) = write.send(tungstenite::Message::text(text)).await {
                    break Err(Error::WebSocketConnect(e.to_string()));
                }
            }
        }
    };

    // Ignore send errors: the owner may already be gone.
    let _ = event_tx.send(SocketEvent::Disconnected).await;
    outcome
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`
///
/// Jitter is +-25% to spread out reconnection storms from multiple clients.
#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt.min(30)).unwrap_or(30);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * ((f64::from(attempt) * 7.3).sin());
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_millis(300));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert!(config.max_retries.is_none());
    }

    #[test]
    fn backoff_increases_exponentially() {
        let config = ReconnectConfig::default();

        let d0 = calculate_backoff(0, &config);
        let d1 = calculate_backoff(1, &config);
        let d2 = calculate_backoff(2, &config);

        assert!(d1 > d0, "d1 ({d1:?}) should be greater than d0 ({d0:?})");
        assert!(d2 > d1, "d2 ({d2:?}) should be greater than d1 ({d1:?})");
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_retries: None,
        };

        let d10 = calculate_backoff(10, &config);
        // With jitter factor up to 1.25, max effective is 12.5s
        assert!(
            d10 <= Duration::from_secs(13),
            "delay at attempt 10 ({d10:?}) should be capped near max_delay"
        );
    }

    #[test]
    fn topology_url_maps_https_to_wss() {
        let base: Url = "https://awx.example.com/some/ui/".parse().unwrap();
        let url = topology_url(&base, 7).unwrap();
        assert_eq!(
            url.as_str(),
            "wss://awx.example.com/network_ui/topology?inventory_id=7"
        );
    }

    #[test]
    fn test_url_maps_http_to_ws_and_keeps_port() {
        let base: Url = "http://localhost:8013".parse().unwrap();
        let url = test_url(&base, 1).unwrap();
        assert_eq!(url.as_str(), "ws://localhost:8013/network_ui/test?inventory_id=1");
    }

    #[test]
    fn endpoint_rejects_unknown_scheme() {
        let base: Url = "ftp://files.example.com".parse().unwrap();
        assert!(matches!(
            topology_url(&base, 1),
            Err(Error::UnsupportedScheme { .. })
        ));
    }

    #[tokio::test]
    async fn shutdown_stops_an_unreachable_socket() {
        let cancel = CancellationToken::new();
        let url: Url = "ws://127.0.0.1:9/network_ui/topology?inventory_id=1"
            .parse()
            .unwrap();
        let reconnect = ReconnectConfig {
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            max_retries: Some(1),
        };

        let mut socket = TopologySocket::connect(url, reconnect, cancel, None);
        socket.shutdown();

        // The task exits and drops its sender, so the channel drains to None.
        let drained = tokio::time::timeout(Duration::from_secs(5), async {
            while socket.recv().await.is_some() {}
        })
        .await;
        assert!(drained.is_ok());
    }
}
