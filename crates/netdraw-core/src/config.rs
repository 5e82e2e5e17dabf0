// ── Runtime editor configuration ──
//
// These types describe how the editor behaves and where a session
// connects. They never touch disk: the CLI builds a `SessionConfig`
// from its profile and hands it in.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification (self-signed lab servers).
    DangerAcceptInvalid,
}

/// Tuning for the synchronous editor.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorConfig {
    /// Canvas width in screen pixels, used for fitting and centering.
    pub graph_width: f64,
    /// Canvas height in screen pixels.
    pub graph_height: f64,
    /// Lower zoom bound for wheel zooming.
    pub zoom_min: f64,
    /// Upper zoom bound for wheel zooming.
    pub zoom_max: f64,
    /// Capacity of the in-memory transition trace.
    pub trace_capacity: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            graph_width: 1280.0,
            graph_height: 800.0,
            zoom_min: 0.01,
            zoom_max: 10.0,
            trace_capacity: 4096,
        }
    }
}

/// Configuration for one collaborative session against a server.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Server URL (e.g. `https://awx.example.com`).
    pub url: Url,
    /// Inventory whose topology is edited.
    pub inventory_id: u64,
    /// API token, sent as a bearer header on REST and socket handshakes.
    pub token: Option<SecretString>,
    /// TLS verification strategy.
    pub tls: TlsVerification,
    /// REST request timeout.
    pub timeout: Duration,
    /// Delay before the first socket reconnect attempt.
    pub reconnect_delay: Duration,
    /// Also connect the test channel (recording and scripted tests).
    pub test_channel: bool,
    /// Editor tuning.
    pub editor: EditorConfig,
}

impl SessionConfig {
    pub fn new(url: Url, inventory_id: u64) -> Self {
        Self {
            url,
            inventory_id,
            token: None,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            reconnect_delay: Duration::from_millis(300),
            test_channel: true,
            editor: EditorConfig::default(),
        }
    }
}
