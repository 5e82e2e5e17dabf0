// Shared transport configuration for building reqwest::Client instances.
//
// The inventory client and any future REST consumers share TLS, timeout
// and auth-header settings through this module.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};

/// TLS verification mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsMode {
    /// Use the system certificate store.
    #[default]
    System,
    /// Use a custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate (for self-signed lab servers).
    DangerAcceptInvalid,
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    pub timeout: Duration,
    /// Bearer token sent on every request, if any.
    pub token: Option<SecretString>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            timeout: Duration::from_secs(30),
            token: None,
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, crate::error::Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("netdraw/", env!("CARGO_PKG_VERSION")))
            .default_headers(self.default_headers()?);

        match &self.tls {
            TlsMode::System => {}
            TlsMode::CustomCa(path) => {
                let cert_pem = std::fs::read(path).map_err(|e| {
                    crate::error::Error::Tls(format!("failed to read CA cert: {e}"))
                })?;
                let cert = reqwest::Certificate::from_pem(&cert_pem)
                    .map_err(|e| crate::error::Error::Tls(format!("invalid CA cert: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        builder
            .build()
            .map_err(|e| crate::error::Error::Tls(format!("failed to build HTTP client: {e}")))
    }

    /// `Authorization: Bearer ...` when a token is configured.
    pub fn authorization(&self) -> Option<String> {
        self.token
            .as_ref()
            .map(|token| format!("Bearer {}", token.expose_secret()))
    }

    fn default_headers(&self) -> Result<HeaderMap, crate::error::Error> {
        let mut headers = HeaderMap::new();
        if let Some(value) = self.authorization() {
            let mut value = HeaderValue::from_str(&value).map_err(|_| {
                crate::error::Error::Authentication {
                    message: "token contains characters not allowed in a header".into(),
                }
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_header_only_with_token() {
        let plain = TransportConfig::default();
        assert!(plain.authorization().is_none());

        let with_token = TransportConfig {
            token: Some(SecretString::from("abc123".to_string())),
            ..TransportConfig::default()
        };
        assert_eq!(with_token.authorization().as_deref(), Some("Bearer abc123"));
    }

    #[test]
    fn rejects_token_with_newline() {
        let config = TransportConfig {
            token: Some(SecretString::from("bad\ntoken".to_string())),
            ..TransportConfig::default()
        };
        assert!(matches!(
            config.build_client(),
            Err(crate::error::Error::Authentication { .. })
        ));
    }
}
