// Async client for the inventory REST surface consumed by the editor.
//
// Base path: /api/v2/
// Auth: Authorization: Bearer <token> (installed by TransportConfig)

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::Error;
use crate::transport::TransportConfig;

// ── Response shapes ──────────────────────────────────────────────────

/// One page of a paginated list endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Page<T> {
    #[serde(default)]
    pub count: u64,
    /// Absolute or root-relative URL of the next page.
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub results: Vec<T>,
}

/// An inventory host as returned by `/api/v2/hosts/:id/`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Host {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub inventory: Option<u64>,
    #[serde(default)]
    pub enabled: bool,
    /// Raw YAML or JSON variable blob.
    #[serde(default)]
    pub variables: String,
}

impl Host {
    /// Device type declared under `ansible_topology.type`, if any.
    ///
    /// Variables are stored as YAML (a JSON blob is valid YAML too).
    /// Unparseable or missing variables yield `None`.
    pub fn topology_type(&self) -> Option<String> {
        if self.variables.trim().is_empty() {
            return None;
        }
        let vars: serde_yaml::Value = match serde_yaml::from_str(&self.variables) {
            Ok(v) => v,
            Err(e) => {
                debug!(host = %self.name, error = %e, "host variables are not valid YAML");
                return None;
            }
        };
        vars.get("ansible_topology")?
            .get("type")?
            .as_str()
            .map(str::to_owned)
    }
}

#[derive(Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    detail: Option<String>,
}

// ── Client ───────────────────────────────────────────────────────────

/// Async client for the host inventory REST API.
pub struct InventoryClient {
    http: reqwest::Client,
    base_url: Url,
}

impl InventoryClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build from a server URL and transport config (TLS, timeout, token).
    pub fn new(base_url: &str, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Self::from_reqwest(base_url, http)
    }

    /// Wrap an existing `reqwest::Client` (caller manages auth headers).
    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        let mut url = Url::parse(base_url)?;
        let path = url.path().trim_end_matches('/').to_owned();
        url.set_path(&format!("{path}/"));
        Ok(Self {
            http,
            base_url: url,
        })
    }

    /// The normalized server URL (always ends with `/`).
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// All hosts of an inventory, following `next` links until exhausted.
    pub async fn list_hosts(&self, inventory_id: u64) -> Result<Vec<Host>, Error> {
        let mut url = self
            .base_url
            .join(&format!("api/v2/inventories/{inventory_id}/hosts/"))?;
        let mut hosts = Vec::new();

        loop {
            let page: Page<Host> = self.get(url).await?;
            hosts.extend(page.results);

            match page.next.as_deref() {
                Some(next) if !next.is_empty() => url = self.base_url.join(next)?,
                _ => break,
            }
        }

        debug!(inventory_id, count = hosts.len(), "listed inventory hosts");
        Ok(hosts)
    }

    /// A single host by id.
    pub async fn get_host(&self, host_id: u64) -> Result<Host, Error> {
        let url = self.base_url.join(&format!("api/v2/hosts/{host_id}/"))?;
        self.get(url).await
    }

    // ── HTTP plumbing ────────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {url}");
        let resp = self.http.get(url).send().await?;
        Self::handle_response(resp).await
    }

    async fn handle_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            serde_json::from_str(&body).map_err(|e| {
                let preview: String = body.chars().take(200).collect();
                Error::Deserialization {
                    message: format!("{e} (body preview: {preview:?})"),
                    body,
                }
            })
        } else {
            Err(Self::parse_error(status, resp).await)
        }
    }

    async fn parse_error(status: reqwest::StatusCode, resp: reqwest::Response) -> Error {
        let raw = resp.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorResponse>(&raw)
            .ok()
            .and_then(|e| e.detail);

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Error::Authentication {
                message: detail.unwrap_or_else(|| status.to_string()),
            };
        }

        Error::Api {
            status: status.as_u16(),
            message: detail.unwrap_or_else(|| {
                if raw.is_empty() {
                    status.to_string()
                } else {
                    raw
                }
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn host(variables: &str) -> Host {
        Host {
            id: 1,
            name: "leaf1".into(),
            description: String::new(),
            inventory: Some(1),
            enabled: true,
            variables: variables.into(),
        }
    }

    #[test]
    fn topology_type_from_yaml() {
        let h = host("ansible_topology:\n  type: switch\nansible_host: 10.0.0.1\n");
        assert_eq!(h.topology_type().as_deref(), Some("switch"));
    }

    #[test]
    fn topology_type_from_json() {
        let h = host(r#"{"ansible_topology": {"type": "router"}}"#);
        assert_eq!(h.topology_type().as_deref(), Some("router"));
    }

    #[test]
    fn topology_type_missing_or_garbage() {
        assert_eq!(host("").topology_type(), None);
        assert_eq!(host("ansible_host: 10.0.0.1").topology_type(), None);
        assert_eq!(host(": : :\n  - [").topology_type(), None);
    }

    #[test]
    fn base_url_gains_trailing_slash() {
        let client =
            InventoryClient::from_reqwest("https://awx.example.com/tower", reqwest::Client::new())
                .unwrap();
        assert_eq!(client.base_url().as_str(), "https://awx.example.com/tower/");
    }
}
