//! Shared helpers for command handlers.

use std::path::Path;

use serde::{Serialize, de::DeserializeOwned};
use tabled::Tabled;

use netdraw_core::Snapshot;

use crate::error::CliError;

/// Read a JSON or YAML file; `.yaml`/`.yml` selects YAML.
pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let invalid = |reason: String| CliError::InvalidFile {
        path: path.display().to_string(),
        reason,
    };
    let text = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));
    if is_yaml {
        serde_yaml::from_str(&text).map_err(|e| invalid(e.to_string()))
    } else {
        serde_json::from_str(&text).map_err(|e| invalid(e.to_string()))
    }
}

/// Entity counts of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Tabled)]
pub struct DocumentSummary {
    pub devices: usize,
    pub links: usize,
    pub groups: usize,
    pub streams: usize,
}

impl From<&Snapshot> for DocumentSummary {
    fn from(s: &Snapshot) -> Self {
        Self {
            devices: s.devices.len(),
            links: s.links.len(),
            groups: s.groups.len(),
            streams: s.streams.len(),
        }
    }
}

impl std::fmt::Display for DocumentSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} devices, {} links, {} groups, {} streams",
            self.devices, self.links, self.groups, self.streams
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn yaml_extension_selects_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("topo.yml");
        std::fs::write(&path, "devices:\n  - {id: 1, name: r1, x: 0, y: 0, type: router}\n").unwrap();
        let snap: Snapshot = read_document(&path).unwrap();
        assert_eq!(DocumentSummary::from(&snap).to_string(), "1 devices, 0 links, 0 groups, 0 streams");
    }

    #[test]
    fn unreadable_files_are_named() {
        let err = read_document::<Snapshot>(Path::new("/nonexistent/topo.json")).unwrap_err();
        assert!(matches!(err, CliError::InvalidFile { ref path, .. } if path == "/nonexistent/topo.json"));
    }
}
