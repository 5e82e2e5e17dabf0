// ── Snapshot wire shapes ──
//
// Flat, id-addressed records. A snapshot never embeds object graphs:
// links name their endpoints by device and interface id, groups carry
// member ids.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::device::DeviceType;
use super::group::GroupType;
use super::toolbox::DeviceTemplate;
use crate::error::CoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceRecord {
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub process_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    pub x: f64,
    pub y: f64,
    #[serde(rename = "type", alias = "device_type", default)]
    pub device_type: DeviceType,
    #[serde(default)]
    pub host_id: Option<u64>,
    #[serde(default)]
    pub interfaces: Vec<InterfaceRecord>,
    #[serde(default)]
    pub processes: Vec<ProcessRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    pub from_device_id: u64,
    pub to_device_id: u64,
    pub from_interface_id: u64,
    pub to_interface_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", alias = "group_type", default)]
    pub group_type: GroupType,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    #[serde(default)]
    pub members: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRecord {
    pub id: u64,
    pub from_id: u64,
    pub to_id: u64,
    #[serde(default)]
    pub label: String,
}

/// Full serialization of a topology, used for initial sync, tests and
/// recordings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub devices: Vec<DeviceRecord>,
    #[serde(default)]
    pub links: Vec<LinkRecord>,
    #[serde(default)]
    pub groups: Vec<GroupRecord>,
    #[serde(default)]
    pub streams: Vec<StreamRecord>,
    /// Devices the server offers for placement; replaces the palette.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory_toolbox: Option<Vec<DeviceTemplate>>,
    /// 0 for the pre-condition, 1 for the post-condition of a recording.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<u64>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty() && self.groups.is_empty()
    }

    /// Bounding box of all device centers.
    pub fn device_extent(&self) -> Option<(f64, f64, f64, f64)> {
        let mut it = self.devices.iter();
        let first = it.next()?;
        Some(it.fold(
            (first.x, first.y, first.x, first.y),
            |(min_x, min_y, max_x, max_y), d| {
                (min_x.min(d.x), min_y.min(d.y), max_x.max(d.x), max_y.max(d.y))
            },
        ))
    }
}

// ── Snapshot files ───────────────────────────────────────────────────

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
}

impl Snapshot {
    /// Read a snapshot file. `.yaml`/`.yml` is parsed as YAML, anything
    /// else as JSON.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let invalid = |message: String| CoreError::InvalidDocument {
            path: path.display().to_string(),
            message,
        };
        let text = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        if is_yaml(path) {
            serde_yaml::from_str(&text).map_err(|e| invalid(e.to_string()))
        } else {
            serde_json::from_str(&text).map_err(|e| invalid(e.to_string()))
        }
    }

    /// Write the snapshot in the format its extension names.
    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        let invalid = |message: String| CoreError::InvalidDocument {
            path: path.display().to_string(),
            message,
        };
        let text = if is_yaml(path) {
            serde_yaml::to_string(self).map_err(|e| invalid(e.to_string()))?
        } else {
            serde_json::to_string_pretty(self).map_err(|e| invalid(e.to_string()))?
        };
        std::fs::write(path, text).map_err(|e| invalid(e.to_string()))
    }
}
