// ── Palettes and the templates they hold ──

use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use super::device::DeviceType;
use super::group::GroupType;
use super::snapshot::InterfaceRecord;

// ── Templates ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessTemplate {
    pub name: String,
    #[serde(rename = "type", default)]
    pub process_type: String,
}

/// A device prototype. Inside a group template `id` is template-local
/// and `x`/`y` are relative to the group's top-left corner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceTemplate {
    #[serde(default)]
    pub id: u64,
    pub name: String,
    #[serde(rename = "type", alias = "device_type", default)]
    pub device_type: DeviceType,
    #[serde(default)]
    pub host_id: Option<u64>,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub interfaces: Vec<InterfaceRecord>,
    #[serde(default)]
    pub processes: Vec<ProcessTemplate>,
}

impl DeviceTemplate {
    pub fn new(name: impl Into<String>, device_type: DeviceType) -> Self {
        Self {
            id: 0,
            name: name.into(),
            device_type,
            host_id: None,
            x: 0.0,
            y: 0.0,
            interfaces: Vec::new(),
            processes: Vec::new(),
        }
    }
}

/// Link between two template-local devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkTemplate {
    #[serde(default)]
    pub name: String,
    pub from_device_id: u64,
    pub to_device_id: u64,
    pub from_interface_id: u64,
    pub to_interface_id: u64,
}

/// Group nested inside a group template, relative to its top-left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedGroup {
    pub name: String,
    #[serde(rename = "type", default)]
    pub group_type: GroupType,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamTemplate {
    pub from_id: u64,
    pub to_id: u64,
    #[serde(default)]
    pub label: String,
}

/// A copied rack or site, ready to be pasted elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupTemplate {
    pub name: String,
    #[serde(rename = "type", default)]
    pub group_type: GroupType,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub devices: Vec<DeviceTemplate>,
    #[serde(default)]
    pub links: Vec<LinkTemplate>,
    #[serde(default)]
    pub groups: Vec<NestedGroup>,
    #[serde(default)]
    pub streams: Vec<StreamTemplate>,
}

/// Anything a palette can hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "template", rename_all = "snake_case")]
pub enum Template {
    Device(DeviceTemplate),
    Group(GroupTemplate),
    Process(ProcessTemplate),
}

impl Template {
    pub fn name(&self) -> &str {
        match self {
            Self::Device(d) => &d.name,
            Self::Group(g) => &g.name,
            Self::Process(p) => &p.name,
        }
    }
}

// ── Toolbox ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
pub enum ToolboxKind {
    Site,
    Rack,
    Inventory,
    App,
}

impl ToolboxKind {
    /// Name used on the wire in `ToolboxItem.toolbox_name`.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Site => "Sites",
            Self::Rack => "Racks",
            Self::Inventory => "Inventory",
            Self::App => "Process",
        }
    }

    pub fn from_wire_name(name: &str) -> Option<Self> {
        match name {
            "Sites" | "Site" => Some(Self::Site),
            "Racks" | "Rack" => Some(Self::Rack),
            "Inventory" => Some(Self::Inventory),
            "Process" | "App" => Some(Self::App),
            _ => None,
        }
    }
}

/// Left margin below the button bar where palettes start.
pub const TOOLBOX_TOP_MARGIN: f64 = 110.0;
/// Height of the palette title band.
pub const TOOLBOX_TITLE_HEIGHT: f64 = 40.0;

/// A scrollable palette of templates, drawn in screen space.
#[derive(Debug, Clone, PartialEq)]
pub struct Toolbox {
    pub kind: ToolboxKind,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub items: Vec<Template>,
    /// Vertical distance between item slots.
    pub spacing: f64,
    pub scroll_offset: f64,
    pub enabled: bool,
    pub selected_item: Option<usize>,
    /// Remove an item from the palette once it has been placed.
    pub remove_on_drop: bool,
}

impl Toolbox {
    pub fn new(kind: ToolboxKind, graph_height: f64) -> Self {
        Self {
            kind,
            x: 0.0,
            y: TOOLBOX_TOP_MARGIN,
            width: 200.0,
            height: (graph_height - TOOLBOX_TOP_MARGIN - 20.0).max(0.0),
            items: Vec::new(),
            spacing: if kind == ToolboxKind::Inventory { 150.0 } else { 200.0 },
            scroll_offset: 0.0,
            enabled: false,
            selected_item: None,
            remove_on_drop: kind == ToolboxKind::Inventory,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.wire_name()
    }

    /// Screen-space containment.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x > self.x && x < self.x + self.width && y > self.y && y < self.y + self.height
    }

    /// Slot under screen `y`, if it holds an item.
    pub fn item_index_at(&self, y: f64) -> Option<usize> {
        let slot = ((y - self.y - TOOLBOX_TITLE_HEIGHT - self.scroll_offset) / self.spacing).floor();
        if slot < 0.0 {
            return None;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let index = slot as usize;
        (index < self.items.len()).then_some(index)
    }

    /// Scroll by `delta`, keeping the offset in `[-(items * spacing), 0]`.
    pub fn scroll(&mut self, delta: f64) {
        #[allow(clippy::cast_precision_loss)]
        let floor = -(self.items.len() as f64) * self.spacing;
        self.scroll_offset = (self.scroll_offset + delta).clamp(floor.min(0.0), 0.0);
    }

    pub fn selected(&self) -> Option<&Template> {
        self.selected_item.and_then(|i| self.items.get(i))
    }

    pub fn take_selected(&mut self) -> Option<Template> {
        let i = self.selected_item.take()?;
        (i < self.items.len()).then(|| self.items.remove(i))
    }

    pub fn remove_named(&mut self, name: &str) {
        self.items.retain(|t| t.name() != name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inventory(n: usize) -> Toolbox {
        let mut tb = Toolbox::new(ToolboxKind::Inventory, 800.0);
        for i in 0..n {
            tb.items
                .push(Template::Device(DeviceTemplate::new(format!("host{i}"), DeviceType::Host)));
        }
        tb
    }

    #[test]
    fn item_pick_accounts_for_title_and_scroll() {
        let mut tb = inventory(3);
        let top = tb.y + TOOLBOX_TITLE_HEIGHT;
        assert_eq!(tb.item_index_at(top + 10.0), Some(0));
        assert_eq!(tb.item_index_at(top + 160.0), Some(1));
        assert_eq!(tb.item_index_at(top - 5.0), None);
        assert_eq!(tb.item_index_at(top + 460.0), None);
        tb.scroll(-150.0);
        assert_eq!(tb.item_index_at(top + 10.0), Some(1));
    }

    #[test]
    fn scroll_is_clamped() {
        let mut tb = inventory(2);
        tb.scroll(50.0);
        assert!(tb.scroll_offset.abs() < f64::EPSILON);
        tb.scroll(-10_000.0);
        assert!((tb.scroll_offset + 300.0).abs() < f64::EPSILON);
    }

    #[test]
    fn wire_names_round_trip() {
        for kind in [ToolboxKind::Site, ToolboxKind::Rack, ToolboxKind::Inventory, ToolboxKind::App] {
            assert_eq!(ToolboxKind::from_wire_name(kind.wire_name()), Some(kind));
        }
    }
}
