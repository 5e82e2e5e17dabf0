// ── Devices, their interfaces and processes ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::geometry::{Point, circle_exit};

/// Radius of the hit circle around a device center, in canvas units.
pub const DEVICE_SIZE: f64 = 50.0;

/// Hit radius for an interface dot.
pub const INTERFACE_HIT_RADIUS: f64 = 10.0;

/// Kind of network element a device represents.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DeviceType {
    Router,
    Switch,
    #[default]
    Host,
    Device,
}

impl DeviceType {
    pub fn shape(self) -> Shape {
        match self {
            Self::Router => Shape::Circle,
            Self::Switch => Shape::Square,
            Self::Host => Shape::Rectangle,
            Self::Device => Shape::RoundedRectangle,
        }
    }

    /// Prefix used when naming freshly created devices (`Router3`).
    pub fn title(self) -> &'static str {
        match self {
            Self::Router => "Router",
            Self::Switch => "Switch",
            Self::Host => "Host",
            Self::Device => "Device",
        }
    }
}

/// Outline the renderer draws for a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    Circle,
    Square,
    Rectangle,
    RoundedRectangle,
}

/// A port on a device. At most one link attaches to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Interface {
    pub id: u64,
    pub name: String,
    pub device_id: u64,
    /// Owning link, if connected. The link holds the relationship.
    pub link: Option<u64>,
    /// Contact point on the device outline, derived from geometry.
    pub dot: Point,
}

impl Interface {
    pub fn new(device_id: u64, id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            device_id,
            link: None,
            dot: Point::default(),
        }
    }
}

/// An application process placed on a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Process {
    pub id: u64,
    pub name: String,
    #[serde(rename = "type")]
    pub process_type: String,
    pub device_id: u64,
}

/// A node of the topology.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub id: u64,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub device_type: DeviceType,
    pub host_id: Option<u64>,
    pub selected: bool,
    pub remote_selected: bool,
    /// Near a device being dragged; renderers may simplify it.
    pub moving: bool,
    pub in_group: bool,
    pub interfaces: Vec<Interface>,
    pub processes: Vec<Process>,
    /// Highest interface id handed out on this device.
    pub interface_seq: u64,
    pub process_seq: u64,
}

impl Device {
    pub fn new(id: u64, name: impl Into<String>, x: f64, y: f64, device_type: DeviceType) -> Self {
        Self {
            id,
            name: name.into(),
            x,
            y,
            device_type,
            host_id: None,
            selected: false,
            remote_selected: false,
            moving: false,
            in_group: false,
            interfaces: Vec::new(),
            processes: Vec::new(),
            interface_seq: 0,
            process_seq: 0,
        }
    }

    pub fn center(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn shape(&self) -> Shape {
        self.device_type.shape()
    }

    pub fn is_hit(&self, x: f64, y: f64) -> bool {
        self.center().distance(Point::new(x, y)) < DEVICE_SIZE
    }

    pub fn interface(&self, id: u64) -> Option<&Interface> {
        self.interfaces.iter().find(|i| i.id == id)
    }

    pub fn interface_mut(&mut self, id: u64) -> Option<&mut Interface> {
        self.interfaces.iter_mut().find(|i| i.id == id)
    }

    /// Add an interface unless one with the same id exists.
    pub fn add_interface(&mut self, id: u64, name: impl Into<String>) -> bool {
        if self.interface(id).is_some() {
            return false;
        }
        self.interfaces.push(Interface::new(self.id, id, name));
        self.interface_seq = self.interface_seq.max(id);
        true
    }

    pub fn next_interface_id(&mut self) -> u64 {
        self.interface_seq += 1;
        self.interface_seq
    }

    pub fn next_process_id(&mut self) -> u64 {
        self.process_seq += 1;
        self.process_seq
    }

    /// Place an interface dot on the outline, facing `peer`.
    pub fn place_dot(&mut self, interface_id: u64, peer: Option<Point>) {
        let center = self.center();
        if let Some(intf) = self.interface_mut(interface_id) {
            intf.dot = peer.map_or(center, |p| circle_exit(center, DEVICE_SIZE, p));
        }
    }
}
