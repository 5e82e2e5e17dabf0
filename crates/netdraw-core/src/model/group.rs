// ── Groups: racks, sites and free-form boxes ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::geometry::{Point, Rect};

/// Distance from an edge or corner that still counts as a hit.
pub const BORDER_TOLERANCE: f64 = 10.0;

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
#[strum(serialize_all = "lowercase")]
pub enum GroupType {
    #[default]
    Group,
    Rack,
    Site,
}

impl GroupType {
    pub fn title(self) -> &'static str {
        match self {
            Self::Group => "Group",
            Self::Rack => "Rack",
            Self::Site => "Site",
        }
    }
}

/// One of the four rectangle corners, for resizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// A rectangular container whose members are derived from geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub id: u64,
    pub name: String,
    pub group_type: GroupType,
    pub rect: Rect,
    pub selected: bool,
    pub remote_selected: bool,
    /// Device ids strictly inside `rect`, in id order.
    pub devices: Vec<u64>,
    /// Nested groups fully inside `rect`.
    pub groups: Vec<u64>,
    /// Corner picked for resizing, if any.
    pub corner: Option<Corner>,
}

impl Group {
    pub fn new(id: u64, name: impl Into<String>, group_type: GroupType, rect: Rect) -> Self {
        Self {
            id,
            name: name.into(),
            group_type,
            rect,
            selected: false,
            remote_selected: false,
            devices: Vec::new(),
            groups: Vec::new(),
            corner: None,
        }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.rect.contains_strict(x, y)
    }

    /// True when `other` lies entirely inside this group.
    pub fn encloses(&self, other: &Rect) -> bool {
        self.rect.contains_strict(other.left(), other.top())
            && self.rect.contains_strict(other.right(), other.bottom())
    }

    pub fn is_border_hit(&self, x: f64, y: f64) -> bool {
        self.rect.on_border(x, y, BORDER_TOLERANCE)
    }

    /// The corner within tolerance of `(x, y)`, if any.
    pub fn corner_at(&self, x: f64, y: f64) -> Option<Corner> {
        let p = Point::new(x, y);
        let r = self.rect.normalized();
        [
            (Corner::TopLeft, Point::new(r.x1, r.y1)),
            (Corner::TopRight, Point::new(r.x2, r.y1)),
            (Corner::BottomLeft, Point::new(r.x1, r.y2)),
            (Corner::BottomRight, Point::new(r.x2, r.y2)),
        ]
        .into_iter()
        .find(|(_, c)| c.distance(p) < BORDER_TOLERANCE)
        .map(|(corner, _)| corner)
    }

    /// Move `corner` by `(dx, dy)`. The rectangle is re-normalized first so
    /// corners keep their meaning after a flip.
    pub fn drag_corner(&mut self, corner: Corner, dx: f64, dy: f64) {
        let mut r = self.rect.normalized();
        match corner {
            Corner::TopLeft => {
                r.x1 += dx;
                r.y1 += dy;
            }
            Corner::TopRight => {
                r.x2 += dx;
                r.y1 += dy;
            }
            Corner::BottomLeft => {
                r.x1 += dx;
                r.y2 += dy;
            }
            Corner::BottomRight => {
                r.x2 += dx;
                r.y2 += dy;
            }
        }
        self.rect = r;
    }
}
