// ── Links and traffic streams ──

use crate::geometry::{Point, arc_control_point};

/// Physical connection between two interfaces.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub id: u64,
    pub name: String,
    pub from_device_id: u64,
    pub to_device_id: u64,
    pub from_interface_id: u64,
    pub to_interface_id: u64,
    pub selected: bool,
    pub remote_selected: bool,
}

impl Link {
    pub fn touches(&self, device_id: u64) -> bool {
        self.from_device_id == device_id || self.to_device_id == device_id
    }

    /// The device on the other end, if `device_id` is one of the ends.
    pub fn peer_of(&self, device_id: u64) -> Option<u64> {
        if self.from_device_id == device_id {
            Some(self.to_device_id)
        } else if self.to_device_id == device_id {
            Some(self.from_device_id)
        } else {
            None
        }
    }
}

/// Spacing between parallel stream arcs.
pub const STREAM_ARC_SPACING: f64 = 30.0;

/// A logical traffic flow drawn over the physical topology.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    pub id: u64,
    pub from_id: u64,
    pub to_id: u64,
    pub label: String,
    /// Index among streams sharing the same ordered endpoint pair.
    pub offset: u32,
}

impl Stream {
    /// Control point for the stream's arc, fanned out by its offset.
    pub fn arc_control(&self, from: Point, to: Point) -> Point {
        arc_control_point(from, to, f64::from(self.offset + 1) * STREAM_ARC_SPACING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link() -> Link {
        Link {
            id: 1,
            name: String::new(),
            from_device_id: 1,
            to_device_id: 2,
            from_interface_id: 1,
            to_interface_id: 1,
            selected: false,
            remote_selected: false,
        }
    }

    #[test]
    fn peer_lookup() {
        let l = link();
        assert_eq!(l.peer_of(1), Some(2));
        assert_eq!(l.peer_of(2), Some(1));
        assert_eq!(l.peer_of(3), None);
        assert!(l.touches(2));
    }

    #[test]
    fn parallel_streams_fan_out() {
        let mut s = Stream {
            id: 1,
            from_id: 1,
            to_id: 2,
            label: String::new(),
            offset: 0,
        };
        let a = s.arc_control(Point::new(0.0, 0.0), Point::new(100.0, 0.0));
        s.offset = 1;
        let b = s.arc_control(Point::new(0.0, 0.0), Point::new(100.0, 0.0));
        assert!(b.y < a.y);
    }
}
