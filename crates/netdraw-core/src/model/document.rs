// ── The shared document ──
//
// An arena of devices, links, groups and streams addressed by id. Every
// controller mutates the topology through this type, both for local
// edits and when applying remote or undone messages. Derived geometry
// (interface dots, stream offsets) is refreshed inside the mutator that
// moved something; group membership is refreshed by `apply` and, on
// the local path, by the caller so it can broadcast the diff.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::debug;

use super::device::{Device, INTERFACE_HIT_RADIUS, Process};
use super::group::{Corner, Group, GroupType};
use super::link::{Link, Stream};
use super::snapshot::{
    DeviceRecord, GroupRecord, InterfaceRecord, LinkRecord, ProcessRecord, Snapshot, StreamRecord,
};
use super::toolbox::{
    DeviceTemplate, GroupTemplate, LinkTemplate, NestedGroup, ProcessTemplate, StreamTemplate,
};
use crate::geometry::{Point, Rect, point_segment_distance};
use crate::message::{
    DeviceCreate, DeviceDestroy, GroupCreate, GroupDestroy, GroupMembership, InterfaceRef, LinkRef,
    Message, ProcessRef, StreamRef,
};

/// Distance from a link's center line that still selects it.
pub const LINK_HIT_DISTANCE: f64 = 10.0;

const COORD_EPSILON: f64 = 1e-6;

// ── Id sequences ─────────────────────────────────────────────────────

/// Highest id handed out per entity kind. Never moves backwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdSeqs {
    pub device: u64,
    pub link: u64,
    pub group: u64,
    pub stream: u64,
}

impl IdSeqs {
    pub fn next_device(&mut self) -> u64 {
        self.device += 1;
        self.device
    }

    pub fn next_link(&mut self) -> u64 {
        self.link += 1;
        self.link
    }

    pub fn next_group(&mut self) -> u64 {
        self.group += 1;
        self.group
    }

    pub fn next_stream(&mut self) -> u64 {
        self.stream += 1;
        self.stream
    }

    /// Raise every sequence to at least the values in `other`.
    pub fn bump_to(&mut self, other: IdSeqs) {
        self.device = self.device.max(other.device);
        self.link = self.link.max(other.link);
        self.group = self.group.max(other.group);
        self.stream = self.stream.max(other.stream);
    }
}

// ── Document ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Document {
    devices: BTreeMap<u64, Device>,
    links: BTreeMap<u64, Link>,
    groups: BTreeMap<u64, Group>,
    streams: BTreeMap<u64, Stream>,
    pub topology_id: Option<u64>,
    pub seqs: IdSeqs,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn devices(&self) -> impl DoubleEndedIterator<Item = &Device> {
        self.devices.values()
    }

    pub fn devices_mut(&mut self) -> impl Iterator<Item = &mut Device> {
        self.devices.values_mut()
    }

    pub fn device(&self, id: u64) -> Option<&Device> {
        self.devices.get(&id)
    }

    pub fn device_mut(&mut self, id: u64) -> Option<&mut Device> {
        self.devices.get_mut(&id)
    }

    pub fn links(&self) -> impl DoubleEndedIterator<Item = &Link> {
        self.links.values()
    }

    pub fn links_mut(&mut self) -> impl Iterator<Item = &mut Link> {
        self.links.values_mut()
    }

    pub fn link(&self, id: u64) -> Option<&Link> {
        self.links.get(&id)
    }

    pub fn link_mut(&mut self, id: u64) -> Option<&mut Link> {
        self.links.get_mut(&id)
    }

    pub fn groups(&self) -> impl DoubleEndedIterator<Item = &Group> {
        self.groups.values()
    }

    pub fn groups_mut(&mut self) -> impl Iterator<Item = &mut Group> {
        self.groups.values_mut()
    }

    pub fn group(&self, id: u64) -> Option<&Group> {
        self.groups.get(&id)
    }

    pub fn group_mut(&mut self, id: u64) -> Option<&mut Group> {
        self.groups.get_mut(&id)
    }

    pub fn streams(&self) -> impl DoubleEndedIterator<Item = &Stream> {
        self.streams.values()
    }

    pub fn stream(&self, id: u64) -> Option<&Stream> {
        self.streams.get(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty() && self.groups.is_empty()
    }

    pub fn clear(&mut self) {
        self.devices.clear();
        self.links.clear();
        self.groups.clear();
        self.streams.clear();
    }

    // ── Devices ──────────────────────────────────────────────────────

    /// Returns `false` when a device with that id already exists.
    pub fn create_device(&mut self, m: &DeviceCreate) -> bool {
        if self.devices.contains_key(&m.id) {
            return false;
        }
        let mut device = Device::new(m.id, m.name.clone(), m.x, m.y, m.device_type);
        device.host_id = m.host_id;
        self.devices.insert(m.id, device);
        self.seqs.device = self.seqs.device.max(m.id);
        true
    }

    /// Remove a device and every link attached to it.
    pub fn destroy_device(&mut self, id: u64) -> Option<Device> {
        let incident: Vec<u64> = self.incident_links(id).map(|l| l.id).collect();
        for link_id in incident {
            self.destroy_link(link_id);
        }
        let removed = self.devices.remove(&id);
        if removed.is_some() {
            self.streams.retain(|_, s| s.from_id != id && s.to_id != id);
            self.refresh_stream_offsets();
        }
        removed
    }

    pub fn move_device(&mut self, id: u64, x: f64, y: f64) -> bool {
        let Some(device) = self.devices.get_mut(&id) else {
            return false;
        };
        device.x = x;
        device.y = y;
        self.refresh_dots(id);
        true
    }

    pub fn rename_device(&mut self, id: u64, name: &str) -> bool {
        self.devices
            .get_mut(&id)
            .map(|d| d.name = name.to_owned())
            .is_some()
    }

    pub fn incident_links(&self, device_id: u64) -> impl Iterator<Item = &Link> {
        self.links.values().filter(move |l| l.touches(device_id))
    }

    /// The destroy message for a device, capturing everything needed to
    /// recreate it.
    pub fn device_destroy(&self, id: u64) -> Option<DeviceDestroy> {
        let d = self.devices.get(&id)?;
        Some(DeviceDestroy {
            id,
            previous_x: d.x,
            previous_y: d.y,
            previous_name: d.name.clone(),
            previous_type: d.device_type,
            previous_host_id: d.host_id,
            previous_interfaces: d
                .interfaces
                .iter()
                .map(|i| InterfaceRecord {
                    id: i.id,
                    name: i.name.clone(),
                })
                .collect(),
            previous_processes: d
                .processes
                .iter()
                .map(|p| ProcessRecord {
                    id: p.id,
                    name: p.name.clone(),
                    process_type: p.process_type.clone(),
                })
                .collect(),
        })
    }

    // ── Interfaces and processes ─────────────────────────────────────

    pub fn create_interface(&mut self, m: &InterfaceRef) -> bool {
        let created = self
            .devices
            .get_mut(&m.device_id)
            .is_some_and(|d| d.add_interface(m.id, m.name.clone()));
        if created {
            self.refresh_dots(m.device_id);
        }
        created
    }

    pub fn destroy_interface(&mut self, device_id: u64, id: u64) -> bool {
        let link = self
            .devices
            .get(&device_id)
            .and_then(|d| d.interface(id))
            .and_then(|i| i.link);
        if let Some(link_id) = link {
            self.destroy_link(link_id);
        }
        let Some(device) = self.devices.get_mut(&device_id) else {
            return false;
        };
        let before = device.interfaces.len();
        device.interfaces.retain(|i| i.id != id);
        before != device.interfaces.len()
    }

    pub fn rename_interface(&mut self, device_id: u64, id: u64, name: &str) -> bool {
        self.devices
            .get_mut(&device_id)
            .and_then(|d| d.interface_mut(id))
            .map(|i| i.name = name.to_owned())
            .is_some()
    }

    pub fn create_process(&mut self, m: &ProcessRef) -> bool {
        let Some(device) = self.devices.get_mut(&m.device_id) else {
            return false;
        };
        if device.processes.iter().any(|p| p.id == m.id) {
            return false;
        }
        device.processes.push(Process {
            id: m.id,
            name: m.name.clone(),
            process_type: m.process_type.clone(),
            device_id: m.device_id,
        });
        device.process_seq = device.process_seq.max(m.id);
        true
    }

    pub fn destroy_process(&mut self, device_id: u64, id: u64) -> bool {
        let Some(device) = self.devices.get_mut(&device_id) else {
            return false;
        };
        let before = device.processes.len();
        device.processes.retain(|p| p.id != id);
        before != device.processes.len()
    }

    // ── Links ────────────────────────────────────────────────────────

    /// Connect two existing interfaces. Missing endpoints are a no-op.
    pub fn create_link(&mut self, m: &LinkRef) -> bool {
        if self.links.contains_key(&m.id) {
            return false;
        }
        let endpoints_exist = self
            .devices
            .get(&m.from_device_id)
            .and_then(|d| d.interface(m.from_interface_id))
            .is_some()
            && self
                .devices
                .get(&m.to_device_id)
                .and_then(|d| d.interface(m.to_interface_id))
                .is_some();
        if !endpoints_exist {
            debug!(link = m.id, "link endpoints not found, ignoring");
            return false;
        }

        let link = Link {
            id: m.id,
            name: m.name.clone(),
            from_device_id: m.from_device_id,
            to_device_id: m.to_device_id,
            from_interface_id: m.from_interface_id,
            to_interface_id: m.to_interface_id,
            selected: false,
            remote_selected: false,
        };
        self.set_interface_link(m.from_device_id, m.from_interface_id, Some(m.id));
        self.set_interface_link(m.to_device_id, m.to_interface_id, Some(m.id));
        self.place_link_dots(&link);
        self.links.insert(m.id, link);
        self.seqs.link = self.seqs.link.max(m.id);
        true
    }

    /// Remove a link and clear both interfaces' back-references.
    pub fn destroy_link(&mut self, id: u64) -> Option<Link> {
        let link = self.links.remove(&id)?;
        self.set_interface_link(link.from_device_id, link.from_interface_id, None);
        self.set_interface_link(link.to_device_id, link.to_interface_id, None);
        Some(link)
    }

    pub fn rename_link(&mut self, id: u64, name: &str) -> bool {
        self.links
            .get_mut(&id)
            .map(|l| l.name = name.to_owned())
            .is_some()
    }

    pub fn link_ref(&self, id: u64) -> Option<LinkRef> {
        self.links.get(&id).map(|l| LinkRef {
            id: l.id,
            name: l.name.clone(),
            from_device_id: l.from_device_id,
            to_device_id: l.to_device_id,
            from_interface_id: l.from_interface_id,
            to_interface_id: l.to_interface_id,
        })
    }

    fn set_interface_link(&mut self, device_id: u64, interface_id: u64, link: Option<u64>) {
        if let Some(intf) = self
            .devices
            .get_mut(&device_id)
            .and_then(|d| d.interface_mut(interface_id))
        {
            intf.link = link;
        }
    }

    // ── Groups ───────────────────────────────────────────────────────

    pub fn create_group(&mut self, m: &GroupCreate) -> bool {
        if self.groups.contains_key(&m.id) {
            return false;
        }
        self.groups.insert(
            m.id,
            Group::new(
                m.id,
                m.name.clone(),
                m.group_type,
                Rect::new(m.x1, m.y1, m.x2, m.y2),
            ),
        );
        self.seqs.group = self.seqs.group.max(m.id);
        true
    }

    pub fn destroy_group(&mut self, id: u64) -> Option<Group> {
        let removed = self.groups.remove(&id);
        for g in self.groups.values_mut() {
            g.groups.retain(|&n| n != id);
        }
        removed
    }

    pub fn move_group(&mut self, id: u64, rect: Rect) -> bool {
        self.groups.get_mut(&id).map(|g| g.rect = rect).is_some()
    }

    pub fn rename_group(&mut self, id: u64, name: &str) -> bool {
        self.groups
            .get_mut(&id)
            .map(|g| g.name = name.to_owned())
            .is_some()
    }

    /// Adopt a member list announced by another client.
    pub fn set_group_members(&mut self, id: u64, members: &[u64]) -> bool {
        let Some(group) = self.groups.get_mut(&id) else {
            return false;
        };
        group.devices = members.to_vec();
        let grouped: BTreeSet<u64> = self
            .groups
            .values()
            .flat_map(|g| g.devices.iter().copied())
            .collect();
        for d in self.devices.values_mut() {
            d.in_group = grouped.contains(&d.id);
        }
        true
    }

    pub fn group_destroy(&self, id: u64) -> Option<GroupDestroy> {
        let g = self.groups.get(&id)?;
        Some(GroupDestroy {
            id,
            previous_name: g.name.clone(),
            previous_type: g.group_type,
            previous_x1: g.rect.x1,
            previous_y1: g.rect.y1,
            previous_x2: g.rect.x2,
            previous_y2: g.rect.y2,
        })
    }

    /// Recompute every group's members from geometry.
    ///
    /// Returns one entry per group whose device list changed, carrying
    /// the complete new list. `in_group` flags are refreshed too.
    pub fn update_membership(&mut self) -> Vec<GroupMembership> {
        let centers: Vec<(u64, f64, f64)> =
            self.devices.values().map(|d| (d.id, d.x, d.y)).collect();
        let rects: Vec<(u64, Rect)> = self.groups.values().map(|g| (g.id, g.rect)).collect();

        let mut changed = Vec::new();
        let mut grouped = BTreeSet::new();
        for group in self.groups.values_mut() {
            let devices: Vec<u64> = centers
                .iter()
                .filter(|(_, x, y)| group.contains(*x, *y))
                .map(|(id, _, _)| *id)
                .collect();
            group.groups = rects
                .iter()
                .filter(|(id, r)| *id != group.id && group.encloses(r))
                .map(|(id, _)| *id)
                .collect();
            grouped.extend(devices.iter().copied());
            if group.devices != devices {
                group.devices.clone_from(&devices);
                changed.push(GroupMembership {
                    id: group.id,
                    members: devices,
                });
            }
        }
        for d in self.devices.values_mut() {
            d.in_group = grouped.contains(&d.id);
        }
        changed
    }

    // ── Streams ──────────────────────────────────────────────────────

    pub fn create_stream(&mut self, m: &StreamRef) -> bool {
        if self.streams.contains_key(&m.id)
            || !self.devices.contains_key(&m.from_id)
            || !self.devices.contains_key(&m.to_id)
        {
            return false;
        }
        self.streams.insert(
            m.id,
            Stream {
                id: m.id,
                from_id: m.from_id,
                to_id: m.to_id,
                label: m.label.clone(),
                offset: 0,
            },
        );
        self.seqs.stream = self.seqs.stream.max(m.id);
        self.refresh_stream_offsets();
        true
    }

    pub fn destroy_stream(&mut self, id: u64) -> Option<Stream> {
        let removed = self.streams.remove(&id);
        if removed.is_some() {
            self.refresh_stream_offsets();
        }
        removed
    }

    pub fn relabel_stream(&mut self, id: u64, label: &str) -> bool {
        self.streams
            .get_mut(&id)
            .map(|s| s.label = label.to_owned())
            .is_some()
    }

    /// Number parallel streams per ordered endpoint pair, in id order.
    fn refresh_stream_offsets(&mut self) {
        let mut counts: HashMap<(u64, u64), u32> = HashMap::new();
        for s in self.streams.values_mut() {
            let n = counts.entry((s.from_id, s.to_id)).or_insert(0);
            s.offset = *n;
            *n += 1;
        }
    }

    // ── Derived geometry ─────────────────────────────────────────────

    /// Re-place the dots of `device_id` and of its link peers.
    pub fn refresh_dots(&mut self, device_id: u64) {
        let links: Vec<Link> = self.incident_links(device_id).cloned().collect();
        if let Some(device) = self.devices.get_mut(&device_id) {
            let loose: Vec<u64> = device
                .interfaces
                .iter()
                .filter(|i| i.link.is_none())
                .map(|i| i.id)
                .collect();
            for id in loose {
                device.place_dot(id, None);
            }
        }
        for link in &links {
            self.place_link_dots(link);
        }
    }

    pub fn refresh_all_dots(&mut self) {
        let ids: Vec<u64> = self.devices.keys().copied().collect();
        for id in ids {
            self.refresh_dots(id);
        }
    }

    fn place_link_dots(&mut self, link: &Link) {
        let from = self.devices.get(&link.from_device_id).map(Device::center);
        let to = self.devices.get(&link.to_device_id).map(Device::center);
        let (Some(from), Some(to)) = (from, to) else {
            return;
        };
        if let Some(d) = self.devices.get_mut(&link.from_device_id) {
            d.place_dot(link.from_interface_id, Some(to));
        }
        if let Some(d) = self.devices.get_mut(&link.to_device_id) {
            d.place_dot(link.to_interface_id, Some(from));
        }
    }

    // ── Hit testing ──────────────────────────────────────────────────

    /// Topmost device under `(x, y)`. Later ids draw on top.
    pub fn device_at(&self, x: f64, y: f64) -> Option<u64> {
        self.devices.values().rev().find(|d| d.is_hit(x, y)).map(|d| d.id)
    }

    /// `(device_id, interface_id)` of the dot under `(x, y)`.
    pub fn interface_at(&self, x: f64, y: f64) -> Option<(u64, u64)> {
        let p = Point::new(x, y);
        self.devices.values().rev().find_map(|d| {
            d.interfaces
                .iter()
                .find(|i| i.dot.distance(p) < INTERFACE_HIT_RADIUS)
                .map(|i| (d.id, i.id))
        })
    }

    pub fn link_at(&self, x: f64, y: f64) -> Option<u64> {
        let p = Point::new(x, y);
        self.links.values().rev().find_map(|l| {
            let a = self.devices.get(&l.from_device_id)?.center();
            let b = self.devices.get(&l.to_device_id)?.center();
            (point_segment_distance(p, a, b) < LINK_HIT_DISTANCE).then_some(l.id)
        })
    }

    pub fn group_border_at(&self, x: f64, y: f64, kind: GroupType) -> Option<u64> {
        self.groups
            .values()
            .rev()
            .find(|g| g.group_type == kind && g.is_border_hit(x, y))
            .map(|g| g.id)
    }

    pub fn group_corner_at(&self, x: f64, y: f64, kind: GroupType) -> Option<(u64, Corner)> {
        self.groups
            .values()
            .rev()
            .filter(|g| g.group_type == kind)
            .find_map(|g| g.corner_at(x, y).map(|c| (g.id, c)))
    }

    /// Innermost group of `kind` whose interior holds `(x, y)`.
    pub fn group_containing(&self, x: f64, y: f64, kind: GroupType) -> Option<u64> {
        self.groups
            .values()
            .filter(|g| g.group_type == kind && g.contains(x, y))
            .min_by(|a, b| {
                let area = |g: &Group| g.rect.width() * g.rect.height();
                area(a).total_cmp(&area(b))
            })
            .map(|g| g.id)
    }

    /// Selection flags, cleared. Returns the ids that were selected.
    pub fn clear_selection(&mut self) -> (Vec<u64>, Vec<u64>) {
        let mut devices = Vec::new();
        for d in self.devices.values_mut().filter(|d| d.selected) {
            d.selected = false;
            devices.push(d.id);
        }
        let mut links = Vec::new();
        for l in self.links.values_mut().filter(|l| l.selected) {
            l.selected = false;
            links.push(l.id);
        }
        for g in self.groups.values_mut() {
            g.selected = false;
            g.corner = None;
        }
        (devices, links)
    }

    // ── Applying messages ────────────────────────────────────────────

    /// Apply a document message and refresh membership if geometry
    /// changed. Returns whether anything was recognized and applied.
    pub fn apply(&mut self, message: &Message) -> bool {
        let applied = self.apply_quiet(message);
        if applied && Self::moves_geometry(message) {
            self.update_membership();
        }
        applied
    }

    /// Apply without recomputing membership.
    pub fn apply_quiet(&mut self, message: &Message) -> bool {
        match message {
            Message::DeviceCreate(m) => {
                let created = self.create_device(m);
                self.refresh_dots(m.id);
                created
            }
            Message::DeviceDestroy(m) => self.destroy_device(m.id).is_some(),
            Message::DeviceMove(m) => self.move_device(m.id, m.x, m.y),
            Message::DeviceLabelEdit(m) => self.rename_device(m.id, &m.name),
            Message::InterfaceCreate(m) => self.create_interface(m),
            Message::InterfaceDestroy(m) => self.destroy_interface(m.device_id, m.id),
            Message::InterfaceLabelEdit(m) => self.rename_interface(m.device_id, m.id, &m.name),
            Message::LinkCreate(m) => self.create_link(m),
            Message::LinkDestroy(m) => self.destroy_link(m.id).is_some(),
            Message::LinkLabelEdit(m) => self.rename_link(m.id, &m.name),
            Message::GroupCreate(m) => self.create_group(m),
            Message::GroupDestroy(m) => self.destroy_group(m.id).is_some(),
            Message::GroupMove(m) => self.move_group(m.id, Rect::new(m.x1, m.y1, m.x2, m.y2)),
            Message::GroupLabelEdit(m) => self.rename_group(m.id, &m.name),
            Message::GroupMembership(m) => self.set_group_members(m.id, &m.members),
            Message::ProcessCreate(m) => self.create_process(m),
            Message::ProcessDestroy(m) => self.destroy_process(m.device_id, m.id),
            Message::StreamCreate(m) => self.create_stream(m),
            Message::StreamDestroy(m) => self.destroy_stream(m.id).is_some(),
            Message::StreamLabelEdit(m) => self.relabel_stream(m.id, &m.label),
            Message::MultipleMessage(m) => m
                .messages
                .iter()
                .fold(false, |any, e| self.apply_quiet(&e.message) || any),
            _ => false,
        }
    }

    fn moves_geometry(message: &Message) -> bool {
        match message {
            Message::DeviceCreate(_)
            | Message::DeviceDestroy(_)
            | Message::DeviceMove(_)
            | Message::GroupCreate(_)
            | Message::GroupDestroy(_)
            | Message::GroupMove(_) => true,
            Message::MultipleMessage(m) => m.messages.iter().any(|e| Self::moves_geometry(&e.message)),
            _ => false,
        }
    }

    // ── Snapshots ────────────────────────────────────────────────────

    /// Rebuild the whole document from a snapshot.
    pub fn load_snapshot(&mut self, snapshot: &Snapshot) {
        self.clear();
        for d in &snapshot.devices {
            self.create_device(&DeviceCreate::from(d));
            if let Some(device) = self.devices.get_mut(&d.id) {
                for i in &d.interfaces {
                    device.add_interface(i.id, i.name.clone());
                }
            }
            for p in &d.processes {
                self.create_process(&ProcessRef {
                    id: p.id,
                    name: p.name.clone(),
                    process_type: p.process_type.clone(),
                    device_id: d.id,
                });
            }
        }
        for l in &snapshot.links {
            self.create_link(&LinkRef {
                id: l.id,
                name: l.name.clone(),
                from_device_id: l.from_device_id,
                to_device_id: l.to_device_id,
                from_interface_id: l.from_interface_id,
                to_interface_id: l.to_interface_id,
            });
        }
        for g in &snapshot.groups {
            self.create_group(&GroupCreate {
                id: g.id,
                name: g.name.clone(),
                group_type: g.group_type,
                x1: g.x1,
                y1: g.y1,
                x2: g.x2,
                y2: g.y2,
            });
        }
        for s in &snapshot.streams {
            self.create_stream(&StreamRef {
                id: s.id,
                from_id: s.from_id,
                to_id: s.to_id,
                label: s.label.clone(),
            });
        }
        self.refresh_all_dots();
        self.update_membership();
    }

    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            devices: self
                .devices
                .values()
                .map(|d| DeviceRecord {
                    id: d.id,
                    name: d.name.clone(),
                    x: d.x,
                    y: d.y,
                    device_type: d.device_type,
                    host_id: d.host_id,
                    interfaces: d
                        .interfaces
                        .iter()
                        .map(|i| InterfaceRecord {
                            id: i.id,
                            name: i.name.clone(),
                        })
                        .collect(),
                    processes: d
                        .processes
                        .iter()
                        .map(|p| ProcessRecord {
                            id: p.id,
                            name: p.name.clone(),
                            process_type: p.process_type.clone(),
                        })
                        .collect(),
                })
                .collect(),
            links: self
                .links
                .values()
                .map(|l| LinkRecord {
                    id: l.id,
                    name: l.name.clone(),
                    from_device_id: l.from_device_id,
                    to_device_id: l.to_device_id,
                    from_interface_id: l.from_interface_id,
                    to_interface_id: l.to_interface_id,
                })
                .collect(),
            groups: self
                .groups
                .values()
                .map(|g| GroupRecord {
                    id: g.id,
                    name: g.name.clone(),
                    group_type: g.group_type,
                    x1: g.rect.x1,
                    y1: g.rect.y1,
                    x2: g.rect.x2,
                    y2: g.rect.y2,
                    members: g.devices.clone(),
                })
                .collect(),
            streams: self
                .streams
                .values()
                .map(|s| StreamRecord {
                    id: s.id,
                    from_id: s.from_id,
                    to_id: s.to_id,
                    label: s.label.clone(),
                })
                .collect(),
            inventory_toolbox: None,
            order: None,
            trace_id: None,
        }
    }

    /// Differences between this document and `expected`, ignoring array
    /// order. Empty when they describe the same topology.
    pub fn diff(&self, expected: &Snapshot) -> Vec<String> {
        let mut out = Vec::new();

        let want: BTreeMap<u64, &DeviceRecord> = expected.devices.iter().map(|d| (d.id, d)).collect();
        for (id, w) in &want {
            match self.devices.get(id) {
                None => out.push(format!("device {id} missing")),
                Some(d) => {
                    if d.name != w.name {
                        out.push(format!("device {id} name {:?} != {:?}", d.name, w.name));
                    }
                    if (d.x - w.x).abs() > COORD_EPSILON || (d.y - w.y).abs() > COORD_EPSILON {
                        out.push(format!(
                            "device {id} at ({}, {}) != ({}, {})",
                            d.x, d.y, w.x, w.y
                        ));
                    }
                    if d.device_type != w.device_type {
                        out.push(format!("device {id} type {} != {}", d.device_type, w.device_type));
                    }
                }
            }
        }
        for id in self.devices.keys().filter(|id| !want.contains_key(id)) {
            out.push(format!("unexpected device {id}"));
        }

        let links: BTreeMap<u64, &LinkRecord> = expected.links.iter().map(|l| (l.id, l)).collect();
        for (id, w) in &links {
            match self.links.get(id) {
                None => out.push(format!("link {id} missing")),
                Some(l) => {
                    let got = (l.from_device_id, l.to_device_id, l.from_interface_id, l.to_interface_id);
                    let exp = (w.from_device_id, w.to_device_id, w.from_interface_id, w.to_interface_id);
                    if got != exp {
                        out.push(format!("link {id} endpoints {got:?} != {exp:?}"));
                    }
                    if l.name != w.name {
                        out.push(format!("link {id} name {:?} != {:?}", l.name, w.name));
                    }
                }
            }
        }
        for id in self.links.keys().filter(|id| !links.contains_key(id)) {
            out.push(format!("unexpected link {id}"));
        }

        let groups: BTreeMap<u64, &GroupRecord> = expected.groups.iter().map(|g| (g.id, g)).collect();
        for (id, w) in &groups {
            match self.groups.get(id) {
                None => out.push(format!("group {id} missing")),
                Some(g) => {
                    if g.name != w.name {
                        out.push(format!("group {id} name {:?} != {:?}", g.name, w.name));
                    }
                    let r = g.rect.normalized();
                    let e = Rect::new(w.x1, w.y1, w.x2, w.y2).normalized();
                    let same_rect = [(r.x1, e.x1), (r.y1, e.y1), (r.x2, e.x2), (r.y2, e.y2)]
                        .iter()
                        .all(|(a, b)| (a - b).abs() <= COORD_EPSILON);
                    if !same_rect {
                        out.push(format!("group {id} rect {r:?} != {e:?}"));
                    }
                    let got: BTreeSet<u64> = g.devices.iter().copied().collect();
                    let exp: BTreeSet<u64> = w.members.iter().copied().collect();
                    if got != exp {
                        out.push(format!("group {id} members {got:?} != {exp:?}"));
                    }
                }
            }
        }
        for id in self.groups.keys().filter(|id| !groups.contains_key(id)) {
            out.push(format!("unexpected group {id}"));
        }

        let got: BTreeSet<(u64, u64, u64)> =
            self.streams.values().map(|s| (s.id, s.from_id, s.to_id)).collect();
        let exp: BTreeSet<(u64, u64, u64)> =
            expected.streams.iter().map(|s| (s.id, s.from_id, s.to_id)).collect();
        if got != exp {
            out.push(format!("streams {got:?} != {exp:?}"));
        }

        out
    }

    // ── Templates ────────────────────────────────────────────────────

    pub fn device_template(&self, id: u64) -> Option<DeviceTemplate> {
        let d = self.devices.get(&id)?;
        Some(DeviceTemplate {
            id: d.id,
            name: d.name.clone(),
            device_type: d.device_type,
            host_id: d.host_id,
            x: d.x,
            y: d.y,
            interfaces: d
                .interfaces
                .iter()
                .map(|i| InterfaceRecord {
                    id: i.id,
                    name: i.name.clone(),
                })
                .collect(),
            processes: d
                .processes
                .iter()
                .map(|p| ProcessTemplate {
                    name: p.name.clone(),
                    process_type: p.process_type.clone(),
                })
                .collect(),
        })
    }

    /// A group and its contents, relative to the group's top-left.
    /// Only links and streams with both ends inside are kept.
    pub fn group_template(&self, id: u64) -> Option<GroupTemplate> {
        let g = self.groups.get(&id)?;
        let r = g.rect.normalized();
        let members: BTreeSet<u64> = g.devices.iter().copied().collect();

        let devices = g
            .devices
            .iter()
            .filter_map(|&d| self.device_template(d))
            .map(|mut t| {
                t.x -= r.x1;
                t.y -= r.y1;
                t
            })
            .collect();
        let links = self
            .links
            .values()
            .filter(|l| members.contains(&l.from_device_id) && members.contains(&l.to_device_id))
            .map(|l| LinkTemplate {
                name: l.name.clone(),
                from_device_id: l.from_device_id,
                to_device_id: l.to_device_id,
                from_interface_id: l.from_interface_id,
                to_interface_id: l.to_interface_id,
            })
            .collect();
        let groups = g
            .groups
            .iter()
            .filter_map(|n| self.groups.get(n))
            .map(|n| {
                let nr = n.rect.normalized();
                NestedGroup {
                    name: n.name.clone(),
                    group_type: n.group_type,
                    x1: nr.x1 - r.x1,
                    y1: nr.y1 - r.y1,
                    x2: nr.x2 - r.x1,
                    y2: nr.y2 - r.y1,
                }
            })
            .collect();
        let streams = self
            .streams
            .values()
            .filter(|s| members.contains(&s.from_id) && members.contains(&s.to_id))
            .map(|s| StreamTemplate {
                from_id: s.from_id,
                to_id: s.to_id,
                label: s.label.clone(),
            })
            .collect();

        Some(GroupTemplate {
            name: g.name.clone(),
            group_type: g.group_type,
            width: r.width(),
            height: r.height(),
            devices,
            links,
            groups,
            streams,
        })
    }

    /// Instantiate a device template centered at `(x, y)`.
    ///
    /// Applies the creation and returns the messages describing it:
    /// the device, then its interfaces, then its processes.
    pub fn paste_device(&mut self, template: &DeviceTemplate, x: f64, y: f64) -> (u64, Vec<Message>) {
        let id = self.seqs.next_device();
        let mut out = vec![Message::DeviceCreate(DeviceCreate {
            id,
            name: template.name.clone(),
            x,
            y,
            device_type: template.device_type,
            host_id: template.host_id,
        })];
        out.extend(template.interfaces.iter().map(|i| {
            Message::InterfaceCreate(InterfaceRef {
                device_id: id,
                id: i.id,
                name: i.name.clone(),
            })
        }));
        out.extend(template.processes.iter().enumerate().map(|(n, p)| {
            Message::ProcessCreate(ProcessRef {
                id: n as u64 + 1,
                name: p.name.clone(),
                process_type: p.process_type.clone(),
                device_id: id,
            })
        }));
        for m in &out {
            self.apply_quiet(m);
        }
        (id, out)
    }

    /// Instantiate a group template centered at `center`.
    ///
    /// Messages come out in creation order: groups (outer first), devices,
    /// interfaces, processes, links, streams, then membership changes.
    pub fn paste_group(&mut self, template: &GroupTemplate, center: Point) -> (u64, Vec<Message>) {
        let x0 = center.x - template.width / 2.0;
        let y0 = center.y - template.height / 2.0;

        let mut groups = Vec::new();
        let gid = self.seqs.next_group();
        groups.push(Message::GroupCreate(GroupCreate {
            id: gid,
            name: template.name.clone(),
            group_type: template.group_type,
            x1: x0,
            y1: y0,
            x2: x0 + template.width,
            y2: y0 + template.height,
        }));
        for n in &template.groups {
            let id = self.seqs.next_group();
            groups.push(Message::GroupCreate(GroupCreate {
                id,
                name: n.name.clone(),
                group_type: n.group_type,
                x1: x0 + n.x1,
                y1: y0 + n.y1,
                x2: x0 + n.x2,
                y2: y0 + n.y2,
            }));
        }

        let mut ids = HashMap::new();
        let mut devices = Vec::new();
        let mut interfaces = Vec::new();
        let mut processes = Vec::new();
        for t in &template.devices {
            let (id, parts) = self.paste_device(t, x0 + t.x, y0 + t.y);
            ids.insert(t.id, id);
            for m in parts {
                match m {
                    Message::DeviceCreate(_) => devices.push(m),
                    Message::InterfaceCreate(_) => interfaces.push(m),
                    _ => processes.push(m),
                }
            }
        }

        let mut links = Vec::new();
        for l in &template.links {
            let (Some(&from), Some(&to)) = (ids.get(&l.from_device_id), ids.get(&l.to_device_id)) else {
                continue;
            };
            links.push(Message::LinkCreate(LinkRef {
                id: self.seqs.next_link(),
                name: l.name.clone(),
                from_device_id: from,
                to_device_id: to,
                from_interface_id: l.from_interface_id,
                to_interface_id: l.to_interface_id,
            }));
        }
        let mut streams = Vec::new();
        for s in &template.streams {
            let (Some(&from), Some(&to)) = (ids.get(&s.from_id), ids.get(&s.to_id)) else {
                continue;
            };
            streams.push(Message::StreamCreate(StreamRef {
                id: self.seqs.next_stream(),
                from_id: from,
                to_id: to,
                label: s.label.clone(),
            }));
        }

        for m in groups.iter().chain(&links).chain(&streams) {
            self.apply_quiet(m);
        }
        let membership = self
            .update_membership()
            .into_iter()
            .map(Message::GroupMembership);

        let mut out = groups;
        out.extend(devices);
        out.extend(interfaces);
        out.extend(processes);
        out.extend(links);
        out.extend(streams);
        out.extend(membership);
        (gid, out)
    }

    /// Center of all device positions, or the origin when empty.
    pub fn center(&self) -> Point {
        let snap_extent = self.devices.values().fold(None, |acc: Option<(f64, f64, f64, f64)>, d| {
            Some(acc.map_or((d.x, d.y, d.x, d.y), |(a, b, c, e)| {
                (a.min(d.x), b.min(d.y), c.max(d.x), e.max(d.y))
            }))
        });
        snap_extent.map_or(Point::default(), |(min_x, min_y, max_x, max_y)| {
            Point::new((min_x + max_x) / 2.0, (min_y + max_y) / 2.0)
        })
    }

    /// Devices whose center is within `radius` of `p`.
    pub fn devices_near(&self, p: Point, radius: f64) -> Vec<u64> {
        self.devices
            .values()
            .filter(|d| d.center().distance(p) < radius)
            .map(|d| d.id)
            .collect()
    }
}

/// Devices within this distance of a drag are flagged as moving.
pub const MOVING_RADIUS: f64 = 400.0;
