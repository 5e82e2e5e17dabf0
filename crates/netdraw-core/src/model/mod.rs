// ── Domain model ──
//
// Canonical topology types. Relationships are ids into the `Document`
// arena, never object references.

pub mod device;
pub mod document;
pub mod group;
pub mod link;
pub mod snapshot;
pub mod toolbox;

pub use device::{DEVICE_SIZE, Device, DeviceType, Interface, Process, Shape};
pub use document::{Document, IdSeqs, MOVING_RADIUS};
pub use group::{Corner, Group, GroupType};
pub use link::{Link, Stream};
pub use snapshot::{
    DeviceRecord, GroupRecord, InterfaceRecord, LinkRecord, ProcessRecord, Snapshot, StreamRecord,
};
pub use toolbox::{
    DeviceTemplate, GroupTemplate, LinkTemplate, NestedGroup, ProcessTemplate, StreamTemplate,
    Template, Toolbox, ToolboxKind,
};
