// ── Message catalog ──
//
// Every control, input, recording and test message exchanged with the
// server. On the wire a message is a `[type, object]` pair (see
// [`wire`]); the object repeats the type under `msg_type` and carries
// the sender's client id.

pub mod wire;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::model::{
    DeviceRecord, DeviceType, GroupTemplate, GroupType, InterfaceRecord, ProcessRecord, Snapshot,
    Template,
};

pub use wire::{Frame, Inbound};

// ── Envelope ─────────────────────────────────────────────────────────

/// A message plus its routing metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Client id of the originator; 0 before one is assigned.
    #[serde(default)]
    pub sender: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<u64>,
    #[serde(flatten)]
    pub message: Message,
}

impl Envelope {
    pub fn new(sender: u64, message: Message) -> Self {
        Self {
            sender,
            message_id: None,
            message,
        }
    }

    pub fn name(&self) -> &'static str {
        self.message.name()
    }

    /// Same sender and message id; unstamped messages compare by payload.
    pub fn same_origin(&self, other: &Envelope) -> bool {
        self.sender == other.sender
            && match (self.message_id, other.message_id) {
                (Some(a), Some(b)) => a == b,
                _ => self.message == other.message,
            }
    }
}

// ── Payloads ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceCreate {
    pub id: u64,
    pub name: String,
    pub x: f64,
    pub y: f64,
    #[serde(rename = "type", default)]
    pub device_type: DeviceType,
    #[serde(default)]
    pub host_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDestroy {
    pub id: u64,
    pub previous_x: f64,
    pub previous_y: f64,
    #[serde(default)]
    pub previous_name: String,
    #[serde(default)]
    pub previous_type: DeviceType,
    #[serde(default)]
    pub previous_host_id: Option<u64>,
    #[serde(default)]
    pub previous_interfaces: Vec<InterfaceRecord>,
    #[serde(default)]
    pub previous_processes: Vec<ProcessRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceMove {
    pub id: u64,
    pub x: f64,
    pub y: f64,
    pub previous_x: f64,
    pub previous_y: f64,
}

/// Rename of a device, link or group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEdit {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub previous_name: String,
}

/// Selection notice for a device or link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selected {
    pub id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceRef {
    pub device_id: u64,
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceLabelEdit {
    pub id: u64,
    pub device_id: u64,
    pub name: String,
    #[serde(default)]
    pub previous_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRef {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    pub from_device_id: u64,
    pub to_device_id: u64,
    pub from_interface_id: u64,
    pub to_interface_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupCreate {
    pub id: u64,
    pub name: String,
    #[serde(rename = "type", default)]
    pub group_type: GroupType,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDestroy {
    pub id: u64,
    #[serde(default)]
    pub previous_name: String,
    #[serde(default)]
    pub previous_type: GroupType,
    pub previous_x1: f64,
    pub previous_y1: f64,
    pub previous_x2: f64,
    pub previous_y2: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMove {
    pub id: u64,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub previous_x1: f64,
    pub previous_y1: f64,
    pub previous_x2: f64,
    pub previous_y2: f64,
}

/// The complete new member list of a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMembership {
    pub id: u64,
    pub members: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRef {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub process_type: String,
    pub device_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRef {
    pub id: u64,
    pub from_id: u64,
    pub to_id: u64,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamLabelEdit {
    pub id: u64,
    pub label: String,
    #[serde(default)]
    pub previous_label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultipleMessage {
    pub messages: Vec<Envelope>,
}

/// `Undo`/`Redo` payload: the history entry being travelled over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeTravel {
    pub original_message: Box<Frame>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    pub topology_id: u64,
    #[serde(rename = "panX", default)]
    pub pan_x: f64,
    #[serde(rename = "panY", default)]
    pub pan_y: f64,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub device_id_seq: u64,
    #[serde(default)]
    pub link_id_seq: u64,
    #[serde(default)]
    pub group_id_seq: u64,
    #[serde(default)]
    pub stream_id_seq: u64,
}

fn default_scale() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub history: Vec<Frame>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewPort {
    pub scale: f64,
    #[serde(rename = "panX")]
    pub pan_x: f64,
    #[serde(rename = "panY")]
    pub pan_y: f64,
    #[serde(default)]
    pub graph_width: f64,
    #[serde(default)]
    pub graph_height: f64,
    #[serde(default)]
    pub trace_id: u64,
}

/// Which pointer transition a `MouseEvent` records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MouseKind {
    MouseDown,
    MouseUp,
    MouseMove,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MouseEvent {
    pub x: f64,
    pub y: f64,
    #[serde(rename = "type")]
    pub kind: MouseKind,
    #[serde(default)]
    pub trace_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MouseWheelEvent {
    pub delta: f64,
    #[serde(rename = "deltaX", default)]
    pub delta_x: f64,
    #[serde(rename = "deltaY", default)]
    pub delta_y: f64,
    #[serde(rename = "type", default = "wheel_kind")]
    pub kind: String,
    #[serde(rename = "metaKey", default)]
    pub meta_key: bool,
    #[serde(default)]
    pub trace_id: u64,
}

fn wheel_kind() -> String {
    "mousewheel".into()
}

/// Modifier keys held during a key or wheel event.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Modifiers {
    #[serde(rename = "altKey", default)]
    pub alt: bool,
    #[serde(rename = "shiftKey", default)]
    pub shift: bool,
    #[serde(rename = "ctrlKey", default)]
    pub ctrl: bool,
    #[serde(rename = "metaKey", default)]
    pub meta: bool,
}

impl Modifiers {
    pub fn none(self) -> bool {
        !(self.alt || self.shift || self.ctrl || self.meta)
    }

    /// Ctrl on most platforms, Cmd on macOS.
    pub fn command(self) -> bool {
        self.ctrl || self.meta
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub key: String,
    #[serde(rename = "keyCode")]
    pub key_code: u32,
    #[serde(rename = "type", default = "key_kind")]
    pub kind: String,
    #[serde(flatten)]
    pub modifiers: Modifiers,
    #[serde(default)]
    pub trace_id: u64,
}

fn key_kind() -> String {
    "keydown".into()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingMarker {
    pub trace_id: u64,
}

/// One FSM transition streamed to the test channel while recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsmTraceRecord {
    pub order: u64,
    pub fsm_name: String,
    pub from_state: String,
    pub to_state: String,
    pub recv_message_type: String,
    #[serde(default)]
    pub trace_id: u64,
}

/// A scripted test: a starting topology, recorded input, and the
/// topology expected afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    #[serde(default)]
    pub event_trace: Vec<Envelope>,
    /// Recording-style fixtures: order 0 is the pre-, order 1 the
    /// post-condition.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub snapshots: Vec<Snapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre: Option<Box<Snapshot>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post: Option<Box<Snapshot>>,
}

impl TestCase {
    pub fn pre(&self) -> Option<&Snapshot> {
        self.pre.as_deref().or_else(|| self.snapshot_with_order(0))
    }

    pub fn post(&self) -> Option<&Snapshot> {
        self.post.as_deref().or_else(|| self.snapshot_with_order(1))
    }

    fn snapshot_with_order(&self, order: u64) -> Option<&Snapshot> {
        self.snapshots.iter().find(|s| s.order == Some(order))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TestOutcome {
    Passed,
    Failed,
    Errored,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub id: u64,
    pub name: String,
    pub result: TestOutcome,
    pub date: DateTime<Utc>,
    /// Mismatches and per-event errors behind a non-passing result.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageEdge {
    pub fsm: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    pub coverage: Vec<CoverageEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolboxItem {
    pub toolbox_name: String,
    pub data: Template,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopySite {
    pub site: GroupTemplate,
}

// ── Message ──────────────────────────────────────────────────────────

/// Every message type, tagged by `msg_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, IntoStaticStr)]
#[serde(tag = "msg_type")]
pub enum Message {
    // Devices
    DeviceCreate(DeviceCreate),
    DeviceDestroy(DeviceDestroy),
    DeviceMove(DeviceMove),
    DeviceLabelEdit(LabelEdit),
    DeviceSelected(Selected),
    DeviceUnSelected(Selected),
    // Interfaces
    InterfaceCreate(InterfaceRef),
    InterfaceDestroy(InterfaceRef),
    InterfaceLabelEdit(InterfaceLabelEdit),
    // Links
    LinkCreate(LinkRef),
    LinkDestroy(LinkRef),
    LinkLabelEdit(LabelEdit),
    LinkSelected(Selected),
    LinkUnSelected(Selected),
    // Groups
    GroupCreate(GroupCreate),
    GroupDestroy(GroupDestroy),
    GroupMove(GroupMove),
    GroupLabelEdit(LabelEdit),
    GroupMembership(GroupMembership),
    // Processes and streams
    ProcessCreate(ProcessRef),
    ProcessDestroy(ProcessRef),
    StreamCreate(StreamRef),
    StreamDestroy(StreamRef),
    StreamLabelEdit(StreamLabelEdit),
    // Batching and time travel
    MultipleMessage(MultipleMessage),
    Undo(TimeTravel),
    Redo(TimeTravel),
    // Session bootstrap
    Snapshot(Snapshot),
    Topology(Topology),
    History(History),
    ViewPort(ViewPort),
    // Recorded input
    MouseEvent(MouseEvent),
    MouseWheelEvent(MouseWheelEvent),
    KeyEvent(KeyEvent),
    // Recording, replay and tests
    StartRecording(RecordingMarker),
    StopRecording(RecordingMarker),
    StartReplay,
    StopReplay,
    #[serde(rename = "FSMTrace")]
    #[strum(serialize = "FSMTrace")]
    FsmTrace(FsmTraceRecord),
    TestCase(TestCase),
    TestResult(TestResult),
    TestCompleted,
    Coverage(Coverage),
    CoverageRequest,
    // Palettes
    ToolboxItem(ToolboxItem),
    CopySite(CopySite),
}

impl Message {
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// Whether the message changes the document and belongs in history.
    pub fn is_mutating(&self) -> bool {
        match self {
            Self::DeviceCreate(_)
            | Self::DeviceDestroy(_)
            | Self::DeviceMove(_)
            | Self::DeviceLabelEdit(_)
            | Self::InterfaceCreate(_)
            | Self::InterfaceDestroy(_)
            | Self::InterfaceLabelEdit(_)
            | Self::LinkCreate(_)
            | Self::LinkDestroy(_)
            | Self::LinkLabelEdit(_)
            | Self::GroupCreate(_)
            | Self::GroupDestroy(_)
            | Self::GroupMove(_)
            | Self::GroupLabelEdit(_)
            | Self::ProcessCreate(_)
            | Self::ProcessDestroy(_)
            | Self::StreamCreate(_)
            | Self::StreamDestroy(_)
            | Self::StreamLabelEdit(_) => true,
            Self::MultipleMessage(m) => m.messages.iter().any(|e| e.message.is_mutating()),
            _ => false,
        }
    }

    /// The message that undoes this one, if it has one.
    ///
    /// Applying `m` then `m.inverse()` leaves the document as it was.
    /// Messages without document effect (selection, input, snapshots)
    /// have no inverse.
    pub fn inverse(&self) -> Option<Message> {
        let inv = match self {
            Self::DeviceCreate(m) => Self::DeviceDestroy(DeviceDestroy {
                id: m.id,
                previous_x: m.x,
                previous_y: m.y,
                previous_name: m.name.clone(),
                previous_type: m.device_type,
                previous_host_id: m.host_id,
                previous_interfaces: Vec::new(),
                previous_processes: Vec::new(),
            }),
            Self::DeviceDestroy(m) => {
                let create = Self::DeviceCreate(DeviceCreate {
                    id: m.id,
                    name: m.previous_name.clone(),
                    x: m.previous_x,
                    y: m.previous_y,
                    device_type: m.previous_type,
                    host_id: m.previous_host_id,
                });
                if m.previous_interfaces.is_empty() && m.previous_processes.is_empty() {
                    create
                } else {
                    let mut parts = vec![create];
                    parts.extend(m.previous_interfaces.iter().map(|i| {
                        Self::InterfaceCreate(InterfaceRef {
                            device_id: m.id,
                            id: i.id,
                            name: i.name.clone(),
                        })
                    }));
                    parts.extend(m.previous_processes.iter().map(|p| {
                        Self::ProcessCreate(ProcessRef {
                            id: p.id,
                            name: p.name.clone(),
                            process_type: p.process_type.clone(),
                            device_id: m.id,
                        })
                    }));
                    Self::batch(parts)
                }
            }
            Self::DeviceMove(m) => Self::DeviceMove(DeviceMove {
                id: m.id,
                x: m.previous_x,
                y: m.previous_y,
                previous_x: m.x,
                previous_y: m.y,
            }),
            Self::DeviceLabelEdit(m) => Self::DeviceLabelEdit(m.swapped()),
            Self::LinkLabelEdit(m) => Self::LinkLabelEdit(m.swapped()),
            Self::GroupLabelEdit(m) => Self::GroupLabelEdit(m.swapped()),
            Self::InterfaceLabelEdit(m) => Self::InterfaceLabelEdit(InterfaceLabelEdit {
                id: m.id,
                device_id: m.device_id,
                name: m.previous_name.clone(),
                previous_name: m.name.clone(),
            }),
            Self::InterfaceCreate(m) => Self::InterfaceDestroy(m.clone()),
            Self::InterfaceDestroy(m) => Self::InterfaceCreate(m.clone()),
            Self::LinkCreate(m) => Self::LinkDestroy(m.clone()),
            Self::LinkDestroy(m) => Self::LinkCreate(m.clone()),
            Self::GroupCreate(m) => Self::GroupDestroy(GroupDestroy {
                id: m.id,
                previous_name: m.name.clone(),
                previous_type: m.group_type,
                previous_x1: m.x1,
                previous_y1: m.y1,
                previous_x2: m.x2,
                previous_y2: m.y2,
            }),
            Self::GroupDestroy(m) => Self::GroupCreate(GroupCreate {
                id: m.id,
                name: m.previous_name.clone(),
                group_type: m.previous_type,
                x1: m.previous_x1,
                y1: m.previous_y1,
                x2: m.previous_x2,
                y2: m.previous_y2,
            }),
            Self::GroupMove(m) => Self::GroupMove(GroupMove {
                id: m.id,
                x1: m.previous_x1,
                y1: m.previous_y1,
                x2: m.previous_x2,
                y2: m.previous_y2,
                previous_x1: m.x1,
                previous_y1: m.y1,
                previous_x2: m.x2,
                previous_y2: m.y2,
            }),
            Self::ProcessCreate(m) => Self::ProcessDestroy(m.clone()),
            Self::ProcessDestroy(m) => Self::ProcessCreate(m.clone()),
            Self::StreamCreate(m) => Self::StreamDestroy(m.clone()),
            Self::StreamDestroy(m) => Self::StreamCreate(m.clone()),
            Self::StreamLabelEdit(m) => Self::StreamLabelEdit(StreamLabelEdit {
                id: m.id,
                label: m.previous_label.clone(),
                previous_label: m.label.clone(),
            }),
            Self::MultipleMessage(m) => {
                let parts: Vec<Message> = m
                    .messages
                    .iter()
                    .rev()
                    .filter_map(|e| e.message.inverse())
                    .collect();
                if parts.is_empty() {
                    return None;
                }
                Self::batch(parts)
            }
            _ => return None,
        };
        Some(inv)
    }

    /// Wrap several messages into one `MultipleMessage`.
    pub fn batch(messages: Vec<Message>) -> Message {
        Self::MultipleMessage(MultipleMessage {
            messages: messages.into_iter().map(|m| Envelope::new(0, m)).collect(),
        })
    }
}

impl LabelEdit {
    fn swapped(&self) -> LabelEdit {
        LabelEdit {
            id: self.id,
            name: self.previous_name.clone(),
            previous_name: self.name.clone(),
        }
    }
}

impl From<&DeviceRecord> for DeviceCreate {
    fn from(d: &DeviceRecord) -> Self {
        DeviceCreate {
            id: d.id,
            name: d.name.clone(),
            x: d.x,
            y: d.y,
            device_type: d.device_type,
            host_id: d.host_id,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn create() -> Message {
        Message::DeviceCreate(DeviceCreate {
            id: 1,
            name: "Router1".into(),
            x: 100.0,
            y: 100.0,
            device_type: DeviceType::Router,
            host_id: None,
        })
    }

    #[test]
    fn inverse_of_inverse_is_identity_for_moves_and_edits() {
        let moves = Message::DeviceMove(DeviceMove {
            id: 1,
            x: 150.0,
            y: 120.0,
            previous_x: 100.0,
            previous_y: 100.0,
        });
        assert_eq!(moves.inverse().unwrap().inverse().unwrap(), moves);

        let edit = Message::GroupLabelEdit(LabelEdit {
            id: 2,
            name: "Rack7".into(),
            previous_name: "Rack2".into(),
        });
        let Message::GroupLabelEdit(inv) = edit.inverse().unwrap() else {
            panic!("wrong inverse type");
        };
        assert_eq!(inv.name, "Rack2");
        assert_eq!(inv.previous_name, "Rack7");
    }

    #[test]
    fn create_and_destroy_are_inverses() {
        let destroy = create().inverse().unwrap();
        assert_eq!(destroy.name(), "DeviceDestroy");
        assert_eq!(destroy.inverse().unwrap(), create());
    }

    #[test]
    fn destroy_with_interfaces_restores_them() {
        let destroy = Message::DeviceDestroy(DeviceDestroy {
            id: 4,
            previous_x: 0.0,
            previous_y: 0.0,
            previous_name: "Switch4".into(),
            previous_type: DeviceType::Switch,
            previous_host_id: None,
            previous_interfaces: vec![InterfaceRecord {
                id: 1,
                name: "swp1".into(),
            }],
            previous_processes: Vec::new(),
        });
        let Message::MultipleMessage(batch) = destroy.inverse().unwrap() else {
            panic!("expected a batch");
        };
        let names: Vec<_> = batch.messages.iter().map(Envelope::name).collect();
        assert_eq!(names, vec!["DeviceCreate", "InterfaceCreate"]);
    }

    #[test]
    fn batch_inverse_is_reversed() {
        let link = Message::LinkCreate(LinkRef {
            id: 1,
            name: String::new(),
            from_device_id: 1,
            to_device_id: 2,
            from_interface_id: 1,
            to_interface_id: 1,
        });
        let batch = Message::batch(vec![create(), link]);
        let Message::MultipleMessage(inv) = batch.inverse().unwrap() else {
            panic!("expected a batch");
        };
        let names: Vec<_> = inv.messages.iter().map(Envelope::name).collect();
        assert_eq!(names, vec!["LinkDestroy", "DeviceDestroy"]);
    }

    #[test]
    fn mutating_classification() {
        assert!(create().is_mutating());
        assert!(!Message::DeviceSelected(Selected { id: 1 }).is_mutating());
        assert!(!Message::Snapshot(Snapshot::default()).is_mutating());
        assert!(Message::batch(vec![create()]).is_mutating());
        assert!(!Message::batch(vec![Message::StartReplay]).is_mutating());
        assert!(Message::Snapshot(Snapshot::default()).inverse().is_none());
    }

    #[test]
    fn envelope_is_flat_on_the_wire() {
        let env = Envelope {
            sender: 3,
            message_id: Some(9),
            message: Message::DeviceSelected(Selected { id: 1 }),
        };
        let v = serde_json::to_value(&env).unwrap();
        assert_eq!(
            v,
            serde_json::json!({"sender": 3, "message_id": 9, "msg_type": "DeviceSelected", "id": 1})
        );
        let back: Envelope = serde_json::from_value(v).unwrap();
        assert_eq!(back, env);
    }

    #[test]
    fn fsm_trace_keeps_its_wire_name() {
        let m = Message::FsmTrace(FsmTraceRecord {
            order: 0,
            fsm_name: "view".into(),
            from_state: "Ready".into(),
            to_state: "Pressed".into(),
            recv_message_type: "MouseDown".into(),
            trace_id: 1,
        });
        assert_eq!(m.name(), "FSMTrace");
        let v = serde_json::to_value(Envelope::new(0, m)).unwrap();
        assert_eq!(v["msg_type"], "FSMTrace");
    }

    #[test]
    fn key_event_modifiers_are_flat() {
        let json = r#"{"msg_type":"KeyEvent","sender":0,"key":"z","keyCode":90,"type":"keydown","ctrlKey":true,"trace_id":2}"#;
        let env: Envelope = serde_json::from_str(json).unwrap();
        let Message::KeyEvent(k) = env.message else {
            panic!("not a key event");
        };
        assert!(k.modifiers.ctrl && !k.modifiers.shift);
        assert!(k.modifiers.command());
    }
}
