// ── Pipeline events ──
//
// What flows through the controller chain: normalized input, inbound
// protocol messages, lifecycle notices and commands that one
// controller raises for another. Pointer events carry no coordinates;
// they are normalized into the workspace view before dispatch.

use strum::IntoStaticStr;

use crate::message::{Envelope, Modifiers};
use crate::model::{DeviceTemplate, DeviceType, GroupTemplate, GroupType, ProcessTemplate};

#[derive(Debug, Clone, PartialEq)]
pub struct Wheel {
    pub delta: f64,
    pub delta_x: f64,
    pub delta_y: f64,
    pub modifiers: Modifiers,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    pub key: String,
    pub key_code: u32,
    pub modifiers: Modifiers,
}

impl Key {
    pub fn new(key: impl Into<String>, key_code: u32) -> Self {
        Self {
            key: key.into(),
            key_code,
            modifiers: Modifiers::default(),
        }
    }

    pub fn with(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Delete or Backspace.
    pub fn is_delete(&self) -> bool {
        matches!(self.key_code, 8 | 46)
    }

    pub fn is_enter(&self) -> bool {
        self.key_code == 13
    }

    /// The character typed into a label, if the key produces one.
    pub fn printable(&self) -> Option<&str> {
        match self.key_code {
            32 => Some(" "),
            48..=90 | 186..=222 => Some(self.key.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, IntoStaticStr)]
pub enum Event {
    // ── Input ────────────────────────────────────────────────────────
    MouseDown,
    MouseUp,
    MouseMove,
    MouseWheel(Wheel),
    KeyDown(Key),

    // ── Protocol ─────────────────────────────────────────────────────
    /// An inbound message from the topology or test channel.
    Message(Envelope),

    // ── Lifecycle ────────────────────────────────────────────────────
    Enable,
    Disable,
    ScaleChanged,
    AnimationTick,
    /// A local send truncated the redo tail.
    HistoryTruncated,

    // ── Commands ─────────────────────────────────────────────────────
    NewDevice(DeviceType),
    NewGroup(GroupType),
    NewLink,
    NewStream,
    PasteDevice(DeviceTemplate),
    PasteProcess(ProcessTemplate),
    PasteRack(GroupTemplate),
    PasteSite(GroupTemplate),
    CopySelected,
    Delete,
    LabelEdit,
    UnselectAll,
    DetailsPanel,
    DetailsPanelClose,
    ToggleToolbox,
    SearchDropdown,
    SearchDropdownClose,
    Search(u64),
    /// Zoom widget position, in percent.
    Zoom(f64),
    Undo,
    Redo,
    ToggleRecording,

    // ── Tests ────────────────────────────────────────────────────────
    EnableTest,
    TestLoad,
    TestTick,
}

impl Event {
    /// Name used for trace attribution. Messages report their own type.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Message(env) => env.name(),
            other => other.into(),
        }
    }

    pub fn message(&self) -> Option<&Envelope> {
        match self {
            Self::Message(env) => Some(env),
            _ => None,
        }
    }
}
