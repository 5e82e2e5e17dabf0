// ── Editor workspace ──
//
// The explicit context every controller receives: the shared document,
// the viewport, palettes, flags, connection state, queues and the
// transition trace. Controllers own only their FSM state; everything
// they read or change lives here.

pub mod history;
pub mod outbox;
pub mod recording;
pub mod selection;
pub mod view;

use std::collections::{BTreeSet, VecDeque};

use tracing::{debug, warn};

pub use history::History;
pub use outbox::{Effect, Outbox};
pub use selection::{Item, Selection};
pub use view::View;

use crate::config::EditorConfig;
use crate::controllers::animation::Animation;
use crate::event::{Event, Key};
use crate::fsm::FsmTrace;
use crate::message::{
    Envelope, InterfaceLabelEdit, LabelEdit, LinkRef, Message, Selected, StreamRef, TestCase,
    TestResult, Topology,
};
use crate::model::{
    DeviceType, Document, GroupType, IdSeqs, Snapshot, Template, Toolbox, ToolboxKind,
};
use crate::pipeline::Stage;

// ── Flags ────────────────────────────────────────────────────────────

/// Display toggles and session modes.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flags {
    pub debug: bool,
    pub hide_buttons: bool,
    pub hide_interfaces: bool,
    pub hide_links: bool,
    pub hide_groups: bool,
    pub hide_menus: bool,
    pub hide_toolboxes: bool,
    /// Inputs, transitions and snapshots stream to the test channel.
    pub recording: bool,
    /// Recorded input messages from the server are applied.
    pub replay: bool,
    /// Control messages are dropped instead of sent.
    pub disconnected: bool,
}

impl Flags {
    /// Restore the display toggles; session modes are left alone.
    pub fn reset_display(&mut self) {
        self.debug = false;
        self.hide_buttons = false;
        self.hide_interfaces = false;
        self.hide_links = false;
        self.hide_groups = false;
        self.hide_menus = false;
        self.hide_toolboxes = false;
    }
}

// ── Palettes ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Toolboxes {
    pub site: Toolbox,
    pub rack: Toolbox,
    pub inventory: Toolbox,
    pub app: Toolbox,
}

impl Toolboxes {
    pub fn new(graph_height: f64) -> Self {
        Self {
            site: Toolbox::new(ToolboxKind::Site, graph_height),
            rack: Toolbox::new(ToolboxKind::Rack, graph_height),
            inventory: Toolbox::new(ToolboxKind::Inventory, graph_height),
            app: Toolbox::new(ToolboxKind::App, graph_height),
        }
    }

    pub fn get(&self, kind: ToolboxKind) -> &Toolbox {
        match kind {
            ToolboxKind::Site => &self.site,
            ToolboxKind::Rack => &self.rack,
            ToolboxKind::Inventory => &self.inventory,
            ToolboxKind::App => &self.app,
        }
    }

    pub fn get_mut(&mut self, kind: ToolboxKind) -> &mut Toolbox {
        match kind {
            ToolboxKind::Site => &mut self.site,
            ToolboxKind::Rack => &mut self.rack,
            ToolboxKind::Inventory => &mut self.inventory,
            ToolboxKind::App => &mut self.app,
        }
    }

    /// Empty every palette and scroll it back to the top.
    pub fn reset(&mut self) {
        for tb in [&mut self.site, &mut self.rack, &mut self.inventory, &mut self.app] {
            tb.items.clear();
            tb.scroll_offset = 0.0;
            tb.selected_item = None;
        }
    }
}

// ── Key bindings ─────────────────────────────────────────────────────

/// Binding sets registered by the mode FSM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, strum::IntoStaticStr)]
pub enum BindingSet {
    Site,
    Rack,
    Device,
}

#[derive(Debug, Clone, Default)]
pub struct KeyMap {
    registered: BTreeSet<BindingSet>,
}

impl KeyMap {
    /// Returns `false` (and logs) when the set was already registered.
    pub fn register(&mut self, set: BindingSet) -> bool {
        let added = self.registered.insert(set);
        if !added {
            warn!(set = <&str>::from(set), "key binding set registered twice");
        }
        added
    }

    pub fn unregister(&mut self, set: BindingSet) -> bool {
        let removed = self.registered.remove(&set);
        if !removed {
            warn!(set = <&str>::from(set), "key binding set was not registered");
        }
        removed
    }

    pub fn is_registered(&self, set: BindingSet) -> bool {
        self.registered.contains(&set)
    }

    pub fn clear(&mut self) {
        self.registered.clear();
    }

    /// The command bound to `key` in any registered set.
    pub fn lookup(&self, key: &Key) -> Option<Event> {
        self.registered
            .iter()
            .find_map(|set| Self::binding(*set, key))
    }

    fn binding(set: BindingSet, key: &Key) -> Option<Event> {
        let m = key.modifiers;
        if m.command() && !m.alt && key.key == "c" {
            return Some(Event::CopySelected);
        }
        if m.command() || m.alt || set != BindingSet::Device {
            return None;
        }
        let event = match key.key.as_str() {
            "r" => Event::NewDevice(DeviceType::Router),
            "s" => Event::NewDevice(DeviceType::Switch),
            "h" => Event::NewDevice(DeviceType::Host),
            "l" => Event::NewLink,
            "t" => Event::NewStream,
            "g" => Event::NewGroup(GroupType::Group),
            "R" => Event::NewGroup(GroupType::Rack),
            "S" => Event::NewGroup(GroupType::Site),
            _ => return None,
        };
        Some(event)
    }
}

// ── Queues ───────────────────────────────────────────────────────────

/// Events raised by handlers, delivered once the handler returns.
#[derive(Debug, Default)]
pub struct Queues {
    injected: VecDeque<Event>,
    directed: VecDeque<(Stage, Event)>,
    /// Restart every stage but the test runner after this dispatch.
    pub reset_stages: bool,
}

impl Queues {
    /// Dispatch `event` from the chain head after the current dispatch.
    pub fn inject(&mut self, event: Event) {
        self.injected.push_back(event);
    }

    /// Deliver `event` to `stage` only, right after the current handler.
    pub fn direct(&mut self, stage: Stage, event: Event) {
        self.directed.push_back((stage, event));
    }

    pub fn pop_injected(&mut self) -> Option<Event> {
        self.injected.pop_front()
    }

    pub fn pop_directed(&mut self) -> Option<(Stage, Event)> {
        self.directed.pop_front()
    }

    pub fn clear(&mut self) {
        self.injected.clear();
        self.directed.clear();
        self.reset_stages = false;
    }
}

// ── Context menu and tests ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextMenu {
    pub x: f64,
    pub y: f64,
    pub target: Item,
}

/// Scripted test runner state.
#[derive(Debug, Default)]
pub struct TestState {
    /// Known tests, in arrival order.
    pub suite: Vec<TestCase>,
    /// Tests still to run in the current pass.
    pub pending: VecDeque<TestCase>,
    pub current: Option<TestCase>,
    /// Remaining recorded input of the current test.
    pub events: VecDeque<Envelope>,
    pub errors: Vec<String>,
    pub results: Vec<TestResult>,
    pub next_result_id: u64,
    /// `(disconnected, replay)` before the run, restored afterwards.
    pub saved_flags: Option<(bool, bool)>,
}

// ── Workspace ────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Workspace {
    pub config: EditorConfig,
    pub doc: Document,
    pub view: View,
    pub animations: Vec<Animation>,
    animation_seq: u64,
    pub toolboxes: Toolboxes,
    pub flags: Flags,
    pub selection: Selection,
    /// Item shown in the details panel.
    pub details: Option<Item>,
    pub context_menu: Option<ContextMenu>,

    pub client_id: u64,
    pub test_client_id: u64,
    pub connected: bool,
    message_id_seq: u64,
    trace_id_seq: u64,
    /// Current recording, stamped on streamed input.
    pub trace_id: u64,

    pub outbox: Outbox,
    pub history: History,
    pub trace: FsmTrace,
    pub keymap: KeyMap,
    pub queues: Queues,
    pub tests: TestState,
}

impl AsMut<FsmTrace> for Workspace {
    fn as_mut(&mut self) -> &mut FsmTrace {
        &mut self.trace
    }
}

impl Workspace {
    pub fn new(config: EditorConfig) -> Self {
        Self {
            doc: Document::new(),
            view: View::new(&config),
            animations: Vec::new(),
            animation_seq: 0,
            toolboxes: Toolboxes::new(config.graph_height),
            flags: Flags::default(),
            selection: Selection::new(),
            details: None,
            context_menu: None,
            client_id: 0,
            test_client_id: 0,
            connected: false,
            message_id_seq: 0,
            trace_id_seq: 0,
            trace_id: 0,
            outbox: Outbox::default(),
            history: History::new(),
            trace: FsmTrace::new(config.trace_capacity),
            keymap: KeyMap::default(),
            queues: Queues::default(),
            tests: TestState::default(),
            config,
        }
    }

    pub fn next_animation_id(&mut self) -> u64 {
        self.animation_seq += 1;
        self.animation_seq
    }

    pub fn next_trace_id(&mut self) -> u64 {
        self.trace_id_seq += 1;
        self.trace_id = self.trace_id_seq;
        self.trace_id
    }

    /// Announce a scale change to the mode FSM.
    pub fn post_scale_changed(&mut self) {
        self.queues.inject(Event::ScaleChanged);
    }

    // ── Selection ────────────────────────────────────────────────────

    /// Topmost item under the pointer: a device, else an interface dot,
    /// else a link. Hidden interfaces and links are skipped.
    pub fn hit_test(&self) -> Option<Item> {
        let (x, y) = (self.view.scaled_x, self.view.scaled_y);
        self.doc
            .device_at(x, y)
            .map(Item::Device)
            .or_else(|| {
                (!self.flags.hide_interfaces)
                    .then(|| self.doc.interface_at(x, y))
                    .flatten()
                    .map(|(device_id, id)| Item::Interface { device_id, id })
            })
            .or_else(|| {
                (!self.flags.hide_links)
                    .then(|| self.doc.link_at(x, y))
                    .flatten()
                    .map(Item::Link)
            })
    }

    /// Hit-test at the pointer and select what was hit. Records the
    /// press origin.
    pub fn select_items(&mut self, multiple: bool) -> Option<Item> {
        self.view.press();
        if !multiple {
            self.clear_selections();
        }
        let hit = self.hit_test()?;
        self.select(hit);
        Some(hit)
    }

    /// Mark `item` selected and tell the other clients.
    pub fn select(&mut self, item: Item) {
        match item {
            Item::Device(id) => {
                if let Some(d) = self.doc.device_mut(id) {
                    d.selected = true;
                    self.send_control_message(Message::DeviceSelected(Selected { id }));
                }
            }
            Item::Link(id) => {
                if let Some(l) = self.doc.link_mut(id) {
                    l.selected = true;
                    self.send_control_message(Message::LinkSelected(Selected { id }));
                }
            }
            Item::Group(id) => {
                if let Some(g) = self.doc.group_mut(id) {
                    g.selected = true;
                }
            }
            Item::Interface { .. } => {}
        }
        self.selection.push(item);
    }

    /// Deselect everything, announcing each link and device.
    pub fn clear_selections(&mut self) {
        let (devices, links) = self.doc.clear_selection();
        for id in links {
            self.send_control_message(Message::LinkUnSelected(Selected { id }));
        }
        for id in devices {
            self.send_control_message(Message::DeviceUnSelected(Selected { id }));
        }
        self.selection.take();
    }

    /// Drop selected items that no longer exist, e.g. after an undo.
    pub fn prune_selection(&mut self) {
        let stale: Vec<Item> = self
            .selection
            .items()
            .iter()
            .copied()
            .filter(|i| self.label_of(*i).is_none())
            .collect();
        for item in stale {
            self.selection.remove(item);
        }
        if self.details.is_some_and(|i| self.label_of(i).is_none()) {
            self.details = None;
            self.emit(Effect::HideDetails);
        }
    }

    // ── Editing ──────────────────────────────────────────────────────

    /// Delete the selected links and devices as one batch.
    ///
    /// Devices take their links and streams with them. Returns `false`
    /// when nothing was deleted.
    pub fn delete_selected(&mut self) -> bool {
        let links: Vec<u64> = self.selection.links().collect();
        let devices: Vec<u64> = self.selection.devices().collect();
        self.selection.take();

        let mut parts = Vec::new();
        for id in links {
            self.destroy_link_into(id, &mut parts);
        }
        for id in devices {
            let incident: Vec<u64> = self.doc.incident_links(id).map(|l| l.id).collect();
            for link in incident {
                self.destroy_link_into(link, &mut parts);
            }
            let streams: Vec<StreamRef> = self
                .doc
                .streams()
                .filter(|s| s.from_id == id || s.to_id == id)
                .map(|s| StreamRef {
                    id: s.id,
                    from_id: s.from_id,
                    to_id: s.to_id,
                    label: s.label.clone(),
                })
                .collect();
            for s in streams {
                self.doc.destroy_stream(s.id);
                parts.push(Message::StreamDestroy(s));
            }
            if let Some(m) = self.doc.device_destroy(id) {
                self.doc.destroy_device(id);
                parts.push(Message::DeviceDestroy(m));
            }
        }
        if parts.is_empty() {
            return false;
        }
        parts.extend(
            self.doc
                .update_membership()
                .into_iter()
                .map(Message::GroupMembership),
        );
        debug!(count = parts.len(), "deleting selection");
        self.send_control_message(Message::batch(parts));
        true
    }

    /// Destroy the selected groups, one `GroupDestroy` each. Member
    /// devices stay where they are.
    pub fn delete_selected_groups(&mut self) -> bool {
        let groups: Vec<u64> = self.selection.groups().collect();
        let mut deleted = false;
        for id in groups {
            self.selection.remove(Item::Group(id));
            let Some(m) = self.doc.group_destroy(id) else {
                continue;
            };
            self.doc.destroy_group(id);
            self.send_control_message(Message::GroupDestroy(m));
            deleted = true;
        }
        if deleted {
            self.broadcast_membership();
        }
        deleted
    }

    /// Show the context menu for `target` at the pointer.
    pub fn open_context_menu(&mut self, target: Item) {
        let (x, y) = (self.view.mouse_x, self.view.mouse_y);
        self.context_menu = Some(ContextMenu { x, y, target });
        self.emit(Effect::ShowContextMenu { x, y });
    }

    pub fn close_context_menu(&mut self) {
        if self.context_menu.take().is_some() {
            self.emit(Effect::HideContextMenu);
        }
    }

    fn destroy_link_into(&mut self, id: u64, parts: &mut Vec<Message>) {
        let Some(r): Option<LinkRef> = self.doc.link_ref(id) else {
            return;
        };
        self.doc.destroy_link(id);
        parts.push(Message::LinkDestroy(r));
    }

    /// Recompute membership and broadcast the groups that changed.
    pub fn broadcast_membership(&mut self) {
        for m in self.doc.update_membership() {
            self.send_control_message(Message::GroupMembership(m));
        }
    }

    pub fn label_of(&self, item: Item) -> Option<&str> {
        match item {
            Item::Device(id) => self.doc.device(id).map(|d| d.name.as_str()),
            Item::Interface { device_id, id } => self
                .doc
                .device(device_id)
                .and_then(|d| d.interface(id))
                .map(|i| i.name.as_str()),
            Item::Link(id) => self.doc.link(id).map(|l| l.name.as_str()),
            Item::Group(id) => self.doc.group(id).map(|g| g.name.as_str()),
        }
    }

    /// Rename `item` locally and return the label-edit message.
    pub fn rename(&mut self, item: Item, name: String) -> Option<Message> {
        let previous_name = self.label_of(item)?.to_owned();
        let message = match item {
            Item::Device(id) => {
                self.doc.rename_device(id, &name);
                Message::DeviceLabelEdit(LabelEdit { id, name, previous_name })
            }
            Item::Interface { device_id, id } => {
                self.doc.rename_interface(device_id, id, &name);
                Message::InterfaceLabelEdit(InterfaceLabelEdit {
                    id,
                    device_id,
                    name,
                    previous_name,
                })
            }
            Item::Link(id) => {
                self.doc.rename_link(id, &name);
                Message::LinkLabelEdit(LabelEdit { id, name, previous_name })
            }
            Item::Group(id) => {
                self.doc.rename_group(id, &name);
                Message::GroupLabelEdit(LabelEdit { id, name, previous_name })
            }
        };
        Some(message)
    }

    /// Apply one label-editing keystroke to `item` and broadcast it.
    ///
    /// Delete/Backspace drops the last character, printable keys append.
    /// Returns `false` for keys that do not edit.
    pub fn type_into_label(&mut self, item: Item, key: &Key) -> bool {
        let Some(current) = self.label_of(item) else {
            return false;
        };
        let mut name = current.to_owned();
        if key.is_delete() {
            name.pop();
        } else if let Some(ch) = key.printable() {
            name.push_str(ch);
        } else {
            return false;
        }
        if let Some(message) = self.rename(item, name) {
            self.send_control_message(message);
        }
        true
    }

    // ── Bootstrap ────────────────────────────────────────────────────

    /// Rebuild from a snapshot and fit the viewport to it.
    pub fn load_snapshot(&mut self, snapshot: &Snapshot) {
        self.doc.load_snapshot(snapshot);
        self.selection.take();
        self.details = None;
        self.context_menu = None;

        if let Some(items) = &snapshot.inventory_toolbox {
            self.toolboxes.inventory.items = items.iter().cloned().map(Template::Device).collect();
        }
        let placed: Vec<String> = self.doc.devices().map(|d| d.name.clone()).collect();
        for name in &placed {
            self.toolboxes.inventory.remove_named(name);
        }

        if let Some(extent) = snapshot.device_extent() {
            self.view.fit(extent);
            self.post_scale_changed();
        }
        debug!(
            devices = snapshot.devices.len(),
            links = snapshot.links.len(),
            groups = snapshot.groups.len(),
            scale = self.view.scale,
            "snapshot loaded"
        );
    }

    pub fn apply_topology(&mut self, t: &Topology) {
        self.doc.topology_id = Some(t.topology_id);
        self.view.pan_x = t.pan_x;
        self.view.pan_y = t.pan_y;
        self.view.scale = t.scale;
        self.view.update_scaled();
        self.doc.seqs.bump_to(IdSeqs {
            device: t.device_id_seq,
            link: t.link_id_seq,
            group: t.group_id_seq,
            stream: t.stream_id_seq,
        });
        self.post_scale_changed();
    }

    /// Back to an empty editor, as before a test run. Connection state
    /// and the recording/replay modes survive.
    pub fn reset(&mut self) {
        self.doc.clear();
        self.doc.topology_id = None;
        self.doc.seqs = IdSeqs::default();
        self.history.clear();
        self.selection.take();
        self.details = None;
        self.context_menu = None;
        self.flags.reset_display();
        self.toolboxes.reset();
        self.cancel_animations();
        self.keymap.clear();
        self.view = View::new(&self.config);
    }

    pub fn cancel_animations(&mut self) {
        for a in &mut self.animations {
            a.cancel(&mut self.trace);
        }
        self.animations.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::message::{DeviceCreate, LinkRef};
    use crate::model::DeviceType;
    use pretty_assertions::assert_eq;

    fn workspace() -> Workspace {
        let mut ws = Workspace::new(EditorConfig::default());
        ws.set_client_id(1);
        for (id, x) in [(1, 100.0), (2, 300.0)] {
            ws.doc.apply(&Message::DeviceCreate(DeviceCreate {
                id,
                name: format!("Switch{id}"),
                x,
                y: 100.0,
                device_type: DeviceType::Switch,
                host_id: None,
            }));
        }
        ws.doc.apply(&Message::InterfaceCreate(crate::message::InterfaceRef {
            device_id: 1,
            id: 1,
            name: "swp1".into(),
        }));
        ws.doc.apply(&Message::InterfaceCreate(crate::message::InterfaceRef {
            device_id: 2,
            id: 1,
            name: "swp1".into(),
        }));
        ws.doc.apply(&Message::LinkCreate(LinkRef {
            id: 1,
            name: String::new(),
            from_device_id: 1,
            to_device_id: 2,
            from_interface_id: 1,
            to_interface_id: 1,
        }));
        ws
    }

    #[test]
    fn select_items_prefers_devices_then_links() {
        let mut ws = workspace();
        ws.view.pointer(100.0, 100.0);
        assert_eq!(ws.select_items(false), Some(Item::Device(1)));
        ws.view.pointer(200.0, 100.0);
        assert_eq!(ws.select_items(false), Some(Item::Link(1)));
        assert!(!ws.doc.device(1).unwrap().selected);
        let names: Vec<_> = ws.outbox.control.iter().map(Envelope::name).collect();
        assert_eq!(names, vec!["DeviceSelected", "DeviceUnSelected", "LinkSelected"]);
    }

    #[test]
    fn hidden_links_are_not_selectable() {
        let mut ws = workspace();
        ws.flags.hide_links = true;
        ws.view.pointer(200.0, 100.0);
        assert_eq!(ws.select_items(false), None);
    }

    #[test]
    fn delete_cascades_into_one_batch() {
        let mut ws = workspace();
        ws.select(Item::Device(1));
        ws.outbox.control.clear();
        assert!(ws.delete_selected());

        assert!(ws.doc.device(1).is_none());
        assert!(ws.doc.link(1).is_none());
        let sent = ws.outbox.take_control();
        assert_eq!(sent.len(), 1);
        let Message::MultipleMessage(batch) = &sent[0].message else {
            panic!("expected a batch");
        };
        let names: Vec<_> = batch.messages.iter().map(Envelope::name).collect();
        assert_eq!(names, vec!["LinkDestroy", "DeviceDestroy"]);
        let Message::DeviceDestroy(d) = &batch.messages[1].message else {
            unreachable!()
        };
        assert_eq!(d.previous_interfaces.len(), 1);
    }

    #[test]
    fn typing_edits_labels_and_sends_each_key() {
        let mut ws = workspace();
        assert!(ws.type_into_label(Item::Device(1), &Key::new("x", 88)));
        assert!(ws.type_into_label(Item::Device(1), &Key::new("Backspace", 8)));
        assert!(ws.type_into_label(Item::Device(1), &Key::new("Backspace", 8)));
        assert!(!ws.type_into_label(Item::Device(1), &Key::new("Enter", 13)));
        assert_eq!(ws.doc.device(1).unwrap().name, "Switch");
        assert_eq!(ws.outbox.control.len(), 3);
        let Message::DeviceLabelEdit(last) = &ws.outbox.control[2].message else {
            panic!("expected a label edit");
        };
        assert_eq!(last.previous_name, "Switch1");
    }

    #[test]
    fn device_bindings_need_the_device_set() {
        let mut keymap = KeyMap::default();
        assert_eq!(keymap.lookup(&Key::new("r", 82)), None);
        assert!(keymap.register(BindingSet::Device));
        assert!(!keymap.register(BindingSet::Device));
        assert_eq!(
            keymap.lookup(&Key::new("r", 82)),
            Some(Event::NewDevice(DeviceType::Router))
        );
        keymap.unregister(BindingSet::Device);
        assert!(keymap.register(BindingSet::Rack));
        assert_eq!(keymap.lookup(&Key::new("r", 82)), None);
        let copy = Key::new("c", 67).with(crate::message::Modifiers {
            ctrl: true,
            ..crate::message::Modifiers::default()
        });
        assert_eq!(keymap.lookup(&copy), Some(Event::CopySelected));
    }

    #[test]
    fn snapshot_fits_view_and_posts_scale_change() {
        let mut ws = workspace();
        let snap = ws.doc.to_snapshot();
        let mut fresh = Workspace::new(EditorConfig::default());
        fresh.load_snapshot(&snap);
        assert_eq!(fresh.doc.devices().count(), 2);
        assert_eq!(fresh.queues.pop_injected(), Some(Event::ScaleChanged));
        assert!((fresh.view.scale - 2.0).abs() < 1e-9);
        ws.reset();
        assert!(ws.doc.is_empty());
        assert!(ws.history.is_empty());
    }
}
