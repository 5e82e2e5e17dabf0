// ── Move: select, drag, rename and delete devices, interfaces, links ──

use tracing::debug;

use super::enable_disable;
use crate::error::CoreError;
use crate::event::Event;
use crate::fsm::{Fsm, Machine, StateId};
use crate::message::{DeviceCreate, DeviceMove, Message, ProcessRef};
use crate::model::{Device, DeviceTemplate, DeviceType, MOVING_RADIUS, ProcessTemplate, Template};
use crate::pipeline::{Controller, Flow, Stage};
use crate::states;
use crate::workspace::{Item, Workspace};

states! {
    pub enum MoveState {
        Start => [Disable, Ready],
        Disable => [Ready],
        Ready => [Disable, Selected1, Placing, Selected2],
        Selected1 => [Disable, Ready, Move, Selected2],
        Selected2 => [Disable, Ready, Selected3],
        Selected3 => [Disable, Ready, ContextMenu, Move],
        Move => [Disable, Ready, Selected1],
        EditLabel => [Disable, Ready, Selected2],
        Placing => [Disable, Ready, Move, Selected1],
        ContextMenu => [Disable, Ready, EditLabel],
    }
}

#[derive(Debug)]
pub struct MoveController {
    machine: Machine<MoveState>,
    /// Item whose label is being typed into.
    editing: Option<Item>,
}

impl MoveController {
    pub fn new() -> Self {
        Self {
            machine: Machine::new("move_fsm", MoveState::Start),
            editing: None,
        }
    }

    fn new_device(&mut self, ws: &mut Workspace, device_type: DeviceType) {
        ws.view.press();
        ws.clear_selections();
        let id = ws.doc.seqs.next_device();
        let create = Message::DeviceCreate(DeviceCreate {
            id,
            name: format!("{}{id}", device_type.title()),
            x: ws.view.scaled_x,
            y: ws.view.scaled_y,
            device_type,
            host_id: None,
        });
        ws.doc.apply_quiet(&create);
        ws.send_control_message(create);
        ws.select(Item::Device(id));
        ws.broadcast_membership();
        self.change_state(ws, MoveState::Placing);
    }

    fn paste_device(&mut self, ws: &mut Workspace, template: &DeviceTemplate) {
        ws.view.press();
        let (id, parts) = ws.doc.paste_device(template, ws.view.scaled_x, ws.view.scaled_y);
        ws.send_control_message(Message::batch(parts));
        ws.toolboxes.inventory.remove_named(&template.name);
        ws.select(Item::Device(id));
        ws.broadcast_membership();
        self.change_state(ws, MoveState::Selected2);
    }

    fn paste_process(ws: &mut Workspace, template: &ProcessTemplate) {
        let Some(device_id) = ws.doc.device_at(ws.view.scaled_x, ws.view.scaled_y) else {
            debug!(process = %template.name, "no device under the pointer");
            return;
        };
        let Some(id) = ws.doc.device_mut(device_id).map(Device::next_process_id) else {
            return;
        };
        let create = Message::ProcessCreate(ProcessRef {
            id,
            name: template.name.clone(),
            process_type: template.process_type.clone(),
            device_id,
        });
        ws.doc.apply_quiet(&create);
        ws.send_control_message(create);
    }

    /// One drag tick: move every selected device by the pointer delta.
    fn drag(ws: &mut Workspace) {
        let dx = ws.view.scaled_x - ws.view.pressed_scaled_x;
        let dy = ws.view.scaled_y - ws.view.pressed_scaled_y;
        if dx.abs() < f64::EPSILON && dy.abs() < f64::EPSILON {
            return;
        }
        let devices: Vec<u64> = ws.selection.devices().collect();
        for id in devices {
            let Some((previous_x, previous_y)) = ws.doc.device(id).map(|d| (d.x, d.y)) else {
                continue;
            };
            let (x, y) = (previous_x + dx, previous_y + dy);
            ws.doc.move_device(id, x, y);
            ws.send_control_message(Message::DeviceMove(DeviceMove {
                id,
                x,
                y,
                previous_x,
                previous_y,
            }));
        }
        ws.view.pressed_scaled_x = ws.view.scaled_x;
        ws.view.pressed_scaled_y = ws.view.scaled_y;
        ws.broadcast_membership();
    }

    /// Copy the selected devices into the inventory palette.
    fn copy_selected(ws: &mut Workspace) {
        let devices: Vec<u64> = ws.selection.devices().collect();
        for id in devices {
            let Some(mut template) = ws.doc.device_template(id) else {
                continue;
            };
            template.id = 0;
            template.x = 0.0;
            template.y = 0.0;
            ws.toolboxes.inventory.items.push(Template::Device(template));
        }
    }

    fn delete(&mut self, ws: &mut Workspace) {
        if !ws.delete_selected() {
            debug!("nothing selected to delete");
        }
        self.change_state(ws, MoveState::Ready);
    }

    fn on_lattice(&mut self, ws: &mut Workspace, event: &Event) -> Option<Flow> {
        if let Some(flow) = enable_disable(self, ws, event, MoveState::Disable, MoveState::Ready) {
            return Some(flow);
        }
        if matches!(event, Event::UnselectAll) {
            ws.clear_selections();
            if self.state() != MoveState::Ready {
                self.change_state(ws, MoveState::Ready);
            }
            return Some(Flow::Forward);
        }
        None
    }
}

impl Default for MoveController {
    fn default() -> Self {
        Self::new()
    }
}

impl Fsm for MoveController {
    type State = MoveState;
    type Context = Workspace;

    fn machine(&self) -> &Machine<MoveState> {
        &self.machine
    }

    fn machine_mut(&mut self) -> &mut Machine<MoveState> {
        &mut self.machine
    }

    fn on_start(&mut self, ws: &mut Workspace, state: MoveState) {
        match state {
            MoveState::Move => {
                let selected: Vec<u64> = ws.selection.devices().collect();
                for id in selected {
                    let Some(center) = ws.doc.device(id).map(Device::center) else {
                        continue;
                    };
                    for near in ws.doc.devices_near(center, MOVING_RADIUS) {
                        if let Some(d) = ws.doc.device_mut(near) {
                            d.moving = true;
                        }
                    }
                }
            }
            MoveState::EditLabel => {
                self.editing = ws.selection.items().first().copied();
            }
            _ => {}
        }
    }

    fn on_end(&mut self, ws: &mut Workspace, state: MoveState) {
        match state {
            MoveState::Move => {
                for d in ws.doc.devices_mut() {
                    d.moving = false;
                }
            }
            MoveState::EditLabel => self.editing = None,
            MoveState::ContextMenu => ws.close_context_menu(),
            _ => {}
        }
    }
}

impl Controller for MoveController {
    fn stage(&self) -> Stage {
        Stage::Move
    }

    fn state_name(&self) -> &'static str {
        self.state().name()
    }

    fn reset(&mut self) {
        self.machine.reset();
        self.editing = None;
    }

    fn start(&mut self, ws: &mut Workspace) {
        self.change_state(ws, MoveState::Disable);
    }

    fn handle(&mut self, ws: &mut Workspace, event: &Event) -> Result<Flow, CoreError> {
        if let Some(flow) = self.on_lattice(ws, event) {
            return Ok(flow);
        }

        let flow = match (self.state(), event) {
            // ── Ready ────────────────────────────────────────────────
            (MoveState::Ready, Event::MouseDown) => {
                let multiple = ws.view.modifiers.shift;
                if ws.select_items(multiple).is_some() {
                    self.change_state(ws, MoveState::Selected1);
                    ws.queues.inject(Event::DetailsPanel);
                    Flow::Consumed
                } else {
                    Flow::Forward
                }
            }
            (MoveState::Ready, Event::NewDevice(device_type)) => {
                self.new_device(ws, *device_type);
                Flow::Consumed
            }
            (MoveState::Ready, Event::PasteDevice(template)) => {
                self.paste_device(ws, template);
                Flow::Consumed
            }
            (MoveState::Ready | MoveState::Selected2, Event::PasteProcess(template)) => {
                Self::paste_process(ws, template);
                Flow::Consumed
            }

            // ── Selected1 ────────────────────────────────────────────
            (MoveState::Selected1, Event::MouseMove) => {
                self.change_state(ws, MoveState::Move);
                Flow::Redispatch
            }
            (MoveState::Selected1, Event::MouseUp) => {
                self.change_state(ws, MoveState::Selected2);
                Flow::Consumed
            }
            (MoveState::Selected1, Event::MouseDown) => Flow::Consumed,

            // ── Move ─────────────────────────────────────────────────
            (MoveState::Move, Event::MouseMove) => {
                Self::drag(ws);
                Flow::Consumed
            }
            (MoveState::Move, Event::MouseUp) => {
                self.change_state(ws, MoveState::Selected1);
                Flow::Redispatch
            }
            (MoveState::Move, Event::MouseDown) => {
                self.change_state(ws, MoveState::Selected1);
                Flow::Consumed
            }

            // ── Selected2 ────────────────────────────────────────────
            (MoveState::Selected2, Event::MouseDown) => {
                let current = ws.selection.single();
                if current.is_some() && ws.hit_test() == current {
                    ws.view.press();
                    self.change_state(ws, MoveState::Selected3);
                    Flow::Consumed
                } else {
                    self.change_state(ws, MoveState::Ready);
                    Flow::Redispatch
                }
            }
            (MoveState::Selected2, Event::KeyDown(key)) if key.is_delete() => {
                self.delete(ws);
                Flow::Consumed
            }
            (MoveState::Selected2, Event::Delete) => {
                self.delete(ws);
                Flow::Consumed
            }
            (MoveState::Selected2, Event::CopySelected) => {
                Self::copy_selected(ws);
                Flow::Consumed
            }
            (MoveState::Selected2, Event::NewDevice(_) | Event::PasteDevice(_)) => {
                self.change_state(ws, MoveState::Ready);
                Flow::Redispatch
            }

            // ── Selected3 ────────────────────────────────────────────
            (MoveState::Selected3, Event::MouseUp) => {
                if let Some(target) = ws.selection.single() {
                    ws.open_context_menu(target);
                    self.change_state(ws, MoveState::ContextMenu);
                } else {
                    self.change_state(ws, MoveState::Ready);
                }
                Flow::Consumed
            }
            (MoveState::Selected3, Event::MouseMove) => {
                self.change_state(ws, MoveState::Move);
                Flow::Redispatch
            }

            // ── ContextMenu ──────────────────────────────────────────
            (MoveState::ContextMenu, Event::LabelEdit) => {
                self.change_state(ws, MoveState::EditLabel);
                Flow::Consumed
            }
            (MoveState::ContextMenu, Event::Delete) => {
                self.delete(ws);
                Flow::Consumed
            }
            (MoveState::ContextMenu, Event::MouseDown) => {
                self.change_state(ws, MoveState::Ready);
                Flow::Consumed
            }

            // ── EditLabel ────────────────────────────────────────────
            (MoveState::EditLabel, Event::KeyDown(key)) => {
                if key.is_enter() {
                    self.change_state(ws, MoveState::Selected2);
                } else if let Some(item) = self.editing {
                    ws.type_into_label(item, key);
                }
                Flow::Consumed
            }
            (MoveState::EditLabel, Event::MouseDown) => {
                self.change_state(ws, MoveState::Ready);
                Flow::Redispatch
            }

            // ── Placing ──────────────────────────────────────────────
            (MoveState::Placing, Event::MouseMove) => {
                self.change_state(ws, MoveState::Move);
                Flow::Redispatch
            }
            (MoveState::Placing, Event::MouseDown) => {
                self.change_state(ws, MoveState::Selected1);
                Flow::Consumed
            }

            _ => Flow::Forward,
        };
        Ok(flow)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;
    use crate::event::Key;
    use crate::message::Envelope;
    use crate::workspace::Effect;
    use pretty_assertions::assert_eq;

    fn handle(c: &mut MoveController, ws: &mut Workspace, event: &Event) -> Flow {
        loop {
            let flow = c.handle(ws, event).unwrap();
            if flow != Flow::Redispatch {
                return flow;
            }
        }
    }

    fn ready() -> (MoveController, Workspace) {
        let mut ws = Workspace::new(EditorConfig::default());
        ws.set_client_id(7);
        let mut c = MoveController::new();
        c.start(&mut ws);
        handle(&mut c, &mut ws, &Event::Enable);
        (c, ws)
    }

    fn sent(ws: &mut Workspace) -> Vec<&'static str> {
        ws.outbox.take_control().iter().map(Envelope::name).collect()
    }

    fn place_switch(c: &mut MoveController, ws: &mut Workspace, x: f64, y: f64) -> u64 {
        ws.view.pointer(x, y);
        handle(c, ws, &Event::NewDevice(DeviceType::Switch));
        handle(c, ws, &Event::MouseDown);
        handle(c, ws, &Event::MouseUp);
        handle(c, ws, &Event::UnselectAll);
        ws.doc.seqs.device
    }

    #[test]
    fn new_device_is_named_after_its_type_and_follows_the_pointer() {
        let (mut c, mut ws) = ready();
        ws.view.pointer(100.0, 100.0);
        handle(&mut c, &mut ws, &Event::NewDevice(DeviceType::Router));
        assert_eq!(c.state(), MoveState::Placing);
        assert_eq!(ws.doc.device(1).unwrap().name, "Router1");
        assert_eq!(sent(&mut ws), vec!["DeviceCreate", "DeviceSelected"]);

        ws.view.pointer(150.0, 120.0);
        handle(&mut c, &mut ws, &Event::MouseMove);
        assert_eq!(c.state(), MoveState::Move);
        let d = ws.doc.device(1).unwrap();
        assert!((d.x - 150.0).abs() < 1e-9 && (d.y - 120.0).abs() < 1e-9);
        assert!(d.moving);

        handle(&mut c, &mut ws, &Event::MouseDown);
        handle(&mut c, &mut ws, &Event::MouseUp);
        assert_eq!(c.state(), MoveState::Selected2);
        assert!(!ws.doc.device(1).unwrap().moving);
        assert_eq!(sent(&mut ws), vec!["DeviceMove"]);
        assert!(ws.trace.illegal().is_empty());
    }

    #[test]
    fn drag_sends_previous_coordinates() {
        let (mut c, mut ws) = ready();
        place_switch(&mut c, &mut ws, 100.0, 100.0);
        ws.outbox.take_control();

        ws.view.pointer(100.0, 100.0);
        handle(&mut c, &mut ws, &Event::MouseDown);
        assert_eq!(c.state(), MoveState::Selected1);
        assert_eq!(ws.queues.pop_injected(), Some(Event::DetailsPanel));

        ws.view.pointer(110.0, 90.0);
        handle(&mut c, &mut ws, &Event::MouseMove);
        handle(&mut c, &mut ws, &Event::MouseUp);
        let moves: Vec<DeviceMove> = ws
            .outbox
            .take_control()
            .into_iter()
            .filter_map(|e| match e.message {
                Message::DeviceMove(m) => Some(m),
                _ => None,
            })
            .collect();
        assert_eq!(moves.len(), 1);
        assert!((moves[0].previous_x - 100.0).abs() < 1e-9);
        assert!((moves[0].x - 110.0).abs() < 1e-9);
        assert!((moves[0].y - 90.0).abs() < 1e-9);
    }

    #[test]
    fn a_miss_is_forwarded() {
        let (mut c, mut ws) = ready();
        ws.view.pointer(500.0, 500.0);
        assert_eq!(handle(&mut c, &mut ws, &Event::MouseDown), Flow::Forward);
        assert_eq!(c.state(), MoveState::Ready);
    }

    #[test]
    fn delete_key_in_selected2_destroys_the_selection() {
        let (mut c, mut ws) = ready();
        ws.view.pointer(100.0, 100.0);
        handle(&mut c, &mut ws, &Event::NewDevice(DeviceType::Host));
        handle(&mut c, &mut ws, &Event::MouseDown);
        handle(&mut c, &mut ws, &Event::MouseUp);
        ws.outbox.take_control();

        handle(&mut c, &mut ws, &Event::KeyDown(Key::new("Delete", 46)));
        assert_eq!(c.state(), MoveState::Ready);
        assert!(ws.doc.is_empty());
        assert_eq!(sent(&mut ws), vec!["MultipleMessage"]);
    }

    #[test]
    fn context_menu_rename_sends_each_keystroke() {
        let (mut c, mut ws) = ready();
        let id = place_switch(&mut c, &mut ws, 100.0, 100.0);
        ws.view.pointer(100.0, 100.0);
        handle(&mut c, &mut ws, &Event::MouseDown);
        handle(&mut c, &mut ws, &Event::MouseUp);
        handle(&mut c, &mut ws, &Event::MouseDown);
        assert_eq!(c.state(), MoveState::Selected3);
        handle(&mut c, &mut ws, &Event::MouseUp);
        assert_eq!(c.state(), MoveState::ContextMenu);
        assert!(ws.outbox.take_effects().contains(&Effect::ShowContextMenu { x: 100.0, y: 100.0 }));

        handle(&mut c, &mut ws, &Event::LabelEdit);
        assert_eq!(c.state(), MoveState::EditLabel);
        ws.outbox.take_control();
        handle(&mut c, &mut ws, &Event::KeyDown(Key::new("Backspace", 8)));
        handle(&mut c, &mut ws, &Event::KeyDown(Key::new("9", 57)));
        handle(&mut c, &mut ws, &Event::KeyDown(Key::new("Enter", 13)));
        assert_eq!(c.state(), MoveState::Selected2);
        assert_eq!(ws.doc.device(id).unwrap().name, "Switch9");
        assert_eq!(sent(&mut ws), vec!["DeviceLabelEdit", "DeviceLabelEdit"]);
    }

    #[test]
    fn copy_puts_a_template_in_the_inventory() {
        let (mut c, mut ws) = ready();
        ws.view.pointer(100.0, 100.0);
        handle(&mut c, &mut ws, &Event::NewDevice(DeviceType::Switch));
        handle(&mut c, &mut ws, &Event::MouseDown);
        handle(&mut c, &mut ws, &Event::MouseUp);
        handle(&mut c, &mut ws, &Event::CopySelected);
        let [Template::Device(t)] = ws.toolboxes.inventory.items.as_slice() else {
            panic!("expected one device template");
        };
        assert_eq!(t.name, "Switch1");
        assert!(t.x.abs() < f64::EPSILON);
    }

    #[test]
    fn paste_device_creates_one_batch_and_selects_it() {
        let (mut c, mut ws) = ready();
        let mut template = DeviceTemplate::new("spine1", DeviceType::Switch);
        template.interfaces.push(crate::model::InterfaceRecord {
            id: 3,
            name: "swp3".into(),
        });
        ws.view.pointer(200.0, 200.0);
        handle(&mut c, &mut ws, &Event::PasteDevice(template));
        assert_eq!(c.state(), MoveState::Selected2);
        let d = ws.doc.device(1).unwrap();
        assert_eq!(d.name, "spine1");
        assert_eq!(d.interfaces.len(), 1);
        assert_eq!(sent(&mut ws), vec!["MultipleMessage", "DeviceSelected"]);
    }

    #[test]
    fn paste_process_lands_on_the_device_under_the_pointer() {
        let (mut c, mut ws) = ready();
        let id = place_switch(&mut c, &mut ws, 100.0, 100.0);
        ws.outbox.take_control();
        ws.view.pointer(105.0, 100.0);
        handle(
            &mut c,
            &mut ws,
            &Event::PasteProcess(ProcessTemplate {
                name: "nginx".into(),
                process_type: "web".into(),
            }),
        );
        assert_eq!(ws.doc.device(id).unwrap().processes.len(), 1);
        assert_eq!(sent(&mut ws), vec!["ProcessCreate"]);
    }

    #[test]
    fn disabled_controller_forwards_and_rejects_double_enable() {
        let (mut c, mut ws) = ready();
        assert_eq!(handle(&mut c, &mut ws, &Event::Enable), Flow::Consumed);
        assert_eq!(c.state(), MoveState::Ready);
        handle(&mut c, &mut ws, &Event::Disable);
        assert_eq!(c.state(), MoveState::Disable);
        ws.view.pointer(100.0, 100.0);
        assert_eq!(
            handle(&mut c, &mut ws, &Event::NewDevice(DeviceType::Router)),
            Flow::Forward
        );
        assert!(ws.doc.is_empty());
    }
}
