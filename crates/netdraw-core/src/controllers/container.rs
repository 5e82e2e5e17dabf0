// ── Racks and sites ──
//
// Containers are picked by clicking anywhere inside them and drag their
// contents along. One controller per container type.

use tracing::debug;

use super::enable_disable;
use super::group::{take_drag_delta, translate_group};
use crate::error::CoreError;
use crate::event::Event;
use crate::fsm::{Fsm, Machine, StateId};
use crate::message::{CopySite, DeviceMove, Message};
use crate::model::{GroupTemplate, GroupType, Template, ToolboxKind};
use crate::pipeline::{Controller, Flow, Stage};
use crate::states;
use crate::workspace::{Item, Workspace};

states! {
    pub enum ContainerState {
        Start => [Disable, Ready],
        Disable => [Ready],
        Ready => [Disable, Selected1, Selected2],
        Selected1 => [Disable, Ready, Move, Selected2],
        Selected2 => [Disable, Ready, Selected3],
        Selected3 => [Disable, Ready, ContextMenu, Move],
        Move => [Disable, Ready, Selected1, Selected2],
        EditLabel => [Disable, Ready, Selected2],
        ContextMenu => [Disable, Ready, EditLabel],
    }
}

#[derive(Debug)]
pub struct ContainerController {
    group_type: GroupType,
    machine: Machine<ContainerState>,
}

impl ContainerController {
    pub fn new(group_type: GroupType) -> Self {
        let name = match group_type {
            GroupType::Site => "site_fsm",
            GroupType::Rack | GroupType::Group => "rack_fsm",
        };
        Self {
            group_type,
            machine: Machine::new(name, ContainerState::Start),
        }
    }

    fn container_at_pointer(&self, ws: &Workspace) -> Option<u64> {
        ws.doc
            .group_containing(ws.view.scaled_x, ws.view.scaled_y, self.group_type)
    }

    fn selected(&self, ws: &Workspace) -> Option<u64> {
        ws.selection
            .groups()
            .find(|id| ws.doc.group(*id).is_some_and(|g| g.group_type == self.group_type))
    }

    fn toolbox(&self) -> ToolboxKind {
        match self.group_type {
            GroupType::Site => ToolboxKind::Site,
            GroupType::Rack | GroupType::Group => ToolboxKind::Rack,
        }
    }

    fn paste(&mut self, ws: &mut Workspace, template: &GroupTemplate) {
        ws.view.press();
        ws.clear_selections();
        let (id, parts) = ws.doc.paste_group(template, ws.view.scaled());
        debug!(group = id, parts = parts.len(), kind = %self.group_type, "pasted container");
        ws.send_control_message(Message::batch(parts));
        ws.select(Item::Group(id));
        self.change_state(ws, ContainerState::Selected2);
    }

    /// Move the selected container, its nested groups and its devices
    /// as one batch.
    fn drag(&self, ws: &mut Workspace) {
        let Some((dx, dy)) = take_drag_delta(ws) else {
            return;
        };
        let Some(id) = self.selected(ws) else {
            return;
        };
        let Some((nested, devices)) = ws.doc.group(id).map(|g| (g.groups.clone(), g.devices.clone())) else {
            return;
        };

        let mut parts = Vec::new();
        for gid in std::iter::once(id).chain(nested) {
            if let Some(m) = translate_group(ws, gid, dx, dy) {
                parts.push(Message::GroupMove(m));
            }
        }
        for did in devices {
            let Some((previous_x, previous_y)) = ws.doc.device(did).map(|d| (d.x, d.y)) else {
                continue;
            };
            let (x, y) = (previous_x + dx, previous_y + dy);
            ws.doc.move_device(did, x, y);
            parts.push(Message::DeviceMove(DeviceMove {
                id: did,
                x,
                y,
                previous_x,
                previous_y,
            }));
        }
        ws.send_control_message(Message::batch(parts));
        ws.broadcast_membership();
    }

    fn copy_selected(&self, ws: &mut Workspace) {
        let Some(template) = self.selected(ws).and_then(|id| ws.doc.group_template(id)) else {
            return;
        };
        if self.group_type == GroupType::Site {
            ws.send_control_message(Message::CopySite(CopySite {
                site: template.clone(),
            }));
        }
        ws.toolboxes
            .get_mut(self.toolbox())
            .items
            .push(Template::Group(template));
    }

    fn delete(&mut self, ws: &mut Workspace) {
        if !ws.delete_selected_groups() {
            debug!(kind = %self.group_type, "nothing to delete");
        }
        self.change_state(ws, ContainerState::Ready);
    }

    fn is_paste(&self, event: &Event) -> bool {
        match event {
            Event::PasteRack(_) => self.group_type == GroupType::Rack,
            Event::PasteSite(_) => self.group_type == GroupType::Site,
            _ => false,
        }
    }
}

impl Fsm for ContainerController {
    type State = ContainerState;
    type Context = Workspace;

    fn machine(&self) -> &Machine<ContainerState> {
        &self.machine
    }

    fn machine_mut(&mut self) -> &mut Machine<ContainerState> {
        &mut self.machine
    }

    fn on_end(&mut self, ws: &mut Workspace, state: ContainerState) {
        if state == ContainerState::ContextMenu {
            ws.close_context_menu();
        }
    }
}

impl Controller for ContainerController {
    fn stage(&self) -> Stage {
        match self.group_type {
            GroupType::Site => Stage::Site,
            GroupType::Rack | GroupType::Group => Stage::Rack,
        }
    }

    fn state_name(&self) -> &'static str {
        self.state().name()
    }

    fn reset(&mut self) {
        self.machine.reset();
    }

    fn start(&mut self, ws: &mut Workspace) {
        self.change_state(ws, ContainerState::Disable);
    }

    fn handle(&mut self, ws: &mut Workspace, event: &Event) -> Result<Flow, CoreError> {
        if let Some(flow) = enable_disable(self, ws, event, ContainerState::Disable, ContainerState::Ready) {
            return Ok(flow);
        }
        if matches!(event, Event::UnselectAll) {
            ws.clear_selections();
            if self.state() != ContainerState::Ready {
                self.change_state(ws, ContainerState::Ready);
            }
            return Ok(Flow::Forward);
        }

        let flow = match (self.state(), event) {
            (ContainerState::Ready, Event::MouseDown) => {
                ws.view.press();
                if let Some(id) = self.container_at_pointer(ws) {
                    ws.clear_selections();
                    ws.select(Item::Group(id));
                    self.change_state(ws, ContainerState::Selected1);
                    Flow::Consumed
                } else {
                    Flow::Forward
                }
            }
            (ContainerState::Ready, Event::PasteRack(template) | Event::PasteSite(template))
                if self.is_paste(event) =>
            {
                self.paste(ws, template);
                Flow::Consumed
            }

            (ContainerState::Selected1, Event::MouseMove) => {
                self.change_state(ws, ContainerState::Move);
                Flow::Redispatch
            }
            (ContainerState::Selected1, Event::MouseUp) => {
                self.change_state(ws, ContainerState::Selected2);
                Flow::Consumed
            }
            (ContainerState::Selected1, Event::MouseDown) => Flow::Consumed,

            (ContainerState::Move, Event::MouseMove) => {
                self.drag(ws);
                Flow::Consumed
            }
            (ContainerState::Move, Event::MouseUp) => {
                self.change_state(ws, ContainerState::Selected2);
                Flow::Consumed
            }
            (ContainerState::Move, Event::MouseDown) => {
                self.change_state(ws, ContainerState::Selected1);
                Flow::Consumed
            }

            (ContainerState::Selected2, Event::MouseDown) => {
                ws.view.press();
                let hit = self.container_at_pointer(ws);
                if hit.is_some() && hit == self.selected(ws) {
                    self.change_state(ws, ContainerState::Selected3);
                    Flow::Consumed
                } else {
                    self.change_state(ws, ContainerState::Ready);
                    Flow::Redispatch
                }
            }
            (ContainerState::Selected2, Event::CopySelected) => {
                self.copy_selected(ws);
                Flow::Consumed
            }
            (ContainerState::Selected2, Event::KeyDown(key)) if key.is_delete() => {
                self.delete(ws);
                Flow::Consumed
            }
            (ContainerState::Selected2, Event::Delete) => {
                self.delete(ws);
                Flow::Consumed
            }
            (ContainerState::Selected2, _) if self.is_paste(event) => {
                self.change_state(ws, ContainerState::Ready);
                Flow::Redispatch
            }

            (ContainerState::Selected3, Event::MouseUp) => {
                if let Some(id) = self.selected(ws) {
                    ws.open_context_menu(Item::Group(id));
                    self.change_state(ws, ContainerState::ContextMenu);
                } else {
                    self.change_state(ws, ContainerState::Ready);
                }
                Flow::Consumed
            }
            (ContainerState::Selected3, Event::MouseMove) => {
                self.change_state(ws, ContainerState::Move);
                Flow::Redispatch
            }

            (ContainerState::ContextMenu, Event::LabelEdit) => {
                self.change_state(ws, ContainerState::EditLabel);
                Flow::Consumed
            }
            (ContainerState::ContextMenu, Event::Delete) => {
                self.delete(ws);
                Flow::Consumed
            }
            (ContainerState::ContextMenu, Event::MouseDown) => {
                self.change_state(ws, ContainerState::Ready);
                Flow::Consumed
            }

            (ContainerState::EditLabel, Event::KeyDown(key)) => {
                if key.is_enter() {
                    self.change_state(ws, ContainerState::Selected2);
                } else if let Some(id) = self.selected(ws) {
                    ws.type_into_label(Item::Group(id), key);
                }
                Flow::Consumed
            }
            (ContainerState::EditLabel, Event::MouseDown) => {
                self.change_state(ws, ContainerState::Ready);
                Flow::Redispatch
            }

            _ => Flow::Forward,
        };
        Ok(flow)
    }
}
