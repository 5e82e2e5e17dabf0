// ── Palette drag-and-drop ──
//
// One controller per palette. Hit-testing is in screen space; a drop
// outside the palette turns the picked template into a paste command
// for the editing stages.

use tracing::debug;

use super::pairing_violation;
use crate::error::CoreError;
use crate::event::Event;
use crate::fsm::{Fsm, Machine, StateId};
use crate::model::{Template, ToolboxKind};
use crate::pipeline::{Controller, Flow, Stage};
use crate::states;
use crate::workspace::Workspace;

states! {
    pub enum ToolboxState {
        Start => [Disabled],
        Disabled => [Ready, OffScreen2],
        Ready => [Selecting, Scrolling, OffScreen, Disabled],
        Selecting => [Selected, Ready, OffScreen, Disabled],
        Selected => [Move, Ready, OffScreen, Disabled],
        Move => [Dropping, OffScreen, Disabled],
        Dropping => [Ready, OffScreen, Disabled],
        Scrolling => [Ready, OffScreen, Disabled],
        OffScreen => [Ready, OffScreen2],
        OffScreen2 => [OffScreen, Disabled],
    }
}

impl ToolboxState {
    /// Shown and accepting input.
    fn is_active(self) -> bool {
        matches!(
            self,
            Self::Ready | Self::Selecting | Self::Selected | Self::Move | Self::Dropping | Self::Scrolling
        )
    }
}

/// The paste command for a template dropped from `kind`.
fn drop_event(kind: ToolboxKind, template: Template) -> Option<Event> {
    match (kind, template) {
        (ToolboxKind::Inventory, Template::Device(d)) => Some(Event::PasteDevice(d)),
        (ToolboxKind::App, Template::Process(p)) => Some(Event::PasteProcess(p)),
        (ToolboxKind::Rack, Template::Group(g)) => Some(Event::PasteRack(g)),
        (ToolboxKind::Site, Template::Group(g)) => Some(Event::PasteSite(g)),
        _ => None,
    }
}

#[derive(Debug)]
pub struct ToolboxController {
    kind: ToolboxKind,
    machine: Machine<ToolboxState>,
}

impl ToolboxController {
    pub fn new(kind: ToolboxKind) -> Self {
        let name = match kind {
            ToolboxKind::Site => "site_toolbox_fsm",
            ToolboxKind::Rack => "rack_toolbox_fsm",
            ToolboxKind::Inventory => "inventory_toolbox_fsm",
            ToolboxKind::App => "app_toolbox_fsm",
        };
        Self {
            kind,
            machine: Machine::new(name, ToolboxState::Start),
        }
    }

    fn pointer_inside(&self, ws: &Workspace) -> bool {
        ws.toolboxes
            .get(self.kind)
            .contains(ws.view.mouse_x, ws.view.mouse_y)
    }

    fn drop_selected(&self, ws: &mut Workspace) {
        let toolbox = ws.toolboxes.get_mut(self.kind);
        let template = if toolbox.remove_on_drop {
            toolbox.take_selected()
        } else {
            let t = toolbox.selected().cloned();
            toolbox.selected_item = None;
            t
        };
        let Some(template) = template else {
            return;
        };
        let name = template.name().to_owned();
        match drop_event(self.kind, template) {
            Some(event) => {
                debug!(toolbox = self.kind.wire_name(), item = %name, "dropped");
                ws.queues.inject(event);
            }
            None => debug!(toolbox = self.kind.wire_name(), item = %name, "template does not fit this palette"),
        }
    }

    fn on_lattice(&mut self, ws: &mut Workspace, event: &Event) -> Option<Flow> {
        let state = self.state();
        let next = match (state, event) {
            (ToolboxState::Disabled, Event::Enable) => ToolboxState::Ready,
            (ToolboxState::OffScreen2, Event::Enable) => ToolboxState::OffScreen,
            (ToolboxState::OffScreen, Event::Disable) => ToolboxState::OffScreen2,
            (s, Event::Disable) if s.is_active() => ToolboxState::Disabled,
            (_, Event::Enable | Event::Disable) => {
                return Some(pairing_violation(self.machine.name(), state.name(), event));
            }
            (ToolboxState::OffScreen, Event::ToggleToolbox) => ToolboxState::Ready,
            (ToolboxState::OffScreen2, Event::ToggleToolbox) => ToolboxState::Disabled,
            (ToolboxState::Disabled, Event::ToggleToolbox) => ToolboxState::OffScreen2,
            (s, Event::ToggleToolbox) if s.is_active() => ToolboxState::OffScreen,
            _ => return None,
        };
        if !next.is_active() {
            ws.toolboxes.get_mut(self.kind).selected_item = None;
        }
        self.change_state(ws, next);
        Some(if matches!(event, Event::ToggleToolbox) {
            Flow::Forward
        } else {
            Flow::Consumed
        })
    }
}

impl Fsm for ToolboxController {
    type State = ToolboxState;
    type Context = Workspace;

    fn machine(&self) -> &Machine<ToolboxState> {
        &self.machine
    }

    fn machine_mut(&mut self) -> &mut Machine<ToolboxState> {
        &mut self.machine
    }

    fn on_start(&mut self, ws: &mut Workspace, state: ToolboxState) {
        ws.toolboxes.get_mut(self.kind).enabled = state.is_active();
    }
}

impl Controller for ToolboxController {
    fn stage(&self) -> Stage {
        match self.kind {
            ToolboxKind::Site => Stage::SiteToolbox,
            ToolboxKind::Rack => Stage::RackToolbox,
            ToolboxKind::Inventory => Stage::InventoryToolbox,
            ToolboxKind::App => Stage::AppToolbox,
        }
    }

    fn state_name(&self) -> &'static str {
        self.state().name()
    }

    fn reset(&mut self) {
        self.machine.reset();
    }

    fn start(&mut self, ws: &mut Workspace) {
        self.change_state(ws, ToolboxState::Disabled);
    }

    fn handle(&mut self, ws: &mut Workspace, event: &Event) -> Result<Flow, CoreError> {
        if let Some(flow) = self.on_lattice(ws, event) {
            return Ok(flow);
        }

        let flow = match (self.state(), event) {
            (ToolboxState::Ready, Event::MouseDown) if self.pointer_inside(ws) => {
                self.change_state(ws, ToolboxState::Selecting);
                Flow::Redispatch
            }
            (ToolboxState::Ready, Event::MouseWheel(_)) if self.pointer_inside(ws) => {
                self.change_state(ws, ToolboxState::Scrolling);
                Flow::Redispatch
            }
            (ToolboxState::Selecting, Event::MouseDown) => {
                let toolbox = ws.toolboxes.get_mut(self.kind);
                toolbox.selected_item = toolbox.item_index_at(ws.view.mouse_y);
                if toolbox.selected_item.is_some() {
                    self.change_state(ws, ToolboxState::Selected);
                } else {
                    self.change_state(ws, ToolboxState::Ready);
                }
                Flow::Consumed
            }
            (ToolboxState::Selected, Event::MouseMove) => {
                self.change_state(ws, ToolboxState::Move);
                Flow::Consumed
            }
            (ToolboxState::Selected, Event::MouseUp) => {
                ws.toolboxes.get_mut(self.kind).selected_item = None;
                self.change_state(ws, ToolboxState::Ready);
                Flow::Consumed
            }
            (ToolboxState::Move, Event::MouseMove) => Flow::Consumed,
            (ToolboxState::Move, Event::MouseUp) => {
                self.change_state(ws, ToolboxState::Dropping);
                Flow::Redispatch
            }
            (ToolboxState::Dropping, Event::MouseUp) => {
                if self.pointer_inside(ws) {
                    ws.toolboxes.get_mut(self.kind).selected_item = None;
                } else {
                    self.drop_selected(ws);
                }
                self.change_state(ws, ToolboxState::Ready);
                Flow::Consumed
            }
            (ToolboxState::Scrolling, Event::MouseWheel(wheel)) => {
                ws.toolboxes.get_mut(self.kind).scroll(wheel.delta);
                self.change_state(ws, ToolboxState::Ready);
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
    use crate::model::toolbox::TOOLBOX_TITLE_HEIGHT;
    use crate::model::{DeviceTemplate, DeviceType};

    fn settle(c: &mut ToolboxController, ws: &mut Workspace, event: &Event) -> Flow {
        loop {
            let flow = c.handle(ws, event).unwrap();
            if flow != Flow::Redispatch {
                return flow;
            }
        }
    }

    fn inventory() -> (ToolboxController, Workspace) {
        let mut ws = Workspace::new(EditorConfig::default());
        ws.toolboxes.inventory.items = vec![
            Template::Device(DeviceTemplate::new("leaf1", DeviceType::Switch)),
            Template::Device(DeviceTemplate::new("leaf2", DeviceType::Switch)),
        ];
        let mut c = ToolboxController::new(ToolboxKind::Inventory);
        c.start(&mut ws);
        settle(&mut c, &mut ws, &Event::Enable);
        (c, ws)
    }

    #[test]
    fn lattice_walks_all_four_corners() {
        let (mut c, mut ws) = inventory();
        assert_eq!(c.state(), ToolboxState::Ready);
        assert!(ws.toolboxes.inventory.enabled);

        assert_eq!(settle(&mut c, &mut ws, &Event::ToggleToolbox), Flow::Forward);
        assert_eq!(c.state(), ToolboxState::OffScreen);
        settle(&mut c, &mut ws, &Event::Disable);
        assert_eq!(c.state(), ToolboxState::OffScreen2);
        settle(&mut c, &mut ws, &Event::ToggleToolbox);
        assert_eq!(c.state(), ToolboxState::Disabled);
        settle(&mut c, &mut ws, &Event::Enable);
        assert_eq!(c.state(), ToolboxState::Ready);
        assert!(ws.trace.illegal().is_empty());
    }

    #[test]
    fn double_enable_is_ignored() {
        let (mut c, mut ws) = inventory();
        assert_eq!(settle(&mut c, &mut ws, &Event::Enable), Flow::Consumed);
        assert_eq!(c.state(), ToolboxState::Ready);
    }

    #[test]
    fn drag_out_injects_paste_and_removes_the_item() {
        let (mut c, mut ws) = inventory();
        let top = ws.toolboxes.inventory.y + TOOLBOX_TITLE_HEIGHT;
        ws.view.pointer(50.0, top + 160.0);
        assert_eq!(settle(&mut c, &mut ws, &Event::MouseDown), Flow::Consumed);
        assert_eq!(c.state(), ToolboxState::Selected);

        ws.view.pointer(600.0, 300.0);
        settle(&mut c, &mut ws, &Event::MouseMove);
        settle(&mut c, &mut ws, &Event::MouseUp);
        assert_eq!(c.state(), ToolboxState::Ready);

        let Some(Event::PasteDevice(t)) = ws.queues.pop_injected() else {
            panic!("expected a paste");
        };
        assert_eq!(t.name, "leaf2");
        assert_eq!(ws.toolboxes.inventory.items.len(), 1);
    }

    #[test]
    fn dropping_back_inside_is_a_no_op() {
        let (mut c, mut ws) = inventory();
        let top = ws.toolboxes.inventory.y + TOOLBOX_TITLE_HEIGHT;
        ws.view.pointer(50.0, top + 10.0);
        settle(&mut c, &mut ws, &Event::MouseDown);
        ws.view.pointer(60.0, top + 20.0);
        settle(&mut c, &mut ws, &Event::MouseMove);
        settle(&mut c, &mut ws, &Event::MouseUp);
        assert_eq!(ws.queues.pop_injected(), None);
        assert_eq!(ws.toolboxes.inventory.items.len(), 2);
    }

    #[test]
    fn clicks_outside_are_forwarded() {
        let (mut c, mut ws) = inventory();
        ws.view.pointer(600.0, 300.0);
        assert_eq!(settle(&mut c, &mut ws, &Event::MouseDown), Flow::Forward);
    }
}
