// ── Groups: draw, resize, move and rename free-form boxes ──
//
// Groups of every type are picked by their border or a corner. A corner
// press resizes, a border press selects and drags.

use tracing::debug;

use super::{enable_disable, is_escape};
use crate::error::CoreError;
use crate::event::Event;
use crate::fsm::{Fsm, Machine, StateId};
use crate::geometry::Rect;
use crate::message::{GroupCreate, GroupMove, Message};
use crate::model::{Corner, GroupType};
use crate::pipeline::{Controller, Flow, Stage};
use crate::states;
use crate::workspace::{Item, Workspace};

states! {
    pub enum GroupState {
        Start => [Disable, Ready],
        Disable => [Ready],
        Ready => [Disable, Placing, CornerSelected, Selected1],
        Placing => [Disable, Ready, Resize],
        Resize => [Disable, Ready, Selected1],
        CornerSelected => [Disable, Ready, Resize, Selected1],
        Selected1 => [Disable, Ready, Move, Selected2],
        Selected2 => [Disable, Ready, Selected3],
        Selected3 => [Disable, Ready, ContextMenu, Move],
        Move => [Disable, Ready, Selected1, Selected2],
        EditLabel => [Disable, Ready, Selected2],
        ContextMenu => [Disable, Ready, EditLabel],
    }
}

const PICKABLE: [GroupType; 3] = [GroupType::Group, GroupType::Rack, GroupType::Site];

fn group_move(id: u64, from: Rect, to: Rect) -> GroupMove {
    GroupMove {
        id,
        x1: to.x1,
        y1: to.y1,
        x2: to.x2,
        y2: to.y2,
        previous_x1: from.x1,
        previous_y1: from.y1,
        previous_x2: from.x2,
        previous_y2: from.y2,
    }
}

/// Translate group `id` locally and return the move message.
pub(super) fn translate_group(ws: &mut Workspace, id: u64, dx: f64, dy: f64) -> Option<GroupMove> {
    let group = ws.doc.group_mut(id)?;
    let from = group.rect;
    group.rect = from.translate(dx, dy);
    Some(group_move(id, from, group.rect))
}

/// Pointer delta since the press origin, or `None` when unchanged.
/// Advances the origin.
pub(super) fn take_drag_delta(ws: &mut Workspace) -> Option<(f64, f64)> {
    let dx = ws.view.scaled_x - ws.view.pressed_scaled_x;
    let dy = ws.view.scaled_y - ws.view.pressed_scaled_y;
    if dx.abs() < f64::EPSILON && dy.abs() < f64::EPSILON {
        return None;
    }
    ws.view.pressed_scaled_x = ws.view.scaled_x;
    ws.view.pressed_scaled_y = ws.view.scaled_y;
    Some((dx, dy))
}

#[derive(Debug)]
pub struct GroupController {
    machine: Machine<GroupState>,
    /// Type of the group the next press will create.
    placing: Option<GroupType>,
}

impl GroupController {
    pub fn new() -> Self {
        Self {
            machine: Machine::new("group_fsm", GroupState::Start),
            placing: None,
        }
    }

    fn corner_at(ws: &Workspace) -> Option<(u64, Corner)> {
        let (x, y) = (ws.view.scaled_x, ws.view.scaled_y);
        PICKABLE
            .iter()
            .find_map(|kind| ws.doc.group_corner_at(x, y, *kind))
    }

    fn border_at(ws: &Workspace) -> Option<u64> {
        let (x, y) = (ws.view.scaled_x, ws.view.scaled_y);
        PICKABLE
            .iter()
            .find_map(|kind| ws.doc.group_border_at(x, y, *kind))
    }

    fn pick(&mut self, ws: &mut Workspace) -> Flow {
        if ws.flags.hide_groups {
            return Flow::Forward;
        }
        if let Some((id, corner)) = Self::corner_at(ws) {
            ws.clear_selections();
            ws.select(Item::Group(id));
            if let Some(g) = ws.doc.group_mut(id) {
                g.corner = Some(corner);
            }
            ws.view.press();
            self.change_state(ws, GroupState::CornerSelected);
            return Flow::Consumed;
        }
        if let Some(id) = Self::border_at(ws) {
            ws.clear_selections();
            ws.select(Item::Group(id));
            ws.view.press();
            self.change_state(ws, GroupState::Selected1);
            return Flow::Consumed;
        }
        Flow::Forward
    }

    fn create(&mut self, ws: &mut Workspace, group_type: GroupType) {
        ws.view.press();
        ws.clear_selections();
        let id = ws.doc.seqs.next_group();
        let (x, y) = (ws.view.scaled_x, ws.view.scaled_y);
        let create = Message::GroupCreate(GroupCreate {
            id,
            name: format!("{}{id}", group_type.title()),
            group_type,
            x1: x,
            y1: y,
            x2: x,
            y2: y,
        });
        ws.doc.apply_quiet(&create);
        ws.send_control_message(create);
        ws.select(Item::Group(id));
        if let Some(g) = ws.doc.group_mut(id) {
            g.corner = Some(Corner::BottomRight);
        }
        self.change_state(ws, GroupState::Resize);
    }

    fn resize(ws: &mut Workspace) {
        let Some((dx, dy)) = take_drag_delta(ws) else {
            return;
        };
        let groups: Vec<u64> = ws.selection.groups().collect();
        for id in groups {
            let Some(group) = ws.doc.group_mut(id) else {
                continue;
            };
            let Some(corner) = group.corner else {
                continue;
            };
            let from = group.rect;
            group.drag_corner(corner, dx, dy);
            let m = group_move(id, from, group.rect);
            ws.send_control_message(Message::GroupMove(m));
        }
        ws.broadcast_membership();
    }

    fn drag(ws: &mut Workspace) {
        let Some((dx, dy)) = take_drag_delta(ws) else {
            return;
        };
        let groups: Vec<u64> = ws.selection.groups().collect();
        for id in groups {
            if let Some(m) = translate_group(ws, id, dx, dy) {
                ws.send_control_message(Message::GroupMove(m));
            }
        }
        ws.broadcast_membership();
    }

    fn delete(&mut self, ws: &mut Workspace) {
        if !ws.delete_selected_groups() {
            debug!("no group selected to delete");
        }
        self.change_state(ws, GroupState::Ready);
    }

    fn selected_group(ws: &Workspace) -> Option<u64> {
        ws.selection.groups().next()
    }
}

impl Default for GroupController {
    fn default() -> Self {
        Self::new()
    }
}

impl Fsm for GroupController {
    type State = GroupState;
    type Context = Workspace;

    fn machine(&self) -> &Machine<GroupState> {
        &self.machine
    }

    fn machine_mut(&mut self) -> &mut Machine<GroupState> {
        &mut self.machine
    }

    fn on_end(&mut self, ws: &mut Workspace, state: GroupState) {
        match state {
            GroupState::Placing => self.placing = None,
            GroupState::Resize => {
                for id in ws.selection.groups().collect::<Vec<_>>() {
                    if let Some(g) = ws.doc.group_mut(id) {
                        g.corner = None;
                    }
                }
            }
            GroupState::ContextMenu => ws.close_context_menu(),
            _ => {}
        }
    }
}

impl Controller for GroupController {
    fn stage(&self) -> Stage {
        Stage::Group
    }

    fn state_name(&self) -> &'static str {
        self.state().name()
    }

    fn reset(&mut self) {
        self.machine.reset();
        self.placing = None;
    }

    fn start(&mut self, ws: &mut Workspace) {
        self.change_state(ws, GroupState::Disable);
    }

    fn handle(&mut self, ws: &mut Workspace, event: &Event) -> Result<Flow, CoreError> {
        if let Some(flow) = enable_disable(self, ws, event, GroupState::Disable, GroupState::Ready) {
            return Ok(flow);
        }
        if matches!(event, Event::UnselectAll) {
            ws.clear_selections();
            if self.state() != GroupState::Ready {
                self.change_state(ws, GroupState::Ready);
            }
            return Ok(Flow::Forward);
        }

        let flow = match (self.state(), event) {
            (GroupState::Ready, Event::MouseDown) => self.pick(ws),
            (GroupState::Ready, Event::NewGroup(group_type)) => {
                ws.flags.hide_groups = false;
                self.change_state(ws, GroupState::Placing);
                self.placing = Some(*group_type);
                Flow::Consumed
            }

            (GroupState::Placing, Event::MouseDown) => {
                let group_type = self.placing.unwrap_or_default();
                self.create(ws, group_type);
                Flow::Consumed
            }
            (GroupState::Placing, _) if is_escape(event) => {
                self.change_state(ws, GroupState::Ready);
                Flow::Consumed
            }

            (GroupState::CornerSelected, Event::MouseMove) => {
                self.change_state(ws, GroupState::Resize);
                Flow::Redispatch
            }
            (GroupState::CornerSelected, Event::MouseUp) => {
                self.change_state(ws, GroupState::Selected1);
                Flow::Redispatch
            }

            (GroupState::Resize, Event::MouseMove) => {
                Self::resize(ws);
                Flow::Consumed
            }
            (GroupState::Resize, Event::MouseUp) => {
                self.change_state(ws, GroupState::Selected1);
                Flow::Redispatch
            }

            (GroupState::Selected1, Event::MouseMove) => {
                self.change_state(ws, GroupState::Move);
                Flow::Redispatch
            }
            (GroupState::Selected1, Event::MouseUp) => {
                self.change_state(ws, GroupState::Selected2);
                Flow::Consumed
            }
            (GroupState::Selected1, Event::MouseDown) => Flow::Consumed,

            (GroupState::Move, Event::MouseMove) => {
                Self::drag(ws);
                Flow::Consumed
            }
            (GroupState::Move, Event::MouseUp) => {
                self.change_state(ws, GroupState::Selected2);
                Flow::Consumed
            }
            (GroupState::Move, Event::MouseDown) => {
                self.change_state(ws, GroupState::Selected1);
                Flow::Consumed
            }

            (GroupState::Selected2, Event::MouseDown) => {
                ws.view.press();
                let border = Self::border_at(ws);
                let on_selected = Self::corner_at(ws).is_none()
                    && border.is_some_and(|id| ws.selection.contains(Item::Group(id)));
                if on_selected {
                    self.change_state(ws, GroupState::Selected3);
                    Flow::Consumed
                } else {
                    self.change_state(ws, GroupState::Ready);
                    Flow::Redispatch
                }
            }
            (GroupState::Selected2, Event::KeyDown(key)) if key.is_delete() => {
                self.delete(ws);
                Flow::Consumed
            }
            (GroupState::Selected2, Event::Delete) => {
                self.delete(ws);
                Flow::Consumed
            }
            (GroupState::Selected2, Event::NewGroup(_)) => {
                self.change_state(ws, GroupState::Ready);
                Flow::Redispatch
            }

            (GroupState::Selected3, Event::MouseUp) => {
                if let Some(id) = Self::selected_group(ws) {
                    ws.open_context_menu(Item::Group(id));
                    self.change_state(ws, GroupState::ContextMenu);
                } else {
                    self.change_state(ws, GroupState::Ready);
                }
                Flow::Consumed
            }
            (GroupState::Selected3, Event::MouseMove) => {
                self.change_state(ws, GroupState::Move);
                Flow::Redispatch
            }

            (GroupState::ContextMenu, Event::LabelEdit) => {
                self.change_state(ws, GroupState::EditLabel);
                Flow::Consumed
            }
            (GroupState::ContextMenu, Event::Delete) => {
                self.delete(ws);
                Flow::Consumed
            }
            (GroupState::ContextMenu, Event::MouseDown) => {
                self.change_state(ws, GroupState::Ready);
                Flow::Consumed
            }

            (GroupState::EditLabel, Event::KeyDown(key)) => {
                if key.is_enter() {
                    self.change_state(ws, GroupState::Selected2);
                } else if let Some(id) = Self::selected_group(ws) {
                    ws.type_into_label(Item::Group(id), key);
                }
                Flow::Consumed
            }
            (GroupState::EditLabel, Event::MouseDown) => {
                self.change_state(ws, GroupState::Ready);
                Flow::Redispatch
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
    use crate::message::{DeviceCreate, Envelope};
    use crate::model::DeviceType;
    use pretty_assertions::assert_eq;

    fn handle(c: &mut GroupController, ws: &mut Workspace, event: &Event) -> Flow {
        loop {
            let flow = c.handle(ws, event).unwrap();
            if flow != Flow::Redispatch {
                return flow;
            }
        }
    }

    fn ready() -> (GroupController, Workspace) {
        let mut ws = Workspace::new(EditorConfig::default());
        ws.set_client_id(3);
        let mut c = GroupController::new();
        c.start(&mut ws);
        handle(&mut c, &mut ws, &Event::Enable);
        (c, ws)
    }

    fn sent(ws: &mut Workspace) -> Vec<&'static str> {
        ws.outbox.take_control().iter().map(Envelope::name).collect()
    }

    /// Draw a group from `(x1, y1)` to `(x2, y2)` and release it.
    fn draw(c: &mut GroupController, ws: &mut Workspace, from: (f64, f64), to: (f64, f64)) -> u64 {
        handle(c, ws, &Event::NewGroup(GroupType::Group));
        ws.view.pointer(from.0, from.1);
        handle(c, ws, &Event::MouseDown);
        ws.view.pointer(to.0, to.1);
        handle(c, ws, &Event::MouseMove);
        handle(c, ws, &Event::MouseUp);
        ws.doc.seqs.group
    }

    #[test]
    fn drawing_creates_and_resizes_from_the_bottom_right() {
        let (mut c, mut ws) = ready();
        ws.doc.apply(&Message::DeviceCreate(DeviceCreate {
            id: 1,
            name: "Switch1".into(),
            x: 150.0,
            y: 150.0,
            device_type: DeviceType::Switch,
            host_id: None,
        }));
        let id = draw(&mut c, &mut ws, (100.0, 100.0), (300.0, 250.0));
        assert_eq!(c.state(), GroupState::Selected2);

        let g = ws.doc.group(id).unwrap();
        assert_eq!(g.name, "Group1");
        assert!((g.rect.x2 - 300.0).abs() < 1e-9);
        assert!((g.rect.y2 - 250.0).abs() < 1e-9);
        assert_eq!(g.devices, vec![1]);
        assert_eq!(g.corner, None);
        assert_eq!(sent(&mut ws), vec!["GroupCreate", "GroupMove", "GroupMembership"]);
        assert!(ws.trace.illegal().is_empty());
    }

    #[test]
    fn border_drag_moves_the_group() {
        let (mut c, mut ws) = ready();
        let id = draw(&mut c, &mut ws, (100.0, 100.0), (300.0, 300.0));
        handle(&mut c, &mut ws, &Event::UnselectAll);
        ws.outbox.take_control();

        ws.view.pointer(200.0, 100.0);
        handle(&mut c, &mut ws, &Event::MouseDown);
        assert_eq!(c.state(), GroupState::Selected1);
        ws.view.pointer(220.0, 110.0);
        handle(&mut c, &mut ws, &Event::MouseMove);
        handle(&mut c, &mut ws, &Event::MouseUp);
        assert_eq!(c.state(), GroupState::Selected2);

        let r = ws.doc.group(id).unwrap().rect;
        assert!((r.x1 - 120.0).abs() < 1e-9 && (r.y1 - 110.0).abs() < 1e-9);
        let Message::GroupMove(m) = &ws.outbox.take_control()[0].message else {
            panic!("expected a group move");
        };
        assert!((m.previous_x1 - 100.0).abs() < 1e-9);
    }

    #[test]
    fn hidden_groups_are_not_picked() {
        let (mut c, mut ws) = ready();
        draw(&mut c, &mut ws, (100.0, 100.0), (300.0, 300.0));
        handle(&mut c, &mut ws, &Event::UnselectAll);
        ws.flags.hide_groups = true;
        ws.view.pointer(200.0, 100.0);
        assert_eq!(handle(&mut c, &mut ws, &Event::MouseDown), Flow::Forward);
    }

    #[test]
    fn delete_key_destroys_the_selected_group() {
        let (mut c, mut ws) = ready();
        let id = draw(&mut c, &mut ws, (100.0, 100.0), (300.0, 300.0));
        ws.outbox.take_control();
        handle(&mut c, &mut ws, &Event::KeyDown(Key::new("Backspace", 8)));
        assert_eq!(c.state(), GroupState::Ready);
        assert!(ws.doc.group(id).is_none());
        assert_eq!(sent(&mut ws), vec!["GroupDestroy"]);
    }

    #[test]
    fn rename_through_the_context_menu() {
        let (mut c, mut ws) = ready();
        let id = draw(&mut c, &mut ws, (100.0, 100.0), (300.0, 300.0));
        ws.view.pointer(100.0, 200.0);
        handle(&mut c, &mut ws, &Event::MouseDown);
        assert_eq!(c.state(), GroupState::Selected3);
        handle(&mut c, &mut ws, &Event::MouseUp);
        assert_eq!(c.state(), GroupState::ContextMenu);
        handle(&mut c, &mut ws, &Event::LabelEdit);
        assert!(ws.context_menu.is_none());
        handle(&mut c, &mut ws, &Event::KeyDown(Key::new("x", 88)));
        handle(&mut c, &mut ws, &Event::KeyDown(Key::new("Enter", 13)));
        assert_eq!(ws.doc.group(id).unwrap().name, "Group1x");
        assert_eq!(c.state(), GroupState::Selected2);
    }

    #[test]
    fn escape_abandons_placing() {
        let (mut c, mut ws) = ready();
        handle(&mut c, &mut ws, &Event::NewGroup(GroupType::Rack));
        handle(&mut c, &mut ws, &Event::KeyDown(Key::new("Escape", 27)));
        assert_eq!(c.state(), GroupState::Ready);
        ws.view.pointer(10.0, 10.0);
        assert_eq!(handle(&mut c, &mut ws, &Event::MouseDown), Flow::Forward);
        assert!(ws.doc.groups().next().is_none());
    }
}
