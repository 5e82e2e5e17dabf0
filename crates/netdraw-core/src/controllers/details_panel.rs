// ── Details panel ──

use tracing::debug;

use crate::error::CoreError;
use crate::event::Event;
use crate::fsm::{Fsm, Machine, StateId};
use crate::pipeline::{Controller, Flow, Stage};
use crate::states;
use crate::workspace::{Effect, Item, Workspace};

/// Width of the panel docked on the right edge, in screen pixels.
pub const PANEL_WIDTH: f64 = 400.0;

states! {
    pub enum DetailsPanelState {
        Start => [Collapsed],
        Collapsed => [Expanded],
        Expanded => [Collapsed],
    }
}

#[derive(Debug)]
pub struct DetailsPanelController {
    machine: Machine<DetailsPanelState>,
}

impl DetailsPanelController {
    pub fn new() -> Self {
        Self {
            machine: Machine::new("details_panel_fsm", DetailsPanelState::Start),
        }
    }

    /// Show the single selected item. Returns `false` when there is none.
    fn show(ws: &mut Workspace) -> bool {
        let Some(target) = ws.selection.single() else {
            debug!(selected = ws.selection.len(), "details need exactly one selected item");
            return false;
        };
        ws.details = Some(target);
        ws.emit(Effect::ShowDetails { target });
        let host_id = match target {
            Item::Device(id) => ws.doc.device(id).and_then(|d| d.host_id),
            _ => None,
        };
        if let Some(host_id) = host_id {
            ws.emit(Effect::FetchHost { host_id });
        }
        true
    }

    fn pointer_in_panel(ws: &Workspace) -> bool {
        ws.view.mouse_x >= ws.view.graph_width - PANEL_WIDTH
    }
}

impl Default for DetailsPanelController {
    fn default() -> Self {
        Self::new()
    }
}

impl Fsm for DetailsPanelController {
    type State = DetailsPanelState;
    type Context = Workspace;

    fn machine(&self) -> &Machine<DetailsPanelState> {
        &self.machine
    }

    fn machine_mut(&mut self) -> &mut Machine<DetailsPanelState> {
        &mut self.machine
    }

    fn on_end(&mut self, ws: &mut Workspace, state: DetailsPanelState) {
        if state == DetailsPanelState::Expanded {
            ws.details = None;
            ws.emit(Effect::HideDetails);
        }
    }
}

impl Controller for DetailsPanelController {
    fn stage(&self) -> Stage {
        Stage::DetailsPanel
    }

    fn state_name(&self) -> &'static str {
        self.state().name()
    }

    fn reset(&mut self) {
        self.machine.reset();
    }

    fn start(&mut self, ws: &mut Workspace) {
        self.change_state(ws, DetailsPanelState::Collapsed);
    }

    fn handle(&mut self, ws: &mut Workspace, event: &Event) -> Result<Flow, CoreError> {
        let flow = match (self.state(), event) {
            (DetailsPanelState::Collapsed, Event::DetailsPanel) => {
                if Self::show(ws) {
                    self.change_state(ws, DetailsPanelState::Expanded);
                }
                Flow::Consumed
            }
            (DetailsPanelState::Expanded, Event::DetailsPanel) => {
                Self::show(ws);
                Flow::Consumed
            }
            (DetailsPanelState::Expanded, Event::DetailsPanelClose) => {
                self.change_state(ws, DetailsPanelState::Collapsed);
                Flow::Consumed
            }
            (DetailsPanelState::Expanded, Event::MouseDown | Event::MouseUp | Event::MouseWheel(_))
                if Self::pointer_in_panel(ws) =>
            {
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
    use crate::message::{DeviceCreate, Message};
    use crate::model::DeviceType;
    use pretty_assertions::assert_eq;

    fn setup(host_id: Option<u64>) -> (DetailsPanelController, Workspace) {
        let mut ws = Workspace::new(EditorConfig::default());
        ws.doc.apply(&Message::DeviceCreate(DeviceCreate {
            id: 1,
            name: "web1".into(),
            x: 0.0,
            y: 0.0,
            device_type: DeviceType::Host,
            host_id,
        }));
        let mut c = DetailsPanelController::new();
        c.start(&mut ws);
        (c, ws)
    }

    #[test]
    fn inventory_hosts_are_fetched() {
        let (mut c, mut ws) = setup(Some(42));
        ws.select(Item::Device(1));
        c.handle(&mut ws, &Event::DetailsPanel).unwrap();
        assert_eq!(c.state(), DetailsPanelState::Expanded);
        assert_eq!(
            ws.outbox.take_effects(),
            vec![
                Effect::ShowDetails {
                    target: Item::Device(1)
                },
                Effect::FetchHost { host_id: 42 },
            ]
        );

        c.handle(&mut ws, &Event::DetailsPanelClose).unwrap();
        assert_eq!(ws.outbox.take_effects(), vec![Effect::HideDetails]);
        assert_eq!(ws.details, None);
    }

    #[test]
    fn nothing_selected_stays_collapsed() {
        let (mut c, mut ws) = setup(None);
        c.handle(&mut ws, &Event::DetailsPanel).unwrap();
        assert_eq!(c.state(), DetailsPanelState::Collapsed);
        assert!(ws.outbox.take_effects().is_empty());
    }

    #[test]
    fn clicks_inside_the_open_panel_are_swallowed() {
        let (mut c, mut ws) = setup(None);
        ws.select(Item::Device(1));
        c.handle(&mut ws, &Event::DetailsPanel).unwrap();
        ws.view.pointer(ws.view.graph_width - 10.0, 100.0);
        assert_eq!(c.handle(&mut ws, &Event::MouseDown).unwrap(), Flow::Consumed);
        ws.view.pointer(10.0, 100.0);
        assert_eq!(c.handle(&mut ws, &Event::MouseDown).unwrap(), Flow::Forward);
    }
}
