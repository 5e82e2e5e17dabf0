// ── View: pan, zoom, search ──

use tracing::debug;

use super::animation::{jump_to_animation, step_animations};
use crate::error::CoreError;
use crate::event::Event;
use crate::fsm::{Fsm, Machine, StateId};
use crate::model::Device;
use crate::pipeline::{Controller, Flow, Stage};
use crate::states;
use crate::workspace::{Item, Workspace};

/// Wheel sensitivity: scale factor per unit of delta.
const WHEEL_ZOOM_RATE: f64 = 0.002;

states! {
    pub enum ViewState {
        Start => [Ready],
        Ready => [Pressed, Scale],
        Pressed => [Ready, Pan],
        Pan => [Ready],
        Scale => [Ready],
    }
}

/// Scale shown by the zoom widget at `percent`.
pub fn scale_for_zoom(percent: f64) -> f64 {
    10f64.powf((percent - 120.0) / 40.0)
}

#[derive(Debug)]
pub struct ViewController {
    machine: Machine<ViewState>,
}

impl ViewController {
    pub fn new() -> Self {
        Self {
            machine: Machine::new("view_fsm", ViewState::Start),
        }
    }

    fn on_ready(ws: &mut Workspace, event: &Event) -> Option<ViewState> {
        match event {
            Event::MouseDown => {
                ws.view.press();
                Some(ViewState::Pressed)
            }
            Event::MouseWheel(_) => Some(ViewState::Scale),
            _ => None,
        }
    }
}

impl Default for ViewController {
    fn default() -> Self {
        Self::new()
    }
}

impl Fsm for ViewController {
    type State = ViewState;
    type Context = Workspace;

    fn machine(&self) -> &Machine<ViewState> {
        &self.machine
    }

    fn machine_mut(&mut self) -> &mut Machine<ViewState> {
        &mut self.machine
    }
}

impl Controller for ViewController {
    fn stage(&self) -> Stage {
        Stage::View
    }

    fn state_name(&self) -> &'static str {
        self.state().name()
    }

    fn reset(&mut self) {
        self.machine.reset();
    }

    fn start(&mut self, ws: &mut Workspace) {
        self.change_state(ws, ViewState::Ready);
    }

    fn handle(&mut self, ws: &mut Workspace, event: &Event) -> Result<Flow, CoreError> {
        // Stateless commands first.
        match event {
            Event::AnimationTick => {
                step_animations(ws);
                return Ok(Flow::Consumed);
            }
            Event::Zoom(percent) => {
                let scale = scale_for_zoom(*percent).clamp(ws.config.zoom_min, ws.config.zoom_max);
                let center = ws.view.virtual_center();
                jump_to_animation(ws, center, scale);
                return Ok(Flow::Consumed);
            }
            Event::Search(id) => {
                let Some(center) = ws.doc.device(*id).map(Device::center) else {
                    debug!(device = id, "search target not found");
                    return Ok(Flow::Consumed);
                };
                ws.clear_selections();
                ws.select(Item::Device(*id));
                jump_to_animation(ws, center, 1.0);
                return Ok(Flow::Consumed);
            }
            _ => {}
        }

        let flow = match (self.state(), event) {
            (ViewState::Ready, _) => match Self::on_ready(ws, event) {
                Some(next @ ViewState::Scale) => {
                    self.change_state(ws, next);
                    Flow::Redispatch
                }
                Some(next) => {
                    self.change_state(ws, next);
                    Flow::Consumed
                }
                None => Flow::Forward,
            },
            (ViewState::Scale, Event::MouseWheel(wheel)) => {
                let scale = (ws.view.scale * (1.0 + wheel.delta * WHEEL_ZOOM_RATE))
                    .clamp(ws.config.zoom_min, ws.config.zoom_max);
                ws.view.zoom_at_pointer(scale);
                ws.post_scale_changed();
                self.change_state(ws, ViewState::Ready);
                Flow::Consumed
            }
            (ViewState::Pressed, Event::MouseMove) => {
                self.change_state(ws, ViewState::Pan);
                Flow::Redispatch
            }
            (ViewState::Pan, Event::MouseMove) => {
                let v = &mut ws.view;
                v.pan_x += v.mouse_x - v.pressed_x;
                v.pan_y += v.mouse_y - v.pressed_y;
                v.pressed_x = v.mouse_x;
                v.pressed_y = v.mouse_y;
                v.update_scaled();
                Flow::Consumed
            }
            (ViewState::Pressed | ViewState::Pan, Event::MouseUp) => {
                self.change_state(ws, ViewState::Ready);
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
    use crate::event::Wheel;
    use crate::message::Modifiers;

    fn ready() -> (ViewController, Workspace) {
        let mut ws = Workspace::new(EditorConfig::default());
        let mut c = ViewController::new();
        c.start(&mut ws);
        (c, ws)
    }

    fn handle(c: &mut ViewController, ws: &mut Workspace, event: &Event) -> Flow {
        loop {
            let flow = c.handle(ws, event).unwrap();
            if flow != Flow::Redispatch {
                return flow;
            }
        }
    }

    #[test]
    fn drag_pans_by_the_raw_delta() {
        let (mut c, mut ws) = ready();
        ws.view.pointer(100.0, 100.0);
        handle(&mut c, &mut ws, &Event::MouseDown);
        ws.view.pointer(130.0, 90.0);
        handle(&mut c, &mut ws, &Event::MouseMove);
        assert_eq!(c.state(), ViewState::Pan);
        assert!((ws.view.pan_x - 30.0).abs() < 1e-9);
        assert!((ws.view.pan_y + 10.0).abs() < 1e-9);
        handle(&mut c, &mut ws, &Event::MouseUp);
        assert_eq!(c.state(), ViewState::Ready);
    }

    #[test]
    fn wheel_zoom_is_clamped_and_announced() {
        let (mut c, mut ws) = ready();
        ws.view.pointer(640.0, 400.0);
        let wheel = Event::MouseWheel(Wheel {
            delta: 100_000.0,
            delta_x: 0.0,
            delta_y: 0.0,
            modifiers: Modifiers::default(),
        });
        assert_eq!(handle(&mut c, &mut ws, &wheel), Flow::Consumed);
        assert!((ws.view.scale - ws.config.zoom_max).abs() < 1e-9);
        assert_eq!(ws.queues.pop_injected(), Some(Event::ScaleChanged));
        assert_eq!(c.state(), ViewState::Ready);
    }

    #[test]
    fn zoom_widget_maps_percent_to_scale() {
        assert!((scale_for_zoom(120.0) - 1.0).abs() < 1e-12);
        assert!((scale_for_zoom(160.0) - 10.0).abs() < 1e-9);
        assert!((scale_for_zoom(80.0) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn unclaimed_events_pass_through() {
        let (mut c, mut ws) = ready();
        assert_eq!(handle(&mut c, &mut ws, &Event::MouseUp), Flow::Forward);
        assert_eq!(handle(&mut c, &mut ws, &Event::Delete), Flow::Forward);
    }
}
