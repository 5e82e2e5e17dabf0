// ── Screen-space buttons ──
//
// The toolbar along the top of the canvas plus the open context menu.
// Buttons are hit-tested in screen coordinates and fire on release over
// the button that was pressed.

use strum::IntoStaticStr;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::event::Event;
use crate::fsm::{Fsm, Machine, StateId};
use crate::pipeline::{Controller, Flow, Stage};
use crate::states;
use crate::workspace::{Effect, Workspace};

const BAR_X: f64 = 10.0;
const BAR_Y: f64 = 10.0;
const BAR_WIDTH: f64 = 100.0;
const BAR_HEIGHT: f64 = 30.0;
const BAR_SPACING: f64 = 10.0;

const MENU_WIDTH: f64 = 160.0;
const MENU_ROW: f64 = 26.0;
const MENU_PADDING: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
pub enum ButtonAction {
    Record,
    Export,
    ExportYaml,
    DownloadTrace,
    DownloadRecording,
    UploadTest,
    RunTests,
    Rename,
    Details,
    Delete,
}

const BAR: [ButtonAction; 7] = [
    ButtonAction::Record,
    ButtonAction::Export,
    ButtonAction::ExportYaml,
    ButtonAction::DownloadTrace,
    ButtonAction::DownloadRecording,
    ButtonAction::UploadTest,
    ButtonAction::RunTests,
];

const MENU: [ButtonAction; 3] = [ButtonAction::Rename, ButtonAction::Details, ButtonAction::Delete];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Button {
    pub action: ButtonAction,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Button {
    pub fn label(&self) -> &'static str {
        self.action.into()
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }
}

/// Buttons currently on screen, context menu first.
pub fn visible_buttons(ws: &Workspace) -> Vec<Button> {
    let mut out = Vec::new();
    if let Some(menu) = &ws.context_menu {
        out.extend(MENU.iter().zip(0u32..).map(|(&action, i)| Button {
            action,
            x: menu.x,
            y: menu.y + MENU_PADDING + MENU_ROW * f64::from(i),
            width: MENU_WIDTH,
            height: MENU_ROW,
        }));
    }
    if !ws.flags.hide_buttons {
        out.extend(BAR.iter().zip(0u32..).map(|(&action, i)| Button {
            action,
            x: BAR_X + (BAR_WIDTH + BAR_SPACING) * f64::from(i),
            y: BAR_Y,
            width: BAR_WIDTH,
            height: BAR_HEIGHT,
        }));
    }
    out
}

fn button_at_pointer(ws: &Workspace) -> Option<ButtonAction> {
    visible_buttons(ws)
        .into_iter()
        .find(|b| b.contains(ws.view.mouse_x, ws.view.mouse_y))
        .map(|b| b.action)
}

states! {
    pub enum ButtonsState {
        Start => [Ready],
        Ready => [ButtonPressed],
        ButtonPressed => [Ready],
    }
}

#[derive(Debug)]
pub struct ButtonsController {
    machine: Machine<ButtonsState>,
    pressed: Option<ButtonAction>,
}

impl ButtonsController {
    pub fn new() -> Self {
        Self {
            machine: Machine::new("buttons_fsm", ButtonsState::Start),
            pressed: None,
        }
    }

    fn fire(ws: &mut Workspace, action: ButtonAction) {
        debug!(button = <&str>::from(action), "button fired");
        match action {
            ButtonAction::Record => ws.queues.inject(Event::ToggleRecording),
            ButtonAction::RunTests => ws.queues.inject(Event::EnableTest),
            ButtonAction::Rename => ws.queues.inject(Event::LabelEdit),
            ButtonAction::Delete => ws.queues.inject(Event::Delete),
            ButtonAction::Details => {
                ws.close_context_menu();
                ws.queues.inject(Event::DetailsPanel);
            }
            ButtonAction::UploadTest => ws.emit(Effect::Open {
                url: "/network_ui_test/upload_test".to_owned(),
            }),
            ButtonAction::Export
            | ButtonAction::ExportYaml
            | ButtonAction::DownloadTrace
            | ButtonAction::DownloadRecording => {
                let Some(topology_id) = ws.doc.topology_id else {
                    warn!(button = <&str>::from(action), "no topology loaded");
                    return;
                };
                let url = match action {
                    ButtonAction::Export => format!("/network_ui/topology.json?topology_id={topology_id}"),
                    ButtonAction::ExportYaml => format!("/network_ui/topology.yaml?topology_id={topology_id}"),
                    ButtonAction::DownloadTrace => format!(
                        "/network_ui_test/download_trace?topology_id={topology_id}&trace_id={}&client_id={}",
                        ws.trace_id, ws.test_client_id
                    ),
                    _ => format!(
                        "/network_ui_test/download_recording?topology_id={topology_id}&trace_id={}&client_id={}",
                        ws.trace_id, ws.test_client_id
                    ),
                };
                ws.emit(Effect::Open { url });
            }
        }
    }
}

impl Default for ButtonsController {
    fn default() -> Self {
        Self::new()
    }
}

impl Fsm for ButtonsController {
    type State = ButtonsState;
    type Context = Workspace;

    fn machine(&self) -> &Machine<ButtonsState> {
        &self.machine
    }

    fn machine_mut(&mut self) -> &mut Machine<ButtonsState> {
        &mut self.machine
    }

    fn on_end(&mut self, _ws: &mut Workspace, state: ButtonsState) {
        if state == ButtonsState::ButtonPressed {
            self.pressed = None;
        }
    }
}

impl Controller for ButtonsController {
    fn stage(&self) -> Stage {
        Stage::Buttons
    }

    fn state_name(&self) -> &'static str {
        self.state().name()
    }

    fn reset(&mut self) {
        self.machine.reset();
        self.pressed = None;
    }

    fn start(&mut self, ws: &mut Workspace) {
        self.change_state(ws, ButtonsState::Ready);
    }

    fn handle(&mut self, ws: &mut Workspace, event: &Event) -> Result<Flow, CoreError> {
        let flow = match (self.state(), event) {
            (ButtonsState::Ready, Event::MouseDown) => match button_at_pointer(ws) {
                Some(action) => {
                    self.pressed = Some(action);
                    self.change_state(ws, ButtonsState::ButtonPressed);
                    Flow::Consumed
                }
                None => Flow::Forward,
            },
            (ButtonsState::ButtonPressed, Event::MouseUp) => {
                let pressed = self.pressed;
                self.change_state(ws, ButtonsState::Ready);
                if let Some(action) = pressed.filter(|a| button_at_pointer(ws) == Some(*a)) {
                    Self::fire(ws, action);
                }
                Flow::Consumed
            }
            (ButtonsState::ButtonPressed, Event::MouseMove | Event::MouseDown) => Flow::Consumed,
            _ => Flow::Forward,
        };
        Ok(flow)
    }
}
