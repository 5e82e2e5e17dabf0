// ── Mode: what the zoom level lets you edit ──
//
// The mode follows the scale one level at a time. Each mode arms a
// palette, a set of editing stages and a key-binding set; moving
// between modes enables and disables only what differs.

use tracing::debug;

use crate::error::CoreError;
use crate::event::Event;
use crate::fsm::{Fsm, Machine, StateId};
use crate::pipeline::{Controller, Flow, Stage};
use crate::states;
use crate::workspace::{BindingSet, Workspace};

states! {
    pub enum ModeState {
        Start => [MultiSite, Site, Rack, Device, Interface],
        MultiSite => [Site],
        Site => [MultiSite, Rack],
        Rack => [Site, Device],
        Device => [Rack, Interface],
        Interface => [Device, Process],
        Process => [Interface],
    }
}

/// Zoom-driven modes, most zoomed out first.
const LADDER: [ModeState; 5] = [
    ModeState::MultiSite,
    ModeState::Site,
    ModeState::Rack,
    ModeState::Device,
    ModeState::Interface,
];

const SITE_STAGES: &[Stage] = &[Stage::SiteToolbox, Stage::Site];
const RACK_STAGES: &[Stage] = &[Stage::RackToolbox, Stage::Rack];
const DEVICE_STAGES: &[Stage] = &[
    Stage::InventoryToolbox,
    Stage::Move,
    Stage::Group,
    Stage::Link,
    Stage::Stream,
];
const PROCESS_STAGES: &[Stage] = &[
    Stage::AppToolbox,
    Stage::Move,
    Stage::Group,
    Stage::Link,
    Stage::Stream,
];

/// The zoom-driven mode for `scale`.
pub fn mode_for(scale: f64) -> ModeState {
    if scale < 0.1 {
        ModeState::MultiSite
    } else if scale < 0.5 {
        ModeState::Site
    } else if scale < 1.0 {
        ModeState::Rack
    } else if scale < 5.0 {
        ModeState::Device
    } else {
        ModeState::Interface
    }
}

fn rung(state: ModeState) -> Option<usize> {
    LADDER.iter().position(|s| *s == state)
}

/// Stages enabled and bindings registered while in `state`.
fn arming(state: ModeState) -> (&'static [Stage], Option<BindingSet>) {
    match state {
        ModeState::Start => (&[], None),
        ModeState::MultiSite | ModeState::Site => (SITE_STAGES, Some(BindingSet::Site)),
        ModeState::Rack => (RACK_STAGES, Some(BindingSet::Rack)),
        ModeState::Device | ModeState::Interface => (DEVICE_STAGES, Some(BindingSet::Device)),
        ModeState::Process => (PROCESS_STAGES, Some(BindingSet::Device)),
    }
}

#[derive(Debug)]
pub struct ModeController {
    machine: Machine<ModeState>,
    armed: &'static [Stage],
    bindings: Option<BindingSet>,
}

impl ModeController {
    pub fn new() -> Self {
        Self {
            machine: Machine::new("mode_fsm", ModeState::Start),
            armed: &[],
            bindings: None,
        }
    }

    fn on_scale_changed(&mut self, ws: &mut Workspace) -> Flow {
        let target = mode_for(ws.view.scale);
        let current = self.state();

        if current == ModeState::Process {
            if target == ModeState::Interface {
                return Flow::Consumed;
            }
            self.change_state(ws, ModeState::Interface);
            return Flow::Redispatch;
        }

        let (Some(from), Some(to)) = (rung(current), rung(target)) else {
            return Flow::Consumed;
        };
        let next = match from.cmp(&to) {
            std::cmp::Ordering::Equal => return Flow::Consumed,
            std::cmp::Ordering::Less => LADDER[from + 1],
            std::cmp::Ordering::Greater => LADDER[from - 1],
        };
        self.change_state(ws, next);
        Flow::Redispatch
    }
}

impl Default for ModeController {
    fn default() -> Self {
        Self::new()
    }
}

impl Fsm for ModeController {
    type State = ModeState;
    type Context = Workspace;

    fn machine(&self) -> &Machine<ModeState> {
        &self.machine
    }

    fn machine_mut(&mut self) -> &mut Machine<ModeState> {
        &mut self.machine
    }

    fn on_start(&mut self, ws: &mut Workspace, state: ModeState) {
        let (stages, bindings) = arming(state);

        for stage in self.armed.iter().filter(|s| !stages.contains(s)) {
            ws.queues.direct(*stage, Event::Disable);
        }
        for stage in stages.iter().filter(|s| !self.armed.contains(s)) {
            ws.queues.direct(*stage, Event::Enable);
        }
        if self.bindings != bindings {
            if let Some(old) = self.bindings {
                ws.keymap.unregister(old);
            }
            if let Some(new) = bindings {
                ws.keymap.register(new);
            }
        }

        self.armed = stages;
        self.bindings = bindings;
        debug!(mode = state.name(), scale = ws.view.scale, "mode");
    }
}

impl Controller for ModeController {
    fn stage(&self) -> Stage {
        Stage::Mode
    }

    fn state_name(&self) -> &'static str {
        self.state().name()
    }

    fn reset(&mut self) {
        self.machine.reset();
        self.armed = &[];
        self.bindings = None;
    }

    fn start(&mut self, ws: &mut Workspace) {
        ws.keymap.clear();
        let initial = mode_for(ws.view.scale);
        self.change_state(ws, initial);
    }

    fn handle(&mut self, ws: &mut Workspace, event: &Event) -> Result<Flow, CoreError> {
        let flow = match (self.state(), event) {
            (ModeState::Start, _) => Flow::Forward,
            (_, Event::ScaleChanged) => self.on_scale_changed(ws),
            (ModeState::Interface, Event::DetailsPanel) => {
                self.change_state(ws, ModeState::Process);
                Flow::Forward
            }
            (ModeState::Process, Event::DetailsPanelClose) => {
                self.change_state(ws, ModeState::Interface);
                Flow::Forward
            }
            _ => Flow::Forward,
        };
        Ok(flow)
    }
}
