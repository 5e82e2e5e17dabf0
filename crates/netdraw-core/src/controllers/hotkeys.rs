// ── Display hotkeys ──

use tracing::debug;

use crate::error::CoreError;
use crate::event::{Event, Key};
use crate::fsm::{Fsm, Machine, StateId};
use crate::pipeline::{Controller, Flow, Stage};
use crate::states;
use crate::workspace::{Flags, Workspace};

states! {
    pub enum HotkeysState {
        Start => [Enabled],
        Enabled => [Disabled],
        Disabled => [Enabled],
    }
}

#[derive(Debug)]
pub struct HotkeysController {
    machine: Machine<HotkeysState>,
}

impl HotkeysController {
    pub fn new() -> Self {
        Self {
            machine: Machine::new("hotkeys_fsm", HotkeysState::Start),
        }
    }

    /// The display flag a bare key toggles.
    fn flag<'a>(flags: &'a mut Flags, key: &str) -> Option<&'a mut bool> {
        let flag = match key {
            "d" => &mut flags.debug,
            "b" => &mut flags.hide_buttons,
            "i" => &mut flags.hide_interfaces,
            "k" => &mut flags.hide_links,
            "G" => &mut flags.hide_groups,
            "m" => &mut flags.hide_menus,
            _ => return None,
        };
        Some(flag)
    }

    fn on_key(ws: &mut Workspace, key: &Key) -> Flow {
        let m = key.modifiers;
        if m.command() || m.alt {
            return Flow::Forward;
        }
        if key.key == "T" {
            ws.queues.inject(Event::ToggleToolbox);
            return Flow::Consumed;
        }
        match Self::flag(&mut ws.flags, &key.key) {
            Some(flag) => {
                *flag = !*flag;
                debug!(key = %key.key, on = *flag, "display toggle");
                Flow::Consumed
            }
            None => Flow::Forward,
        }
    }
}

impl Default for HotkeysController {
    fn default() -> Self {
        Self::new()
    }
}

impl Fsm for HotkeysController {
    type State = HotkeysState;
    type Context = Workspace;

    fn machine(&self) -> &Machine<HotkeysState> {
        &self.machine
    }

    fn machine_mut(&mut self) -> &mut Machine<HotkeysState> {
        &mut self.machine
    }
}

impl Controller for HotkeysController {
    fn stage(&self) -> Stage {
        Stage::Hotkeys
    }

    fn state_name(&self) -> &'static str {
        self.state().name()
    }

    fn reset(&mut self) {
        self.machine.reset();
    }

    fn start(&mut self, ws: &mut Workspace) {
        self.change_state(ws, HotkeysState::Enabled);
    }

    fn handle(&mut self, ws: &mut Workspace, event: &Event) -> Result<Flow, CoreError> {
        let flow = match (self.state(), event) {
            (HotkeysState::Enabled, Event::KeyDown(key)) => Self::on_key(ws, key),
            (HotkeysState::Enabled, Event::SearchDropdown) => {
                self.change_state(ws, HotkeysState::Disabled);
                Flow::Consumed
            }
            (HotkeysState::Disabled, Event::SearchDropdownClose) => {
                self.change_state(ws, HotkeysState::Enabled);
                Flow::Consumed
            }
            _ => Flow::Forward,
        };
        Ok(flow)
    }
}
