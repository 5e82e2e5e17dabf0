// ── Mode-dependent key bindings ──

use tracing::debug;

use crate::error::CoreError;
use crate::event::Event;
use crate::fsm::{Fsm, Machine, StateId};
use crate::pipeline::{Controller, Flow, Stage};
use crate::states;
use crate::workspace::Workspace;

states! {
    pub enum KeybindingsState {
        Start => [Enabled],
        Enabled => [Disabled],
        Disabled => [Enabled],
    }
}

/// Turns keys into the commands bound by the current mode. Muted while
/// the search dropdown has focus.
#[derive(Debug)]
pub struct KeybindingsController {
    machine: Machine<KeybindingsState>,
}

impl KeybindingsController {
    pub fn new() -> Self {
        Self {
            machine: Machine::new("keybindings_fsm", KeybindingsState::Start),
        }
    }
}

impl Default for KeybindingsController {
    fn default() -> Self {
        Self::new()
    }
}

impl Fsm for KeybindingsController {
    type State = KeybindingsState;
    type Context = Workspace;

    fn machine(&self) -> &Machine<KeybindingsState> {
        &self.machine
    }

    fn machine_mut(&mut self) -> &mut Machine<KeybindingsState> {
        &mut self.machine
    }
}

impl Controller for KeybindingsController {
    fn stage(&self) -> Stage {
        Stage::Keybindings
    }

    fn state_name(&self) -> &'static str {
        self.state().name()
    }

    fn reset(&mut self) {
        self.machine.reset();
    }

    fn start(&mut self, ws: &mut Workspace) {
        self.change_state(ws, KeybindingsState::Enabled);
    }

    fn handle(&mut self, ws: &mut Workspace, event: &Event) -> Result<Flow, CoreError> {
        let flow = match (self.state(), event) {
            (KeybindingsState::Enabled, Event::KeyDown(key)) => match ws.keymap.lookup(key) {
                Some(command) => {
                    debug!(key = %key.key, command = command.name(), "key binding");
                    ws.queues.inject(command);
                    Flow::Consumed
                }
                None => Flow::Forward,
            },
            (KeybindingsState::Enabled, Event::SearchDropdown) => {
                self.change_state(ws, KeybindingsState::Disabled);
                Flow::Forward
            }
            (KeybindingsState::Disabled, Event::SearchDropdownClose) => {
                self.change_state(ws, KeybindingsState::Enabled);
                Flow::Forward
            }
            _ => Flow::Forward,
        };
        Ok(flow)
    }
}
