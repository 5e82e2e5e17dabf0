// ── Interaction controllers ──
//
// One module per stage of the pipeline. Each pairs a `states!` enum
// with an `Fsm` impl over the workspace and a `Controller` impl that
// matches on (state, event).

pub mod animation;
pub mod buttons;
pub mod connector;
pub mod container;
pub mod details_panel;
pub mod group;
pub mod hotkeys;
pub mod keybindings;
pub mod mode;
pub mod moving;
pub mod test_runner;
pub mod time;
pub mod toolbox;
pub mod view;

use tracing::warn;

use crate::event::Event;
use crate::fsm::{Fsm, StateId};
use crate::pipeline::Flow;
use crate::workspace::Workspace;

/// `Enable` for a stage that is already enabled, or the reverse.
fn pairing_violation(fsm: &'static str, state: &'static str, event: &Event) -> Flow {
    warn!(fsm, state, event = event.name(), "enable/disable pairing violation");
    Flow::Consumed
}

/// Escape, used to abandon a gesture in progress.
fn is_escape(event: &Event) -> bool {
    matches!(event, Event::KeyDown(k) if k.key_code == 27)
}

/// Enable/Disable handling shared by the editing stages. Returns `None`
/// when the event is left to the stage's own handler.
fn enable_disable<C>(
    c: &mut C,
    ws: &mut Workspace,
    event: &Event,
    disabled: C::State,
    ready: C::State,
) -> Option<Flow>
where
    C: Fsm<Context = Workspace>,
{
    let state = c.state();
    match event {
        Event::Enable if state == disabled => {
            c.change_state(ws, ready);
            Some(Flow::Consumed)
        }
        Event::Disable if state != disabled => {
            c.change_state(ws, disabled);
            Some(Flow::Consumed)
        }
        Event::Enable | Event::Disable => Some(pairing_violation(c.machine().name(), state.name(), event)),
        _ if state == disabled => Some(Flow::Forward),
        _ => None,
    }
}
