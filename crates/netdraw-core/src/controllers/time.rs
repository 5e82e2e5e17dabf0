// ── Time: undo, redo and inbound messages ──
//
// Owns the history pointer and applies everything other clients send.
// Messages carrying our own client id are echoes of what we already
// applied and are ignored.

use tracing::{debug, trace, warn};

use crate::error::CoreError;
use crate::event::{Event, Key, Wheel};
use crate::fsm::{Fsm, Machine, StateId};
use crate::message::{
    Coverage, CoverageEdge, Envelope, Frame, Message, Modifiers, MouseKind, TimeTravel,
};
use crate::model::ToolboxKind;
use crate::pipeline::{Controller, Flow, Stage};
use crate::states;
use crate::workspace::Workspace;

states! {
    pub enum TimeState {
        Start => [Present],
        Present => [Past],
        Past => [Present],
    }
}

#[derive(Debug)]
pub struct TimeController {
    machine: Machine<TimeState>,
}

fn is_undo_key(key: &Key) -> bool {
    key.key == "z" && key.modifiers.command() && !key.modifiers.shift
}

fn is_redo_key(key: &Key) -> bool {
    key.key.eq_ignore_ascii_case("z") && key.modifiers.command() && key.modifiers.shift
}

impl TimeController {
    pub fn new() -> Self {
        Self {
            machine: Machine::new("time_fsm", TimeState::Start),
        }
    }

    /// Follow the history pointer: `Past` unless at the end of the log.
    fn sync(&mut self, ws: &mut Workspace) {
        let want = if ws.history.is_present() {
            TimeState::Present
        } else {
            TimeState::Past
        };
        if self.state() != want {
            self.change_state(ws, want);
        }
    }

    fn undo(&mut self, ws: &mut Workspace) {
        let Some(entry) = ws.history.undo().cloned() else {
            debug!("nothing to undo");
            return;
        };
        if let Some(inverse) = entry.message.inverse() {
            ws.doc.apply(&inverse);
        }
        ws.prune_selection();
        debug!(msg_type = entry.name(), pointer = ws.history.pointer(), "undo");
        ws.send_control_message(Message::Undo(TimeTravel {
            original_message: Box::new(Frame(entry)),
        }));
        self.sync(ws);
    }

    fn redo(&mut self, ws: &mut Workspace) {
        if self.state() != TimeState::Past {
            return;
        }
        let Some(entry) = ws.history.redo().cloned() else {
            return;
        };
        ws.doc.apply(&entry.message);
        ws.prune_selection();
        debug!(msg_type = entry.name(), pointer = ws.history.pointer(), "redo");
        ws.send_control_message(Message::Redo(TimeTravel {
            original_message: Box::new(Frame(entry)),
        }));
        self.sync(ws);
    }

    fn on_message(&mut self, ws: &mut Workspace, envelope: &Envelope) -> Flow {
        let own = ws.client_id != 0 && envelope.sender == ws.client_id;
        let message = &envelope.message;

        if message.is_mutating() {
            if !own {
                ws.doc.apply(message);
                ws.prune_selection();
                ws.history.record(envelope.clone());
                self.sync(ws);
            }
            return Flow::Consumed;
        }

        match message {
            _ if own => trace!(msg_type = envelope.name(), "own echo"),
            Message::Undo(tt) => {
                let original = &tt.original_message.0;
                if ws.history.peek_undo().is_some_and(|e| e.same_origin(original)) {
                    ws.history.undo();
                } else {
                    warn!(
                        sender = original.sender,
                        message_id = original.message_id,
                        pointer = ws.history.pointer(),
                        "remote undo does not match the local log; pointer kept"
                    );
                }
                if let Some(inverse) = original.message.inverse() {
                    ws.doc.apply(&inverse);
                }
                ws.prune_selection();
                self.sync(ws);
            }
            Message::Redo(tt) => {
                let original = &tt.original_message.0;
                if ws.history.peek_redo().is_some_and(|e| e.same_origin(original)) {
                    ws.history.redo();
                } else {
                    warn!(
                        sender = original.sender,
                        message_id = original.message_id,
                        pointer = ws.history.pointer(),
                        "remote redo does not match the local log; pointer kept"
                    );
                }
                ws.doc.apply(&original.message);
                ws.prune_selection();
                self.sync(ws);
            }
            Message::DeviceSelected(m) | Message::DeviceUnSelected(m) => {
                let on = matches!(message, Message::DeviceSelected(_));
                if let Some(d) = ws.doc.device_mut(m.id) {
                    d.remote_selected = on;
                }
            }
            Message::LinkSelected(m) | Message::LinkUnSelected(m) => {
                let on = matches!(message, Message::LinkSelected(_));
                if let Some(l) = ws.doc.link_mut(m.id) {
                    l.remote_selected = on;
                }
            }
            Message::GroupMembership(m) => {
                ws.doc.set_group_members(m.id, &m.members);
            }
            Message::Snapshot(snapshot) => ws.load_snapshot(snapshot),
            Message::Topology(t) => ws.apply_topology(t),
            Message::History(h) => {
                ws.history
                    .replace(h.history.iter().map(|f| f.0.clone()).collect());
                debug!(entries = ws.history.len(), "history replaced");
                self.sync(ws);
            }
            Message::ViewPort(v) => {
                ws.view.scale = v.scale;
                ws.view.pan_x = v.pan_x;
                ws.view.pan_y = v.pan_y;
                ws.view.update_scaled();
                ws.post_scale_changed();
            }
            Message::MouseEvent(_) | Message::MouseWheelEvent(_) | Message::KeyEvent(_) => {
                Self::replay_input(ws, message);
            }
            Message::StartReplay => ws.flags.replay = true,
            Message::StopReplay => ws.flags.replay = false,
            Message::StopRecording(_) => {
                ws.flags.recording = false;
                ws.trace.set_streaming(false);
            }
            Message::ToolboxItem(item) => match ToolboxKind::from_wire_name(&item.toolbox_name) {
                Some(kind) => ws.toolboxes.get_mut(kind).items.push(item.data.clone()),
                None => warn!(toolbox = %item.toolbox_name, "item for an unknown palette"),
            },
            Message::TestCase(test) => {
                debug!(name = %test.name, events = test.event_trace.len(), "test case queued");
                ws.tests.suite.push(test.clone());
            }
            Message::CoverageRequest => {
                let coverage = ws
                    .trace
                    .coverage()
                    .map(|(fsm, from, to)| CoverageEdge {
                        fsm: (*fsm).to_owned(),
                        from: (*from).to_owned(),
                        to: (*to).to_owned(),
                    })
                    .collect();
                ws.send_test_message(Message::Coverage(Coverage { coverage }));
            }
            other => trace!(msg_type = other.name(), "ignored"),
        }
        Flow::Consumed
    }

    /// Turn recorded input back into pipeline events.
    fn replay_input(ws: &mut Workspace, message: &Message) {
        if !ws.flags.replay {
            trace!(msg_type = message.name(), "replay off, input ignored");
            return;
        }
        let event = match message {
            Message::MouseEvent(m) => {
                ws.view.pointer(m.x, m.y);
                match m.kind {
                    MouseKind::MouseDown => Event::MouseDown,
                    MouseKind::MouseUp => Event::MouseUp,
                    MouseKind::MouseMove => Event::MouseMove,
                }
            }
            Message::MouseWheelEvent(w) => Event::MouseWheel(Wheel {
                delta: w.delta,
                delta_x: w.delta_x,
                delta_y: w.delta_y,
                modifiers: Modifiers {
                    meta: w.meta_key,
                    ..Modifiers::default()
                },
            }),
            Message::KeyEvent(k) if k.kind == "keydown" => Event::KeyDown(Key {
                key: k.key.clone(),
                key_code: k.key_code,
                modifiers: k.modifiers,
            }),
            _ => return,
        };
        ws.queues.inject(event);
    }
}

impl Default for TimeController {
    fn default() -> Self {
        Self::new()
    }
}

impl Fsm for TimeController {
    type State = TimeState;
    type Context = Workspace;

    fn machine(&self) -> &Machine<TimeState> {
        &self.machine
    }

    fn machine_mut(&mut self) -> &mut Machine<TimeState> {
        &mut self.machine
    }
}

impl Controller for TimeController {
    fn stage(&self) -> Stage {
        Stage::Time
    }

    fn state_name(&self) -> &'static str {
        self.state().name()
    }

    fn reset(&mut self) {
        self.machine.reset();
    }

    fn start(&mut self, ws: &mut Workspace) {
        self.change_state(ws, TimeState::Present);
        self.sync(ws);
    }

    fn handle(&mut self, ws: &mut Workspace, event: &Event) -> Result<Flow, CoreError> {
        if self.state() == TimeState::Start {
            return Ok(Flow::Forward);
        }
        let flow = match event {
            Event::Message(envelope) => self.on_message(ws, envelope),
            Event::Undo => {
                self.undo(ws);
                Flow::Consumed
            }
            Event::Redo => {
                self.redo(ws);
                Flow::Consumed
            }
            Event::KeyDown(key) if is_undo_key(key) => {
                self.undo(ws);
                Flow::Consumed
            }
            Event::KeyDown(key) if is_redo_key(key) => {
                self.redo(ws);
                Flow::Consumed
            }
            Event::MouseWheel(wheel) if wheel.modifiers.meta => {
                if wheel.delta < 0.0 {
                    self.undo(ws);
                } else if wheel.delta > 0.0 {
                    self.redo(ws);
                }
                Flow::Consumed
            }
            Event::HistoryTruncated => {
                self.sync(ws);
                Flow::Consumed
            }
            _ => Flow::Forward,
        };
        Ok(flow)
    }
}
