// ── Links and streams ──
//
// Both are drawn with the same gesture: pick a source device, then a
// destination. Only what gets created at the end differs.

use tracing::debug;

use super::{enable_disable, is_escape};
use crate::error::CoreError;
use crate::event::Event;
use crate::fsm::{Fsm, Machine, StateId};
use crate::message::{InterfaceRef, LinkRef, Message, StreamRef};
use crate::pipeline::{Controller, Flow, Stage};
use crate::states;
use crate::workspace::{Item, Workspace};

states! {
    pub enum ConnectorState {
        Start => [Disable, Ready],
        Disable => [Ready],
        Ready => [Disable, Selecting],
        Selecting => [Disable, Ready, Connecting],
        Connecting => [Disable, Ready, Connected],
        Connected => [Disable, Ready],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Connection {
    Link,
    Stream,
}

#[derive(Debug)]
pub struct ConnectorController {
    kind: Connection,
    machine: Machine<ConnectorState>,
    /// Source device while the pending connection follows the pointer.
    from: Option<u64>,
}

impl ConnectorController {
    pub fn link() -> Self {
        Self {
            kind: Connection::Link,
            machine: Machine::new("link_fsm", ConnectorState::Start),
            from: None,
        }
    }

    pub fn stream() -> Self {
        Self {
            kind: Connection::Stream,
            machine: Machine::new("stream_fsm", ConnectorState::Start),
            from: None,
        }
    }

    /// Source device of the connection being drawn.
    pub fn pending(&self) -> Option<u64> {
        self.from
    }

    fn starts_here(&self, event: &Event) -> bool {
        match self.kind {
            Connection::Link => matches!(event, Event::NewLink),
            Connection::Stream => matches!(event, Event::NewStream),
        }
    }

    fn device_at_pointer(ws: &Workspace) -> Option<u64> {
        ws.doc.device_at(ws.view.scaled_x, ws.view.scaled_y)
    }

    fn connect(&self, ws: &mut Workspace, from: u64, to: u64) {
        let message = match self.kind {
            Connection::Link => {
                let Some(ends) = Self::new_interfaces(ws, from, to) else {
                    return;
                };
                let link = LinkRef {
                    id: ws.doc.seqs.next_link(),
                    name: String::new(),
                    from_device_id: from,
                    to_device_id: to,
                    from_interface_id: ends[0].id,
                    to_interface_id: ends[1].id,
                };
                let mut parts: Vec<Message> = ends.into_iter().map(Message::InterfaceCreate).collect();
                parts.push(Message::LinkCreate(link));
                Message::batch(parts)
            }
            Connection::Stream => Message::StreamCreate(StreamRef {
                id: ws.doc.seqs.next_stream(),
                from_id: from,
                to_id: to,
                label: String::new(),
            }),
        };
        debug!(from, to, kind = ?self.kind, "connected");
        ws.doc.apply_quiet(&message);
        ws.send_control_message(message);
    }

    /// One fresh interface on each device, named after its id.
    fn new_interfaces(ws: &mut Workspace, from: u64, to: u64) -> Option<[InterfaceRef; 2]> {
        let mut make = |device_id: u64| {
            let id = ws.doc.device_mut(device_id)?.next_interface_id();
            Some(InterfaceRef {
                device_id,
                id,
                name: format!("swp{id}"),
            })
        };
        Some([make(from)?, make(to)?])
    }

    fn cancel(&mut self, ws: &mut Workspace) {
        self.change_state(ws, ConnectorState::Ready);
    }
}

impl Fsm for ConnectorController {
    type State = ConnectorState;
    type Context = Workspace;

    fn machine(&self) -> &Machine<ConnectorState> {
        &self.machine
    }

    fn machine_mut(&mut self) -> &mut Machine<ConnectorState> {
        &mut self.machine
    }

    fn on_start(&mut self, ws: &mut Workspace, state: ConnectorState) {
        if state == ConnectorState::Connected {
            ws.clear_selections();
            self.change_state(ws, ConnectorState::Ready);
        }
    }

    fn on_end(&mut self, _ws: &mut Workspace, state: ConnectorState) {
        if state == ConnectorState::Connecting {
            self.from = None;
        }
    }
}

impl Controller for ConnectorController {
    fn stage(&self) -> Stage {
        match self.kind {
            Connection::Link => Stage::Link,
            Connection::Stream => Stage::Stream,
        }
    }

    fn state_name(&self) -> &'static str {
        self.state().name()
    }

    fn reset(&mut self) {
        self.machine.reset();
        self.from = None;
    }

    fn start(&mut self, ws: &mut Workspace) {
        self.change_state(ws, ConnectorState::Disable);
    }

    fn handle(&mut self, ws: &mut Workspace, event: &Event) -> Result<Flow, CoreError> {
        if let Some(flow) = enable_disable(self, ws, event, ConnectorState::Disable, ConnectorState::Ready) {
            return Ok(flow);
        }

        let flow = match (self.state(), event) {
            (ConnectorState::Ready, _) if self.starts_here(event) => {
                self.change_state(ws, ConnectorState::Selecting);
                Flow::Consumed
            }

            (ConnectorState::Selecting | ConnectorState::Connecting, _) if is_escape(event) => {
                self.cancel(ws);
                Flow::Consumed
            }
            (ConnectorState::Selecting | ConnectorState::Connecting, Event::MouseDown) => Flow::Consumed,

            (ConnectorState::Selecting, Event::MouseUp) => {
                if let Some(device) = Self::device_at_pointer(ws) {
                    ws.clear_selections();
                    ws.select(Item::Device(device));
                    self.from = Some(device);
                    self.change_state(ws, ConnectorState::Connecting);
                } else {
                    self.cancel(ws);
                }
                Flow::Consumed
            }

            (ConnectorState::Connecting, Event::MouseMove) => Flow::Consumed,
            (ConnectorState::Connecting, Event::MouseUp) => {
                match (self.from, Self::device_at_pointer(ws)) {
                    (Some(from), Some(to)) if from != to => {
                        self.connect(ws, from, to);
                        self.change_state(ws, ConnectorState::Connected);
                    }
                    _ => self.cancel(ws),
                }
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
    use crate::event::Key;
    use crate::message::{DeviceCreate, Envelope};
    use crate::model::DeviceType;
    use pretty_assertions::assert_eq;

    fn workspace() -> Workspace {
        let mut ws = Workspace::new(EditorConfig::default());
        ws.set_client_id(2);
        for (id, x) in [(1, 100.0), (2, 400.0)] {
            ws.doc.apply(&Message::DeviceCreate(DeviceCreate {
                id,
                name: format!("Router{id}"),
                x,
                y: 100.0,
                device_type: DeviceType::Router,
                host_id: None,
            }));
        }
        ws
    }

    fn ready(mut c: ConnectorController, ws: &mut Workspace) -> ConnectorController {
        c.start(ws);
        c.handle(ws, &Event::Enable).unwrap();
        c
    }

    fn click(c: &mut ConnectorController, ws: &mut Workspace, x: f64, y: f64) {
        ws.view.pointer(x, y);
        c.handle(ws, &Event::MouseDown).unwrap();
        c.handle(ws, &Event::MouseUp).unwrap();
    }

    #[test]
    fn link_creates_two_interfaces_and_the_link_in_one_batch() {
        let mut ws = workspace();
        let mut c = ready(ConnectorController::link(), &mut ws);
        c.handle(&mut ws, &Event::NewLink).unwrap();
        click(&mut c, &mut ws, 100.0, 100.0);
        assert_eq!(c.state(), ConnectorState::Connecting);
        assert_eq!(c.pending(), Some(1));
        click(&mut c, &mut ws, 400.0, 100.0);
        assert_eq!(c.state(), ConnectorState::Ready);
        assert_eq!(c.pending(), None);

        let sent = ws.outbox.take_control();
        let names: Vec<_> = sent.iter().map(Envelope::name).collect();
        assert_eq!(names, vec!["DeviceSelected", "MultipleMessage", "DeviceUnSelected"]);
        let Message::MultipleMessage(batch) = &sent[1].message else {
            panic!("expected a batch");
        };
        let names: Vec<_> = batch.messages.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["InterfaceCreate", "InterfaceCreate", "LinkCreate"]);

        let link = ws.doc.links().next().unwrap();
        assert_eq!((link.from_device_id, link.to_device_id), (1, 2));
        assert_eq!(ws.doc.device(1).unwrap().interfaces[0].name, "swp1");
        assert!(ws.selection.is_empty());
    }

    #[test]
    fn stream_creates_a_stream() {
        let mut ws = workspace();
        let mut c = ready(ConnectorController::stream(), &mut ws);
        assert_eq!(c.handle(&mut ws, &Event::NewLink).unwrap(), Flow::Forward);
        c.handle(&mut ws, &Event::NewStream).unwrap();
        click(&mut c, &mut ws, 400.0, 100.0);
        click(&mut c, &mut ws, 100.0, 100.0);

        let sent = ws.outbox.take_control();
        assert!(sent.iter().any(|e| e.name() == "StreamCreate"));
        let s = ws.doc.streams().next().unwrap();
        assert_eq!((s.from_id, s.to_id), (2, 1));
    }

    #[test]
    fn releasing_on_empty_canvas_or_the_source_cancels() {
        let mut ws = workspace();
        let mut c = ready(ConnectorController::link(), &mut ws);
        c.handle(&mut ws, &Event::NewLink).unwrap();
        click(&mut c, &mut ws, 700.0, 700.0);
        assert_eq!(c.state(), ConnectorState::Ready);

        c.handle(&mut ws, &Event::NewLink).unwrap();
        click(&mut c, &mut ws, 100.0, 100.0);
        click(&mut c, &mut ws, 100.0, 100.0);
        assert_eq!(c.state(), ConnectorState::Ready);
        assert!(ws.doc.links().next().is_none());
    }

    #[test]
    fn escape_abandons_the_gesture() {
        let mut ws = workspace();
        let mut c = ready(ConnectorController::link(), &mut ws);
        c.handle(&mut ws, &Event::NewLink).unwrap();
        click(&mut c, &mut ws, 100.0, 100.0);
        c.handle(&mut ws, &Event::KeyDown(Key::new("Escape", 27))).unwrap();
        assert_eq!(c.state(), ConnectorState::Ready);
        assert_eq!(c.pending(), None);
        assert!(ws.trace.illegal().is_empty());
    }
}
