// ── Editor ──
//
// Synchronous facade over the workspace and the controller chain.
// Input is normalized into the view before dispatch; inbound frames are
// decoded and routed; outbound queues are drained as encoded frames.
// The async session owns one of these and drives it from its loop.

use tracing::{debug, trace, warn};

use crate::config::EditorConfig;
use crate::error::CoreError;
use crate::event::{Event, Key, Wheel};
use crate::message::wire::{self, Inbound};
use crate::message::{Envelope, KeyEvent, Message, Modifiers, MouseEvent, MouseKind, MouseWheelEvent, TestCase, TestResult};
use crate::model::Snapshot;
use crate::pipeline::{DEFAULT_CHAIN, Pipeline, Stage};
use crate::workspace::{Effect, Workspace};

#[derive(Debug)]
pub struct Editor {
    ws: Workspace,
    pipeline: Pipeline,
}

impl Editor {
    /// Editor with the default controller chain, started and ready.
    pub fn new(config: EditorConfig) -> Result<Self, CoreError> {
        Self::with_chain(config, DEFAULT_CHAIN)
    }

    pub fn with_chain(config: EditorConfig, chain: &[Stage]) -> Result<Self, CoreError> {
        let mut ws = Workspace::new(config);
        let mut pipeline = Pipeline::new(chain);
        pipeline.start_all(&mut ws)?;
        ws.stream_transitions();
        Ok(Self { ws, pipeline })
    }

    pub fn workspace(&self) -> &Workspace {
        &self.ws
    }

    pub fn workspace_mut(&mut self) -> &mut Workspace {
        &mut self.ws
    }

    /// Current state name of one stage.
    pub fn state_of(&self, stage: Stage) -> Option<&'static str> {
        self.pipeline.state_of(stage)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.ws.doc.to_snapshot()
    }

    // ── Dispatch ─────────────────────────────────────────────────────

    /// Feed one event through the chain.
    pub fn dispatch(&mut self, event: &Event) -> Result<(), CoreError> {
        let result = self.pipeline.dispatch(&mut self.ws, event);
        self.ws.stream_transitions();
        result
    }

    fn dispatch_to(&mut self, stage: Stage, event: &Event) -> Result<(), CoreError> {
        let result = self.pipeline.dispatch_to(&mut self.ws, stage, event);
        self.ws.stream_transitions();
        result
    }

    /// A command raised by the host: a menu pick, a shortcut button.
    pub fn command(&mut self, event: Event) -> Result<(), CoreError> {
        self.dispatch(&event)
    }

    // ── Input ────────────────────────────────────────────────────────

    pub fn mouse_down(&mut self, x: f64, y: f64, modifiers: Modifiers) -> Result<(), CoreError> {
        self.mouse(x, y, modifiers, MouseKind::MouseDown)
    }

    pub fn mouse_up(&mut self, x: f64, y: f64, modifiers: Modifiers) -> Result<(), CoreError> {
        self.mouse(x, y, modifiers, MouseKind::MouseUp)
    }

    pub fn mouse_move(&mut self, x: f64, y: f64, modifiers: Modifiers) -> Result<(), CoreError> {
        self.mouse(x, y, modifiers, MouseKind::MouseMove)
    }

    fn mouse(&mut self, x: f64, y: f64, modifiers: Modifiers, kind: MouseKind) -> Result<(), CoreError> {
        self.ws.view.pointer(x, y);
        self.ws.view.modifiers = modifiers;
        self.ws.record_input(Message::MouseEvent(MouseEvent {
            x,
            y,
            kind,
            trace_id: self.ws.trace_id,
        }));
        let event = match kind {
            MouseKind::MouseDown => Event::MouseDown,
            MouseKind::MouseUp => Event::MouseUp,
            MouseKind::MouseMove => Event::MouseMove,
        };
        self.dispatch(&event)
    }

    /// Wheel at screen position `(x, y)`.
    pub fn mouse_wheel(&mut self, x: f64, y: f64, wheel: Wheel) -> Result<(), CoreError> {
        self.ws.view.pointer(x, y);
        self.ws.view.modifiers = wheel.modifiers;
        self.ws.record_input(Message::MouseWheelEvent(MouseWheelEvent {
            delta: wheel.delta,
            delta_x: wheel.delta_x,
            delta_y: wheel.delta_y,
            kind: "mousewheel".to_owned(),
            meta_key: wheel.modifiers.meta,
            trace_id: self.ws.trace_id,
        }));
        self.dispatch(&Event::MouseWheel(wheel))
    }

    pub fn key_down(&mut self, key: Key) -> Result<(), CoreError> {
        self.ws.view.modifiers = key.modifiers;
        self.ws.record_input(Message::KeyEvent(KeyEvent {
            key: key.key.clone(),
            key_code: key.key_code,
            kind: "keydown".to_owned(),
            modifiers: key.modifiers,
            trace_id: self.ws.trace_id,
        }));
        self.dispatch(&Event::KeyDown(key))
    }

    // ── Inbound frames ───────────────────────────────────────────────

    /// One text frame from the topology socket.
    pub fn receive_frame(&mut self, text: &str) -> Result<(), CoreError> {
        match wire::decode(text)? {
            Inbound::ClientId(id) => {
                debug!(client_id = id, "client id assigned");
                self.ws.set_client_id(id);
                Ok(())
            }
            Inbound::Error(message) => Err(CoreError::Server { message }),
            Inbound::Message(envelope) => self.dispatch(&Event::Message(envelope)),
        }
    }

    /// One text frame from the test socket. Messages go straight to the
    /// time controller.
    pub fn receive_test_frame(&mut self, text: &str) -> Result<(), CoreError> {
        match wire::decode(text)? {
            Inbound::ClientId(id) => {
                debug!(test_client_id = id, "test client id assigned");
                self.ws.test_client_id = id;
                Ok(())
            }
            Inbound::Error(message) => Err(CoreError::Server { message }),
            Inbound::Message(envelope) => self.dispatch_to(Stage::Time, &Event::Message(envelope)),
        }
    }

    /// Socket up or down.
    pub fn set_connected(&mut self, connected: bool) {
        self.ws.set_connected(connected);
    }

    // ── Timers ───────────────────────────────────────────────────────

    /// One animation frame. Returns whether anything was animating.
    pub fn animation_tick(&mut self) -> Result<bool, CoreError> {
        if self.ws.animations.is_empty() {
            return Ok(false);
        }
        self.dispatch(&Event::AnimationTick)?;
        Ok(true)
    }

    /// One step of the test pump. Returns whether a test is in flight.
    ///
    /// Errors raised while a test replays are charged to that test.
    pub fn test_tick(&mut self) -> bool {
        if self.ws.tests.current.is_none() {
            return false;
        }
        if let Err(err) = self.dispatch(&Event::TestTick) {
            warn!(error = %err, "test step failed");
            self.ws.tests.errors.push(err.to_string());
        }
        true
    }

    // ── Tests ────────────────────────────────────────────────────────

    /// Queue test cases for the next run.
    pub fn load_tests(&mut self, tests: impl IntoIterator<Item = TestCase>) {
        self.ws.tests.suite.extend(tests);
    }

    /// Run the queued suite to completion without a clock.
    pub fn run_tests(&mut self) -> Result<&[TestResult], CoreError> {
        self.dispatch(&Event::EnableTest)?;
        while self.test_tick() {}
        Ok(&self.ws.tests.results)
    }

    pub fn test_results(&self) -> &[TestResult] {
        &self.ws.tests.results
    }

    // ── Outbound ─────────────────────────────────────────────────────

    pub fn take_control(&mut self) -> Vec<Envelope> {
        self.ws.outbox.take_control()
    }

    pub fn take_test(&mut self) -> Vec<Envelope> {
        self.ws.outbox.take_test()
    }

    pub fn take_effects(&mut self) -> Vec<Effect> {
        self.ws.outbox.take_effects()
    }

    /// Drain the control queue as wire frames.
    pub fn control_frames(&mut self) -> Vec<String> {
        encode_all(self.ws.outbox.take_control())
    }

    /// Drain the test queue as wire frames.
    pub fn test_frames(&mut self) -> Vec<String> {
        encode_all(self.ws.outbox.take_test())
    }
}

fn encode_all(envelopes: Vec<Envelope>) -> Vec<String> {
    envelopes
        .iter()
        .filter_map(|e| match wire::encode(e) {
            Ok(frame) => Some(frame),
            Err(err) => {
                debug!(msg_type = e.name(), error = %err, "dropping unencodable message");
                None
            }
        })
        .inspect(|frame| trace!(len = frame.len(), "frame queued"))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn editor() -> Editor {
        Editor::new(EditorConfig::default()).unwrap()
    }

    #[test]
    fn client_id_frame_flushes_buffered_messages() {
        let mut e = editor();
        e.command(Event::NewDevice(crate::model::DeviceType::Router)).unwrap();
        e.mouse_move(200.0, 200.0, Modifiers::default()).unwrap();
        e.mouse_down(200.0, 200.0, Modifiers::default()).unwrap();
        e.mouse_up(200.0, 200.0, Modifiers::default()).unwrap();
        assert!(e.control_frames().is_empty());

        e.receive_frame(r#"["id", 5]"#).unwrap();
        let frames = e.control_frames();
        assert!(frames.iter().any(|f| f.starts_with(r#"["DeviceCreate""#)));
        assert!(frames.iter().all(|f| f.contains(r#""sender":5"#)));
    }

    #[test]
    fn server_error_frame_is_reported() {
        let mut e = editor();
        let err = e.receive_frame(r#"["Error", "topology locked"]"#).unwrap_err();
        assert!(matches!(err, CoreError::Server { message } if message == "topology locked"));
    }

    #[test]
    fn garbage_is_a_malformed_frame() {
        let mut e = editor();
        assert!(matches!(e.receive_frame("{not json"), Err(CoreError::MalformedFrame { .. })));
    }

    #[test]
    fn pointer_input_is_recorded_with_the_trace_id() {
        let mut e = editor();
        e.command(Event::ToggleRecording).unwrap();
        e.take_test();
        e.mouse_move(30.0, 40.0, Modifiers::default()).unwrap();
        let sent = e.take_test();
        let Message::MouseEvent(m) = &sent[0].message else {
            panic!("expected a mouse event first, got {}", sent[0].name());
        };
        assert_eq!((m.x, m.y, m.trace_id), (30.0, 40.0, e.workspace().trace_id));
    }

    #[test]
    fn animation_tick_is_idle_without_animations() {
        let mut e = editor();
        assert!(!e.animation_tick().unwrap());
        assert!(!e.test_tick());
    }
}
