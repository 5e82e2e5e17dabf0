// ── Scripted test runner ──
//
// Replays recorded input against a known starting snapshot and compares
// the result with the expected one. Sits at the head of the chain so it
// sees the test commands before anything else; everything else passes
// through.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::event::Event;
use crate::fsm::{Fsm, Machine, StateId};
use crate::message::{Message, TestOutcome, TestResult};
use crate::pipeline::{Controller, Flow, Stage};
use crate::states;
use crate::workspace::Workspace;

states! {
    pub enum TestState {
        Start => [Disabled],
        Disabled => [Ready],
        Ready => [Loading, Disabled],
        Loading => [Running],
        Running => [Reporting],
        Reporting => [Loading, Disabled],
    }
}

#[derive(Debug)]
pub struct TestRunner {
    machine: Machine<TestState>,
}

impl TestRunner {
    pub fn new() -> Self {
        Self {
            machine: Machine::new("test_fsm", TestState::Start),
        }
    }

    /// Queue the whole suite and remember the session modes to restore.
    fn begin(ws: &mut Workspace) {
        let tests = &mut ws.tests;
        tests.pending = tests.suite.iter().cloned().collect();
        tests.results.clear();
        tests.saved_flags = Some((ws.flags.disconnected, ws.flags.replay));
        info!(tests = tests.pending.len(), "test run started");
    }

    /// Next test, or wrap up when none are left.
    fn advance(&mut self, ws: &mut Workspace) {
        if ws.tests.pending.is_empty() {
            self.change_state(ws, TestState::Disabled);
            if let Some((disconnected, replay)) = ws.tests.saved_flags.take() {
                ws.flags.disconnected = disconnected;
                ws.flags.replay = replay;
            }
            ws.tests.current = None;
            ws.send_test_message(Message::TestCompleted);
            let failed = ws
                .tests
                .results
                .iter()
                .filter(|r| r.result != TestOutcome::Passed)
                .count();
            info!(run = ws.tests.results.len(), failed, "test run completed");
        } else {
            self.change_state(ws, TestState::Loading);
        }
    }

    /// Reset the editor to the current test's starting point.
    fn load(ws: &mut Workspace) {
        let Some(test) = ws.tests.pending.pop_front() else {
            return;
        };
        ws.reset();
        ws.queues.reset_stages = true;
        ws.flags.disconnected = true;
        ws.flags.replay = true;
        ws.tests.errors.clear();

        match test.pre() {
            Some(pre) => ws.load_snapshot(pre),
            None => ws.tests.errors.push("missing pre snapshot".to_owned()),
        }
        ws.tests.events = test.event_trace.iter().cloned().collect();
        debug!(name = %test.name, events = ws.tests.events.len(), "test loaded");
        ws.tests.current = Some(test);
        ws.queues.inject(Event::TestLoad);
    }

    /// Compare against the expected snapshot and report.
    fn report(ws: &mut Workspace) {
        let Some(test) = ws.tests.current.take() else {
            return;
        };
        let mut errors = std::mem::take(&mut ws.tests.errors);
        let result = if !errors.is_empty() {
            TestOutcome::Errored
        } else if let Some(post) = test.post() {
            errors = ws.doc.diff(post);
            if errors.is_empty() {
                TestOutcome::Passed
            } else {
                TestOutcome::Failed
            }
        } else {
            errors.push("missing post snapshot".to_owned());
            TestOutcome::Errored
        };

        if result == TestOutcome::Passed {
            info!(name = %test.name, "test passed");
        } else {
            warn!(name = %test.name, result = <&str>::from(result), errors = ?errors, "test did not pass");
        }
        ws.tests.next_result_id += 1;
        let report = TestResult {
            id: ws.tests.next_result_id,
            name: test.name,
            result,
            date: Utc::now(),
            errors,
        };
        ws.send_test_message(Message::TestResult(report.clone()));
        ws.tests.results.push(report);
    }
}

impl Default for TestRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl Fsm for TestRunner {
    type State = TestState;
    type Context = Workspace;

    fn machine(&self) -> &Machine<TestState> {
        &self.machine
    }

    fn machine_mut(&mut self) -> &mut Machine<TestState> {
        &mut self.machine
    }

    fn on_start(&mut self, ws: &mut Workspace, state: TestState) {
        match state {
            TestState::Loading => Self::load(ws),
            TestState::Reporting => Self::report(ws),
            _ => {}
        }
    }
}

impl Controller for TestRunner {
    fn stage(&self) -> Stage {
        Stage::Test
    }

    fn state_name(&self) -> &'static str {
        self.state().name()
    }

    fn reset(&mut self) {
        self.machine.reset();
    }

    fn start(&mut self, ws: &mut Workspace) {
        self.change_state(ws, TestState::Disabled);
    }

    fn handle(&mut self, ws: &mut Workspace, event: &Event) -> Result<Flow, CoreError> {
        if matches!(event, Event::ToggleRecording) {
            ws.toggle_recording();
            return Ok(Flow::Consumed);
        }

        let flow = match (self.state(), event) {
            (TestState::Disabled, Event::EnableTest) => {
                Self::begin(ws);
                self.change_state(ws, TestState::Ready);
                self.advance(ws);
                Flow::Consumed
            }
            (_, Event::EnableTest) => {
                warn!(state = self.state().name(), "test run already in progress");
                Flow::Consumed
            }
            (TestState::Loading, Event::TestLoad) => {
                self.change_state(ws, TestState::Running);
                Flow::Consumed
            }
            (TestState::Running, Event::TestTick) => {
                if let Some(mut envelope) = ws.tests.events.pop_front() {
                    envelope.sender = 0;
                    ws.queues.inject(Event::Message(envelope));
                } else {
                    self.change_state(ws, TestState::Reporting);
                    self.advance(ws);
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
    use crate::message::{DeviceMove, Envelope, TestCase};
    use crate::model::{DeviceRecord, DeviceType, Snapshot};
    use crate::pipeline::{DEFAULT_CHAIN, Pipeline};
    use pretty_assertions::assert_eq;

    fn snapshot(x: f64) -> Snapshot {
        Snapshot {
            devices: vec![DeviceRecord {
                id: 1,
                name: "Router1".into(),
                x,
                y: 100.0,
                device_type: DeviceType::Router,
                host_id: None,
                interfaces: Vec::new(),
                processes: Vec::new(),
            }],
            ..Snapshot::default()
        }
    }

    fn move_test(name: &str, expected_x: f64) -> TestCase {
        TestCase {
            name: name.into(),
            event_trace: vec![Envelope::new(
                9,
                Message::DeviceMove(DeviceMove {
                    id: 1,
                    x: 200.0,
                    y: 100.0,
                    previous_x: 100.0,
                    previous_y: 100.0,
                }),
            )],
            snapshots: Vec::new(),
            pre: Some(Box::new(snapshot(100.0))),
            post: Some(Box::new(snapshot(expected_x))),
        }
    }

    fn run(ws: &mut Workspace, p: &mut Pipeline) {
        p.dispatch(ws, &Event::EnableTest).unwrap();
        for _ in 0..100 {
            if p.state_of(Stage::Test) == Some("Disabled") {
                return;
            }
            p.dispatch(ws, &Event::TestTick).unwrap();
        }
        panic!("test run did not finish");
    }

    #[test]
    fn suite_reports_each_test_and_restores_modes() {
        let mut ws = Workspace::new(EditorConfig::default());
        ws.set_client_id(3);
        let mut p = Pipeline::new(DEFAULT_CHAIN);
        p.start_all(&mut ws).unwrap();
        ws.tests.suite.push(move_test("moves", 200.0));
        ws.tests.suite.push(move_test("wrong", 300.0));

        run(&mut ws, &mut p);

        let outcomes: Vec<_> = ws.tests.results.iter().map(|r| (r.name.as_str(), r.result)).collect();
        assert_eq!(outcomes, vec![("moves", TestOutcome::Passed), ("wrong", TestOutcome::Failed)]);
        assert_eq!(ws.tests.results[1].errors.len(), 1);
        assert!(!ws.flags.disconnected);
        assert!(!ws.flags.replay);
        assert!(ws.outbox.take_control().is_empty());

        let sent: Vec<_> = ws.outbox.take_test().iter().map(|e| e.name()).collect();
        assert_eq!(sent, vec!["TestResult", "TestResult", "TestCompleted"]);
        assert!(ws.trace.illegal().is_empty());
    }

    #[test]
    fn missing_post_snapshot_is_an_error() {
        let mut ws = Workspace::new(EditorConfig::default());
        let mut p = Pipeline::new(DEFAULT_CHAIN);
        p.start_all(&mut ws).unwrap();
        let mut test = move_test("no post", 200.0);
        test.post = None;
        ws.tests.suite.push(test);

        run(&mut ws, &mut p);
        assert_eq!(ws.tests.results[0].result, TestOutcome::Errored);
    }

    #[test]
    fn empty_suite_completes_immediately() {
        let mut ws = Workspace::new(EditorConfig::default());
        let mut p = Pipeline::new(DEFAULT_CHAIN);
        p.start_all(&mut ws).unwrap();
        p.dispatch(&mut ws, &Event::EnableTest).unwrap();
        assert_eq!(p.state_of(Stage::Test), Some("Disabled"));
        let sent: Vec<_> = ws.outbox.take_test().iter().map(|e| e.name()).collect();
        assert_eq!(sent, vec!["TestCompleted"]);
    }
}
